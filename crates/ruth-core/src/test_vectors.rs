//! Cross-process determinism test vectors for the noise oracle and the
//! canonical signing payload (spec.md §8 "Determinism").
//!
//! These are not meant to be reproduced by a different-language
//! implementation (see DESIGN.md on OQ-2 / cross-language interop); they
//! pin the values this Rust implementation must keep producing across
//! releases.

use crate::canonical::signing_payload;
use crate::crypto::sha256_hex;
use crate::noise::noise;
use serde::Serialize;

/// Test vector output format (JSON serializable), same shape the teacher
/// uses for its cross-language export vectors.
#[derive(Serialize)]
pub struct TestVector {
    pub name: String,
    pub description: String,
    pub inputs: serde_json::Value,
    pub output_hex: String,
}

pub fn generate_test_vectors() -> Vec<TestVector> {
    vec![
        noise_vector_small(),
        noise_vector_zero_length(),
        signing_payload_vector(),
        binding_hash_vector(),
    ]
}

fn noise_vector_small() -> TestVector {
    let seed_id = 42u64;
    let d = 8usize;
    let v = noise(seed_id, d);
    let bytes: Vec<u8> = v.iter().flat_map(|f| f.to_le_bytes()).collect();

    TestVector {
        name: "noise_seed42_d8".into(),
        description: "noise(seed_id=42, d=8): flat f32 little-endian bytes".into(),
        inputs: serde_json::json!({ "seed_id": seed_id, "d": d }),
        output_hex: hex::encode(bytes),
    }
}

fn noise_vector_zero_length() -> TestVector {
    let v = noise(7, 0);
    TestVector {
        name: "noise_seed7_d0".into(),
        description: "noise(seed_id=7, d=0) is the empty vector".into(),
        inputs: serde_json::json!({ "seed_id": 7, "d": 0 }),
        output_hex: hex::encode(v.iter().flat_map(|f| f.to_le_bytes()).collect::<Vec<u8>>()),
    }
}

fn signing_payload_vector() -> TestVector {
    let payload = signing_payload(42, 0.1, 7);
    TestVector {
        name: "signing_payload_42_0.1_7".into(),
        description: "utf8(\"{seed_id}:{scalar}:{round_id}\")".into(),
        inputs: serde_json::json!({ "seed_id": 42, "scalar": 0.1, "round_id": 7 }),
        output_hex: hex::encode(&payload),
    }
}

fn binding_hash_vector() -> TestVector {
    let hash = crate::canonical::generate_binding_hash(42, 0.1, "model-abc");
    TestVector {
        name: "binding_hash_42_0.1_model-abc".into(),
        description: "sha256_hex(\"{seed_id}:{scalar}:{model_hash}\")".into(),
        inputs: serde_json::json!({ "seed_id": 42, "scalar": 0.1, "model_hash": "model-abc" }),
        output_hex: hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_vectors() {
        let vectors = generate_test_vectors();
        assert_eq!(vectors.len(), 4);
        let json = serde_json::to_string_pretty(&vectors).unwrap();
        println!("Test Vectors:\n{}", json);
    }

    #[test]
    fn test_noise_vector_deterministic_across_calls() {
        let a = noise_vector_small();
        let b = noise_vector_small();
        assert_eq!(a.output_hex, b.output_hex);
    }

    #[test]
    fn test_signing_payload_vector_matches_known_bytes() {
        let v = signing_payload_vector();
        assert_eq!(v.output_hex, hex::encode(b"42:0.1:7"));
    }

    #[test]
    fn test_binding_hash_vector_matches_sha256() {
        let v = binding_hash_vector();
        assert_eq!(v.output_hex, sha256_hex(b"42:0.1:model-abc"));
    }
}
