//! Canonical encoding for Ruth.
//!
//! All hashed/signed objects use postcard serialization; the one payload
//! whose byte-for-byte form is load-bearing across signer and verifier is
//! the `"{seed_id}:{scalar}:{round_id}"` signing string, built here from a
//! single pinned decimal form of `scalar` so both sides agree.

use crate::error::{Error, Result};
use serde::Serialize;

/// Serialize a value to canonical bytes using postcard.
///
/// This is the normative encoding for wire records staged in the durable
/// store (`ClientUpdate`, `SeedSet`, `AggResponse`).
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    postcard::to_allocvec(value).map_err(Error::from)
}

/// Reject non-finite floats used in numeric contracts (loss, epsilon, scalar).
pub fn require_finite_f32(v: f32, what: &str) -> Result<f32> {
    if !v.is_finite() {
        return Err(Error::Numeric(format!("{what} must be finite, got {v}")));
    }
    Ok(v)
}

/// The pinned canonical decimal form of a scalar for the signing payload.
///
/// Rust's `f32::to_string()` produces the shortest decimal that round-trips
/// back to the same `f32`; both the signer and the verifier in this
/// workspace run the same formatting routine, so this is sufficient within
/// a single-language deployment. Cross-language interop would need a fixed
/// byte-level spec instead (see DESIGN.md).
pub fn canonical_scalar_decimal(scalar: f32) -> String {
    scalar.to_string()
}

/// Build the exact UTF-8 bytes signed by the client and re-derived by the
/// gatekeeper: `"{seed_id}:{scalar}:{round_id}"`.
pub fn signing_payload(seed_id: u64, scalar: f32, round_id: u64) -> Vec<u8> {
    format!(
        "{}:{}:{}",
        seed_id,
        canonical_scalar_decimal(scalar),
        round_id
    )
    .into_bytes()
}

/// `generate_binding_hash({seed_id, scalar, model_hash}) -> sha256_hex(...)`:
/// used by clients that bind attestation to a model identity rather than a
/// round identity.
pub fn generate_binding_hash(seed_id: u64, scalar: f32, model_hash: &str) -> String {
    let payload = format!("{}:{}:{}", seed_id, canonical_scalar_decimal(scalar), model_hash);
    crate::crypto::sha256_hex(payload.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_finite_rejects_nan_and_inf() {
        assert!(require_finite_f32(1.5, "x").is_ok());
        assert!(require_finite_f32(f32::NAN, "x").is_err());
        assert!(require_finite_f32(f32::INFINITY, "x").is_err());
        assert!(require_finite_f32(f32::NEG_INFINITY, "x").is_err());
    }

    #[test]
    fn test_signing_payload_matches_spec_format() {
        let payload = signing_payload(42, 0.1, 7);
        assert_eq!(payload, b"42:0.1:7".to_vec());
    }

    #[test]
    fn test_signing_payload_is_deterministic() {
        let a = signing_payload(1, -0.25, 3);
        let b = signing_payload(1, -0.25, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_scalar_changes_payload() {
        let a = signing_payload(1, 0.1, 3);
        let b = signing_payload(1, 0.2, 3);
        assert_ne!(a, b);
    }

    #[test]
    fn test_canonical_bytes_roundtrip_stable() {
        let set = crate::types::SeedSet {
            round_id: 1,
            seeds: vec![1, 2, 3],
            epsilon: 0.1,
            prng_config: crate::types::PrngConfig::default(),
        };
        let bytes1 = canonical_bytes(&set).unwrap();
        let bytes2 = canonical_bytes(&set).unwrap();
        assert_eq!(bytes1, bytes2);
    }
}
