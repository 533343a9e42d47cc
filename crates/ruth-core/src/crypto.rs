//! Ed25519 signing and the SHA-256 nonce/binding-hash helpers.
//!
//! `KeyPair` is adapted from the teacher's transport-layer key wrapper: same
//! generate/from_seed/public_key/sign/verify shape, with the X25519/AEAD
//! session-key machinery dropped since Ruth never encrypts payloads here.

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Ed25519 keypair for signing client updates and attestation material.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        Self { signing_key }
    }

    /// Create from seed bytes (deterministic, for tests and for the
    /// platform-delegated key-storage fallback spec.md §4.3 allows).
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        Self { signing_key }
    }

    /// Get the public key bytes.
    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Sign a message, returning the raw 64-byte Ed25519 signature.
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Verify a signature against a 32-byte public key.
    pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &[u8]) -> Result<()> {
        let verifying_key =
            VerifyingKey::from_bytes(public_key).map_err(|e| Error::InvalidPublicKey(e.to_string()))?;
        let sig_bytes: [u8; 64] = signature
            .try_into()
            .map_err(|_| Error::InvalidSignature)?;
        let sig = Signature::from_bytes(&sig_bytes);
        verifying_key
            .verify(message, &sig)
            .map_err(|_| Error::InvalidSignature)
    }
}

/// `sha256_hex(bytes)` — the nonce/binding-hash primitive used by both the
/// signer (to embed a nonce in the attestation request) and the gatekeeper
/// (to recompute the expected nonce independently).
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Accept a nonce presented either as lowercase hex or as base64-of-the-raw
/// hex-decoded bytes, per spec.md §4.4's Gatekeeper step 4. Returns the
/// canonical lowercase-hex form for comparison with `expected_nonce_hex`.
pub fn normalize_nonce_encoding(presented: &str) -> Option<String> {
    if presented
        .chars()
        .all(|c| c.is_ascii_hexdigit())
        && presented.len() % 2 == 0
        && !presented.is_empty()
    {
        return Some(presented.to_lowercase());
    }
    BASE64.decode(presented).ok().map(hex::encode)
}

/// Decode a base64-encoded 32-byte Ed25519 seed, as accepted from the
/// `RUTH_CLIENT_PRIVATE_KEY`-style environment variable.
pub fn decode_base64_seed(input: &str) -> Option<[u8; 32]> {
    BASE64.decode(input).ok()?.try_into().ok()
}
