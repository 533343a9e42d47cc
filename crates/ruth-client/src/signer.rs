//! Signs a client's training-step outcome into a submittable `ClientUpdate`,
//! binding the attestation nonce to the exact signed payload (spec.md §4.3).

use crate::attestation::AttestationProvider;
use crate::runtime::StepOutcome;
use ruth_core::canonical::signing_payload;
use ruth_core::crypto::{sha256_hex, KeyPair};
use ruth_core::types::ClientUpdate;

/// Wraps an Ed25519 keypair and an attestation provider to turn a
/// `StepOutcome` into a fully signed, attested `ClientUpdate`.
///
/// Key storage is platform-delegated in production; for testing, a key
/// loaded from a process-wide secret (`KeyPair::from_seed`) is acceptable,
/// exactly as spec.md §4.3 allows.
pub struct Signer<A: AttestationProvider> {
    keypair: KeyPair,
    device_id: String,
    attestation: A,
}

impl<A: AttestationProvider> Signer<A> {
    pub fn new(keypair: KeyPair, device_id: String, attestation: A) -> Self {
        Signer {
            keypair,
            device_id,
            attestation,
        }
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.keypair.public_key()
    }

    /// Build the `ClientUpdate` for round `round_id` from a step outcome:
    /// sign the canonical payload, derive the attestation nonce from the
    /// same bytes, and request a token from the attestation provider.
    pub fn sign_update(&self, round_id: u64, outcome: &StepOutcome) -> ClientUpdate {
        let payload = signing_payload(outcome.seed_id, outcome.scalar, round_id);
        let signature = self.keypair.sign(&payload).to_vec();

        let nonce_hex = sha256_hex(&payload);
        let token = self.attestation.attest(&nonce_hex);

        ClientUpdate {
            device_id: self.device_id.clone(),
            round_id,
            seed_id: outcome.seed_id,
            scalar: outcome.scalar,
            loss: outcome.loss,
            signature,
            attestation_token: token.0,
        }
    }
}
