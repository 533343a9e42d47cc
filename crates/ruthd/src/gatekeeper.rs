//! Signature + attestation gatekeeping for inbound client updates
//! (spec.md §4.4).
//!
//! The gatekeeper is the one place in ruthd that talks to an external
//! service (the attestation verdict oracle). `reqwest` is not part of the
//! teacher's dependency stack; it is added here the way the teacher's
//! `prober` would reach for an HTTP client if it called out to a service
//! boundary instead of talking gossip wire protocol directly (see
//! DESIGN.md for the justification).

use crate::error::RejectReason;
use ruth_core::crypto::{normalize_nonce_encoding, sha256_hex, KeyPair};
use ruth_core::{canonical, AttestationVerdict, ClientUpdate};
use std::time::Duration;

const ORACLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for the outbound call to the attestation verdict oracle.
#[derive(Clone, Debug)]
pub struct OracleConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
}

/// Stateless verifier wrapping the oracle HTTP client.
pub struct Gatekeeper {
    http: reqwest::Client,
    oracle: OracleConfig,
}

impl Gatekeeper {
    pub fn new(oracle: OracleConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            oracle,
        }
    }

    /// Run the full 5-step gate from spec.md §4.4 against one update, given
    /// the device's registered public key. Returns `Ok(())` on acceptance,
    /// or the specific `RejectReason` the update failed on.
    pub async fn admit(
        &self,
        update: &ClientUpdate,
        public_key: &[u8; 32],
    ) -> Result<(), RejectReason> {
        let payload = canonical::signing_payload(update.seed_id, update.scalar, update.round_id);

        KeyPair::verify(public_key, &payload, &update.signature)
            .map_err(|_| RejectReason::SignatureFail)?;

        let verdict = self
            .query_verdict(update)
            .await
            .ok_or(RejectReason::VerdictUnreachable)?;

        evaluate_verdict(&payload, &verdict)
    }

    /// POST the attestation token to the oracle and parse its verdict,
    /// fail-closed (`None`) on any timeout, transport, or decode error. The
    /// full round trip — request and response body — shares one 5-second
    /// deadline, matching spec.md §6's "hard 5-second deadline" on the
    /// oracle call as a whole, not per I/O step.
    async fn query_verdict(&self, update: &ClientUpdate) -> Option<AttestationVerdict> {
        let mut req = self
            .http
            .post(&self.oracle.endpoint)
            .json(&serde_json::json!({
                "device_id": update.device_id,
                "attestation_token": update.attestation_token,
            }));
        if let Some(key) = &self.oracle.api_key {
            req = req.bearer_auth(key);
        }

        let call = async {
            let response = req.send().await.ok()?;
            response.json::<AttestationVerdict>().await.ok()
        };
        tokio::time::timeout(ORACLE_TIMEOUT, call).await.ok()?
    }
}

/// The nonce/integrity half of spec.md §4.4 steps 3-4, pulled out as a pure
/// function of the signed payload and the oracle's verdict so it can be
/// exercised without a network round trip — the oracle response shape is
/// the only thing tests need to fabricate.
fn evaluate_verdict(payload: &[u8], verdict: &AttestationVerdict) -> Result<(), RejectReason> {
    let expected_nonce = sha256_hex(payload);

    let presented_nonce =
        normalize_nonce_encoding(&verdict.nonce).ok_or(RejectReason::NonceMismatch)?;
    if presented_nonce != expected_nonce {
        return Err(RejectReason::NonceMismatch);
    }

    if !verdict.is_valid_signature || !verdict.basic_integrity {
        return Err(RejectReason::IntegrityFail);
    }

    Ok(())
}
