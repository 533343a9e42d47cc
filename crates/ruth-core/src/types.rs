//! Core protocol types for Ruth's federated LoRA coordination round.
//!
//! All types here are designed for deterministic serialization via postcard;
//! field order matters for anything that feeds `canonical::canonical_bytes`.

use serde::{Deserialize, Serialize};

/// 32-byte fixed-size array used for hashes and identifiers.
pub type Bytes32 = [u8; 32];

// =============================================================================
// PRNG / LAYOUT CONFIGURATION
// =============================================================================

/// Versioned tag for the PRNG family and the noise-vector-to-parameter
/// layout, so client and server can detect a drift in either contract.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrngConfig {
    /// Identifies the generator family (currently always "xoshiro256ss-boxmuller").
    pub family: String,
    /// Layout version of the flat noise vector onto trainable parameters.
    pub layout_version: u32,
}

impl Default for PrngConfig {
    fn default() -> Self {
        PrngConfig {
            family: "xoshiro256ss-boxmuller".to_string(),
            layout_version: 1,
        }
    }
}

// =============================================================================
// SEED SET (coordinator -> client)
// =============================================================================

/// Published at the start of round `round_id`: the pool of seeds eligible
/// clients may draw from, and the perturbation scale `epsilon`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SeedSet {
    pub round_id: u64,
    pub seeds: Vec<u64>,
    pub epsilon: f32,
    pub prng_config: PrngConfig,
}

impl SeedSet {
    /// `seeds` non-empty, `epsilon` finite and strictly positive.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.seeds.is_empty() {
            return Err(crate::error::Error::Config("seeds must be non-empty".into()));
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            return Err(crate::error::Error::Numeric(format!(
                "epsilon must be finite and positive, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

// =============================================================================
// CLIENT UPDATE / SCALAR UPLOAD (client -> server)
// =============================================================================

/// A single client's contribution to round `round_id`.
///
/// `signature` is an Ed25519 signature over
/// `utf8("{seed_id}:{scalar}:{round_id}")`; `attestation_token` is an
/// opaque, platform-issued integrity token whose embedded nonce must equal
/// `sha256_hex` of that same payload.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClientUpdate {
    pub device_id: String,
    pub round_id: u64,
    pub seed_id: u64,
    pub scalar: f32,
    pub loss: f32,
    pub signature: Vec<u8>,
    pub attestation_token: Vec<u8>,
}

/// Alias matching spec.md's external-interface name for the same record;
/// client-facing code refers to the wire upload as `ScalarUpload`.
pub type ScalarUpload = ClientUpdate;

// =============================================================================
// ROUND STATE
// =============================================================================

/// Lifecycle of one round's staged updates, persisted in the durable store
/// so a process restart does not lose it (see `ruth:round:{r}:status`).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum RoundStatus {
    Open,
    Aggregating,
    Closed,
    /// Aggregation hit an `InternalError` (e.g. a malformed seed); the round
    /// is flagged for operator inspection rather than silently dropped.
    Failed,
}

impl RoundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoundStatus::Open => "open",
            RoundStatus::Aggregating => "aggregating",
            RoundStatus::Closed => "closed",
            RoundStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "open" => Some(RoundStatus::Open),
            "aggregating" => Some(RoundStatus::Aggregating),
            "closed" => Some(RoundStatus::Closed),
            "failed" => Some(RoundStatus::Failed),
            _ => None,
        }
    }
}

// =============================================================================
// CLIENT RUNTIME STATE
// =============================================================================

/// Per-device state that lives across rounds: the EMA baseline used to
/// de-bias the raw directional derivative, and the magnitude clip.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ClientRuntimeState {
    pub step_count: u64,
    pub baseline: f32,
    pub beta: f32,
    pub max_norm: f32,
}

impl ClientRuntimeState {
    pub fn new(beta: f32, max_norm: f32) -> Self {
        ClientRuntimeState {
            step_count: 0,
            baseline: 0.0,
            beta,
            max_norm,
        }
    }
}

// =============================================================================
// AGGREGATION OUTPUT
// =============================================================================

/// The coordinate-wise trimmed-mean direction produced once per round.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AggregatedDirection {
    pub round_id: u64,
    pub values: Vec<f32>,
}

/// Server response carrying the round's aggregated updates (server -> client).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AggResponse {
    pub round_id: u64,
    pub server_updates: Vec<f32>,
    pub next_round_hint: Option<String>,
}

// =============================================================================
// ATTESTATION VERDICT (outbound oracle response shape)
// =============================================================================

/// Parsed response from the attestation verdict oracle's
/// `POST .../signedAttestation` call.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AttestationVerdict {
    pub is_valid_signature: bool,
    pub basic_integrity: bool,
    pub nonce: String,
}
