//! ruth-client - on-device training-step library for the Ruth federated
//! LoRA coordination protocol.
//!
//! This crate provides:
//! - The opaque-model boundary (`LossModel`) and the antithetic
//!   directional-derivative training step (`ClientRuntime`)
//! - Ed25519 signing of client updates (`Signer`)
//! - The device-attestation collaborator boundary (`AttestationProvider`)

pub mod attestation;
pub mod config;
pub mod loss;
pub mod runtime;
pub mod signer;

pub use attestation::{AttestationProvider, AttestationToken};
pub use config::Config;
pub use loss::LossModel;
pub use runtime::{ClientRuntime, StepOutcome};
pub use signer::Signer;
