//! ruth-client configuration

use clap::Parser;
use std::path::PathBuf;

/// Ruth on-device training client
#[derive(Parser, Debug, Clone)]
#[command(name = "ruth-client")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Address of the coordinator/collector (ruthd) to submit updates to
    #[arg(long, default_value = "127.0.0.1:9101")]
    pub server_addr: String,

    /// Stable identifier for this device, registered out-of-band with the
    /// server's device registry
    #[arg(long, env = "RUTH_DEVICE_ID")]
    pub device_id: String,

    /// Base64-encoded 32-byte Ed25519 seed. If unset, a fresh random
    /// keypair is generated for the process lifetime (dev/test only).
    #[arg(long, env = "RUTH_CLIENT_PRIVATE_KEY")]
    pub private_key_seed_b64: Option<String>,

    /// Data directory for any local client-side persistence
    #[arg(long, default_value = "./data/ruth-client")]
    pub data_dir: PathBuf,

    /// EMA baseline decay (beta), in (0, 1)
    #[arg(long, default_value = "0.9")]
    pub beta: f32,

    /// Magnitude clip applied to the de-biased directional derivative
    #[arg(long, default_value = "5.0")]
    pub max_norm: f32,

    /// Fixed epsilon used for the antithetic perturbation
    #[arg(long, default_value = "0.1")]
    pub epsilon: f32,
}

impl Config {
    /// Validate cross-field invariants not expressible via `clap` alone.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..1.0).contains(&self.beta) {
            anyhow::bail!("beta must be in (0, 1), got {}", self.beta);
        }
        if self.max_norm <= 0.0 {
            anyhow::bail!("max_norm must be positive, got {}", self.max_norm);
        }
        if !self.epsilon.is_finite() || self.epsilon <= 0.0 {
            anyhow::bail!("epsilon must be finite and positive, got {}", self.epsilon);
        }
        if self.device_id.trim().is_empty() {
            anyhow::bail!("device_id must not be empty");
        }
        Ok(())
    }
}
