//! Configuration for ruthd

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// ruthd - Ruth federated LoRA coordination server
#[derive(Parser, Debug, Clone)]
#[command(name = "ruthd")]
#[command(about = "Ruth gatekeeper, collector, and robust-aggregation server")]
pub struct Config {
    /// Listen address for client update submissions
    #[arg(short, long, default_value = "0.0.0.0:9101")]
    pub listen: SocketAddr,

    /// Data directory for the durable round/device store
    #[arg(short, long, default_value = "./data/ruthd")]
    pub data_dir: PathBuf,

    /// Number of accepted updates required before a round is aggregated
    #[arg(long, default_value = "10")]
    pub quorum: u64,

    /// Fraction trimmed from each tail, per coordinate, before averaging
    #[arg(long, default_value = "0.1")]
    pub trim_ratio: f32,

    /// Flattened parameter dimension the noise oracle expands seeds to
    #[arg(long, default_value = "4096")]
    pub param_dim: usize,

    /// Attestation verdict oracle endpoint
    #[arg(long, env = "RUTH_ATTESTATION_ORACLE_URL")]
    pub attestation_oracle_url: String,

    /// Bearer token presented to the attestation oracle, if required
    #[arg(long, env = "RUTH_ATTESTATION_ORACLE_KEY")]
    pub attestation_oracle_key: Option<String>,

    /// How often the collector polls open rounds for quorum, in seconds
    #[arg(long, default_value = "1")]
    pub poll_interval_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log format (json or pretty)
    #[arg(long, default_value = "pretty")]
    pub log_format: String,
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.quorum == 0 {
            anyhow::bail!("quorum must be at least 1");
        }
        if !(0.0..0.5).contains(&self.trim_ratio) {
            anyhow::bail!("trim_ratio must be in [0, 0.5), got {}", self.trim_ratio);
        }
        if self.param_dim == 0 {
            anyhow::bail!("param_dim must be positive");
        }
        if self.attestation_oracle_url.trim().is_empty() {
            anyhow::bail!("attestation_oracle_url must not be empty");
        }
        if self.poll_interval_secs == 0 {
            anyhow::bail!("poll_interval_secs must be at least 1");
        }
        Ok(())
    }
}
