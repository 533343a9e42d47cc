//! ruth-client - on-device training-step daemon for the Ruth federated LoRA
//! coordination protocol.
//!
//! This binary drives the antithetic-sampling training step against a
//! model, signs the resulting scalar, and would submit it to the
//! coordinator. The model itself and the wire submission path are external
//! collaborators (spec.md §1 Out of scope); here they are stubbed with the
//! quadratic test fixture and a log line, matching how the teacher's
//! `prober` daemon stubs the parts of its pipeline owned by other services.

use clap::Parser;
use ruth_client::config::Config;
use ruth_client::loss::{Batch, QuadraticLossModel};
use ruth_client::runtime::{ClientRuntime, ConstantEpsilon};
use ruth_client::attestation::MockAttestationProvider;
use ruth_client::Signer;
use ruth_core::crypto::{decode_base64_seed, KeyPair};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("ruth_client=info".parse().unwrap()))
        .init();

    let config = Config::parse();
    if let Err(e) = config.validate() {
        eprintln!("invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    info!(
        "ruth-client v{} starting for device {}",
        env!("CARGO_PKG_VERSION"),
        config.device_id
    );

    let keypair = match &config.private_key_seed_b64 {
        Some(seed_b64) => match decode_base64_seed(seed_b64) {
            Some(seed) => KeyPair::from_seed(&seed),
            None => {
                eprintln!("RUTH_CLIENT_PRIVATE_KEY is not a valid base64-encoded 32-byte seed");
                return ExitCode::FAILURE;
            }
        },
        None => {
            warn!("no private key configured; generating an ephemeral keypair for this process");
            KeyPair::generate()
        }
    };

    let signer = Signer::new(keypair, config.device_id.clone(), MockAttestationProvider::new());

    // TODO: replace with the real adapter model and batch source once those
    // collaborators are wired up; this fixture only exercises the step and
    // signing pipeline end to end.
    let model = QuadraticLossModel::new(vec![0.0; 120]);
    let seeds: Vec<u64> = (1..=1000).collect();
    let mut runtime = match ClientRuntime::new(seeds, config.beta, config.max_norm) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("failed to initialize client runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    let schedule = ConstantEpsilon(config.epsilon);

    let mut round_id: u64 = 0;
    loop {
        let batch = Batch { x: vec![], y: vec![] };
        match runtime.step(&model, &batch, &schedule) {
            Ok(Some(outcome)) => {
                let update = signer.sign_update(round_id, &outcome);
                info!(
                    round_id,
                    seed_id = update.seed_id,
                    scalar = update.scalar,
                    "emitted signed client update"
                );
                // TODO: submit `update` to config.server_addr over the wire
                // codec; out of scope for this core (spec.md §1).
            }
            Ok(None) => {
                warn!(round_id, "step produced a non-finite loss; discarding");
            }
            Err(e) => {
                warn!(round_id, error = %e, "step failed");
            }
        }

        round_id += 1;
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    ExitCode::SUCCESS
}
