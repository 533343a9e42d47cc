//! ruthd - Ruth federated LoRA coordination server
//!
//! This daemon provides:
//! - Durable round staging and device public-key registration
//! - Signature and attestation gatekeeping for inbound client updates
//! - Asynchronous, quorum-triggered round collection
//! - Byzantine-robust coordinate-wise trimmed-mean aggregation

pub mod aggregator;
pub mod collector;
pub mod config;
pub mod error;
pub mod gatekeeper;
pub mod registry;
pub mod server;
pub mod store;

pub use collector::Collector;
pub use config::Config;
pub use error::{RejectReason, ServerError};
pub use gatekeeper::Gatekeeper;
pub use registry::DeviceRegistry;
pub use server::Server;
pub use store::Store;
