//! ruthd server - wires the store, registry, gatekeeper, and collector into
//! one service loop.

use crate::collector::{Collector, SubmitOutcome};
use crate::config::Config;
use crate::error::{Result, ServerError};
use crate::gatekeeper::{Gatekeeper, OracleConfig};
use crate::registry::DeviceRegistry;
use crate::store::Store;
use ruth_core::ClientUpdate;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Server state: a thin wiring layer over the collector pipeline plus a
/// placeholder TCP accept loop for the (out-of-scope) wire transport.
pub struct Server {
    config: Config,
    store: Arc<Store>,
    registry: Arc<DeviceRegistry>,
    collector: Arc<Collector>,
    shutdown_tx: watch::Sender<bool>,
}

impl Server {
    /// Create a new server instance.
    pub fn new(config: Config) -> Result<Self> {
        let store = Arc::new(Store::open(&config.data_dir)?);
        let registry = Arc::new(DeviceRegistry::new(store.clone()));
        let gatekeeper = Arc::new(Gatekeeper::new(OracleConfig {
            endpoint: config.attestation_oracle_url.clone(),
            api_key: config.attestation_oracle_key.clone(),
        }));
        let collector = Arc::new(Collector::new(
            store.clone(),
            registry.clone(),
            gatekeeper,
            config.quorum,
            config.trim_ratio,
            config.param_dim,
        ));
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            store,
            registry,
            collector,
            shutdown_tx,
        })
    }

    /// Register a device's public key with the server's registry. Device
    /// enrollment is out-of-band (spec.md §1 leaves provisioning to an
    /// external collaborator); this is the entrypoint that collaborator
    /// calls into.
    pub fn register_device(&self, device_id: &str, public_key: [u8; 32]) -> Result<()> {
        self.registry.register(device_id, public_key)
    }

    /// Submit one client update through the gatekeeper and collector. This
    /// is the programmatic entrypoint a wire-codec layer decodes into, per
    /// spec.md §1's external-interfaces boundary. Submissions arriving after
    /// `shutdown()` has been called are rejected outright (spec.md §5
    /// Cancellation).
    pub async fn submit(&self, update: ClientUpdate) -> Result<SubmitOutcome> {
        if *self.shutdown_tx.borrow() {
            return Err(ServerError::Shutdown);
        }

        self.collector.submit(update).await
    }

    /// Run the server: the collector's background trigger loop plus a
    /// placeholder TCP accept loop, until shutdown.
    pub async fn run(&self) -> Result<()> {
        info!("Starting ruthd on {}", self.config.listen);

        let trigger_handle = self.spawn_collector_task();

        let listener = TcpListener::bind(&self.config.listen).await?;
        info!("Listening on {}", self.config.listen);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((_stream, addr)) => {
                            debug!("Accepted connection from {} (wire codec out of scope)", addr);
                            // TODO: decode a ClientUpdate off the wire and call
                            // self.submit(update); the wire codec is an
                            // external collaborator (spec.md §1).
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutting down...");
                        break;
                    }
                }
            }
        }

        trigger_handle.abort();
        self.store.flush()?;
        Ok(())
    }

    /// Spawn the collector's background quorum-trigger loop.
    fn spawn_collector_task(&self) -> tokio::task::JoinHandle<()> {
        let collector = self.collector.clone();
        let poll_interval = Duration::from_secs(self.config.poll_interval_secs);
        let shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            collector.run_trigger_loop(poll_interval, shutdown_rx).await;
        })
    }

    /// Signal shutdown to the accept loop and the background trigger task.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get server statistics.
    pub fn stats(&self) -> ServerStats {
        ServerStats {
            device_count: self.registry.device_count(),
            tracked_round_count: self.store.open_round_ids().map(|v| v.len()).unwrap_or(0),
        }
    }
}

/// Server statistics.
#[derive(Debug, Clone)]
pub struct ServerStats {
    pub device_count: usize,
    pub tracked_round_count: usize,
}
