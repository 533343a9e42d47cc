//! Asynchronous round collector (spec.md §4.5).
//!
//! Durably stages accepted updates until a round reaches quorum `K`, then
//! triggers the robust aggregator and clears the round. Adapted from the
//! teacher's `EventLog`'s append/merge shape (store-then-update-index), but
//! the background trigger loop's cooperative polling and shutdown follow
//! `server.rs`'s `spawn_sync_task` pattern — narrowed to `tokio::sync::watch`
//! since the collector has exactly one reader rather than the broadcast
//! fan-out a multi-peer sync task needs.

use crate::aggregator;
use crate::error::{Result, ServerError};
use crate::gatekeeper::Gatekeeper;
use crate::registry::DeviceRegistry;
use crate::store::Store;
use ruth_core::{AggregatedDirection, ClientUpdate, RoundStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Outcome of a single `submit` call.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Accepted { staged_count: u64 },
    Rejected(crate::error::RejectReason),
}

/// Stages client updates and triggers aggregation once a round hits quorum.
pub struct Collector {
    store: Arc<Store>,
    registry: Arc<DeviceRegistry>,
    gatekeeper: Arc<Gatekeeper>,
    quorum: u64,
    trim_ratio: f32,
    param_dim: usize,
}

impl Collector {
    pub fn new(
        store: Arc<Store>,
        registry: Arc<DeviceRegistry>,
        gatekeeper: Arc<Gatekeeper>,
        quorum: u64,
        trim_ratio: f32,
        param_dim: usize,
    ) -> Self {
        Self {
            store,
            registry,
            gatekeeper,
            quorum,
            trim_ratio,
            param_dim,
        }
    }

    /// Gate and durably stage one client update (spec.md §4.5 step 1-3).
    /// Aggregation is not triggered inline; the background task polls for
    /// quorum so a burst of concurrent submissions only pays the aggregation
    /// cost once.
    pub async fn submit(&self, update: ClientUpdate) -> Result<SubmitOutcome> {
        let public_key = match self.registry.check_authorized(&update.device_id) {
            Ok(key) => key,
            Err(ServerError::Rejected(reason)) => return Ok(SubmitOutcome::Rejected(reason)),
            Err(e) => return Err(e),
        };

        if let Err(reason) = self.gatekeeper.admit(&update, &public_key).await {
            return Ok(SubmitOutcome::Rejected(reason));
        }

        let round_id = update.round_id;
        let count = self.store.append_update(round_id, &update)?;
        Ok(SubmitOutcome::Accepted { staged_count: count })
    }

    /// Check one round for quorum and run the aggregator if reached
    /// (spec.md §4.5 steps 4-6). A CAS-style status flip guards against two
    /// concurrent callers both attempting the same aggregation.
    pub fn try_aggregate_round(&self, round_id: u64) -> Result<Option<AggregatedDirection>> {
        if self.store.get_status(round_id)? != RoundStatus::Open {
            return Ok(None);
        }
        let count = self.store.update_count(round_id)?;
        if count < self.quorum {
            return Ok(None);
        }

        self.store.set_status(round_id, RoundStatus::Aggregating)?;

        let updates = self.store.read_updates(round_id)?;
        let directions: Vec<Vec<f32>> = updates
            .iter()
            .map(|u| aggregator::reconstruct(u, self.param_dim))
            .collect();
        let values = aggregator::aggregate(&directions, self.trim_ratio, self.param_dim);
        let direction = AggregatedDirection { round_id, values };

        // A stale update entry is tolerable (spec.md §7), so this failure is
        // logged and otherwise ignored rather than retried.
        if let Err(e) = self.store.clear_updates(round_id) {
            warn!(round_id, error = %e, "failed to clear staged updates; stale entries are tolerable");
        }
        // The counter is not allowed to survive: a stale count would be
        // misread as already-staged updates if this round id is ever
        // revisited, so this blocks and retries until the delete succeeds
        // instead of surfacing a `StoreError` that would flip the round to
        // `Failed` (spec.md §7: "counter deletion MUST be retried until
        // success").
        self.retry_delete_counter_until_success(round_id);
        self.store.set_status(round_id, RoundStatus::Closed)?;

        Ok(Some(direction))
    }

    /// Block the calling (blocking-pool) thread until the round's counter
    /// entry is deleted, retrying on every `StoreError`.
    fn retry_delete_counter_until_success(&self, round_id: u64) {
        let mut attempt: u32 = 0;
        loop {
            match self.store.delete_counter(round_id) {
                Ok(()) => return,
                Err(e) => {
                    attempt += 1;
                    error!(
                        round_id,
                        attempt, error = %e, "counter deletion failed, retrying until it succeeds"
                    );
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
        }
    }

    /// Mark a round permanently failed after an unrecoverable aggregation
    /// error (spec.md §4.5's `InternalError` handling), so operators can
    /// find it instead of it silently sitting open forever.
    pub fn fail_round(&self, round_id: u64) -> Result<()> {
        self.store.set_status(round_id, RoundStatus::Failed)
    }

    /// Run the cooperative background trigger loop, polling every
    /// `poll_interval` for rounds that crossed quorum, until `shutdown`
    /// fires. Candidates are read fresh from the durable store each tick
    /// (`Store::open_round_ids`), not from an in-memory set, so a restarted
    /// coordinator resumes polling every round it had in flight.
    pub async fn run_trigger_loop(
        self: Arc<Self>,
        poll_interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let candidates = match self.store.open_round_ids() {
                        Ok(ids) => ids,
                        Err(e) => {
                            warn!(error = %e, "failed to scan for open rounds");
                            continue;
                        }
                    };
                    for round_id in candidates {
                        // Noise regeneration and the coordinate-wise sort/trim
                        // are CPU-bound and scale with `param_dim`; running them
                        // inline here would starve the single-threaded scheduler
                        // (spec.md §5), so each round's aggregation attempt runs
                        // on the blocking thread pool.
                        let this = self.clone();
                        let result = tokio::task::spawn_blocking(move || {
                            this.try_aggregate_round(round_id)
                        })
                        .await;

                        match result {
                            Ok(Ok(Some(direction))) => {
                                info!(round_id, dim = direction.values.len(), "round aggregated");
                            }
                            Ok(Ok(None)) => {}
                            Ok(Err(e)) => {
                                error!(round_id, error = %e, "aggregation failed, flagging round");
                                let _ = self.fail_round(round_id);
                            }
                            Err(join_err) => {
                                error!(round_id, error = %join_err, "aggregation task panicked");
                                let _ = self.fail_round(round_id);
                            }
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("collector trigger loop shutting down");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gatekeeper::OracleConfig;
    use ruth_core::crypto::KeyPair;
    use tempfile::tempdir;

    fn collector_with_quorum(quorum: u64) -> (Collector, KeyPair, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let registry = Arc::new(DeviceRegistry::new(store.clone()));
        let keypair = KeyPair::from_seed(&[4u8; 32]);
        registry.register("device-1", keypair.public_key()).unwrap();
        let gatekeeper = Arc::new(Gatekeeper::new(OracleConfig {
            endpoint: "http://127.0.0.1:1".into(),
            api_key: None,
        }));
        (
            Collector::new(store, registry, gatekeeper, quorum, 0.1, 4),
            keypair,
            dir,
        )
    }

    #[tokio::test]
    async fn test_submit_rejects_unregistered_device() {
        let (collector, _kp, _dir) = collector_with_quorum(2);
        let update = ClientUpdate {
            device_id: "unknown".into(),
            round_id: 1,
            seed_id: 1,
            scalar: 0.1,
            loss: 1.0,
            signature: vec![],
            attestation_token: vec![],
        };
        let err = collector.submit(update).await;
        assert!(matches!(err, Err(ServerError::UnknownDevice(_))));
    }

    #[tokio::test]
    async fn test_submit_rejects_bad_signature() {
        let (collector, _kp, _dir) = collector_with_quorum(2);
        let update = ClientUpdate {
            device_id: "device-1".into(),
            round_id: 1,
            seed_id: 1,
            scalar: 0.1,
            loss: 1.0,
            signature: vec![0u8; 64],
            attestation_token: vec![],
        };
        let outcome = collector.submit(update).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Rejected(_)));
    }

    #[test]
    fn test_try_aggregate_below_quorum_is_noop() {
        let (collector, keypair, _dir) = collector_with_quorum(3);
        let payload = ruth_core::canonical::signing_payload(1, 0.1, 9);
        let update = ClientUpdate {
            device_id: "device-1".into(),
            round_id: 9,
            seed_id: 1,
            scalar: 0.1,
            loss: 1.0,
            signature: keypair.sign(&payload).to_vec(),
            attestation_token: vec![],
        };
        collector.store.append_update(9, &update).unwrap();
        assert!(collector.try_aggregate_round(9).unwrap().is_none());
    }

    #[test]
    fn test_try_aggregate_at_quorum_closes_round() {
        let (collector, keypair, _dir) = collector_with_quorum(2);
        for seed_id in [1u64, 2u64] {
            let payload = ruth_core::canonical::signing_payload(seed_id, 0.1, 5);
            let update = ClientUpdate {
                device_id: "device-1".into(),
                round_id: 5,
                seed_id,
                scalar: 0.1,
                loss: 1.0,
                signature: keypair.sign(&payload).to_vec(),
                attestation_token: vec![],
            };
            collector.store.append_update(5, &update).unwrap();
        }

        let direction = collector.try_aggregate_round(5).unwrap().unwrap();
        assert_eq!(direction.round_id, 5);
        assert_eq!(direction.values.len(), 4);
        assert_eq!(collector.store.get_status(5).unwrap(), RoundStatus::Closed);
        assert_eq!(collector.store.update_count(5).unwrap(), 0);
    }

    // spec.md §8 end-to-end scenario 6: with K=3, two accepted submissions
    // leave the round un-aggregated; the third crosses quorum and triggers
    // aggregation exactly once, after which both keys are gone.
    #[tokio::test]
    async fn test_quorum_edge_aggregates_only_once_the_third_update_lands() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let registry = Arc::new(DeviceRegistry::new(store.clone()));
        let gatekeeper = Arc::new(Gatekeeper::new(OracleConfig {
            endpoint: "http://127.0.0.1:1".into(),
            api_key: None,
        }));
        let collector = Collector::new(store.clone(), registry.clone(), gatekeeper, 3, 0.1, 4);

        let mut submit_one = |seed_id: u64| {
            let keypair = KeyPair::from_seed(&[(30 + seed_id) as u8; 32]);
            let device_id = format!("edge-{seed_id}");
            registry.register(&device_id, keypair.public_key()).unwrap();
            let payload = ruth_core::canonical::signing_payload(seed_id, 0.2, 11);
            ClientUpdate {
                device_id,
                round_id: 11,
                seed_id,
                scalar: 0.2,
                loss: 1.0,
                signature: keypair.sign(&payload).to_vec(),
                attestation_token: vec![],
            }
        };

        collector.submit(submit_one(1)).await.unwrap();
        collector.submit(submit_one(2)).await.unwrap();
        assert!(collector.try_aggregate_round(11).unwrap().is_none());
        assert_eq!(collector.store.get_status(11).unwrap(), RoundStatus::Open);

        collector.submit(submit_one(3)).await.unwrap();
        let direction = collector.try_aggregate_round(11).unwrap();
        assert!(direction.is_some());
        assert_eq!(collector.store.get_status(11).unwrap(), RoundStatus::Closed);
        assert_eq!(collector.store.update_count(11).unwrap(), 0);
        assert!(collector.store.read_updates(11).unwrap().is_empty());

        // A second attempt after close is a no-op (status is no longer Open).
        assert!(collector.try_aggregate_round(11).unwrap().is_none());
    }

    // spec.md §8 end-to-end scenario 1: an honest round of 5 clients with
    // `max_norm = 5.0`, `d = 120` stays within the documented norm bound and
    // every submission is accepted.
    #[tokio::test]
    async fn test_honest_round_keeps_aggregated_norm_bounded() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let registry = Arc::new(DeviceRegistry::new(store.clone()));
        let gatekeeper = Arc::new(Gatekeeper::new(OracleConfig {
            endpoint: "http://127.0.0.1:1".into(),
            api_key: None,
        }));
        let d = 120usize;
        let collector = Collector::new(store.clone(), registry.clone(), gatekeeper, 5, 0.1, d);

        for i in 0..5u64 {
            let keypair = KeyPair::from_seed(&[(10 + i) as u8; 32]);
            let device_id = format!("honest-{i}");
            registry.register(&device_id, keypair.public_key()).unwrap();

            let scalar = 0.5 + (i as f32) * 0.05; // within max_norm=5.0
            let payload = ruth_core::canonical::signing_payload(i + 1, scalar, 1);
            let update = ClientUpdate {
                device_id,
                round_id: 1,
                seed_id: i + 1,
                scalar,
                loss: 1.0,
                signature: keypair.sign(&payload).to_vec(),
                attestation_token: vec![],
            };
            let outcome = collector.submit(update).await.unwrap();
            assert!(matches!(outcome, SubmitOutcome::Accepted { .. }));
        }

        let direction = collector.try_aggregate_round(1).unwrap().unwrap();
        let norm: f32 = direction.values.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!(norm < 100.0, "aggregated norm was {norm}");
    }

    // spec.md §8 end-to-end scenario 2: one Byzantine client multiplies its
    // scalar by 100x; the trimmed-mean aggregate must land closer to the
    // honest clients' mean direction than to the adversary's contribution.
    #[tokio::test]
    async fn test_byzantine_client_does_not_dominate_aggregate() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path()).unwrap());
        let registry = Arc::new(DeviceRegistry::new(store.clone()));
        let gatekeeper = Arc::new(Gatekeeper::new(OracleConfig {
            endpoint: "http://127.0.0.1:1".into(),
            api_key: None,
        }));
        let d = 120usize;
        let collector = Collector::new(store.clone(), registry.clone(), gatekeeper, 5, 0.1, d);

        let honest_scalar = 0.5f32;
        let mut honest_directions = Vec::new();
        let mut adversary_direction = Vec::new();

        for i in 0..5u64 {
            let keypair = KeyPair::from_seed(&[(20 + i) as u8; 32]);
            let device_id = format!("client-{i}");
            registry.register(&device_id, keypair.public_key()).unwrap();

            // device index 4 is the Byzantine client: it multiplies its
            // scalar by 100x before signing and submitting.
            let scalar = if i == 4 { honest_scalar * 100.0 } else { honest_scalar };
            let seed_id = i + 1;
            let payload = ruth_core::canonical::signing_payload(seed_id, scalar, 2);
            let update = ClientUpdate {
                device_id,
                round_id: 2,
                seed_id,
                scalar,
                loss: 1.0,
                signature: keypair.sign(&payload).to_vec(),
                attestation_token: vec![],
            };
            collector.submit(update).await.unwrap();

            let v = crate::aggregator::reconstruct(
                &ClientUpdate {
                    device_id: String::new(),
                    round_id: 2,
                    seed_id,
                    scalar: honest_scalar,
                    loss: 0.0,
                    signature: vec![],
                    attestation_token: vec![],
                },
                d,
            );
            if i == 4 {
                adversary_direction = v.iter().map(|x| x * 100.0).collect();
            } else {
                honest_directions.push(v);
            }
        }

        let honest_mean: Vec<f32> = (0..d)
            .map(|j| honest_directions.iter().map(|v| v[j]).sum::<f32>() / honest_directions.len() as f32)
            .collect();

        let direction = collector.try_aggregate_round(2).unwrap().unwrap();

        let dist = |a: &[f32], b: &[f32]| -> f32 {
            a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum::<f32>().sqrt()
        };

        let dist_to_honest = dist(&direction.values, &honest_mean);
        let dist_to_adversary = dist(&direction.values, &adversary_direction);
        assert!(
            dist_to_honest < dist_to_adversary,
            "dist_to_honest={dist_to_honest} dist_to_adversary={dist_to_adversary}"
        );
    }
}
