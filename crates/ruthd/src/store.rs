//! Durable sled-backed primitives for round staging and device registration.
//!
//! Adapted from the teacher's `Storage` (per-tree sled wrapper), generalized
//! from fixed event/descriptor/version-vector trees to a round-keyed update
//! log plus a per-round counter, so the collector can append-and-count
//! atomically via a sled transaction spanning both trees (spec.md §4.5).

use crate::error::{Result, ServerError};
use ruth_core::ClientUpdate;
use sled::transaction::{TransactionError, Transactional};
use sled::Db;
use std::path::Path;

fn round_prefix(round_id: u64) -> [u8; 8] {
    round_id.to_be_bytes()
}

fn update_key(round_id: u64, seq: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&round_id.to_be_bytes());
    key[8..].copy_from_slice(&seq.to_be_bytes());
    key
}

/// Durable store for in-flight rounds and the device public-key registry.
pub struct Store {
    db: Db,
    /// `(round_id, seq) -> postcard(ClientUpdate)`, ordered by round then arrival.
    updates: sled::Tree,
    /// `round_id -> u64 count`, kept in sync with `updates` via an atomic transaction.
    counts: sled::Tree,
    /// `round_id -> RoundStatus byte`.
    status: sled::Tree,
    /// `device_id -> public_key bytes`, the registration table.
    devices: sled::Tree,
    /// `device_id -> ban marker (empty value)`.
    banned: sled::Tree,
}

impl Store {
    /// Open (or create) the store rooted at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path)?;
        let updates = db.open_tree("round_updates")?;
        let counts = db.open_tree("round_counts")?;
        let status = db.open_tree("round_status")?;
        let devices = db.open_tree("devices")?;
        let banned = db.open_tree("devices_banned")?;
        Ok(Self {
            db,
            updates,
            counts,
            status,
            devices,
            banned,
        })
    }

    /// Atomically append `update` to round `round_id` and bump its counter.
    /// Returns the post-increment count.
    ///
    /// `updates` and `counts` are separate named `sled::Tree`s, so a plain
    /// `Batch` applied via `self.db.apply_batch` would write to the `Db`'s
    /// default tree instead of either of them — a sled transaction spanning
    /// both trees is what actually makes the append-and-bump atomic.
    pub fn append_update(&self, round_id: u64, update: &ClientUpdate) -> Result<u64> {
        let encoded = postcard::to_allocvec(update)?;
        let prefix = round_prefix(round_id);

        let result = (&self.updates, &self.counts).transaction(|(updates, counts)| {
            let seq = counts.get(&prefix[..])?.map_or(0u64, |v| {
                u64::from_be_bytes(v.as_ref().try_into().unwrap_or([0; 8]))
            });
            let next = seq + 1;
            updates.insert(&update_key(round_id, seq)[..], encoded.clone())?;
            counts.insert(&prefix[..], &next.to_be_bytes())?;
            Ok(next)
        });

        result.map_err(|e: TransactionError<()>| match e {
            TransactionError::Storage(err) => ServerError::Store(err),
            TransactionError::Abort(()) => unreachable!("transaction never aborts intentionally"),
        })
    }

    /// Current count of staged updates for `round_id`.
    pub fn update_count(&self, round_id: u64) -> Result<u64> {
        Ok(self
            .counts
            .get(round_prefix(round_id))?
            .map_or(0, |v| u64::from_be_bytes(v.as_ref().try_into().unwrap_or([0; 8]))))
    }

    /// Read every staged update for `round_id`, in arrival order.
    pub fn read_updates(&self, round_id: u64) -> Result<Vec<ClientUpdate>> {
        let prefix = round_prefix(round_id);
        let mut out = Vec::new();
        for item in self.updates.scan_prefix(prefix) {
            let (_, bytes) = item?;
            out.push(postcard::from_bytes(&bytes)?);
        }
        Ok(out)
    }

    /// Remove a round's staged update entries after a successful aggregation
    /// (spec.md §4.5 step 5). A leftover stale entry here is tolerable
    /// (spec.md §7): callers log a failure rather than retrying it.
    pub fn clear_updates(&self, round_id: u64) -> Result<()> {
        let prefix = round_prefix(round_id);
        for item in self.updates.scan_prefix(prefix) {
            let (key, _) = item?;
            self.updates.remove(key)?;
        }
        Ok(())
    }

    /// Remove a round's counter entry. Unlike `clear_updates`, a stale
    /// counter is not tolerable (spec.md §7: "the counter reset on the next
    /// round id is not, so counter deletion MUST be retried until
    /// success") — callers are responsible for retrying this until it
    /// succeeds rather than giving up on the first error.
    pub fn delete_counter(&self, round_id: u64) -> Result<()> {
        self.counts.remove(&round_prefix(round_id)[..])?;
        Ok(())
    }

    /// Clear both a round's staged updates and its counter in one call.
    /// Does not retry on failure; use `clear_updates`/`delete_counter`
    /// directly where retry-until-success semantics on the counter matter
    /// (see `Collector::try_aggregate_round`).
    pub fn clear_round(&self, round_id: u64) -> Result<()> {
        self.clear_updates(round_id)?;
        self.delete_counter(round_id)
    }

    /// Round IDs currently holding at least one staged update, i.e. the set
    /// worth polling for quorum. Backed by the `counts` tree directly (not
    /// an in-memory cache) so a restarted coordinator rediscovers in-flight
    /// rounds instead of forgetting them (spec.md §9's "held in the durable
    /// store... so a restart does not lose it").
    pub fn open_round_ids(&self) -> Result<Vec<u64>> {
        let mut out = Vec::new();
        for item in self.counts.iter() {
            let (key, _) = item?;
            let round_id = u64::from_be_bytes(key.as_ref().try_into().unwrap_or([0; 8]));
            out.push(round_id);
        }
        Ok(out)
    }

    /// Persist the round's lifecycle status.
    pub fn set_status(&self, round_id: u64, status: ruth_core::RoundStatus) -> Result<()> {
        self.status
            .insert(round_prefix(round_id), status.as_str().as_bytes())?;
        Ok(())
    }

    /// Read back the round's lifecycle status, defaulting to `Open` for a
    /// round never seen before.
    pub fn get_status(&self, round_id: u64) -> Result<ruth_core::RoundStatus> {
        match self.status.get(round_prefix(round_id))? {
            Some(bytes) => {
                let s = std::str::from_utf8(&bytes)
                    .map_err(|e| ServerError::Internal(e.to_string()))?;
                ruth_core::RoundStatus::from_str(s)
                    .ok_or_else(|| ServerError::Internal(format!("corrupt round status: {s}")))
            }
            None => Ok(ruth_core::RoundStatus::Open),
        }
    }

    /// Register a device's public key. Idempotent: re-registering the same
    /// device overwrites its stored key.
    pub fn register_device(&self, device_id: &str, public_key: &[u8; 32]) -> Result<()> {
        self.devices.insert(device_id, public_key)?;
        Ok(())
    }

    /// Look up a device's registered public key.
    pub fn lookup_device(&self, device_id: &str) -> Result<Option<[u8; 32]>> {
        Ok(self
            .devices
            .get(device_id)?
            .and_then(|v| v.as_ref().try_into().ok()))
    }

    /// Ban a device; future lookups still succeed but `is_banned` reports true.
    pub fn ban_device(&self, device_id: &str) -> Result<()> {
        self.banned.insert(device_id, &[])?;
        Ok(())
    }

    /// Whether a device has been banned.
    pub fn is_banned(&self, device_id: &str) -> Result<bool> {
        Ok(self.banned.contains_key(device_id)?)
    }

    /// Number of registered devices.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ruth_core::RoundStatus;
    use tempfile::tempdir;

    fn sample_update(seed_id: u64) -> ClientUpdate {
        ClientUpdate {
            device_id: "device-1".into(),
            round_id: 7,
            seed_id,
            scalar: 0.25,
            loss: 1.0,
            signature: vec![0u8; 64],
            attestation_token: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_append_and_read_updates_in_order() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        store.append_update(7, &sample_update(1)).unwrap();
        store.append_update(7, &sample_update(2)).unwrap();
        store.append_update(7, &sample_update(3)).unwrap();

        let updates = store.read_updates(7).unwrap();
        let seeds: Vec<u64> = updates.iter().map(|u| u.seed_id).collect();
        assert_eq!(seeds, vec![1, 2, 3]);
        assert_eq!(store.update_count(7).unwrap(), 3);
    }

    #[test]
    fn test_rounds_are_isolated_by_id() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        store.append_update(1, &sample_update(10)).unwrap();
        store.append_update(2, &sample_update(20)).unwrap();

        assert_eq!(store.update_count(1).unwrap(), 1);
        assert_eq!(store.update_count(2).unwrap(), 1);
        assert_eq!(store.read_updates(1).unwrap()[0].seed_id, 10);
    }

    #[test]
    fn test_open_round_ids_tracks_rounds_with_staged_updates() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        store.append_update(3, &sample_update(1)).unwrap();
        store.append_update(9, &sample_update(1)).unwrap();

        let mut ids = store.open_round_ids().unwrap();
        ids.sort();
        assert_eq!(ids, vec![3, 9]);

        store.clear_round(3).unwrap();
        assert_eq!(store.open_round_ids().unwrap(), vec![9]);
    }

    #[test]
    fn test_clear_round_removes_updates_and_counter() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        store.append_update(5, &sample_update(1)).unwrap();
        store.append_update(5, &sample_update(2)).unwrap();
        store.clear_round(5).unwrap();

        assert_eq!(store.update_count(5).unwrap(), 0);
        assert!(store.read_updates(5).unwrap().is_empty());
    }

    #[test]
    fn test_status_defaults_to_open() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        assert_eq!(store.get_status(3).unwrap(), RoundStatus::Open);

        store.set_status(3, RoundStatus::Aggregating).unwrap();
        assert_eq!(store.get_status(3).unwrap(), RoundStatus::Aggregating);
    }

    #[test]
    fn test_device_registration_and_ban() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let pk = [9u8; 32];
        store.register_device("device-1", &pk).unwrap();
        assert_eq!(store.lookup_device("device-1").unwrap(), Some(pk));
        assert!(!store.is_banned("device-1").unwrap());

        store.ban_device("device-1").unwrap();
        assert!(store.is_banned("device-1").unwrap());
        // Banning does not remove the registration itself.
        assert_eq!(store.lookup_device("device-1").unwrap(), Some(pk));
    }

    #[test]
    fn test_unknown_device_lookup_is_none() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        assert_eq!(store.lookup_device("ghost").unwrap(), None);
    }
}
