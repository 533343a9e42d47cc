//! Device public-key registry (spec.md §4.4 supplement).
//!
//! Adapted from the teacher's `MembershipManager`: same admit/ban/stats
//! shape, narrowed from world-phrase peer admission to per-device public-key
//! registration, and backed by the durable store instead of an in-memory
//! `RwLock<HashMap>` alone, since a restarted coordinator must not forget
//! which devices it already knows about.

use crate::error::Result;
use crate::store::Store;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory public-key cache over the durable `Store`, mirroring the
/// teacher's read-mostly membership table.
pub struct DeviceRegistry {
    store: Arc<Store>,
    cache: RwLock<HashMap<String, [u8; 32]>>,
}

impl DeviceRegistry {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Register (or re-register) a device's public key, durably.
    pub fn register(&self, device_id: &str, public_key: [u8; 32]) -> Result<()> {
        self.store.register_device(device_id, &public_key)?;
        self.cache.write().insert(device_id.to_string(), public_key);
        Ok(())
    }

    /// Look up a device's public key, checking the cache before the store.
    pub fn lookup(&self, device_id: &str) -> Result<Option<[u8; 32]>> {
        if let Some(key) = self.cache.read().get(device_id) {
            return Ok(Some(*key));
        }
        let found = self.store.lookup_device(device_id)?;
        if let Some(key) = found {
            self.cache.write().insert(device_id.to_string(), key);
        }
        Ok(found)
    }

    /// Verify the device is both registered and not banned, returning its
    /// public key. This is the gate ruthd's server calls before handing an
    /// update to the gatekeeper.
    pub fn check_authorized(&self, device_id: &str) -> Result<[u8; 32]> {
        if self.store.is_banned(device_id)? {
            return Err(crate::error::ServerError::Rejected(
                crate::error::RejectReason::SignatureFail,
            ));
        }
        match self.lookup(device_id)? {
            Some(key) => Ok(key),
            None => Err(crate::error::ServerError::UnknownDevice(device_id.to_string())),
        }
    }

    /// Ban a device; its registration remains but future submissions are rejected.
    pub fn ban(&self, device_id: &str) -> Result<()> {
        self.store.ban_device(device_id)
    }

    pub fn is_banned(&self, device_id: &str) -> Result<bool> {
        self.store.is_banned(device_id)
    }

    pub fn device_count(&self) -> usize {
        self.store.device_count()
    }
}
