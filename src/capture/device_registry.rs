//! DeviceRegistry - per-device capture exclusivity
//!
//! ## Purpose
//!
//! - At most one live capture per camera device
//! - A second session on the same device is told `DeviceBusy` immediately
//! - The lease is released when dropped

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

/// DeviceRegistry - serializes capture access per device
pub struct DeviceRegistry {
    /// Lock per device id
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Try to take the device (no waiting)
    ///
    /// Returns `None` when another session holds it.
    pub async fn try_acquire(&self, device_id: &str) -> Option<DeviceLease> {
        let lock = self.get_or_create_lock(device_id).await;

        match lock.try_lock_owned() {
            Ok(guard) => {
                tracing::debug!(device_id = %device_id, "Capture device leased");
                Some(DeviceLease {
                    device_id: device_id.to_string(),
                    _guard: guard,
                })
            }
            Err(_) => {
                tracing::debug!(device_id = %device_id, "Capture device busy");
                None
            }
        }
    }

    /// Whether a lease is currently held on the device
    pub async fn is_leased(&self, device_id: &str) -> bool {
        let locks = self.locks.read().await;
        locks
            .get(device_id)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }

    async fn get_or_create_lock(&self, device_id: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(device_id) {
                return lock.clone();
            }
        }

        let mut locks = self.locks.write().await;
        locks
            .entry(device_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Device lease - released on drop
pub struct DeviceLease {
    device_id: String,
    _guard: OwnedMutexGuard<()>,
}

impl DeviceLease {
    pub fn device_id(&self) -> &str {
        &self.device_id
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        tracing::debug!(device_id = %self.device_id, "Capture device lease released");
    }
}
