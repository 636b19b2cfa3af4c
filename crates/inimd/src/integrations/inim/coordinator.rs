use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::debug;
use tracing::warn;

use super::client::CloudApi;
use super::client::CloudError;
use super::models::DeviceSnapshot;

/// Pull-based refresh coordinator for the cloud device snapshot.
///
/// The coordinator owns the only copy of the device data. Each refresh
/// replaces the whole snapshot; readers load an `Arc` and never observe a
/// partial update. There is no retry or backoff here - a failed refresh
/// keeps the previous snapshot and the next poll corrects it.
pub struct Coordinator {
    api: Arc<dyn CloudApi>,
    devices: ArcSwap<Vec<DeviceSnapshot>>,
}

impl Coordinator {
    pub fn new(api: Arc<dyn CloudApi>) -> Self {
        Self {
            api,
            devices: ArcSwap::new(Arc::default()),
        }
    }

    /// Get the latest device snapshot.
    ///
    /// Clones the `Arc` (atomic refcount bump), essentially free.
    pub fn snapshot(&self) -> Arc<Vec<DeviceSnapshot>> {
        self.devices.load_full()
    }

    /// Find a device by id in the latest snapshot.
    pub fn find_device(&self, device_id: &str) -> Option<DeviceSnapshot> {
        self.snapshot().iter().find(|d| d.id == device_id).cloned()
    }

    /// Fetch a fresh snapshot and replace the current one wholesale.
    pub async fn refresh(&self) -> Result<(), CloudError> {
        let devices = self.api.fetch_devices().await?;
        debug!("Refreshed snapshot with {} devices", devices.len());
        self.devices.store(Arc::new(devices));
        Ok(())
    }

    /// Refresh, absorbing any error.
    ///
    /// Used after command dispatch and from the poll loop, where a failure
    /// must not propagate: the stale snapshot stays in place until a later
    /// refresh succeeds.
    pub async fn request_refresh(&self) {
        if let Err(e) = self.refresh().await {
            warn!("Device snapshot refresh failed: {}", e);
        }
    }
}
