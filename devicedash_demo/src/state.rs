//! Shared server state: the store and the device-update fan-out.

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use devicedash::types::Device;
use tokio::sync::{broadcast, RwLock};

use crate::store::Store;

pub type SharedStore = Arc<RwLock<Store>>;

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,

    // Every device change (mutations and sampler ticks) is published here;
    // each subscription socket holds a receiver.
    pub updates: broadcast::Sender<Device>,

    // Open subscription sockets
    pub client_count: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        let (updates, _) = broadcast::channel(256);
        Self {
            store: Arc::new(RwLock::new(store)),
            updates,
            client_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publish a change. No subscribers is not an error.
    pub fn publish(&self, device: Device) {
        let _ = self.updates.send(device);
    }
}

pub fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
