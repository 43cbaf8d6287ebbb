//! Device and connection registries shared by every dispatch task

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;

use crate::core::bluetooth::radio::RadioAdapter;
use crate::core::bluetooth::types::{ConnectionRecord, DeviceRecord};

/// Map of normalized addresses to discovered vehicles
pub struct DeviceRegistry<P> {
    devices: Mutex<HashMap<String, DeviceRecord<P>>>,
}

impl<P: Clone> DeviceRegistry<P> {
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(HashMap::new()),
        }
    }

    /// Inserts or overwrites the record for its address, returning the previous one
    pub async fn upsert(&self, record: DeviceRecord<P>) -> Option<DeviceRecord<P>> {
        self.devices
            .lock()
            .await
            .insert(record.address.clone(), record)
    }

    /// Replaces the whole registry. Records whose address is in `keep` survive
    /// unless `records` carries a newer one.
    pub async fn replace_all(&self, records: Vec<DeviceRecord<P>>, keep: &HashSet<String>) {
        let mut devices = self.devices.lock().await;
        devices.retain(|address, _| keep.contains(address));
        for record in records {
            devices.insert(record.address.clone(), record);
        }
    }

    pub async fn get(&self, address: &str) -> Option<DeviceRecord<P>> {
        self.devices.lock().await.get(address).cloned()
    }

    pub async fn len(&self) -> usize {
        self.devices.lock().await.len()
    }
}

impl<P: Clone> Default for DeviceRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Map of normalized addresses to live connections and their capability pairs
pub struct ConnectionRegistry<R: RadioAdapter> {
    connections: Mutex<HashMap<String, Arc<ConnectionRecord<R>>>>,
    next_id: AtomicU64,
}

impl<R: RadioAdapter> ConnectionRegistry<R> {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Stores the record, returning the one it replaced
    pub async fn insert(&self, record: Arc<ConnectionRecord<R>>) -> Option<Arc<ConnectionRecord<R>>> {
        self.connections
            .lock()
            .await
            .insert(record.address.clone(), record)
    }

    pub async fn get(&self, address: &str) -> Option<Arc<ConnectionRecord<R>>> {
        self.connections.lock().await.get(address).cloned()
    }

    /// Removes the record only if it is still connection `id`
    pub async fn remove_if_current(&self, address: &str, id: u64) -> bool {
        let mut connections = self.connections.lock().await;
        match connections.get(address) {
            Some(record) if record.id == id => {
                connections.remove(address);
                true
            }
            _ => false,
        }
    }

    pub async fn addresses(&self) -> HashSet<String> {
        self.connections.lock().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }
}

impl<R: RadioAdapter> Default for ConnectionRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}
