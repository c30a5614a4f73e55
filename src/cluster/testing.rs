//! In-memory peers for exercising the registry, the monitor and the coordinator
//! without sockets.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::handle::{PeerClient, PeerConnector};
use super::monitor::HealthMonitor;
use super::registry::Cluster;
use super::types::HealthSettings;
use crate::error::{DfsError, Result};

/// A storage node whose files live in a map.
pub struct MemoryPeer {
    pub address: String,
    pub files: DashMap<String, Vec<u8>>,
    pub online: AtomicBool,
    pub fail_ops: AtomicBool,
    /// `(filename, offset, len)` of every write received, in arrival order.
    pub writes: Mutex<Vec<(String, u64, usize)>>,
    pub shutdowns: AtomicUsize,
    pub delay: Mutex<Option<Duration>>,
}

impl MemoryPeer {
    pub fn new(address: &str) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_string(),
            files: DashMap::new(),
            online: AtomicBool::new(true),
            fail_ops: AtomicBool::new(false),
            writes: Mutex::new(Vec::new()),
            shutdowns: AtomicUsize::new(0),
            delay: Mutex::new(None),
        })
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn recorded_writes(&self) -> Vec<(String, u64, usize)> {
        self.writes.lock().unwrap().clone()
    }

    async fn gate(&self) -> Result<()> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if !self.online.load(Ordering::SeqCst) {
            return Err(DfsError::transport(&self.address, "connection refused"));
        }
        if self.fail_ops.load(Ordering::SeqCst) {
            return Err(DfsError::Peer {
                address: self.address.clone(),
                message: "disk full".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PeerClient for MemoryPeer {
    fn address(&self) -> &str {
        &self.address
    }

    async fn ping(&self, token: &str) -> Result<String> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(DfsError::transport(&self.address, "connection refused"));
        }
        Ok(token.to_string())
    }

    async fn shutdown(&self) -> Result<()> {
        self.gate().await?;
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn file_exists(&self, filename: &str) -> Result<bool> {
        self.gate().await?;
        Ok(self.files.contains_key(filename))
    }

    async fn create_file(&self, filename: &str) -> Result<()> {
        self.gate().await?;
        self.files.insert(filename.to_string(), Vec::new());
        Ok(())
    }

    async fn delete_file(&self, filename: &str) -> Result<()> {
        self.gate().await?;
        self.files.remove(filename);
        Ok(())
    }

    async fn read_bytes(&self, filename: &str, offset: u64, count: u64) -> Result<Vec<u8>> {
        self.gate().await?;
        let file = self.files.get(filename).ok_or_else(|| DfsError::NotFound {
            name: filename.to_string(),
        })?;
        let start = offset as usize;
        let end = start + count as usize;
        if file.len() < end {
            return Err(DfsError::Peer {
                address: self.address.clone(),
                message: format!("file '{}' is too short", filename),
            });
        }
        Ok(file[start..end].to_vec())
    }

    async fn write_bytes(&self, filename: &str, offset: u64, data: Vec<u8>) -> Result<()> {
        self.gate().await?;
        self.writes
            .lock()
            .unwrap()
            .push((filename.to_string(), offset, data.len()));

        let mut file = self.files.entry(filename.to_string()).or_default();
        let start = offset as usize;
        let end = start + data.len();
        if file.len() < end {
            file.resize(end, 0);
        }
        file[start..end].copy_from_slice(&data);
        Ok(())
    }
}

/// Hands out `MemoryPeer`s by address and counts dials.
#[derive(Default)]
pub struct MemoryConnector {
    pub peers: DashMap<String, Arc<MemoryPeer>>,
    pub dials: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add(&self, address: &str) -> Arc<MemoryPeer> {
        let peer = MemoryPeer::new(address);
        self.peers.insert(address.to_string(), peer.clone());
        peer
    }

    pub fn peer(&self, address: &str) -> Arc<MemoryPeer> {
        self.peers
            .get(address)
            .map(|entry| entry.value().clone())
            .expect("unknown test peer")
    }

    pub fn dial_count(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PeerConnector for MemoryConnector {
    async fn connect(&self, address: &str) -> Result<Arc<dyn PeerClient>> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        match self.peers.get(address) {
            Some(peer) if peer.online.load(Ordering::SeqCst) => {
                Ok(peer.value().clone() as Arc<dyn PeerClient>)
            }
            _ => Err(DfsError::transport(address, "connection refused")),
        }
    }
}

/// Short timeouts and a long interval, for clusters whose sweeps tests run by hand.
pub fn manual_settings() -> HealthSettings {
    HealthSettings {
        interval: Duration::from_secs(3600),
        dial_timeout: Duration::from_millis(200),
        ping_timeout: Duration::from_millis(200),
    }
}

pub fn peer_address(index: usize) -> String {
    format!("10.0.0.{}:5002", index + 1)
}

/// An empty registry without a background monitor.
pub fn manual_cluster(size: usize, connector: &Arc<MemoryConnector>) -> Arc<Cluster> {
    Cluster::unmonitored(size, connector.clone(), manual_settings())
}

/// A cluster of `size` in-memory peers, registered and swept once.
pub async fn connected_cluster(size: usize) -> (Arc<Cluster>, Arc<MemoryConnector>) {
    let connector = MemoryConnector::new();
    let cluster = manual_cluster(size, &connector);

    for index in 0..size {
        let address = peer_address(index);
        connector.add(&address);
        cluster.register(&address).await.unwrap();
    }

    assert!(HealthMonitor::sweep(&cluster).await);
    (cluster, connector)
}

/// Reports a transport failure on the handle peer `index` is using right now.
pub async fn break_link(cluster: &Cluster, index: usize) {
    let peer = cluster.peer_at(index).await.expect("unknown peer index");
    let handle = peer.live_handle().await.expect("peer has no live handle");
    cluster.report_failure(&handle).await;
}
