use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Notify, RwLock};
use tracing::info;

use super::handle::{PeerClient, PeerConnector};
use super::monitor::HealthMonitor;
use super::types::{ConnectionStatus, HealthSettings, Peer, PeerInfo, Registration};
use crate::error::{DfsError, Result};

/// The peer registry.
///
/// Holds the ordered peer list (registration order is stripe order), the configured
/// cluster size and the readiness flag. Only the health monitor sets `ready`, and
/// only to "the list is full and every peer is connected". A freshly registered
/// peer is `Unknown`, so registration alone never makes the cluster ready.
pub struct Cluster {
    target_size: usize,
    peers: RwLock<Vec<Arc<Peer>>>,
    ready: AtomicBool,
    monitor_started: AtomicBool,
    /// Asks the monitor for a sweep ahead of its next tick.
    pub(crate) wake: Notify,
    pub(crate) connector: Arc<dyn PeerConnector>,
    pub(crate) settings: HealthSettings,
}

impl Cluster {
    pub fn new(
        target_size: usize,
        connector: Arc<dyn PeerConnector>,
        settings: HealthSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            target_size,
            peers: RwLock::new(Vec::with_capacity(target_size)),
            ready: AtomicBool::new(false),
            monitor_started: AtomicBool::new(false),
            wake: Notify::new(),
            connector,
            settings,
        })
    }

    pub fn target_size(&self) -> usize {
        self.target_size
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    /// Adds a peer. Re-registering a known address is a successful no-op.
    ///
    /// The first successful registration starts the health monitor. The one that
    /// fills the cluster wakes it, so the new peers are checked right away.
    pub async fn register(self: &Arc<Self>, address: &str) -> Result<Registration> {
        let address = address.trim();
        if address.is_empty() {
            return Err(DfsError::InvalidAddress {
                address: address.to_string(),
            });
        }

        let registered = {
            let mut peers = self.peers.write().await;

            if peers.iter().any(|peer| peer.address == address) {
                tracing::debug!("Peer {} registered again, ignoring", address);
                return Ok(Registration::AlreadyKnown);
            }

            if peers.len() >= self.target_size {
                tracing::warn!(
                    "Rejecting peer {}: cluster already has {} peers",
                    address,
                    peers.len()
                );
                return Err(DfsError::ClusterFull {
                    target: self.target_size,
                });
            }

            peers.push(Arc::new(Peer::new(address.to_string())));
            peers.len()
        };

        info!(
            "Peer {} registered; peers: {}/{}",
            address, registered, self.target_size
        );

        self.start_monitor();

        if registered == self.target_size {
            info!("Needed number of peers registered, waiting for them to connect");
            self.wake.notify_one();
        }

        Ok(Registration::Added { registered })
    }

    /// A registry whose monitor never runs; tests drive `HealthMonitor::sweep`.
    #[cfg(test)]
    pub(crate) fn unmonitored(
        target_size: usize,
        connector: Arc<dyn PeerConnector>,
        settings: HealthSettings,
    ) -> Arc<Self> {
        let cluster = Self::new(target_size, connector, settings);
        cluster.monitor_started.store(true, Ordering::Release);
        cluster
    }

    fn start_monitor(self: &Arc<Self>) {
        if self
            .monitor_started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            HealthMonitor::spawn(self.clone());
        }
    }

    /// Copy of the peer list; the `Arc`s stay valid while the monitor mutates state.
    pub async fn peers(&self) -> Vec<Arc<Peer>> {
        self.peers.read().await.clone()
    }

    pub async fn peer_at(&self, index: usize) -> Option<Arc<Peer>> {
        self.peers.read().await.get(index).cloned()
    }

    pub async fn snapshot(&self) -> Vec<PeerInfo> {
        let peers = self.peers().await;
        let mut infos = Vec::with_capacity(peers.len());
        for peer in peers {
            infos.push(peer.info().await);
        }
        infos
    }

    /// Recomputes readiness from the current peer list.
    pub(crate) async fn refresh_readiness(&self) -> bool {
        let peers = self.peers().await;
        let mut ready = peers.len() == self.target_size;
        for peer in &peers {
            if peer.status().await != ConnectionStatus::Connected {
                ready = false;
                break;
            }
        }

        let was_ready = self.ready.swap(ready, Ordering::AcqRel);
        if was_ready != ready {
            if ready {
                info!("All {} peers connected, cluster is ready", self.target_size);
            } else {
                tracing::warn!("Cluster is no longer ready");
            }
        }
        ready
    }

    /// Called by data operations whose call through `failed` broke at the transport
    /// level.
    pub async fn report_failure(&self, failed: &Arc<dyn PeerClient>) {
        let address = failed.address();
        let peer = {
            let peers = self.peers.read().await;
            peers.iter().find(|peer| peer.address == address).cloned()
        };

        if let Some(peer) = peer
            && peer.mark_broken(failed).await
        {
            tracing::debug!("Handle of peer {} marked broken", address);
        }
    }

    /// Tells every connected peer to stop. Failures are logged, never fatal.
    ///
    /// Returns how many peers acknowledged.
    pub async fn shutdown(&self) -> usize {
        let mut stopped = 0;
        for peer in self.peers().await {
            let Some(handle) = peer.live_handle().await else {
                continue;
            };

            info!("Sending shutdown command to {}", peer.address);
            match handle.shutdown().await {
                Ok(()) => stopped += 1,
                Err(e) => tracing::warn!("Failed to shut down peer {}: {}", peer.address, e),
            }
        }
        stopped
    }
}
