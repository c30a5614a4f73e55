//! Health Monitor
//!
//! One background task per process. Every sweep walks the registry, dials peers
//! that have no usable handle, pings every peer and publishes the resulting status.
//! Peers are retried forever; there is no terminal state.

use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::{MissedTickBehavior, interval};
use tracing::info;

use super::handle::PeerClient;
use super::registry::Cluster;
use super::types::{ConnectionStatus, Peer, PeerLink};

pub struct HealthMonitor;

impl HealthMonitor {
    /// Starts the periodic sweep. The first sweep runs at once, and a full
    /// registry can ask for an extra one through `Cluster::wake`.
    pub fn spawn(cluster: Arc<Cluster>) -> tokio::task::JoinHandle<()> {
        let period = cluster.settings.interval;
        info!("Starting health monitor (interval {:?})", period);

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = cluster.wake.notified() => {}
                }
                Self::sweep(&cluster).await;
            }
        })
    }

    /// Pings every registered peer concurrently and recomputes readiness.
    ///
    /// Returns the readiness after the sweep.
    pub async fn sweep(cluster: &Arc<Cluster>) -> bool {
        let mut checks = JoinSet::new();

        for peer in cluster.peers().await {
            let cluster = cluster.clone();
            checks.spawn(async move { Self::check_peer(&cluster, &peer).await });
        }

        while let Some(res) = checks.join_next().await {
            if let Err(e) = res {
                tracing::error!("Health check task failed: {}", e);
            }
        }

        cluster.refresh_readiness().await
    }

    async fn check_peer(cluster: &Cluster, peer: &Peer) {
        let handle = match peer.link().await {
            PeerLink::Live(handle) => handle,
            PeerLink::Absent | PeerLink::Broken => match Self::dial(cluster, peer).await {
                Some(handle) => handle,
                None => {
                    let previous = peer
                        .set_state(ConnectionStatus::Disconnected, PeerLink::Absent)
                        .await;
                    if previous != ConnectionStatus::Disconnected {
                        tracing::warn!("Cannot establish connection with peer {}", peer.address);
                    }
                    return;
                }
            },
        };

        let token = uuid::Uuid::new_v4().to_string();
        let answer = tokio::time::timeout(cluster.settings.ping_timeout, handle.ping(&token)).await;

        let alive = match answer {
            Ok(Ok(echo)) if echo == token => true,
            Ok(Ok(echo)) => {
                tracing::debug!("Peer {} echoed unexpected token {}", peer.address, echo);
                false
            }
            Ok(Err(e)) => {
                tracing::debug!("Ping to {} failed: {}", peer.address, e);
                false
            }
            Err(_) => {
                tracing::debug!("Ping to {} timed out", peer.address);
                false
            }
        };

        if alive {
            let previous = peer
                .set_state(ConnectionStatus::Connected, PeerLink::Live(handle))
                .await;
            match previous {
                ConnectionStatus::Connected => {}
                ConnectionStatus::Disconnected => {
                    info!("Connection with peer {} is restored", peer.address)
                }
                ConnectionStatus::Unknown => info!("Peer {} connected", peer.address),
            }
        } else {
            let previous = peer
                .set_state(ConnectionStatus::Disconnected, PeerLink::Absent)
                .await;
            if previous != ConnectionStatus::Disconnected {
                tracing::warn!("Ping failed with peer {}", peer.address);
            }
        }
    }

    async fn dial(cluster: &Cluster, peer: &Peer) -> Option<Arc<dyn PeerClient>> {
        let dial = tokio::time::timeout(
            cluster.settings.dial_timeout,
            cluster.connector.connect(&peer.address),
        )
        .await;

        match dial {
            Ok(Ok(handle)) => Some(handle),
            Ok(Err(e)) => {
                tracing::debug!("Dial to {} failed: {}", peer.address, e);
                None
            }
            Err(_) => {
                tracing::debug!("Dial to {} timed out", peer.address);
                None
            }
        }
    }
}
