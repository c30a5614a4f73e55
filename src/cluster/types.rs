use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::handle::PeerClient;

pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Unknown,
    Connected,
    Disconnected,
}

/// Transport handle of a peer.
///
/// - `Absent`: never dialed, or dropped after a failed ping.
/// - `Live`: dialed and answering pings.
/// - `Broken`: a data operation hit a transport failure on this handle; the health
///   monitor discards it and dials again on its next tick.
#[derive(Clone, Default)]
pub enum PeerLink {
    #[default]
    Absent,
    Live(Arc<dyn PeerClient>),
    Broken,
}

impl PeerLink {
    /// Whether the link is live through this very handle, not merely one to the
    /// same address.
    pub fn is_live_through(&self, handle: &Arc<dyn PeerClient>) -> bool {
        matches!(self, PeerLink::Live(current) if Arc::ptr_eq(current, handle))
    }
}

impl std::fmt::Debug for PeerLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerLink::Absent => f.write_str("Absent"),
            PeerLink::Live(handle) => write!(f, "Live({})", handle.address()),
            PeerLink::Broken => f.write_str("Broken"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PeerState {
    pub status: ConnectionStatus,
    pub link: PeerLink,
}

/// One registered storage node.
///
/// `address` never changes; `state` is written by the health monitor and read by
/// every request that needs to dispatch to this peer.
#[derive(Debug)]
pub struct Peer {
    pub address: String,
    state: RwLock<PeerState>,
}

impl Peer {
    pub fn new(address: String) -> Self {
        Self {
            address,
            state: RwLock::new(PeerState::default()),
        }
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.state.read().await.status
    }

    pub async fn link(&self) -> PeerLink {
        self.state.read().await.link.clone()
    }

    /// The handle to dispatch on, if the peer is connected right now.
    pub async fn live_handle(&self) -> Option<Arc<dyn PeerClient>> {
        let state = self.state.read().await;
        match (&state.status, &state.link) {
            (ConnectionStatus::Connected, PeerLink::Live(handle)) => Some(handle.clone()),
            _ => None,
        }
    }

    /// Publishes a health check outcome. Returns the previous status.
    pub(crate) async fn set_state(
        &self,
        status: ConnectionStatus,
        link: PeerLink,
    ) -> ConnectionStatus {
        let mut state = self.state.write().await;
        let previous = state.status;
        state.status = status;
        state.link = link;
        previous
    }

    /// Marks the link broken if `failed` is still the live handle. A handle that
    /// has already been replaced by a redial is left alone. Status is left for the
    /// monitor to reconcile.
    pub(crate) async fn mark_broken(&self, failed: &Arc<dyn PeerClient>) -> bool {
        let mut state = self.state.write().await;
        if !state.link.is_live_through(failed) {
            return false;
        }
        state.link = PeerLink::Broken;
        true
    }

    pub async fn info(&self) -> PeerInfo {
        PeerInfo {
            address: self.address.clone(),
            status: self.status().await,
        }
    }
}

/// Read-only view of a peer, as reported by `/status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeerInfo {
    pub address: String,
    pub status: ConnectionStatus,
}

/// Outcome of a registration call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added { registered: usize },
    AlreadyKnown,
}

/// Timing knobs for the health monitor.
#[derive(Debug, Clone, Copy)]
pub struct HealthSettings {
    pub interval: Duration,
    pub dial_timeout: Duration,
    pub ping_timeout: Duration,
}

impl Default for HealthSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_HEALTH_INTERVAL,
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            ping_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }
}
