//! Cluster Membership & Health Module
//!
//! Tracks the fixed-size set of storage peers the master stripes over.
//!
//! ## Core Mechanisms
//! - **Registration**: peers announce themselves once they are serving. The registry is
//!   bounded by the configured cluster size; registration order is stripe order.
//! - **Readiness**: the cluster only serves data operations once it is full and every
//!   peer answers pings.
//! - **Health Monitor**: a periodic sweep dials peers lazily, pings them, and drops
//!   handles that stop answering so the next tick dials again.
//! - **Peer Handles**: `PeerClient` is the seam between coordination logic and the wire.

pub mod handle;
pub mod monitor;
pub mod registry;
pub mod types;

pub use handle::{HttpConnector, PeerClient, PeerConnector};
pub use monitor::HealthMonitor;
pub use registry::Cluster;
pub use types::{ConnectionStatus, HealthSettings, Peer, PeerInfo, PeerLink, Registration};

#[cfg(test)]
pub(crate) mod testing;
