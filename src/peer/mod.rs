//! Peer Storage Module
//!
//! The storage node side of the system. A peer keeps one sparse local file per
//! logical file and serves the per-peer contract over HTTP: a liveness ping, a
//! shutdown command, and whole-file plus byte-range operations at absolute offsets.
//! It has no knowledge of striping; the master decides which records it receives.

pub mod handlers;
pub mod protocol;
pub mod service;
pub mod store;

pub use service::{PeerService, register_with_master};
pub use store::LocalStore;
