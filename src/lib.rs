//! Record-Striped Distributed File Store Library
//!
//! This library crate defines the modules shared by the `master`, `peer` and `dfs`
//! binaries.
//!
//! ## Architecture Modules
//! - **`cluster`**: The peer registry, the peer handle seam and the health monitor.
//!   Membership is fixed-size and ordered; the monitor keeps connection state fresh.
//! - **`stripe`**: Record layout and the stripe coordinator, which splits file
//!   requests into per-record peer calls and aggregates the results.
//! - **`master`**: The coordinator facade and its HTTP contract.
//! - **`peer`**: The storage node: a local record store served over HTTP.
//! - **`client`**: A typed client for the master's contract.
//! - **`config`**: CLI arguments, validated runtime configuration and logging setup.
//! - **`error`**: The error taxonomy shared by every component.

pub mod client;
pub mod cluster;
pub mod config;
pub mod error;
pub mod master;
pub mod peer;
pub mod stripe;
