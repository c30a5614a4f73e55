//! Master Module
//!
//! The externally addressable entry point of the cluster. `Master` owns the peer
//! registry and the stripe coordinator, checks readiness and input ranges, then
//! delegates. Clients and registering peers reach it over the HTTP contract in
//! `protocol`.

pub mod handlers;
pub mod protocol;
pub mod service;

pub use service::Master;

#[cfg(test)]
mod tests;
