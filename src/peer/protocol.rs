//! Peer Network Protocol
//!
//! Endpoints and DTOs of the per-peer contract. The master's `HttpPeerClient` speaks
//! this protocol; the peer's `handlers` serve it.
//!
//! Control calls carry small JSON bodies. Record data travels as raw
//! `application/octet-stream` bodies with the file name and offset in the query string.

use serde::{Deserialize, Serialize};

// --- API Endpoints ---

/// Liveness check; the peer echoes the token back.
pub const ENDPOINT_PING: &str = "/peer/ping";
/// Asks the peer to stop serving.
pub const ENDPOINT_SHUTDOWN: &str = "/peer/shutdown";
pub const ENDPOINT_EXISTS: &str = "/peer/exists";
pub const ENDPOINT_CREATE: &str = "/peer/create";
/// Removing a file that does not exist is not an error.
pub const ENDPOINT_DELETE: &str = "/peer/delete";
/// `GET ?filename&offset&count`, answers with exactly `count` bytes.
pub const ENDPOINT_READ: &str = "/peer/read";
/// `POST ?filename&offset` with the bytes as body; extends the file as needed.
pub const ENDPOINT_WRITE: &str = "/peer/write";

// --- Data Transfer Objects ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PingMessage {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerFileRequest {
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerExistsResponse {
    pub exists: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerAckResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerReadQuery {
    pub filename: String,
    pub offset: u64,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerWriteQuery {
    pub filename: String,
    pub offset: u64,
}
