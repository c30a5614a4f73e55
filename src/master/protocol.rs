//! Master Network Protocol
//!
//! Endpoints and DTOs of the master-facing contract used by clients and by peers
//! announcing themselves. Offsets and counts are `i32` on the wire; negative values
//! are rejected by the master.

use serde::{Deserialize, Serialize};

use crate::cluster::PeerInfo;
use crate::stripe::RecordSizes;

// --- API Endpoints ---

pub const ENDPOINT_INIT_MAPPING: &str = "/init_mapping";
/// `POST ?filename&offset` with the bytes as body.
pub const ENDPOINT_WRITE: &str = "/write";
/// `GET ?filename&offset&count`, answers with the bytes.
pub const ENDPOINT_READ: &str = "/read";
pub const ENDPOINT_CREATE: &str = "/create";
pub const ENDPOINT_DELETE: &str = "/delete";
pub const ENDPOINT_EXISTS: &str = "/exists";
/// Called by peers once they are serving.
pub const ENDPOINT_REGISTER: &str = "/register";
pub const ENDPOINT_STATUS: &str = "/status";

// --- Data Transfer Objects ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitMappingRequest {
    pub records: RecordSizes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRequest {
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterResponse {
    /// False when the address was already a member.
    pub added: bool,
    pub registered: usize,
    pub ready: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadQuery {
    pub filename: String,
    pub offset: i32,
    pub count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteQuery {
    pub filename: String,
    pub offset: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub target_size: usize,
    pub ready: bool,
    pub record_map_set: bool,
    /// Members in stripe order.
    pub peers: Vec<PeerInfo>,
}
