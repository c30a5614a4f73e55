//! Error taxonomy shared by the master, the peers and the client.
//!
//! Every operation surfaces exactly one `DfsError`. The enum is serializable so a
//! failure raised on the master can travel over HTTP and be rebuilt verbatim by
//! `DfsClient`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DfsError>;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DfsError {
    /// Membership is incomplete or some peer is not connected.
    #[error("cluster is not ready: waiting for all peers to register and connect")]
    NotReady,

    /// Read or write attempted before `InitMapping`.
    #[error("record size mapping has not been initialised")]
    RecordMapUnset,

    #[error("no record size configured for file '{filename}'")]
    UnknownRecordSize { filename: String },

    #[error("invalid record size {size} for file '{filename}'")]
    InvalidRecordSize { filename: String, size: u32 },

    /// Payload length, count or offset does not fit the record layout.
    #[error("misaligned request: {reason}")]
    Misaligned { reason: String },

    /// The request spans more bytes than one call may move.
    #[error("request of {size} bytes exceeds the {limit} byte limit")]
    RequestTooLarge { size: u64, limit: u64 },

    #[error("peer {address} is unavailable")]
    PeerUnavailable { address: String },

    #[error("cluster already holds {target} peers")]
    ClusterFull { target: usize },

    #[error("invalid peer address '{address}'")]
    InvalidAddress { address: String },

    #[error("invalid filename '{name}': {reason}")]
    InvalidFilename { name: String, reason: String },

    #[error("file '{name}' not found")]
    NotFound { name: String },

    #[error("short read from {address}: wanted {wanted} bytes, got {got}")]
    ShortRead {
        address: String,
        wanted: usize,
        got: usize,
    },

    /// The peer answered, but reported a failure.
    #[error("peer {address} failed: {message}")]
    Peer { address: String, message: String },

    /// The peer could not be reached or did not answer in time.
    #[error("transport error talking to {address}: {message}")]
    Transport { address: String, message: String },

    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl DfsError {
    pub fn misaligned(reason: impl Into<String>) -> Self {
        Self::Misaligned {
            reason: reason.into(),
        }
    }

    pub fn transport(address: &str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            address: address.to_string(),
            message: err.to_string(),
        }
    }

    /// Transport failures mean the peer's handle should no longer be trusted.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotReady | Self::PeerUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::RecordMapUnset => StatusCode::PRECONDITION_FAILED,
            Self::ClusterFull { .. } => StatusCode::CONFLICT,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::RequestTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnknownRecordSize { .. }
            | Self::InvalidRecordSize { .. }
            | Self::Misaligned { .. }
            | Self::InvalidAddress { .. }
            | Self::InvalidFilename { .. } => StatusCode::BAD_REQUEST,
            Self::ShortRead { .. } | Self::Peer { .. } | Self::Transport { .. } => {
                StatusCode::BAD_GATEWAY
            }
            Self::Io { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<std::io::Error> for DfsError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

impl From<tokio::task::JoinError> for DfsError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal {
            message: format!("fan-out task failed: {}", err),
        }
    }
}

/// Wire form of a failed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: DfsError,
    /// Human readable rendering of `error`.
    pub message: String,
}

impl From<DfsError> for ErrorBody {
    fn from(error: DfsError) -> Self {
        let message = error.to_string();
        Self { error, message }
    }
}

impl IntoResponse for DfsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }
        (status, Json(ErrorBody::from(self))).into_response()
    }
}
