//! Typed error kinds shared by the manager, node, and client. The teacher
//! reaches for `tonic::Status` because gRPC forces it; without gRPC,
//! `thiserror` is the idiomatic choice.

use thiserror::Error;

/// Errors surfaced by the manager's client-facing API.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("no active nodes available")]
    NoNodesAvailable,

    #[error("file '{0}' not found")]
    NotFound(String),
}

/// Errors surfaced by the client library.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no active nodes available for upload")]
    NoNodesAvailable,

    #[error("file '{0}' not found")]
    NotFound(String),

    #[error("integrity mismatch on chunk {chunk_index} of '{filename}'")]
    IntegrityMismatch { filename: String, chunk_index: u64 },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed chunk header: {0}")]
    MalformedHeader(String),

    #[error("manager returned an error: {0}")]
    Manager(String),
}

/// Errors surfaced by a storage node's local disk and bus operations. Maps
/// to HTTP 5xx at the axum handler boundary.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("chunk '{0}' not found")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed chunk header: {0}")]
    MalformedHeader(String),
}
