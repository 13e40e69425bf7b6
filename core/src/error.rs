//! Error types for the kernel API client core.
//!
//! # Design
//! `Remote` is the only variant carrying information from the server side: the
//! envelope decoded cleanly but reported a nonzero `code`. `InvalidArgument` is
//! raised before a request is ever built. Non-2xx responses whose body is not
//! an envelope land in `HttpError` with the raw status and body for debugging.

use thiserror::Error;

/// Errors returned by `SiyuanClient` build and parse methods.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A precondition on the call's arguments failed; no request was built.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The server answered with a non-2xx status and a body that is not an
    /// envelope.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// The envelope decoded but `code != 0`. `msg` is the server's reason.
    #[error("{msg}")]
    Remote { code: i64, msg: String },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),
}

impl ApiError {
    /// The server's message when this is a `Remote` error.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            ApiError::Remote { msg, .. } => Some(msg),
            _ => None,
        }
    }
}
