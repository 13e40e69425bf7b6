//! Errors surfaced by the async session.
//!
//! Nothing is retried or recovered here: every failure reaches the caller as
//! the most specific variant below.

use siyuan_core::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Raised by the protocol core: an argument check before any I/O, a body
    /// that does not decode, or a failure envelope passed through
    /// `ApiResponse::into_data`.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Connection refused, DNS failure, timeout, or a body that could not be
    /// read.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The session was closed; no request was sent.
    #[error("session is closed")]
    SessionClosed,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// True for precondition failures detected before any network activity.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, ClientError::Api(ApiError::InvalidArgument(_)))
    }

    /// True when the kernel answered with a failure envelope.
    pub fn is_remote(&self) -> bool {
        matches!(self, ClientError::Api(ApiError::Remote { .. }))
    }

    /// The server's message for a failure envelope.
    pub fn remote_message(&self) -> Option<&str> {
        match self {
            ClientError::Api(e) => e.remote_message(),
            _ => None,
        }
    }
}
