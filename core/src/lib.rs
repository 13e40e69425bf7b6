//! Synchronous API client core for the note server's kernel API.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern). The caller executes the
//! actual HTTP round trip, making the core fully deterministic and testable.
//!
//! # Design
//! - `SiyuanClient` is stateless: it holds only the base URL and token.
//! - Each operation is split into `build_*` (produces request) and `parse_*`
//!   (consumes response), so the I/O boundary is explicit.
//! - Every response is a `{code, msg, data}` envelope; `ApiResponse::into_data`
//!   is the single point where a nonzero `code` becomes an error.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod envelope;
pub mod error;
pub mod http;
pub mod types;

pub use client::{endpoints, SiyuanClient, DEFAULT_BASE_URL};
pub use envelope::{decode_envelope, ApiResponse};
pub use error::ApiError;
pub use http::{HttpRequest, HttpResponse};
pub use types::{
    Action, Anchor, DataType, Notebook, NotebookList, OperationBatchResult, OperationRecord,
};
