//! Async client for the note server's kernel API.
//!
//! # Overview
//! Drives the sans-IO `siyuan-core` over a shared `reqwest` transport. Open a
//! session with `SiyuanApi::new(url, token)`, or scope one with
//! `api_session`, which guarantees the session is closed when the scope ends.
//!
//! ```no_run
//! use siyuan_client::{api_session, Anchor, ClientError, DataType};
//!
//! # async fn demo() -> Result<(), ClientError> {
//! api_session("http://127.0.0.1:6806", "token", |api| async move {
//!     let batches = api
//!         .insert_block(DataType::Markdown, "# Hi", &Anchor::parent("20210817205410-2kvfpfn"))
//!         .await?
//!         .into_data()?;
//!     println!("{} operation(s)", batches[0].do_operations.len());
//!     Ok::<_, ClientError>(())
//! })
//! .await
//! # }
//! ```

pub mod config;
pub mod error;
pub mod session;

pub use config::SessionConfig;
pub use error::ClientError;
pub use session::{api_session, api_session_with, SiyuanApi};

pub use siyuan_core::{
    Action, Anchor, ApiError, ApiResponse, DataType, Notebook, NotebookList, OperationBatchResult,
    OperationRecord,
};
