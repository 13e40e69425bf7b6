//! Async session over the kernel API.
//!
//! # Design
//! `SiyuanApi` pairs the sans-IO `SiyuanClient` with one `reqwest::Client`.
//! Each method builds a request with the core (argument checks happen here,
//! before any I/O), performs exactly one POST, and hands the response back to
//! the core for decoding. Clones share the same transport, so concurrent calls
//! from many tasks go through a single session. Closing takes the transport
//! out of the session, dropping its connection pool once in-flight calls
//! finish. There is no retry and no ordering between concurrent calls.
//!
//! Dropping an in-flight call aborts the request. Whether the kernel applied
//! the mutation is then unknown; re-query with `sql` to reconcile.

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use serde::de::IgnoredAny;
use serde_json::Value;
use siyuan_core::{
    Anchor, ApiError, ApiResponse, DataType, HttpRequest, HttpResponse, NotebookList,
    OperationBatchResult, SiyuanClient,
};
use tracing::debug;

use crate::config::SessionConfig;
use crate::error::ClientError;

type Parse<T> = fn(&SiyuanClient, HttpResponse) -> Result<ApiResponse<T>, ApiError>;

/// An open session against one kernel.
#[derive(Debug, Clone)]
pub struct SiyuanApi {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    core: SiyuanClient,
    /// `None` once the session is closed.
    http: RwLock<Option<reqwest::Client>>,
}

impl SiyuanApi {
    /// Open a session against `url`, authenticating with `token`.
    pub fn new(url: &str, token: &str) -> Result<Self, ClientError> {
        Self::with_config(SessionConfig::new(url, token))
    }

    pub fn with_config(config: SessionConfig) -> Result<Self, ClientError> {
        reqwest::Url::parse(&config.url)
            .map_err(|e| ClientError::InvalidConfig(format!("invalid base URL {:?}: {e}", config.url)))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        debug!(url = %config.url, "session opened");
        Ok(Self {
            inner: Arc::new(Inner {
                core: SiyuanClient::new(&config.url, &config.token),
                http: RwLock::new(Some(http)),
            }),
        })
    }

    /// The protocol core this session drives.
    pub fn client(&self) -> &SiyuanClient {
        &self.inner.core
    }

    pub fn is_closed(&self) -> bool {
        self.transport().is_none()
    }

    /// Close the session for every clone and release the transport. Later
    /// calls fail with `ClientError::SessionClosed`. Idempotent.
    pub fn close(&self) {
        let released = self
            .inner
            .http
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if released.is_some() {
            debug!(url = %self.inner.core.base_url(), "session closed");
        }
    }

    /// A handle on the transport while the session is open. Calls in flight
    /// keep their handle, so closing never cuts a request short.
    fn transport(&self) -> Option<reqwest::Client> {
        self.inner
            .http
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run a SQL query against the kernel's block index. Rows are returned
    /// untyped.
    pub async fn sql(&self, query: &str) -> Result<ApiResponse<Value>, ClientError> {
        let request = self.inner.core.build_sql(query)?;
        self.call(request, SiyuanClient::parse_sql).await
    }

    /// Insert a block at `anchor`. Fails without any I/O when `anchor` is
    /// empty.
    pub async fn insert_block(
        &self,
        data_type: DataType,
        data: &str,
        anchor: &Anchor,
    ) -> Result<ApiResponse<Vec<OperationBatchResult>>, ClientError> {
        let request = self.inner.core.build_insert_block(data_type, data, anchor)?;
        self.call(request, SiyuanClient::parse_insert_block).await
    }

    pub async fn update_block(
        &self,
        id: &str,
        data_type: DataType,
        data: &str,
    ) -> Result<ApiResponse<Vec<OperationBatchResult>>, ClientError> {
        let request = self.inner.core.build_update_block(id, data_type, data)?;
        self.call(request, SiyuanClient::parse_update_block).await
    }

    pub async fn delete_block(
        &self,
        id: &str,
    ) -> Result<ApiResponse<Vec<OperationBatchResult>>, ClientError> {
        let request = self.inner.core.build_delete_block(id)?;
        self.call(request, SiyuanClient::parse_delete_block).await
    }

    /// Move a block to `anchor`. Fails without any I/O when `anchor` is
    /// empty.
    pub async fn move_block(
        &self,
        id: &str,
        anchor: &Anchor,
    ) -> Result<ApiResponse<Vec<OperationBatchResult>>, ClientError> {
        let request = self.inner.core.build_move_block(id, anchor)?;
        self.call(request, SiyuanClient::parse_move_block).await
    }

    /// Whatever the kernel puts in `data` on success is accepted and ignored.
    pub async fn fold_block(&self, id: &str) -> Result<ApiResponse<IgnoredAny>, ClientError> {
        let request = self.inner.core.build_fold_block(id)?;
        self.call(request, SiyuanClient::parse_fold_block).await
    }

    pub async fn unfold_block(&self, id: &str) -> Result<ApiResponse<IgnoredAny>, ClientError> {
        let request = self.inner.core.build_unfold_block(id)?;
        self.call(request, SiyuanClient::parse_unfold_block).await
    }

    pub async fn ls_notebooks(&self) -> Result<ApiResponse<NotebookList>, ClientError> {
        let request = self.inner.core.build_ls_notebooks()?;
        self.call(request, SiyuanClient::parse_ls_notebooks).await
    }

    async fn call<T>(&self, request: HttpRequest, parse: Parse<T>) -> Result<ApiResponse<T>, ClientError> {
        let response = self.execute(request).await?;
        Ok(parse(&self.inner.core, response)?)
    }

    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ClientError> {
        let http = self.transport().ok_or(ClientError::SessionClosed)?;

        let mut builder = http.post(&request.path);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        let response = builder.body(request.body).send().await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(path = %request.path, status, "kernel call");

        Ok(HttpResponse { status, body })
    }
}

/// Closes the session when the owning scope ends, including by error or
/// cancellation.
struct CloseOnDrop(SiyuanApi);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Open a session, run `f` with it, and close it afterwards.
///
/// The session is closed whether `f` succeeds, fails, or its future is
/// dropped. Clones that escape the closure are closed too.
pub async fn api_session<F, Fut, T, E>(url: &str, token: &str, f: F) -> Result<T, E>
where
    F: FnOnce(SiyuanApi) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<ClientError>,
{
    api_session_with(SessionConfig::new(url, token), f).await
}

/// `api_session` with a full `SessionConfig`.
pub async fn api_session_with<F, Fut, T, E>(config: SessionConfig, f: F) -> Result<T, E>
where
    F: FnOnce(SiyuanApi) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<ClientError>,
{
    let api = SiyuanApi::with_config(config)?;
    let _guard = CloseOnDrop(api.clone());
    f(api).await
}
