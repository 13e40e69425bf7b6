//! Stateless HTTP request builder and response parser for the kernel API.
//!
//! # Design
//! `SiyuanClient` holds only a base URL and a token and carries no mutable
//! state between calls. Each operation is split into a `build_*` method that
//! produces an `HttpRequest` and a `parse_*` method that consumes an
//! `HttpResponse`. The caller executes the actual HTTP round trip, keeping the
//! core deterministic and free of I/O dependencies.
//!
//! `parse_*` methods return the decoded envelope and do not fail on a nonzero
//! `code`; call `ApiResponse::into_data` to turn that into `ApiError::Remote`.

use serde::de::IgnoredAny;
use serde::Serialize;
use serde_json::Value;

use crate::envelope::{decode_envelope, ApiResponse};
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::types::{
    Anchor, BlockRef, DataType, InsertBlock, MoveBlock, NotebookList, OperationBatchResult,
    SqlQuery, UpdateBlock,
};

/// Default address of a locally running kernel.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:6806";

/// Endpoint paths, relative to the base URL.
pub mod endpoints {
    pub const SQL: &str = "/api/sql";
    pub const INSERT_BLOCK: &str = "/api/block/insertBlock";
    pub const UPDATE_BLOCK: &str = "/api/block/updateBlock";
    pub const DELETE_BLOCK: &str = "/api/block/deleteBlock";
    pub const MOVE_BLOCK: &str = "/api/block/moveBlock";
    pub const FOLD_BLOCK: &str = "/api/block/foldBlock";
    pub const UNFOLD_BLOCK: &str = "/api/block/unfoldBlock";
    pub const LS_NOTEBOOKS: &str = "/api/notebook/lsNotebooks";
}

/// Synchronous, stateless client for the kernel API.
///
/// Builds `HttpRequest` values and parses `HttpResponse` values without
/// touching the network.
#[derive(Debug, Clone)]
pub struct SiyuanClient {
    base_url: String,
    token: String,
}

impl SiyuanClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_sql(&self, query: &str) -> Result<HttpRequest, ApiError> {
        self.post(
            endpoints::SQL,
            &SqlQuery {
                query: query.to_string(),
            },
        )
    }

    /// Fails with `ApiError::InvalidArgument` when `anchor` is empty.
    pub fn build_insert_block(
        &self,
        data_type: DataType,
        data: &str,
        anchor: &Anchor,
    ) -> Result<HttpRequest, ApiError> {
        anchor.require()?;
        self.post(
            endpoints::INSERT_BLOCK,
            &InsertBlock {
                data_type,
                data: data.to_string(),
                next_id: anchor.next_id.clone(),
                previous_id: anchor.previous_id.clone(),
                parent_id: anchor.parent_id.clone(),
            },
        )
    }

    pub fn build_update_block(
        &self,
        id: &str,
        data_type: DataType,
        data: &str,
    ) -> Result<HttpRequest, ApiError> {
        self.post(
            endpoints::UPDATE_BLOCK,
            &UpdateBlock {
                id: id.to_string(),
                data_type,
                data: data.to_string(),
            },
        )
    }

    pub fn build_delete_block(&self, id: &str) -> Result<HttpRequest, ApiError> {
        self.post(endpoints::DELETE_BLOCK, &BlockRef { id: id.to_string() })
    }

    /// Fails with `ApiError::InvalidArgument` when `anchor` is empty.
    pub fn build_move_block(&self, id: &str, anchor: &Anchor) -> Result<HttpRequest, ApiError> {
        anchor.require()?;
        self.post(
            endpoints::MOVE_BLOCK,
            &MoveBlock {
                id: id.to_string(),
                next_id: anchor.next_id.clone(),
                previous_id: anchor.previous_id.clone(),
                parent_id: anchor.parent_id.clone(),
            },
        )
    }

    pub fn build_fold_block(&self, id: &str) -> Result<HttpRequest, ApiError> {
        self.post(endpoints::FOLD_BLOCK, &BlockRef { id: id.to_string() })
    }

    pub fn build_unfold_block(&self, id: &str) -> Result<HttpRequest, ApiError> {
        self.post(endpoints::UNFOLD_BLOCK, &BlockRef { id: id.to_string() })
    }

    pub fn build_ls_notebooks(&self) -> Result<HttpRequest, ApiError> {
        self.post(endpoints::LS_NOTEBOOKS, &serde_json::Map::new())
    }

    /// Rows come back untyped; no coercion is applied.
    pub fn parse_sql(&self, response: HttpResponse) -> Result<ApiResponse<Value>, ApiError> {
        decode_envelope(&response)
    }

    pub fn parse_insert_block(
        &self,
        response: HttpResponse,
    ) -> Result<ApiResponse<Vec<OperationBatchResult>>, ApiError> {
        decode_envelope(&response)
    }

    pub fn parse_update_block(
        &self,
        response: HttpResponse,
    ) -> Result<ApiResponse<Vec<OperationBatchResult>>, ApiError> {
        decode_envelope(&response)
    }

    pub fn parse_delete_block(
        &self,
        response: HttpResponse,
    ) -> Result<ApiResponse<Vec<OperationBatchResult>>, ApiError> {
        decode_envelope(&response)
    }

    pub fn parse_move_block(
        &self,
        response: HttpResponse,
    ) -> Result<ApiResponse<Vec<OperationBatchResult>>, ApiError> {
        decode_envelope(&response)
    }

    /// No payload contract: any `data` on success is accepted and ignored.
    pub fn parse_fold_block(
        &self,
        response: HttpResponse,
    ) -> Result<ApiResponse<IgnoredAny>, ApiError> {
        decode_envelope(&response)
    }

    pub fn parse_unfold_block(
        &self,
        response: HttpResponse,
    ) -> Result<ApiResponse<IgnoredAny>, ApiError> {
        decode_envelope(&response)
    }

    pub fn parse_ls_notebooks(
        &self,
        response: HttpResponse,
    ) -> Result<ApiResponse<NotebookList>, ApiError> {
        decode_envelope(&response)
    }

    fn post<B: Serialize>(&self, endpoint: &str, body: &B) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(body).map_err(ApiError::Serialization)?;
        let headers = vec![
            ("content-type".to_string(), "application/json".to_string()),
            ("authorization".to_string(), format!("Token {}", self.token)),
        ];
        Ok(HttpRequest {
            path: format!("{}{endpoint}", self.base_url),
            headers,
            body,
        })
    }
}

impl Default for SiyuanClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, "")
    }
}
