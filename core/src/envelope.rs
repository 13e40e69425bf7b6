//! The uniform `{code, msg, data}` envelope every kernel endpoint returns.
//!
//! # Design
//! Decoding happens in two steps. The body is first checked against the
//! envelope shape with an untyped `data`; only when `code == 0` is `data`
//! converted into the payload type the caller declared. A failure envelope
//! therefore always surfaces as `ApiError::Remote`, whatever the server put
//! in its `data` field.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::http::HttpResponse;

/// A decoded kernel response.
///
/// `code == 0` iff the operation succeeded. `data` is `None` when the server
/// sent `null`, omitted the field, or reported a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: i64,
    pub msg: String,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }

    /// Borrow the payload without consuming the envelope.
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }
}

impl<T: DeserializeOwned> ApiResponse<T> {
    /// Return the payload on success, or the server's message as
    /// `ApiError::Remote`.
    ///
    /// An absent or `null` payload on success is read as JSON `null`, which
    /// `()`, `Option<_>` and `serde_json::Value` accept. Payload types that
    /// require a value report `ApiError::Deserialization` instead.
    pub fn into_data(self) -> Result<T, ApiError> {
        if self.code != 0 {
            return Err(ApiError::Remote {
                code: self.code,
                msg: self.msg,
            });
        }
        match self.data {
            Some(data) => Ok(data),
            None => serde_json::from_value(Value::Null).map_err(ApiError::Deserialization),
        }
    }
}

/// Decode a response body into an envelope carrying a `T` payload.
///
/// Does not fail on a nonzero `code`; that is `into_data`'s job. A non-2xx
/// status is accepted as long as the body is an envelope, since the kernel
/// reports auth failures as a 401 carrying `{code: -1, ...}`.
pub fn decode_envelope<T: DeserializeOwned>(
    response: &HttpResponse,
) -> Result<ApiResponse<T>, ApiError> {
    let raw: ApiResponse<Value> = match serde_json::from_str(&response.body) {
        Ok(raw) => raw,
        Err(_) if !response.is_success() => {
            return Err(ApiError::HttpError {
                status: response.status,
                body: response.body.clone(),
            })
        }
        Err(e) => return Err(ApiError::Deserialization(e)),
    };

    let data = match raw.data {
        Some(value) if raw.code == 0 => {
            Some(serde_json::from_value(value).map_err(ApiError::Deserialization)?)
        }
        _ => None,
    };

    Ok(ApiResponse {
        code: raw.code,
        msg: raw.msg,
        data,
    })
}
