//! Domain DTOs for the kernel API.
//!
//! # Design
//! Request payloads are structs rather than ad-hoc maps so that field names
//! and field order on the wire are fixed by the type. `DataType` and `Action`
//! are closed enums: an unrecognised spelling fails at the boundary (parse or
//! decode) rather than later at use.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

/// Format of the `data` string sent with insert and update calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Markdown,
    Dom,
}

impl DataType {
    pub fn as_str(self) -> &'static str {
        match self {
            DataType::Markdown => "markdown",
            DataType::Dom => "dom",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "markdown" => Ok(DataType::Markdown),
            "dom" => Ok(DataType::Dom),
            other => Err(ApiError::InvalidArgument(format!(
                "dataType must be \"markdown\" or \"dom\", got {other:?}"
            ))),
        }
    }
}

/// Kind of tree mutation the server reports in an `OperationRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Insert,
    Update,
    Delete,
    Move,
}

/// One atomic mutation the server applied to its document tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRecord {
    pub action: Action,
    #[serde(default)]
    pub data: String,
    pub id: String,
    #[serde(rename = "parentID", default)]
    pub parent_id: String,
    #[serde(rename = "previousID", default)]
    pub previous_id: String,
    #[serde(rename = "nextID", default)]
    pub next_id: String,
    /// Always `null` on the wire.
    #[serde(default)]
    pub ret_data: Option<Value>,
}

/// The full effect of one client call, in application order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationBatchResult {
    pub do_operations: Vec<OperationRecord>,
    /// Always `null` on the wire.
    #[serde(default)]
    pub undo_operations: Option<Value>,
}

/// A top-level document container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notebook {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub sort: i64,
    #[serde(alias = "closed", default)]
    pub close: bool,
}

/// Payload of `/api/notebook/lsNotebooks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookList {
    pub notebooks: Vec<Notebook>,
}

/// Positional anchor for placing a block in the tree.
///
/// The server needs at least one of the three ids to be non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Anchor {
    pub next_id: String,
    pub previous_id: String,
    pub parent_id: String,
}

impl Anchor {
    pub fn next(id: impl Into<String>) -> Self {
        Self {
            next_id: id.into(),
            ..Self::default()
        }
    }

    pub fn previous(id: impl Into<String>) -> Self {
        Self {
            previous_id: id.into(),
            ..Self::default()
        }
    }

    pub fn parent(id: impl Into<String>) -> Self {
        Self {
            parent_id: id.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.next_id.is_empty() && self.previous_id.is_empty() && self.parent_id.is_empty()
    }

    pub(crate) fn require(&self) -> Result<(), ApiError> {
        if self.is_empty() {
            return Err(ApiError::InvalidArgument(
                "nextID, previousID and parentID cannot be all empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Request payload for `/api/sql`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlQuery {
    pub query: String,
}

/// Request payload for `/api/block/insertBlock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertBlock {
    #[serde(rename = "dataType")]
    pub data_type: DataType,
    pub data: String,
    #[serde(rename = "nextID")]
    pub next_id: String,
    #[serde(rename = "previousID")]
    pub previous_id: String,
    #[serde(rename = "parentID")]
    pub parent_id: String,
}

/// Request payload for `/api/block/updateBlock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateBlock {
    pub id: String,
    #[serde(rename = "dataType")]
    pub data_type: DataType,
    pub data: String,
}

/// Request payload for `/api/block/moveBlock`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveBlock {
    pub id: String,
    #[serde(rename = "nextID")]
    pub next_id: String,
    #[serde(rename = "previousID")]
    pub previous_id: String,
    #[serde(rename = "parentID")]
    pub parent_id: String,
}

/// Request payload naming a single block: delete, fold and unfold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockRef {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_parses_closed_set() {
        assert_eq!("markdown".parse::<DataType>().unwrap(), DataType::Markdown);
        assert_eq!("dom".parse::<DataType>().unwrap(), DataType::Dom);
        let err = "html".parse::<DataType>().unwrap_err();
        assert!(matches!(err, ApiError::InvalidArgument(_)));
    }

    #[test]
    fn data_type_serializes_lowercase() {
        assert_eq!(serde_json::to_value(DataType::Dom).unwrap(), "dom");
    }

    #[test]
    fn unknown_action_is_rejected() {
        let raw = r#"{"action":"rename","data":"","id":"a","parentID":"","previousID":"","nextID":"","retData":null}"#;
        assert!(serde_json::from_str::<OperationRecord>(raw).is_err());
    }

    #[test]
    fn operation_record_reads_server_field_names() {
        let raw = r#"{"action":"move","data":"","id":"a","parentID":"p","previousID":"b","nextID":"","retData":null}"#;
        let op: OperationRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(op.action, Action::Move);
        assert_eq!(op.parent_id, "p");
        assert_eq!(op.previous_id, "b");
        assert!(op.ret_data.is_none());
    }

    #[test]
    fn notebook_accepts_closed_spelling() {
        let raw = r#"{"id":"n1","name":"Guide","icon":"1f4d4","sort":3,"closed":true,"sortMode":15}"#;
        let nb: Notebook = serde_json::from_str(raw).unwrap();
        assert_eq!(nb.sort, 3);
        assert!(nb.close);
    }

    #[test]
    fn insert_block_keeps_wire_field_order() {
        let body = InsertBlock {
            data_type: DataType::Markdown,
            data: "# Hi".to_string(),
            next_id: String::new(),
            previous_id: String::new(),
            parent_id: "p".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r##"{"dataType":"markdown","data":"# Hi","nextID":"","previousID":"","parentID":"p"}"##
        );
    }

    #[test]
    fn anchor_emptiness() {
        assert!(Anchor::default().is_empty());
        assert!(!Anchor::parent("p").is_empty());
        assert!(Anchor::default().require().is_err());
        assert!(Anchor::next("n").require().is_ok());
    }
}
