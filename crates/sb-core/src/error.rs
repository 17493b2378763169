//! Error types for tree operations and document loading.

use crate::id::NodeId;
use crate::model::ElementKind;
use crate::validate::Violation;
use thiserror::Error;

/// Why a tree operation was rejected. The tree is left untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    #[error("node `{0}` not found")]
    NodeNotFound(NodeId),

    #[error("`{parent}` cannot hold a {child} here: {reason}")]
    InvalidParent {
        parent: NodeId,
        child: ElementKind,
        reason: &'static str,
    },

    #[error("index {index} is out of range for `{parent}` (0..={len})")]
    IndexOutOfRange {
        parent: NodeId,
        index: i64,
        len: usize,
    },

    #[error("cannot move `{node}` into `{target}`, which is itself or one of its descendants")]
    CyclicMove { node: NodeId, target: NodeId },

    #[error("the page root cannot be removed or moved")]
    CannotRemoveRoot,

    #[error("{kind} `{node}` has no content field `{field}` of that type")]
    InvalidContentField {
        node: NodeId,
        kind: ElementKind,
        field: String,
    },

    #[error("style property `{0}` is reserved or empty")]
    InvalidStyleProperty(String),

    #[error("id `{0}` is already used in the tree")]
    DuplicateId(NodeId),

    #[error("snapshot could not be serialized: {0}")]
    SerializationFailure(String),
}

impl OperationError {
    /// Stable taxonomy code, used by the browser bridge.
    pub fn kind(&self) -> &'static str {
        match self {
            OperationError::NodeNotFound(_) => "NodeNotFound",
            OperationError::InvalidParent { .. } => "InvalidParent",
            OperationError::IndexOutOfRange { .. } => "IndexOutOfRange",
            OperationError::CyclicMove { .. } => "CyclicMove",
            OperationError::CannotRemoveRoot => "CannotRemoveRoot",
            OperationError::InvalidContentField { .. } => "InvalidContentField",
            OperationError::InvalidStyleProperty(_) => "InvalidStyleProperty",
            OperationError::DuplicateId(_) => "DuplicateId",
            OperationError::SerializationFailure(_) => "SerializationFailure",
        }
    }
}

/// A persisted document that could not be loaded.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("malformed document JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document is structurally invalid ({} error(s))", .0.len())]
    Invalid(Vec<Violation>),
}

impl DocumentError {
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentError::Json(_) => "Json",
            DocumentError::Invalid(_) => "Invalid",
        }
    }
}
