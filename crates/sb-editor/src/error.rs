use sb_core::{DocumentError, OperationError};
use thiserror::Error;

/// Errors surfaced by sessions and projects to the host UI.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("session token {0} is no longer active")]
    StaleSession(u64),

    #[error("page `{0}` not found")]
    PageNotFound(String),

    #[error("page `{0}` already exists")]
    DuplicatePage(String),

    #[error("a project must keep at least one page")]
    LastPage,

    #[error("nothing is selected")]
    NothingSelected,

    #[error("clipboard is empty")]
    ClipboardEmpty,

    #[error("invalid editor config: {0}")]
    Config(serde_json::Error),
}

impl EditorError {
    /// Stable code for the browser bridge. Tree operation failures keep
    /// their own taxonomy name.
    pub fn kind(&self) -> &'static str {
        match self {
            EditorError::Operation(e) => e.kind(),
            EditorError::Document(e) => e.kind(),
            EditorError::StaleSession(_) => "StaleSession",
            EditorError::PageNotFound(_) => "PageNotFound",
            EditorError::DuplicatePage(_) => "DuplicatePage",
            EditorError::LastPage => "LastPage",
            EditorError::NothingSelected => "NothingSelected",
            EditorError::ClipboardEmpty => "ClipboardEmpty",
            EditorError::Config(_) => "Config",
        }
    }
}
