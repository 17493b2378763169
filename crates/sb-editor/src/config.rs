//! Editor configuration.

use crate::error::EditorError;
use serde::{Deserialize, Serialize};

/// Default number of snapshots kept by each page's history.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Settings shared by every session of a project.
///
/// Parsed from a (possibly partial) JSON object supplied by the host.
/// Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorConfig {
    /// Maximum retained snapshots per page. Default: **50**, never below 1.
    pub history_limit: usize,

    /// Outline rows with no explicit expand/collapse state start expanded.
    /// Default: **true**.
    pub expand_by_default: bool,

    /// Select the node created by insert, duplicate or paste. Default: **true**.
    pub select_inserted: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_LIMIT,
            expand_by_default: true,
            select_inserted: true,
        }
    }
}

impl EditorConfig {
    pub fn from_json(json: &str) -> Result<Self, EditorError> {
        let config: EditorConfig = serde_json::from_str(json).map_err(EditorError::Config)?;
        Ok(config.normalized())
    }

    /// Clamp values into their valid ranges.
    pub fn normalized(mut self) -> Self {
        if self.history_limit == 0 {
            log::warn!("historyLimit 0 is not usable, using 1");
            self.history_limit = 1;
        }
        self
    }
}
