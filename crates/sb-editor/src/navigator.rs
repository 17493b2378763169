//! Selection and outline (navigator) state.
//!
//! Tracks the active node and a per-node expand/collapse flag for the
//! outline panel. Kept in step with history by calling `sync` with every
//! published tree: a selection that no longer exists is cleared, and flags
//! for removed nodes are dropped so the map never outgrows the tree.

use sb_core::{ElementKind, NodeId, OperationError, Tree};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// One visible line of the outline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineRow {
    pub id: NodeId,
    pub kind: ElementKind,
    pub depth: usize,
    pub has_children: bool,
    pub expanded: bool,
    pub selected: bool,
}

#[derive(Debug, Clone)]
pub struct Navigator {
    /// Currently selected node.
    selected: Option<NodeId>,
    /// Explicit expand (true) / collapse (false) choices.
    expanded: HashMap<NodeId, bool>,
    /// State of nodes with no explicit choice.
    expand_by_default: bool,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Navigator {
    pub fn new(expand_by_default: bool) -> Self {
        Self {
            selected: None,
            expanded: HashMap::new(),
            expand_by_default,
        }
    }

    // ─── Selection ───────────────────────────────────────────────────────

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    /// Select `id` and expand its ancestors so it shows in the outline.
    pub fn select(&mut self, tree: &Tree, id: NodeId) -> Result<(), OperationError> {
        let path = tree.path_to(id).ok_or(OperationError::NodeNotFound(id))?;
        for depth in 0..path.len() {
            if let Some(ancestor) = tree.node_at(&path[..depth]) {
                self.expanded.insert(ancestor.id, true);
            }
        }
        self.selected = Some(id);
        Ok(())
    }

    /// Clear the selection, returning what was selected.
    pub fn deselect(&mut self) -> Option<NodeId> {
        self.selected.take()
    }

    /// Move the selection to the selected node's parent. The root has no
    /// parent, so selecting it stays put.
    pub fn select_parent(&mut self, tree: &Tree) -> Option<NodeId> {
        let parent = self.selected.and_then(|id| tree.parent_of(id))?.id;
        self.selected = Some(parent);
        Some(parent)
    }

    /// Reconcile with a newly published tree.
    pub fn sync(&mut self, tree: &Tree) {
        let ids: HashSet<NodeId> = tree.id_set();
        if let Some(id) = self.selected
            && !ids.contains(&id)
        {
            log::debug!("selected `{id}` no longer exists, clearing selection");
            self.selected = None;
        }
        self.expanded.retain(|id, _| ids.contains(id));
    }

    // ─── Expand / collapse ───────────────────────────────────────────────

    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.expanded
            .get(&id)
            .copied()
            .unwrap_or(self.expand_by_default)
    }

    pub fn set_expanded(&mut self, id: NodeId, expanded: bool) {
        self.expanded.insert(id, expanded);
    }

    /// Flip the flag for `id`. Returns the new state.
    pub fn toggle(&mut self, id: NodeId) -> bool {
        let next = !self.is_expanded(id);
        self.expanded.insert(id, next);
        next
    }

    /// Number of nodes with an explicit expand/collapse choice.
    pub fn tracked(&self) -> usize {
        self.expanded.len()
    }

    // ─── Outline ─────────────────────────────────────────────────────────

    /// Visible rows in document order. Children of collapsed nodes are left out.
    pub fn outline(&self, tree: &Tree) -> Vec<OutlineRow> {
        let mut rows = Vec::new();
        let mut hidden_below: Option<usize> = None;
        tree.walk(&mut |node, depth| {
            if let Some(limit) = hidden_below {
                if depth > limit {
                    return;
                }
                hidden_below = None;
            }
            let expanded = self.is_expanded(node.id);
            let has_children = !node.children.is_empty();
            if has_children && !expanded {
                hidden_below = Some(depth);
            }
            rows.push(OutlineRow {
                id: node.id,
                kind: node.kind,
                depth,
                has_children,
                expanded,
                selected: self.selected == Some(node.id),
            });
        });
        rows
    }
}
