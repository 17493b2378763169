//! Tree operations.
//!
//! Every operation takes the current `Tree` and returns a new one; the
//! input is never changed. Only the nodes on the path from the root to the
//! edited node are copied, everything else stays pointer-shared with the
//! input, which keeps history snapshots cheap.
//!
//! Operations are all-or-nothing: all checks run before any edit is made
//! to the working copy, and a failure drops the copy.

use crate::error::OperationError;
use crate::id::NodeId;
use crate::model::{ANCHOR_FIELD, Device, ElementKind, Node, RESPONSIVE_KEY, StyleMap, Value};
use crate::tree::Tree;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

const NO_SUCH_PARENT: &str = "no such element";
const CHILD_NOT_ALLOWED: &str = "that element type is not allowed there";
const ROOT_HAS_NO_PARENT: &str = "the page root has no parent to hold a copy";

// ─── Operations ──────────────────────────────────────────────────────────

/// Insert `node` (and its subtree) under `parent` at `index`, or at the end.
pub fn insert(
    tree: &Tree,
    parent: NodeId,
    node: Node,
    index: Option<usize>,
) -> Result<Tree, OperationError> {
    let path = tree.path_to(parent).ok_or(OperationError::InvalidParent {
        parent,
        child: node.kind,
        reason: NO_SUCH_PARENT,
    })?;
    let target = tree.node_at(&path).ok_or(OperationError::NodeNotFound(parent))?;
    check_accepts(target, node.kind)?;
    let index = check_index(target, index)?;
    check_subtree(&node, &tree.id_set())?;

    log::trace!("insert {} `{}` into `{parent}` at {index}", node.kind, node.id);
    let mut next = tree.clone();
    next.node_at_mut(&path)
        .ok_or(OperationError::NodeNotFound(parent))?
        .children
        .insert(index, Arc::new(node));
    Ok(next)
}

/// Detach the subtree at `id`. Returns the new tree and the detached subtree.
pub fn remove(tree: &Tree, id: NodeId) -> Result<(Tree, Arc<Node>), OperationError> {
    let path = tree.path_to(id).ok_or(OperationError::NodeNotFound(id))?;
    let (&slot, parent_path) = path.split_last().ok_or(OperationError::CannotRemoveRoot)?;

    log::trace!("remove `{id}`");
    let mut next = tree.clone();
    let parent = next
        .node_at_mut(parent_path)
        .ok_or(OperationError::NodeNotFound(id))?;
    let detached = parent.children.remove(slot);
    Ok((next, detached))
}

/// Detach `id` and reattach it under `new_parent` at `index` (or the end).
///
/// `index` counts positions in the destination after the node has been
/// detached, so moving within the same parent uses the shortened list.
pub fn move_node(
    tree: &Tree,
    id: NodeId,
    new_parent: NodeId,
    index: Option<usize>,
) -> Result<Tree, OperationError> {
    let from = tree.path_to(id).ok_or(OperationError::NodeNotFound(id))?;
    if from.is_empty() {
        return Err(OperationError::CannotRemoveRoot);
    }
    let node = tree.node_at(&from).ok_or(OperationError::NodeNotFound(id))?;
    let to = tree.path_to(new_parent).ok_or(OperationError::InvalidParent {
        parent: new_parent,
        child: node.kind,
        reason: NO_SUCH_PARENT,
    })?;
    if to.starts_with(&from) {
        return Err(OperationError::CyclicMove {
            node: id,
            target: new_parent,
        });
    }
    let dest = tree
        .node_at(&to)
        .ok_or(OperationError::NodeNotFound(new_parent))?;
    check_accepts(dest, node.kind)?;

    let (detached_tree, detached) = remove(tree, id)?;
    let to = detached_tree
        .path_to(new_parent)
        .ok_or(OperationError::NodeNotFound(new_parent))?;
    let dest = detached_tree
        .node_at(&to)
        .ok_or(OperationError::NodeNotFound(new_parent))?;
    let index = check_index(dest, index)?;

    log::trace!("move `{id}` into `{new_parent}` at {index}");
    let mut next = detached_tree;
    next.node_at_mut(&to)
        .ok_or(OperationError::NodeNotFound(new_parent))?
        .children
        .insert(index, detached);
    Ok(next)
}

/// Deep-copy the subtree at `id` with fresh ids and place the copy right
/// after the original. Returns the new tree and the copy's id.
pub fn duplicate(tree: &Tree, id: NodeId) -> Result<(Tree, NodeId), OperationError> {
    let path = tree.path_to(id).ok_or(OperationError::NodeNotFound(id))?;
    let node = tree.node_at(&path).ok_or(OperationError::NodeNotFound(id))?;
    let Some((&slot, parent_path)) = path.split_last() else {
        return Err(OperationError::InvalidParent {
            parent: id,
            child: node.kind,
            reason: ROOT_HAS_NO_PARENT,
        });
    };

    let copy = clone_with_fresh_ids(node);
    let copy_id = copy.id;
    log::trace!("duplicate `{id}` as `{copy_id}`");

    let mut next = tree.clone();
    next.node_at_mut(parent_path)
        .ok_or(OperationError::NodeNotFound(id))?
        .children
        .insert(slot + 1, Arc::new(copy));
    Ok((next, copy_id))
}

/// Shallow-merge `patch` into the base style, or into the `device` override.
pub fn update_style(
    tree: &Tree,
    id: NodeId,
    patch: &StyleMap,
    device: Option<Device>,
) -> Result<Tree, OperationError> {
    let path = tree.path_to(id).ok_or(OperationError::NodeNotFound(id))?;
    if let Some(key) = patch.keys().find(|k| k.is_empty() || *k == RESPONSIVE_KEY) {
        return Err(OperationError::InvalidStyleProperty(key.clone()));
    }

    log::trace!("update style of `{id}` ({} keys, {device:?})", patch.len());
    let mut next = tree.clone();
    next.node_at_mut(&path)
        .ok_or(OperationError::NodeNotFound(id))?
        .style
        .merge(patch, device);
    Ok(next)
}

/// Merge `patch` into the content payload. Every field must exist for the
/// node's type and carry a value of the right type.
pub fn update_content(
    tree: &Tree,
    id: NodeId,
    patch: &BTreeMap<String, Value>,
) -> Result<Tree, OperationError> {
    let path = tree.path_to(id).ok_or(OperationError::NodeNotFound(id))?;
    let node = tree.node_at(&path).ok_or(OperationError::NodeNotFound(id))?;
    for (field, value) in patch {
        check_content_field(node, field, value)?;
    }

    log::trace!("update content of `{id}` ({} fields)", patch.len());
    let mut next = tree.clone();
    let target = next.node_at_mut(&path).ok_or(OperationError::NodeNotFound(id))?;
    for (field, value) in patch {
        target.content.set(field, value.clone());
    }
    Ok(next)
}

// ─── Cloning ─────────────────────────────────────────────────────────────

/// Deep copy of `node` where every node gets a fresh id.
///
/// Anchor fields that point at a node inside the copied subtree are
/// rewritten to point at that node's copy. Anchors pointing elsewhere are
/// left as they are.
pub fn clone_with_fresh_ids(node: &Node) -> Node {
    let mut mapping = HashMap::new();
    let mut copy = reassign_ids(node, &mut mapping);
    remap_anchors(&mut copy, &mapping);
    copy
}

fn reassign_ids(node: &Node, mapping: &mut HashMap<NodeId, NodeId>) -> Node {
    let id = NodeId::fresh(node.kind.as_str());
    mapping.insert(node.id, id);
    Node {
        id,
        kind: node.kind,
        style: node.style.clone(),
        content: node.content.clone(),
        children: node
            .children
            .iter()
            .map(|child| Arc::new(reassign_ids(child, mapping)))
            .collect(),
    }
}

fn remap_anchors(node: &mut Node, mapping: &HashMap<NodeId, NodeId>) {
    let remapped = node
        .content
        .text(ANCHOR_FIELD)
        .and_then(NodeId::lookup)
        .and_then(|old| mapping.get(&old));
    if let Some(new) = remapped {
        node.content.set(ANCHOR_FIELD, new.as_str());
    }
    for child in &mut node.children {
        // Freshly built above, so never shared: make_mut does not copy.
        remap_anchors(Arc::make_mut(child), mapping);
    }
}

// ─── Checks ──────────────────────────────────────────────────────────────

fn check_accepts(parent: &Node, child: ElementKind) -> Result<(), OperationError> {
    if parent.kind.allows_child(child) {
        Ok(())
    } else {
        Err(OperationError::InvalidParent {
            parent: parent.id,
            child,
            reason: CHILD_NOT_ALLOWED,
        })
    }
}

fn check_index(parent: &Node, index: Option<usize>) -> Result<usize, OperationError> {
    let len = parent.children.len();
    match index {
        None => Ok(len),
        Some(i) if i <= len => Ok(i),
        Some(i) => Err(OperationError::IndexOutOfRange {
            parent: parent.id,
            index: i64::try_from(i).unwrap_or(i64::MAX),
            len,
        }),
    }
}

fn check_content_field(node: &Node, field: &str, value: &Value) -> Result<(), OperationError> {
    match node.kind.content_field(field) {
        Some(kind) if kind == value.kind() => Ok(()),
        _ => Err(OperationError::InvalidContentField {
            node: node.id,
            kind: node.kind,
            field: field.to_string(),
        }),
    }
}

/// Check a subtree about to be inserted: no id may already exist in the
/// tree (`existing`) or repeat inside the subtree, every child must be
/// allowed by its parent, and every content field must fit its type.
pub fn check_subtree(node: &Node, existing: &HashSet<NodeId>) -> Result<(), OperationError> {
    fn go(
        node: &Node,
        existing: &HashSet<NodeId>,
        seen: &mut HashSet<NodeId>,
    ) -> Result<(), OperationError> {
        if existing.contains(&node.id) || !seen.insert(node.id) {
            return Err(OperationError::DuplicateId(node.id));
        }
        for (field, value) in node.content.iter() {
            check_content_field(node, field, value)?;
        }
        for child in &node.children {
            check_accepts(node, child.kind)?;
            go(child, existing, seen)?;
        }
        Ok(())
    }
    go(node, existing, &mut HashSet::new())
}

/// Split a host-supplied position into a usable index or the offending
/// negative value.
fn position(index: Option<i64>) -> Result<Option<usize>, i64> {
    match index {
        None => Ok(None),
        Some(i) if i < 0 => Err(i),
        Some(i) => Ok(Some(usize::try_from(i).unwrap_or(usize::MAX))),
    }
}

/// `IndexOutOfRange` for a negative position. Every other check has
/// already passed on `appended`, where the node went to the end of
/// `parent`, so the valid range is one less than its child count.
fn negative_index(appended: &Tree, parent: NodeId, index: i64) -> OperationError {
    let len = appended
        .find(parent)
        .map_or(0, |p| p.children.len().saturating_sub(1));
    OperationError::IndexOutOfRange { parent, index, len }
}

// ─── Operation values ────────────────────────────────────────────────────

/// A tree operation as data, as sent by the host UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Operation {
    Insert {
        parent_id: NodeId,
        node: Node,
        /// Signed so a negative position from the host is reported as
        /// `IndexOutOfRange` rather than failing to parse.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<i64>,
    },
    Remove {
        node_id: NodeId,
    },
    Move {
        node_id: NodeId,
        new_parent_id: NodeId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<i64>,
    },
    Duplicate {
        node_id: NodeId,
    },
    UpdateStyle {
        node_id: NodeId,
        patch: StyleMap,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        device: Option<Device>,
    },
    UpdateContent {
        node_id: NodeId,
        patch: BTreeMap<String, Value>,
    },
}

/// Result of a successful `Operation::apply`.
#[derive(Debug, Clone)]
pub struct Applied {
    pub tree: Tree,
    /// The subtree taken out by `Remove`.
    pub detached: Option<Arc<Node>>,
    /// The node added by `Insert` or `Duplicate`.
    pub created: Option<NodeId>,
}

impl Applied {
    fn from_tree(tree: Tree) -> Self {
        Self {
            tree,
            detached: None,
            created: None,
        }
    }
}

impl Operation {
    pub fn apply(&self, tree: &Tree) -> Result<Applied, OperationError> {
        let applied = match self {
            Operation::Insert {
                parent_id,
                node,
                index,
            } => {
                let next = match position(*index) {
                    Ok(index) => insert(tree, *parent_id, node.clone(), index)?,
                    Err(negative) => {
                        let appended = insert(tree, *parent_id, node.clone(), None)?;
                        return Err(negative_index(&appended, *parent_id, negative));
                    }
                };
                Applied {
                    tree: next,
                    detached: None,
                    created: Some(node.id),
                }
            }
            Operation::Remove { node_id } => {
                let (tree, detached) = remove(tree, *node_id)?;
                Applied {
                    tree,
                    detached: Some(detached),
                    created: None,
                }
            }
            Operation::Move {
                node_id,
                new_parent_id,
                index,
            } => match position(*index) {
                Ok(index) => Applied::from_tree(move_node(tree, *node_id, *new_parent_id, index)?),
                Err(negative) => {
                    let appended = move_node(tree, *node_id, *new_parent_id, None)?;
                    return Err(negative_index(&appended, *new_parent_id, negative));
                }
            },
            Operation::Duplicate { node_id } => {
                let (tree, copy) = duplicate(tree, *node_id)?;
                Applied {
                    tree,
                    detached: None,
                    created: Some(copy),
                }
            }
            Operation::UpdateStyle {
                node_id,
                patch,
                device,
            } => Applied::from_tree(update_style(tree, *node_id, patch, *device)?),
            Operation::UpdateContent { node_id, patch } => {
                Applied::from_tree(update_content(tree, *node_id, patch)?)
            }
        };
        log::debug!("applied: {}", self.description());
        Ok(applied)
    }

    /// Short label for history entries and undo/redo tooltips.
    pub fn description(&self) -> String {
        match self {
            Operation::Insert { node, .. } => format!("Insert {}", node.kind),
            Operation::Remove { node_id } => format!("Delete {node_id}"),
            Operation::Move { node_id, .. } => format!("Move {node_id}"),
            Operation::Duplicate { node_id } => format!("Duplicate {node_id}"),
            Operation::UpdateStyle {
                node_id,
                device: Some(device),
                ..
            } => format!("Style {node_id} ({})", device.as_str()),
            Operation::UpdateStyle { node_id, .. } => format!("Style {node_id}"),
            Operation::UpdateContent { node_id, .. } => format!("Edit {node_id}"),
        }
    }

    /// The node the operation is aimed at (the parent, for `Insert`).
    pub fn target(&self) -> NodeId {
        match self {
            Operation::Insert { parent_id, .. } => *parent_id,
            Operation::Remove { node_id }
            | Operation::Move { node_id, .. }
            | Operation::Duplicate { node_id }
            | Operation::UpdateStyle { node_id, .. }
            | Operation::UpdateContent { node_id, .. } => *node_id,
        }
    }
}
