//! Snapshot history with a movable cursor.
//!
//! The engine keeps an ordered log of immutable tree snapshots. The tree the
//! editor shows is always the snapshot under the cursor. Snapshots share
//! unchanged subtrees (`Arc` nodes), so keeping the full retention window
//! costs little more than the nodes each edit actually touched.
//!
//! The log and cursor change only through `push`, `undo`, `redo` and
//! `clear`, and each of them publishes the new current state on the
//! engine's bus.

use crate::bus::{NotificationBus, Subscription};
use crate::config::DEFAULT_HISTORY_LIMIT;
use sb_core::{Node, OperationError, Tree};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub type Clock = Rc<dyn Fn() -> u64>;

/// Prefix marking a snapshot that replaced an edit which could not be stored.
pub const DEGRADED_PREFIX: &str = "[degraded]";

pub fn system_clock() -> Clock {
    Rc::new(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    })
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// One entry of the history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryState {
    /// The page tree, serialized as `Node[]`.
    pub elements: Tree,
    pub timestamp: u64,
    pub description: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub degraded: bool,
}

impl HistoryState {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

pub struct HistoryEngine {
    states: VecDeque<HistoryState>,
    cursor: usize,
    limit: usize,
    revision: u64,
    clock: Clock,
    bus: NotificationBus<HistoryState>,
}

impl std::fmt::Debug for HistoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryEngine")
            .field("len", &self.states.len())
            .field("cursor", &self.cursor)
            .field("limit", &self.limit)
            .field("revision", &self.revision)
            .finish()
    }
}

impl HistoryEngine {
    /// A history holding just `initial`, with the default limit and the
    /// system clock.
    pub fn new(initial: Tree) -> Self {
        Self::with_config(initial, DEFAULT_HISTORY_LIMIT, system_clock())
    }

    pub fn with_config(initial: Tree, limit: usize, clock: Clock) -> Self {
        let timestamp = clock();
        let first = match find_unrepresentable(initial.root_arc(), None) {
            Ok(()) => HistoryState {
                elements: initial,
                timestamp,
                description: "Initial state".to_string(),
                degraded: false,
            },
            Err(err) => {
                log::error!("initial tree cannot be stored, starting empty: {err}");
                HistoryState {
                    elements: Tree::default(),
                    timestamp,
                    description: format!("{DEGRADED_PREFIX} Initial state"),
                    degraded: true,
                }
            }
        };
        Self {
            states: VecDeque::from([first]),
            cursor: 0,
            limit: limit.max(1),
            revision: 0,
            clock,
            bus: NotificationBus::new(),
        }
    }

    // ─── Transitions ─────────────────────────────────────────────────────

    /// Record `tree` as the new current state.
    ///
    /// Drops any redo branch, appends, and evicts the oldest entries past
    /// the limit. A tree that cannot be serialized is not stored: a copy of
    /// the current state marked degraded is appended instead.
    pub fn push(&mut self, tree: Tree, description: impl Into<String>) -> &HistoryState {
        let description = description.into();
        let timestamp = (self.clock)();

        let state = match find_unrepresentable(tree.root_arc(), Some(self.current().elements.root_arc())) {
            Ok(()) => HistoryState {
                elements: tree,
                timestamp,
                description,
                degraded: false,
            },
            Err(err) => {
                log::error!("snapshot for \"{description}\" rejected: {err}");
                HistoryState {
                    elements: self.current().elements.clone(),
                    timestamp,
                    description: format!("{DEGRADED_PREFIX} {description}"),
                    degraded: true,
                }
            }
        };

        self.states.truncate(self.cursor + 1);
        self.states.push_back(state);
        while self.states.len() > self.limit {
            self.states.pop_front();
            log::debug!("history limit {} reached, evicted oldest snapshot", self.limit);
        }
        self.cursor = self.states.len() - 1;
        log::debug!(
            "push \"{}\" (cursor {}/{})",
            self.current().description,
            self.cursor,
            self.states.len()
        );
        self.moved()
    }

    /// Step back one snapshot. `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<&HistoryState> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        log::debug!("undo to {} \"{}\"", self.cursor, self.current().description);
        Some(self.moved())
    }

    /// Step forward one snapshot. `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<&HistoryState> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        log::debug!("redo to {} \"{}\"", self.cursor, self.current().description);
        Some(self.moved())
    }

    /// Collapse the log to the current snapshot alone.
    pub fn clear(&mut self) -> &HistoryState {
        let current = self.current().clone();
        self.states.clear();
        self.states.push_back(current);
        self.cursor = 0;
        log::debug!("history cleared");
        self.moved()
    }

    fn moved(&mut self) -> &HistoryState {
        self.revision += 1;
        let state = &self.states[self.cursor];
        self.bus.publish(state);
        state
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn current(&self) -> &HistoryState {
        &self.states[self.cursor]
    }

    /// The current tree. Snapshot nodes are immutable, so the returned
    /// handle can never change what history stores.
    pub fn current_tree(&self) -> Tree {
        self.current().elements.clone()
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.states.len()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bumped on every cursor move. Lets async work detect that the tree
    /// it started from is no longer current.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn states(&self) -> impl Iterator<Item = &HistoryState> {
        self.states.iter()
    }

    /// Label of the edit `undo` would revert.
    pub fn undo_description(&self) -> Option<&str> {
        self.can_undo().then(|| self.current().description.as_str())
    }

    /// Label of the edit `redo` would reapply.
    pub fn redo_description(&self) -> Option<&str> {
        self.states
            .get(self.cursor + 1)
            .map(|s| s.description.as_str())
    }

    // ─── Notifications ───────────────────────────────────────────────────

    pub fn bus(&self) -> &NotificationBus<HistoryState> {
        &self.bus
    }

    pub fn subscribe(&self, listener: impl FnMut(&HistoryState) + 'static) -> Subscription {
        self.bus.subscribe(listener)
    }
}

/// Check that every node of `node` not pointer-shared with `previous` can be
/// written as JSON. Shared subtrees were checked when they were stored.
fn find_unrepresentable(node: &Arc<Node>, previous: Option<&Arc<Node>>) -> Result<(), OperationError> {
    if previous.is_some_and(|prev| Arc::ptr_eq(node, prev)) {
        return Ok(());
    }
    if let Some(detail) = node.unrepresentable_value() {
        return Err(OperationError::SerializationFailure(format!(
            "`{}`: {detail}",
            node.id
        )));
    }
    for child in &node.children {
        let counterpart = previous.and_then(|prev| {
            prev.children
                .iter()
                .find(|c| Arc::ptr_eq(c, child))
                .or_else(|| prev.children.iter().find(|c| c.id == child.id))
        });
        find_unrepresentable(child, counterpart)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sb_core::ops::{insert, update_style};
    use sb_core::{ElementKind, StyleMap, Value};
    use std::cell::{Cell, RefCell};

    fn fixed_clock() -> Clock {
        let t = Rc::new(Cell::new(1_000u64));
        Rc::new(move || {
            t.set(t.get() + 1);
            t.get()
        })
    }

    fn engine(limit: usize) -> HistoryEngine {
        HistoryEngine::with_config(Tree::default(), limit, fixed_clock())
    }

    fn with_section(tree: &Tree, id: &str) -> Tree {
        insert(tree, "root".into(), Node::new(id, ElementKind::Section), None).unwrap()
    }

    #[test]
    fn starts_with_one_snapshot() {
        let h = engine(50);
        assert_eq!(h.len(), 1);
        assert_eq!(h.cursor(), 0);
        assert!(!h.can_undo());
        assert!(!h.can_redo());
        assert_eq!(h.current().timestamp, 1_001);
    }

    #[test]
    fn push_undo_redo_cycle() {
        let mut h = engine(50);
        let t1 = with_section(&h.current_tree(), "h_s1");
        h.push(t1.clone(), "Add section");
        assert!(h.can_undo());
        assert_eq!(h.undo_description(), Some("Add section"));

        let back = h.undo().unwrap().elements.clone();
        assert!(back.is_empty());
        assert_eq!(h.redo_description(), Some("Add section"));

        let again = h.redo().unwrap();
        assert_eq!(again.elements, t1);
        assert!(h.redo().is_none());
    }

    #[test]
    fn undo_at_start_is_a_no_op() {
        let mut h = engine(50);
        let before = h.current().clone();
        assert!(h.undo().is_none());
        assert!(h.undo().is_none());
        assert_eq!(h.current(), &before);
        assert_eq!(h.len(), 1);
        assert_eq!(h.revision(), 0);
    }

    #[test]
    fn eviction_keeps_cursor_on_newest() {
        let mut h = engine(3);
        let mut tree = h.current_tree();
        for i in 0..5 {
            tree = with_section(&tree, &format!("ev_{i}"));
            h.push(tree.clone(), format!("step {i}"));
        }
        assert_eq!(h.len(), 3);
        assert_eq!(h.cursor(), 2);
        assert_eq!(h.current().description, "step 4");
        let labels: Vec<_> = h.states().map(|s| s.description.clone()).collect();
        assert_eq!(labels, vec!["step 2", "step 3", "step 4"]);
    }

    #[test]
    fn clear_keeps_only_current() {
        let mut h = engine(50);
        let t1 = with_section(&h.current_tree(), "cl_s1");
        h.push(t1.clone(), "one");
        h.push(with_section(&t1, "cl_s2"), "two");
        h.undo();

        h.clear();
        assert_eq!(h.len(), 1);
        assert_eq!(h.current().elements, t1);
        assert!(!h.can_undo());
        assert!(!h.can_redo());
    }

    #[test]
    fn every_transition_publishes() {
        let mut h = engine(50);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        h.subscribe(move |s: &HistoryState| sink.borrow_mut().push(s.description.clone()));

        h.push(with_section(&h.current_tree(), "pub_s1"), "add");
        h.undo();
        h.undo(); // nothing to undo: no notification
        h.redo();
        h.clear();
        assert_eq!(*seen.borrow(), vec!["add", "Initial state", "add", "add"]);
        assert_eq!(h.revision(), 4);
    }

    #[test]
    fn unrepresentable_edit_falls_back_to_degraded_copy() {
        let mut h = engine(50);
        let good = with_section(&h.current_tree(), "dg_s1");
        h.push(good.clone(), "add");

        let mut patch = StyleMap::new();
        patch.insert("opacity".into(), Value::Number(f64::NAN));
        let bad = update_style(&good, "dg_s1".into(), &patch, None).unwrap();
        let state = h.push(bad, "fade");

        assert!(state.degraded);
        assert_eq!(state.description, "[degraded] fade");
        assert_eq!(state.elements, good);
        assert_eq!(h.len(), 3);

        let json = h.current().to_json().unwrap();
        assert!(json.contains("\"degraded\":true"));
    }

    #[test]
    fn state_json_shape() {
        let h = engine(50);
        let json: serde_json::Value = serde_json::from_str(&h.current().to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "elements": [{ "id": "root", "type": "page", "style": {}, "content": {}, "children": [] }],
                "timestamp": 1_001,
                "description": "Initial state"
            })
        );
    }
}
