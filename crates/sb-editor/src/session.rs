//! Editing session for one page.
//!
//! A session owns the page's history, the navigator (kept in sync through a
//! history subscription), the clipboard and a token that identifies it to
//! async work. Every tree change goes through `apply_operation`, which runs
//! the operation against the current tree and records the result.
//!
//! Drag gestures use **batching**: between `begin_batch` and the matching
//! `end_batch`, operations update a working tree only. When the outermost
//! batch closes, the net change becomes one history entry.

use crate::bus::Subscription;
use crate::config::EditorConfig;
use crate::error::EditorError;
use crate::history::{Clock, HistoryEngine, HistoryState, system_clock};
use crate::navigator::{Navigator, OutlineRow};
use crate::shortcuts::ShortcutAction;
use sb_core::ops::Applied;
use sb_core::{Node, NodeId, Operation, OperationError, Template, Tree, clone_with_fresh_ids};
use serde::Serialize;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identifies one session. A new page session always gets a new token, so
/// work started against an old session can tell it is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionToken(u64);

impl SessionToken {
    fn next() -> Self {
        SessionToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }

    pub fn from_raw(raw: u64) -> Self {
        SessionToken(raw)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `Operation` positions are signed so hosts can send (invalid) negatives.
fn signed(index: Option<usize>) -> Option<i64> {
    index.map(|i| i64::try_from(i).unwrap_or(i64::MAX))
}

/// Outcome of a dispatched shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Dispatch {
    /// The current tree changed.
    Changed,
    /// Only the selection changed.
    SelectionChanged,
    /// Nothing to do (e.g. undo with no history, delete with no selection).
    Unchanged,
    /// The host should persist the page.
    SaveRequested,
}

/// An open drag gesture.
#[derive(Debug)]
struct Batch {
    depth: usize,
    description: String,
    start: Tree,
    working: Tree,
}

impl Batch {
    /// A gesture that ends where it started (drag out and back) is no change.
    fn changed(&self) -> bool {
        !(self.working.ptr_eq(&self.start) || self.working == self.start)
    }
}

pub struct EditorSession {
    history: HistoryEngine,
    navigator: Rc<RefCell<Navigator>>,
    config: EditorConfig,
    clipboard: Option<Arc<Node>>,
    batch: Option<Batch>,
    token: SessionToken,
    _navigator_sync: Subscription,
}

impl fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorSession")
            .field("token", &self.token)
            .field("history", &self.history)
            .field("batch", &self.batch)
            .finish()
    }
}

impl EditorSession {
    pub fn new(tree: Tree, config: EditorConfig) -> Self {
        Self::with_clock(tree, config, system_clock())
    }

    pub fn with_clock(tree: Tree, config: EditorConfig, clock: Clock) -> Self {
        let history = HistoryEngine::with_config(tree, config.history_limit, clock);
        let navigator = Rc::new(RefCell::new(Navigator::new(config.expand_by_default)));

        let nav = Rc::clone(&navigator);
        let sync = history.subscribe(move |state: &HistoryState| {
            match nav.try_borrow_mut() {
                Ok(mut nav) => nav.sync(&state.elements),
                Err(_) => log::warn!("navigator busy, skipped sync"),
            }
        });

        let token = SessionToken::next();
        log::debug!("session {token} opened");
        Self {
            history,
            navigator,
            config,
            clipboard: None,
            batch: None,
            token,
            _navigator_sync: sync,
        }
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Read-only view of the history. It only changes through the session.
    pub fn history(&self) -> &HistoryEngine {
        &self.history
    }

    pub fn subscribe(&self, listener: impl FnMut(&HistoryState) + 'static) -> Subscription {
        self.history.subscribe(listener)
    }

    /// The tree the editor shows: the batch working tree during a gesture,
    /// otherwise the current history snapshot.
    pub fn current_tree(&self) -> Tree {
        match &self.batch {
            Some(batch) => batch.working.clone(),
            None => self.history.current_tree(),
        }
    }

    // ─── Operations ──────────────────────────────────────────────────────

    /// Apply `op` to the current tree and record it in history.
    pub fn apply_operation(&mut self, op: &Operation) -> Result<Tree, OperationError> {
        self.run(op, op.description()).map(|_| self.current_tree())
    }

    fn run(&mut self, op: &Operation, description: String) -> Result<Applied, OperationError> {
        let applied = op.apply(&self.current_tree())?;

        if let Some(batch) = &mut self.batch {
            batch.working = applied.tree.clone();
            self.navigator.borrow_mut().sync(&applied.tree);
        } else {
            self.history.push(applied.tree.clone(), description);
        }

        if self.config.select_inserted
            && let Some(created) = applied.created
        {
            let tree = self.current_tree();
            if let Err(err) = self.navigator.borrow_mut().select(&tree, created) {
                log::debug!("new node not selectable: {err}");
            }
        }
        Ok(applied)
    }

    // ─── Batching ────────────────────────────────────────────────────────

    /// Start (or nest) a gesture. Only the outermost description is kept.
    pub fn begin_batch(&mut self, description: impl Into<String>) {
        match &mut self.batch {
            Some(batch) => batch.depth += 1,
            None => {
                let start = self.history.current_tree();
                self.batch = Some(Batch {
                    depth: 1,
                    description: description.into(),
                    working: start.clone(),
                    start,
                });
            }
        }
    }

    /// Close one batch level. When the outermost closes, pushes one history
    /// entry if the tree changed. Returns true if an entry was pushed.
    pub fn end_batch(&mut self) -> bool {
        let Some(batch) = &mut self.batch else {
            return false;
        };
        batch.depth -= 1;
        if batch.depth > 0 {
            return false;
        }
        let Some(batch) = self.batch.take() else {
            return false;
        };
        if !batch.changed() {
            log::debug!("batch \"{}\" made no net change", batch.description);
            return false;
        }
        self.history.push(batch.working, batch.description);
        true
    }

    pub fn in_batch(&self) -> bool {
        self.batch.is_some()
    }

    fn commit_batch(&mut self) {
        if let Some(batch) = &mut self.batch {
            batch.depth = 1;
            self.end_batch();
        }
    }

    // ─── History ─────────────────────────────────────────────────────────

    /// Step back. An open batch is committed first. `None` means nothing
    /// to undo.
    pub fn undo(&mut self) -> Option<Tree> {
        self.commit_batch();
        self.history.undo().map(|s| s.elements.clone())
    }

    pub fn redo(&mut self) -> Option<Tree> {
        self.commit_batch();
        self.history.redo().map(|s| s.elements.clone())
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo() || self.batch_changed()
    }

    pub fn can_redo(&self) -> bool {
        !self.batch_changed() && self.history.can_redo()
    }

    fn batch_changed(&self) -> bool {
        self.batch
            .as_ref()
            .is_some_and(Batch::changed)
    }

    pub fn clear_history(&mut self) {
        self.commit_batch();
        self.history.clear();
    }

    // ─── Selection ───────────────────────────────────────────────────────

    pub fn navigator(&self) -> Ref<'_, Navigator> {
        self.navigator.borrow()
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.navigator.borrow().selected()
    }

    pub fn select(&mut self, id: NodeId) -> Result<(), OperationError> {
        let tree = self.current_tree();
        self.navigator.borrow_mut().select(&tree, id)
    }

    pub fn deselect(&mut self) -> Option<NodeId> {
        self.navigator.borrow_mut().deselect()
    }

    pub fn select_parent(&mut self) -> Option<NodeId> {
        let tree = self.current_tree();
        self.navigator.borrow_mut().select_parent(&tree)
    }

    /// Flip the outline flag of `id`. Returns the new state, or `None` when
    /// `id` is not in the current tree (nothing is recorded for it).
    pub fn toggle_expanded(&mut self, id: NodeId) -> Option<bool> {
        if !self.current_tree().contains(id) {
            return None;
        }
        Some(self.navigator.borrow_mut().toggle(id))
    }

    pub fn outline(&self) -> Vec<OutlineRow> {
        self.navigator.borrow().outline(&self.current_tree())
    }

    fn require_selection(&self) -> Result<NodeId, EditorError> {
        self.selected().ok_or(EditorError::NothingSelected)
    }

    pub fn delete_selected(&mut self) -> Result<Tree, EditorError> {
        let node_id = self.require_selection()?;
        Ok(self.apply_operation(&Operation::Remove { node_id })?)
    }

    pub fn duplicate_selected(&mut self) -> Result<Tree, EditorError> {
        let node_id = self.require_selection()?;
        Ok(self.apply_operation(&Operation::Duplicate { node_id })?)
    }

    // ─── Clipboard ───────────────────────────────────────────────────────

    pub fn clipboard(&self) -> Option<&Node> {
        self.clipboard.as_deref()
    }

    pub fn copy_selected(&mut self) -> Result<(), EditorError> {
        let id = self.require_selection()?;
        let tree = self.current_tree();
        let node = tree.find(id).ok_or(OperationError::NodeNotFound(id))?;
        self.clipboard = Some(Arc::new(node.clone()));
        Ok(())
    }

    pub fn cut_selected(&mut self) -> Result<Tree, EditorError> {
        let node_id = self.require_selection()?;
        let op = Operation::Remove { node_id };
        let applied = self.run(&op, format!("Cut {node_id}"))?;
        self.clipboard = applied.detached;
        Ok(self.current_tree())
    }

    /// Paste a fresh-id copy of the clipboard: into the selected node if it
    /// accepts the kind, else right after it, else at the end of the root.
    pub fn paste(&mut self) -> Result<Tree, EditorError> {
        let clip = self.clipboard.as_ref().ok_or(EditorError::ClipboardEmpty)?;
        let node = clone_with_fresh_ids(clip);
        let kind = node.kind;
        let tree = self.current_tree();

        let selected = self.selected().and_then(|id| tree.find(id));
        let target = match selected {
            Some(sel) if sel.kind.allows_child(kind) => Some((sel.id, None)),
            Some(sel) => tree.parent_of(sel.id).and_then(|parent| {
                let pos = parent.children.iter().position(|c| c.id == sel.id)?;
                parent
                    .kind
                    .allows_child(kind)
                    .then_some((parent.id, Some(pos + 1)))
            }),
            None => None,
        }
        .or_else(|| tree.root().kind.allows_child(kind).then_some((tree.root_id(), None)));

        let Some((parent_id, index)) = target else {
            return Err(OperationError::InvalidParent {
                parent: self.selected().unwrap_or(tree.root_id()),
                child: kind,
                reason: "no place near the selection accepts it",
            }
            .into());
        };
        let op = Operation::Insert {
            parent_id,
            node,
            index: signed(index),
        };
        self.run(&op, format!("Paste {kind}"))?;
        Ok(self.current_tree())
    }

    // ─── Templates ───────────────────────────────────────────────────────

    pub fn insert_template(
        &mut self,
        template: &Template,
        parent_id: NodeId,
        index: Option<usize>,
    ) -> Result<Tree, OperationError> {
        let op = Operation::Insert {
            parent_id,
            node: template.instantiate(),
            index: signed(index),
        };
        self.run(&op, format!("Insert template {}", template.name))?;
        Ok(self.current_tree())
    }

    // ─── Shortcuts ───────────────────────────────────────────────────────

    /// Carry out a resolved keyboard shortcut.
    ///
    /// Shortcuts that have nothing to act on (no selection, empty
    /// clipboard, nothing to undo) report `Unchanged` rather than failing.
    pub fn dispatch(&mut self, action: ShortcutAction) -> Result<Dispatch, EditorError> {
        let changed = |r: Result<Tree, EditorError>| match r {
            Ok(_) => Ok(Dispatch::Changed),
            Err(EditorError::NothingSelected | EditorError::ClipboardEmpty) => Ok(Dispatch::Unchanged),
            Err(e) => Err(e),
        };
        match action {
            ShortcutAction::Undo => Ok(self.undo().map_or(Dispatch::Unchanged, |_| Dispatch::Changed)),
            ShortcutAction::Redo => Ok(self.redo().map_or(Dispatch::Unchanged, |_| Dispatch::Changed)),
            ShortcutAction::Save => {
                self.commit_batch();
                Ok(Dispatch::SaveRequested)
            }
            ShortcutAction::Delete => changed(self.delete_selected()),
            ShortcutAction::Duplicate => changed(self.duplicate_selected()),
            ShortcutAction::Cut => changed(self.cut_selected()),
            ShortcutAction::Paste => changed(self.paste()),
            ShortcutAction::Copy => match self.copy_selected() {
                Ok(()) | Err(EditorError::NothingSelected) => Ok(Dispatch::Unchanged),
                Err(e) => Err(e),
            },
            ShortcutAction::Deselect => Ok(self
                .deselect()
                .map_or(Dispatch::Unchanged, |_| Dispatch::SelectionChanged)),
            ShortcutAction::SelectParent => Ok(self
                .select_parent()
                .map_or(Dispatch::Unchanged, |_| Dispatch::SelectionChanged)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_core::ElementKind;

    fn session() -> EditorSession {
        let tree = Tree::new(
            Node::new("root", ElementKind::Page).with_child(
                Node::new("ss_s1", ElementKind::Section)
                    .with_child(Node::new("ss_c1", ElementKind::Column).with_child(Node::new("ss_t1", ElementKind::Text))),
            ),
        );
        EditorSession::new(tree, EditorConfig::default())
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(session().token(), session().token());
    }

    #[test]
    fn batch_records_one_entry() {
        let mut s = session();
        s.begin_batch("Drag text");
        s.begin_batch("inner");
        for index in [None, Some(0), None] {
            s.apply_operation(&Operation::Move {
                node_id: "ss_t1".into(),
                new_parent_id: "ss_c1".into(),
                index,
            })
            .unwrap();
            assert_eq!(s.history().len(), 1);
        }
        assert!(!s.end_batch());
        assert!(s.in_batch());
        // Moved back where it started: no net change, nothing recorded.
        assert!(!s.end_batch());
        assert!(!s.in_batch());
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn drag_out_and_back_leaves_nothing_to_undo() {
        let mut s = session();
        s.begin_batch("Drag text");
        for index in [None, Some(0)] {
            s.apply_operation(&Operation::Move {
                node_id: "ss_t1".into(),
                new_parent_id: "ss_c1".into(),
                index,
            })
            .unwrap();
        }
        s.apply_operation(&Operation::Duplicate { node_id: "ss_t1".into() })
            .unwrap();
        assert!(s.can_undo());
        let copy = s.selected().unwrap();
        s.apply_operation(&Operation::Remove { node_id: copy }).unwrap();

        assert!(!s.can_undo());
        assert!(!s.can_redo());
        assert!(s.undo().is_none());
        assert!(!s.in_batch());
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn open_batch_change_hides_redo() {
        let mut s = session();
        s.apply_operation(&Operation::Duplicate { node_id: "ss_t1".into() })
            .unwrap();
        s.undo();
        assert!(s.can_redo());

        s.begin_batch("Drag");
        s.apply_operation(&Operation::Duplicate { node_id: "ss_t1".into() })
            .unwrap();
        assert!(!s.can_redo());
    }

    #[test]
    fn toggling_unknown_node_is_ignored() {
        let mut s = session();
        assert_eq!(s.toggle_expanded("ss_missing".into()), None);
        assert_eq!(s.navigator().tracked(), 0);
        assert_eq!(s.toggle_expanded("ss_c1".into()), Some(false));
        assert_eq!(s.navigator().tracked(), 1);
    }

    #[test]
    fn undo_inside_batch_commits_it_first() {
        let mut s = session();
        s.begin_batch("Drag");
        s.apply_operation(&Operation::Duplicate { node_id: "ss_t1".into() }).unwrap();
        assert!(s.can_undo());
        let tree = s.undo().unwrap();
        assert!(!s.in_batch());
        assert_eq!(tree.find("ss_c1".into()).unwrap().children.len(), 1);
        assert_eq!(s.history().redo_description(), Some("Drag"));
    }

    #[test]
    fn inserted_node_becomes_selected() {
        let mut s = session();
        s.apply_operation(&Operation::Duplicate { node_id: "ss_t1".into() }).unwrap();
        let selected = s.selected().unwrap();
        assert_ne!(selected.as_str(), "ss_t1");
        assert!(s.current_tree().contains(selected));
    }

    #[test]
    fn undo_clears_selection_of_vanished_node() {
        let mut s = session();
        s.apply_operation(&Operation::Duplicate { node_id: "ss_t1".into() }).unwrap();
        assert!(s.selected().is_some());
        s.undo();
        assert!(s.selected().is_none());
    }
}
