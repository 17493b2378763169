//! Integration tests: history engine driven through tree operations.

use pretty_assertions::assert_eq;
use sb_core::ops::insert;
use sb_core::{ElementKind, Node, Operation, Tree};
use sb_editor::{EditorConfig, EditorSession, HistoryEngine, HistoryState};
use std::cell::RefCell;
use std::rc::Rc;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn add_section(tree: &Tree, id: &str) -> Tree {
    insert(tree, "root".into(), Node::new(id, ElementKind::Section), None).unwrap()
}

// ─── Scenarios ──────────────────────────────────────────────────────────

#[test]
fn can_undo_only_after_push() {
    init_logger();
    let mut history = HistoryEngine::new(Tree::default());
    let tree = add_section(&history.current_tree(), "ur_n1");

    let ids: Vec<_> = tree.root().children.iter().map(|c| c.id.to_string()).collect();
    assert_eq!(ids, vec!["ur_n1"]);
    assert!(!history.can_undo());

    history.push(tree, "Insert section");
    assert!(history.can_undo());
}

#[test]
fn new_push_discards_redo_branch() {
    init_logger();
    let t0 = Tree::default();
    let t1 = add_section(&t0, "ur_a1");
    let t2 = add_section(&t1, "ur_a2");
    let t3 = add_section(&t2, "ur_a3");
    let t4 = add_section(&t1, "ur_a4");

    let mut history = HistoryEngine::new(t0.clone());
    history.push(t1.clone(), "T1");
    history.push(t2, "T2");
    history.push(t3, "T3");
    history.undo();
    history.undo();
    history.push(t4.clone(), "T4");

    let trees: Vec<Tree> = history.states().map(|s| s.elements.clone()).collect();
    assert_eq!(trees, vec![t0, t1, t4]);
    assert_eq!(history.cursor(), 2);
    assert!(!history.can_redo());
}

// ─── Properties ─────────────────────────────────────────────────────────

#[test]
fn push_undo_redo_roundtrip() {
    let mut history = HistoryEngine::new(Tree::default());
    let tree = add_section(&history.current_tree(), "ur_rt");
    history.push(tree.clone(), "add");
    history.undo();
    history.redo();
    assert_eq!(history.current_tree(), tree);
    assert_eq!(history.current_tree().to_json().unwrap(), tree.to_json().unwrap());
}

#[test]
fn undo_at_start_is_idempotent() {
    let mut history = HistoryEngine::new(Tree::default());
    let first = history.current().clone();
    assert!(history.undo().is_none());
    let second = history.current().clone();
    assert!(history.undo().is_none());
    assert_eq!(first, second);
    assert_eq!(history.current(), &second);
    assert_eq!(history.len(), 1);
}

#[test]
fn fifty_first_state_evicts_oldest() {
    init_logger();
    let mut history = HistoryEngine::new(Tree::default());
    let mut tree = history.current_tree();
    // Initial state plus 50 pushes = 51 distinct states.
    for i in 0..50 {
        tree = add_section(&tree, &format!("ur_ev{i}"));
        history.push(tree.clone(), format!("push {i}"));
    }
    assert_eq!(history.len(), 50);
    assert_eq!(history.cursor(), 49);
    assert_eq!(history.states().next().unwrap().description, "push 0");
    assert_eq!(history.current_tree(), tree);
}

#[test]
fn returned_tree_is_independent_of_history() {
    let mut history = HistoryEngine::new(Tree::default());
    history.push(add_section(&history.current_tree(), "ur_ind"), "add");
    let before = history.current().clone();

    // Editing the returned tree produces a new tree, never a change in place.
    let copy = history.current_tree();
    let edited = add_section(&copy, "ur_ind2");
    assert_ne!(edited, copy);
    assert_eq!(history.current(), &before);
}

#[test]
fn snapshots_share_untouched_subtrees() {
    let mut history = HistoryEngine::new(Tree::default());
    let t1 = add_section(&history.current_tree(), "ur_sh1");
    history.push(t1, "one");
    let t2 = add_section(&history.current_tree(), "ur_sh2");
    history.push(t2, "two");

    let states: Vec<&HistoryState> = history.states().collect();
    let first_section = &states[1].elements.root().children[0];
    let same_section = &states[2].elements.root().children[0];
    assert!(std::sync::Arc::ptr_eq(first_section, same_section));
}

// ─── Through a session ──────────────────────────────────────────────────

#[test]
fn session_notifies_in_order_and_tracks_descriptions() {
    init_logger();
    let mut session = EditorSession::new(Tree::default(), EditorConfig::default());
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    session.subscribe(move |state: &HistoryState| sink.borrow_mut().push(state.description.clone()));

    session
        .apply_operation(&Operation::Insert {
            parent_id: "root".into(),
            node: Node::new("ur_s", ElementKind::Section),
            index: None,
        })
        .unwrap();
    session
        .apply_operation(&Operation::Duplicate {
            node_id: "ur_s".into(),
        })
        .unwrap();
    session.undo();
    session.redo();

    assert_eq!(
        *seen.borrow(),
        vec!["Insert section", "Duplicate ur_s", "Insert section", "Duplicate ur_s"]
    );
}

#[test]
fn failed_operation_leaves_history_untouched() {
    let mut session = EditorSession::new(Tree::default(), EditorConfig::default());
    let revision = session.history().revision();
    let err = session
        .apply_operation(&Operation::Remove {
            node_id: "root".into(),
        })
        .unwrap_err();
    assert_eq!(err.kind(), "CannotRemoveRoot");
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.history().revision(), revision);
}

#[test]
fn history_limit_comes_from_config() {
    let config = EditorConfig::from_json(r#"{"historyLimit": 2}"#).unwrap();
    let mut session = EditorSession::new(Tree::default(), config);
    for i in 0..4 {
        session
            .apply_operation(&Operation::Insert {
                parent_id: "root".into(),
                node: Node::new(format!("ur_cfg{i}").as_str(), ElementKind::Section),
                index: None,
            })
            .unwrap();
    }
    assert_eq!(session.history().len(), 2);
    assert!(session.undo().is_some());
    assert!(session.undo().is_none());
}
