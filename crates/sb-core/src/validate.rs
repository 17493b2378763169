//! Structural validation for page trees.
//!
//! Reports problems without modifying the tree. Used when loading a
//! persisted document (errors reject it, warnings are logged) and exposed
//! to the host so it can flag issues in its own UI.

use crate::id::NodeId;
use crate::model::{ANCHOR_FIELD, ElementKind, Node};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

// ─── Diagnostic types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// The tree breaks an invariant and must not be loaded.
    Error,
    /// Loadable, but likely a mistake.
    Warning,
}

/// A single finding for one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// The node this finding refers to.
    pub node_id: NodeId,
    pub message: String,
    pub severity: Severity,
    /// Short rule identifier (e.g. "duplicate-id", "dangling-anchor").
    pub rule: &'static str,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.rule, self.message)
    }
}

// ─── Public API ───────────────────────────────────────────────────────────

/// Run every rule over the tree rooted at `root`.
#[must_use]
pub fn validate_tree(root: &Node) -> Vec<Violation> {
    let mut out = Vec::new();
    check_root_kind(root, &mut out);
    let ids = check_structure(root, &mut out);
    check_anchors(root, &ids, &mut out);
    out
}

/// True if any error-severity finding is present.
pub fn has_errors(violations: &[Violation]) -> bool {
    violations.iter().any(|v| v.severity == Severity::Error)
}

// ─── Rules ────────────────────────────────────────────────────────────────

fn error(node: &Node, rule: &'static str, message: String) -> Violation {
    Violation {
        node_id: node.id,
        message,
        severity: Severity::Error,
        rule,
    }
}

fn warning(node: &Node, rule: &'static str, message: String) -> Violation {
    Violation {
        node_id: node.id,
        message,
        severity: Severity::Warning,
        rule,
    }
}

fn check_root_kind(root: &Node, out: &mut Vec<Violation>) {
    if root.kind != ElementKind::Page {
        out.push(error(
            root,
            "root-kind",
            format!("root `{}` is a {}, expected a page", root.id, root.kind),
        ));
    }
}

/// Per-node rules. Returns every id seen, for the anchor pass.
fn check_structure(root: &Node, out: &mut Vec<Violation>) -> HashSet<NodeId> {
    let mut seen = HashSet::new();
    visit(root, None, &mut seen, out);
    seen
}

fn visit(node: &Node, parent: Option<&Node>, seen: &mut HashSet<NodeId>, out: &mut Vec<Violation>) {
    if !seen.insert(node.id) {
        out.push(error(
            node,
            "duplicate-id",
            format!("id `{}` appears more than once", node.id),
        ));
    }

    if let Some(parent) = parent {
        if node.kind == ElementKind::Page {
            out.push(error(
                node,
                "nested-page",
                format!("page `{}` is nested inside `{}`", node.id, parent.id),
            ));
        } else if !parent.kind.allows_child(node.kind) {
            out.push(error(
                node,
                "forbidden-child",
                format!("a {} cannot contain a {} (`{}`)", parent.kind, node.kind, node.id),
            ));
        }
    }

    for (name, value) in node.content.iter() {
        match node.kind.content_field(name) {
            None => out.push(error(
                node,
                "content-field",
                format!("{} has no content field `{name}`", node.kind),
            )),
            Some(expected) if expected != value.kind() => out.push(error(
                node,
                "content-field",
                format!("content field `{name}` expects {expected:?}, got {value:?}"),
            )),
            Some(_) => {}
        }
    }

    if let Some(detail) = node.unrepresentable_value() {
        out.push(error(
            node,
            "non-finite-number",
            format!("{detail} cannot be stored as JSON"),
        ));
    }

    if node.kind == ElementKind::Image && node.content.text("src").is_none_or(str::is_empty) {
        out.push(warning(node, "empty-image-src", "image has no source".to_string()));
    }

    for child in &node.children {
        visit(child, Some(node), seen, out);
    }
}

fn check_anchors(root: &Node, ids: &HashSet<NodeId>, out: &mut Vec<Violation>) {
    root.walk(&mut |node, _| {
        if node.kind != ElementKind::Button {
            return;
        }
        if let Some(anchor) = node.content.text(ANCHOR_FIELD)
            && !anchor.is_empty()
            && !NodeId::lookup(anchor).is_some_and(|id| ids.contains(&id))
        {
            out.push(warning(
                node,
                "dangling-anchor",
                format!("anchor `{anchor}` does not name an element on this page"),
            ));
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Device;

    fn rules(root: &Node) -> Vec<&'static str> {
        validate_tree(root).into_iter().map(|v| v.rule).collect()
    }

    #[test]
    fn clean_tree_has_no_findings() {
        let root = Node::new("root", ElementKind::Page).with_child(
            Node::new("s", ElementKind::Section).with_child(
                Node::new("c", ElementKind::Column)
                    .with_child(Node::new("b", ElementKind::Button).with_content("anchor", "s"))
                    .with_child(Node::new("i", ElementKind::Image).with_content("src", "a.png")),
            ),
        );
        assert!(validate_tree(&root).is_empty());
    }

    #[test]
    fn root_must_be_page() {
        let root = Node::new("s", ElementKind::Section);
        assert_eq!(rules(&root), vec!["root-kind"]);
    }

    #[test]
    fn nested_page_and_duplicates() {
        let root = Node::new("root", ElementKind::Page)
            .with_child(Node::new("p2", ElementKind::Page))
            .with_child(Node::new("root", ElementKind::Section));
        assert_eq!(rules(&root), vec!["nested-page", "duplicate-id"]);
    }

    #[test]
    fn content_fields_are_checked() {
        let root = Node::new("root", ElementKind::Page).with_child(
            Node::new("s", ElementKind::Section)
                .with_content("name", 3)
                .with_content("src", "x.png"),
        );
        let found = validate_tree(&root);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|v| v.rule == "content-field"));
        assert!(has_errors(&found));
    }

    #[test]
    fn warnings_do_not_count_as_errors() {
        let root = Node::new("root", ElementKind::Page).with_child(
            Node::new("s", ElementKind::Section).with_child(
                Node::new("c", ElementKind::Column)
                    .with_child(Node::new("b", ElementKind::Button).with_content("anchor", "gone"))
                    .with_child(Node::new("i", ElementKind::Image)),
            ),
        );
        let found = validate_tree(&root);
        let mut names: Vec<_> = found.iter().map(|v| v.rule).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["dangling-anchor", "empty-image-src"]);
        assert!(!has_errors(&found));
    }

    #[test]
    fn non_finite_numbers_are_errors() {
        let root = Node::new("root", ElementKind::Page)
            .with_device_style(Device::Mobile, "opacity", f64::INFINITY);
        assert_eq!(rules(&root), vec!["non-finite-number"]);
    }
}
