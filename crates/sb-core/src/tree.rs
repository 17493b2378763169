//! The page tree: one `page` root and lookups over it.
//!
//! A `Tree` is a cheap handle (`Arc` to the root). Cloning it shares every
//! node; edits go through `crate::ops`, which copy only the root-to-target
//! path and leave the rest shared.

use crate::error::DocumentError;
use crate::id::NodeId;
use crate::model::{ElementKind, Node};
use crate::validate::{Severity, validate_tree};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::sync::Arc;

/// Child indices from the root down to a node. Empty for the root itself.
pub type NodePath = SmallVec<[usize; 8]>;

/// Id of the root of a fresh, empty page.
pub const DEFAULT_ROOT_ID: &str = "root";

#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    root: Arc<Node>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new(Node::new(DEFAULT_ROOT_ID, ElementKind::Page))
    }
}

impl Tree {
    pub fn new(root: Node) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    pub fn from_arc(root: Arc<Node>) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_arc(&self) -> &Arc<Node> {
        &self.root
    }

    pub fn root_id(&self) -> NodeId {
        self.root.id
    }

    /// True when both handles point at the same root allocation.
    pub fn ptr_eq(&self, other: &Tree) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }

    // ─── Lookup ──────────────────────────────────────────────────────────

    /// Index path from the root to `id`, depth-first.
    pub fn path_to(&self, id: NodeId) -> Option<NodePath> {
        fn search(node: &Node, id: NodeId, path: &mut NodePath) -> bool {
            if node.id == id {
                return true;
            }
            for (i, child) in node.children.iter().enumerate() {
                path.push(i);
                if search(child, id, path) {
                    return true;
                }
                path.pop();
            }
            false
        }

        let mut path = NodePath::new();
        search(&self.root, id, &mut path).then_some(path)
    }

    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        let mut node: &Node = &self.root;
        for &i in path {
            node = node.children.get(i)?;
        }
        Some(node)
    }

    /// Copy-on-write access along `path`. Nodes shared with other tree
    /// versions are cloned (shallowly) on the way down.
    pub(crate) fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let mut node = Arc::make_mut(&mut self.root);
        for &i in path {
            node = Arc::make_mut(node.children.get_mut(i)?);
        }
        Some(node)
    }

    pub fn find(&self, id: NodeId) -> Option<&Node> {
        let path = self.path_to(id)?;
        self.node_at(&path)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.path_to(id).is_some()
    }

    /// The parent of `id`, or `None` for the root and for unknown ids.
    pub fn parent_of(&self, id: NodeId) -> Option<&Node> {
        let path = self.path_to(id)?;
        let (_, parent) = path.split_last()?;
        self.node_at(parent)
    }

    /// True when `node` is `ancestor` or lies anywhere below it.
    pub fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool {
        let Some(top) = self.find(ancestor) else {
            return false;
        };
        let mut found = false;
        top.walk(&mut |n, _| found |= n.id == node);
        found
    }

    // ─── Traversal ───────────────────────────────────────────────────────

    /// Depth-first pre-order visit with depth (root = 0).
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Node, usize)) {
        self.root.walk(f);
    }

    /// All ids in depth-first order.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        self.walk(&mut |n, _| ids.push(n.id));
        ids
    }

    pub fn id_set(&self) -> HashSet<NodeId> {
        let mut ids = HashSet::new();
        self.walk(&mut |n, _| {
            ids.insert(n.id);
        });
        ids
    }

    pub fn len(&self) -> usize {
        self.root.subtree_len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    // ─── JSON document ───────────────────────────────────────────────────

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse and validate a persisted document (`Node[]` with one page root).
    ///
    /// Error-severity violations reject the document; warnings are logged.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let tree: Tree = serde_json::from_str(json)?;
        let (errors, warnings): (Vec<_>, Vec<_>) = validate_tree(tree.root())
            .into_iter()
            .partition(|v| v.severity == Severity::Error);
        for w in &warnings {
            log::warn!("document `{}`: {}", tree.root_id(), w);
        }
        if !errors.is_empty() {
            return Err(DocumentError::Invalid(errors));
        }
        Ok(tree)
    }
}

impl Serialize for Tree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [&self.root].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Tree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut roots = Vec::<Arc<Node>>::deserialize(deserializer)?;
        if roots.len() != 1 {
            return Err(D::Error::custom(format!(
                "expected exactly one root element, found {}",
                roots.len()
            )));
        }
        let root = roots.swap_remove(0);
        Ok(Tree { root })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::Violation;
    use pretty_assertions::assert_eq;

    fn sample() -> Tree {
        Tree::new(
            Node::new("root", ElementKind::Page).with_child(
                Node::new("s1", ElementKind::Section)
                    .with_child(
                        Node::new("c1", ElementKind::Column)
                            .with_child(Node::new("h1", ElementKind::Heading)),
                    )
                    .with_child(Node::new("c2", ElementKind::Column)),
            ),
        )
    }

    #[test]
    fn default_tree_is_empty_page() {
        let tree = Tree::default();
        assert_eq!(tree.root().kind, ElementKind::Page);
        assert_eq!(tree.root_id().as_str(), "root");
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn paths_and_parents() {
        let tree = sample();
        assert_eq!(tree.path_to("h1".into()).unwrap().as_slice(), &[0, 0, 0]);
        assert_eq!(tree.path_to("c2".into()).unwrap().as_slice(), &[0, 1]);
        assert!(tree.path_to("root".into()).unwrap().is_empty());
        assert!(tree.path_to("nope".into()).is_none());

        assert_eq!(tree.parent_of("h1".into()).unwrap().id.as_str(), "c1");
        assert!(tree.parent_of("root".into()).is_none());
    }

    #[test]
    fn within_checks_subtree() {
        let tree = sample();
        assert!(tree.is_within("h1".into(), "s1".into()));
        assert!(tree.is_within("s1".into(), "s1".into()));
        assert!(!tree.is_within("s1".into(), "c1".into()));
        assert!(!tree.is_within("c2".into(), "c1".into()));
    }

    #[test]
    fn ids_in_document_order() {
        let ids: Vec<_> = sample().ids().iter().map(|id| id.to_string()).collect();
        assert_eq!(ids, vec!["root", "s1", "c1", "h1", "c2"]);
    }

    #[test]
    fn json_roundtrip() {
        let tree = sample();
        let json = tree.to_json().unwrap();
        assert!(json.starts_with("[{\"id\":\"root\""));
        let back = Tree::from_json(&json).unwrap();
        assert_eq!(back, tree);
    }

    #[test]
    fn rejects_multiple_roots() {
        let err = Tree::from_json(r#"[{"id":"a","type":"page"},{"id":"b","type":"page"}]"#)
            .unwrap_err();
        assert!(matches!(err, DocumentError::Json(_)));
    }

    #[test]
    fn rejects_structurally_invalid_document() {
        let json = r#"[{"id":"root","type":"page","children":[{"id":"t","type":"text"}]}]"#;
        let DocumentError::Invalid(errors) = Tree::from_json(json).unwrap_err() else {
            panic!("expected validation failure");
        };
        let rules: Vec<&str> = errors.iter().map(|v: &Violation| v.rule).collect();
        assert_eq!(rules, vec!["forbidden-child"]);
    }

    #[test]
    fn copy_on_write_leaves_original_untouched() {
        let original = sample();
        let mut edited = original.clone();
        let path = edited.path_to("c2".into()).unwrap();
        edited
            .node_at_mut(&path)
            .unwrap()
            .content
            .set("span", 6);

        assert!(original.find("c2".into()).unwrap().content.is_empty());
        // Sibling branch is still shared
        assert!(Arc::ptr_eq(
            &original.root().children[0].children[0],
            &edited.root().children[0].children[0],
        ));
    }
}
