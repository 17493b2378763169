use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide interner for element ids.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Counter feeding `NodeId::fresh`. Never reset, so fresh ids are never reused.
static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Stable identifier of an element in the page tree.
/// Internally a `Spur` index: 4 bytes, Copy, O(1) Eq and Hash.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Spur);

impl NodeId {
    /// Intern a string as a NodeId, or return the existing one.
    pub fn intern(s: &str) -> Self {
        NodeId(INTERNER.get_or_intern(s))
    }

    /// The id for `s` if it has been interned, without interning it.
    pub fn lookup(s: &str) -> Option<Self> {
        INTERNER.get(s).map(NodeId)
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// Generate a process-unique id with a type prefix (e.g. `section_4`).
    ///
    /// Candidates that were interned before (ids loaded from a saved
    /// document, hand-written ids in tests) are skipped.
    pub fn fresh(prefix: &str) -> Self {
        loop {
            let n = COUNTER.fetch_add(1, Ordering::Relaxed);
            let candidate = format!("{prefix}_{n}");
            if INTERNER.get(&candidate).is_none() {
                return Self::intern(&candidate);
            }
        }
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId::intern(s)
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(NodeId::intern(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_roundtrip() {
        let a = NodeId::intern("hero_section");
        let b = NodeId::intern("hero_section");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "hero_section");
    }

    #[test]
    fn fresh_ids_are_unique() {
        let a = NodeId::fresh("text");
        let b = NodeId::fresh("text");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("text_"));
    }

    #[test]
    fn fresh_skips_previously_interned_strings() {
        // Reserve the next few candidates as if a saved document used them.
        let next = COUNTER.load(Ordering::Relaxed);
        for n in next..next + 4 {
            NodeId::intern(&format!("image_{n}"));
        }
        let fresh = NodeId::fresh("image");
        let suffix: u64 = fresh.as_str()["image_".len()..].parse().unwrap();
        assert!(suffix >= next + 4, "fresh id {fresh} reused a loaded id");
    }
}
