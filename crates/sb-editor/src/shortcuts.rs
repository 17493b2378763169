//! Keyboard shortcut mapping.
//!
//! Maps key + modifier combos to semantic `ShortcutAction`s.
//! The map lives in Rust so the browser bridge and native hosts agree on it.

use serde::Serialize;

/// Actions that keyboard shortcuts can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ShortcutAction {
    // ── History ──
    Undo,
    Redo,
    /// Ask the host to persist the page. Saving itself happens outside.
    Save,

    // ── Edit ──
    Delete,
    Duplicate,
    Copy,
    Cut,
    Paste,

    // ── Selection ──
    Deselect,
    SelectParent,
}

impl ShortcutAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ShortcutAction::Undo => "undo",
            ShortcutAction::Redo => "redo",
            ShortcutAction::Save => "save",
            ShortcutAction::Delete => "delete",
            ShortcutAction::Duplicate => "duplicate",
            ShortcutAction::Copy => "copy",
            ShortcutAction::Cut => "cut",
            ShortcutAction::Paste => "paste",
            ShortcutAction::Deselect => "deselect",
            ShortcutAction::SelectParent => "selectParent",
        }
    }
}

/// Resolves key events into shortcut actions.
///
/// Uses platform-aware modifier detection: on macOS `meta` is ⌘,
/// on other platforms `ctrl` serves the same role.
pub struct ShortcutMap;

impl ShortcutMap {
    /// Resolve a key event to an action.
    ///
    /// `key` is the `KeyboardEvent.key` value (e.g. `"z"`, `"Delete"`).
    /// Returns `None` if the key combo has no binding.
    pub fn resolve(
        key: &str,
        ctrl: bool,
        shift: bool,
        alt: bool,
        meta: bool,
    ) -> Option<ShortcutAction> {
        let cmd = ctrl || meta;

        // ── Modifier combos first (most specific) ──
        if cmd && shift {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Redo),
                _ => None,
            };
        }

        if cmd {
            return match key {
                "z" | "Z" => Some(ShortcutAction::Undo),
                "y" | "Y" => Some(ShortcutAction::Redo),
                "s" | "S" => Some(ShortcutAction::Save),
                "d" | "D" => Some(ShortcutAction::Duplicate),
                "c" | "C" => Some(ShortcutAction::Copy),
                "x" | "X" => Some(ShortcutAction::Cut),
                "v" | "V" => Some(ShortcutAction::Paste),
                _ => None,
            };
        }

        if alt {
            return match key {
                "ArrowUp" => Some(ShortcutAction::SelectParent),
                _ => None,
            };
        }

        // Shift alone binds nothing; bare keys below would otherwise fire.
        if shift {
            return None;
        }

        match key {
            "Delete" | "Backspace" => Some(ShortcutAction::Delete),
            "Escape" => Some(ShortcutAction::Deselect),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_undo_redo() {
        // Cmd+Z → Undo
        assert_eq!(
            ShortcutMap::resolve("z", false, false, false, true),
            Some(ShortcutAction::Undo)
        );
        // Ctrl+Z → Undo
        assert_eq!(
            ShortcutMap::resolve("z", true, false, false, false),
            Some(ShortcutAction::Undo)
        );
        // Cmd+Shift+Z → Redo (browsers report the key uppercased)
        assert_eq!(
            ShortcutMap::resolve("Z", false, true, false, true),
            Some(ShortcutAction::Redo)
        );
        // Ctrl+Y → Redo
        assert_eq!(
            ShortcutMap::resolve("y", true, false, false, false),
            Some(ShortcutAction::Redo)
        );
    }

    #[test]
    fn resolve_save() {
        assert_eq!(
            ShortcutMap::resolve("s", true, false, false, false),
            Some(ShortcutAction::Save)
        );
        assert_eq!(ShortcutMap::resolve("s", false, false, false, false), None);
    }

    #[test]
    fn resolve_clipboard() {
        assert_eq!(
            ShortcutMap::resolve("c", false, false, false, true),
            Some(ShortcutAction::Copy)
        );
        assert_eq!(
            ShortcutMap::resolve("x", false, false, false, true),
            Some(ShortcutAction::Cut)
        );
        assert_eq!(
            ShortcutMap::resolve("v", false, false, false, true),
            Some(ShortcutAction::Paste)
        );
        assert_eq!(
            ShortcutMap::resolve("d", true, false, false, false),
            Some(ShortcutAction::Duplicate)
        );
    }

    #[test]
    fn resolve_delete_and_selection() {
        assert_eq!(
            ShortcutMap::resolve("Delete", false, false, false, false),
            Some(ShortcutAction::Delete)
        );
        assert_eq!(
            ShortcutMap::resolve("Backspace", false, false, false, false),
            Some(ShortcutAction::Delete)
        );
        assert_eq!(
            ShortcutMap::resolve("Escape", false, false, false, false),
            Some(ShortcutAction::Deselect)
        );
        assert_eq!(
            ShortcutMap::resolve("ArrowUp", false, false, true, false),
            Some(ShortcutAction::SelectParent)
        );
    }

    #[test]
    fn resolve_unbound() {
        assert_eq!(ShortcutMap::resolve("q", true, false, false, false), None);
        assert_eq!(ShortcutMap::resolve("y", true, true, false, false), None);
        assert_eq!(ShortcutMap::resolve("Delete", false, true, false, false), None);
        assert_eq!(ShortcutMap::resolve("ArrowUp", false, false, false, false), None);
    }
}
