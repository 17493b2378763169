//! WASM bridge for Site Builder: exposes the document model to JavaScript.
//!
//! Compiled via `wasm-pack build --target web`. Every call that can fail
//! returns a JSON string: `{"ok":true,...}` or
//! `{"ok":false,"error":{"kind":"...","message":"..."}}`, where `kind` is the
//! stable error code (`NodeNotFound`, `CyclicMove`, `StaleSession`, …).

use sb_core::{NodeId, Operation, Tree, builtin_templates, validate_tree};
use sb_editor::history::Clock;
use sb_editor::{Dispatch, EditorConfig, EditorError, Project, SessionToken, ShortcutMap};
use serde_json::json;
use wasm_bindgen::prelude::*;

/// The main WASM-facing editor controller.
///
/// Holds the project (pages plus the active editing session). All
/// interaction from the page builder UI goes through this struct.
#[wasm_bindgen]
pub struct SiteEditor {
    project: Project,
}

#[wasm_bindgen]
impl SiteEditor {
    /// Create an editor. `config` is an optional JSON object such as
    /// `{"historyLimit":100}`; missing keys take their defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config: Option<String>) -> Result<SiteEditor, JsValue> {
        console_error_panic_hook_setup();

        let config = match config.as_deref() {
            Some(json) => EditorConfig::from_json(json).map_err(|e| JsValue::from_str(&e.to_string()))?,
            None => EditorConfig::default(),
        };
        Ok(Self {
            project: Project::with_clock(config, host_clock()),
        })
    }

    // ─── Tree operations ─────────────────────────────────────────────────

    /// Apply an operation given as JSON, e.g.
    /// `{"op":"move","nodeId":"text_3","newParentId":"column_1","index":0}`.
    /// Returns `{"ok":true,"tree":[...]}` or an error object.
    #[wasm_bindgen(js_name = applyOperation)]
    pub fn apply_operation(&mut self, op_json: &str) -> String {
        let op: Operation = match serde_json::from_str(op_json) {
            Ok(op) => op,
            Err(e) => return error_json("InvalidOperation", &e.to_string()),
        };
        match self.project.session_mut().apply_operation(&op) {
            Ok(tree) => tree_json(&tree),
            Err(e) => error_json(e.kind(), &e.to_string()),
        }
    }

    /// Apply an operation from async work (upload, template fetch) started
    /// under `token`. Rejected with `StaleSession` after a page switch.
    #[wasm_bindgen(js_name = applyDeferred)]
    pub fn apply_deferred(&mut self, token: f64, op_json: &str) -> String {
        let op: Operation = match serde_json::from_str(op_json) {
            Ok(op) => op,
            Err(e) => return error_json("InvalidOperation", &e.to_string()),
        };
        let token = SessionToken::from_raw(token as u64);
        respond_tree(self.project.apply_deferred(token, &op))
    }

    /// Token of the active session, to hand to async work.
    pub fn token(&self) -> f64 {
        self.project.token().value() as f64
    }

    #[wasm_bindgen(js_name = currentTree)]
    pub fn current_tree(&self) -> String {
        tree_json(&self.project.session().current_tree())
    }

    #[wasm_bindgen(js_name = beginBatch)]
    pub fn begin_batch(&mut self, description: &str) {
        self.project.session_mut().begin_batch(description);
    }

    #[wasm_bindgen(js_name = endBatch)]
    pub fn end_batch(&mut self) -> bool {
        self.project.session_mut().end_batch()
    }

    // ─── History ─────────────────────────────────────────────────────────

    /// Undo the last action. Returns false if there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        self.project.session_mut().undo().is_some()
    }

    /// Redo the last undone action.
    pub fn redo(&mut self) -> bool {
        self.project.session_mut().redo().is_some()
    }

    #[wasm_bindgen(js_name = canUndo)]
    pub fn can_undo(&self) -> bool {
        self.project.session().can_undo()
    }

    #[wasm_bindgen(js_name = canRedo)]
    pub fn can_redo(&self) -> bool {
        self.project.session().can_redo()
    }

    /// History summary for the toolbar:
    /// `{"cursor":n,"entries":[{"description","timestamp","degraded"}],"undo":..,"redo":..}`.
    #[wasm_bindgen(js_name = historyJson)]
    pub fn history_json(&self) -> String {
        let history = self.project.session().history();
        let entries: Vec<_> = history
            .states()
            .map(|s| {
                json!({
                    "description": s.description,
                    "timestamp": s.timestamp,
                    "degraded": s.degraded,
                })
            })
            .collect();
        json!({
            "cursor": history.cursor(),
            "entries": entries,
            "undo": history.undo_description(),
            "redo": history.redo_description(),
        })
        .to_string()
    }

    /// Call `callback` with the serialized `HistoryState` after every
    /// history change of the active page (across page switches). Returns the
    /// listener id as a JS number, like `token()`.
    pub fn subscribe(&self, callback: js_sys::Function) -> f64 {
        let subscription = self.project.subscribe(move |state| {
            let payload = match state.to_json() {
                Ok(json) => JsValue::from_str(&json),
                Err(e) => {
                    log::error!("history state not serializable: {e}");
                    return;
                }
            };
            if let Err(err) = callback.call1(&JsValue::NULL, &payload) {
                log::error!("subscriber threw: {err:?}");
            }
        });
        subscription.id() as f64
    }

    pub fn unsubscribe(&self, id: f64) -> bool {
        self.project.bus().unsubscribe(id as u64)
    }

    // ─── Keyboard Shortcut API ───────────────────────────────────────────

    /// Handle a keyboard event. Returns a JSON string:
    /// `{"action":"<name>","changed":bool,"save":bool}` plus `error` when
    /// the action failed.
    #[wasm_bindgen(js_name = handleKey)]
    pub fn handle_key(&mut self, key: &str, ctrl: bool, shift: bool, alt: bool, meta: bool) -> String {
        let Some(action) = ShortcutMap::resolve(key, ctrl, shift, alt, meta) else {
            return json!({ "action": "none", "changed": false, "save": false }).to_string();
        };
        match self.project.session_mut().dispatch(action) {
            Ok(outcome) => json!({
                "action": action.as_str(),
                "changed": outcome == Dispatch::Changed,
                "selectionChanged": outcome == Dispatch::SelectionChanged,
                "save": outcome == Dispatch::SaveRequested,
            })
            .to_string(),
            Err(e) => json!({
                "action": action.as_str(),
                "changed": false,
                "save": false,
                "error": { "kind": e.kind(), "message": e.to_string() },
            })
            .to_string(),
        }
    }

    // ─── Selection / outline ─────────────────────────────────────────────

    /// Unknown ids are rejected without being interned.
    pub fn select(&mut self, node_id: &str) -> bool {
        NodeId::lookup(node_id).is_some_and(|id| self.project.session_mut().select(id).is_ok())
    }

    pub fn deselect(&mut self) {
        self.project.session_mut().deselect();
    }

    /// Selected node id, or `""` when nothing is selected.
    #[wasm_bindgen(js_name = selectedId)]
    pub fn selected_id(&self) -> String {
        self.project
            .session()
            .selected()
            .map(|id| id.as_str().to_string())
            .unwrap_or_default()
    }

    /// New expand state of `node_id`, or false for ids not in the page.
    #[wasm_bindgen(js_name = toggleExpanded)]
    pub fn toggle_expanded(&mut self, node_id: &str) -> bool {
        NodeId::lookup(node_id)
            .and_then(|id| self.project.session_mut().toggle_expanded(id))
            .unwrap_or(false)
    }

    /// Visible outline rows as a JSON array.
    #[wasm_bindgen(js_name = outlineJson)]
    pub fn outline_json(&self) -> String {
        serde_json::to_string(&self.project.session().outline()).unwrap_or_else(|_| "[]".to_string())
    }

    // ─── Templates ───────────────────────────────────────────────────────

    #[wasm_bindgen(js_name = templateNames)]
    pub fn template_names(&self) -> String {
        let names: Vec<String> = builtin_templates().into_iter().map(|t| t.name).collect();
        json!(names).to_string()
    }

    #[wasm_bindgen(js_name = insertTemplate)]
    pub fn insert_template(&mut self, name: &str, parent_id: &str, index: Option<u32>) -> String {
        let Some(template) = builtin_templates().into_iter().find(|t| t.name == name) else {
            return error_json("TemplateNotFound", &format!("no template named `{name}`"));
        };
        let Some(parent) = NodeId::lookup(parent_id) else {
            return error_json("InvalidParent", &format!("no element `{parent_id}` to insert into"));
        };
        let index = index.map(|i| i as usize);
        let result = self
            .project
            .session_mut()
            .insert_template(&template, parent, index);
        respond_tree(result.map_err(EditorError::from))
    }

    // ─── Pages ───────────────────────────────────────────────────────────

    #[wasm_bindgen(js_name = pageNames)]
    pub fn page_names(&self) -> String {
        json!(self.project.page_names()).to_string()
    }

    #[wasm_bindgen(js_name = activePage)]
    pub fn active_page(&self) -> String {
        self.project.active_page().to_string()
    }

    #[wasm_bindgen(js_name = addPage)]
    pub fn add_page(&mut self, name: &str) -> String {
        respond_unit(self.project.add_page(name))
    }

    #[wasm_bindgen(js_name = removePage)]
    pub fn remove_page(&mut self, name: &str) -> String {
        respond_unit(self.project.remove_page(name))
    }

    #[wasm_bindgen(js_name = renamePage)]
    pub fn rename_page(&mut self, from: &str, to: &str) -> String {
        respond_unit(self.project.rename_page(from, to))
    }

    #[wasm_bindgen(js_name = switchPage)]
    pub fn switch_page(&mut self, name: &str) -> String {
        respond_unit(self.project.switch_page(name))
    }

    /// Load a persisted page document (`Node[]` with one page root).
    #[wasm_bindgen(js_name = loadPage)]
    pub fn load_page(&mut self, name: &str, document: &str) -> String {
        respond_unit(self.project.load_page(name, document))
    }

    /// `{"ok":true,"document":"<json>"}` for the save collaborator.
    #[wasm_bindgen(js_name = exportPage)]
    pub fn export_page(&self, name: &str) -> String {
        match self.project.export_page(name) {
            Ok(document) => json!({ "ok": true, "document": document }).to_string(),
            Err(e) => error_json(e.kind(), &e.to_string()),
        }
    }
}

// ─── Standalone validation (no editor needed) ────────────────────────────

/// Validate a page document. Returns JSON
/// `{"ok":bool,"violations":[{nodeId,message,severity,rule}]}`, where `ok`
/// is false if any error-severity violation is present, or an error object
/// if the JSON itself is malformed.
#[wasm_bindgen(js_name = validateDocument)]
pub fn validate_document(document: &str) -> String {
    let tree: Tree = match serde_json::from_str(document) {
        Ok(tree) => tree,
        Err(e) => return error_json("Json", &e.to_string()),
    };
    let violations = validate_tree(tree.root());
    json!({
        "ok": !sb_core::has_errors(&violations),
        "violations": violations,
    })
    .to_string()
}

// ─── Helpers ─────────────────────────────────────────────────────────────

fn tree_json(tree: &Tree) -> String {
    json!({ "ok": true, "tree": tree }).to_string()
}

fn error_json(kind: &str, message: &str) -> String {
    json!({ "ok": false, "error": { "kind": kind, "message": message } }).to_string()
}

fn respond_tree(result: Result<Tree, EditorError>) -> String {
    match result {
        Ok(tree) => tree_json(&tree),
        Err(e) => error_json(e.kind(), &e.to_string()),
    }
}

fn respond_unit(result: Result<(), EditorError>) -> String {
    match result {
        Ok(()) => json!({ "ok": true }).to_string(),
        Err(e) => error_json(e.kind(), &e.to_string()),
    }
}

/// `Date.now()` in the browser; `SystemTime` is unavailable on wasm32.
fn host_clock() -> Clock {
    #[cfg(target_arch = "wasm32")]
    {
        std::rc::Rc::new(|| js_sys::Date::now() as u64)
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        sb_editor::history::system_clock()
    }
}

fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("Site Builder WASM panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(s: &str) -> serde_json::Value {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn apply_operation_roundtrip() {
        let mut editor = SiteEditor::new(None).unwrap();
        let out = parse(&editor.apply_operation(
            r#"{"op":"insert","parentId":"root","node":{"id":"w_s1","type":"section"}}"#,
        ));
        assert_eq!(out["ok"], json!(true));
        assert_eq!(out["tree"][0]["children"][0]["id"], json!("w_s1"));
        assert!(editor.can_undo());

        let err = parse(&editor.apply_operation(r#"{"op":"remove","nodeId":"root"}"#));
        assert_eq!(err["error"]["kind"], json!("CannotRemoveRoot"));

        let bad = parse(&editor.apply_operation(r#"{"op":"explode"}"#));
        assert_eq!(bad["error"]["kind"], json!("InvalidOperation"));
    }

    #[test]
    fn negative_index_reports_out_of_range() {
        let mut editor = SiteEditor::new(None).unwrap();
        let out = parse(&editor.apply_operation(
            r#"{"op":"insert","parentId":"root","node":{"id":"w_neg","type":"section"},"index":-1}"#,
        ));
        assert_eq!(out["ok"], json!(false));
        assert_eq!(out["error"]["kind"], json!("IndexOutOfRange"));
        assert!(!editor.can_undo());

        let far = parse(&editor.apply_operation(
            r#"{"op":"insert","parentId":"root","node":{"id":"w_far","type":"section"},"index":5}"#,
        ));
        assert_eq!(far["error"]["kind"], json!("IndexOutOfRange"));
    }

    #[test]
    fn unknown_ids_are_not_interned() {
        let mut editor = SiteEditor::new(None).unwrap();
        assert!(!editor.select("w_never_seen_select"));
        assert!(!editor.toggle_expanded("w_never_seen_toggle"));
        let out = parse(&editor.insert_template("hero", "w_never_seen_parent", None));
        assert_eq!(out["error"]["kind"], json!("InvalidParent"));
        for s in ["w_never_seen_select", "w_never_seen_toggle", "w_never_seen_parent"] {
            assert!(NodeId::lookup(s).is_none(), "{s} was interned");
        }

        assert!(editor.select("root"));
        assert!(!editor.toggle_expanded("root"));
        assert!(editor.toggle_expanded("root"));
    }

    #[test]
    fn unsubscribe_by_returned_id() {
        let editor = SiteEditor::new(None).unwrap();
        let sub = editor.project.subscribe(|_| {});
        let id = sub.id() as f64;
        assert!(editor.unsubscribe(id));
        assert!(!editor.unsubscribe(id));
    }

    #[test]
    fn handle_key_reports_action() {
        let mut editor = SiteEditor::new(Some(r#"{"historyLimit":10}"#.to_string())).unwrap();
        editor.apply_operation(r#"{"op":"insert","parentId":"root","node":{"id":"w_k1","type":"section"}}"#);

        let out = parse(&editor.handle_key("z", true, false, false, false));
        assert_eq!(out["action"], json!("undo"));
        assert_eq!(out["changed"], json!(true));

        let out = parse(&editor.handle_key("s", false, false, false, true));
        assert_eq!(out["save"], json!(true));

        let out = parse(&editor.handle_key("q", false, false, false, false));
        assert_eq!(out["action"], json!("none"));
    }

    #[test]
    fn stale_token_over_bridge() {
        let mut editor = SiteEditor::new(None).unwrap();
        let token = editor.token();
        parse(&editor.add_page("about"));
        parse(&editor.switch_page("about"));
        let out = parse(&editor.apply_deferred(
            token,
            r#"{"op":"insert","parentId":"root","node":{"id":"w_late","type":"section"}}"#,
        ));
        assert_eq!(out["error"]["kind"], json!("StaleSession"));
    }

    #[test]
    fn validate_document_reports_violations() {
        let out = parse(&validate_document(
            r#"[{"id":"root","type":"page","children":[{"id":"w_t","type":"text"}]}]"#,
        ));
        assert_eq!(out["ok"], json!(false));
        assert_eq!(out["violations"][0]["rule"], json!("forbidden-child"));
        assert_eq!(out["violations"][0]["nodeId"], json!("w_t"));

        let out = parse(&validate_document("not json"));
        assert_eq!(out["error"]["kind"], json!("Json"));
    }

    #[test]
    fn templates_and_outline() {
        let mut editor = SiteEditor::new(None).unwrap();
        let names = parse(&editor.template_names());
        assert_eq!(names, json!(["hero", "two-columns", "call-to-action"]));

        let out = parse(&editor.insert_template("two-columns", "root", None));
        assert_eq!(out["ok"], json!(true));
        let rows = parse(&editor.outline_json());
        assert_eq!(rows[0]["id"], json!("root"));
        assert_eq!(rows.as_array().unwrap().len(), 6);
        assert!(!editor.selected_id().is_empty());
    }
}
