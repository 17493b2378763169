//! Reusable element templates.
//!
//! A template is a stored subtree. Instantiating it gives a copy with fresh
//! ids (anchors inside the template are remapped to the copy), so the same
//! template can be dropped into a page any number of times.

use crate::model::{Device, ElementKind, Node};
use crate::ops::clone_with_fresh_ids;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub root: Node,
}

impl Template {
    pub fn new(name: impl Into<String>, root: Node) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }

    /// Capture an existing subtree as a template (e.g. "save section as template").
    pub fn from_subtree(name: impl Into<String>, node: &Node) -> Self {
        Self::new(name, node.clone())
    }

    /// A fresh copy ready to be inserted into a page.
    pub fn instantiate(&self) -> Node {
        clone_with_fresh_ids(&self.root)
    }

    pub fn kind(&self) -> ElementKind {
        self.root.kind
    }
}

/// Section templates shipped with the editor.
pub fn builtin_templates() -> Vec<Template> {
    vec![hero(), two_columns(), call_to_action()]
}

fn hero() -> Template {
    let inner = Node::new("tpl_hero_body", ElementKind::Container)
        .with_style("textAlign", "center")
        .with_child(
            Node::new("tpl_hero_title", ElementKind::Heading)
                .with_content("text", "Build something great")
                .with_content("level", 1)
                .with_style("fontSize", 48)
                .with_device_style(Device::Mobile, "fontSize", 32),
        )
        .with_child(
            Node::new("tpl_hero_lead", ElementKind::Text)
                .with_content("text", "A short sentence about what you offer."),
        )
        .with_child(
            Node::new("tpl_hero_cta", ElementKind::Button)
                .with_content("label", "Get started")
                .with_content("href", "#"),
        );
    Template::new(
        "hero",
        Node::new("tpl_hero", ElementKind::Section)
            .with_content("name", "Hero")
            .with_style("padding", "96px 24px")
            .with_device_style(Device::Mobile, "padding", "48px 16px")
            .with_child(inner),
    )
}

fn two_columns() -> Template {
    let column = |id: &str, text_id: &str| {
        Node::new(id, ElementKind::Column)
            .with_content("span", 6)
            .with_child(Node::new(text_id, ElementKind::Text).with_content("text", "Column text"))
    };
    Template::new(
        "two-columns",
        Node::new("tpl_two", ElementKind::Section)
            .with_content("name", "Two columns")
            .with_device_style(Device::Mobile, "flexDirection", "column")
            .with_child(column("tpl_two_left", "tpl_two_left_text"))
            .with_child(column("tpl_two_right", "tpl_two_right_text")),
    )
}

fn call_to_action() -> Template {
    Template::new(
        "call-to-action",
        Node::new("tpl_cta", ElementKind::Section)
            .with_content("name", "Call to action")
            .with_style("backgroundColor", "#eff6ff")
            .with_child(
                Node::new("tpl_cta_col", ElementKind::Column)
                    .with_child(
                        Node::new("tpl_cta_title", ElementKind::Heading)
                            .with_content("text", "Ready to start?")
                            .with_content("level", 2),
                    )
                    .with_child(
                        Node::new("tpl_cta_button", ElementKind::Button)
                            .with_content("label", "Back to top")
                            .with_content("anchor", "tpl_cta_title"),
                    ),
            ),
    )
}
