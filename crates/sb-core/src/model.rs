//! Element data model for Site Builder pages.
//!
//! A page is a tree of `Node` values. Each node has a closed `ElementKind`
//! tag; what a kind may contain, which content fields it exposes, and its
//! default look all come from lookup tables on `ElementKind` rather than
//! from per-type structs. Children are held in `Arc` so that unchanged
//! subtrees can be shared between tree versions (see `crate::ops`).

use crate::id::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// ─── Scalar values ───────────────────────────────────────────────────────

/// A style or content value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
}

/// The type of a `Value`, used by the content field table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Number,
    Text,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::Text(_) => ValueKind::Text,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// JSON has no NaN or infinity; such numbers would silently become `null`.
    pub fn is_representable(&self) -> bool {
        match self {
            Value::Number(n) => n.is_finite(),
            _ => true,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Compile-time literal for the default tables.
#[derive(Debug, Clone, Copy)]
enum Lit {
    Num(f64),
    Str(&'static str),
}

impl Lit {
    fn to_value(self) -> Value {
        match self {
            Lit::Num(n) => Value::Number(n),
            Lit::Str(s) => Value::Text(s.to_string()),
        }
    }
}

// ─── Element kinds ───────────────────────────────────────────────────────

/// The closed set of element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Root of a page. Exactly one per tree, never a child.
    Page,
    Section,
    Column,
    Container,
    Heading,
    Text,
    Button,
    Image,
    Divider,
    Spacer,
}

/// A content field a kind accepts, with the value type it requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentField {
    pub name: &'static str,
    pub kind: ValueKind,
}

const fn field(name: &'static str, kind: ValueKind) -> ContentField {
    ContentField { name, kind }
}

const WIDGETS: &[ElementKind] = &[
    ElementKind::Container,
    ElementKind::Heading,
    ElementKind::Text,
    ElementKind::Button,
    ElementKind::Image,
    ElementKind::Divider,
    ElementKind::Spacer,
];

const PAGE_FIELDS: &[ContentField] = &[
    field("title", ValueKind::Text),
    field("slug", ValueKind::Text),
];
const SECTION_FIELDS: &[ContentField] = &[field("name", ValueKind::Text)];
const COLUMN_FIELDS: &[ContentField] = &[field("span", ValueKind::Number)];
const HEADING_FIELDS: &[ContentField] = &[
    field("text", ValueKind::Text),
    field("level", ValueKind::Number),
];
const TEXT_FIELDS: &[ContentField] = &[field("text", ValueKind::Text)];
const BUTTON_FIELDS: &[ContentField] = &[
    field("label", ValueKind::Text),
    field("href", ValueKind::Text),
    field("anchor", ValueKind::Text),
    field("newTab", ValueKind::Bool),
];
const IMAGE_FIELDS: &[ContentField] = &[
    field("src", ValueKind::Text),
    field("alt", ValueKind::Text),
];

impl ElementKind {
    pub const ALL: [ElementKind; 10] = [
        ElementKind::Page,
        ElementKind::Section,
        ElementKind::Column,
        ElementKind::Container,
        ElementKind::Heading,
        ElementKind::Text,
        ElementKind::Button,
        ElementKind::Image,
        ElementKind::Divider,
        ElementKind::Spacer,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Page => "page",
            ElementKind::Section => "section",
            ElementKind::Column => "column",
            ElementKind::Container => "container",
            ElementKind::Heading => "heading",
            ElementKind::Text => "text",
            ElementKind::Button => "button",
            ElementKind::Image => "image",
            ElementKind::Divider => "divider",
            ElementKind::Spacer => "spacer",
        }
    }

    /// Kinds this kind may hold as direct children.
    pub fn allowed_children(self) -> &'static [ElementKind] {
        match self {
            ElementKind::Page => &[ElementKind::Section],
            ElementKind::Section => &[ElementKind::Column, ElementKind::Container],
            ElementKind::Column | ElementKind::Container => WIDGETS,
            ElementKind::Heading
            | ElementKind::Text
            | ElementKind::Button
            | ElementKind::Image
            | ElementKind::Divider
            | ElementKind::Spacer => &[],
        }
    }

    pub fn allows_child(self, child: ElementKind) -> bool {
        self.allowed_children().contains(&child)
    }

    pub fn is_leaf(self) -> bool {
        self.allowed_children().is_empty()
    }

    /// Editable content fields for this kind.
    pub fn content_fields(self) -> &'static [ContentField] {
        match self {
            ElementKind::Page => PAGE_FIELDS,
            ElementKind::Section => SECTION_FIELDS,
            ElementKind::Column => COLUMN_FIELDS,
            ElementKind::Heading => HEADING_FIELDS,
            ElementKind::Text => TEXT_FIELDS,
            ElementKind::Button => BUTTON_FIELDS,
            ElementKind::Image => IMAGE_FIELDS,
            ElementKind::Container | ElementKind::Divider | ElementKind::Spacer => &[],
        }
    }

    /// The required value type of `name`, or `None` if the field is unknown.
    pub fn content_field(self, name: &str) -> Option<ValueKind> {
        self.content_fields()
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.kind)
    }

    fn default_style_table(self) -> &'static [(&'static str, Lit)] {
        match self {
            ElementKind::Page => &[
                ("backgroundColor", Lit::Str("#ffffff")),
                ("fontFamily", Lit::Str("Inter, sans-serif")),
            ],
            ElementKind::Section => &[
                ("display", Lit::Str("flex")),
                ("padding", Lit::Str("48px 24px")),
            ],
            ElementKind::Column => &[
                ("display", Lit::Str("flex")),
                ("flexDirection", Lit::Str("column")),
                ("gap", Lit::Num(16.0)),
            ],
            ElementKind::Container => &[("padding", Lit::Str("16px"))],
            ElementKind::Heading => &[
                ("color", Lit::Str("#111827")),
                ("fontSize", Lit::Num(32.0)),
                ("fontWeight", Lit::Num(700.0)),
            ],
            ElementKind::Text => &[
                ("color", Lit::Str("#374151")),
                ("fontSize", Lit::Num(16.0)),
                ("lineHeight", Lit::Num(1.5)),
            ],
            ElementKind::Button => &[
                ("backgroundColor", Lit::Str("#2563eb")),
                ("borderRadius", Lit::Num(6.0)),
                ("color", Lit::Str("#ffffff")),
                ("padding", Lit::Str("12px 24px")),
            ],
            ElementKind::Image => &[
                ("objectFit", Lit::Str("cover")),
                ("width", Lit::Str("100%")),
            ],
            ElementKind::Divider => &[("borderTop", Lit::Str("1px solid #e5e7eb"))],
            ElementKind::Spacer => &[("height", Lit::Num(32.0))],
        }
    }

    /// Type-level default style, the last step of style resolution.
    pub fn default_style(self) -> StyleMap {
        self.default_style_table()
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.to_value()))
            .collect()
    }

    /// Content a freshly created element starts with.
    pub fn default_content(self) -> Content {
        let mut content = Content::default();
        match self {
            ElementKind::Heading => {
                content.set("text", "Heading");
                content.set("level", 2);
            }
            ElementKind::Text => content.set("text", "Add your text here"),
            ElementKind::Button => {
                content.set("label", "Click me");
                content.set("href", "#");
            }
            ElementKind::Image => {
                content.set("src", "");
                content.set("alt", "");
            }
            _ => {}
        }
        content
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Styling ─────────────────────────────────────────────────────────────

/// Property name → value. Ordered so serialized output is stable.
pub type StyleMap = BTreeMap<String, Value>;

/// Responsive breakpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Desktop,
    Tablet,
    Mobile,
}

impl Device {
    pub const ALL: [Device; 3] = [Device::Desktop, Device::Tablet, Device::Mobile];

    pub fn as_str(self) -> &'static str {
        match self {
            Device::Desktop => "desktop",
            Device::Tablet => "tablet",
            Device::Mobile => "mobile",
        }
    }
}

/// Sparse per-breakpoint overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Responsive {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub desktop: StyleMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tablet: StyleMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mobile: StyleMap,
}

impl Responsive {
    pub fn get(&self, device: Device) -> &StyleMap {
        match device {
            Device::Desktop => &self.desktop,
            Device::Tablet => &self.tablet,
            Device::Mobile => &self.mobile,
        }
    }

    pub fn get_mut(&mut self, device: Device) -> &mut StyleMap {
        match device {
            Device::Desktop => &mut self.desktop,
            Device::Tablet => &mut self.tablet,
            Device::Mobile => &mut self.mobile,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.desktop.is_empty() && self.tablet.is_empty() && self.mobile.is_empty()
    }
}

/// Key under which the breakpoint overrides are stored in the style object.
pub const RESPONSIVE_KEY: &str = "responsive";

/// A node's own style: base properties plus breakpoint overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Style {
    #[serde(flatten)]
    pub base: StyleMap,
    #[serde(default, rename = "responsive", skip_serializing_if = "Responsive::is_empty")]
    pub responsive: Responsive,
}

impl Style {
    /// Overwrite keys of `patch` into the base style, or into the override
    /// for `device`. Keys absent from `patch` are untouched.
    pub fn merge(&mut self, patch: &StyleMap, device: Option<Device>) {
        let target = match device {
            Some(d) => self.responsive.get_mut(d),
            None => &mut self.base,
        };
        for (k, v) in patch {
            target.insert(k.clone(), v.clone());
        }
    }

    fn values(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.base.iter().chain(
            Device::ALL
                .into_iter()
                .flat_map(move |d| self.responsive.get(d).iter()),
        )
    }
}

// ─── Content ─────────────────────────────────────────────────────────────

/// Type-specific payload (text, image source, button label and link, …).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Content(pub BTreeMap<String, Value>);

impl Content {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.0.insert(field.to_string(), value.into());
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ─── Nodes ───────────────────────────────────────────────────────────────

/// Content field holding the id of another node (in-page anchor link).
pub const ANCHOR_FIELD: &str = "anchor";

/// One element of the page tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,

    #[serde(rename = "type")]
    pub kind: ElementKind,

    #[serde(default)]
    pub style: Style,

    #[serde(default)]
    pub content: Content,

    /// Ordered children. Shared between tree versions until changed.
    #[serde(default)]
    pub children: Vec<Arc<Node>>,
}

impl Node {
    /// A bare node with empty style and content.
    pub fn new(id: impl Into<NodeId>, kind: ElementKind) -> Self {
        Self {
            id: id.into(),
            kind,
            style: Style::default(),
            content: Content::default(),
            children: Vec::new(),
        }
    }

    /// A node with a fresh id and the kind's default content.
    pub fn create(kind: ElementKind) -> Self {
        let mut node = Self::new(NodeId::fresh(kind.as_str()), kind);
        node.content = kind.default_content();
        node
    }

    pub fn with_style(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.style.base.insert(key.to_string(), value.into());
        self
    }

    pub fn with_device_style(mut self, device: Device, key: &str, value: impl Into<Value>) -> Self {
        self.style
            .responsive
            .get_mut(device)
            .insert(key.to_string(), value.into());
        self
    }

    pub fn with_content(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.content.set(field, value);
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(Arc::new(child));
        self
    }

    /// Resolve the effective style for `device`:
    /// device override → base style → type default.
    pub fn resolved_style(&self, device: Device) -> StyleMap {
        let mut resolved = self.kind.default_style();
        for (k, v) in &self.style.base {
            resolved.insert(k.clone(), v.clone());
        }
        for (k, v) in self.style.responsive.get(device) {
            resolved.insert(k.clone(), v.clone());
        }
        resolved
    }

    /// Depth-first pre-order visit of this subtree.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&'a Node, usize)) {
        fn go<'a>(node: &'a Node, depth: usize, f: &mut impl FnMut(&'a Node, usize)) {
            f(node, depth);
            for child in &node.children {
                go(child, depth + 1, f);
            }
        }
        go(self, 0, f);
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        let mut n = 0;
        self.walk(&mut |_, _| n += 1);
        n
    }

    /// First style or content value on this node (not its children) that
    /// JSON cannot represent, described for diagnostics.
    pub fn unrepresentable_value(&self) -> Option<String> {
        if let Some((k, v)) = self.style.values().find(|(_, v)| !v.is_representable()) {
            return Some(format!("style `{k}` = {v:?}"));
        }
        self.content
            .iter()
            .find(|(_, v)| !v.is_representable())
            .map(|(k, v)| format!("content `{k}` = {v:?}"))
    }
}
