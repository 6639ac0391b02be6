//! Host scene-graph boundary
//!
//! The compiler never talks to a design tool directly. Everything it reads
//! (nodes, variables, paint styles, exported asset bytes) and the per-node
//! key/value store it uses as the durable cache tier go through
//! [`SceneGraph`]. [`Document`] is the in-memory implementation backed by a
//! JSON snapshot.

mod document;

pub use document::{Document, DocumentBuilder};

use crate::error::Result;
use crate::types::{AssetFormat, ComponentPropertyType, NodeId, NodeKind, PropertyDefinition, PropertyValue};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn default_true() -> bool {
    true
}

fn default_one() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    #[serde(default = "default_one")]
    pub a: f64,
}

impl Rgba {
    pub fn rgb(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b, a: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Paint {
    Solid {
        color: Rgba,
        #[serde(default = "default_true")]
        visible: bool,
        #[serde(default, rename = "boundVariable", skip_serializing_if = "Option::is_none")]
        bound_variable: Option<NodeId>,
    },
    Image {
        #[serde(default, rename = "imageHash")]
        image_hash: String,
    },
    #[serde(other)]
    Other,
}

impl Paint {
    pub fn solid(color: Rgba) -> Self {
        Self::Solid {
            color,
            visible: true,
            bound_variable: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LayoutMode {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AxisAlign {
    #[default]
    Min,
    Center,
    Max,
    SpaceBetween,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoLayout {
    pub mode: LayoutMode,
    #[serde(default)]
    pub item_spacing: f64,
    #[serde(default)]
    pub padding_top: f64,
    #[serde(default)]
    pub padding_right: f64,
    #[serde(default)]
    pub padding_bottom: f64,
    #[serde(default)]
    pub padding_left: f64,
    #[serde(default)]
    pub primary_axis_align: AxisAlign,
    #[serde(default)]
    pub counter_axis_align: AxisAlign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SizingMode {
    Fixed,
    #[default]
    Hug,
    Fill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sizing {
    #[serde(default)]
    pub horizontal: SizingMode,
    #[serde(default)]
    pub vertical: SizingMode,
}

impl Sizing {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
    Justified,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextStyle {
    #[serde(default)]
    pub characters: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_height: Option<f64>,
    #[serde(default)]
    pub letter_spacing: f64,
    #[serde(default)]
    pub text_align: TextAlign,
}

/// Property keys a node's attributes are bound to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyReferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub characters: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_component: Option<String>,
}

impl PropertyReferences {
    pub fn is_empty(&self) -> bool {
        self.visible.is_none() && self.characters.is_none() && self.main_component.is_none()
    }
}

/// Concrete property value set on an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceProperty {
    #[serde(rename = "type")]
    pub kind: ComponentPropertyType,
    pub value: PropertyValue,
    /// Key of the enclosing component's property this value is bound to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub trigger: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Pre-rendered export of an asset node. SVG data is markup, PNG data is base64.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedAsset {
    pub format: AssetFormat,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneNode {
    pub id: NodeId,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(skip)]
    pub parent: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeId>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documentation_links: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<AutoLayout>,
    #[serde(default, skip_serializing_if = "Sizing::is_default")]
    pub sizing: Sizing,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fills: Vec<Paint>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strokes: Vec<Paint>,
    #[serde(default)]
    pub stroke_weight: f64,
    #[serde(default)]
    pub corner_radius: f64,
    #[serde(default = "default_one")]
    pub opacity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextStyle>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub property_definitions: IndexMap<String, PropertyDefinition>,
    #[serde(default, skip_serializing_if = "PropertyReferences::is_empty")]
    pub property_references: PropertyReferences,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub component_properties: IndexMap<String, InstanceProperty>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variant_properties: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_component: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<Reaction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportedAsset>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub plugin_data: BTreeMap<String, BTreeMap<String, String>>,
}

impl SceneNode {
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            parent: None,
            children: Vec::new(),
            visible: true,
            width: 0.0,
            height: 0.0,
            description: String::new(),
            documentation_links: Vec::new(),
            layout: None,
            sizing: Sizing::default(),
            fills: Vec::new(),
            strokes: Vec::new(),
            stroke_weight: 0.0,
            corner_radius: 0.0,
            opacity: 1.0,
            text: None,
            property_definitions: IndexMap::new(),
            property_references: PropertyReferences::default(),
            component_properties: IndexMap::new(),
            variant_properties: IndexMap::new(),
            main_component: None,
            reactions: Vec::new(),
            export: None,
            plugin_data: BTreeMap::new(),
        }
    }

    /// Whether this node is a member of a variant set.
    pub fn is_variant_member(&self) -> bool {
        !self.variant_properties.is_empty()
    }

    /// `Prop=Value` pairs joined by `, `, falling back to the node name.
    pub fn variant_key(&self) -> String {
        if self.variant_properties.is_empty() {
            return self.name.clone();
        }
        self.variant_properties
            .iter()
            .map(|(prop, value)| format!("{}={}", prop, value))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableMode {
    pub mode_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableCollection {
    pub id: NodeId,
    pub name: String,
    pub modes: Vec<VariableMode>,
    pub default_mode_id: String,
    #[serde(default)]
    pub variable_ids: Vec<NodeId>,
}

impl VariableCollection {
    pub fn default_mode(&self) -> Option<&VariableMode> {
        self.modes.iter().find(|m| m.mode_id == self.default_mode_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableType {
    Color,
    Float,
    String,
    Boolean,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VariableValue {
    Color(Rgba),
    VariableAlias { id: NodeId },
    Float { value: f64 },
    String { value: String },
    Boolean { value: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub resolved_type: VariableType,
    #[serde(default)]
    pub values_by_mode: IndexMap<String, VariableValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaintStyle {
    pub id: NodeId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub paints: Vec<Paint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Create,
    Delete,
    PropertyChange,
    StyleCreate,
    StyleDelete,
    StylePropertyChange,
}

/// One record of a document-change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentChange {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub node: NodeId,
    #[serde(default)]
    pub properties: Vec<String>,
    #[serde(default)]
    pub removed: bool,
}

impl DocumentChange {
    pub fn create(node: impl Into<NodeId>) -> Self {
        Self {
            kind: ChangeKind::Create,
            node: node.into(),
            properties: Vec::new(),
            removed: false,
        }
    }

    pub fn property_change<S: Into<String>>(
        node: impl Into<NodeId>,
        properties: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            kind: ChangeKind::PropertyChange,
            node: node.into(),
            properties: properties.into_iter().map(Into::into).collect(),
            removed: false,
        }
    }

    pub fn delete(node: impl Into<NodeId>) -> Self {
        Self {
            kind: ChangeKind::Delete,
            node: node.into(),
            properties: Vec::new(),
            removed: true,
        }
    }
}

/// Accessors the compiler needs from the host scene graph.
pub trait SceneGraph {
    fn node(&self, id: &str) -> Option<&SceneNode>;

    /// All node ids of `kind`, in document order.
    fn find_all(&self, kind: NodeKind) -> Vec<NodeId>;

    fn pages(&self) -> Vec<&SceneNode>;

    /// Currently selected node ids in the host UI.
    fn selection(&self) -> &[NodeId];

    fn variable_collections(&self) -> &[VariableCollection];

    fn variable(&self, id: &str) -> Option<&Variable>;

    fn paint_styles(&self) -> &[PaintStyle];

    /// Rendered bytes of an asset node, if the host could export it.
    fn export_asset(&self, id: &str) -> Result<Option<(AssetFormat, Vec<u8>)>>;

    fn plugin_data(&self, id: &str, namespace: &str, key: &str) -> Option<String>;

    fn set_plugin_data(&mut self, id: &str, namespace: &str, key: &str, value: String) -> Result<()>;

    /// Replace the icons page with one `set:name` component per SVG. Returns the count created.
    fn import_icons(&mut self, set: &str, icons: &IndexMap<String, String>) -> Result<usize>;

    fn parent(&self, id: &str) -> Option<&SceneNode> {
        let parent = self.node(id)?.parent.as_deref()?;
        self.node(parent)
    }

    fn children(&self, id: &str) -> Vec<&SceneNode> {
        self.node(id)
            .map(|node| node.children.iter().filter_map(|c| self.node(c)).collect())
            .unwrap_or_default()
    }

    /// Nearest strict ancestor of `kind`.
    fn ancestor_of_kind(&self, id: &str, kind: NodeKind) -> Option<&SceneNode> {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if node.kind == kind {
                return Some(node);
            }
            current = self.parent(&node.id);
        }
        None
    }

    fn page_of(&self, id: &str) -> Option<&SceneNode> {
        self.ancestor_of_kind(id, NodeKind::Page)
    }

    fn collection_named(&self, name: &str) -> Option<&VariableCollection> {
        self.variable_collections().iter().find(|c| c.name == name)
    }
}
