//! Core types and constants for the scene compiler

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a scene node (survives renames and moves, not deletion).
pub type NodeId = String;

/// Ordered style property map; insertion order is emission order.
pub type StyleMap = IndexMap<String, StyleValue>;

// Emission constants
pub const ROOT_SLUG: &str = "root";
pub const STYLE_PREFIX: &str = "styles";
pub const CLASSES_PREFIX: &str = "classes";
pub const FRAMEWORK_PACKAGE: &str = "react";
pub const PRIMITIVES_PACKAGE: &str = "react-native";
pub const TRANSLATE_PACKAGE: &str = "@lingui/macro";
pub const TRANSLATE_TAG: &str = "Trans";
pub const THEME_MODULE: &str = "./theme";

/// Fixed breakpoint scale written into every theme module.
pub const BREAKPOINTS: [(&str, u32); 5] = [
    ("xs", 0),
    ("sm", 576),
    ("md", 768),
    ("lg", 992),
    ("xl", 1200),
];

// Scene graph constants
pub const DEFAULT_PAGE_SEGMENT: &str = "common";
pub const DEFAULT_SECTION_SEGMENT: &str = "base";
pub const ICONS_PAGE_NAME: &str = "Icons";
pub const PLUGIN_DATA_PROPERTY: &str = "pluginData";

/// Kind of a scene node as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Document,
    Page,
    Section,
    Frame,
    Group,
    Component,
    ComponentSet,
    Instance,
    Text,
    Rectangle,
    Ellipse,
    Vector,
    BooleanOperation,
    Star,
    Line,
    Polygon,
    Image,
    #[serde(other)]
    Unknown,
}

impl NodeKind {
    /// Nodes rendered as a single exported asset instead of markup.
    pub fn is_asset(self) -> bool {
        matches!(
            self,
            Self::Vector
                | Self::BooleanOperation
                | Self::Star
                | Self::Line
                | Self::Polygon
                | Self::Image
        )
    }
}

/// Semantic tag family a node is emitted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    View,
    Text,
    Image,
    Svg,
}

impl Primitive {
    /// The root container tag every component renders.
    pub const CONTAINER: Primitive = Primitive::View;

    pub fn for_kind(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Component
            | NodeKind::Instance
            | NodeKind::Rectangle
            | NodeKind::Ellipse
            | NodeKind::Frame
            | NodeKind::Group => Self::View,
            NodeKind::Text => Self::Text,
            NodeKind::Image => Self::Image,
            NodeKind::Vector => Self::Svg,
            _ => Self::View,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::View => "View",
            Self::Text => "Text",
            Self::Image => "Image",
            Self::Svg => "Svg",
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Type of a component property definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentPropertyType {
    Boolean,
    Text,
    InstanceSwap,
    Variant,
}

impl ComponentPropertyType {
    /// Host type token, used for ordering and the fallback type mapping.
    pub fn token(self) -> &'static str {
        match self {
            Self::Boolean => "BOOLEAN",
            Self::Text => "TEXT",
            Self::InstanceSwap => "INSTANCE_SWAP",
            Self::Variant => "VARIANT",
        }
    }

    /// Properties that decide whether or what renders rather than how.
    pub fn is_conditional(self) -> bool {
        matches!(self, Self::Boolean | Self::InstanceSwap)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Text(String),
}

impl PropertyValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bool(_) => None,
        }
    }
}

impl Default for PropertyValue {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDefinition {
    #[serde(rename = "type")]
    pub kind: ComponentPropertyType,
    #[serde(default)]
    pub default_value: PropertyValue,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variant_options: Vec<String>,
}

/// Style value as captured from a node.
#[derive(Debug, Clone, PartialEq)]
pub enum StyleValue {
    Number(f64),
    String(String),
    /// Expression into the theme module, emitted verbatim.
    Theme(String),
    /// A base property a variant removes.
    Unset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetFormat {
    Svg,
    Png,
}

impl AssetFormat {
    pub fn mime(self) -> &'static str {
        match self {
            Self::Svg => "image/svg+xml",
            Self::Png => "image/png",
        }
    }
}

/// A captured asset, keyed by content hash for cross-component dedup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    pub id: NodeId,
    pub name: String,
    pub hash: String,
    pub format: AssetFormat,
    pub width: f64,
    pub height: f64,
    /// Data URI of the exported bytes.
    pub data: String,
}

/// Identifies one compiled unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDescriptor {
    /// Id of the compile target (variant set or component).
    pub id: NodeId,
    /// PascalCase component name.
    pub name: String,
    pub page: String,
    pub section: Option<String>,
    /// Slash-separated namespace path, e.g. `components/common/base/button`.
    pub path: String,
    pub is_variant: bool,
    pub is_instance: bool,
    /// Node whose subtree is extracted (default variant for sets).
    pub root_node: NodeId,
    pub property_definitions: IndexMap<String, PropertyDefinition>,
    pub description: String,
    pub documentation_links: Vec<String>,
}

/// Literal or bound value carried onto an instance tag.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Bool(bool),
    Text(String),
    /// Reference to a prop of the component being compiled.
    Prop(String),
    /// Element literal of another component.
    Element(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstanceInfo {
    /// Tag name: PascalCase name of the main component's compile target.
    pub component: String,
    pub attributes: Vec<(String, AttributeValue)>,
    /// Icon name when the main component is an imported icon source.
    pub icon: Option<String>,
    pub width: f64,
    pub height: f64,
}

/// What the emitter needs to know about one visited node.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseNode {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub tag: Primitive,
    pub slug: String,
    /// Prop bound to the node's visibility.
    pub visibility_prop: Option<String>,
    /// Prop bound to the instance's main-component choice.
    pub swap_prop: Option<String>,
    /// Prop bound to the text characters.
    pub text_prop: Option<String>,
    pub characters: Option<String>,
    pub instance: Option<InstanceInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseNodeEntry {
    pub node: ParseNode,
    /// `None` when the node was not recursed into or had no eligible children.
    pub children: Option<Vec<ParseNodeEntry>>,
    pub is_asset: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseMeta {
    pub primitives: IndexSet<Primitive>,
    /// Referenced sub-components: target id -> PascalCase name.
    pub components: IndexMap<NodeId, String>,
    pub icons: IndexSet<String>,
}

/// Intermediate representation of one component.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseModel {
    pub root: ParseNode,
    pub tree: Vec<ParseNodeEntry>,
    pub styles: IndexMap<String, StyleMap>,
    pub variants: IndexMap<String, IndexMap<String, StyleMap>>,
    pub assets: IndexMap<NodeId, AssetRef>,
    pub links: IndexMap<String, String>,
    pub meta: ParseMeta,
}

impl ParseModel {
    pub fn uses_primitive(&self, primitive: Primitive) -> bool {
        self.meta.primitives.contains(&primitive)
    }

    /// Whether any variant modifier is recorded for `slug`.
    pub fn has_variant_styles(&self, slug: &str) -> bool {
        self.variants
            .get(slug)
            .map_or(false, |mods| mods.values().any(|styles| !styles.is_empty()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleIcons {
    /// Icon name -> id of the icon source component.
    pub map: IndexMap<String, NodeId>,
    pub list: Vec<String>,
    pub used: Vec<String>,
}

/// Complete compiled output for one component. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentBundle {
    pub id: NodeId,
    pub name: String,
    pub page: String,
    pub path: String,
    pub code: String,
    pub theme: String,
    pub preview: String,
    pub links: IndexMap<String, String>,
    pub icons: BundleIcons,
    pub assets: IndexMap<String, AssetRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_mapping() {
        assert_eq!(Primitive::for_kind(NodeKind::Component).tag(), "View");
        assert_eq!(Primitive::for_kind(NodeKind::Instance).tag(), "View");
        assert_eq!(Primitive::for_kind(NodeKind::Rectangle).tag(), "View");
        assert_eq!(Primitive::for_kind(NodeKind::Ellipse).tag(), "View");
        assert_eq!(Primitive::for_kind(NodeKind::Frame).tag(), "View");
        assert_eq!(Primitive::for_kind(NodeKind::Group).tag(), "View");
        assert_eq!(Primitive::for_kind(NodeKind::Text).tag(), "Text");
        assert_eq!(Primitive::for_kind(NodeKind::Image).tag(), "Image");
        assert_eq!(Primitive::for_kind(NodeKind::Vector).tag(), "Svg");
        assert_eq!(Primitive::for_kind(NodeKind::Star).tag(), "View");
        assert_eq!(Primitive::for_kind(NodeKind::Unknown).tag(), "View");
    }

    #[test]
    fn test_node_kind_parsing() {
        let kind: NodeKind = serde_json::from_str("\"COMPONENT_SET\"").unwrap();
        assert_eq!(kind, NodeKind::ComponentSet);
        let kind: NodeKind = serde_json::from_str("\"STICKY\"").unwrap();
        assert_eq!(kind, NodeKind::Unknown);
        assert!(NodeKind::Vector.is_asset());
        assert!(!NodeKind::Instance.is_asset());
    }

    #[test]
    fn test_conditional_property_types() {
        assert!(ComponentPropertyType::Boolean.is_conditional());
        assert!(ComponentPropertyType::InstanceSwap.is_conditional());
        assert!(!ComponentPropertyType::Text.is_conditional());
        assert!(!ComponentPropertyType::Variant.is_conditional());
    }
}
