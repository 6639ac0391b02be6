//! In-memory scene graph loaded from a JSON snapshot

use super::{
    DocumentChange, ExportedAsset, InstanceProperty, Paint, PaintStyle, PropertyReferences,
    Rgba, SceneGraph, SceneNode, Variable, VariableCollection, VariableMode, VariableType, VariableValue,
};
use crate::error::{CompilerError, Result};
use crate::types::{
    AssetFormat, ComponentPropertyType, NodeId, NodeKind, PropertyDefinition, PropertyValue,
    ICONS_PAGE_NAME,
};
use crate::utils::decode_base64;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

/// Flat node list with child ids; parent links are rebuilt on load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub name: String,
    #[serde(default)]
    pub nodes: Vec<SceneNode>,
    #[serde(default)]
    pub variable_collections: Vec<VariableCollection>,
    #[serde(default)]
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub paint_styles: Vec<PaintStyle>,
    #[serde(default)]
    pub selection: Vec<NodeId>,
    #[serde(skip)]
    index: HashMap<NodeId, usize>,
}

impl Document {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn from_json(source: &str) -> Result<Self> {
        let mut doc: Document = serde_json::from_str(source)?;
        doc.rebuild_index()?;
        Ok(doc)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|e| CompilerError::FileNotFound {
            path: format!("{}: {}", path.display(), e),
        })?;
        let doc = Self::from_json(&source)?;
        log::debug!("Loaded document '{}' with {} nodes", doc.name, doc.nodes.len());
        Ok(doc)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Rebuild the id index and parent links, validating child references.
    fn rebuild_index(&mut self) -> Result<()> {
        self.index.clear();
        for (i, node) in self.nodes.iter().enumerate() {
            if self.index.insert(node.id.clone(), i).is_some() {
                return Err(CompilerError::invalid_document(format!("duplicate node id '{}'", node.id)));
            }
        }

        let mut parents = Vec::new();
        for node in &self.nodes {
            for child in &node.children {
                let Some(&child_index) = self.index.get(child) else {
                    return Err(CompilerError::invalid_document(format!(
                        "node '{}' references missing child '{}'",
                        node.id, child
                    )));
                };
                parents.push((child_index, node.id.clone()));
            }
        }

        for node in &mut self.nodes {
            node.parent = None;
        }
        for (child_index, parent) in parents {
            self.nodes[child_index].parent = Some(parent);
        }
        Ok(())
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut SceneNode> {
        let index = *self.index.get(id)?;
        self.nodes.get_mut(index)
    }

    /// Append `node`, linking it under `parent` when given.
    pub fn add_node(&mut self, mut node: SceneNode, parent: Option<&str>) -> Result<NodeId> {
        if self.index.contains_key(&node.id) {
            return Err(CompilerError::invalid_document(format!("duplicate node id '{}'", node.id)));
        }
        let id = node.id.clone();
        if let Some(parent_id) = parent {
            let parent_node = self
                .node_mut(parent_id)
                .ok_or_else(|| CompilerError::node_not_found(parent_id))?;
            parent_node.children.push(id.clone());
            node.parent = Some(parent_id.to_string());
        }
        self.index.insert(id.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(id)
    }

    /// Remove a node and its whole subtree.
    pub fn remove_node(&mut self, id: &str) -> Result<()> {
        let mut doomed = BTreeSet::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            let node = self
                .node(&current)
                .ok_or_else(|| CompilerError::node_not_found(current.clone()))?;
            stack.extend(node.children.iter().cloned());
            doomed.insert(current);
        }

        self.nodes.retain(|n| !doomed.contains(&n.id));
        for node in &mut self.nodes {
            node.children.retain(|c| !doomed.contains(c));
        }
        self.selection.retain(|s| !doomed.contains(s));
        self.rebuild_index()
    }

    /// Derive change records between two snapshots of the same document.
    pub fn diff(old: &Document, new: &Document) -> Vec<DocumentChange> {
        let mut changes = Vec::new();

        for node in &new.nodes {
            match old.node(&node.id) {
                None => changes.push(DocumentChange::create(node.id.clone())),
                Some(previous) => {
                    let properties = changed_properties(previous, node);
                    if !properties.is_empty() {
                        changes.push(DocumentChange::property_change(node.id.clone(), properties));
                    }
                }
            }
        }

        for node in &old.nodes {
            if new.node(&node.id).is_none() {
                changes.push(DocumentChange::delete(node.id.clone()));
            }
        }

        changes
    }

    /// Carry durable cache entries over from a previous snapshot of this document.
    pub fn adopt_plugin_data(&mut self, previous: &Document) {
        for node in &mut self.nodes {
            if !node.plugin_data.is_empty() {
                continue;
            }
            if let Some(old) = previous.node(&node.id) {
                node.plugin_data = old.plugin_data.clone();
            }
        }
    }
}

/// Top-level serialized fields that differ between two versions of a node.
fn changed_properties(old: &SceneNode, new: &SceneNode) -> Vec<String> {
    let old_value = serde_json::to_value(old).unwrap_or_default();
    let new_value = serde_json::to_value(new).unwrap_or_default();
    let (Some(old_fields), Some(new_fields)) = (old_value.as_object(), new_value.as_object()) else {
        return Vec::new();
    };

    let keys: BTreeSet<&String> = old_fields.keys().chain(new_fields.keys()).collect();
    keys.into_iter()
        .filter(|key| old_fields.get(*key) != new_fields.get(*key))
        .cloned()
        .collect()
}

impl SceneGraph for Document {
    fn node(&self, id: &str) -> Option<&SceneNode> {
        self.index.get(id).and_then(|&i| self.nodes.get(i))
    }

    fn find_all(&self, kind: NodeKind) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.kind == kind)
            .map(|n| n.id.clone())
            .collect()
    }

    fn pages(&self) -> Vec<&SceneNode> {
        self.nodes.iter().filter(|n| n.kind == NodeKind::Page).collect()
    }

    fn selection(&self) -> &[NodeId] {
        &self.selection
    }

    fn variable_collections(&self) -> &[VariableCollection] {
        &self.variable_collections
    }

    fn variable(&self, id: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.id == id)
    }

    fn paint_styles(&self) -> &[PaintStyle] {
        &self.paint_styles
    }

    fn export_asset(&self, id: &str) -> Result<Option<(AssetFormat, Vec<u8>)>> {
        let node = self.node(id).ok_or_else(|| CompilerError::node_not_found(id))?;
        let Some(export) = &node.export else {
            return Ok(None);
        };
        let bytes = match export.format {
            AssetFormat::Svg => export.data.clone().into_bytes(),
            AssetFormat::Png => decode_base64(&export.data)
                .ok_or_else(|| CompilerError::asset(id, "PNG export is not valid base64"))?,
        };
        Ok(Some((export.format, bytes)))
    }

    fn plugin_data(&self, id: &str, namespace: &str, key: &str) -> Option<String> {
        self.node(id)?.plugin_data.get(namespace)?.get(key).cloned()
    }

    fn set_plugin_data(&mut self, id: &str, namespace: &str, key: &str, value: String) -> Result<()> {
        let node = self.node_mut(id).ok_or_else(|| CompilerError::node_not_found(id))?;
        node.plugin_data
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn import_icons(&mut self, set: &str, icons: &IndexMap<String, String>) -> Result<usize> {
        let existing: Vec<NodeId> = self
            .pages()
            .into_iter()
            .filter(|p| p.name == ICONS_PAGE_NAME)
            .map(|p| p.id.clone())
            .collect();
        for page in existing {
            self.remove_node(&page)?;
        }

        let page_id = format!("icons:{}", set);
        self.add_node(SceneNode::new(page_id.clone(), ICONS_PAGE_NAME, NodeKind::Page), None)?;

        for (name, svg) in icons {
            let icon_name = format!("{}:{}", set, name);
            let mut component = SceneNode::new(format!("icon:{}", icon_name), icon_name.clone(), NodeKind::Component);
            component.width = 24.0;
            component.height = 24.0;
            let component_id = self.add_node(component, Some(&page_id))?;

            let mut vector = SceneNode::new(format!("icon:{}:vector", icon_name), "Vector", NodeKind::Vector);
            vector.width = 24.0;
            vector.height = 24.0;
            vector.export = Some(ExportedAsset {
                format: AssetFormat::Svg,
                data: svg.clone(),
            });
            self.add_node(vector, Some(&component_id))?;
        }

        Ok(icons.len())
    }
}

/// Programmatic construction of documents.
///
/// Builder calls panic when given an id that does not exist.
pub struct DocumentBuilder {
    doc: Document,
    next_id: u32,
}

impl DocumentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            doc: Document::new(name),
            next_id: 0,
        }
    }

    fn next_id(&mut self) -> NodeId {
        self.next_id += 1;
        format!("1:{}", self.next_id)
    }

    fn push(&mut self, parent: Option<&str>, node: SceneNode) -> NodeId {
        self.doc
            .add_node(node, parent)
            .unwrap_or_else(|e| panic!("invalid builder call: {}", e))
    }

    pub fn page(&mut self, name: &str) -> NodeId {
        let id = self.next_id();
        self.push(None, SceneNode::new(id, name, NodeKind::Page))
    }

    pub fn node(&mut self, parent: &str, kind: NodeKind, name: &str) -> NodeId {
        let id = self.next_id();
        self.push(Some(parent), SceneNode::new(id, name, kind))
    }

    pub fn section(&mut self, parent: &str, name: &str) -> NodeId {
        self.node(parent, NodeKind::Section, name)
    }

    pub fn frame(&mut self, parent: &str, name: &str) -> NodeId {
        self.node(parent, NodeKind::Frame, name)
    }

    pub fn component(&mut self, parent: &str, name: &str) -> NodeId {
        self.node(parent, NodeKind::Component, name)
    }

    pub fn component_set(&mut self, parent: &str, name: &str) -> NodeId {
        self.node(parent, NodeKind::ComponentSet, name)
    }

    /// Add a variant member, registering its values on the set's variant property definitions.
    pub fn variant(&mut self, set: &str, values: &[(&str, &str)]) -> NodeId {
        let name = values
            .iter()
            .map(|(prop, value)| format!("{}={}", prop, value))
            .collect::<Vec<_>>()
            .join(", ");
        let id = self.node(set, NodeKind::Component, &name);
        self.edit(&id, |node| {
            for (prop, value) in values {
                node.variant_properties.insert(prop.to_string(), value.to_string());
            }
        });
        self.edit(set, |node| {
            for (prop, value) in values {
                let def = node
                    .property_definitions
                    .entry(prop.to_string())
                    .or_insert_with(|| PropertyDefinition {
                        kind: ComponentPropertyType::Variant,
                        default_value: PropertyValue::Text(value.to_string()),
                        variant_options: Vec::new(),
                    });
                if !def.variant_options.iter().any(|o| o == value) {
                    def.variant_options.push(value.to_string());
                }
            }
        });
        id
    }

    pub fn text(&mut self, parent: &str, name: &str, characters: &str) -> NodeId {
        let id = self.node(parent, NodeKind::Text, name);
        self.edit(&id, |node| {
            node.text = Some(super::TextStyle {
                characters: characters.to_string(),
                ..Default::default()
            });
        });
        id
    }

    pub fn instance(&mut self, parent: &str, name: &str, main: &str) -> NodeId {
        let id = self.node(parent, NodeKind::Instance, name);
        self.edit(&id, |node| node.main_component = Some(main.to_string()));
        id
    }

    pub fn vector(&mut self, parent: &str, name: &str, svg: &str) -> NodeId {
        let id = self.node(parent, NodeKind::Vector, name);
        self.edit(&id, |node| {
            node.width = 24.0;
            node.height = 24.0;
            node.export = Some(ExportedAsset {
                format: AssetFormat::Svg,
                data: svg.to_string(),
            });
        });
        id
    }

    pub fn define_property(
        &mut self,
        component: &str,
        key: &str,
        kind: ComponentPropertyType,
        default_value: PropertyValue,
    ) -> &mut Self {
        self.edit(component, |node| {
            node.property_definitions.insert(
                key.to_string(),
                PropertyDefinition {
                    kind,
                    default_value,
                    variant_options: Vec::new(),
                },
            );
        })
    }

    pub fn bind(&mut self, id: &str, references: PropertyReferences) -> &mut Self {
        self.edit(id, |node| node.property_references = references)
    }

    pub fn set_instance_property(&mut self, instance: &str, key: &str, property: InstanceProperty) -> &mut Self {
        self.edit(instance, |node| {
            node.component_properties.insert(key.to_string(), property);
        })
    }

    pub fn fill(&mut self, id: &str, color: Rgba) -> &mut Self {
        self.edit(id, |node| node.fills.push(Paint::solid(color)))
    }

    pub fn edit(&mut self, id: &str, f: impl FnOnce(&mut SceneNode)) -> &mut Self {
        match self.doc.node_mut(id) {
            Some(node) => f(node),
            None => panic!("invalid builder call: unknown node {}", id),
        }
        self
    }

    /// Add a variable collection with the given mode names; the first mode is the default.
    pub fn collection(&mut self, name: &str, modes: &[&str]) -> NodeId {
        let id = format!("VariableCollectionId:{}", self.doc.variable_collections.len() + 1);
        let modes: Vec<VariableMode> = modes
            .iter()
            .enumerate()
            .map(|(i, mode)| VariableMode {
                mode_id: format!("{}:{}", id, i),
                name: mode.to_string(),
            })
            .collect();
        let default_mode_id = modes.first().map(|m| m.mode_id.clone()).unwrap_or_default();
        self.doc.variable_collections.push(VariableCollection {
            id: id.clone(),
            name: name.to_string(),
            modes,
            default_mode_id,
            variable_ids: Vec::new(),
        });
        id
    }

    /// Add a color variable with one value per mode of `collection`, in mode order.
    pub fn color_variable(&mut self, collection: &str, name: &str, values: Vec<VariableValue>) -> NodeId {
        let id = format!("VariableID:{}", self.doc.variables.len() + 1);
        let Some(target) = self.doc.variable_collections.iter_mut().find(|c| c.id == collection) else {
            panic!("invalid builder call: unknown collection {}", collection);
        };
        target.variable_ids.push(id.clone());
        let values_by_mode = target
            .modes
            .iter()
            .map(|m| m.mode_id.clone())
            .zip(values)
            .collect();
        self.doc.variables.push(Variable {
            id: id.clone(),
            name: name.to_string(),
            description: String::new(),
            resolved_type: VariableType::Color,
            values_by_mode,
        });
        id
    }

    pub fn paint_style(&mut self, name: &str, color: Rgba) -> &mut Self {
        let id = format!("S:{}", self.doc.paint_styles.len() + 1);
        self.doc.paint_styles.push(PaintStyle {
            id,
            name: name.to_string(),
            description: String::new(),
            paints: vec![Paint::solid(color)],
        });
        self
    }

    pub fn select(&mut self, id: &str) -> &mut Self {
        self.doc.selection.push(id.to_string());
        self
    }

    pub fn build(self) -> Document {
        self.doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ChangeKind;

    fn sample() -> (Document, NodeId, NodeId) {
        let mut b = DocumentBuilder::new("Sample");
        let page = b.page("Components");
        let button = b.component(&page, "Button");
        let label = b.text(&button, "Label", "Click");
        (b.build(), button, label)
    }

    #[test]
    fn test_parent_links_and_lookup() {
        let (doc, button, label) = sample();
        assert_eq!(doc.parent(&label).unwrap().id, button);
        assert_eq!(doc.page_of(&label).unwrap().name, "Components");
        assert_eq!(doc.find_all(NodeKind::Component), vec![button.clone()]);
        assert_eq!(doc.children(&button).len(), 1);
    }

    #[test]
    fn test_json_round_trip_rebuilds_parents() {
        let (doc, button, label) = sample();
        let json = doc.to_json().unwrap();
        let loaded = Document::from_json(&json).unwrap();
        assert_eq!(loaded.parent(&label).unwrap().id, button);
    }

    #[test]
    fn test_missing_child_is_invalid() {
        let json = r#"{"name": "Broken", "nodes": [
            {"id": "1:1", "name": "Page", "type": "PAGE", "children": ["1:9"]}
        ]}"#;
        let err = Document::from_json(json).unwrap_err();
        assert!(matches!(err, CompilerError::InvalidDocument { .. }));
    }

    #[test]
    fn test_plugin_data_store() {
        let (mut doc, button, _) = sample();
        assert!(doc.plugin_data(&button, "scenec", "data").is_none());
        doc.set_plugin_data(&button, "scenec", "data", "{}".to_string()).unwrap();
        assert_eq!(doc.plugin_data(&button, "scenec", "data").as_deref(), Some("{}"));
        assert!(doc.set_plugin_data("9:9", "scenec", "data", String::new()).is_err());
    }

    #[test]
    fn test_diff_reports_changes() {
        let (old, button, label) = sample();
        let mut new = old.clone();
        new.node_mut(&label).unwrap().name = "Title".to_string();
        new.set_plugin_data(&button, "scenec", "data", "{}".to_string()).unwrap();
        let extra = SceneNode::new("2:1", "Badge", NodeKind::Frame);
        new.add_node(extra, Some(&button)).unwrap();

        let changes = Document::diff(&old, &new);
        let button_change = changes.iter().find(|c| c.node == button).unwrap();
        assert_eq!(button_change.kind, ChangeKind::PropertyChange);
        assert!(button_change.properties.contains(&"pluginData".to_string()));
        assert!(button_change.properties.contains(&"children".to_string()));

        let label_change = changes.iter().find(|c| c.node == label).unwrap();
        assert_eq!(label_change.properties, vec!["name".to_string()]);

        assert!(changes.iter().any(|c| c.node == "2:1" && c.kind == ChangeKind::Create));

        let removed = Document::diff(&new, &old);
        assert!(removed.iter().any(|c| c.node == "2:1" && c.removed));
    }

    #[test]
    fn test_adopt_plugin_data() {
        let (mut old, button, _) = sample();
        old.set_plugin_data(&button, "scenec", "data", "cached".to_string()).unwrap();
        let (mut fresh, _, _) = sample();
        fresh.adopt_plugin_data(&old);
        assert_eq!(fresh.plugin_data(&button, "scenec", "data").as_deref(), Some("cached"));
    }

    #[test]
    fn test_import_icons_replaces_page() {
        let (mut doc, _, _) = sample();
        let mut icons = IndexMap::new();
        icons.insert("star".to_string(), "<svg/>".to_string());
        icons.insert("heart".to_string(), "<svg/>".to_string());
        assert_eq!(doc.import_icons("ph", &icons).unwrap(), 2);

        let mut fewer = IndexMap::new();
        fewer.insert("star".to_string(), "<svg/>".to_string());
        assert_eq!(doc.import_icons("ph", &fewer).unwrap(), 1);

        let icon_pages = doc.pages().into_iter().filter(|p| p.name == ICONS_PAGE_NAME).count();
        assert_eq!(icon_pages, 1);
        let names: Vec<String> = doc
            .find_all(NodeKind::Component)
            .iter()
            .filter_map(|id| doc.node(id))
            .map(|n| n.name.clone())
            .collect();
        assert!(names.contains(&"ph:star".to_string()));
        assert!(!names.contains(&"ph:heart".to_string()));
        let (format, bytes) = doc.export_asset("icon:ph:star:vector").unwrap().unwrap();
        assert_eq!(format, AssetFormat::Svg);
        assert_eq!(bytes, b"<svg/>".to_vec());
    }

    #[test]
    fn test_variant_builder_registers_definitions() {
        let mut b = DocumentBuilder::new("Variants");
        let page = b.page("Components");
        let set = b.component_set(&page, "Button");
        let default = b.variant(&set, &[("State", "Default")]);
        b.variant(&set, &[("State", "Hover")]);
        let doc = b.build();

        let def = &doc.node(&set).unwrap().property_definitions["State"];
        assert_eq!(def.kind, ComponentPropertyType::Variant);
        assert_eq!(def.variant_options, vec!["Default", "Hover"]);
        assert_eq!(doc.node(&default).unwrap().variant_key(), "State=Default");
    }
}
