//! Model extraction: scene nodes to the intermediate parse model
//!
//! Extraction resolves the compile target of a node, derives its
//! [`ComponentDescriptor`], then walks the target's subtree once to build a
//! [`ParseModel`]. All accumulation happens in an explicit [`ModelState`]
//! threaded through the recursive visit.

use crate::error::{CompilerError, Result};
use crate::properties;
use crate::scene::{SceneGraph, SceneNode};
use crate::style_resolver::StyleResolver;
use crate::types::*;
use crate::utils::{
    content_hash, data_uri, is_icon_name, prop_identifier, to_camel_identifier, to_pascal_identifier,
};
use indexmap::IndexMap;

/// Canonical compile target of a node: the variant set for variant members,
/// the main component's target for instances.
pub fn compile_target(graph: &dyn SceneGraph, id: &str) -> Option<NodeId> {
    let node = graph.node(id)?;
    match node.kind {
        NodeKind::ComponentSet => Some(node.id.clone()),
        NodeKind::Component => match graph.parent(id) {
            Some(parent) if parent.kind == NodeKind::ComponentSet => Some(parent.id.clone()),
            _ => Some(node.id.clone()),
        },
        NodeKind::Instance => {
            let main = node.main_component.as_deref()?;
            if main == id {
                return None;
            }
            compile_target(graph, main)
        }
        _ => None,
    }
}

/// Compile target owning an arbitrary node, walking up through instances.
pub fn owning_target(graph: &dyn SceneGraph, id: &str) -> Option<NodeId> {
    let mut current = graph.node(id);
    while let Some(node) = current {
        if matches!(node.kind, NodeKind::Component | NodeKind::ComponentSet) {
            return compile_target(graph, &node.id);
        }
        current = graph.parent(&node.id);
    }
    None
}

fn path_segment(name: Option<&str>, fallback: &str) -> String {
    let segment = name.map(|n| to_camel_identifier(&n.to_lowercase())).unwrap_or_default();
    if segment.is_empty() {
        fallback.to_string()
    } else {
        segment
    }
}

/// Describe the component compiled for `id`.
///
/// `selected_variant` is the id of a variant member selected in the host UI;
/// its values override the variant property defaults.
pub fn describe_component(
    graph: &dyn SceneGraph,
    id: &str,
    selected_variant: Option<&str>,
) -> Result<ComponentDescriptor> {
    let node = graph.node(id).ok_or_else(|| CompilerError::node_not_found(id))?;
    let target_id = compile_target(graph, id).ok_or_else(|| CompilerError::NotAComponent {
        id: node.id.clone(),
        name: node.name.clone(),
    })?;
    let target = graph
        .node(&target_id)
        .ok_or_else(|| CompilerError::node_not_found(target_id.clone()))?;

    let is_variant = target.kind == NodeKind::ComponentSet;
    let root_node = if is_variant {
        graph
            .children(&target.id)
            .into_iter()
            .find(|c| c.kind == NodeKind::Component)
            .map(|c| c.id.clone())
            .ok_or_else(|| CompilerError::extraction(&target.name, "variant set has no members"))?
    } else {
        target.id.clone()
    };

    let page = graph.page_of(&target.id).map(|p| p.name.clone()).unwrap_or_default();
    let section = graph
        .ancestor_of_kind(&target.id, NodeKind::Section)
        .map(|s| s.name.clone());
    let path = format!(
        "components/{}/{}/{}",
        path_segment(Some(page.as_str()), DEFAULT_PAGE_SEGMENT),
        path_segment(section.as_deref(), DEFAULT_SECTION_SEGMENT),
        to_camel_identifier(&target.name)
    );

    let mut property_definitions = target.property_definitions.clone();
    if let Some(selected) = selected_variant.and_then(|s| graph.node(s)) {
        if selected.parent.as_deref() == Some(target.id.as_str()) {
            for (prop, value) in &selected.variant_properties {
                if let Some(def) = property_definitions.get_mut(prop) {
                    if def.kind == ComponentPropertyType::Variant {
                        def.default_value = PropertyValue::Text(value.clone());
                    }
                }
            }
        }
    }

    Ok(ComponentDescriptor {
        id: target.id.clone(),
        name: to_pascal_identifier(&target.name),
        page,
        section,
        path,
        is_variant,
        is_instance: node.kind == NodeKind::Instance,
        root_node,
        property_definitions,
        description: target.description.clone(),
        documentation_links: target.documentation_links.clone(),
    })
}

/// Accumulator threaded through one extraction.
#[derive(Debug, Default)]
struct ModelState {
    styles: IndexMap<String, StyleMap>,
    assets: IndexMap<NodeId, AssetRef>,
    links: IndexMap<String, String>,
    meta: ParseMeta,
}

pub struct ModelExtractor<'a> {
    graph: &'a dyn SceneGraph,
    resolver: StyleResolver<'a>,
}

impl<'a> ModelExtractor<'a> {
    pub fn new(graph: &'a dyn SceneGraph) -> Self {
        Self {
            graph,
            resolver: StyleResolver::new(graph),
        }
    }

    pub fn extract(&self, descriptor: &ComponentDescriptor) -> Result<ParseModel> {
        let root = self
            .graph
            .node(&descriptor.root_node)
            .ok_or_else(|| CompilerError::node_not_found(descriptor.root_node.clone()))?;

        let mut state = ModelState::default();
        state.meta.primitives.insert(Primitive::CONTAINER);
        state.styles.insert(ROOT_SLUG.to_string(), self.resolver.resolve(root));
        self.collect_links(root, &mut state);

        let tree = self.visit_children(root, &mut state)?.unwrap_or_default();
        let variants = if descriptor.is_variant {
            self.variant_styles(descriptor, &state.styles)
        } else {
            IndexMap::new()
        };

        log::trace!(
            "Extracted '{}': {} styles, {} variant slugs, {} assets",
            descriptor.name,
            state.styles.len(),
            variants.len(),
            state.assets.len()
        );

        Ok(ParseModel {
            root: ParseNode {
                id: root.id.clone(),
                name: root.name.clone(),
                kind: root.kind,
                tag: Primitive::CONTAINER,
                slug: ROOT_SLUG.to_string(),
                visibility_prop: None,
                swap_prop: None,
                text_prop: None,
                characters: None,
                instance: None,
            },
            tree,
            styles: state.styles,
            variants,
            assets: state.assets,
            links: state.links,
            meta: state.meta,
        })
    }

    fn is_rendered(node: &SceneNode) -> bool {
        node.visible || node.property_references.visible.is_some()
    }

    fn visit_children(&self, parent: &SceneNode, state: &mut ModelState) -> Result<Option<Vec<ParseNodeEntry>>> {
        let mut entries = Vec::new();
        for child in self.graph.children(&parent.id) {
            if !Self::is_rendered(child) {
                continue;
            }
            entries.push(self.visit(child, state)?);
        }
        Ok(if entries.is_empty() { None } else { Some(entries) })
    }

    fn visit(&self, node: &SceneNode, state: &mut ModelState) -> Result<ParseNodeEntry> {
        let refs = &node.property_references;
        let mut parse_node = ParseNode {
            id: node.id.clone(),
            name: node.name.clone(),
            kind: node.kind,
            tag: Primitive::for_kind(node.kind),
            slug: to_camel_identifier(&node.name),
            visibility_prop: refs.visible.as_deref().map(prop_identifier),
            swap_prop: refs.main_component.as_deref().map(prop_identifier),
            text_prop: refs.characters.as_deref().map(prop_identifier),
            characters: None,
            instance: None,
        };
        self.collect_links(node, state);

        // Swapped instances render the prop, nothing below them matters.
        if parse_node.swap_prop.is_some() {
            return Ok(ParseNodeEntry {
                node: parse_node,
                children: None,
                is_asset: false,
            });
        }

        if node.kind.is_asset() {
            self.capture_asset(node, state);
            return Ok(ParseNodeEntry {
                node: parse_node,
                children: None,
                is_asset: true,
            });
        }

        if node.kind == NodeKind::Instance {
            parse_node.instance = Some(self.instance_info(node, state)?);
            return Ok(ParseNodeEntry {
                node: parse_node,
                children: None,
                is_asset: false,
            });
        }

        state.meta.primitives.insert(parse_node.tag);
        if !parse_node.slug.is_empty() {
            state
                .styles
                .entry(parse_node.slug.clone())
                .or_insert_with(|| self.resolver.resolve(node));
        }

        let children = if node.kind == NodeKind::Text {
            parse_node.characters = Some(node.text.as_ref().map(|t| t.characters.clone()).unwrap_or_default());
            None
        } else {
            self.visit_children(node, state)?
        };

        Ok(ParseNodeEntry {
            node: parse_node,
            children,
            is_asset: false,
        })
    }

    fn collect_links(&self, node: &SceneNode, state: &mut ModelState) {
        for reaction in &node.reactions {
            if reaction.trigger != "ON_CLICK" {
                continue;
            }
            if let Some(url) = &reaction.url {
                state.links.insert(node.name.clone(), url.clone());
            }
        }
    }

    /// Export the node's bytes once. Missing or failed exports leave no asset behind.
    fn capture_asset(&self, node: &SceneNode, state: &mut ModelState) {
        match self.graph.export_asset(&node.id) {
            Ok(Some((format, bytes))) => {
                state.meta.primitives.insert(Primitive::Image);
                state.assets.insert(
                    node.id.clone(),
                    AssetRef {
                        id: node.id.clone(),
                        name: node.name.clone(),
                        hash: content_hash(&bytes),
                        format,
                        width: node.width,
                        height: node.height,
                        data: data_uri(format, &bytes),
                    },
                );
            }
            Ok(None) => {
                log::debug!("Asset '{}' ({}) has no export", node.name, node.id);
            }
            Err(e) => {
                log::warn!("Could not export asset '{}' ({}): {}", node.name, node.id, e);
            }
        }
    }

    fn target_name(&self, id: &str) -> Option<(NodeId, String)> {
        let target = compile_target(self.graph, id)?;
        let node = self.graph.node(&target)?;
        Some((target, to_pascal_identifier(&node.name)))
    }

    fn instance_info(&self, node: &SceneNode, state: &mut ModelState) -> Result<InstanceInfo> {
        let main_id = node
            .main_component
            .as_deref()
            .ok_or_else(|| CompilerError::extraction(&node.name, "instance has no main component"))?;
        let main = self.graph.node(main_id).ok_or_else(|| {
            CompilerError::extraction(&node.name, format!("main component {} is missing", main_id))
        })?;

        let icon = if is_icon_name(&main.name) {
            state.meta.icons.insert(main.name.clone());
            Some(main.name.clone())
        } else {
            None
        };

        let component = match (&icon, self.target_name(main_id)) {
            (Some(_), _) => to_pascal_identifier(&main.name),
            (None, Some((target, name))) => {
                state.meta.components.insert(target, name.clone());
                name
            }
            (None, None) => {
                return Err(CompilerError::extraction(
                    &node.name,
                    format!("main component {} has no compile target", main_id),
                ))
            }
        };

        let mut properties: Vec<_> = node.component_properties.iter().collect();
        properties::sort_stable_ui(&mut properties, |(key, prop)| (key.as_str(), prop.kind));

        let mut attributes = Vec::new();
        for (key, prop) in properties {
            let value = if let Some(bound) = &prop.bound_to {
                AttributeValue::Prop(prop_identifier(bound))
            } else {
                match (prop.kind, &prop.value) {
                    (ComponentPropertyType::Boolean, PropertyValue::Bool(b)) => AttributeValue::Bool(*b),
                    (ComponentPropertyType::Boolean, PropertyValue::Text(t)) => AttributeValue::Bool(t == "true"),
                    (ComponentPropertyType::InstanceSwap, value) => {
                        let Some((target, name)) = value.as_str().and_then(|id| self.target_name(id)) else {
                            log::debug!("Swap value of '{}' on '{}' does not resolve", key, node.name);
                            continue;
                        };
                        state.meta.components.insert(target, name.clone());
                        AttributeValue::Element(name)
                    }
                    (_, PropertyValue::Text(t)) => AttributeValue::Text(t.clone()),
                    (_, PropertyValue::Bool(b)) => AttributeValue::Text(b.to_string()),
                }
            };
            attributes.push((prop_identifier(key), value));
        }

        Ok(InstanceInfo {
            component,
            attributes,
            icon,
            width: node.width,
            height: node.height,
        })
    }

    /// Style differences of every non-default variant member against the default.
    fn variant_styles(
        &self,
        descriptor: &ComponentDescriptor,
        base: &IndexMap<String, StyleMap>,
    ) -> IndexMap<String, IndexMap<String, StyleMap>> {
        let mut variants: IndexMap<String, IndexMap<String, StyleMap>> = IndexMap::new();

        for member in self.graph.children(&descriptor.id) {
            if member.kind != NodeKind::Component || member.id == descriptor.root_node {
                continue;
            }
            let mut member_styles = IndexMap::new();
            member_styles.insert(ROOT_SLUG.to_string(), self.resolver.resolve(member));
            self.collect_styles(member, &mut member_styles);

            let key = member.variant_key();
            for (slug, base_map) in base {
                let Some(member_map) = member_styles.get(slug) else {
                    continue;
                };
                let diff = style_diff(base_map, member_map);
                if !diff.is_empty() {
                    variants.entry(slug.clone()).or_default().insert(key.clone(), diff);
                }
            }
        }

        variants
    }

    /// Slug to style map for a subtree, with the same visiting rules as the main walk.
    fn collect_styles(&self, parent: &SceneNode, styles: &mut IndexMap<String, StyleMap>) {
        for child in self.graph.children(&parent.id) {
            if !Self::is_rendered(child)
                || child.property_references.main_component.is_some()
                || child.kind.is_asset()
                || child.kind == NodeKind::Instance
            {
                continue;
            }
            let slug = to_camel_identifier(&child.name);
            if !slug.is_empty() {
                styles.entry(slug).or_insert_with(|| self.resolver.resolve(child));
            }
            if child.kind != NodeKind::Text {
                self.collect_styles(child, styles);
            }
        }
    }
}

/// Changed or added properties, plus base properties the variant lacks as `Unset`.
fn style_diff(base: &StyleMap, variant: &StyleMap) -> StyleMap {
    let mut diff = StyleMap::new();
    for (key, value) in variant {
        if base.get(key) != Some(value) {
            diff.insert(key.clone(), value.clone());
        }
    }
    for key in base.keys() {
        if !variant.contains_key(key) {
            diff.insert(key.clone(), StyleValue::Unset);
        }
    }
    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Document, DocumentBuilder, InstanceProperty, PropertyReferences, Reaction, Rgba};

    fn button_set() -> (Document, NodeId, NodeId, NodeId) {
        let mut b = DocumentBuilder::new("Kit");
        let page = b.page("Design System");
        let section = b.section(&page, "Forms");
        let set = b.component_set(&section, "Button");
        let default = b.variant(&set, &[("State", "Default")]);
        b.fill(&default, Rgba::rgb(1.0, 1.0, 1.0));
        b.text(&default, "Label", "Click");
        let hover = b.variant(&set, &[("State", "Hover")]);
        b.fill(&hover, Rgba::rgb(0.0, 0.0, 0.0));
        b.text(&hover, "Label", "Click");
        (b.build(), set, default, hover)
    }

    #[test]
    fn test_compile_target_canonicalizes() {
        let (doc, set, default, hover) = button_set();
        assert_eq!(compile_target(&doc, &default), Some(set.clone()));
        assert_eq!(compile_target(&doc, &hover), Some(set.clone()));
        assert_eq!(compile_target(&doc, &set), Some(set.clone()));
        let label = doc.node(&default).unwrap().children[0].clone();
        assert_eq!(compile_target(&doc, &label), None);
        assert_eq!(owning_target(&doc, &label), Some(set));
    }

    #[test]
    fn test_describe_component_path_and_override() {
        let (doc, set, _, hover) = button_set();
        let descriptor = describe_component(&doc, &set, None).unwrap();
        assert_eq!(descriptor.name, "Button");
        assert_eq!(descriptor.path, "components/designSystem/forms/button");
        assert!(descriptor.is_variant);
        assert_eq!(
            descriptor.property_definitions["State"].default_value,
            PropertyValue::Text("Default".to_string())
        );

        let selected = describe_component(&doc, &hover, Some(hover.as_str())).unwrap();
        assert_eq!(selected.id, set);
        assert_eq!(
            selected.property_definitions["State"].default_value,
            PropertyValue::Text("Hover".to_string())
        );
    }

    #[test]
    fn test_path_defaults() {
        let mut b = DocumentBuilder::new("Kit");
        let page = b.page("");
        let badge = b.component(&page, "Status Badge");
        let doc = b.build();
        let descriptor = describe_component(&doc, &badge, None).unwrap();
        assert_eq!(descriptor.path, "components/common/base/statusBadge");
        assert_eq!(descriptor.name, "StatusBadge");
    }

    #[test]
    fn test_not_a_component() {
        let mut b = DocumentBuilder::new("Kit");
        let page = b.page("Page");
        let frame = b.frame(&page, "Loose");
        let doc = b.build();
        let err = describe_component(&doc, &frame, None).unwrap_err();
        assert!(matches!(err, CompilerError::NotAComponent { .. }));
    }

    #[test]
    fn test_variant_styles_diff() {
        let (doc, set, _, _) = button_set();
        let descriptor = describe_component(&doc, &set, None).unwrap();
        let model = ModelExtractor::new(&doc).extract(&descriptor).unwrap();

        assert!(model.styles.contains_key("root"));
        assert!(model.styles.contains_key("label"));
        let root_mods = &model.variants["root"];
        assert_eq!(
            root_mods["State=Hover"]["backgroundColor"],
            StyleValue::String("#000000".to_string())
        );
        assert!(!model.variants.contains_key("label"));
        for slug in model.variants.keys() {
            assert!(model.styles.contains_key(slug));
        }
    }

    #[test]
    fn test_style_diff_marks_removed_as_unset() {
        let mut base = StyleMap::new();
        base.insert("opacity".to_string(), StyleValue::Number(0.5));
        base.insert("width".to_string(), StyleValue::Number(10.0));
        let mut variant = StyleMap::new();
        variant.insert("width".to_string(), StyleValue::Number(20.0));
        let diff = style_diff(&base, &variant);
        assert_eq!(diff["width"], StyleValue::Number(20.0));
        assert_eq!(diff["opacity"], StyleValue::Unset);
    }

    #[test]
    fn test_hidden_and_bound_children() {
        let mut b = DocumentBuilder::new("Kit");
        let page = b.page("Components");
        let icon_source = b.component(&page, "Chevron");
        let card = b.component(&page, "Card");
        b.define_property(&card, "Show Icon#1:0", ComponentPropertyType::Boolean, PropertyValue::Bool(true));
        b.define_property(&card, "Title#2:0", ComponentPropertyType::Text, PropertyValue::Text("Hi".into()));
        let hidden = b.frame(&card, "Hidden");
        b.edit(&hidden, |n| n.visible = false);
        let toggled = b.frame(&card, "Icon Wrap");
        b.edit(&toggled, |n| n.visible = false);
        b.bind(
            &toggled,
            PropertyReferences {
                visible: Some("Show Icon#1:0".to_string()),
                ..Default::default()
            },
        );
        let title = b.text(&card, "Title", "Hi");
        b.bind(
            &title,
            PropertyReferences {
                characters: Some("Title#2:0".to_string()),
                ..Default::default()
            },
        );
        let chevron = b.instance(&card, "Chevron", &icon_source);
        b.edit(&chevron, |n| {
            n.reactions.push(Reaction {
                trigger: "ON_CLICK".to_string(),
                url: Some("https://example.com".to_string()),
            })
        });
        let doc = b.build();

        let descriptor = describe_component(&doc, &card, None).unwrap();
        let model = ModelExtractor::new(&doc).extract(&descriptor).unwrap();

        let names: Vec<&str> = model.tree.iter().map(|e| e.node.name.as_str()).collect();
        assert_eq!(names, vec!["Icon Wrap", "Title", "Chevron"]);
        assert_eq!(model.tree[0].node.visibility_prop.as_deref(), Some("showIcon"));
        assert_eq!(model.tree[1].node.text_prop.as_deref(), Some("title"));
        assert!(model.uses_primitive(Primitive::Text));
        assert_eq!(model.meta.components.get(&icon_source).map(|s| s.as_str()), Some("Chevron"));
        assert_eq!(model.links["Chevron"], "https://example.com");
        assert!(!model.styles.contains_key("chevron"));
        assert!(!model.styles.contains_key("hidden"));
    }

    #[test]
    fn test_instance_attributes_and_swap() {
        let mut b = DocumentBuilder::new("Kit");
        let page = b.page("Components");
        let star = b.component(&page, "Star Icon");
        let chip = b.component(&page, "Chip");
        let list = b.component(&page, "List");
        b.define_property(&list, "Dense#3:0", ComponentPropertyType::Boolean, PropertyValue::Bool(false));
        let item = b.instance(&list, "Chip", &chip);
        b.set_instance_property(
            &item,
            "Selected#1:0",
            InstanceProperty {
                kind: ComponentPropertyType::Boolean,
                value: PropertyValue::Bool(true),
                bound_to: None,
            },
        );
        b.set_instance_property(
            &item,
            "Icon#1:1",
            InstanceProperty {
                kind: ComponentPropertyType::InstanceSwap,
                value: PropertyValue::Text(star.clone()),
                bound_to: None,
            },
        );
        b.set_instance_property(
            &item,
            "Label#1:2",
            InstanceProperty {
                kind: ComponentPropertyType::Text,
                value: PropertyValue::Text("One".to_string()),
                bound_to: None,
            },
        );
        b.set_instance_property(
            &item,
            "Compact#1:3",
            InstanceProperty {
                kind: ComponentPropertyType::Boolean,
                value: PropertyValue::Bool(false),
                bound_to: Some("Dense#3:0".to_string()),
            },
        );
        let doc = b.build();

        let descriptor = describe_component(&doc, &list, None).unwrap();
        let model = ModelExtractor::new(&doc).extract(&descriptor).unwrap();
        let info = model.tree[0].node.instance.as_ref().unwrap();

        assert_eq!(info.component, "Chip");
        assert_eq!(
            info.attributes,
            vec![
                ("label".to_string(), AttributeValue::Text("One".to_string())),
                ("compact".to_string(), AttributeValue::Prop("dense".to_string())),
                ("selected".to_string(), AttributeValue::Bool(true)),
                ("icon".to_string(), AttributeValue::Element("StarIcon".to_string())),
            ]
        );
        assert!(model.meta.components.contains_key(&star));
        assert!(model.meta.components.contains_key(&chip));
    }

    #[test]
    fn test_assets_and_icons() {
        let mut b = DocumentBuilder::new("Kit");
        let page = b.page("Components");
        let icon = b.component(&page, "ph:star");
        let logo = b.component(&page, "Logo");
        b.vector(&logo, "Mark", "<svg/>");
        b.vector(&logo, "Broken", "<svg/>");
        b.instance(&logo, "Star", &icon);
        let mut doc = b.build();
        let broken = doc.node(&logo).unwrap().children[1].clone();
        doc.node_mut(&broken).unwrap().export = None;

        let descriptor = describe_component(&doc, &logo, None).unwrap();
        let model = ModelExtractor::new(&doc).extract(&descriptor).unwrap();

        assert_eq!(model.assets.len(), 1);
        let asset = model.assets.values().next().unwrap();
        assert_eq!(asset.hash, content_hash(b"<svg/>"));
        assert!(model.tree[0].is_asset && model.tree[1].is_asset);
        assert!(model.tree[0].children.is_none());
        assert!(model.meta.icons.contains("ph:star"));
        assert_eq!(model.tree[2].node.instance.as_ref().unwrap().icon.as_deref(), Some("ph:star"));
        assert!(model.meta.components.is_empty());
        assert!(model.uses_primitive(Primitive::Image));
    }
}
