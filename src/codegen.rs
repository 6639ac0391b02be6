//! React Native source generation from the parse model

use crate::error::{CompilerError, Result};
use crate::properties::{self, sorted_for_interface};
use crate::types::*;
use crate::utils::{format_number, needs_jsx_expression, parse_variant_key, prop_identifier, variant_class_name};
use crate::writer::CodeWriter;
use crate::Settings;

pub struct CodeGenerator<'a> {
    settings: &'a Settings,
}

impl<'a> CodeGenerator<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self { settings }
    }

    /// Emit the component module: imports, prop interface, function, stylesheet.
    pub fn generate(&self, descriptor: &ComponentDescriptor, model: &ParseModel) -> Result<String> {
        let mut writer = CodeWriter::new(&self.settings.writer);

        self.write_imports(&mut writer, descriptor, model);
        writer.blank_line();
        self.write_interface(&mut writer, descriptor);
        self.write_docs(&mut writer, descriptor);
        self.write_function(&mut writer, descriptor, model)?;
        writer.blank_line();
        self.write_stylesheet(&mut writer, model);

        Ok(writer.into_string())
    }

    /// One-line usage example built from the property defaults.
    pub fn generate_preview(&self, descriptor: &ComponentDescriptor) -> String {
        let writer = CodeWriter::new(&self.settings.writer);
        let mut entries: Vec<_> = descriptor
            .property_definitions
            .iter()
            .filter(|(_, def)| def.kind != ComponentPropertyType::InstanceSwap)
            .collect();
        properties::sort_stable_ui(&mut entries, |(key, def)| (key.as_str(), def.kind));

        let mut preview = format!("<{}", descriptor.name);
        for (key, def) in entries {
            let value = match (&def.kind, &def.default_value) {
                (ComponentPropertyType::Boolean, PropertyValue::Bool(b)) => format!("{{{}}}", b),
                (ComponentPropertyType::Boolean, PropertyValue::Text(t)) => format!("{{{}}}", t == "true"),
                (_, PropertyValue::Text(t)) => writer.quote(t),
                (_, PropertyValue::Bool(b)) => writer.quote(&b.to_string()),
            };
            preview.push_str(&format!(" {}={}", prop_identifier(key), value));
        }
        preview.push_str("/>");
        preview
    }

    /// Index module re-exporting every component, in the given order.
    pub fn generate_index<'n>(&self, names: impl IntoIterator<Item = &'n str>) -> String {
        let mut writer = CodeWriter::new(&self.settings.writer);
        for name in names {
            let line = format!("export {{{}}} from {};", name, writer.quote(&format!("./{}", name)));
            writer.write_line(&line);
        }
        writer.into_string()
    }

    fn import_line(&self, writer: &mut CodeWriter, names: &str, module: &str) {
        let line = format!("import {} from {};", names, writer.quote(module));
        writer.write_line(&line);
    }

    fn write_imports(&self, writer: &mut CodeWriter, descriptor: &ComponentDescriptor, model: &ParseModel) {
        let react = &self.settings.react;
        if react.add_import {
            self.import_line(writer, "React", FRAMEWORK_PACKAGE);
        }
        if react.add_translate && model.uses_primitive(Primitive::Text) {
            self.import_line(writer, &format!("{{{}}}", TRANSLATE_TAG), TRANSLATE_PACKAGE);
        }

        let mut primitives = vec!["StyleSheet", Primitive::CONTAINER.tag()];
        for primitive in &model.meta.primitives {
            if !primitives.contains(&primitive.tag()) {
                primitives.push(primitive.tag());
            }
        }
        self.import_line(writer, &format!("{{{}}}", primitives.join(", ")), PRIMITIVES_PACKAGE);

        if !model.meta.icons.is_empty() {
            let icons = &self.settings.icons;
            self.import_line(writer, &format!("{{{}}}", icons.component), &icons.import_path);
        }

        for (id, name) in &model.meta.components {
            if *id == descriptor.id {
                continue;
            }
            self.import_line(writer, &format!("{{{}}}", name), &format!("./{}", name));
        }

        self.import_line(writer, "theme", THEME_MODULE);
    }

    fn write_interface(&self, writer: &mut CodeWriter, descriptor: &ComponentDescriptor) {
        if descriptor.property_definitions.is_empty() {
            return;
        }
        writer.block(&format!("export interface {}Props {{", descriptor.name), "}", |w| {
            for (key, def) in sorted_for_interface(&descriptor.property_definitions) {
                let optional = if def.kind == ComponentPropertyType::Boolean { "?" } else { "" };
                let kind = match def.kind {
                    ComponentPropertyType::Variant => def
                        .variant_options
                        .iter()
                        .map(|option| w.quote(option))
                        .collect::<Vec<_>>()
                        .join(" | "),
                    ComponentPropertyType::InstanceSwap => "JSX.Element".to_string(),
                    ComponentPropertyType::Text => "string".to_string(),
                    other => other.token().to_lowercase(),
                };
                w.write_line(&format!("{}{}: {};", prop_identifier(key), optional, kind));
            }
        });
        writer.blank_line();
    }

    fn write_docs(&self, writer: &mut CodeWriter, descriptor: &ComponentDescriptor) {
        if descriptor.description.trim().is_empty() {
            return;
        }
        writer.write_line("/**");
        for line in descriptor.description.lines() {
            let line = format!(" * {}", line.trim());
            writer.write_line(line.trim_end());
        }
        if let Some(link) = descriptor.documentation_links.first() {
            writer.write_line(&format!(" * @link {}", link));
        }
        writer.write_line(" */");
    }

    fn style_ref(model: &ParseModel, slug: &str) -> String {
        let prefix = if model.has_variant_styles(slug) { CLASSES_PREFIX } else { STYLE_PREFIX };
        format!("{}.{}", prefix, slug)
    }

    fn write_function(
        &self,
        writer: &mut CodeWriter,
        descriptor: &ComponentDescriptor,
        model: &ParseModel,
    ) -> Result<()> {
        let params = if descriptor.property_definitions.is_empty() {
            String::new()
        } else {
            format!("props: {}Props", descriptor.name)
        };

        writer.write_line(&format!("export function {}({}) {{", descriptor.name, params));
        writer.indent();
        if descriptor.is_variant && !model.variants.is_empty() {
            self.write_classes(writer, model)?;
        }
        writer.block("return (", ");", |w| {
            let root = format!("<{} style={{{}}}>", model.root.tag, Self::style_ref(model, ROOT_SLUG));
            w.block(&root, &format!("</{}>", model.root.tag), |w| {
                self.write_children(w, model, &model.tree);
            });
        });
        writer.dedent();
        writer.write_line("}");
        Ok(())
    }

    /// `const classes = {...}` with modifiers in reverse declared order, so later ones win.
    fn write_classes(&self, writer: &mut CodeWriter, model: &ParseModel) -> Result<()> {
        let mut entries = Vec::new();
        for (slug, modifiers) in &model.variants {
            let mut conditions = Vec::new();
            for (key, _) in modifiers.iter().filter(|(_, styles)| !styles.is_empty()).rev() {
                let pairs = parse_variant_key(key);
                if pairs.is_empty() {
                    return Err(CompilerError::CodeGen {
                        message: format!("variant key '{}' has no property=value pairs", key),
                    });
                }
                let condition = pairs
                    .iter()
                    .map(|(prop, value)| format!("props.{} === {}", prop_identifier(prop), writer.quote(value)))
                    .collect::<Vec<_>>()
                    .join(" && ");
                conditions.push(format!("{} && {}.{},", condition, STYLE_PREFIX, variant_class_name(slug, key)));
            }
            if !conditions.is_empty() {
                entries.push((slug, conditions));
            }
        }

        writer.block(&format!("const {} = {{", CLASSES_PREFIX), "};", |w| {
            for (slug, conditions) in &entries {
                w.block(&format!("{}: [", slug), "],", |w| {
                    w.write_line(&format!("{}.{},", STYLE_PREFIX, slug));
                    for condition in conditions {
                        w.write_line(condition);
                    }
                });
            }
        });
        writer.blank_line();
        Ok(())
    }

    fn write_children(&self, writer: &mut CodeWriter, model: &ParseModel, children: &[ParseNodeEntry]) {
        for child in children {
            match &child.node.visibility_prop {
                Some(prop) => {
                    writer.block(&format!("{{props.{} &&", prop), "}", |w| {
                        self.write_child(w, model, child, true);
                    });
                }
                None => self.write_child(writer, model, child, false),
            }
        }
    }

    fn write_child(&self, writer: &mut CodeWriter, model: &ParseModel, child: &ParseNodeEntry, conditional: bool) {
        let node = &child.node;

        if let Some(prop) = &node.swap_prop {
            let statement = format!("props.{}", prop);
            writer.write_line(&if conditional { statement } else { format!("{{{}}}", statement) });
            return;
        }

        if child.is_asset {
            match model.assets.get(&node.id) {
                Some(asset) => {
                    let line = format!(
                        "<{} style={{{{width: {}, height: {}}}}} source={{{{uri: {}}}}}/>",
                        Primitive::Image,
                        format_number(asset.width),
                        format_number(asset.height),
                        writer.quote(&asset.data)
                    );
                    writer.write_line(&line);
                }
                None => {
                    let comment = format!("/* Could not convert asset \"{}\" */", node.name);
                    // Inside `{cond && ...}` braces would make an object literal.
                    writer.write_line(&if conditional { format!("null {}", comment) } else { format!("{{{}}}", comment) });
                }
            }
            return;
        }

        if let Some(instance) = &node.instance {
            let line = self.instance_tag(writer, instance);
            writer.write_line(&line);
            return;
        }

        let tag = node.tag;
        let style = if node.slug.is_empty() {
            String::new()
        } else {
            format!(" style={{{}}}", Self::style_ref(model, &node.slug))
        };

        if node.kind == NodeKind::Text {
            writer.block(&format!("<{}{}>", tag, style), &format!("</{}>", tag), |w| {
                let content = self.text_content(w, node);
                w.write_line(&content);
            });
            return;
        }

        match &child.children {
            Some(children) => {
                writer.block(&format!("<{}{}>", tag, style), &format!("</{}>", tag), |w| {
                    self.write_children(w, model, children);
                });
            }
            None => writer.write_line(&format!("<{}{}/>", tag, style)),
        }
    }

    fn text_content(&self, writer: &CodeWriter, node: &ParseNode) -> String {
        if let Some(prop) = &node.text_prop {
            return format!("{{props.{}}}", prop);
        }
        let characters = node.characters.as_deref().unwrap_or_default();
        let literal = if needs_jsx_expression(characters) {
            format!(
                "{{{}}}",
                serde_json::to_string(characters).unwrap_or_else(|_| writer.quote(characters))
            )
        } else {
            characters.to_string()
        };
        if self.settings.react.add_translate {
            format!("<{tag}>{}</{tag}>", literal, tag = TRANSLATE_TAG)
        } else {
            literal
        }
    }

    fn instance_tag(&self, writer: &CodeWriter, instance: &InstanceInfo) -> String {
        if let Some(icon) = &instance.icon {
            return format!(
                "<{} icon={} size={{{}}}/>",
                self.settings.icons.component,
                writer.quote(icon),
                format_number(instance.width.max(instance.height))
            );
        }

        let mut tag = format!("<{}", instance.component);
        for (name, value) in &instance.attributes {
            let rendered = match value {
                AttributeValue::Bool(b) => format!("{{{}}}", b),
                AttributeValue::Text(t) => writer.quote(t),
                AttributeValue::Prop(p) => format!("{{props.{}}}", p),
                AttributeValue::Element(e) => format!("{{<{}/>}}", e),
            };
            tag.push_str(&format!(" {}={}", name, rendered));
        }
        tag.push_str("/>");
        tag
    }

    fn write_style(&self, writer: &mut CodeWriter, name: &str, styles: &StyleMap) {
        if styles.is_empty() {
            writer.write_line(&format!("{}: {{}},", name));
            return;
        }
        writer.block(&format!("{}: {{", name), "},", |w| {
            for (property, value) in styles {
                let rendered = match value {
                    StyleValue::Number(n) => format_number(*n),
                    StyleValue::String(s) => w.quote(s),
                    StyleValue::Theme(expr) => expr.clone(),
                    StyleValue::Unset => w.quote("unset"),
                };
                w.write_line(&format!("{}: {},", property, rendered));
            }
        });
    }

    fn write_stylesheet(&self, writer: &mut CodeWriter, model: &ParseModel) {
        writer.block(&format!("const {} = StyleSheet.create({{", STYLE_PREFIX), "});", |w| {
            for (slug, styles) in &model.styles {
                self.write_style(w, slug, styles);
                if let Some(modifiers) = model.variants.get(slug) {
                    for (key, modifier) in modifiers {
                        if !modifier.is_empty() {
                            self.write_style(w, &variant_class_name(slug, key), modifier);
                        }
                    }
                }
            }
        });
    }
}
