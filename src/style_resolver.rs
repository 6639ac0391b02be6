//! Style map resolution from scene-node visual properties

use crate::scene::{AutoLayout, AxisAlign, LayoutMode, Paint, SceneGraph, SceneNode, SizingMode, TextAlign};
use crate::types::{NodeKind, StyleMap, StyleValue};
use crate::utils::{color_string, format_number, to_camel_identifier};

pub struct StyleResolver<'a> {
    graph: &'a dyn SceneGraph,
}

impl<'a> StyleResolver<'a> {
    pub fn new(graph: &'a dyn SceneGraph) -> Self {
        Self { graph }
    }

    /// Resolve the style map of one node. Insertion order is emission order.
    pub fn resolve(&self, node: &SceneNode) -> StyleMap {
        let mut styles = StyleMap::new();

        if let Some(layout) = &node.layout {
            self.resolve_layout(layout, &mut styles);
        }
        self.resolve_sizing(node, &mut styles);

        if let Some(fill) = self.first_solid(&node.fills) {
            let property = if node.kind == NodeKind::Text { "color" } else { "backgroundColor" };
            styles.insert(property.to_string(), fill);
        }

        if let Some(stroke) = self.first_solid(&node.strokes) {
            if node.stroke_weight > 0.0 {
                styles.insert("borderWidth".to_string(), StyleValue::Number(node.stroke_weight));
                styles.insert("borderStyle".to_string(), StyleValue::String("solid".to_string()));
                styles.insert("borderColor".to_string(), stroke);
            }
        }

        let radius = if node.kind == NodeKind::Ellipse {
            node.width.min(node.height) / 2.0
        } else {
            node.corner_radius
        };
        if radius > 0.0 {
            styles.insert("borderRadius".to_string(), StyleValue::Number(radius));
        }

        if node.opacity < 1.0 {
            styles.insert("opacity".to_string(), StyleValue::Number(node.opacity));
        }

        if node.kind == NodeKind::Text {
            self.resolve_text(node, &mut styles);
        }

        styles
    }

    fn resolve_layout(&self, layout: &AutoLayout, styles: &mut StyleMap) {
        let direction = match layout.mode {
            LayoutMode::Horizontal => "row",
            LayoutMode::Vertical => "column",
        };
        styles.insert("flexDirection".to_string(), StyleValue::String(direction.to_string()));

        let justify = match layout.primary_axis_align {
            AxisAlign::Min => None,
            AxisAlign::Center => Some("center"),
            AxisAlign::Max => Some("flex-end"),
            AxisAlign::SpaceBetween => Some("space-between"),
        };
        if let Some(justify) = justify {
            styles.insert("justifyContent".to_string(), StyleValue::String(justify.to_string()));
        }

        let align = match layout.counter_axis_align {
            AxisAlign::Center => Some("center"),
            AxisAlign::Max => Some("flex-end"),
            AxisAlign::Min | AxisAlign::SpaceBetween => None,
        };
        if let Some(align) = align {
            styles.insert("alignItems".to_string(), StyleValue::String(align.to_string()));
        }

        if layout.item_spacing > 0.0 {
            styles.insert("gap".to_string(), StyleValue::Number(layout.item_spacing));
        }

        let sides = [
            ("paddingTop", layout.padding_top),
            ("paddingRight", layout.padding_right),
            ("paddingBottom", layout.padding_bottom),
            ("paddingLeft", layout.padding_left),
        ];
        if sides.iter().all(|(_, v)| *v == layout.padding_top) {
            if layout.padding_top > 0.0 {
                styles.insert("padding".to_string(), StyleValue::Number(layout.padding_top));
            }
        } else {
            for (name, value) in sides {
                if value != 0.0 {
                    styles.insert(name.to_string(), StyleValue::Number(value));
                }
            }
        }
    }

    fn resolve_sizing(&self, node: &SceneNode, styles: &mut StyleMap) {
        match node.sizing.horizontal {
            SizingMode::Fixed => {
                styles.insert("width".to_string(), StyleValue::Number(node.width));
            }
            SizingMode::Fill => {
                styles.insert("flexGrow".to_string(), StyleValue::Number(1.0));
            }
            SizingMode::Hug => {}
        }
        match node.sizing.vertical {
            SizingMode::Fixed => {
                styles.insert("height".to_string(), StyleValue::Number(node.height));
            }
            SizingMode::Fill => {
                styles.insert("alignSelf".to_string(), StyleValue::String("stretch".to_string()));
            }
            SizingMode::Hug => {}
        }
    }

    fn resolve_text(&self, node: &SceneNode, styles: &mut StyleMap) {
        let Some(text) = &node.text else {
            return;
        };
        if let Some(family) = &text.font_family {
            styles.insert("fontFamily".to_string(), StyleValue::String(family.clone()));
        }
        if let Some(size) = text.font_size {
            styles.insert("fontSize".to_string(), StyleValue::Number(size));
        }
        if let Some(weight) = text.font_weight {
            styles.insert(
                "fontWeight".to_string(),
                StyleValue::String(format_number(weight)),
            );
        }
        if let Some(line_height) = text.line_height {
            styles.insert("lineHeight".to_string(), StyleValue::Number(line_height));
        }
        if text.letter_spacing != 0.0 {
            styles.insert("letterSpacing".to_string(), StyleValue::Number(text.letter_spacing));
        }
        let align = match text.text_align {
            TextAlign::Left => None,
            TextAlign::Center => Some("center"),
            TextAlign::Right => Some("right"),
            TextAlign::Justified => Some("justify"),
        };
        if let Some(align) = align {
            styles.insert("textAlign".to_string(), StyleValue::String(align.to_string()));
        }
    }

    /// First visible solid paint, as a literal color or a theme reference when bound.
    fn first_solid(&self, paints: &[Paint]) -> Option<StyleValue> {
        paints.iter().find_map(|paint| match paint {
            Paint::Solid {
                color,
                visible: true,
                bound_variable,
            } => {
                let token = bound_variable
                    .as_deref()
                    .and_then(|id| self.graph.variable(id))
                    .map(|variable| StyleValue::Theme(format!("theme.colors.{}", to_camel_identifier(&variable.name))));
                Some(token.unwrap_or_else(|| StyleValue::String(color_string(color))))
            }
            _ => None,
        })
    }
}
