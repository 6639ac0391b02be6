//! Theme module generation from variable collections and local paint styles

use crate::scene::{Paint, Rgba, SceneGraph, Variable, VariableCollection, VariableType, VariableValue};
use crate::types::BREAKPOINTS;
use crate::utils::{color_string, to_camel_identifier};
use crate::writer::CodeWriter;
use crate::Settings;
use indexmap::IndexMap;

/// Generated theme module plus what the orchestrator needs to know about it.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeOutput {
    pub code: String,
    /// Whether any theme object carries at least one color.
    pub has_styles: bool,
    /// Default mode name of the theme collection, if one exists.
    pub current: Option<String>,
    pub modes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum TokenValue {
    Literal(String),
    /// Reference into the flat `colors` object.
    Reference(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Token {
    value: TokenValue,
    comment: String,
}

/// Keyed by the emitted identifier, so a later source overrides an earlier one.
type Tokens = IndexMap<String, Token>;

pub fn generate_theme(graph: &dyn SceneGraph, settings: &Settings) -> ThemeOutput {
    let mut writer = CodeWriter::new(&settings.writer);
    let theme = graph.collection_named(&settings.theme.theme_collection);
    let mut has_styles = false;

    let colors = color_tokens(graph, graph.collection_named(&settings.theme.color_collection));
    writer.block("export const colors = {", "};", |w| {
        if colors.is_empty() {
            w.write_line("// No color variables found");
        }
        for (name, token) in &colors {
            write_token(w, name, token);
        }
    });
    writer.blank_line();

    let mut modes = Vec::new();
    let mut current = None;
    match theme {
        Some(collection) => {
            for mode in &collection.modes {
                let mut tokens = theme_tokens(graph, collection, &mode.mode_id);
                tokens.extend(local_style_tokens(graph));
                has_styles |= write_theme(&mut writer, &to_camel_identifier(&mode.name), &tokens);
                modes.push(mode.name.clone());
            }
            let default = collection.default_mode().or_else(|| collection.modes.first());
            if let Some(default) = default {
                writer.write_line(&format!("export default {}Theme;", to_camel_identifier(&default.name)));
                current = Some(default.name.clone());
            }
        }
        None => {
            has_styles = write_theme(&mut writer, "default", &local_style_tokens(graph));
            writer.write_line("export default defaultTheme;");
        }
    }
    writer.blank_line();

    writer.block("export const breakpoints = {", "};", |w| {
        for (name, width) in BREAKPOINTS {
            w.write_line(&format!("{}: {},", name, width));
        }
    });

    ThemeOutput {
        code: writer.into_string(),
        has_styles,
        current,
        modes,
    }
}

fn write_token(writer: &mut CodeWriter, name: &str, token: &Token) {
    if !token.comment.is_empty() {
        writer.write_line(&format!("/** {} */", token.comment));
    }
    let value = match &token.value {
        TokenValue::Literal(color) => writer.quote(color),
        TokenValue::Reference(reference) => reference.clone(),
    };
    writer.write_line(&format!("{}: {},", name, value));
}

/// Write one `export const <name>Theme`. Returns whether it had any colors.
fn write_theme(writer: &mut CodeWriter, name: &str, tokens: &Tokens) -> bool {
    writer.block(&format!("export const {}Theme = {{", name), "};", |w| {
        if tokens.is_empty() {
            w.write_line("// No local color styles or color variables found");
            return;
        }
        w.block("colors: {", "},", |w| {
            for (name, token) in tokens {
                write_token(w, name, token);
            }
        });
    });
    writer.blank_line();
    !tokens.is_empty()
}

fn color_variables<'g>(graph: &'g dyn SceneGraph, collection: &'g VariableCollection) -> impl Iterator<Item = &'g Variable> + 'g {
    collection
        .variable_ids
        .iter()
        .filter_map(move |id| graph.variable(id))
        .filter(|v| v.resolved_type == VariableType::Color)
}

/// Concrete color of a variable in its own collection's default mode, following one alias.
fn resolve_color(graph: &dyn SceneGraph, variable: &Variable, mode_id: &str) -> Option<Rgba> {
    let value = variable
        .values_by_mode
        .get(mode_id)
        .or_else(|| variable.values_by_mode.values().next())?;
    match value {
        VariableValue::Color(color) => Some(*color),
        VariableValue::VariableAlias { id } => {
            let target = graph.variable(id)?;
            target.values_by_mode.values().find_map(|v| match v {
                VariableValue::Color(color) => Some(*color),
                _ => None,
            })
        }
        _ => None,
    }
}

fn color_tokens(graph: &dyn SceneGraph, collection: Option<&VariableCollection>) -> Tokens {
    let mut tokens = Tokens::new();
    let Some(collection) = collection else {
        return tokens;
    };
    for variable in color_variables(graph, collection) {
        if let Some(color) = resolve_color(graph, variable, &collection.default_mode_id) {
            tokens.insert(
                to_camel_identifier(&variable.name),
                Token {
                    value: TokenValue::Literal(color_string(&color)),
                    comment: variable.description.clone(),
                },
            );
        }
    }
    tokens
}

fn theme_tokens(graph: &dyn SceneGraph, collection: &VariableCollection, mode_id: &str) -> Tokens {
    let mut tokens = Tokens::new();
    for variable in color_variables(graph, collection) {
        let value = match variable.values_by_mode.get(mode_id) {
            Some(VariableValue::VariableAlias { id }) => match graph.variable(id) {
                Some(target) => TokenValue::Reference(format!("colors.{}", to_camel_identifier(&target.name))),
                None => continue,
            },
            Some(VariableValue::Color(color)) => TokenValue::Literal(color_string(color)),
            _ => continue,
        };
        tokens.insert(
            to_camel_identifier(&variable.name),
            Token {
                value,
                comment: variable.description.clone(),
            },
        );
    }
    tokens
}

fn local_style_tokens(graph: &dyn SceneGraph) -> Tokens {
    graph
        .paint_styles()
        .iter()
        .map(|style| {
            let color = style
                .paints
                .iter()
                .find_map(|paint| match paint {
                    Paint::Solid { color, .. } => Some(*color),
                    _ => None,
                })
                .unwrap_or(Rgba::rgb(0.0, 0.0, 0.0));
            (
                to_camel_identifier(&style.name),
                Token {
                    value: TokenValue::Literal(color_string(&color)),
                    comment: style.description.clone(),
                },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::DocumentBuilder;

    #[test]
    fn test_degraded_theme() {
        let doc = DocumentBuilder::new("Empty").build();
        let output = generate_theme(&doc, &Settings::default());
        let expected = "\
export const colors = {
  // No color variables found
};

export const defaultTheme = {
  // No local color styles or color variables found
};

export default defaultTheme;

export const breakpoints = {
  xs: 0,
  sm: 576,
  md: 768,
  lg: 992,
  xl: 1200,
};
";
        assert_eq!(output.code, expected);
        assert!(!output.has_styles);
        assert!(output.current.is_none());
    }

    #[test]
    fn test_local_styles_only() {
        let mut b = DocumentBuilder::new("Styles");
        b.paint_style("Brand/Primary", Rgba::rgb(1.0, 0.0, 0.0));
        let doc = b.build();
        let output = generate_theme(&doc, &Settings::default());
        assert!(output.has_styles);
        assert!(output
            .code
            .contains("export const defaultTheme = {\n  colors: {\n    brandPrimary: '#ff0000',\n  },\n};"));
    }

    #[test]
    fn test_theme_modes_with_aliases() {
        let mut b = DocumentBuilder::new("Tokens");
        let colors = b.collection("Colors", &["Value"]);
        let blue = b.color_variable(&colors, "Blue/500", vec![VariableValue::Color(Rgba::rgb(0.0, 0.0, 1.0))]);
        b.color_variable(&colors, "100", vec![VariableValue::Color(Rgba::rgb(1.0, 1.0, 1.0))]);
        let theme = b.collection("Theme", &["Light", "Dark"]);
        b.color_variable(
            &theme,
            "Primary",
            vec![
                VariableValue::VariableAlias { id: blue.clone() },
                VariableValue::Color(Rgba::rgb(0.0, 0.0, 0.0)),
            ],
        );
        b.paint_style("Accent", Rgba::rgb(0.0, 1.0, 0.0));
        let doc = b.build();

        let output = generate_theme(&doc, &Settings::default());
        let code = &output.code;
        assert!(code.contains("  blue500: '#0000ff',\n  $100: '#ffffff',\n"));
        assert!(code.contains(
            "export const lightTheme = {\n  colors: {\n    primary: colors.blue500,\n    accent: '#00ff00',\n  },\n};"
        ));
        assert!(code.contains("export const darkTheme = {\n  colors: {\n    primary: '#000000',"));
        assert!(code.contains("export default lightTheme;"));
        assert!(code.find("export const colors").unwrap() < code.find("export const lightTheme").unwrap());
        assert_eq!(output.current.as_deref(), Some("Light"));
        assert_eq!(output.modes, vec!["Light", "Dark"]);
        assert!(output.has_styles);
    }

    #[test]
    fn test_paint_style_overrides_same_named_variable() {
        let mut b = DocumentBuilder::new("Tokens");
        let theme = b.collection("Theme", &["Light"]);
        b.color_variable(&theme, "Primary", vec![VariableValue::Color(Rgba::rgb(0.0, 0.0, 0.0))]);
        b.color_variable(&theme, "Secondary", vec![VariableValue::Color(Rgba::rgb(0.0, 0.0, 1.0))]);
        b.paint_style("primary", Rgba::rgb(1.0, 0.0, 0.0));
        let doc = b.build();

        let code = generate_theme(&doc, &Settings::default()).code;
        assert_eq!(code.matches("primary:").count(), 1, "{}", code);
        assert!(code.contains("    primary: '#ff0000',\n    secondary: '#0000ff',\n"));
    }
}
