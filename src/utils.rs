//! Utility functions for the scene compiler

use crate::scene::Rgba;
use crate::types::AssetFormat;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref ICON_NAME: Regex = Regex::new(r"^[a-z0-9-]+:[a-z0-9-]+$").unwrap();
}

/// Split a design-tool name into words on non-alphanumerics and lower→upper boundaries.
pub fn split_words(input: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for ch in input.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_numeric();
        current.push(ch);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn guard_leading_digit(identifier: String) -> String {
    if identifier.starts_with(|c: char| c.is_ascii_digit()) {
        format!("${}", identifier)
    } else {
        identifier
    }
}

/// `Primary Button` -> `primaryButton`
pub fn to_camel_identifier(input: &str) -> String {
    let words = split_words(input);
    let mut out = String::new();
    for (i, word) in words.iter().enumerate() {
        if i == 0 {
            out.push_str(&word.to_lowercase());
        } else {
            out.push_str(&capitalize(word));
        }
    }
    guard_leading_digit(out)
}

/// `primary button` -> `PrimaryButton`
pub fn to_pascal_identifier(input: &str) -> String {
    let out: String = split_words(input).iter().map(|w| capitalize(w)).collect();
    guard_leading_digit(out)
}

/// Identifier for a component property key (`Has Icon#12:0` -> `hasIcon`).
pub fn prop_identifier(key: &str) -> String {
    to_camel_identifier(key.split('#').next().unwrap_or_default())
}

/// Style entry name for a variant modifier: `root` + `State=Hover, Size=Lg` -> `rootStateHoverSizeLg`.
pub fn variant_class_name(slug: &str, variant_key: &str) -> String {
    let suffix: String = variant_key
        .split(", ")
        .collect::<String>()
        .replace('=', "")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
        .collect();
    format!("{}{}", slug, suffix)
}

/// `State=Hover, Size=Large` -> `[("State", "Hover"), ("Size", "Large")]`
pub fn parse_variant_key(variant_key: &str) -> Vec<(&str, &str)> {
    variant_key
        .split(", ")
        .filter_map(|part| part.split_once('='))
        .collect()
}

/// Format a number the way style sheets expect it: integers bare, otherwise two decimals.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn channel(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Opaque colors as `#rrggbb`, translucent ones as `rgba(...)`.
pub fn color_string(color: &Rgba) -> String {
    let (r, g, b) = (channel(color.r), channel(color.g), channel(color.b));
    if color.a >= 1.0 {
        format!("#{}", hex::encode([r, g, b]))
    } else {
        format!(
            "rgba({}, {}, {}, {})",
            r,
            g,
            b,
            format_number((color.a.clamp(0.0, 1.0) * 100.0).round() / 100.0)
        )
    }
}

/// Lower-case hex MD5 of exported bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

pub fn data_uri(format: AssetFormat, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", format.mime(), BASE64.encode(bytes))
}

pub fn decode_base64(data: &str) -> Option<Vec<u8>> {
    BASE64.decode(data.trim()).ok()
}

/// Imported icon sources are named `prefix:name`.
pub fn is_icon_name(name: &str) -> bool {
    ICON_NAME.is_match(name)
}

/// Icon set prefix of an icon name (`ph:star` -> `ph`).
pub fn icon_set(name: &str) -> &str {
    name.split(':').next().unwrap_or(name)
}

/// Wrap `text` in `quote`, escaping backslashes, the quote itself and newlines.
pub fn quote_string(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Whether literal text must become an expression to be valid JSX.
pub fn needs_jsx_expression(text: &str) -> bool {
    text.chars().any(|c| matches!(c, '{' | '}' | '<' | '>' | '\n'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("Primary Button"), vec!["Primary", "Button"]);
        assert_eq!(split_words("icon-left"), vec!["icon", "left"]);
        assert_eq!(split_words("hasIcon"), vec!["has", "Icon"]);
        assert_eq!(split_words("blue/500"), vec!["blue", "500"]);
        assert!(split_words("  --  ").is_empty());
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(to_camel_identifier("Primary Button"), "primaryButton");
        assert_eq!(to_camel_identifier("ALL CAPS"), "allCaps");
        assert_eq!(to_camel_identifier("components"), "components");
        assert_eq!(to_pascal_identifier("primary button"), "PrimaryButton");
        assert_eq!(to_pascal_identifier("ph:star"), "PhStar");
        assert_eq!(to_camel_identifier("100"), "$100");
        assert_eq!(to_pascal_identifier("2 column"), "$2Column");
        assert_eq!(to_camel_identifier(""), "");
    }

    #[test]
    fn test_prop_identifier() {
        assert_eq!(prop_identifier("Has Icon#12:0"), "hasIcon");
        assert_eq!(prop_identifier("State"), "state");
        assert_eq!(prop_identifier(""), "");
    }

    #[test]
    fn test_variant_class_name() {
        assert_eq!(variant_class_name("root", "State=Hover"), "rootStateHover");
        assert_eq!(
            variant_class_name("label", "State=Hover, Size=Large"),
            "labelStateHoverSizeLarge"
        );
        assert_eq!(variant_class_name("root", "State=Is Pressed"), "rootStateIsPressed");
    }

    #[test]
    fn test_parse_variant_key() {
        assert_eq!(
            parse_variant_key("State=Hover, Size=Large"),
            vec![("State", "Hover"), ("Size", "Large")]
        );
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(16.0), "16");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(0.333333), "0.33");
        assert_eq!(format_number(-4.0), "-4");
    }

    #[test]
    fn test_color_string() {
        let red = Rgba { r: 1.0, g: 0.0, b: 0.0, a: 1.0 };
        assert_eq!(color_string(&red), "#ff0000");
        let faded = Rgba { r: 0.0, g: 0.0, b: 0.0, a: 0.5 };
        assert_eq!(color_string(&faded), "rgba(0, 0, 0, 0.5)");
    }

    #[test]
    fn test_content_hash_and_data_uri() {
        assert_eq!(content_hash(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(data_uri(AssetFormat::Svg, b"<svg/>"), "data:image/svg+xml;base64,PHN2Zy8+");
        assert_eq!(decode_base64("PHN2Zy8+").unwrap(), b"<svg/>".to_vec());
    }

    #[test]
    fn test_icon_names() {
        assert!(is_icon_name("ph:star"));
        assert!(is_icon_name("mdi:arrow-left"));
        assert!(!is_icon_name("Button"));
        assert!(!is_icon_name("Button: Primary"));
        assert_eq!(icon_set("ph:star"), "ph");
    }

    #[test]
    fn test_quote_string() {
        assert_eq!(quote_string("it's", '\''), r"'it\'s'");
        assert_eq!(quote_string("plain", '"'), "\"plain\"");
        assert!(needs_jsx_expression("a {b}"));
        assert!(!needs_jsx_expression("Click me"));
    }
}
