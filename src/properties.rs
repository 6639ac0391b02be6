//! Component property ordering policies
//!
//! Two comparators are used in different emission contexts and they are
//! intentionally different:
//!
//! * [`declaration_order`] drives the prop interface: booleans first, then
//!   by key.
//! * [`stable_ui_order`] drives instance attributes and previews: the
//!   conditional kinds (boolean, instance swap) last, then by type token,
//!   then by key.

use crate::types::{ComponentPropertyType, PropertyDefinition};
use indexmap::IndexMap;
use std::cmp::Ordering;

fn by_key(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

/// Booleans first, otherwise alphabetical by key.
pub fn declaration_order(
    a: (&str, ComponentPropertyType),
    b: (&str, ComponentPropertyType),
) -> Ordering {
    let a_bool = a.1 == ComponentPropertyType::Boolean;
    let b_bool = b.1 == ComponentPropertyType::Boolean;
    b_bool.cmp(&a_bool).then_with(|| by_key(a.0, b.0))
}

/// Conditional kinds last, then by type token, then by key.
pub fn stable_ui_order(
    a: (&str, ComponentPropertyType),
    b: (&str, ComponentPropertyType),
) -> Ordering {
    a.1.is_conditional()
        .cmp(&b.1.is_conditional())
        .then_with(|| a.1.token().cmp(b.1.token()))
        .then_with(|| by_key(a.0, b.0))
}

/// Property definitions in declaration order.
pub fn sorted_for_interface(
    definitions: &IndexMap<String, PropertyDefinition>,
) -> Vec<(&String, &PropertyDefinition)> {
    let mut entries: Vec<_> = definitions.iter().collect();
    entries.sort_by(|a, b| declaration_order((a.0, a.1.kind), (b.0, b.1.kind)));
    entries
}

/// Any keyed list sorted by stable UI order.
pub fn sort_stable_ui<T>(items: &mut [T], key: impl Fn(&T) -> (&str, ComponentPropertyType)) {
    items.sort_by(|a, b| stable_ui_order(key(a), key(b)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PropertyValue;
    use ComponentPropertyType::*;

    fn defs(entries: &[(&str, ComponentPropertyType)]) -> IndexMap<String, PropertyDefinition> {
        entries
            .iter()
            .map(|(name, kind)| {
                (
                    name.to_string(),
                    PropertyDefinition {
                        kind: *kind,
                        default_value: PropertyValue::default(),
                        variant_options: Vec::new(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_declaration_order_booleans_first() {
        let definitions = defs(&[("zebra", Text), ("icon", InstanceSwap), ("enabled", Boolean)]);
        let names: Vec<&str> = sorted_for_interface(&definitions)
            .into_iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(names, vec!["enabled", "icon", "zebra"]);
    }

    #[test]
    fn test_stable_ui_order_conditionals_last() {
        let mut items = vec![
            ("enabled", Boolean),
            ("icon", InstanceSwap),
            ("zebra", Text),
            ("size", Variant),
            ("label", Text),
        ];
        sort_stable_ui(&mut items, |(name, kind)| (*name, *kind));
        let names: Vec<&str> = items.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["label", "zebra", "size", "enabled", "icon"]);
    }

    #[test]
    fn test_policies_disagree() {
        let a = ("alpha", Boolean);
        let b = ("beta", Text);
        assert_eq!(declaration_order(a, b), Ordering::Less);
        assert_eq!(stable_ui_order(a, b), Ordering::Greater);
    }

    #[test]
    fn test_key_tie_break_is_case_insensitive() {
        assert_eq!(declaration_order(("Beta", Text), ("alpha", Text)), Ordering::Greater);
        assert_eq!(stable_ui_order(("b", Text), ("A", Text)), Ordering::Greater);
    }
}
