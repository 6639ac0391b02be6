//! Events emitted to the UI boundary

use crate::types::{AssetRef, ComponentBundle, NodeId};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub id: NodeId,
    pub name: String,
    pub page: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    /// True until a bundle exists for this component in the session.
    pub loading: bool,
}

/// Process-wide icon registry, rebuilt on every pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IconRegistry {
    pub sets: IndexSet<String>,
    pub list: IndexSet<String>,
    pub used: IndexSet<String>,
    pub map: IndexMap<String, NodeId>,
}

/// Aggregated project state carried by every build event.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectBuild {
    /// Index module re-exporting every roster component.
    pub index: String,
    pub pages: Vec<String>,
    pub links: IndexMap<String, String>,
    pub total: usize,
    pub loaded: usize,
    pub roster: BTreeMap<String, RosterEntry>,
    /// Content hash to asset, deduplicated across components.
    pub assets: IndexMap<String, AssetRef>,
    /// Component name to the content hashes it uses.
    pub asset_map: IndexMap<String, Vec<String>>,
    pub icons: IconRegistry,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildEvent {
    #[serde(rename_all = "camelCase")]
    ComponentBuild {
        pass: u64,
        state: Box<ProjectBuild>,
        bundle: Rc<ComponentBundle>,
    },
    #[serde(rename_all = "camelCase")]
    ThemeUpdate {
        code: String,
        current_theme_name: Option<String>,
    },
    Notify { message: String },
}

impl BuildEvent {
    pub fn notify(message: impl Into<String>) -> Self {
        Self::Notify {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ComponentBuild { .. } => "COMPONENT_BUILD",
            Self::ThemeUpdate { .. } => "THEME_UPDATE",
            Self::Notify { .. } => "NOTIFY",
        }
    }
}

/// Receiver of build events.
pub trait EventSink {
    fn emit(&mut self, event: BuildEvent);
}

impl EventSink for Vec<BuildEvent> {
    fn emit(&mut self, event: BuildEvent) {
        self.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = BuildEvent::ThemeUpdate {
            code: "export default defaultTheme;".to_string(),
            current_theme_name: Some("Light".to_string()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "THEME_UPDATE");
        assert_eq!(json["currentThemeName"], "Light");

        let notify = serde_json::to_value(BuildEvent::notify("hello")).unwrap();
        assert_eq!(notify["type"], "NOTIFY");
        assert_eq!(notify["message"], "hello");
    }

    #[test]
    fn test_project_build_field_names() {
        let json = serde_json::to_value(ProjectBuild::default()).unwrap();
        assert!(json.get("assetMap").is_some());
        assert!(json["icons"].get("sets").is_some());
    }

    #[test]
    fn test_vec_sink_collects() {
        let mut sink: Vec<BuildEvent> = Vec::new();
        sink.emit(BuildEvent::notify("a"));
        sink.emit(BuildEvent::notify("b"));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink[0].kind(), "NOTIFY");
    }
}
