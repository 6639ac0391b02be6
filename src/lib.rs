//! Scene Compiler
//!
//! Compiles the component definitions of a design document (a tree of
//! frames, text, instances and variant sets) into React Native component
//! modules, a theme module and a project index.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use scenec::{compile_document_file, Result, Settings};
//!
//! fn main() -> Result<()> {
//!     let stats = compile_document_file("design.json", "generated", &Settings::default())?;
//!     println!("{} components", stats.components);
//!     Ok(())
//! }
//! ```
//!
//! # Compilation Pipeline
//!
//! 1. **Discovery**: every component is mapped to its compile target (the
//!    variant set for variant members) and listed in the roster
//! 2. **Extraction**: the target's subtree becomes a `ParseModel` of nodes,
//!    base styles, variant style diffs, assets and links
//! 3. **Emission**: the model is written out as a component module with a
//!    props interface, variant class tables and a stylesheet
//! 4. **Theme**: color variables and paint styles become the theme module
//! 5. **Caching**: results are written through an in-memory tier and a
//!    durable tier stored in the document's per-node plugin data
//!
//! The orchestrator drives these per pass and streams one build event per
//! compiled component.

pub mod error;
pub mod types;
pub mod utils;
pub mod properties;
pub mod scene;
pub mod style_resolver;
pub mod extractor;
pub mod writer;
pub mod codegen;
pub mod theme;
pub mod cache;
pub mod events;
pub mod orchestrator;
pub mod cli;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

// Re-export commonly used types and functions
pub use error::{CompilerError, Result};
pub use types::*;
pub use scene::{Document, DocumentBuilder, DocumentChange, SceneGraph};
pub use extractor::{compile_target, describe_component, ModelExtractor};
pub use codegen::CodeGenerator;
pub use theme::{generate_theme, ThemeOutput};
pub use cache::{CacheStats, CacheTier, CompileCache, MemoryTier, NodeDataTier};
pub use events::{BuildEvent, EventSink, ProjectBuild, RosterEntry};
pub use orchestrator::{CompileOutcome, Orchestrator, PassSummary};
pub use cli::EnhancedCli;

/// Compiler version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Target UI framework flavor. Only React Native is generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flavor {
    #[default]
    #[serde(rename = "react-native")]
    ReactNative,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactSettings {
    pub flavor: Flavor,
    /// Emit the framework import line.
    pub add_import: bool,
    /// Wrap literal text in the translation helper.
    pub add_translate: bool,
}

impl Default for ReactSettings {
    fn default() -> Self {
        Self {
            flavor: Flavor::ReactNative,
            add_import: false,
            add_translate: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterSettings {
    pub indent_number_of_spaces: usize,
    pub use_tabs: bool,
    pub use_single_quote: bool,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            indent_number_of_spaces: 2,
            use_tabs: false,
            use_single_quote: true,
        }
    }
}

/// Names of the variable collections the theme is read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeSettings {
    pub theme_collection: String,
    pub color_collection: String,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            theme_collection: "Theme".to_string(),
            color_collection: "Colors".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IconSettings {
    /// Component rendered for icon instances.
    pub component: String,
    pub import_path: String,
}

impl Default for IconSettings {
    fn default() -> Self {
        Self {
            component: "Icon".to_string(),
            import_path: "react-native-iconify".to_string(),
        }
    }
}

/// Plugin-data location of the durable cache tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub namespace: String,
    pub key: String,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            namespace: "scenec".to_string(),
            key: "data".to_string(),
        }
    }
}

/// Generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub react: ReactSettings,
    pub writer: WriterSettings,
    pub theme: ThemeSettings,
    pub icons: IconSettings,
    pub cache: CacheSettings,

    /// Pause between component compiles within a pass
    pub compile_yield_ms: u64,

    /// Theme refresh tick in watch mode
    pub theme_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            react: ReactSettings::default(),
            writer: WriterSettings::default(),
            theme: ThemeSettings::default(),
            icons: IconSettings::default(),
            cache: CacheSettings::default(),
            compile_yield_ms: 1,
            theme_interval_ms: 300,
        }
    }
}

/// Compilation statistics and metrics
#[derive(Debug, Clone, Default, Serialize)]
pub struct CompilationStats {
    /// Components listed in the roster
    pub components: usize,

    /// Components recomputed in the last pass
    pub compiled: usize,

    /// Components served from cache in the first pass
    pub cached: usize,

    /// Components whose compile failed in the last pass
    pub failed: usize,

    /// Number of passes run
    pub passes: usize,

    /// Distinct assets after content-hash dedup
    pub asset_count: usize,

    pub icons_used: usize,

    /// Files written to the output directory
    pub files_written: usize,

    /// Compilation time in milliseconds
    pub compile_time_ms: u64,

    pub cache: CacheStats,
}

/// Everything one project compile produced.
#[derive(Debug, Clone, Default)]
pub struct ProjectOutput {
    /// Latest bundle per compile target, in first-build order.
    pub bundles: IndexMap<NodeId, Rc<ComponentBundle>>,
    /// Aggregated state from the last build event.
    pub state: ProjectBuild,
    pub theme: String,
    pub summaries: Vec<PassSummary>,
    pub cache: CacheStats,
}

impl ProjectOutput {
    pub fn stats(&self) -> CompilationStats {
        let first = self.summaries.first().copied().unwrap_or_default();
        let last = self.summaries.last().copied().unwrap_or_default();
        CompilationStats {
            components: self.state.total,
            compiled: last.compiled,
            cached: first.cached,
            failed: last.failed,
            passes: self.summaries.len(),
            asset_count: self.state.assets.len(),
            icons_used: self.state.icons.used.len(),
            cache: self.cache,
            ..Default::default()
        }
    }
}

/// Keeps the latest bundle and state while forwarding events.
struct Collector<'s> {
    inner: &'s mut dyn EventSink,
    output: ProjectOutput,
}

impl EventSink for Collector<'_> {
    fn emit(&mut self, event: BuildEvent) {
        match &event {
            BuildEvent::ComponentBuild { state, bundle, .. } => {
                self.output.bundles.insert(bundle.id.clone(), Rc::clone(bundle));
                self.output.state = (**state).clone();
            }
            BuildEvent::ThemeUpdate { code, .. } => self.output.theme = code.clone(),
            BuildEvent::Notify { .. } => {}
        }
        self.inner.emit(event);
    }
}

/// Load every component of `document` and generate the theme, streaming events to `sink`.
///
/// With `skip_cache` a single pass recomputes everything; otherwise the
/// load runs a cached pass followed by a refresh when anything was cached.
pub fn compile_document(
    document: &mut Document,
    settings: &Settings,
    skip_cache: bool,
    sink: &mut dyn EventSink,
) -> Result<ProjectOutput> {
    let mut orchestrator = Orchestrator::new(settings.clone());
    let mut collector = Collector {
        inner: sink,
        output: ProjectOutput::default(),
    };

    let summaries = if skip_cache {
        let components = orchestrator.discover(document);
        if components.is_empty() {
            Vec::new()
        } else {
            vec![orchestrator.compile(document, &components, true, None, &mut collector)]
        }
    } else {
        orchestrator.load_components(document, &mut collector)
    };
    orchestrator.refresh_theme(document, &mut collector);

    let mut output = collector.output;
    output.summaries = summaries;
    output.cache = orchestrator.cache().stats();
    Ok(output)
}

/// Write one component module as `<Name>.tsx`.
pub fn write_bundle(out_dir: &Path, bundle: &ComponentBundle) -> Result<PathBuf> {
    let path = out_dir.join(format!("{}.tsx", bundle.name));
    fs::write(&path, &bundle.code)?;
    log::debug!("Wrote {}", path.display());
    Ok(path)
}

/// Write the component modules, `theme.ts` and `index.ts`. Returns the number of files written.
pub fn write_project(out_dir: &Path, output: &ProjectOutput) -> Result<usize> {
    fs::create_dir_all(out_dir)?;
    let mut written = 0;
    for bundle in output.bundles.values() {
        write_bundle(out_dir, bundle)?;
        written += 1;
    }
    fs::write(out_dir.join("theme.ts"), &output.theme)?;
    fs::write(out_dir.join("index.ts"), &output.state.index)?;
    Ok(written + 2)
}

/// Compile a document snapshot into `out_dir`. The snapshot itself is not modified on disk.
pub fn compile_document_file(
    input_path: impl AsRef<Path>,
    out_dir: impl AsRef<Path>,
    settings: &Settings,
) -> Result<CompilationStats> {
    let start_time = Instant::now();
    let input_path = input_path.as_ref();
    log::info!("{} v{}", NAME, VERSION);
    log::info!("Compiling '{}' into '{}'", input_path.display(), out_dir.as_ref().display());

    let mut document = Document::load(input_path)?;
    let mut events: Vec<BuildEvent> = Vec::new();
    let output = compile_document(&mut document, settings, false, &mut events)?;

    let mut stats = output.stats();
    stats.files_written = write_project(out_dir.as_ref(), &output)?;
    stats.compile_time_ms = start_time.elapsed().as_millis() as u64;
    log::debug!("Full stats: {:?}", stats);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Document {
        let mut b = DocumentBuilder::new("Kit");
        let page = b.page("Components");
        let button = b.component(&page, "Button");
        b.text(&button, "Label", "Go");
        let card = b.component(&page, "Card");
        b.instance(&card, "Action", &button);
        b.build()
    }

    fn quick() -> Settings {
        Settings {
            compile_yield_ms: 0,
            ..Default::default()
        }
    }

    #[test]
    fn test_settings_from_partial_toml() {
        let settings: Settings = toml::from_str(
            "compile_yield_ms = 0\n\n[writer]\nuse_single_quote = false\n\n[react]\nflavor = \"react-native\"\n",
        )
        .unwrap();
        assert!(!settings.writer.use_single_quote);
        assert_eq!(settings.writer.indent_number_of_spaces, 2);
        assert_eq!(settings.compile_yield_ms, 0);
        assert_eq!(settings.theme_interval_ms, 300);
        assert_eq!(settings.icons, IconSettings::default());
    }

    #[test]
    fn test_compile_document_collects_bundles() {
        let mut doc = sample();
        let mut events = Vec::new();
        let output = compile_document(&mut doc, &quick(), false, &mut events).unwrap();

        assert_eq!(output.bundles.len(), 2);
        assert_eq!(output.state.total, 2);
        assert!(output.theme.contains("export const breakpoints"));
        assert_eq!(events.last().map(|e| e.kind()), Some("THEME_UPDATE"));

        let stats = output.stats();
        assert_eq!(stats.components, 2);
        assert_eq!(stats.compiled, 2);
        assert_eq!(stats.passes, 1);
    }

    #[test]
    fn test_compile_document_file_writes_project() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("design.json");
        sample().save(&input).unwrap();
        let out = dir.path().join("generated");

        let stats = compile_document_file(&input, &out, &quick()).unwrap();
        assert_eq!(stats.files_written, 4);
        assert!(out.join("Button.tsx").exists());
        assert!(out.join("Card.tsx").exists());
        let index = fs::read_to_string(out.join("index.ts")).unwrap();
        assert_eq!(index, "export {Button} from './Button';\nexport {Card} from './Card';\n");
        let card = fs::read_to_string(out.join("Card.tsx")).unwrap();
        assert!(card.contains("<Button/>"));

        // The snapshot on disk keeps no cache entries.
        let reloaded = Document::load(&input).unwrap();
        let settings = CacheSettings::default();
        assert!(reloaded.find_all(NodeKind::Component).iter().all(|id| reloaded
            .plugin_data(id, &settings.namespace, &settings.key)
            .is_none()));
    }

    #[test]
    fn test_missing_input() {
        let dir = TempDir::new().unwrap();
        let err = compile_document_file(dir.path().join("nope.json"), dir.path(), &quick()).unwrap_err();
        assert!(matches!(err, CompilerError::FileNotFound { .. } | CompilerError::Io(_)));
    }
}
