//! Compile orchestration: discovery, roster, incremental passes and events
//!
//! A pass always lists every discovered component in the roster, then
//! compiles either everything or only the targets touched by a document
//! change. Each compiled component is streamed to the [`EventSink`] together
//! with the running aggregates. Passes take `&mut self`, so they never
//! interleave; every event carries the number of the pass that produced it.

use crate::cache::CompileCache;
use crate::codegen::CodeGenerator;
use crate::error::{CompilerError, Result};
use crate::events::{BuildEvent, EventSink, ProjectBuild, RosterEntry};
use crate::extractor::{compile_target, describe_component, owning_target, ModelExtractor};
use crate::scene::{ChangeKind, DocumentChange, SceneGraph};
use crate::theme::{generate_theme, ThemeOutput};
use crate::types::{BundleIcons, ComponentBundle, NodeId, NodeKind, PLUGIN_DATA_PROPERTY};
use crate::utils::{icon_set, is_icon_name, to_camel_identifier};
use crate::Settings;
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::collections::HashSet;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct CompileOutcome {
    pub bundle: Rc<ComponentBundle>,
    /// Served from either cache tier rather than recomputed.
    pub cached: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub pass: u64,
    pub total: usize,
    pub compiled: usize,
    pub cached: usize,
    pub failed: usize,
}

pub struct Orchestrator {
    settings: Settings,
    cache: CompileCache,
    pass: u64,
}

impl Orchestrator {
    pub fn new(settings: Settings) -> Self {
        let cache = CompileCache::new(&settings.cache);
        Self::with_cache(settings, cache)
    }

    pub fn with_cache(settings: Settings, cache: CompileCache) -> Self {
        Self { settings, cache, pass: 0 }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn cache(&self) -> &CompileCache {
        &self.cache
    }

    /// Number of the last pass started.
    pub fn pass(&self) -> u64 {
        self.pass
    }

    /// Compile targets of every component in the document, in document order.
    /// Imported icon sources are excluded.
    pub fn discover(&self, graph: &dyn SceneGraph) -> IndexSet<NodeId> {
        graph
            .find_all(NodeKind::Component)
            .iter()
            .filter_map(|id| compile_target(graph, id))
            .filter(|id| graph.node(id).map_or(false, |n| !is_icon_name(&n.name)))
            .collect()
    }

    /// Icon source components: icon name -> node id.
    pub fn icon_sources(&self, graph: &dyn SceneGraph) -> IndexMap<String, NodeId> {
        graph
            .find_all(NodeKind::Component)
            .into_iter()
            .filter_map(|id| {
                let node = graph.node(&id)?;
                is_icon_name(&node.name).then(|| (node.name.clone(), id))
            })
            .collect()
    }

    /// Last selected variant member of `target`, if any.
    fn selected_variant<'g>(&self, graph: &'g dyn SceneGraph, target: &str) -> Option<&'g str> {
        graph
            .selection()
            .iter()
            .rev()
            .find(|id| graph.parent(id).map_or(false, |p| p.id == target))
            .map(|id| id.as_str())
    }

    /// Run extraction, emission and theme generation for one target.
    pub fn build_bundle(&self, graph: &dyn SceneGraph, id: &str) -> Result<ComponentBundle> {
        let descriptor = describe_component(graph, id, self.selected_variant(graph, id))?;
        let model = ModelExtractor::new(graph).extract(&descriptor)?;
        let generator = CodeGenerator::new(&self.settings);
        let code = generator.generate(&descriptor, &model)?;
        let theme = generate_theme(graph, &self.settings);

        let sources = self.icon_sources(graph);
        let icons = BundleIcons {
            list: sources.keys().cloned().collect(),
            map: sources,
            used: model.meta.icons.iter().cloned().collect(),
        };

        Ok(ComponentBundle {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            page: descriptor.page.clone(),
            path: descriptor.path.clone(),
            code,
            theme: theme.code,
            preview: generator.generate_preview(&descriptor),
            links: model.links,
            icons,
            assets: model
                .assets
                .into_values()
                .map(|asset| (asset.hash.clone(), asset))
                .collect(),
        })
    }

    /// Serve a target from cache, or recompute it and write through both tiers.
    pub fn compile_component(
        &mut self,
        graph: &mut dyn SceneGraph,
        id: &str,
        skip_cache: bool,
    ) -> Result<CompileOutcome> {
        if !skip_cache {
            if let Some(bundle) = self.cache.lookup(graph, id) {
                return Ok(CompileOutcome { bundle, cached: true });
            }
        }

        let bundle = Rc::new(self.build_bundle(graph, id)?);
        if let Err(e) = self.cache.store(graph, id, &bundle) {
            log::warn!("Durable cache write failed for {}: {}", id, e);
        }
        Ok(CompileOutcome { bundle, cached: false })
    }

    /// Roster entries for `components`, in discovery order. Components that
    /// cannot be described are left out.
    pub fn roster(&self, graph: &dyn SceneGraph, components: &IndexSet<NodeId>) -> Vec<RosterEntry> {
        components
            .iter()
            .filter_map(|id| {
                let descriptor = match describe_component(graph, id, None) {
                    Ok(descriptor) => descriptor,
                    Err(e) => {
                        log::warn!("Skipping {} in roster: {}", id, e);
                        return None;
                    }
                };
                let cached = self.cache.peek_volatile(graph, id);
                Some(RosterEntry {
                    id: descriptor.id,
                    name: descriptor.name,
                    page: descriptor.page,
                    path: descriptor.path,
                    preview: cached.as_ref().map(|b| b.preview.clone()),
                    loading: cached.is_none(),
                })
            })
            .collect()
    }

    fn aggregate(state: &mut ProjectBuild, bundle: &ComponentBundle) {
        state.links.extend(bundle.links.iter().map(|(k, v)| (k.clone(), v.clone())));
        for (icon, node) in &bundle.icons.map {
            state.icons.map.insert(icon.clone(), node.clone());
        }
        for icon in &bundle.icons.list {
            state.icons.list.insert(icon.clone());
            state.icons.sets.insert(icon_set(icon).to_string());
        }
        for icon in &bundle.icons.used {
            state.icons.used.insert(icon.clone());
        }
        for (hash, asset) in &bundle.assets {
            state.assets.insert(hash.clone(), asset.clone());
        }
        state
            .asset_map
            .insert(bundle.name.clone(), bundle.assets.keys().cloned().collect());
    }

    /// One orchestration pass over `components`, compiling `updated` (or all of them).
    pub fn compile(
        &mut self,
        graph: &mut dyn SceneGraph,
        components: &IndexSet<NodeId>,
        skip_cache: bool,
        updated: Option<&IndexSet<NodeId>>,
        sink: &mut dyn EventSink,
    ) -> PassSummary {
        self.pass += 1;
        let pass = self.pass;
        let discovered: HashSet<NodeId> = components.iter().cloned().collect();
        self.cache.prune(&discovered);

        let mut state = ProjectBuild {
            pages: graph.pages().iter().map(|p| p.name.clone()).collect(),
            ..Default::default()
        };
        let roster = self.roster(graph, components);
        let names: Vec<String> = roster.iter().map(|e| e.name.clone()).collect();
        state.roster = roster.into_iter().map(|e| (e.name.clone(), e)).collect();
        state.total = state.roster.len();
        state.index = CodeGenerator::new(&self.settings).generate_index(names.iter().map(|n| n.as_str()));

        let targets = updated.unwrap_or(components);
        for id in components.iter().filter(|id| !targets.contains(*id)) {
            if let Some(bundle) = self.cache.peek_volatile(graph, id) {
                Self::aggregate(&mut state, &bundle);
            }
        }
        state.loaded = state.roster.values().filter(|e| !e.loading).count();

        log::debug!(
            "Pass {}: {} discovered, {} targeted, skip_cache={}",
            pass,
            components.len(),
            targets.len(),
            skip_cache
        );

        let mut summary = PassSummary {
            pass,
            total: state.total,
            ..Default::default()
        };

        for id in targets {
            if self.settings.compile_yield_ms > 0 {
                thread::sleep(Duration::from_millis(self.settings.compile_yield_ms));
            }
            let is_icon = graph.node(id).map_or(true, |n| is_icon_name(&n.name));
            if is_icon {
                continue;
            }

            match self.compile_component(graph, id, skip_cache) {
                Ok(outcome) => {
                    if outcome.cached {
                        summary.cached += 1;
                    } else {
                        summary.compiled += 1;
                    }
                    let bundle = outcome.bundle;
                    Self::aggregate(&mut state, &bundle);
                    let entry = state.roster.entry(bundle.name.clone()).or_insert_with(|| RosterEntry {
                        id: bundle.id.clone(),
                        name: bundle.name.clone(),
                        page: bundle.page.clone(),
                        path: bundle.path.clone(),
                        preview: None,
                        loading: true,
                    });
                    entry.id = bundle.id.clone();
                    entry.page = bundle.page.clone();
                    entry.preview = Some(bundle.preview.clone());
                    entry.loading = false;
                    state.loaded = state.roster.values().filter(|e| !e.loading).count();

                    sink.emit(BuildEvent::ComponentBuild {
                        pass,
                        state: Box::new(state.clone()),
                        bundle,
                    });
                }
                Err(e) => {
                    let name = graph.node(id).map(|n| n.name.clone()).unwrap_or_default();
                    log::error!("Failed to compile '{}' ({}): {}", name, id, e);
                    summary.failed += 1;
                    // The roster keeps the last-known bundle, so the aggregates must too.
                    if let Some(previous) = self.cache.peek_volatile(graph, id) {
                        Self::aggregate(&mut state, &previous);
                    }
                }
            }
        }

        log::info!(
            "Pass {} done: {} compiled, {} cached, {} failed of {} components",
            pass,
            summary.compiled,
            summary.cached,
            summary.failed,
            summary.total
        );
        summary
    }

    /// Initial load: a cached pass, then a full refresh when anything came from cache.
    pub fn load_components(&mut self, graph: &mut dyn SceneGraph, sink: &mut dyn EventSink) -> Vec<PassSummary> {
        let components = self.discover(graph);
        if components.is_empty() {
            log::info!("No components found");
            return Vec::new();
        }
        let first = self.compile(graph, &components, false, None, sink);
        let mut summaries = vec![first];
        if first.cached > 0 {
            summaries.push(self.compile(graph, &components, true, None, sink));
        }
        summaries
    }

    /// Compile targets touched by a batch of change records.
    pub fn updated_targets(&self, graph: &dyn SceneGraph, changes: &[DocumentChange]) -> IndexSet<NodeId> {
        let mut targets = IndexSet::new();
        for change in changes {
            match change.kind {
                ChangeKind::Create => {}
                ChangeKind::PropertyChange => {
                    if change.properties.iter().any(|p| p == PLUGIN_DATA_PROPERTY) {
                        continue;
                    }
                }
                _ => continue,
            }
            // TODO: reconcile deletions into the roster once removed nodes carry their last owner
            if change.removed || graph.node(&change.node).is_none() {
                continue;
            }
            match owning_target(graph, &change.node) {
                Some(target) => {
                    targets.insert(target);
                }
                None => log::trace!("Change on {} has no owning component", change.node),
            }
        }
        targets
    }

    /// Single dispatch entry point for document-change notifications.
    pub fn handle_document_change(
        &mut self,
        graph: &mut dyn SceneGraph,
        changes: &[DocumentChange],
        sink: &mut dyn EventSink,
    ) -> Option<PassSummary> {
        let components = self.discover(graph);
        if components.is_empty() {
            return None;
        }
        let updated = self.updated_targets(graph, changes);
        if updated.is_empty() {
            log::trace!("{} change records, nothing to recompile", changes.len());
            return None;
        }
        log::debug!("Recompiling {:?}", updated);
        Some(self.compile(graph, &components, true, Some(&updated), sink))
    }

    /// Regenerate the theme module and emit it.
    pub fn refresh_theme(&self, graph: &dyn SceneGraph, sink: &mut dyn EventSink) -> ThemeOutput {
        let output = generate_theme(graph, &self.settings);
        sink.emit(BuildEvent::ThemeUpdate {
            code: output.code.clone(),
            current_theme_name: output
                .current
                .as_deref()
                .map(|name| format!("{}Theme", to_camel_identifier(name))),
        });
        output
    }

    /// Replace the icons page. Requires a theme with at least one color.
    pub fn import_icons(
        &mut self,
        graph: &mut dyn SceneGraph,
        set: &str,
        icons: &IndexMap<String, String>,
        sink: &mut dyn EventSink,
    ) -> Result<usize> {
        let theme = generate_theme(graph, &self.settings);
        if !theme.has_styles {
            let message = "Generate a theme before importing icons";
            sink.emit(BuildEvent::notify(message));
            return Err(CompilerError::precondition(message));
        }
        let count = graph.import_icons(set, icons)?;
        log::info!("Imported {} icons into set '{}'", count, set);
        Ok(count)
    }
}
