//! Two-tier compile cache
//!
//! Lookups go volatile tier first, then the durable tier stored in per-node
//! plugin data. Every recompute writes through to both. A durable payload that
//! fails to decode counts as a miss.

use crate::error::{CompilerError, Result};
use crate::scene::SceneGraph;
use crate::types::{ComponentBundle, NodeId};
use crate::CacheSettings;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// One storage backend keyed by component id.
pub trait CacheTier {
    fn label(&self) -> &'static str;

    fn read(&self, graph: &dyn SceneGraph, id: &str) -> Result<Option<Rc<ComponentBundle>>>;

    /// Overwrite the entry for `id`. Entries are never merged.
    fn write(&mut self, graph: &mut dyn SceneGraph, id: &str, bundle: &Rc<ComponentBundle>) -> Result<()>;

    fn contains(&self, graph: &dyn SceneGraph, id: &str) -> bool;

    /// Drop entries whose id fails `keep`.
    fn retain(&mut self, keep: &dyn Fn(&str) -> bool);
}

/// In-process table living as long as the session.
#[derive(Debug, Default)]
pub struct MemoryTier {
    entries: HashMap<NodeId, Rc<ComponentBundle>>,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheTier for MemoryTier {
    fn label(&self) -> &'static str {
        "memory"
    }

    fn read(&self, _graph: &dyn SceneGraph, id: &str) -> Result<Option<Rc<ComponentBundle>>> {
        Ok(self.entries.get(id).cloned())
    }

    fn write(&mut self, _graph: &mut dyn SceneGraph, id: &str, bundle: &Rc<ComponentBundle>) -> Result<()> {
        self.entries.insert(id.to_string(), Rc::clone(bundle));
        Ok(())
    }

    fn contains(&self, _graph: &dyn SceneGraph, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    fn retain(&mut self, keep: &dyn Fn(&str) -> bool) {
        self.entries.retain(|id, _| keep(id));
    }
}

/// JSON payload attached to the component node itself, saved with the document.
#[derive(Debug, Clone)]
pub struct NodeDataTier {
    namespace: String,
    key: String,
}

impl NodeDataTier {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }
}

impl CacheTier for NodeDataTier {
    fn label(&self) -> &'static str {
        "node-data"
    }

    fn read(&self, graph: &dyn SceneGraph, id: &str) -> Result<Option<Rc<ComponentBundle>>> {
        let Some(payload) = graph.plugin_data(id, &self.namespace, &self.key) else {
            return Ok(None);
        };
        if payload.is_empty() {
            return Ok(None);
        }
        let bundle: ComponentBundle = serde_json::from_str(&payload).map_err(|source| CompilerError::CacheDecode {
            id: id.to_string(),
            source,
        })?;
        Ok(Some(Rc::new(bundle)))
    }

    fn write(&mut self, graph: &mut dyn SceneGraph, id: &str, bundle: &Rc<ComponentBundle>) -> Result<()> {
        let payload = serde_json::to_string(bundle.as_ref()).map_err(|e| CompilerError::CacheWrite {
            id: id.to_string(),
            message: e.to_string(),
        })?;
        graph
            .set_plugin_data(id, &self.namespace, &self.key, payload)
            .map_err(|e| CompilerError::CacheWrite {
                id: id.to_string(),
                message: e.to_string(),
            })
    }

    fn contains(&self, graph: &dyn SceneGraph, id: &str) -> bool {
        graph
            .plugin_data(id, &self.namespace, &self.key)
            .map_or(false, |payload| !payload.is_empty())
    }

    /// Durable entries live and die with their node.
    fn retain(&mut self, _keep: &dyn Fn(&str) -> bool) {}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub memory_hits: usize,
    pub durable_hits: usize,
    pub misses: usize,
    pub decode_failures: usize,
    pub writes: usize,
}

pub struct CompileCache {
    volatile: Box<dyn CacheTier>,
    durable: Box<dyn CacheTier>,
    stats: CacheStats,
}

impl CompileCache {
    pub fn new(settings: &CacheSettings) -> Self {
        Self::with_tiers(
            Box::new(MemoryTier::new()),
            Box::new(NodeDataTier::new(&settings.namespace, &settings.key)),
        )
    }

    pub fn with_tiers(volatile: Box<dyn CacheTier>, durable: Box<dyn CacheTier>) -> Self {
        Self {
            volatile,
            durable,
            stats: CacheStats::default(),
        }
    }

    /// Volatile tier, then durable tier. Durable hits are promoted.
    pub fn lookup(&mut self, graph: &mut dyn SceneGraph, id: &str) -> Option<Rc<ComponentBundle>> {
        match self.volatile.read(graph, id) {
            Ok(Some(bundle)) => {
                log::debug!("Cache hit ({}) for {}", self.volatile.label(), id);
                self.stats.memory_hits += 1;
                return Some(bundle);
            }
            Ok(None) => {}
            Err(e) => log::warn!("{} tier read failed for {}: {}", self.volatile.label(), id, e),
        }

        match self.durable.read(graph, id) {
            Ok(Some(bundle)) => {
                log::debug!("Cache hit ({}) for {}", self.durable.label(), id);
                self.stats.durable_hits += 1;
                if let Err(e) = self.volatile.write(graph, id, &bundle) {
                    log::warn!("Could not promote {} into {} tier: {}", id, self.volatile.label(), e);
                }
                Some(bundle)
            }
            Ok(None) => {
                log::debug!("Cache miss for {}", id);
                self.stats.misses += 1;
                None
            }
            Err(e) => {
                if e.is_cache_miss() {
                    self.stats.decode_failures += 1;
                }
                log::warn!("Treating {} as a cache miss: {}", id, e);
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Write through both tiers. The volatile write always lands first.
    pub fn store(&mut self, graph: &mut dyn SceneGraph, id: &str, bundle: &Rc<ComponentBundle>) -> Result<()> {
        self.volatile.write(graph, id, bundle)?;
        self.stats.writes += 1;
        self.durable.write(graph, id, bundle)
    }

    pub fn peek_volatile(&self, graph: &dyn SceneGraph, id: &str) -> Option<Rc<ComponentBundle>> {
        self.volatile.read(graph, id).ok().flatten()
    }

    pub fn read_durable(&self, graph: &dyn SceneGraph, id: &str) -> Result<Option<Rc<ComponentBundle>>> {
        self.durable.read(graph, id)
    }

    pub fn has_volatile(&self, graph: &dyn SceneGraph, id: &str) -> bool {
        self.volatile.contains(graph, id)
    }

    pub fn has_durable(&self, graph: &dyn SceneGraph, id: &str) -> bool {
        self.durable.contains(graph, id)
    }

    /// Keep only entries for the currently discovered ids.
    pub fn prune(&mut self, discovered: &HashSet<NodeId>) {
        self.volatile.retain(&|id| discovered.contains(id));
        self.durable.retain(&|id| discovered.contains(id));
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Document, DocumentBuilder};
    use crate::types::BundleIcons;
    use indexmap::IndexMap;

    fn bundle(id: &str, code: &str) -> Rc<ComponentBundle> {
        Rc::new(ComponentBundle {
            id: id.to_string(),
            name: "Button".to_string(),
            page: "Components".to_string(),
            path: "components/components/base/button".to_string(),
            code: code.to_string(),
            theme: String::new(),
            preview: "<Button/>".to_string(),
            links: IndexMap::new(),
            icons: BundleIcons::default(),
            assets: IndexMap::new(),
        })
    }

    fn doc() -> (Document, NodeId) {
        let mut b = DocumentBuilder::new("Cache");
        let page = b.page("Components");
        let button = b.component(&page, "Button");
        (b.build(), button)
    }

    #[test]
    fn test_write_through_both_tiers() {
        let (mut doc, id) = doc();
        let mut cache = CompileCache::new(&CacheSettings::default());
        let stored = bundle(&id, "export function Button() {}");
        cache.store(&mut doc, &id, &stored).unwrap();

        let volatile = cache.peek_volatile(&doc, &id).unwrap();
        let durable = cache.read_durable(&doc, &id).unwrap().unwrap();
        assert!(Rc::ptr_eq(&volatile, &stored));
        assert_eq!(*durable, *stored);
        assert!(cache.has_durable(&doc, &id));
    }

    #[test]
    fn test_durable_hit_is_promoted() {
        let (mut doc, id) = doc();
        let mut writer = CompileCache::new(&CacheSettings::default());
        writer.store(&mut doc, &id, &bundle(&id, "code")).unwrap();

        let mut fresh = CompileCache::new(&CacheSettings::default());
        assert!(!fresh.has_volatile(&doc, &id));
        let hit = fresh.lookup(&mut doc, &id).unwrap();
        assert_eq!(hit.code, "code");
        assert_eq!(fresh.stats().durable_hits, 1);
        assert!(fresh.has_volatile(&doc, &id));

        fresh.lookup(&mut doc, &id).unwrap();
        assert_eq!(fresh.stats().memory_hits, 1);
    }

    #[test]
    fn test_corrupt_payload_is_a_miss() {
        let (mut doc, id) = doc();
        let settings = CacheSettings::default();
        doc.set_plugin_data(&id, &settings.namespace, &settings.key, "{broken".to_string())
            .unwrap();

        let mut cache = CompileCache::new(&settings);
        assert!(cache.lookup(&mut doc, &id).is_none());
        let stats = cache.stats();
        assert_eq!(stats.decode_failures, 1);
        assert_eq!(stats.misses, 1);

        let tier = NodeDataTier::new(&settings.namespace, &settings.key);
        assert!(tier.read(&doc, &id).unwrap_err().is_cache_miss());
    }

    #[test]
    fn test_prune_volatile() {
        let (mut doc, id) = doc();
        let mut cache = CompileCache::new(&CacheSettings::default());
        cache.store(&mut doc, &id, &bundle(&id, "code")).unwrap();
        cache.prune(&HashSet::new());
        assert!(!cache.has_volatile(&doc, &id));
        assert!(cache.has_durable(&doc, &id));
    }

    #[test]
    fn test_durable_write_failure() {
        let (mut doc, _) = doc();
        let mut cache = CompileCache::new(&CacheSettings::default());
        let err = cache.store(&mut doc, "9:9", &bundle("9:9", "code")).unwrap_err();
        assert!(matches!(err, CompilerError::CacheWrite { .. }));
        assert!(cache.peek_volatile(&doc, "9:9").is_some());
    }
}
