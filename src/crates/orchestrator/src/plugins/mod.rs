//! Domain plugins.
//!
//! A plugin specializes the engine for one document family: parser config,
//! review checklist, and skill preferences. Plugins are registered at
//! startup; registration is idempotent, clearing is for tests.

pub mod construction;

use parser::ParserConfig;
use parking_lot::RwLock;
use review_core::ChecklistItem;
use std::collections::BTreeMap;
use std::sync::Arc;

pub use construction::register_construction_plugin;

/// Immutable bundle describing one document family.
#[derive(Debug, Clone)]
pub struct DomainPlugin {
    pub domain_id: String,
    pub name: String,
    pub supported_subtypes: Vec<String>,
    pub parser_config: ParserConfig,
    pub checklist: Vec<ChecklistItem>,
    /// Skills this domain prefers beyond each item's own lists.
    pub preferred_skills: Vec<String>,
}

/// Registry of domain plugins, keyed by id.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: RwLock<BTreeMap<String, Arc<DomainPlugin>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a plugin. Registering the same plugin twice is a
    /// no-op in effect.
    pub fn register(&self, plugin: DomainPlugin) {
        self.plugins
            .write()
            .insert(plugin.domain_id.clone(), Arc::new(plugin));
    }

    pub fn get(&self, domain_id: &str) -> Option<Arc<DomainPlugin>> {
        self.plugins.read().get(domain_id).cloned()
    }

    pub fn domain_ids(&self) -> Vec<String> {
        self.plugins.read().keys().cloned().collect()
    }

    pub fn list(&self) -> Vec<Arc<DomainPlugin>> {
        self.plugins.read().values().cloned().collect()
    }

    /// Checklist for a domain; unknown domains review nothing.
    pub fn checklist(&self, domain_id: &str) -> Vec<ChecklistItem> {
        self.get(domain_id)
            .map(|p| p.checklist.clone())
            .unwrap_or_default()
    }

    /// Parser config for a domain, falling back to the generic one.
    pub fn parser_config(&self, domain_id: &str) -> ParserConfig {
        self.get(domain_id)
            .map(|p| p.parser_config.clone())
            .unwrap_or_default()
    }

    /// Destructive, intended for tests.
    pub fn clear(&self) {
        self.plugins.write().clear();
    }
}
