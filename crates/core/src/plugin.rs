//! Plugin capability interface and registry
//!
//! Plugins are ordinary Rust types implementing [`Plugin`]. They are
//! validated when registered rather than probed when run: an empty or
//! duplicate name is rejected up front.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::PluginError;
use crate::queries;
use crate::standardize::TrimStandardizer;
use crate::store::GraphStore;

/// An extension that operates on the store
pub trait Plugin {
    /// Unique registry key
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Execute against the store, returning a human-readable report
    fn run(&mut self, store: &mut GraphStore) -> anyhow::Result<String>;
}

/// Listing entry for a registered plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub description: String,
    pub enabled: bool,
}

struct Registered {
    plugin: Box<dyn Plugin>,
    enabled: bool,
}

/// Plugins in registration order
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<Registered>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in plugins
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for plugin in builtin_plugins() {
            // built-in names are distinct and non-empty
            if let Err(err) = registry.register(plugin) {
                warn!(error = %err, "built-in plugin rejected");
            }
        }
        registry
    }

    /// Add a plugin, enabled
    pub fn register(&mut self, plugin: Box<dyn Plugin>) -> Result<(), PluginError> {
        let name = plugin.name().trim();
        if name.is_empty() {
            return Err(PluginError::EmptyName);
        }
        if self.position(name).is_some() {
            return Err(PluginError::Duplicate(name.to_string()));
        }
        info!(plugin = name, "plugin registered");
        self.plugins.push(Registered {
            plugin,
            enabled: true,
        });
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.plugins.iter().position(|p| p.plugin.name().trim() == name)
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> Result<(), PluginError> {
        let pos = self
            .position(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;
        self.plugins[pos].enabled = enabled;
        info!(plugin = name, enabled, "plugin state changed");
        Ok(())
    }

    pub fn list(&self) -> Vec<PluginInfo> {
        self.plugins
            .iter()
            .map(|p| PluginInfo {
                name: p.plugin.name().to_string(),
                description: p.plugin.description().to_string(),
                enabled: p.enabled,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    pub fn run(&mut self, name: &str, store: &mut GraphStore) -> Result<String, PluginError> {
        let pos = self
            .position(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;
        let entry = &mut self.plugins[pos];
        if !entry.enabled {
            return Err(PluginError::Disabled(name.to_string()));
        }
        info!(plugin = name, "running plugin");
        entry.plugin.run(store).map_err(|err| PluginError::Failed {
            name: name.to_string(),
            source: err.into(),
        })
    }
}

pub fn builtin_plugins() -> Vec<Box<dyn Plugin>> {
    vec![Box::new(GraphSummary::default()), Box::new(StandardizeNames)]
}

/// Reports size, connectivity, and the best-connected nodes
#[derive(Debug, Clone)]
pub struct GraphSummary {
    pub top: usize,
}

impl Default for GraphSummary {
    fn default() -> Self {
        Self { top: 5 }
    }
}

impl Plugin for GraphSummary {
    fn name(&self) -> &str {
        "graph-summary"
    }

    fn description(&self) -> &str {
        "node/relationship counts, components, and highest-degree nodes"
    }

    fn run(&mut self, store: &mut GraphStore) -> anyhow::Result<String> {
        let stats = store.stats();
        let mut out = format!(
            "{} nodes, {} relationships, {} components ({} isolated)",
            stats.nodes, stats.edges, stats.components, stats.isolated
        );
        for (name, degree) in queries::top_by_degree(store.graph(), self.top) {
            out.push_str(&format!(
                "\n  {name}: {} (in {}, out {})",
                degree.total, degree.in_degree, degree.out_degree
            ));
        }
        Ok(out)
    }
}

/// Trims stray whitespace from every node name
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardizeNames;

impl Plugin for StandardizeNames {
    fn name(&self) -> &str {
        "standardize-names"
    }

    fn description(&self) -> &str {
        "trim whitespace around node names (undoable)"
    }

    fn run(&mut self, store: &mut GraphStore) -> anyhow::Result<String> {
        let renamed = store.auto_standardize(&TrimStandardizer)?;
        Ok(format!("{} node(s) renamed", renamed.len()))
    }
}
