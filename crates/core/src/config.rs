//! Store configuration
//!
//! Every field has a default, so a config file only needs the keys it
//! wants to change:
//!
//! ```json
//! { "path": "data/tcm_graph.json", "history_capacity": 100, "flush": "manual" }
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::history::DEFAULT_HISTORY_CAPACITY;

/// Default graph file, relative to the working directory
pub const DEFAULT_GRAPH_PATH: &str = "graph_data.json";

/// When mutations reach the disk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlushPolicy {
    /// Rewrite the file after every successful mutation
    #[default]
    EveryMutation,
    /// Only mark the store dirty; `save`/`close` write it out
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Location of the JSON graph file
    pub path: PathBuf,
    /// Depth of the undo and redo stacks
    pub history_capacity: usize,
    pub flush: FlushPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_GRAPH_PATH),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            flush: FlushPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Defaults, pointed at `path`
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Read a JSON config file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_flush(mut self, flush: FlushPolicy) -> Self {
        self.flush = flush;
        self
    }
}
