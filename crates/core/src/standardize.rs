//! Node name standardization
//!
//! The store never owns a standardizer; callers hand one to
//! [`GraphStore::auto_standardize`](crate::GraphStore::auto_standardize).

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;

/// Maps a raw node name to its canonical spelling
pub trait NameStandardizer {
    /// Returning an empty string means "no opinion"; the name is kept.
    fn standardize(&self, name: &str) -> String;
}

/// Strips surrounding whitespace
#[derive(Debug, Clone, Copy, Default)]
pub struct TrimStandardizer;

impl NameStandardizer for TrimStandardizer {
    fn standardize(&self, name: &str) -> String {
        name.trim().to_string()
    }
}

/// Exact alias table with trimming as the fallback
///
/// Aliases are matched after trimming, so `" 桂枝尖 "` hits the `"桂枝尖"` entry.
#[derive(Debug, Clone, Default)]
pub struct TermTableStandardizer {
    aliases: HashMap<String, String>,
}

impl TermTableStandardizer {
    pub fn new(aliases: HashMap<String, String>) -> Self {
        Self { aliases }
    }

    /// Load a JSON object of `{"alias": "canonical", ...}`
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading term table {}", path.display()))?;
        let aliases: HashMap<String, String> = serde_json::from_str(&text)
            .with_context(|| format!("parsing term table {}", path.display()))?;
        Ok(Self::new(aliases))
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

impl NameStandardizer for TermTableStandardizer {
    fn standardize(&self, name: &str) -> String {
        let trimmed = name.trim();
        self.aliases
            .get(trimmed)
            .cloned()
            .unwrap_or_else(|| trimmed.to_string())
    }
}
