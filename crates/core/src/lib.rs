//! TCM Knowledge Graph Core Library
//!
//! This library provides the versioned graph store behind the knowledge-graph
//! editor: a directed graph of named nodes and typed relationships, persisted
//! to a JSON file after every change, with bounded undo/redo.

pub mod config;
pub mod discovery;
pub mod document;
pub mod error;
pub mod graph;
pub mod history;
pub mod import;
pub mod plugin;
pub mod queries;
pub mod standardize;
pub mod store;

// Re-export commonly used types
pub use config::{FlushPolicy, StoreConfig};
pub use document::{EdgeRecord, GraphDocument, NodeRecord};
pub use error::{PluginError, StoreError};
pub use graph::{Attributes, Graph, Resource};
pub use plugin::{Plugin, PluginRegistry};
pub use queries::{Degree, GraphStats, Neighbors};
pub use standardize::{NameStandardizer, TermTableStandardizer, TrimStandardizer};
pub use store::{BatchReport, GraphStore, RelationshipPatch};
