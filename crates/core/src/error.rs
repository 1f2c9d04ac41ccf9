//! Error types for the graph store

use std::path::PathBuf;

use thiserror::Error;

/// Failures reported by [`GraphStore`](crate::GraphStore) operations.
///
/// Endpoint fields are named `from`/`to` because `source` is reserved for
/// the underlying error chain.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("node '{name}' does not exist")]
    NodeNotFound { name: String },

    #[error("relationship '{from}' -> '{to}' does not exist")]
    RelationshipNotFound { from: String, to: String },

    #[error("cannot link '{from}' -> '{to}': node '{missing}' does not exist")]
    MissingEndpoint {
        from: String,
        to: String,
        missing: String,
    },

    /// The in-memory change has been applied; only the flush failed.
    #[error("failed to write {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn node_not_found(name: &str) -> Self {
        Self::NodeNotFound {
            name: name.to_string(),
        }
    }

    pub(crate) fn relationship_not_found(from: &str, to: &str) -> Self {
        Self::RelationshipNotFound {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// True for the not-found family (missing node or relationship)
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NodeNotFound { .. } | Self::RelationshipNotFound { .. }
        )
    }
}

/// Failures raised by the plugin registry
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("plugin name must not be empty")]
    EmptyName,

    #[error("plugin '{0}' is already registered")]
    Duplicate(String),

    #[error("plugin '{0}' is not registered")]
    NotFound(String),

    #[error("plugin '{0}' is disabled")]
    Disabled(String),

    #[error("plugin '{name}' failed")]
    Failed {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
