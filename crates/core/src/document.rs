//! Persisted JSON form of the graph
//!
//! The on-disk file is a single human-readable document:
//!
//! ```text
//! {
//!     "nodes": [{"name": .., "type": .., "attributes": {..}, "resources": [..]}],
//!     "edges": [{"source": .., "target": .., "relation_type": .., "resources": [..]}]
//! }
//! ```
//!
//! Writes replace the whole file through a sibling temp file, so readers
//! never observe a half-written document.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::graph::{Attributes, Graph, Resource};

/// A node as it appears in the file and in read-side dumps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// A relationship as it appears in the file and in read-side dumps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    pub relation_type: String,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// The whole graph file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

impl GraphDocument {
    /// Parse a document from JSON text
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Render as 4-space indented JSON, non-ASCII kept verbatim
    pub fn to_pretty_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        to_pretty_json(self)
    }

    /// Sort nodes by name and edges by endpoints, for order-insensitive comparison
    pub fn sorted(mut self) -> Self {
        self.nodes.sort_by(|a, b| a.name.cmp(&b.name));
        self.edges
            .sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));
        self
    }
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Load the graph stored at `path`.
///
/// A missing or unreadable file, or one that does not parse, yields an empty
/// graph. Callers are never handed a load error; the reason is logged.
pub fn load(path: &Path) -> Graph {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "graph file not found, starting empty");
            return Graph::new();
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "graph file unreadable, starting empty");
            return Graph::new();
        }
    };

    let doc = match GraphDocument::from_json(&text) {
        Ok(doc) => doc,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "graph file malformed, starting empty");
            return Graph::new();
        }
    };

    let (graph, dropped) = Graph::from_document(&doc);
    for edge in &dropped {
        warn!(
            source = %edge.source,
            target = %edge.target,
            "skipping persisted relationship with missing endpoint"
        );
    }
    debug!(
        path = %path.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "graph loaded"
    );
    graph
}

/// Write `doc` to `path`, replacing any previous content
pub fn save(path: &Path, doc: &GraphDocument) -> Result<(), StoreError> {
    let bytes = doc.to_pretty_json()?;
    write_replacing(path, &bytes).map_err(|source| StoreError::Persist {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(
        path = %path.display(),
        nodes = doc.nodes.len(),
        edges = doc.edges.len(),
        "graph saved"
    );
    Ok(())
}

fn write_replacing(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    let result = fs::File::create(&tmp).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(err) = result.and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "graph".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Project the graph into a JSON-LD document (`@context` + `@graph`).
///
/// Each node becomes an object keyed by its name; outgoing relationships are
/// listed under `relatedTo` on the source node.
pub fn to_jsonld(graph: &Graph) -> Value {
    let context = json!({
        "name": "http://schema.org/name",
        "type": "http://schema.org/additionalType",
        "attributes": "http://schema.org/additionalProperty",
        "relatedTo": {
            "@id": "http://schema.org/relatedLink",
            "@container": "@list"
        }
    });

    let nodes: Vec<Value> = graph
        .nodes()
        .map(|node| {
            let related: Vec<Value> = graph
                .outgoing(&node.name)
                .map(|(target, edge)| {
                    json!({ "@id": target, "relation_type": edge.relation_type })
                })
                .collect();

            let mut obj = json!({
                "@id": node.name,
                "name": node.name,
                "type": node.node_type,
                "attributes": node.attributes,
            });
            if !related.is_empty() {
                obj["relatedTo"] = Value::Array(related);
            }
            obj
        })
        .collect();

    json!({ "@context": context, "@graph": nodes })
}

/// Write the JSON-LD projection of `graph` to `path`
pub fn save_jsonld(path: &Path, graph: &Graph) -> Result<(), StoreError> {
    let bytes = to_pretty_json(&to_jsonld(graph))?;
    write_replacing(path, &bytes).map_err(|source| StoreError::Persist {
        path: path.to_path_buf(),
        source,
    })
}
