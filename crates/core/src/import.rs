//! Bulk import of graph documents into a store
//!
//! Import goes through the store's public operations record by record, so
//! every node and relationship lands exactly as if a user had entered it:
//! nodes are upserted, relationships whose endpoints are missing are skipped
//! and reported rather than failing the whole file.
//!
//! # Example
//!
//! ```no_run
//! use tcmkg_core::{import, GraphStore};
//!
//! # fn main() -> Result<(), anyhow::Error> {
//! let mut store = GraphStore::open("graph_data.json");
//! let report = import::import_directory(&mut store, std::path::Path::new("data/"))?;
//! println!("{} nodes, {} relationships from {} files",
//!     report.nodes, report.relationships, report.files);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};

use crate::discovery;
use crate::document::GraphDocument;
use crate::error::StoreError;
use crate::store::GraphStore;

/// What an import run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Files successfully read
    pub files: usize,
    pub nodes: usize,
    pub relationships: usize,
    pub resources: usize,
    /// Relationships left out, as `source -> target`
    pub skipped_relationships: Vec<String>,
    /// Files that could not be read or parsed, with the reason
    pub failed_files: Vec<(PathBuf, String)>,
}

impl ImportReport {
    fn merge(&mut self, other: ImportReport) {
        self.files += other.files;
        self.nodes += other.nodes;
        self.relationships += other.relationships;
        self.resources += other.resources;
        self.skipped_relationships.extend(other.skipped_relationships);
        self.failed_files.extend(other.failed_files);
    }
}

/// Feed an already-parsed document into the store
///
/// Resources are appended only when the node or relationship does not
/// already carry an identical descriptor, so re-importing a file is stable.
pub fn import_document(store: &mut GraphStore, doc: &GraphDocument) -> Result<ImportReport, StoreError> {
    let mut report = ImportReport::default();

    for node in &doc.nodes {
        store.add_or_update_node(&node.name, &node.node_type, node.attributes.clone())?;
        report.nodes += 1;
        for resource in &node.resources {
            let present = store
                .get_node(&node.name)
                .is_some_and(|n| n.resources.contains(resource));
            if !present {
                store.attach_node_resource(&node.name, resource.clone())?;
                report.resources += 1;
            }
        }
    }

    for edge in &doc.edges {
        match store.add_relationship(&edge.source, &edge.target, &edge.relation_type) {
            Ok(()) => report.relationships += 1,
            Err(StoreError::MissingEndpoint { missing, .. }) => {
                warn!(
                    source = %edge.source,
                    target = %edge.target,
                    missing = %missing,
                    "skipping relationship: endpoint not found"
                );
                report
                    .skipped_relationships
                    .push(format!("{} -> {}", edge.source, edge.target));
                continue;
            }
            Err(err) => return Err(err),
        }
        for resource in &edge.resources {
            let present = store
                .get_relationship(&edge.source, &edge.target)
                .is_some_and(|e| e.resources.contains(resource));
            if !present {
                store.attach_relationship_resource(&edge.source, &edge.target, resource.clone())?;
                report.resources += 1;
            }
        }
    }

    Ok(report)
}

/// Import one JSON graph document, writing the store file once at the end
pub fn import_file(store: &mut GraphStore, path: &Path) -> anyhow::Result<ImportReport> {
    let doc = read_document(path)?;
    let mut report = store.deferred(|store| import_document(store, &doc))??;
    report.files = 1;
    info!(
        path = %path.display(),
        nodes = report.nodes,
        relationships = report.relationships,
        skipped = report.skipped_relationships.len(),
        "file imported"
    );
    Ok(report)
}

/// Import every JSON graph document found under `root`
///
/// Files are processed in sorted path order. Files that cannot be read or
/// parsed are recorded in the report and skipped.
pub fn import_directory(store: &mut GraphStore, root: &Path) -> anyhow::Result<ImportReport> {
    let files = discovery::discover_graph_files(root);
    // never import the store's own file into itself
    let own = store.path().canonicalize().ok();
    let files: Vec<PathBuf> = files
        .into_iter()
        .filter(|f| own.as_deref() != Some(f.as_path()))
        .collect();

    let report = store.deferred(|store| -> Result<ImportReport, StoreError> {
        let mut report = ImportReport::default();
        for file in &files {
            let doc = match read_document(file) {
                Ok(doc) => doc,
                Err(err) => {
                    warn!(path = %file.display(), error = %format!("{err:#}"), "skipping file");
                    report.failed_files.push((file.clone(), format!("{err:#}")));
                    continue;
                }
            };
            let mut file_report = import_document(store, &doc)?;
            file_report.files = 1;
            report.merge(file_report);
        }
        Ok(report)
    })??;

    info!(
        root = %root.display(),
        files = report.files,
        failed = report.failed_files.len(),
        nodes = report.nodes,
        relationships = report.relationships,
        "directory imported"
    );
    Ok(report)
}

fn read_document(path: &Path) -> anyhow::Result<GraphDocument> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    GraphDocument::from_json(&text).with_context(|| format!("parsing {}", path.display()))
}
