//! The versioned graph store
//!
//! Every mutation follows the same protocol:
//!
//! 1. validate (not-found / missing endpoint errors leave everything untouched)
//! 2. capture a snapshot of the current graph and push it on the undo stack,
//!    dropping any redo history
//! 3. mutate the in-memory graph
//! 4. flush the whole graph to the JSON file (unless flushing is deferred)
//!
//! A failed flush is reported to the caller, but the mutation from step 3
//! stays applied.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{FlushPolicy, StoreConfig};
use crate::document::{self, EdgeRecord, GraphDocument, NodeRecord};
use crate::error::StoreError;
use crate::graph::{Attributes, Graph, Resource};
use crate::history::{History, Snapshot};
use crate::queries::{self, Degree, GraphStats, Neighbors};
use crate::standardize::NameStandardizer;

/// Partial update applied to one relationship by
/// [`GraphStore::batch_edit_relationships`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipPatch {
    pub relation_type: Option<String>,
    pub resources: Option<Vec<Resource>>,
}

impl RelationshipPatch {
    pub fn relation_type(relation_type: impl Into<String>) -> Self {
        Self {
            relation_type: Some(relation_type.into()),
            resources: None,
        }
    }
}

/// Outcome of a batch edit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub applied: usize,
    /// Ordered pairs that had no relationship and were left alone
    pub skipped: Vec<(String, String)>,
}

/// Directed knowledge graph persisted to a JSON file, with undo/redo
#[derive(Debug)]
pub struct GraphStore {
    graph: Graph,
    history: History,
    path: PathBuf,
    flush: FlushPolicy,
    /// Bumped on every snapshot capture
    version: u64,
    dirty: bool,
}

impl GraphStore {
    /// Open the graph file at `path` with default settings.
    ///
    /// A missing or malformed file yields an empty store; see [`document::load`].
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::open_with(StoreConfig::for_path(path))
    }

    pub fn open_with(config: StoreConfig) -> Self {
        let graph = document::load(&config.path);
        info!(
            path = %config.path.display(),
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "store opened"
        );
        Self {
            graph,
            history: History::new(config.history_capacity),
            path: config.path,
            flush: config.flush,
            version: 0,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current value of the snapshot counter
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Read-only view of the live graph
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// True when the in-memory graph has changes the file does not have
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn flush_policy(&self) -> FlushPolicy {
        self.flush
    }

    pub fn set_flush_policy(&mut self, flush: FlushPolicy) {
        self.flush = flush;
    }

    /// Write the whole graph to the store's file
    pub fn save(&mut self) -> Result<(), StoreError> {
        document::save(&self.path, &self.graph.to_document())?;
        self.dirty = false;
        Ok(())
    }

    /// Final save for orderly shutdown
    pub fn close(mut self) -> Result<(), StoreError> {
        self.save()?;
        info!(path = %self.path.display(), "store closed");
        Ok(())
    }

    /// Run `f` with flushing deferred, then write the file once if anything
    /// changed. The previous flush policy is restored afterwards.
    pub fn deferred<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> Result<T, StoreError> {
        let previous = self.flush;
        self.flush = FlushPolicy::Manual;
        let out = f(self);
        self.flush = previous;
        if previous == FlushPolicy::EveryMutation && self.dirty {
            self.save()?;
        }
        Ok(out)
    }

    fn capture(&mut self) -> Snapshot {
        self.version += 1;
        Snapshot::capture(&self.graph, self.version)
    }

    /// Push the pre-mutation graph onto the undo stack
    fn checkpoint(&mut self) {
        let snapshot = self.capture();
        self.history.record(snapshot);
    }

    /// Mark dirty and flush according to the policy
    fn commit(&mut self) -> Result<(), StoreError> {
        self.dirty = true;
        match self.flush {
            FlushPolicy::EveryMutation => self.save(),
            FlushPolicy::Manual => Ok(()),
        }
    }

    fn require_node(&self, name: &str) -> Result<(), StoreError> {
        if self.graph.contains_node(name) {
            Ok(())
        } else {
            Err(StoreError::node_not_found(name))
        }
    }

    fn require_relationship(&self, source: &str, target: &str) -> Result<(), StoreError> {
        if self.graph.contains_edge(source, target) {
            Ok(())
        } else {
            Err(StoreError::relationship_not_found(source, target))
        }
    }

    /// Insert a node, or overwrite type and attributes of an existing one
    /// (its resources are kept).
    pub fn add_or_update_node(
        &mut self,
        name: &str,
        node_type: &str,
        attributes: Attributes,
    ) -> Result<(), StoreError> {
        let existed = self.graph.contains_node(name);
        self.checkpoint();
        self.graph.upsert_node(name, node_type, attributes);
        if existed {
            info!(node = name, node_type, "node updated");
        } else {
            info!(node = name, node_type, "node added");
        }
        self.commit()
    }

    /// Remove a node together with every relationship touching it
    pub fn delete_node(&mut self, name: &str) -> Result<(), StoreError> {
        self.require_node(name)?;
        self.checkpoint();
        if let Some((_, incident)) = self.graph.remove_node(name) {
            info!(node = name, relationships = incident, "node deleted");
        }
        self.commit()
    }

    /// Overwrite type and attributes of an existing node
    pub fn edit_node(
        &mut self,
        name: &str,
        new_type: &str,
        new_attributes: Attributes,
    ) -> Result<(), StoreError> {
        self.require_node(name)?;
        self.checkpoint();
        self.graph.upsert_node(name, new_type, new_attributes);
        info!(node = name, node_type = new_type, "node edited");
        self.commit()
    }

    /// Give a node a new name, carrying its data and relationships along.
    ///
    /// Renaming onto an existing name merges the two nodes.
    pub fn rename_node(&mut self, old_name: &str, new_name: &str) -> Result<(), StoreError> {
        self.require_node(old_name)?;
        if old_name == new_name {
            return Ok(());
        }
        self.checkpoint();
        let merged = self.graph.contains_node(new_name);
        self.graph.rename_node(old_name, new_name);
        info!(from = old_name, to = new_name, merged, "node renamed");
        self.commit()
    }

    /// Append an attachment descriptor to a node
    pub fn attach_node_resource(&mut self, name: &str, resource: Resource) -> Result<(), StoreError> {
        self.require_node(name)?;
        self.checkpoint();
        if let Some(node) = self.graph.node_mut(name) {
            info!(node = name, path = %resource.path, kind = %resource.kind, "resource attached");
            node.resources.push(resource);
        }
        self.commit()
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.graph.contains_node(name)
    }

    pub fn get_node(&self, name: &str) -> Option<NodeRecord> {
        self.graph.node(name).map(|n| NodeRecord {
            name: n.name.clone(),
            node_type: n.node_type.clone(),
            attributes: n.attributes.clone(),
            resources: n.resources.clone(),
        })
    }

    /// Copy of every node. Order carries no meaning.
    pub fn get_all_nodes(&self) -> Vec<NodeRecord> {
        self.graph.node_records()
    }

    /// Create the relationship `source -> target`, or overwrite the relation
    /// type if the pair is already linked. Both nodes must exist.
    pub fn add_relationship(
        &mut self,
        source: &str,
        target: &str,
        relation_type: &str,
    ) -> Result<(), StoreError> {
        for endpoint in [source, target] {
            if !self.graph.contains_node(endpoint) {
                warn!(source, target, missing = endpoint, "relationship endpoint missing");
                return Err(StoreError::MissingEndpoint {
                    from: source.to_string(),
                    to: target.to_string(),
                    missing: endpoint.to_string(),
                });
            }
        }
        self.checkpoint();
        self.graph.set_edge(source, target, relation_type);
        info!(source, target, relation_type, "relationship added");
        self.commit()
    }

    pub fn delete_relationship(&mut self, source: &str, target: &str) -> Result<(), StoreError> {
        self.require_relationship(source, target)?;
        self.checkpoint();
        if let Some(edge) = self.graph.remove_edge(source, target) {
            info!(source, target, relation_type = %edge.relation_type, "relationship deleted");
        }
        self.commit()
    }

    pub fn edit_relationship(
        &mut self,
        source: &str,
        target: &str,
        new_relation_type: &str,
    ) -> Result<(), StoreError> {
        self.require_relationship(source, target)?;
        self.checkpoint();
        if let Some(edge) = self.graph.edge_mut(source, target) {
            edge.relation_type = new_relation_type.to_string();
        }
        info!(source, target, relation_type = new_relation_type, "relationship edited");
        self.commit()
    }

    /// Append an attachment descriptor to a relationship
    pub fn attach_relationship_resource(
        &mut self,
        source: &str,
        target: &str,
        resource: Resource,
    ) -> Result<(), StoreError> {
        self.require_relationship(source, target)?;
        self.checkpoint();
        if let Some(edge) = self.graph.edge_mut(source, target) {
            info!(source, target, path = %resource.path, "resource attached");
            edge.resources.push(resource);
        }
        self.commit()
    }

    /// Apply several relationship updates as a single undoable step.
    ///
    /// Updates addressing a pair with no relationship are skipped and
    /// reported; they never fail the batch.
    pub fn batch_edit_relationships(
        &mut self,
        updates: BTreeMap<(String, String), RelationshipPatch>,
    ) -> Result<BatchReport, StoreError> {
        self.checkpoint();
        let mut report = BatchReport::default();
        for ((source, target), patch) in updates {
            let Some(edge) = self.graph.edge_mut(&source, &target) else {
                warn!(source = %source, target = %target, "batch edit: relationship does not exist");
                report.skipped.push((source, target));
                continue;
            };
            if let Some(relation_type) = patch.relation_type {
                edge.relation_type = relation_type;
            }
            if let Some(resources) = patch.resources {
                edge.resources = resources;
            }
            debug!(source = %source, target = %target, "batch edit applied");
            report.applied += 1;
        }
        info!(
            applied = report.applied,
            skipped = report.skipped.len(),
            "batch relationship edit"
        );
        self.commit()?;
        Ok(report)
    }

    pub fn has_relationship(&self, source: &str, target: &str) -> bool {
        self.graph.contains_edge(source, target)
    }

    pub fn get_relationship(&self, source: &str, target: &str) -> Option<EdgeRecord> {
        self.graph.edge(source, target).map(|e| EdgeRecord {
            source: source.to_string(),
            target: target.to_string(),
            relation_type: e.relation_type.clone(),
            resources: e.resources.clone(),
        })
    }

    /// Copy of every relationship. Order carries no meaning.
    pub fn get_all_relationships(&self) -> Vec<EdgeRecord> {
        self.graph.edge_records()
    }

    /// Copy of the full graph in its persisted shape
    pub fn get_graph_data(&self) -> GraphDocument {
        self.graph.to_document()
    }

    /// Remove every node and relationship
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.checkpoint();
        self.graph.clear();
        info!("graph cleared");
        self.commit()
    }

    /// Revert the most recent mutation. Returns `Ok(false)` when there is
    /// nothing to undo.
    pub fn undo(&mut self) -> Result<bool, StoreError> {
        let Some(snapshot) = self.history.pop_undo() else {
            debug!("nothing to undo");
            return Ok(false);
        };
        let current = self.capture();
        self.history.push_redo(current);
        let restored = snapshot.version();
        self.graph = snapshot.into_graph();
        info!(restored, "undo");
        self.commit()?;
        Ok(true)
    }

    /// Re-apply the most recently undone mutation. Returns `Ok(false)` when
    /// there is nothing to redo.
    pub fn redo(&mut self) -> Result<bool, StoreError> {
        let Some(snapshot) = self.history.pop_redo() else {
            debug!("nothing to redo");
            return Ok(false);
        };
        let current = self.capture();
        self.history.push_undo(current);
        let restored = snapshot.version();
        self.graph = snapshot.into_graph();
        info!(restored, "redo");
        self.commit()?;
        Ok(true)
    }

    /// Rename every node whose standardized name differs from its current
    /// one, as a single undoable step. Returns the `(old, new)` pairs, sorted
    /// by old name.
    ///
    /// Chains (`A -> B`, `B -> C`) are followed to their end, so every node
    /// lands on a name the standardizer leaves alone. Names caught in a cycle
    /// are kept. When several nodes merge into one, they are applied in name
    /// order and the last one's data wins.
    pub fn auto_standardize(
        &mut self,
        standardizer: &impl NameStandardizer,
    ) -> Result<Vec<(String, String)>, StoreError> {
        let mut renames: Vec<(String, String)> = self
            .graph
            .nodes()
            .filter_map(|n| {
                let settled = settle_name(standardizer, &n.name);
                (settled != n.name).then(|| (n.name.clone(), settled))
            })
            .collect();
        renames.sort();
        if renames.is_empty() {
            debug!("all node names already standard");
            return Ok(renames);
        }

        self.checkpoint();
        for (old, new) in &renames {
            self.graph.rename_node(old, new);
            debug!(from = %old, to = %new, "node name standardized");
        }
        info!(renamed = renames.len(), "node names standardized");
        self.commit()?;
        Ok(renames)
    }

    pub fn node_degree(&self, name: &str) -> Option<Degree> {
        queries::node_degree(&self.graph, name)
    }

    pub fn degree_distribution(&self) -> BTreeMap<String, Degree> {
        queries::degree_distribution(&self.graph)
    }

    pub fn connected_nodes(&self, name: &str) -> Option<Neighbors> {
        queries::connected_nodes(&self.graph, name)
    }

    pub fn weakly_connected_components(&self) -> Vec<Vec<String>> {
        queries::weakly_connected_components(&self.graph)
    }

    pub fn stats(&self) -> GraphStats {
        queries::stats(&self.graph)
    }

    pub fn to_jsonld(&self) -> serde_json::Value {
        document::to_jsonld(&self.graph)
    }

    /// Write the JSON-LD projection to `path`; the store file is not touched
    pub fn export_jsonld(&self, path: &Path) -> Result<(), StoreError> {
        document::save_jsonld(path, &self.graph)?;
        info!(path = %path.display(), "JSON-LD exported");
        Ok(())
    }
}

/// Apply `standardizer` until the name stops changing
fn settle_name(standardizer: &impl NameStandardizer, name: &str) -> String {
    let mut seen = vec![name.to_string()];
    loop {
        let current = &seen[seen.len() - 1];
        let next = standardizer.standardize(current);
        if next.is_empty() || next == *current {
            return current.clone();
        }
        if seen.contains(&next) {
            warn!(node = name, "standardization cycle, name kept");
            return name.to_string();
        }
        seen.push(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::standardize::TrimStandardizer;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn attrs(value: serde_json::Value) -> Attributes {
        value.as_object().cloned().unwrap_or_default()
    }

    fn open_temp() -> (TempDir, GraphStore) {
        let dir = TempDir::new().unwrap();
        let store = GraphStore::open(dir.path().join("graph.json"));
        (dir, store)
    }

    fn herbs(store: &mut GraphStore) {
        store.add_or_update_node("麻黄", "药材", Attributes::new()).unwrap();
        store.add_or_update_node("桂枝", "药材", Attributes::new()).unwrap();
        store.add_or_update_node("麻黄汤", "方剂", Attributes::new()).unwrap();
        store.add_relationship("麻黄汤", "麻黄", "包含").unwrap();
        store.add_relationship("麻黄汤", "桂枝", "包含").unwrap();
    }

    #[test]
    fn test_every_mutation_is_flushed() {
        let (dir, mut store) = open_temp();
        store.add_or_update_node("麻黄", "药材", Attributes::new()).unwrap();

        let reopened = GraphStore::open(dir.path().join("graph.json"));
        assert!(reopened.has_node("麻黄"));
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let (_dir, mut store) = open_temp();
        let a = attrs(json!({"性味": "辛温"}));
        store.add_or_update_node("麻黄", "药材", a.clone()).unwrap();
        let once = store.get_graph_data();
        store.add_or_update_node("麻黄", "药材", a).unwrap();

        assert_eq!(store.get_graph_data(), once);
        assert_eq!(store.get_all_nodes().len(), 1);
    }

    #[test]
    fn test_update_keeps_resources() {
        let (_dir, mut store) = open_temp();
        store.add_or_update_node("麻黄", "药材", Attributes::new()).unwrap();
        store
            .attach_node_resource("麻黄", Resource::new("img/mahuang.jpg", "Image"))
            .unwrap();
        store
            .add_or_update_node("麻黄", "中药", attrs(json!({"归经": "肺、膀胱"})))
            .unwrap();

        let node = store.get_node("麻黄").unwrap();
        assert_eq!(node.node_type, "中药");
        assert_eq!(node.resources, vec![Resource::new("img/mahuang.jpg", "Image")]);
    }

    #[test]
    fn test_edit_node_requires_existing() {
        let (_dir, mut store) = open_temp();
        let err = store.edit_node("麻黄", "药材", Attributes::new()).unwrap_err();
        assert!(matches!(err, StoreError::NodeNotFound { ref name } if name == "麻黄"));
        assert!(!store.has_node("麻黄"));
        assert!(!store.history().can_undo());
    }

    #[test]
    fn test_delete_missing_node_fails_without_snapshot() {
        let (_dir, mut store) = open_temp();
        herbs(&mut store);
        let depth = store.history().undo_len();

        let err = store.delete_node("杏仁").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.history().undo_len(), depth);
    }

    #[test]
    fn test_relationship_requires_endpoints() {
        let (_dir, mut store) = open_temp();
        store.add_or_update_node("麻黄汤", "方剂", Attributes::new()).unwrap();
        let before = store.get_graph_data();
        let depth = store.history().undo_len();

        let err = store.add_relationship("麻黄汤", "麻黄", "包含").unwrap_err();
        assert!(matches!(err, StoreError::MissingEndpoint { ref missing, .. } if missing == "麻黄"));
        assert_eq!(store.get_graph_data(), before);
        assert_eq!(store.history().undo_len(), depth);
    }

    #[test]
    fn test_relationship_edit_and_delete() {
        let (_dir, mut store) = open_temp();
        herbs(&mut store);

        store.edit_relationship("麻黄汤", "麻黄", "君药").unwrap();
        assert_eq!(store.get_relationship("麻黄汤", "麻黄").unwrap().relation_type, "君药");

        store.delete_relationship("麻黄汤", "麻黄").unwrap();
        assert!(!store.has_relationship("麻黄汤", "麻黄"));
        assert!(store.has_node("麻黄"));

        assert!(store.delete_relationship("麻黄汤", "麻黄").unwrap_err().is_not_found());
        assert!(store.edit_relationship("麻黄", "麻黄汤", "x").unwrap_err().is_not_found());
    }

    #[test]
    fn test_add_relationship_overwrites_pair() {
        let (_dir, mut store) = open_temp();
        herbs(&mut store);
        store.add_relationship("麻黄汤", "麻黄", "君药").unwrap();

        let rels: Vec<_> = store
            .get_all_relationships()
            .into_iter()
            .filter(|r| r.source == "麻黄汤" && r.target == "麻黄")
            .collect();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].relation_type, "君药");
    }

    #[test]
    fn test_batch_edit_is_one_undo_step() {
        let (_dir, mut store) = open_temp();
        herbs(&mut store);
        let before = store.get_graph_data();

        let mut updates = BTreeMap::new();
        updates.insert(("麻黄汤".to_string(), "麻黄".to_string()), RelationshipPatch::relation_type("君药"));
        updates.insert(("麻黄汤".to_string(), "桂枝".to_string()), RelationshipPatch::relation_type("臣药"));
        updates.insert(("麻黄汤".to_string(), "杏仁".to_string()), RelationshipPatch::relation_type("佐药"));
        let report = store.batch_edit_relationships(updates).unwrap();

        assert_eq!(report.applied, 2);
        assert_eq!(report.skipped, vec![("麻黄汤".to_string(), "杏仁".to_string())]);
        assert_eq!(store.get_relationship("麻黄汤", "桂枝").unwrap().relation_type, "臣药");

        assert!(store.undo().unwrap());
        assert_eq!(store.get_graph_data(), before);
    }

    #[test]
    fn test_batch_edit_replaces_resources() {
        let (_dir, mut store) = open_temp();
        herbs(&mut store);
        let mut updates = BTreeMap::new();
        updates.insert(
            ("麻黄汤".to_string(), "麻黄".to_string()),
            RelationshipPatch {
                relation_type: None,
                resources: Some(vec![Resource::new("doc/jingui.pdf", "Document")]),
            },
        );
        store.batch_edit_relationships(updates).unwrap();

        let rel = store.get_relationship("麻黄汤", "麻黄").unwrap();
        assert_eq!(rel.relation_type, "包含");
        assert_eq!(rel.resources.len(), 1);
    }

    #[test]
    fn test_undo_redo_inverse() {
        let (_dir, mut store) = open_temp();
        herbs(&mut store);
        let before = store.get_graph_data();

        store.delete_node("麻黄").unwrap();
        let after = store.get_graph_data();

        assert!(store.undo().unwrap());
        assert_eq!(store.get_graph_data(), before);
        assert!(store.redo().unwrap());
        assert_eq!(store.get_graph_data(), after);
    }

    #[test]
    fn test_undo_on_empty_history() {
        let (_dir, mut store) = open_temp();
        assert!(!store.undo().unwrap());
        assert!(!store.redo().unwrap());
    }

    #[test]
    fn test_new_mutation_discards_redo() {
        let (_dir, mut store) = open_temp();
        store.add_or_update_node("a", "t", Attributes::new()).unwrap();
        store.undo().unwrap();
        store.add_or_update_node("b", "t", Attributes::new()).unwrap();

        assert!(!store.redo().unwrap());
        assert!(store.has_node("b"));
        assert!(!store.has_node("a"));
    }

    #[test]
    fn test_version_counts_captures() {
        let (_dir, mut store) = open_temp();
        assert_eq!(store.version(), 0);
        store.add_or_update_node("a", "t", Attributes::new()).unwrap();
        store.add_or_update_node("b", "t", Attributes::new()).unwrap();
        assert_eq!(store.version(), 2);
        store.undo().unwrap();
        assert_eq!(store.version(), 3);
        store.redo().unwrap();
        assert_eq!(store.version(), 4);
    }

    #[test]
    fn test_undo_is_persisted() {
        let (dir, mut store) = open_temp();
        store.add_or_update_node("a", "t", Attributes::new()).unwrap();
        store.undo().unwrap();

        let reopened = GraphStore::open(dir.path().join("graph.json"));
        assert!(!reopened.has_node("a"));
    }

    #[test]
    fn test_rename_node() {
        let (_dir, mut store) = open_temp();
        herbs(&mut store);
        store.rename_node("麻黄", "麻黄（蜜炙）").unwrap();

        assert!(!store.has_node("麻黄"));
        assert!(store.has_relationship("麻黄汤", "麻黄（蜜炙）"));

        assert!(store.undo().unwrap());
        assert!(store.has_relationship("麻黄汤", "麻黄"));
        assert!(store.rename_node("杏仁", "苦杏仁").unwrap_err().is_not_found());
    }

    #[test]
    fn test_rename_to_same_name_takes_no_snapshot() {
        let (_dir, mut store) = open_temp();
        herbs(&mut store);
        let depth = store.history().undo_len();
        store.rename_node("麻黄", "麻黄").unwrap();
        assert_eq!(store.history().undo_len(), depth);
    }

    #[test]
    fn test_auto_standardize_single_step() {
        let (_dir, mut store) = open_temp();
        store.add_or_update_node(" 麻黄", "药材", Attributes::new()).unwrap();
        store.add_or_update_node("桂枝 ", "药材", Attributes::new()).unwrap();
        store.add_or_update_node("麻黄汤", "方剂", Attributes::new()).unwrap();
        store.add_relationship("麻黄汤", " 麻黄", "包含").unwrap();
        let depth = store.history().undo_len();

        let mut renamed = store.auto_standardize(&TrimStandardizer).unwrap();
        renamed.sort();
        assert_eq!(
            renamed,
            vec![
                (" 麻黄".to_string(), "麻黄".to_string()),
                ("桂枝 ".to_string(), "桂枝".to_string()),
            ]
        );
        assert!(store.has_relationship("麻黄汤", "麻黄"));
        assert_eq!(store.history().undo_len(), depth + 1);

        // nothing left to change
        assert!(store.auto_standardize(&TrimStandardizer).unwrap().is_empty());
        assert_eq!(store.history().undo_len(), depth + 1);
    }

    #[test]
    fn test_auto_standardize_follows_chains() {
        use crate::standardize::TermTableStandardizer;
        use std::collections::HashMap;

        let (_dir, mut store) = open_temp();
        store.add_or_update_node("麻黄草", "药材", attrs(json!({"来源": "草质茎"}))).unwrap();
        store.add_or_update_node("麻黄茎", "药材", Attributes::new()).unwrap();
        store.add_or_update_node("麻黄汤", "方剂", Attributes::new()).unwrap();
        store.add_relationship("麻黄汤", "麻黄草", "包含").unwrap();
        store.add_relationship("麻黄茎", "麻黄汤", "入方").unwrap();
        let before = store.get_graph_data();

        let table = TermTableStandardizer::new(HashMap::from([
            ("麻黄草".to_string(), "麻黄茎".to_string()),
            ("麻黄茎".to_string(), "麻黄".to_string()),
        ]));
        let renamed = store.auto_standardize(&table).unwrap();

        assert_eq!(renamed.len(), 2);
        assert!(renamed.iter().all(|(_, new)| new == "麻黄"));
        assert!(renamed.windows(2).all(|w| w[0].0 < w[1].0));
        let mut names: Vec<String> = store.get_all_nodes().into_iter().map(|n| n.name).collect();
        names.sort();
        assert_eq!(names, vec!["麻黄".to_string(), "麻黄汤".to_string()]);
        assert!(store.has_relationship("麻黄汤", "麻黄"));
        assert!(store.has_relationship("麻黄", "麻黄汤"));

        // settled names are left alone on a second pass
        assert!(store.auto_standardize(&table).unwrap().is_empty());

        assert!(store.undo().unwrap());
        assert_eq!(store.get_graph_data(), before);
    }

    #[test]
    fn test_auto_standardize_keeps_cycles() {
        use crate::standardize::TermTableStandardizer;
        use std::collections::HashMap;

        let (_dir, mut store) = open_temp();
        store.add_or_update_node("桂枝", "药材", Attributes::new()).unwrap();
        store.add_or_update_node("桂枝尖", "药材", Attributes::new()).unwrap();
        let depth = store.history().undo_len();

        let table = TermTableStandardizer::new(HashMap::from([
            ("桂枝".to_string(), "桂枝尖".to_string()),
            ("桂枝尖".to_string(), "桂枝".to_string()),
        ]));
        assert!(store.auto_standardize(&table).unwrap().is_empty());
        assert_eq!(store.get_all_nodes().len(), 2);
        assert_eq!(store.history().undo_len(), depth);
    }

    #[test]
    fn test_clear_and_undo() {
        let (_dir, mut store) = open_temp();
        herbs(&mut store);
        let before = store.get_graph_data();
        store.clear().unwrap();
        assert!(store.get_all_nodes().is_empty());
        store.undo().unwrap();
        assert_eq!(store.get_graph_data(), before);
    }

    #[test]
    fn test_attach_relationship_resource() {
        let (_dir, mut store) = open_temp();
        herbs(&mut store);
        store
            .attach_relationship_resource("麻黄汤", "麻黄", Resource::new("a.png", "Image"))
            .unwrap();
        assert_eq!(store.get_relationship("麻黄汤", "麻黄").unwrap().resources.len(), 1);

        let err = store
            .attach_relationship_resource("麻黄", "麻黄汤", Resource::new("a.png", "Image"))
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(store
            .attach_node_resource("杏仁", Resource::new("a.png", "Image"))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_manual_flush_policy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("graph.json");
        let config = StoreConfig::for_path(&path).with_flush(FlushPolicy::Manual);
        let mut store = GraphStore::open_with(config);

        store.add_or_update_node("a", "t", Attributes::new()).unwrap();
        assert!(store.is_dirty());
        assert!(!path.exists());

        store.close().unwrap();
        assert!(GraphStore::open(&path).has_node("a"));
    }

    #[test]
    fn test_deferred_writes_once() {
        let (dir, mut store) = open_temp();
        let path = dir.path().join("graph.json");

        store
            .deferred(|s| {
                s.add_or_update_node("a", "t", Attributes::new()).unwrap();
                s.add_or_update_node("b", "t", Attributes::new()).unwrap();
                assert!(!path.exists());
            })
            .unwrap();

        assert!(!store.is_dirty());
        assert_eq!(store.flush_policy(), FlushPolicy::EveryMutation);
        assert_eq!(GraphStore::open(&path).get_all_nodes().len(), 2);
    }

    #[test]
    fn test_persist_failure_keeps_mutation() {
        let dir = TempDir::new().unwrap();
        // a directory where the file should be makes the final rename fail
        let path = dir.path().join("graph.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("occupant"), "x").unwrap();
        let mut store = GraphStore::open(&path);

        let err = store.add_or_update_node("a", "t", Attributes::new()).unwrap_err();
        assert!(matches!(err, StoreError::Persist { .. }));
        assert!(store.has_node("a"));
        assert!(store.is_dirty());
        assert!(store.history().can_undo());
    }

    #[test]
    fn test_dumps_are_copies() {
        let (_dir, mut store) = open_temp();
        herbs(&mut store);
        let mut nodes = store.get_all_nodes();
        nodes[0].node_type = "changed".into();
        nodes.clear();
        assert_eq!(store.get_all_nodes().len(), 3);
        assert!(store.get_all_nodes().iter().all(|n| n.node_type != "changed"));
    }

    #[test]
    fn test_export_jsonld_leaves_store_file_alone() {
        let (dir, mut store) = open_temp();
        herbs(&mut store);
        let out = dir.path().join("graph.jsonld");
        let depth = store.history().undo_len();

        store.export_jsonld(&out).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(value["@graph"].as_array().unwrap().len(), 3);
        assert_eq!(store.history().undo_len(), depth);
    }
}
