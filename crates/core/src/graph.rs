//! Graph data structures for the knowledge graph
//!
//! Uses `petgraph::StableGraph` so node indices remain valid while other
//! nodes are removed, and keeps a name index beside it because node names
//! are the only identity the outside world knows about.

use std::collections::HashMap;

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::document::{EdgeRecord, GraphDocument, NodeRecord};

/// Open attribute map attached to every node
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// An attachment descriptor (image, document, ...) carried by nodes and edges
///
/// The store never interprets these; viewers resolve `path` themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Resource {
    pub fn new(path: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: kind.into(),
        }
    }
}

/// Node payload. The name doubles as the primary key.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub name: String,
    /// Free-form category label (e.g. "药材", "方剂")
    pub node_type: String,
    pub attributes: Attributes,
    pub resources: Vec<Resource>,
}

/// Relationship payload
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeData {
    pub relation_type: String,
    pub resources: Vec<Resource>,
}

/// The directed knowledge graph
///
/// At most one edge exists per ordered `(source, target)` pair; setting an
/// existing pair again overwrites its relation type.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// The underlying stable graph (private to enforce encapsulation)
    inner: StableDiGraph<NodeData, EdgeData>,
    /// Name -> index cache, kept in lockstep with `inner`
    index: HashMap<String, NodeIndex>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a persisted document.
    ///
    /// Returns the graph together with the edge records that were dropped
    /// because one of their endpoints is not in the document.
    pub fn from_document(doc: &GraphDocument) -> (Self, Vec<EdgeRecord>) {
        let mut graph = Self::new();
        for node in &doc.nodes {
            let idx = graph.upsert_node(&node.name, &node.node_type, node.attributes.clone());
            graph.inner[idx].resources = node.resources.clone();
        }

        let mut dropped = Vec::new();
        for edge in &doc.edges {
            match graph.set_edge(&edge.source, &edge.target, &edge.relation_type) {
                Some(idx) => graph.inner[idx].resources = edge.resources.clone(),
                None => dropped.push(edge.clone()),
            }
        }
        (graph, dropped)
    }

    /// Dump the graph into its persisted form
    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self.node_records(),
            edges: self.edge_records(),
        }
    }

    /// Get the number of nodes in the graph
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Get the number of edges in the graph
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.node_count() == 0
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn node_index(&self, name: &str) -> Option<NodeIndex> {
        self.index.get(name).copied()
    }

    pub fn node(&self, name: &str) -> Option<&NodeData> {
        self.node_index(name).and_then(|idx| self.inner.node_weight(idx))
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut NodeData> {
        let idx = self.node_index(name)?;
        self.inner.node_weight_mut(idx)
    }

    /// Insert a node, or overwrite type and attributes of an existing one.
    ///
    /// Resources of an existing node are left untouched.
    pub fn upsert_node(&mut self, name: &str, node_type: &str, attributes: Attributes) -> NodeIndex {
        if let Some(idx) = self.node_index(name) {
            let node = &mut self.inner[idx];
            node.node_type = node_type.to_string();
            node.attributes = attributes;
            return idx;
        }

        let idx = self.inner.add_node(NodeData {
            name: name.to_string(),
            node_type: node_type.to_string(),
            attributes,
            resources: Vec::new(),
        });
        self.index.insert(name.to_string(), idx);
        idx
    }

    /// Remove a node and every edge touching it.
    ///
    /// Returns the removed payload and the number of edges that went with it.
    pub fn remove_node(&mut self, name: &str) -> Option<(NodeData, usize)> {
        let idx = self.index.remove(name)?;
        let incident = self.inner.edges_directed(idx, Direction::Incoming).count()
            + self
                .inner
                .edges_directed(idx, Direction::Outgoing)
                .filter(|e| e.target() != idx)
                .count();
        self.inner.remove_node(idx).map(|data| (data, incident))
    }

    /// Find the edge for an ordered pair
    pub fn find_edge(&self, source: &str, target: &str) -> Option<EdgeIndex> {
        let a = self.node_index(source)?;
        let b = self.node_index(target)?;
        self.inner.find_edge(a, b)
    }

    pub fn contains_edge(&self, source: &str, target: &str) -> bool {
        self.find_edge(source, target).is_some()
    }

    pub fn edge(&self, source: &str, target: &str) -> Option<&EdgeData> {
        self.find_edge(source, target)
            .and_then(|e| self.inner.edge_weight(e))
    }

    pub fn edge_mut(&mut self, source: &str, target: &str) -> Option<&mut EdgeData> {
        let e = self.find_edge(source, target)?;
        self.inner.edge_weight_mut(e)
    }

    /// Create or overwrite the edge `source -> target`.
    ///
    /// An existing edge keeps its resources. Returns `None` when either
    /// endpoint is missing; the graph is not touched in that case.
    pub fn set_edge(&mut self, source: &str, target: &str, relation_type: &str) -> Option<EdgeIndex> {
        let a = self.node_index(source)?;
        let b = self.node_index(target)?;
        if let Some(e) = self.inner.find_edge(a, b) {
            self.inner[e].relation_type = relation_type.to_string();
            return Some(e);
        }
        Some(self.inner.add_edge(
            a,
            b,
            EdgeData {
                relation_type: relation_type.to_string(),
                resources: Vec::new(),
            },
        ))
    }

    pub fn remove_edge(&mut self, source: &str, target: &str) -> Option<EdgeData> {
        let e = self.find_edge(source, target)?;
        self.inner.remove_edge(e)
    }

    /// Move a node to a new name, carrying its payload and incident edges.
    ///
    /// If `new_name` already exists the two nodes are merged: the renamed
    /// node's payload replaces the existing one and its edges overwrite any
    /// edge on the same ordered pair. Returns `false` if `old_name` is absent.
    pub fn rename_node(&mut self, old_name: &str, new_name: &str) -> bool {
        let Some(old_idx) = self.node_index(old_name) else {
            return false;
        };
        if old_name == new_name {
            return true;
        }

        // (source, target, payload) with the old name already substituted
        let substitute = |name: &str| {
            if name == old_name {
                new_name.to_string()
            } else {
                name.to_string()
            }
        };
        let mut incident = Vec::new();
        for dir in [Direction::Outgoing, Direction::Incoming] {
            for e in self.inner.edges_directed(old_idx, dir) {
                // self-loops show up in both directions
                if dir == Direction::Incoming && e.source() == e.target() {
                    continue;
                }
                let source = &self.inner[e.source()].name;
                let target = &self.inner[e.target()].name;
                incident.push((substitute(source), substitute(target), e.weight().clone()));
            }
        }

        let Some((data, _)) = self.remove_node(old_name) else {
            return false;
        };
        let idx = self.upsert_node(new_name, &data.node_type, data.attributes);
        self.inner[idx].resources = data.resources;

        for (source, target, edge) in incident {
            if let Some(e) = self.set_edge(&source, &target, &edge.relation_type) {
                self.inner[e].resources = edge.resources;
            }
        }
        true
    }

    /// Drop every node and edge
    pub fn clear(&mut self) {
        self.inner.clear();
        self.index.clear();
    }

    /// Iterate over all node weights in the graph
    pub fn nodes(&self) -> impl Iterator<Item = &NodeData> {
        self.inner.node_weights()
    }

    /// Iterate over all edges as `(source, target, payload)` triples
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str, &EdgeData)> + '_ {
        self.inner.edge_indices().filter_map(move |e| {
            let (a, b) = self.inner.edge_endpoints(e)?;
            Some((
                self.inner[a].name.as_str(),
                self.inner[b].name.as_str(),
                &self.inner[e],
            ))
        })
    }

    pub fn node_records(&self) -> Vec<NodeRecord> {
        self.nodes()
            .map(|n| NodeRecord {
                name: n.name.clone(),
                node_type: n.node_type.clone(),
                attributes: n.attributes.clone(),
                resources: n.resources.clone(),
            })
            .collect()
    }

    pub fn edge_records(&self) -> Vec<EdgeRecord> {
        self.edges()
            .map(|(source, target, e)| EdgeRecord {
                source: source.to_string(),
                target: target.to_string(),
                relation_type: e.relation_type.clone(),
                resources: e.resources.clone(),
            })
            .collect()
    }

    /// Outgoing edges of `name` as `(target, payload)` pairs; empty if the
    /// node is absent
    pub fn outgoing(&self, name: &str) -> impl Iterator<Item = (&str, &EdgeData)> + '_ {
        self.node_index(name).into_iter().flat_map(move |idx| {
            self.inner
                .edges_directed(idx, Direction::Outgoing)
                .map(move |e| (self.inner[e.target()].name.as_str(), e.weight()))
        })
    }

    /// Names of the nodes at the other end of edges in `dir`
    pub fn neighbors(&self, name: &str, dir: Direction) -> Option<Vec<String>> {
        let idx = self.node_index(name)?;
        Some(
            self.inner
                .neighbors_directed(idx, dir)
                .map(|n| self.inner[n].name.clone())
                .collect(),
        )
    }

    /// Read access to the underlying petgraph structure for analytics
    pub(crate) fn inner(&self) -> &StableDiGraph<NodeData, EdgeData> {
        &self.inner
    }
}
