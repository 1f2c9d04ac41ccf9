//! Read-only analytics over the graph
//!
//! Nothing here mutates the graph or touches undo history.

use std::collections::{BTreeMap, HashMap};

use petgraph::unionfind::UnionFind;
use petgraph::visit::{EdgeRef, IntoEdgeReferences, NodeIndexable};
use petgraph::Direction;
use serde::Serialize;

use crate::graph::Graph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Degree {
    pub in_degree: usize,
    pub out_degree: usize,
    /// `in_degree + out_degree`; a self-loop counts twice
    pub total: usize,
}

/// Direct neighbours of a node, split by edge direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Neighbors {
    pub predecessors: Vec<String>,
    pub successors: Vec<String>,
}

/// One-line summary of the graph's shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    /// Weakly connected components
    pub components: usize,
    /// Nodes with no relationship at all
    pub isolated: usize,
}

pub fn node_degree(graph: &Graph, name: &str) -> Option<Degree> {
    let idx = graph.node_index(name)?;
    let inner = graph.inner();
    let in_degree = inner.edges_directed(idx, Direction::Incoming).count();
    let out_degree = inner.edges_directed(idx, Direction::Outgoing).count();
    Some(Degree {
        in_degree,
        out_degree,
        total: in_degree + out_degree,
    })
}

pub fn degree_distribution(graph: &Graph) -> BTreeMap<String, Degree> {
    graph
        .nodes()
        .filter_map(|n| node_degree(graph, &n.name).map(|d| (n.name.clone(), d)))
        .collect()
}

pub fn connected_nodes(graph: &Graph, name: &str) -> Option<Neighbors> {
    let mut predecessors = graph.neighbors(name, Direction::Incoming)?;
    let mut successors = graph.neighbors(name, Direction::Outgoing)?;
    predecessors.sort();
    successors.sort();
    Some(Neighbors {
        predecessors,
        successors,
    })
}

/// Groups of nodes reachable from one another when edge direction is ignored.
///
/// Names are sorted inside each group; groups are ordered largest first,
/// ties broken by their first name.
pub fn weakly_connected_components(graph: &Graph) -> Vec<Vec<String>> {
    let inner = graph.inner();
    let mut sets = UnionFind::<usize>::new(NodeIndexable::node_bound(inner));
    for edge in inner.edge_references() {
        sets.union(edge.source().index(), edge.target().index());
    }

    let mut groups: HashMap<usize, Vec<String>> = HashMap::new();
    for idx in inner.node_indices() {
        groups
            .entry(sets.find(idx.index()))
            .or_default()
            .push(inner[idx].name.clone());
    }

    let mut components: Vec<Vec<String>> = groups
        .into_values()
        .map(|mut names| {
            names.sort();
            names
        })
        .collect();
    components.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    components
}

pub fn stats(graph: &Graph) -> GraphStats {
    let components = weakly_connected_components(graph);
    GraphStats {
        nodes: graph.node_count(),
        edges: graph.edge_count(),
        isolated: components
            .iter()
            .filter(|c| c.len() == 1)
            .filter(|c| node_degree(graph, &c[0]).is_some_and(|d| d.total == 0))
            .count(),
        components: components.len(),
    }
}

/// The `n` nodes with the highest total degree, ties broken by name
pub fn top_by_degree(graph: &Graph, n: usize) -> Vec<(String, Degree)> {
    let mut ranked: Vec<(String, Degree)> = degree_distribution(graph).into_iter().collect();
    ranked.sort_by(|a, b| b.1.total.cmp(&a.1.total).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}
