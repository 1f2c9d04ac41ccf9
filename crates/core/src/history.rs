//! Whole-graph snapshots and the bounded undo/redo stacks

use std::collections::VecDeque;

use crate::document::GraphDocument;
use crate::graph::Graph;

/// Default depth of both the undo and the redo stack
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Immutable copy of the whole graph at one point in time
#[derive(Debug, Clone)]
pub struct Snapshot {
    version: u64,
    graph: Graph,
}

impl Snapshot {
    pub(crate) fn capture(graph: &Graph, version: u64) -> Self {
        Self {
            version,
            graph: graph.clone(),
        }
    }

    pub(crate) fn into_graph(self) -> Graph {
        self.graph
    }

    /// Value of the store's version counter when this snapshot was taken
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn document(&self) -> GraphDocument {
        self.graph.to_document()
    }
}

/// Linear undo/redo history.
///
/// Both stacks hold at most `capacity` snapshots; pushing onto a full stack
/// evicts its oldest entry. A capacity of zero disables history.
#[derive(Debug)]
pub struct History {
    undo: VecDeque<Snapshot>,
    redo: VecDeque<Snapshot>,
    capacity: usize,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        Self {
            undo: VecDeque::with_capacity(capacity),
            redo: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record the state preceding a fresh mutation.
    ///
    /// Any redo history is discarded.
    pub fn record(&mut self, snapshot: Snapshot) {
        push_bounded(&mut self.undo, snapshot, self.capacity);
        self.redo.clear();
    }

    pub(crate) fn pop_undo(&mut self) -> Option<Snapshot> {
        self.undo.pop_back()
    }

    pub(crate) fn pop_redo(&mut self) -> Option<Snapshot> {
        self.redo.pop_back()
    }

    pub(crate) fn push_undo(&mut self, snapshot: Snapshot) {
        push_bounded(&mut self.undo, snapshot, self.capacity);
    }

    pub(crate) fn push_redo(&mut self, snapshot: Snapshot) {
        push_bounded(&mut self.redo, snapshot, self.capacity);
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Snapshots on the undo stack, oldest first
    pub fn undo_entries(&self) -> impl Iterator<Item = &Snapshot> {
        self.undo.iter()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

fn push_bounded(stack: &mut VecDeque<Snapshot>, snapshot: Snapshot, capacity: usize) {
    if capacity == 0 {
        return;
    }
    while stack.len() >= capacity {
        stack.pop_front();
    }
    stack.push_back(snapshot);
}
