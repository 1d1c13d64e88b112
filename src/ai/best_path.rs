//! Precomputed all-pairs next hops
//!
//! [`BestPathTable::create`] runs an exhaustive Dijkstra from every node and
//! records, for each reachable destination, the total cost and the first hop
//! out of the source. Lookups are then O(1). The table remembers the graph
//! version it was built from, so callers can detect when a topology change
//! has made it stale.

use std::fmt;
use std::ops::Index;

use rustc_hash::FxHashMap;

use crate::ai::search::{Dijkstra, DijkstraSearch};
use crate::graph::{Graph, NodeId};

/// Next hop and total cost for one (source, destination) pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestPathEntry {
    /// First node after the source; the source itself when source == destination
    pub next: NodeId,
    /// Total cost of the cheapest path
    pub cost: f32,
}

/// Problems with a table's relationship to its graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    /// `create` has never been called
    NotBuilt,
    /// The graph changed since the table was built
    Stale {
        /// Graph version the table was built from
        built: u64,
        /// Current graph version
        current: u64,
    },
    /// The graph is locked for mutation elsewhere
    GraphLocked,
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotBuilt => write!(f, "best path table has not been built"),
            Self::Stale { built, current } => write!(
                f,
                "best path table is stale (built from graph version {built}, now {current})"
            ),
            Self::GraphLocked => write!(f, "graph is locked"),
        }
    }
}

impl std::error::Error for TableError {}

/// Next-hop table keyed by (source, destination)
#[derive(Debug, Clone, Default)]
pub struct BestPathTable {
    entries: FxHashMap<(NodeId, NodeId), BestPathEntry>,
    built_version: Option<u64>,
}

impl BestPathTable {
    /// Create an empty, unbuilt table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table for `graph`
    ///
    /// # Errors
    ///
    /// Returns [`TableError::GraphLocked`] if the graph is locked.
    pub fn build(graph: &Graph) -> Result<Self, TableError> {
        let mut table = Self::new();
        table.create(graph)?;
        Ok(table)
    }

    /// (Re)build from `graph`, replacing all previous entries
    ///
    /// # Errors
    ///
    /// Returns [`TableError::GraphLocked`] if the graph is locked; the
    /// previous contents are kept in that case.
    pub fn create(&mut self, graph: &Graph) -> Result<(), TableError> {
        if graph.is_locked() {
            log::warn!("refusing to build best path table from a locked graph");
            return Err(TableError::GraphLocked);
        }

        self.entries.clear();
        let mut first_hops: FxHashMap<NodeId, NodeId> = FxHashMap::default();

        for source in graph.nodes().map(|node| node.id()) {
            let mut search = DijkstraSearch::new(graph, source, Dijkstra::exhaustive());
            search.run(graph);

            first_hops.clear();
            for (destination, data) in search.closed() {
                let next = if destination == source {
                    source
                } else {
                    Self::first_hop(&search, source, destination, &mut first_hops)
                };
                let entry = BestPathEntry {
                    next,
                    cost: data.g,
                };
                self.entries.insert((source, destination), entry);
            }
        }

        self.built_version = Some(graph.version());
        log::info!(
            "best path table built: {} nodes, {} reachable pairs",
            graph.len(),
            self.entries.len()
        );
        Ok(())
    }

    /// Walk the parent chain from `destination` back to the node after `source`
    fn first_hop(
        search: &DijkstraSearch,
        source: NodeId,
        destination: NodeId,
        cache: &mut FxHashMap<NodeId, NodeId>,
    ) -> NodeId {
        let mut chain = Vec::new();
        let mut current = destination;

        let hop = loop {
            if let Some(&hop) = cache.get(&current) {
                break hop;
            }
            match search.record(current).and_then(|data| data.parent) {
                Some(parent) if parent == source => break current,
                Some(parent) => {
                    chain.push(current);
                    current = parent;
                }
                // Only the source has no parent, and it is handled by the caller
                None => break current,
            }
        };

        cache.insert(current, hop);
        for node in chain {
            cache.insert(node, hop);
        }
        hop
    }

    /// First hop from `source` towards `destination`
    ///
    /// `None` if `destination` is unreachable or the table is unbuilt.
    #[must_use]
    pub fn next_node(&self, source: NodeId, destination: NodeId) -> Option<NodeId> {
        self.entries.get(&(source, destination)).map(|e| e.next)
    }

    /// Total cost of the cheapest path from `source` to `destination`
    #[must_use]
    pub fn cost(&self, source: NodeId, destination: NodeId) -> Option<f32> {
        self.entries.get(&(source, destination)).map(|e| e.cost)
    }

    /// Entry for a pair
    #[must_use]
    pub fn entry(&self, source: NodeId, destination: NodeId) -> Option<&BestPathEntry> {
        self.entries.get(&(source, destination))
    }

    /// Full node sequence from `source` to `destination` by following next hops
    #[must_use]
    pub fn path(&self, source: NodeId, destination: NodeId) -> Option<Vec<NodeId>> {
        let mut nodes = vec![source];
        let mut current = source;
        while current != destination {
            current = self.next_node(current, destination)?;
            nodes.push(current);
            // A consistent table never revisits; bail out on a corrupt one
            if nodes.len() > self.entries.len() + 1 {
                log::error!("best path table loops between {source} and {destination}");
                return None;
            }
        }
        Some(nodes)
    }

    /// Number of reachable (source, destination) pairs, self pairs included
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table holds no pairs
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check whether `create` has run
    #[must_use]
    pub fn is_built(&self) -> bool {
        self.built_version.is_some()
    }

    /// Graph version the table was built from
    #[must_use]
    pub fn built_version(&self) -> Option<u64> {
        self.built_version
    }

    /// Check whether `graph` changed since the table was built
    #[must_use]
    pub fn is_stale(&self, graph: &Graph) -> bool {
        self.built_version != Some(graph.version())
    }

    /// Confirm the table matches `graph`
    ///
    /// # Errors
    ///
    /// [`TableError::NotBuilt`] or [`TableError::Stale`]
    pub fn validate(&self, graph: &Graph) -> Result<(), TableError> {
        match self.built_version {
            None => Err(TableError::NotBuilt),
            Some(built) if built != graph.version() => Err(TableError::Stale {
                built,
                current: graph.version(),
            }),
            Some(_) => Ok(()),
        }
    }

    /// Drop all entries
    pub fn clear(&mut self) {
        self.entries.clear();
        self.built_version = None;
    }
}

impl Index<(NodeId, NodeId)> for BestPathTable {
    type Output = BestPathEntry;

    /// # Panics
    ///
    /// Panics if the pair is unreachable or the table was never built.
    fn index(&self, pair: (NodeId, NodeId)) -> &Self::Output {
        match self.entries.get(&pair) {
            Some(entry) => entry,
            None if !self.is_built() => panic!("best path table indexed before create()"),
            None => panic!("no best path entry for {} -> {}", pair.0, pair.1),
        }
    }
}
