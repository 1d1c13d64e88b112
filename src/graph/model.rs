//! Directed weighted navigation graph
//!
//! Nodes own their outgoing edges. A reverse edge is a separate `Edge`
//! owned by the other node.

use std::fmt;

use glam::Vec3;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Identifier of a node inside a [`Graph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Raw index into the graph's node storage
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A directed link with a non-negative traversal cost
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// Node the edge leaves from
    pub from: NodeId,
    /// Node the edge arrives at
    pub to: NodeId,
    /// Traversal cost (>= 0)
    pub cost: f32,
}

/// A graph node with a world position and its outgoing edges
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    position: Vec3,
    tags: SmallVec<[u32; 4]>,
    edges: FxHashMap<NodeId, Edge>,
    /// Insertion order of neighbours, keeps edge iteration deterministic
    order: Vec<NodeId>,
}

impl Node {
    fn new(id: NodeId, position: Vec3) -> Self {
        Self {
            id,
            position,
            tags: SmallVec::new(),
            edges: FxHashMap::default(),
            order: Vec::new(),
        }
    }

    /// Node identifier
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// World position
    #[must_use]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Gameplay tags attached to this node (used by "nearest of type" queries)
    #[must_use]
    pub fn tags(&self) -> &[u32] {
        &self.tags
    }

    /// Check whether the node carries a tag
    #[must_use]
    pub fn has_tag(&self, tag: u32) -> bool {
        self.tags.contains(&tag)
    }

    /// Outgoing edges in insertion order
    pub fn edges(&self) -> impl Iterator<Item = &Edge> + '_ {
        self.order.iter().filter_map(|to| self.edges.get(to))
    }

    /// Outgoing edge to `to`, if any
    #[must_use]
    pub fn edge_to(&self, to: NodeId) -> Option<&Edge> {
        self.edges.get(&to)
    }

    /// Number of outgoing edges
    #[must_use]
    pub fn degree(&self) -> usize {
        self.edges.len()
    }
}

/// Errors returned by graph mutation
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    /// The graph is locked by in-flight searches
    Locked,
    /// A node id does not belong to this graph
    UnknownNode(NodeId),
    /// Edge cost is negative or not finite
    InvalidCost(f32),
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Locked => write!(f, "graph is locked by active searches"),
            Self::UnknownNode(id) => write!(f, "unknown node {id}"),
            Self::InvalidCost(cost) => write!(f, "invalid edge cost {cost}"),
        }
    }
}

impl std::error::Error for GraphError {}

/// Navigation graph
///
/// The `locked` flag is cooperative: it is set while searches are in flight
/// and every mutating method checks it. `version` increases on each
/// structural change so precomputed tables can detect staleness.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    locked: bool,
    version: u64,
}

impl Graph {
    /// Create an empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph has no nodes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Structural version, bumped on every mutation
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Check whether mutation is currently forbidden
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Forbid mutation until [`Graph::unlock`]
    pub fn lock(&mut self) {
        self.locked = true;
    }

    /// Allow mutation again
    pub fn unlock(&mut self) {
        self.locked = false;
    }

    fn ensure_unlocked(&self) -> Result<(), GraphError> {
        if self.locked {
            log::warn!("rejected mutation of a locked graph");
            return Err(GraphError::Locked);
        }
        Ok(())
    }

    fn ensure_node(&self, id: NodeId) -> Result<(), GraphError> {
        if id.index() < self.nodes.len() {
            Ok(())
        } else {
            Err(GraphError::UnknownNode(id))
        }
    }

    /// Add a node at `position`
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Locked`] while the graph is locked
    pub fn add_node(&mut self, position: Vec3) -> Result<NodeId, GraphError> {
        self.ensure_unlocked()?;
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(id, position));
        self.version += 1;
        Ok(id)
    }

    /// Attach a gameplay tag to a node
    ///
    /// # Errors
    ///
    /// Returns an error if the graph is locked or the node is unknown
    pub fn tag_node(&mut self, id: NodeId, tag: u32) -> Result<(), GraphError> {
        self.ensure_unlocked()?;
        self.ensure_node(id)?;
        let node = &mut self.nodes[id.index()];
        if !node.tags.contains(&tag) {
            node.tags.push(tag);
            self.version += 1;
        }
        Ok(())
    }

    /// Add (or replace) the directed edge `from -> to`
    ///
    /// # Errors
    ///
    /// Returns an error if the graph is locked, either node is unknown, or
    /// the cost is negative or not finite
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, cost: f32) -> Result<(), GraphError> {
        self.ensure_unlocked()?;
        self.ensure_node(from)?;
        self.ensure_node(to)?;
        if !cost.is_finite() || cost < 0.0 {
            return Err(GraphError::InvalidCost(cost));
        }

        let node = &mut self.nodes[from.index()];
        if node.edges.insert(to, Edge { from, to, cost }).is_none() {
            node.order.push(to);
        }
        self.version += 1;
        Ok(())
    }

    /// Add edges in both directions with the same cost
    ///
    /// # Errors
    ///
    /// Same as [`Graph::add_edge`]
    pub fn add_bidirectional_edge(
        &mut self,
        a: NodeId,
        b: NodeId,
        cost: f32,
    ) -> Result<(), GraphError> {
        self.add_edge(a, b, cost)?;
        self.add_edge(b, a, cost)
    }

    /// Remove the directed edge `from -> to`, returning it if it existed
    ///
    /// # Errors
    ///
    /// Returns an error if the graph is locked or `from` is unknown
    pub fn remove_edge(&mut self, from: NodeId, to: NodeId) -> Result<Option<Edge>, GraphError> {
        self.ensure_unlocked()?;
        self.ensure_node(from)?;
        let node = &mut self.nodes[from.index()];
        let removed = node.edges.remove(&to);
        if removed.is_some() {
            node.order.retain(|id| *id != to);
            self.version += 1;
        }
        Ok(removed)
    }

    /// Look up a node
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Look up a directed edge
    #[must_use]
    pub fn edge(&self, from: NodeId, to: NodeId) -> Option<&Edge> {
        self.node(from).and_then(|node| node.edge_to(to))
    }

    /// Iterate all nodes in id order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.iter()
    }

    /// Total number of directed edges
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(Node::degree).sum()
    }

    /// Closest node to `location` accepted by `reachable`
    ///
    /// Candidates are tried nearest first; `reachable` is typically a
    /// line-of-sight check from `location` to the node position.
    pub fn closest_node<F>(&self, location: Vec3, mut reachable: F) -> Option<NodeId>
    where
        F: FnMut(Vec3) -> bool,
    {
        let mut candidates: Vec<(f32, NodeId)> = self
            .nodes
            .iter()
            .map(|node| (node.position.distance_squared(location), node.id))
            .collect();
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        candidates
            .into_iter()
            .find(|(_, id)| reachable(self.nodes[id.index()].position))
            .map(|(_, id)| id)
    }
}
