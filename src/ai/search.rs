//! Cycle-limited graph search (A* and Dijkstra)
//!
//! A search is an explicit state machine that can be advanced a bounded
//! number of expansion cycles at a time, so that many agents can share a
//! fixed per-frame budget.
//!
//! # Lifecycle
//!
//! `Constructed -> Running -> Success | Failure`. Transitions only happen in
//! [`CycleLimitedSearch::do_search`]. Success and Failure are terminal: a
//! finished search keeps reporting its result and never expands again. To
//! retry, build a new search.
//!
//! # Example
//!
//! ```ignore
//! let mut search = AStarSearch::astar(&graph, start, goal);
//! loop {
//!     let step = search.do_search(&graph, Some(10));
//!     if step.status != SearchStatus::Running {
//!         break;
//!     }
//! }
//! ```
//!
//! Ties between open nodes of equal `f` are resolved first-in first-out
//! (see [`MappedPriorityQueue`]), so the same search always yields the same
//! solution.

use std::fmt;

use glam::Vec3;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::ai::queue::MappedPriorityQueue;
use crate::graph::{Edge, Graph, Node, NodeId};

// ============================================================================
// Status
// ============================================================================

/// Result of advancing a search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    /// Open set non-empty, goal not reached yet
    Running,
    /// Goal dequeued, solution available
    Success,
    /// Open set exhausted without reaching a goal
    Failure,
}

/// Lifecycle state of a search object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchState {
    /// Seeded but never advanced
    Constructed,
    /// Advanced at least once, not finished
    Running,
    /// Finished successfully
    Success,
    /// Finished without a path
    Failure,
}

impl SearchState {
    /// Check whether the search can make no further progress
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

/// Outcome of one [`Search::do_search`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchStep {
    /// Status after the call
    pub status: SearchStatus,
    /// Expansion cycles consumed by the call
    pub cycles_used: usize,
}

/// Per-node scratch record
///
/// `parent` links form a backward chain from any visited node to the source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathData {
    /// Cost so far from the source
    pub g: f32,
    /// Edge that reached this node, `None` for the source
    pub via: Option<Edge>,
    /// Node this one was reached from
    pub parent: Option<NodeId>,
}

// ============================================================================
// Strategies
// ============================================================================

/// Goal test and heuristic that specialise a [`CycleLimitedSearch`]
pub trait SearchStrategy {
    /// Estimated remaining cost from `node`; must not overestimate
    fn estimate(&self, node: &Node) -> f32;

    /// Whether reaching `node` ends the search
    fn is_goal(&self, node: &Node) -> bool;

    /// Goal node, if the strategy targets a single one
    fn goal(&self) -> Option<NodeId> {
        None
    }

    /// Name for logging
    fn name(&self) -> &'static str;
}

/// Distance estimate used by A*
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Heuristic {
    /// Straight-line distance
    #[default]
    Euclidean,
    /// Sum of axis distances (admissible only on axis-aligned graphs)
    Manhattan,
    /// Always zero, turns A* into Dijkstra
    Zero,
}

impl Heuristic {
    /// Estimate the cost between two positions
    #[must_use]
    pub fn estimate(self, from: Vec3, to: Vec3) -> f32 {
        match self {
            Self::Euclidean => from.distance(to),
            Self::Manhattan => {
                let d = (from - to).abs();
                d.x + d.y + d.z
            }
            Self::Zero => 0.0,
        }
    }
}

/// A* towards one goal node
#[derive(Debug, Clone, Copy)]
pub struct AStar {
    goal: NodeId,
    goal_position: Vec3,
    heuristic: Heuristic,
}

impl AStar {
    /// Target `goal` with the given heuristic
    #[must_use]
    pub fn new(graph: &Graph, goal: NodeId, heuristic: Heuristic) -> Self {
        let goal_position = graph.node(goal).map_or(Vec3::ZERO, Node::position);
        Self {
            goal,
            goal_position,
            heuristic,
        }
    }
}

impl SearchStrategy for AStar {
    fn estimate(&self, node: &Node) -> f32 {
        self.heuristic.estimate(node.position(), self.goal_position)
    }

    fn is_goal(&self, node: &Node) -> bool {
        node.id() == self.goal
    }

    fn goal(&self) -> Option<NodeId> {
        Some(self.goal)
    }

    fn name(&self) -> &'static str {
        "A*"
    }
}

/// Dijkstra towards the first node satisfying a predicate
pub struct Dijkstra {
    goal: Box<dyn Fn(&Node) -> bool>,
}

impl Dijkstra {
    /// Stop at the first (cheapest) node matching `goal`
    #[must_use]
    pub fn until<F>(goal: F) -> Self
    where
        F: Fn(&Node) -> bool + 'static,
    {
        Self {
            goal: Box::new(goal),
        }
    }

    /// Stop at a specific node
    #[must_use]
    pub fn to_node(target: NodeId) -> Self {
        Self::until(move |node| node.id() == target)
    }

    /// Never stop early: explore everything reachable from the source
    #[must_use]
    pub fn exhaustive() -> Self {
        Self::until(|_| false)
    }
}

impl fmt::Debug for Dijkstra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dijkstra").finish_non_exhaustive()
    }
}

impl SearchStrategy for Dijkstra {
    fn estimate(&self, _node: &Node) -> f32 {
        0.0
    }

    fn is_goal(&self, node: &Node) -> bool {
        (self.goal)(node)
    }

    fn name(&self) -> &'static str {
        "Dijkstra"
    }
}

// ============================================================================
// Search
// ============================================================================

/// Object-safe view of a search, used by planners to hold any strategy
pub trait Search {
    /// Run up to `cycles` expansion steps (`None` = until finished)
    fn do_search(&mut self, graph: &Graph, cycles: Option<usize>) -> SearchStep;

    /// Lifecycle state
    fn state(&self) -> SearchState;

    /// Solution edges from source to goal (empty unless successful)
    fn solution(&self) -> &[Edge];

    /// Node the search started from
    fn source(&self) -> NodeId;

    /// Node that satisfied the goal test, once successful
    fn reached(&self) -> Option<NodeId>;

    /// Total expansion cycles spent so far
    fn cycles_total(&self) -> usize;
}

/// Incremental best-first search parameterised by a [`SearchStrategy`]
#[derive(Debug)]
pub struct CycleLimitedSearch<S> {
    strategy: S,
    source: NodeId,
    open: MappedPriorityQueue<NodeId, PathData, f32>,
    closed: FxHashMap<NodeId, PathData>,
    state: SearchState,
    solution: Vec<Edge>,
    reached: Option<NodeId>,
    cycles_total: usize,
}

/// A* search to a single node
pub type AStarSearch = CycleLimitedSearch<AStar>;

/// Dijkstra search to the first node matching a predicate
pub type DijkstraSearch = CycleLimitedSearch<Dijkstra>;

impl AStarSearch {
    /// A* from `source` to `goal` using straight-line distance
    #[must_use]
    pub fn astar(graph: &Graph, source: NodeId, goal: NodeId) -> Self {
        Self::new(graph, source, AStar::new(graph, goal, Heuristic::Euclidean))
    }

    /// A* from `source` to `goal` using `heuristic`
    #[must_use]
    pub fn with_heuristic(
        graph: &Graph,
        source: NodeId,
        goal: NodeId,
        heuristic: Heuristic,
    ) -> Self {
        Self::new(graph, source, AStar::new(graph, goal, heuristic))
    }
}

impl DijkstraSearch {
    /// Dijkstra from `source` until a node matches `goal`
    #[must_use]
    pub fn dijkstra<F>(graph: &Graph, source: NodeId, goal: F) -> Self
    where
        F: Fn(&Node) -> bool + 'static,
    {
        Self::new(graph, source, Dijkstra::until(goal))
    }
}

impl<S: SearchStrategy> CycleLimitedSearch<S> {
    /// Seed a search at `source` (g = 0, f = h(source))
    ///
    /// A source that is not in `graph` leaves the open set empty, so the
    /// first `do_search` reports failure.
    #[must_use]
    pub fn new(graph: &Graph, source: NodeId, strategy: S) -> Self {
        let mut open = MappedPriorityQueue::min();
        if let Some(node) = graph.node(source) {
            let seed = PathData {
                g: 0.0,
                via: None,
                parent: None,
            };
            open.enqueue(source, seed, strategy.estimate(node));
        }

        Self {
            strategy,
            source,
            open,
            closed: FxHashMap::default(),
            state: SearchState::Constructed,
            solution: Vec::new(),
            reached: None,
            cycles_total: 0,
        }
    }

    /// Strategy driving this search
    #[must_use]
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Run up to `cycles` expansion steps (`None` = until finished)
    pub fn do_search(&mut self, graph: &Graph, cycles: Option<usize>) -> SearchStep {
        if let Some(status) = self.terminal_status() {
            return SearchStep {
                status,
                cycles_used: 0,
            };
        }

        self.state = SearchState::Running;
        let limit = cycles.unwrap_or(usize::MAX);
        let mut used = 0;

        while used < limit {
            let Some((current, data, _)) = self.open.dequeue() else {
                self.state = SearchState::Failure;
                break;
            };
            used += 1;

            let Some(node) = graph.node(current) else {
                continue;
            };

            if self.strategy.is_goal(node) {
                self.reached = Some(current);
                self.solution = self.reconstruct(data);
                self.state = SearchState::Success;
                break;
            }

            self.closed.insert(current, data);
            self.relax(graph, node, data.g);
        }

        // The last expansion may have drained the open set
        if self.state == SearchState::Running && self.open.is_empty() {
            self.state = SearchState::Failure;
        }

        self.cycles_total += used;
        let status = self.terminal_status().unwrap_or(SearchStatus::Running);
        if status != SearchStatus::Running {
            log::debug!(
                "{} search from {} finished: {:?} after {} cycles, {} edges",
                self.strategy.name(),
                self.source,
                status,
                self.cycles_total,
                self.solution.len()
            );
        }

        SearchStep {
            status,
            cycles_used: used,
        }
    }

    /// Run to completion
    pub fn run(&mut self, graph: &Graph) -> SearchStatus {
        self.do_search(graph, None).status
    }

    fn terminal_status(&self) -> Option<SearchStatus> {
        match self.state {
            SearchState::Success => Some(SearchStatus::Success),
            SearchState::Failure => Some(SearchStatus::Failure),
            SearchState::Constructed | SearchState::Running => None,
        }
    }

    fn relax(&mut self, graph: &Graph, node: &Node, g: f32) {
        for edge in node.edges() {
            let Some(neighbor) = graph.node(edge.to) else {
                continue;
            };

            let tentative = g + edge.cost;
            let data = PathData {
                g: tentative,
                via: Some(*edge),
                parent: Some(node.id()),
            };
            let f = tentative + self.strategy.estimate(neighbor);

            if let Some(closed_g) = self.closed.get(&edge.to).map(|closed| closed.g) {
                // Reopen only on a strictly cheaper route
                if tentative < closed_g {
                    self.closed.remove(&edge.to);
                    self.open.enqueue(edge.to, data, f);
                }
                continue;
            }

            match self.open.get(&edge.to).map(|open| open.g) {
                Some(open_g) if tentative < open_g => {
                    self.open.change_value_and_priority(&edge.to, data, f);
                }
                Some(_) => {}
                None => {
                    self.open.enqueue(edge.to, data, f);
                }
            }
        }
    }

    fn reconstruct(&self, goal: PathData) -> Vec<Edge> {
        let mut edges = Vec::new();
        let mut data = goal;

        while let (Some(edge), Some(parent)) = (data.via, data.parent) {
            edges.push(edge);
            match self.record(parent) {
                Some(next) => data = *next,
                None => break,
            }
        }

        edges.reverse();
        edges
    }

    /// Scratch record for a visited node (closed first, then open)
    #[must_use]
    pub fn record(&self, node: NodeId) -> Option<&PathData> {
        self.closed.get(&node).or_else(|| self.open.get(&node))
    }

    /// Finalised nodes and their records
    pub fn closed(&self) -> impl Iterator<Item = (NodeId, &PathData)> + '_ {
        self.closed.iter().map(|(id, data)| (*id, data))
    }

    /// Check whether `node` has been finalised
    #[must_use]
    pub fn is_closed(&self, node: NodeId) -> bool {
        self.closed.contains_key(&node)
    }

    /// Check whether `node` is waiting in the open set
    #[must_use]
    pub fn is_open(&self, node: NodeId) -> bool {
        self.open.contains_key(&node)
    }

    /// Number of nodes waiting in the open set
    #[must_use]
    pub fn open_len(&self) -> usize {
        self.open.len()
    }

    /// Total cost of the solution (0 when there is none)
    #[must_use]
    pub fn solution_cost(&self) -> f32 {
        self.solution.iter().map(|e| e.cost).sum()
    }

    /// Nodes along the solution, source first
    #[must_use]
    pub fn solution_nodes(&self) -> Vec<NodeId> {
        match self.solution.first() {
            Some(first) => std::iter::once(first.from)
                .chain(self.solution.iter().map(|e| e.to))
                .collect(),
            None => self.reached.into_iter().collect(),
        }
    }

    /// Lifecycle state
    #[must_use]
    pub fn state(&self) -> SearchState {
        self.state
    }

    /// Solution edges from source to goal (empty unless successful)
    #[must_use]
    pub fn solution(&self) -> &[Edge] {
        &self.solution
    }

    /// Node the search started from
    #[must_use]
    pub fn source(&self) -> NodeId {
        self.source
    }

    /// Node that satisfied the goal test
    #[must_use]
    pub fn reached(&self) -> Option<NodeId> {
        self.reached
    }

    /// Total expansion cycles spent so far
    #[must_use]
    pub fn cycles_total(&self) -> usize {
        self.cycles_total
    }
}

impl<S: SearchStrategy> Search for CycleLimitedSearch<S> {
    fn do_search(&mut self, graph: &Graph, cycles: Option<usize>) -> SearchStep {
        CycleLimitedSearch::do_search(self, graph, cycles)
    }

    fn state(&self) -> SearchState {
        self.state
    }

    fn solution(&self) -> &[Edge] {
        &self.solution
    }

    fn source(&self) -> NodeId {
        self.source
    }

    fn reached(&self) -> Option<NodeId> {
        self.reached
    }

    fn cycles_total(&self) -> usize {
        self.cycles_total
    }
}
