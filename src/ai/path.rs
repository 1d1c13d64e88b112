//! Solved paths as queues of quasi-edges
//!
//! A quasi-edge is a path segment that is either a real graph edge or a
//! shortcut synthesised by the planner (a direct line of sight, or the
//! connectors between an agent's position and the graph).

use std::collections::VecDeque;

use glam::Vec3;

use crate::ai::{ObstacleQuery, Probe};
use crate::graph::{Edge, Graph};

/// One segment of a [`Path`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuasiEdge {
    /// Segment start
    pub from: Vec3,
    /// Segment end
    pub to: Vec3,
    /// Underlying graph edge, `None` for shortcuts
    pub edge: Option<Edge>,
}

impl QuasiEdge {
    /// A segment that follows a real graph edge
    ///
    /// Returns `None` if either endpoint is not in `graph`.
    #[must_use]
    pub fn from_edge(graph: &Graph, edge: Edge) -> Option<Self> {
        Some(Self {
            from: graph.node(edge.from)?.position(),
            to: graph.node(edge.to)?.position(),
            edge: Some(edge),
        })
    }

    /// A synthesised straight segment
    #[must_use]
    pub fn shortcut(from: Vec3, to: Vec3) -> Self {
        Self {
            from,
            to,
            edge: None,
        }
    }

    /// Whether the segment is a real graph edge
    #[must_use]
    pub fn is_true_edge(&self) -> bool {
        self.edge.is_some()
    }

    /// Euclidean length
    #[must_use]
    pub fn length(&self) -> f32 {
        self.from.distance(self.to)
    }
}

/// Draw calls for path debugging; the core never reads anything back
pub trait PathVisualizer {
    /// Draw one segment
    fn draw_edge(&mut self, edge: &QuasiEdge);

    /// Forget everything drawn so far
    fn clear(&mut self) {}
}

/// FIFO queue of quasi-edges
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    edges: VecDeque<QuasiEdge>,
}

impl Path {
    /// Create an empty path
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A single shortcut segment
    #[must_use]
    pub fn direct(from: Vec3, to: Vec3) -> Self {
        let mut path = Self::new();
        path.push(QuasiEdge::shortcut(from, to));
        path
    }

    /// Append a segment
    pub fn push(&mut self, edge: QuasiEdge) {
        self.edges.push_back(edge);
    }

    /// Pop the first segment
    pub fn dequeue(&mut self) -> Option<QuasiEdge> {
        self.edges.pop_front()
    }

    /// First segment
    #[must_use]
    pub fn peek(&self) -> Option<&QuasiEdge> {
        self.edges.front()
    }

    /// Segment at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&QuasiEdge> {
        self.edges.get(index)
    }

    /// Replace the segment at `index`, returning the old one
    pub fn replace_quasi_edge(&mut self, index: usize, edge: QuasiEdge) -> Option<QuasiEdge> {
        self.edges
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, edge))
    }

    /// Number of segments
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Check if no segments remain
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Iterate segments in travel order
    pub fn iter(&self) -> impl Iterator<Item = &QuasiEdge> + '_ {
        self.edges.iter()
    }

    /// Number of segments that are real graph edges
    #[must_use]
    pub fn true_edge_count(&self) -> usize {
        self.edges.iter().filter(|e| e.is_true_edge()).count()
    }

    /// Sum of segment lengths
    #[must_use]
    pub fn total_length(&self) -> f32 {
        self.edges.iter().map(QuasiEdge::length).sum()
    }

    /// Start point followed by every segment end
    #[must_use]
    pub fn waypoints(&self) -> Vec<Vec3> {
        self.edges
            .front()
            .map(|first| first.from)
            .into_iter()
            .chain(self.edges.iter().map(|e| e.to))
            .collect()
    }

    /// Final destination
    #[must_use]
    pub fn destination(&self) -> Option<Vec3> {
        self.edges.back().map(|e| e.to)
    }

    /// Collapse head segments the agent can already skip
    ///
    /// While the end of the second segment is visible from `position`, the
    /// first two segments are merged into one shortcut. Returns how many
    /// segments were removed.
    pub fn smooth<Q>(&mut self, position: Vec3, obstacles: &Q, probe: &Probe) -> usize
    where
        Q: ObstacleQuery + ?Sized,
    {
        let mut removed = 0;
        while self.edges.len() >= 2 {
            let next = self.edges[1].to;
            if !obstacles.can_move_between(position, next, probe) {
                break;
            }
            self.edges.pop_front();
            self.replace_quasi_edge(0, QuasiEdge::shortcut(position, next));
            removed += 1;
        }
        removed
    }

    /// Hand every segment to a visualizer
    pub fn draw(&self, visualizer: &mut dyn PathVisualizer) {
        for edge in &self.edges {
            visualizer.draw_edge(edge);
        }
    }

    /// Drop every remaining segment
    pub fn clean_up(&mut self) {
        self.edges.clear();
    }
}

impl FromIterator<QuasiEdge> for Path {
    fn from_iter<I: IntoIterator<Item = QuasiEdge>>(iter: I) -> Self {
        Self {
            edges: iter.into_iter().collect(),
        }
    }
}
