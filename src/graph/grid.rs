//! Walkable-cell grid and procedural graph generation
//!
//! The grid lies in the XZ plane (Y up). Cell `(x, y)` maps to world
//! `(origin.x + x * cell_size, 0, origin.y + y * cell_size)`.

use glam::{Vec2, Vec3};

use crate::ai::{LayerMask, ObstacleQuery, Probe};
use crate::graph::{Graph, GraphError, NodeId};

/// Neighbour connectivity used when generating a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// Orthogonal neighbours only
    Four,
    /// Orthogonal and diagonal neighbours (no corner cutting)
    Eight,
}

/// A 2D grid of walkable / blocked cells
#[derive(Debug, Clone)]
pub struct Grid {
    /// Width in cells
    pub width: usize,
    /// Height in cells
    pub height: usize,
    /// Cell size in world units
    pub cell_size: f32,
    /// Walkable cells (true = walkable)
    cells: Vec<bool>,
    /// World origin offset
    pub origin: Vec2,
}

impl Grid {
    /// Layer that blocked cells occupy for obstacle queries
    pub const LAYER: LayerMask = LayerMask::STATIC;

    /// Create a new grid (all cells walkable by default)
    #[must_use]
    pub fn new(width: usize, height: usize, cell_size: f32) -> Self {
        Self {
            width,
            height,
            cell_size,
            cells: vec![true; width * height],
            origin: Vec2::ZERO,
        }
    }

    /// Set a cell's walkability
    ///
    /// Out-of-range cells are logged and ignored.
    pub fn set_walkable(&mut self, x: usize, y: usize, walkable: bool) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = walkable;
        } else {
            log::warn!(
                "set_walkable({x}, {y}) outside {}x{} grid, ignored",
                self.width,
                self.height
            );
        }
    }

    /// Check if a cell is walkable (out-of-range cells are not)
    #[must_use]
    pub fn is_walkable(&self, x: usize, y: usize) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.cells[y * self.width + x]
    }

    /// Sample walkability at signed coordinates
    ///
    /// Out-of-range samples log a warning and yield the sentinel `false`.
    #[must_use]
    pub fn sample(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            log::warn!(
                "sample({x}, {y}) outside {}x{} grid, treating as blocked",
                self.width,
                self.height
            );
            return false;
        }
        self.cells[y as usize * self.width + x as usize]
    }

    /// Convert world position to grid coordinates
    #[must_use]
    pub fn world_to_grid(&self, pos: Vec3) -> (i32, i32) {
        let local = Vec2::new(pos.x, pos.z) - self.origin;
        (
            (local.x / self.cell_size).floor() as i32,
            (local.y / self.cell_size).floor() as i32,
        )
    }

    /// Convert grid coordinates to world position (center of cell)
    #[must_use]
    pub fn grid_to_world(&self, x: usize, y: usize) -> Vec3 {
        let flat = self.origin
            + Vec2::new(
                (x as f32 + 0.5) * self.cell_size,
                (y as f32 + 0.5) * self.cell_size,
            );
        Vec3::new(flat.x, 0.0, flat.y)
    }

    fn blocked_at(&self, pos: Vec3) -> bool {
        let (x, y) = self.world_to_grid(pos);
        !self.sample(x, y)
    }

    /// Generate a navigation graph with one node per walkable cell
    ///
    /// Returns the graph and a lookup from cell index (`y * width + x`) to
    /// node id.
    ///
    /// # Errors
    ///
    /// Propagates graph construction errors (none occur on a fresh graph)
    pub fn to_graph(
        &self,
        connectivity: Connectivity,
    ) -> Result<(Graph, Vec<Option<NodeId>>), GraphError> {
        let mut graph = Graph::new();
        let mut lookup = vec![None; self.width * self.height];

        for y in 0..self.height {
            for x in 0..self.width {
                if self.is_walkable(x, y) {
                    lookup[y * self.width + x] = Some(graph.add_node(self.grid_to_world(x, y))?);
                }
            }
        }

        let diagonal = self.cell_size * std::f32::consts::SQRT_2;
        for y in 0..self.height {
            for x in 0..self.width {
                let Some(from) = lookup[y * self.width + x] else {
                    continue;
                };

                // Right and down, edges are added in both directions
                if let Some(to) = self.node_at(&lookup, x + 1, y) {
                    graph.add_bidirectional_edge(from, to, self.cell_size)?;
                }
                if let Some(to) = self.node_at(&lookup, x, y + 1) {
                    graph.add_bidirectional_edge(from, to, self.cell_size)?;
                }

                if connectivity == Connectivity::Eight {
                    // Down-right and down-left, only when both shoulders are open
                    if self.is_walkable(x + 1, y) && self.is_walkable(x, y + 1) {
                        if let Some(to) = self.node_at(&lookup, x + 1, y + 1) {
                            graph.add_bidirectional_edge(from, to, diagonal)?;
                        }
                    }
                    if x > 0 && self.is_walkable(x - 1, y) && self.is_walkable(x, y + 1) {
                        if let Some(to) = self.node_at(&lookup, x - 1, y + 1) {
                            graph.add_bidirectional_edge(from, to, diagonal)?;
                        }
                    }
                }
            }
        }

        log::debug!(
            "generated grid graph: {} nodes, {} edges",
            graph.len(),
            graph.edge_count()
        );
        Ok((graph, lookup))
    }

    fn node_at(&self, lookup: &[Option<NodeId>], x: usize, y: usize) -> Option<NodeId> {
        if x >= self.width || y >= self.height {
            return None;
        }
        lookup[y * self.width + x]
    }
}

impl ObstacleQuery for Grid {
    fn cast(&self, start: Vec3, end: Vec3, probe: &Probe) -> Option<f32> {
        if !probe.layers.intersects(Self::LAYER) {
            return None;
        }

        let delta = Vec3::new(end.x - start.x, 0.0, end.z - start.z);
        let length = delta.length();
        let dir = delta.normalize_or_zero();
        let side = Vec3::new(-dir.z, 0.0, dir.x) * probe.radius;
        let step = (self.cell_size * 0.25).max(f32::EPSILON);
        let samples = (length / step).ceil() as usize;

        (0..=samples)
            .map(|i| (i as f32 * step).min(length))
            .find(|&t| {
                let center = start + dir * t;
                self.blocked_at(center)
                    || self.blocked_at(center + side)
                    || self.blocked_at(center - side)
            })
    }
}
