//! Cooperative pathfinding for game agents
//!
//! This crate provides:
//! - Cycle-limited A* and Dijkstra searches that resume across ticks
//! - A round-robin path manager that shares a per-tick search budget
//! - Precomputed all-pairs next-hop tables
//! - Event-driven path following with seek/arrive steering
//! - A two-tier (immediate / deferred) notification bus

pub mod ai;
pub mod core;
pub mod graph;

// Re-exports for convenience
pub use glam;
pub use hecs;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::ai::{
        AStarSearch, BestPathTable, DijkstraSearch, Heuristic, LayerMask, MappedPriorityQueue,
        Navigator, ObstacleQuery, OpenSpace, Path, PathFollower, PathManager, PathPlanner,
        PlanError, PlanOutcome, PlannerId, Probe, QuasiEdge, Search, SearchStatus,
        SteeringBehavior, SteeringCommand,
    };
    pub use crate::core::{AiConfig, AiRuntime, Notification, Notifications, TickReport};
    pub use crate::graph::{Connectivity, Graph, Grid, NodeId};
    pub use glam::{Vec2, Vec3};
    pub use hecs::{Entity, World};
}
