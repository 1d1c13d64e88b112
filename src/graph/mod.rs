//! Navigation graph module
//!
//! Graph data model searched by the pathfinding core, plus a grid used to
//! generate graphs procedurally.

mod grid;
mod model;

pub use grid::{Connectivity, Grid};
pub use model::{Edge, Graph, GraphError, Node, NodeId};
