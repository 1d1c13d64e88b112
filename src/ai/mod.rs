//! Path planning and following
//!
//! Provides the cycle-limited searches, the per-agent planner and its
//! round-robin scheduler, the all-pairs next-hop table, and the event-driven
//! path follower with its steering and navigation state machine.

mod best_path;
mod follow;
mod fsm;
mod manager;
mod navigator;
mod path;
mod planner;
mod query;
mod queue;
mod search;
mod steering;

pub use best_path::{BestPathEntry, BestPathTable, TableError};
pub use follow::{EdgeTraverser, PathFollower};
pub use fsm::{
    AwaitingPathState, BlockedState, FollowingPathState, IdleState, NavContext, NavIntent, State,
    StateMachine, Transition,
};
pub use manager::{PathManager, ScheduleReport};
pub use navigator::Navigator;
pub use path::{Path, PathVisualizer, QuasiEdge};
pub use planner::{PathPlanner, PlanError, PlanOutcome, PlannerId};
pub use query::{LayerMask, ObstacleQuery, OpenSpace, Probe, SphereObstacles};
pub use queue::{HeapOrder, MappedPriorityQueue};
pub use search::{
    AStar, AStarSearch, CycleLimitedSearch, Dijkstra, DijkstraSearch, Heuristic, PathData, Search,
    SearchState, SearchStatus, SearchStep, SearchStrategy,
};
pub use steering::{
    Arrive, Seek, SteeringBehavior, SteeringCommand, SteeringId, SteeringKind, SteeringOutput,
    SteeringParams,
};
