//! Per-agent path planner
//!
//! A planner owns at most one search at a time. Each request replaces the
//! previous search wholesale; partial progress is abandoned. A request first
//! tries a direct line of sight and only falls back to a graph search when
//! the way is blocked.

use std::fmt;

use glam::Vec3;
use hecs::Entity;

use crate::ai::path::{Path, QuasiEdge};
use crate::ai::search::{AStarSearch, DijkstraSearch, Heuristic, Search, SearchState, SearchStatus};
use crate::ai::{ObstacleQuery, Probe};
use crate::core::{Notification, Notifications};
use crate::graph::{Edge, Graph, Node, NodeId};

/// Distance under which connector segments are left out
const CONNECTOR_EPSILON: f32 = 1e-3;

/// Identifier of a planner registered with a path manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlannerId(pub u32);

impl fmt::Display for PlannerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "planner#{}", self.0)
    }
}

/// How a request was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanOutcome {
    /// Clear line of sight, path ready without searching
    Direct,
    /// Graph search started, needs cycling
    Searching,
}

/// Expected failures of a path request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    /// The graph has no nodes
    EmptyGraph,
    /// No node is visible from the start position
    NoNodeNearSource,
    /// No node is visible from the destination
    NoNodeNearDestination,
    /// The planner id is not registered
    UnknownPlanner(PlannerId),
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyGraph => write!(f, "navigation graph is empty"),
            Self::NoNodeNearSource => write!(f, "no reachable graph node near the source"),
            Self::NoNodeNearDestination => {
                write!(f, "no reachable graph node near the destination")
            }
            Self::UnknownPlanner(id) => write!(f, "unknown {id}"),
        }
    }
}

impl std::error::Error for PlanError {}

/// Plans paths for one agent
pub struct PathPlanner {
    id: PlannerId,
    owner: Entity,
    probe: Probe,
    heuristic: Heuristic,
    search: Option<Box<dyn Search>>,
    /// Bumped on every request, stamped on its notifications
    request: u32,
    origin: Vec3,
    /// `None` for "nearest matching node" requests
    destination: Option<Vec3>,
    path: Option<Path>,
}

impl PathPlanner {
    /// Create a planner for `owner`
    #[must_use]
    pub fn new(id: PlannerId, owner: Entity, probe: Probe, heuristic: Heuristic) -> Self {
        Self {
            id,
            owner,
            probe,
            heuristic,
            search: None,
            request: 0,
            origin: Vec3::ZERO,
            destination: None,
            path: None,
        }
    }

    /// Planner id
    #[must_use]
    pub fn id(&self) -> PlannerId {
        self.id
    }

    /// Agent this planner works for
    #[must_use]
    pub fn owner(&self) -> Entity {
        self.owner
    }

    /// Sequence number of the latest request (0 before the first)
    #[must_use]
    pub fn request(&self) -> u32 {
        self.request
    }

    /// Probe used for line-of-sight checks
    #[must_use]
    pub fn probe(&self) -> &Probe {
        &self.probe
    }

    /// Replace the line-of-sight probe
    pub fn set_probe(&mut self, probe: Probe) {
        self.probe = probe;
    }

    /// Request a path from `from` to `to`
    ///
    /// On [`PlanOutcome::Direct`] the path is ready immediately and a
    /// `PathReady` notification is queued. On [`PlanOutcome::Searching`] the
    /// planner must be cycled (usually by a path manager) until it finishes.
    ///
    /// # Errors
    ///
    /// Returns a [`PlanError`] (and queues `PathUnavailable`) when the graph
    /// is empty or no node is visible from either end.
    pub fn request_path_to_position<Q>(
        &mut self,
        graph: &Graph,
        obstacles: &Q,
        from: Vec3,
        to: Vec3,
        bus: &mut Notifications,
    ) -> Result<PlanOutcome, PlanError>
    where
        Q: ObstacleQuery + ?Sized,
    {
        self.begin_request();
        self.origin = from;
        self.destination = Some(to);

        if obstacles.can_move_between(from, to, &self.probe) {
            log::debug!("{}: direct path {from} -> {to}", self.id);
            self.path = Some(Path::direct(from, to));
            bus.queue(Notification::PathReady {
                owner: self.owner,
                planner: self.id,
                request: self.request,
            });
            return Ok(PlanOutcome::Direct);
        }

        let source = self.locate(graph, obstacles, from, PlanError::NoNodeNearSource, bus)?;
        let target = self.locate(graph, obstacles, to, PlanError::NoNodeNearDestination, bus)?;

        log::debug!("{}: searching {source} -> {target}", self.id);
        self.search = Some(Box::new(AStarSearch::with_heuristic(
            graph,
            source,
            target,
            self.heuristic,
        )));
        Ok(PlanOutcome::Searching)
    }

    /// Request a path to the cheapest node matching `goal`
    ///
    /// Used for "nearest item of type" queries, where the destination is
    /// not known in advance.
    ///
    /// # Errors
    ///
    /// Returns a [`PlanError`] (and queues `PathUnavailable`) when the graph
    /// is empty or no node is visible from `from`.
    pub fn request_path_to_nearest<Q, F>(
        &mut self,
        graph: &Graph,
        obstacles: &Q,
        from: Vec3,
        goal: F,
        bus: &mut Notifications,
    ) -> Result<PlanOutcome, PlanError>
    where
        Q: ObstacleQuery + ?Sized,
        F: Fn(&Node) -> bool + 'static,
    {
        self.begin_request();
        self.origin = from;

        let source = self.locate(graph, obstacles, from, PlanError::NoNodeNearSource, bus)?;

        log::debug!("{}: searching nearest match from {source}", self.id);
        self.search = Some(Box::new(DijkstraSearch::dijkstra(graph, source, goal)));
        Ok(PlanOutcome::Searching)
    }

    fn locate<Q>(
        &self,
        graph: &Graph,
        obstacles: &Q,
        location: Vec3,
        missing: PlanError,
        bus: &mut Notifications,
    ) -> Result<NodeId, PlanError>
    where
        Q: ObstacleQuery + ?Sized,
    {
        let found = if graph.is_empty() {
            Err(PlanError::EmptyGraph)
        } else {
            graph
                .closest_node(location, |node| {
                    obstacles.can_move_between(location, node, &self.probe)
                })
                .ok_or(missing)
        };

        if let Err(error) = found {
            log::debug!("{}: request failed: {error}", self.id);
            self.notify_unavailable(bus);
        }
        found
    }

    /// Advance the current search by one cycle
    ///
    /// On success the solution is packaged into a [`Path`] and `PathReady`
    /// is queued; on failure `PathUnavailable` is queued. Calling this with
    /// no search in flight reports failure.
    pub fn cycle_once(&mut self, graph: &Graph, bus: &mut Notifications) -> SearchStatus {
        let Some(search) = self.search.as_mut() else {
            log::warn!("{}: cycled without a search", self.id);
            return SearchStatus::Failure;
        };

        let step = search.do_search(graph, Some(1));
        match step.status {
            SearchStatus::Running => {}
            SearchStatus::Success => {
                let solution = search.solution().to_vec();
                let reached = search.reached();
                self.path = Some(self.build_path(graph, &solution, reached));
                bus.queue(Notification::PathReady {
                    owner: self.owner,
                    planner: self.id,
                    request: self.request,
                });
            }
            SearchStatus::Failure => self.notify_unavailable(bus),
        }
        step.status
    }

    fn notify_unavailable(&self, bus: &mut Notifications) {
        bus.queue(Notification::PathUnavailable {
            owner: self.owner,
            planner: self.id,
            request: self.request,
        });
    }

    /// Package solution edges with connectors to the agent and destination
    fn build_path(&self, graph: &Graph, solution: &[Edge], reached: Option<NodeId>) -> Path {
        let mut path = Path::new();

        let first = solution
            .first()
            .map(|e| e.from)
            .or(reached)
            .and_then(|id| graph.node(id))
            .map(Node::position);

        if let Some(first) = first {
            if self.origin.distance(first) > CONNECTOR_EPSILON {
                path.push(QuasiEdge::shortcut(self.origin, first));
            }
        }

        for edge in solution {
            if let Some(quasi) = QuasiEdge::from_edge(graph, *edge) {
                path.push(quasi);
            }
        }

        let last = path.destination().or(first);
        if let (Some(last), Some(destination)) = (last, self.destination) {
            if last.distance(destination) > CONNECTOR_EPSILON {
                path.push(QuasiEdge::shortcut(last, destination));
            }
        }

        path
    }

    /// Abandon the current request
    ///
    /// Returns `true` if a search was in flight.
    pub fn cancel(&mut self) -> bool {
        let was_searching = self.is_searching();
        self.reset();
        was_searching
    }

    fn begin_request(&mut self) {
        self.reset();
        self.request = self.request.wrapping_add(1);
    }

    fn reset(&mut self) {
        self.search = None;
        self.path = None;
        self.destination = None;
    }

    /// Take the finished path, leaving the planner empty-handed
    pub fn take_path(&mut self) -> Option<Path> {
        self.path.take()
    }

    /// Finished path, if any
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }

    /// State of the current search
    #[must_use]
    pub fn search_state(&self) -> Option<SearchState> {
        self.search.as_ref().map(|s| s.state())
    }

    /// Current search object
    #[must_use]
    pub fn search(&self) -> Option<&dyn Search> {
        self.search.as_deref()
    }

    /// Check whether a search is in flight
    #[must_use]
    pub fn is_searching(&self) -> bool {
        self.search_state().is_some_and(|state| !state.is_terminal())
    }

    /// Destination of the current position request
    #[must_use]
    pub fn destination(&self) -> Option<Vec3> {
        self.destination
    }
}

impl fmt::Debug for PathPlanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathPlanner")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .field("search", &self.search_state())
            .field("destination", &self.destination)
            .field("has_path", &self.path.is_some())
            .finish()
    }
}
