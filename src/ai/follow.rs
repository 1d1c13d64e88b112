//! Path consumption: edge traversal and path following
//!
//! A [`PathFollower`] hands one segment at a time to its [`EdgeTraverser`].
//! The traverser issues a [`SteeringCommand`] and waits for the movement
//! system to report that the command completed. On a matching completion it
//! fires `TraversalCompleted`, which the follower turns into the next
//! segment or, once the path is exhausted, a queued `FollowCompleted`.
//!
//! ```text
//! SeekCompleted / LinearStopCompleted  (movement system, queued)
//!     -> EdgeTraverser::handle -> TraversalCompleted (fired)
//!         -> PathFollower::handle -> next SteeringCommand
//!                                  | FollowCompleted (queued)
//! ```

use glam::Vec3;
use hecs::Entity;

use crate::ai::path::{Path, QuasiEdge};
use crate::ai::steering::{SteeringCommand, SteeringId, SteeringParams};
use crate::ai::{ObstacleQuery, Probe};
use crate::core::{Notification, Notifications};

/// Steers an agent along a single segment
#[derive(Debug, Clone)]
pub struct EdgeTraverser {
    owner: Entity,
    params: SteeringParams,
    steering: SteeringId,
    edge: Option<QuasiEdge>,
    stopping: bool,
}

impl EdgeTraverser {
    /// Create an idle traverser for `owner`
    #[must_use]
    pub fn new(owner: Entity, params: SteeringParams) -> Self {
        Self {
            owner,
            params,
            steering: SteeringId::next(),
            edge: None,
            stopping: false,
        }
    }

    /// Start moving along `edge`
    ///
    /// With `stop_at_end` the agent brakes on the segment end (arrive),
    /// otherwise it passes through it (seek). Every traversal gets a fresh
    /// steering identity, so completions of an abandoned traversal are
    /// ignored.
    pub fn traverse(&mut self, edge: QuasiEdge, stop_at_end: bool) -> SteeringCommand {
        self.steering = SteeringId::next();
        self.edge = Some(edge);
        self.stopping = stop_at_end;

        if stop_at_end {
            SteeringCommand::arrive(self.owner, self.steering, edge.to, &self.params)
        } else {
            SteeringCommand::seek(self.owner, self.steering, edge.to, &self.params)
        }
    }

    /// React to a steering completion
    ///
    /// Returns `true` and fires `TraversalCompleted` when `event` finishes
    /// the current traversal.
    pub fn handle(&mut self, event: &Notification, bus: &mut Notifications) -> bool {
        if self.edge.is_none() {
            return false;
        }

        let finished = match *event {
            Notification::SeekCompleted { owner, steering } => {
                !self.stopping && owner == self.owner && steering == self.steering
            }
            Notification::LinearStopCompleted { owner, steering } => {
                self.stopping && owner == self.owner && steering == self.steering
            }
            _ => false,
        };

        if finished {
            self.edge = None;
            bus.fire(Notification::TraversalCompleted {
                owner: self.owner,
                steering: self.steering,
            });
        }
        finished
    }

    /// Abandon the current traversal
    pub fn clear(&mut self) {
        self.edge = None;
    }

    /// Segment being traversed
    #[must_use]
    pub fn current(&self) -> Option<&QuasiEdge> {
        self.edge.as_ref()
    }

    /// Identity of the latest steering command
    #[must_use]
    pub fn steering(&self) -> SteeringId {
        self.steering
    }

    /// Check whether a traversal is in progress
    #[must_use]
    pub fn is_traversing(&self) -> bool {
        self.edge.is_some()
    }

    /// Steering tuning
    #[must_use]
    pub fn params(&self) -> &SteeringParams {
        &self.params
    }
}

/// Walks an agent along a [`Path`] segment by segment
#[derive(Debug, Clone)]
pub struct PathFollower {
    owner: Entity,
    traverser: EdgeTraverser,
    path: Option<Path>,
    stop_at_end: bool,
}

impl PathFollower {
    /// Create an idle follower for `owner`
    #[must_use]
    pub fn new(owner: Entity, params: SteeringParams) -> Self {
        Self {
            owner,
            traverser: EdgeTraverser::new(owner, params),
            path: None,
            stop_at_end: true,
        }
    }

    /// Start following `path`
    ///
    /// Returns the steering command for the first segment. An empty path
    /// completes at once (`FollowCompleted` is queued).
    pub fn follow(
        &mut self,
        path: Path,
        stop_at_end: bool,
        bus: &mut Notifications,
    ) -> Option<SteeringCommand> {
        log::debug!("{:?}: following {} segments", self.owner, path.len());
        self.path = Some(path);
        self.stop_at_end = stop_at_end;
        self.advance(bus)
    }

    fn advance(&mut self, bus: &mut Notifications) -> Option<SteeringCommand> {
        let Some(path) = self.path.as_mut() else {
            return None;
        };

        match path.dequeue() {
            Some(edge) => {
                let last = path.is_empty();
                Some(self.traverser.traverse(edge, self.stop_at_end && last))
            }
            None => {
                self.path = None;
                self.traverser.clear();
                bus.queue(Notification::FollowCompleted { owner: self.owner });
                None
            }
        }
    }

    /// React to a notification
    ///
    /// Steering completions are forwarded to the traverser; the resulting
    /// `TraversalCompleted` moves on to the next segment and returns its
    /// steering command.
    pub fn handle(
        &mut self,
        event: &Notification,
        bus: &mut Notifications,
    ) -> Option<SteeringCommand> {
        match *event {
            Notification::TraversalCompleted { owner, steering }
                if owner == self.owner && steering == self.traverser.steering() =>
            {
                self.advance(bus)
            }
            Notification::SeekCompleted { .. } | Notification::LinearStopCompleted { .. } => {
                self.traverser.handle(event, bus);
                None
            }
            _ => None,
        }
    }

    /// Skip segments whose end is already visible from `position`
    ///
    /// Returns a replacement steering command when the current traversal was
    /// cut short.
    pub fn smooth<Q>(
        &mut self,
        position: Vec3,
        obstacles: &Q,
        probe: &Probe,
    ) -> Option<SteeringCommand>
    where
        Q: ObstacleQuery + ?Sized,
    {
        if !self.traverser.is_traversing() {
            return None;
        }
        let path = self.path.as_mut()?;
        let next = path.peek()?.to;
        if !obstacles.can_move_between(position, next, probe) {
            return None;
        }

        path.replace_quasi_edge(0, QuasiEdge::shortcut(position, next));
        let merged = path.smooth(position, obstacles, probe);
        log::trace!("{:?}: smoothed away {} segments", self.owner, merged + 1);

        let edge = path.dequeue()?;
        let last = path.is_empty();
        Some(self.traverser.traverse(edge, self.stop_at_end && last))
    }

    /// Stop following; no completion is raised
    pub fn cancel(&mut self) {
        self.path = None;
        self.traverser.clear();
    }

    /// Check whether a path is being followed
    #[must_use]
    pub fn is_following(&self) -> bool {
        self.path.is_some()
    }

    /// Segments not yet started
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.path.as_ref().map_or(0, Path::len)
    }

    /// Segment being traversed
    #[must_use]
    pub fn current_edge(&self) -> Option<&QuasiEdge> {
        self.traverser.current()
    }

    /// Underlying traverser
    #[must_use]
    pub fn traverser(&self) -> &EdgeTraverser {
        &self.traverser
    }

    /// Remaining path
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_ref()
    }
}
