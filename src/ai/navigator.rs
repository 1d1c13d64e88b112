//! Per-agent navigation glue
//!
//! A [`Navigator`] ties one agent's planner (owned by the [`PathManager`]),
//! its [`PathFollower`] and the navigation state machine together. The game
//! calls [`Navigator::update`] once per tick and routes every polled
//! notification through [`Navigator::handle`]. Both return the steering
//! command the agent should switch to, if it changed.

use glam::Vec3;
use hecs::Entity;

use crate::ai::follow::PathFollower;
use crate::ai::fsm::{IdleState, NavContext, NavIntent, StateMachine};
use crate::ai::manager::PathManager;
use crate::ai::planner::{PathPlanner, PlanError, PlannerId};
use crate::ai::steering::SteeringCommand;
use crate::ai::{ObstacleQuery, Probe};
use crate::core::{AiConfig, Notification, Notifications};
use crate::graph::Graph;

/// Drives one agent from request to arrival
#[derive(Debug)]
pub struct Navigator {
    owner: Entity,
    planner: PlannerId,
    /// Request whose outcome is being waited for
    awaiting: Option<u32>,
    follower: PathFollower,
    machine: StateMachine<NavContext>,
    context: NavContext,
    probe: Probe,
    smooth_paths: bool,
    stop_at_end: bool,
}

impl Navigator {
    /// Create a navigator for `owner`, registering a planner with `manager`
    pub fn new(owner: Entity, manager: &mut PathManager, config: &AiConfig) -> Self {
        Self {
            owner,
            planner: manager.create_planner(owner),
            awaiting: None,
            follower: PathFollower::new(owner, config.steering),
            machine: StateMachine::new(IdleState),
            context: NavContext::new(config.retry_delay),
            probe: config.probe,
            smooth_paths: config.smooth_paths,
            stop_at_end: config.stop_at_end,
        }
    }

    /// Agent this navigator steers
    #[must_use]
    pub fn owner(&self) -> Entity {
        self.owner
    }

    /// Planner registered for this agent
    #[must_use]
    pub fn planner(&self) -> PlannerId {
        self.planner
    }

    /// Name of the current navigation state
    #[must_use]
    pub fn state(&self) -> &'static str {
        self.machine.current_state_name()
    }

    /// Destination being pursued
    #[must_use]
    pub fn destination(&self) -> Option<Vec3> {
        self.context.destination
    }

    /// Destinations reached so far
    #[must_use]
    pub fn arrivals(&self) -> u32 {
        self.context.arrivals
    }

    /// Failed requests so far
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.context.failures
    }

    /// Underlying follower
    #[must_use]
    pub fn follower(&self) -> &PathFollower {
        &self.follower
    }

    /// Head for `destination`; the request goes out on the next update
    pub fn set_destination(&mut self, destination: Vec3) {
        self.context.destination = Some(destination);
        self.context.new_destination = true;
    }

    /// Give up on the current destination
    pub fn stop(&mut self, manager: &mut PathManager) {
        self.context.destination = None;
        self.context.new_destination = false;
        self.halt(manager);
        self.machine.transition(&mut self.context, IdleState);
    }

    fn halt(&mut self, manager: &mut PathManager) {
        self.awaiting = None;
        manager.cancel(self.planner);
        self.follower.cancel();
    }

    /// Advance the state machine and carry out what it asks for
    pub fn update<Q>(
        &mut self,
        delta_time: f32,
        position: Vec3,
        graph: &Graph,
        obstacles: &Q,
        manager: &mut PathManager,
        bus: &mut Notifications,
    ) -> Option<SteeringCommand>
    where
        Q: ObstacleQuery + ?Sized,
    {
        self.context.delta_time = delta_time;
        self.machine.update(&mut self.context);

        let command = match self.context.intent.take() {
            Some(NavIntent::RequestPath(destination)) => {
                self.follower.cancel();
                let result = manager.request_path(
                    self.planner,
                    graph,
                    obstacles,
                    position,
                    destination,
                    bus,
                );
                self.awaiting = manager.planner(self.planner).map(PathPlanner::request);
                if let Err(error) = result {
                    log::debug!("{:?}: path request failed: {error}", self.owner);
                    // The planner reports everything except a missing registration
                    if matches!(error, PlanError::UnknownPlanner(_)) {
                        self.context.path_failed = true;
                    }
                }
                None
            }
            Some(NavIntent::FollowPath) => {
                let path = manager
                    .planner_mut(self.planner)
                    .and_then(|planner| planner.take_path());
                match path {
                    Some(path) => self.follower.follow(path, self.stop_at_end, bus),
                    None => {
                        log::warn!("{:?}: path ready but nothing to collect", self.owner);
                        self.context.path_failed = true;
                        None
                    }
                }
            }
            Some(NavIntent::Stop) => {
                self.halt(manager);
                None
            }
            None => None,
        };

        if command.is_some() || !self.smooth_paths {
            return command;
        }
        self.follower.smooth(position, obstacles, &self.probe)
    }

    /// Route a notification to this navigator
    ///
    /// Notifications about other agents, and outcomes of requests that
    /// have since been replaced or cancelled, are ignored.
    pub fn handle(
        &mut self,
        event: &Notification,
        bus: &mut Notifications,
    ) -> Option<SteeringCommand> {
        if event.owner() != self.owner {
            return None;
        }

        match *event {
            Notification::PathReady { planner, request, .. } if planner == self.planner => {
                if self.awaiting == Some(request) {
                    self.context.path_ready = true;
                }
                None
            }
            Notification::PathUnavailable { planner, request, .. }
                if planner == self.planner =>
            {
                if self.awaiting == Some(request) {
                    self.context.path_failed = true;
                }
                None
            }
            Notification::FollowCompleted { .. } => {
                self.context.follow_done = true;
                None
            }
            _ => self.follower.handle(event, bus),
        }
    }

    /// Release the planner
    pub fn destroy(self, manager: &mut PathManager) {
        manager.destroy_planner(self.planner);
    }
}
