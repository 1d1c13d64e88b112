//! Steering behaviors used to drive agents along path edges
//!
//! Edge traversal issues either a [`Seek`] (pass through the waypoint) or an
//! [`Arrive`] (brake to a stop on it). Each command carries the
//! [`SteeringId`] of the traverser that issued it, so the movement system can
//! report completion back with a matching notification.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec3;
use hecs::Entity;
use serde::{Deserialize, Serialize};

use crate::core::Notification;

/// Global counter for generating unique steering ids
static NEXT_STEERING_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a steering behaviour instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SteeringId(u64);

impl SteeringId {
    /// Allocate a fresh id
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_STEERING_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SteeringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "steer#{}", self.0)
    }
}

/// Output from a steering behavior
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SteeringOutput {
    /// Linear acceleration
    pub linear: Vec3,
}

/// Trait for steering behaviors
pub trait SteeringBehavior {
    /// Calculate steering based on agent state
    fn calculate(&self, position: Vec3, velocity: Vec3) -> SteeringOutput;
}

fn clamp_acceleration(acceleration: Vec3, max: f32) -> SteeringOutput {
    SteeringOutput {
        linear: acceleration.clamp_length_max(max),
    }
}

/// Tuning shared by the behaviours an edge traverser issues
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringParams {
    /// Maximum acceleration
    pub max_acceleration: f32,
    /// Maximum speed
    pub max_speed: f32,
    /// Distance at which arrive starts slowing down
    pub slow_radius: f32,
    /// Distance at which arrive considers itself on target
    pub target_radius: f32,
    /// Distance at which seek considers a waypoint passed
    pub seek_radius: f32,
    /// Speed under which an arriving agent counts as stopped
    pub stop_speed: f32,
}

impl Default for SteeringParams {
    fn default() -> Self {
        Self {
            max_acceleration: 20.0,
            max_speed: 4.0,
            slow_radius: 2.0,
            target_radius: 0.1,
            seek_radius: 0.3,
            stop_speed: 0.05,
        }
    }
}

/// Seek behavior - head for the target at full speed
#[derive(Debug, Clone)]
pub struct Seek {
    /// Target position
    pub target: Vec3,
    /// Maximum acceleration
    pub max_acceleration: f32,
    /// Desired cruising speed
    pub max_speed: f32,
}

impl Seek {
    /// Create a new seek behavior
    #[must_use]
    pub fn new(target: Vec3, max_acceleration: f32, max_speed: f32) -> Self {
        Self {
            target,
            max_acceleration,
            max_speed,
        }
    }
}

impl SteeringBehavior for Seek {
    fn calculate(&self, position: Vec3, velocity: Vec3) -> SteeringOutput {
        let desired = (self.target - position).normalize_or_zero() * self.max_speed;
        clamp_acceleration(desired - velocity, self.max_acceleration)
    }
}

/// Arrive behavior - move towards target, slow down and brake to a stop
#[derive(Debug, Clone)]
pub struct Arrive {
    /// Target position
    pub target: Vec3,
    /// Maximum acceleration
    pub max_acceleration: f32,
    /// Maximum speed
    pub max_speed: f32,
    /// Slowing distance
    pub slow_radius: f32,
    /// Stopping distance
    pub target_radius: f32,
}

impl Arrive {
    /// Create a new arrive behavior
    #[must_use]
    pub fn new(target: Vec3, max_acceleration: f32, max_speed: f32) -> Self {
        Self {
            target,
            max_acceleration,
            max_speed,
            slow_radius: 5.0,
            target_radius: 0.5,
        }
    }
}

impl SteeringBehavior for Arrive {
    fn calculate(&self, position: Vec3, velocity: Vec3) -> SteeringOutput {
        let to_target = self.target - position;
        let distance = to_target.length();

        // On target: cancel the remaining velocity
        if distance < self.target_radius {
            return clamp_acceleration(-velocity, self.max_acceleration);
        }

        let target_speed = if distance > self.slow_radius {
            self.max_speed
        } else {
            self.max_speed * distance / self.slow_radius
        };

        let target_velocity = to_target.normalize_or_zero() * target_speed;
        clamp_acceleration(target_velocity - velocity, self.max_acceleration)
    }
}

/// Behaviour selected by a [`SteeringCommand`]
#[derive(Debug, Clone)]
pub enum SteeringKind {
    /// Pass through the target
    Seek(Seek),
    /// Stop on the target
    Arrive(Arrive),
}

/// A steering order for one agent, tagged with the issuing identity
#[derive(Debug, Clone)]
pub struct SteeringCommand {
    /// Steered agent
    pub owner: Entity,
    /// Identity reported back on completion
    pub id: SteeringId,
    /// Behaviour to run
    pub kind: SteeringKind,
    /// Distance at which a seek is complete
    pub seek_radius: f32,
    /// Speed under which an arrive is complete
    pub stop_speed: f32,
}

impl SteeringCommand {
    /// Seek through `target`
    #[must_use]
    pub fn seek(owner: Entity, id: SteeringId, target: Vec3, params: &SteeringParams) -> Self {
        Self {
            owner,
            id,
            kind: SteeringKind::Seek(Seek::new(
                target,
                params.max_acceleration,
                params.max_speed,
            )),
            seek_radius: params.seek_radius,
            stop_speed: params.stop_speed,
        }
    }

    /// Arrive and stop at `target`
    #[must_use]
    pub fn arrive(owner: Entity, id: SteeringId, target: Vec3, params: &SteeringParams) -> Self {
        let mut arrive = Arrive::new(target, params.max_acceleration, params.max_speed);
        arrive.slow_radius = params.slow_radius;
        arrive.target_radius = params.target_radius;
        Self {
            owner,
            id,
            kind: SteeringKind::Arrive(arrive),
            seek_radius: params.seek_radius,
            stop_speed: params.stop_speed,
        }
    }

    /// Target position of the behaviour
    #[must_use]
    pub fn target(&self) -> Vec3 {
        match &self.kind {
            SteeringKind::Seek(seek) => seek.target,
            SteeringKind::Arrive(arrive) => arrive.target,
        }
    }

    /// Check whether this is a stopping behaviour
    #[must_use]
    pub fn is_arrive(&self) -> bool {
        matches!(self.kind, SteeringKind::Arrive(_))
    }

    /// Completion notification once the agent has done what was asked
    ///
    /// Movement systems call this after integrating and raise the result.
    #[must_use]
    pub fn completion(&self, position: Vec3, velocity: Vec3) -> Option<Notification> {
        match &self.kind {
            SteeringKind::Seek(seek) => (position.distance(seek.target) <= self.seek_radius)
                .then_some(Notification::SeekCompleted {
                    owner: self.owner,
                    steering: self.id,
                }),
            SteeringKind::Arrive(arrive) => (position.distance(arrive.target)
                <= arrive.target_radius
                && velocity.length() <= self.stop_speed)
                .then_some(Notification::LinearStopCompleted {
                    owner: self.owner,
                    steering: self.id,
                }),
        }
    }
}

impl SteeringBehavior for SteeringCommand {
    fn calculate(&self, position: Vec3, velocity: Vec3) -> SteeringOutput {
        match &self.kind {
            SteeringKind::Seek(seek) => seek.calculate(position, velocity),
            SteeringKind::Arrive(arrive) => arrive.calculate(position, velocity),
        }
    }
}
