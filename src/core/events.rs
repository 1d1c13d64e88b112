//! Notification bus for decoupled path and traversal events
//!
//! Planners, traversers and followers never call their consumers directly.
//! They publish [`Notification`]s on a [`Notifications`] bus, which delivers
//! them in one of two tiers:
//!
//! - **Immediate** (`fire`): delivered within the current dispatch pass,
//!   ahead of anything else.
//! - **Deferred** (`queue`): double-buffered, delivered no earlier than the
//!   tick after it was raised (after the next `swap()`).
//!
//! # Example
//!
//! ```ignore
//! // Tick N: a planner finishes
//! bus.queue(Notification::PathReady { owner, planner, request });
//!
//! // Tick N+1
//! bus.swap();
//! while let Some(event) = bus.poll() {
//!     // Handlers may `fire` follow-ups, which are polled next
//!     navigator.handle(&event, &mut bus);
//! }
//! ```

use std::collections::VecDeque;

use hecs::Entity;

use crate::ai::{PlannerId, SteeringId};

// ============================================================================
// Notification Types
// ============================================================================

/// Events exchanged between the path-planning and path-following layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Notification {
    // -------------------------------------------------------------------------
    // Planning
    // -------------------------------------------------------------------------
    /// A planner has a path ready to collect
    PathReady {
        /// Agent that owns the planner
        owner: Entity,
        /// Planner holding the path
        planner: PlannerId,
        /// Request the path answers
        request: u32,
    },

    /// A planner's request ended without a path
    PathUnavailable {
        /// Agent that owns the planner
        owner: Entity,
        /// Planner that failed
        planner: PlannerId,
        /// Request that failed
        request: u32,
    },

    // -------------------------------------------------------------------------
    // Steering (raised by the movement system)
    // -------------------------------------------------------------------------
    /// A seek behaviour reached its target
    SeekCompleted {
        /// Steered agent
        owner: Entity,
        /// Behaviour identity
        steering: SteeringId,
    },

    /// An arrive behaviour came to a stop at its target
    LinearStopCompleted {
        /// Steered agent
        owner: Entity,
        /// Behaviour identity
        steering: SteeringId,
    },

    // -------------------------------------------------------------------------
    // Following
    // -------------------------------------------------------------------------
    /// An edge traverser finished its current edge
    TraversalCompleted {
        /// Traversing agent
        owner: Entity,
        /// Identity of the traverser's steering behaviour
        steering: SteeringId,
    },

    /// A follower consumed its whole path
    FollowCompleted {
        /// Agent that finished following
        owner: Entity,
    },
}

impl Notification {
    /// Agent the notification concerns
    #[must_use]
    pub fn owner(&self) -> Entity {
        match *self {
            Self::PathReady { owner, .. }
            | Self::PathUnavailable { owner, .. }
            | Self::SeekCompleted { owner, .. }
            | Self::LinearStopCompleted { owner, .. }
            | Self::TraversalCompleted { owner, .. }
            | Self::FollowCompleted { owner } => owner,
        }
    }
}

// ============================================================================
// Notification Bus
// ============================================================================

/// Two-tier notification bus: immediate queue plus double-buffered deferred
/// queue.
///
/// Deferred notifications that are not polled during their tick are
/// discarded by the next `swap()`.
#[derive(Debug)]
pub struct Notifications {
    /// Delivered in the current dispatch pass
    immediate: VecDeque<Notification>,
    /// Raised this tick, delivered next tick
    pending: VecDeque<Notification>,
    /// Raised last tick, being delivered now
    ready: VecDeque<Notification>,
}

impl Notifications {
    /// Default initial capacity for each queue.
    const DEFAULT_CAPACITY: usize = 32;

    /// Create an empty bus
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create an empty bus with the given per-queue capacity
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            immediate: VecDeque::with_capacity(capacity),
            pending: VecDeque::with_capacity(capacity),
            ready: VecDeque::with_capacity(capacity),
        }
    }

    /// Deliver `event` within the current dispatch pass
    #[inline]
    pub fn fire(&mut self, event: Notification) {
        self.immediate.push_back(event);
    }

    /// Deliver `event` on the next tick
    #[inline]
    pub fn queue(&mut self, event: Notification) {
        self.pending.push_back(event);
    }

    /// Advance to the next tick: last tick's deferred events become ready
    ///
    /// Call once per tick, before polling.
    pub fn swap(&mut self) {
        if !self.ready.is_empty() {
            log::trace!("discarding {} unpolled notifications", self.ready.len());
        }
        std::mem::swap(&mut self.pending, &mut self.ready);
        self.pending.clear();
    }

    /// Take the next deliverable event, immediate ones first
    pub fn poll(&mut self) -> Option<Notification> {
        self.immediate
            .pop_front()
            .or_else(|| self.ready.pop_front())
    }

    /// Iterate deliverable events without consuming them
    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.immediate.iter().chain(self.ready.iter())
    }

    /// Check if nothing is deliverable right now
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.immediate.is_empty() && self.ready.is_empty()
    }

    /// Number of events deliverable right now
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.immediate.len() + self.ready.len()
    }

    /// Number of events waiting for the next tick
    #[must_use]
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop every queued event
    pub fn clear(&mut self) {
        self.immediate.clear();
        self.pending.clear();
        self.ready.clear();
    }
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
