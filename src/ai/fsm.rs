//! Finite state machine for agent navigation
//!
//! A small generic state machine (enter/update/exit) plus the navigation
//! states a [`Navigator`](crate::ai::Navigator) runs on it:
//!
//! ```text
//!            set_destination            PathReady
//!   Idle ──────────────────▶ AwaitingPath ─────────▶ FollowingPath
//!    ▲                          │   ▲                     │
//!    │                PathUnav. │   │ retry_delay         │ FollowCompleted
//!    │                          ▼   │                     │
//!    │                        Blocked                     │
//!    └────────────────────────────────────────────────────┘
//! ```
//!
//! States never touch the planner or follower themselves. They read the
//! flags the navigator sets on [`NavContext`] and leave a [`NavIntent`]
//! for the navigator to carry out.

use std::fmt;

use glam::Vec3;

// ============================================================================
// State Trait
// ============================================================================

/// A state in the finite state machine.
///
/// The lifecycle is:
///
/// 1. `enter()` - Called once when entering this state
/// 2. `update()` - Called each tick while in this state
/// 3. `exit()` - Called once when leaving this state
pub trait State<Ctx = ()>: fmt::Debug {
    /// State name for debugging and logging.
    fn name(&self) -> &'static str;

    /// Called when entering this state.
    fn enter(&mut self, _ctx: &mut Ctx) {}

    /// Called each tick while in this state.
    ///
    /// Returns a `Transition` to indicate whether to stay or change states.
    fn update(&mut self, ctx: &mut Ctx) -> Transition<Ctx>;

    /// Called when exiting this state.
    fn exit(&mut self, _ctx: &mut Ctx) {}
}

// ============================================================================
// Transition
// ============================================================================

/// Represents a state transition decision.
pub enum Transition<Ctx = ()> {
    /// Stay in the current state.
    None,
    /// Transition to a new state.
    To(Box<dyn State<Ctx>>),
}

impl<Ctx> Transition<Ctx> {
    /// Create a transition to a new state.
    pub fn to<S: State<Ctx> + 'static>(state: S) -> Self {
        Transition::To(Box::new(state))
    }
}

impl<Ctx> fmt::Debug for Transition<Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::None => write!(f, "Transition::None"),
            Transition::To(state) => write!(f, "Transition::To({})", state.name()),
        }
    }
}

// ============================================================================
// State Machine
// ============================================================================

/// A finite state machine that manages state transitions.
///
/// # Type Parameters
///
/// - `Ctx`: Context type passed to state methods
pub struct StateMachine<Ctx = ()> {
    /// Current active state
    current: Box<dyn State<Ctx>>,
    /// Whether enter() has been called on current state
    entered: bool,
}

impl<Ctx> StateMachine<Ctx> {
    /// Create a new state machine with an initial state.
    ///
    /// The initial state's `enter()` will be called on the first `update()`.
    pub fn new<S: State<Ctx> + 'static>(initial: S) -> Self {
        Self {
            current: Box::new(initial),
            entered: false,
        }
    }

    /// Update the state machine.
    ///
    /// Calls `enter()` on first update, then `update()` each tick.
    /// Handles transitions by calling `exit()` on old state and `enter()` on new.
    /// Returns `true` if the state changed.
    pub fn update(&mut self, ctx: &mut Ctx) -> bool {
        if !self.entered {
            self.current.enter(ctx);
            self.entered = true;
        }

        match self.current.update(ctx) {
            Transition::None => false,
            Transition::To(mut new_state) => {
                log::trace!("{} -> {}", self.current.name(), new_state.name());
                self.current.exit(ctx);
                new_state.enter(ctx);
                self.current = new_state;
                true
            }
        }
    }

    /// Force a transition to a new state.
    ///
    /// Immediately exits the current state and enters the new one.
    pub fn transition<S: State<Ctx> + 'static>(&mut self, ctx: &mut Ctx, new_state: S) {
        if self.entered {
            self.current.exit(ctx);
        }

        self.current = Box::new(new_state);
        self.current.enter(ctx);
        self.entered = true;
    }

    /// Get the name of the current state.
    #[must_use]
    pub fn current_state_name(&self) -> &'static str {
        self.current.name()
    }

    /// Check if the FSM is in a state with the given name.
    #[must_use]
    pub fn is_in_state(&self, name: &str) -> bool {
        self.current.name() == name
    }
}

impl<Ctx> fmt::Debug for StateMachine<Ctx> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("current", &self.current.name())
            .field("entered", &self.entered)
            .finish()
    }
}

// ============================================================================
// Navigation States
// ============================================================================

/// Work a navigation state asks its navigator to do
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NavIntent {
    /// Issue a path request to this destination
    RequestPath(Vec3),
    /// Collect the finished path and start following it
    FollowPath,
    /// Drop any request or path in progress
    Stop,
}

/// Blackboard shared by the navigation states
#[derive(Debug, Default)]
pub struct NavContext {
    /// Seconds since the last update
    pub delta_time: f32,
    /// Where the agent wants to go
    pub destination: Option<Vec3>,
    /// A destination was set since the last update
    pub new_destination: bool,
    /// The planner reported a path
    pub path_ready: bool,
    /// The planner reported failure
    pub path_failed: bool,
    /// The follower consumed the whole path
    pub follow_done: bool,
    /// Seconds to wait before retrying a failed request
    pub retry_delay: f32,
    /// Pending work for the navigator
    pub intent: Option<NavIntent>,
    /// Destinations reached
    pub arrivals: u32,
    /// Requests that failed
    pub failures: u32,
}

impl NavContext {
    /// Create a context with the given retry delay
    #[must_use]
    pub fn new(retry_delay: f32) -> Self {
        Self {
            retry_delay,
            ..Default::default()
        }
    }
}

/// Nothing to do
#[derive(Debug, Default)]
pub struct IdleState;

impl State<NavContext> for IdleState {
    fn name(&self) -> &'static str {
        "Idle"
    }

    fn update(&mut self, ctx: &mut NavContext) -> Transition<NavContext> {
        if ctx.new_destination {
            return Transition::to(AwaitingPathState);
        }
        Transition::None
    }
}

/// Path requested, waiting for the planner
#[derive(Debug, Default)]
pub struct AwaitingPathState;

impl State<NavContext> for AwaitingPathState {
    fn name(&self) -> &'static str {
        "AwaitingPath"
    }

    fn enter(&mut self, ctx: &mut NavContext) {
        ctx.new_destination = false;
        ctx.path_ready = false;
        ctx.path_failed = false;
        ctx.intent = ctx.destination.map(NavIntent::RequestPath);
    }

    fn update(&mut self, ctx: &mut NavContext) -> Transition<NavContext> {
        if ctx.new_destination {
            return Transition::to(AwaitingPathState);
        }
        if ctx.path_ready {
            return Transition::to(FollowingPathState);
        }
        if ctx.path_failed || ctx.destination.is_none() {
            return Transition::to(BlockedState::default());
        }
        Transition::None
    }
}

/// Walking the planned path
#[derive(Debug, Default)]
pub struct FollowingPathState;

impl State<NavContext> for FollowingPathState {
    fn name(&self) -> &'static str {
        "FollowingPath"
    }

    fn enter(&mut self, ctx: &mut NavContext) {
        ctx.path_ready = false;
        ctx.follow_done = false;
        ctx.intent = Some(NavIntent::FollowPath);
    }

    fn update(&mut self, ctx: &mut NavContext) -> Transition<NavContext> {
        if ctx.new_destination {
            return Transition::to(AwaitingPathState);
        }
        // No path to collect after all
        if ctx.path_failed {
            return Transition::to(BlockedState::default());
        }
        if ctx.follow_done {
            ctx.follow_done = false;
            ctx.destination = None;
            ctx.arrivals += 1;
            return Transition::to(IdleState);
        }
        Transition::None
    }
}

/// The last request failed; retry after a delay
#[derive(Debug, Default)]
pub struct BlockedState {
    /// Time spent waiting
    pub waited: f32,
}

impl State<NavContext> for BlockedState {
    fn name(&self) -> &'static str {
        "Blocked"
    }

    fn enter(&mut self, ctx: &mut NavContext) {
        self.waited = 0.0;
        ctx.path_failed = false;
        ctx.failures += 1;
        ctx.intent = Some(NavIntent::Stop);
    }

    fn update(&mut self, ctx: &mut NavContext) -> Transition<NavContext> {
        if ctx.new_destination {
            return Transition::to(AwaitingPathState);
        }
        if ctx.destination.is_none() {
            return Transition::to(IdleState);
        }

        self.waited += ctx.delta_time;
        if self.waited >= ctx.retry_delay {
            return Transition::to(AwaitingPathState);
        }
        Transition::None
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn navigation() -> (StateMachine<NavContext>, NavContext) {
        (StateMachine::new(IdleState), NavContext::new(1.0))
    }

    fn request(ctx: &mut NavContext, destination: Vec3) {
        ctx.destination = Some(destination);
        ctx.new_destination = true;
    }

    #[test]
    fn test_fsm_initial_state() {
        let (fsm, _) = navigation();
        assert_eq!(fsm.current_state_name(), "Idle");
        assert!(!fsm.entered);
    }

    #[test]
    fn test_idle_stays_idle() {
        let (mut fsm, mut ctx) = navigation();
        assert!(!fsm.update(&mut ctx));
        assert!(fsm.entered);
        assert!(fsm.is_in_state("Idle"));
        assert!(ctx.intent.is_none());
    }

    #[test]
    fn test_destination_issues_request() {
        let (mut fsm, mut ctx) = navigation();
        request(&mut ctx, Vec3::X);

        assert!(fsm.update(&mut ctx));
        assert_eq!(fsm.current_state_name(), "AwaitingPath");
        assert_eq!(ctx.intent, Some(NavIntent::RequestPath(Vec3::X)));
        assert!(!ctx.new_destination);
    }

    #[test]
    fn test_full_trip() {
        let (mut fsm, mut ctx) = navigation();
        request(&mut ctx, Vec3::X);
        fsm.update(&mut ctx);
        ctx.intent = None;

        ctx.path_ready = true;
        fsm.update(&mut ctx);
        assert_eq!(fsm.current_state_name(), "FollowingPath");
        assert_eq!(ctx.intent, Some(NavIntent::FollowPath));

        ctx.follow_done = true;
        fsm.update(&mut ctx);
        assert!(fsm.is_in_state("Idle"));
        assert_eq!(ctx.arrivals, 1);
        assert!(ctx.destination.is_none());
    }

    #[test]
    fn test_failure_blocks_then_retries() {
        let (mut fsm, mut ctx) = navigation();
        request(&mut ctx, Vec3::X);
        fsm.update(&mut ctx);

        ctx.path_failed = true;
        fsm.update(&mut ctx);
        assert!(fsm.is_in_state("Blocked"));
        assert_eq!(ctx.failures, 1);
        assert_eq!(ctx.intent, Some(NavIntent::Stop));

        ctx.delta_time = 0.6;
        fsm.update(&mut ctx);
        assert!(fsm.is_in_state("Blocked"));

        fsm.update(&mut ctx);
        assert!(fsm.is_in_state("AwaitingPath"));
        assert_eq!(ctx.intent, Some(NavIntent::RequestPath(Vec3::X)));
    }

    #[test]
    fn test_new_destination_while_following_replans() {
        let (mut fsm, mut ctx) = navigation();
        fsm.transition(&mut ctx, FollowingPathState);

        request(&mut ctx, Vec3::Z);
        fsm.update(&mut ctx);
        assert!(fsm.is_in_state("AwaitingPath"));
        assert_eq!(ctx.intent, Some(NavIntent::RequestPath(Vec3::Z)));
    }

    #[test]
    fn test_transition_debug() {
        let transition: Transition<NavContext> = Transition::to(IdleState);
        assert_eq!(format!("{transition:?}"), "Transition::To(Idle)");
    }
}
