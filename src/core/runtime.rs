//! Navigation runtime and tick loop
//!
//! [`AiRuntime`] owns the shared services (notification bus, path manager
//! and statistics) that agents would otherwise reach through globals. A game
//! builds one from an [`AiConfig`], calls [`AiRuntime::tick`] once per
//! simulation step and dispatches the polled notifications to its agents.
//!
//! ```ignore
//! let mut runtime = AiRuntime::new(AiConfig::default());
//! runtime.initialize();
//!
//! loop {
//!     runtime.tick(&mut graph);
//!     while let Some(event) = runtime.events_mut().poll() {
//!         let (_, events) = runtime.split_mut();
//!         navigator.handle(&event, events);
//!     }
//!     let (manager, events) = runtime.split_mut();
//!     navigator.update(dt, position, &graph, &obstacles, manager, events);
//! }
//! ```

use crate::ai::{PathManager, ScheduleReport};
use crate::core::{AiConfig, Notifications, TickStats};
use crate::graph::Graph;

/// Result of one runtime tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Tick counter, starting at 1
    pub tick: u64,
    /// Scheduler outcome
    pub schedule: ScheduleReport,
    /// Notifications deliverable after the tick
    pub deliverable: usize,
    /// Whether the graph was left locked
    pub graph_locked: bool,
}

/// Service container for path planning
#[derive(Debug)]
pub struct AiRuntime {
    config: AiConfig,
    events: Notifications,
    manager: PathManager,
    stats: TickStats,
    ticks: u64,
    initialized: bool,
    /// We locked the graph and owe it an unlock
    holding_lock: bool,
}

impl AiRuntime {
    /// Build the services from `config`
    #[must_use]
    pub fn new(config: AiConfig) -> Self {
        Self {
            manager: PathManager::from_config(&config),
            events: Notifications::new(),
            stats: TickStats::new(),
            config,
            ticks: 0,
            initialized: false,
            holding_lock: false,
        }
    }

    /// Prepare for the first tick
    pub fn initialize(&mut self) {
        if self.initialized {
            return;
        }
        log::info!(
            "AI runtime initialized ({} search cycles per tick)",
            self.config.searches_per_cycle
        );
        self.initialized = true;
    }

    /// Check whether `initialize` has run
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Advance one tick
    ///
    /// Promotes last tick's deferred notifications, spends the search budget
    /// and locks `graph` while searches remain in flight.
    pub fn tick(&mut self, graph: &mut Graph) -> TickReport {
        if !self.initialized {
            log::warn!("AI runtime ticked before initialize()");
            self.initialize();
        }
        self.ticks += 1;

        self.events.swap();
        let schedule = self.manager.update_searches(graph, &mut self.events);
        self.sync_lock(graph);

        self.stats.record_tick(
            schedule.cycles_used,
            schedule.succeeded,
            schedule.failed,
            schedule.active,
        );

        TickReport {
            tick: self.ticks,
            schedule,
            deliverable: self.events.len(),
            graph_locked: graph.is_locked(),
        }
    }

    fn sync_lock(&mut self, graph: &mut Graph) {
        let searching = self.manager.active_count() > 0;
        if searching && !graph.is_locked() {
            graph.lock();
            self.holding_lock = true;
        } else if !searching && self.holding_lock {
            graph.unlock();
            self.holding_lock = false;
        }
    }

    /// Drop every planner and pending notification
    ///
    /// Releases the graph lock if this runtime took it.
    pub fn shutdown(&mut self, graph: &mut Graph) {
        if self.holding_lock {
            graph.unlock();
            self.holding_lock = false;
        }
        self.manager.clear();
        self.events.clear();
        log::info!("AI runtime shut down after {} ticks", self.ticks);
        log::debug!("{}", self.stats.format_stats());
        self.initialized = false;
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// Notification bus
    #[must_use]
    pub fn events(&self) -> &Notifications {
        &self.events
    }

    /// Notification bus, mutably
    pub fn events_mut(&mut self) -> &mut Notifications {
        &mut self.events
    }

    /// Path manager
    #[must_use]
    pub fn manager(&self) -> &PathManager {
        &self.manager
    }

    /// Path manager, mutably
    pub fn manager_mut(&mut self) -> &mut PathManager {
        &mut self.manager
    }

    /// Manager and bus at once, for calls that need both
    pub fn split_mut(&mut self) -> (&mut PathManager, &mut Notifications) {
        (&mut self.manager, &mut self.events)
    }

    /// Scheduler statistics
    #[must_use]
    pub fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Ticks run so far
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl Default for AiRuntime {
    fn default() -> Self {
        Self::new(AiConfig::default())
    }
}
