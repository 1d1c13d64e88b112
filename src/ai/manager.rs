//! Round-robin scheduler for in-flight path searches
//!
//! The manager owns every planner and spends a fixed number of search
//! cycles per tick, one cycle at a time, cycling through the active
//! planners in order. A planner whose search finishes leaves the active
//! list immediately. The cursor survives between ticks, so the remainder of
//! one tick's budget does not always favour the same planners.
//!
//! With `N` active planners and a budget of `B` cycles per tick, each
//! planner receives a cycle at least every `ceil(N / B)` ticks.

use glam::Vec3;
use hecs::Entity;
use rustc_hash::FxHashMap;

use crate::ai::planner::{PathPlanner, PlanError, PlanOutcome, PlannerId};
use crate::ai::search::{Heuristic, SearchStatus};
use crate::ai::{ObstacleQuery, Probe};
use crate::core::{AiConfig, Notifications};
use crate::graph::{Graph, Node};

/// Outcome of one scheduler tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    /// Cycles handed out this tick
    pub cycles_used: usize,
    /// Searches that finished with a path
    pub succeeded: usize,
    /// Searches that finished without a path
    pub failed: usize,
    /// Planners still searching after the tick
    pub active: usize,
}

/// Owns planners and schedules their searches
#[derive(Debug)]
pub struct PathManager {
    planners: FxHashMap<PlannerId, PathPlanner>,
    active: Vec<PlannerId>,
    cursor: usize,
    searches_per_cycle: usize,
    probe: Probe,
    heuristic: Heuristic,
    next_id: u32,
}

impl PathManager {
    /// Create a manager spending `searches_per_cycle` cycles per tick
    #[must_use]
    pub fn new(searches_per_cycle: usize) -> Self {
        Self {
            planners: FxHashMap::default(),
            active: Vec::new(),
            cursor: 0,
            searches_per_cycle,
            probe: Probe::default(),
            heuristic: Heuristic::default(),
            next_id: 1,
        }
    }

    /// Create a manager from configuration
    #[must_use]
    pub fn from_config(config: &AiConfig) -> Self {
        let mut manager = Self::new(config.searches_per_cycle);
        manager.probe = config.probe;
        manager.heuristic = config.heuristic;
        manager
    }

    /// Per-tick cycle budget
    #[must_use]
    pub fn searches_per_cycle(&self) -> usize {
        self.searches_per_cycle
    }

    /// Change the per-tick cycle budget
    pub fn set_searches_per_cycle(&mut self, budget: usize) {
        self.searches_per_cycle = budget;
    }

    /// Create a planner for `owner` and return its id
    pub fn create_planner(&mut self, owner: Entity) -> PlannerId {
        let id = PlannerId(self.next_id);
        self.next_id += 1;
        self.planners
            .insert(id, PathPlanner::new(id, owner, self.probe, self.heuristic));
        id
    }

    /// Remove a planner entirely (deactivating it first)
    pub fn destroy_planner(&mut self, id: PlannerId) -> Option<PathPlanner> {
        self.remove_path_planner(id);
        self.planners.remove(&id)
    }

    /// Look up a planner
    #[must_use]
    pub fn planner(&self, id: PlannerId) -> Option<&PathPlanner> {
        self.planners.get(&id)
    }

    /// Look up a planner mutably
    pub fn planner_mut(&mut self, id: PlannerId) -> Option<&mut PathPlanner> {
        self.planners.get_mut(&id)
    }

    /// Number of planners owned
    #[must_use]
    pub fn planner_count(&self) -> usize {
        self.planners.len()
    }

    /// Admit a planner to the round robin
    ///
    /// Idempotent: returns `false` if it is already active, unknown, or
    /// has no search in flight.
    pub fn add_path_planner(&mut self, id: PlannerId) -> bool {
        let searching = self
            .planners
            .get(&id)
            .is_some_and(PathPlanner::is_searching);
        if !searching || self.active.contains(&id) {
            return false;
        }
        self.active.push(id);
        true
    }

    /// Take a planner out of the round robin
    ///
    /// Safe to call for planners that are not active; returns whether
    /// anything was removed.
    pub fn remove_path_planner(&mut self, id: PlannerId) -> bool {
        let Some(slot) = self.active.iter().position(|&p| p == id) else {
            return false;
        };
        self.active.remove(slot);
        if slot < self.cursor {
            self.cursor -= 1;
        }
        true
    }

    /// Check whether a planner is waiting for cycles
    #[must_use]
    pub fn is_active(&self, id: PlannerId) -> bool {
        self.active.contains(&id)
    }

    /// Number of planners waiting for cycles
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Ask planner `id` for a path and admit it if a search started
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::UnknownPlanner`] for an unknown id, otherwise
    /// whatever the planner reports.
    pub fn request_path<Q>(
        &mut self,
        id: PlannerId,
        graph: &Graph,
        obstacles: &Q,
        from: Vec3,
        to: Vec3,
        bus: &mut Notifications,
    ) -> Result<PlanOutcome, PlanError>
    where
        Q: ObstacleQuery + ?Sized,
    {
        let planner = self
            .planners
            .get_mut(&id)
            .ok_or(PlanError::UnknownPlanner(id))?;
        let outcome = planner.request_path_to_position(graph, obstacles, from, to, bus);
        self.admit(id, outcome)
    }

    /// Ask planner `id` for a path to the nearest node matching `goal`
    ///
    /// # Errors
    ///
    /// Same as [`PathManager::request_path`]
    pub fn request_nearest<Q, F>(
        &mut self,
        id: PlannerId,
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
        let planner = self
            .planners
            .get_mut(&id)
            .ok_or(PlanError::UnknownPlanner(id))?;
        let outcome = planner.request_path_to_nearest(graph, obstacles, from, goal, bus);
        self.admit(id, outcome)
    }

    fn admit(
        &mut self,
        id: PlannerId,
        outcome: Result<PlanOutcome, PlanError>,
    ) -> Result<PlanOutcome, PlanError> {
        match outcome {
            Ok(PlanOutcome::Searching) => {
                self.add_path_planner(id);
            }
            // The previous search (if any) was replaced
            Ok(PlanOutcome::Direct) | Err(_) => {
                self.remove_path_planner(id);
            }
        }
        outcome
    }

    /// Abandon planner `id`'s request
    ///
    /// Returns `true` if a search was in flight.
    pub fn cancel(&mut self, id: PlannerId) -> bool {
        self.remove_path_planner(id);
        self.planners.get_mut(&id).is_some_and(PathPlanner::cancel)
    }

    /// Spend this tick's budget across active planners
    pub fn update_searches(&mut self, graph: &Graph, bus: &mut Notifications) -> ScheduleReport {
        let mut report = ScheduleReport::default();
        let mut budget = self.searches_per_cycle;

        while budget > 0 && !self.active.is_empty() {
            if self.cursor >= self.active.len() {
                self.cursor = 0;
            }
            let id = self.active[self.cursor];

            let status = match self.planners.get_mut(&id) {
                Some(planner) => planner.cycle_once(graph, bus),
                None => SearchStatus::Failure,
            };
            budget -= 1;
            report.cycles_used += 1;

            match status {
                SearchStatus::Running => self.cursor += 1,
                // The list shrank, the cursor already points at the next one
                SearchStatus::Success => {
                    self.active.remove(self.cursor);
                    report.succeeded += 1;
                }
                SearchStatus::Failure => {
                    self.active.remove(self.cursor);
                    report.failed += 1;
                }
            }
        }

        report.active = self.active.len();
        if report.cycles_used > 0 {
            log::trace!(
                "path manager: {} cycles, {} done, {} failed, {} active",
                report.cycles_used,
                report.succeeded,
                report.failed,
                report.active
            );
        }
        report
    }

    /// Drop every planner
    pub fn clear(&mut self) {
        self.active.clear();
        self.planners.clear();
        self.cursor = 0;
    }
}

impl Default for PathManager {
    fn default() -> Self {
        Self::from_config(&AiConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::OpenSpace;
    use crate::ai::query::LayerMask;
    use crate::core::Notification;

    /// Blocks every query so that requests always go to the graph
    struct Solid;

    impl ObstacleQuery for Solid {
        fn cast(&self, _start: Vec3, _end: Vec3, _probe: &Probe) -> Option<f32> {
            Some(0.0)
        }
    }

    /// Only moves shorter than half a unit are clear
    struct ShortSight;

    impl ObstacleQuery for ShortSight {
        fn cast(&self, start: Vec3, end: Vec3, _probe: &Probe) -> Option<f32> {
            (start.distance(end) >= 0.5).then_some(0.0)
        }
    }

    /// Chain of `len` nodes spaced one unit apart along X
    fn chain(len: usize) -> Graph {
        let mut graph = Graph::new();
        let mut prev = None;
        for i in 0..len {
            let id = graph.add_node(Vec3::X * i as f32).unwrap();
            if let Some(prev) = prev {
                graph.add_edge(prev, id, 1.0).unwrap();
            }
            prev = Some(id);
        }
        graph
    }

    fn owners(count: usize) -> Vec<Entity> {
        let mut world = hecs::World::new();
        (0..count).map(|_| world.spawn(())).collect()
    }

    #[test]
    fn test_admission_is_idempotent() {
        let graph = chain(5);
        let mut manager = PathManager::new(3);
        let mut bus = Notifications::new();
        let owner = owners(1)[0];
        let id = manager.create_planner(owner);

        // Start a search behind the manager's back
        let outcome = manager.planner_mut(id).unwrap().request_path_to_position(
            &graph,
            &ShortSight,
            Vec3::ZERO,
            Vec3::X * 4.0,
            &mut bus,
        );
        assert_eq!(outcome, Ok(PlanOutcome::Searching));
        assert!(!manager.is_active(id));

        assert!(manager.add_path_planner(id));
        assert!(!manager.add_path_planner(id));
        assert_eq!(manager.active_count(), 1);

        assert!(manager.remove_path_planner(id));
        assert!(!manager.remove_path_planner(id));
        assert!(!manager.add_path_planner(PlannerId(999)));
    }

    #[test]
    fn test_idle_planner_is_not_admitted() {
        let graph = chain(5);
        let mut manager = PathManager::new(3);
        let mut bus = Notifications::new();
        let id = manager.create_planner(owners(1)[0]);

        assert!(!manager.add_path_planner(id));
        assert_eq!(manager.active_count(), 0);

        // A finished search is not admitted again either
        manager
            .request_path(id, &graph, &ShortSight, Vec3::ZERO, Vec3::X * 4.0, &mut bus)
            .unwrap();
        for _ in 0..2 {
            manager.update_searches(&graph, &mut bus);
        }
        assert!(!manager.is_active(id));
        assert!(!manager.add_path_planner(id));

        let report = manager.update_searches(&graph, &mut bus);
        assert_eq!(report.cycles_used, 0);
        assert_eq!(report.failed, 0);
        bus.swap();
        assert!(
            bus.iter()
                .all(|n| !matches!(n, Notification::PathUnavailable { .. }))
        );
    }

    #[test]
    fn test_three_planners_finish_in_five_ticks() {
        // A 5-node chain needs exactly 5 cycles: 4 expansions + goal
        let graph = chain(5);
        let mut manager = PathManager::new(3);
        let mut bus = Notifications::new();

        let ids: Vec<_> = owners(3)
            .into_iter()
            .map(|owner| manager.create_planner(owner))
            .collect();
        for &id in &ids {
            let outcome =
                manager.request_path(id, &graph, &ShortSight, Vec3::ZERO, Vec3::X * 4.0, &mut bus);
            assert_eq!(outcome, Ok(PlanOutcome::Searching));
        }

        for tick in 1..=5 {
            let report = manager.update_searches(&graph, &mut bus);
            assert_eq!(report.cycles_used, 3);
            for &id in &ids {
                let cycles = manager.planner(id).unwrap().search().unwrap().cycles_total();
                assert_eq!(cycles, tick, "each planner gets one cycle per tick");
            }
            if tick < 5 {
                assert_eq!(report.active, 3);
            } else {
                assert_eq!(report.succeeded, 3);
                assert_eq!(report.active, 0);
            }
        }

        assert_eq!(manager.update_searches(&graph, &mut bus).cycles_used, 0);
        for &id in &ids {
            assert!(manager.planner(id).unwrap().path().is_some());
        }
    }

    #[test]
    fn test_no_planner_starves() {
        // 5 planners, 2 cycles per tick: everyone is served every 3 ticks
        let graph = chain(40);
        let mut manager = PathManager::new(2);
        let mut bus = Notifications::new();

        let ids: Vec<_> = owners(5)
            .into_iter()
            .map(|owner| manager.create_planner(owner))
            .collect();
        for &id in &ids {
            manager
                .request_path(id, &graph, &ShortSight, Vec3::ZERO, Vec3::X * 39.0, &mut bus)
                .unwrap();
        }

        let bound = 5_usize.div_ceil(2);
        let mut last_served = vec![0_usize; ids.len()];
        let mut previous = vec![0_usize; ids.len()];

        for tick in 1..=30 {
            manager.update_searches(&graph, &mut bus);
            for (i, &id) in ids.iter().enumerate() {
                let cycles = manager.planner(id).unwrap().search().unwrap().cycles_total();
                assert!(cycles - previous[i] <= 1, "at most one cycle per tick here");
                if cycles > previous[i] {
                    last_served[i] = tick;
                }
                previous[i] = cycles;
                assert!(tick - last_served[i] < bound, "planner {i} starved at tick {tick}");
            }
        }
    }

    #[test]
    fn test_finished_planner_leaves_round_robin() {
        let graph = chain(3);
        let mut manager = PathManager::new(100);
        let mut bus = Notifications::new();
        let ids: Vec<_> = owners(2)
            .into_iter()
            .map(|owner| manager.create_planner(owner))
            .collect();

        manager
            .request_path(ids[0], &graph, &ShortSight, Vec3::ZERO, Vec3::X * 2.0, &mut bus)
            .unwrap();
        // Goal node unreachable against edge direction
        manager
            .request_path(ids[1], &graph, &ShortSight, Vec3::X * 2.0, Vec3::ZERO, &mut bus)
            .unwrap();

        let report = manager.update_searches(&graph, &mut bus);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.active, 0);
        assert!(report.cycles_used < 100);
    }

    #[test]
    fn test_direct_request_is_not_admitted() {
        let graph = chain(3);
        let mut manager = PathManager::new(3);
        let mut bus = Notifications::new();
        let id = manager.create_planner(owners(1)[0]);

        let outcome = manager.request_path(id, &graph, &OpenSpace, Vec3::ZERO, Vec3::X, &mut bus);
        assert_eq!(outcome, Ok(PlanOutcome::Direct));
        assert!(!manager.is_active(id));
    }

    #[test]
    fn test_failed_request_and_unknown_planner() {
        let graph = chain(3);
        let mut manager = PathManager::new(3);
        let mut bus = Notifications::new();
        let id = manager.create_planner(owners(1)[0]);

        assert_eq!(
            manager.request_path(id, &graph, &Solid, Vec3::ZERO, Vec3::X, &mut bus),
            Err(PlanError::NoNodeNearSource)
        );
        assert!(!manager.is_active(id));
        assert_eq!(
            manager.request_path(PlannerId(77), &graph, &Solid, Vec3::ZERO, Vec3::X, &mut bus),
            Err(PlanError::UnknownPlanner(PlannerId(77)))
        );
    }

    #[test]
    fn test_cancel_and_destroy() {
        let graph = chain(10);
        let mut manager = PathManager::new(1);
        let mut bus = Notifications::new();
        let id = manager.create_planner(owners(1)[0]);

        manager
            .request_path(id, &graph, &ShortSight, Vec3::ZERO, Vec3::X * 9.0, &mut bus)
            .unwrap();
        manager.update_searches(&graph, &mut bus);

        assert!(manager.cancel(id));
        assert!(!manager.is_active(id));
        assert!(!manager.cancel(id));

        assert!(manager.destroy_planner(id).is_some());
        assert_eq!(manager.planner_count(), 0);
    }

    #[test]
    fn test_from_config() {
        let config = AiConfig::default()
            .with_searches_per_cycle(7)
            .with_probe(Probe::new(1.0, LayerMask::STATIC));
        let mut manager = PathManager::from_config(&config);
        assert_eq!(manager.searches_per_cycle(), 7);

        let id = manager.create_planner(owners(1)[0]);
        assert_eq!(manager.planner(id).unwrap().probe().radius, 1.0);
    }
}
