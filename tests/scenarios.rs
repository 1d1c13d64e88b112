//! End-to-end scenarios across search, scheduling and following

use pathcycle::ai::{
    AStarSearch, BestPathTable, Dijkstra, DijkstraSearch, Heuristic, Navigator, OpenSpace,
    PathManager, PlanOutcome, SearchStatus,
};
use pathcycle::core::{AiConfig, AiRuntime, Notification};
use pathcycle::graph::{Connectivity, Graph, Grid, NodeId};
use pathcycle::prelude::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random sparse graph whose edge costs never undercut straight-line distance
fn random_graph(rng: &mut StdRng, nodes: usize) -> Graph {
    let mut graph = Graph::new();
    let ids: Vec<NodeId> = (0..nodes)
        .map(|_| {
            let position = Vec3::new(rng.gen_range(0.0..20.0), 0.0, rng.gen_range(0.0..20.0));
            graph.add_node(position).unwrap()
        })
        .collect();

    for &from in &ids {
        for &to in &ids {
            if from == to || !rng.gen_bool(0.15) {
                continue;
            }
            let a = graph.node(from).unwrap().position();
            let b = graph.node(to).unwrap().position();
            let cost = a.distance(b) * rng.gen_range(1.0..2.0) + 0.01;
            graph.add_edge(from, to, cost).unwrap();
        }
    }
    graph
}

fn diamond() -> (Graph, [NodeId; 4]) {
    let mut graph = Graph::new();
    let s = graph.add_node(Vec3::new(0.0, 0.0, 0.0)).unwrap();
    let a = graph.add_node(Vec3::new(1.0, 0.0, 1.0)).unwrap();
    let b = graph.add_node(Vec3::new(1.0, 0.0, -1.0)).unwrap();
    let d = graph.add_node(Vec3::new(2.0, 0.0, 0.0)).unwrap();
    graph.add_edge(s, a, 1.0).unwrap();
    graph.add_edge(s, b, 5.0).unwrap();
    graph.add_edge(a, d, 1.0).unwrap();
    graph.add_edge(b, d, 1.0).unwrap();
    (graph, [s, a, b, d])
}

#[test]
fn astar_matches_dijkstra_cost() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..20 {
        let graph = random_graph(&mut rng, 30);
        let source = NodeId(rng.gen_range(0..30));
        let goal = NodeId(rng.gen_range(0..30));

        let mut astar = AStarSearch::astar(&graph, source, goal);
        let mut dijkstra = DijkstraSearch::new(&graph, source, Dijkstra::to_node(goal));
        let a = astar.run(&graph);
        let d = dijkstra.run(&graph);

        assert_eq!(a, d, "both searches agree on reachability");
        if a == SearchStatus::Success {
            assert!((astar.solution_cost() - dijkstra.solution_cost()).abs() < 1e-3);
        }
    }
}

#[test]
fn single_cycle_stepping_matches_unlimited_run() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..20 {
        let graph = random_graph(&mut rng, 25);
        let source = NodeId(rng.gen_range(0..25));
        let goal = NodeId(rng.gen_range(0..25));

        let mut stepped = AStarSearch::astar(&graph, source, goal);
        let mut unlimited = AStarSearch::astar(&graph, source, goal);

        let status = loop {
            let step = stepped.do_search(&graph, Some(1));
            assert!(step.cycles_used <= 1);
            if step.status != SearchStatus::Running {
                break step.status;
            }
        };

        assert_eq!(status, unlimited.run(&graph));
        assert_eq!(stepped.solution(), unlimited.solution());
        assert_eq!(stepped.cycles_total(), unlimited.cycles_total());
    }
}

#[test]
fn diamond_prefers_cheap_branch() {
    let (graph, [s, a, _, d]) = diamond();
    let mut search = AStarSearch::with_heuristic(&graph, s, d, Heuristic::Zero);

    assert_eq!(search.run(&graph), SearchStatus::Success);
    let hops: Vec<_> = search.solution().iter().map(|e| (e.from, e.to)).collect();
    assert_eq!(hops, vec![(s, a), (a, d)]);
    assert_eq!(search.solution_cost(), 2.0);
}

#[test]
fn disconnected_components_fail_without_partial_path() {
    let mut graph = Graph::new();
    let a = graph.add_node(Vec3::ZERO).unwrap();
    let b = graph.add_node(Vec3::X).unwrap();
    let c = graph.add_node(Vec3::X * 10.0).unwrap();
    let d = graph.add_node(Vec3::X * 11.0).unwrap();
    graph.add_bidirectional_edge(a, b, 1.0).unwrap();
    graph.add_bidirectional_edge(c, d, 1.0).unwrap();

    let mut search = AStarSearch::astar(&graph, a, d);
    assert_eq!(search.run(&graph), SearchStatus::Failure);
    assert!(search.solution().is_empty());
    assert!(search.reached().is_none());

    // Terminal: further cycles do nothing
    let step = search.do_search(&graph, Some(5));
    assert_eq!(step.status, SearchStatus::Failure);
    assert_eq!(step.cycles_used, 0);
}

#[test]
fn best_path_walk_matches_dijkstra() {
    let mut rng = StdRng::seed_from_u64(3);
    let graph = random_graph(&mut rng, 20);
    let table = BestPathTable::build(&graph).unwrap();

    for s in graph.nodes().map(|n| n.id()) {
        for d in graph.nodes().map(|n| n.id()) {
            let mut search = DijkstraSearch::new(&graph, s, Dijkstra::to_node(d));
            if search.run(&graph) != SearchStatus::Success {
                assert!(table.next_node(s, d).is_none());
                continue;
            }

            let walk = table.path(s, d).expect("reachable pair has a walk");
            let cost: f32 = walk
                .windows(2)
                .map(|pair| graph.edge(pair[0], pair[1]).unwrap().cost)
                .sum();
            assert!((cost - table.cost(s, d).unwrap()).abs() < 1e-3);
            assert!((cost - search.solution_cost()).abs() < 1e-3);
            assert_eq!(walk.len() - 1, search.solution().len());
        }
    }
}

#[test]
fn three_planners_share_budget() {
    // Chain of five nodes: each search needs exactly five cycles
    let mut graph = Graph::new();
    let nodes: Vec<_> = (0..5)
        .map(|i| graph.add_node(Vec3::X * i as f32).unwrap())
        .collect();
    for pair in nodes.windows(2) {
        graph.add_edge(pair[0], pair[1], 1.0).unwrap();
    }

    struct Blind;
    impl pathcycle::ai::ObstacleQuery for Blind {
        fn cast(&self, start: Vec3, end: Vec3, _: &pathcycle::ai::Probe) -> Option<f32> {
            (start != end).then_some(0.0)
        }
    }

    let mut runtime = AiRuntime::new(AiConfig::default().with_searches_per_cycle(3));
    runtime.initialize();
    let mut world = hecs::World::new();
    let owners: Vec<_> = (0..3).map(|_| world.spawn(())).collect();

    let mut ids = Vec::new();
    for &owner in &owners {
        let (manager, events) = runtime.split_mut();
        let id = manager.create_planner(owner);
        let outcome = manager.request_path(id, &graph, &Blind, Vec3::ZERO, Vec3::X * 4.0, events);
        assert_eq!(outcome, Ok(PlanOutcome::Searching));
        ids.push(id);
    }

    let mut previous = [0_usize; 3];
    for tick in 1..=5 {
        let report = runtime.tick(&mut graph);
        assert_eq!(report.schedule.cycles_used, 3);
        for (i, &id) in ids.iter().enumerate() {
            let cycles = runtime
                .manager()
                .planner(id)
                .and_then(|p| p.search())
                .map_or(0, |s| s.cycles_total());
            assert_eq!(cycles - previous[i], 1, "one cycle per planner per tick");
            previous[i] = cycles;
        }
        if tick < 5 {
            assert!(report.schedule.active > 0);
        }
    }

    assert_eq!(runtime.manager().active_count(), 0);
    assert_eq!(runtime.stats().succeeded(), 3);

    // All three PathReady notifications arrive on the next tick
    runtime.tick(&mut graph);
    let mut ready = 0;
    while let Some(event) = runtime.events_mut().poll() {
        if matches!(event, Notification::PathReady { .. }) {
            ready += 1;
        }
    }
    assert_eq!(ready, 3);
}

#[test]
fn agents_cross_a_walled_grid() {
    let mut grid = Grid::new(12, 12, 1.0);
    for y in 0..9 {
        grid.set_walkable(6, y, false);
    }
    let (mut graph, _) = grid.to_graph(Connectivity::Eight).unwrap();

    let config = AiConfig::default().with_searches_per_cycle(5);
    let mut runtime = AiRuntime::new(config.clone());
    runtime.initialize();
    let mut world = hecs::World::new();

    let mut agents: Vec<(Navigator, Vec3, Option<pathcycle::ai::SteeringCommand>)> = (0..3)
        .map(|i| {
            let owner = world.spawn(());
            let mut navigator = Navigator::new(owner, runtime.manager_mut(), &config);
            navigator.set_destination(grid.grid_to_world(10, 1 + i * 3));
            (navigator, grid.grid_to_world(1, 1 + i * 3), None)
        })
        .collect();

    for _ in 0..500 {
        runtime.tick(&mut graph);

        while let Some(event) = runtime.events_mut().poll() {
            let (_, events) = runtime.split_mut();
            for (navigator, _, command) in &mut agents {
                if let Some(issued) = navigator.handle(&event, events) {
                    *command = Some(issued);
                }
            }
        }

        for (navigator, position, command) in &mut agents {
            let (manager, events) = runtime.split_mut();
            let issued = navigator.update(0.05, *position, &graph, &grid, manager, events);
            if issued.is_some() {
                *command = issued;
            }
        }

        // Teleporting movement system
        for (_, position, command) in &mut agents {
            if let Some(active) = command.take() {
                *position = active.target();
                if let Some(done) = active.completion(*position, Vec3::ZERO) {
                    runtime.events_mut().queue(done);
                }
            }
        }

        if agents.iter().all(|(n, _, _)| n.arrivals() == 1) {
            break;
        }
    }

    for (navigator, position, _) in &agents {
        assert_eq!(navigator.arrivals(), 1);
        assert_eq!(navigator.state(), "Idle");
        assert!(position.x > 6.0);
    }
    assert!(!graph.is_locked());
    runtime.shutdown(&mut graph);
}

#[test]
fn direct_request_bypasses_scheduler() {
    let graph = Graph::new();
    let mut manager = PathManager::new(1);
    let mut events = pathcycle::core::Notifications::new();
    let mut world = hecs::World::new();
    let id = manager.create_planner(world.spawn(()));

    let outcome = manager.request_path(id, &graph, &OpenSpace, Vec3::ZERO, Vec3::Z, &mut events);
    assert_eq!(outcome, Ok(PlanOutcome::Direct));
    assert_eq!(manager.active_count(), 0);
    assert_eq!(manager.planner(id).and_then(|p| p.path()).map(|p| p.len()), Some(1));
}
