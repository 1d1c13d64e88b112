//! Demo: agents crossing a walled grid
//!
//! Usage: `pathcycle [config.ron]`. Run with `RUST_LOG=debug` to watch the
//! searches being scheduled.

use pathcycle::prelude::*;

/// World-space position
#[derive(Debug, Clone, Copy)]
struct Position(Vec3);

/// World-space velocity
#[derive(Debug, Clone, Copy)]
struct Velocity(Vec3);

/// Steering command the agent is executing
#[derive(Debug, Default)]
struct Steering(Option<SteeringCommand>);

const AGENTS: usize = 5;
const MAX_TICKS: usize = 60 * 60;
const DELTA_TIME: f32 = 1.0 / 60.0;

fn load_config() -> AiConfig {
    let Some(path) = std::env::args().nth(1) else {
        return AiConfig::default();
    };
    match AiConfig::load_ron(&path) {
        Ok(config) => {
            log::info!("Loaded config from {path}");
            config
        }
        Err(e) => {
            log::error!("Failed to load {path}: {e}, using defaults");
            AiConfig::default()
        }
    }
}

/// 20x20 grid with a wall down the middle and a gap at the far end
fn build_map() -> Grid {
    let mut grid = Grid::new(20, 20, 1.0);
    for y in 0..16 {
        grid.set_walkable(10, y, false);
    }
    grid
}

fn set_steering(world: &mut World, entity: Entity, command: SteeringCommand) {
    if let Ok(mut steering) = world.get::<&mut Steering>(entity) {
        steering.0 = Some(command);
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = load_config();
    let grid = build_map();
    let (mut graph, _) = grid.to_graph(Connectivity::Eight)?;
    log::info!("Graph: {} nodes, {} edges", graph.len(), graph.edge_count());

    let mut runtime = AiRuntime::new(config.clone());
    runtime.initialize();

    let mut world = World::new();
    let mut navigators = Vec::with_capacity(AGENTS);
    for i in 0..AGENTS {
        let row = 1 + i * 3;
        let start = grid.grid_to_world(2, row);
        let entity = world.spawn((Position(start), Velocity(Vec3::ZERO), Steering::default()));

        let mut navigator = Navigator::new(entity, runtime.manager_mut(), &config);
        navigator.set_destination(grid.grid_to_world(17, row));
        navigators.push(navigator);
    }

    let mut completions = Vec::new();
    for _ in 0..MAX_TICKS {
        let report = runtime.tick(&mut graph);
        if report.schedule.cycles_used > 0 {
            log::debug!(
                "tick {}: {} cycles, {} searches active",
                report.tick,
                report.schedule.cycles_used,
                report.schedule.active
            );
        }

        // Dispatch notifications; handlers may fire follow-ups into the same pass
        while let Some(event) = runtime.events_mut().poll() {
            let (_, events) = runtime.split_mut();
            for navigator in &mut navigators {
                if let Some(command) = navigator.handle(&event, events) {
                    set_steering(&mut world, navigator.owner(), command);
                }
            }
        }

        for navigator in &mut navigators {
            let position = world.get::<&Position>(navigator.owner())?.0;
            let (manager, events) = runtime.split_mut();
            let command = navigator.update(DELTA_TIME, position, &graph, &grid, manager, events);
            if let Some(command) = command {
                set_steering(&mut world, navigator.owner(), command);
            }
        }

        // Movement: integrate steering and report finished behaviours
        for (_, (position, velocity, steering)) in
            world.query_mut::<(&mut Position, &mut Velocity, &mut Steering)>()
        {
            if let Some(command) = &steering.0 {
                let output = command.calculate(position.0, velocity.0);
                velocity.0 = (velocity.0 + output.linear * DELTA_TIME)
                    .clamp_length_max(config.steering.max_speed);
                let next = position.0 + velocity.0 * DELTA_TIME;
                if let Some(done) = command.completion(next, velocity.0) {
                    if command.is_arrive() {
                        velocity.0 = Vec3::ZERO;
                    }
                    completions.push(done);
                    steering.0 = None;
                }
            }
            position.0 += velocity.0 * DELTA_TIME;
        }
        for done in completions.drain(..) {
            runtime.events_mut().queue(done);
        }

        if navigators.iter().all(|n| n.arrivals() > 0) {
            log::info!("All agents arrived after {} ticks", runtime.ticks());
            break;
        }
    }

    for navigator in &navigators {
        let position = world.get::<&Position>(navigator.owner())?.0;
        log::info!(
            "{:?}: {} at {position}, {} arrivals, {} failures",
            navigator.owner(),
            navigator.state(),
            navigator.arrivals(),
            navigator.failures()
        );
    }
    log::info!("{}", runtime.stats().format_stats());

    runtime.shutdown(&mut graph);
    Ok(())
}
