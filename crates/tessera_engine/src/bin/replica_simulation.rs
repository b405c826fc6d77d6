//! # Replica Convergence Simulation
//!
//! Two engines linked by an in-process transport pair mutate the same
//! component at random for a number of ticks, then go quiet until every
//! message has been delivered. Both replicas must end with identical state.
//!
//! Usage: `replica_simulation [seed] [ticks]`

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tessera_core::{ComponentHandle, World};
use tessera_engine::{Engine, EngineConfig, EngineResult, MemoryTransport};
use tessera_shared::Entity;

const COMPONENT: &str = "simulation::Counter";
const QUIET_TICKS: usize = 4;

struct Replica {
    engine: Engine,
    counter: ComponentHandle<u32>,
}

impl Replica {
    fn new(transport: MemoryTransport) -> EngineResult<Self> {
        let mut engine = Engine::new(EngineConfig {
            fetch_initial_state: false,
            ..EngineConfig::default()
        });
        let counter = engine.world_mut().define_component::<u32>(COMPONENT)?;
        engine.add_transport(transport);
        Ok(Self { engine, counter })
    }

    fn state(&self) -> EngineResult<Vec<(Entity, u32, Option<u32>)>> {
        let store = self.engine.world().component(self.counter)?;
        let mut state: Vec<_> = store
            .iter()
            .map(|(entity, &value)| (entity, value, store.timestamp(entity)))
            .collect();
        state.sort_unstable_by_key(|&(entity, _, _)| entity);
        Ok(state)
    }
}

#[derive(Default)]
struct Stats {
    created: usize,
    updated: usize,
    removed: usize,
}

fn random_op(
    world: &mut World,
    counter: ComponentHandle<u32>,
    rng: &mut StdRng,
    creates: bool,
    stats: &mut Stats,
) -> EngineResult<()> {
    let alive: Vec<Entity> = world.component(counter)?.iter().map(|(e, _)| e).collect();
    let roll = rng.gen_range(0..100);

    if creates && (alive.is_empty() || roll < 20) {
        let entity = world.add_entity()?;
        world.component_mut(counter)?.create_or_replace(entity, rng.gen());
        stats.created += 1;
    } else if !alive.is_empty() {
        let entity = alive[rng.gen_range(0..alive.len())];
        if roll < 90 {
            world.component_mut(counter)?.create_or_replace(entity, rng.gen());
            stats.updated += 1;
        } else if world.remove_entity(entity) {
            stats.removed += 1;
        }
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let seed: u64 = args.next().map_or(Ok(7), |s| s.parse())?;
    let ticks: usize = args.next().map_or(Ok(300), |s| s.parse())?;

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         TESSERA - REPLICA CONVERGENCE SIMULATION                 ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();
    println!("┌─ CONFIGURATION ─────────────────────────────────────────────────┐");
    println!("│ Seed:               {seed:<44} │");
    println!("│ Active ticks:       {ticks:<44} │");
    println!("│ Quiet ticks:        {QUIET_TICKS:<44} │");
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    let mut rng = StdRng::seed_from_u64(seed);
    let start = Instant::now();

    let (left, right) = MemoryTransport::pair();
    let mut writer = Replica::new(left)?;
    let mut editor = Replica::new(right)?;
    let mut stats = Stats::default();

    runtime.block_on(async {
        for _ in 0..ticks {
            let counter = writer.counter;
            random_op(writer.engine.world_mut(), counter, &mut rng, true, &mut stats)?;
            let counter = editor.counter;
            random_op(editor.engine.world_mut(), counter, &mut rng, false, &mut stats)?;

            writer.engine.update(1.0 / 30.0).await?;
            editor.engine.update(1.0 / 30.0).await?;
        }
        for _ in 0..QUIET_TICKS {
            writer.engine.update(1.0 / 30.0).await?;
            editor.engine.update(1.0 / 30.0).await?;
        }
        EngineResult::Ok(())
    })?;

    let left_state = writer.state()?;
    let right_state = editor.state()?;
    let converged = left_state == right_state;

    println!("┌─ RESULTS ───────────────────────────────────────────────────────┐");
    println!("│ Entities created:   {:<44} │", stats.created);
    println!("│ Values written:     {:<44} │", stats.updated + stats.created);
    println!("│ Entities removed:   {:<44} │", stats.removed);
    println!("│ Live values:        {:<44} │", left_state.len());
    println!("│ Elapsed:            {:<44} │", format!("{:.2?}", start.elapsed()));
    println!("│ Converged:          {:<44} │", if converged { "YES" } else { "NO" });
    println!("└──────────────────────────────────────────────────────────────────┘");

    if !converged {
        for (a, b) in left_state.iter().zip(&right_state) {
            if a != b {
                println!("  diverged: {a:?} vs {b:?}");
            }
        }
        std::process::exit(1);
    }
    Ok(())
}
