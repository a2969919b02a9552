//! Basic demonstration of the arena simulation.
//!
//! Run with: RUST_LOG=info cargo run --example basic_demo

use arena_sim::{Action, ScriptedInput, Simulation};
use glam::Vec2;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("=== Arena Sim - Headless Demo ===\n");

    let mut sim = Simulation::new_default_arena(30)?;
    let user = sim.user_entity().ok_or("arena has no user")?;

    // Strafe right and keep shooting at the far corner.
    sim.set_input(Box::new(
        ScriptedInput::holding([Action::MoveRight, Action::Fire]).with_pointer(Vec2::new(1900.0, 100.0)),
    ));

    println!("Running for 10 seconds at 60 ticks/sec...\n");
    for tick in 0..600 {
        sim.step(1.0 / 60.0);

        if (tick + 1) % 60 == 0 {
            let keyframe = sim.keyframe();
            let hp = sim.health(user).map_or(0, |h| h.current());
            println!(
                "--- Tick {} (t={:.1}s) entities={} user hp={} state={:?}",
                sim.current_tick(),
                sim.current_time(),
                keyframe.entities.len(),
                hp,
                sim.game_state()
            );
        }
        if sim.is_game_over() {
            println!("\nGame over at tick {}", sim.current_tick());
            break;
        }
    }

    println!("\n=== Final Keyframe ===\n");
    println!("{}", sim.keyframe().to_json_line()?);

    if !sim.shutdown() {
        eprintln!("worker pools did not stop in time");
    }
    Ok(())
}
