//! AI systems - idle wandering and pairwise avoidance.
//!
//! Both passes only touch velocities; positions are moved later by the
//! physics stage. That ordering is what makes the parallel avoidance pass
//! safe: every batch reads neighbour positions that nothing in the frame
//! has written yet.
//!
//! ## Avoidance asymmetry
//!
//! Entity `i` in the AI snapshot is only pushed away from entities `j > i`.
//! The pass is deliberately one-sided; the last entity in the list never
//! avoids anything.

use crate::components::*;
use crate::config::SimConfig;
use crate::entity;
use crate::error::BatchError;
use crate::pool;
use crate::systems::lifecycle::GameState;
use crate::systems::physics::DeltaTime;
use crate::systems::WorkerPools;
use bevy_ecs::prelude::*;
use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

/// Seeded RNG shared by the AI passes.
#[derive(Resource)]
pub struct SimRng(pub Pcg32);

/// Tuning for the avoidance pass, copied out of [`SimConfig`].
#[derive(Debug, Clone, Copy)]
pub struct AvoidanceParams {
    pub radius: f32,
    pub strength: f32,
    pub lerp: f32,
    pub time_scale: f32,
    pub max_speed: f32,
}

impl AvoidanceParams {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            radius: config.avoidance_radius,
            strength: config.avoidance_strength,
            lerp: config.avoidance_lerp,
            time_scale: config.avoidance_time_scale,
            max_speed: config.max_ai_speed,
        }
    }
}

fn stage_inputs(world: &World) -> (f32, SimConfig) {
    let dt = world.get_resource::<DeltaTime>().map(|d| d.0).unwrap_or(0.0);
    let config = world.get_resource::<SimConfig>().cloned().unwrap_or_default();
    (dt, config)
}

pub fn playing(world: &World) -> bool {
    world
        .get_resource::<GameState>()
        .is_none_or(|state| *state == GameState::Playing)
}

// ============================================================================
// WANDERING
// ============================================================================

fn roll_target(rng: &mut Pcg32, range: f32) -> Vec2 {
    let range = range.abs();
    Vec2::new(rng.random_range(-range..=range), rng.random_range(-range..=range))
}

fn roll_interval(rng: &mut Pcg32, config: &SimConfig) -> f32 {
    if config.wander_max_interval > config.wander_min_interval {
        rng.random_range(config.wander_min_interval..config.wander_max_interval)
    } else {
        config.wander_min_interval
    }
}

/// Drift every active AI entity toward its wander target, re-rolling the
/// target when its timer runs out. Sequential: the RNG is consumed in
/// registry order so runs are reproducible.
pub fn wander_stage(world: &mut World) {
    if !playing(world) {
        return;
    }
    let (dt, config) = stage_inputs(world);
    let Some(mut rng) = world.remove_resource::<SimRng>() else {
        return;
    };

    for ai in entity::active_ai(world) {
        if world.get::<Physics>(ai).is_none() {
            continue;
        }

        let mut wander = match world.get::<Wander>(ai) {
            Some(wander) => *wander,
            None => Wander {
                target: roll_target(&mut rng.0, config.wander_range),
                timer: 0.0,
                interval: roll_interval(&mut rng.0, &config),
            },
        };

        wander.timer += dt;
        if wander.timer >= wander.interval {
            wander.target = roll_target(&mut rng.0, config.wander_range);
            wander.timer = 0.0;
            wander.interval = roll_interval(&mut rng.0, &config);
        }

        if let Some(mut physics) = world.get_mut::<Physics>(ai) {
            let blended = physics.velocity.lerp(wander.target, config.wander_lerp);
            physics.velocity = blended.clamp_length_max(config.max_ai_speed);
        }
        world.entity_mut(ai).insert(wander);
    }

    world.insert_resource(rng);
}

// ============================================================================
// AVOIDANCE
// ============================================================================

/// New velocity for entity `index` after avoiding its higher-indexed
/// neighbours, or `None` when nothing is close enough to push it.
///
/// Entries are `None` for entities missing a Transform (in `positions`) or
/// Physics (in `velocities`); they are neither moved nor avoided.
pub fn avoidance_velocity(
    index: usize,
    positions: &[Option<Vec2>],
    velocity: Vec2,
    dt: f32,
    params: &AvoidanceParams,
) -> Option<Vec2> {
    let pos = positions.get(index).copied().flatten()?;

    let mut avoidance = Vec2::ZERO;
    for other in positions.iter().skip(index + 1).flatten() {
        let distance = pos.distance(*other);
        // Coincident entities have no direction to push along.
        if distance < params.radius && distance > 0.0 {
            let direction = (pos - *other) / distance;
            let strength = (params.radius - distance) / params.radius;
            avoidance += direction * (strength * params.strength);
        }
    }

    if avoidance.length() <= 0.0 {
        return None;
    }

    let push = avoidance.clamp_length_max(params.strength) * (dt * params.time_scale);
    let target = velocity + push;
    Some(velocity.lerp(target, params.lerp).clamp_length_max(params.max_speed))
}

/// Push active AI entities apart. Runs inline below the configured
/// threshold and on the avoidance pool above it.
pub fn avoidance_stage(world: &mut World) {
    if !playing(world) {
        return;
    }
    let (dt, config) = stage_inputs(world);
    let params = AvoidanceParams::from_config(&config);

    let ai = entity::active_ai(world);
    if ai.is_empty() {
        return;
    }

    let positions: Vec<Option<Vec2>> = ai
        .iter()
        .map(|&e| world.get::<Transform>(e).map(|t| t.position))
        .collect();
    let mut velocities: Vec<Option<Vec2>> = ai
        .iter()
        .map(|&e| world.get::<Physics>(e).map(|p| p.velocity))
        .collect();

    let avoid_batch = |start: usize, batch: &mut [Option<Vec2>]| -> Result<(), BatchError> {
        for (offset, slot) in batch.iter_mut().enumerate() {
            let Some(velocity) = *slot else {
                continue;
            };
            if let Some(updated) = avoidance_velocity(start + offset, &positions, velocity, dt, &params) {
                *slot = Some(updated);
            }
        }
        Ok(())
    };

    match world.get_resource::<WorkerPools>() {
        Some(pools) if ai.len() >= config.parallel_threshold => {
            pools.avoidance.run("avoidance", &mut velocities, avoid_batch);
        }
        Some(pools) => {
            pools.avoidance.run_inline("avoidance", &mut velocities, avoid_batch);
        }
        None => {
            pool::run_single("avoidance", &mut velocities, avoid_batch);
        }
    }

    for (e, velocity) in ai.into_iter().zip(velocities) {
        if let (Some(velocity), Some(mut physics)) = (velocity, world.get_mut::<Physics>(e)) {
            physics.velocity = velocity;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::WorkerPool;
    use crate::spawn;
    use rand::SeedableRng;

    fn params() -> AvoidanceParams {
        AvoidanceParams::from_config(&SimConfig::default())
    }

    fn ai_world(config: SimConfig, points: &[Vec2]) -> (World, Vec<Entity>) {
        let mut world = World::new();
        world.insert_resource(DeltaTime(1.0 / 60.0));
        world.insert_resource(SimRng(Pcg32::seed_from_u64(config.seed)));
        world.insert_resource(WorkerPools {
            avoidance: WorkerPool::new("avoidance", 3).unwrap(),
            physics: WorkerPool::new("physics", 2).unwrap(),
        });
        world.insert_resource(config);
        let entities = points
            .iter()
            .map(|&p| spawn::spawn_ai(&mut world, p, Vec2::ZERO))
            .collect();
        (world, entities)
    }

    fn velocity(world: &World, e: Entity) -> Vec2 {
        world.get::<Physics>(e).unwrap().velocity
    }

    #[test]
    fn test_single_neighbour_push() {
        let positions = [Some(Vec2::new(100.0, 100.0)), Some(Vec2::new(140.0, 100.0))];
        let v = avoidance_velocity(0, &positions, Vec2::ZERO, 0.1, &params()).unwrap();

        // strength (80-40)/80*50 = 25, push 25 * 0.1 * 10 = 25, lerp 0.15.
        assert!((v.x + 3.75).abs() < 1e-4);
        assert!(v.y.abs() < 1e-6);
    }

    #[test]
    fn test_push_magnitude_is_capped() {
        let positions = [
            Some(Vec2::new(100.0, 100.0)),
            Some(Vec2::new(101.0, 100.0)),
            Some(Vec2::new(102.0, 100.0)),
        ];
        let v = avoidance_velocity(0, &positions, Vec2::ZERO, 1.0, &params()).unwrap();
        // Summed push ~98 is clamped to 50, scaled by 10, blended by 0.15.
        assert!((v.length() - 75.0).abs() < 1e-3);
    }

    #[test]
    fn test_out_of_range_and_coincident_neighbours_ignored() {
        let positions = [
            Some(Vec2::new(100.0, 100.0)),
            Some(Vec2::new(100.0, 100.0)),
            Some(Vec2::new(180.0, 100.0)),
            None,
        ];
        assert!(avoidance_velocity(0, &positions, Vec2::ONE, 0.1, &params()).is_none());
        assert!(avoidance_velocity(3, &positions, Vec2::ONE, 0.1, &params()).is_none());
    }

    #[test]
    fn test_result_is_speed_capped() {
        let positions = [Some(Vec2::new(100.0, 100.0)), Some(Vec2::new(110.0, 100.0))];
        let v = avoidance_velocity(0, &positions, Vec2::new(-200.0, 0.0), 1.0, &params()).unwrap();
        assert!((v.length() - 150.0).abs() < 1e-3);
    }

    #[test]
    fn test_avoidance_is_one_sided() {
        let (mut world, ai) = ai_world(
            SimConfig::default(),
            &[Vec2::new(100.0, 100.0), Vec2::new(150.0, 100.0), Vec2::new(600.0, 600.0)],
        );

        avoidance_stage(&mut world);

        assert!(velocity(&world, ai[0]).x < 0.0);
        assert_eq!(velocity(&world, ai[1]), Vec2::ZERO);
        assert_eq!(velocity(&world, ai[2]), Vec2::ZERO);
    }

    #[test]
    fn test_parallel_matches_inline() {
        let points: Vec<Vec2> = (0..40)
            .map(|i| Vec2::new(200.0 + (i % 8) as f32 * 30.0, 200.0 + (i / 8) as f32 * 35.0))
            .collect();

        let (mut parallel, a) = ai_world(SimConfig::default(), &points);
        let inline_config = SimConfig { parallel_threshold: usize::MAX, ..Default::default() };
        let (mut inline, b) = ai_world(inline_config, &points);

        avoidance_stage(&mut parallel);
        avoidance_stage(&mut inline);

        for (&ea, &eb) in a.iter().zip(&b) {
            assert_eq!(velocity(&parallel, ea), velocity(&inline, eb));
        }
        assert_ne!(velocity(&parallel, a[0]), Vec2::ZERO);
    }

    #[test]
    fn test_inactive_ai_neither_moves_nor_is_avoided() {
        let (mut world, ai) = ai_world(SimConfig::default(), &[Vec2::new(100.0, 100.0), Vec2::new(120.0, 100.0)]);
        entity::set_active(&mut world, ai[1], false);

        avoidance_stage(&mut world);

        assert_eq!(velocity(&world, ai[0]), Vec2::ZERO);
    }

    #[test]
    fn test_wander_stays_within_speed_and_range() {
        let (mut world, ai) = ai_world(SimConfig::default(), &[Vec2::new(300.0, 300.0), Vec2::new(900.0, 300.0)]);

        for _ in 0..600 {
            wander_stage(&mut world);
        }

        for e in ai {
            let wander = world.get::<Wander>(e).unwrap();
            assert!(wander.target.x.abs() <= 75.0 && wander.target.y.abs() <= 75.0);
            assert!(wander.interval >= 2.0 && wander.interval < 4.0);
            assert!(velocity(&world, e).length() <= 150.0 + 1e-3);
            assert_ne!(velocity(&world, e), Vec2::ZERO);
        }
    }

    #[test]
    fn test_wander_is_seeded() {
        let points = [Vec2::new(300.0, 300.0), Vec2::new(900.0, 300.0)];
        let (mut first, a) = ai_world(SimConfig::default(), &points);
        let (mut second, b) = ai_world(SimConfig::default(), &points);
        for _ in 0..300 {
            wander_stage(&mut first);
            wander_stage(&mut second);
        }
        for (&ea, &eb) in a.iter().zip(&b) {
            assert_eq!(velocity(&first, ea), velocity(&second, eb));
        }
    }

    #[test]
    fn test_game_over_freezes_ai_passes() {
        let (mut world, ai) = ai_world(SimConfig::default(), &[Vec2::new(100.0, 100.0), Vec2::new(110.0, 100.0)]);
        world.insert_resource(GameState::GameOver);

        wander_stage(&mut world);
        avoidance_stage(&mut world);

        assert_eq!(velocity(&world, ai[0]), Vec2::ZERO);
        assert!(world.get::<Wander>(ai[0]).is_none());
    }
}
