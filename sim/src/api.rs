//! Public API for the simulation.
//!
//! [`Simulation`] owns the ECS world, the frame schedule and the worker
//! pools. Front ends build a scene through the spawn helpers, install an
//! input source, then drive it with `advance` or `step`.
//!
//! ## Fixed Timestep
//!
//! `step(dt)` accumulates wall time and runs as many fixed frames as fit
//! (default 60 Hz). `advance(dt)` runs exactly one frame of length `dt`.

use crate::components::*;
use crate::config::SimConfig;
use crate::entity;
use crate::error::SimError;
use crate::input::{InputSource, InputState};
use crate::pool;
use crate::spawn;
use crate::systems::*;
use crate::world::Keyframe;
use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;
use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use std::time::Duration;

/// The main simulation container.
pub struct Simulation {
    world: World,
    schedule: Schedule,
    tick: u64,
    time: f32,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
}

impl Simulation {
    /// Create an empty arena with the default configuration.
    pub fn new() -> Result<Self, SimError> {
        Self::with_config(SimConfig::default())
    }

    pub fn with_config(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;

        let workers = config.worker_count.unwrap_or_else(pool::default_worker_count);
        let pools = WorkerPools::new(workers)?;

        let mut world = World::new();
        world.insert_resource(DeltaTime(config.fixed_timestep));
        world.insert_resource(SimRng(Pcg32::seed_from_u64(config.seed)));
        world.insert_resource(entity::Registry::default());
        world.insert_resource(InputState::default());
        world.insert_resource(GameState::Playing);
        world.insert_resource(lifecycle::GameOverCount::default());
        world.insert_resource(pools);
        world.insert_resource(config);

        let mut schedule = Schedule::default();
        schedule.set_executor_kind(ExecutorKind::SingleThreaded);
        schedule.add_systems(
            (
                begin_frame_stage,
                capability_update_stage,
                user_input_stage,
                wander_stage,
                avoidance_stage,
                physics_stage,
                melee_collision_stage,
                projectile_collision_stage,
                cleanup_stage,
                game_state_stage,
            )
                .chain(),
        );

        log::info!("simulation ready with {workers} workers per pool");

        Ok(Self {
            world,
            schedule,
            tick: 0,
            time: 0.0,
            time_accumulator: 0.0,
        })
    }

    /// Arena with the user in the middle, `ai_count` AI opponents at least
    /// 100 units away from it, and a few decorations.
    pub fn new_default_arena(ai_count: usize) -> Result<Self, SimError> {
        let mut sim = Self::new()?;
        let (width, height) = {
            let config = sim.config();
            (config.screen_width, config.screen_height)
        };
        let center = Vec2::new(width / 2.0, height / 2.0);
        sim.spawn_user(center);

        let mut placements = Vec::with_capacity(ai_count + 5);
        {
            let mut rng = sim.world.resource_mut::<SimRng>();
            for _ in 0..ai_count {
                // Tiny arenas may have no spot far enough away; fall back to a corner.
                let position = (0..64)
                    .map(|_| Vec2::new(rng.0.random_range(0.0..width), rng.0.random_range(0.0..height)))
                    .find(|p| p.distance(center) >= 100.0)
                    .unwrap_or(Vec2::ZERO);
                let velocity = Vec2::new(rng.0.random_range(-75.0..75.0), rng.0.random_range(-75.0..75.0));
                placements.push((Some(velocity), position));
            }
            for _ in 0..5 {
                let p = Vec2::new(rng.0.random_range(0.0..width), rng.0.random_range(0.0..height));
                placements.push((None, p));
            }
        }
        for (velocity, position) in placements {
            match velocity {
                Some(velocity) => sim.spawn_ai(position, velocity),
                None => spawn::spawn_decoration(&mut sim.world, position),
            };
        }
        Ok(sim)
    }

    /// Run exactly one frame of length `dt`.
    pub fn advance(&mut self, dt: f32) {
        if let Some(mut dt_res) = self.world.get_resource_mut::<DeltaTime>() {
            dt_res.0 = dt;
        }

        self.schedule.run(&mut self.world);

        self.tick += 1;
        self.time += dt;
    }

    /// Step the simulation forward by `dt` seconds of wall time.
    ///
    /// Runs zero or more fixed frames; the remainder carries over.
    pub fn step(&mut self, dt: f32) {
        let fixed_dt = self.config().fixed_timestep;

        self.time_accumulator += dt;

        while self.time_accumulator >= fixed_dt {
            self.advance(fixed_dt);
            self.time_accumulator -= fixed_dt;
        }
    }

    pub fn keyframe(&self) -> Keyframe {
        Keyframe::from_world(&self.world, self.time)
    }

    pub fn game_state(&self) -> GameState {
        self.world.get_resource::<GameState>().copied().unwrap_or_default()
    }

    pub fn is_game_over(&self) -> bool {
        self.game_state() == GameState::GameOver
    }

    pub fn user_entity(&self) -> Option<Entity> {
        entity::user_entity(&self.world)
    }

    pub fn config(&self) -> &SimConfig {
        self.world.resource::<SimConfig>()
    }

    /// Replace the input collaborator.
    pub fn set_input(&mut self, source: Box<dyn InputSource>) {
        self.world.insert_resource(InputState(source));
    }

    pub fn spawn_user(&mut self, position: Vec2) -> Entity {
        spawn::spawn_user(&mut self.world, position)
    }

    pub fn spawn_ai(&mut self, position: Vec2, velocity: Vec2) -> Entity {
        spawn::spawn_ai(&mut self.world, position, velocity)
    }

    /// Fire `shooter`'s weapon at `target` right now.
    pub fn fire_at(&mut self, shooter: Entity, target: Vec2) -> Option<Entity> {
        spawn::fire_at(&mut self.world, shooter, target)
    }

    pub fn health(&self, entity: Entity) -> Option<&Health> {
        entity::capability::<Health>(&self.world, entity)
    }

    pub fn is_active(&self, entity: Entity) -> bool {
        entity::is_active(&self.world, entity)
    }

    pub fn entity_count(&self) -> usize {
        self.world.get_resource::<entity::Registry>().map_or(0, |r| r.len())
    }

    /// Get the current tick number.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Get the elapsed simulation time.
    pub fn current_time(&self) -> f32 {
        self.time
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Tear down the worker pools, waiting at most the configured timeout
    /// for each. Returns false if any worker had to be abandoned.
    pub fn shutdown(mut self) -> bool {
        let timeout = Duration::from_millis(self.config().shutdown_timeout_ms);
        match self.world.remove_resource::<WorkerPools>() {
            Some(pools) => {
                let clean = pools.shutdown(timeout);
                log::info!("simulation shut down after {} ticks", self.tick);
                clean
            }
            None => true,
        }
    }
}
