//! Simulation tuning and arena dimensions.
//!
//! All fields have defaults, so a JSON file only needs to name the values it
//! overrides:
//!
//! ```json
//! { "screen_width": 1280, "screen_height": 720, "seed": 7 }
//! ```

use crate::error::ConfigError;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the arena simulation.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Arena width in world units.
    pub screen_width: f32,
    /// Arena height in world units.
    pub screen_height: f32,
    /// Fixed timestep in seconds used by [`crate::Simulation::step`].
    pub fixed_timestep: f32,

    /// Non-projectile bodies bounce off `dimension - boundary_inset`.
    pub boundary_inset: f32,
    /// The user entity is clamped to `dimension - user_clamp_inset`.
    pub user_clamp_inset: f32,
    /// Projectiles further than this outside the arena are removed.
    pub bullet_cleanup_margin: f32,
    /// Seconds a projectile lives before it deactivates itself.
    pub bullet_lifetime: f32,

    /// Neighbours closer than this push each other away.
    pub avoidance_radius: f32,
    /// Peak contribution of one neighbour, also the cap on the summed push.
    pub avoidance_strength: f32,
    /// Blend factor from current toward avoidance velocity.
    pub avoidance_lerp: f32,
    /// Multiplier applied to `dt` when scaling the avoidance push.
    pub avoidance_time_scale: f32,
    /// Speed cap for AI-controlled entities.
    pub max_ai_speed: f32,
    /// AI count at or above which avoidance runs on the worker pool.
    pub parallel_threshold: usize,

    /// Wander targets are drawn from `[-wander_range, wander_range]²`.
    pub wander_range: f32,
    /// Blend factor from current toward wander velocity.
    pub wander_lerp: f32,
    /// Shortest time between wander target re-rolls.
    pub wander_min_interval: f32,
    /// Longest time between wander target re-rolls.
    pub wander_max_interval: f32,

    /// Contact distance for melee damage.
    pub melee_range: f32,
    /// Damage dealt to the user per frame of contact.
    pub melee_damage: i32,
    /// Distance at which a projectile connects.
    pub projectile_hit_radius: f32,
    /// Speed of the user entity while a move action is held.
    pub user_speed: f32,

    /// Worker threads per pool. `None` derives it from available parallelism.
    pub worker_count: Option<usize>,
    /// Seed for the wander RNG.
    pub seed: u64,
    /// Bounded wait for pool teardown, in milliseconds.
    pub shutdown_timeout_ms: u64,
    /// Remove entities that stayed inactive for a whole frame.
    pub sweep_inactive: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            screen_width: 1920.0,
            screen_height: 1080.0,
            fixed_timestep: 1.0 / 60.0,
            boundary_inset: 15.0,
            user_clamp_inset: 20.0,
            bullet_cleanup_margin: 50.0,
            bullet_lifetime: 3.0,
            avoidance_radius: 80.0,
            avoidance_strength: 50.0,
            avoidance_lerp: 0.15,
            avoidance_time_scale: 10.0,
            max_ai_speed: 150.0,
            parallel_threshold: 10,
            wander_range: 75.0,
            wander_lerp: 0.1,
            wander_min_interval: 2.0,
            wander_max_interval: 4.0,
            melee_range: 30.0,
            melee_damage: 1,
            projectile_hit_radius: 15.0,
            user_speed: 200.0,
            worker_count: None,
            seed: 0x5eed,
            shutdown_timeout_ms: 1000,
            sweep_inactive: true,
        }
    }
}

impl SimConfig {
    /// Parse a configuration from JSON and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Reject values the stages cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.screen_width > 0.0 && self.screen_height > 0.0) {
            return Err(ConfigError::Invalid {
                field: "screen_width/screen_height",
                reason: format!("{}x{} is not a positive size", self.screen_width, self.screen_height),
            });
        }
        if !(self.fixed_timestep > 0.0) {
            return Err(ConfigError::Invalid {
                field: "fixed_timestep",
                reason: format!("{} must be positive", self.fixed_timestep),
            });
        }
        if self.wander_max_interval < self.wander_min_interval {
            return Err(ConfigError::Invalid {
                field: "wander_max_interval",
                reason: format!(
                    "{} is shorter than wander_min_interval {}",
                    self.wander_max_interval, self.wander_min_interval
                ),
            });
        }
        if self.worker_count == Some(0) {
            return Err(ConfigError::Invalid {
                field: "worker_count",
                reason: "a pool needs at least one worker".to_string(),
            });
        }
        Ok(())
    }
}
