//! Frame pipeline stages.
//!
//! Every stage is an exclusive system over the whole world. They run
//! chained, each finishing before the next starts:
//!
//! 1. `begin_frame_stage` - note entities already inactive
//! 2. `capability_update_stage` - bullet aging, shooting
//! 3. `user_input_stage` - user movement
//! 4. `wander_stage` - AI target refresh
//! 5. `avoidance_stage` - AI repulsion (parallel above the threshold)
//! 6. `physics_stage` - integration and boundaries (parallel)
//! 7. `melee_collision_stage`
//! 8. `projectile_collision_stage`
//! 9. `cleanup_stage` - removal from the registry
//! 10. `game_state_stage`

use crate::error::SimError;
use crate::pool::WorkerPool;
use bevy_ecs::prelude::*;
use std::time::Duration;

pub mod ai;
pub mod collision;
pub mod control;
pub mod dispatch;
pub mod lifecycle;
pub mod physics;
pub mod serialization;

pub use ai::{avoidance_stage, wander_stage, SimRng};
pub use collision::{game_state_stage, melee_collision_stage, projectile_collision_stage};
pub use control::user_input_stage;
pub use dispatch::capability_update_stage;
pub use lifecycle::{begin_frame_stage, cleanup_stage, GameState};
pub use physics::{physics_stage, DeltaTime};

/// One pool per parallel stage, created with the simulation.
#[derive(Resource, Debug)]
pub struct WorkerPools {
    pub avoidance: WorkerPool,
    pub physics: WorkerPool,
}

impl WorkerPools {
    pub fn new(workers: usize) -> Result<Self, SimError> {
        let avoidance = WorkerPool::new("avoidance", workers)
            .map_err(|source| SimError::Pool { name: "avoidance", source })?;
        let physics = WorkerPool::new("physics", workers)
            .map_err(|source| SimError::Pool { name: "physics", source })?;
        Ok(Self { avoidance, physics })
    }

    /// Tear down both pools. Returns false if either had to abandon workers.
    pub fn shutdown(self, timeout: Duration) -> bool {
        let avoidance = self.avoidance.shutdown(timeout);
        let physics = self.physics.shutdown(timeout);
        avoidance && physics
    }
}
