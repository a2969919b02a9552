//! Physics integrator - gravity, friction, velocity and position, then the
//! arena boundary policy.
//!
//! ## Parallelization Strategy
//!
//! The stage runs in three phases, like the gather/compute/apply split used
//! by the combat code:
//!
//! 1. **Gather** - copy the state of every enabled Physics capability on an
//!    active entity with a Transform into a [`Body`], in registry order.
//! 2. **Integrate** - the physics [`WorkerPool`](crate::pool::WorkerPool)
//!    splits the bodies into contiguous batches; each batch only touches its
//!    own bodies.
//! 3. **Apply** - write positions, velocities and deactivations back.
//!
//! A batch that fails (for instance a body whose state went non-finite)
//! leaves its bodies untouched, so those entities simply do not move this
//! frame.

use crate::components::*;
use crate::config::SimConfig;
use crate::entity;
use crate::error::BatchError;
use crate::pool;
use crate::systems::WorkerPools;
use bevy_ecs::prelude::*;
use glam::Vec2;

/// Resource containing the delta time for the current frame.
#[derive(Resource, Default)]
pub struct DeltaTime(pub f32);

/// Arena rectangle and boundary tuning, copied out of [`SimConfig`].
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    pub width: f32,
    pub height: f32,
    pub inset: f32,
}

impl Bounds {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            width: config.screen_width,
            height: config.screen_height,
            inset: config.boundary_inset,
        }
    }

    /// True when `p` lies inside `[0, width] x [0, height]`.
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= 0.0 && p.x <= self.width && p.y >= 0.0 && p.y <= self.height
    }
}

/// Per-entity integration state.
#[derive(Debug, Clone, Copy)]
pub struct Body {
    pub entity: Entity,
    pub position: Vec2,
    pub velocity: Vec2,
    pub acceleration: Vec2,
    pub friction: f32,
    pub gravity: Option<Vec2>,
    pub is_bullet: bool,
    /// Set when the body left the arena and its entity must deactivate.
    pub leaving: bool,
}

/// Advance one body by `dt` and apply the boundary policy.
pub fn integrate(body: &mut Body, dt: f32, bounds: &Bounds) -> Result<(), BatchError> {
    let mut acceleration = body.acceleration;
    if let Some(gravity) = body.gravity {
        acceleration += gravity;
    }

    body.velocity = (body.velocity + acceleration * dt) * body.friction;
    body.position += body.velocity * dt;
    body.acceleration = Vec2::ZERO;

    if !body.position.is_finite() {
        return Err(BatchError::NonFinite {
            entity: body.entity,
            quantity: "position",
        });
    }
    if !body.velocity.is_finite() {
        return Err(BatchError::NonFinite {
            entity: body.entity,
            quantity: "velocity",
        });
    }

    apply_boundary(body, bounds);
    Ok(())
}

/// Projectiles that leave the arena are flagged for deactivation; every
/// other body bounces off the inset walls and is clamped inside them.
pub fn apply_boundary(body: &mut Body, bounds: &Bounds) {
    if body.is_bullet {
        if !bounds.contains(body.position) {
            body.leaving = true;
        }
        return;
    }

    let max_x = bounds.width - bounds.inset;
    let max_y = bounds.height - bounds.inset;

    if body.position.x <= 0.0 || body.position.x >= max_x {
        body.velocity.x = -body.velocity.x;
    }
    if body.position.y <= 0.0 || body.position.y >= max_y {
        body.velocity.y = -body.velocity.y;
    }

    body.position.x = body.position.x.max(0.0).min(max_x);
    body.position.y = body.position.y.max(0.0).min(max_y);
}

/// Copy out every body the integrator should move this frame.
pub fn gather_bodies(world: &World) -> Vec<Body> {
    entity::owners_of::<Physics>(world)
        .into_iter()
        .filter_map(|e| {
            let physics = world.get::<Physics>(e)?;
            if !physics.is_enabled() {
                return None;
            }
            let Some(transform) = world.get::<Transform>(e) else {
                log::trace!("{e} has Physics but no Transform, skipped");
                return None;
            };
            Some(Body {
                entity: e,
                position: transform.position,
                velocity: physics.velocity,
                acceleration: physics.acceleration,
                friction: physics.friction(),
                gravity: physics.use_gravity.then_some(physics.gravity),
                is_bullet: world.get::<Bullet>(e).is_some(),
                leaving: false,
            })
        })
        .collect()
}

fn apply_bodies(world: &mut World, bodies: &[Body]) {
    for body in bodies {
        if let Some(mut transform) = world.get_mut::<Transform>(body.entity) {
            transform.position = body.position;
        }
        if let Some(mut physics) = world.get_mut::<Physics>(body.entity) {
            physics.velocity = body.velocity;
            physics.acceleration = body.acceleration;
        }
        if body.leaving {
            entity::set_active(world, body.entity, false);
        }
    }
}

/// Integrate every enabled Physics capability on the physics pool.
pub fn physics_stage(world: &mut World) {
    let dt = world.get_resource::<DeltaTime>().map(|d| d.0).unwrap_or(0.0);
    let bounds = world
        .get_resource::<SimConfig>()
        .map(Bounds::from_config)
        .unwrap_or_else(|| Bounds::from_config(&SimConfig::default()));

    let mut bodies = gather_bodies(world);
    if bodies.is_empty() {
        return;
    }

    let integrate_batch = |_start: usize, batch: &mut [Body]| {
        batch.iter_mut().try_for_each(|body| integrate(body, dt, &bounds))
    };
    match world.get_resource::<WorkerPools>() {
        Some(pools) => {
            pools.physics.run("physics", &mut bodies, integrate_batch);
        }
        None => {
            pool::run_single("physics", &mut bodies, integrate_batch);
        }
    }

    apply_bodies(world, &bodies);
}
