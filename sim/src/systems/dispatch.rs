//! Per-frame capability updates.
//!
//! Walks the registry in order and, for each active entity, every enabled
//! capability in attachment order. Only Bullet and Shooting do anything
//! per frame. Entities spawned while the walk runs (fresh bullets) are
//! first updated on the next frame.

use crate::components::*;
use crate::config::SimConfig;
use crate::entity;
use crate::input::{Action, InputState};
use crate::spawn;
use crate::systems::physics::DeltaTime;
use bevy_ecs::prelude::*;
use glam::Vec2;

pub fn capability_update_stage(world: &mut World) {
    let dt = world.get_resource::<DeltaTime>().map_or(0.0, |d| d.0);
    let lifetime = world
        .get_resource::<SimConfig>()
        .map_or(SimConfig::default().bullet_lifetime, |c| c.bullet_lifetime);

    for e in entity::live_entities(world) {
        let kinds = match world.get::<EntityInfo>(e) {
            Some(info) if info.active => info.capabilities.clone(),
            _ => continue,
        };
        for kind in kinds {
            if !entity::is_active(world, e) {
                break;
            }
            match kind {
                CapabilityKind::Bullet => update_bullet(world, e, dt, lifetime),
                CapabilityKind::Shooting => update_shooting(world, e, dt),
                _ => {}
            }
        }
    }
}

fn update_bullet(world: &mut World, e: Entity, dt: f32, lifetime: f32) {
    let expired = match world.get_mut::<Bullet>(e) {
        Some(mut bullet) if bullet.is_enabled() => bullet.age(dt, lifetime),
        Some(_) => return,
        None => {
            log::trace!("{e} lists Bullet but has none");
            return;
        }
    };
    if expired {
        entity::set_active(world, e, false);
        log::debug!("{e} expired");
    }
}

fn update_shooting(world: &mut World, e: Entity, dt: f32) {
    let auto_fire = match world.get_mut::<Shooting>(e) {
        Some(mut shooting) if shooting.is_enabled() => {
            shooting.tick(dt);
            if !shooting.can_fire() {
                return;
            }
            shooting.auto_fire
        }
        _ => return,
    };

    if auto_fire {
        let Some(target) = auto_target(world, e) else {
            return;
        };
        spawn::fire_at(world, e, target);
        reset_timer(world, e);
    } else {
        let pointer = match world.get_resource::<InputState>() {
            Some(input) if input.0.is_pressed(Action::Fire) => input.0.pointer(),
            _ => return,
        };
        spawn::fire_at(world, e, pointer);
        reset_timer(world, e);
    }
}

fn reset_timer(world: &mut World, e: Entity) {
    if let Some(mut shooting) = world.get_mut::<Shooting>(e) {
        shooting.reset_timer();
    }
}

/// The user shoots at the first active AI; everyone else shoots at the
/// user while it is active.
fn auto_target(world: &World, shooter: Entity) -> Option<Vec2> {
    let target = if entity::role(world, shooter) == Some(Role::User) {
        entity::active_ai(world).into_iter().next()?
    } else {
        entity::user_entity(world).filter(|&u| entity::is_active(world, u))?
    };
    entity::capability::<Transform>(world, target).map(|t| t.position)
}
