//! Collision resolver - melee contact and projectile hits.
//!
//! Both passes run after physics has moved everything for the frame and
//! are sequential. Melee contact only ever damages the user; AI entities
//! are not hurt by touching the user.

use crate::components::*;
use crate::config::SimConfig;
use crate::entity;
use crate::systems::lifecycle::{enter_game_over, GameState};
use bevy_ecs::prelude::*;
use glam::Vec2;

fn position(world: &World, e: Entity) -> Option<Vec2> {
    world.get::<Transform>(e).map(|t| t.position)
}

fn alive(world: &World, e: Entity) -> bool {
    world.get::<Health>(e).is_some_and(|h| !h.is_dead())
}

/// Damage the user for every living AI entity in contact with it.
///
/// Ends the game when the user's Health is already dead or missing on
/// entry, or reaches zero here.
pub fn melee_collision_stage(world: &mut World) {
    let config = world.get_resource::<SimConfig>().cloned().unwrap_or_default();
    let Some(user) = entity::user_entity(world) else {
        return;
    };

    if !alive(world, user) {
        enter_game_over(world, user);
        return;
    }
    let Some(user_transform) = world.get::<Transform>(user) else {
        log::trace!("user {user} has no Transform, melee skipped");
        return;
    };

    let contacts = entity::active_ai(world)
        .into_iter()
        .filter(|&ai| alive(world, ai))
        .filter_map(|ai| world.get::<Transform>(ai))
        .filter(|t| user_transform.distance_to(t) < config.melee_range)
        .count();

    if contacts == 0 {
        return;
    }

    let dead = match world.get_mut::<Health>(user) {
        Some(mut health) => {
            for _ in 0..contacts {
                health.take_damage(config.melee_damage);
            }
            health.is_dead()
        }
        None => false,
    };
    if dead {
        enter_game_over(world, user);
    }
}

/// Resolve `bullet` hitting `target`. Returns true if the hit registered,
/// in which case the bullet has been deactivated.
fn resolve_hit(world: &mut World, bullet_entity: Entity, target: Entity) -> bool {
    let Some(mut bullet) = world.get::<Bullet>(bullet_entity).copied() else {
        return false;
    };
    let hit = {
        let mut health = world.get_mut::<Health>(target);
        bullet.on_hit(target, health.as_deref_mut())
    };
    if !hit {
        return false;
    }
    if let Some(mut stored) = world.get_mut::<Bullet>(bullet_entity) {
        *stored = bullet;
    }
    entity::set_active(world, bullet_entity, false);
    log::debug!(
        "{} hit {target}, hp left {}",
        bullet_entity,
        world.get::<Health>(target).map_or(0, |h| h.current())
    );
    true
}

/// Apply projectile hits.
///
/// Shots from anyone but the user can only hit the user; the user's shots
/// can only hit AI entities. AI entities left dead by the user's fire are
/// deactivated straight away.
pub fn projectile_collision_stage(world: &mut World) {
    let radius = world
        .get_resource::<SimConfig>()
        .map_or(SimConfig::default().projectile_hit_radius, |c| c.projectile_hit_radius);
    let user = entity::user_entity(world);

    for bullet_entity in entity::owners_of::<Bullet>(world) {
        let Some(bullet) = world.get::<Bullet>(bullet_entity).copied() else {
            continue;
        };
        if bullet.has_hit() || !entity::is_active(world, bullet_entity) {
            continue;
        }
        let Some(bullet_pos) = position(world, bullet_entity) else {
            continue;
        };

        if Some(bullet.shooter) != user {
            let Some(user) = user else {
                continue;
            };
            if alive(world, user)
                && position(world, user).is_some_and(|p| bullet_pos.distance(p) < radius)
            {
                resolve_hit(world, bullet_entity, user);
            }
        } else {
            for ai in entity::active_ai(world) {
                if alive(world, ai) && position(world, ai).is_some_and(|p| bullet_pos.distance(p) < radius) {
                    resolve_hit(world, bullet_entity, ai);
                }
                if world.get::<Health>(ai).is_some_and(|h| h.is_dead()) {
                    entity::set_active(world, ai, false);
                }
            }
        }
    }
}

/// Stand-alone check used as the last stage of the frame.
pub fn user_is_lost(world: &World) -> Option<Entity> {
    let user = entity::user_entity(world)?;
    (!alive(world, user)).then_some(user)
}

/// End the game if the user's Health is dead or gone.
pub fn game_state_stage(world: &mut World) {
    if world.get_resource::<GameState>() == Some(&GameState::GameOver) {
        return;
    }
    if let Some(user) = user_is_lost(world) {
        enter_game_over(world, user);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawn;

    fn world() -> World {
        let mut world = World::new();
        world.insert_resource(SimConfig::default());
        world.insert_resource(GameState::Playing);
        world
    }

    fn hp(world: &World, e: Entity) -> i32 {
        world.get::<Health>(e).unwrap().current()
    }

    #[test]
    fn test_melee_damages_only_user() {
        let mut world = world();
        let user = spawn::spawn_user(&mut world, Vec2::new(100.0, 100.0));
        let near = spawn::spawn_ai(&mut world, Vec2::new(120.0, 100.0), Vec2::ZERO);
        let also_near = spawn::spawn_ai(&mut world, Vec2::new(100.0, 75.0), Vec2::ZERO);
        let far = spawn::spawn_ai(&mut world, Vec2::new(130.0, 100.0), Vec2::ZERO);

        melee_collision_stage(&mut world);

        assert_eq!(hp(&world, user), 98);
        assert_eq!(hp(&world, near), 50);
        assert_eq!(hp(&world, also_near), 50);
        assert_eq!(hp(&world, far), 50);
        assert_eq!(*world.resource::<GameState>(), GameState::Playing);
    }

    #[test]
    fn test_melee_kill_ends_game_once() {
        let mut world = world();
        let user = spawn::spawn_user(&mut world, Vec2::new(100.0, 100.0));
        world.get_mut::<Health>(user).unwrap().take_damage(99);
        spawn::spawn_ai(&mut world, Vec2::new(110.0, 100.0), Vec2::ZERO);

        melee_collision_stage(&mut world);

        assert_eq!(hp(&world, user), 0);
        assert!(!entity::is_active(&world, user));
        assert_eq!(*world.resource::<GameState>(), GameState::GameOver);
        assert_eq!(world.resource::<crate::systems::lifecycle::GameOverCount>().0, 1);

        melee_collision_stage(&mut world);
        game_state_stage(&mut world);
        assert_eq!(*world.resource::<GameState>(), GameState::GameOver);
        assert_eq!(world.resource::<crate::systems::lifecycle::GameOverCount>().0, 1);
    }

    #[test]
    fn test_missing_user_health_ends_game() {
        let mut world = world();
        let user = entity::spawn(&mut world, "Player", Role::User);
        entity::add_capability(&mut world, user, Transform::new(Vec2::ZERO));
        entity::add_capability(&mut world, user, Physics::default());

        melee_collision_stage(&mut world);

        assert_eq!(*world.resource::<GameState>(), GameState::GameOver);
    }

    #[test]
    fn test_dead_ai_does_not_bite() {
        let mut world = world();
        let user = spawn::spawn_user(&mut world, Vec2::new(100.0, 100.0));
        let ai = spawn::spawn_ai(&mut world, Vec2::new(105.0, 100.0), Vec2::ZERO);
        world.get_mut::<Health>(ai).unwrap().take_damage(50);

        melee_collision_stage(&mut world);

        assert_eq!(hp(&world, user), 100);
    }

    #[test]
    fn test_enemy_bullet_hits_user() {
        let mut world = world();
        let user = spawn::spawn_user(&mut world, Vec2::new(100.0, 100.0));
        let ai = spawn::spawn_ai(&mut world, Vec2::new(500.0, 500.0), Vec2::ZERO);
        let bullet = spawn::spawn_bullet(&mut world, ai, Vec2::new(90.0, 100.0), Vec2::X, 100.0, 10);
        // Muzzle offset puts the bullet at (110, 100).

        projectile_collision_stage(&mut world);

        assert_eq!(hp(&world, user), 90);
        assert!(!entity::is_active(&world, bullet));
        assert!(world.get::<Bullet>(bullet).unwrap().has_hit());

        // Reactivating the bullet cannot make it hit twice.
        entity::set_active(&mut world, bullet, true);
        projectile_collision_stage(&mut world);
        assert_eq!(hp(&world, user), 90);
    }

    #[test]
    fn test_user_bullet_never_hits_user() {
        let mut world = world();
        let user = spawn::spawn_user(&mut world, Vec2::new(100.0, 100.0));
        let bullet = spawn::spawn_bullet(&mut world, user, Vec2::new(80.0, 100.0), Vec2::X, 100.0, 10);

        projectile_collision_stage(&mut world);

        assert_eq!(hp(&world, user), 100);
        assert!(entity::is_active(&world, bullet));
        assert!(!world.get::<Bullet>(bullet).unwrap().has_hit());
    }

    #[test]
    fn test_user_bullet_kills_ai() {
        let mut world = world();
        let user = spawn::spawn_user(&mut world, Vec2::new(100.0, 100.0));
        let ai = spawn::spawn_ai(&mut world, Vec2::new(300.0, 100.0), Vec2::ZERO);
        world.get_mut::<Health>(ai).unwrap().take_damage(40);
        let bullet = spawn::spawn_bullet(&mut world, user, Vec2::new(275.0, 100.0), Vec2::X, 200.0, 15);

        projectile_collision_stage(&mut world);

        assert_eq!(hp(&world, ai), 0);
        assert!(!entity::is_active(&world, ai));
        assert!(!entity::is_active(&world, bullet));
    }

    #[test]
    fn test_user_bullet_hits_only_first_ai() {
        let mut world = world();
        let user = spawn::spawn_user(&mut world, Vec2::new(100.0, 100.0));
        let first = spawn::spawn_ai(&mut world, Vec2::new(300.0, 105.0), Vec2::ZERO);
        let second = spawn::spawn_ai(&mut world, Vec2::new(300.0, 95.0), Vec2::ZERO);
        spawn::spawn_bullet(&mut world, user, Vec2::new(280.0, 100.0), Vec2::X, 200.0, 15);

        projectile_collision_stage(&mut world);

        assert_eq!(hp(&world, first), 35);
        assert_eq!(hp(&world, second), 50);
    }
}
