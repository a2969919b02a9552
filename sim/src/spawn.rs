//! Entity factories.
//!
//! Scene assembly normally lives outside the core; these helpers build the
//! standard user, AI and projectile entities so front ends, tests and the
//! shooting capability all agree on their layout.

use crate::components::*;
use crate::entity::{self, add_capability};
use bevy_ecs::prelude::*;
use glam::Vec2;

/// Bullets leave the muzzle this far in front of the shooter.
pub const MUZZLE_OFFSET: f32 = 20.0;

pub const USER_BULLET_COLOR: Color = Color::new(0.0, 0.5, 1.0, 1.0);
pub const AI_BULLET_COLOR: Color = Color::new(1.0, 0.3, 0.3, 1.0);

/// The user-controlled entity: manual fire, 100 hp.
pub fn spawn_user(world: &mut World, position: Vec2) -> Entity {
    let user = entity::spawn(world, "Player", Role::User);
    add_capability(world, user, Transform::new(position));
    add_capability(
        world,
        user,
        Render::new(Shape::Rectangle, Vec2::new(16.0, 20.0), Color::new(1.0, 0.0, 0.0, 1.0)),
    );
    add_capability(world, user, Physics::new(1.0).with_friction(0.95));
    add_capability(world, user, Health::new(100));
    add_capability(world, user, Shooting::new(1.0, 200.0, 15, false));
    user
}

/// An AI opponent that auto-fires at the user: 50 hp.
pub fn spawn_ai(world: &mut World, position: Vec2, velocity: Vec2) -> Entity {
    let ai = entity::spawn_numbered(world, "AIPlayer", Role::Ai);
    add_capability(world, ai, Transform::new(position));
    add_capability(
        world,
        ai,
        Render::new(Shape::Rectangle, Vec2::new(20.0, 20.0), Color::new(0.0, 0.8, 1.0, 1.0)),
    );
    add_capability(
        world,
        ai,
        Physics::new(0.5).with_velocity(velocity).with_friction(0.98),
    );
    add_capability(world, ai, Health::new(50));
    add_capability(world, ai, Shooting::new(5.0, 100.0, 10, true));
    ai
}

/// Non-interactive scenery.
pub fn spawn_decoration(world: &mut World, position: Vec2) -> Entity {
    let decoration = entity::spawn_numbered(world, "Decoration", Role::Decoration);
    add_capability(world, decoration, Transform::new(position));
    add_capability(
        world,
        decoration,
        Render::new(Shape::Circle, Vec2::new(5.0, 5.0), Color::new(0.5, 0.5, 1.0, 0.8)),
    );
    decoration
}

/// Register a projectile fired by `shooter` from `origin` along the unit
/// vector `direction`.
pub fn spawn_bullet(
    world: &mut World,
    shooter: Entity,
    origin: Vec2,
    direction: Vec2,
    speed: f32,
    damage: i32,
) -> Entity {
    let color = if entity::role(world, shooter) == Some(Role::User) {
        USER_BULLET_COLOR
    } else {
        AI_BULLET_COLOR
    };
    let bullet = entity::spawn_numbered(world, "Bullet", Role::Projectile);
    add_capability(world, bullet, Transform::new(origin + direction * MUZZLE_OFFSET));
    add_capability(world, bullet, Render::new(Shape::Circle, Vec2::new(8.0, 8.0), color));
    add_capability(
        world,
        bullet,
        Physics::new(0.1).with_velocity(direction * speed).with_friction(1.0),
    );
    add_capability(world, bullet, Bullet::new(damage, shooter));
    bullet
}

/// Fire `shooter`'s weapon toward `target`.
///
/// Ignores the fire timer; callers decide when a shot is allowed. Returns
/// `None` if the shooter lacks a Transform or Shooting capability, or if
/// the target sits exactly on the shooter.
pub fn fire_at(world: &mut World, shooter: Entity, target: Vec2) -> Option<Entity> {
    let origin = entity::capability::<Transform>(world, shooter)?.position;
    let shooting = *entity::capability::<Shooting>(world, shooter)?;
    let direction = (target - origin).try_normalize()?;
    Some(spawn_bullet(
        world,
        shooter,
        origin,
        direction,
        shooting.bullet_speed(),
        shooting.bullet_damage(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_at_spawns_bullet_ahead_of_shooter() {
        let mut world = World::new();
        let user = spawn_user(&mut world, Vec2::new(100.0, 100.0));

        let bullet = fire_at(&mut world, user, Vec2::new(300.0, 100.0)).unwrap();

        let transform = entity::capability::<Transform>(&world, bullet).unwrap();
        assert!((transform.position - Vec2::new(120.0, 100.0)).length() < 1e-4);

        let physics = entity::capability::<Physics>(&world, bullet).unwrap();
        assert!((physics.velocity - Vec2::new(200.0, 0.0)).length() < 1e-3);
        assert_eq!(physics.friction(), 1.0);

        let b = entity::capability::<Bullet>(&world, bullet).unwrap();
        assert_eq!(b.shooter, user);
        assert_eq!(b.damage, 15);
        assert!(!b.has_hit());

        let render = entity::capability::<Render>(&world, bullet).unwrap();
        assert_eq!(render.color, USER_BULLET_COLOR);
        assert_eq!(entity::name(&world, bullet), Some("Bullet0"));
    }

    #[test]
    fn test_fire_at_own_position_is_refused() {
        let mut world = World::new();
        let ai = spawn_ai(&mut world, Vec2::new(50.0, 50.0), Vec2::ZERO);
        assert!(fire_at(&mut world, ai, Vec2::new(50.0, 50.0)).is_none());
    }
}
