//! Game state and entity lifecycle.
//!
//! Removal happens in three phases at the end of every frame: dead AI
//! entities, bullets that drifted off the arena, then entities that were
//! already inactive when the frame began.

use crate::components::*;
use crate::config::SimConfig;
use crate::entity;
use bevy_ecs::prelude::*;

/// Global play state. Only ever moves from `Playing` to `GameOver`.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameState {
    #[default]
    Playing,
    GameOver,
}

impl GameState {
    /// Switch to `GameOver`. Returns true only on the actual transition.
    pub fn end(&mut self) -> bool {
        if *self == GameState::GameOver {
            return false;
        }
        *self = GameState::GameOver;
        true
    }
}

/// Number of times the game-over transition fired. Never exceeds one.
#[derive(Resource, Debug, Default, Clone, Copy)]
pub struct GameOverCount(pub u32);

/// Entities that were inactive when the current frame began.
#[derive(Resource, Debug, Default)]
pub struct PendingSweep(pub Vec<Entity>);

/// Deactivate the user and move to `GameOver`, once.
pub fn enter_game_over(world: &mut World, user: Entity) {
    entity::set_active(world, user, false);
    let ended = world.get_resource_or_insert_with(GameState::default).end();
    if ended {
        world.get_resource_or_insert_with(GameOverCount::default).0 += 1;
        log::info!("game over: {} is down", entity::name(world, user).unwrap_or("user"));
    }
}

/// Record which entities start this frame inactive.
pub fn begin_frame_stage(world: &mut World) {
    let stale: Vec<Entity> = entity::live_entities(world)
        .into_iter()
        .filter(|&e| !entity::is_active(world, e))
        .filter(|&e| entity::role(world, e) != Some(Role::User))
        .collect();
    world.insert_resource(PendingSweep(stale));
}

/// Remove dead AI, escaped bullets and stale inactive entities.
pub fn cleanup_stage(world: &mut World) {
    let config = world.get_resource::<SimConfig>().cloned().unwrap_or_default();
    let margin = config.bullet_cleanup_margin;
    let mut removed = 0usize;

    let dead_ai: Vec<Entity> = entity::live_entities(world)
        .into_iter()
        .filter(|&e| entity::role(world, e) == Some(Role::Ai))
        .filter(|&e| world.get::<Health>(e).is_some_and(|h| h.is_dead()))
        .collect();
    removed += entity::remove_many(world, &dead_ai);

    let escaped: Vec<Entity> = entity::live_entities(world)
        .into_iter()
        .filter(|&e| world.get::<Bullet>(e).is_some())
        .filter(|&e| match world.get::<Transform>(e) {
            Some(t) => {
                let p = t.position;
                p.x < -margin
                    || p.x > config.screen_width + margin
                    || p.y < -margin
                    || p.y > config.screen_height + margin
            }
            None => true,
        })
        .collect();
    removed += entity::remove_many(world, &escaped);

    if config.sweep_inactive {
        let stale: Vec<Entity> = world
            .remove_resource::<PendingSweep>()
            .unwrap_or_default()
            .0
            .into_iter()
            .filter(|&e| entity::exists(world, e) && !entity::is_active(world, e))
            .collect();
        removed += entity::remove_many(world, &stale);
    }

    if removed > 0 {
        log::trace!("cleanup removed {removed} entities");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spawn;
    use glam::Vec2;

    fn world() -> World {
        let mut world = World::new();
        world.insert_resource(SimConfig::default());
        world.insert_resource(GameState::Playing);
        world
    }

    #[test]
    fn test_end_transitions_once() {
        let mut state = GameState::Playing;
        assert!(state.end());
        assert!(!state.end());
        assert_eq!(state, GameState::GameOver);
    }

    #[test]
    fn test_dead_ai_removed() {
        let mut world = world();
        let dead = spawn::spawn_ai(&mut world, Vec2::new(100.0, 100.0), Vec2::ZERO);
        let alive = spawn::spawn_ai(&mut world, Vec2::new(200.0, 100.0), Vec2::ZERO);
        world.get_mut::<Health>(dead).unwrap().take_damage(50);

        cleanup_stage(&mut world);

        assert!(!entity::exists(&world, dead));
        assert!(entity::exists(&world, alive));
        assert_eq!(entity::live_entities(&world), vec![alive]);
    }

    #[test]
    fn test_dead_user_is_kept() {
        let mut world = world();
        let user = spawn::spawn_user(&mut world, Vec2::new(100.0, 100.0));
        world.get_mut::<Health>(user).unwrap().take_damage(100);

        cleanup_stage(&mut world);

        assert!(entity::exists(&world, user));
    }

    #[test]
    fn test_escaped_bullets_removed() {
        let mut world = world();
        let user = spawn::spawn_user(&mut world, Vec2::new(100.0, 100.0));
        let inside = spawn::spawn_bullet(&mut world, user, Vec2::new(1900.0, 500.0), Vec2::X, 100.0, 1);
        let outside = spawn::spawn_bullet(&mut world, user, Vec2::new(1960.0, 500.0), Vec2::X, 100.0, 1);
        let above = spawn::spawn_bullet(&mut world, user, Vec2::new(500.0, -49.0), Vec2::NEG_Y, 100.0, 1);

        cleanup_stage(&mut world);

        // (1920, 500) sits within the margin, (1980, 500) and (500, -69) do not.
        assert!(entity::exists(&world, inside));
        assert!(!entity::exists(&world, outside));
        assert!(!entity::exists(&world, above));
    }

    #[test]
    fn test_inactive_entities_swept_next_frame() {
        let mut world = world();
        let ai = spawn::spawn_ai(&mut world, Vec2::new(100.0, 100.0), Vec2::ZERO);
        let deco = spawn::spawn_decoration(&mut world, Vec2::new(10.0, 10.0));

        begin_frame_stage(&mut world);
        entity::set_active(&mut world, deco, false);
        cleanup_stage(&mut world);
        // Deactivated mid-frame: survives this frame.
        assert!(entity::exists(&world, deco));

        begin_frame_stage(&mut world);
        cleanup_stage(&mut world);
        assert!(!entity::exists(&world, deco));
        assert!(entity::exists(&world, ai));
    }

    #[test]
    fn test_sweep_can_be_disabled() {
        let mut world = world();
        world.resource_mut::<SimConfig>().sweep_inactive = false;
        let deco = spawn::spawn_decoration(&mut world, Vec2::new(10.0, 10.0));
        entity::set_active(&mut world, deco, false);

        begin_frame_stage(&mut world);
        cleanup_stage(&mut world);

        assert!(entity::exists(&world, deco));
    }

    #[test]
    fn test_enter_game_over_deactivates_user() {
        let mut world = world();
        let user = spawn::spawn_user(&mut world, Vec2::ZERO);

        enter_game_over(&mut world, user);
        enter_game_over(&mut world, user);

        assert!(!entity::is_active(&world, user));
        assert_eq!(*world.resource::<GameState>(), GameState::GameOver);
        assert_eq!(world.resource::<GameOverCount>().0, 1);
    }
}
