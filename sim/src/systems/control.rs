//! User movement from the input collaborator.

use crate::components::*;
use crate::config::SimConfig;
use crate::entity;
use crate::input::InputState;
use crate::systems::ai::playing;
use bevy_ecs::prelude::*;

/// Steer the user entity from held move actions, then keep it on screen.
pub fn user_input_stage(world: &mut World) {
    if !playing(world) {
        return;
    }
    let Some(user) = entity::user_entity(world) else {
        return;
    };
    let config = world.get_resource::<SimConfig>().cloned().unwrap_or_default();
    let direction = world
        .get_resource::<InputState>()
        .map(|input| input.move_direction())
        .unwrap_or_default();

    if direction != glam::Vec2::ZERO {
        if let Some(mut physics) = world.get_mut::<Physics>(user) {
            physics.velocity = direction * config.user_speed;
        }
    }

    if let Some(mut transform) = world.get_mut::<Transform>(user) {
        let max_x = (config.screen_width - config.user_clamp_inset).max(0.0);
        let max_y = (config.screen_height - config.user_clamp_inset).max(0.0);
        transform.position.x = transform.position.x.clamp(0.0, max_x);
        transform.position.y = transform.position.y.clamp(0.0, max_y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Action, ScriptedInput};
    use crate::spawn;
    use crate::systems::lifecycle::GameState;
    use glam::Vec2;

    fn world() -> World {
        let mut world = World::new();
        world.insert_resource(SimConfig::default());
        world.insert_resource(GameState::Playing);
        world
    }

    #[test]
    fn test_held_keys_set_velocity() {
        let mut world = world();
        let user = spawn::spawn_user(&mut world, Vec2::new(100.0, 100.0));
        world.insert_resource(InputState(Box::new(ScriptedInput::holding([Action::MoveDown]))));

        user_input_stage(&mut world);

        let velocity = world.get::<Physics>(user).unwrap().velocity;
        assert!((velocity - Vec2::new(0.0, 200.0)).length() < 1e-4);
    }

    #[test]
    fn test_no_input_keeps_velocity() {
        let mut world = world();
        let user = spawn::spawn_user(&mut world, Vec2::new(100.0, 100.0));
        world.get_mut::<Physics>(user).unwrap().velocity = Vec2::new(7.0, 0.0);

        user_input_stage(&mut world);

        assert_eq!(world.get::<Physics>(user).unwrap().velocity, Vec2::new(7.0, 0.0));
    }

    #[test]
    fn test_position_clamped_to_screen() {
        let mut world = world();
        let user = spawn::spawn_user(&mut world, Vec2::new(1915.0, -4.0));

        user_input_stage(&mut world);

        let position = world.get::<Transform>(user).unwrap().position;
        assert!((position - Vec2::new(1900.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_ignored_after_game_over() {
        let mut world = world();
        world.insert_resource(GameState::GameOver);
        let user = spawn::spawn_user(&mut world, Vec2::new(100.0, 100.0));
        world.insert_resource(InputState(Box::new(ScriptedInput::holding([Action::MoveLeft]))));

        user_input_stage(&mut world);

        assert_eq!(world.get::<Physics>(user).unwrap().velocity, Vec2::ZERO);
    }
}
