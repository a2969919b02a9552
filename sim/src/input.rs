//! Input collaborator interface.
//!
//! The core never polls devices. A front end implements [`InputSource`] and
//! installs it with [`crate::Simulation::set_input`]; the user-input stage
//! and manual shooting query it once per frame.

use bevy_ecs::prelude::*;
use glam::Vec2;
use std::collections::HashSet;

/// Abstract actions the core understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Fire,
}

pub trait InputSource: Send + Sync {
    fn is_pressed(&self, action: Action) -> bool;
    fn is_just_pressed(&self, action: Action) -> bool;
    /// Pointer position in world units.
    fn pointer(&self) -> Vec2;
}

/// Input source that never reports anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInput;

impl InputSource for NoInput {
    fn is_pressed(&self, _action: Action) -> bool {
        false
    }

    fn is_just_pressed(&self, _action: Action) -> bool {
        false
    }

    fn pointer(&self) -> Vec2 {
        Vec2::ZERO
    }
}

/// Input source driven from code, for scripted runs and tests.
#[derive(Debug, Default, Clone)]
pub struct ScriptedInput {
    pub held: HashSet<Action>,
    pub just_pressed: HashSet<Action>,
    pub pointer: Vec2,
}

impl ScriptedInput {
    pub fn holding(actions: impl IntoIterator<Item = Action>) -> Self {
        Self {
            held: actions.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn with_pointer(mut self, pointer: Vec2) -> Self {
        self.pointer = pointer;
        self
    }
}

impl InputSource for ScriptedInput {
    fn is_pressed(&self, action: Action) -> bool {
        self.held.contains(&action)
    }

    fn is_just_pressed(&self, action: Action) -> bool {
        self.just_pressed.contains(&action)
    }

    fn pointer(&self) -> Vec2 {
        self.pointer
    }
}

/// Resource holding the installed input source.
#[derive(Resource)]
pub struct InputState(pub Box<dyn InputSource>);

impl Default for InputState {
    fn default() -> Self {
        Self(Box::new(NoInput))
    }
}

impl InputState {
    /// Unit direction from the held move actions, or zero.
    pub fn move_direction(&self) -> Vec2 {
        let mut direction = Vec2::ZERO;
        if self.0.is_pressed(Action::MoveUp) {
            direction.y -= 1.0;
        }
        if self.0.is_pressed(Action::MoveDown) {
            direction.y += 1.0;
        }
        if self.0.is_pressed(Action::MoveLeft) {
            direction.x -= 1.0;
        }
        if self.0.is_pressed(Action::MoveRight) {
            direction.x += 1.0;
        }
        direction.normalize_or_zero()
    }
}
