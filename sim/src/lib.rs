//! Arena Sim - Simulation Core
//!
//! A fixed-pipeline 2D arena simulation: capability-based entities, a
//! parallel physics integrator, parallel AI avoidance, melee and projectile
//! collision, and a Playing/GameOver state machine.
//! Uses `bevy_ecs` for entity storage and `rayon` for the worker pools.

pub mod api;
pub mod components;
pub mod config;
pub mod entity;
pub mod error;
pub mod input;
pub mod pool;
pub mod spawn;
pub mod systems;
pub mod world;

pub use api::Simulation;
pub use components::*;
pub use config::SimConfig;
pub use error::{BatchError, ConfigError, SimError};
pub use input::{Action, InputSource, NoInput, ScriptedInput};
pub use systems::GameState;
pub use world::{EntitySnapshot, Keyframe};
