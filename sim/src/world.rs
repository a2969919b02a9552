//! Keyframe snapshot types.
//!
//! A `Keyframe` is the per-tick view a recording or rendering front end
//! reads: identity, position, shape and health of every active entity that
//! has a Transform. One keyframe serializes to one JSON line.

use crate::components::*;
use crate::entity;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Snapshot of a single entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Entity name.
    pub id: String,
    pub x: f32,
    pub y: f32,
    /// Shape name, `NONE` when the entity has no Render capability.
    pub rt: String,
    pub w: f32,
    pub h: f32,
    pub color: [f32; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hp: Option<i32>,
    #[serde(rename = "maxHp", default, skip_serializing_if = "Option::is_none")]
    pub max_hp: Option<i32>,
}

/// All visible entities at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    /// Elapsed simulation time in seconds.
    pub t: f32,
    pub entities: Vec<EntitySnapshot>,
}

impl Keyframe {
    /// Capture the active entities in registry order.
    pub fn from_world(world: &World, t: f32) -> Self {
        let entities = entity::live_entities(world)
            .into_iter()
            .filter(|&e| entity::is_active(world, e))
            .filter_map(|e| {
                let transform = world.get::<Transform>(e)?;
                let (rt, size, color) = match world.get::<Render>(e) {
                    Some(render) => (render.shape.as_str(), render.size, render.color.to_array()),
                    None => ("NONE", glam::Vec2::ZERO, [1.0; 4]),
                };
                let health = world.get::<Health>(e);
                Some(EntitySnapshot {
                    id: entity::name(world, e).unwrap_or_default().to_string(),
                    x: transform.position.x,
                    y: transform.position.y,
                    rt: rt.to_string(),
                    w: size.x,
                    h: size.y,
                    color,
                    hp: health.map(|h| h.current()),
                    max_hp: health.map(|h| h.max()),
                })
            })
            .collect();
        Self { t, entities }
    }

    /// Serialize to a single JSON line, without the trailing newline.
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}
