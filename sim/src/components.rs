//! Capability components for the arena simulation.
//!
//! Every capability is a plain `bevy_ecs` component that also records the
//! entity it is attached to (`owner`) and whether it participates in
//! per-frame updates (`enabled`). Disabled capabilities stay attached.
//!
//! Ranges that must always hold are enforced by the setters: mass never
//! drops below 0.1, friction stays in `[0, 1]`, health stays in
//! `[0, max]`, and a projectile's `has_hit` flag only ever goes
//! `false -> true`.

use bevy_ecs::prelude::*;
use glam::Vec2;
use serde::{Deserialize, Serialize};

// ============================================================================
// CAPABILITY TABLE
// ============================================================================

/// The closed set of capability kinds an entity can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityKind {
    Transform,
    Physics,
    Health,
    Bullet,
    Shooting,
    Render,
}

/// Shared behaviour of every capability component.
pub trait Capability: Component + Sized {
    /// Slot this capability occupies in the owner's capability table.
    const KIND: CapabilityKind;

    fn owner(&self) -> Entity;
    fn set_owner(&mut self, owner: Entity);
    fn is_enabled(&self) -> bool;
    fn set_enabled(&mut self, enabled: bool);

    /// Hook run once when the capability is attached.
    fn initialize(&mut self) {}
}

/// A capability value of any kind, as accepted by
/// [`crate::entity::add_capability`].
#[derive(Debug, Clone)]
pub enum AnyCapability {
    Transform(Transform),
    Physics(Physics),
    Health(Health),
    Bullet(Bullet),
    Shooting(Shooting),
    Render(Render),
}

impl AnyCapability {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::Transform(_) => CapabilityKind::Transform,
            Self::Physics(_) => CapabilityKind::Physics,
            Self::Health(_) => CapabilityKind::Health,
            Self::Bullet(_) => CapabilityKind::Bullet,
            Self::Shooting(_) => CapabilityKind::Shooting,
            Self::Render(_) => CapabilityKind::Render,
        }
    }
}

macro_rules! capability_variant {
    ($ty:ident) => {
        impl From<$ty> for AnyCapability {
            fn from(value: $ty) -> Self {
                Self::$ty(value)
            }
        }

        impl Capability for $ty {
            const KIND: CapabilityKind = CapabilityKind::$ty;

            fn owner(&self) -> Entity {
                self.owner
            }

            fn set_owner(&mut self, owner: Entity) {
                self.owner = owner;
            }

            fn is_enabled(&self) -> bool {
                self.enabled
            }

            fn set_enabled(&mut self, enabled: bool) {
                self.enabled = enabled;
            }
        }
    };
}

capability_variant!(Transform);
capability_variant!(Physics);
capability_variant!(Health);
capability_variant!(Bullet);
capability_variant!(Render);

// Shooting has a non-default initialize hook, so it is spelled out.
impl From<Shooting> for AnyCapability {
    fn from(value: Shooting) -> Self {
        Self::Shooting(value)
    }
}

impl Capability for Shooting {
    const KIND: CapabilityKind = CapabilityKind::Shooting;

    fn owner(&self) -> Entity {
        self.owner
    }

    fn set_owner(&mut self, owner: Entity) {
        self.owner = owner;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn initialize(&mut self) {
        self.fire_timer = 0.0;
        log::debug!(
            "shooting attached to {} ({} fire)",
            self.owner,
            if self.auto_fire { "auto" } else { "manual" }
        );
    }
}

// ============================================================================
// IDENTITY
// ============================================================================

/// Role tag used by the stages to classify entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// The single user-controlled entity.
    User,
    /// An AI-controlled opponent.
    Ai,
    /// A projectile.
    Projectile,
    /// Scenery with no gameplay effect.
    Decoration,
    Other,
}

/// Identity and bookkeeping carried by every registered entity.
#[derive(Component, Debug, Clone)]
pub struct EntityInfo {
    /// Display name; not guaranteed unique.
    pub name: String,
    pub active: bool,
    pub role: Role,
    /// Attached capability kinds in attachment order, one entry per kind.
    pub capabilities: Vec<CapabilityKind>,
}

impl EntityInfo {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            active: true,
            role,
            capabilities: Vec::new(),
        }
    }
}

// ============================================================================
// SPATIAL / PHYSICS
// ============================================================================

/// 2D position.
#[derive(Component, Debug, Clone, Copy)]
pub struct Transform {
    owner: Entity,
    enabled: bool,
    pub position: Vec2,
}

impl Transform {
    pub fn new(position: Vec2) -> Self {
        Self {
            owner: Entity::PLACEHOLDER,
            enabled: true,
            position,
        }
    }

    pub fn distance_to(&self, other: &Transform) -> f32 {
        self.position.distance(other.position)
    }
}

/// Newtonian motion state.
#[derive(Component, Debug, Clone, Copy)]
pub struct Physics {
    owner: Entity,
    enabled: bool,
    pub velocity: Vec2,
    pub acceleration: Vec2,
    mass: f32,
    friction: f32,
    pub use_gravity: bool,
    pub gravity: Vec2,
}

impl Physics {
    pub const MIN_MASS: f32 = 0.1;

    pub fn new(mass: f32) -> Self {
        let mut physics = Self {
            owner: Entity::PLACEHOLDER,
            enabled: true,
            velocity: Vec2::ZERO,
            acceleration: Vec2::ZERO,
            mass: 1.0,
            friction: 0.9,
            use_gravity: false,
            gravity: Vec2::new(0.0, 9.8),
        };
        physics.set_mass(mass);
        physics
    }

    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.set_friction(friction);
        self
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn set_mass(&mut self, mass: f32) {
        // f32::max ignores NaN, so NaN lands on the floor.
        self.mass = mass.max(Self::MIN_MASS);
    }

    pub fn friction(&self) -> f32 {
        self.friction
    }

    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction.clamp(0.0, 1.0);
        if self.friction.is_nan() {
            self.friction = 0.0;
        }
    }

    /// Accumulate a force for this frame only.
    pub fn apply_force(&mut self, force: Vec2) {
        self.acceleration += force / self.mass;
    }

    pub fn apply_impulse(&mut self, impulse: Vec2) {
        self.velocity += impulse / self.mass;
    }
}

impl Default for Physics {
    fn default() -> Self {
        Self::new(1.0)
    }
}

// ============================================================================
// COMBAT
// ============================================================================

/// Hit points.
#[derive(Component, Debug, Clone, Copy)]
pub struct Health {
    owner: Entity,
    enabled: bool,
    current: i32,
    max: i32,
}

impl Health {
    pub fn new(max: i32) -> Self {
        let max = max.max(0);
        Self {
            owner: Entity::PLACEHOLDER,
            enabled: true,
            current: max,
            max,
        }
    }

    pub fn current(&self) -> i32 {
        self.current
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn fraction(&self) -> f32 {
        if self.max <= 0 {
            0.0
        } else {
            self.current as f32 / self.max as f32
        }
    }

    pub fn is_dead(&self) -> bool {
        self.current <= 0
    }

    /// Negative amounts are ignored.
    pub fn take_damage(&mut self, amount: i32) {
        self.current = self.current.saturating_sub(amount.max(0)).max(0);
    }

    /// Negative amounts are ignored.
    pub fn heal(&mut self, amount: i32) {
        self.current = self.current.saturating_add(amount.max(0)).min(self.max);
    }
}

/// Projectile state.
#[derive(Component, Debug, Clone, Copy)]
pub struct Bullet {
    owner: Entity,
    enabled: bool,
    pub damage: i32,
    /// Entity that fired this projectile.
    pub shooter: Entity,
    pub lifetime: f32,
    has_hit: bool,
}

impl Bullet {
    pub fn new(damage: i32, shooter: Entity) -> Self {
        Self {
            owner: Entity::PLACEHOLDER,
            enabled: true,
            damage,
            shooter,
            lifetime: 0.0,
            has_hit: false,
        }
    }

    pub fn has_hit(&self) -> bool {
        self.has_hit
    }

    /// Advance the lifetime. Returns true once the projectile has outlived
    /// `limit` and should be deactivated.
    pub fn age(&mut self, dt: f32, limit: f32) -> bool {
        if self.has_hit {
            return false;
        }
        self.lifetime += dt;
        self.lifetime > limit
    }

    /// Resolve a hit on `target`.
    ///
    /// Returns true when the hit registered, in which case the caller must
    /// deactivate the projectile. Hits on the shooter and repeated hits are
    /// ignored.
    pub fn on_hit(&mut self, target: Entity, health: Option<&mut Health>) -> bool {
        if self.has_hit || target == self.shooter {
            return false;
        }
        if let Some(health) = health {
            if !health.is_dead() {
                health.take_damage(self.damage);
            }
        }
        self.has_hit = true;
        true
    }
}

/// Weapon state.
#[derive(Component, Debug, Clone, Copy)]
pub struct Shooting {
    owner: Entity,
    enabled: bool,
    fire_rate: f32,
    fire_timer: f32,
    bullet_speed: f32,
    bullet_damage: i32,
    pub auto_fire: bool,
}

impl Shooting {
    pub const MIN_FIRE_RATE: f32 = 0.1;

    pub fn new(fire_rate: f32, bullet_speed: f32, bullet_damage: i32, auto_fire: bool) -> Self {
        let mut shooting = Self {
            owner: Entity::PLACEHOLDER,
            enabled: true,
            fire_rate: Self::MIN_FIRE_RATE,
            fire_timer: 0.0,
            bullet_speed: 0.0,
            bullet_damage: 1,
            auto_fire,
        };
        shooting.set_fire_rate(fire_rate);
        shooting.set_bullet_speed(bullet_speed);
        shooting.set_bullet_damage(bullet_damage);
        shooting
    }

    /// Seconds between shots.
    pub fn fire_rate(&self) -> f32 {
        self.fire_rate
    }

    pub fn set_fire_rate(&mut self, fire_rate: f32) {
        self.fire_rate = fire_rate.max(Self::MIN_FIRE_RATE);
    }

    pub fn bullet_speed(&self) -> f32 {
        self.bullet_speed
    }

    pub fn set_bullet_speed(&mut self, speed: f32) {
        self.bullet_speed = speed.max(0.0);
    }

    pub fn bullet_damage(&self) -> i32 {
        self.bullet_damage
    }

    pub fn set_bullet_damage(&mut self, damage: i32) {
        self.bullet_damage = damage.max(1);
    }

    pub fn fire_timer(&self) -> f32 {
        self.fire_timer
    }

    pub fn tick(&mut self, dt: f32) {
        self.fire_timer += dt;
    }

    pub fn can_fire(&self) -> bool {
        self.fire_timer >= self.fire_rate
    }

    pub fn reset_timer(&mut self) {
        self.fire_timer = 0.0;
    }
}

impl Default for Shooting {
    fn default() -> Self {
        Self::new(0.3, 500.0, 10, false)
    }
}

// ============================================================================
// PRESENTATION DATA
// ============================================================================

/// Shape drawn by the render collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Shape {
    Rectangle,
    Circle,
    Line,
}

impl Shape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Shape::Rectangle => "RECTANGLE",
            Shape::Circle => "CIRCLE",
            Shape::Line => "LINE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Presentation data; the core never draws.
#[derive(Component, Debug, Clone, Copy)]
pub struct Render {
    owner: Entity,
    enabled: bool,
    pub shape: Shape,
    pub size: Vec2,
    pub color: Color,
}

impl Render {
    pub fn new(shape: Shape, size: Vec2, color: Color) -> Self {
        Self {
            owner: Entity::PLACEHOLDER,
            enabled: true,
            shape,
            size,
            color,
        }
    }
}

// ============================================================================
// AI
// ============================================================================

/// Idle wandering state of an AI entity.
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct Wander {
    /// Velocity the entity drifts toward.
    pub target: Vec2,
    /// Seconds since the target was last re-rolled.
    pub timer: f32,
    /// Seconds until the next re-roll.
    pub interval: f32,
}
