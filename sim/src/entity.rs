//! Entity registry and capability table.
//!
//! Component data lives in the `bevy_ecs` world. The [`Registry`] resource
//! adds what the world does not keep: the registration order of live
//! entities, which every stage uses as its iteration order, and the scoped
//! counters used to generate names such as `Bullet17`.
//!
//! Entities are only ever deactivated while a frame is running. Physical
//! removal ([`remove`]) is reserved for the lifecycle stage.

use crate::components::*;
use bevy_ecs::prelude::*;
use std::collections::{HashMap, HashSet};

/// Live entities in registration order plus per-prefix name counters.
#[derive(Resource, Debug, Default)]
pub struct Registry {
    order: Vec<Entity>,
    counters: HashMap<String, u64>,
}

impl Registry {
    pub fn entities(&self) -> &[Entity] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Next name for `prefix`: `prefix0`, `prefix1`, ...
    pub fn next_name(&mut self, prefix: &str) -> String {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        let name = format!("{prefix}{counter}");
        *counter += 1;
        name
    }
}

/// Register a new, empty, active entity.
pub fn spawn(world: &mut World, name: impl Into<String>, role: Role) -> Entity {
    let info = EntityInfo::new(name, role);
    log::debug!("spawn {} ({:?})", info.name, role);
    let entity = world.spawn(info).id();
    world
        .get_resource_or_insert_with(Registry::default)
        .order
        .push(entity);
    entity
}

/// Register a new entity named from the registry's counter for `prefix`.
pub fn spawn_numbered(world: &mut World, prefix: &str, role: Role) -> Entity {
    let name = world
        .get_resource_or_insert_with(Registry::default)
        .next_name(prefix);
    spawn(world, name, role)
}

/// Attach a capability, run its initialize hook and record it in the
/// entity's capability table. An entity holds one capability per kind: if
/// the kind is already attached the first instance stays and the new one is
/// dropped uninitialized. Returns false when nothing was attached.
pub fn add_capability(world: &mut World, entity: Entity, capability: impl Into<AnyCapability>) -> bool {
    let capability = capability.into();
    match world.get::<EntityInfo>(entity) {
        Some(info) if info.capabilities.contains(&capability.kind()) => {
            log::trace!("{entity} already has {:?}, kept the first", capability.kind());
            return false;
        }
        Some(_) => {}
        None => return false,
    }
    match capability {
        AnyCapability::Transform(c) => attach(world, entity, c),
        AnyCapability::Physics(c) => attach(world, entity, c),
        AnyCapability::Health(c) => attach(world, entity, c),
        AnyCapability::Bullet(c) => attach(world, entity, c),
        AnyCapability::Shooting(c) => attach(world, entity, c),
        AnyCapability::Render(c) => attach(world, entity, c),
    }
    true
}

fn attach<T: Capability>(world: &mut World, entity: Entity, mut capability: T) {
    capability.set_owner(entity);
    capability.initialize();
    let mut entity_mut = world.entity_mut(entity);
    entity_mut.insert(capability);
    if let Some(mut info) = entity_mut.get_mut::<EntityInfo>() {
        info.capabilities.push(T::KIND);
    }
}

/// The capability of type `T`, enabled or not.
pub fn capability<T: Capability>(world: &World, entity: Entity) -> Option<&T> {
    world.get::<T>(entity)
}

pub fn capability_mut<T: Capability>(world: &mut World, entity: Entity) -> Option<Mut<'_, T>> {
    world.get_mut::<T>(entity)
}

pub fn has_capability(world: &World, entity: Entity, kind: CapabilityKind) -> bool {
    world
        .get::<EntityInfo>(entity)
        .is_some_and(|info| info.capabilities.contains(&kind))
}

/// Enable or disable a capability without detaching it.
pub fn set_capability_enabled(world: &mut World, entity: Entity, kind: CapabilityKind, enabled: bool) -> bool {
    match kind {
        CapabilityKind::Transform => toggle::<Transform>(world, entity, enabled),
        CapabilityKind::Physics => toggle::<Physics>(world, entity, enabled),
        CapabilityKind::Health => toggle::<Health>(world, entity, enabled),
        CapabilityKind::Bullet => toggle::<Bullet>(world, entity, enabled),
        CapabilityKind::Shooting => toggle::<Shooting>(world, entity, enabled),
        CapabilityKind::Render => toggle::<Render>(world, entity, enabled),
    }
}

fn toggle<T: Capability>(world: &mut World, entity: Entity, enabled: bool) -> bool {
    match world.get_mut::<T>(entity) {
        Some(mut capability) => {
            capability.set_enabled(enabled);
            true
        }
        None => false,
    }
}

/// True until the entity has been removed from the world.
pub fn exists(world: &World, entity: Entity) -> bool {
    world.get::<EntityInfo>(entity).is_some()
}

/// True while the entity exists and has not been deactivated.
pub fn is_active(world: &World, entity: Entity) -> bool {
    world.get::<EntityInfo>(entity).is_some_and(|info| info.active)
}

pub fn set_active(world: &mut World, entity: Entity, active: bool) {
    if let Some(mut info) = world.get_mut::<EntityInfo>(entity) {
        info.active = active;
    }
}

pub fn role(world: &World, entity: Entity) -> Option<Role> {
    world.get::<EntityInfo>(entity).map(|info| info.role)
}

pub fn name(world: &World, entity: Entity) -> Option<&str> {
    world.get::<EntityInfo>(entity).map(|info| info.name.as_str())
}

/// Deactivate the entity and strip all of its capabilities. The entity
/// stays registered until the lifecycle stage removes it.
pub fn destroy(world: &mut World, entity: Entity) {
    let kinds = match world.get_mut::<EntityInfo>(entity) {
        Some(mut info) => {
            info.active = false;
            std::mem::take(&mut info.capabilities)
        }
        None => return,
    };
    let mut entity_mut = world.entity_mut(entity);
    for kind in kinds {
        match kind {
            CapabilityKind::Transform => entity_mut.remove::<Transform>(),
            CapabilityKind::Physics => entity_mut.remove::<Physics>(),
            CapabilityKind::Health => entity_mut.remove::<Health>(),
            CapabilityKind::Bullet => entity_mut.remove::<Bullet>(),
            CapabilityKind::Shooting => entity_mut.remove::<Shooting>(),
            CapabilityKind::Render => entity_mut.remove::<Render>(),
        };
    }
}

/// Drop the entity from the registry and the world.
pub fn remove(world: &mut World, entity: Entity) -> bool {
    remove_many(world, &[entity]) == 1
}

/// Drop a batch of entities with a single pass over the registry. Returns
/// how many were actually despawned.
pub fn remove_many(world: &mut World, entities: &[Entity]) -> usize {
    if entities.is_empty() {
        return 0;
    }
    let doomed: HashSet<Entity> = entities.iter().copied().collect();
    if let Some(mut registry) = world.get_resource_mut::<Registry>() {
        registry.order.retain(|e| !doomed.contains(e));
    }
    let mut removed = 0;
    for &entity in entities {
        if world.despawn(entity) {
            log::debug!("removed {entity}");
            removed += 1;
        }
    }
    removed
}

/// Snapshot of the live registry in registration order.
pub fn live_entities(world: &World) -> Vec<Entity> {
    world
        .get_resource::<Registry>()
        .map(|registry| registry.entities().to_vec())
        .unwrap_or_default()
}

/// Owners of every `T` capability on an active entity, in registry order.
pub fn owners_of<T: Capability>(world: &World) -> Vec<Entity> {
    live_entities(world)
        .into_iter()
        .filter(|&e| is_active(world, e) && world.get::<T>(e).is_some())
        .collect()
}

/// The user-controlled entity: the first `User` that carries Physics.
/// It is returned even after deactivation so the game-over check can see it.
pub fn user_entity(world: &World) -> Option<Entity> {
    live_entities(world)
        .into_iter()
        .find(|&e| role(world, e) == Some(Role::User) && world.get::<Physics>(e).is_some())
}

/// Active AI entities in registry order.
pub fn active_ai(world: &World) -> Vec<Entity> {
    live_entities(world)
        .into_iter()
        .filter(|&e| role(world, e) == Some(Role::Ai) && is_active(world, e))
        .collect()
}
