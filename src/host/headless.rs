//! In-process host used by the generator binary and the tests.
//!
//! Actors live as `bevy_ecs` entities. Physics is a plain explicit integration of gravity and
//! pushed forces against a flat floor at `z = 0`; it stands in for the real engine only so
//! that runs have observable motion.

use super::{ComponentCtor, HostError, HostHandle, SimulationHost};
use crate::actor::ProxyBuilder;
use crate::catalog::ResolvedAsset;
use crate::params::Rotator;
use bevy_ecs::prelude::*;
use glam::Vec3;
use std::collections::BTreeSet;

const DEFAULT_GRAVITY: f32 = -980.0;

#[derive(Component)]
struct ActorClass(String);

#[derive(Component, Clone, Copy)]
struct Pose {
    location: Vec3,
    rotation: Rotator,
    scale: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self { location: Vec3::ZERO, rotation: Rotator::ZERO, scale: Vec3::ONE }
    }
}

#[derive(Component, Default)]
struct Appearance {
    material: Option<String>,
    mesh: Option<String>,
    hidden: bool,
    collision: Option<String>,
}

#[derive(Component)]
struct Body {
    simulate: bool,
    mass: f32,
    friction: Option<f32>,
    restitution: Option<f32>,
    friction_scale: Option<f64>,
    velocity: Vec3,
    pending_force: Vec3,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            simulate: false,
            mass: 1.0,
            friction: None,
            restitution: None,
            friction_scale: None,
            velocity: Vec3::ZERO,
            pending_force: Vec3::ZERO,
        }
    }
}

/// Component the host obtained from the no-argument constructor.
#[derive(Component)]
struct HostComponent(#[allow(dead_code)] ProxyBuilder);

/// Read-only view of one actor as the host sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct HostActorState {
    pub class: String,
    pub location: Vec3,
    pub rotation: Rotator,
    pub scale: Vec3,
    pub material: Option<String>,
    pub mesh: Option<String>,
    pub hidden: bool,
    pub collision: Option<String>,
    pub simulate_physics: bool,
    pub mass: f32,
    pub friction: Option<f32>,
    pub restitution: Option<f32>,
    pub friction_scale: Option<f64>,
    pub velocity: Vec3,
}

pub struct HeadlessHost {
    name: String,
    world: World,
    gravity: f32,
    commands: Vec<String>,
    refused_classes: BTreeSet<String>,
    spawn_budget: Option<usize>,
    spawned_total: usize,
    constructor_calls: usize,
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new("HeadlessWorld")
    }
}

impl HeadlessHost {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            world: World::new(),
            gravity: DEFAULT_GRAVITY,
            commands: Vec::new(),
            refused_classes: BTreeSet::new(),
            spawn_budget: None,
            spawned_total: 0,
            constructor_calls: 0,
        }
    }

    /// Refuse every future spawn of `class`.
    pub fn refuse_class(&mut self, class: impl Into<String>) {
        self.refused_classes.insert(class.into());
    }

    /// Refuse spawns once `budget` actors have been spawned in total.
    pub fn limit_spawns(&mut self, budget: usize) {
        self.spawn_budget = Some(budget);
    }

    pub fn live_actor_count(&self) -> usize {
        self.world.iter_entities().filter(|entity| entity.contains::<ActorClass>()).count()
    }

    pub fn spawned_total(&self) -> usize {
        self.spawned_total
    }

    /// How many times the host invoked a component constructor.
    pub fn constructor_calls(&self) -> usize {
        self.constructor_calls
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn actor_state(&self, handle: HostHandle) -> Option<HostActorState> {
        let entity = self.entity(handle)?;
        let class = self.world.get::<ActorClass>(entity)?;
        let pose = self.world.get::<Pose>(entity)?;
        let appearance = self.world.get::<Appearance>(entity)?;
        let body = self.world.get::<Body>(entity)?;
        Some(HostActorState {
            class: class.0.clone(),
            location: pose.location,
            rotation: pose.rotation,
            scale: pose.scale,
            material: appearance.material.clone(),
            mesh: appearance.mesh.clone(),
            hidden: appearance.hidden,
            collision: appearance.collision.clone(),
            simulate_physics: body.simulate,
            mass: body.mass,
            friction: body.friction,
            restitution: body.restitution,
            friction_scale: body.friction_scale,
            velocity: body.velocity,
        })
    }

    fn entity(&self, handle: HostHandle) -> Option<Entity> {
        let entity = Entity::from_bits(handle.to_bits());
        self.world.get::<ActorClass>(entity).map(|_| entity)
    }

    fn with_component<T: Component>(&mut self, handle: HostHandle, apply: impl FnOnce(&mut T)) -> bool {
        let Some(entity) = self.entity(handle) else {
            return false;
        };
        match self.world.get_mut::<T>(entity) {
            Some(mut component) => {
                apply(&mut *component);
                true
            }
            None => false,
        }
    }
}

impl SimulationHost for HeadlessHost {
    fn world_name(&self) -> &str {
        &self.name
    }

    fn spawn_actor(&mut self, class: &str, construct: ComponentCtor) -> Result<HostHandle, HostError> {
        if class.is_empty() {
            return Err(HostError::UnknownClass(class.to_string()));
        }
        if self.refused_classes.contains(class) {
            return Err(HostError::Refused(format!("class {class} is disabled")));
        }
        if let Some(budget) = self.spawn_budget {
            if self.spawned_total >= budget {
                return Err(HostError::Refused(format!("spawn budget of {budget} actors exhausted")));
            }
        }
        self.constructor_calls += 1;
        let component = construct();
        if !component.is_placeholder() {
            return Err(HostError::UnexpectedComponent);
        }
        let entity = self
            .world
            .spawn((
                ActorClass(class.to_string()),
                Pose::default(),
                Appearance::default(),
                Body::default(),
                HostComponent(component),
            ))
            .id();
        self.spawned_total += 1;
        Ok(HostHandle::from_bits(entity.to_bits()))
    }

    fn destroy_actor(&mut self, handle: HostHandle) -> bool {
        match self.entity(handle) {
            Some(entity) => self.world.despawn(entity),
            None => false,
        }
    }

    fn set_location(&mut self, handle: HostHandle, location: Vec3) -> bool {
        self.with_component::<Pose>(handle, |pose| pose.location = location)
    }

    fn set_rotation(&mut self, handle: HostHandle, rotation: Rotator) -> bool {
        self.with_component::<Pose>(handle, |pose| pose.rotation = rotation)
    }

    fn set_scale(&mut self, handle: HostHandle, scale: Vec3) -> bool {
        self.with_component::<Pose>(handle, |pose| pose.scale = scale)
    }

    fn set_material(&mut self, handle: HostHandle, material: &ResolvedAsset) -> bool {
        let path = material.path().to_string();
        self.with_component::<Appearance>(handle, |appearance| appearance.material = Some(path))
    }

    fn set_mesh(&mut self, handle: HostHandle, mesh: &ResolvedAsset) -> bool {
        let path = mesh.path().to_string();
        self.with_component::<Appearance>(handle, |appearance| appearance.mesh = Some(path))
    }

    fn set_hidden(&mut self, handle: HostHandle, hidden: bool) -> bool {
        self.with_component::<Appearance>(handle, |appearance| appearance.hidden = hidden)
    }

    fn set_simulate_physics(&mut self, handle: HostHandle, simulate: bool) -> bool {
        self.with_component::<Body>(handle, |body| {
            body.simulate = simulate;
            if !simulate {
                body.velocity = Vec3::ZERO;
            }
        })
    }

    fn set_mass(&mut self, handle: HostHandle, mass: f32) -> bool {
        self.with_component::<Body>(handle, |body| body.mass = mass)
    }

    fn set_friction(&mut self, handle: HostHandle, friction: f32) -> bool {
        self.with_component::<Body>(handle, |body| body.friction = Some(friction))
    }

    fn set_restitution(&mut self, handle: HostHandle, restitution: f32) -> bool {
        self.with_component::<Body>(handle, |body| body.restitution = Some(restitution))
    }

    fn set_friction_scale(&mut self, handle: HostHandle, scale: f64) -> bool {
        self.with_component::<Body>(handle, |body| body.friction_scale = Some(scale))
    }

    fn set_collision_profile(&mut self, handle: HostHandle, profile: &str) -> bool {
        let profile = profile.to_string();
        self.with_component::<Appearance>(handle, |appearance| appearance.collision = Some(profile))
    }

    fn add_force(&mut self, handle: HostHandle, force: Vec3) -> bool {
        self.with_component::<Body>(handle, |body| body.pending_force += force)
    }

    fn location(&self, handle: HostHandle) -> Option<Vec3> {
        let entity = self.entity(handle)?;
        self.world.get::<Pose>(entity).map(|pose| pose.location)
    }

    fn execute_command(&mut self, command: &str) {
        log::debug!("[{}] console: {command}", self.name);
        self.commands.push(command.to_string());
    }

    fn step(&mut self, dt: f32) {
        let gravity = Vec3::new(0.0, 0.0, self.gravity);
        let mut query = self.world.query::<(&mut Pose, &mut Body)>();
        for (mut pose, mut body) in query.iter_mut(&mut self.world) {
            let force = std::mem::take(&mut body.pending_force);
            if !body.simulate {
                continue;
            }
            let acceleration = force / body.mass.max(f32::EPSILON) + gravity;
            body.velocity += acceleration * dt;
            pose.location += body.velocity * dt;
            if pose.location.z < 0.0 {
                pose.location.z = 0.0;
                body.velocity.z = 0.0;
            }
        }
    }
}
