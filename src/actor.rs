use crate::catalog::ResolvedAsset;
use crate::error::{Result, SceneError};
use crate::host::{HostHandle, SimulationHost, WorldHandle};
use crate::params::{ActorKey, MeshShape, Movement, ParameterSet, Role, Rotator};
use glam::Vec3;
use std::collections::BTreeMap;

pub type ActorTable = BTreeMap<ActorKey, ActorProxy>;

/// Parameters captured for an actor that has not been spawned yet.
#[derive(Debug, Clone)]
pub struct ActorIntent {
    key: ActorKey,
    params: ParameterSet,
}

impl ActorIntent {
    pub fn new(key: ActorKey, params: ParameterSet) -> Self {
        Self { key, params }
    }

    pub fn key(&self) -> ActorKey {
        self.key
    }
}

/// Value produced by an actor component's construction routine.
///
/// The routine runs twice for every actor: once by the factory with an intent, and once by
/// the host with no arguments while it instantiates the component. The second call yields a
/// `Placeholder` that never spawns, performs no I/O and draws no randomness.
#[derive(Debug, Clone)]
pub enum ProxyBuilder {
    Intent(Box<ActorIntent>),
    Placeholder,
}

impl ProxyBuilder {
    pub fn construct(intent: Option<ActorIntent>) -> Self {
        match intent {
            Some(intent) => ProxyBuilder::Intent(Box::new(intent)),
            None => ProxyBuilder::Placeholder,
        }
    }

    /// Entry point handed to the host as the component constructor.
    pub fn host_entry() -> Self {
        Self::construct(None)
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ProxyBuilder::Placeholder)
    }

    /// Bind the captured intent to a live host handle.
    pub(crate) fn attach(self, world: WorldHandle, handle: HostHandle) -> Result<ActorProxy> {
        match self {
            ProxyBuilder::Intent(intent) => Ok(ActorProxy::new(*intent, world, handle)),
            ProxyBuilder::Placeholder => {
                Err(SceneError::lifecycle(format!("actor {handle}"), "cannot attach a placeholder component"))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorTransform {
    pub location: Vec3,
    pub rotation: Rotator,
    pub scale: Vec3,
}

/// One live host-side actor. The proxy owns its handle exclusively; after [`destroy`]
/// every call fails with a lifecycle error.
///
/// [`destroy`]: ActorProxy::destroy
#[derive(Debug)]
pub struct ActorProxy {
    key: ActorKey,
    world: WorldHandle,
    handle: Option<HostHandle>,
    params: ParameterSet,
    transform: ActorTransform,
    material: Option<ResolvedAsset>,
    mesh: Option<ResolvedAsset>,
    hidden: bool,
    mass: Option<f32>,
    force: Vec3,
    applied_force: Vec3,
    friction: Option<f32>,
    restitution: Option<f32>,
    friction_scale: Option<f64>,
    simulate_physics: bool,
    moves: u32,
}

impl ActorProxy {
    fn new(intent: ActorIntent, world: WorldHandle, handle: HostHandle) -> Self {
        let ActorIntent { key, params } = intent;
        let transform = ActorTransform { location: params.location, rotation: params.rotation, scale: params.scale };
        Self {
            key,
            world,
            handle: Some(handle),
            transform,
            material: None,
            mesh: None,
            hidden: params.hidden,
            mass: params.mass(),
            force: params.force(),
            applied_force: Vec3::ZERO,
            friction: None,
            restitution: None,
            friction_scale: None,
            simulate_physics: false,
            moves: 0,
            params,
        }
    }

    pub fn key(&self) -> ActorKey {
        self.key
    }

    pub fn role(&self) -> Role {
        self.key.role
    }

    pub fn is_alive(&self) -> bool {
        self.handle.is_some()
    }

    pub fn handle(&self) -> Result<HostHandle> {
        self.live_handle("handle")
    }

    pub fn params(&self) -> Result<&ParameterSet> {
        self.live_handle("params")?;
        Ok(&self.params)
    }

    fn live_handle(&self, op: &str) -> Result<HostHandle> {
        self.handle.ok_or_else(|| SceneError::lifecycle(self.key.to_string(), format!("{op} after teardown")))
    }

    fn with_host(&self, op: &str, call: impl FnOnce(&mut dyn SimulationHost, HostHandle) -> bool) -> Result<()> {
        let handle = self.live_handle(op)?;
        let mut host = self.world.borrow_mut();
        if call(&mut *host, handle) {
            Ok(())
        } else {
            Err(SceneError::lifecycle(self.key.to_string(), format!("host lost handle {handle} during {op}")))
        }
    }

    pub fn transform(&self) -> Result<ActorTransform> {
        self.live_handle("transform")?;
        Ok(self.transform)
    }

    /// Location as currently simulated by the host, falling back to the last value set.
    pub fn location(&self) -> Result<Vec3> {
        let handle = self.live_handle("location")?;
        Ok(self.world.borrow().location(handle).unwrap_or(self.transform.location))
    }

    pub fn set_location(&mut self, location: Vec3) -> Result<()> {
        self.with_host("set_location", |host, handle| host.set_location(handle, location))?;
        self.transform.location = location;
        Ok(())
    }

    pub fn rotation(&self) -> Result<Rotator> {
        self.live_handle("rotation")?;
        Ok(self.transform.rotation)
    }

    pub fn set_rotation(&mut self, rotation: Rotator) -> Result<()> {
        self.with_host("set_rotation", |host, handle| host.set_rotation(handle, rotation))?;
        self.transform.rotation = rotation;
        Ok(())
    }

    pub fn scale(&self) -> Result<Vec3> {
        self.live_handle("scale")?;
        Ok(self.transform.scale)
    }

    pub fn set_scale(&mut self, scale: Vec3) -> Result<()> {
        self.with_host("set_scale", |host, handle| host.set_scale(handle, scale))?;
        self.transform.scale = scale;
        Ok(())
    }

    pub fn material(&self) -> Result<Option<&ResolvedAsset>> {
        self.live_handle("material")?;
        Ok(self.material.as_ref())
    }

    pub fn set_material(&mut self, material: ResolvedAsset) -> Result<()> {
        self.with_host("set_material", |host, handle| host.set_material(handle, &material))?;
        self.material = Some(material);
        Ok(())
    }

    pub fn mesh(&self) -> Result<Option<&ResolvedAsset>> {
        self.live_handle("mesh")?;
        Ok(self.mesh.as_ref())
    }

    pub fn mesh_shape(&self) -> Result<Option<MeshShape>> {
        Ok(self.mesh()?.and_then(|mesh| MeshShape::from_asset_path(mesh.path())))
    }

    pub fn set_mesh(&mut self, mesh: ResolvedAsset) -> Result<()> {
        self.with_host("set_mesh", |host, handle| host.set_mesh(handle, &mesh))?;
        self.mesh = Some(mesh);
        Ok(())
    }

    pub fn is_hidden(&self) -> Result<bool> {
        self.live_handle("is_hidden")?;
        Ok(self.hidden)
    }

    pub fn set_hidden(&mut self, hidden: bool) -> Result<()> {
        self.with_host("set_hidden", |host, handle| host.set_hidden(handle, hidden))?;
        self.hidden = hidden;
        Ok(())
    }

    pub fn mass(&self) -> Result<Option<f32>> {
        self.live_handle("mass")?;
        Ok(self.mass)
    }

    pub fn set_mass(&mut self, mass: f32) -> Result<()> {
        self.with_host("set_mass", |host, handle| host.set_mass(handle, mass))?;
        self.mass = Some(mass);
        Ok(())
    }

    pub fn force(&self) -> Result<Vec3> {
        self.live_handle("force")?;
        Ok(self.force)
    }

    /// Store the force pushed by [`play_force`](ActorProxy::play_force).
    pub fn set_force(&mut self, force: Vec3) -> Result<()> {
        self.live_handle("set_force")?;
        self.force = force;
        Ok(())
    }

    /// Total force pushed to the host since the last spawn or reset.
    pub fn applied_force(&self) -> Result<Vec3> {
        self.live_handle("applied_force")?;
        Ok(self.applied_force)
    }

    pub fn play_force(&mut self) -> Result<()> {
        let force = self.force;
        self.with_host("play_force", |host, handle| host.add_force(handle, force))?;
        self.applied_force += force;
        Ok(())
    }

    pub fn friction(&self) -> Result<Option<f32>> {
        self.live_handle("friction")?;
        Ok(self.friction)
    }

    pub fn set_friction(&mut self, friction: f32) -> Result<()> {
        self.with_host("set_friction", |host, handle| host.set_friction(handle, friction))?;
        self.friction = Some(friction);
        Ok(())
    }

    pub fn restitution(&self) -> Result<Option<f32>> {
        self.live_handle("restitution")?;
        Ok(self.restitution)
    }

    pub fn set_restitution(&mut self, restitution: f32) -> Result<()> {
        self.with_host("set_restitution", |host, handle| host.set_restitution(handle, restitution))?;
        self.restitution = Some(restitution);
        Ok(())
    }

    pub fn friction_scale(&self) -> Result<Option<f64>> {
        self.live_handle("friction_scale")?;
        Ok(self.friction_scale)
    }

    pub fn set_friction_scale(&mut self, scale: f64) -> Result<()> {
        self.with_host("set_friction_scale", |host, handle| host.set_friction_scale(handle, scale))?;
        self.friction_scale = Some(scale);
        Ok(())
    }

    pub fn simulates_physics(&self) -> Result<bool> {
        self.live_handle("simulates_physics")?;
        Ok(self.simulate_physics)
    }

    pub fn set_simulate_physics(&mut self, simulate: bool) -> Result<()> {
        self.with_host("set_simulate_physics", |host, handle| host.set_simulate_physics(handle, simulate))?;
        self.simulate_physics = simulate;
        Ok(())
    }

    pub fn set_collision_profile(&mut self, profile: &str) -> Result<()> {
        self.with_host("set_collision_profile", |host, handle| host.set_collision_profile(handle, profile))
    }

    /// Number of `move_step` calls since the last spawn or reset.
    pub fn moves(&self) -> Result<u32> {
        self.live_handle("moves")?;
        Ok(self.moves)
    }

    /// Per-tick movement hook.
    pub fn move_step(&mut self) -> Result<()> {
        self.live_handle("move_step")?;
        if let Movement::Dynamic { step } = self.params.movement() {
            let location = self.transform.location + step;
            self.set_location(location)?;
        }
        self.moves += 1;
        Ok(())
    }

    /// Re-pose the actor from `params` without recreating the host actor.
    pub fn reset(&mut self, params: &ParameterSet) -> Result<()> {
        self.live_handle("reset")?;
        self.set_location(params.location)?;
        self.set_rotation(params.rotation)?;
        self.set_scale(params.scale)?;
        if let Some(mass) = params.mass() {
            self.set_mass(mass)?;
        }
        self.set_hidden(params.hidden)?;
        self.force = params.force();
        self.applied_force = Vec3::ZERO;
        self.moves = 0;
        self.params = params.clone();
        Ok(())
    }

    /// Destroy the host actor. The proxy is unusable afterwards.
    pub fn destroy(&mut self) -> Result<()> {
        let handle = self.live_handle("destroy")?;
        self.handle = None;
        if !self.world.borrow_mut().destroy_actor(handle) {
            log::warn!("{} handle {handle} was already gone from the host", self.key);
        }
        Ok(())
    }
}
