use crate::actor::ProxyBuilder;
use crate::catalog::ResolvedAsset;
use crate::params::Rotator;
use glam::Vec3;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

pub mod headless;

/// Opaque reference to one actor living inside the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostHandle(u64);

impl HostHandle {
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn to_bits(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// No-argument component constructor the host invokes while instantiating an actor.
pub type ComponentCtor = fn() -> ProxyBuilder;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("Unknown actor class '{0}'")]
    UnknownClass(String),

    #[error("Spawn refused: {0}")]
    Refused(String),

    #[error("Component constructor produced a populated builder; the host expects a placeholder")]
    UnexpectedComponent,
}

/// Narrow interface to the physics/rendering host. Setters return `false` when the host no
/// longer knows the handle.
pub trait SimulationHost {
    /// Name of the loaded world.
    fn world_name(&self) -> &str;

    /// Instantiate an actor of `class`. The host calls `construct` with no arguments while
    /// instantiating, and keeps whatever it returns as the actor's component.
    fn spawn_actor(&mut self, class: &str, construct: ComponentCtor) -> Result<HostHandle, HostError>;

    /// Remove an actor. Returns `false` if the handle was already gone.
    fn destroy_actor(&mut self, handle: HostHandle) -> bool;

    fn set_location(&mut self, handle: HostHandle, location: Vec3) -> bool;

    fn set_rotation(&mut self, handle: HostHandle, rotation: Rotator) -> bool;

    fn set_scale(&mut self, handle: HostHandle, scale: Vec3) -> bool;

    fn set_material(&mut self, handle: HostHandle, material: &ResolvedAsset) -> bool;

    fn set_mesh(&mut self, handle: HostHandle, mesh: &ResolvedAsset) -> bool;

    fn set_hidden(&mut self, handle: HostHandle, hidden: bool) -> bool;

    fn set_simulate_physics(&mut self, handle: HostHandle, simulate: bool) -> bool;

    fn set_mass(&mut self, handle: HostHandle, mass: f32) -> bool;

    fn set_friction(&mut self, handle: HostHandle, friction: f32) -> bool;

    fn set_restitution(&mut self, handle: HostHandle, restitution: f32) -> bool;

    /// Shape-dependent multiplier on top of the surface friction.
    fn set_friction_scale(&mut self, handle: HostHandle, scale: f64) -> bool;

    fn set_collision_profile(&mut self, handle: HostHandle, profile: &str) -> bool;

    /// Push a force for the next physics step.
    fn add_force(&mut self, handle: HostHandle, force: Vec3) -> bool;

    /// Current location as simulated by the host.
    fn location(&self, handle: HostHandle) -> Option<Vec3>;

    /// Run a console command such as `r.SetRes 288x288`.
    fn execute_command(&mut self, command: &str);

    /// Advance the physics simulation by `dt` seconds.
    fn step(&mut self, dt: f32);
}

/// Shared handle on the externally owned world. Cloning shares; nothing here tears it down.
#[derive(Clone)]
pub struct WorldHandle(Rc<RefCell<dyn SimulationHost>>);

impl WorldHandle {
    pub fn new<H: SimulationHost + 'static>(host: H) -> Self {
        Self(Rc::new(RefCell::new(host)))
    }

    /// Wrap a host the caller keeps a typed reference to.
    pub fn from_shared<H: SimulationHost + 'static>(host: Rc<RefCell<H>>) -> Self {
        Self(host)
    }

    pub fn borrow(&self) -> Ref<'_, dyn SimulationHost + 'static> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, dyn SimulationHost + 'static> {
        self.0.borrow_mut()
    }

    pub fn name(&self) -> String {
        self.0.borrow().world_name().to_string()
    }
}

impl fmt::Debug for WorldHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WorldHandle").field(&self.name()).finish()
    }
}
