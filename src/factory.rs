use crate::actor::{ActorIntent, ActorProxy, ProxyBuilder};
use crate::catalog::{AssetCatalog, ResolvedAsset};
use crate::error::{Result, SceneError};
use crate::host::WorldHandle;
use crate::params::{ActorKey, AssetRef, ParameterSet, Role};
use std::collections::HashMap;
use std::rc::Rc;

/// A ParameterSet whose asset references went through the catalog.
pub struct ResolvedParams<'a> {
    pub params: &'a ParameterSet,
    pub material: Option<ResolvedAsset>,
    pub mesh: Option<ResolvedAsset>,
}

/// Applies resolved parameters onto a freshly spawned proxy.
pub type ConfigureFn = fn(&mut ActorProxy, ResolvedParams<'_>) -> Result<()>;

#[derive(Clone, Copy)]
pub struct ActorConstructor {
    pub class: &'static str,
    pub configure: ConfigureFn,
}

const DEFAULT_CONSTRUCTORS: &[(Role, ActorConstructor)] = &[
    (Role::Camera, ActorConstructor { class: "/Game/Camera.Camera_C", configure: configure_transform_only }),
    (Role::SkySphere, ActorConstructor { class: "/Game/SkySphere.SkySphere_C", configure: configure_transform_only }),
    (Role::Light, ActorConstructor { class: "/Game/Light.Light_C", configure: configure_transform_only }),
    (Role::Floor, ActorConstructor { class: "/Game/Floor.Floor_C", configure: configure_blocking }),
    (Role::Walls, ActorConstructor { class: "/Game/Walls.Walls_C", configure: configure_blocking }),
    (Role::Object, ActorConstructor { class: "/Game/Object.Object_C", configure: configure_object }),
    (Role::Occluder, ActorConstructor { class: "/Game/Occluder.Occluder_C", configure: configure_occluder }),
];

/// Static role → constructor registry. Realizes ParameterSets into live proxies.
pub struct ActorFactory {
    constructors: HashMap<Role, ActorConstructor>,
    catalog: Rc<dyn AssetCatalog>,
}

impl ActorFactory {
    pub fn new(catalog: Rc<dyn AssetCatalog>) -> Self {
        Self { constructors: HashMap::new(), catalog }
    }

    pub fn with_defaults(catalog: Rc<dyn AssetCatalog>) -> Self {
        let mut factory = Self::new(catalog);
        for (role, constructor) in DEFAULT_CONSTRUCTORS {
            factory.constructors.insert(*role, *constructor);
        }
        factory
    }

    pub fn register(&mut self, role: Role, constructor: ActorConstructor) -> Result<()> {
        if !role.is_spawnable() {
            return Err(SceneError::config(format!("role '{}' is not spawnable", role.label())));
        }
        self.constructors.insert(role, constructor);
        Ok(())
    }

    pub fn constructor(&self, role: Role) -> Option<&ActorConstructor> {
        self.constructors.get(&role)
    }

    pub fn catalog(&self) -> &dyn AssetCatalog {
        self.catalog.as_ref()
    }

    pub fn resolve(&self, asset: &AssetRef) -> Result<ResolvedAsset> {
        self.catalog.resolve(asset)
    }

    /// Realize `params` as a live actor in `world`. Either returns a fully applied proxy or
    /// fails without leaving an actor behind in the host.
    pub fn construct(&self, world: &WorldHandle, key: ActorKey, params: &ParameterSet) -> Result<ActorProxy> {
        let constructor = self.constructors.get(&key.role).copied().ok_or_else(|| SceneError::Spawn {
            actor: key.to_string(),
            class: "<unregistered>".to_string(),
            reason: format!("no constructor registered for role '{}'", key.role.label()),
        })?;
        let material = params.material.as_ref().map(|asset| self.catalog.resolve(asset)).transpose()?;
        let mesh = params.mesh.as_ref().map(|asset| self.catalog.resolve(asset)).transpose()?;

        let builder = ProxyBuilder::construct(Some(ActorIntent::new(key, params.clone())));
        let spawned = world.borrow_mut().spawn_actor(constructor.class, ProxyBuilder::host_entry);
        let handle = spawned.map_err(|err| SceneError::Spawn {
            actor: key.to_string(),
            class: constructor.class.to_string(),
            reason: err.to_string(),
        })?;

        let mut proxy = match builder.attach(world.clone(), handle) {
            Ok(proxy) => proxy,
            Err(err) => {
                world.borrow_mut().destroy_actor(handle);
                return Err(err);
            }
        };
        if let Err(err) = (constructor.configure)(&mut proxy, ResolvedParams { params, material, mesh }) {
            if let Err(teardown) = proxy.destroy() {
                log::warn!("{key}: teardown after failed configuration also failed: {teardown}");
            }
            return Err(err);
        }
        log::debug!("spawned {key} as {} ({handle})", constructor.class);
        Ok(proxy)
    }
}

fn apply_transform(proxy: &mut ActorProxy, params: &ParameterSet) -> Result<()> {
    proxy.set_location(params.location)?;
    proxy.set_rotation(params.rotation)?;
    proxy.set_scale(params.scale)
}

fn apply_appearance(
    proxy: &mut ActorProxy,
    material: Option<ResolvedAsset>,
    mesh: Option<ResolvedAsset>,
) -> Result<()> {
    if let Some(mesh) = mesh {
        proxy.set_mesh(mesh)?;
    }
    if let Some(material) = material {
        proxy.set_material(material)?;
    }
    Ok(())
}

fn apply_surface(proxy: &mut ActorProxy, params: &ParameterSet) -> Result<()> {
    if let Some(friction) = params.friction() {
        proxy.set_friction(friction)?;
    }
    if let Some(restitution) = params.restitution() {
        proxy.set_restitution(restitution)?;
    }
    Ok(())
}

fn configure_transform_only(proxy: &mut ActorProxy, resolved: ResolvedParams<'_>) -> Result<()> {
    apply_transform(proxy, resolved.params)
}

fn configure_blocking(proxy: &mut ActorProxy, resolved: ResolvedParams<'_>) -> Result<()> {
    apply_transform(proxy, resolved.params)?;
    apply_appearance(proxy, resolved.material, resolved.mesh)?;
    apply_surface(proxy, resolved.params)?;
    proxy.set_collision_profile("BlockAll")
}

fn configure_object(proxy: &mut ActorProxy, resolved: ResolvedParams<'_>) -> Result<()> {
    let params = resolved.params;
    apply_transform(proxy, params)?;
    apply_appearance(proxy, resolved.material, resolved.mesh)?;
    if let Some(mass) = params.mass() {
        proxy.set_mass(mass)?;
    }
    apply_surface(proxy, params)?;
    proxy.set_hidden(params.hidden)?;
    proxy.set_simulate_physics(true)
}

fn configure_occluder(proxy: &mut ActorProxy, resolved: ResolvedParams<'_>) -> Result<()> {
    let hidden = resolved.params.hidden;
    configure_blocking(proxy, resolved)?;
    proxy.set_hidden(hidden)
}
