use glam::Vec3;
use plausim::actor::{ActorProxy, ProxyBuilder};
use plausim::catalog::{AssetCatalog, StaticCatalog};
use plausim::error::SceneError;
use plausim::factory::{ActorConstructor, ActorFactory, ResolvedParams};
use plausim::host::headless::HeadlessHost;
use plausim::host::WorldHandle;
use plausim::params::{ActorKey, AssetRef, MeshShape, ParameterSet, PhysicalProperties, Role, Rotator};
use std::cell::RefCell;
use std::rc::Rc;

fn rig() -> (Rc<RefCell<HeadlessHost>>, WorldHandle, ActorFactory) {
    let host = Rc::new(RefCell::new(HeadlessHost::default()));
    let world = WorldHandle::from_shared(Rc::clone(&host));
    let catalog: Rc<dyn AssetCatalog> = Rc::new(StaticCatalog::with_defaults());
    (host, world, ActorFactory::with_defaults(catalog))
}

fn floor() -> ParameterSet {
    ParameterSet::floor(AssetRef::new("/Game/Materials/Floor/M_Ground_Gravel"))
}

#[test]
fn host_constructor_runs_once_and_yields_placeholder() {
    assert!(ProxyBuilder::host_entry().is_placeholder());
    let (host, world, factory) = rig();
    let proxy = factory.construct(&world, ActorKey::single(Role::Floor), &floor()).expect("construct floor");
    assert_eq!(host.borrow().constructor_calls(), 1);
    assert_eq!(host.borrow().live_actor_count(), 1);
    assert!(proxy.is_alive());
}

#[test]
fn construct_applies_parameters() {
    let (host, world, factory) = rig();
    let params = floor();
    let proxy = factory.construct(&world, ActorKey::single(Role::Floor), &params).expect("construct floor");
    let state = host.borrow().actor_state(proxy.handle().expect("handle")).expect("host state");
    assert_eq!(state.class, "/Game/Floor.Floor_C");
    assert_eq!(state.location, params.location);
    assert_eq!(state.scale, Vec3::new(100.0, 100.0, 1.0));
    assert_eq!(state.material.as_deref(), Some("/Game/Materials/Floor/M_Ground_Gravel"));
    assert_eq!(state.collision.as_deref(), Some("BlockAll"));
    assert_eq!(state.friction, Some(0.5));
    assert_eq!(state.restitution, None);
    assert!(!state.simulate_physics);

    let object = ParameterSet::object(
        MeshShape::Cylinder,
        Vec3::new(400.0, 0.0, 300.0),
        Rotator::new(0.0, 45.0, 0.0),
        AssetRef::new("/Game/Materials/Object/RedMaterial"),
    );
    let proxy = factory.construct(&world, ActorKey::new(Role::Object, 1), &object).expect("construct object");
    assert_eq!(proxy.mesh_shape().expect("live"), Some(MeshShape::Cylinder));
    assert_eq!(proxy.mass().expect("live"), Some(100.0));
    assert!(proxy.simulates_physics().expect("live"));
    assert_eq!(proxy.rotation().expect("live"), Rotator::new(0.0, 45.0, 0.0));
}

#[test]
fn surface_properties_reach_the_host() {
    let (host, world, factory) = rig();
    let mut object = ParameterSet::object(
        MeshShape::Sphere,
        Vec3::new(0.0, 0.0, 100.0),
        Rotator::ZERO,
        AssetRef::new("/Game/Materials/Object/BlueMaterial"),
    );
    object.physics = Some(PhysicalProperties { mass: Some(50.0), friction: Some(0.2), restitution: Some(0.7) });
    let proxy = factory.construct(&world, ActorKey::new(Role::Object, 1), &object).expect("construct object");
    assert_eq!(proxy.friction().expect("live"), Some(0.2));
    assert_eq!(proxy.restitution().expect("live"), Some(0.7));
    let state = host.borrow().actor_state(proxy.handle().expect("handle")).expect("host state");
    assert_eq!(state.mass, 50.0);
    assert_eq!(state.friction, Some(0.2));
    assert_eq!(state.restitution, Some(0.7));
}

#[test]
fn wall_dimensions_change_host_geometry() {
    let (host, world, factory) = rig();
    let material = AssetRef::new("/Game/Materials/Wall/M_Concrete_Poured");
    let mut states = Vec::new();
    for (length, depth) in [(3000.0, 1500.0), (5000.0, 3000.0)] {
        let params = ParameterSet::walls(material.clone(), 2.0, length, depth);
        let mut proxy = factory.construct(&world, ActorKey::single(Role::Walls), &params).expect("construct walls");
        states.push(host.borrow().actor_state(proxy.handle().expect("handle")).expect("host state"));
        proxy.destroy().expect("destroy");
    }
    assert_eq!(states[0].scale, Vec3::new(7.5, 3.75, 2.0));
    assert_eq!(states[1].scale, Vec3::new(12.5, 7.5, 2.0));
    assert_ne!(states[0].location, states[1].location);
    assert_eq!(states[1].location, Vec3::new(-2500.0, -1500.0, 0.0));
}

#[test]
fn unresolvable_asset_spawns_nothing() {
    let (host, world, factory) = rig();
    let params = ParameterSet::floor(AssetRef::new("/Game/Materials/Floor/M_Missing"));
    let err = factory.construct(&world, ActorKey::single(Role::Floor), &params).unwrap_err();
    assert!(matches!(err, SceneError::AssetResolution { .. }), "unexpected error {err}");
    assert_eq!(host.borrow().constructor_calls(), 0);
    assert_eq!(host.borrow().live_actor_count(), 0);
}

#[test]
fn host_refusal_surfaces_as_spawn_error() {
    let (host, world, factory) = rig();
    host.borrow_mut().refuse_class("/Game/Floor.Floor_C");
    let err = factory.construct(&world, ActorKey::single(Role::Floor), &floor()).unwrap_err();
    match err {
        SceneError::Spawn { actor, class, .. } => {
            assert_eq!(actor, "Floor");
            assert_eq!(class, "/Game/Floor.Floor_C");
        }
        other => panic!("expected spawn error, got {other}"),
    }
}

fn failing_configure(_proxy: &mut ActorProxy, _resolved: ResolvedParams<'_>) -> plausim::Result<()> {
    Err(SceneError::lifecycle("Floor", "configure refused"))
}

#[test]
fn failed_configuration_destroys_fresh_actor() {
    let (host, world, mut factory) = rig();
    factory
        .register(Role::Floor, ActorConstructor { class: "/Game/Floor.Floor_C", configure: failing_configure })
        .expect("register");
    assert!(factory.construct(&world, ActorKey::single(Role::Floor), &floor()).is_err());
    assert_eq!(host.borrow().spawned_total(), 1);
    assert_eq!(host.borrow().live_actor_count(), 0);
}

#[test]
fn magic_role_cannot_be_registered_or_built() {
    let (_host, world, mut factory) = rig();
    let constructor = *factory.constructor(Role::Floor).expect("floor constructor");
    assert!(factory.register(Role::Magic, constructor).is_err());
    let err = factory.construct(&world, ActorKey::MAGIC, &ParameterSet::magic(Some(25), Vec::new())).unwrap_err();
    assert!(matches!(err, SceneError::Spawn { .. }));
}

#[test]
fn proxy_forces_accumulate_until_reset() {
    let (_host, world, factory) = rig();
    let object = ParameterSet::object(
        MeshShape::Sphere,
        Vec3::new(0.0, 0.0, 100.0),
        Rotator::ZERO,
        AssetRef::new("/Game/Materials/Object/BlueMaterial"),
    )
    .with_force(Vec3::new(1.0e7, 0.0, 0.0));
    let mut proxy = factory.construct(&world, ActorKey::new(Role::Object, 1), &object).expect("construct");
    proxy.play_force().expect("push");
    proxy.play_force().expect("push");
    assert_eq!(proxy.applied_force().expect("live"), Vec3::new(2.0e7, 0.0, 0.0));
    proxy.reset(&object).expect("reset");
    assert_eq!(proxy.applied_force().expect("live"), Vec3::ZERO);
    proxy.destroy().expect("destroy");
    assert!(proxy.play_force().is_err());
}
