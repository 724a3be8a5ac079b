use glam::Vec3;
use plausim::actor::ActorTable;
use plausim::catalog::{AssetCatalog, StaticCatalog};
use plausim::config::GenerationConfig;
use plausim::error::{Result, SceneError};
use plausim::factory::ActorFactory;
use plausim::host::headless::HeadlessHost;
use plausim::host::{SimulationHost, WorldHandle};
use plausim::params::{ActorKey, MeshShape, ParamTable, ParameterSet, Role, Rotator};
use plausim::saver::{Saver, SaverHandle};
use plausim::scenario::{
    scene_subdir_name, GenerationContext, ObjectPermanence, RunState, SandBox, SceneKind, Scenario,
    ScenarioVariant, StatusHeader, MAGIC_TICK,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Saver that records the calls it receives.
struct RecordingSaver {
    dry_mode: bool,
    output_dir: PathBuf,
    calls: Vec<String>,
    fail_save: bool,
}

impl RecordingSaver {
    fn shared(dry_mode: bool) -> Rc<RefCell<RecordingSaver>> {
        let saver = RecordingSaver { dry_mode, output_dir: PathBuf::from("out"), calls: Vec::new(), fail_save: false };
        Rc::new(RefCell::new(saver))
    }
}

impl Saver for RecordingSaver {
    fn update(&mut self, actors: &ActorTable) {
        self.calls.push(format!("update({})", actors.len()));
    }

    fn capture(&mut self, ignored: &[ActorKey], header: &StatusHeader, _status: &Value) {
        self.calls.push(format!("capture({},{})", ignored.len(), header.name));
    }

    fn save(&mut self, path: &Path) -> Result<()> {
        self.calls.push(format!("save({})", path.display()));
        if self.fail_save {
            return Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only output").into());
        }
        Ok(())
    }

    fn reset(&mut self, full: bool) {
        self.calls.push(format!("reset({full})"));
    }

    fn is_dry_mode(&self) -> bool {
        self.dry_mode
    }

    fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// One object per shape: Cube, Cone and Sphere.
struct ShapeLineup;

impl ScenarioVariant for ShapeLineup {
    fn name(&self) -> &str {
        "ShapeLineup"
    }

    fn generate_parameters(&mut self, params: &mut ParamTable, ctx: &mut GenerationContext<'_>) -> Result<()> {
        for (index, shape) in [MeshShape::Cube, MeshShape::Cone, MeshShape::Sphere].into_iter().enumerate() {
            let material = ctx.catalog.pick_random("Object", &mut *ctx.rng)?;
            let location = Vec3::new(500.0, 150.0 * index as f32, 100.0);
            params.insert(
                ActorKey::new(Role::Object, index as u32 + 1),
                ParameterSet::object(shape, location, Rotator::ZERO, material),
            );
        }
        Ok(())
    }
}

struct Rig {
    host: Rc<RefCell<HeadlessHost>>,
    world: WorldHandle,
    factory: Rc<ActorFactory>,
}

impl Rig {
    fn new() -> Self {
        let host = Rc::new(RefCell::new(HeadlessHost::default()));
        let world = WorldHandle::from_shared(Rc::clone(&host));
        let catalog: Rc<dyn AssetCatalog> = Rc::new(StaticCatalog::with_defaults());
        Self { host, world, factory: Rc::new(ActorFactory::with_defaults(catalog)) }
    }

    fn scenario(
        &self,
        variant: Box<dyn ScenarioVariant>,
        kind: SceneKind,
        saver: SaverHandle,
        seed: u64,
    ) -> Scenario {
        let mut rng = StdRng::seed_from_u64(seed);
        Scenario::new(
            self.world.clone(),
            Rc::clone(&self.factory),
            saver,
            variant,
            kind,
            GenerationConfig::default(),
            &mut rng,
        )
        .expect("scenario generation")
    }
}

fn generate(seed: u64, variant: Box<dyn ScenarioVariant>) -> String {
    let rig = Rig::new();
    let scenario = rig.scenario(variant, SceneKind::Test, RecordingSaver::shared(true), seed);
    serde_json::to_string(scenario.params()).expect("serialize params")
}

#[test]
fn fixed_seed_reproduces_parameters() {
    for seed in [0, 7, 1234] {
        assert_eq!(generate(seed, Box::new(SandBox)), generate(seed, Box::new(SandBox)));
        assert_eq!(generate(seed, Box::new(ObjectPermanence)), generate(seed, Box::new(ObjectPermanence)));
    }
    assert_ne!(generate(1, Box::new(ObjectPermanence)), generate(2, Box::new(ObjectPermanence)));
}

#[test]
fn base_environment_is_generated() {
    let rig = Rig::new();
    let scenario = rig.scenario(Box::new(SandBox), SceneKind::Train, RecordingSaver::shared(true), 3);
    let camera = scenario.param(ActorKey::single(Role::Camera)).expect("camera params");
    assert_eq!(camera.location, Vec3::new(0.0, 0.0, 200.0));
    assert!(scenario.param(ActorKey::single(Role::SkySphere)).is_some());
    assert!(scenario.param(ActorKey::single(Role::Light)).is_some());
    let floor = scenario.param(ActorKey::single(Role::Floor)).expect("floor params");
    assert_eq!(floor.scale, Vec3::new(100.0, 100.0, 1.0));
    let walls = scenario.param(ActorKey::single(Role::Walls)).expect("walls generated with prob_walls = 1");
    assert!((1.0..=5.0).contains(&walls.scale.z));
    assert!((7.5..=12.5).contains(&walls.scale.x), "length drives the back wall span");
    assert!((3.75..=7.5).contains(&walls.scale.y), "depth drives the side wall span");
    assert_eq!(scenario.status_header().name, "SandBox");
    assert!(scenario.status_header().is_possible, "train scenes are possible");
}

#[test]
fn walls_gate_follows_probability() {
    let rig = Rig::new();
    let mut rng = StdRng::seed_from_u64(11);
    let scenario = Scenario::new(
        rig.world.clone(),
        Rc::clone(&rig.factory),
        RecordingSaver::shared(true),
        Box::new(SandBox),
        SceneKind::Train,
        GenerationConfig { prob_walls: 0.0 },
        &mut rng,
    )
    .expect("scenario generation");
    assert!(scenario.param(ActorKey::single(Role::Walls)).is_none());
}

#[test]
fn del_actors_is_idempotent() {
    let rig = Rig::new();
    let mut scenario = rig.scenario(Box::new(ObjectPermanence), SceneKind::Train, RecordingSaver::shared(true), 5);
    scenario.spawn_actors().expect("spawn");
    assert!(rig.host.borrow().live_actor_count() > 0);
    for _ in 0..3 {
        scenario.del_actors().expect("del_actors never fails on a clean scene");
        assert!(scenario.actors().is_none());
    }
    assert_eq!(rig.host.borrow().live_actor_count(), 0);
}

#[test]
fn failed_spawn_rolls_back_every_actor() {
    let rig = Rig::new();
    let mut scenario = rig.scenario(Box::new(SandBox), SceneKind::Train, RecordingSaver::shared(true), 9);
    let spawnable = scenario.params().keys().filter(|key| key.role.is_spawnable()).count();
    rig.host.borrow_mut().limit_spawns(spawnable - 1);

    let err = scenario.spawn_actors().unwrap_err();
    assert!(matches!(err, SceneError::Spawn { .. }), "unexpected error {err}");
    assert!(scenario.actors().is_none());
    assert_eq!(rig.host.borrow().spawned_total(), spawnable - 1);
    assert_eq!(rig.host.borrow().live_actor_count(), 0);
}

#[test]
fn magic_entry_is_never_spawned() {
    let rig = Rig::new();
    let mut scenario = rig.scenario(Box::new(ObjectPermanence), SceneKind::Test, RecordingSaver::shared(true), 2);
    assert!(scenario.param(ActorKey::MAGIC).is_some());
    scenario.spawn_actors().expect("spawn");
    let actors = scenario.actors().expect("actors");
    assert!(!actors.contains_key(&ActorKey::MAGIC));
    assert_eq!(actors.len(), scenario.params().len() - 1);
    assert_eq!(rig.host.borrow().live_actor_count(), actors.len());
}

#[test]
fn friction_overrides_follow_mesh_shape() {
    let rig = Rig::new();
    let mut scenario = rig.scenario(Box::new(ShapeLineup), SceneKind::Train, RecordingSaver::shared(true), 4);
    scenario.spawn_actors().expect("spawn");
    let cube = scenario.actor(ActorKey::new(Role::Object, 1)).expect("cube");
    let cone = scenario.actor(ActorKey::new(Role::Object, 2)).expect("cone");
    let sphere = scenario.actor(ActorKey::new(Role::Object, 3)).expect("sphere");
    assert_eq!(cube.friction_scale().expect("live"), Some(0.6155297517867));
    assert_eq!(cone.friction_scale().expect("live"), Some(1.6962973279499));
    assert_eq!(sphere.friction_scale().expect("live"), None);

    let host = rig.host.borrow();
    let state = host.actor_state(cube.handle().expect("handle")).expect("host state");
    assert_eq!(state.friction_scale, Some(0.6155297517867));
    assert_eq!(state.mass, 100.0);
    assert!(state.simulate_physics);
}

#[test]
fn subdirectories_follow_naming_contract() {
    assert_eq!(scene_subdir_name(26, SceneKind::Test, "O1", 2), "027_test_O1/3");
    assert_eq!(scene_subdir_name(27, SceneKind::Train, "O1", 0), "028_train_O1");

    let rig = Rig::new();
    let scenario = rig.scenario(Box::new(ObjectPermanence), SceneKind::Test, RecordingSaver::shared(false), 1);
    assert_eq!(scenario.scene_subdir(0), Path::new("out").join("01_test_O1/1"));
}

#[test]
fn stop_run_drives_saver_sequence() {
    let rig = Rig::new();
    let saver = RecordingSaver::shared(false);
    let mut scenario = rig.scenario(Box::new(ObjectPermanence), SceneKind::Test, saver.clone(), 6);
    assert_eq!(scenario.state(), RunState::Idle);

    scenario.play_run().expect("first run");
    assert_eq!(scenario.state(), RunState::Running);
    scenario.capture().expect("capture");
    assert!(scenario.stop_run(26).expect("stop first run"));
    assert!(!scenario.is_over());

    scenario.prepare_next_run().expect("prepare second run");
    scenario.play_run().expect("second run");
    assert!(scenario.stop_run(26).expect("stop second run"));
    assert!(scenario.is_over());
    assert_eq!(scenario.run(), 2);

    let calls = saver.borrow().calls.clone();
    let expected_first = format!("save({})", Path::new("out").join("027_test_O1/1").display());
    let expected_second = format!("save({})", Path::new("out").join("027_test_O1/2").display());
    assert_eq!(
        calls,
        vec![
            "update(7)".to_string(),
            "capture(0,O1)".to_string(),
            expected_first,
            "reset(false)".to_string(),
            "update(7)".to_string(),
            expected_second,
            "reset(true)".to_string(),
        ]
    );

    scenario.del_actors().expect("teardown");
    assert_eq!(scenario.state(), RunState::SceneComplete);
}

#[test]
fn dry_mode_skips_save_and_reset() {
    let rig = Rig::new();
    let saver = RecordingSaver::shared(true);
    let mut scenario = rig.scenario(Box::new(SandBox), SceneKind::Train, saver.clone(), 6);
    scenario.play_run().expect("run");
    assert!(scenario.stop_run(0).expect("stop"));
    assert_eq!(scenario.run(), 1);
    assert!(scenario.is_over());
    assert!(saver.borrow().calls.iter().all(|call| call.starts_with("update")));
}

#[test]
fn failed_save_still_counts_the_run() {
    let rig = Rig::new();
    let saver = RecordingSaver::shared(false);
    saver.borrow_mut().fail_save = true;
    let mut scenario = rig.scenario(Box::new(SandBox), SceneKind::Train, saver.clone(), 6);
    scenario.play_run().expect("run");
    let err = scenario.stop_run(0).unwrap_err();
    assert!(matches!(err, SceneError::Io(_)), "unexpected error {err}");
    assert_eq!(scenario.run(), 1);
    assert_eq!(scenario.state(), RunState::RunComplete);
    assert!(saver.borrow().calls.iter().all(|call| !call.starts_with("reset")), "no reset after a failed save");
}

#[test]
fn stop_run_requires_running_scene() {
    let rig = Rig::new();
    let mut scenario = rig.scenario(Box::new(SandBox), SceneKind::Train, RecordingSaver::shared(true), 6);
    let err = scenario.stop_run(0).unwrap_err();
    assert!(matches!(err, SceneError::Lifecycle { .. }));
    scenario.play_run().expect("run");
    assert!(scenario.play_run().is_err(), "a run cannot start twice");
}

#[test]
fn reset_actors_repositions_without_respawning() {
    let rig = Rig::new();
    let mut scenario = rig.scenario(Box::new(ObjectPermanence), SceneKind::Test, RecordingSaver::shared(true), 8);
    assert!(scenario.reset_actors().is_ok(), "reset without actors is a no-op");
    scenario.play_run().expect("run");
    let object = ActorKey::new(Role::Object, 1);
    let start = scenario.param(object).expect("object params").location;
    let handle = scenario.actor(object).expect("object").handle().expect("handle");
    for _ in 0..10 {
        rig.host.borrow_mut().step(0.1);
        scenario.tick().expect("tick");
    }
    assert_ne!(scenario.actor(object).expect("object").location().expect("location"), start);

    scenario.stop_run(0).expect("stop");
    scenario.prepare_next_run().expect("prepare");
    let actor = scenario.actor(object).expect("object");
    assert_eq!(actor.handle().expect("handle"), handle);
    assert_eq!(actor.transform().expect("transform").location, start);
    assert_eq!(actor.moves().expect("moves"), 0);
    assert_eq!(rig.host.borrow().spawned_total(), scenario.actors().map(|a| a.len()).unwrap_or(0));
}

#[test]
fn destroyed_proxies_report_lifecycle_errors() {
    let rig = Rig::new();
    let mut scenario = rig.scenario(Box::new(ObjectPermanence), SceneKind::Train, RecordingSaver::shared(true), 8);
    scenario.spawn_actors().expect("spawn");
    let object = ActorKey::new(Role::Object, 1);
    scenario.destroy_actor(object).expect("destroy");
    let actor = scenario.actor_mut(object).expect("entry stays");
    assert!(!actor.is_alive());
    assert!(matches!(actor.set_hidden(true), Err(SceneError::Lifecycle { .. })));
    assert!(matches!(actor.location(), Err(SceneError::Lifecycle { .. })));
    assert!(matches!(actor.destroy(), Err(SceneError::Lifecycle { .. })));
    scenario.del_actors().expect("teardown skips destroyed proxies");
    assert_eq!(rig.host.borrow().live_actor_count(), 0);
}

#[test]
fn magic_tick_is_stored() {
    let rig = Rig::new();
    let mut scenario = rig.scenario(Box::new(SandBox), SceneKind::Train, RecordingSaver::shared(true), 1);
    assert_eq!(scenario.magic_tick(), None);
    scenario.set_magic_tick();
    assert_eq!(scenario.magic_tick(), Some(MAGIC_TICK));

    let mut scenario = rig.scenario(Box::new(ObjectPermanence), SceneKind::Test, RecordingSaver::shared(true), 1);
    scenario.set_magic_tick();
    assert_eq!(scenario.magic_tick(), Some(25));
}
