use crate::actor::{ActorProxy, ActorTable};
use crate::catalog::AssetCatalog;
use crate::config::GenerationConfig;
use crate::error::{Result, SceneError};
use crate::factory::ActorFactory;
use crate::host::WorldHandle;
use crate::params::{ActorKey, LightKind, ParamTable, ParameterSet, Role, RoleDetail, Rotator};
use crate::saver::{ActorSnapshot, SaverHandle};
use crate::tick::TickDriver;
use glam::Vec3;
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

mod permanence;
mod sandbox;

pub use permanence::ObjectPermanence;
pub use sandbox::SandBox;

/// Tick stored in the magic entry by [`Scenario::set_magic_tick`].
pub const MAGIC_TICK: u32 = 25;

pub const WALL_HEIGHT_RANGE: (f32, f32) = (1.0, 5.0);
pub const WALL_LENGTH_RANGE: (f32, f32) = (3000.0, 5000.0);
pub const WALL_DEPTH_RANGE: (f32, f32) = (1500.0, 3000.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SceneKind {
    Train,
    Test,
}

impl SceneKind {
    pub fn label(self) -> &'static str {
        match self {
            SceneKind::Train => "train",
            SceneKind::Test => "test",
        }
    }
}

impl fmt::Display for SceneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// No actors.
    Idle,
    /// Actors live, no run started yet.
    Spawned,
    Running,
    RunComplete,
    /// Every run captured and the actors torn down.
    SceneComplete,
}

/// Status sent with every capture.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusHeader {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SceneKind,
    pub is_possible: bool,
}

/// What a variant sees while appending its own parameter sets.
pub struct GenerationContext<'a> {
    pub rng: &'a mut StdRng,
    pub catalog: &'a dyn AssetCatalog,
    pub settings: &'a GenerationConfig,
    pub kind: SceneKind,
}

/// Scenario subtype: names the scene, adds roles on top of the base environment and decides
/// how many runs the scene takes.
pub trait ScenarioVariant {
    fn name(&self) -> &str;

    fn generate_parameters(&mut self, _params: &mut ParamTable, _ctx: &mut GenerationContext<'_>) -> Result<()> {
        Ok(())
    }

    /// `run` counts completed runs.
    fn is_over(&self, _run: u32, _kind: SceneKind) -> bool {
        true
    }

    /// Whether the scene depicts physically possible events.
    fn is_possible(&self) -> bool {
        let name = self.name().to_ascii_lowercase();
        name.contains("plausible") && !name.contains("implausible")
    }

    /// Scenario-defined part of the capture status.
    fn status(&self, _run: u32, _kind: SceneKind, _params: &ParamTable) -> Value {
        Value::Null
    }

    /// Adjust parameters before run `run` (0-based) replays the scene.
    fn prepare_run(&mut self, _run: u32, _kind: SceneKind, _params: &mut ParamTable) {}

    /// Register tick hooks for run `run`.
    fn schedule(&self, _run: u32, _kind: SceneKind, _params: &ParamTable, _driver: &mut TickDriver<Scenario>) {}
}

pub type VariantCtor = fn() -> Box<dyn ScenarioVariant>;

/// Static name → variant registry.
pub struct ScenarioRegistry {
    variants: HashMap<String, VariantCtor>,
}

impl Default for ScenarioRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ScenarioRegistry {
    pub fn new() -> Self {
        Self { variants: HashMap::new() }
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("SandBox", || Box::new(SandBox));
        registry.register("O1", || Box::new(ObjectPermanence));
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, ctor: VariantCtor) {
        self.variants.insert(name.into(), ctor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variants.contains_key(name)
    }

    pub fn build(&self, name: &str) -> Result<Box<dyn ScenarioVariant>> {
        let ctor = self.variants.get(name).ok_or_else(|| SceneError::config(format!("unknown scenario '{name}'")))?;
        Ok(ctor())
    }
}

/// Sub-directory of one run: `0<idx>_<kind>_<name>`, plus `/<run + 1>` for test scenes.
pub fn scene_subdir_name(scene_index: usize, kind: SceneKind, name: &str, run: u32) -> String {
    let idx = scene_index + 1;
    let scene = format!("0{idx}_{}_{name}", kind.label());
    match kind {
        SceneKind::Test => format!("{scene}/{}", run + 1),
        SceneKind::Train => scene,
    }
}

/// One scene: its parameters, its live actors and the run lifecycle.
///
/// `actors` is either absent or holds a proxy for every spawnable entry of `params`.
/// `run` counts completed runs and never decreases.
pub struct Scenario {
    world: WorldHandle,
    factory: Rc<ActorFactory>,
    saver: SaverHandle,
    variant: Box<dyn ScenarioVariant>,
    kind: SceneKind,
    settings: GenerationConfig,
    params: ParamTable,
    actors: Option<ActorTable>,
    run: u32,
    state: RunState,
    status_header: StatusHeader,
}

impl Scenario {
    pub fn new(
        world: WorldHandle,
        factory: Rc<ActorFactory>,
        saver: SaverHandle,
        variant: Box<dyn ScenarioVariant>,
        kind: SceneKind,
        settings: GenerationConfig,
        rng: &mut StdRng,
    ) -> Result<Self> {
        let status_header = StatusHeader {
            name: variant.name().to_string(),
            kind,
            is_possible: kind == SceneKind::Train || variant.is_possible(),
        };
        let mut scenario = Self {
            world,
            factory,
            saver,
            variant,
            kind,
            settings,
            params: ParamTable::new(),
            actors: None,
            run: 0,
            state: RunState::Idle,
            status_header,
        };
        scenario.generate_parameters(rng)?;
        Ok(scenario)
    }

    pub fn name(&self) -> &str {
        self.variant.name()
    }

    pub fn kind(&self) -> SceneKind {
        self.kind
    }

    pub fn run(&self) -> u32 {
        self.run
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn status_header(&self) -> &StatusHeader {
        &self.status_header
    }

    pub fn world(&self) -> &WorldHandle {
        &self.world
    }

    pub fn factory(&self) -> &ActorFactory {
        &self.factory
    }

    pub fn params(&self) -> &ParamTable {
        &self.params
    }

    pub fn param(&self, key: ActorKey) -> Option<&ParameterSet> {
        self.params.get(&key)
    }

    pub fn actors(&self) -> Option<&ActorTable> {
        self.actors.as_ref()
    }

    pub fn actor(&self, key: ActorKey) -> Result<&ActorProxy> {
        self.actors
            .as_ref()
            .ok_or_else(|| SceneError::lifecycle(self.name(), "actors are not spawned"))?
            .get(&key)
            .ok_or_else(|| SceneError::lifecycle(key.to_string(), "no such actor in scene"))
    }

    pub fn actor_mut(&mut self, key: ActorKey) -> Result<&mut ActorProxy> {
        let name = self.variant.name();
        self.actors
            .as_mut()
            .ok_or_else(|| SceneError::lifecycle(name, "actors are not spawned"))?
            .get_mut(&key)
            .ok_or_else(|| SceneError::lifecycle(key.to_string(), "no such actor in scene"))
    }

    /// Rebuild every ParameterSet: the base environment, then the variant's roles.
    pub fn generate_parameters(&mut self, rng: &mut StdRng) -> Result<()> {
        let factory = Rc::clone(&self.factory);
        let catalog = factory.catalog();
        let mut params = ParamTable::new();

        params.insert(
            ActorKey::single(Role::Camera),
            ParameterSet::camera(Vec3::new(0.0, 0.0, 200.0), Rotator::ZERO),
        );
        params.insert(ActorKey::single(Role::SkySphere), ParameterSet::sky_sphere());
        params.insert(ActorKey::single(Role::Floor), ParameterSet::floor(catalog.pick_random("Floor", &mut *rng)?));
        params.insert(ActorKey::single(Role::Light), ParameterSet::light(LightKind::SkyLight));

        let draw: f32 = rng.gen_range(0.0..=1.0);
        if draw <= self.settings.prob_walls {
            let material = catalog.pick_random("Wall", &mut *rng)?;
            let height: f32 = rng.gen_range(WALL_HEIGHT_RANGE.0..=WALL_HEIGHT_RANGE.1);
            let length: f32 = rng.gen_range(WALL_LENGTH_RANGE.0..=WALL_LENGTH_RANGE.1);
            let depth: f32 = rng.gen_range(WALL_DEPTH_RANGE.0..=WALL_DEPTH_RANGE.1);
            params.insert(ActorKey::single(Role::Walls), ParameterSet::walls(material, height, length, depth));
        }

        let mut ctx = GenerationContext { rng, catalog, settings: &self.settings, kind: self.kind };
        self.variant.generate_parameters(&mut params, &mut ctx)?;
        self.params = params;
        Ok(())
    }

    /// Construct every spawnable entry. On failure the actors built so far are destroyed and
    /// `actors` stays absent.
    pub fn spawn_actors(&mut self) -> Result<()> {
        if self.actors.is_some() {
            return Err(SceneError::lifecycle(self.name(), "actors are already spawned"));
        }
        let mut staged = ActorTable::new();
        for (key, params) in &self.params {
            if !key.role.is_spawnable() {
                continue;
            }
            match spawn_one(&self.factory, &self.world, *key, params) {
                Ok(actor) => {
                    staged.insert(*key, actor);
                }
                Err(err) => {
                    log::warn!("{}: spawning {key} failed, rolling back {} actors", self.name(), staged.len());
                    destroy_all(&mut staged);
                    return Err(err);
                }
            }
        }
        log::debug!("{}: spawned {} actors", self.name(), staged.len());
        self.actors = Some(staged);
        self.state = RunState::Spawned;
        Ok(())
    }

    /// Re-pose objects and occluders from the current params without respawning them.
    /// Actors destroyed during the run are spawned again.
    pub fn reset_actors(&mut self) -> Result<()> {
        let Some(actors) = self.actors.as_mut() else {
            return Ok(());
        };
        for (key, actor) in actors.iter_mut() {
            let params = self
                .params
                .get(key)
                .ok_or_else(|| SceneError::lifecycle(key.to_string(), "no parameters to reset from"))?;
            if !actor.is_alive() {
                log::debug!("{key} was destroyed during the last run, spawning it again");
                *actor = spawn_one(&self.factory, &self.world, *key, params)?;
            } else if key.role.is_dynamic() {
                actor.reset(params)?;
            }
        }
        Ok(())
    }

    /// Destroy one actor mid-run. Its entry stays in the table and is respawned by the next
    /// [`reset_actors`](Scenario::reset_actors).
    pub fn destroy_actor(&mut self, key: ActorKey) -> Result<()> {
        self.actor_mut(key)?.destroy()
    }

    /// Destroy every live actor. A second call is a no-op.
    pub fn del_actors(&mut self) -> Result<()> {
        let Some(mut actors) = self.actors.take() else {
            return Ok(());
        };
        let result = destroy_all(&mut actors);
        self.state = if self.run > 0 && self.is_over() { RunState::SceneComplete } else { RunState::Idle };
        result
    }

    /// Start a run, spawning the actors first if needed, and register them with the saver.
    pub fn play_run(&mut self) -> Result<()> {
        match self.state {
            RunState::Idle | RunState::Spawned | RunState::RunComplete => {}
            RunState::Running => return Err(SceneError::lifecycle(self.name(), "run already in progress")),
            RunState::SceneComplete => return Err(SceneError::lifecycle(self.name(), "scene already complete")),
        }
        if self.actors.is_none() {
            self.spawn_actors()?;
        }
        if let Some(actors) = self.actors.as_ref() {
            self.saver.borrow_mut().update(actors);
        }
        self.state = RunState::Running;
        log::info!("{} ({}): run {} started", self.name(), self.kind, self.run + 1);
        Ok(())
    }

    /// Finish the current run: persist captures (outside dry mode) and advance the counter.
    pub fn stop_run(&mut self, scene_index: usize) -> Result<bool> {
        if self.state != RunState::Running {
            return Err(SceneError::lifecycle(self.name(), format!("stop_run while {:?}", self.state)));
        }
        let dry_mode = self.saver.borrow().is_dry_mode();
        let saved = if dry_mode {
            Ok(())
        } else {
            let path = self.scene_subdir(scene_index);
            let mut saver = self.saver.borrow_mut();
            let result = saver.save(&path);
            if result.is_ok() {
                // full reset when `run` is 1 at this point, counting from 0
                saver.reset(self.run == 1);
            }
            result
        };
        // the run counts as played even when its capture could not be written
        self.run += 1;
        self.state = RunState::RunComplete;
        saved?;
        log::info!("{} ({}): run {} complete", self.name(), self.kind, self.run);
        Ok(true)
    }

    pub fn scene_subdir(&self, scene_index: usize) -> PathBuf {
        let name = scene_subdir_name(scene_index, self.kind, self.name(), self.run);
        self.saver.borrow().output_dir().join(name)
    }

    pub fn is_over(&self) -> bool {
        self.variant.is_over(self.run, self.kind)
    }

    /// Let the variant adjust params for the next run, then re-pose dynamic actors.
    pub fn prepare_next_run(&mut self) -> Result<()> {
        if self.state != RunState::RunComplete {
            return Err(SceneError::lifecycle(self.name(), format!("prepare_next_run while {:?}", self.state)));
        }
        self.variant.prepare_run(self.run, self.kind, &mut self.params);
        self.reset_actors()
    }

    /// Register the variant's hooks for the current run.
    pub fn schedule_run(&self, driver: &mut TickDriver<Scenario>) {
        self.variant.schedule(self.run, self.kind, &self.params, driver);
    }

    /// Per-step movement of objects and occluders.
    pub fn tick(&mut self) -> Result<()> {
        if self.state != RunState::Running {
            return Ok(());
        }
        let Some(actors) = self.actors.as_mut() else {
            return Ok(());
        };
        for (_, actor) in actors.iter_mut().filter(|(key, actor)| key.role.is_dynamic() && actor.is_alive()) {
            actor.move_step()?;
        }
        Ok(())
    }

    pub fn capture(&mut self) -> Result<()> {
        let ignored: Vec<ActorKey> = Vec::new();
        let status = self.status()?;
        self.saver.borrow_mut().capture(&ignored, &self.status_header, &status);
        Ok(())
    }

    /// Scenario-defined status payload: live actor snapshots plus the variant's part.
    pub fn status(&self) -> Result<Value> {
        let mut actors = Map::new();
        if let Some(table) = self.actors.as_ref() {
            for (key, actor) in table {
                if actor.is_alive() {
                    actors.insert(key.to_string(), serde_json::to_value(ActorSnapshot::capture(actor)?)?);
                }
            }
        }
        Ok(json!({
            "run": self.run + 1,
            "actors": actors,
            "scene": self.variant.status(self.run, self.kind, &self.params),
        }))
    }

    pub fn set_magic_tick(&mut self) {
        match self.params.get_mut(&ActorKey::MAGIC).map(|params| &mut params.detail) {
            Some(RoleDetail::Magic { tick, .. }) => *tick = Some(MAGIC_TICK),
            _ => {
                self.params.insert(ActorKey::MAGIC, ParameterSet::magic(Some(MAGIC_TICK), Vec::new()));
            }
        }
    }

    pub fn magic_tick(&self) -> Option<u32> {
        self.params.get(&ActorKey::MAGIC).and_then(ParameterSet::magic_tick)
    }
}

fn spawn_one(factory: &ActorFactory, world: &WorldHandle, key: ActorKey, params: &ParameterSet) -> Result<ActorProxy> {
    let mut actor = factory.construct(world, key, params)?;
    if key.role == Role::Object {
        let friction = actor.mesh_shape()?.and_then(|shape| shape.friction_scale());
        if let Some(scale) = friction {
            if let Err(err) = actor.set_friction_scale(scale) {
                if let Err(teardown) = actor.destroy() {
                    log::warn!("{key}: teardown after friction override failed: {teardown}");
                }
                return Err(err);
            }
        }
    }
    Ok(actor)
}

fn destroy_all(actors: &mut ActorTable) -> Result<()> {
    let mut first_error = None;
    for (key, actor) in actors.iter_mut().filter(|(_, actor)| actor.is_alive()) {
        if let Err(err) = actor.destroy() {
            log::warn!("destroying {key}: {err}");
            first_error.get_or_insert(err);
        }
    }
    actors.clear();
    first_error.map_or(Ok(()), Err)
}
