//! Drives every configured scene through its runs and keeps going past scenes that fail.

use crate::catalog::{AssetCatalog, StaticCatalog};
use crate::config::{BootstrapEnv, Configuration, Resolution, SceneSpec};
use crate::error::Result;
use crate::factory::ActorFactory;
use crate::host::headless::HeadlessHost;
use crate::host::WorldHandle;
use crate::intervention;
use crate::saver::{JsonSaver, SaverHandle};
use crate::scenario::{SceneKind, Scenario, ScenarioRegistry};
use crate::tick::{StepTrigger, TickDriver, TickStatus};
use anyhow::Context;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct SceneOutcome {
    pub index: usize,
    pub scenario: String,
    pub kind: SceneKind,
    pub runs: u32,
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedScene {
    pub index: usize,
    pub scenario: String,
    pub kind: SceneKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DirectorReport {
    pub seed: u64,
    pub generated: Vec<SceneOutcome>,
    pub skipped: Vec<SkippedScene>,
}

pub struct Director {
    world: WorldHandle,
    factory: Rc<ActorFactory>,
    saver: SaverHandle,
    registry: ScenarioRegistry,
    config: Configuration,
    resolution: Resolution,
    seed: u64,
    rng: StdRng,
}

impl Director {
    /// Fails with a configuration error before any scene is touched.
    pub fn new(
        world: WorldHandle,
        factory: Rc<ActorFactory>,
        saver: SaverHandle,
        config: Configuration,
        seed: u64,
    ) -> Result<Self> {
        Self::with_registry(world, factory, saver, ScenarioRegistry::with_defaults(), config, seed)
    }

    pub fn with_registry(
        world: WorldHandle,
        factory: Rc<ActorFactory>,
        saver: SaverHandle,
        registry: ScenarioRegistry,
        config: Configuration,
        seed: u64,
    ) -> Result<Self> {
        config.validate(&registry)?;
        Ok(Self {
            world,
            factory,
            saver,
            registry,
            config,
            resolution: Resolution::default(),
            seed,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn run(&mut self) -> Result<DirectorReport> {
        self.world.borrow_mut().execute_command(&self.resolution.console_command());
        let iterations = self.config.iterations();
        let total = iterations.len();
        log::info!(
            "Generating {total} scenes ({} test, {} train) with seed {}",
            self.config.nruns_test(),
            self.config.nruns_train(),
            self.seed
        );
        let mut report = DirectorReport { seed: self.seed, ..Default::default() };
        for (index, spec) in iterations.iter().enumerate() {
            log::info!("Scene {}/{total}: {} ({})", index + 1, spec.scenario, spec.kind);
            match self.run_scene(index, spec) {
                Ok(outcome) => report.generated.push(outcome),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    log::warn!("Skipping scene {} ({} {}): {err}", index + 1, spec.kind, spec.scenario);
                    report.skipped.push(SkippedScene {
                        index,
                        scenario: spec.scenario.clone(),
                        kind: spec.kind,
                        reason: err.to_string(),
                    });
                }
            }
        }
        log::info!("Generated {} scenes, skipped {}", report.generated.len(), report.skipped.len());
        Ok(report)
    }

    /// One scene from generation to teardown. Actors are destroyed whatever the outcome.
    pub fn run_scene(&mut self, index: usize, spec: &SceneSpec) -> Result<SceneOutcome> {
        let variant = self.registry.build(&spec.scenario)?;
        let mut scenario = Scenario::new(
            self.world.clone(),
            Rc::clone(&self.factory),
            Rc::clone(&self.saver),
            variant,
            spec.kind,
            self.config.generation,
            &mut self.rng,
        )?;
        let output = scenario.scene_subdir(index);
        let played = self.play_scene(index, spec, &mut scenario);
        let teardown = scenario.del_actors();
        match (played, teardown) {
            (Ok(()), Ok(())) => Ok(SceneOutcome {
                index,
                scenario: spec.scenario.clone(),
                kind: spec.kind,
                runs: scenario.run(),
                output,
            }),
            (Ok(()), Err(err)) => Err(err),
            (Err(err), teardown) => {
                if let Err(teardown) = teardown {
                    log::warn!("Teardown after failed scene also failed: {teardown}");
                }
                self.saver.borrow_mut().reset(true);
                Err(err)
            }
        }
    }

    fn play_scene(&mut self, index: usize, spec: &SceneSpec, scenario: &mut Scenario) -> Result<()> {
        let simulation = self.config.simulation;
        loop {
            scenario.play_run()?;
            let mut driver = TickDriver::with_final_step(simulation.steps_per_run);
            driver.add_hook("scenario.tick", StepTrigger::Every(1), |scenario: &mut Scenario, _| scenario.tick());
            scenario.schedule_run(&mut driver);
            intervention::schedule(&spec.interventions, &mut driver);
            let every = StepTrigger::Every(simulation.capture_every);
            driver.add_hook("scenario.capture", every, |scenario: &mut Scenario, _| scenario.capture());
            loop {
                self.world.borrow_mut().step(simulation.dt);
                if driver.tick(scenario, simulation.dt)? == TickStatus::Finished {
                    break;
                }
            }
            scenario.stop_run(index)?;
            if scenario.is_over() {
                return Ok(());
            }
            scenario.prepare_next_run()?;
        }
    }
}

/// Generate every configured scene in the in-process headless host.
pub fn run_headless(env: &BootstrapEnv) -> anyhow::Result<DirectorReport> {
    let config = Configuration::load(&env.config_path)?;
    let catalog: Rc<dyn AssetCatalog> = match &config.catalog {
        Some(path) => {
            let path = match env.config_path.parent() {
                Some(dir) if path.is_relative() => dir.join(path),
                _ => path.clone(),
            };
            Rc::new(StaticCatalog::load(&path).with_context(|| format!("Loading asset catalog {}", path.display()))?)
        }
        None => Rc::new(StaticCatalog::with_defaults()),
    };
    let seed = env.seed.unwrap_or_else(rand::random);
    let world = WorldHandle::new(HeadlessHost::new("PlausimWorld"));
    let factory = Rc::new(ActorFactory::with_defaults(catalog));
    let saver: SaverHandle = Rc::new(RefCell::new(JsonSaver::new(env.output_dir.clone(), env.dry_mode)));
    if env.dry_mode {
        log::info!("Dry mode: nothing is written to {}", env.output_dir.display());
    }
    let mut director = Director::new(world, factory, saver, config, seed)?.with_resolution(env.resolution);
    let report = director.run()?;
    Ok(report)
}
