use super::{GenerationContext, SceneKind, Scenario, ScenarioVariant};
use crate::error::Result;
use crate::params::{ActorKey, MeshShape, Movement, ParamTable, ParameterSet, Role, RoleDetail, Rotator};
use crate::tick::{StepTrigger, TickDriver};
use glam::Vec3;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};

/// Runs in a test scene. The second one (index 1) is the impossible one.
pub const TEST_RUNS: u32 = 2;
pub const IMPOSSIBLE_RUN: u32 = 1;

const OBJECT: ActorKey = ActorKey::new(Role::Object, 1);
const OCCLUDER: ActorKey = ActorKey::new(Role::Occluder, 1);

/// Object permanence: an object slides behind an occluder. On the impossible run of a test
/// scene it vanishes at the magic tick.
#[derive(Debug, Default, Clone, Copy)]
pub struct ObjectPermanence;

impl ObjectPermanence {
    fn object(ctx: &mut GenerationContext<'_>) -> Result<ParameterSet> {
        let shape = *MeshShape::OBJECT_SHAPES.choose(&mut *ctx.rng).unwrap_or(&MeshShape::Sphere);
        let material = ctx.catalog.pick_random("Object", &mut *ctx.rng)?;
        let location = Vec3::new(ctx.rng.gen_range(600.0..=900.0), ctx.rng.gen_range(-400.0..=-200.0), 50.0);
        let rotation = Rotator::new(0.0, ctx.rng.gen_range(0.0..360.0), 0.0);
        let scale: f32 = ctx.rng.gen_range(0.8..=1.2);
        let push: f32 = ctx.rng.gen_range(5.0e6..=1.0e7);
        Ok(ParameterSet::object(shape, location, rotation, material)
            .with_scale(Vec3::splat(scale))
            .with_force(Vec3::new(0.0, push, 0.0)))
    }

    fn occluder(ctx: &mut GenerationContext<'_>, object_x: f32) -> Result<ParameterSet> {
        let material = ctx.catalog.pick_random("Wall", &mut *ctx.rng)?;
        let location = Vec3::new(object_x - 200.0, 0.0, ctx.rng.gen_range(0.0..=100.0));
        let sink: f32 = ctx.rng.gen_range(0.5..=2.0);
        Ok(ParameterSet::occluder(
            location,
            Rotator::new(0.0, 90.0, 0.0),
            Vec3::new(1.0, 1.0, 1.5),
            material,
            Movement::Dynamic { step: Vec3::new(0.0, 0.0, -sink) },
        ))
    }

    fn is_possible_run(run: u32, kind: SceneKind) -> bool {
        kind == SceneKind::Train || run != IMPOSSIBLE_RUN
    }
}

impl ScenarioVariant for ObjectPermanence {
    fn name(&self) -> &str {
        "O1"
    }

    fn generate_parameters(&mut self, params: &mut ParamTable, ctx: &mut GenerationContext<'_>) -> Result<()> {
        let object = Self::object(ctx)?;
        let occluder = Self::occluder(ctx, object.location.x)?;
        let tick: u32 = ctx.rng.gen_range(20..=60);
        params.insert(OBJECT, object);
        params.insert(OCCLUDER, occluder);
        params.insert(ActorKey::MAGIC, ParameterSet::magic(Some(tick), vec![OBJECT]));
        Ok(())
    }

    fn is_over(&self, run: u32, kind: SceneKind) -> bool {
        match kind {
            SceneKind::Train => run >= 1,
            SceneKind::Test => run >= TEST_RUNS,
        }
    }

    fn status(&self, run: u32, kind: SceneKind, params: &ParamTable) -> Value {
        json!({
            "magic_tick": params.get(&ActorKey::MAGIC).and_then(ParameterSet::magic_tick),
            "possible": Self::is_possible_run(run, kind),
        })
    }

    fn schedule(&self, run: u32, kind: SceneKind, params: &ParamTable, driver: &mut TickDriver<Scenario>) {
        driver.add_hook("object.push", StepTrigger::At(1), |scenario: &mut Scenario, _| {
            scenario.actor_mut(OBJECT)?.play_force()
        });
        if Self::is_possible_run(run, kind) {
            return;
        }
        let Some(magic) = params.get(&ActorKey::MAGIC) else {
            log::warn!("O1: no magic entry, impossible run {} plays out as possible", run + 1);
            return;
        };
        let Some(tick) = magic.magic_tick() else {
            return;
        };
        let targets = match &magic.detail {
            RoleDetail::Magic { actors, .. } => actors.clone(),
            _ => Vec::new(),
        };
        driver.add_hook("magic.vanish", StepTrigger::At(u64::from(tick)), move |scenario: &mut Scenario, step| {
            for key in &targets {
                log::debug!("step {step}: hiding {key}");
                scenario.actor_mut(*key)?.set_hidden(true)?;
            }
            Ok(())
        });
    }
}
