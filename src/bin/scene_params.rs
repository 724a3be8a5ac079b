use anyhow::{anyhow, Context, Result};
use plausim::catalog::StaticCatalog;
use plausim::config::GenerationConfig;
use plausim::factory::ActorFactory;
use plausim::host::headless::HeadlessHost;
use plausim::host::WorldHandle;
use plausim::saver::{JsonSaver, SaverHandle};
use plausim::scenario::{SceneKind, Scenario, ScenarioRegistry};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::to_writer_pretty;
use std::cell::RefCell;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

fn print_help() {
    eprintln!(
        "Usage: scene_params --scenario <name> [--seed <n>] [--kind train|test] [--out <path>]\n\n\
         Options:\n  --scenario <name>    Scenario to generate (SandBox, O1)\n  \
         --seed <n>           Seed of the generator (defaults to 0)\n  \
         --kind <kind>        train or test (defaults to train)\n  \
         --prob-walls <p>     Probability of generating walls (defaults to 1.0)\n  \
         --catalog <path>     JSON asset catalog (defaults to the built-in pools)\n  \
         --out <path>         Destination for the parameter JSON (defaults to stdout)\n  \
         --compact            Emit minified JSON instead of pretty output\n  \
         -h, --help           Show this message"
    );
}

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let mut scenario_name: Option<String> = None;
    let mut seed = 0u64;
    let mut kind = SceneKind::Train;
    let mut generation = GenerationConfig::default();
    let mut catalog_path: Option<PathBuf> = None;
    let mut out_path: Option<PathBuf> = None;
    let mut pretty = true;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--scenario" => {
                scenario_name = Some(args.next().context("--scenario requires a name")?);
            }
            "--seed" => {
                let value = args.next().context("--seed requires a value")?;
                seed = value.parse().with_context(|| format!("Invalid seed '{value}'"))?;
            }
            "--kind" => {
                let value = args.next().context("--kind requires a value")?;
                kind = match value.to_ascii_lowercase().as_str() {
                    "train" => SceneKind::Train,
                    "test" => SceneKind::Test,
                    other => return Err(anyhow!("Unknown scene kind '{other}'. Use train or test.")),
                };
            }
            "--prob-walls" => {
                let value = args.next().context("--prob-walls requires a value")?;
                generation.prob_walls = value.parse().with_context(|| format!("Invalid probability '{value}'"))?;
            }
            "--catalog" => {
                let value = args.next().context("--catalog requires a path")?;
                catalog_path = Some(PathBuf::from(value));
            }
            "--out" => {
                let value = args.next().context("--out requires a path")?;
                out_path = Some(PathBuf::from(value));
            }
            "--compact" => {
                pretty = false;
            }
            "-h" | "--help" => {
                print_help();
                return Ok(());
            }
            other => {
                return Err(anyhow!("Unknown argument '{other}'. Use --help for usage."));
            }
        }
    }

    let scenario_name = scenario_name.ok_or_else(|| anyhow!("--scenario is required"))?;
    let catalog = match catalog_path {
        Some(path) => StaticCatalog::load(&path)?,
        None => StaticCatalog::with_defaults(),
    };
    let variant = ScenarioRegistry::with_defaults().build(&scenario_name)?;
    let saver: SaverHandle = Rc::new(RefCell::new(JsonSaver::new(PathBuf::new(), true)));
    let mut rng = StdRng::seed_from_u64(seed);
    let scenario = Scenario::new(
        WorldHandle::new(HeadlessHost::default()),
        Rc::new(ActorFactory::with_defaults(Rc::new(catalog))),
        saver,
        variant,
        kind,
        generation,
        &mut rng,
    )
    .with_context(|| format!("Generating {scenario_name} parameters with seed {seed}"))?;

    match out_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Creating directory {}", parent.display()))?;
            }
            let file = File::create(&path).with_context(|| format!("Creating {}", path.display()))?;
            if pretty {
                to_writer_pretty(file, scenario.params())?;
            } else {
                serde_json::to_writer(file, scenario.params())?;
            }
            println!("Wrote parameters to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let handle = stdout.lock();
            if pretty {
                to_writer_pretty(handle, scenario.params())?;
            } else {
                serde_json::to_writer(handle, scenario.params())?;
            }
        }
    }

    Ok(())
}
