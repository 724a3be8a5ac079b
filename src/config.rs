use crate::error::SceneError;
use crate::intervention::Intervention;
use crate::scenario::{SceneKind, ScenarioRegistry};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_VAR: &str = "PLAUSIM_CONFIG";
pub const DATADIR_VAR: &str = "PLAUSIM_DATADIR";
pub const SEED_VAR: &str = "PLAUSIM_SEED";
pub const RESOLUTION_VAR: &str = "PLAUSIM_RESOLUTION";
pub const DRY_MODE_VAR: &str = "PLAUSIM_DRY_MODE";

/// Capture resolution in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self { width: 288, height: 288 }
    }
}

impl Resolution {
    /// Console command that applies the resolution in the host.
    pub fn console_command(self) -> String {
        format!("r.SetRes {self}")
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = SceneError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || SceneError::config(format!("Invalid resolution '{raw}', expected WIDTHxHEIGHT"));
        let (width, height) = raw.trim().split_once(|c: char| c == 'x' || c == 'X').ok_or_else(invalid)?;
        let width = width.parse::<u32>().map_err(|_| invalid())?;
        let height = height.parse::<u32>().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

/// Bootstrap values given on the command line; each one wins over its environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BootstrapOverrides {
    pub config_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub seed: Option<u64>,
    pub resolution: Option<Resolution>,
    pub dry_mode: Option<bool>,
}

impl BootstrapOverrides {
    pub fn is_empty(&self) -> bool {
        self.applied_fields().is_empty()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.config_path.is_some() {
            fields.push("config");
        }
        if self.output_dir.is_some() {
            fields.push("output");
        }
        if self.seed.is_some() {
            fields.push("seed");
        }
        if self.resolution.is_some() {
            fields.push("resolution");
        }
        if self.dry_mode.is_some() {
            fields.push("dry_mode");
        }
        fields
    }
}

/// Process-level settings resolved before any scene is generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapEnv {
    pub config_path: PathBuf,
    pub output_dir: PathBuf,
    pub seed: Option<u64>,
    pub resolution: Resolution,
    pub dry_mode: bool,
}

impl BootstrapEnv {
    pub fn from_env(overrides: &BootstrapOverrides) -> crate::error::Result<Self> {
        Self::from_vars(|name| env::var(name).ok(), overrides)
    }

    pub fn from_vars(
        lookup: impl Fn(&str) -> Option<String>,
        overrides: &BootstrapOverrides,
    ) -> crate::error::Result<Self> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let config_path = overrides
            .config_path
            .clone()
            .or_else(|| var(CONFIG_VAR).map(PathBuf::from))
            .ok_or_else(|| SceneError::config(format!("No scene configuration: set {CONFIG_VAR} or pass --config")))?;
        let output_dir = overrides
            .output_dir
            .clone()
            .or_else(|| var(DATADIR_VAR).map(PathBuf::from))
            .ok_or_else(|| SceneError::config(format!("No output directory: set {DATADIR_VAR} or pass --output")))?;
        let seed = match overrides.seed {
            Some(seed) => Some(seed),
            None => var(SEED_VAR)
                .map(|raw| {
                    raw.trim().parse::<u64>().map_err(|_| SceneError::config(format!("Invalid {SEED_VAR} '{raw}'")))
                })
                .transpose()?,
        };
        let resolution = match overrides.resolution {
            Some(resolution) => resolution,
            None => var(RESOLUTION_VAR).map(|raw| raw.parse::<Resolution>()).transpose()?.unwrap_or_default(),
        };
        let dry_mode = match overrides.dry_mode {
            Some(dry_mode) => dry_mode,
            None => var(DRY_MODE_VAR)
                .map(|raw| {
                    crate::cli::parse_bool_flag(DRY_MODE_VAR, &raw).map_err(|err| SceneError::config(err.to_string()))
                })
                .transpose()?
                .unwrap_or(false),
        };
        Ok(Self { config_path, output_dir, seed, resolution, dry_mode })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "SimulationConfig::default_steps_per_run")]
    pub steps_per_run: u64,
    #[serde(default = "SimulationConfig::default_capture_every")]
    pub capture_every: u64,
    #[serde(default = "SimulationConfig::default_dt")]
    pub dt: f32,
}

impl SimulationConfig {
    const fn default_steps_per_run() -> u64 {
        100
    }

    const fn default_capture_every() -> u64 {
        1
    }

    fn default_dt() -> f32 {
        1.0 / 30.0
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            steps_per_run: Self::default_steps_per_run(),
            capture_every: Self::default_capture_every(),
            dt: Self::default_dt(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Probability of generating the Walls role for a scene.
    #[serde(default = "GenerationConfig::default_prob_walls")]
    pub prob_walls: f32,
}

impl GenerationConfig {
    fn default_prob_walls() -> f32 {
        1.0
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { prob_walls: Self::default_prob_walls() }
    }
}

/// How many scenes of one scenario to generate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneEntry {
    pub scenario: String,
    #[serde(default)]
    pub train: u32,
    #[serde(default)]
    pub test: u32,
    #[serde(default)]
    pub interventions: Vec<Intervention>,
}

/// One scene to generate, in processing order.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneSpec {
    pub scenario: String,
    pub kind: SceneKind,
    pub interventions: Vec<Intervention>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub scenes: Vec<SceneEntry>,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    /// JSON asset catalog; the built-in pools are used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,
}

impl Configuration {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).with_context(|| format!("Failed to read scene config {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse scene config {}", path.display()))?;
        Ok(cfg)
    }

    /// Reject configurations no scene could be generated from.
    pub fn validate(&self, registry: &ScenarioRegistry) -> crate::error::Result<()> {
        for entry in &self.scenes {
            if !registry.contains(&entry.scenario) {
                return Err(SceneError::config(format!("Unknown scenario '{}'", entry.scenario)));
            }
        }
        if self.simulation.steps_per_run == 0 {
            return Err(SceneError::config("simulation.steps_per_run must be positive"));
        }
        if self.simulation.capture_every == 0 {
            return Err(SceneError::config("simulation.capture_every must be positive"));
        }
        if !(self.simulation.dt > 0.0) {
            return Err(SceneError::config("simulation.dt must be positive"));
        }
        if !(0.0..=1.0).contains(&self.generation.prob_walls) {
            return Err(SceneError::config(format!(
                "generation.prob_walls must lie in [0, 1], got {}",
                self.generation.prob_walls
            )));
        }
        Ok(())
    }

    pub fn nruns_train(&self) -> u32 {
        self.scenes.iter().map(|entry| entry.train).sum()
    }

    pub fn nruns_test(&self) -> u32 {
        self.scenes.iter().map(|entry| entry.test).sum()
    }

    /// Every scene in processing order: per entry, test scenes first, then train scenes.
    pub fn iterations(&self) -> Vec<SceneSpec> {
        let mut specs = Vec::with_capacity((self.nruns_test() + self.nruns_train()) as usize);
        for entry in &self.scenes {
            for (kind, count) in [(SceneKind::Test, entry.test), (SceneKind::Train, entry.train)] {
                specs.extend((0..count).map(|_| SceneSpec {
                    scenario: entry.scenario.clone(),
                    kind,
                    interventions: entry.interventions.clone(),
                }));
            }
        }
        specs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn bootstrap_reads_environment() {
        let env = BootstrapEnv::from_vars(
            vars(&[
                (CONFIG_VAR, "scenes.json"),
                (DATADIR_VAR, "/tmp/out"),
                (SEED_VAR, "42"),
                (RESOLUTION_VAR, "64x48"),
                (DRY_MODE_VAR, "yes"),
            ]),
            &BootstrapOverrides::default(),
        )
        .expect("bootstrap");
        assert_eq!(env.config_path, PathBuf::from("scenes.json"));
        assert_eq!(env.seed, Some(42));
        assert_eq!(env.resolution, Resolution { width: 64, height: 48 });
        assert!(env.dry_mode);
    }

    #[test]
    fn bootstrap_defaults_and_overrides() {
        let overrides = BootstrapOverrides { seed: Some(7), dry_mode: Some(false), ..Default::default() };
        let env = BootstrapEnv::from_vars(
            vars(&[(CONFIG_VAR, "a.json"), (DATADIR_VAR, "out"), (SEED_VAR, "1"), (DRY_MODE_VAR, "1")]),
            &overrides,
        )
        .expect("bootstrap");
        assert_eq!(env.seed, Some(7));
        assert!(!env.dry_mode);
        assert_eq!(env.resolution, Resolution::default());
        assert_eq!(env.resolution.console_command(), "r.SetRes 288x288");
    }

    #[test]
    fn missing_datadir_is_a_configuration_error() {
        let err = BootstrapEnv::from_vars(vars(&[(CONFIG_VAR, "a.json")]), &BootstrapOverrides::default())
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains(DATADIR_VAR));
    }

    #[test]
    fn rejects_bad_resolution() {
        assert!("288".parse::<Resolution>().is_err());
        assert!("0x10".parse::<Resolution>().is_err());
        assert_eq!("640X480".parse::<Resolution>().ok(), Some(Resolution { width: 640, height: 480 }));
    }

    #[test]
    fn iterations_follow_entry_order() {
        let cfg: Configuration = serde_json::from_str(
            r#"{"scenes": [{"scenario": "O1", "train": 2, "test": 1}, {"scenario": "SandBox", "train": 1}]}"#,
        )
        .expect("parse config");
        assert_eq!(cfg.nruns_train(), 3);
        assert_eq!(cfg.nruns_test(), 1);
        let order: Vec<_> = cfg.iterations().into_iter().map(|spec| (spec.scenario, spec.kind)).collect();
        assert_eq!(
            order,
            vec![
                ("O1".to_string(), SceneKind::Test),
                ("O1".to_string(), SceneKind::Train),
                ("O1".to_string(), SceneKind::Train),
                ("SandBox".to_string(), SceneKind::Train),
            ]
        );
        assert_eq!(cfg.simulation, SimulationConfig::default());
        assert_eq!(cfg.generation.prob_walls, 1.0);
    }

    #[test]
    fn validation_catches_unknown_scenarios() {
        let registry = ScenarioRegistry::with_defaults();
        let mut cfg = Configuration {
            scenes: vec![SceneEntry { scenario: "Teapot".into(), train: 1, test: 0, interventions: Vec::new() }],
            ..Default::default()
        };
        assert!(cfg.validate(&registry).is_err());
        cfg.scenes[0].scenario = "SandBox".into();
        assert!(cfg.validate(&registry).is_ok());
        cfg.generation.prob_walls = 1.5;
        assert!(cfg.validate(&registry).is_err());
    }
}
