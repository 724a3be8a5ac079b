use crate::config::{BootstrapOverrides, Resolution};
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CliOverrides {
    config: Option<PathBuf>,
    output: Option<PathBuf>,
    seed: Option<u64>,
    resolution: Option<Resolution>,
    dry_run: Option<bool>,
}

impl CliOverrides {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut overrides = CliOverrides::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            let Some(key) = flag.strip_prefix("--") else {
                bail!("Unexpected argument '{flag}'. Use --config/--output/--seed/--resolution/--dry-run.");
            };
            // --dry-run may stand alone
            if key == "dry-run" {
                overrides.dry_run = Some(true);
                continue;
            }
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "config" => overrides.config = Some(PathBuf::from(value)),
                "output" => overrides.output = Some(PathBuf::from(value)),
                "seed" => {
                    overrides.seed = Some(value.parse::<u64>().with_context(|| format!("Invalid seed '{value}'"))?);
                }
                "resolution" => {
                    overrides.resolution =
                        Some(value.parse::<Resolution>().with_context(|| format!("Invalid resolution '{value}'"))?);
                }
                "dry-mode" => overrides.dry_run = Some(parse_bool_flag("dry-mode", &value)?),
                _ => bail!(
                    "Unknown flag '{flag}'. Supported flags: --config, --output, --seed, --resolution, \
                     --dry-run, --dry-mode."
                ),
            }
        }
        Ok(overrides)
    }

    pub fn into_bootstrap_overrides(self) -> BootstrapOverrides {
        BootstrapOverrides {
            config_path: self.config,
            output_dir: self.output,
            seed: self.seed,
            resolution: self.resolution,
            dry_mode: self.dry_run,
        }
    }
}

pub(crate) fn parse_bool_flag(flag: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => bail!("Invalid {flag} value '{other}'. Use on/off or true/false."),
    }
}
