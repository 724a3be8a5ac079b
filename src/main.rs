use plausim::cli::CliOverrides;
use plausim::config::BootstrapEnv;
use plausim::director::run_headless;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let overrides = match CliOverrides::parse_from_env() {
        Ok(parsed) => parsed.into_bootstrap_overrides(),
        Err(err) => {
            eprintln!("[cli] {err}");
            std::process::exit(2);
        }
    };
    if !overrides.is_empty() {
        log::debug!("Command line overrides: {}", overrides.applied_fields().join(", "));
    }
    let env = match BootstrapEnv::from_env(&overrides) {
        Ok(env) => env,
        Err(err) => {
            log::error!("{err}");
            std::process::exit(2);
        }
    };
    match run_headless(&env) {
        Ok(report) if report.skipped.is_empty() => {}
        Ok(report) => {
            for skipped in &report.skipped {
                log::warn!(
                    "Scene {} ({} {}) skipped: {}",
                    skipped.index + 1,
                    skipped.kind,
                    skipped.scenario,
                    skipped.reason
                );
            }
        }
        Err(err) => {
            log::error!("Generation failed: {err:?}");
            std::process::exit(1);
        }
    }
}
