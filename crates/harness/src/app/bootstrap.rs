use std::env;
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracker::TrackerSettings;

use super::script::{load_script, parse_script, Script, ScriptError, DEMO_SCRIPT};
use super::settings_file::{load_settings, settings_path, SettingsError};

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Script(#[from] ScriptError),
}

pub(crate) struct AppWiring {
    pub(crate) settings: TrackerSettings,
    pub(crate) script: Script,
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Armour Tracker Harness ===");

    let settings = load_settings(&settings_path())?;
    let script = match script_path_from_args() {
        Some(path) => {
            info!(path = %path.display(), "harness_script_selected");
            load_script(&path)?
        }
        None => {
            info!("harness_demo_script_selected");
            parse_script(DEMO_SCRIPT, "demo")?
        }
    };
    info!(
        steps = script.steps.len(),
        frames = script.total_frames(),
        frame_ms = script.frame_ms,
        "harness_script_loaded"
    );

    Ok(AppWiring { settings, script })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn script_path_from_args() -> Option<PathBuf> {
    env::args_os().nth(1).map(PathBuf::from)
}
