use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use tracker::TrackerSettings;

pub(crate) const SETTINGS_ENV_VAR: &str = "TRACKER_SETTINGS";
const DEFAULT_SETTINGS_PATH: &str = "tracker_settings.json";

#[derive(Debug, Error)]
pub(crate) enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid settings file {path} at {field}: {source}")]
    Parse {
        path: PathBuf,
        field: String,
        #[source]
        source: serde_json::Error,
    },
}

pub(crate) fn settings_path() -> PathBuf {
    env::var_os(SETTINGS_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH))
}

/// Reads tracker settings from `path`. A missing file yields the defaults;
/// fields absent from the file keep their default values.
pub(crate) fn load_settings(path: &Path) -> Result<TrackerSettings, SettingsError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(source) if source.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "settings_file_missing_using_defaults");
            return Ok(TrackerSettings::default());
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut deserializer = serde_json::Deserializer::from_str(&raw);
    let settings = serde_path_to_error::deserialize::<_, TrackerSettings>(&mut deserializer)
        .map_err(|error| SettingsError::Parse {
            path: path.to_path_buf(),
            field: error.path().to_string(),
            source: error.into_inner(),
        })?;
    info!(path = %path.display(), "settings_file_loaded");
    Ok(settings)
}
