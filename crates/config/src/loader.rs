use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    env_subst::substitute_env,
    error::{Error, Result},
    schema::CourierConfig,
    validate::{Severity, validate},
};

/// Config file name looked up in the search locations.
const CONFIG_FILENAME: &str = "courier.toml";

/// Load, substitute and validate the config at `path`.
pub fn load_config(path: &Path) -> Result<CourierConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&substitute_env(&raw))
}

/// Parse a TOML document and reject it if validation reports errors.
pub fn parse_config(raw: &str) -> Result<CourierConfig> {
    let config: CourierConfig = toml::from_str(raw)?;

    let diagnostics = validate(&config);
    for d in diagnostics.iter().filter(|d| d.severity == Severity::Warning) {
        warn!(path = %d.path, message = %d.message, "config warning");
    }
    if diagnostics.iter().any(|d| d.severity == Severity::Error) {
        return Err(Error::Invalid { diagnostics });
    }
    Ok(config)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./courier.toml`
/// 2. `~/.config/courier/courier.toml`
///
/// Falls back to `CourierConfig::default()` when nothing is found or the
/// file fails to load.
pub fn discover_and_load() -> CourierConfig {
    let Some(path) = find_config_file() else {
        debug!("no config file found, using defaults");
        return CourierConfig::default();
    };

    debug!(path = %path.display(), "loading config");
    match load_config(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            CourierConfig::default()
        },
    }
}

fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILENAME);
    if local.exists() {
        return Some(local);
    }
    config_dir()
        .map(|dir| dir.join(CONFIG_FILENAME))
        .filter(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/courier/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "courier").map(|d| d.config_dir().to_path_buf())
}
