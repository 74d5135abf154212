//! Configuration file discovery and loading
//!
//! Config file resolution follows a fixed priority order:
//! 1. Explicit path (command-line argument)
//! 2. Environment variable
//! 3. Per-user config file (`<config_dir>/<app>/config.toml`)
//! 4. Compiled defaults (no file)
//!
//! A missing file is never fatal. A file that exists but fails to parse is.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable consulted for the config file path
pub const CONFIG_ENV_VAR: &str = "AUDIOMIX_CONFIG";

/// Where a resolved config path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOrigin {
    CommandLine,
    Environment,
    UserConfigDir,
}

/// Resolve the config file path.
///
/// Explicit and environment paths are returned whether or not they exist, so
/// that the caller can warn about them. The per-user path is only returned
/// when the file is present.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    app_name: &str,
) -> Option<(PathBuf, ConfigOrigin)> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some((path.to_path_buf(), ConfigOrigin::CommandLine));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some((PathBuf::from(path), ConfigOrigin::Environment));
        }
    }

    // Priority 3: Per-user config file
    default_config_path(app_name)
        .filter(|path| path.exists())
        .map(|path| (path, ConfigOrigin::UserConfigDir))
}

/// Platform config file location for `app_name`
///
/// - Linux: `~/.config/<app>/config.toml`
/// - macOS: `~/Library/Application Support/<app>/config.toml`
/// - Windows: `%APPDATA%\<app>\config.toml`
pub fn default_config_path(app_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(app_name).join("config.toml"))
}

/// Parse a TOML file into `T`.
pub fn load_toml_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Resolve and load a config file, falling back to `T::default()`.
///
/// # Errors
/// Returns [`Error::Config`] if a config file exists but is not valid TOML for `T`.
pub fn load_or_default<T>(cli_arg: Option<&Path>, env_var_name: &str, app_name: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match resolve_config_path(cli_arg, env_var_name, app_name) {
        Some((path, origin)) if path.exists() => {
            info!("Loading configuration from {} ({:?})", path.display(), origin);
            load_toml_file(&path)
        }
        Some((path, origin)) => {
            warn!(
                "Config file {} ({:?}) not found, using defaults",
                path.display(),
                origin
            );
            Ok(T::default())
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(T::default())
        }
    }
}
