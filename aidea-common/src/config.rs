//! Configuration file lookup and data folder resolution
//!
//! Resolution order for every setting that can come from several places:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Application folder name under the OS config/data directories
pub const APP_DIR: &str = "aidea";

/// Resolve the folder holding day-files
pub fn resolve_data_folder(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_value: Option<&Path>,
) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = toml_value {
        return path.to_path_buf();
    }

    // Priority 4: OS-dependent compiled default
    default_data_folder()
}

/// OS-dependent default data folder
///
/// Linux: `~/.local/share/aidea`, macOS: `~/Library/Application Support/aidea`,
/// Windows: `%LOCALAPPDATA%\aidea`, otherwise `./aidea_data`.
pub fn default_data_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("./aidea_data"))
}

/// Locate the TOML config file
///
/// Explicit path (CLI), then `env_var_name`, then `<config dir>/aidea/<file_name>`.
/// Returns `None` when nothing exists; a missing file is not an error.
pub fn locate_config_file(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    file_name: &str,
) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join(APP_DIR).join(file_name))
        .filter(|p| p.exists())
}

/// Load a TOML config, falling back to defaults when the file is absent
///
/// A file that exists but cannot be read or parsed is an error; silently
/// ignoring a broken config would hide misconfiguration.
pub fn load_toml_or_default<T>(path: Option<&Path>) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(path) = path else {
        info!("No config file found, using defaults");
        return Ok(T::default());
    };

    if !path.exists() {
        warn!("Config file {} not found, using defaults", path.display());
        return Ok(T::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;

    info!("Loaded config from {}", path.display());
    Ok(config)
}

/// Create `path` (and parents) if missing
pub fn ensure_directory_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        info!("Created data folder: {}", path.display());
    } else if !path.is_dir() {
        return Err(Error::Config(format!(
            "Data folder path is not a directory: {}",
            path.display()
        )));
    }
    Ok(())
}

/// Read a non-empty environment variable
pub fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
