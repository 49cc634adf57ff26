// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, VfsWatchError};
use crate::types::StrategyPreference;

/// Environment variable overriding `[watch].max_hierarchies`.
///
/// An integer sets the budget; `unbounded` removes it.
pub const MAX_HIERARCHIES_ENV: &str = "VFSWATCH_MAX_HIERARCHIES";

/// Environment variable overriding `[watch].strategy`.
pub const STRATEGY_ENV: &str = "VFSWATCH_STRATEGY";

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization and resolves relative paths
/// against the config file's directory; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let mut config: RawConfigFile = toml::from_str(&contents)?;
    resolve_relative_paths(&mut config, &config_base_dir(path));

    Ok(config)
}

/// Load a configuration file, apply environment overrides, and validate.
///
/// This is the recommended entry point for the rest of the application.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    load_and_validate_with_env(path, |key| std::env::var(key).ok())
}

/// Like [`load_and_validate`], with an explicit environment lookup.
pub fn load_and_validate_with_env<F>(path: impl AsRef<Path>, env: F) -> Result<ConfigFile>
where
    F: Fn(&str) -> Option<String>,
{
    let mut raw_config = load_from_path(&path)?;
    apply_env_overrides(&mut raw_config, env)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Apply process-level overrides on top of the file's settings.
pub fn apply_env_overrides<F>(cfg: &mut RawConfigFile, env: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = env(MAX_HIERARCHIES_ENV) {
        let value = value.trim();
        cfg.watch.max_hierarchies = if value.eq_ignore_ascii_case("unbounded") {
            None
        } else {
            let parsed = value.parse::<usize>().map_err(|_| {
                VfsWatchError::ConfigError(format!(
                    "{MAX_HIERARCHIES_ENV} must be a number or \"unbounded\" (got {value:?})"
                ))
            })?;
            Some(parsed)
        };
        debug!(max_hierarchies = ?cfg.watch.max_hierarchies, "watch budget overridden from environment");
    }

    if let Some(value) = env(STRATEGY_ENV) {
        cfg.watch.strategy = value
            .parse::<StrategyPreference>()
            .map_err(VfsWatchError::ConfigError)?;
        debug!(strategy = ?cfg.watch.strategy, "watch strategy overridden from environment");
    }

    Ok(())
}

fn resolve_relative_paths(cfg: &mut RawConfigFile, base: &Path) {
    for entry in cfg.build.iter_mut() {
        if entry.root.is_relative() {
            entry.root = base.join(&entry.root);
        }
    }
    for location in cfg.cache.global_locations.iter_mut() {
        if location.is_relative() {
            *location = base.join(&*location);
        }
    }
}

/// Directory relative config paths are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "configs/vfswatch.toml"),
///   we use that directory.
/// - If it's just a bare filename, we fall back to the current working
///   directory.
fn config_base_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Default config location: `vfswatch.toml` in the current directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("vfswatch.toml")
}
