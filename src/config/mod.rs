// src/config/mod.rs

//! Configuration loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and apply environment overrides
//!   (`loader.rs`).
//! - Validate invariants like the build parent graph (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    apply_env_overrides, default_config_path, load_and_validate, load_and_validate_with_env,
    load_from_path, MAX_HIERARCHIES_ENV, STRATEGY_ENV,
};
pub use model::{BuildEntry, CacheSection, ConfigFile, RawConfigFile, WatchSection, WatchSettings};
pub use validate::validate_config;
