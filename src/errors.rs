// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VfsWatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Build configuration could not be resolved (e.g. a root project
    /// directory is missing). Produced by build-root discovery, never by the
    /// watch machinery itself.
    #[error("Build configuration unavailable at {path:?}: {source}")]
    ConfigurationUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Build '{build}' names unknown parent build '{parent}'")]
    UnknownParentBuild { build: String, parent: String },

    #[error("Cycle detected in build parent graph: {0}")]
    BuildCycle(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, VfsWatchError>;

/// Lock a mutex, recovering the guard if a previous holder panicked.
///
/// Snapshot and registry state stay usable after a panicking build thread;
/// the worst case is a partially applied invalidation, which only costs a
/// re-stat.
pub(crate) fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn read_or_recover<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

pub(crate) fn write_or_recover<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
