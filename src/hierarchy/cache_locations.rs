// src/hierarchy/cache_locations.rs

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::fs::FileSystem;
use crate::watch::path_utils::resolve;

/// Path prefixes known to hold immutable, content-addressed data
/// (dependency caches, transform caches, ...).
///
/// Nothing under these prefixes is ever watched.
#[derive(Debug, Clone, Default)]
pub struct CacheLocationRegistry {
    locations: Vec<PathBuf>,
}

impl CacheLocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configured locations, resolving each one
    /// through `fs` so it compares equal to discovered build roots.
    pub fn from_locations<I, P>(fs: &dyn FileSystem, locations: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut registry = Self::new();
        for location in locations {
            registry.add(resolve(fs, location.as_ref()));
        }
        registry
    }

    /// Register an already-resolved location. Duplicates are ignored.
    pub fn add(&mut self, location: impl Into<PathBuf>) {
        let location = location.into();
        if !self.locations.contains(&location) {
            debug!(location = %location.display(), "registered global cache location");
            self.locations.push(location);
        }
    }

    pub fn locations(&self) -> &[PathBuf] {
        &self.locations
    }

    /// Is `path` equal to or below any global cache location?
    pub fn is_in_global_cache(&self, path: &Path) -> bool {
        self.locations.iter().any(|loc| path.starts_with(loc))
    }
}
