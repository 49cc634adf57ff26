// src/hierarchy/mod.rs

//! Which directory trees need watching.
//!
//! - [`build_root`] models the builds participating in an invocation.
//! - [`cache_locations`] knows which paths are immutable global caches.
//! - [`calculator`] turns build roots into the minimal set of hierarchies.

use std::path::{Path, PathBuf};

pub mod build_root;
pub mod cache_locations;
pub mod calculator;

pub use build_root::{BuildId, BuildRoot, BuildTree};
pub use cache_locations::CacheLocationRegistry;
pub use calculator::HierarchyCalculator;

/// A directory subtree watched as a unit, and the builds it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hierarchy {
    root: PathBuf,
    builds: Vec<BuildId>,
}

impl Hierarchy {
    pub fn new(root: impl Into<PathBuf>, builds: Vec<BuildId>) -> Self {
        Self {
            root: root.into(),
            builds,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn builds(&self) -> &[BuildId] {
        &self.builds
    }

    pub(crate) fn add_build(&mut self, build: BuildId) {
        if !self.builds.contains(&build) {
            self.builds.push(build);
        }
    }
}
