// src/engine/discovery.rs

use std::io;
use std::sync::Arc;

use tracing::debug;

use crate::config::model::BuildEntry;
use crate::errors::{Result, VfsWatchError};
use crate::fs::FileSystem;
use crate::hierarchy::{BuildId, BuildRoot};
use crate::watch::path_utils::resolve;

/// Produces the participating builds of one invocation, in discovery order.
///
/// Errors are handed back to the caller of
/// [`crate::engine::VfsService::start_build`] untouched.
pub trait BuildRootSource {
    fn discover(&self) -> Result<Vec<BuildRoot>>;
}

/// Build roots taken from the `[[build]]` entries of the config file.
#[derive(Debug, Clone)]
pub struct ConfigBuildRoots {
    entries: Vec<BuildEntry>,
    fs: Arc<dyn FileSystem>,
}

impl ConfigBuildRoots {
    pub fn new(entries: Vec<BuildEntry>, fs: Arc<dyn FileSystem>) -> Self {
        Self { entries, fs }
    }
}

impl BuildRootSource for ConfigBuildRoots {
    fn discover(&self) -> Result<Vec<BuildRoot>> {
        let mut roots = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            if !self.fs.is_dir(&entry.root) {
                return Err(VfsWatchError::ConfigurationUnavailable {
                    path: entry.root.clone(),
                    source: io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("root directory of build '{}' does not exist", entry.id),
                    ),
                });
            }
            let root = BuildRoot::new(
                resolve(self.fs.as_ref(), &entry.root),
                entry.id.as_str(),
                entry.parent.as_deref().map(BuildId::from),
                entry.kind,
            );
            debug!(build = %root.build(), root = %root.root_dir().display(), "discovered build root");
            roots.push(root);
        }
        Ok(roots)
    }
}

/// A fixed list of build roots, for callers that already know them.
#[derive(Debug, Clone, Default)]
pub struct StaticBuildRoots(pub Vec<BuildRoot>);

impl BuildRootSource for StaticBuildRoots {
    fn discover(&self) -> Result<Vec<BuildRoot>> {
        Ok(self.0.clone())
    }
}
