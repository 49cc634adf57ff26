// src/watch/native.rs

//! Boundary to the operating system's directory-watching facility.
//!
//! Only [`crate::watch::WatchRegistry`] holds a [`NativeWatcher`]; nothing
//! else creates or destroys native handles.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Opaque id of one native registration.
///
/// Ids are allocated monotonically and never reused, so an event carrying a
/// released handle can always be recognised as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WatchHandle(u64);

impl WatchHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Registration granularity of the native facility.
///
/// Chosen once per process; the registry contract is the same for both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchStrategy {
    /// One registration covers a whole directory tree (FSEvents,
    /// ReadDirectoryChangesW).
    Subtree,
    /// One registration per directory (inotify); new subdirectories have to
    /// be registered as they appear.
    Flat,
}

impl WatchStrategy {
    /// Platform probe.
    pub fn probe() -> Self {
        if cfg!(any(target_os = "macos", target_os = "windows")) {
            WatchStrategy::Subtree
        } else {
            WatchStrategy::Flat
        }
    }
}

/// What happened to a path, as far as snapshot invalidation cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    /// Created/removed change the parent directory's listing as well.
    pub fn is_structural(self) -> bool {
        !matches!(self, ChangeKind::Modified)
    }

    /// Combine two pending changes for the same path. A structural change
    /// is never replaced by a plain modification.
    pub fn merge(self, newer: ChangeKind) -> ChangeKind {
        if newer.is_structural() || !self.is_structural() {
            newer
        } else {
            self
        }
    }
}

/// One change delivered by the native facility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeEvent {
    pub handle: WatchHandle,
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl NativeEvent {
    pub fn new(handle: WatchHandle, path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self {
            handle,
            path: path.into(),
            kind,
        }
    }
}

/// Why the native facility refused a registration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("watch root {0:?} does not exist")]
    RootMissing(PathBuf),

    #[error("native watch limit reached: {0}")]
    LimitReached(String),

    #[error("permission denied watching {0:?}")]
    PermissionDenied(PathBuf),

    #[error("watch backend error: {0}")]
    Backend(String),
}

/// Capability consumed from the operating system.
///
/// Implementations deliver changes asynchronously into the
/// [`crate::watch::EventQueue`] they were constructed with, tagged with the
/// handle returned from [`register`](NativeWatcher::register).
pub trait NativeWatcher: Send {
    fn strategy(&self) -> WatchStrategy;

    /// Start observing `root`.
    fn register(&mut self, root: &Path) -> Result<WatchHandle, RegistrationError>;

    /// Stop observing. After this returns the backend delivers no further
    /// events for `handle`.
    fn unregister(&mut self, handle: WatchHandle);

    /// Flat strategy only: add `dir` (a directory created after
    /// registration) to an existing registration.
    fn watch_subdirectory(
        &mut self,
        handle: WatchHandle,
        dir: &Path,
    ) -> Result<(), RegistrationError>;
}
