// src/watch/notify_backend.rs

//! [`NativeWatcher`] on top of the cross-platform `notify` crate.
//!
//! Every registered hierarchy gets its own `RecommendedWatcher`, whose
//! callback tags events with the hierarchy's [`WatchHandle`] and pushes them
//! into the shared [`EventQueue`]. Unregistering drops that watcher, which
//! stops its delivery.

use std::collections::HashMap;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{Flag, ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, trace, warn};

use crate::fs::FileSystem;
use crate::watch::native::{
    ChangeKind, NativeEvent, NativeWatcher, RegistrationError, WatchHandle, WatchStrategy,
};
use crate::watch::queue::EventQueue;

pub struct NotifyWatcher {
    strategy: WatchStrategy,
    queue: Arc<EventQueue>,
    fs: Arc<dyn FileSystem>,
    next_handle: u64,
    watchers: HashMap<WatchHandle, RecommendedWatcher>,
}

impl std::fmt::Debug for NotifyWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyWatcher")
            .field("strategy", &self.strategy)
            .field("registrations", &self.watchers.len())
            .finish()
    }
}

impl NotifyWatcher {
    pub fn new(strategy: WatchStrategy, queue: Arc<EventQueue>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            strategy,
            queue,
            fs,
            next_handle: 1,
            watchers: HashMap::new(),
        }
    }

    fn watch_tree_flat(
        &self,
        watcher: &mut RecommendedWatcher,
        top: &Path,
    ) -> Result<usize, RegistrationError> {
        let mut count = 0;
        for dir in walk_dirs(self.fs.as_ref(), top) {
            watcher
                .watch(&dir, RecursiveMode::NonRecursive)
                .map_err(|err| classify(&dir, err))?;
            count += 1;
        }
        Ok(count)
    }
}

impl NativeWatcher for NotifyWatcher {
    fn strategy(&self) -> WatchStrategy {
        self.strategy
    }

    fn register(&mut self, root: &Path) -> Result<WatchHandle, RegistrationError> {
        if !self.fs.is_dir(root) {
            return Err(RegistrationError::RootMissing(root.to_path_buf()));
        }

        let handle = WatchHandle::new(self.next_handle);
        self.next_handle += 1;

        let queue = Arc::clone(&self.queue);
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => forward(&queue, handle, event),
                Err(err) => {
                    warn!(%handle, error = %err, "native watch error; invalidating hierarchy");
                    queue.push_overflow(handle);
                }
            },
            Config::default(),
        )
        .map_err(|err| classify(root, err))?;

        match self.strategy {
            WatchStrategy::Subtree => {
                watcher
                    .watch(root, RecursiveMode::Recursive)
                    .map_err(|err| classify(root, err))?;
                debug!(root = ?root, %handle, "watching subtree");
            }
            WatchStrategy::Flat => {
                let dirs = self.watch_tree_flat(&mut watcher, root)?;
                debug!(root = ?root, %handle, dirs, "watching directories");
            }
        }

        self.watchers.insert(handle, watcher);
        Ok(handle)
    }

    fn unregister(&mut self, handle: WatchHandle) {
        if self.watchers.remove(&handle).is_some() {
            debug!(%handle, "dropped native watcher");
        }
    }

    fn watch_subdirectory(
        &mut self,
        handle: WatchHandle,
        dir: &Path,
    ) -> Result<(), RegistrationError> {
        if self.strategy != WatchStrategy::Flat {
            return Ok(());
        }
        let Some(mut watcher) = self.watchers.remove(&handle) else {
            return Ok(());
        };
        let result = self.watch_tree_flat(&mut watcher, dir);
        self.watchers.insert(handle, watcher);
        let dirs = result?;
        trace!(dir = ?dir, %handle, dirs, "watching new directories");
        Ok(())
    }
}

/// Translate a `notify` event into queue entries for `handle`.
fn forward(queue: &EventQueue, handle: WatchHandle, event: Event) {
    if matches!(event.attrs.flag(), Some(Flag::Rescan)) {
        queue.push_overflow(handle);
        return;
    }
    for (path, kind) in classify_event(&event) {
        queue.push(NativeEvent::new(handle, path, kind));
    }
}

/// Map one `notify` event onto per-path change kinds.
///
/// Renames become a removal of the old path and a creation of the new one.
/// Access notifications carry no change and are dropped.
pub fn classify_event(event: &Event) -> Vec<(PathBuf, ChangeKind)> {
    let kind = match event.kind {
        EventKind::Access(_) => return Vec::new(),
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Remove(_) => ChangeKind::Removed,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut out = Vec::new();
            if let Some(from) = event.paths.first() {
                out.push((from.clone(), ChangeKind::Removed));
            }
            if let Some(to) = event.paths.get(1) {
                out.push((to.clone(), ChangeKind::Created));
            }
            return out;
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => ChangeKind::Created,
        EventKind::Modify(ModifyKind::Name(_)) => ChangeKind::Removed,
        _ => ChangeKind::Modified,
    };
    event.paths.iter().map(|p| (p.clone(), kind)).collect()
}

fn classify(path: &Path, err: notify::Error) -> RegistrationError {
    match &err.kind {
        notify::ErrorKind::PathNotFound => RegistrationError::RootMissing(path.to_path_buf()),
        notify::ErrorKind::MaxFilesWatch => RegistrationError::LimitReached(err.to_string()),
        notify::ErrorKind::Io(io) if io.kind() == IoErrorKind::NotFound => {
            RegistrationError::RootMissing(path.to_path_buf())
        }
        notify::ErrorKind::Io(io) if io.kind() == IoErrorKind::PermissionDenied => {
            RegistrationError::PermissionDenied(path.to_path_buf())
        }
        _ => RegistrationError::Backend(err.to_string()),
    }
}

/// `top` and every directory below it, parents before children.
///
/// Symbolic links are not followed: a link back into the tree would never
/// terminate, and a link out of it would watch paths outside the hierarchy.
pub fn walk_dirs(fs: &dyn FileSystem, top: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![top.to_path_buf()];
    while let Some(dir) = stack.pop() {
        match fs.read_dir(&dir) {
            Ok(children) => {
                stack.extend(
                    children
                        .into_iter()
                        .filter(|c| !fs.is_symlink(c) && fs.is_dir(c)),
                );
            }
            Err(err) => {
                // Vanished between listing and descending; its parent's
                // watch reports the removal.
                trace!(dir = ?dir, error = %err, "skipping unreadable directory");
                continue;
            }
        }
        out.push(dir);
    }
    out
}
