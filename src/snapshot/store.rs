// src/snapshot/store.rs

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use tracing::{debug, trace};

use crate::errors::{lock_or_recover, read_or_recover, write_or_recover, Result};
use crate::fs::{EntryKind, FileSystem};
use crate::snapshot::hash::{compute_file_hash, compute_listing_hash};
use crate::snapshot::node::{Fingerprint, NodeKind, SnapshotNode};
use crate::watch::native::WatchHandle;
use crate::watch::path_utils::normalize;
use crate::watch::queue::QueuedEvent;

/// Cached nodes of one watched hierarchy (or of the unwatched remainder).
#[derive(Debug)]
struct Partition {
    owner: Option<WatchHandle>,
    nodes: BTreeMap<PathBuf, SnapshotNode>,
}

impl Partition {
    fn new(owner: Option<WatchHandle>) -> Self {
        Self {
            owner,
            nodes: BTreeMap::new(),
        }
    }

    /// Drop `path` and every cached descendant.
    fn invalidate(&mut self, path: &Path) -> usize {
        let doomed: Vec<PathBuf> = self
            .nodes
            .range(path.to_path_buf()..)
            .take_while(|(p, _)| p.starts_with(path))
            .map(|(p, _)| p.clone())
            .collect();
        for p in &doomed {
            self.nodes.remove(p);
        }
        doomed.len()
    }

    /// Drop only the node for `path` (a directory whose listing changed).
    fn forget(&mut self, path: &Path) -> bool {
        self.nodes.remove(path).is_some()
    }

    fn clear(&mut self) -> usize {
        let n = self.nodes.len();
        self.nodes.clear();
        n
    }
}

#[derive(Debug, Default)]
struct Partitions {
    by_root: BTreeMap<PathBuf, Arc<Mutex<Partition>>>,
    owners: HashMap<WatchHandle, PathBuf>,
}

impl Partitions {
    /// The partition with the longest root that contains `path`.
    fn containing(&self, path: &Path) -> Option<Arc<Mutex<Partition>>> {
        self.by_root
            .iter()
            .filter(|(root, _)| path.starts_with(root))
            .max_by_key(|(root, _)| root.components().count())
            .map(|(_, partition)| Arc::clone(partition))
    }
}

/// What the store did with a native event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDisposition {
    /// Applied on behalf of the hierarchy rooted at `root`.
    Applied { root: PathBuf },
    /// The handle is no longer attached; the event was dropped.
    Discarded,
}

/// The daemon's cached view of the filesystem.
///
/// Nodes under an attached (watched) hierarchy live in that hierarchy's
/// partition and survive across builds; the native event stream keeps them
/// honest. Everything else lives in a volatile partition that is cleared at
/// every build boundary ([`SnapshotStore::begin_build`]).
///
/// Locking is per hierarchy: lookups and invalidations take one partition
/// mutex at a time. Event application holds the partition table's read lock,
/// so [`SnapshotStore::discard_subtree`] (write lock) waits for an in-flight
/// event to finish, and afterwards every event of the released handle is
/// discarded.
#[derive(Debug)]
pub struct SnapshotStore {
    fs: Arc<dyn FileSystem>,
    partitions: RwLock<Partitions>,
    volatile: Mutex<Partition>,
}

impl SnapshotStore {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            partitions: RwLock::new(Partitions::default()),
            volatile: Mutex::new(Partition::new(None)),
        }
    }

    /// Look up `path`, serving the cached node when it is trusted and
    /// stat'ing the filesystem otherwise. A path that does not exist yields
    /// a [`NodeKind::Missing`] node, not an error.
    pub fn get(&self, path: &Path) -> Result<SnapshotNode> {
        let path = normalize(path);
        let partition = read_or_recover(&self.partitions).containing(&path);
        match partition {
            Some(partition) => {
                let mut partition = lock_or_recover(&partition);
                if partition.owner.is_none() {
                    // Detached while we were waiting; serve fresh, cache nothing.
                    return self.stat(&path);
                }
                self.lookup(&mut partition, &path)
            }
            None => {
                let mut volatile = lock_or_recover(&self.volatile);
                self.lookup(&mut volatile, &path)
            }
        }
    }

    fn lookup(&self, partition: &mut Partition, path: &Path) -> Result<SnapshotNode> {
        if let Some(node) = partition.nodes.get(path) {
            trace!(path = ?path, "snapshot hit");
            return Ok(node.clone());
        }
        let node = self.stat(path)?;
        partition.nodes.insert(path.to_path_buf(), node.clone());
        Ok(node)
    }

    fn stat(&self, path: &Path) -> Result<SnapshotNode> {
        trace!(path = ?path, "snapshot miss; reading from disk");
        let kind = match self.fs.entry_kind(path)? {
            None => return Ok(SnapshotNode::missing(path)),
            Some(kind) => kind,
        };
        let hashed = match kind {
            EntryKind::File => compute_file_hash(self.fs.as_ref(), path),
            EntryKind::Directory => compute_listing_hash(self.fs.as_ref(), path),
        };
        match hashed {
            Ok(hex) => {
                let node_kind = match kind {
                    EntryKind::File => NodeKind::File,
                    EntryKind::Directory => NodeKind::Directory,
                };
                Ok(SnapshotNode::new(path, node_kind, Some(Fingerprint::new(hex))))
            }
            Err(err) => {
                // Deleted between the stat and the read.
                if self.fs.entry_kind(path)?.is_none() {
                    Ok(SnapshotNode::missing(path))
                } else {
                    Err(err.into())
                }
            }
        }
    }

    /// Drop `path` and all of its cached descendants, wherever they live.
    pub fn invalidate(&self, path: &Path) -> usize {
        let path = normalize(path);
        let partitions = read_or_recover(&self.partitions);
        self.invalidate_locked(&partitions, &path)
    }

    fn invalidate_locked(&self, partitions: &Partitions, path: &Path) -> usize {
        let mut removed = lock_or_recover(&self.volatile).invalidate(path);
        for partition in partitions.by_root.values() {
            removed += lock_or_recover(partition).invalidate(path);
        }
        removed
    }

    fn forget_locked(&self, partitions: &Partitions, path: &Path) {
        lock_or_recover(&self.volatile).forget(path);
        for partition in partitions.by_root.values() {
            lock_or_recover(partition).forget(path);
        }
    }

    /// Proactively invalidate paths a build has just written, so the build
    /// never reads its own output through a cached pre-write node while the
    /// change event is still in flight.
    pub fn record_outputs<I, P>(&self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let partitions = read_or_recover(&self.partitions);
        for path in paths {
            let path = normalize(path.as_ref());
            let removed = self.invalidate_locked(&partitions, &path);
            if let Some(parent) = path.parent() {
                self.forget_locked(&partitions, parent);
            }
            trace!(path = ?path, removed, "invalidated build output");
        }
    }

    /// Apply one event from the native stream.
    ///
    /// Events whose handle is not attached are dropped without touching any
    /// state.
    pub fn apply(&self, event: &QueuedEvent) -> EventDisposition {
        let partitions = read_or_recover(&self.partitions);
        let handle = event.handle();
        let Some(root) = partitions.owners.get(&handle).cloned() else {
            trace!(%handle, "discarding event for released handle");
            return EventDisposition::Discarded;
        };

        match event {
            QueuedEvent::Overflow { .. } => {
                if let Some(partition) = partitions.by_root.get(&root) {
                    let removed = lock_or_recover(partition).clear();
                    debug!(root = ?root, removed, "overflow; dropped hierarchy snapshot");
                }
            }
            QueuedEvent::Change(change) => {
                let path = normalize(&change.path);
                let removed = self.invalidate_locked(&partitions, &path);
                if change.kind.is_structural() {
                    if let Some(parent) = path.parent() {
                        self.forget_locked(&partitions, parent);
                    }
                }
                trace!(path = ?path, kind = ?change.kind, removed, "applied change");
            }
        }
        EventDisposition::Applied { root }
    }

    /// Start tracking `root` for `handle` with an empty partition.
    ///
    /// Anything previously cached under `root` is dropped, so a hierarchy
    /// coming back from `Stale` is re-derived from disk.
    pub fn attach(&self, root: &Path, handle: WatchHandle) {
        let mut partitions = write_or_recover(&self.partitions);
        if let Some(previous) = partitions.by_root.remove(root) {
            let mut detached = lock_or_recover(&previous);
            detached.owner = None;
            detached.clear();
        }
        partitions.owners.retain(|_, r| r.as_path() != root);
        self.invalidate_locked(&partitions, root);

        partitions
            .by_root
            .insert(root.to_path_buf(), Arc::new(Mutex::new(Partition::new(Some(handle)))));
        partitions.owners.insert(handle, root.to_path_buf());
        debug!(root = ?root, %handle, "attached hierarchy snapshot");
    }

    /// Forget everything cached under `root` and detach its partition.
    ///
    /// Returns once no event application is in flight; events of the
    /// detached handle are discarded from then on.
    pub fn discard_subtree(&self, root: &Path) -> usize {
        let mut partitions = write_or_recover(&self.partitions);
        let mut removed = 0;
        if let Some(partition) = partitions.by_root.remove(root) {
            let mut detached = lock_or_recover(&partition);
            detached.owner = None;
            removed += detached.clear();
        }
        partitions.owners.retain(|_, r| r.as_path() != root);
        removed += self.invalidate_locked(&partitions, root);
        debug!(root = ?root, removed, "discarded hierarchy snapshot");
        removed
    }

    /// Build boundary: nothing outside a watched hierarchy stays trusted.
    pub fn begin_build(&self) {
        let removed = lock_or_recover(&self.volatile).clear();
        debug!(removed, "dropped unwatched snapshot state at build boundary");
    }

    /// Drop all state and detach every partition.
    pub fn clear(&self) {
        let mut partitions = write_or_recover(&self.partitions);
        for partition in partitions.by_root.values() {
            let mut partition = lock_or_recover(partition);
            partition.owner = None;
            partition.clear();
        }
        partitions.by_root.clear();
        partitions.owners.clear();
        lock_or_recover(&self.volatile).clear();
    }

    /// Is a cached node for `path` currently held?
    pub fn is_trusted(&self, path: &Path) -> bool {
        let path = normalize(path);
        let partition = read_or_recover(&self.partitions).containing(&path);
        match partition {
            Some(partition) => lock_or_recover(&partition).nodes.contains_key(&path),
            None => lock_or_recover(&self.volatile).nodes.contains_key(&path),
        }
    }

    /// Number of cached nodes at or below `path`.
    pub fn cached_under(&self, path: &Path) -> usize {
        let path = normalize(path);
        let partitions = read_or_recover(&self.partitions);
        let count = |partition: &Partition| {
            partition
                .nodes
                .keys()
                .filter(|p| p.starts_with(&path))
                .count()
        };
        let mut total = count(&lock_or_recover(&self.volatile));
        for partition in partitions.by_root.values() {
            total += count(&lock_or_recover(partition));
        }
        total
    }

    /// Handle currently owning the partition rooted at `root`.
    pub fn owner_of(&self, root: &Path) -> Option<WatchHandle> {
        read_or_recover(&self.partitions)
            .owners
            .iter()
            .find(|(_, r)| r.as_path() == root)
            .map(|(handle, _)| *handle)
    }

    /// Whether `handle` still owns a partition.
    pub fn is_attached(&self, handle: WatchHandle) -> bool {
        read_or_recover(&self.partitions).owners.contains_key(&handle)
    }
}
