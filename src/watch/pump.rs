// src/watch/pump.rs

//! The single consumer of native change events.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::errors::lock_or_recover;
use crate::fs::FileSystem;
use crate::snapshot::{EventDisposition, SnapshotStore};
use crate::watch::native::{ChangeKind, WatchStrategy};
use crate::watch::path_utils::normalize;
use crate::watch::queue::{EventQueue, QueuedEvent};
use crate::watch::registry::WatchRegistry;

/// Result of one drain of the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub applied: usize,
    pub discarded: usize,
}

/// Moves events from the [`EventQueue`] into the [`SnapshotStore`].
///
/// Besides invalidating snapshot state it reports two structural facts back
/// to the registry: a hierarchy root that vanished, and (flat strategy) a
/// new directory that needs its own registration.
#[derive(Debug, Clone)]
pub struct EventPump {
    queue: Arc<EventQueue>,
    store: Arc<SnapshotStore>,
    registry: Arc<Mutex<WatchRegistry>>,
    fs: Arc<dyn FileSystem>,
    strategy: WatchStrategy,
}

impl EventPump {
    pub fn new(
        queue: Arc<EventQueue>,
        store: Arc<SnapshotStore>,
        registry: Arc<Mutex<WatchRegistry>>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        let strategy = lock_or_recover(&registry).strategy();
        Self {
            queue,
            store,
            registry,
            fs,
            strategy,
        }
    }

    pub fn queue(&self) -> &Arc<EventQueue> {
        &self.queue
    }

    /// Apply everything currently queued, in delivery order.
    pub fn apply_pending(&self) -> PumpStats {
        let mut stats = PumpStats::default();
        for event in self.queue.drain() {
            let root = match self.store.apply(&event) {
                EventDisposition::Applied { root } => root,
                EventDisposition::Discarded => {
                    stats.discarded += 1;
                    continue;
                }
            };
            stats.applied += 1;

            let change = match &event {
                QueuedEvent::Change(change) => change,
                QueuedEvent::Overflow { handle, removed } => {
                    if removed.iter().any(|p| root.starts_with(normalize(p))) {
                        lock_or_recover(&self.registry).handle_root_removed(*handle, &self.store);
                    }
                    continue;
                }
            };
            match change.kind {
                // The native watch dies with its root, even if the directory
                // has been recreated since.
                ChangeKind::Removed if root.starts_with(normalize(&change.path)) => {
                    lock_or_recover(&self.registry).handle_root_removed(change.handle, &self.store);
                }
                ChangeKind::Created
                    if self.strategy == WatchStrategy::Flat
                        && !self.fs.is_symlink(&change.path)
                        && self.fs.is_dir(&change.path) =>
                {
                    lock_or_recover(&self.registry).track_new_directory(
                        change.handle,
                        &change.path,
                        &self.store,
                    );
                }
                _ => {}
            }
        }
        if stats.applied + stats.discarded > 0 {
            trace!(applied = stats.applied, discarded = stats.discarded, "drained watch events");
        }
        stats
    }
}

/// Run `pump` on the Tokio runtime until its queue is closed.
///
/// Each batch is applied on the blocking pool since it takes locks and may
/// call into the filesystem and the native facility.
pub fn spawn_event_consumer(pump: EventPump) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            pump.queue.wait().await;
            let batch = pump.clone();
            if let Err(err) = tokio::task::spawn_blocking(move || batch.apply_pending()).await {
                warn!("watch event consumer batch failed: {err}");
            }
            if pump.queue.is_closed() {
                break;
            }
        }
        debug!("watch event consumer finished");
    })
}
