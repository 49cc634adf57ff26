// src/watch/queue.rs

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::sync::Notify;
use tracing::{debug, trace, warn};

use crate::errors::lock_or_recover;
use crate::watch::native::{ChangeKind, NativeEvent, WatchHandle};

/// Default bound of pending native events.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 4096;

/// An entry waiting for the snapshot consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueuedEvent {
    Change(NativeEvent),
    /// Events for this handle were lost or collapsed; everything cached for
    /// its hierarchy must be re-derived.
    ///
    /// `removed` keeps the outermost paths whose removal was collapsed into
    /// the marker, so losing the hierarchy root is never folded away.
    Overflow {
        handle: WatchHandle,
        removed: Vec<PathBuf>,
    },
}

impl QueuedEvent {
    pub fn handle(&self) -> WatchHandle {
        match self {
            QueuedEvent::Change(event) => event.handle,
            QueuedEvent::Overflow { handle, .. } => *handle,
        }
    }

    /// A marker with no collapsed removals.
    pub fn overflow(handle: WatchHandle) -> Self {
        QueuedEvent::Overflow {
            handle,
            removed: Vec::new(),
        }
    }
}

/// Counters for observability and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub accepted: u64,
    pub coalesced: u64,
    pub overflows: u64,
    pub purged: u64,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<QueuedEvent>,
    keys: HashSet<(WatchHandle, PathBuf)>,
    overflowed: HashSet<WatchHandle>,
    closed: bool,
    stats: QueueStats,
}

/// Bounded, coalescing queue between native delivery threads and the single
/// snapshot consumer.
///
/// Backpressure policy:
/// - A change for a `(handle, path)` already pending is merged into that
///   entry ([`crate::watch::ChangeKind::merge`]), so a create or delete is
///   never replaced by a modification.
/// - When full, all pending changes of the pushing handle collapse into one
///   [`QueuedEvent::Overflow`] marker; further changes for that handle are
///   absorbed until the marker is drained. Markers may exceed the capacity
///   by at most one per handle.
/// - Otherwise strict FIFO, so per-hierarchy delivery order is preserved.
///
/// `push` never blocks the native callback thread.
#[derive(Debug)]
pub struct EventQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    capacity: usize,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_QUEUE_CAPACITY)
    }
}

impl EventQueue {
    /// `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn push(&self, event: NativeEvent) {
        let mut state = lock_or_recover(&self.state);
        if state.closed {
            return;
        }

        if state.overflowed.contains(&event.handle) {
            if event.kind == ChangeKind::Removed {
                Self::note_removal_in_marker(&mut state, event.handle, &event.path);
            }
            state.stats.coalesced += 1;
            return;
        }

        let key = (event.handle, event.path.clone());
        if state.keys.contains(&key) {
            for entry in state.pending.iter_mut() {
                if let QueuedEvent::Change(pending) = entry {
                    if pending.handle == event.handle && pending.path == event.path {
                        pending.kind = pending.kind.merge(event.kind);
                        break;
                    }
                }
            }
            state.stats.coalesced += 1;
            trace!(path = %event.path.display(), "coalesced pending change");
            return;
        }

        if state.pending.len() >= self.capacity {
            warn!(
                handle = %event.handle,
                capacity = self.capacity,
                "watch event queue full; invalidating whole hierarchy instead"
            );
            let trigger = (event.kind == ChangeKind::Removed).then_some(event.path.as_path());
            Self::escalate(&mut state, event.handle, trigger);
        } else {
            state.keys.insert(key);
            state.pending.push_back(QueuedEvent::Change(event));
            state.stats.accepted += 1;
        }
        drop(state);
        self.notify.notify_one();
    }

    /// Record that events for `handle` were lost upstream (backend error or
    /// kernel overflow).
    pub fn push_overflow(&self, handle: WatchHandle) {
        let mut state = lock_or_recover(&self.state);
        if state.closed || state.overflowed.contains(&handle) {
            return;
        }
        Self::escalate(&mut state, handle, None);
        drop(state);
        self.notify.notify_one();
    }

    fn escalate(state: &mut QueueState, handle: WatchHandle, trigger: Option<&Path>) {
        let mut removed = Vec::new();
        let before = state.pending.len();
        state.pending.retain(|entry| match entry {
            QueuedEvent::Change(change) if change.handle == handle => {
                if change.kind == ChangeKind::Removed {
                    note_removal(&mut removed, &change.path);
                }
                false
            }
            QueuedEvent::Overflow { handle: h, removed: earlier } if *h == handle => {
                for path in earlier {
                    note_removal(&mut removed, path);
                }
                false
            }
            _ => true,
        });
        if let Some(path) = trigger {
            note_removal(&mut removed, path);
        }
        state.keys.retain(|(h, _)| *h != handle);
        state.stats.coalesced += (before - state.pending.len()) as u64;
        state
            .pending
            .push_back(QueuedEvent::Overflow { handle, removed });
        state.overflowed.insert(handle);
        state.stats.overflows += 1;
    }

    fn note_removal_in_marker(state: &mut QueueState, handle: WatchHandle, path: &Path) {
        for entry in state.pending.iter_mut() {
            if let QueuedEvent::Overflow { handle: h, removed } = entry {
                if *h == handle {
                    note_removal(removed, path);
                    return;
                }
            }
        }
    }

    /// Take everything pending, in delivery order.
    pub fn drain(&self) -> Vec<QueuedEvent> {
        let mut state = lock_or_recover(&self.state);
        state.keys.clear();
        state.overflowed.clear();
        state.pending.drain(..).collect()
    }

    /// Drop queued events of a released handle.
    pub fn purge(&self, handle: WatchHandle) -> usize {
        let mut state = lock_or_recover(&self.state);
        let before = state.pending.len();
        state.pending.retain(|entry| entry.handle() != handle);
        state.keys.retain(|(h, _)| *h != handle);
        state.overflowed.remove(&handle);
        let purged = before - state.pending.len();
        state.stats.purged += purged as u64;
        if purged > 0 {
            debug!(%handle, purged, "purged in-flight events of released handle");
        }
        purged
    }

    pub fn len(&self) -> usize {
        lock_or_recover(&self.state).pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> QueueStats {
        lock_or_recover(&self.state).stats
    }

    /// Stop accepting events and wake the consumer so it can exit.
    pub fn close(&self) {
        lock_or_recover(&self.state).closed = true;
        self.notify.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        lock_or_recover(&self.state).closed
    }

    /// Wait until something was pushed (or the queue was closed).
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// Add `path` to a set of removed paths, keeping only outermost entries.
fn note_removal(removed: &mut Vec<PathBuf>, path: &Path) {
    if removed.iter().any(|p| path.starts_with(p)) {
        return;
    }
    removed.retain(|p| !p.starts_with(path));
    removed.push(path.to_path_buf());
}
