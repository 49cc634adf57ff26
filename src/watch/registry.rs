// src/watch/registry.rs

//! Owner of all native watch handles.
//!
//! [`WatchRegistry::reconcile`] is the only place where hierarchies are
//! registered or released during a build invocation. The event consumer
//! additionally reports root removals and (flat strategy) newly created
//! subdirectories back through the registry, so handle lifetime is still
//! decided in one place.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::hierarchy::Hierarchy;
use crate::snapshot::SnapshotStore;
use crate::watch::budget::{BudgetExceeded, WatchBudgetEnforcer};
use crate::watch::native::{NativeWatcher, WatchHandle, WatchStrategy};
use crate::watch::path_utils::format_path_list;
use crate::watch::queue::EventQueue;

/// Lifecycle of one hierarchy.
///
/// - `NotWatched` -> `Watching` on successful registration.
/// - `Watching` -> `Stale` on eviction, release, or external removal.
/// - `Stale` -> `Watching` on re-registration (snapshot rebuilt from disk).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchedHierarchyState {
    NotWatched,
    Watching,
    Stale,
}

#[derive(Debug)]
struct Entry {
    hierarchy: Hierarchy,
    state: WatchedHierarchyState,
    handle: Option<WatchHandle>,
}

/// A hierarchy the native facility refused to watch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationFailure {
    pub root: PathBuf,
    pub reason: String,
}

/// Everything one reconciliation decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Candidate roots, in discovery order, before budget trimming.
    pub considered: Vec<PathBuf>,
    /// Roots in `Watching` state afterwards, in discovery order.
    pub watched: Vec<PathBuf>,
    /// Roots cut by the budget.
    pub evicted: Vec<PathBuf>,
    /// Roots released because they are no longer needed.
    pub released: Vec<PathBuf>,
    pub failed: Vec<RegistrationFailure>,
    pub budget_exceeded: Option<BudgetExceeded>,
}

impl ReconcileReport {
    pub fn considering_line(&self) -> String {
        format!(
            "Now considering {} as hierarchies to watch",
            format_path_list(&self.considered)
        )
    }

    pub fn watched_line(&self) -> String {
        format!(
            "Watched directory hierarchies: {}",
            format_path_list(&self.watched)
        )
    }

    /// User-visible warnings: at most one budget line, one per failure.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(exceeded) = &self.budget_exceeded {
            out.push(exceeded.message());
        }
        for failure in &self.failed {
            out.push(registration_warning(&failure.root, &failure.reason));
        }
        out
    }
}

fn registration_warning(root: &Path, reason: &str) -> String {
    format!(
        "Failed to watch hierarchy {}: {}; falling back to re-reading it from disk",
        root.display(),
        reason
    )
}

pub struct WatchRegistry {
    native: Box<dyn NativeWatcher>,
    queue: Arc<EventQueue>,
    budget: WatchBudgetEnforcer,
    entries: HashMap<PathBuf, Entry>,
    /// Roots of the last reconciliation, in discovery order.
    order: Vec<PathBuf>,
}

impl std::fmt::Debug for WatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchRegistry")
            .field("strategy", &self.native.strategy())
            .field("budget", &self.budget)
            .field("watched", &self.watched_roots())
            .finish_non_exhaustive()
    }
}

impl WatchRegistry {
    pub fn new(
        native: Box<dyn NativeWatcher>,
        queue: Arc<EventQueue>,
        budget: WatchBudgetEnforcer,
    ) -> Self {
        Self {
            native,
            queue,
            budget,
            entries: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn strategy(&self) -> WatchStrategy {
        self.native.strategy()
    }

    pub fn budget(&self) -> WatchBudgetEnforcer {
        self.budget
    }

    pub fn set_budget(&mut self, budget: WatchBudgetEnforcer) {
        self.budget = budget;
    }

    /// Bring native watches in line with `candidates` (discovery order).
    ///
    /// Registration failures never fail the reconciliation; the hierarchy
    /// stays `NotWatched` and is re-read from disk on every build. An
    /// interrupted reconciliation needs no rollback: running it again with
    /// the same candidates converges to the same state.
    pub fn reconcile(
        &mut self,
        candidates: Vec<Hierarchy>,
        store: &SnapshotStore,
    ) -> ReconcileReport {
        let considered: Vec<PathBuf> = candidates.iter().map(|h| h.root().to_path_buf()).collect();
        let mut report = ReconcileReport {
            considered,
            watched: Vec::new(),
            evicted: Vec::new(),
            released: Vec::new(),
            failed: Vec::new(),
            budget_exceeded: None,
        };
        info!("{}", report.considering_line());

        // Leftovers from earlier reconciliations that are no longer candidates.
        self.entries.retain(|root, entry| {
            entry.state == WatchedHierarchyState::Watching || report.considered.contains(root)
        });

        let decision = self.budget.enforce(candidates);
        report.budget_exceeded = decision.exceeded;

        let keep: Vec<&Path> = decision.kept.iter().map(|h| h.root()).collect();
        let mut stale: Vec<PathBuf> = self
            .entries
            .iter()
            .filter(|(root, entry)| {
                entry.state == WatchedHierarchyState::Watching && !keep.contains(&root.as_path())
            })
            .map(|(root, _)| root.clone())
            .collect();
        stale.sort();
        for root in stale {
            self.release(&root, store);
            if !decision.evicted.iter().any(|h| h.root() == root) {
                report.released.push(root);
            }
        }

        for hierarchy in decision.evicted {
            let root = hierarchy.root().to_path_buf();
            store.discard_subtree(&root);
            let entry = self.entries.entry(root.clone()).or_insert_with(|| Entry {
                hierarchy: hierarchy.clone(),
                state: WatchedHierarchyState::NotWatched,
                handle: None,
            });
            entry.hierarchy = hierarchy;
            report.evicted.push(root);
        }

        self.order.clear();
        for hierarchy in decision.kept {
            let root = hierarchy.root().to_path_buf();
            self.order.push(root.clone());

            if let Some(entry) = self.entries.get_mut(&root) {
                if entry.state == WatchedHierarchyState::Watching {
                    entry.hierarchy = hierarchy;
                    report.watched.push(root);
                    continue;
                }
            }

            match self.native.register(&root) {
                Ok(handle) => {
                    store.attach(&root, handle);
                    debug!(root = %root.display(), %handle, "registered hierarchy");
                    self.entries.insert(
                        root.clone(),
                        Entry {
                            hierarchy,
                            state: WatchedHierarchyState::Watching,
                            handle: Some(handle),
                        },
                    );
                    report.watched.push(root);
                }
                Err(err) => {
                    let reason = err.to_string();
                    warn!("{}", registration_warning(&root, &reason));
                    store.discard_subtree(&root);
                    self.entries.insert(
                        root.clone(),
                        Entry {
                            hierarchy,
                            state: WatchedHierarchyState::NotWatched,
                            handle: None,
                        },
                    );
                    report.failed.push(RegistrationFailure { root, reason });
                }
            }
        }

        info!("{}", report.watched_line());
        report
    }

    /// Unregister the hierarchy at `root` and forget its snapshot.
    ///
    /// Order matters: the native side stops delivering first, then the store
    /// detaches the partition (waiting out any event being applied), and
    /// only then are leftover queued events dropped.
    fn release(&mut self, root: &Path, store: &SnapshotStore) {
        let Some(entry) = self.entries.get_mut(root) else {
            return;
        };
        if let Some(handle) = entry.handle.take() {
            self.native.unregister(handle);
            store.discard_subtree(root);
            self.queue.purge(handle);
            debug!(root = %root.display(), %handle, "released hierarchy");
        } else {
            store.discard_subtree(root);
        }
        entry.state = WatchedHierarchyState::Stale;
    }

    /// The root of a watched hierarchy disappeared from disk.
    pub fn handle_root_removed(&mut self, handle: WatchHandle, store: &SnapshotStore) {
        let Some(root) = self.root_of(handle) else {
            return;
        };
        info!(root = %root.display(), "watched hierarchy root was removed; no longer watching it");
        self.release(&root, store);
    }

    /// Flat strategy: start watching a directory created inside a
    /// registered hierarchy. If that fails the hierarchy can no longer be
    /// trusted and is released.
    pub fn track_new_directory(&mut self, handle: WatchHandle, dir: &Path, store: &SnapshotStore) {
        if self.native.strategy() != WatchStrategy::Flat {
            return;
        }
        let Some(root) = self.root_of(handle) else {
            return;
        };
        if let Err(err) = self.native.watch_subdirectory(handle, dir) {
            warn!("{}", registration_warning(&root, &err.to_string()));
            self.release(&root, store);
        }
    }

    /// Release every hierarchy (shutdown or reload).
    pub fn release_all(&mut self, store: &SnapshotStore) {
        let watching: Vec<PathBuf> = self
            .entries
            .iter()
            .filter(|(_, e)| e.state == WatchedHierarchyState::Watching)
            .map(|(root, _)| root.clone())
            .collect();
        for root in watching {
            self.release(&root, store);
        }
    }

    fn root_of(&self, handle: WatchHandle) -> Option<PathBuf> {
        self.entries
            .iter()
            .find(|(_, e)| e.handle == Some(handle) && e.state == WatchedHierarchyState::Watching)
            .map(|(root, _)| root.clone())
    }

    /// Roots in `Watching` state, in the order of the last reconciliation.
    pub fn watched_roots(&self) -> Vec<PathBuf> {
        self.order
            .iter()
            .filter(|root| self.state_of(root) == WatchedHierarchyState::Watching)
            .cloned()
            .collect()
    }

    pub fn state_of(&self, root: &Path) -> WatchedHierarchyState {
        self.entries
            .get(root)
            .map(|e| e.state)
            .unwrap_or(WatchedHierarchyState::NotWatched)
    }

    /// The hierarchy (and the builds it serves) last seen at `root`.
    pub fn hierarchy_of(&self, root: &Path) -> Option<&Hierarchy> {
        self.entries.get(root).map(|e| &e.hierarchy)
    }

    pub fn handle_of(&self, root: &Path) -> Option<WatchHandle> {
        self.entries.get(root).and_then(|e| e.handle)
    }
}
