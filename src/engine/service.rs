// src/engine/service.rs

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::config::model::WatchSettings;
use crate::errors::{lock_or_recover, Result};
use crate::fs::FileSystem;
use crate::hierarchy::{BuildRoot, CacheLocationRegistry, Hierarchy, HierarchyCalculator};
use crate::snapshot::{SnapshotNode, SnapshotStore};
use crate::watch::budget::{BudgetDecision, WatchBudgetEnforcer};
use crate::watch::native::{NativeWatcher, WatchStrategy};
use crate::watch::notify_backend::NotifyWatcher;
use crate::watch::path_utils::resolve;
use crate::watch::pump::EventPump;
use crate::watch::queue::{EventQueue, QueueStats};
use crate::watch::registry::{ReconcileReport, WatchRegistry, WatchedHierarchyState};

use super::discovery::BuildRootSource;

/// What a reconciliation would do, computed without touching native watches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub candidates: Vec<Hierarchy>,
    pub decision: BudgetDecision,
}

/// Long-lived watch service of one daemon process.
///
/// Owns the snapshot store, the native watch registry and the event queue
/// between them. Build invocations call [`VfsService::start_build`] once at
/// their start; the event consumer ([`VfsService::pump`]) runs concurrently.
pub struct VfsService {
    settings: WatchSettings,
    fs: Arc<dyn FileSystem>,
    caches: CacheLocationRegistry,
    calculator: HierarchyCalculator,
    queue: Arc<EventQueue>,
    store: Arc<SnapshotStore>,
    registry: Arc<Mutex<WatchRegistry>>,
}

impl fmt::Debug for VfsService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VfsService")
            .field("settings", &self.settings)
            .field("caches", &self.caches)
            .field("queue", &self.queue.stats())
            .finish_non_exhaustive()
    }
}

impl VfsService {
    /// Assemble a service around an existing native watcher.
    ///
    /// `queue` must be the queue `native` delivers into. The watcher's
    /// strategy wins over `settings.strategy`.
    pub fn new(
        settings: WatchSettings,
        fs: Arc<dyn FileSystem>,
        queue: Arc<EventQueue>,
        native: Box<dyn NativeWatcher>,
    ) -> Self {
        let strategy = native.strategy();
        if strategy != settings.strategy {
            debug!(
                requested = ?settings.strategy,
                actual = ?strategy,
                "native watcher overrides configured strategy"
            );
        }
        let settings = WatchSettings {
            strategy,
            ..settings
        };

        let caches = CacheLocationRegistry::from_locations(fs.as_ref(), &settings.cache_locations);
        let budget = WatchBudgetEnforcer::new(settings.max_hierarchies);
        let store = Arc::new(SnapshotStore::new(Arc::clone(&fs)));
        let registry = WatchRegistry::new(native, Arc::clone(&queue), budget);

        info!(
            strategy = ?strategy,
            max_hierarchies = ?settings.max_hierarchies,
            "virtual file system watching enabled"
        );

        Self {
            settings,
            fs,
            caches,
            calculator: HierarchyCalculator::new(),
            queue,
            store,
            registry: Arc::new(Mutex::new(registry)),
        }
    }

    /// Service backed by the OS facility through `notify`.
    pub fn with_notify(settings: WatchSettings, fs: Arc<dyn FileSystem>) -> Self {
        let queue = Arc::new(EventQueue::new(settings.event_queue_capacity));
        let native = NotifyWatcher::new(settings.strategy, Arc::clone(&queue), Arc::clone(&fs));
        Self::new(settings, fs, queue, Box::new(native))
    }

    /// Entry point of a build invocation.
    ///
    /// Discovery errors are returned as-is and leave all state untouched.
    /// Otherwise unwatched snapshot state is dropped and the watched set is
    /// reconciled with the discovered builds.
    pub fn start_build(&self, source: &dyn BuildRootSource) -> Result<ReconcileReport> {
        let roots = source.discover()?;
        self.store.begin_build();
        self.reconcile(&roots)
    }

    /// Reconcile the watched set against `roots` (discovery order).
    ///
    /// Idempotent: the same roots in the same order register nothing new.
    pub fn reconcile(&self, roots: &[BuildRoot]) -> Result<ReconcileReport> {
        let roots = self.resolve_roots(roots);
        let candidates = self.calculator.calculate(&roots, &self.caches)?;
        let report = lock_or_recover(&self.registry).reconcile(candidates, &self.store);
        Ok(report)
    }

    /// Compute candidates and the budget cut for `roots` without registering
    /// anything.
    pub fn plan(&self, roots: &[BuildRoot]) -> Result<BuildPlan> {
        let roots = self.resolve_roots(roots);
        let candidates = self.calculator.calculate(&roots, &self.caches)?;
        let budget = lock_or_recover(&self.registry).budget();
        let decision = budget.enforce(candidates.clone());
        Ok(BuildPlan {
            candidates,
            decision,
        })
    }

    /// Roots resolved the same way cache locations are, so a symlinked
    /// prefix cannot hide a root from its cache location.
    fn resolve_roots(&self, roots: &[BuildRoot]) -> Vec<BuildRoot> {
        roots
            .iter()
            .map(|root| {
                BuildRoot::new(
                    resolve(self.fs.as_ref(), root.root_dir()),
                    root.build().clone(),
                    root.parent().cloned(),
                    root.kind(),
                )
            })
            .collect()
    }

    /// Read `path` through the snapshot.
    pub fn get(&self, path: &Path) -> Result<SnapshotNode> {
        self.store.get(path)
    }

    /// Tell the snapshot which files the running build just wrote.
    pub fn record_outputs<I, P>(&self, paths: I)
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.store.record_outputs(paths);
    }

    pub fn snapshot(&self) -> &Arc<SnapshotStore> {
        &self.store
    }

    /// A consumer for the native event stream.
    pub fn pump(&self) -> EventPump {
        EventPump::new(
            Arc::clone(&self.queue),
            Arc::clone(&self.store),
            Arc::clone(&self.registry),
            Arc::clone(&self.fs),
        )
    }

    pub fn strategy(&self) -> WatchStrategy {
        self.settings.strategy
    }

    pub fn settings(&self) -> &WatchSettings {
        &self.settings
    }

    pub fn cache_locations(&self) -> &CacheLocationRegistry {
        &self.caches
    }

    /// Roots currently watched, in discovery order.
    pub fn watched_hierarchies(&self) -> Vec<PathBuf> {
        lock_or_recover(&self.registry).watched_roots()
    }

    pub fn state_of(&self, root: &Path) -> WatchedHierarchyState {
        lock_or_recover(&self.registry).state_of(root)
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Apply new settings.
    ///
    /// Every hierarchy is released and the snapshot cleared; the next
    /// [`VfsService::start_build`] registers afresh. The strategy was fixed
    /// at startup and is not changed here.
    pub fn reload(&mut self, settings: WatchSettings) {
        if settings.strategy != self.settings.strategy {
            warn!(
                requested = ?settings.strategy,
                current = ?self.settings.strategy,
                "watch strategy cannot change while running; keeping the current one"
            );
        }

        {
            let mut registry = lock_or_recover(&self.registry);
            registry.release_all(&self.store);
            registry.set_budget(WatchBudgetEnforcer::new(settings.max_hierarchies));
        }
        self.store.clear();

        self.caches =
            CacheLocationRegistry::from_locations(self.fs.as_ref(), &settings.cache_locations);
        self.settings = WatchSettings {
            strategy: self.settings.strategy,
            ..settings
        };
        info!(max_hierarchies = ?self.settings.max_hierarchies, "watch settings reloaded");
    }

    /// Release every hierarchy and stop the event consumer.
    pub fn shutdown(&self) {
        lock_or_recover(&self.registry).release_all(&self.store);
        self.store.clear();
        self.queue.close();
        info!("virtual file system watching stopped");
    }
}
