#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use vfswatch::config::WatchSettings;
use vfswatch::engine::VfsService;
use vfswatch::fs::mock::MockFileSystem;
use vfswatch::fs::FileSystem;
use vfswatch::watch::{EventQueue, WatchStrategy};
use vfswatch_test_utils::{FakeNativeWatcher, FakeWatcherProbe};

/// A service wired to a fake native watcher and an in-memory filesystem.
pub struct Harness {
    pub service: VfsService,
    pub probe: FakeWatcherProbe,
    pub fs: MockFileSystem,
}

pub fn settings(strategy: WatchStrategy, max_hierarchies: Option<usize>) -> WatchSettings {
    WatchSettings {
        max_hierarchies,
        strategy,
        cache_locations: Vec::new(),
        event_queue_capacity: 64,
    }
}

pub fn harness(strategy: WatchStrategy, max_hierarchies: Option<usize>) -> Harness {
    harness_with(settings(strategy, max_hierarchies))
}

pub fn harness_with(settings: WatchSettings) -> Harness {
    harness_on(MockFileSystem::new(), settings)
}

/// Like [`harness_with`], over a filesystem prepared before the service
/// resolves its cache locations.
pub fn harness_on(fs: MockFileSystem, settings: WatchSettings) -> Harness {
    vfswatch_test_utils::init_tracing();

    let queue = Arc::new(EventQueue::new(settings.event_queue_capacity));
    let (native, probe) = FakeNativeWatcher::new(settings.strategy, Arc::clone(&queue));
    let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
    let service = VfsService::new(settings, shared, queue, Box::new(native));

    Harness { service, probe, fs }
}

pub fn paths(items: &[&str]) -> Vec<PathBuf> {
    items.iter().map(PathBuf::from).collect()
}
