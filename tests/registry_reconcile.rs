mod common;

use std::path::Path;
use std::sync::Arc;

use vfswatch::engine::StaticBuildRoots;
use vfswatch::hierarchy::{BuildId, Hierarchy};
use vfswatch::snapshot::SnapshotStore;
use vfswatch::watch::{
    EventQueue, RegistrationError, WatchBudgetEnforcer, WatchRegistry, WatchStrategy,
    WatchedHierarchyState,
};
use vfswatch::fs::mock::MockFileSystem;
use vfswatch_test_utils::{BuildRootsBuilder, FakeNativeWatcher};

use common::{harness, harness_on, paths, settings};

#[test]
fn build_src_scenario_reports_single_root_for_both_evaluations() {
    let h = harness(WatchStrategy::Subtree, None);
    let roots = BuildRootsBuilder::new("/work")
        .root("app", "app")
        .build_src("app:buildSrc", "app/buildSrc", "app")
        .build();

    let first = h.service.start_build(&StaticBuildRoots(roots.clone())).unwrap();
    let second = h.service.start_build(&StaticBuildRoots(roots)).unwrap();

    assert_eq!(first.watched, paths(&["/work/app"]));
    assert_eq!(second.watched, paths(&["/work/app"]));
    assert_eq!(h.probe.register_calls(), paths(&["/work/app"]));
}

#[test]
fn reconciling_the_same_build_twice_is_idempotent() {
    let h = harness(WatchStrategy::Subtree, None);
    let roots = BuildRootsBuilder::new("/work")
        .root("consumer", "consumer")
        .included("included", "included", "consumer")
        .build();

    let first = h.service.start_build(&StaticBuildRoots(roots.clone())).unwrap();
    let second = h.service.start_build(&StaticBuildRoots(roots)).unwrap();

    assert_eq!(first.watched, paths(&["/work/consumer", "/work/included"]));
    assert_eq!(first.watched, second.watched);
    assert_eq!(h.probe.register_calls().len(), 2);
    assert!(h.probe.unregister_calls().is_empty());
    assert!(second.released.is_empty());
}

#[test]
fn diagnostic_lines_list_considered_and_watched_roots() {
    let h = harness(WatchStrategy::Subtree, Some(1));
    let roots = BuildRootsBuilder::new("/work")
        .root("consumer", "consumer")
        .included("included", "included", "consumer")
        .build();

    let report = h.service.reconcile(&roots).unwrap();

    assert_eq!(
        report.considering_line(),
        "Now considering [/work/consumer, /work/included] as hierarchies to watch"
    );
    assert_eq!(
        report.watched_line(),
        "Watched directory hierarchies: [/work/consumer]"
    );
}

#[test]
fn hierarchy_no_longer_needed_is_released() {
    let h = harness(WatchStrategy::Subtree, None);
    h.fs.add_file("/work/included/settings.gradle", "");
    let both = BuildRootsBuilder::new("/work")
        .root("consumer", "consumer")
        .included("included", "included", "consumer")
        .build();
    let consumer_only = BuildRootsBuilder::new("/work").root("consumer", "consumer").build();

    h.service.reconcile(&both).unwrap();
    let handle = h.probe.handle_for("/work/included").unwrap();
    h.service.get(Path::new("/work/included/settings.gradle")).unwrap();

    let report = h.service.reconcile(&consumer_only).unwrap();

    assert_eq!(report.watched, paths(&["/work/consumer"]));
    assert_eq!(report.released, paths(&["/work/included"]));
    assert_eq!(h.probe.unregister_calls(), vec![handle]);
    assert_eq!(
        h.service.state_of(Path::new("/work/included")),
        WatchedHierarchyState::Stale
    );
    assert_eq!(h.service.snapshot().cached_under(Path::new("/work/included")), 0);
}

#[test]
fn stale_hierarchy_is_registered_with_a_fresh_handle() {
    let h = harness(WatchStrategy::Subtree, None);
    let both = BuildRootsBuilder::new("/work")
        .root("consumer", "consumer")
        .included("included", "included", "consumer")
        .build();
    let consumer_only = BuildRootsBuilder::new("/work").root("consumer", "consumer").build();

    h.service.reconcile(&both).unwrap();
    let old = h.probe.handle_for("/work/included").unwrap();
    h.service.reconcile(&consumer_only).unwrap();
    h.service.reconcile(&both).unwrap();
    let new = h.probe.handle_for("/work/included").unwrap();

    assert_ne!(old, new);
    assert!(new.id() > old.id());
    assert_eq!(
        h.service.state_of(Path::new("/work/included")),
        WatchedHierarchyState::Watching
    );
}

#[test]
fn registration_failure_degrades_to_not_watched() {
    let h = harness(WatchStrategy::Subtree, None);
    h.probe.fail_registration(
        "/work/included",
        RegistrationError::PermissionDenied("/work/included".into()),
    );
    let roots = BuildRootsBuilder::new("/work")
        .root("consumer", "consumer")
        .included("included", "included", "consumer")
        .build();

    let report = h.service.start_build(&StaticBuildRoots(roots.clone())).unwrap();

    assert_eq!(report.watched, paths(&["/work/consumer"]));
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].root, Path::new("/work/included"));
    let warnings = report.warnings();
    assert_eq!(warnings.len(), 1);
    assert!(
        warnings[0].starts_with("Failed to watch hierarchy /work/included"),
        "unexpected warning: {}",
        warnings[0]
    );
    assert_eq!(
        h.service.state_of(Path::new("/work/included")),
        WatchedHierarchyState::NotWatched
    );

    // Retried on the next build once the facility accepts it.
    h.probe.clear_failure("/work/included");
    let report = h.service.start_build(&StaticBuildRoots(roots)).unwrap();
    assert_eq!(report.watched, paths(&["/work/consumer", "/work/included"]));
    assert!(report.failed.is_empty());
}

#[test]
fn release_purges_queued_events_of_the_handle() {
    let h = harness(WatchStrategy::Subtree, None);
    let both = BuildRootsBuilder::new("/work")
        .root("consumer", "consumer")
        .included("included", "included", "consumer")
        .build();
    let consumer_only = BuildRootsBuilder::new("/work").root("consumer", "consumer").build();

    h.service.reconcile(&both).unwrap();
    h.probe.emit_under(
        "/work/included",
        "/work/included/a.txt",
        vfswatch::watch::ChangeKind::Modified,
    );
    h.probe.emit_under(
        "/work/consumer",
        "/work/consumer/b.txt",
        vfswatch::watch::ChangeKind::Modified,
    );
    assert_eq!(h.probe.queue().len(), 2);

    h.service.reconcile(&consumer_only).unwrap();

    assert_eq!(h.probe.queue().len(), 1);
    assert_eq!(h.service.queue_stats().purged, 1);
}

#[test]
fn registry_can_be_driven_directly() {
    let queue = Arc::new(EventQueue::new(16));
    let (native, probe) = FakeNativeWatcher::new(WatchStrategy::Flat, Arc::clone(&queue));
    let store = SnapshotStore::new(Arc::new(MockFileSystem::new()));
    let mut registry = WatchRegistry::new(
        Box::new(native),
        Arc::clone(&queue),
        WatchBudgetEnforcer::unbounded(),
    );

    let report = registry.reconcile(
        vec![
            Hierarchy::new("/a", vec![BuildId::from("a")]),
            Hierarchy::new("/b", vec![BuildId::from("b")]),
        ],
        &store,
    );

    assert_eq!(report.watched, paths(&["/a", "/b"]));
    assert_eq!(registry.strategy(), WatchStrategy::Flat);
    assert_eq!(registry.handle_of(Path::new("/a")), probe.handle_for("/a"));
    assert_eq!(store.owner_of(Path::new("/b")), probe.handle_for("/b"));
    assert_eq!(
        registry
            .hierarchy_of(Path::new("/a"))
            .map(|h| h.builds().to_vec()),
        Some(vec![BuildId::from("a")])
    );

    registry.release_all(&store);
    assert!(registry.watched_roots().is_empty());
    assert!(probe.active_roots().is_empty());
    assert_eq!(store.owner_of(Path::new("/a")), None);
}

#[test]
fn root_behind_a_symlinked_prefix_still_matches_its_cache_location() {
    let fs = MockFileSystem::new();
    fs.add_dir("/work/app");
    fs.add_dir("/private/var/caches/dep");
    fs.add_symlink("/var", "/private/var");
    let mut cfg = settings(WatchStrategy::Subtree, None);
    cfg.cache_locations = paths(&["/private/var/caches"]);
    let h = harness_on(fs, cfg);

    let roots = BuildRootsBuilder::new("/")
        .root("app", "work/app")
        .included("dep", "var/caches/dep", "app")
        .build();
    let report = h.service.start_build(&StaticBuildRoots(roots)).unwrap();

    assert_eq!(report.watched, paths(&["/work/app"]));
    assert_eq!(h.probe.register_calls(), paths(&["/work/app"]));
}
