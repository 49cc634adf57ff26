mod common;

use std::path::{Path, PathBuf};

use vfswatch::engine::StaticBuildRoots;
use vfswatch::hierarchy::{BuildId, Hierarchy};
use vfswatch::watch::{BudgetExceeded, WatchBudgetEnforcer, WatchStrategy, WatchedHierarchyState};
use vfswatch_test_utils::BuildRootsBuilder;

use common::{harness, paths};

fn hierarchy(root: &str) -> Hierarchy {
    Hierarchy::new(root, vec![BuildId::from(root)])
}

#[test]
fn under_budget_keeps_everything() {
    let decision = WatchBudgetEnforcer::new(Some(3)).enforce(vec![hierarchy("/a"), hierarchy("/b")]);

    assert_eq!(decision.kept.len(), 2);
    assert!(decision.evicted.is_empty());
    assert_eq!(decision.exceeded, None);
}

#[test]
fn over_budget_keeps_earliest_discovered() {
    let decision = WatchBudgetEnforcer::new(Some(2)).enforce(vec![
        hierarchy("/c"),
        hierarchy("/a"),
        hierarchy("/b"),
    ]);

    let kept: Vec<&Path> = decision.kept.iter().map(|h| h.root()).collect();
    let evicted: Vec<&Path> = decision.evicted.iter().map(|h| h.root()).collect();
    assert_eq!(kept, vec![Path::new("/c"), Path::new("/a")]);
    assert_eq!(evicted, vec![Path::new("/b")]);
    assert_eq!(
        decision.exceeded,
        Some(BudgetExceeded {
            watching: 3,
            limit: 2
        })
    );
}

#[test]
fn budget_of_one_watches_a_single_hierarchy_and_warns_once() {
    let h = harness(WatchStrategy::Subtree, Some(1));
    h.fs.add_file("/work/consumer/build.gradle", "plugins {}");
    h.fs.add_file("/work/included/build.gradle", "plugins {}");

    let roots = BuildRootsBuilder::new("/work")
        .root("consumer", "consumer")
        .included("included", "included", "consumer")
        .build();

    let report = h.service.start_build(&StaticBuildRoots(roots)).unwrap();

    assert_eq!(report.considered, paths(&["/work/consumer", "/work/included"]));
    assert_eq!(report.watched, paths(&["/work/consumer"]));
    assert_eq!(report.evicted, paths(&["/work/included"]));
    assert_eq!(
        report.warnings(),
        vec![
            "Watching too many directories in the file system (watching 2, limit 1), dropping some state from the virtual file system"
                .to_string()
        ]
    );
    assert_eq!(h.probe.register_calls(), paths(&["/work/consumer"]));
    assert_eq!(h.service.watched_hierarchies(), paths(&["/work/consumer"]));
    assert_eq!(
        h.service.state_of(Path::new("/work/included")),
        WatchedHierarchyState::NotWatched
    );
}

#[test]
fn evicted_hierarchy_loses_cached_state() {
    let h = harness(WatchStrategy::Subtree, Some(1));
    h.fs.add_file("/work/consumer/build.gradle", "plugins {}");
    h.fs.add_file("/work/included/build.gradle", "plugins {}");

    let included_file = PathBuf::from("/work/included/build.gradle");
    h.service.get(&included_file).unwrap();
    assert!(h.service.snapshot().is_trusted(&included_file));

    let roots = BuildRootsBuilder::new("/work")
        .root("consumer", "consumer")
        .included("included", "included", "consumer")
        .build();
    h.service.reconcile(&roots).unwrap();

    assert_eq!(h.service.snapshot().cached_under(Path::new("/work/included")), 0);
    assert!(!h.service.snapshot().is_trusted(&included_file));
}

#[test]
fn repeated_over_budget_builds_keep_the_same_survivor() {
    let h = harness(WatchStrategy::Subtree, Some(1));
    let roots = BuildRootsBuilder::new("/work")
        .root("consumer", "consumer")
        .included("included", "included", "consumer")
        .build();

    let first = h.service.reconcile(&roots).unwrap();
    let second = h.service.reconcile(&roots).unwrap();

    assert_eq!(first.watched, second.watched);
    assert_eq!(h.probe.register_calls(), paths(&["/work/consumer"]));
    assert!(h.probe.unregister_calls().is_empty());
}

#[test]
fn reload_with_lower_budget_releases_and_rewatches_within_limit() {
    let mut h = harness(WatchStrategy::Subtree, None);
    let roots = BuildRootsBuilder::new("/work")
        .root("a", "a")
        .included("b", "b", "a")
        .included("c", "c", "a")
        .build();

    let report = h.service.reconcile(&roots).unwrap();
    assert_eq!(report.watched.len(), 3);

    h.service.reload(common::settings(WatchStrategy::Subtree, Some(2)));
    assert!(h.service.watched_hierarchies().is_empty());
    assert_eq!(h.probe.unregister_calls().len(), 3);

    let report = h.service.reconcile(&roots).unwrap();
    assert_eq!(report.watched, paths(&["/work/a", "/work/b"]));
    assert_eq!(report.evicted, paths(&["/work/c"]));
    assert_eq!(h.probe.active_roots(), paths(&["/work/a", "/work/b"]));
}
