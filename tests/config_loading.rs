use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::tempdir;
use vfswatch::config::{load_and_validate, load_and_validate_with_env, load_from_path};
use vfswatch::config::{MAX_HIERARCHIES_ENV, STRATEGY_ENV};
use vfswatch::engine::{BuildRootSource, ConfigBuildRoots};
use vfswatch::errors::VfsWatchError;
use vfswatch::fs::mock::MockFileSystem;
use vfswatch::types::{BuildKind, StrategyPreference};
use vfswatch::watch::{WatchStrategy, DEFAULT_EVENT_QUEUE_CAPACITY};

fn write_config(contents: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vfswatch.toml");
    fs::write(&path, contents).unwrap();
    (dir, path)
}

fn no_env(_: &str) -> Option<String> {
    None
}

#[test]
fn full_config_is_loaded_in_declaration_order() {
    let (_dir, path) = write_config(
        r#"
[watch]
max_hierarchies = 8
strategy = "flat"
event_queue_capacity = 128

[cache]
global_locations = ["/home/me/.gradle/caches"]

[[build]]
id = "app"
root = "/work/app"

[[build]]
id = "app:buildSrc"
root = "/work/app/buildSrc"
kind = "build-src"
parent = "app"

[[build]]
id = "lib"
root = "/work/lib"
kind = "included"
parent = "app"
"#,
    );

    let cfg = load_and_validate_with_env(&path, no_env).unwrap();

    assert_eq!(cfg.watch.max_hierarchies, Some(8));
    assert_eq!(cfg.watch.strategy, StrategyPreference::Flat);
    assert_eq!(cfg.watch.event_queue_capacity, 128);
    assert_eq!(
        cfg.cache.global_locations,
        vec![PathBuf::from("/home/me/.gradle/caches")]
    );

    let fs = MockFileSystem::new();
    fs.add_dir("/work/app/buildSrc");
    fs.add_dir("/work/lib");
    let roots = ConfigBuildRoots::new(cfg.build.clone(), Arc::new(fs))
        .discover()
        .unwrap();
    let ids: Vec<&str> = roots.iter().map(|r| r.build().as_str()).collect();
    assert_eq!(ids, vec!["app", "app:buildSrc", "lib"]);
    assert_eq!(roots[1].kind(), BuildKind::BuildSrc);
    assert_eq!(roots[1].parent().map(|p| p.as_str()), Some("app"));

    let settings = cfg.watch_settings();
    assert_eq!(settings.strategy, WatchStrategy::Flat);
    assert_eq!(settings.max_hierarchies, Some(8));
}

#[test]
fn empty_config_uses_defaults() {
    let (_dir, path) = write_config("");

    let cfg = load_and_validate_with_env(&path, no_env).unwrap();

    assert_eq!(cfg.watch.max_hierarchies, None);
    assert_eq!(cfg.watch.strategy, StrategyPreference::Auto);
    assert_eq!(cfg.watch.event_queue_capacity, DEFAULT_EVENT_QUEUE_CAPACITY);
    assert!(cfg.build.is_empty());
    assert_eq!(cfg.watch_settings().strategy, WatchStrategy::probe());
}

#[test]
fn relative_paths_resolve_against_config_directory() {
    let (dir, path) = write_config(
        r#"
[cache]
global_locations = ["cache"]

[[build]]
id = "app"
root = "app"
"#,
    );

    let raw = load_from_path(&path).unwrap();

    assert_eq!(raw.build[0].root, dir.path().join("app"));
    assert_eq!(raw.cache.global_locations[0], dir.path().join("cache"));
}

#[test]
fn env_overrides_budget_and_strategy() {
    let (_dir, path) = write_config(
        r#"
[watch]
max_hierarchies = 8
strategy = "flat"
"#,
    );

    let cfg = load_and_validate_with_env(&path, |key| match key {
        MAX_HIERARCHIES_ENV => Some("2".to_string()),
        STRATEGY_ENV => Some("subtree".to_string()),
        _ => None,
    })
    .unwrap();

    assert_eq!(cfg.watch.max_hierarchies, Some(2));
    assert_eq!(cfg.watch.strategy, StrategyPreference::Subtree);
}

#[test]
fn env_can_lift_the_budget() {
    let (_dir, path) = write_config("[watch]\nmax_hierarchies = 8\n");

    let cfg = load_and_validate_with_env(&path, |key| {
        (key == MAX_HIERARCHIES_ENV).then(|| "unbounded".to_string())
    })
    .unwrap();

    assert_eq!(cfg.watch.max_hierarchies, None);
}

#[test]
fn malformed_env_budget_is_a_config_error() {
    let (_dir, path) = write_config("");

    let err = load_and_validate_with_env(&path, |key| {
        (key == MAX_HIERARCHIES_ENV).then(|| "lots".to_string())
    })
    .unwrap_err();

    assert!(matches!(err, VfsWatchError::ConfigError(ref msg) if msg.contains(MAX_HIERARCHIES_ENV)));
}

#[test]
fn zero_budget_is_rejected() {
    let (_dir, path) = write_config("[watch]\nmax_hierarchies = 0\n");

    let err = load_and_validate_with_env(&path, no_env).unwrap_err();

    assert!(matches!(err, VfsWatchError::ConfigError(ref msg) if msg.contains("max_hierarchies")));
}

#[test]
fn zero_queue_capacity_is_rejected() {
    let (_dir, path) = write_config("[watch]\nevent_queue_capacity = 0\n");

    let err = load_and_validate_with_env(&path, no_env).unwrap_err();

    assert!(matches!(err, VfsWatchError::ConfigError(_)));
}

#[test]
fn unknown_strategy_is_a_parse_error() {
    let (_dir, path) = write_config("[watch]\nstrategy = \"sideways\"\n");

    let err = load_and_validate(&path).unwrap_err();

    assert!(matches!(err, VfsWatchError::TomlError(_)), "got {err:?}");
}

#[test]
fn duplicate_build_ids_are_rejected() {
    let (_dir, path) = write_config(
        r#"
[[build]]
id = "app"
root = "/a"

[[build]]
id = "app"
root = "/b"
"#,
    );

    let err = load_and_validate_with_env(&path, no_env).unwrap_err();

    assert!(matches!(err, VfsWatchError::ConfigError(ref msg) if msg.contains("more than once")));
}

#[test]
fn nested_kinds_need_a_parent_and_roots_must_not_have_one() {
    let (_dir, path) = write_config(
        r#"
[[build]]
id = "orphan"
root = "/a/buildSrc"
kind = "build-src"
"#,
    );
    let err = load_and_validate_with_env(&path, no_env).unwrap_err();
    assert!(matches!(err, VfsWatchError::ConfigError(ref msg) if msg.contains("needs a `parent`")));

    let (_dir, path) = write_config(
        r#"
[[build]]
id = "a"
root = "/a"

[[build]]
id = "b"
root = "/b"
parent = "a"
"#,
    );
    let err = load_and_validate_with_env(&path, no_env).unwrap_err();
    assert!(matches!(err, VfsWatchError::ConfigError(ref msg) if msg.contains("cannot have a `parent`")));
}

#[test]
fn unknown_parent_is_rejected() {
    let (_dir, path) = write_config(
        r#"
[[build]]
id = "lib"
root = "/lib"
kind = "included"
parent = "ghost"
"#,
    );

    let err = load_and_validate_with_env(&path, no_env).unwrap_err();

    match err {
        VfsWatchError::UnknownParentBuild { build, parent } => {
            assert_eq!(build, "lib");
            assert_eq!(parent, "ghost");
        }
        other => panic!("expected UnknownParentBuild, got {other:?}"),
    }
}

#[test]
fn parent_cycle_is_rejected() {
    let (_dir, path) = write_config(
        r#"
[[build]]
id = "a"
root = "/a"
kind = "included"
parent = "b"

[[build]]
id = "b"
root = "/b"
kind = "nested"
parent = "a"
"#,
    );

    let err = load_and_validate_with_env(&path, no_env).unwrap_err();

    match err {
        VfsWatchError::BuildCycle(msg) => assert!(msg.contains("cycle detected")),
        other => panic!("expected BuildCycle, got {other:?}"),
    }
}

#[test]
fn self_parent_is_rejected() {
    let (_dir, path) = write_config(
        r#"
[[build]]
id = "a"
root = "/a"
kind = "nested"
parent = "a"
"#,
    );

    let err = load_and_validate_with_env(&path, no_env).unwrap_err();

    assert!(matches!(err, VfsWatchError::ConfigError(ref msg) if msg.contains("its own parent")));
}

#[test]
fn missing_config_file_is_an_io_error() {
    let dir = tempdir().unwrap();

    let err = load_and_validate(dir.path().join("absent.toml")).unwrap_err();

    assert!(matches!(err, VfsWatchError::IoError(_)));
}
