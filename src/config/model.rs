// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{BuildKind, StrategyPreference};
use crate::watch::{WatchStrategy, DEFAULT_EVENT_QUEUE_CAPACITY};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [watch]
/// max_hierarchies = 8
/// strategy = "auto"
///
/// [cache]
/// global_locations = ["/home/me/.gradle/caches"]
///
/// [[build]]
/// id = "app"
/// root = "/work/app"
///
/// [[build]]
/// id = "app:buildSrc"
/// root = "/work/app/buildSrc"
/// kind = "build-src"
/// parent = "app"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    /// Watch behaviour from `[watch]`.
    #[serde(default)]
    pub watch: WatchSection,

    /// Immutable cache locations from `[cache]`.
    #[serde(default)]
    pub cache: CacheSection,

    /// Participating builds from `[[build]]`, in discovery order.
    #[serde(default)]
    pub build: Vec<BuildEntry>,
}

/// Validated configuration. Construct through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub watch: WatchSection,
    pub cache: CacheSection,
    pub build: Vec<BuildEntry>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        watch: WatchSection,
        cache: CacheSection,
        build: Vec<BuildEntry>,
    ) -> Self {
        Self { watch, cache, build }
    }

    /// Runtime settings for the watch service. Resolves the strategy
    /// preference, probing the platform if it is `auto`.
    pub fn watch_settings(&self) -> WatchSettings {
        WatchSettings {
            max_hierarchies: self.watch.max_hierarchies,
            strategy: self.watch.strategy.resolve(),
            cache_locations: self.cache.global_locations.clone(),
            event_queue_capacity: self.watch.event_queue_capacity,
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Maximum number of simultaneously watched hierarchies.
    ///
    /// Absent means unbounded.
    #[serde(default)]
    pub max_hierarchies: Option<usize>,

    /// `"auto"`, `"subtree"` or `"flat"`.
    #[serde(default)]
    pub strategy: StrategyPreference,

    /// Bound of the native event queue before changes collapse into a
    /// whole-hierarchy invalidation.
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

fn default_event_queue_capacity() -> usize {
    DEFAULT_EVENT_QUEUE_CAPACITY
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            max_hierarchies: None,
            strategy: StrategyPreference::default(),
            event_queue_capacity: default_event_queue_capacity(),
        }
    }
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CacheSection {
    /// Path prefixes holding immutable, content-addressed data.
    #[serde(default)]
    pub global_locations: Vec<PathBuf>,
}

/// One `[[build]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildEntry {
    pub id: String,

    /// Root directory. Relative paths are resolved against the directory
    /// holding the config file.
    pub root: PathBuf,

    #[serde(default)]
    pub kind: BuildKind,

    /// Id of the build this one belongs to. Required for every kind except
    /// `root`.
    #[serde(default)]
    pub parent: Option<String>,
}

/// Resolved runtime settings of the watch service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSettings {
    pub max_hierarchies: Option<usize>,
    pub strategy: WatchStrategy,
    pub cache_locations: Vec<PathBuf>,
    pub event_queue_capacity: usize,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            max_hierarchies: None,
            strategy: WatchStrategy::probe(),
            cache_locations: Vec::new(),
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
        }
    }
}
