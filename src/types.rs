// src/types.rs

use std::str::FromStr;
use serde::Deserialize;

use crate::watch::WatchStrategy;

/// Operator preference for the native watch strategy.
///
/// - `Auto`: probe the platform once at startup (default).
/// - `Subtree`: force one registration per hierarchy.
/// - `Flat`: force one registration per directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyPreference {
    Auto,
    Subtree,
    Flat,
}

impl Default for StrategyPreference {
    fn default() -> Self {
        StrategyPreference::Auto
    }
}

impl StrategyPreference {
    /// Resolve the preference into a concrete strategy.
    ///
    /// `Auto` runs the platform probe; callers do this once when the service
    /// is constructed and never again.
    pub fn resolve(self) -> WatchStrategy {
        match self {
            StrategyPreference::Auto => WatchStrategy::probe(),
            StrategyPreference::Subtree => WatchStrategy::Subtree,
            StrategyPreference::Flat => WatchStrategy::Flat,
        }
    }
}

impl FromStr for StrategyPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(StrategyPreference::Auto),
            "subtree" => Ok(StrategyPreference::Subtree),
            "flat" => Ok(StrategyPreference::Flat),
            other => Err(format!(
                "invalid watch strategy: {other} (expected \"auto\", \"subtree\" or \"flat\")"
            )),
        }
    }
}

/// How a participating build relates to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildKind {
    /// The top-level project of the invocation.
    Root,
    /// A build included into another build. Has its own settings.
    Included,
    /// A `buildSrc` build owned by its parent. Has no settings of its own.
    BuildSrc,
    /// A build launched as a task of another build. Has its own settings.
    Nested,
}

impl Default for BuildKind {
    fn default() -> Self {
        BuildKind::Root
    }
}

impl BuildKind {
    /// Whether builds of this kind announce their own settings boundary.
    ///
    /// Only builds without one may be absorbed into an ancestor hierarchy.
    pub fn has_settings_boundary(self) -> bool {
        !matches!(self, BuildKind::BuildSrc)
    }

    pub fn requires_parent(self) -> bool {
        !matches!(self, BuildKind::Root)
    }
}

impl FromStr for BuildKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "root" => Ok(BuildKind::Root),
            "included" => Ok(BuildKind::Included),
            "build-src" | "buildsrc" => Ok(BuildKind::BuildSrc),
            "nested" => Ok(BuildKind::Nested),
            other => Err(format!(
                "invalid build kind: {other} (expected \"root\", \"included\", \"build-src\" or \"nested\")"
            )),
        }
    }
}
