// src/config/validate.rs

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, VfsWatchError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::VfsWatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.watch, raw.cache, raw.build))
    }
}

/// Check the semantic invariants serde cannot express.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_watch_section(cfg)?;
    validate_build_entries(cfg)?;
    validate_build_parents(cfg)?;
    Ok(())
}

fn validate_watch_section(cfg: &RawConfigFile) -> Result<()> {
    // strategy is strongly typed and validated during deserialization.

    if cfg.watch.max_hierarchies == Some(0) {
        return Err(VfsWatchError::ConfigError(
            "[watch].max_hierarchies must be >= 1 (got 0); omit it for no limit".to_string(),
        ));
    }

    if cfg.watch.event_queue_capacity == 0 {
        return Err(VfsWatchError::ConfigError(
            "[watch].event_queue_capacity must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_build_entries(cfg: &RawConfigFile) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();
    for entry in &cfg.build {
        if entry.id.trim().is_empty() {
            return Err(VfsWatchError::ConfigError(
                "[[build]] entries must have a non-empty `id`".to_string(),
            ));
        }
        if !seen.insert(entry.id.as_str()) {
            return Err(VfsWatchError::ConfigError(format!(
                "build '{}' is declared more than once",
                entry.id
            )));
        }
        match (&entry.parent, entry.kind.requires_parent()) {
            (None, true) => {
                return Err(VfsWatchError::ConfigError(format!(
                    "build '{}' of kind {:?} needs a `parent`",
                    entry.id, entry.kind
                )));
            }
            (Some(_), false) => {
                return Err(VfsWatchError::ConfigError(format!(
                    "root build '{}' cannot have a `parent`",
                    entry.id
                )));
            }
            _ => {}
        }
        if entry.parent.as_deref() == Some(entry.id.as_str()) {
            return Err(VfsWatchError::ConfigError(format!(
                "build '{}' cannot be its own parent",
                entry.id
            )));
        }
    }
    Ok(())
}

fn validate_build_parents(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: parent -> build
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for entry in &cfg.build {
        graph.add_node(entry.id.as_str());
    }

    for entry in &cfg.build {
        if let Some(parent) = entry.parent.as_deref() {
            if !graph.contains_node(parent) {
                return Err(VfsWatchError::UnknownParentBuild {
                    build: entry.id.clone(),
                    parent: parent.to_string(),
                });
            }
            graph.add_edge(parent, entry.id.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(VfsWatchError::BuildCycle(format!(
            "cycle detected in build parents involving build '{}'",
            cycle.node_id()
        ))),
    }
}
