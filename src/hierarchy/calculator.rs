// src/hierarchy/calculator.rs

//! Pure computation of the hierarchies a build invocation needs watched.
//!
//! No IO and no native watches are touched here; the result is a function
//! of the discovered build roots and the global cache locations only.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::errors::Result;
use crate::hierarchy::build_root::{BuildId, BuildRoot, BuildTree};
use crate::hierarchy::cache_locations::CacheLocationRegistry;
use crate::hierarchy::Hierarchy;
use crate::watch::path_utils::{is_proper_ancestor, normalize};

/// One distinct root path plus everything collapsed into it so far.
#[derive(Debug)]
struct Candidate {
    root: PathBuf,
    builds: Vec<BuildId>,
    first_seen: usize,
    absorbed_into: Option<usize>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HierarchyCalculator;

impl HierarchyCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Compute the target hierarchies for `roots` (in discovery order).
    ///
    /// 1. Roots with equal paths collapse into one candidate.
    /// 2. A candidate below another candidate is absorbed into it only when
    ///    every build it serves lacks a settings boundary and is nested
    ///    under a build of the ancestor.
    /// 3. Candidates under a global cache location are dropped.
    ///
    /// The result is ordered by first discovery of any constituent root.
    pub fn calculate(
        &self,
        roots: &[BuildRoot],
        caches: &CacheLocationRegistry,
    ) -> Result<Vec<Hierarchy>> {
        let tree = BuildTree::new(roots)?;

        let mut candidates: Vec<Candidate> = Vec::new();
        let mut by_path: HashMap<PathBuf, usize> = HashMap::new();

        for (position, root) in roots.iter().enumerate() {
            let path = normalize(root.root_dir());
            match by_path.get(&path) {
                Some(&idx) => {
                    let builds = &mut candidates[idx].builds;
                    if !builds.contains(root.build()) {
                        builds.push(root.build().clone());
                    }
                }
                None => {
                    by_path.insert(path.clone(), candidates.len());
                    candidates.push(Candidate {
                        root: path,
                        builds: vec![root.build().clone()],
                        first_seen: position,
                        absorbed_into: None,
                    });
                }
            }
        }

        for idx in 0..candidates.len() {
            if let Some(target) = closest_absorbing_ancestor(&candidates, idx, &tree) {
                debug!(
                    root = %candidates[idx].root.display(),
                    into = %candidates[target].root.display(),
                    "absorbing nested build into ancestor hierarchy"
                );
                candidates[idx].absorbed_into = Some(target);
            }
        }

        // Merge absorbed candidates into the hierarchy at the end of their
        // absorption chain.
        let mut merged: Vec<(usize, Hierarchy)> = Vec::new();
        let mut slot_of: HashMap<usize, usize> = HashMap::new();
        for idx in 0..candidates.len() {
            let owner = chain_end(&candidates, idx);
            let slot = *slot_of.entry(owner).or_insert_with(|| {
                merged.push((
                    candidates[owner].first_seen,
                    Hierarchy::new(candidates[owner].root.clone(), Vec::new()),
                ));
                merged.len() - 1
            });
            let (first_seen, hierarchy) = &mut merged[slot];
            *first_seen = (*first_seen).min(candidates[idx].first_seen);
            for build in &candidates[idx].builds {
                hierarchy.add_build(build.clone());
            }
        }

        merged.sort_by_key(|(first_seen, _)| *first_seen);

        let hierarchies = merged
            .into_iter()
            .map(|(_, hierarchy)| hierarchy)
            .filter(|hierarchy| {
                let cached = caches.is_in_global_cache(hierarchy.root());
                if cached {
                    debug!(
                        root = %hierarchy.root().display(),
                        "dropping hierarchy inside a global cache location"
                    );
                }
                !cached
            })
            .collect();

        Ok(hierarchies)
    }
}

/// Find the deepest proper-ancestor candidate that `idx` may be absorbed
/// into, if any.
fn closest_absorbing_ancestor(
    candidates: &[Candidate],
    idx: usize,
    tree: &BuildTree,
) -> Option<usize> {
    let candidate = &candidates[idx];
    let absorbable = candidate.builds.iter().all(|build| {
        tree.kind_of(build)
            .is_some_and(|kind| !kind.has_settings_boundary())
    });
    if !absorbable {
        return None;
    }

    candidates
        .iter()
        .enumerate()
        .filter(|(other, ancestor)| {
            *other != idx && is_proper_ancestor(&ancestor.root, &candidate.root)
        })
        .filter(|(_, ancestor)| {
            candidate.builds.iter().all(|build| {
                ancestor
                    .builds
                    .iter()
                    .any(|owner| tree.is_nested_under(build, owner))
            })
        })
        .max_by_key(|(_, ancestor)| ancestor.root.components().count())
        .map(|(other, _)| other)
}

fn chain_end(candidates: &[Candidate], mut idx: usize) -> usize {
    // Absorption always moves to a strictly shorter path, so this terminates.
    while let Some(next) = candidates[idx].absorbed_into {
        idx = next;
    }
    idx
}
