// src/hierarchy/build_root.rs

//! Participating builds and the parent relation between them.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graphmap::DiGraphMap;

use crate::errors::{Result, VfsWatchError};
use crate::types::BuildKind;

/// Identifier of one participating build (e.g. `":"`, `":included-lib"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BuildId(String);

impl BuildId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BuildId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One participating build of the current invocation.
///
/// Immutable for the duration of the invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRoot {
    root_dir: PathBuf,
    build: BuildId,
    parent: Option<BuildId>,
    kind: BuildKind,
}

impl BuildRoot {
    pub fn new(
        root_dir: impl Into<PathBuf>,
        build: impl Into<BuildId>,
        parent: Option<BuildId>,
        kind: BuildKind,
    ) -> Self {
        Self {
            root_dir: root_dir.into(),
            build: build.into(),
            parent,
            kind,
        }
    }

    /// Top-level project of an invocation.
    pub fn root(root_dir: impl Into<PathBuf>, build: impl Into<BuildId>) -> Self {
        Self::new(root_dir, build, None, BuildKind::Root)
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn build(&self) -> &BuildId {
        &self.build
    }

    pub fn parent(&self) -> Option<&BuildId> {
        self.parent.as_ref()
    }

    pub fn kind(&self) -> BuildKind {
        self.kind
    }
}

/// Parent relation between the builds of one invocation.
///
/// Edge direction: parent -> child. Used to answer "is build B
/// configuration-nested under build A?".
#[derive(Debug)]
pub struct BuildTree {
    index: HashMap<BuildId, usize>,
    kinds: Vec<BuildKind>,
    graph: DiGraphMap<usize, ()>,
}

impl BuildTree {
    /// Build the tree, rejecting unknown parents and parent cycles.
    ///
    /// The same build id may legitimately be reported more than once (e.g.
    /// a build evaluated twice); only its first occurrence is kept.
    pub fn new(roots: &[BuildRoot]) -> Result<Self> {
        let mut index: HashMap<BuildId, usize> = HashMap::new();
        let mut kinds = Vec::new();
        let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();

        for root in roots {
            if !index.contains_key(root.build()) {
                let node = kinds.len();
                index.insert(root.build().clone(), node);
                kinds.push(root.kind());
                graph.add_node(node);
            }
        }

        for root in roots {
            let Some(parent) = root.parent() else {
                continue;
            };
            let Some(&parent_node) = index.get(parent) else {
                return Err(VfsWatchError::UnknownParentBuild {
                    build: root.build().to_string(),
                    parent: parent.to_string(),
                });
            };
            let child_node = index[root.build()];
            graph.add_edge(parent_node, child_node, ());
        }

        if let Err(cycle) = toposort(&graph, None) {
            let build = index
                .iter()
                .find(|(_, node)| **node == cycle.node_id())
                .map(|(id, _)| id.to_string())
                .unwrap_or_default();
            return Err(VfsWatchError::BuildCycle(format!(
                "cycle detected in build parents involving build '{}'",
                build
            )));
        }

        Ok(Self {
            index,
            kinds,
            graph,
        })
    }

    pub fn kind_of(&self, build: &BuildId) -> Option<BuildKind> {
        self.index.get(build).map(|node| self.kinds[*node])
    }

    /// True if `descendant` is (transitively) a child of `ancestor`.
    pub fn is_nested_under(&self, descendant: &BuildId, ancestor: &BuildId) -> bool {
        match (self.index.get(ancestor), self.index.get(descendant)) {
            (Some(&a), Some(&d)) if a != d => has_path_connecting(&self.graph, a, d, None),
            _ => false,
        }
    }
}
