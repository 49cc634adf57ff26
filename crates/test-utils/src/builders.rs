#![allow(dead_code)]

use std::path::{Path, PathBuf};

use vfswatch::hierarchy::{BuildId, BuildRoot};
use vfswatch::types::BuildKind;

/// Builder for the discovered build roots of one invocation.
///
/// Roots are kept in the order they are added, which is the discovery order
/// the calculator and the budget rely on.
///
/// ```ignore
/// let roots = BuildRootsBuilder::new("/work")
///     .root("app", "app")
///     .build_src("app:buildSrc", "app/buildSrc", "app")
///     .build();
/// ```
pub struct BuildRootsBuilder {
    base: PathBuf,
    roots: Vec<BuildRoot>,
}

impl BuildRootsBuilder {
    /// Relative directories passed to the other methods are joined onto
    /// `base`; absolute ones are used as-is.
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
            roots: Vec::new(),
        }
    }

    pub fn root(self, id: &str, dir: impl AsRef<Path>) -> Self {
        self.with_kind(id, dir, None, BuildKind::Root)
    }

    pub fn included(self, id: &str, dir: impl AsRef<Path>, parent: &str) -> Self {
        self.with_kind(id, dir, Some(parent), BuildKind::Included)
    }

    pub fn build_src(self, id: &str, dir: impl AsRef<Path>, parent: &str) -> Self {
        self.with_kind(id, dir, Some(parent), BuildKind::BuildSrc)
    }

    pub fn nested(self, id: &str, dir: impl AsRef<Path>, parent: &str) -> Self {
        self.with_kind(id, dir, Some(parent), BuildKind::Nested)
    }

    pub fn with_kind(
        mut self,
        id: &str,
        dir: impl AsRef<Path>,
        parent: Option<&str>,
        kind: BuildKind,
    ) -> Self {
        let dir = self.base.join(dir.as_ref());
        self.roots
            .push(BuildRoot::new(dir, id, parent.map(BuildId::from), kind));
        self
    }

    pub fn build(self) -> Vec<BuildRoot> {
        self.roots
    }
}
