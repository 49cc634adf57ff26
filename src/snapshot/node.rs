// src/snapshot/node.rs

use std::path::{Path, PathBuf};

/// What a snapshot node describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
    Missing,
}

/// Content fingerprint: blake3 of file bytes, or of the sorted child names
/// for a directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Cached metadata for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotNode {
    path: PathBuf,
    kind: NodeKind,
    fingerprint: Option<Fingerprint>,
}

impl SnapshotNode {
    pub fn new(path: impl Into<PathBuf>, kind: NodeKind, fingerprint: Option<Fingerprint>) -> Self {
        Self {
            path: path.into(),
            kind,
            fingerprint,
        }
    }

    pub fn missing(path: impl Into<PathBuf>) -> Self {
        Self::new(path, NodeKind::Missing, None)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.fingerprint.as_ref()
    }

    pub fn is_missing(&self) -> bool {
        self.kind == NodeKind::Missing
    }
}
