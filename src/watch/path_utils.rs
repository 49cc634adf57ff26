// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Component, Path, PathBuf};

use crate::fs::FileSystem;

/// Lexically normalize a path: drop `.` components and fold `..` into the
/// preceding component. Does not touch the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Canonicalize through `fs` when the path exists, otherwise fall back to
/// lexical normalization.
///
/// Roots reported by build discovery and cache locations configured by the
/// operator must compare equal even when one of them goes through a symlink
/// (notably `/private/var` on macOS).
pub fn resolve(fs: &dyn FileSystem, path: &Path) -> PathBuf {
    fs.canonicalize(path)
        .map(|p| normalize(&p))
        .unwrap_or_else(|_| normalize(path))
}

/// True if `ancestor` is a strict, component-wise prefix of `path`.
pub fn is_proper_ancestor(ancestor: &Path, path: &Path) -> bool {
    ancestor != path && path.starts_with(ancestor)
}

/// Render paths as `[a, b, c]` for the diagnostic log lines.
pub fn format_path_list<'a, I>(paths: I) -> String
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    let rendered: Vec<String> = paths
        .into_iter()
        .map(|p| p.display().to_string())
        .collect();
    format!("[{}]", rendered.join(", "))
}
