// src/fs/mock.rs

use super::{EntryKind, FileSystem};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::errors::lock_or_recover;

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir(Vec<String>), // List of child names
    Symlink(PathBuf),
}

/// In-memory filesystem for deterministic snapshot tests.
///
/// Paths are used as given; tests should stick to absolute paths. Every
/// `entry_kind` call is counted so tests can tell a cached lookup from a
/// fresh stat.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
    stats: Arc<AtomicUsize>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = path.as_ref().to_path_buf();
        let mut files = lock_or_recover(&self.files);
        files.insert(path.clone(), MockEntry::File(content.into()));
        if let Some(parent) = path.parent() {
            ensure_dir_entry(&mut files, parent);
            link_child(&mut files, parent, &path);
        }
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut files = lock_or_recover(&self.files);
        ensure_dir_entry(&mut files, path.as_ref());
    }

    /// Add a symbolic link at `path` pointing at `target`.
    pub fn add_symlink(&self, path: impl AsRef<Path>, target: impl Into<PathBuf>) {
        let path = path.as_ref().to_path_buf();
        let mut files = lock_or_recover(&self.files);
        files.insert(path.clone(), MockEntry::Symlink(target.into()));
        if let Some(parent) = path.parent() {
            ensure_dir_entry(&mut files, parent);
            link_child(&mut files, parent, &path);
        }
    }

    /// Remove `path` and everything below it.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut files = lock_or_recover(&self.files);
        files.retain(|p, _| !p.starts_with(path));
        if let (Some(parent), Some(name)) = (path.parent(), path.file_name()) {
            if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
                let name = name.to_string_lossy();
                children.retain(|child| child.as_str() != name);
            }
        }
    }

    /// Number of `entry_kind` calls made so far.
    pub fn stat_count(&self) -> usize {
        self.stats.load(Ordering::SeqCst)
    }
}

fn ensure_dir_entry(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    if files.contains_key(path) {
        return;
    }
    files.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
    if let Some(parent) = path.parent() {
        ensure_dir_entry(files, parent);
        link_child(files, parent, path);
    }
}

fn link_child(files: &mut HashMap<PathBuf, MockEntry>, parent: &Path, child: &Path) {
    if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
        if let Some(name) = child.file_name().and_then(|n| n.to_str()) {
            if !children.iter().any(|c| c == name) {
                children.push(name.to_string());
            }
        }
    }
}

/// Follow symlinks from `path`, giving up after a few hops.
fn follow<'a>(files: &'a HashMap<PathBuf, MockEntry>, path: &Path) -> Option<&'a MockEntry> {
    let mut entry = files.get(path)?;
    for _ in 0..8 {
        match entry {
            MockEntry::Symlink(target) => entry = files.get(target)?,
            other => return Some(other),
        }
    }
    None
}

impl FileSystem for MockFileSystem {
    fn entry_kind(&self, path: &Path) -> Result<Option<EntryKind>> {
        self.stats.fetch_add(1, Ordering::SeqCst);
        let files = lock_or_recover(&self.files);
        Ok(match follow(&files, path) {
            Some(MockEntry::File(_)) => Some(EntryKind::File),
            Some(MockEntry::Dir(_)) => Some(EntryKind::Directory),
            _ => None,
        })
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let files = lock_or_recover(&self.files);
        match follow(&files, path) {
            Some(MockEntry::File(content)) => Ok(Box::new(Cursor::new(content.clone()))),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            _ => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        lock_or_recover(&self.files).contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        let files = lock_or_recover(&self.files);
        matches!(follow(&files, path), Some(MockEntry::Dir(_)))
    }

    fn is_symlink(&self, path: &Path) -> bool {
        matches!(lock_or_recover(&self.files).get(path), Some(MockEntry::Symlink(_)))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        // Only symlinked prefixes are resolved; the path need not exist.
        let files = lock_or_recover(&self.files);
        let mut out = PathBuf::new();
        for component in path.components() {
            out.push(component);
            for _ in 0..8 {
                match files.get(&out) {
                    Some(MockEntry::Symlink(target)) => out = target.clone(),
                    _ => break,
                }
            }
        }
        Ok(out)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let files = lock_or_recover(&self.files);
        match follow(&files, path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
