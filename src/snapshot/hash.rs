// src/snapshot/hash.rs

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::trace;

use crate::fs::FileSystem;

/// Compute the content hash of a single file.
pub fn compute_file_hash(fs: &dyn FileSystem, path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Hash a directory listing: the sorted names of its direct children.
///
/// Child contents are not included; those are fingerprinted separately when
/// looked up.
pub fn compute_listing_hash(fs: &dyn FileSystem, dir: &Path) -> Result<String> {
    let mut names: Vec<String> = fs
        .read_dir(dir)?
        .iter()
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    names.sort();

    let mut hasher = Hasher::new();
    for name in &names {
        hasher.update(name.as_bytes());
        hasher.update(&[0]);
    }
    let hash = hasher.finalize().to_hex().to_string();
    trace!(dir = ?dir, entries = names.len(), hash = %hash, "computed listing hash");
    Ok(hash)
}
