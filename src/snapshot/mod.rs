// src/snapshot/mod.rs

//! Cached filesystem metadata shared across build invocations.
//!
//! - [`node`] defines what is cached per path.
//! - [`hash`] computes content fingerprints (blake3).
//! - [`store`] owns the cache, its per-hierarchy partitions and all
//!   invalidation paths (native events, build outputs, evictions).

pub mod hash;
pub mod node;
pub mod store;

pub use node::{Fingerprint, NodeKind, SnapshotNode};
pub use store::{EventDisposition, SnapshotStore};
