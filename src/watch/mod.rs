// src/watch/mod.rs

//! Native watching and the lifecycle of watched hierarchies.
//!
//! This module is responsible for:
//! - The boundary to the OS watch facility ([`native`], [`notify_backend`]).
//! - Buffering native events with a bounded, coalescing queue ([`queue`]).
//! - Capping how many hierarchies are watched at once ([`budget`]).
//! - Registering and releasing hierarchies ([`registry`]).
//! - Feeding events into the snapshot store ([`pump`]).
//!
//! It does **not** decide which hierarchies a build needs; that is
//! [`crate::hierarchy`].

pub mod budget;
pub mod native;
pub mod notify_backend;
pub mod path_utils;
pub mod pump;
pub mod queue;
pub mod registry;

pub use budget::{BudgetDecision, BudgetExceeded, WatchBudgetEnforcer};
pub use native::{
    ChangeKind, NativeEvent, NativeWatcher, RegistrationError, WatchHandle, WatchStrategy,
};
pub use notify_backend::NotifyWatcher;
pub use pump::{spawn_event_consumer, EventPump, PumpStats};
pub use queue::{EventQueue, QueueStats, QueuedEvent, DEFAULT_EVENT_QUEUE_CAPACITY};
pub use registry::{
    ReconcileReport, RegistrationFailure, WatchRegistry, WatchedHierarchyState,
};
