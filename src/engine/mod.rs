// src/engine/mod.rs

//! The daemon-side service tying hierarchy calculation, native watching and
//! the snapshot store together.
//!
//! - [`discovery`] supplies the participating builds of an invocation.
//! - [`service`] owns every long-lived component and exposes the per-build
//!   entry points ([`VfsService::start_build`], [`VfsService::reconcile`]).
//!
//! There is no process-wide state: everything hangs off one explicit
//! [`VfsService`] value.

pub mod discovery;
pub mod service;

pub use crate::watch::registry::ReconcileReport;
pub use discovery::{BuildRootSource, ConfigBuildRoots, StaticBuildRoots};
pub use service::{BuildPlan, VfsService};
