//! # spark-fiber
//!
//! Tree reconciliation with pluggable rendering backends.
//!
//! Applications describe UI as [`Element`] trees. A reconciler diffs each new
//! tree against the one it committed last and drives a backend, through the
//! [`HostConfig`] contract, to apply only the difference.
//!
//! ## Architecture
//!
//! ```text
//! render(element, container) ─► ContainerRegistry ─► Reconciler ─► HostConfig
//!                                (container → root)   (diff, schedule)  (backend)
//! ```
//!
//! The engine never touches a backend node directly; every mutation goes
//! through the host adapter, inside one `prepare_for_commit` /
//! `reset_after_commit` bracket per commit.
//!
//! ## Modules
//!
//! - [`types`] - Elements, opaque handles, node references
//! - [`host`] - The Host Adapter contract ([`HostConfig`])
//! - [`reconciler`] - [`Reconciler`] interface and the [`FiberReconciler`] engine
//! - [`registry`] - [`ContainerRegistry`], the `render` / `unmount` entry points
//! - [`terminal`] - A terminal backend built on `crossterm`
//! - [`error`] - Error types

pub mod error;
pub mod host;
pub mod reconciler;
pub mod registry;
pub mod terminal;
pub mod types;

#[cfg(test)]
pub(crate) mod test_host;

// Re-export commonly used items
pub use types::*;

pub use error::{HostError, ReconcilerError, Result};

pub use host::{AnimationCallback, Deadline, DeferredCallback, HostConfig, TimeBudget};

pub use reconciler::scheduler::{ExecutionMode, PriorityLevel};
pub use reconciler::{FiberReconciler, Reconciler};

pub use registry::ContainerRegistry;
