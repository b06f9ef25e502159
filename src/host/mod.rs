//! Host Adapter contract.
//!
//! A rendering backend plugs into the reconciler by implementing [`HostConfig`].
//! The reconciler decides *what* changes; the host decides *how* a change is
//! applied to its real tree (terminal cells, a widget toolkit, a test log...).
//!
//! # Lifecycle of a node
//!
//! ```text
//! render phase (detached)                 commit phase (attached)
//! ┌──────────────────────────────┐        ┌──────────────────────────────┐
//! │ create_instance              │        │ prepare_for_commit           │
//! │ append_initial_child  (×n)   │        │ remove_child / reset_text    │
//! │ finalize_initial_children    │───────►│ commit_update / text_update  │
//! │ prepare_update (reused node) │        │ append_child / insert_before │
//! └──────────────────────────────┘        │ commit_mount                 │
//!                                         │ reset_after_commit           │
//!                                         └──────────────────────────────┘
//! ```
//!
//! Operations a backend does not support must fail with
//! [`HostError::ContractViolation`]. The text operations do this by default,
//! so a backend without text nodes only has to keep `should_set_text_content`
//! returning `false` and never see text elements.

use std::fmt;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::error::HostError;
use crate::types::{CallbackId, HostNode, HostParent, InstanceHandle};

// =============================================================================
// Scheduling Callbacks
// =============================================================================

/// Remaining time budget of an idle period.
pub trait Deadline {
    /// Time left before the host wants control back.
    fn time_remaining(&self) -> Duration;
}

/// Deadline measured against a monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct TimeBudget {
    end: Instant,
}

impl TimeBudget {
    /// A deadline `budget` from now.
    pub fn new(budget: Duration) -> Self {
        Self {
            end: Instant::now() + budget,
        }
    }
}

impl Deadline for TimeBudget {
    fn time_remaining(&self) -> Duration {
        self.end.saturating_duration_since(Instant::now())
    }
}

/// Callback a host runs before its next paint.
pub type AnimationCallback = Box<dyn FnOnce()>;

/// Callback a host runs when idle, with the idle period's deadline.
pub type DeferredCallback = Box<dyn FnOnce(&dyn Deadline)>;

// =============================================================================
// HostConfig
// =============================================================================

/// The operation set a backend implements for the reconciler.
///
/// The eight associated types are the backend's own vocabulary. The reconciler
/// only clones, compares and routes them; it never looks inside.
pub trait HostConfig: 'static {
    /// Node type tag (e.g. "box", "text").
    type Type: Clone + PartialEq + fmt::Debug;
    /// Node properties.
    type Props: Clone;
    /// A backend node.
    type Instance: Clone;
    /// A backend text node.
    type TextInstance: Clone;
    /// What callers get back when they ask for a mounted node.
    type PublicInstance;
    /// Mount target.
    type Container: Clone + Eq + Hash;
    /// Context threaded top-down through construction.
    type HostContext: Clone;
    /// Result of diffing two props values of one node.
    type UpdatePayload;

    // -------------------------------------------------------------------------
    // Context
    // -------------------------------------------------------------------------

    /// Context for the root of `container`. Must be deterministic.
    fn get_root_host_context(&self, container: &Self::Container) -> Self::HostContext;

    /// Context for the children of a node of type `kind`.
    ///
    /// Must depend only on the parent context and the type tag.
    fn get_child_host_context(
        &self,
        parent: &Self::HostContext,
        kind: &Self::Type,
    ) -> Self::HostContext;

    /// Value exposed to callers for a mounted node.
    fn get_public_instance(
        &self,
        node: &HostNode<Self::Instance, Self::TextInstance>,
    ) -> Self::PublicInstance;

    // -------------------------------------------------------------------------
    // Construction (render phase, detached nodes)
    // -------------------------------------------------------------------------

    /// Whether the node's children collapse into text owned by the node itself.
    ///
    /// When true the reconciler creates no child instances for it.
    fn should_set_text_content(&self, props: &Self::Props) -> bool;

    /// Create a node. It must not be attached anywhere yet.
    fn create_instance(
        &self,
        kind: &Self::Type,
        props: &Self::Props,
        container: &Self::Container,
        context: &Self::HostContext,
        handle: InstanceHandle,
    ) -> Result<Self::Instance, HostError>;

    /// Attach `child` to a parent that is itself not attached yet.
    ///
    /// Call order for one parent is the final child order.
    fn append_initial_child(
        &self,
        parent: &Self::Instance,
        child: &HostNode<Self::Instance, Self::TextInstance>,
    ) -> Result<(), HostError>;

    /// Last construction step. Returning `true` requests one `commit_mount`
    /// once the node is attached to the live tree.
    fn finalize_initial_children(
        &self,
        instance: &Self::Instance,
        kind: &Self::Type,
        props: &Self::Props,
        container: &Self::Container,
    ) -> Result<bool, HostError>;

    /// Diff two props values of one node. Must not mutate `instance`.
    ///
    /// `None` means nothing to commit for this node.
    fn prepare_update(
        &self,
        instance: &Self::Instance,
        kind: &Self::Type,
        old_props: &Self::Props,
        new_props: &Self::Props,
        container: &Self::Container,
        context: &Self::HostContext,
    ) -> Result<Option<Self::UpdatePayload>, HostError>;

    // -------------------------------------------------------------------------
    // Commit
    // -------------------------------------------------------------------------

    /// Apply a payload produced by `prepare_update`. Called once per payload.
    fn commit_update(
        &self,
        instance: &Self::Instance,
        payload: Self::UpdatePayload,
        kind: &Self::Type,
        old_props: &Self::Props,
        new_props: &Self::Props,
        handle: InstanceHandle,
    ) -> Result<(), HostError>;

    /// Mount-only side effects (focus, measurement...). Called at most once.
    fn commit_mount(
        &self,
        instance: &Self::Instance,
        kind: &Self::Type,
        props: &Self::Props,
        handle: InstanceHandle,
    ) -> Result<(), HostError>;

    /// Clear text content set through `should_set_text_content`.
    fn reset_text_content(&self, _instance: &Self::Instance) -> Result<(), HostError> {
        Err(HostError::contract(
            "reset_text_content",
            "backend does not support text content",
        ))
    }

    /// Create a text node.
    fn create_text_instance(
        &self,
        _text: &str,
        _container: &Self::Container,
        _context: &Self::HostContext,
        _handle: InstanceHandle,
    ) -> Result<Self::TextInstance, HostError> {
        Err(HostError::contract(
            "create_text_instance",
            "backend does not support text nodes",
        ))
    }

    /// Replace the text of a text node.
    fn commit_text_update(
        &self,
        _text_instance: &Self::TextInstance,
        _old_text: &str,
        _new_text: &str,
    ) -> Result<(), HostError> {
        Err(HostError::contract(
            "commit_text_update",
            "backend does not support text nodes",
        ))
    }

    /// Append `child` as the last child of an attached parent.
    fn append_child(
        &self,
        parent: HostParent<'_, Self::Instance, Self::Container>,
        child: &HostNode<Self::Instance, Self::TextInstance>,
    ) -> Result<(), HostError>;

    /// Insert `child` right before `before`. If `child` is already attached to
    /// `parent` it is moved.
    fn insert_before(
        &self,
        parent: HostParent<'_, Self::Instance, Self::Container>,
        child: &HostNode<Self::Instance, Self::TextInstance>,
        before: &HostNode<Self::Instance, Self::TextInstance>,
    ) -> Result<(), HostError>;

    /// Detach `child` from `parent`, leaving its siblings untouched.
    fn remove_child(
        &self,
        parent: HostParent<'_, Self::Instance, Self::Container>,
        child: &HostNode<Self::Instance, Self::TextInstance>,
    ) -> Result<(), HostError>;

    /// Run `callback` before the next paint.
    ///
    /// Hosts without a paint clock can keep the default, which degrades to
    /// the deferred hook.
    fn schedule_animation_callback(&self, callback: AnimationCallback) -> Option<CallbackId> {
        self.schedule_deferred_callback(Box::new(move |_deadline: &dyn Deadline| callback()))
    }

    /// Run `callback` when idle. Required: time-sliced work cannot make
    /// progress without it.
    fn schedule_deferred_callback(&self, callback: DeferredCallback) -> Option<CallbackId>;

    /// Called before every commit, including empty ones.
    fn prepare_for_commit(&self);

    /// Called exactly once after every `prepare_for_commit`.
    fn reset_after_commit(&self);

    /// Whether updates without an explicit priority commit synchronously.
    fn use_sync_scheduling(&self) -> bool {
        true
    }
}
