//! Reconciler - the engine behind the container registry.
//!
//! [`Reconciler`] is the interface the registry (or any other front end)
//! consumes: create a root for a container, update it, and steer scheduling.
//! [`FiberReconciler`] is the implementation shipped with the crate. It owns a
//! [`HostConfig`] and drives it through render and commit passes:
//!
//! ```text
//! update_container ─► pending update (priority) ─► perform_work
//!                                                    │
//!                           ┌────────────────────────┴───────────┐
//!                           ▼                                    ▼
//!                  RenderPass (fiber.rs)               commit_effects (commit.rs)
//!                  diff, build detached nodes          bracketed host mutations
//! ```
//!
//! Synchronous and task work runs inline. Animation and idle work runs from
//! the host's scheduling hooks; failures there are logged and kept for
//! [`FiberReconciler::take_error`].
//!
//! # Example
//!
//! ```ignore
//! use spark_fiber::{Element, FiberReconciler, Reconciler};
//!
//! let reconciler = FiberReconciler::new(host);
//! let root = reconciler.create_container(screen);
//! reconciler.update_container(Some(Element::host(kind, props, vec![])), root, None)?;
//!
//! // Coalesce two updates into one commit
//! reconciler.batched_updates(|| {
//!     reconciler.update_container(Some(first), root, None)?;
//!     reconciler.update_container(Some(second), root, None)
//! })??;
//! ```

mod commit;
mod fiber;
pub mod scheduler;

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::rc::{Rc, Weak};

use tracing::{debug, error, trace, warn};

use crate::error::{ReconcilerError, Result};
use crate::host::{Deadline, HostConfig};
use crate::types::{Callback, Element, HostNode, InstanceHandle, RootId};
use commit::NodeOf;
use fiber::{Fiber, RenderPass};
use scheduler::{ExecutionMode, PriorityLevel, ScopedMode};

// =============================================================================
// Reconciler Interface
// =============================================================================

/// What a front end needs from a reconciliation engine.
pub trait Reconciler {
    /// Mount target type.
    type Container: Clone + Eq + Hash;
    /// Element tree type accepted by updates.
    type Element;
    /// Value returned by the legacy introspection calls.
    type PublicInstance;
    /// Backend node returned by `find_host_instance`.
    type HostNode;

    /// Create a root for `container`.
    fn create_container(&self, container: Self::Container) -> RootId;

    /// Release `root`. Later updates to it fail with `UnknownRoot`.
    ///
    /// The host is not touched, so tear the tree down first. Returns
    /// whether the root existed.
    fn destroy_container(&self, root: RootId) -> bool;

    /// Request that `root` render `element`; `None` tears the tree down.
    ///
    /// `callback` runs once the update is committed, and only if the commit
    /// succeeded.
    fn update_container(
        &self,
        element: Option<Self::Element>,
        root: RootId,
        callback: Option<Callback>,
    ) -> Result<()>;

    /// Run `f` with updates scheduled at `level`.
    fn perform_with_priority<A>(&self, level: PriorityLevel, f: impl FnOnce() -> A) -> A;

    /// Coalesce updates made inside `f` into one commit per root.
    fn batched_updates<A>(&self, f: impl FnOnce() -> A) -> Result<A>;

    /// Commit updates made inside `f` one at a time, even inside a batch.
    fn unbatched_updates<A>(&self, f: impl FnOnce() -> A) -> A;

    /// Commit updates made inside `f` before returning.
    fn sync_updates<A>(&self, f: impl FnOnce() -> A) -> Result<A>;

    /// Let updates made inside `f` commit from the host's idle callback.
    fn deferred_updates<A>(&self, f: impl FnOnce() -> A) -> A;

    /// Public instance of the root's top-level node.
    fn get_public_root_instance(&self, root: RootId) -> Option<Self::PublicInstance>;

    /// Backend node for a handle issued by this engine, if still mounted.
    fn find_host_instance(&self, handle: InstanceHandle) -> Option<Self::HostNode>;
}

// =============================================================================
// Engine State
// =============================================================================

struct PendingUpdate<H: HostConfig> {
    element: Option<Element<H::Type, H::Props>>,
    priority: PriorityLevel,
    callbacks: Vec<Callback>,
}

struct RootState<H: HostConfig> {
    container: H::Container,
    current: Vec<Fiber<H>>,
    pending: Option<PendingUpdate<H>>,
}

struct Engine<H: HostConfig> {
    host: H,
    this: Weak<Engine<H>>,
    mode: Cell<ExecutionMode>,
    performing_work: Cell<bool>,
    animation_scheduled: Cell<bool>,
    deferred_scheduled: Cell<bool>,
    next_root: Cell<u32>,
    next_handle: Cell<u64>,
    roots: RefCell<BTreeMap<RootId, RootState<H>>>,
    handles: RefCell<HashMap<InstanceHandle, NodeOf<H>>>,
    last_error: RefCell<Option<ReconcilerError>>,
}

/// Clears the performing-work flag when dropped.
struct WorkGuard<'a>(&'a Cell<bool>);

impl Drop for WorkGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<H: HostConfig> Engine<H> {
    fn default_priority(&self) -> PriorityLevel {
        if self.host.use_sync_scheduling() {
            PriorityLevel::Synchronous
        } else {
            PriorityLevel::Low
        }
    }

    // -------------------------------------------------------------------------
    // Scheduling
    // -------------------------------------------------------------------------

    fn schedule_update(
        &self,
        root: RootId,
        element: Option<Element<H::Type, H::Props>>,
        callback: Option<Callback>,
    ) -> Result<()> {
        let priority = self.mode.get().update_priority(self.default_priority());

        {
            let mut roots = self.roots.borrow_mut();
            let state = roots.get_mut(&root).ok_or(ReconcilerError::UnknownRoot(root))?;
            let pending = state.pending.get_or_insert_with(|| PendingUpdate {
                element: None,
                priority: PriorityLevel::NoWork,
                callbacks: Vec::new(),
            });
            pending.element = element;
            pending.priority = pending.priority.merge(priority);
            pending.callbacks.extend(callback);
        }

        trace!(%root, %priority, "scheduled update");
        self.request_work(priority)
    }

    fn request_work(&self, priority: PriorityLevel) -> Result<()> {
        match priority {
            PriorityLevel::Task if self.mode.get().is_batching() => Ok(()),
            level if level.is_synchronous() => self.perform_work(PriorityLevel::Task, None),
            _ => {
                self.schedule_callbacks();
                Ok(())
            }
        }
    }

    /// Ask the host for callbacks covering queued animation and idle work.
    fn schedule_callbacks(&self) {
        if self.performing_work.get() {
            return;
        }
        if self.has_work(|level| level == PriorityLevel::Animation) {
            self.ensure_animation_callback();
        }
        if self.has_work(PriorityLevel::is_deferred) {
            self.ensure_deferred_callback();
        }
    }

    fn ensure_animation_callback(&self) {
        if self.animation_scheduled.replace(true) {
            return;
        }
        let engine = self.this.clone();
        let token = self.host.schedule_animation_callback(Box::new(move || {
            if let Some(engine) = engine.upgrade() {
                engine.animation_scheduled.set(false);
                engine.run_scheduled(PriorityLevel::Animation, None);
            }
        }));
        trace!(?token, "requested animation callback");
    }

    fn ensure_deferred_callback(&self) {
        if self.deferred_scheduled.replace(true) {
            return;
        }
        let engine = self.this.clone();
        let token = self.host.schedule_deferred_callback(Box::new(move |deadline: &dyn Deadline| {
            if let Some(engine) = engine.upgrade() {
                engine.deferred_scheduled.set(false);
                engine.run_scheduled(PriorityLevel::Offscreen, Some(deadline));
            }
        }));
        trace!(?token, "requested deferred callback");
    }

    /// Work run from a host callback has no caller to return errors to.
    fn run_scheduled(&self, limit: PriorityLevel, deadline: Option<&dyn Deadline>) {
        if let Err(err) = self.perform_work(limit, deadline) {
            error!(error = %err, %limit, "scheduled work failed");
            *self.last_error.borrow_mut() = Some(err);
        }
    }

    fn has_work(&self, filter: impl Fn(PriorityLevel) -> bool) -> bool {
        self.roots
            .borrow()
            .values()
            .filter_map(|root| root.pending.as_ref())
            .any(|pending| filter(pending.priority))
    }

    /// Most urgent root with pending work at or above `limit`.
    fn next_root(&self, limit: PriorityLevel) -> Option<RootId> {
        self.roots
            .borrow()
            .iter()
            .filter_map(|(id, root)| {
                root.pending
                    .as_ref()
                    .filter(|pending| pending.priority <= limit)
                    .map(|pending| (pending.priority, *id))
            })
            .min()
            .map(|(_, id)| id)
    }

    // -------------------------------------------------------------------------
    // Work Loop
    // -------------------------------------------------------------------------

    /// Render and commit every root with work at or above `limit`.
    ///
    /// Re-entrant calls (from commit callbacks or `commit_mount`) return
    /// immediately; the running loop picks their work up, so commits never
    /// interleave. With a `deadline`, at least one root is processed per call.
    fn perform_work(&self, limit: PriorityLevel, deadline: Option<&dyn Deadline>) -> Result<()> {
        if self.performing_work.get() {
            return Ok(());
        }

        let result = {
            self.performing_work.set(true);
            let _working = WorkGuard(&self.performing_work);
            self.work_loop(limit, deadline)
        };

        self.schedule_callbacks();
        result
    }

    /// A failing root drops its update; the other roots still commit and the
    /// first failure is returned.
    fn work_loop(&self, limit: PriorityLevel, deadline: Option<&dyn Deadline>) -> Result<()> {
        let mut completed = 0usize;
        let mut failure = None;
        while let Some(root) = self.next_root(limit) {
            if let Some(deadline) = deadline {
                if completed > 0 && deadline.time_remaining().is_zero() {
                    trace!(completed, "deadline reached, yielding");
                    break;
                }
            }
            if let Err(err) = self.work_on_root(root) {
                failure.get_or_insert(err);
            }
            completed += 1;
        }
        failure.map_or(Ok(()), Err)
    }

    fn work_on_root(&self, id: RootId) -> Result<()> {
        let (container, current, update) = {
            let mut roots = self.roots.borrow_mut();
            let Some(root) = roots.get_mut(&id) else {
                return Ok(());
            };
            let Some(update) = root.pending.take() else {
                return Ok(());
            };
            (root.container.clone(), std::mem::take(&mut root.current), update)
        };
        let PendingUpdate {
            element,
            priority,
            callbacks,
        } = update;

        let outcome = RenderPass::new(&self.host, &container, &self.next_handle)
            .render_root(&current, element)
            .and_then(|output| {
                let effects = output.effects.len();
                commit::commit_effects(&self.host, &container, output.effects)?;
                Ok((output.children, output.created, output.removed, effects))
            });

        match outcome {
            Ok((children, created, removed, effects)) => {
                {
                    let mut handles = self.handles.borrow_mut();
                    for handle in removed {
                        handles.remove(&handle);
                    }
                    handles.extend(created);
                }
                if let Some(root) = self.roots.borrow_mut().get_mut(&id) {
                    root.current = children;
                }
                debug!(root = %id, %priority, effects, "committed root");

                for callback in callbacks {
                    callback();
                }
                Ok(())
            }
            Err(err) => {
                if let Some(root) = self.roots.borrow_mut().get_mut(&id) {
                    root.current = current;
                }
                warn!(root = %id, %priority, error = %err, "update aborted");
                Err(err.into())
            }
        }
    }
}

// =============================================================================
// FiberReconciler
// =============================================================================

/// Reconciler driving a single [`HostConfig`].
///
/// Cheap to clone; clones share the same engine and roots.
pub struct FiberReconciler<H: HostConfig> {
    inner: Rc<Engine<H>>,
}

impl<H: HostConfig> Clone for FiberReconciler<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<H: HostConfig> FiberReconciler<H> {
    /// Create an engine around `host`. The host is fixed for the engine's lifetime.
    pub fn new(host: H) -> Self {
        let inner = Rc::new_cyclic(|this| Engine {
            host,
            this: this.clone(),
            mode: Cell::new(ExecutionMode::default()),
            performing_work: Cell::new(false),
            animation_scheduled: Cell::new(false),
            deferred_scheduled: Cell::new(false),
            next_root: Cell::new(0),
            next_handle: Cell::new(1),
            roots: RefCell::new(BTreeMap::new()),
            handles: RefCell::new(HashMap::new()),
            last_error: RefCell::new(None),
        });
        Self { inner }
    }

    /// The host adapter this engine drives.
    pub fn host(&self) -> &H {
        &self.inner.host
    }

    /// Take the last failure raised by work run from a host callback.
    pub fn take_error(&self) -> Option<ReconcilerError> {
        self.inner.last_error.borrow_mut().take()
    }

    /// Whether any root has an update that is not committed yet.
    pub fn has_pending_work(&self) -> bool {
        self.inner.has_work(|_| true)
    }

    /// Number of live roots.
    pub fn root_count(&self) -> usize {
        self.inner.roots.borrow().len()
    }

    /// Current ambient scheduling mode.
    pub fn execution_mode(&self) -> ExecutionMode {
        self.inner.mode.get()
    }

    fn scoped(&self, change: impl FnOnce(ExecutionMode) -> ExecutionMode) -> ScopedMode<'_> {
        ScopedMode::enter(&self.inner.mode, change)
    }
}

impl<H: HostConfig> Reconciler for FiberReconciler<H> {
    type Container = H::Container;
    type Element = Element<H::Type, H::Props>;
    type PublicInstance = H::PublicInstance;
    type HostNode = HostNode<H::Instance, H::TextInstance>;

    fn create_container(&self, container: H::Container) -> RootId {
        let id = RootId(self.inner.next_root.get());
        self.inner.next_root.set(id.0 + 1);
        self.inner.roots.borrow_mut().insert(
            id,
            RootState {
                container,
                current: Vec::new(),
                pending: None,
            },
        );
        debug!(root = %id, "created container root");
        id
    }

    fn destroy_container(&self, root: RootId) -> bool {
        let Some(state) = self.inner.roots.borrow_mut().remove(&root) else {
            return false;
        };
        if state.pending.is_some() {
            warn!(%root, "destroyed root dropped its pending update");
        }

        let mut owned = Vec::new();
        for fiber in &state.current {
            fiber.collect_handles(&mut owned);
        }
        let mut handles = self.inner.handles.borrow_mut();
        for handle in &owned {
            handles.remove(handle);
        }
        debug!(%root, released = owned.len(), "destroyed container root");
        true
    }

    fn update_container(
        &self,
        element: Option<Self::Element>,
        root: RootId,
        callback: Option<Callback>,
    ) -> Result<()> {
        self.inner.schedule_update(root, element, callback)
    }

    fn perform_with_priority<A>(&self, level: PriorityLevel, f: impl FnOnce() -> A) -> A {
        let _scope = self.scoped(|mode| ExecutionMode {
            priority: Some(level),
            ..mode
        });
        f()
    }

    fn batched_updates<A>(&self, f: impl FnOnce() -> A) -> Result<A> {
        let (value, outermost) = {
            let scope = self.scoped(|mode| ExecutionMode {
                batching: true,
                ..mode
            });
            let outermost = !scope.previous().batching;
            (f(), outermost)
        };
        if outermost {
            self.inner.perform_work(PriorityLevel::Task, None)?;
        }
        Ok(value)
    }

    fn unbatched_updates<A>(&self, f: impl FnOnce() -> A) -> A {
        let _scope = self.scoped(|mode| ExecutionMode {
            unbatching: true,
            ..mode
        });
        f()
    }

    fn sync_updates<A>(&self, f: impl FnOnce() -> A) -> Result<A> {
        let value = {
            let _scope = self.scoped(|mode| ExecutionMode {
                priority: Some(PriorityLevel::Synchronous),
                ..mode
            });
            f()
        };
        self.inner.perform_work(PriorityLevel::Task, None)?;
        Ok(value)
    }

    fn deferred_updates<A>(&self, f: impl FnOnce() -> A) -> A {
        let _scope = self.scoped(|mode| ExecutionMode {
            priority: Some(PriorityLevel::Low),
            ..mode
        });
        f()
    }

    fn get_public_root_instance(&self, root: RootId) -> Option<H::PublicInstance> {
        let node = {
            let roots = self.inner.roots.borrow();
            roots.get(&root)?.current.first()?.host_node()
        };
        Some(self.inner.host.get_public_instance(&node))
    }

    fn find_host_instance(&self, handle: InstanceHandle) -> Option<Self::HostNode> {
        self.inner.handles.borrow().get(&handle).cloned()
    }
}
