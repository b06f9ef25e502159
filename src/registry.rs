//! Container Registry - the application-facing entry points.
//!
//! Maps each container to the reconciliation root created for it:
//! - `render` creates the root on first use and reuses it afterwards
//! - `unmount` tears the tree down, then forgets and destroys the root once
//!   that commits
//! - the scheduling facade and introspection calls forward to the engine
//!
//! The registry is an owned value generic over a [`Reconciler`], so tests and
//! embedders can swap the engine out.
//!
//! # Example
//!
//! ```ignore
//! use spark_fiber::{ContainerRegistry, FiberReconciler};
//!
//! let registry = ContainerRegistry::new(FiberReconciler::new(host));
//! registry.render(Some(app), screen.clone(), None)?;
//! registry.unmount(&screen)?;
//! ```

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::error::Result;
use crate::reconciler::scheduler::PriorityLevel;
use crate::reconciler::Reconciler;
use crate::types::{Callback, InstanceHandle, RootId};

// =============================================================================
// Registry State
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct RootEntry {
    root: RootId,
    /// Generation of the teardown waiting to commit, if any.
    teardown: Option<u64>,
}

type RootMap<C> = Rc<RefCell<HashMap<C, RootEntry>>>;

/// Container → root bookkeeping on top of a reconciler.
pub struct ContainerRegistry<R: Reconciler> {
    reconciler: Rc<R>,
    roots: RootMap<R::Container>,
    next_generation: Cell<u64>,
}

impl<R> ContainerRegistry<R>
where
    R: Reconciler + 'static,
    R::Container: 'static,
{
    /// Create an empty registry driving `reconciler`.
    pub fn new(reconciler: R) -> Self {
        Self {
            reconciler: Rc::new(reconciler),
            roots: Rc::new(RefCell::new(HashMap::new())),
            next_generation: Cell::new(0),
        }
    }

    /// The engine behind this registry.
    pub fn reconciler(&self) -> &R {
        &self.reconciler
    }

    // -------------------------------------------------------------------------
    // Render / Unmount
    // -------------------------------------------------------------------------

    /// Render `element` into `container`, creating its root on first use.
    ///
    /// `None` tears the container down like [`unmount`](Self::unmount); for a
    /// container without a root that is a no-op and `callback` never runs.
    /// A render reaching a container whose teardown has not committed yet
    /// cancels that teardown.
    pub fn render(
        &self,
        element: Option<R::Element>,
        container: R::Container,
        callback: Option<Callback>,
    ) -> Result<()> {
        let Some(element) = element else {
            return self.teardown(&container, callback).map(|_| ());
        };

        let existing = self.roots.borrow_mut().get_mut(&container).map(|entry| {
            if entry.teardown.take().is_some() {
                debug!(root = %entry.root, "pending teardown cancelled by render");
            }
            entry.root
        });

        let root = match existing {
            Some(root) => root,
            None => {
                let root = self.reconciler.create_container(container.clone());
                self.roots.borrow_mut().insert(
                    container,
                    RootEntry {
                        root,
                        teardown: None,
                    },
                );
                debug!(%root, "registered container");
                root
            }
        };

        self.reconciler.update_container(Some(element), root, callback)
    }

    /// Tear down the tree mounted in `container`.
    ///
    /// Returns `false`, without touching the engine, when the container has
    /// no root. Otherwise the entry is dropped and its root destroyed once the
    /// empty tree commits.
    pub fn unmount(&self, container: &R::Container) -> Result<bool> {
        self.teardown(container, None)
    }

    fn teardown(&self, container: &R::Container, callback: Option<Callback>) -> Result<bool> {
        let generation = self.next_generation.get();
        self.next_generation.set(generation + 1);

        let root = {
            let mut roots = self.roots.borrow_mut();
            let Some(entry) = roots.get_mut(container) else {
                trace!("teardown of unknown container ignored");
                return Ok(false);
            };
            entry.teardown = Some(generation);
            entry.root
        };

        let roots = Rc::downgrade(&self.roots);
        let reconciler = Rc::downgrade(&self.reconciler);
        let key = container.clone();
        let on_commit: Callback = Box::new(move || {
            let released = roots.upgrade().is_some_and(|roots| {
                let mut roots = roots.borrow_mut();
                let current = roots
                    .get(&key)
                    .is_some_and(|entry| entry.root == root && entry.teardown == Some(generation));
                if current {
                    roots.remove(&key);
                }
                current
            });
            if released {
                if let Some(reconciler) = reconciler.upgrade() {
                    reconciler.destroy_container(root);
                }
                debug!(%root, "container unmounted");
            }
            if let Some(callback) = callback {
                callback();
            }
        });

        self.reconciler.update_container(None, root, Some(on_commit))?;
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // Lookup
    // -------------------------------------------------------------------------

    /// Root currently recorded for `container`.
    pub fn root_for(&self, container: &R::Container) -> Option<RootId> {
        self.roots.borrow().get(container).map(|entry| entry.root)
    }

    /// Number of containers with a root.
    pub fn len(&self) -> usize {
        self.roots.borrow().len()
    }

    /// Whether no container has a root.
    pub fn is_empty(&self) -> bool {
        self.roots.borrow().is_empty()
    }

    /// Public instance of the top-level node mounted in `container`.
    pub fn get_public_root_instance(&self, container: &R::Container) -> Option<R::PublicInstance> {
        let root = self.root_for(container)?;
        self.reconciler.get_public_root_instance(root)
    }

    /// Backend node for `handle`, if it is still mounted.
    pub fn find_host_instance(&self, handle: InstanceHandle) -> Option<R::HostNode> {
        self.reconciler.find_host_instance(handle)
    }

    // -------------------------------------------------------------------------
    // Scheduling Facade
    // -------------------------------------------------------------------------

    /// Run `f` with updates scheduled at `level`.
    pub fn perform_with_priority<A>(&self, level: PriorityLevel, f: impl FnOnce() -> A) -> A {
        self.reconciler.perform_with_priority(level, f)
    }

    /// Coalesce updates made inside `f` into one commit per root.
    pub fn batched_updates<A>(&self, f: impl FnOnce() -> A) -> Result<A> {
        self.reconciler.batched_updates(f)
    }

    /// Commit updates made inside `f` one at a time, even inside a batch.
    pub fn unbatched_updates<A>(&self, f: impl FnOnce() -> A) -> A {
        self.reconciler.unbatched_updates(f)
    }

    /// Commit updates made inside `f` before returning.
    pub fn sync_updates<A>(&self, f: impl FnOnce() -> A) -> Result<A> {
        self.reconciler.sync_updates(f)
    }

    /// Let updates made inside `f` commit from the host's idle callback.
    pub fn deferred_updates<A>(&self, f: impl FnOnce() -> A) -> A {
        self.reconciler.deferred_updates(f)
    }
}
