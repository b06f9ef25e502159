//! Core types for spark-fiber.
//!
//! These types cross the boundary between application code, the reconciler
//! and host adapters. None of them know anything about a concrete backend.

use std::fmt;

// =============================================================================
// Opaque Handles
// =============================================================================

/// Handle to one reconciliation root, returned by `create_container`.
///
/// Callers store it and hand it back; they never interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RootId(pub(crate) u32);

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root#{}", self.0)
    }
}

/// Correlation token identifying where in the tree an instance lives.
///
/// Issued by the reconciler when it asks a host to create a node, and passed
/// back on later calls for the same node. Hosts may store it but must not
/// derive meaning from its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceHandle(pub(crate) u64);

impl fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

/// Token a host returns when it accepts a scheduled callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(pub u64);

/// Completion callback passed to `update_container`/`render`.
pub type Callback = Box<dyn FnOnce()>;

// =============================================================================
// Element Tree
// =============================================================================

/// Immutable description of desired UI state.
///
/// `T` is the host's node type tag and `P` its props type. Elements are
/// values: the reconciler consumes them and keeps only what it needs to diff
/// the next update (type tag, props, text).
#[derive(Debug, Clone, PartialEq)]
pub enum Element<T, P> {
    /// A host node with children.
    Host(HostElement<T, P>),
    /// Leaf text content.
    Text(String),
}

/// A host node description.
#[derive(Debug, Clone, PartialEq)]
pub struct HostElement<T, P> {
    pub kind: T,
    pub props: P,
    /// Identity among siblings. Unkeyed children are matched by position.
    pub key: Option<String>,
    pub children: Vec<Element<T, P>>,
}

impl<T, P> Element<T, P> {
    /// Create a host element.
    pub fn host(kind: T, props: P, children: Vec<Element<T, P>>) -> Self {
        Self::Host(HostElement {
            kind,
            props,
            key: None,
            children,
        })
    }

    /// Create a keyed host element.
    pub fn keyed(key: impl Into<String>, kind: T, props: P, children: Vec<Element<T, P>>) -> Self {
        Self::Host(HostElement {
            kind,
            props,
            key: Some(key.into()),
            children,
        })
    }

    /// Create a text element.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Explicit key, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Host(host) => host.key.as_deref(),
            Self::Text(_) => None,
        }
    }
}

impl<T, P> From<HostElement<T, P>> for Element<T, P> {
    fn from(host: HostElement<T, P>) -> Self {
        Self::Host(host)
    }
}

// =============================================================================
// Host Node References
// =============================================================================

/// Either an instance or a text instance: the `I | TI` of the host contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostNode<I, TI> {
    Instance(I),
    Text(TI),
}

impl<I, TI> HostNode<I, TI> {
    /// The instance, if this is not a text node.
    pub fn as_instance(&self) -> Option<&I> {
        match self {
            Self::Instance(instance) => Some(instance),
            Self::Text(_) => None,
        }
    }

    /// The text instance, if this is a text node.
    pub fn as_text(&self) -> Option<&TI> {
        match self {
            Self::Instance(_) => None,
            Self::Text(text) => Some(text),
        }
    }
}

/// Parent of a structural mutation: an attached instance or the root container.
#[derive(Debug)]
pub enum HostParent<'a, I, C> {
    Instance(&'a I),
    Container(&'a C),
}

impl<I, C> Clone for HostParent<'_, I, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I, C> Copy for HostParent<'_, I, C> {}

// =============================================================================
// Tests
// =============================================================================
