//! Commit phase - replay recorded effects against the host.
//!
//! Effects are applied in a fixed order inside one
//! `prepare_for_commit`/`reset_after_commit` bracket:
//!
//! ```text
//! deletions → text resets → updates → placements → mounts
//! ```
//!
//! Deletions come first so placement anchors are never nodes that are about
//! to disappear. Mounts come last so every `commit_mount` sees its subtree
//! attached.

use crate::error::HostError;
use crate::host::HostConfig;
use crate::types::{HostNode, HostParent, InstanceHandle};

/// Backend node reference as stored by the engine.
pub(crate) type NodeOf<H> =
    HostNode<<H as HostConfig>::Instance, <H as HostConfig>::TextInstance>;

// =============================================================================
// Effects
// =============================================================================

/// Parent of a structural effect, resolved against the root container at commit.
#[derive(Debug, Clone)]
pub(crate) enum ParentRef<I> {
    Container,
    Instance(I),
}

impl<I> ParentRef<I> {
    fn resolve<'a, C>(&'a self, container: &'a C) -> HostParent<'a, I, C> {
        match self {
            Self::Container => HostParent::Container(container),
            Self::Instance(instance) => HostParent::Instance(instance),
        }
    }
}

pub(crate) struct Deletion<H: HostConfig> {
    pub(crate) parent: ParentRef<H::Instance>,
    pub(crate) node: NodeOf<H>,
}

pub(crate) enum UpdateEffect<H: HostConfig> {
    Props {
        instance: H::Instance,
        payload: H::UpdatePayload,
        kind: H::Type,
        old_props: H::Props,
        new_props: H::Props,
        handle: InstanceHandle,
    },
    Text {
        instance: H::TextInstance,
        old_text: String,
        new_text: String,
    },
}

pub(crate) struct Placement<H: HostConfig> {
    pub(crate) parent: ParentRef<H::Instance>,
    pub(crate) node: NodeOf<H>,
    /// Next sibling that stays in place, if any.
    pub(crate) before: Option<NodeOf<H>>,
}

pub(crate) struct MountEffect<H: HostConfig> {
    pub(crate) instance: H::Instance,
    pub(crate) kind: H::Type,
    pub(crate) props: H::Props,
    pub(crate) handle: InstanceHandle,
}

/// Host mutations computed by one render pass.
pub(crate) struct EffectList<H: HostConfig> {
    pub(crate) deletions: Vec<Deletion<H>>,
    pub(crate) text_resets: Vec<H::Instance>,
    pub(crate) updates: Vec<UpdateEffect<H>>,
    pub(crate) placements: Vec<Placement<H>>,
    pub(crate) mounts: Vec<MountEffect<H>>,
}

impl<H: HostConfig> Default for EffectList<H> {
    fn default() -> Self {
        Self {
            deletions: Vec::new(),
            text_resets: Vec::new(),
            updates: Vec::new(),
            placements: Vec::new(),
            mounts: Vec::new(),
        }
    }
}

impl<H: HostConfig> EffectList<H> {
    pub(crate) fn len(&self) -> usize {
        self.deletions.len()
            + self.text_resets.len()
            + self.updates.len()
            + self.placements.len()
            + self.mounts.len()
    }
}

// =============================================================================
// Commit
// =============================================================================

/// Calls `reset_after_commit` when dropped, so a failing or panicking commit
/// still closes the bracket it opened.
struct CommitBracket<'a, H: HostConfig> {
    host: &'a H,
}

impl<'a, H: HostConfig> CommitBracket<'a, H> {
    fn open(host: &'a H) -> Self {
        host.prepare_for_commit();
        Self { host }
    }
}

impl<H: HostConfig> Drop for CommitBracket<'_, H> {
    fn drop(&mut self) {
        self.host.reset_after_commit();
    }
}

/// Apply `effects` to the tree mounted in `container`.
///
/// Stops at the first failing host operation. Mutations already applied stay
/// applied.
pub(crate) fn commit_effects<H: HostConfig>(
    host: &H,
    container: &H::Container,
    effects: EffectList<H>,
) -> Result<(), HostError> {
    let _bracket = CommitBracket::open(host);

    for Deletion { parent, node } in effects.deletions {
        host.remove_child(parent.resolve(container), &node)?;
    }

    for instance in effects.text_resets {
        host.reset_text_content(&instance)?;
    }

    for update in effects.updates {
        match update {
            UpdateEffect::Props {
                instance,
                payload,
                kind,
                old_props,
                new_props,
                handle,
            } => host.commit_update(&instance, payload, &kind, &old_props, &new_props, handle)?,
            UpdateEffect::Text {
                instance,
                old_text,
                new_text,
            } => host.commit_text_update(&instance, &old_text, &new_text)?,
        }
    }

    for Placement {
        parent,
        node,
        before,
    } in effects.placements
    {
        let parent = parent.resolve(container);
        match before {
            Some(before) => host.insert_before(parent, &node, &before)?,
            None => host.append_child(parent, &node)?,
        }
    }

    for MountEffect {
        instance,
        kind,
        props,
        handle,
    } in effects.mounts
    {
        host.commit_mount(&instance, &kind, &props, handle)?;
    }

    Ok(())
}
