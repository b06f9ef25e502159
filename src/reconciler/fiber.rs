//! Render phase - diff an element tree against the committed fiber tree.
//!
//! A [`RenderPass`] walks the new elements next to the committed fibers and
//! produces the next fiber tree plus the [`EffectList`] that makes the host
//! tree match it. Nothing attached is mutated here: new subtrees are built
//! detached (`create_instance` + `append_initial_child`), reused nodes only go
//! through the pure `prepare_update`.
//!
//! # Matching
//!
//! Children are matched by explicit key, else by position. A match is reused
//! when it is the same kind of node with the same type tag. Reused children
//! keep their place unless they now come after a child that used to follow
//! them (last-placed-index rule); new and moved children become placements
//! anchored on the next sibling that stays put.

use std::cell::Cell;
use std::collections::HashMap;

use super::commit::{
    Deletion, EffectList, MountEffect, NodeOf, ParentRef, Placement, UpdateEffect,
};
use crate::error::HostError;
use crate::host::HostConfig;
use crate::types::{Element, HostElement, HostNode, InstanceHandle};

// =============================================================================
// Fiber
// =============================================================================

/// A committed node as the engine remembers it.
pub(crate) struct Fiber<H: HostConfig> {
    pub(crate) handle: InstanceHandle,
    pub(crate) key: Option<String>,
    pub(crate) node: FiberNode<H>,
    pub(crate) children: Vec<Fiber<H>>,
}

pub(crate) enum FiberNode<H: HostConfig> {
    Host {
        kind: H::Type,
        props: H::Props,
        instance: H::Instance,
        /// Props made the host own the children as text.
        text_content: bool,
    },
    Text {
        text: String,
        instance: H::TextInstance,
    },
}

impl<H: HostConfig> Fiber<H> {
    pub(crate) fn host_node(&self) -> NodeOf<H> {
        match &self.node {
            FiberNode::Host { instance, .. } => HostNode::Instance(instance.clone()),
            FiberNode::Text { instance, .. } => HostNode::Text(instance.clone()),
        }
    }

    fn same_type(&self, element: &Element<H::Type, H::Props>) -> bool {
        match (&self.node, element) {
            (FiberNode::Host { kind, .. }, Element::Host(host)) => *kind == host.kind,
            (FiberNode::Text { .. }, Element::Text(_)) => true,
            _ => false,
        }
    }

    pub(crate) fn collect_handles(&self, into: &mut Vec<InstanceHandle>) {
        into.push(self.handle);
        for child in &self.children {
            child.collect_handles(into);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SlotKey {
    Key(String),
    Index(usize),
}

impl SlotKey {
    fn new(key: Option<&str>, index: usize) -> Self {
        match key {
            Some(key) => Self::Key(key.to_string()),
            None => Self::Index(index),
        }
    }
}

// =============================================================================
// Render Pass
// =============================================================================

/// Result of rendering one root.
pub(crate) struct RenderOutput<H: HostConfig> {
    pub(crate) children: Vec<Fiber<H>>,
    pub(crate) effects: EffectList<H>,
    /// Nodes created by this pass, by handle.
    pub(crate) created: Vec<(InstanceHandle, NodeOf<H>)>,
    /// Handles of every node in deleted subtrees.
    pub(crate) removed: Vec<InstanceHandle>,
}

pub(crate) struct RenderPass<'a, H: HostConfig> {
    host: &'a H,
    container: &'a H::Container,
    next_handle: &'a Cell<u64>,
    effects: EffectList<H>,
    created: Vec<(InstanceHandle, NodeOf<H>)>,
    removed: Vec<InstanceHandle>,
}

impl<'a, H: HostConfig> RenderPass<'a, H> {
    pub(crate) fn new(host: &'a H, container: &'a H::Container, next_handle: &'a Cell<u64>) -> Self {
        Self {
            host,
            container,
            next_handle,
            effects: EffectList::default(),
            created: Vec::new(),
            removed: Vec::new(),
        }
    }

    /// Render `element` (or the empty tree) into the root's children.
    pub(crate) fn render_root(
        mut self,
        current: &[Fiber<H>],
        element: Option<Element<H::Type, H::Props>>,
    ) -> Result<RenderOutput<H>, HostError> {
        let context = self.host.get_root_host_context(self.container);
        let elements = element.into_iter().collect();
        let children = self.reconcile_children(&ParentRef::Container, current, elements, &context)?;
        Ok(RenderOutput {
            children,
            effects: self.effects,
            created: self.created,
            removed: self.removed,
        })
    }

    fn next_handle(&self) -> InstanceHandle {
        let id = self.next_handle.get();
        self.next_handle.set(id + 1);
        InstanceHandle(id)
    }

    fn reconcile_children(
        &mut self,
        parent: &ParentRef<H::Instance>,
        old: &[Fiber<H>],
        elements: Vec<Element<H::Type, H::Props>>,
        context: &H::HostContext,
    ) -> Result<Vec<Fiber<H>>, HostError> {
        let mut by_slot: HashMap<SlotKey, usize> = old
            .iter()
            .enumerate()
            .map(|(index, fiber)| (SlotKey::new(fiber.key.as_deref(), index), index))
            .collect();
        let mut reused = vec![false; old.len()];

        let mut next = Vec::with_capacity(elements.len());
        let mut placed = Vec::with_capacity(elements.len());
        let mut last_placed = 0;

        for (index, element) in elements.into_iter().enumerate() {
            let slot = SlotKey::new(element.key(), index);
            let matched = by_slot
                .remove(&slot)
                .filter(|&old_index| old[old_index].same_type(&element));

            match matched {
                Some(old_index) => {
                    reused[old_index] = true;
                    next.push(self.update_fiber(&old[old_index], element, context)?);
                    if old_index < last_placed {
                        placed.push(true);
                    } else {
                        last_placed = old_index;
                        placed.push(false);
                    }
                }
                None => {
                    next.push(self.create_fiber(element, context)?);
                    placed.push(true);
                }
            }
        }

        for (fiber, _) in old.iter().zip(&reused).filter(|(_, kept)| !**kept) {
            self.delete(parent, fiber);
        }

        for index in 0..next.len() {
            if !placed[index] {
                continue;
            }
            let before = next[index + 1..]
                .iter()
                .zip(&placed[index + 1..])
                .find(|(_, moved)| !**moved)
                .map(|(fiber, _)| fiber.host_node());
            self.effects.placements.push(Placement {
                parent: parent.clone(),
                node: next[index].host_node(),
                before,
            });
        }

        Ok(next)
    }

    fn delete(&mut self, parent: &ParentRef<H::Instance>, fiber: &Fiber<H>) {
        fiber.collect_handles(&mut self.removed);
        self.effects.deletions.push(Deletion {
            parent: parent.clone(),
            node: fiber.host_node(),
        });
    }

    /// Reuse `old` for `element`. Kinds are checked by the caller.
    fn update_fiber(
        &mut self,
        old: &Fiber<H>,
        element: Element<H::Type, H::Props>,
        context: &H::HostContext,
    ) -> Result<Fiber<H>, HostError> {
        match (&old.node, element) {
            (FiberNode::Text { text, instance }, Element::Text(new_text)) => {
                if *text != new_text {
                    self.effects.updates.push(UpdateEffect::Text {
                        instance: instance.clone(),
                        old_text: text.clone(),
                        new_text: new_text.clone(),
                    });
                }
                Ok(Fiber {
                    handle: old.handle,
                    key: None,
                    node: FiberNode::Text {
                        text: new_text,
                        instance: instance.clone(),
                    },
                    children: Vec::new(),
                })
            }
            (
                FiberNode::Host {
                    kind,
                    props,
                    instance,
                    text_content,
                },
                Element::Host(element),
            ) => {
                let payload = self.host.prepare_update(
                    instance,
                    kind,
                    props,
                    &element.props,
                    self.container,
                    context,
                )?;
                if let Some(payload) = payload {
                    self.effects.updates.push(UpdateEffect::Props {
                        instance: instance.clone(),
                        payload,
                        kind: kind.clone(),
                        old_props: props.clone(),
                        new_props: element.props.clone(),
                        handle: old.handle,
                    });
                }

                let sets_text = self.host.should_set_text_content(&element.props);
                let parent = ParentRef::Instance(instance.clone());
                let children = if sets_text {
                    for child in &old.children {
                        self.delete(&parent, child);
                    }
                    Vec::new()
                } else {
                    if *text_content {
                        self.effects.text_resets.push(instance.clone());
                    }
                    let child_context = self.host.get_child_host_context(context, kind);
                    self.reconcile_children(&parent, &old.children, element.children, &child_context)?
                };

                Ok(Fiber {
                    handle: old.handle,
                    key: element.key,
                    node: FiberNode::Host {
                        kind: element.kind,
                        props: element.props,
                        instance: instance.clone(),
                        text_content: sets_text,
                    },
                    children,
                })
            }
            (_, element) => self.create_fiber(element, context),
        }
    }

    /// Build a detached subtree for `element`.
    fn create_fiber(
        &mut self,
        element: Element<H::Type, H::Props>,
        context: &H::HostContext,
    ) -> Result<Fiber<H>, HostError> {
        let handle = self.next_handle();

        let fiber = match element {
            Element::Text(text) => {
                let instance = self
                    .host
                    .create_text_instance(&text, self.container, context, handle)?;
                Fiber {
                    handle,
                    key: None,
                    node: FiberNode::Text { text, instance },
                    children: Vec::new(),
                }
            }
            Element::Host(HostElement {
                kind,
                props,
                key,
                children,
            }) => {
                let instance =
                    self.host
                        .create_instance(&kind, &props, self.container, context, handle)?;

                let sets_text = self.host.should_set_text_content(&props);
                let mut built = Vec::new();
                if !sets_text {
                    let child_context = self.host.get_child_host_context(context, &kind);
                    built.reserve(children.len());
                    for child in children {
                        let child = self.create_fiber(child, &child_context)?;
                        self.host.append_initial_child(&instance, &child.host_node())?;
                        built.push(child);
                    }
                }

                if self
                    .host
                    .finalize_initial_children(&instance, &kind, &props, self.container)?
                {
                    self.effects.mounts.push(MountEffect {
                        instance: instance.clone(),
                        kind: kind.clone(),
                        props: props.clone(),
                        handle,
                    });
                }

                Fiber {
                    handle,
                    key,
                    node: FiberNode::Host {
                        kind,
                        props,
                        instance,
                        text_content: sets_text,
                    },
                    children: built,
                }
            }
        };

        self.created.push((handle, fiber.host_node()));
        Ok(fiber)
    }
}
