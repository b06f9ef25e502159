//! [`HostConfig`] implementation for the terminal view tree.
//!
//! Backend rules:
//! - a `Box` cannot be created inside a `Text` view
//! - text leaves only exist inside a `Text` view
//! - `focusable` views take focus when they are mounted
//!
//! Scheduled callbacks are queued and run by [`TerminalHost::tick`], which the
//! application calls from its event loop whenever input polling times out.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, trace};

use super::view::{
    Screen, TextNode, ViewChild, ViewContext, ViewKind, ViewNode, ViewPatch, ViewProps,
};
use crate::error::HostError;
use crate::host::{AnimationCallback, DeferredCallback, HostConfig, TimeBudget};
use crate::types::{CallbackId, HostNode, HostParent, InstanceHandle};

/// Terminal backend for the reconciler.
pub struct TerminalHost {
    sync: bool,
    /// Screen of the root being rendered or committed.
    active: RefCell<Option<Screen>>,
    focused: RefCell<Option<ViewNode>>,
    animation: RefCell<VecDeque<AnimationCallback>>,
    deferred: RefCell<VecDeque<DeferredCallback>>,
    next_callback: Cell<u64>,
}

impl Default for TerminalHost {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalHost {
    /// Host whose unprioritized updates commit synchronously.
    pub fn new() -> Self {
        Self {
            sync: true,
            active: RefCell::new(None),
            focused: RefCell::new(None),
            animation: RefCell::new(VecDeque::new()),
            deferred: RefCell::new(VecDeque::new()),
            next_callback: Cell::new(1),
        }
    }

    /// Choose whether unprioritized updates commit synchronously or from
    /// [`tick`](Self::tick).
    pub fn with_sync_scheduling(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// The view holding focus, if any.
    pub fn focused(&self) -> Option<ViewNode> {
        self.focused.borrow().clone()
    }

    /// Callbacks waiting for the next tick.
    pub fn pending_callbacks(&self) -> usize {
        self.animation.borrow().len() + self.deferred.borrow().len()
    }

    /// Run the callbacks queued so far: animation frames first, then idle
    /// work with `budget` to spend.
    ///
    /// Callbacks scheduled while these run wait for the next tick. Returns
    /// how many ran.
    pub fn tick(&self, budget: Duration) -> usize {
        let frames: Vec<_> = self.animation.borrow_mut().drain(..).collect();
        let idle: Vec<_> = self.deferred.borrow_mut().drain(..).collect();
        let ran = frames.len() + idle.len();

        for callback in frames {
            callback();
        }
        let deadline = TimeBudget::new(budget);
        for callback in idle {
            callback(&deadline);
        }

        if ran > 0 {
            trace!(ran, "tick ran scheduled callbacks");
        }
        ran
    }

    fn next_callback(&self) -> CallbackId {
        let id = self.next_callback.get();
        self.next_callback.set(id + 1);
        CallbackId(id)
    }

    fn with_children<T>(
        parent: HostParent<'_, ViewNode, Screen>,
        f: impl FnOnce(&mut Vec<ViewChild>) -> T,
    ) -> T {
        match parent {
            HostParent::Instance(node) => f(&mut *node.children_mut()),
            HostParent::Container(screen) => f(&mut *screen.children_mut()),
        }
    }

    fn drop_focus_within(&self, removed: &ViewChild) {
        let HostNode::Instance(removed) = removed else {
            return;
        };
        let mut focused = self.focused.borrow_mut();
        if focused.as_ref().is_some_and(|node| removed.contains(node)) {
            debug!(handle = %removed.handle(), "focused view removed");
            *focused = None;
        }
    }
}

impl HostConfig for TerminalHost {
    type Type = ViewKind;
    type Props = ViewProps;
    type Instance = ViewNode;
    type TextInstance = TextNode;
    type PublicInstance = ViewChild;
    type Container = Screen;
    type HostContext = ViewContext;
    type UpdatePayload = ViewPatch;

    fn get_root_host_context(&self, screen: &Screen) -> ViewContext {
        self.active.replace(Some(screen.clone()));
        ViewContext::default()
    }

    fn get_child_host_context(&self, parent: &ViewContext, kind: &ViewKind) -> ViewContext {
        ViewContext {
            inside_text: parent.inside_text || *kind == ViewKind::Text,
        }
    }

    fn get_public_instance(&self, node: &ViewChild) -> ViewChild {
        node.clone()
    }

    fn should_set_text_content(&self, props: &ViewProps) -> bool {
        props.text.is_some()
    }

    fn create_instance(
        &self,
        kind: &ViewKind,
        props: &ViewProps,
        _screen: &Screen,
        context: &ViewContext,
        handle: InstanceHandle,
    ) -> Result<ViewNode, HostError> {
        if *kind == ViewKind::Box && context.inside_text {
            return Err(HostError::backend("a box cannot be nested inside a text view"));
        }
        Ok(ViewNode::new(*kind, props.clone(), handle))
    }

    fn append_initial_child(&self, parent: &ViewNode, child: &ViewChild) -> Result<(), HostError> {
        parent.children_mut().push(child.clone());
        Ok(())
    }

    fn finalize_initial_children(
        &self,
        _instance: &ViewNode,
        _kind: &ViewKind,
        props: &ViewProps,
        _screen: &Screen,
    ) -> Result<bool, HostError> {
        Ok(props.focusable)
    }

    fn prepare_update(
        &self,
        _instance: &ViewNode,
        _kind: &ViewKind,
        old_props: &ViewProps,
        new_props: &ViewProps,
        _screen: &Screen,
        _context: &ViewContext,
    ) -> Result<Option<ViewPatch>, HostError> {
        Ok(ViewPatch::diff(old_props, new_props))
    }

    fn commit_update(
        &self,
        instance: &ViewNode,
        patch: ViewPatch,
        _kind: &ViewKind,
        _old_props: &ViewProps,
        _new_props: &ViewProps,
        handle: InstanceHandle,
    ) -> Result<(), HostError> {
        trace!(%handle, ?patch, "commit update");
        instance.update_props(|props| patch.apply(props));
        Ok(())
    }

    fn commit_mount(
        &self,
        instance: &ViewNode,
        _kind: &ViewKind,
        _props: &ViewProps,
        handle: InstanceHandle,
    ) -> Result<(), HostError> {
        debug!(%handle, "focus moved");
        self.focused.replace(Some(instance.clone()));
        Ok(())
    }

    fn reset_text_content(&self, instance: &ViewNode) -> Result<(), HostError> {
        instance.update_props(|props| props.text = None);
        Ok(())
    }

    fn create_text_instance(
        &self,
        text: &str,
        _screen: &Screen,
        context: &ViewContext,
        _handle: InstanceHandle,
    ) -> Result<TextNode, HostError> {
        if !context.inside_text {
            return Err(HostError::backend(format!(
                "text {text:?} must be rendered inside a text view"
            )));
        }
        Ok(TextNode::new(text))
    }

    fn commit_text_update(
        &self,
        text_instance: &TextNode,
        _old_text: &str,
        new_text: &str,
    ) -> Result<(), HostError> {
        text_instance.set_text(new_text);
        Ok(())
    }

    fn append_child(
        &self,
        parent: HostParent<'_, ViewNode, Screen>,
        child: &ViewChild,
    ) -> Result<(), HostError> {
        Self::with_children(parent, |children| {
            children.retain(|existing| existing != child);
            children.push(child.clone());
        });
        Ok(())
    }

    fn insert_before(
        &self,
        parent: HostParent<'_, ViewNode, Screen>,
        child: &ViewChild,
        before: &ViewChild,
    ) -> Result<(), HostError> {
        Self::with_children(parent, |children| {
            children.retain(|existing| existing != child);
            let index = children
                .iter()
                .position(|existing| existing == before)
                .ok_or_else(|| {
                    HostError::contract("insert_before", "anchor is not a child of the parent")
                })?;
            children.insert(index, child.clone());
            Ok(())
        })
    }

    fn remove_child(
        &self,
        parent: HostParent<'_, ViewNode, Screen>,
        child: &ViewChild,
    ) -> Result<(), HostError> {
        let removed: Result<ViewChild, HostError> = Self::with_children(parent, |children| {
            let index = children
                .iter()
                .position(|existing| existing == child)
                .ok_or_else(|| {
                    HostError::contract("remove_child", "node is not a child of the parent")
                })?;
            Ok(children.remove(index))
        });
        self.drop_focus_within(&removed?);
        Ok(())
    }

    fn schedule_animation_callback(&self, callback: AnimationCallback) -> Option<CallbackId> {
        self.animation.borrow_mut().push_back(callback);
        Some(self.next_callback())
    }

    fn schedule_deferred_callback(&self, callback: DeferredCallback) -> Option<CallbackId> {
        self.deferred.borrow_mut().push_back(callback);
        Some(self.next_callback())
    }

    fn prepare_for_commit(&self) {
        if let Some(screen) = self.active.borrow().as_ref() {
            screen.set_committing(true);
        }
    }

    fn reset_after_commit(&self) {
        if let Some(screen) = self.active.borrow().as_ref() {
            screen.set_committing(false);
        }
    }

    fn use_sync_scheduling(&self) -> bool {
        self.sync
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ReconcilerError;
    use crate::reconciler::FiberReconciler;
    use crate::registry::ContainerRegistry;
    use crate::terminal::view::{Attr, BorderStyle, ViewElement};
    use crate::types::Element;

    fn text_view(children: Vec<ViewElement>) -> ViewElement {
        Element::host(ViewKind::Text, ViewProps::default(), children)
    }

    fn boxed(props: ViewProps, children: Vec<ViewElement>) -> ViewElement {
        Element::host(ViewKind::Box, props, children)
    }

    fn registry() -> ContainerRegistry<FiberReconciler<TerminalHost>> {
        ContainerRegistry::new(FiberReconciler::new(TerminalHost::new()))
    }

    fn texts(screen: &Screen) -> Vec<String> {
        screen.lines().into_iter().map(|line| line.text).collect()
    }

    #[test]
    fn test_render_lays_out_screen() {
        let registry = registry();
        let screen = Screen::new("main", 9);

        registry
            .render(
                Some(boxed(
                    ViewProps {
                        border: BorderStyle::Rounded,
                        ..Default::default()
                    },
                    vec![text_view(vec![Element::text("hello")])],
                )),
                screen.clone(),
                None,
            )
            .unwrap();

        assert_eq!(texts(&screen), vec!["╭───────╮", "│hello  │", "╰───────╯"]);
        assert!(screen.is_dirty());
        assert!(!screen.is_committing());
    }

    #[test]
    fn test_text_updates_in_place() {
        let registry = registry();
        let screen = Screen::new("main", 20);
        let view = |count: u32| text_view(vec![Element::text("count: "), Element::text(count.to_string())]);

        registry.render(Some(view(1)), screen.clone(), None).unwrap();
        let before = screen.children();
        registry.render(Some(view(2)), screen.clone(), None).unwrap();

        assert_eq!(texts(&screen), vec!["count: 2"]);
        assert_eq!(screen.children(), before);
    }

    #[test]
    fn test_box_inside_text_is_rejected() {
        let registry = registry();
        let screen = Screen::new("main", 20);

        let err = registry
            .render(Some(text_view(vec![boxed(ViewProps::default(), vec![])])), screen.clone(), None)
            .unwrap_err();

        assert!(matches!(err, ReconcilerError::Host(HostError::Backend(_))));
        assert!(screen.children().is_empty());
    }

    #[test]
    fn test_text_outside_text_view_is_rejected() {
        let registry = registry();
        let screen = Screen::new("main", 20);

        let result = registry.render(
            Some(boxed(ViewProps::default(), vec![Element::text("loose")])),
            screen.clone(),
            None,
        );

        assert!(result.is_err());
        assert!(screen.lines().is_empty());
    }

    #[test]
    fn test_focusable_view_takes_focus_once_mounted() {
        let registry = registry();
        let screen = Screen::new("main", 20);
        let input = ViewProps {
            focusable: true,
            id: Some("input".into()),
            ..Default::default()
        };

        registry
            .render(
                Some(boxed(ViewProps::default(), vec![boxed(input.clone(), vec![])])),
                screen.clone(),
                None,
            )
            .unwrap();

        let host = registry.reconciler().host();
        let focused = host.focused().unwrap();
        assert_eq!(focused.props().id.as_deref(), Some("input"));

        registry.unmount(&screen).unwrap();
        assert_eq!(host.focused(), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_keyed_reorder_moves_views() {
        let registry = registry();
        let screen = Screen::new("main", 20);
        let row = |key: &str| {
            Element::keyed(
                key,
                ViewKind::Text,
                ViewProps {
                    text: Some(key.to_string()),
                    ..Default::default()
                },
                vec![],
            )
        };

        registry
            .render(Some(boxed(ViewProps::default(), vec![row("a"), row("b"), row("c")])), screen.clone(), None)
            .unwrap();
        registry
            .render(Some(boxed(ViewProps::default(), vec![row("c"), row("a"), row("b")])), screen.clone(), None)
            .unwrap();

        assert_eq!(texts(&screen), vec!["c", "a", "b"]);

        registry
            .render(Some(boxed(ViewProps::default(), vec![row("c"), row("x"), row("b")])), screen.clone(), None)
            .unwrap();
        assert_eq!(texts(&screen), vec!["c", "x", "b"]);
    }

    #[test]
    fn test_prop_patch_changes_attr() {
        let registry = registry();
        let screen = Screen::new("main", 20);
        let label = |attr| {
            Element::host(
                ViewKind::Text,
                ViewProps {
                    text: Some("label".into()),
                    attr,
                    ..Default::default()
                },
                vec![],
            )
        };

        registry.render(Some(label(Attr::NONE)), screen.clone(), None).unwrap();
        registry.render(Some(label(Attr::BOLD)), screen.clone(), None).unwrap();

        assert_eq!(screen.lines()[0].attr, Attr::BOLD);
    }

    #[test]
    fn test_deferred_host_commits_on_tick() {
        let reconciler = FiberReconciler::new(TerminalHost::new().with_sync_scheduling(false));
        let registry = ContainerRegistry::new(reconciler);
        let screen = Screen::new("main", 20);

        registry
            .render(Some(text_view(vec![Element::text("later")])), screen.clone(), None)
            .unwrap();
        assert!(screen.lines().is_empty());
        assert_eq!(registry.reconciler().host().pending_callbacks(), 1);

        assert_eq!(registry.reconciler().host().tick(Duration::from_millis(16)), 1);

        assert_eq!(texts(&screen), vec!["later"]);
        assert_eq!(registry.reconciler().host().pending_callbacks(), 0);
    }

    #[test]
    fn test_animation_priority_commits_on_tick() {
        let registry = registry();
        let screen = Screen::new("main", 20);

        registry.perform_with_priority(crate::PriorityLevel::Animation, || {
            registry
                .render(Some(text_view(vec![Element::text("frame")])), screen.clone(), None)
                .unwrap();
        });
        assert!(screen.lines().is_empty());

        registry.reconciler().host().tick(Duration::ZERO);
        assert_eq!(texts(&screen), vec!["frame"]);
    }

    #[test]
    fn test_public_root_instance_is_top_view() {
        let registry = registry();
        let screen = Screen::new("main", 20);

        registry
            .render(Some(boxed(ViewProps::default(), vec![])), screen.clone(), None)
            .unwrap();

        let top = registry.get_public_root_instance(&screen).unwrap();
        assert_eq!(top.as_instance().map(ViewNode::kind), Some(ViewKind::Box));
        assert_eq!(screen.children(), vec![top]);
    }
}
