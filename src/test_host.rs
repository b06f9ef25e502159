//! Recording host adapter used by the crate's tests.
//!
//! Every contract call that matters for ordering is appended to a log as a
//! short line (`"create_instance box#1 depth=0"`), so tests can compare the
//! whole conversation between engine and host. Scheduling hooks queue their
//! callbacks until the test runs them.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use crate::error::HostError;
use crate::host::{AnimationCallback, DeferredCallback, HostConfig, TimeBudget};
use crate::types::{CallbackId, Element, HostNode, HostParent, InstanceHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TestNode {
    pub(crate) id: u32,
    pub(crate) kind: &'static str,
}

impl fmt::Display for TestNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TestText {
    pub(crate) id: u32,
}

impl fmt::Display for TestText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "text#{}", self.id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TestProps {
    pub(crate) value: i32,
    pub(crate) text: Option<&'static str>,
    /// Request `commit_mount`.
    pub(crate) mount: bool,
}

impl TestProps {
    pub(crate) fn value(value: i32) -> Self {
        Self {
            value,
            ..Default::default()
        }
    }

    pub(crate) fn text(text: &'static str) -> Self {
        Self {
            text: Some(text),
            ..Default::default()
        }
    }

    pub(crate) fn mounting() -> Self {
        Self {
            mount: true,
            ..Default::default()
        }
    }
}

pub(crate) type TestElement = Element<&'static str, TestProps>;

pub(crate) fn el(kind: &'static str, children: Vec<TestElement>) -> TestElement {
    Element::host(kind, TestProps::default(), children)
}

pub(crate) fn keyed(key: &str, kind: &'static str, children: Vec<TestElement>) -> TestElement {
    Element::keyed(key, kind, TestProps::default(), children)
}

pub(crate) fn node_name(node: &HostNode<TestNode, TestText>) -> String {
    match node {
        HostNode::Instance(instance) => instance.to_string(),
        HostNode::Text(text) => text.to_string(),
    }
}

fn parent_name(parent: HostParent<'_, TestNode, &'static str>) -> String {
    match parent {
        HostParent::Instance(instance) => instance.to_string(),
        HostParent::Container(container) => format!("container:{container}"),
    }
}

pub(crate) struct RecordingHost {
    log: RefCell<Vec<String>>,
    next_id: Cell<u32>,
    next_callback: Cell<u64>,
    sync: bool,
    fail_operation: Cell<Option<&'static str>>,
    animation: RefCell<VecDeque<AnimationCallback>>,
    deferred: RefCell<VecDeque<DeferredCallback>>,
}

impl RecordingHost {
    pub(crate) fn new() -> Self {
        Self::with_sync_scheduling(true)
    }

    pub(crate) fn with_sync_scheduling(sync: bool) -> Self {
        Self {
            log: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            next_callback: Cell::new(1),
            sync,
            fail_operation: Cell::new(None),
            animation: RefCell::new(VecDeque::new()),
            deferred: RefCell::new(VecDeque::new()),
        }
    }

    /// Drain the log.
    pub(crate) fn take_log(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.borrow_mut())
    }

    /// Lines of the log starting with `prefix`, without draining.
    pub(crate) fn calls(&self, prefix: &str) -> Vec<String> {
        self.log
            .borrow()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Make the named operation fail from now on.
    pub(crate) fn fail_on(&self, operation: &'static str) {
        self.fail_operation.set(Some(operation));
    }

    pub(crate) fn pending_deferred(&self) -> usize {
        self.deferred.borrow().len()
    }

    pub(crate) fn pending_animation(&self) -> usize {
        self.animation.borrow().len()
    }

    /// Run the idle callbacks queued so far, each with a fresh `budget`.
    ///
    /// Callbacks scheduled while these run stay queued for the next call.
    pub(crate) fn run_deferred(&self, budget: Duration) -> usize {
        let queued: Vec<_> = self.deferred.borrow_mut().drain(..).collect();
        let ran = queued.len();
        for callback in queued {
            callback(&TimeBudget::new(budget));
        }
        ran
    }

    /// Run the animation callbacks queued so far.
    pub(crate) fn run_animation(&self) -> usize {
        let queued: Vec<_> = self.animation.borrow_mut().drain(..).collect();
        let ran = queued.len();
        for callback in queued {
            callback();
        }
        ran
    }

    fn record(&self, line: String) {
        self.log.borrow_mut().push(line);
    }

    fn check(&self, operation: &'static str) -> Result<(), HostError> {
        if self.fail_operation.get() == Some(operation) {
            return Err(HostError::backend(format!("{operation} failed")));
        }
        Ok(())
    }

    fn next_id(&self) -> u32 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    fn next_callback(&self) -> CallbackId {
        let id = self.next_callback.get();
        self.next_callback.set(id + 1);
        CallbackId(id)
    }
}

impl HostConfig for RecordingHost {
    type Type = &'static str;
    type Props = TestProps;
    type Instance = TestNode;
    type TextInstance = TestText;
    type PublicInstance = String;
    type Container = &'static str;
    type HostContext = usize;
    type UpdatePayload = Vec<String>;

    fn get_root_host_context(&self, _container: &&'static str) -> usize {
        0
    }

    fn get_child_host_context(&self, parent: &usize, _kind: &&'static str) -> usize {
        parent + 1
    }

    fn get_public_instance(&self, node: &HostNode<TestNode, TestText>) -> String {
        node_name(node)
    }

    fn should_set_text_content(&self, props: &TestProps) -> bool {
        props.text.is_some()
    }

    fn create_instance(
        &self,
        kind: &&'static str,
        _props: &TestProps,
        _container: &&'static str,
        context: &usize,
        _handle: InstanceHandle,
    ) -> Result<TestNode, HostError> {
        self.check("create_instance")?;
        let node = TestNode {
            id: self.next_id(),
            kind: *kind,
        };
        self.record(format!("create_instance {node} depth={context}"));
        Ok(node)
    }

    fn append_initial_child(
        &self,
        parent: &TestNode,
        child: &HostNode<TestNode, TestText>,
    ) -> Result<(), HostError> {
        self.record(format!("append_initial_child {parent} <- {}", node_name(child)));
        Ok(())
    }

    fn finalize_initial_children(
        &self,
        _instance: &TestNode,
        _kind: &&'static str,
        props: &TestProps,
        _container: &&'static str,
    ) -> Result<bool, HostError> {
        Ok(props.mount)
    }

    fn prepare_update(
        &self,
        _instance: &TestNode,
        _kind: &&'static str,
        old_props: &TestProps,
        new_props: &TestProps,
        _container: &&'static str,
        _context: &usize,
    ) -> Result<Option<Vec<String>>, HostError> {
        let mut changes = Vec::new();
        if old_props.value != new_props.value {
            changes.push(format!("value {}->{}", old_props.value, new_props.value));
        }
        if old_props.text != new_props.text {
            changes.push(format!("text {:?}->{:?}", old_props.text, new_props.text));
        }
        Ok((!changes.is_empty()).then_some(changes))
    }

    fn commit_update(
        &self,
        instance: &TestNode,
        payload: Vec<String>,
        _kind: &&'static str,
        _old_props: &TestProps,
        _new_props: &TestProps,
        _handle: InstanceHandle,
    ) -> Result<(), HostError> {
        self.check("commit_update")?;
        self.record(format!("commit_update {instance} {}", payload.join(", ")));
        Ok(())
    }

    fn commit_mount(
        &self,
        instance: &TestNode,
        _kind: &&'static str,
        _props: &TestProps,
        _handle: InstanceHandle,
    ) -> Result<(), HostError> {
        self.record(format!("commit_mount {instance}"));
        Ok(())
    }

    fn reset_text_content(&self, instance: &TestNode) -> Result<(), HostError> {
        self.record(format!("reset_text_content {instance}"));
        Ok(())
    }

    fn create_text_instance(
        &self,
        text: &str,
        _container: &&'static str,
        _context: &usize,
        _handle: InstanceHandle,
    ) -> Result<TestText, HostError> {
        let node = TestText { id: self.next_id() };
        self.record(format!("create_text_instance {node} {text:?}"));
        Ok(node)
    }

    fn commit_text_update(
        &self,
        text_instance: &TestText,
        old_text: &str,
        new_text: &str,
    ) -> Result<(), HostError> {
        self.record(format!("commit_text_update {text_instance} {old_text:?} -> {new_text:?}"));
        Ok(())
    }

    fn append_child(
        &self,
        parent: HostParent<'_, TestNode, &'static str>,
        child: &HostNode<TestNode, TestText>,
    ) -> Result<(), HostError> {
        self.check("append_child")?;
        self.record(format!("append_child {} <- {}", parent_name(parent), node_name(child)));
        Ok(())
    }

    fn insert_before(
        &self,
        parent: HostParent<'_, TestNode, &'static str>,
        child: &HostNode<TestNode, TestText>,
        before: &HostNode<TestNode, TestText>,
    ) -> Result<(), HostError> {
        self.record(format!(
            "insert_before {} <- {} before {}",
            parent_name(parent),
            node_name(child),
            node_name(before)
        ));
        Ok(())
    }

    fn remove_child(
        &self,
        parent: HostParent<'_, TestNode, &'static str>,
        child: &HostNode<TestNode, TestText>,
    ) -> Result<(), HostError> {
        self.record(format!("remove_child {} -/- {}", parent_name(parent), node_name(child)));
        Ok(())
    }

    fn schedule_animation_callback(&self, callback: AnimationCallback) -> Option<CallbackId> {
        self.record("schedule_animation_callback".to_string());
        self.animation.borrow_mut().push_back(callback);
        Some(self.next_callback())
    }

    fn schedule_deferred_callback(&self, callback: DeferredCallback) -> Option<CallbackId> {
        self.record("schedule_deferred_callback".to_string());
        self.deferred.borrow_mut().push_back(callback);
        Some(self.next_callback())
    }

    fn prepare_for_commit(&self) {
        self.record("prepare_for_commit".to_string());
    }

    fn reset_after_commit(&self) {
        self.record("reset_after_commit".to_string());
    }

    fn use_sync_scheduling(&self) -> bool {
        self.sync
    }
}
