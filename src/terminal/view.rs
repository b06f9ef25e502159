//! View tree types of the terminal host.
//!
//! Nodes are shared handles (`Rc`) compared by identity: two `ViewNode`s are
//! equal only when they are the same node, which is what the reconciler needs
//! when it hands a node back for `insert_before` or `remove_child`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::layout::{self, Line};
use crate::types::{Element, HostNode, InstanceHandle};

// =============================================================================
// Style
// =============================================================================

bitflags::bitflags! {
    /// Text attributes of a view.
    ///
    /// Combine with bitwise OR: `Attr::BOLD | Attr::UNDERLINE`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Attr: u8 {
        const NONE = 0;
        const BOLD = 1 << 0;
        const DIM = 1 << 1;
        const ITALIC = 1 << 2;
        const UNDERLINE = 1 << 3;
        const BLINK = 1 << 4;
        const INVERSE = 1 << 5;
        const HIDDEN = 1 << 6;
        const STRIKETHROUGH = 1 << 7;
    }
}

/// Border drawn around a box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BorderStyle {
    #[default]
    None,
    /// ─ │ ┌ ┐ └ ┘
    Single,
    /// ═ ║ ╔ ╗ ╚ ╝
    Double,
    /// ─ │ ╭ ╮ ╰ ╯
    Rounded,
    /// ━ ┃ ┏ ┓ ┗ ┛
    Bold,
    /// - | + + + +
    Ascii,
}

/// Characters of one border style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BorderChars {
    pub horizontal: &'static str,
    pub vertical: &'static str,
    pub top_left: &'static str,
    pub top_right: &'static str,
    pub bottom_right: &'static str,
    pub bottom_left: &'static str,
}

impl BorderStyle {
    /// Box-drawing characters, or `None` for a borderless box.
    pub const fn chars(&self) -> Option<BorderChars> {
        let (horizontal, vertical, top_left, top_right, bottom_right, bottom_left) = match self {
            Self::None => return None,
            Self::Single => ("─", "│", "┌", "┐", "┘", "└"),
            Self::Double => ("═", "║", "╔", "╗", "╝", "╚"),
            Self::Rounded => ("─", "│", "╭", "╮", "╯", "╰"),
            Self::Bold => ("━", "┃", "┏", "┓", "┛", "┗"),
            Self::Ascii => ("-", "|", "+", "+", "+", "+"),
        };
        Some(BorderChars {
            horizontal,
            vertical,
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        })
    }
}

// =============================================================================
// Props & Payloads
// =============================================================================

/// Node type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// Stacks its children vertically, optionally inside a border.
    Box,
    /// One line of text built from its children.
    Text,
}

/// Properties of a view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewProps {
    /// Text owned by the node itself. Children are ignored when set.
    pub text: Option<String>,
    pub attr: Attr,
    pub border: BorderStyle,
    /// Take focus when mounted.
    pub focusable: bool,
    pub id: Option<String>,
}

/// Changed fields between two [`ViewProps`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewPatch {
    pub text: Option<Option<String>>,
    pub attr: Option<Attr>,
    pub border: Option<BorderStyle>,
    pub focusable: Option<bool>,
    pub id: Option<Option<String>>,
}

impl ViewPatch {
    /// Diff `old` against `new`; `None` when nothing changed.
    pub fn diff(old: &ViewProps, new: &ViewProps) -> Option<Self> {
        let patch = Self {
            text: changed(&old.text, &new.text).cloned(),
            attr: changed(&old.attr, &new.attr).copied(),
            border: changed(&old.border, &new.border).copied(),
            focusable: changed(&old.focusable, &new.focusable).copied(),
            id: changed(&old.id, &new.id).cloned(),
        };
        (patch != Self::default()).then_some(patch)
    }

    /// Write the changed fields into `props`.
    pub fn apply(self, props: &mut ViewProps) {
        if let Some(text) = self.text {
            props.text = text;
        }
        if let Some(attr) = self.attr {
            props.attr = attr;
        }
        if let Some(border) = self.border {
            props.border = border;
        }
        if let Some(focusable) = self.focusable {
            props.focusable = focusable;
        }
        if let Some(id) = self.id {
            props.id = id;
        }
    }
}

fn changed<'a, T: PartialEq>(old: &T, new: &'a T) -> Option<&'a T> {
    (old != new).then_some(new)
}

/// Context threaded down the tree while it is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewContext {
    /// Some ancestor is a `Text` view.
    pub inside_text: bool,
}

/// Element tree accepted by the terminal host.
pub type ViewElement = Element<ViewKind, ViewProps>;

/// A child slot of a view or screen.
pub type ViewChild = HostNode<ViewNode, TextNode>;

// =============================================================================
// Nodes
// =============================================================================

struct ViewData {
    kind: ViewKind,
    props: RefCell<ViewProps>,
    handle: InstanceHandle,
    children: RefCell<Vec<ViewChild>>,
}

/// A box or text view.
#[derive(Clone)]
pub struct ViewNode(Rc<ViewData>);

impl ViewNode {
    pub(crate) fn new(kind: ViewKind, props: ViewProps, handle: InstanceHandle) -> Self {
        Self(Rc::new(ViewData {
            kind,
            props: RefCell::new(props),
            handle,
            children: RefCell::new(Vec::new()),
        }))
    }

    pub fn kind(&self) -> ViewKind {
        self.0.kind
    }

    /// Snapshot of the current props.
    pub fn props(&self) -> ViewProps {
        self.0.props.borrow().clone()
    }

    pub fn handle(&self) -> InstanceHandle {
        self.0.handle
    }

    /// Snapshot of the attached children.
    pub fn children(&self) -> Vec<ViewChild> {
        self.0.children.borrow().clone()
    }

    /// Whether `other` is this node or one of its descendants.
    pub fn contains(&self, other: &ViewNode) -> bool {
        self == other
            || self
                .0
                .children
                .borrow()
                .iter()
                .any(|child| matches!(child, HostNode::Instance(node) if node.contains(other)))
    }

    pub(crate) fn update_props(&self, update: impl FnOnce(&mut ViewProps)) {
        update(&mut *self.0.props.borrow_mut());
    }

    pub(crate) fn children_mut(&self) -> std::cell::RefMut<'_, Vec<ViewChild>> {
        self.0.children.borrow_mut()
    }
}

impl PartialEq for ViewNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ViewNode {}

impl fmt::Debug for ViewNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewNode")
            .field("kind", &self.0.kind)
            .field("handle", &self.0.handle)
            .field("id", &self.0.props.borrow().id)
            .finish()
    }
}

/// A text leaf inside a `Text` view.
#[derive(Clone)]
pub struct TextNode(Rc<RefCell<String>>);

impl TextNode {
    pub(crate) fn new(text: &str) -> Self {
        Self(Rc::new(RefCell::new(text.to_string())))
    }

    pub fn text(&self) -> String {
        self.0.borrow().clone()
    }

    pub(crate) fn set_text(&self, text: &str) {
        *self.0.borrow_mut() = text.to_string();
    }
}

impl PartialEq for TextNode {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for TextNode {}

impl fmt::Debug for TextNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TextNode").field(&*self.0.borrow()).finish()
    }
}

// =============================================================================
// Screen
// =============================================================================

struct ScreenState {
    name: String,
    width: usize,
    children: RefCell<Vec<ViewChild>>,
    committing: Cell<bool>,
    dirty: Cell<bool>,
}

/// Mount target: a full-width region of the terminal.
///
/// Identity is the screen itself, not its name; clones refer to the same
/// screen.
#[derive(Clone)]
pub struct Screen(Rc<ScreenState>);

impl Screen {
    pub fn new(name: impl Into<String>, width: usize) -> Self {
        Self(Rc::new(ScreenState {
            name: name.into(),
            width,
            children: RefCell::new(Vec::new()),
            committing: Cell::new(false),
            dirty: Cell::new(false),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn width(&self) -> usize {
        self.0.width
    }

    /// Snapshot of the top-level nodes.
    pub fn children(&self) -> Vec<ViewChild> {
        self.0.children.borrow().clone()
    }

    /// A commit is mutating this screen's tree.
    pub fn is_committing(&self) -> bool {
        self.0.committing.get()
    }

    /// Changed since the last [`take_dirty`](Self::take_dirty).
    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    pub fn take_dirty(&self) -> bool {
        self.0.dirty.replace(false)
    }

    /// Lay the tree out into terminal lines.
    pub fn lines(&self) -> Vec<Line> {
        layout::layout(&self.0.children.borrow(), self.0.width)
    }

    pub(crate) fn set_committing(&self, committing: bool) {
        self.0.committing.set(committing);
        if !committing {
            self.0.dirty.set(true);
        }
    }

    pub(crate) fn children_mut(&self) -> std::cell::RefMut<'_, Vec<ViewChild>> {
        self.0.children.borrow_mut()
    }
}

impl PartialEq for Screen {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Screen {}

impl Hash for Screen {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::ptr::hash(Rc::as_ptr(&self.0), state);
    }
}

impl fmt::Debug for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Screen")
            .field("name", &self.0.name)
            .field("width", &self.0.width)
            .finish()
    }
}
