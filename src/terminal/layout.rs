//! Line layout of a view tree.
//!
//! A deliberately small model: boxes stack their children vertically and may
//! draw a border, text views produce exactly one line. Widths are measured in
//! terminal cells, so wide characters count double and overflow is cut at a
//! cell boundary.

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::view::{Attr, ViewChild, ViewKind, ViewNode};
use crate::types::HostNode;

/// One painted terminal line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub attr: Attr,
}

impl Line {
    pub fn new(text: impl Into<String>, attr: Attr) -> Self {
        Self {
            text: text.into(),
            attr,
        }
    }
}

/// Lay out top-level `children` at `width` cells.
pub(crate) fn layout(children: &[ViewChild], width: usize) -> Vec<Line> {
    let mut lines = Vec::new();
    for child in children {
        layout_child(child, width, &mut lines);
    }
    lines
}

fn layout_child(child: &ViewChild, width: usize, out: &mut Vec<Line>) {
    match child {
        HostNode::Instance(node) => match node.kind() {
            ViewKind::Box => layout_box(node, width, out),
            ViewKind::Text => {
                let props = node.props();
                out.push(Line::new(fit(&text_of(node), width), props.attr));
            }
        },
        HostNode::Text(text) => out.push(Line::new(fit(&text.text(), width), Attr::NONE)),
    }
}

fn layout_box(node: &ViewNode, width: usize, out: &mut Vec<Line>) {
    let props = node.props();
    let Some(border) = props.border.chars() else {
        if let Some(text) = &props.text {
            out.push(Line::new(fit(text, width), props.attr));
        }
        for child in node.children() {
            layout_child(&child, width, out);
        }
        return;
    };

    let inner = width.saturating_sub(2);
    let mut body = Vec::new();
    if let Some(text) = &props.text {
        body.push(Line::new(fit(text, inner), props.attr));
    }
    for child in node.children() {
        layout_child(&child, inner, &mut body);
    }

    let rule = border.horizontal.repeat(inner);
    out.push(Line::new(
        format!("{}{rule}{}", border.top_left, border.top_right),
        props.attr,
    ));
    for line in body {
        out.push(Line::new(
            format!("{v}{}{v}", pad(&line.text, inner), v = border.vertical),
            line.attr,
        ));
    }
    out.push(Line::new(
        format!("{}{rule}{}", border.bottom_left, border.bottom_right),
        props.attr,
    ));
}

/// Text of a `Text` view: its own text, else its children concatenated.
fn text_of(node: &ViewNode) -> String {
    if let Some(text) = node.props().text {
        return text;
    }
    node.children()
        .iter()
        .map(|child| match child {
            HostNode::Instance(nested) => text_of(nested),
            HostNode::Text(text) => text.text(),
        })
        .collect()
}

/// Longest prefix of `text` that fits in `width` cells.
pub(crate) fn fit(text: &str, width: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}

/// `text` padded with spaces to `width` cells.
fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text.width());
    format!("{text}{}", " ".repeat(fill))
}
