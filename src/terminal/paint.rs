//! Line painter - writes only what changed since the last frame.
//!
//! # Algorithm
//!
//! 1. Compare each new line with the line painted at the same row last time
//! 2. Rewrite changed rows (move, clear row, attributes, text)
//! 3. Clear rows the previous frame had and this one does not
//! 4. Flush once and remember the frame
//!
//! A screen in the middle of a commit is never painted.

use std::io::{self, Write};

use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{Clear, ClearType};

use super::layout::Line;
use super::view::{Attr, Screen};

/// Differential painter for a column of lines.
#[derive(Debug, Default)]
pub struct LinePainter {
    previous: Option<Vec<Line>>,
    /// Row of the first line.
    top: u16,
}

impl LinePainter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Painter whose first line lands on terminal row `top`.
    pub fn at_row(top: u16) -> Self {
        Self {
            previous: None,
            top,
        }
    }

    /// Paint `screen` if it has a finished commit waiting.
    ///
    /// Returns whether anything was written.
    pub fn paint_screen<W: Write>(&mut self, out: &mut W, screen: &Screen) -> io::Result<bool> {
        if screen.is_committing() || !screen.take_dirty() {
            return Ok(false);
        }
        self.paint(out, &screen.lines())
    }

    /// Paint `lines`, writing only rows that differ from the last frame.
    ///
    /// Returns whether any row was written.
    pub fn paint<W: Write>(&mut self, out: &mut W, lines: &[Line]) -> io::Result<bool> {
        let previous = self.previous.take().unwrap_or_default();
        let mut changed = false;

        for (row, line) in lines.iter().enumerate() {
            if previous.get(row) == Some(line) {
                continue;
            }
            changed = true;
            queue!(
                out,
                MoveTo(0, self.row(row)),
                Clear(ClearType::CurrentLine)
            )?;
            for attribute in attributes(line.attr) {
                queue!(out, SetAttribute(attribute))?;
            }
            queue!(out, Print(&line.text))?;
            if !line.attr.is_empty() {
                queue!(out, SetAttribute(Attribute::Reset))?;
            }
        }

        for row in lines.len()..previous.len() {
            changed = true;
            queue!(out, MoveTo(0, self.row(row)), Clear(ClearType::CurrentLine))?;
        }

        out.flush()?;
        self.previous = Some(lines.to_vec());
        Ok(changed)
    }

    /// Forget the last frame; the next paint rewrites every row.
    ///
    /// Use this after a resize or when the terminal was cleared.
    pub fn invalidate(&mut self) {
        self.previous = None;
    }

    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }

    fn row(&self, index: usize) -> u16 {
        self.top.saturating_add(u16::try_from(index).unwrap_or(u16::MAX))
    }
}

fn attributes(attr: Attr) -> Vec<Attribute> {
    [
        (Attr::BOLD, Attribute::Bold),
        (Attr::DIM, Attribute::Dim),
        (Attr::ITALIC, Attribute::Italic),
        (Attr::UNDERLINE, Attribute::Underlined),
        (Attr::BLINK, Attribute::SlowBlink),
        (Attr::INVERSE, Attribute::Reverse),
        (Attr::HIDDEN, Attribute::Hidden),
        (Attr::STRIKETHROUGH, Attribute::CrossedOut),
    ]
    .into_iter()
    .filter(|(flag, _)| attr.contains(*flag))
    .map(|(_, attribute)| attribute)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(lines: &[&str]) -> Vec<Line> {
        lines.iter().map(|text| Line::new(*text, Attr::NONE)).collect()
    }

    fn paint(painter: &mut LinePainter, lines: &[Line]) -> (bool, String) {
        let mut out = Vec::new();
        let changed = painter.paint(&mut out, lines).unwrap();
        (changed, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_first_frame_writes_every_line() {
        let mut painter = LinePainter::new();
        assert!(!painter.has_previous());

        let (changed, out) = paint(&mut painter, &frame(&["one", "two"]));

        assert!(changed);
        assert!(out.contains("one") && out.contains("two"));
        assert!(painter.has_previous());
    }

    #[test]
    fn test_unchanged_frame_writes_nothing() {
        let mut painter = LinePainter::new();
        paint(&mut painter, &frame(&["one", "two"]));

        let (changed, out) = paint(&mut painter, &frame(&["one", "two"]));

        assert!(!changed);
        assert!(out.is_empty());
    }

    #[test]
    fn test_only_changed_rows_are_rewritten() {
        let mut painter = LinePainter::new();
        paint(&mut painter, &frame(&["one", "two", "three"]));

        let (changed, out) = paint(&mut painter, &frame(&["one", "TWO", "three"]));

        assert!(changed);
        assert!(out.contains("TWO"));
        assert!(!out.contains("one"));
        assert!(!out.contains("three"));
    }

    #[test]
    fn test_attribute_change_counts_as_change() {
        let mut painter = LinePainter::new();
        paint(&mut painter, &frame(&["x"]));

        let (changed, out) = paint(&mut painter, &[Line::new("x", Attr::BOLD)]);

        assert!(changed);
        assert!(out.contains('x'));
    }

    #[test]
    fn test_shrinking_frame_clears_old_rows() {
        let mut painter = LinePainter::new();
        paint(&mut painter, &frame(&["one", "two"]));

        let (changed, out) = paint(&mut painter, &frame(&["one"]));

        assert!(changed);
        assert!(!out.is_empty());
        assert!(!out.contains("one"));
    }

    #[test]
    fn test_invalidate_forces_full_repaint() {
        let mut painter = LinePainter::new();
        paint(&mut painter, &frame(&["one"]));
        painter.invalidate();

        let (changed, out) = paint(&mut painter, &frame(&["one"]));

        assert!(changed);
        assert!(out.contains("one"));
    }

    #[test]
    fn test_attributes_map_each_flag() {
        assert!(attributes(Attr::NONE).is_empty());
        assert_eq!(
            attributes(Attr::BOLD | Attr::UNDERLINE),
            vec![Attribute::Bold, Attribute::Underlined]
        );
    }

    #[test]
    fn test_screen_paint_waits_for_commit() {
        let mut painter = LinePainter::new();
        let screen = Screen::new("main", 10);
        let mut out = Vec::new();

        assert!(!painter.paint_screen(&mut out, &screen).unwrap());

        screen.set_committing(true);
        screen.set_committing(false);
        assert!(screen.is_dirty());
        // An empty tree against no previous frame writes nothing but is consumed
        assert!(!painter.paint_screen(&mut out, &screen).unwrap());
        assert!(!screen.is_dirty());
    }
}
