//! Terminal host - a [`HostConfig`](crate::HostConfig) backend drawing views
//! as lines of a terminal screen.
//!
//! ```text
//! ContainerRegistry ─► FiberReconciler ─► TerminalHost ─► Screen (view tree)
//!                                                            │
//!                                              Screen::lines │ layout.rs
//!                                                            ▼
//!                                                  LinePainter (crossterm)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use spark_fiber::terminal::{LinePainter, Screen, TerminalHost, ViewKind, ViewProps};
//! use spark_fiber::{ContainerRegistry, Element, FiberReconciler};
//!
//! let registry = ContainerRegistry::new(FiberReconciler::new(TerminalHost::new()));
//! let screen = Screen::new("main", 40);
//! registry.render(
//!     Some(Element::host(ViewKind::Text, ViewProps::default(), vec![Element::text("hello")])),
//!     screen.clone(),
//!     None,
//! )?;
//!
//! let mut painter = LinePainter::new();
//! painter.paint_screen(&mut std::io::stdout(), &screen)?;
//! ```

mod host;
mod layout;
mod paint;
mod view;

pub use host::TerminalHost;
pub use layout::Line;
pub use paint::LinePainter;
pub use view::{
    Attr, BorderChars, BorderStyle, Screen, TextNode, ViewChild, ViewContext, ViewElement,
    ViewKind, ViewNode, ViewPatch, ViewProps,
};
