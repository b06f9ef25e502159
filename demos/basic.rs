//! Basic demo - a counter rendered into a terminal screen.
//!
//! Run with: cargo run --example basic
//! Set `RUST_LOG=spark_fiber=debug` to watch commits.

use std::io::{self, stdout};
use std::thread;
use std::time::Duration;

use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use tracing_subscriber::EnvFilter;

use spark_fiber::terminal::{Attr, BorderStyle, LinePainter, Screen, TerminalHost, ViewElement, ViewKind, ViewProps};
use spark_fiber::{ContainerRegistry, Element, FiberReconciler, PriorityLevel};

fn counter(count: u32) -> ViewElement {
    let title = Element::host(
        ViewKind::Text,
        ViewProps {
            text: Some("spark-fiber".into()),
            attr: Attr::BOLD,
            ..Default::default()
        },
        vec![],
    );
    let value = Element::host(
        ViewKind::Text,
        ViewProps::default(),
        vec![Element::text("count: "), Element::text(count.to_string())],
    );

    Element::host(
        ViewKind::Box,
        ViewProps {
            border: BorderStyle::Rounded,
            ..Default::default()
        },
        vec![title, value],
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let registry = ContainerRegistry::new(FiberReconciler::new(TerminalHost::new()));
    let screen = Screen::new("main", 24);
    let mut painter = LinePainter::new();
    let mut out = stdout();

    execute!(out, Clear(ClearType::All))?;

    for count in 0..5 {
        registry.render(Some(counter(count)), screen.clone(), None)?;
        painter.paint_screen(&mut out, &screen)?;
        thread::sleep(Duration::from_millis(300));
    }

    // Animation-priority updates wait for the host's next tick
    registry.perform_with_priority(PriorityLevel::Animation, || {
        registry.render(Some(counter(99)), screen.clone(), None)
    })?;
    registry.reconciler().host().tick(Duration::from_millis(16));
    painter.paint_screen(&mut out, &screen)?;

    registry.unmount(&screen)?;
    painter.paint_screen(&mut out, &screen)?;
    println!();
    Ok(())
}
