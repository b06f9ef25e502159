//! Priority levels and scoped execution modes.
//!
//! The facade operations (`batched_updates`, `sync_updates`, ...) never pass
//! flags around. They swap the reconciler's current [`ExecutionMode`] for the
//! dynamic extent of a closure through a [`ScopedMode`] guard, which puts the
//! enclosing mode back on drop, so early returns and panics restore it too.

use std::cell::Cell;
use std::fmt;

// =============================================================================
// Priority Levels
// =============================================================================

/// How urgently an update should be committed. Lower is more urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum PriorityLevel {
    /// No pending work. Updates requested at this level use the ambient default.
    #[default]
    NoWork = 0,
    /// Commit before the requesting call returns.
    Synchronous = 1,
    /// Commit at the end of the current batch or unit of work.
    Task = 2,
    /// Commit before the next paint.
    Animation = 3,
    /// Idle work, ahead of everything else that is idle.
    High = 4,
    /// Idle work.
    Low = 5,
    /// Idle work for content that is not visible.
    Offscreen = 6,
}

impl PriorityLevel {
    /// Whether this level is committed from the host's deferred callback.
    pub fn is_deferred(self) -> bool {
        matches!(self, Self::High | Self::Low | Self::Offscreen)
    }

    /// Whether this level is committed without going through a host hook.
    pub fn is_synchronous(self) -> bool {
        matches!(self, Self::Synchronous | Self::Task)
    }

    /// The more urgent of two levels, ignoring `NoWork`.
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::NoWork, level) | (level, Self::NoWork) => level,
            (a, b) => a.min(b),
        }
    }
}

impl fmt::Display for PriorityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NoWork => "no-work",
            Self::Synchronous => "sync",
            Self::Task => "task",
            Self::Animation => "animation",
            Self::High => "high",
            Self::Low => "low",
            Self::Offscreen => "offscreen",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Execution Mode
// =============================================================================

/// Ambient scheduling state of a reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionMode {
    /// Priority forced by `perform_with_priority`, `sync_updates` or
    /// `deferred_updates`.
    pub priority: Option<PriorityLevel>,
    /// Inside `batched_updates`.
    pub batching: bool,
    /// Inside `unbatched_updates`; wins over an enclosing batch.
    pub unbatching: bool,
}

impl ExecutionMode {
    /// Priority a new update gets under this mode.
    pub fn update_priority(&self, default: PriorityLevel) -> PriorityLevel {
        let level = match self.priority {
            Some(PriorityLevel::NoWork) | None => default,
            Some(level) => level,
        };
        if level == PriorityLevel::Synchronous && self.is_batching() {
            PriorityLevel::Task
        } else {
            level
        }
    }

    /// Whether synchronous updates are currently coalesced.
    pub fn is_batching(&self) -> bool {
        self.batching && !self.unbatching
    }
}

/// Restores the previous execution mode when dropped.
pub(crate) struct ScopedMode<'a> {
    slot: &'a Cell<ExecutionMode>,
    previous: ExecutionMode,
}

impl<'a> ScopedMode<'a> {
    /// Replace the mode in `slot` with `change(current)` until the guard drops.
    pub(crate) fn enter(
        slot: &'a Cell<ExecutionMode>,
        change: impl FnOnce(ExecutionMode) -> ExecutionMode,
    ) -> Self {
        let previous = slot.get();
        slot.set(change(previous));
        Self { slot, previous }
    }

    /// Mode that was active when the guard was created.
    pub(crate) fn previous(&self) -> ExecutionMode {
        self.previous
    }
}

impl Drop for ScopedMode<'_> {
    fn drop(&mut self) {
        self.slot.set(self.previous);
    }
}

// =============================================================================
// Tests
// =============================================================================
