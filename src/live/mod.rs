//! Live mode: transcript watching and the limit engine
//!
//! Filesystem notifications, timers and user commands all reach the
//! [`orchestrator::LiveOrchestrator`] as [`EngineMessage`]s or timer ticks.
//! The orchestrator is the only writer of limit history and display state.

use std::path::PathBuf;

pub mod detector;
pub mod hook;
pub mod orchestrator;
pub mod state_machine;
pub mod tail;
pub mod watcher;

pub use orchestrator::{EngineHandle, LiveOrchestrator};
pub use state_machine::{Phase, StateMachine, Timing};

/// Inputs to the live engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineMessage {
    /// A transcript file was created or appended to
    TranscriptChanged(PathBuf),
    /// Record a limit event by hand using the current window total
    RecordLimit,
    /// Remove the most recent limit event
    UndoLast,
    Shutdown,
}
