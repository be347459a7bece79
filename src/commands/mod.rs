//! Command module for the claude-tokens CLI
//!
//! Each subcommand lives in its own module; the terminal rendering shared by
//! `watch` and `status` lives here.

use colored::{ColoredString, Colorize};

use crate::display::DisplayState;
use crate::live::Phase;

pub mod limits;
pub mod watch;

pub use limits::{run_history, run_record, run_status, run_undo};
pub use watch::run_watch;

const BAR_WIDTH: usize = 20;

/// One terminal line: phase label, title, bar and the two detail lines
pub fn render_status_line(state: &DisplayState) -> String {
    format!(
        "{} {}  {}  {} | {}",
        phase_label(state),
        format!("{:>8}", state.title).bold(),
        render_bar(state.fraction_remaining),
        state.session_line,
        state.usage_line.dimmed()
    )
}

fn phase_label(state: &DisplayState) -> ColoredString {
    if state.unknown {
        return format!("{:<12}", "unknown").dimmed();
    }
    let label = match state.phase {
        Phase::Calibrating => "calibrating",
        Phase::CountingDown { .. } => "limited",
        Phase::Refilling { .. } => "refilling",
        Phase::Ready => "ready",
        Phase::Calibrated { .. } => "tracking",
    };
    let padded = format!("{:<12}", label);
    match state.phase {
        Phase::Calibrating => padded.yellow(),
        Phase::CountingDown { .. } => padded.red().bold(),
        Phase::Refilling { .. } => padded.cyan(),
        Phase::Ready => padded.green().bold(),
        Phase::Calibrated { .. } => padded.normal(),
    }
}

fn render_bar(fraction: Option<f64>) -> ColoredString {
    let Some(fraction) = fraction else {
        return "·".repeat(BAR_WIDTH).dimmed();
    };
    let filled = (fraction.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize;
    let bar = format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled));
    if fraction > 0.5 {
        bar.green()
    } else if fraction > 0.2 {
        bar.yellow()
    } else {
        bar.red()
    }
}
