//! Watch command implementation
//!
//! Runs the live engine in the background and prints every display change,
//! either as a colored status line or as one JSON object per line. While
//! running, `record`, `undo` and `quit` are accepted on stdin.

use anyhow::Result;
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::commands::render_status_line;
use crate::config::Config;
use crate::display::DisplayState;
use crate::live::{EngineMessage, LiveOrchestrator};

pub async fn run_watch(config: &Config, json: bool) -> Result<()> {
    info!(json, "Starting watch mode");

    let orchestrator = LiveOrchestrator::new(config);
    let handle = orchestrator.handle();
    let mut display = handle.display();

    let engine = tokio::spawn(orchestrator.run());
    let commands = handle.sender();
    std::thread::spawn(move || read_commands(std::io::stdin().lock(), commands));

    if !json {
        eprintln!("Watching for rate limits. Commands: record, undo, quit (Ctrl+C to exit)");
    }
    print_state(&display.borrow_and_update(), json)?;

    loop {
        tokio::select! {
            changed = display.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = display.borrow_and_update().clone();
                print_state(&state, json)?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                if let Err(e) = handle.send(EngineMessage::Shutdown).await {
                    warn!(error = %e, "Engine already stopped");
                }
                break;
            }
        }
    }

    match engine.await {
        Ok(result) => result?,
        Err(e) => error!(error = %e, "Live engine task failed"),
    }

    info!("Watch mode completed");
    Ok(())
}

fn print_state(state: &DisplayState, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(state)?);
    } else {
        println!("{}", render_status_line(state));
    }
    Ok(())
}

/// Runs on a plain thread so a pending stdin read never holds up runtime shutdown
fn read_commands(input: impl BufRead, tx: mpsc::Sender<EngineMessage>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(error = %e, "Failed to read command from stdin");
                return;
            }
        };

        let Some(message) = parse_command(&line) else {
            if !line.trim().is_empty() {
                eprintln!("Unknown command '{}'. Try: record, undo, quit", line.trim());
            }
            continue;
        };

        let quit = message == EngineMessage::Shutdown;
        if tx.blocking_send(message).is_err() || quit {
            return;
        }
    }
}

fn parse_command(line: &str) -> Option<EngineMessage> {
    match line.trim().to_ascii_lowercase().as_str() {
        "record" | "r" => Some(EngineMessage::RecordLimit),
        "undo" | "u" => Some(EngineMessage::UndoLast),
        "quit" | "q" | "exit" => Some(EngineMessage::Shutdown),
        _ => None,
    }
}
