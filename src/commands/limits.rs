//! One-shot commands over the limit history
//!
//! `status`, `record`, `undo` and `history` each build a short-lived
//! orchestrator (or just the store) from the persisted files, act once and
//! exit. The store's read-modify-write keeps them safe next to a running
//! `watch`.

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use serde::Serialize;
use tracing::info;

use crate::commands::render_status_line;
use crate::config::Config;
use crate::display::format_tokens;
use crate::limit_store::LimitStore;
use crate::live::LiveOrchestrator;
use crate::models::LimitEvent;

pub fn run_status(config: &Config, json: bool) -> Result<()> {
    let now = Utc::now();
    let state = LiveOrchestrator::new_at(config, now).display(now);

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        println!("{}", render_status_line(&state));
    }
    Ok(())
}

pub fn run_record(config: &Config) -> Result<()> {
    let now = Utc::now();
    let mut engine = LiveOrchestrator::new_at(config, now);
    let event = engine.record_manual(now)?;

    let store = engine.store();
    println!(
        "{} limit at {} tokens ({} event{}, estimated limit {})",
        "Recorded".green().bold(),
        format_tokens(event.tokens_at_limit),
        store.event_count(),
        if store.event_count() == 1 { "" } else { "s" },
        store
            .estimated_limit()
            .map(format_tokens)
            .unwrap_or_else(|| "unknown".to_string())
    );
    Ok(())
}

pub fn run_undo(config: &Config) -> Result<()> {
    let now = Utc::now();
    let mut engine = LiveOrchestrator::new_at(config, now);

    if engine.undo(now)? {
        let store = engine.store();
        info!(events = store.event_count(), "Undo complete");
        println!(
            "{} last limit event ({} remaining)",
            "Removed".yellow().bold(),
            store.event_count()
        );
    } else {
        println!("No limit events to undo");
    }
    Ok(())
}

#[derive(Serialize)]
struct HistoryOutput<'a> {
    estimated_limit: Option<u64>,
    event_count: usize,
    events: &'a [LimitEvent],
}

pub fn run_history(config: &Config, limit: usize, json: bool) -> Result<()> {
    let store = LimitStore::open(&config.paths.limits_file, &config.paths.status_file);
    let events = store.events();
    let recent = &events[events.len().saturating_sub(limit)..];

    if json {
        let output = HistoryOutput {
            estimated_limit: store.estimated_limit(),
            event_count: store.event_count(),
            events: recent,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if recent.is_empty() {
        println!("No limit events recorded yet");
        return Ok(());
    }

    for event in recent.iter().rev() {
        let reset = event
            .reset_timestamp
            .map(|at| format!("resets {}", local_time(at)))
            .unwrap_or_else(|| "manual".to_string());
        println!(
            "{}  {}  {}",
            local_time(event.timestamp),
            format!("{:>8}", format_tokens(event.tokens_at_limit)).bold(),
            reset.dimmed()
        );
    }

    if let Some(estimate) = store.estimated_limit() {
        println!(
            "Estimated limit: {} from {} event{}",
            format_tokens(estimate).bold(),
            store.event_count(),
            if store.event_count() == 1 { "" } else { "s" }
        );
    }
    Ok(())
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%b %-d, %H:%M").to_string()
}
