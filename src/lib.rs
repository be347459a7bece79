//! Claude Tokens Library
//!
//! Tracks Claude token usage against a rate limit that is discovered
//! empirically: every time the service reports a usage limit, the current
//! window total is recorded, and the median of those observations becomes the
//! estimated limit.
//!
//! ## Architecture Overview
//!
//! - [`timestamp_parser`] - Instant parsing and the stored instant format
//! - [`reset_phrase`] - "resets in 2h 30m" / "resets 3pm (Australia/Melbourne)" grammars
//! - [`models`] - Limit events, history, and the usage summary snapshot
//! - [`limit_store`] - Persistent limit history with the derived estimate
//! - [`usage`] - Reading the usage summary and patching it after an undo
//! - [`live`] - Transcript watching, limit/recovery detection, the display
//!   state machine and the single-writer orchestrator
//! - [`display`] - Values a status indicator renders
//! - [`config`] - Configuration management with environment variable support
//! - [`logging`] - Structured logging with JSON and pretty-print formats
//! - [`commands`] - CLI subcommand bodies
//!
//! ## Main Entry Point
//!
//! ```rust,no_run
//! use claude_tokens::config::Config;
//! use claude_tokens::live::{EngineMessage, LiveOrchestrator};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let engine = LiveOrchestrator::new(&config);
//! let handle = engine.handle();
//! let task = tokio::spawn(engine.run());
//!
//! let mut display = handle.display();
//! display.changed().await?;
//! println!("{}", display.borrow().title);
//!
//! handle.send(EngineMessage::Shutdown).await?;
//! task.await??;
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod config;
pub mod display;
pub mod limit_store;
pub mod live;
pub mod logging;
pub mod models;
pub mod persist;
pub mod reset_phrase;
pub mod timestamp_parser;
pub mod usage;

pub use limit_store::LimitStore;
pub use models::*;
