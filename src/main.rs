use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;

use claude_tokens::commands::{run_history, run_record, run_status, run_undo, run_watch};
use claude_tokens::config::{get_config, init_config, Config};
use claude_tokens::display::HISTORY_ROWS;
use claude_tokens::logging::init_logging;

#[derive(Parser)]
#[command(name = "claude-tokens")]
#[command(about = "Track Claude token usage against an empirically discovered rate limit")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch transcripts for rate limits and print live status
    Watch {
        /// Print one JSON object per display change
        #[arg(long)]
        json: bool,
    },
    /// Show the current status once
    Status {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Record that tokens just ran out, using the current window total
    Record,
    /// Remove the most recent limit event
    Undo,
    /// List recent limit events
    History {
        /// Show last N events
        #[arg(long, default_value_t = HISTORY_ROWS)]
        limit: usize,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Status { json: false });
    let json = matches!(
        command,
        Commands::Watch { json: true } | Commands::Status { json: true } | Commands::History { json: true, .. }
    );

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => handle_error(e.context("Invalid configuration"), json),
    };
    init_config(config);
    let config = get_config();

    if let Err(e) = config.ensure_log_directory() {
        handle_error(e, json);
    }
    let _log_guard = init_logging(config);

    let result = match command {
        Commands::Watch { json } => run_watch(config, json).await,
        Commands::Status { json } => run_status(config, json),
        Commands::Record => run_record(config),
        Commands::Undo => run_undo(config),
        Commands::History { limit, json } => run_history(config, limit, json),
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => handle_error(e, json),
    }
}

fn handle_error(e: anyhow::Error, json: bool) -> ! {
    if json {
        println!("{}", serde_json::json!({ "error": format!("{:#}", e) }));
    } else {
        eprintln!("Error: {:#}", e);
    }
    process::exit(1);
}
