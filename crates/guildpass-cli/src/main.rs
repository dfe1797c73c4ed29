//! guildpass - sign in to the quest platform and make authenticated API calls
//! from the terminal.
//!
//! Sessions stored with `--remember` persist across runs. Without it the
//! session lives in process memory only; use `guildpass shell` to keep one
//! alive across several commands.

mod commands;

use std::io;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use guildpass_core::{Config, SessionService};

use commands::Command;

/// Set to "1" to also log to a daily rolling file in the cache directory
const LOG_FILE_ENV: &str = "GUILDPASS_LOG_FILE";

/// Initialize the tracing subscriber for logging.
/// The returned guard must stay alive for file logs to be flushed.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(LOG_FILE_ENV).as_deref() {
        Ok("1") => match config.cache_dir() {
            Ok(dir) => {
                let appender = tracing_appender::rolling::daily(dir, "guildpass.log");
                let (writer, guard) = tracing_appender::non_blocking(appender);
                (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
            }
            Err(_) => (None, None),
        },
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: failed to load config ({}), using defaults", e);
            let mut config = Config::default();
            config.apply_env();
            config
        }
    };

    let log_guard = init_tracing(&config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{}\n", e);
            commands::print_usage();
            std::process::exit(2);
        }
    };

    info!(api = %config.api_base_url, "guildpass starting");
    let service = SessionService::from_config(config)?;

    let code = match command {
        Command::Shell => commands::run_shell(&service).await,
        command => commands::run(&service, command, false).await,
    };

    // Flush file logs before exiting
    drop(log_guard);
    std::process::exit(code);
}
