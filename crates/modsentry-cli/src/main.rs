//! modsentry - command-line client for the modsentry moderation service.
//!
//! Signs in against the auth server, keeps the session on disk (or in the
//! OS keychain) and drives the policy and moderation endpoints.

mod commands;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use modsentry_core::auth::SessionEvent;
use modsentry_core::{Config, SessionManager};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "modsentry", version, about = "Moderate files against your content policies")]
struct Cli {
    /// Server URL (overrides config file)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the session
    Login {
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Create an account and sign in
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// End the session
    Logout,
    /// Show the signed-in user
    Whoami {
        /// Fetch the profile from the server instead of the stored copy
        #[arg(long)]
        reload: bool,
    },
    /// Manage policy documents
    Policies {
        #[command(subcommand)]
        action: PolicyAction,
    },
    /// Check a file against the uploaded policies
    Moderate { file: PathBuf },
    /// List past moderation results
    History,
    /// Show one moderation result with its violations
    Show { id: i64 },
    /// Record a reviewer decision: approved, rejected or pending
    Verdict { id: i64, verdict: String },
}

#[derive(Subcommand)]
enum PolicyAction {
    List,
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    Delete { id: i64 },
    Clear,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "modsentry.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
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

    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: failed to load config ({}), using defaults", e);
        Config::default()
    });
    let _log_guard = init_tracing(config.log_dir.as_deref());
    info!("modsentry starting");

    debug!(api_url = %config.api_base_url(), storage = ?config.storage, "Config loaded");

    let session = match cli.api_url.as_deref() {
        Some(url) => {
            SessionManager::new(url, config.session_storage()?, config.request_timeout())?
        }
        None => SessionManager::from_config(&config)?,
    };

    let mut events = session.subscribe();
    let result = commands::run(cli.command, &session, &mut config).await;

    // Stand-in for redirecting to the login screen
    while let Ok(event) = events.try_recv() {
        if event == SessionEvent::Invalidated {
            eprintln!("Your session has expired. Run `modsentry login` to sign in again.");
        }
    }

    info!("modsentry shutting down");
    result
}
