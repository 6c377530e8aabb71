//! Alertdesk - real-time notification desk for the SuperAdmin portal
//!
//! A terminal dashboard that keeps a live connection to the portal, lists
//! notifications, and raises critical alerts the moment they arrive.
//!
//! ## Usage
//!
//! ```bash
//! # Start the dashboard with ~/.alertdesk/config.yaml
//! alertdesk
//!
//! # Point at another backend with an explicit token
//! alertdesk --api-url https://portal.example.com/api --token "$TOKEN"
//!
//! # With verbose logging and no sound
//! alertdesk -v --no-sound
//! ```

use std::io::Write;
use std::panic;
use std::path::PathBuf;
use std::process::ExitCode;

use alertdesk_config::AlertdeskConfig;
use alertdesk_core::{AlertdeskError, LogGuard, init_logging};
use alertdesk_tui::App;
use anyhow::{Context, anyhow};
use clap::Parser;
use tracing::{error, info, warn};

/// Alertdesk notification dashboard
///
/// Connects to the portal's notification socket and shows alerts by
/// priority: blocking modals for P0, toasts for P1, the list for the rest.
#[derive(Parser, Debug)]
#[command(name = "alertdesk")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging (increases log level)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory for log files (defaults to ~/.alertdesk/logs/)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Configuration file (defaults to ~/.alertdesk/config.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the REST API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Bearer token; otherwise taken from the environment or session file
    #[arg(long)]
    token: Option<String>,

    /// Start with notification sounds muted
    #[arg(long)]
    no_sound: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::from(1);
        }
    };

    // Install panic hook to ensure terminal cleanup
    install_panic_hook();

    info!("Starting alertdesk");

    match run_app(cli).await {
        Ok(()) => {
            info!("alertdesk exited normally");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("alertdesk error: {:#}", e);
            eprintln!("Error: {:#}", e);
            if let Some(hint) = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<AlertdeskError>())
                .and_then(AlertdeskError::guidance)
            {
                eprintln!("Hint: {hint}");
            }
            ExitCode::from(1)
        }
    }
}

/// Install a panic hook that restores the terminal before printing the panic message.
fn install_panic_hook() {
    let original_hook = panic::take_hook();

    panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_terminal();
        original_hook(panic_info);
    }));
}

/// Restore terminal to its normal state.
fn restore_terminal() -> std::io::Result<()> {
    let mut stdout = std::io::stdout();

    let _ = crossterm::terminal::disable_raw_mode();
    crossterm::execute!(stdout, crossterm::terminal::LeaveAlternateScreen)?;
    crossterm::execute!(stdout, crossterm::cursor::Show)?;
    stdout.flush()?;

    Ok(())
}

/// Set up logging based on CLI arguments. The console layer stays off so
/// log lines never land on the dashboard.
fn setup_logging(cli: &Cli) -> alertdesk_core::Result<LogGuard> {
    let verbose = cli.verbose > 0;
    init_logging(cli.log_dir.clone(), verbose, false)
}

/// Load configuration, apply command-line overrides, and run the dashboard.
async fn run_app(cli: Cli) -> anyhow::Result<()> {
    let mut config =
        AlertdeskConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    if let Some(api_url) = cli.api_url {
        config.api_base_url = api_url;
    }
    if let Some(token) = cli.token {
        config.auth.token = Some(token);
    }
    if cli.no_sound {
        config.sound.enabled = false;
    }
    config.validate().context("invalid configuration")?;

    let token = config.resolve_token();
    if token.is_none() {
        warn!("no auth token found, real-time updates are disabled");
    }

    let mut app = App::from_config(&config, token).map_err(into_anyhow)?;
    app.run().await.map_err(into_anyhow)
}

/// Keep `AlertdeskError` intact so its guidance survives to `main`.
fn into_anyhow(err: Box<dyn std::error::Error>) -> anyhow::Error {
    match err.downcast::<AlertdeskError>() {
        Ok(err) => anyhow::Error::new(*err),
        Err(other) => anyhow!("{other}"),
    }
}
