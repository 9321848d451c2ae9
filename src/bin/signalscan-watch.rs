//! signalscan-watch - follow a Signal Scan report until it is ready
//!
//! Usage:
//!   signalscan-watch <report-id>             Print status changes, then the report
//!   signalscan-watch <report-id> --json      Print only the final snapshot as JSON
//!   signalscan-watch --help                  Show all options
//!
//! Exit codes: 0 ready, 2 not found, 130 interrupted, 1 anything else.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use signalscan::poller::{thinking_word, THINKING_WORDS};
use signalscan::{
    AppError, ClientConfig, PollConfig, PublicResultsClient, ReportIdentifier, ReportPayload,
    ReportWatcher, SessionSnapshot, SessionState,
};

const EXIT_NOT_FOUND: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

/// Watch a Signal Scan report until it reaches a final state
///
/// Unset options fall back to the SIGNALSCAN_* environment variables, then to
/// built-in defaults.
#[derive(Parser)]
#[command(name = "signalscan-watch", version, about, long_about = None)]
struct Cli {
    /// Public report identifier (the last segment of the results link)
    report_id: String,

    /// Base URL of the results service [env: SIGNALSCAN_API_BASE_URL]
    #[arg(long)]
    base_url: Option<String>,

    /// Per-request timeout in seconds [env: SIGNALSCAN_REQUEST_TIMEOUT_SECS]
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Delay between status checks in milliseconds [env: SIGNALSCAN_POLL_INTERVAL_MS]
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Status checks before giving up [env: SIGNALSCAN_MAX_POLL_ATTEMPTS]
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_attempts: Option<u32>,

    /// Print the final snapshot as JSON instead of human-readable output
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Environment config with command-line overrides applied.
    fn client_config(&self) -> Result<ClientConfig, AppError> {
        let mut config = ClientConfig::from_env()?;
        if let Some(url) = &self.base_url {
            config = config.base_url(url)?;
        }
        if let Some(secs) = self.timeout_secs {
            config = config.request_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    /// Environment config with command-line overrides applied.
    fn poll_config(&self) -> Result<PollConfig, AppError> {
        let mut config = PollConfig::from_env()?;
        if let Some(ms) = self.interval_ms {
            config = config.poll_interval(Duration::from_millis(ms));
        }
        if let Some(attempts) = self.max_attempts {
            config = config.max_attempts(attempts);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Tracing to stderr so stdout carries only the report
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("signalscan=info")),
        )
        .init();

    match run(cli).await {
        Ok(snapshot) => exit_code(snapshot.state),
        Err(AppError::Cancelled) => ExitCode::from(EXIT_INTERRUPTED),
        Err(e) => {
            let presentation = e.to_presentation();
            eprintln!("{}: {}", presentation.title, presentation.message);
            if let Some(action) = presentation.action {
                eprintln!("{}", action);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<SessionSnapshot, AppError> {
    let identifier = ReportIdentifier::new(cli.report_id.as_str())?;
    let client_config = cli.client_config()?;
    let poll_config = cli.poll_config()?;

    info!(
        "[WATCH] Checking {} every {}ms, giving up after {}s",
        client_config.base_url,
        poll_config.poll_interval.as_millis(),
        poll_config.max_wait().as_secs()
    );

    let client = PublicResultsClient::new(&client_config)?;
    let mut watcher = ReportWatcher::new(Arc::new(client), poll_config);
    watcher.watch(identifier);
    let mut updates = watcher.subscribe();

    let mut printer = StatusPrinter::new(cli.json);
    let last = loop {
        let snapshot = updates.borrow_and_update().clone();
        printer.print(&snapshot);
        if snapshot.state.is_terminal() {
            break snapshot;
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break watcher.snapshot();
                }
            }
            _ = tokio::signal::ctrl_c() => {
                watcher.stop();
                return Err(AppError::Cancelled);
            }
        }
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&last)
            .map_err(|e| AppError::Internal(format!("Failed to encode snapshot: {}", e)))?;
        println!("{}", json);
    } else if let Some(report) = &last.report {
        print_report(report);
    }

    Ok(last)
}

fn exit_code(state: SessionState) -> ExitCode {
    match state {
        SessionState::Ready => ExitCode::SUCCESS,
        SessionState::NotFound => ExitCode::from(EXIT_NOT_FOUND),
        _ => ExitCode::FAILURE,
    }
}

// ── Output ────────────────────────────────────────────────────────────────────

/// Prints a line whenever the state or progress changes.
struct StatusPrinter {
    quiet: bool,
    tick: usize,
    last: Option<(SessionState, u8)>,
}

impl StatusPrinter {
    fn new(quiet: bool) -> Self {
        Self {
            quiet,
            tick: 0,
            last: None,
        }
    }

    fn print(&mut self, snapshot: &SessionSnapshot) {
        let key = (snapshot.state, snapshot.progress);
        if self.quiet || self.last == Some(key) {
            return;
        }
        self.last = Some(key);

        let view = snapshot.presentation();
        if snapshot.state.is_in_flight() {
            println!(
                "{} {:>3}%  {}...",
                view.title,
                snapshot.progress,
                thinking_word(THINKING_WORDS, self.tick)
            );
            self.tick += 1;
        } else {
            println!("{}", view.title);
            println!("{}", view.message);
        }
    }
}

fn print_report(report: &ReportPayload) {
    if let Some(created_at) = &report.created_at {
        println!("Generated {}", created_at);
    }
    for section in report.sections() {
        println!();
        if let Some(heading) = &section.heading {
            println!("## {}", heading);
        }
        println!("{}", section.body);
    }
}
