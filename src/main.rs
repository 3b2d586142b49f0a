//! checkup - readiness gate for a set of services
//!
//! Each service is a shell command. All commands run concurrently with a
//! per-attempt timeout and fixed-interval retries; the exit code says whether
//! every service came up.

mod cancel;
mod check;
mod cli;
mod error;
mod log;
mod manifest;

use cancel::CancelToken;
use check::{check_all, wait_all};
use cli::Cli;
use error::{Error, Result};
use log::{ConsoleSink, Level, LogSink};

use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Exit code when every service is up
const EXIT_UP: u8 = 0;
/// Exit code when at least one service is down
const EXIT_DOWN: u8 = 1;
/// Exit code for configuration and fatal errors
const EXIT_ERROR: u8 = 2;
/// Exit code after SIGINT/SIGTERM
const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
    init_tracing();
    ExitCode::from(exit_code(run()))
}

/// Diagnostics go to stderr, filtered by `CHECKUP_LOG` (default: warn)
fn init_tracing() {
    let filter = EnvFilter::try_from_env("CHECKUP_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Report a failed run on stderr and pick its exit code
fn exit_code(result: Result<u8>) -> u8 {
    match result {
        Ok(code) => code,
        Err(Error::Cancelled) => {
            eprintln!("Interrupted");
            EXIT_INTERRUPTED
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            EXIT_ERROR
        }
    }
}

fn run() -> Result<u8> {
    let cli = Cli::parse_args();

    if let Some(shell) = cli.completions {
        Cli::generate_completion(shell);
        return Ok(EXIT_UP);
    }

    let (handle, token) = cancel::channel();
    cancel::watch_signals(handle)?;

    let level = Level::max_for(cli.verbose);
    let mut stdout = io::stdout();
    if cli.json {
        // stdout carries the report alone
        execute(&cli, &ConsoleSink::new(io::stderr(), level), &mut stdout, &token)
    } else {
        execute(&cli, &ConsoleSink::new(io::stdout(), level), &mut stdout, &token)
    }
}

/// Load the config, check the selected services and write the report
///
/// Check messages go to `log`; `out` receives only the JSON report when
/// `--json` is set. Returns the exit code for a completed run.
fn execute(cli: &Cli, log: &dyn LogSink, out: &mut dyn Write, cancel: &CancelToken) -> Result<u8> {
    let manifest = manifest::load(&cli.file)?;
    let services = manifest.select(&cli.services)?;
    tracing::debug!(
        file = %cli.file.display(),
        services = services.len(),
        wait = cli.wait,
        "loaded services"
    );

    let report = if cli.wait {
        wait_all(&services, log, cancel, Duration::from_secs(cli.poll_interval))?
    } else {
        check_all(&services, log, cancel)?
    };

    if cli.json {
        writeln!(out, "{}", report.to_json()?)?;
    }

    Ok(if report.all_up() { EXIT_UP } else { EXIT_DOWN })
}
