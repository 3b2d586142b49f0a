//! Command-line interface for checkup
//!
//! Uses clap with derive for type-safe CLI parsing

use crate::check::poll::DEFAULT_POLL_DELAY;
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use std::path::PathBuf;

/// checkup - are all my services up?
///
/// Runs every service's check command concurrently and exits 0 when all are
/// up, 1 when any is down.
#[derive(Parser, Debug)]
#[command(name = "checkup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Services to check (default: all services in the config)
    pub services: Vec<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "check_up.yml")]
    pub file: PathBuf,

    /// Check services repeatedly until all are up
    #[arg(short, long)]
    pub wait: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Delay between passes in wait mode, in seconds
    #[arg(long, default_value_t = DEFAULT_POLL_DELAY.as_secs(), value_name = "SECS")]
    pub poll_interval: u64,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,

    /// Print shell completion script and exit
    #[arg(long, value_name = "SHELL")]
    pub completions: Option<Shell>,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Generate shell completion scripts
    pub fn generate_completion(shell: Shell) {
        let mut cmd = Self::command();
        clap_complete::generate(shell, &mut cmd, "checkup", &mut std::io::stdout());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["checkup"]).unwrap();
        assert!(cli.services.is_empty());
        assert_eq!(cli.file, PathBuf::from("check_up.yml"));
        assert!(!cli.wait);
        assert!(!cli.verbose);
        assert_eq!(cli.poll_interval, DEFAULT_POLL_DELAY.as_secs());
        assert_eq!(cli.poll_interval, 1);
        assert!(!cli.json);
        assert!(cli.completions.is_none());
    }

    #[test]
    fn test_cli_flags_and_services() {
        let cli = Cli::try_parse_from([
            "checkup", "--file", "deploy.toml", "-w", "-v", "--poll-interval", "3", "--json", "db",
            "web",
        ])
        .unwrap();
        assert_eq!(cli.file, PathBuf::from("deploy.toml"));
        assert!(cli.wait);
        assert!(cli.verbose);
        assert_eq!(cli.poll_interval, 3);
        assert!(cli.json);
        assert_eq!(cli.services, vec!["db", "web"]);
    }

    #[test]
    fn test_cli_completions() {
        let cli = Cli::try_parse_from(["checkup", "--completions", "bash"]).unwrap();
        assert_eq!(cli.completions, Some(Shell::Bash));
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }
}
