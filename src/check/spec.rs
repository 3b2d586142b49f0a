//! Service definitions
//!
//! A `ServiceSpec` is built once by the manifest loader and only ever read
//! afterwards, so workers share it by reference.

use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// What a timeout kills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum KillMode {
    /// The command runs as leader of its own process group and the whole
    /// group is killed, so pipelines and background children go too
    #[default]
    ProcessGroup,
    /// Only the direct `bash` child is killed; its children may be orphaned
    Process,
}

impl fmt::Display for KillMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KillMode::ProcessGroup => write!(f, "process_group"),
            KillMode::Process => write!(f, "process"),
        }
    }
}

/// One service to check
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSpec {
    /// Service name, used to attribute output (not required to be unique)
    pub name: String,

    /// Shell command, passed verbatim to `bash -c` (exit 0 = up)
    pub command: String,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Additional attempts after the first
    #[serde(default)]
    pub retries: u32,

    /// Delay between a failed attempt and the next, in seconds
    #[serde(default = "default_interval")]
    pub interval: u64,

    /// What to kill when an attempt times out
    #[serde(default)]
    pub kill_mode: KillMode,
}

fn default_timeout() -> u64 {
    2
}

fn default_interval() -> u64 {
    1
}

impl ServiceSpec {
    /// Get timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Get retry interval as Duration
    pub fn interval_duration(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// Total number of attempts allowed
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

#[cfg(test)]
impl ServiceSpec {
    /// Create a service with default timeout, retries and interval
    pub fn new(name: &str, command: &str) -> Self {
        Self {
            name: name.to_string(),
            command: command.to_string(),
            timeout: default_timeout(),
            retries: 0,
            interval: default_interval(),
            kill_mode: KillMode::default(),
        }
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set retries
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set interval
    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval;
        self
    }

    /// Set kill mode
    pub fn with_kill_mode(mut self, kill_mode: KillMode) -> Self {
        self.kill_mode = kill_mode;
        self
    }
}
