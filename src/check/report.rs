//! Check outcomes and the aggregate report

use serde::Serialize;
use std::time::Duration;

/// Result of checking one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    /// Service name
    pub name: String,
    /// Whether any attempt succeeded
    pub healthy: bool,
    /// Attempts made, including the first
    pub attempts: u32,
    /// Wall-clock time across all attempts and intervals
    pub elapsed_ms: u64,
}

impl CheckOutcome {
    pub fn new(name: &str, healthy: bool, attempts: u32, elapsed: Duration) -> Self {
        Self {
            name: name.to_string(),
            healthy,
            attempts,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Outcomes of one complete fan-out pass, in service order
///
/// Only ever built from the full set of outcomes after every worker has
/// finished; there is no partially filled report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    /// Aggregate: every service healthy
    pub healthy: bool,
    /// Per-service outcomes
    pub services: Vec<CheckOutcome>,
}

impl Report {
    pub fn new(services: Vec<CheckOutcome>) -> Self {
        let healthy = services.iter().all(|o| o.healthy);
        Self { healthy, services }
    }

    /// Whether every service is up (vacuously true for no services)
    pub fn all_up(&self) -> bool {
        self.healthy
    }

    /// Names of services that are down, in service order
    pub fn down(&self) -> Vec<&str> {
        self.services
            .iter()
            .filter(|o| !o.healthy)
            .map(|o| o.name.as_str())
            .collect()
    }

    /// Render as pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
