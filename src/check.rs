//! Health check engine
//!
//! Provides:
//! - Service definitions with defaulted timeout, retries and interval
//! - Timeout-bounded command execution with process-group kill
//! - Per-service retry state machine
//! - Concurrent fan-out over all services with a single aggregate
//! - Poll loop for "wait until ready" mode

pub mod exec;
pub mod fanout;
pub mod poll;
pub mod report;
pub mod service;
pub mod spec;

pub use fanout::check_all;
pub use poll::wait_all;
pub use spec::ServiceSpec;
