//! Per-service retry controller
//!
//! Type-safe linear retry machine using the state-machines crate:
//! `Attempting` either passes to `Succeeded`, fails over to `Waiting`, or is
//! exhausted into `Failed`. `Waiting` sleeps the fixed interval and retries.
//! No backoff, no jitter.

use crate::cancel::CancelToken;
use crate::check::exec::{run_with_timeout, Attempt};
use crate::check::report::CheckOutcome;
use crate::check::spec::ServiceSpec;
use crate::error::{Error, Result};
use crate::log::{Level, LogSink, ServiceLog};
use std::time::Instant;

// Kept apart from the crate `Result` alias, which the macro expansion would pick up
mod machine {
    use state_machines::state_machine;

    state_machine! {
        name: RetryMachine,
        dynamic: true,
        initial: Attempting,
        states: [Attempting, Waiting, Succeeded, Failed],
        events {
            pass {
                transition: { from: Attempting, to: Succeeded }
            }
            fail {
                transition: { from: Attempting, to: Waiting }
            }
            retry {
                transition: { from: Waiting, to: Attempting }
            }
            exhaust {
                transition: { from: Attempting, to: Failed }
            }
        }
    }
}

use machine::{DynamicRetryMachine, RetryMachine, RetryMachineEvent};

/// Retry state for matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Attempting,
    Waiting,
    Succeeded,
    Failed,
}

impl RetryState {
    /// Parse state from the machine's string representation
    pub fn from_machine(s: &str) -> Result<Self> {
        match s {
            "Attempting" => Ok(RetryState::Attempting),
            "Waiting" => Ok(RetryState::Waiting),
            "Succeeded" => Ok(RetryState::Succeeded),
            "Failed" => Ok(RetryState::Failed),
            other => Err(Error::Transition(format!("unknown state '{}'", other))),
        }
    }
}

/// Drive the machine, mapping a refused transition to an error
fn transition(machine: &mut DynamicRetryMachine<()>, event: RetryMachineEvent) -> Result<()> {
    machine
        .handle(event)
        .map_err(|e| Error::Transition(format!("{:?}", e)))
}

/// Check one service, retrying up to `spec.retries` more times
///
/// Every message goes through a `ServiceLog` so it carries the service name.
/// `down` is the only normal-level line; everything else is verbose.
pub fn check_service(
    spec: &ServiceSpec,
    log: &dyn LogSink,
    cancel: &CancelToken,
) -> Result<CheckOutcome> {
    let log = ServiceLog::new(&spec.name, log);
    let started = Instant::now();
    let mut machine = RetryMachine::new(()).into_dynamic();
    let mut attempts: u32 = 0;

    loop {
        match RetryState::from_machine(machine.current_state())? {
            RetryState::Attempting => {
                log.log("trying", Level::Verbose);
                attempts += 1;

                let attempt = run_with_timeout(
                    &spec.command,
                    spec.timeout_duration(),
                    spec.kill_mode,
                    &log,
                    cancel,
                )?;

                match attempt {
                    Attempt::Up => transition(&mut machine, RetryMachineEvent::Pass)?,
                    Attempt::Cancelled => return Err(Error::Cancelled),
                    Attempt::Failed | Attempt::TimedOut if attempts < spec.max_attempts() => {
                        transition(&mut machine, RetryMachineEvent::Fail)?
                    }
                    Attempt::Failed | Attempt::TimedOut => {
                        transition(&mut machine, RetryMachineEvent::Exhaust)?
                    }
                }
            }
            RetryState::Waiting => {
                log.log(&format!("sleep {} interval", spec.interval), Level::Verbose);
                if !cancel.sleep(spec.interval_duration()) {
                    return Err(Error::Cancelled);
                }
                transition(&mut machine, RetryMachineEvent::Retry)?;
            }
            RetryState::Succeeded => {
                log.log("up", Level::Verbose);
                return Ok(CheckOutcome::new(&spec.name, true, attempts, started.elapsed()));
            }
            RetryState::Failed => {
                log.log("down", Level::Normal);
                return Ok(CheckOutcome::new(&spec.name, false, attempts, started.elapsed()));
            }
        }
    }
}
