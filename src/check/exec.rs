//! Timeout-bounded command execution
//!
//! Runs one check command through `bash -c` and races its exit against a
//! deadline and the run's cancellation token. The child stays owned here
//! until it is reaped, so a kill can never hit a recycled pid.

use crate::cancel::CancelToken;
use crate::check::spec::KillMode;
use crate::error::{Error, Result};
use crate::log::{Level, LogSink};
use crossbeam::channel::{after, select, tick};
use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;
use tracing::{debug, error, warn};

/// How often a running command is polled for exit
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Result of a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// Exited with status 0 before the deadline
    Up,
    /// Exited nonzero, died by signal, or could not be launched
    Failed,
    /// Still running at the deadline and killed
    TimedOut,
    /// Killed because the run was interrupted
    Cancelled,
}

/// Run `command` to completion or until `timeout` elapses
///
/// Logs the command at verbose level, then at most one terminal line: the
/// failure reason, the timeout, or the cancellation. Success is silent here.
///
/// Only a failed kill is an `Err`: the command may still be running and
/// nothing further can be trusted.
pub fn run_with_timeout(
    command: &str,
    timeout: Duration,
    kill_mode: KillMode,
    log: &dyn LogSink,
    cancel: &CancelToken,
) -> Result<Attempt> {
    log.log(command, Level::Verbose);

    if cancel.is_cancelled() {
        log.log("cancelled", Level::Verbose);
        return Ok(Attempt::Cancelled);
    }

    let mut cmd = Command::new("bash");
    cmd.args(["-c", command])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if kill_mode == KillMode::ProcessGroup {
        cmd.process_group(0);
    }

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            log.log(&e.to_string(), Level::Verbose);
            return Ok(Attempt::Failed);
        }
    };
    debug!(pid = child.id(), command, %kill_mode, "spawned check command");

    let deadline = after(timeout);
    let ticker = tick(POLL_INTERVAL);

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(exited(status, log)),
            Ok(None) => {}
            Err(e) => {
                // Unobservable child: do not let it outlive the check
                terminate(&mut child, command, kill_mode)?;
                log.log(&e.to_string(), Level::Verbose);
                return Ok(Attempt::Failed);
            }
        }

        select! {
            recv(ticker) -> _ => {}
            recv(deadline) -> _ => {
                if let Ok(Some(status)) = child.try_wait() {
                    return Ok(exited(status, log));
                }
                terminate(&mut child, command, kill_mode)?;
                log.log(
                    &format!("timed out after {} seconds", timeout.as_secs()),
                    Level::Verbose,
                );
                return Ok(Attempt::TimedOut);
            }
            recv(cancel.receiver()) -> _ => {
                terminate(&mut child, command, kill_mode)?;
                log.log("cancelled", Level::Verbose);
                return Ok(Attempt::Cancelled);
            }
        }
    }
}

/// Map an exit status to an attempt, logging why it failed
fn exited(status: ExitStatus, log: &dyn LogSink) -> Attempt {
    if status.success() {
        return Attempt::Up;
    }

    let reason = match (status.code(), status.signal()) {
        (Some(code), _) => format!("exit status {}", code),
        (None, Some(signal)) => format!("killed by signal {}", signal),
        (None, None) => status.to_string(),
    };
    log.log(&reason, Level::Verbose);
    Attempt::Failed
}

/// SIGKILL the command (or its whole group) and reap it
fn terminate(child: &mut Child, command: &str, kill_mode: KillMode) -> Result<()> {
    let pid = Pid::from_raw(child.id() as i32);
    let sent = match kill_mode {
        KillMode::ProcessGroup => killpg(pid, Signal::SIGKILL),
        KillMode::Process => kill(pid, Signal::SIGKILL),
    };
    // The leader is an unreaped zombie until `wait` below, so ESRCH here
    // can only mean every member is already gone
    check_kill(sent, command, pid)?;
    debug!(pid = pid.as_raw(), %kill_mode, "killed check command");

    if let Err(e) = child.wait() {
        warn!(pid = pid.as_raw(), error = %e, "failed to reap killed check command");
    }
    Ok(())
}

/// `ESRCH` means the target is already gone, which is what we wanted
fn check_kill(sent: nix::Result<()>, command: &str, pid: Pid) -> Result<()> {
    match sent {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(source) => {
            error!(
                pid = pid.as_raw(),
                command,
                error = %source,
                "failed to kill timed out check command, it may still be running"
            );
            Err(Error::KillFailed {
                command: command.to_string(),
                pid: pid.as_raw(),
                source,
            })
        }
    }
}
