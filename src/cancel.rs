//! Run-wide cancellation
//!
//! Check commands run in their own process groups, so a Ctrl+C on the
//! terminal no longer reaches them. Instead the signal trips a token and
//! every in-flight executor kills its own command.

use crate::error::{Error, Result};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

/// Create a connected handle/token pair
pub fn channel() -> (CancelHandle, CancelToken) {
    let (tx, rx) = channel::bounded(0);
    (CancelHandle { tx: Some(tx) }, CancelToken { rx })
}

/// Owner side: dropping the sender disconnects every token at once
#[derive(Debug)]
pub struct CancelHandle {
    tx: Option<Sender<()>>,
}

impl CancelHandle {
    /// Trip the token
    pub fn cancel(&mut self) {
        self.tx.take();
    }
}

/// Observer side, cheap to clone into every worker
///
/// Nothing is ever sent on the channel; cancellation is its disconnection.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Receiver<()>,
}

impl CancelToken {
    /// A token that is never cancelled
    #[cfg(test)]
    pub fn never() -> Self {
        let (handle, token) = channel();
        // Leaking the sender keeps the channel connected forever
        std::mem::forget(handle);
        token
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.rx.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Sleep for `duration` unless cancelled first
    ///
    /// Returns `true` when the full duration elapsed.
    pub fn sleep(&self, duration: Duration) -> bool {
        match self.rx.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => true,
            Err(RecvTimeoutError::Disconnected) | Ok(()) => false,
        }
    }

    /// Receiver that becomes ready on cancellation, for `select!`
    pub fn receiver(&self) -> &Receiver<()> {
        &self.rx
    }
}

/// Trip `handle` on SIGINT or SIGTERM
///
/// Runs a current-thread tokio runtime on a detached thread. The process
/// exits through `main`, so the thread is never joined.
pub fn watch_signals(mut handle: CancelHandle) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Runtime(e.to_string()))?;

    // Register both handlers before returning so no signal slips through
    let mut terminate = rt
        .block_on(async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        })
        .map_err(|e| Error::Runtime(e.to_string()))?;
    let mut interrupt = rt
        .block_on(async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
        })
        .map_err(|e| Error::Runtime(e.to_string()))?;

    thread::Builder::new()
        .name("signal-watcher".to_string())
        .spawn(move || {
            rt.block_on(async {
                tokio::select! {
                    _ = interrupt.recv() => tracing::info!("received SIGINT"),
                    _ = terminate.recv() => tracing::info!("received SIGTERM"),
                }
            });
            handle.cancel();
        })?;

    Ok(())
}
