//! Poll loop for "wait until ready" mode

use crate::cancel::CancelToken;
use crate::check::fanout::check_all;
use crate::check::report::Report;
use crate::check::spec::ServiceSpec;
use crate::error::{Error, Result};
use crate::log::{Level, LogSink};
use std::time::Duration;
use tracing::debug;

/// Default delay between failed passes
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_secs(1);

/// Repeat `check_all` until every service is up in the same pass
///
/// This blocks without limit: there is no iteration cap and no deadline.
/// It returns an all-up report, or an error when the run is cancelled or a
/// pass hits a fatal error. Callers that need a deadline must impose one
/// themselves, e.g. by tripping the cancellation token.
pub fn wait_all(
    services: &[ServiceSpec],
    log: &dyn LogSink,
    cancel: &CancelToken,
    delay: Duration,
) -> Result<Report> {
    let mut pass: u64 = 0;
    loop {
        pass += 1;
        let report = check_all(services, log, cancel)?;
        if report.all_up() {
            debug!(pass, "all services up");
            return Ok(report);
        }

        debug!(pass, down = ?report.down(), "services still down");
        log.log("retrying check up", Level::Verbose);
        if !cancel.sleep(delay) {
            return Err(Error::Cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel;
    use crate::log::MemorySink;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_wait_all_returns_immediately_when_up() {
        let log = MemorySink::new();
        let services = vec![ServiceSpec::new("a", "exit 0"), ServiceSpec::new("b", "exit 0")];

        let report = wait_all(&services, &log, &CancelToken::never(), DEFAULT_POLL_DELAY).unwrap();
        assert!(report.all_up());
        assert_eq!(log.count("retrying check up"), 0);
    }

    #[test]
    fn test_wait_all_until_marker_exists() {
        let marker = std::env::temp_dir().join(format!("checkup-wait-{}", std::process::id()));
        let _ = std::fs::remove_file(&marker);
        let log = MemorySink::new();
        let services = vec![ServiceSpec::new(
            "service_1",
            &format!("test -f {}", marker.display()),
        )];

        thread::scope(|s| {
            let waiter = s.spawn(|| {
                wait_all(&services, &log, &CancelToken::never(), Duration::from_millis(100))
            });
            thread::sleep(Duration::from_millis(500));
            std::fs::write(&marker, b"").unwrap();

            let report = waiter.join().unwrap().unwrap();
            assert!(report.all_up());
        });
        let _ = std::fs::remove_file(&marker);

        assert!(log.count("retrying check up") >= 1);
        assert!(log.contains("retrying check up", Level::Verbose));
        assert!(log.contains("service_1 | down", Level::Normal));
        assert!(log.contains("service_1 | exit status 1", Level::Verbose));
        assert!(log.contains("service_1 | up", Level::Verbose));

        let lines: Vec<String> = log.lines().into_iter().map(|(m, _)| m).collect();
        let retry_at = lines.iter().position(|l| l == "retrying check up").unwrap();
        let up_at = lines.iter().position(|l| l == "service_1 | up").unwrap();
        assert!(retry_at < up_at);
    }

    #[test]
    fn test_wait_all_requires_simultaneous_success() {
        // "a" alternates up/down between passes, "b" comes up on the third pass
        let dir = tempfile::tempdir().unwrap();
        let flip = dir.path().join("flip");
        let count = dir.path().join("count");
        let services = vec![
            ServiceSpec::new(
                "a",
                &format!(
                    "if [ -f {f} ]; then rm {f}; exit 0; else touch {f}; exit 1; fi",
                    f = flip.display()
                ),
            ),
            ServiceSpec::new(
                "b",
                &format!(
                    "n=$(cat {c} 2>/dev/null || echo 0); n=$((n+1)); echo $n > {c}; [ $n -ge 3 ]",
                    c = count.display()
                ),
            ),
        ];

        let log = MemorySink::new();
        let report = wait_all(&services, &log, &CancelToken::never(), Duration::ZERO).unwrap();
        assert!(report.all_up());
        // Pass 1: a down, b down. Pass 2: a up, b down. Pass 3: a down, b up.
        // Pass 4: a up, b up.
        assert_eq!(log.count("retrying check up"), 3);
    }

    #[test]
    fn test_wait_all_cancelled() {
        let (mut handle, token) = cancel::channel();
        let log = MemorySink::new();
        let services = vec![ServiceSpec::new("never", "exit 1")];

        let start = Instant::now();
        thread::scope(|s| {
            let waiter = s.spawn(|| wait_all(&services, &log, &token, Duration::from_millis(50)));
            thread::sleep(Duration::from_millis(400));
            handle.cancel();
            assert!(matches!(waiter.join().unwrap(), Err(Error::Cancelled)));
        });
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(log.count("retrying check up") >= 1);
    }
}
