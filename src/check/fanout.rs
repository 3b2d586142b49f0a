//! Concurrent fan-out over all services
//!
//! One scoped thread per service. Each worker hands its outcome back through
//! its own join handle, so no two workers ever write the same place, and the
//! aggregate is computed once by the caller after every handle is joined.

use crate::cancel::CancelToken;
use crate::check::report::{CheckOutcome, Report};
use crate::check::service::check_service;
use crate::check::spec::ServiceSpec;
use crate::error::{Error, Result};
use crate::log::LogSink;
use tracing::{debug, error};

/// Thread names may not contain NUL
fn thread_name(service: &str) -> String {
    format!("check:{}", service.replace('\0', ""))
}

/// Check every service in parallel and wait for all of them
///
/// Runtime is bounded by the slowest service, not the sum. A fatal error
/// from any worker (failed kill, panic) is returned only after the barrier;
/// cancellation is reported if nothing worse happened.
pub fn check_all(
    services: &[ServiceSpec],
    log: &dyn LogSink,
    cancel: &CancelToken,
) -> Result<Report> {
    let slots = crossbeam::scope(|scope| {
        let handles: Vec<_> = services
            .iter()
            .map(|spec| {
                scope
                    .builder()
                    .name(thread_name(&spec.name))
                    .spawn(move |_| check_service(spec, log, cancel))
            })
            .collect();
        debug!(workers = handles.len(), "spawned check workers");

        handles
            .into_iter()
            .zip(services)
            .map(|(handle, spec)| -> Result<CheckOutcome> {
                handle?.join().map_err(|_| {
                    error!(service = %spec.name, "check worker panicked");
                    Error::WorkerPanicked {
                        service: spec.name.clone(),
                    }
                })?
            })
            .collect::<Vec<_>>()
    })
    .map_err(|_| Error::WorkerPanicked {
        service: "<scope>".to_string(),
    })?;

    let mut outcomes = Vec::with_capacity(slots.len());
    let mut cancelled = false;
    for slot in slots {
        match slot {
            Ok(outcome) => outcomes.push(outcome),
            Err(Error::Cancelled) => cancelled = true,
            Err(e) => return Err(e),
        }
    }
    if cancelled {
        return Err(Error::Cancelled);
    }

    let report = Report::new(outcomes);
    debug!(healthy = report.all_up(), services = report.services.len(), "check pass complete");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel;
    use crate::log::{Level, MemorySink};
    use std::thread;
    use std::time::{Duration, Instant};

    fn service(name: &str, command: &str) -> ServiceSpec {
        ServiceSpec::new(name, command)
            .with_timeout(1)
            .with_interval(0)
    }

    fn run(services: &[ServiceSpec], log: &MemorySink) -> Report {
        check_all(services, log, &CancelToken::never()).unwrap()
    }

    #[test]
    fn test_check_all_all_up() {
        let log = MemorySink::new();
        let services = vec![service("service_1", "exit 0"), service("service_2", "exit 0")];
        assert!(run(&services, &log).all_up());
    }

    #[test]
    fn test_check_all_some_down() {
        let log = MemorySink::new();
        let services = vec![service("service_1", "exit 0"), service("service_2", "exit 1")];

        let report = run(&services, &log);
        assert!(!report.all_up());
        assert_eq!(report.down(), vec!["service_2"]);
        assert!(log.contains("service_2 | down", Level::Normal));
    }

    #[test]
    fn test_check_all_empty_is_up() {
        let log = MemorySink::new();
        let report = run(&[], &log);
        assert!(report.all_up());
        assert!(log.lines().is_empty());
    }

    #[test]
    fn test_check_all_runs_concurrently() {
        let log = MemorySink::new();
        let services: Vec<ServiceSpec> = (0..4)
            .map(|i| service(&format!("service_{}", i), "sleep 1").with_timeout(3))
            .collect();

        let start = Instant::now();
        let report = run(&services, &log);
        let elapsed = start.elapsed();

        assert!(report.all_up());
        assert!(elapsed >= Duration::from_secs(1));
        assert!(
            elapsed < Duration::from_secs(2),
            "checks should run concurrently, took {:?}",
            elapsed
        );
    }

    #[test]
    fn test_check_all_bounded_by_slowest_retry_chain() {
        let log = MemorySink::new();
        // 2 timed out attempts plus a 1s interval, next to two fast services
        let services = vec![
            service("slow", "sleep 5").with_retries(1).with_interval(1),
            service("fast_1", "exit 0"),
            service("fast_2", "exit 1"),
        ];

        let start = Instant::now();
        let report = run(&services, &log);
        let elapsed = start.elapsed();

        assert_eq!(report.down(), vec!["slow", "fast_2"]);
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(5), "took {:?}", elapsed);
    }

    #[test]
    fn test_check_all_every_partition() {
        let names = ["alpha", "beta", "gamma"];
        for mask in 0u8..(1 << names.len()) {
            let services: Vec<ServiceSpec> = names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let up = mask & (1 << i) != 0;
                    service(name, if up { "exit 0" } else { "exit 1" })
                })
                .collect();

            let log = MemorySink::new();
            let report = run(&services, &log);
            let all_up = mask == (1 << names.len()) - 1;
            assert_eq!(report.all_up(), all_up, "mask {:03b}", mask);

            for (i, outcome) in report.services.iter().enumerate() {
                assert_eq!(outcome.name, names[i]);
                assert_eq!(outcome.healthy, mask & (1 << i) != 0, "mask {:03b}", mask);
            }
        }
    }

    #[test]
    fn test_check_all_is_idempotent() {
        let services = vec![service("a", "exit 0"), service("b", "true"), service("c", ":")];
        for _ in 0..5 {
            let log = MemorySink::new();
            let report = run(&services, &log);
            assert!(report.all_up());
            assert_eq!(report.services.len(), 3);
            assert!(report.services.iter().all(|o| o.attempts == 1));
        }
    }

    #[test]
    fn test_check_all_duplicate_names_are_independent() {
        let log = MemorySink::new();
        let services = vec![service("dup", "exit 0"), service("dup", "exit 1")];

        let report = run(&services, &log);
        assert!(report.services[0].healthy);
        assert!(!report.services[1].healthy);
        assert_eq!(log.count("dup | trying"), 2);
    }

    #[test]
    fn test_check_all_name_with_nul() {
        let log = MemorySink::new();
        let services = vec![service("bad\0name", "exit 1")];

        let report = run(&services, &log);
        assert_eq!(report.down(), vec!["bad\0name"]);
        assert_eq!(thread_name("bad\0name"), "check:badname");
    }

    #[test]
    fn test_check_all_keeps_each_service_in_order() {
        let log = MemorySink::new();
        let services: Vec<ServiceSpec> = (0..6)
            .map(|i| service(&format!("s{}", i), "exit 1").with_retries(2))
            .collect();

        run(&services, &log);
        for i in 0..6 {
            let own = log.with_prefix(&format!("s{} | ", i));
            assert_eq!(own.first().map(String::as_str), Some(format!("s{} | trying", i).as_str()));
            assert_eq!(own.last().map(String::as_str), Some(format!("s{} | down", i).as_str()));
            assert_eq!(own.iter().filter(|l| l.ends_with("| trying")).count(), 3);
        }
    }

    #[test]
    fn test_check_all_cancelled() {
        let (mut handle, token) = cancel::channel();
        let log = MemorySink::new();
        let services = vec![
            service("hang", "sleep 30").with_timeout(60),
            service("quick", "exit 0"),
        ];

        let start = Instant::now();
        thread::scope(|s| {
            let pass = s.spawn(|| check_all(&services, &log, &token));
            thread::sleep(Duration::from_millis(300));
            handle.cancel();
            assert!(matches!(pass.join().unwrap(), Err(Error::Cancelled)));
        });
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
