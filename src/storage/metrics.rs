//! Shared metrics recording for storage adapters.
//!
//! Every adapter operation records:
//! 1. `storage_operations_total` - counter by backend, operation and status
//! 2. `storage_operation_duration_ms` - latency histogram with the same labels

use crate::Result;
use std::time::Instant;

/// Records operation metrics for a storage operation.
///
/// # Arguments
///
/// * `backend` - Backend name (e.g., "redb", "mongodb", "sqlite")
/// * `operation` - Operation name (e.g., "find", "insert")
/// * `start` - Operation start time from `Instant::now()`
/// * `status` - Operation status ("success" or "error")
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Runs `op` and records its metrics.
pub(crate) fn timed<T>(
    backend: &'static str,
    operation: &'static str,
    op: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let start = Instant::now();
    let result = op();
    let status = if result.is_ok() { "success" } else { "error" };
    record_operation_metrics(backend, operation, start, status);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_record_operation_metrics_timing() {
        let start = Instant::now();
        thread::sleep(Duration::from_millis(10));

        record_operation_metrics("sqlite", "find", start, "success");

        assert!(start.elapsed().as_millis() >= 10);
    }

    #[test]
    fn test_timed_passes_result_through() {
        let ok = timed("redb", "count", || Ok(3_u64));
        assert_eq!(ok.unwrap(), 3);

        let err: Result<()> = timed("redb", "count", || {
            Err(Error::NotConnected { backend: "redb" })
        });
        assert!(matches!(err, Err(Error::NotConnected { .. })));
    }

    #[test]
    fn test_record_operation_metrics_concurrent() {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let status = if i % 2 == 0 { "success" } else { "error" };
                thread::spawn(move || {
                    let start = Instant::now();
                    record_operation_metrics("mongodb", "insert", start, status);
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("Thread panicked");
        }
    }
}
