//! Small helpers shared by the benchmarks: payload generation and wall-clock waits.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::RngCore;

use crate::{BenchError, BenchResult};

/// Random payload of exactly `size` bytes.
pub fn randbytes(size: usize) -> Vec<u8> {
    let mut buf = vec![0u8; size];
    rand::rng().fill_bytes(&mut buf);
    buf
}

/// Seconds since the Unix epoch as a float.
pub fn now_epoch() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Block until the wall clock reaches `timestamp` (epoch seconds).
///
/// Returns immediately when the timestamp is already in the past.
pub fn wait_until(timestamp: f64) {
    loop {
        let remaining = timestamp - now_epoch();
        if remaining <= 0.0 {
            return;
        }
        std::thread::sleep(Duration::from_secs_f64(remaining));
    }
}

/// UTC timestamp formatted for run directory names (`YYYY-MM-DD-HH-MM-SS`).
pub fn utc_slug_timestamp() -> BenchResult<String> {
    let format = time::format_description::parse("[year]-[month]-[day]-[hour]-[minute]-[second]")
        .map_err(|e| BenchError::Message(e.to_string()))?;
    time::OffsetDateTime::now_utc()
        .format(&format)
        .map_err(|e| BenchError::Message(e.to_string()))
}

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Convert a duration to fractional milliseconds.
pub fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Validate a `seconds` float coming from the CLI and turn it into a duration.
pub fn seconds(value: f64, what: &str) -> BenchResult<Duration> {
    if !value.is_finite() || value < 0.0 {
        return Err(BenchError::config(format!(
            "{what} must be a non-negative number of seconds, got {value}"
        )));
    }
    Duration::try_from_secs_f64(value).map_err(|e| {
        BenchError::config(format!("{what} of {value} seconds is out of range: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_randbytes_length() {
        for size in [0, 1, 7, 1024] {
            assert_eq!(randbytes(size).len(), size);
        }
    }

    #[test]
    fn test_wait_until_past_returns_immediately() {
        let start = Instant::now();
        wait_until(now_epoch() - 10.0);
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn test_wait_until_future_blocks() {
        let start = Instant::now();
        wait_until(now_epoch() + 0.05);
        assert!(start.elapsed() >= Duration::from_millis(45));
    }

    #[test]
    fn test_slug_timestamp_shape() {
        let ts = utc_slug_timestamp().unwrap();
        assert_eq!(ts.len(), 19);
        assert_eq!(ts.matches('-').count(), 5);
    }

    #[test]
    fn test_seconds_rejects_negative() {
        assert!(seconds(-1.0, "sleep").is_err());
        assert_eq!(seconds(0.5, "sleep").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn test_seconds_rejects_values_beyond_duration_range() {
        let err = seconds(1e20, "--task-sleep").unwrap_err();
        assert!(matches!(err, BenchError::Config(ref m) if m.contains("--task-sleep")));
        assert!(seconds(f64::MAX, "--future-timeout").is_err());
        assert!(seconds(1e9, "--future-timeout").is_ok());
    }
}
