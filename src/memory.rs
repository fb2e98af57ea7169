//! Background sampler of system memory usage.
//!
//! A [`MemoryProfiler`] moves through `Idle -> Running -> Stopped` exactly
//! once. While running it records one [`MemorySample`] per interval into an
//! in-memory log and, when attached, into a CSV sidecar.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::results::Record;
use crate::storage::{CsvSink, ResultSink};
use crate::utils::{lock, now_epoch};
use crate::{BenchError, BenchResult};

/// One reading of system memory, in bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemorySample {
    pub timestamp: f64,
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
}

impl Record for MemorySample {
    fn field_names() -> &'static [&'static str] {
        &["timestamp", "total_bytes", "available_bytes", "used_bytes", "free_bytes"]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilerState {
    Idle,
    Running,
    Stopped,
}

/// Wall-clock timestamps that never go backwards.
struct EpochClock {
    base_epoch: f64,
    base: Instant,
}

impl EpochClock {
    fn new() -> Self {
        EpochClock {
            base_epoch: now_epoch(),
            base: Instant::now(),
        }
    }

    fn now(&self) -> f64 {
        self.base_epoch + self.base.elapsed().as_secs_f64()
    }
}

#[cfg(feature = "mem")]
struct MemoryReader {
    sys: sysinfo::System,
}

#[cfg(feature = "mem")]
impl MemoryReader {
    fn new() -> Self {
        use sysinfo::{MemoryRefreshKind, RefreshKind, System};
        MemoryReader {
            sys: System::new_with_specifics(
                RefreshKind::new().with_memory(MemoryRefreshKind::new().with_ram()),
            ),
        }
    }

    fn read(&mut self, timestamp: f64) -> Option<MemorySample> {
        self.sys.refresh_memory();
        Some(MemorySample {
            timestamp,
            total_bytes: self.sys.total_memory(),
            available_bytes: self.sys.available_memory(),
            used_bytes: self.sys.used_memory(),
            free_bytes: self.sys.free_memory(),
        })
    }
}

#[cfg(not(feature = "mem"))]
struct MemoryReader;

#[cfg(not(feature = "mem"))]
impl MemoryReader {
    fn new() -> Self {
        MemoryReader
    }

    fn read(&mut self, _timestamp: f64) -> Option<MemorySample> {
        None
    }
}

pub struct MemoryProfiler {
    interval: Duration,
    state: Mutex<ProfilerState>,
    log: Arc<Mutex<Vec<MemorySample>>>,
    sink: Mutex<Option<CsvSink<MemorySample>>>,
    stop_tx: Mutex<Option<mpsc::Sender<()>>>,
    handle: Mutex<Option<JoinHandle<BenchResult<()>>>>,
}

impl MemoryProfiler {
    /// Create an idle profiler sampling every `interval`.
    pub fn new(interval: Duration, sink: Option<CsvSink<MemorySample>>) -> BenchResult<Self> {
        if interval.is_zero() {
            return Err(BenchError::config("memory profile interval must be positive"));
        }
        Ok(MemoryProfiler {
            interval,
            state: Mutex::new(ProfilerState::Idle),
            log: Arc::new(Mutex::new(Vec::new())),
            sink: Mutex::new(sink),
            stop_tx: Mutex::new(None),
            handle: Mutex::new(None),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> ProfilerState {
        *lock(&self.state)
    }

    /// Snapshot of every sample recorded so far.
    pub fn log(&self) -> Vec<MemorySample> {
        lock(&self.log).clone()
    }

    pub fn start(&self) -> BenchResult<()> {
        let mut state = lock(&self.state);
        if *state != ProfilerState::Idle {
            return Err(BenchError::lifecycle(format!(
                "memory profiler cannot start from state {:?}",
                *state
            )));
        }

        let (tx, rx) = mpsc::channel();
        let interval = self.interval;
        let log = Arc::clone(&self.log);
        let sink = lock(&self.sink).take();
        let handle = std::thread::Builder::new()
            .name("memory-profiler".into())
            .spawn(move || sample_loop(interval, rx, log, sink))?;

        *lock(&self.stop_tx) = Some(tx);
        *lock(&self.handle) = Some(handle);
        *state = ProfilerState::Running;
        debug!(interval_ms = interval.as_millis() as u64, "memory profiler started");
        Ok(())
    }

    /// Stop sampling and wait for the sampler thread.
    ///
    /// Stopping is terminal; stopping an already stopped profiler is a no-op.
    pub fn stop(&self) -> BenchResult<()> {
        let mut state = lock(&self.state);
        let previous = *state;
        *state = ProfilerState::Stopped;
        if previous != ProfilerState::Running {
            return Ok(());
        }

        if let Some(tx) = lock(&self.stop_tx).take() {
            let _ = tx.send(());
        }
        let handle = lock(&self.handle).take();
        drop(state);

        match handle.map(|h| h.join()) {
            Some(Ok(result)) => result,
            Some(Err(_)) => Err(BenchError::lifecycle("memory profiler thread panicked")),
            None => Ok(()),
        }
    }
}

impl Drop for MemoryProfiler {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn sample_loop(
    interval: Duration,
    stop: mpsc::Receiver<()>,
    log: Arc<Mutex<Vec<MemorySample>>>,
    mut sink: Option<CsvSink<MemorySample>>,
) -> BenchResult<()> {
    let clock = EpochClock::new();
    let mut reader = MemoryReader::new();
    let start = Instant::now();
    let mut tick: u32 = 0;

    loop {
        let Some(sample) = reader.read(clock.now()) else {
            warn!("memory sampling unavailable in this build; profiler idle");
            break;
        };
        if let Some(sink) = sink.as_mut() {
            sink.log(&sample)?;
        }
        lock(&log).push(sample);

        tick = tick.saturating_add(1);
        let next = start + interval * tick;
        match stop.recv_timeout(next.saturating_duration_since(Instant::now())) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    if let Some(mut sink) = sink {
        sink.close()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiler_collects_samples() {
        let profiler = MemoryProfiler::new(Duration::from_millis(1), None).unwrap();
        assert_eq!(profiler.state(), ProfilerState::Idle);
        profiler.start().unwrap();
        assert_eq!(profiler.state(), ProfilerState::Running);
        std::thread::sleep(Duration::from_millis(10));
        profiler.stop().unwrap();
        assert_eq!(profiler.state(), ProfilerState::Stopped);

        let log = profiler.log();
        assert!(log.len() >= 2, "only {} samples", log.len());
        assert!(log.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(log.iter().all(|s| s.total_bytes > 0));
    }

    #[test]
    fn test_sample_count_bounds() {
        let interval = Duration::from_millis(5);
        let profiler = MemoryProfiler::new(interval, None).unwrap();
        let started = Instant::now();
        profiler.start().unwrap();
        std::thread::sleep(Duration::from_millis(52));
        profiler.stop().unwrap();
        let elapsed = started.elapsed().as_secs_f64();

        let count = profiler.log().len() as f64;
        let ratio = elapsed / interval.as_secs_f64();
        assert!(count <= ratio.ceil() + 1.0, "{count} samples in {ratio} intervals");
        // The sampler thread starts slightly after `started`, allow that slack.
        assert!(count >= (ratio - 1.0).floor(), "{count} samples in {ratio} intervals");
    }

    #[test]
    fn test_restart_after_stop_fails() {
        let profiler = MemoryProfiler::new(Duration::from_millis(1), None).unwrap();
        profiler.start().unwrap();
        profiler.stop().unwrap();
        assert!(matches!(profiler.start(), Err(BenchError::Lifecycle(_))));
        // stop stays terminal and idempotent
        profiler.stop().unwrap();
    }

    #[test]
    fn test_double_start_fails() {
        let profiler = MemoryProfiler::new(Duration::from_millis(1), None).unwrap();
        profiler.start().unwrap();
        assert!(profiler.start().is_err());
        profiler.stop().unwrap();
    }

    #[test]
    fn test_profiler_writes_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results-memory.csv");
        let sink = CsvSink::open(&path).unwrap();
        let profiler = MemoryProfiler::new(Duration::from_millis(2), Some(sink)).unwrap();
        profiler.start().unwrap();
        std::thread::sleep(Duration::from_millis(10));
        profiler.stop().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().unwrap(),
            "timestamp,total_bytes,available_bytes,used_bytes,free_bytes"
        );
        assert_eq!(lines.count(), profiler.log().len());
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(MemoryProfiler::new(Duration::ZERO, None).is_err());
    }
}
