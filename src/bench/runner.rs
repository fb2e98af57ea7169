//! Drive a benchmark over its configs and repeats.

use std::time::Instant;

use tracing::{info, warn};

use super::Benchmark;
use crate::logging::{BENCH, TEST};
use crate::storage::ResultSink;
use crate::utils::millis;
use crate::{BenchError, BenchResult};

/// Enter `benchmark`, run every config `repeat` times, log each record to
/// `sink`, and exit.
///
/// The benchmark is always exited; a run error is returned after its
/// resources were released. Benchmarks that repeat internally are driven
/// with `repeat == 1`.
pub fn run<B: Benchmark>(
    benchmark: &mut B,
    configs: &[B::Config],
    sink: &mut dyn ResultSink<B::Result>,
    repeat: usize,
) -> BenchResult<()> {
    if repeat == 0 {
        return Err(BenchError::config("repeat must be at least 1"));
    }

    benchmark.enter()?;
    info!(target: BENCH, benchmark = benchmark.name(), config = ?benchmark.config(), "benchmark entered");

    let outcome = run_all(benchmark, configs, sink, repeat);
    let exited = benchmark.exit();
    match (outcome, exited) {
        (Ok(()), exited) => exited,
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(exit_err)) => {
            warn!("exiting after a failed run also failed: {exit_err}");
            Err(e)
        }
    }
}

fn run_all<B: Benchmark>(
    benchmark: &mut B,
    configs: &[B::Config],
    sink: &mut dyn ResultSink<B::Result>,
    repeat: usize,
) -> BenchResult<()> {
    let total = configs.len();
    for (i, config) in configs.iter().enumerate() {
        info!(target: TEST, "config {}/{total}: {config:?}", i + 1);
        for r in 0..repeat {
            let started = Instant::now();
            let records = benchmark.run(config)?.into_records();
            info!(
                target: BENCH,
                benchmark = benchmark.name(),
                config = i + 1,
                repeat = r + 1,
                records = records.len(),
                wall_ms = millis(started.elapsed()),
                "run complete"
            );
            for record in &records {
                sink.log(record)?;
            }
        }
    }
    Ok(())
}
