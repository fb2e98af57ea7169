//! Fixed-size in-process thread pool backed by rayon.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use rayon::ThreadPoolBuilder;
use tracing::debug;

use crate::utils::lock;
use crate::{BenchError, BenchResult};

use super::{Executor, Job};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PoolState {
    Created,
    Running,
    Shutdown,
}

/// Jobs spawned onto the pool that have not finished yet.
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
    panicked: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        *lock(&self.count) += 1;
    }

    fn leave(&self) {
        let mut count = lock(&self.count);
        *count -= 1;
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn wait_idle(&self) {
        let mut count = lock(&self.count);
        while *count > 0 {
            count = self
                .idle
                .wait(count)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }
}

/// Thread pool with `workers` rayon threads.
pub struct ThreadPool {
    name: String,
    workers: usize,
    state: Mutex<PoolState>,
    pool: Mutex<Option<Arc<rayon::ThreadPool>>>,
    in_flight: Arc<InFlight>,
}

impl ThreadPool {
    /// Create a pool; no threads exist until [`Executor::start`].
    pub fn new(name: impl Into<String>, workers: usize) -> BenchResult<Self> {
        if workers == 0 {
            return Err(BenchError::config("thread pool needs at least one worker"));
        }
        Ok(ThreadPool {
            name: name.into(),
            workers,
            state: Mutex::new(PoolState::Created),
            pool: Mutex::new(None),
            in_flight: Arc::new(InFlight::default()),
        })
    }

    /// Number of accepted jobs that have not finished.
    pub fn pending(&self) -> usize {
        *lock(&self.in_flight.count)
    }
}

impl Executor for ThreadPool {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_workers(&self) -> Option<usize> {
        Some(self.workers)
    }

    fn start(&self) -> BenchResult<()> {
        let mut state = lock(&self.state);
        if *state != PoolState::Created {
            return Err(BenchError::lifecycle(format!(
                "executor '{}' cannot start from state {:?}",
                self.name, *state
            )));
        }

        let prefix = self.name.clone();
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(move |i| format!("{prefix}-worker-{i}"))
            .build()
            .map_err(|e| BenchError::acquire(format!("executor '{}'", self.name), e))?;

        *lock(&self.pool) = Some(Arc::new(pool));
        *state = PoolState::Running;
        debug!(executor = %self.name, workers = self.workers, "thread pool started");
        Ok(())
    }

    fn shutdown(&self) -> BenchResult<()> {
        let mut state = lock(&self.state);
        if *state == PoolState::Shutdown {
            return Ok(());
        }
        *state = PoolState::Shutdown;
        let pool = lock(&self.pool).take();
        drop(state);

        // Every job accepted before the state flipped is counted; wait them out.
        self.in_flight.wait_idle();
        drop(pool);
        debug!(executor = %self.name, "thread pool shut down");

        let panicked = self.in_flight.panicked.swap(0, Ordering::SeqCst);
        if panicked > 0 {
            return Err(BenchError::Message(format!(
                "{panicked} job(s) on '{}' panicked",
                self.name
            )));
        }
        Ok(())
    }

    fn execute(&self, job: Job) -> BenchResult<()> {
        let state = lock(&self.state);
        let pool = match *state {
            PoolState::Running => lock(&self.pool).clone(),
            PoolState::Created => None,
            PoolState::Shutdown => {
                return Err(BenchError::lifecycle(format!(
                    "executor '{}' is shut down",
                    self.name
                )));
            }
        };
        let Some(pool) = pool else {
            return Err(BenchError::lifecycle(format!(
                "executor '{}' is not running",
                self.name
            )));
        };

        let in_flight = Arc::clone(&self.in_flight);
        in_flight.enter();
        drop(state);
        pool.spawn(move || {
            // An unwinding job would abort the process inside rayon.
            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                in_flight.panicked.fetch_add(1, Ordering::SeqCst);
            }
            in_flight.leave();
        });
        Ok(())
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::submit;
    use std::time::Duration;

    #[test]
    fn test_submit_before_start_fails() {
        let pool = ThreadPool::new("thread", 1).unwrap();
        assert!(matches!(
            submit(&pool, || Ok(())),
            Err(BenchError::Lifecycle(_))
        ));
    }

    #[test]
    fn test_shutdown_drains_queued_jobs() {
        let pool = ThreadPool::new("thread", 1).unwrap();
        pool.start().unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let futures: Vec<_> = (0..5)
            .map(|_| {
                let counter = Arc::clone(&counter);
                submit(&pool, move || {
                    std::thread::sleep(Duration::from_millis(2));
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap()
            })
            .collect();
        pool.shutdown().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        for f in futures {
            f.result().unwrap();
        }
    }

    #[test]
    fn test_shutdown_waits_for_running_jobs() {
        let pool = ThreadPool::new("thread", 2).unwrap();
        pool.start().unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let done = Arc::clone(&done);
            pool.execute(Box::new(move || {
                std::thread::sleep(Duration::from_millis(30));
                done.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }
        assert!(pool.pending() > 0);
        pool.shutdown().unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 4);
        assert_eq!(pool.pending(), 0);
    }

    #[test]
    fn test_raw_job_panic_reported_at_shutdown() {
        let pool = ThreadPool::new("thread", 1).unwrap();
        pool.start().unwrap();
        pool.execute(Box::new(|| panic!("raw job"))).unwrap();
        let err = pool.shutdown().unwrap_err();
        assert!(err.to_string().contains("1 job(s)"));
    }

    #[test]
    fn test_worker_threads_named_after_pool() {
        let pool = ThreadPool::new("dask", 1).unwrap();
        pool.start().unwrap();
        let name = submit(&pool, || {
            Ok(std::thread::current().name().map(str::to_string))
        })
        .unwrap()
        .result()
        .unwrap();
        assert_eq!(name.as_deref(), Some("dask-worker-0"));
        pool.shutdown().unwrap();
    }

    #[test]
    fn test_restart_and_submit_after_shutdown_fail() {
        let pool = ThreadPool::new("thread", 2).unwrap();
        pool.start().unwrap();
        pool.shutdown().unwrap();
        assert!(pool.start().is_err());
        assert!(submit(&pool, || Ok(())).is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(ThreadPool::new("thread", 0).is_err());
    }

    #[test]
    fn test_tasks_run_concurrently() {
        let pool = ThreadPool::new("thread", 4).unwrap();
        pool.start().unwrap();
        let start = std::time::Instant::now();
        let futures: Vec<_> = (0..4)
            .map(|_| {
                submit(&pool, || {
                    std::thread::sleep(Duration::from_millis(50));
                    Ok(())
                })
                .unwrap()
            })
            .collect();
        for f in futures {
            f.result().unwrap();
        }
        assert!(start.elapsed() < Duration::from_millis(190));
        pool.shutdown().unwrap();
    }
}
