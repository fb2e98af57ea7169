//! Task executors.
//!
//! The harness only ever talks to an executor through [`submit`], which hands
//! a closure to the engine and returns a [`TaskFuture`] that completes
//! independently of the caller.

pub mod pool;

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use crate::{BenchError, BenchResult};

pub use pool::ThreadPool;

/// Unit of work accepted by an executor.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A scoped submission engine.
///
/// `start` and `shutdown` bracket the executor's lifetime; `shutdown` must
/// leave every job accepted before it either completed or dropped.
pub trait Executor: Send + Sync {
    /// Kind label used in results and logs (e.g. "thread").
    fn name(&self) -> &str;

    /// Worker count hint, if the engine has one.
    fn max_workers(&self) -> Option<usize>;

    fn start(&self) -> BenchResult<()>;

    fn shutdown(&self) -> BenchResult<()>;

    /// Queue a job for execution.
    fn execute(&self, job: Job) -> BenchResult<()>;
}

/// Handle to the eventual result of a submitted task.
#[derive(Debug)]
pub struct TaskFuture<T> {
    rx: mpsc::Receiver<BenchResult<T>>,
}

impl<T> TaskFuture<T> {
    /// Block until the task finishes.
    pub fn result(self) -> BenchResult<T> {
        self.rx
            .recv()
            .map_err(|_| BenchError::Task("task was dropped before completing".into()))?
    }

    /// Block for at most `timeout`.
    pub fn result_timeout(self, timeout: Duration) -> BenchResult<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(BenchError::Timeout(format!(
                "task did not finish within {timeout:?}"
            ))),
            Err(RecvTimeoutError::Disconnected) => {
                Err(BenchError::Task("task was dropped before completing".into()))
            }
        }
    }
}

/// Submit `task` to `executor`.
///
/// Errors returned by the task, and panics inside it, resolve the future to
/// `BenchError::Task`.
pub fn submit<T, F>(executor: &dyn Executor, task: F) -> BenchResult<TaskFuture<T>>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    executor.execute(Box::new(move || {
        let result = match catch_unwind(AssertUnwindSafe(task)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(BenchError::Task(format!("{err:#}"))),
            Err(panic) => Err(BenchError::Task(panic_message(panic.as_ref()))),
        };
        // The caller may have stopped waiting; nothing to do then.
        let _ = tx.send(result);
    }))?;
    Ok(TaskFuture { rx })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("task panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("task panicked: {s}")
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> ThreadPool {
        let pool = ThreadPool::new("thread", 2).unwrap();
        pool.start().unwrap();
        pool
    }

    #[test]
    fn test_submit_returns_value() {
        let pool = pool();
        let future = submit(&pool, || Ok(21 * 2)).unwrap();
        assert_eq!(future.result().unwrap(), 42);
        pool.shutdown().unwrap();
    }

    #[test]
    fn test_task_error_propagates() {
        let pool = pool();
        let future = submit::<(), _>(&pool, || anyhow::bail!("boom")).unwrap();
        let err = future.result().unwrap_err();
        assert!(matches!(err, BenchError::Task(ref m) if m.contains("boom")));
        pool.shutdown().unwrap();
    }

    #[test]
    fn test_task_panic_propagates() {
        let pool = pool();
        let future = submit::<(), _>(&pool, || panic!("kaboom")).unwrap();
        let err = future.result().unwrap_err();
        assert!(err.to_string().contains("kaboom"));
        // The worker survives the panic.
        assert_eq!(submit(&pool, || Ok(1)).unwrap().result().unwrap(), 1);
        pool.shutdown().unwrap();
    }

    #[test]
    fn test_result_timeout() {
        let pool = pool();
        let future = submit(&pool, || {
            std::thread::sleep(Duration::from_millis(200));
            Ok(())
        })
        .unwrap();
        let err = future.result_timeout(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, BenchError::Timeout(_)));
        pool.shutdown().unwrap();
    }
}
