//! Benchmark framework: scoped resources, the benchmark and matrix traits,
//! and the runner that drives them.

pub mod runner;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use clap::{ArgMatches, Command};
use tracing::{debug, warn};

use crate::executor::Executor;
use crate::memory::MemoryProfiler;
use crate::results::Record;
use crate::store::Store;
use crate::stream::StreamPair;
use crate::utils::lock;
use crate::{BenchError, BenchResult};

pub use runner::run;

type Release = Box<dyn FnOnce() -> BenchResult<()> + Send>;

/// LIFO of named release callbacks.
#[derive(Default)]
pub struct ExitStack {
    callbacks: Vec<(String, Release)>,
}

impl fmt::Debug for ExitStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.callbacks.iter().map(|(name, _)| name)).finish()
    }
}

impl ExitStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, release: impl FnOnce() -> BenchResult<()> + Send + 'static) {
        self.callbacks.push((name.into(), Box::new(release)));
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Run every callback, newest first. All callbacks run even if some
    /// fail; the first failure is returned.
    pub fn close(&mut self) -> BenchResult<()> {
        let mut first_err = None;
        while let Some((name, release)) = self.callbacks.pop() {
            match release() {
                Ok(()) => debug!(resource = %name, "released"),
                Err(e) => {
                    warn!(resource = %name, "release failed: {e}");
                    first_err.get_or_insert(e);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

impl Drop for ExitStack {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeState {
    Created,
    Entered,
    Exited,
}

/// Resources a benchmark borrows for the duration of its scope.
///
/// Resources arrive materialized but not acquired; [`Resources::enter`]
/// starts the executor, opens the store and starts the profiler, in that
/// order, and [`Resources::exit`] releases them in reverse.
pub struct Resources {
    executor: Option<Arc<dyn Executor>>,
    store: Option<Store>,
    stream: Option<Arc<Mutex<Option<StreamPair>>>>,
    stream_kind: Option<String>,
    profiler: Option<Arc<MemoryProfiler>>,
    stack: ExitStack,
    state: ScopeState,
}

impl Default for Resources {
    fn default() -> Self {
        Resources {
            executor: None,
            store: None,
            stream: None,
            stream_kind: None,
            profiler: None,
            stack: ExitStack::new(),
            state: ScopeState::Created,
        }
    }
}

impl fmt::Debug for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resources")
            .field("labels", &self.labels())
            .field("state", &self.state)
            .finish()
    }
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn with_store(mut self, store: Option<Store>) -> Self {
        self.store = store;
        self
    }

    pub fn with_stream(mut self, stream: Option<StreamPair>) -> Self {
        self.stream_kind = stream.as_ref().map(|s| s.kind.clone());
        self.stream = stream.map(|s| Arc::new(Mutex::new(Some(s))));
        self
    }

    pub fn with_profiler(mut self, profiler: Option<MemoryProfiler>) -> Self {
        self.profiler = profiler.map(Arc::new);
        self
    }

    /// The executor, or a config error if the benchmark was built without one.
    pub fn executor(&self) -> BenchResult<&Arc<dyn Executor>> {
        self.executor
            .as_ref()
            .ok_or_else(|| BenchError::config("this benchmark requires an executor"))
    }

    pub fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }

    pub fn profiler(&self) -> Option<&Arc<MemoryProfiler>> {
        self.profiler.as_ref()
    }

    pub fn has_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Borrow the stream for one run. Hand it back with
    /// [`Resources::restore_stream`]; a stream that is not returned is
    /// dropped, which disconnects it.
    pub fn take_stream(&self) -> BenchResult<StreamPair> {
        let slot = self
            .stream
            .as_ref()
            .ok_or_else(|| BenchError::config("this benchmark requires a stream"))?;
        lock(slot)
            .take()
            .ok_or_else(|| BenchError::lifecycle("stream is already in use or was lost by a failed run"))
    }

    pub fn restore_stream(&self, pair: StreamPair) {
        if let Some(slot) = &self.stream {
            *lock(slot) = Some(pair);
        }
    }

    pub fn is_entered(&self) -> bool {
        self.state == ScopeState::Entered
    }

    pub fn ensure_entered(&self) -> BenchResult<()> {
        match self.state {
            ScopeState::Entered => Ok(()),
            ScopeState::Created => Err(BenchError::lifecycle("benchmark has not been entered")),
            ScopeState::Exited => Err(BenchError::lifecycle("benchmark has already exited")),
        }
    }

    /// Kinds of the attached resources, for logging.
    pub fn labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        let none = || "none".to_string();
        labels.insert(
            "executor".to_string(),
            self.executor.as_ref().map_or_else(none, |e| e.name().to_string()),
        );
        labels.insert(
            "connector".to_string(),
            self.store.as_ref().map_or_else(none, |s| s.connector_name().to_string()),
        );
        labels.insert("stream".to_string(), self.stream_kind.clone().unwrap_or_else(none));
        labels.insert(
            "memory_profile".to_string(),
            self.profiler
                .as_ref()
                .map_or_else(none, |p| format!("{:?}", p.interval())),
        );
        labels
    }

    /// Acquire every resource. On failure everything acquired so far is
    /// released before the error is returned.
    pub fn enter(&mut self) -> BenchResult<()> {
        if self.state != ScopeState::Created {
            return Err(BenchError::lifecycle("resources can only be entered once"));
        }
        match self.acquire() {
            Ok(()) => {
                self.state = ScopeState::Entered;
                Ok(())
            }
            Err(e) => {
                self.state = ScopeState::Exited;
                if let Err(release_err) = self.stack.close() {
                    warn!("unwinding after failed acquisition: {release_err}");
                }
                Err(e)
            }
        }
    }

    fn acquire(&mut self) -> BenchResult<()> {
        if let Some(executor) = &self.executor {
            executor
                .start()
                .map_err(|e| BenchError::acquire(format!("executor '{}'", executor.name()), e))?;
            let executor = Arc::clone(executor);
            self.stack.push("executor", move || executor.shutdown());
        }
        if let Some(store) = &self.store {
            store.open()?;
            let store = store.clone();
            self.stack.push("store", move || store.close());
        }
        if let Some(stream) = &self.stream {
            if let Some(pair) = lock(stream).as_mut() {
                pair.open().map_err(|e| match e {
                    BenchError::ResourceAcquire { .. } => e,
                    other => BenchError::acquire(format!("stream '{}'", pair.topic), other),
                })?;
            }
            let stream = Arc::clone(stream);
            self.stack.push("stream", move || match lock(&stream).as_mut() {
                Some(pair) => pair.close(),
                None => Ok(()),
            });
        }
        if let Some(profiler) = &self.profiler {
            profiler.start()?;
            let profiler = Arc::clone(profiler);
            self.stack.push("memory profiler", move || profiler.stop());
        }
        Ok(())
    }

    /// Release in reverse acquisition order. Exiting twice is a no-op.
    pub fn exit(&mut self) -> BenchResult<()> {
        if self.state == ScopeState::Exited {
            return Ok(());
        }
        self.state = ScopeState::Exited;
        self.stack.close()
    }
}

/// One run's output: a single record or several.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutput<R> {
    Single(R),
    Many(Vec<R>),
}

impl<R> RunOutput<R> {
    /// Records in order; a single record becomes a one-element list.
    pub fn into_records(self) -> Vec<R> {
        match self {
            RunOutput::Single(record) => vec![record],
            RunOutput::Many(records) => records,
        }
    }
}

impl<R> From<R> for RunOutput<R> {
    fn from(record: R) -> Self {
        RunOutput::Single(record)
    }
}

/// A measurement program with a scoped lifecycle.
///
/// `run` may only be called between `enter` and `exit`.
pub trait Benchmark {
    type Config: Clone + fmt::Debug;
    type Result: Record;

    fn name(&self) -> &str;

    fn enter(&mut self) -> BenchResult<()>;

    fn exit(&mut self) -> BenchResult<()>;

    /// Human-readable description of the active setup.
    fn config(&self) -> BTreeMap<String, String>;

    fn run(&mut self, config: &Self::Config) -> BenchResult<RunOutput<Self::Result>>;
}

/// Parameter product that expands into run configs.
pub trait BenchmarkMatrix: Sized {
    type Config;

    fn add_args(cmd: Command) -> Command;

    fn from_matches(matches: &ArgMatches) -> BenchResult<Self>;

    /// Cartesian product of the list-valued parameters, outermost first.
    fn configs(&self) -> Vec<Self::Config>;
}
