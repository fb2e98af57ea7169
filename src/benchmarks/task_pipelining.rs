//! Task pipelining benchmark.
//!
//! A chain of N tasks, each consuming its predecessor's bytes, sleeping and
//! producing bytes for its successor. The chain is submitted three ways:
//!
//! * `sequential-no-proxy`: bytes travel by value; task i+1 is submitted once
//!   task i's future resolves.
//! * `sequential-proxy`: bytes go through the store and tasks exchange
//!   proxies; still submitted one after another.
//! * `pipelined-proxy-future`: task i+1 is submitted while task i still
//!   runs, consuming a store future that task i fulfills. A submitter and a
//!   receiver thread run side by side; the submitter never waits on a task.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use clap::{Arg, ArgMatches, Command, value_parser};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bench::{Benchmark, BenchmarkMatrix, Resources, RunOutput};
use crate::config::{get_many, get_one};
use crate::executor::{Executor, TaskFuture, submit};
use crate::results::Record;
use crate::store::{Key, Proxy, Store};
use crate::utils::{millis, now_epoch, randbytes, seconds};
use crate::{BenchError, BenchResult};

pub const NAME: &str = "task-pipelining";

pub const DEFAULT_POLLING_INTERVAL: f64 = 0.001;
pub const DEFAULT_FUTURE_TIMEOUT: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionMethod {
    SequentialNoProxy,
    SequentialProxy,
    PipelinedProxyFuture,
}

impl SubmissionMethod {
    pub const NAMES: [&'static str; 3] = ["sequential-no-proxy", "sequential-proxy", "pipelined-proxy-future"];

    pub fn requires_store(self) -> bool {
        !matches!(self, SubmissionMethod::SequentialNoProxy)
    }
}

impl FromStr for SubmissionMethod {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential-no-proxy" => Ok(SubmissionMethod::SequentialNoProxy),
            "sequential-proxy" => Ok(SubmissionMethod::SequentialProxy),
            "pipelined-proxy-future" => Ok(SubmissionMethod::PipelinedProxyFuture),
            _ => Err(BenchError::config(format!(
                "unknown submission method '{s}', expected one of {}",
                Self::NAMES.join(", ")
            ))),
        }
    }
}

impl fmt::Display for SubmissionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SubmissionMethod::SequentialNoProxy => "sequential-no-proxy",
            SubmissionMethod::SequentialProxy => "sequential-proxy",
            SubmissionMethod::PipelinedProxyFuture => "pipelined-proxy-future",
        })
    }
}

/// One workflow to run. Times are in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub submission_method: SubmissionMethod,
    pub task_chain_length: usize,
    pub task_data_bytes: usize,
    pub task_overhead_fraction: f64,
    pub task_sleep: f64,
    pub polling_interval: f64,
    pub future_timeout: f64,
}

/// Timestamps of one task (epoch seconds).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TaskTiming {
    pub submit_timestamp: f64,
    pub task_start_timestamp: f64,
    pub resolve_start_timestamp: f64,
    pub resolve_end_timestamp: f64,
    pub generate_start_timestamp: f64,
    pub generate_end_timestamp: f64,
    pub received_timestamp: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskPipeliningResult {
    pub executor: String,
    pub connector: String,
    pub submission_method: String,
    pub task_chain_length: usize,
    pub task_data_bytes: usize,
    pub task_overhead_fraction: f64,
    pub task_sleep: f64,
    pub workflow_start_timestamp: f64,
    pub workflow_end_timestamp: f64,
    pub workflow_makespan_ms: f64,
    /// JSON array of [`TaskTiming`], in chain order.
    pub task_timings: String,
}

impl Record for TaskPipeliningResult {
    fn field_names() -> &'static [&'static str] {
        &[
            "executor",
            "connector",
            "submission_method",
            "task_chain_length",
            "task_data_bytes",
            "task_overhead_fraction",
            "task_sleep",
            "workflow_start_timestamp",
            "workflow_end_timestamp",
            "workflow_makespan_ms",
            "task_timings",
        ]
    }
}

impl TaskPipeliningResult {
    pub fn timings(&self) -> BenchResult<Vec<TaskTiming>> {
        Ok(serde_json::from_str(&self.task_timings)?)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskPipeliningMatrix {
    pub task_chain_length: usize,
    pub task_data_bytes: Vec<usize>,
    pub task_overhead_fractions: Vec<f64>,
    pub task_sleep: f64,
    pub submission_methods: Vec<SubmissionMethod>,
    pub polling_interval: f64,
    pub future_timeout: f64,
}

impl TaskPipeliningMatrix {
    pub fn new(
        task_chain_length: usize,
        task_data_bytes: Vec<usize>,
        task_overhead_fractions: Vec<f64>,
        task_sleep: f64,
        submission_methods: Vec<SubmissionMethod>,
    ) -> BenchResult<Self> {
        let matrix = TaskPipeliningMatrix {
            task_chain_length,
            task_data_bytes,
            task_overhead_fractions,
            task_sleep,
            submission_methods,
            polling_interval: DEFAULT_POLLING_INTERVAL,
            future_timeout: DEFAULT_FUTURE_TIMEOUT,
        };
        matrix.validate()?;
        Ok(matrix)
    }

    pub fn with_polling(mut self, polling_interval: f64, future_timeout: f64) -> BenchResult<Self> {
        self.polling_interval = polling_interval;
        self.future_timeout = future_timeout;
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> BenchResult<()> {
        if self.task_chain_length == 0 {
            return Err(BenchError::config("--task-chain-length must be at least 1"));
        }
        if self.task_data_bytes.is_empty() || self.task_overhead_fractions.is_empty() {
            return Err(BenchError::config("data sizes and overhead fractions must not be empty"));
        }
        if self.submission_methods.is_empty() {
            return Err(BenchError::config("at least one submission method is required"));
        }
        for &fraction in &self.task_overhead_fractions {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(BenchError::config(format!(
                    "task overhead fraction must be within [0, 1], got {fraction}"
                )));
            }
        }
        seconds(self.task_sleep, "--task-sleep")?;
        seconds(self.future_timeout, "--future-timeout")?;
        if seconds(self.polling_interval, "--polling-interval")?.is_zero() {
            return Err(BenchError::config("--polling-interval must be positive"));
        }
        Ok(())
    }

    pub fn requires_store(&self) -> bool {
        self.submission_methods.iter().any(|m| m.requires_store())
    }
}

impl BenchmarkMatrix for TaskPipeliningMatrix {
    type Config = RunConfig;

    fn add_args(cmd: Command) -> Command {
        cmd.next_help_heading("Benchmark")
            .arg(
                Arg::new("task-chain-length")
                    .long("task-chain-length")
                    .value_parser(value_parser!(usize))
                    .required(true)
                    .help("Number of tasks in the chain"),
            )
            .arg(
                Arg::new("task-data-bytes")
                    .long("task-data-bytes")
                    .value_parser(value_parser!(usize))
                    .num_args(1..)
                    .required(true)
                    .help("Bytes each task passes to its successor"),
            )
            .arg(
                Arg::new("task-overhead-fractions")
                    .long("task-overhead-fractions")
                    .value_parser(value_parser!(f64))
                    .num_args(1..)
                    .required(true)
                    .help("Fraction of each task's duration spent on overhead (resolving input)"),
            )
            .arg(
                Arg::new("task-sleep")
                    .long("task-sleep")
                    .value_parser(value_parser!(f64))
                    .required(true)
                    .help("Minimum task duration in seconds"),
            )
            .arg(
                Arg::new("submission-methods")
                    .long("submission-methods")
                    .value_parser(SubmissionMethod::NAMES)
                    .num_args(1..)
                    .required(true)
                    .help("Submission methods to compare"),
            )
            .arg(
                Arg::new("polling-interval")
                    .long("polling-interval")
                    .value_parser(value_parser!(f64))
                    .default_value("0.001")
                    .help("Store future polling interval in seconds"),
            )
            .arg(
                Arg::new("future-timeout")
                    .long("future-timeout")
                    .value_parser(value_parser!(f64))
                    .default_value("60")
                    .help("Give up on an unfulfilled store future after this many seconds"),
            )
    }

    fn from_matches(matches: &ArgMatches) -> BenchResult<Self> {
        let methods = get_many::<String>(matches, "submission-methods")
            .unwrap_or_default()
            .iter()
            .map(|m| m.parse())
            .collect::<BenchResult<Vec<SubmissionMethod>>>()?;
        TaskPipeliningMatrix::new(
            get_one(matches, "task-chain-length").ok_or_else(|| BenchError::config("--task-chain-length is required"))?,
            get_many(matches, "task-data-bytes").unwrap_or_default(),
            get_many(matches, "task-overhead-fractions").unwrap_or_default(),
            get_one(matches, "task-sleep").ok_or_else(|| BenchError::config("--task-sleep is required"))?,
            methods,
        )?
        .with_polling(
            get_one(matches, "polling-interval").unwrap_or(DEFAULT_POLLING_INTERVAL),
            get_one(matches, "future-timeout").unwrap_or(DEFAULT_FUTURE_TIMEOUT),
        )
    }

    fn configs(&self) -> Vec<RunConfig> {
        let mut configs = Vec::new();
        for &task_data_bytes in &self.task_data_bytes {
            for &task_overhead_fraction in &self.task_overhead_fractions {
                for &submission_method in &self.submission_methods {
                    configs.push(RunConfig {
                        submission_method,
                        task_chain_length: self.task_chain_length,
                        task_data_bytes,
                        task_overhead_fraction,
                        task_sleep: self.task_sleep,
                        polling_interval: self.polling_interval,
                        future_timeout: self.future_timeout,
                    });
                }
            }
        }
        configs
    }
}

/// Sleep budget of one task.
#[derive(Debug, Clone, Copy)]
struct TaskShape {
    data_bytes: usize,
    overhead: Duration,
    compute: Duration,
}

impl TaskShape {
    fn from_config(config: &RunConfig) -> BenchResult<Self> {
        let sleep = config.task_sleep;
        let fraction = config.task_overhead_fraction;
        Ok(TaskShape {
            data_bytes: config.task_data_bytes,
            overhead: seconds(sleep * fraction, "task overhead")?,
            compute: seconds(sleep * (1.0 - fraction), "task compute")?,
        })
    }
}

/// Timestamps taken inside a task.
#[derive(Debug, Clone, Copy)]
struct TaskStamps {
    start: f64,
    resolve_start: f64,
    resolve_end: f64,
    generate_start: f64,
    generate_end: f64,
}

impl TaskStamps {
    fn with_bounds(self, submit: f64, received: f64) -> TaskTiming {
        TaskTiming {
            submit_timestamp: submit,
            task_start_timestamp: self.start,
            resolve_start_timestamp: self.resolve_start,
            resolve_end_timestamp: self.resolve_end,
            generate_start_timestamp: self.generate_start,
            generate_end_timestamp: self.generate_end,
            received_timestamp: received,
        }
    }
}

enum TaskInput {
    Bytes(Vec<u8>),
    Proxy(Proxy),
}

/// Body shared by every mode: resolve, sleep the rest of the overhead
/// budget, sleep the compute share, then generate the output bytes.
fn pipeline_task(input: TaskInput, shape: TaskShape) -> anyhow::Result<(Vec<u8>, TaskStamps)> {
    let start = now_epoch();
    let resolve_clock = Instant::now();
    let resolve_start = now_epoch();
    let consumed = match input {
        TaskInput::Bytes(bytes) => bytes.len(),
        TaskInput::Proxy(proxy) => {
            let bytes = proxy.resolve()?;
            // Each intermediate object has exactly one consumer.
            proxy.store().evict(proxy.key())?;
            bytes.len()
        }
    };
    let resolve_end = now_epoch();
    let resolve_elapsed = resolve_clock.elapsed();

    if resolve_elapsed < shape.overhead {
        std::thread::sleep(shape.overhead - resolve_elapsed);
    }
    std::thread::sleep(shape.compute);

    let generate_start = now_epoch();
    let output = randbytes(shape.data_bytes);
    let generate_end = now_epoch();
    debug!(consumed, produced = output.len(), "pipeline task finished");

    Ok((
        output,
        TaskStamps {
            start,
            resolve_start,
            resolve_end,
            generate_start,
            generate_end,
        },
    ))
}

pub struct TaskPipelining {
    resources: Resources,
}

impl TaskPipelining {
    pub fn new(resources: Resources) -> Self {
        TaskPipelining { resources }
    }

    fn store(&self, method: SubmissionMethod) -> BenchResult<&Store> {
        self.resources
            .store()
            .ok_or_else(|| BenchError::config(format!("submission method {method} requires a store")))
    }

    fn run_sequential_no_proxy(&self, executor: &dyn Executor, config: &RunConfig) -> BenchResult<Vec<TaskTiming>> {
        let shape = TaskShape::from_config(config)?;
        let mut data = randbytes(config.task_data_bytes);
        let mut timings = Vec::with_capacity(config.task_chain_length);
        for _ in 0..config.task_chain_length {
            let input = std::mem::take(&mut data);
            let submitted = now_epoch();
            let future = submit(executor, move || pipeline_task(TaskInput::Bytes(input), shape))?;
            let (output, stamps) = future.result()?;
            timings.push(stamps.with_bounds(submitted, now_epoch()));
            data = output;
        }
        Ok(timings)
    }

    fn run_sequential_proxy(
        &self,
        executor: &dyn Executor,
        store: &Store,
        config: &RunConfig,
    ) -> BenchResult<Vec<TaskTiming>> {
        let shape = TaskShape::from_config(config)?;
        let mut proxy = store.proxy(&randbytes(config.task_data_bytes))?;
        let mut timings = Vec::with_capacity(config.task_chain_length);
        for _ in 0..config.task_chain_length {
            let task_store = store.clone();
            let input = proxy.clone();
            let submitted = now_epoch();
            let future = submit(executor, move || {
                let (output, stamps) = pipeline_task(TaskInput::Proxy(input), shape)?;
                Ok((task_store.proxy(&output)?, stamps))
            })?;
            let (next, stamps) = future.result()?;
            timings.push(stamps.with_bounds(submitted, now_epoch()));
            proxy = next;
        }
        store.evict(proxy.key())?;
        Ok(timings)
    }

    fn run_pipelined(&self, executor: &dyn Executor, store: &Store, config: &RunConfig) -> BenchResult<Vec<TaskTiming>> {
        let shape = TaskShape::from_config(config)?;
        let polling = seconds(config.polling_interval, "--polling-interval")?;
        let timeout = seconds(config.future_timeout, "--future-timeout")?;
        let chain = config.task_chain_length;
        let first = store.proxy(&randbytes(config.task_data_bytes))?;

        let (tx, rx) = mpsc::channel::<(f64, TaskFuture<TaskStamps>)>();

        let (submitted, received) = std::thread::scope(|scope| {
            let submitter = scope.spawn(move || -> BenchResult<Option<Key>> {
                let mut input = first;
                for i in 0..chain {
                    let promise = store.future(polling, timeout)?;
                    let next = promise.proxy();
                    let task_input = input;
                    let submitted = now_epoch();
                    let future = submit(executor, move || {
                        let (output, stamps) = pipeline_task(TaskInput::Proxy(task_input), shape)?;
                        promise.set_result(&output)?;
                        Ok(stamps)
                    })?;
                    if tx.send((submitted, future)).is_err() {
                        // Receiver gave up after a failed task.
                        return Ok(None);
                    }
                    input = next;
                    if i + 1 < chain {
                        std::thread::sleep(shape.compute);
                    }
                }
                Ok(Some(input.key().clone()))
            });

            let receiver = scope.spawn(move || -> BenchResult<Vec<TaskTiming>> {
                let mut timings = Vec::with_capacity(chain);
                for (submitted, future) in rx {
                    let stamps = future.result()?;
                    timings.push(stamps.with_bounds(submitted, now_epoch()));
                }
                Ok(timings)
            });

            (join(submitter, "submitter"), join(receiver, "receiver"))
        });

        // A receiver failure explains a submitter that stopped early.
        let timings = received?;
        if let Some(last) = submitted? {
            store.evict(&last)?;
        }
        if timings.len() != chain {
            return Err(BenchError::Task(format!(
                "received {} of {chain} pipelined tasks",
                timings.len()
            )));
        }
        Ok(timings)
    }
}

fn join<T>(handle: std::thread::ScopedJoinHandle<'_, BenchResult<T>>, role: &str) -> BenchResult<T> {
    handle
        .join()
        .map_err(|_| BenchError::Task(format!("pipeline {role} thread panicked")))?
}

impl Benchmark for TaskPipelining {
    type Config = RunConfig;
    type Result = TaskPipeliningResult;

    fn name(&self) -> &str {
        "Task Pipelining"
    }

    fn enter(&mut self) -> BenchResult<()> {
        self.resources.enter()
    }

    fn exit(&mut self) -> BenchResult<()> {
        self.resources.exit()
    }

    fn config(&self) -> BTreeMap<String, String> {
        self.resources.labels()
    }

    fn run(&mut self, config: &RunConfig) -> BenchResult<RunOutput<TaskPipeliningResult>> {
        self.resources.ensure_entered()?;
        let executor = self.resources.executor()?.as_ref();
        let method = config.submission_method;

        let start_timestamp = now_epoch();
        let clock = Instant::now();
        let timings = match method {
            SubmissionMethod::SequentialNoProxy => self.run_sequential_no_proxy(executor, config)?,
            SubmissionMethod::SequentialProxy => self.run_sequential_proxy(executor, self.store(method)?, config)?,
            SubmissionMethod::PipelinedProxyFuture => self.run_pipelined(executor, self.store(method)?, config)?,
        };
        let makespan = clock.elapsed();
        let end_timestamp = now_epoch();

        Ok(TaskPipeliningResult {
            executor: executor.name().to_string(),
            connector: self
                .resources
                .store()
                .map_or_else(|| "none".to_string(), |s| s.connector_name().to_string()),
            submission_method: method.to_string(),
            task_chain_length: config.task_chain_length,
            task_data_bytes: config.task_data_bytes,
            task_overhead_fraction: config.task_overhead_fraction,
            task_sleep: config.task_sleep,
            workflow_start_timestamp: start_timestamp,
            workflow_end_timestamp: end_timestamp,
            workflow_makespan_ms: millis(makespan),
            task_timings: serde_json::to_string(&timings)?,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ThreadPool;
    use crate::results::serialized_header;
    use crate::store::MemoryConnector;
    use std::sync::Arc;

    fn benchmark(workers: usize, with_store: bool) -> TaskPipelining {
        let store = with_store.then(|| Store::new("test", MemoryConnector::new()));
        let resources = Resources::new()
            .with_executor(Arc::new(ThreadPool::new("thread", workers).unwrap()))
            .with_store(store);
        let mut bench = TaskPipelining::new(resources);
        bench.enter().unwrap();
        bench
    }

    fn config(method: SubmissionMethod, chain: usize, overhead: f64, sleep: f64) -> RunConfig {
        RunConfig {
            submission_method: method,
            task_chain_length: chain,
            task_data_bytes: 100,
            task_overhead_fraction: overhead,
            task_sleep: sleep,
            polling_interval: DEFAULT_POLLING_INTERVAL,
            future_timeout: 5.0,
        }
    }

    fn single(output: RunOutput<TaskPipeliningResult>) -> TaskPipeliningResult {
        let mut records = output.into_records();
        assert_eq!(records.len(), 1);
        records.remove(0)
    }

    #[test]
    fn test_matrix_product_order() {
        let matrix = TaskPipeliningMatrix::new(
            3,
            vec![10, 20],
            vec![0.1, 0.5],
            0.01,
            vec![SubmissionMethod::SequentialNoProxy, SubmissionMethod::PipelinedProxyFuture],
        )
        .unwrap();
        let configs = matrix.configs();
        assert_eq!(configs.len(), 8);
        assert_eq!(configs[0].task_data_bytes, 10);
        assert_eq!(configs[0].task_overhead_fraction, 0.1);
        assert_eq!(configs[1].submission_method, SubmissionMethod::PipelinedProxyFuture);
        assert_eq!(configs[2].task_overhead_fraction, 0.5);
        assert_eq!(configs[4].task_data_bytes, 20);
        assert!(configs.iter().all(|c| c.task_chain_length == 3));
        assert!(matrix.requires_store());
    }

    #[test]
    fn test_matrix_rejects_bad_shapes() {
        let methods = || vec![SubmissionMethod::SequentialNoProxy];
        assert!(TaskPipeliningMatrix::new(0, vec![1], vec![0.1], 0.01, methods()).is_err());
        assert!(TaskPipeliningMatrix::new(1, vec![1], vec![1.5], 0.01, methods()).is_err());
        assert!(TaskPipeliningMatrix::new(1, vec![1], vec![0.1], -1.0, methods()).is_err());
        assert!(matches!(
            TaskPipeliningMatrix::new(1, vec![1], vec![0.1], 1e20, methods()),
            Err(BenchError::Config(_))
        ));
        assert!(TaskPipeliningMatrix::new(1, vec![], vec![0.1], 0.01, methods()).is_err());
        assert!(TaskPipeliningMatrix::new(1, vec![1], vec![0.1], 0.01, vec![]).is_err());
        let matrix = TaskPipeliningMatrix::new(1, vec![1], vec![0.1], 0.01, methods()).unwrap();
        assert!(matrix.clone().with_polling(0.0, 1.0).is_err());
        assert!(matrix.clone().with_polling(0.001, 1e20).is_err());
        assert!(!matrix.requires_store());
    }

    #[test]
    fn test_result_fields_match_header() {
        let mut bench = benchmark(2, false);
        let result = single(
            bench
                .run(&config(SubmissionMethod::SequentialNoProxy, 2, 0.1, 0.001))
                .unwrap(),
        );
        assert_eq!(
            serialized_header(&result).unwrap(),
            TaskPipeliningResult::field_names()
        );
        assert_eq!(result.connector, "none");
        bench.exit().unwrap();
    }

    #[test]
    fn test_sequential_tasks_do_not_overlap() {
        let mut bench = benchmark(4, true);
        for method in [SubmissionMethod::SequentialNoProxy, SubmissionMethod::SequentialProxy] {
            let result = single(bench.run(&config(method, 4, 0.2, 0.005)).unwrap());
            let timings = result.timings().unwrap();
            assert_eq!(timings.len(), 4);
            for pair in timings.windows(2) {
                assert!(pair[1].submit_timestamp >= pair[0].received_timestamp);
            }
            for t in &timings {
                assert!(t.task_start_timestamp <= t.resolve_start_timestamp);
                assert!(t.resolve_end_timestamp <= t.generate_start_timestamp);
                assert!(t.generate_end_timestamp - t.task_start_timestamp >= 0.005 - 1e-3);
            }
            assert!(result.workflow_makespan_ms >= 4.0 * 5.0);
        }
        bench.exit().unwrap();
    }

    #[test]
    fn test_pipelined_workflow_makespan_bounds() {
        // chain=5, 100 bytes, overhead=0.1, sleep=10ms
        let mut bench = benchmark(5, true);
        let result = single(
            bench
                .run(&config(SubmissionMethod::PipelinedProxyFuture, 5, 0.1, 0.01))
                .unwrap(),
        );
        assert_eq!(result.submission_method, "pipelined-proxy-future");
        assert_eq!(result.connector, "memory");
        // Greater than N * sleep * overhead, and at least the last submission
        // offset plus one full task: s + (N - 1) * (1 - o) * s = 46ms.
        assert!(result.workflow_makespan_ms > 5.0 * 10.0 * 0.1);
        assert!(result.workflow_makespan_ms >= 45.0);
        let timings = result.timings().unwrap();
        assert_eq!(timings.len(), 5);
        assert!(timings.windows(2).all(|p| p[0].submit_timestamp <= p[1].submit_timestamp));
        bench.exit().unwrap();
    }

    #[test]
    fn test_pipelined_beats_sequential() {
        let mut bench = benchmark(5, true);
        let sequential = single(
            bench
                .run(&config(SubmissionMethod::SequentialProxy, 5, 0.5, 0.05))
                .unwrap(),
        );
        let pipelined = single(
            bench
                .run(&config(SubmissionMethod::PipelinedProxyFuture, 5, 0.5, 0.05))
                .unwrap(),
        );
        assert!(sequential.workflow_makespan_ms >= 250.0);
        assert!(pipelined.workflow_makespan_ms < sequential.workflow_makespan_ms);
        // Later tasks were submitted before earlier ones were received.
        let timings = pipelined.timings().unwrap();
        assert!(timings[1].submit_timestamp < timings[0].received_timestamp);
        bench.exit().unwrap();
    }

    #[test]
    fn test_proxy_methods_need_a_store() {
        let mut bench = benchmark(1, false);
        let err = bench
            .run(&config(SubmissionMethod::SequentialProxy, 1, 0.1, 0.0))
            .unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
        bench.exit().unwrap();
    }

    #[test]
    fn test_run_requires_scope() {
        let resources = Resources::new().with_executor(Arc::new(ThreadPool::new("thread", 1).unwrap()));
        let mut bench = TaskPipelining::new(resources);
        assert!(matches!(
            bench.run(&config(SubmissionMethod::SequentialNoProxy, 1, 0.1, 0.0)),
            Err(BenchError::Lifecycle(_))
        ));
    }

    #[test]
    fn test_unknown_method() {
        let err = "parallel".parse::<SubmissionMethod>().unwrap_err();
        assert!(err.to_string().contains("pipelined-proxy-future"));
    }
}
