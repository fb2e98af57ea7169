//! Endpoint queries-per-second benchmark.
//!
//! `workers` threads hammer one store route with `queries` requests each.
//! Workers stage their objects, then block until a shared wall-clock start
//! time fixed after the last one finished staging. Per-request latencies are
//! merged after all workers join.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Barrier, OnceLock};
use std::time::{Duration, Instant};

use clap::{Arg, ArgMatches, Command, value_parser};
use serde::{Deserialize, Serialize};

use crate::bench::{Benchmark, BenchmarkMatrix, Resources, RunOutput};
use crate::config::{get_many, get_one};
use crate::core::TimingStat;
use crate::results::Record;
use crate::store::{Key, Store};
use crate::utils::{millis, now_epoch, randbytes, seconds, wait_until};
use crate::{BenchError, BenchResult};

pub const NAME: &str = "endpoint-qps";

/// Delay between the end of staging and the first query.
const START_DELAY: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Get,
    Set,
    Exists,
    Evict,
    Endpoint,
}

impl Route {
    pub const NAMES: [&'static str; 5] = ["GET", "SET", "EXISTS", "EVICT", "ENDPOINT"];
}

impl FromStr for Route {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Route::Get),
            "SET" => Ok(Route::Set),
            "EXISTS" => Ok(Route::Exists),
            "EVICT" => Ok(Route::Evict),
            "ENDPOINT" => Ok(Route::Endpoint),
            _ => Err(BenchError::config(format!(
                "unknown route '{s}', expected one of {}",
                Self::NAMES.join(", ")
            ))),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Route::Get => "GET",
            Route::Set => "SET",
            Route::Exists => "EXISTS",
            Route::Evict => "EVICT",
            Route::Endpoint => "ENDPOINT",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub endpoint: String,
    pub route: Route,
    pub payload_size_bytes: usize,
    pub workers: usize,
    /// Seconds each worker sleeps between queries.
    pub sleep: f64,
    /// Queries per worker.
    pub queries: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndpointQpsMatrix {
    pub endpoint: String,
    pub routes: Vec<Route>,
    pub payload_sizes: Vec<usize>,
    pub workers: Vec<usize>,
    pub sleeps: Vec<f64>,
    pub queries: usize,
}

impl EndpointQpsMatrix {
    pub fn new(
        endpoint: impl Into<String>,
        routes: Vec<Route>,
        payload_sizes: Vec<usize>,
        workers: Vec<usize>,
        sleeps: Vec<f64>,
        queries: usize,
    ) -> BenchResult<Self> {
        if routes.is_empty() || payload_sizes.is_empty() || workers.is_empty() || sleeps.is_empty() {
            return Err(BenchError::config("routes, payload sizes, workers and sleeps must not be empty"));
        }
        if workers.contains(&0) {
            return Err(BenchError::config("worker counts must be at least 1"));
        }
        if queries == 0 {
            return Err(BenchError::config("--queries must be at least 1"));
        }
        for &sleep in &sleeps {
            seconds(sleep, "--sleeps")?;
        }
        Ok(EndpointQpsMatrix {
            endpoint: endpoint.into(),
            routes,
            payload_sizes,
            workers,
            sleeps,
            queries,
        })
    }
}

impl BenchmarkMatrix for EndpointQpsMatrix {
    type Config = RunConfig;

    fn add_args(cmd: Command) -> Command {
        cmd.next_help_heading("Benchmark")
            .arg(
                Arg::new("endpoint")
                    .long("endpoint")
                    .required(true)
                    .help("UUID of the endpoint under test"),
            )
            .arg(
                Arg::new("routes")
                    .long("routes")
                    .value_parser(Route::NAMES)
                    .num_args(1..)
                    .required(true)
                    .help("Routes to query"),
            )
            .arg(
                Arg::new("payload-sizes")
                    .long("payload-sizes")
                    .value_parser(value_parser!(usize))
                    .num_args(1..)
                    .default_value("0")
                    .help("Payload sizes in bytes for GET/SET"),
            )
            .arg(
                Arg::new("workers")
                    .long("workers")
                    .value_parser(value_parser!(usize))
                    .num_args(1..)
                    .default_value("1")
                    .help("Concurrent workers"),
            )
            .arg(
                Arg::new("sleeps")
                    .long("sleeps")
                    .value_parser(value_parser!(f64))
                    .num_args(1..)
                    .default_value("0")
                    .help("Seconds each worker sleeps between queries"),
            )
            .arg(
                Arg::new("queries")
                    .long("queries")
                    .value_parser(value_parser!(usize))
                    .default_value("100")
                    .help("Queries per worker"),
            )
    }

    fn from_matches(matches: &ArgMatches) -> BenchResult<Self> {
        let routes = get_many::<String>(matches, "routes")
            .unwrap_or_default()
            .iter()
            .map(|r| r.parse())
            .collect::<BenchResult<Vec<Route>>>()?;
        EndpointQpsMatrix::new(
            get_one::<String>(matches, "endpoint").ok_or_else(|| BenchError::config("--endpoint is required"))?,
            routes,
            get_many(matches, "payload-sizes").unwrap_or_else(|| vec![0]),
            get_many(matches, "workers").unwrap_or_else(|| vec![1]),
            get_many(matches, "sleeps").unwrap_or_else(|| vec![0.0]),
            get_one(matches, "queries").unwrap_or(100),
        )
    }

    fn configs(&self) -> Vec<RunConfig> {
        let mut configs = Vec::new();
        for &route in &self.routes {
            for &payload_size_bytes in &self.payload_sizes {
                for &workers in &self.workers {
                    for &sleep in &self.sleeps {
                        configs.push(RunConfig {
                            endpoint: self.endpoint.clone(),
                            route,
                            payload_size_bytes,
                            workers,
                            sleep,
                            queries: self.queries,
                        });
                    }
                }
            }
        }
        configs
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EndpointQpsResult {
    pub endpoint: String,
    pub connector: String,
    pub route: String,
    pub payload_size_bytes: usize,
    pub workers: usize,
    pub sleep: f64,
    pub queries: usize,
    pub total_queries: usize,
    pub total_elapsed_ms: f64,
    pub qps: f64,
    pub avg_latency_ms: f64,
    pub median_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub stdev_latency_ms: f64,
    pub p95_latency_ms: f64,
}

impl Record for EndpointQpsResult {
    fn field_names() -> &'static [&'static str] {
        &[
            "endpoint",
            "connector",
            "route",
            "payload_size_bytes",
            "workers",
            "sleep",
            "queries",
            "total_queries",
            "total_elapsed_ms",
            "qps",
            "avg_latency_ms",
            "median_latency_ms",
            "min_latency_ms",
            "max_latency_ms",
            "stdev_latency_ms",
            "p95_latency_ms",
        ]
    }
}

/// Per-worker output: latencies (ms) and the wall-clock end time.
struct WorkerRun {
    latencies: Vec<f64>,
    end: f64,
}

/// Shared start time, fixed once every worker has finished staging.
struct StartLine {
    staged: Barrier,
    start: OnceLock<f64>,
    workers: usize,
}

impl StartLine {
    fn new(workers: usize) -> Self {
        StartLine {
            staged: Barrier::new(workers),
            start: OnceLock::new(),
            workers,
        }
    }

    /// Block until all workers arrive, then return the common start.
    fn arrive(&self) -> f64 {
        if self.staged.wait().is_leader() {
            let _ = self
                .start
                .set(now_epoch() + START_DELAY + self.workers as f64 * 0.001);
        }
        self.staged.wait();
        self.start()
    }

    fn start(&self) -> f64 {
        self.start.get().copied().unwrap_or_else(now_epoch)
    }
}

/// Objects the route reads or removes.
fn stage(store: &Store, config: &RunConfig, payload: &[u8]) -> BenchResult<Vec<Key>> {
    match config.route {
        Route::Get | Route::Exists => Ok(vec![store.put(payload)?]),
        Route::Evict => (0..config.queries).map(|_| store.put(payload)).collect(),
        Route::Set | Route::Endpoint => Ok(Vec::new()),
    }
}

fn query_worker(store: &Store, config: &RunConfig, line: &StartLine) -> BenchResult<WorkerRun> {
    let payload = randbytes(config.payload_size_bytes);
    let pause = seconds(config.sleep, "worker sleep")?;
    let queries = config.queries;

    // Every worker reaches the line, even one whose staging failed.
    let staged = stage(store, config, &payload);
    let start = line.arrive();
    let staged = staged?;

    wait_until(start);
    let mut latencies = Vec::with_capacity(queries);
    let mut written = Vec::new();
    for i in 0..queries {
        let clock = Instant::now();
        match config.route {
            Route::Get => {
                store
                    .get(&staged[0])?
                    .ok_or_else(|| BenchError::Task("staged object disappeared".into()))?;
            }
            Route::Set => written.push(store.put(&payload)?),
            Route::Exists => {
                store.exists(&staged[0])?;
            }
            Route::Evict => store.evict(&staged[i])?,
            // A lookup carrying no payload measures the bare request path.
            Route::Endpoint => {
                store.exists(&Key::new())?;
            }
        }
        latencies.push(millis(clock.elapsed()));
        if !pause.is_zero() {
            std::thread::sleep(pause);
        }
    }
    let end = now_epoch();

    if matches!(config.route, Route::Get | Route::Exists) {
        written.extend(staged);
    }
    for key in &written {
        store.evict(key)?;
    }
    Ok(WorkerRun { latencies, end })
}

pub struct EndpointQps {
    resources: Resources,
}

impl EndpointQps {
    pub fn new(resources: Resources) -> BenchResult<Self> {
        if resources.store().is_none() {
            return Err(BenchError::config("the endpoint QPS benchmark requires --ps-connector"));
        }
        Ok(EndpointQps { resources })
    }
}

impl Benchmark for EndpointQps {
    type Config = RunConfig;
    type Result = EndpointQpsResult;

    fn name(&self) -> &str {
        "Endpoint QPS"
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

    fn run(&mut self, config: &RunConfig) -> BenchResult<RunOutput<EndpointQpsResult>> {
        self.resources.ensure_entered()?;
        let store = self
            .resources
            .store()
            .ok_or_else(|| BenchError::config("the endpoint QPS benchmark requires a store"))?;

        let line = StartLine::new(config.workers);
        let runs = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..config.workers)
                .map(|_| scope.spawn(|| query_worker(store, config, &line)))
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join()
                        .map_err(|_| BenchError::Task("QPS worker panicked".into()))?
                })
                .collect::<BenchResult<Vec<WorkerRun>>>()
        })?;

        let start = line.start();
        let end = runs.iter().map(|r| r.end).fold(start, f64::max);
        let latencies: Vec<f64> = runs.into_iter().flat_map(|r| r.latencies).collect();
        let total_queries = latencies.len();
        let elapsed = Duration::from_secs_f64((end - start).max(0.0));
        let stat = TimingStat::from_samples(&latencies);
        let qps = if elapsed.is_zero() {
            0.0
        } else {
            total_queries as f64 / elapsed.as_secs_f64()
        };

        Ok(EndpointQpsResult {
            endpoint: config.endpoint.clone(),
            connector: store.connector_name().to_string(),
            route: config.route.to_string(),
            payload_size_bytes: config.payload_size_bytes,
            workers: config.workers,
            sleep: config.sleep,
            queries: config.queries,
            total_queries,
            total_elapsed_ms: millis(elapsed),
            qps,
            avg_latency_ms: stat.mean_ms,
            median_latency_ms: stat.median_ms.unwrap_or(0.0),
            min_latency_ms: stat.min_ms,
            max_latency_ms: stat.max_ms,
            stdev_latency_ms: stat.stddev_ms.unwrap_or(0.0),
            p95_latency_ms: stat.p95_ms.unwrap_or(0.0),
        }
        .into())
    }
}
