//! Task round-trip time benchmark.
//!
//! Submits a single "pong" task that receives `input_size_bytes`, sleeps and
//! returns `output_size_bytes`, and times the round trip. Data travels by
//! value, through store proxies, or through IPFS.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use clap::{Arg, ArgMatches, Command, value_parser};
use serde::{Deserialize, Serialize};

use crate::bench::{Benchmark, BenchmarkMatrix, Resources, RunOutput};
use crate::config::{get_many, get_one};
use crate::executor::submit;
use crate::ipfs::IpfsTransfer;
use crate::results::Record;
use crate::store::{Proxy, Store};
use crate::utils::{millis, now_epoch, randbytes, seconds};
use crate::{BenchError, BenchResult};

pub const NAME: &str = "task-rtt";

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    /// Seconds the task sleeps.
    pub sleep: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskRttMatrix {
    pub input_sizes: Vec<usize>,
    pub output_sizes: Vec<usize>,
    pub sleep: f64,
}

impl TaskRttMatrix {
    pub fn new(input_sizes: Vec<usize>, output_sizes: Vec<usize>, sleep: f64) -> BenchResult<Self> {
        if input_sizes.is_empty() || output_sizes.is_empty() {
            return Err(BenchError::config("input and output sizes must not be empty"));
        }
        seconds(sleep, "--task-sleep")?;
        Ok(TaskRttMatrix {
            input_sizes,
            output_sizes,
            sleep,
        })
    }
}

impl BenchmarkMatrix for TaskRttMatrix {
    type Config = RunConfig;

    fn add_args(cmd: Command) -> Command {
        cmd.next_help_heading("Benchmark")
            .arg(
                Arg::new("input-sizes")
                    .long("input-sizes")
                    .value_parser(value_parser!(usize))
                    .num_args(1..)
                    .required(true)
                    .help("Task input sizes in bytes"),
            )
            .arg(
                Arg::new("output-sizes")
                    .long("output-sizes")
                    .value_parser(value_parser!(usize))
                    .num_args(1..)
                    .required(true)
                    .help("Task output sizes in bytes"),
            )
            .arg(
                Arg::new("task-sleep")
                    .long("task-sleep")
                    .value_parser(value_parser!(f64))
                    .default_value("0")
                    .help("Seconds each task sleeps"),
            )
    }

    fn from_matches(matches: &ArgMatches) -> BenchResult<Self> {
        TaskRttMatrix::new(
            get_many(matches, "input-sizes").unwrap_or_default(),
            get_many(matches, "output-sizes").unwrap_or_default(),
            get_one(matches, "task-sleep").unwrap_or(0.0),
        )
    }

    fn configs(&self) -> Vec<RunConfig> {
        self.input_sizes
            .iter()
            .flat_map(|&input_size_bytes| {
                self.output_sizes.iter().map(move |&output_size_bytes| RunConfig {
                    input_size_bytes,
                    output_size_bytes,
                    sleep: self.sleep,
                })
            })
            .collect()
    }
}

/// How task data moves between client and worker.
#[derive(Debug, Clone)]
pub enum DataTransfer {
    Value,
    Proxy,
    Ipfs(IpfsTransfer),
}

impl fmt::Display for DataTransfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataTransfer::Value => "value",
            DataTransfer::Proxy => "proxy",
            DataTransfer::Ipfs(_) => "ipfs",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRttResult {
    pub executor: String,
    pub connector: String,
    pub transfer: String,
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub task_sleep: f64,
    pub submit_timestamp: f64,
    pub received_timestamp: f64,
    pub input_put_ms: f64,
    pub input_get_ms: f64,
    pub output_put_ms: f64,
    pub output_get_ms: f64,
    pub total_time_ms: f64,
}

impl Record for TaskRttResult {
    fn field_names() -> &'static [&'static str] {
        &[
            "executor",
            "connector",
            "transfer",
            "input_size_bytes",
            "output_size_bytes",
            "task_sleep",
            "submit_timestamp",
            "received_timestamp",
            "input_put_ms",
            "input_get_ms",
            "output_put_ms",
            "output_get_ms",
            "total_time_ms",
        ]
    }
}

enum Payload {
    Bytes(Vec<u8>),
    Proxy(Proxy),
    Cid(String),
}

/// What the pong task sends back, plus its own timings.
struct Pong {
    output: Payload,
    input_get_ms: f64,
    output_put_ms: f64,
}

fn pong(
    input: Payload,
    output_size: usize,
    sleep: Duration,
    store: Option<Store>,
    ipfs: Option<IpfsTransfer>,
) -> anyhow::Result<Pong> {
    let clock = Instant::now();
    let received = match input {
        Payload::Bytes(bytes) => bytes.len(),
        Payload::Proxy(proxy) => {
            let received = proxy.resolve()?.len();
            proxy.store().evict(proxy.key())?;
            received
        }
        Payload::Cid(cid) => match &ipfs {
            Some(ipfs) => ipfs.fetch(&cid)?.len(),
            None => anyhow::bail!("received an IPFS CID without IPFS configured"),
        },
    };
    let input_get_ms = millis(clock.elapsed());
    tracing::trace!(received, "pong input resolved");

    std::thread::sleep(sleep);

    let data = randbytes(output_size);
    let clock = Instant::now();
    let output = match (store, ipfs) {
        (Some(store), _) => Payload::Proxy(store.proxy(&data)?),
        (None, Some(ipfs)) => Payload::Cid(ipfs.put(&data)?),
        (None, None) => Payload::Bytes(data),
    };
    Ok(Pong {
        output,
        input_get_ms,
        output_put_ms: millis(clock.elapsed()),
    })
}

pub struct TaskRtt {
    resources: Resources,
    transfer: DataTransfer,
}

impl TaskRtt {
    pub fn new(resources: Resources, transfer: DataTransfer) -> BenchResult<Self> {
        if matches!(transfer, DataTransfer::Proxy) && resources.store().is_none() {
            return Err(BenchError::config("--use-proxies requires --ps-connector"));
        }
        Ok(TaskRtt { resources, transfer })
    }
}

impl Benchmark for TaskRtt {
    type Config = RunConfig;
    type Result = TaskRttResult;

    fn name(&self) -> &str {
        "Task Round Trip"
    }

    fn enter(&mut self) -> BenchResult<()> {
        self.resources.enter()
    }

    fn exit(&mut self) -> BenchResult<()> {
        self.resources.exit()
    }

    fn config(&self) -> BTreeMap<String, String> {
        let mut labels = self.resources.labels();
        labels.insert("transfer".into(), self.transfer.to_string());
        labels
    }

    fn run(&mut self, config: &RunConfig) -> BenchResult<RunOutput<TaskRttResult>> {
        self.resources.ensure_entered()?;
        let executor = self.resources.executor()?.as_ref();
        let sleep = seconds(config.sleep, "task sleep")?;
        let data = randbytes(config.input_size_bytes);

        let total = Instant::now();
        let clock = Instant::now();
        let (input, store, ipfs) = match &self.transfer {
            DataTransfer::Value => (Payload::Bytes(data), None, None),
            DataTransfer::Proxy => {
                let store = self
                    .resources
                    .store()
                    .ok_or_else(|| BenchError::config("proxy transfer requires a store"))?;
                (Payload::Proxy(store.proxy(&data)?), Some(store.clone()), None)
            }
            DataTransfer::Ipfs(ipfs) => (Payload::Cid(ipfs.put(&data)?), None, Some(ipfs.clone())),
        };
        let input_put_ms = millis(clock.elapsed());

        let output_size = config.output_size_bytes;
        let submit_timestamp = now_epoch();
        let pong = submit(executor, move || pong(input, output_size, sleep, store, ipfs))?.result()?;
        let received_timestamp = now_epoch();

        let clock = Instant::now();
        let returned = match pong.output {
            Payload::Bytes(bytes) => bytes.len(),
            Payload::Proxy(proxy) => {
                let len = proxy.resolve()?.len();
                proxy.store().evict(proxy.key())?;
                len
            }
            Payload::Cid(cid) => match &self.transfer {
                DataTransfer::Ipfs(ipfs) => ipfs.fetch(&cid)?.len(),
                _ => return Err(BenchError::Task("task returned an IPFS CID".into())),
            },
        };
        let output_get_ms = millis(clock.elapsed());
        let total_time_ms = millis(total.elapsed());
        if returned != output_size {
            return Err(BenchError::Task(format!(
                "task returned {returned} bytes, expected {output_size}"
            )));
        }

        Ok(TaskRttResult {
            executor: executor.name().to_string(),
            connector: self
                .resources
                .store()
                .map_or_else(|| "none".to_string(), |s| s.connector_name().to_string()),
            transfer: self.transfer.to_string(),
            input_size_bytes: config.input_size_bytes,
            output_size_bytes: config.output_size_bytes,
            task_sleep: config.sleep,
            submit_timestamp,
            received_timestamp,
            input_put_ms,
            input_get_ms: pong.input_get_ms,
            output_put_ms: pong.output_put_ms,
            output_get_ms,
            total_time_ms,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ThreadPool;
    use crate::results::serialized_header;
    use crate::store::{FileConnector, MemoryConnector};
    use std::sync::Arc;

    #[test]
    fn test_matrix_configs() {
        let matrix = TaskRttMatrix::new(vec![1, 2], vec![3, 4, 5], 6.0).unwrap();
        let configs = matrix.configs();
        assert_eq!(configs.len(), 6);
        assert_eq!(
            configs[0],
            RunConfig {
                input_size_bytes: 1,
                output_size_bytes: 3,
                sleep: 6.0
            }
        );
        assert_eq!(configs[5].input_size_bytes, 2);
        assert_eq!(configs[5].output_size_bytes, 5);
        assert!(configs.iter().all(|c| c.sleep == 6.0));
    }

    #[test]
    fn test_matrix_rejects_negative_sleep() {
        assert!(TaskRttMatrix::new(vec![1], vec![1], -0.5).is_err());
        assert!(TaskRttMatrix::new(vec![], vec![1], 0.0).is_err());
    }

    fn resources(with_store: bool) -> Resources {
        let store = with_store.then(|| Store::new("test", MemoryConnector::new()));
        Resources::new()
            .with_executor(Arc::new(ThreadPool::new("thread", 1).unwrap()))
            .with_store(store)
    }

    #[test]
    fn test_round_trip_by_value_and_proxy() {
        for (transfer, with_store) in [(DataTransfer::Value, false), (DataTransfer::Proxy, true)] {
            let mut bench = TaskRtt::new(resources(with_store), transfer.clone()).unwrap();
            bench.enter().unwrap();
            let config = RunConfig {
                input_size_bytes: 64,
                output_size_bytes: 32,
                sleep: 0.002,
            };
            let records = bench.run(&config).unwrap().into_records();
            assert_eq!(records.len(), 1);
            let result = &records[0];
            assert_eq!(result.transfer, transfer.to_string());
            assert!(result.total_time_ms >= 2.0);
            assert!(result.received_timestamp >= result.submit_timestamp);
            assert_eq!(serialized_header(result).unwrap(), TaskRttResult::field_names());
            bench.exit().unwrap();
        }
    }

    #[test]
    fn test_proxy_runs_leave_store_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store_dir = dir.path().join("store");
        let resources = Resources::new()
            .with_executor(Arc::new(ThreadPool::new("thread", 1).unwrap()))
            .with_store(Some(Store::new("test", FileConnector::new(&store_dir))));
        let mut bench = TaskRtt::new(resources, DataTransfer::Proxy).unwrap();
        bench.enter().unwrap();
        let config = RunConfig {
            input_size_bytes: 16,
            output_size_bytes: 16,
            sleep: 0.0,
        };
        for _ in 0..3 {
            bench.run(&config).unwrap();
        }
        assert_eq!(std::fs::read_dir(&store_dir).unwrap().count(), 0);
        bench.exit().unwrap();
    }

    #[test]
    fn test_proxy_transfer_needs_store() {
        assert!(matches!(
            TaskRtt::new(resources(false), DataTransfer::Proxy),
            Err(BenchError::Config(_))
        ));
    }
}
