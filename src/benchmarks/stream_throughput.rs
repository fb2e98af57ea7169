//! Stream throughput benchmark.
//!
//! A producer thread publishes `item_count` framed items onto the stream
//! while the calling thread consumes them. Items carry either the payload
//! inline or the key of an object placed in the store.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bench::{Benchmark, BenchmarkMatrix, Resources, RunOutput};
use crate::config::{get_flag, get_many, get_one};
use crate::core::TimingStat;
use crate::results::Record;
use crate::store::{Key, Store};
use crate::stream::{Publisher, Subscriber};
use crate::utils::{millis, now_epoch, randbytes, seconds};
use crate::{BenchError, BenchResult};

pub const NAME: &str = "stream-throughput";

/// Longest the consumer waits for any single item.
const ITEM_TIMEOUT: Duration = Duration::from_secs(30);

const INLINE: u8 = 0;
const BY_KEY: u8 = 1;
const HEADER_LEN: usize = 1 + 8 + 8;

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub item_size_bytes: usize,
    pub item_count: usize,
    /// Seconds the producer sleeps between items.
    pub producer_sleep: f64,
    pub use_proxies: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamThroughputMatrix {
    pub item_sizes: Vec<usize>,
    pub item_count: usize,
    pub producer_sleeps: Vec<f64>,
    pub use_proxies: bool,
}

impl StreamThroughputMatrix {
    pub fn new(
        item_sizes: Vec<usize>,
        item_count: usize,
        producer_sleeps: Vec<f64>,
        use_proxies: bool,
    ) -> BenchResult<Self> {
        if item_sizes.is_empty() || producer_sleeps.is_empty() {
            return Err(BenchError::config("item sizes and producer sleeps must not be empty"));
        }
        if item_count == 0 {
            return Err(BenchError::config("--item-count must be at least 1"));
        }
        for &sleep in &producer_sleeps {
            seconds(sleep, "--producer-sleeps")?;
        }
        Ok(StreamThroughputMatrix {
            item_sizes,
            item_count,
            producer_sleeps,
            use_proxies,
        })
    }
}

impl BenchmarkMatrix for StreamThroughputMatrix {
    type Config = RunConfig;

    fn add_args(cmd: Command) -> Command {
        cmd.next_help_heading("Benchmark")
            .arg(
                Arg::new("item-sizes")
                    .long("item-sizes")
                    .value_parser(value_parser!(usize))
                    .num_args(1..)
                    .required(true)
                    .help("Stream item sizes in bytes"),
            )
            .arg(
                Arg::new("item-count")
                    .long("item-count")
                    .value_parser(value_parser!(usize))
                    .default_value("100")
                    .help("Items published per run"),
            )
            .arg(
                Arg::new("producer-sleeps")
                    .long("producer-sleeps")
                    .value_parser(value_parser!(f64))
                    .num_args(1..)
                    .default_value("0")
                    .help("Seconds the producer sleeps between items"),
            )
            .arg(
                Arg::new("use-proxies")
                    .long("use-proxies")
                    .action(ArgAction::SetTrue)
                    .help("Publish store keys instead of inline payloads"),
            )
    }

    fn from_matches(matches: &ArgMatches) -> BenchResult<Self> {
        StreamThroughputMatrix::new(
            get_many(matches, "item-sizes").unwrap_or_default(),
            get_one(matches, "item-count").unwrap_or(100),
            get_many(matches, "producer-sleeps").unwrap_or_else(|| vec![0.0]),
            get_flag(matches, "use-proxies"),
        )
    }

    fn configs(&self) -> Vec<RunConfig> {
        self.item_sizes
            .iter()
            .flat_map(|&item_size_bytes| {
                self.producer_sleeps.iter().map(move |&producer_sleep| RunConfig {
                    item_size_bytes,
                    item_count: self.item_count,
                    producer_sleep,
                    use_proxies: self.use_proxies,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamThroughputResult {
    pub stream: String,
    pub connector: String,
    pub item_size_bytes: usize,
    pub item_count: usize,
    pub producer_sleep: f64,
    pub use_proxies: bool,
    pub start_timestamp: f64,
    pub end_timestamp: f64,
    pub elapsed_ms: f64,
    pub throughput_items_per_s: f64,
    pub bandwidth_mbps: f64,
    pub avg_latency_ms: f64,
    pub median_latency_ms: f64,
    pub min_latency_ms: f64,
    pub max_latency_ms: f64,
    pub p95_latency_ms: f64,
}

impl Record for StreamThroughputResult {
    fn field_names() -> &'static [&'static str] {
        &[
            "stream",
            "connector",
            "item_size_bytes",
            "item_count",
            "producer_sleep",
            "use_proxies",
            "start_timestamp",
            "end_timestamp",
            "elapsed_ms",
            "throughput_items_per_s",
            "bandwidth_mbps",
            "avg_latency_ms",
            "median_latency_ms",
            "min_latency_ms",
            "max_latency_ms",
            "p95_latency_ms",
        ]
    }
}

/// Decoded stream item.
#[derive(Debug, Clone, PartialEq)]
enum Body {
    Inline(Vec<u8>),
    Stored(Key),
}

#[derive(Debug, Clone, PartialEq)]
struct Frame {
    index: u64,
    sent: f64,
    body: Body,
}

impl Frame {
    /// `[flag u8][index u64 LE][send time f64 LE][payload or key]`
    fn encode(&self) -> Vec<u8> {
        let (flag, rest) = match &self.body {
            Body::Inline(bytes) => (INLINE, bytes.as_slice()),
            Body::Stored(key) => (BY_KEY, key.as_str().as_bytes()),
        };
        let mut buf = Vec::with_capacity(HEADER_LEN + rest.len());
        buf.push(flag);
        buf.extend_from_slice(&self.index.to_le_bytes());
        buf.extend_from_slice(&self.sent.to_le_bytes());
        buf.extend_from_slice(rest);
        buf
    }

    fn decode(buf: &[u8]) -> BenchResult<Self> {
        if buf.len() < HEADER_LEN {
            return Err(BenchError::Message(format!(
                "stream item of {} bytes is shorter than its header",
                buf.len()
            )));
        }
        let mut index = [0u8; 8];
        index.copy_from_slice(&buf[1..9]);
        let mut sent = [0u8; 8];
        sent.copy_from_slice(&buf[9..HEADER_LEN]);
        let rest = &buf[HEADER_LEN..];
        let body = match buf[0] {
            INLINE => Body::Inline(rest.to_vec()),
            BY_KEY => {
                let key = std::str::from_utf8(rest)
                    .map_err(|e| BenchError::Message(format!("stream item key is not UTF-8: {e}")))?;
                Body::Stored(Key::from(key))
            }
            flag => return Err(BenchError::Message(format!("unknown stream item flag {flag}"))),
        };
        Ok(Frame {
            index: u64::from_le_bytes(index),
            sent: f64::from_le_bytes(sent),
            body,
        })
    }
}

fn produce(
    publisher: &mut dyn Publisher,
    store: Option<&Store>,
    config: &RunConfig,
    pause: Duration,
) -> BenchResult<()> {
    for index in 0..config.item_count as u64 {
        let payload = randbytes(config.item_size_bytes);
        let body = match store {
            Some(store) => Body::Stored(store.put(&payload)?),
            None => Body::Inline(payload),
        };
        let frame = Frame {
            index,
            sent: now_epoch(),
            body,
        };
        publisher.send(&frame.encode())?;
        if !pause.is_zero() {
            std::thread::sleep(pause);
        }
    }
    Ok(())
}

/// Receive every item in order; returns per-item latencies in ms and the
/// receive time of the last item.
fn consume(
    subscriber: &mut dyn Subscriber,
    store: Option<&Store>,
    config: &RunConfig,
) -> BenchResult<(Vec<f64>, f64)> {
    let mut latencies = Vec::with_capacity(config.item_count);
    let mut last = now_epoch();
    for expected in 0..config.item_count as u64 {
        let message = subscriber
            .next_message(ITEM_TIMEOUT)?
            .ok_or_else(|| BenchError::Timeout(format!("stream item {expected} did not arrive within {ITEM_TIMEOUT:?}")))?;
        let frame = Frame::decode(&message)?;
        if frame.index != expected {
            return Err(BenchError::Message(format!(
                "stream items out of order: expected {expected}, got {}",
                frame.index
            )));
        }
        let received = match (frame.body, store) {
            (Body::Inline(bytes), _) => bytes.len(),
            (Body::Stored(key), Some(store)) => {
                let bytes = store
                    .get(&key)?
                    .ok_or_else(|| BenchError::Message(format!("stream item {expected} key {key} does not exist")))?;
                store.evict(&key)?;
                bytes.len()
            }
            (Body::Stored(_), None) => {
                return Err(BenchError::Message("received a store key without a store".into()));
            }
        };
        last = now_epoch();
        if received != config.item_size_bytes {
            return Err(BenchError::Message(format!(
                "stream item {expected} has {received} bytes, expected {}",
                config.item_size_bytes
            )));
        }
        latencies.push((last - frame.sent).max(0.0) * 1000.0);
    }
    Ok((latencies, last))
}

pub struct StreamThroughput {
    resources: Resources,
}

impl StreamThroughput {
    pub fn new(resources: Resources) -> BenchResult<Self> {
        if !resources.has_stream() {
            return Err(BenchError::config("the stream throughput benchmark requires --stream"));
        }
        Ok(StreamThroughput { resources })
    }
}

impl Benchmark for StreamThroughput {
    type Config = RunConfig;
    type Result = StreamThroughputResult;

    fn name(&self) -> &str {
        "Stream Throughput"
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

    fn run(&mut self, config: &RunConfig) -> BenchResult<RunOutput<StreamThroughputResult>> {
        self.resources.ensure_entered()?;
        let store = match (config.use_proxies, self.resources.store()) {
            (true, Some(store)) => Some(store),
            (true, None) => return Err(BenchError::config("--use-proxies requires --ps-connector")),
            (false, _) => None,
        };
        let pause = seconds(config.producer_sleep, "producer sleep")?;

        let mut pair = self.resources.take_stream()?;
        let stream_kind = pair.kind.clone();
        let publisher = pair.publisher.as_mut();
        let subscriber = pair.subscriber.as_mut();

        let start_timestamp = now_epoch();
        let clock = Instant::now();
        let (produced, consumed) = std::thread::scope(|scope| {
            let producer = scope.spawn(move || produce(publisher, store, config, pause));
            let consumed = consume(subscriber, store, config);
            let produced = producer
                .join()
                .unwrap_or_else(|_| Err(BenchError::Task("stream producer panicked".into())));
            (produced, consumed)
        });
        let elapsed = clock.elapsed();
        self.resources.restore_stream(pair);
        produced?;
        let (latencies, end_timestamp) = consumed?;
        debug!(items = latencies.len(), elapsed_ms = millis(elapsed), "stream run complete");

        let stat = TimingStat::from_samples(&latencies);
        let secs = elapsed.as_secs_f64();
        let (throughput, bandwidth) = if secs > 0.0 {
            let items = config.item_count as f64;
            (items / secs, items * config.item_size_bytes as f64 / 1e6 / secs)
        } else {
            (0.0, 0.0)
        };

        Ok(StreamThroughputResult {
            stream: stream_kind,
            connector: store.map_or_else(|| "none".to_string(), |s| s.connector_name().to_string()),
            item_size_bytes: config.item_size_bytes,
            item_count: config.item_count,
            producer_sleep: config.producer_sleep,
            use_proxies: config.use_proxies,
            start_timestamp,
            end_timestamp,
            elapsed_ms: millis(elapsed),
            throughput_items_per_s: throughput,
            bandwidth_mbps: bandwidth,
            avg_latency_ms: stat.mean_ms,
            median_latency_ms: stat.median_ms.unwrap_or(0.0),
            min_latency_ms: stat.min_ms,
            max_latency_ms: stat.max_ms,
            p95_latency_ms: stat.p95_ms.unwrap_or(0.0),
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::serialized_header;
    use crate::store::MemoryConnector;
    use crate::stream::local_stream;

    #[test]
    fn test_frame_layout() {
        let frame = Frame {
            index: 3,
            sent: 1.5,
            body: Body::Inline(vec![9, 9]),
        };
        let buf = frame.encode();
        assert_eq!(buf.len(), HEADER_LEN + 2);
        assert_eq!(buf[0], INLINE);
        assert_eq!(&buf[1..9], &3u64.to_le_bytes());
        assert_eq!(Frame::decode(&buf).unwrap(), frame);

        let keyed = Frame {
            index: 0,
            sent: 0.0,
            body: Body::Stored(Key::from("abc")),
        };
        assert_eq!(Frame::decode(&keyed.encode()).unwrap(), keyed);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(Frame::decode(&[0u8; 4]).is_err());
        let mut buf = vec![7u8];
        buf.extend_from_slice(&[0u8; 16]);
        assert!(Frame::decode(&buf).is_err());
    }

    #[test]
    fn test_matrix_configs() {
        let matrix = StreamThroughputMatrix::new(vec![10, 20], 5, vec![0.0, 0.01], true).unwrap();
        let configs = matrix.configs();
        assert_eq!(configs.len(), 4);
        assert_eq!((configs[1].item_size_bytes, configs[1].producer_sleep), (10, 0.01));
        assert_eq!(configs[2].item_size_bytes, 20);
        assert!(configs.iter().all(|c| c.item_count == 5 && c.use_proxies));
        assert!(StreamThroughputMatrix::new(vec![1], 0, vec![0.0], false).is_err());
        assert!(StreamThroughputMatrix::new(vec![1], 1, vec![-1.0], false).is_err());
    }

    fn bench(with_store: bool) -> StreamThroughput {
        let store = with_store.then(|| Store::new("test", MemoryConnector::new()));
        let resources = Resources::new()
            .with_store(store)
            .with_stream(Some(local_stream("items")));
        StreamThroughput::new(resources).unwrap()
    }

    #[test]
    fn test_inline_and_proxied_items() {
        for use_proxies in [false, true] {
            let mut bench = bench(use_proxies);
            bench.enter().unwrap();
            let config = RunConfig {
                item_size_bytes: 128,
                item_count: 20,
                producer_sleep: 0.0,
                use_proxies,
            };
            // The stream is handed back after each run, so a second run works.
            for _ in 0..2 {
                let records = bench.run(&config).unwrap().into_records();
                let result = &records[0];
                assert_eq!(result.stream, "local");
                assert_eq!(result.item_count, 20);
                assert!(result.throughput_items_per_s > 0.0);
                assert!(result.min_latency_ms >= 0.0);
                assert!(result.end_timestamp >= result.start_timestamp);
                assert_eq!(serialized_header(result).unwrap(), StreamThroughputResult::field_names());
            }
            bench.exit().unwrap();
        }
    }

    #[test]
    fn test_proxies_need_store() {
        let mut bench = bench(false);
        bench.enter().unwrap();
        let config = RunConfig {
            item_size_bytes: 1,
            item_count: 1,
            producer_sleep: 0.0,
            use_proxies: true,
        };
        assert!(matches!(bench.run(&config), Err(BenchError::Config(_))));
        bench.exit().unwrap();
    }

    #[test]
    fn test_requires_stream() {
        assert!(StreamThroughput::new(Resources::new()).is_err());
    }
}
