//! `psbench stream-throughput`: item rate and latency through a stream.

use clap::{ArgMatches, Command};

use crate::bench::{BenchmarkMatrix, Resources};
use crate::benchmarks::stream_throughput::{NAME, StreamThroughput, StreamThroughputMatrix};
use crate::cli;
use crate::config::{ConfigGroup, GeneralConfig, StoreConfig, StreamConfig};
use crate::{BenchError, BenchResult};

pub fn command(argv: &[String]) -> Command {
    let cmd = Command::new(NAME).about("Stream throughput with inline or proxied items");
    let cmd = GeneralConfig::add_args(cmd, false, argv);
    let cmd = StoreConfig::add_args(cmd, false, argv);
    let cmd = StreamConfig::add_args(cmd, true, argv);
    StreamThroughputMatrix::add_args(cmd)
}

pub fn main(argv: Vec<String>) -> i32 {
    match cli::parse(command(&argv), &argv) {
        Ok(matches) => cli::report(run(&matches)),
        Err(code) => code,
    }
}

fn run(matches: &ArgMatches) -> BenchResult<()> {
    let general = GeneralConfig::from_matches(matches)?;
    let store = StoreConfig::from_matches(matches)?;
    let stream = StreamConfig::from_matches(matches)?;
    let matrix = StreamThroughputMatrix::from_matches(matches)?;
    if matrix.use_proxies && store.connector.is_none() {
        return Err(BenchError::config("--use-proxies requires --ps-connector"));
    }

    let paths = cli::startup(&general, NAME)?;
    let resources = Resources::new()
        .with_store(store.get_resource()?)
        .with_stream(stream.get_resource()?)
        .with_profiler(cli::memory_profiler(&general, &paths)?);
    let mut benchmark = StreamThroughput::new(resources)?;
    cli::execute(&mut benchmark, &matrix.configs(), &paths, general.repeat)
}
