//! `psbench endpoint-qps`: request rate a store endpoint sustains.

use clap::{ArgMatches, Command};

use crate::bench::{BenchmarkMatrix, Resources};
use crate::benchmarks::endpoint_qps::{EndpointQps, EndpointQpsMatrix, NAME};
use crate::cli;
use crate::config::{ConfigGroup, GeneralConfig, StoreConfig};
use crate::BenchResult;

pub fn command(argv: &[String]) -> Command {
    let cmd = Command::new(NAME).about("Queries per second against a store endpoint");
    let cmd = GeneralConfig::add_args(cmd, false, argv);
    let cmd = StoreConfig::add_args(cmd, true, argv);
    EndpointQpsMatrix::add_args(cmd)
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
    let matrix = EndpointQpsMatrix::from_matches(matches)?;

    let paths = cli::startup(&general, NAME)?;
    let resources = Resources::new()
        .with_store(store.get_resource()?)
        .with_profiler(cli::memory_profiler(&general, &paths)?);
    let mut benchmark = EndpointQps::new(resources)?;
    cli::execute(&mut benchmark, &matrix.configs(), &paths, general.repeat)
}
