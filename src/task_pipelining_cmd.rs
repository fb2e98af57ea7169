//! `psbench task-pipelining`: chains of dependent tasks submitted
//! sequentially or pipelined through store futures.

use clap::{ArgMatches, Command};

use crate::bench::{BenchmarkMatrix, Resources};
use crate::benchmarks::task_pipelining::{NAME, TaskPipelining, TaskPipeliningMatrix};
use crate::cli;
use crate::config::{ConfigGroup, ExecutorConfig, GeneralConfig, StoreConfig};
use crate::{BenchError, BenchResult};

pub fn command(argv: &[String]) -> Command {
    let cmd = Command::new(NAME).about("Task pipelining with proxy futures");
    let cmd = GeneralConfig::add_args(cmd, false, argv);
    let cmd = ExecutorConfig::add_args(cmd, true, argv);
    let cmd = StoreConfig::add_args(cmd, false, argv);
    TaskPipeliningMatrix::add_args(cmd)
}

pub fn main(argv: Vec<String>) -> i32 {
    match cli::parse(command(&argv), &argv) {
        Ok(matches) => cli::report(run(&matches)),
        Err(code) => code,
    }
}

fn run(matches: &ArgMatches) -> BenchResult<()> {
    let general = GeneralConfig::from_matches(matches)?;
    let executor = ExecutorConfig::from_matches(matches)?;
    let store = StoreConfig::from_matches(matches)?;
    let matrix = TaskPipeliningMatrix::from_matches(matches)?;
    if matrix.requires_store() && store.connector.is_none() {
        return Err(BenchError::config(
            "the proxy submission methods require --ps-connector",
        ));
    }

    let paths = cli::startup(&general, NAME)?;
    let resources = Resources::new()
        .with_executor(executor.get_resource()?)
        .with_store(store.get_resource()?)
        .with_profiler(cli::memory_profiler(&general, &paths)?);
    let mut benchmark = TaskPipelining::new(resources);
    cli::execute(&mut benchmark, &matrix.configs(), &paths, general.repeat)
}
