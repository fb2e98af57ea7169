//! `psbench task-rtt`: round-trip time of a single no-op task.

use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::bench::{BenchmarkMatrix, Resources};
use crate::benchmarks::task_rtt::{DataTransfer, NAME, TaskRtt, TaskRttMatrix};
use crate::cli;
use crate::config::{ConfigGroup, ExecutorConfig, GeneralConfig, IpfsConfig, StoreConfig, get_flag};
use crate::BenchResult;

pub fn command(argv: &[String]) -> Command {
    let cmd = Command::new(NAME).about("Round-trip time of a single task");
    let cmd = GeneralConfig::add_args(cmd, false, argv);
    let cmd = ExecutorConfig::add_args(cmd, true, argv);
    let cmd = StoreConfig::add_args(cmd, false, argv);
    let cmd = IpfsConfig::add_args(cmd, false, argv);
    TaskRttMatrix::add_args(cmd).arg(
        Arg::new("use-proxies")
            .long("use-proxies")
            .action(ArgAction::SetTrue)
            .requires("ps-connector")
            .conflicts_with("use-ipfs")
            .help("Pass task data through store proxies"),
    )
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
    let ipfs = IpfsConfig::from_matches(matches)?;
    let matrix = TaskRttMatrix::from_matches(matches)?;

    let paths = cli::startup(&general, NAME)?;
    let transfer = match ipfs.get_resource()? {
        Some(ipfs) => DataTransfer::Ipfs(ipfs),
        None if get_flag(matches, "use-proxies") => DataTransfer::Proxy,
        None => DataTransfer::Value,
    };
    let resources = Resources::new()
        .with_executor(executor.get_resource()?)
        .with_store(store.get_resource()?)
        .with_profiler(cli::memory_profiler(&general, &paths)?);
    let mut benchmark = TaskRtt::new(resources, transfer)?;
    cli::execute(&mut benchmark, &matrix.configs(), &paths, general.repeat)
}
