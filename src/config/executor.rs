//! Executor selection.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command, value_parser};
use tracing::debug;

use super::{ConfigGroup, get_flag, get_one, preparse_value};
use crate::executor::{Executor, ThreadPool};
use crate::{BenchError, BenchResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorKind {
    Thread,
    Process,
    Dask,
    Globus,
    Parsl,
}

impl ExecutorKind {
    pub const NAMES: [&'static str; 5] = ["thread", "process", "dask", "globus", "parsl"];
}

impl FromStr for ExecutorKind {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thread" => Ok(ExecutorKind::Thread),
            "process" => Ok(ExecutorKind::Process),
            "dask" => Ok(ExecutorKind::Dask),
            "globus" => Ok(ExecutorKind::Globus),
            "parsl" => Ok(ExecutorKind::Parsl),
            _ => Err(BenchError::config(format!(
                "unknown executor '{s}', expected one of {}",
                Self::NAMES.join(", ")
            ))),
        }
    }
}

impl fmt::Display for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutorKind::Thread => "thread",
            ExecutorKind::Process => "process",
            ExecutorKind::Dask => "dask",
            ExecutorKind::Globus => "globus",
            ExecutorKind::Parsl => "parsl",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaskTopology {
    /// Connect to a running scheduler.
    Scheduler(String),
    /// Start a local cluster.
    Local { workers: usize, use_threads: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParslTopology {
    Thread,
    HtexLocal,
    HtexPolaris,
}

impl ParslTopology {
    pub const NAMES: [&'static str; 3] = ["thread", "htex-local", "htex-polaris"];
}

impl FromStr for ParslTopology {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thread" => Ok(ParslTopology::Thread),
            "htex-local" => Ok(ParslTopology::HtexLocal),
            "htex-polaris" => Ok(ParslTopology::HtexPolaris),
            _ => Err(BenchError::config(format!(
                "unknown parsl executor '{s}', expected one of {}",
                Self::NAMES.join(", ")
            ))),
        }
    }
}

impl fmt::Display for ParslTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParslTopology::Thread => "thread",
            ParslTopology::HtexLocal => "htex-local",
            ParslTopology::HtexPolaris => "htex-polaris",
        };
        f.write_str(name)
    }
}

/// Which executor to run tasks on, with that kind's options.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorConfig {
    Thread {
        max_workers: usize,
    },
    Process {
        max_workers: usize,
    },
    Dask(DaskTopology),
    Globus {
        endpoint: uuid::Uuid,
    },
    Parsl {
        topology: ParslTopology,
        max_workers: usize,
        run_dir: PathBuf,
    },
}

impl ExecutorConfig {
    pub fn kind(&self) -> ExecutorKind {
        match self {
            ExecutorConfig::Thread { .. } => ExecutorKind::Thread,
            ExecutorConfig::Process { .. } => ExecutorKind::Process,
            ExecutorConfig::Dask(_) => ExecutorKind::Dask,
            ExecutorConfig::Globus { .. } => ExecutorKind::Globus,
            ExecutorConfig::Parsl { .. } => ExecutorKind::Parsl,
        }
    }

    /// Build the executor. The result is not started; the benchmark that
    /// receives it starts and shuts it down.
    ///
    /// Local topologies run on an in-process [`ThreadPool`]: tasks are
    /// closures and cannot be shipped to worker processes.
    pub fn get_resource(&self) -> BenchResult<Arc<dyn Executor>> {
        let name = self.kind().to_string();
        let pool = match self {
            ExecutorConfig::Thread { max_workers } | ExecutorConfig::Process { max_workers } => {
                ThreadPool::new(name, *max_workers)?
            }
            ExecutorConfig::Dask(DaskTopology::Local { workers, .. }) => {
                ThreadPool::new(name, *workers)?
            }
            ExecutorConfig::Dask(DaskTopology::Scheduler(address)) => {
                return Err(BenchError::acquire(
                    format!("dask scheduler at {address}"),
                    "no dask client in this build",
                ));
            }
            ExecutorConfig::Globus { endpoint } => {
                return Err(BenchError::acquire(
                    format!("globus compute endpoint {endpoint}"),
                    "no globus compute client in this build",
                ));
            }
            ExecutorConfig::Parsl {
                topology: ParslTopology::HtexPolaris,
                ..
            } => {
                return Err(BenchError::acquire(
                    "parsl htex-polaris executor",
                    "requires a PBS allocation, which this build cannot provision",
                ));
            }
            ExecutorConfig::Parsl {
                max_workers,
                run_dir,
                ..
            } => {
                std::fs::create_dir_all(run_dir)
                    .map_err(|e| BenchError::acquire(format!("parsl run dir {}", run_dir.display()), e))?;
                ThreadPool::new(name, *max_workers)?
            }
        };
        debug!(executor = %self.kind(), "executor materialized");
        Ok(Arc::new(pool))
    }
}

impl ConfigGroup for ExecutorConfig {
    fn add_args(cmd: Command, required: bool, argv: &[String]) -> Command {
        let selected = preparse_value(argv, "--executor").and_then(|s| s.parse::<ExecutorKind>().ok());
        let is = |kind: ExecutorKind| selected == Some(kind);

        cmd.next_help_heading("Executor")
            .arg(
                Arg::new("executor")
                    .long("executor")
                    .value_parser(ExecutorKind::NAMES)
                    .required(required)
                    .help("Task executor to use"),
            )
            .arg(
                Arg::new("max-workers")
                    .long("max-workers")
                    .value_parser(value_parser!(usize))
                    .required(is(ExecutorKind::Thread) || is(ExecutorKind::Process))
                    .help("Workers of the thread/process pool"),
            )
            .arg(
                Arg::new("dask-scheduler")
                    .long("dask-scheduler")
                    .help("Address of a running Dask scheduler"),
            )
            .arg(
                Arg::new("dask-workers")
                    .long("dask-workers")
                    .value_parser(value_parser!(usize))
                    .help("Workers of a local Dask cluster"),
            )
            .arg(
                Arg::new("dask-use-threads")
                    .long("dask-use-threads")
                    .action(ArgAction::SetTrue)
                    .conflicts_with("dask-scheduler")
                    .help("Use threaded workers in the local Dask cluster"),
            )
            .group(
                ArgGroup::new("dask-topology")
                    .args(["dask-scheduler", "dask-workers"])
                    .multiple(false)
                    .required(is(ExecutorKind::Dask)),
            )
            .arg(
                Arg::new("globus-endpoint")
                    .long("globus-endpoint")
                    .value_parser(value_parser!(uuid::Uuid))
                    .required(is(ExecutorKind::Globus))
                    .help("Globus Compute endpoint UUID"),
            )
            .arg(
                Arg::new("parsl-executor")
                    .long("parsl-executor")
                    .value_parser(ParslTopology::NAMES)
                    .required(is(ExecutorKind::Parsl))
                    .help("Parsl executor topology"),
            )
            .arg(
                Arg::new("parsl-max-workers")
                    .long("parsl-max-workers")
                    .value_parser(value_parser!(usize))
                    .required(is(ExecutorKind::Parsl))
                    .help("Workers per Parsl node"),
            )
            .arg(
                Arg::new("parsl-run-dir")
                    .long("parsl-run-dir")
                    .value_parser(value_parser!(PathBuf))
                    .required(is(ExecutorKind::Parsl))
                    .help("Parsl run info directory"),
            )
    }

    fn from_matches(matches: &ArgMatches) -> BenchResult<Self> {
        let kind: ExecutorKind = get_one::<String>(matches, "executor")
            .ok_or_else(|| BenchError::config("--executor is required"))?
            .parse()?;
        let missing = |flag: &str| BenchError::config(format!("--{flag} is required for --executor {kind}"));
        let positive = |flag: &str, value: usize| {
            if value == 0 {
                Err(BenchError::config(format!("--{flag} must be at least 1")))
            } else {
                Ok(value)
            }
        };

        let config = match kind {
            ExecutorKind::Thread | ExecutorKind::Process => {
                let max_workers = get_one::<usize>(matches, "max-workers").ok_or_else(|| missing("max-workers"))?;
                let max_workers = positive("max-workers", max_workers)?;
                if kind == ExecutorKind::Thread {
                    ExecutorConfig::Thread { max_workers }
                } else {
                    ExecutorConfig::Process { max_workers }
                }
            }
            ExecutorKind::Dask => {
                let scheduler = get_one::<String>(matches, "dask-scheduler");
                let workers = get_one::<usize>(matches, "dask-workers");
                match (scheduler, workers) {
                    (Some(address), None) => ExecutorConfig::Dask(DaskTopology::Scheduler(address)),
                    (None, Some(workers)) => ExecutorConfig::Dask(DaskTopology::Local {
                        workers: positive("dask-workers", workers)?,
                        use_threads: get_flag(matches, "dask-use-threads"),
                    }),
                    (Some(_), Some(_)) => {
                        return Err(BenchError::config(
                            "--dask-scheduler and --dask-workers are mutually exclusive",
                        ));
                    }
                    (None, None) => return Err(missing("dask-scheduler or --dask-workers")),
                }
            }
            ExecutorKind::Globus => ExecutorConfig::Globus {
                endpoint: get_one::<uuid::Uuid>(matches, "globus-endpoint").ok_or_else(|| missing("globus-endpoint"))?,
            },
            ExecutorKind::Parsl => {
                let topology: ParslTopology = get_one::<String>(matches, "parsl-executor")
                    .ok_or_else(|| missing("parsl-executor"))?
                    .parse()?;
                let max_workers =
                    get_one::<usize>(matches, "parsl-max-workers").ok_or_else(|| missing("parsl-max-workers"))?;
                ExecutorConfig::Parsl {
                    topology,
                    max_workers: positive("parsl-max-workers", max_workers)?,
                    run_dir: get_one(matches, "parsl-run-dir").ok_or_else(|| missing("parsl-run-dir"))?,
                }
            }
        };
        Ok(config)
    }
}
