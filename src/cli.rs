//! Pieces shared by the benchmark entry points: argument parsing, run
//! directory layout, logging setup and the final run/report step.

use std::fs;
use std::path::PathBuf;

use clap::{ArgMatches, Command};
use tracing::{error, info};

use crate::bench::{self, Benchmark};
use crate::config::GeneralConfig;
use crate::core::EnvironmentInfo;
use crate::logging::{TEST, init_logging};
use crate::memory::MemoryProfiler;
use crate::storage::{CsvSink, ResultSink, memory_csv_path};
use crate::utils::{seconds, utc_slug_timestamp};
use crate::BenchResult;

/// Exit code for usage errors.
pub const USAGE_ERROR: i32 = 2;

/// Parse `argv` (without the program name) against `cmd`.
///
/// On failure the clap message is printed and the process exit code is
/// returned: 0 for `--help`/`--version`, [`USAGE_ERROR`] otherwise.
pub fn parse(cmd: Command, argv: &[String]) -> Result<ArgMatches, i32> {
    let name = cmd.get_name().to_string();
    cmd.try_get_matches_from(std::iter::once(name).chain(argv.iter().cloned()))
        .map_err(|e| {
            let _ = e.print();
            e.exit_code()
        })
}

/// Files a run writes to.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPaths {
    /// `<run-dir>/<benchmark>-<timestamp>/`
    pub run_dir: PathBuf,
    pub csv_file: PathBuf,
    pub log_file: PathBuf,
    pub memory_csv_file: PathBuf,
}

impl RunPaths {
    /// Create the timestamped run directory for `slug`.
    ///
    /// `--csv-file` and `--log-file` override the files inside it; the
    /// memory profile always sits next to the results file.
    pub fn prepare(general: &GeneralConfig, slug: &str) -> BenchResult<Self> {
        let run_dir = general.run_dir.join(format!("{slug}-{}", utc_slug_timestamp()?));
        fs::create_dir_all(&run_dir)?;
        let csv_file = general
            .csv_file
            .clone()
            .unwrap_or_else(|| run_dir.join("results.csv"));
        let log_file = general
            .log_file
            .clone()
            .unwrap_or_else(|| run_dir.join("log.txt"));
        Ok(RunPaths {
            memory_csv_file: memory_csv_path(&csv_file),
            run_dir,
            csv_file,
            log_file,
        })
    }
}

/// Prepare the run directory, install logging and record the host.
pub fn startup(general: &GeneralConfig, slug: &str) -> BenchResult<RunPaths> {
    let paths = RunPaths::prepare(general, slug)?;
    init_logging(general.log_level, Some(paths.log_file.as_path()))?;
    info!(target: TEST, run_dir = %paths.run_dir.display(), "starting {slug}");
    info!(target: TEST, environment = ?EnvironmentInfo::detect(), "host environment");
    Ok(paths)
}

/// Memory profiler writing to the run's memory CSV, if one was requested.
pub fn memory_profiler(general: &GeneralConfig, paths: &RunPaths) -> BenchResult<Option<MemoryProfiler>> {
    general
        .memory_profile_interval
        .map(|interval| {
            let interval = seconds(interval, "--memory-profile-interval")?;
            MemoryProfiler::new(interval, Some(CsvSink::open(&paths.memory_csv_file)?))
        })
        .transpose()
}

/// Run `benchmark` over `configs`, appending every record to the run's CSV.
pub fn execute<B: Benchmark>(
    benchmark: &mut B,
    configs: &[B::Config],
    paths: &RunPaths,
    repeat: usize,
) -> BenchResult<()> {
    let mut sink = CsvSink::<B::Result>::open(&paths.csv_file)?;
    let outcome = bench::run(benchmark, configs, &mut sink, repeat);
    let closed = sink.close();
    outcome?;
    closed?;
    info!(
        target: TEST,
        rows = sink.rows_written(),
        csv = %paths.csv_file.display(),
        "results written"
    );
    Ok(())
}

/// Log the outcome and turn it into a process exit code.
pub fn report(result: BenchResult<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BenchError;
    use crate::config::ConfigGroup;
    use crate::config::tests::argv;

    #[test]
    fn test_run_paths_layout() {
        let dir = tempfile::tempdir().unwrap();
        let general = GeneralConfig {
            run_dir: dir.path().to_path_buf(),
            ..GeneralConfig::default()
        };
        let paths = RunPaths::prepare(&general, "task-rtt").unwrap();
        assert!(paths.run_dir.is_dir());
        assert!(paths.run_dir.starts_with(dir.path()));
        let name = paths.run_dir.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("task-rtt-"));
        // task-rtt-YYYY-MM-DD-HH-MM-SS
        assert_eq!(name.len(), "task-rtt-".len() + 19);
        assert_eq!(paths.csv_file, paths.run_dir.join("results.csv"));
        assert_eq!(paths.log_file, paths.run_dir.join("log.txt"));
        assert_eq!(paths.memory_csv_file, paths.run_dir.join("results-memory.csv"));
    }

    #[test]
    fn test_run_paths_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let general = GeneralConfig {
            run_dir: dir.path().join("runs"),
            csv_file: Some(dir.path().join("out.csv")),
            log_file: Some(dir.path().join("out.log")),
            ..GeneralConfig::default()
        };
        let paths = RunPaths::prepare(&general, "x").unwrap();
        assert_eq!(paths.csv_file, dir.path().join("out.csv"));
        assert_eq!(paths.memory_csv_file, dir.path().join("out-memory.csv"));
        assert_eq!(paths.log_file, dir.path().join("out.log"));
    }

    #[test]
    fn test_parse_exit_codes() {
        let cmd = || GeneralConfig::add_args(Command::new("bench"), false, &[]);
        assert!(parse(cmd(), &argv(&["--repeat", "2"])).is_ok());
        assert_eq!(parse(cmd(), &argv(&["--bogus"])).unwrap_err(), USAGE_ERROR);
        assert_eq!(parse(cmd(), &argv(&["--help"])).unwrap_err(), 0);
    }

    #[test]
    fn test_report_codes() {
        assert_eq!(report(Ok(())), 0);
        assert_eq!(report(Err(BenchError::config("nope"))), 1);
    }
}
