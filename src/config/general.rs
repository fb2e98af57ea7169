//! Options every benchmark takes.

use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};

use super::{ConfigGroup, get_one};
use crate::logging::LogLevel;
use crate::{BenchError, BenchResult};

pub const DEFAULT_RUN_DIR: &str = "runs";

#[derive(Debug, Clone, PartialEq)]
pub struct GeneralConfig {
    /// Results file; defaults to `results.csv` in the run directory.
    pub csv_file: Option<PathBuf>,
    /// Log file; defaults to `log.txt` in the run directory.
    pub log_file: Option<PathBuf>,
    pub log_level: LogLevel,
    pub repeat: usize,
    pub run_dir: PathBuf,
    /// Memory sampling interval in seconds; `None` disables the profiler.
    pub memory_profile_interval: Option<f64>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            csv_file: None,
            log_file: None,
            log_level: LogLevel::Info,
            repeat: 1,
            run_dir: PathBuf::from(DEFAULT_RUN_DIR),
            memory_profile_interval: None,
        }
    }
}

impl ConfigGroup for GeneralConfig {
    fn add_args(cmd: Command, _required: bool, _argv: &[String]) -> Command {
        cmd.next_help_heading("General")
            .arg(
                Arg::new("csv-file")
                    .long("csv-file")
                    .value_parser(value_parser!(PathBuf))
                    .help("Results CSV (default: <run-dir>/<run>/results.csv)"),
            )
            .arg(
                Arg::new("log-file")
                    .long("log-file")
                    .value_parser(value_parser!(PathBuf))
                    .help("Log file (default: <run-dir>/<run>/log.txt)"),
            )
            .arg(
                Arg::new("log-level")
                    .long("log-level")
                    .value_parser(LogLevel::NAMES)
                    .default_value("INFO")
                    .help("Minimum level of messages to log"),
            )
            .arg(
                Arg::new("repeat")
                    .long("repeat")
                    .value_parser(value_parser!(usize))
                    .default_value("1")
                    .help("Repeat each configuration this many times"),
            )
            .arg(
                Arg::new("run-dir")
                    .long("run-dir")
                    .value_parser(value_parser!(PathBuf))
                    .default_value(DEFAULT_RUN_DIR)
                    .help("Parent directory of per-invocation run directories"),
            )
            .arg(
                Arg::new("memory-profile-interval")
                    .long("memory-profile-interval")
                    .value_parser(value_parser!(f64))
                    .action(ArgAction::Set)
                    .help("Sample system memory every SECS seconds"),
            )
    }

    fn from_matches(matches: &ArgMatches) -> BenchResult<Self> {
        let defaults = GeneralConfig::default();
        let log_level = match get_one::<String>(matches, "log-level") {
            Some(name) => name.parse()?,
            None => defaults.log_level,
        };
        let repeat = get_one::<usize>(matches, "repeat").unwrap_or(defaults.repeat);
        if repeat == 0 {
            return Err(BenchError::config("--repeat must be at least 1"));
        }
        let memory_profile_interval = get_one::<f64>(matches, "memory-profile-interval");
        if let Some(interval) = memory_profile_interval {
            if !interval.is_finite() || interval <= 0.0 {
                return Err(BenchError::config(format!(
                    "--memory-profile-interval must be positive, got {interval}"
                )));
            }
        }
        Ok(GeneralConfig {
            csv_file: get_one(matches, "csv-file"),
            log_file: get_one(matches, "log-file"),
            log_level,
            repeat,
            run_dir: get_one(matches, "run-dir").unwrap_or(defaults.run_dir),
            memory_profile_interval,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::parse_group;

    #[test]
    fn test_defaults() {
        let matches = parse_group::<GeneralConfig>(false, &[]).unwrap();
        let config = GeneralConfig::from_matches(&matches).unwrap();
        assert_eq!(config, GeneralConfig::default());
    }

    #[test]
    fn test_all_options() {
        let matches = parse_group::<GeneralConfig>(
            false,
            &[
                "--csv-file",
                "out.csv",
                "--log-level",
                "BENCH",
                "--repeat",
                "3",
                "--run-dir",
                "/tmp/r",
                "--memory-profile-interval",
                "0.5",
            ],
        )
        .unwrap();
        let config = GeneralConfig::from_matches(&matches).unwrap();
        assert_eq!(config.csv_file, Some(PathBuf::from("out.csv")));
        assert_eq!(config.log_level, LogLevel::Bench);
        assert_eq!(config.repeat, 3);
        assert_eq!(config.run_dir, PathBuf::from("/tmp/r"));
        assert_eq!(config.memory_profile_interval, Some(0.5));
    }

    #[test]
    fn test_unknown_log_level_is_a_usage_error() {
        assert!(parse_group::<GeneralConfig>(false, &["--log-level", "LOUD"]).is_err());
    }

    #[test]
    fn test_zero_repeat_rejected() {
        let matches = parse_group::<GeneralConfig>(false, &["--repeat", "0"]).unwrap();
        assert!(matches!(
            GeneralConfig::from_matches(&matches),
            Err(BenchError::Config(_))
        ));
    }
}
