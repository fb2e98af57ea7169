//! Logging setup.
//!
//! Benchmark progress goes to two dedicated targets, [`BENCH`] and [`TEST`],
//! which sit between INFO and WARNING: `--log-level BENCH` shows warnings and
//! progress lines only, `TEST` adds the more chatty per-config lines.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use crate::{BenchError, BenchResult};

/// Target for per-run benchmark progress.
pub const BENCH: &str = "psbench_bench";
/// Target for user-facing test progress.
pub const TEST: &str = "psbench_test";

/// Environment variable overriding the computed filter directive.
pub const LOG_ENV: &str = "PSBENCH_LOG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Error,
    Warning,
    Bench,
    Test,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    pub const NAMES: [&'static str; 6] = ["ERROR", "WARNING", "BENCH", "TEST", "INFO", "DEBUG"];

    /// `EnvFilter` directive for this level.
    pub fn directive(self) -> String {
        match self {
            LogLevel::Error => "error".to_string(),
            LogLevel::Warning => "warn".to_string(),
            LogLevel::Bench => format!("warn,{BENCH}=info"),
            LogLevel::Test => format!("warn,{BENCH}=info,{TEST}=info"),
            LogLevel::Info => "info".to_string(),
            LogLevel::Debug => "debug".to_string(),
        }
    }
}

impl FromStr for LogLevel {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ERROR" => Ok(LogLevel::Error),
            "WARNING" | "WARN" => Ok(LogLevel::Warning),
            "BENCH" => Ok(LogLevel::Bench),
            "TEST" => Ok(LogLevel::Test),
            "INFO" => Ok(LogLevel::Info),
            "DEBUG" => Ok(LogLevel::Debug),
            _ => Err(BenchError::config(format!(
                "unknown log level '{s}', expected one of {}",
                Self::NAMES.join(", ")
            ))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warning => "WARNING",
            LogLevel::Bench => "BENCH",
            LogLevel::Test => "TEST",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        };
        f.write_str(name)
    }
}

/// Install the global subscriber: stderr plus an optional plain-text file.
///
/// A subscriber that is already installed is left in place, so calling
/// this from several entry points in one process is harmless.
pub fn init_logging(level: LogLevel, log_file: Option<&Path>) -> BenchResult<()> {
    let directive = std::env::var(LOG_ENV).unwrap_or_else(|_| level.directive());
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| BenchError::config(format!("invalid log filter '{directive}': {e}")))?;

    let file_layer = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let file: File = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tfmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tfmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();
    Ok(())
}
