pub mod bench;
pub mod benchmarks;
pub mod cli;
pub mod config;
pub mod core;
pub mod executor;
pub mod ipfs;
pub mod logging;
pub mod memory;
pub mod results;
pub mod storage;
pub mod store;
pub mod stream;
pub mod utils;

pub mod endpoint_qps_cmd;
pub mod stream_throughput_cmd;
pub mod task_pipelining_cmd;
pub mod task_rtt_cmd;

use std::collections::BTreeSet;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(
        "schema mismatch in {}: file has columns {found:?} but record has {expected:?}",
        path.display()
    )]
    SchemaMismatch {
        path: PathBuf,
        expected: BTreeSet<String>,
        found: BTreeSet<String>,
    },
    #[error("failed to acquire {resource}: {reason}")]
    ResourceAcquire { resource: String, reason: String },
    #[error("task failed: {0}")]
    Task(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("lifecycle error: {0}")]
    Lifecycle(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl BenchError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        BenchError::Config(msg.into())
    }

    pub(crate) fn acquire(resource: impl Into<String>, reason: impl ToString) -> Self {
        BenchError::ResourceAcquire {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn lifecycle(msg: impl Into<String>) -> Self {
        BenchError::Lifecycle(msg.into())
    }
}

pub type BenchResult<T> = Result<T, BenchError>;
