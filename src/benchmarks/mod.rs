//! Benchmark implementations. Each module provides a matrix (the CLI
//! parameter grid), a result record and the benchmark itself.

pub mod endpoint_qps;
pub mod stream_throughput;
pub mod task_pipelining;
pub mod task_rtt;
