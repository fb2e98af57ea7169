//! Host information and timing statistics shared by all benchmarks.

pub mod env;
pub mod stats;

pub use env::EnvironmentInfo;
pub use stats::TimingStat;
