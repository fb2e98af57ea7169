//! Result sinks.
//!
//! A sink receives every record a benchmark produces. [`CsvSink`] appends to a
//! CSV file with header reconciliation; [`MemorySink`] keeps records in memory.

pub mod csv;

use std::path::{Path, PathBuf};

use crate::BenchResult;
use crate::results::Record;

pub use self::csv::CsvSink;

/// Single-writer destination for records of type `R`.
pub trait ResultSink<R: Record> {
    /// Append one record.
    fn log(&mut self, record: &R) -> BenchResult<()>;

    /// Release the underlying handle. Calling it again is a no-op.
    fn close(&mut self) -> BenchResult<()>;
}

/// In-memory sink, mostly useful in tests.
#[derive(Debug, Clone)]
pub struct MemorySink<R: Record> {
    records: Vec<R>,
}

impl<R: Record> Default for MemorySink<R> {
    fn default() -> Self {
        MemorySink { records: Vec::new() }
    }
}

impl<R: Record> MemorySink<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn into_records(self) -> Vec<R> {
        self.records
    }
}

impl<R: Record> ResultSink<R> for MemorySink<R> {
    fn log(&mut self, record: &R) -> BenchResult<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn close(&mut self) -> BenchResult<()> {
        Ok(())
    }
}

/// Path of the memory-profile sidecar for a results file.
///
/// `results.csv` becomes `results-memory.csv`; paths without a `.csv`
/// suffix get `-memory.csv` appended.
pub fn memory_csv_path(results: &Path) -> PathBuf {
    let s = results.to_string_lossy();
    match s.strip_suffix(".csv") {
        Some(stem) => PathBuf::from(format!("{stem}-memory.csv")),
        None => PathBuf::from(format!("{s}-memory.csv")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::tests::triple;

    #[test]
    fn test_memory_sink_keeps_order() {
        let mut sink = MemorySink::new();
        sink.log(&triple(1.0, 1, "a")).unwrap();
        sink.log(&triple(2.0, 2, "b")).unwrap();
        sink.close().unwrap();
        let records = sink.into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].c, "b");
    }

    #[test]
    fn test_memory_csv_path() {
        assert_eq!(
            memory_csv_path(Path::new("runs/x/results.csv")),
            PathBuf::from("runs/x/results-memory.csv")
        );
        assert_eq!(
            memory_csv_path(Path::new("out.txt")),
            PathBuf::from("out.txt-memory.csv")
        );
    }
}
