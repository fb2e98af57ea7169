use psbench::BenchError;
use psbench::results::Record;
use psbench::storage::{CsvSink, ResultSink};
use serde::Serialize;
use tempfile::tempdir;

#[derive(Debug, Clone, Serialize)]
struct Sample {
    a: f64,
    b: u32,
    c: String,
}

impl Record for Sample {
    fn field_names() -> &'static [&'static str] {
        &["a", "b", "c"]
    }
}

fn sample(a: f64, b: u32, c: &str) -> Sample {
    Sample { a, b, c: c.to_string() }
}

#[derive(Debug, Clone, Serialize)]
struct Other {
    x: u32,
}

impl Record for Other {
    fn field_names() -> &'static [&'static str] {
        &["x"]
    }
}

fn lines(path: &std::path::Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn csv_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.csv");
    let mut sink = CsvSink::<Sample>::open(&path).unwrap();
    sink.log(&sample(1.0, 2, "3")).unwrap();
    sink.log(&sample(4.0, 5, "6")).unwrap();
    sink.close().unwrap();

    assert_eq!(lines(&path), vec!["a,b,c", "1.0,2,3", "4.0,5,6"]);
}

#[test]
fn csv_append_across_sinks() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("results.csv");
    {
        let mut sink = CsvSink::<Sample>::open(&path).unwrap();
        sink.log(&sample(1.0, 1, "one")).unwrap();
        sink.close().unwrap();
    }
    let mut sink = CsvSink::<Sample>::open(&path).unwrap();
    sink.log(&sample(2.0, 2, "two")).unwrap();
    sink.log(&sample(3.0, 3, "three")).unwrap();
    sink.close().unwrap();
    assert_eq!(sink.rows_written(), 2);

    let lines = lines(&path);
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "a,b,c");
    assert_eq!(lines[3], "3.0,3,three");
}

#[test]
fn csv_reuses_existing_column_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.csv");
    std::fs::write(&path, "c,a,b\nz,0.5,9\n").unwrap();

    let mut sink = CsvSink::<Sample>::open(&path).unwrap();
    assert_eq!(sink.header(), ["c", "a", "b"]);
    sink.log(&sample(1.5, 7, "q")).unwrap();
    sink.close().unwrap();

    assert_eq!(lines(&path), vec!["c,a,b", "z,0.5,9", "q,1.5,7"]);
}

#[test]
fn csv_appends_after_unterminated_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.csv");
    std::fs::write(&path, "a,b,c").unwrap();

    let mut sink = CsvSink::<Sample>::open(&path).unwrap();
    sink.log(&sample(1.0, 2, "3")).unwrap();
    sink.close().unwrap();

    assert_eq!(lines(&path), vec!["a,b,c", "1.0,2,3"]);
}

#[test]
fn csv_rejects_foreign_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("results.csv");
    {
        let mut sink = CsvSink::<Other>::open(&path).unwrap();
        sink.log(&Other { x: 1 }).unwrap();
    }
    let err = CsvSink::<Sample>::open(&path).err().unwrap();
    assert!(matches!(err, BenchError::SchemaMismatch { .. }));
    // The existing file is untouched.
    assert_eq!(lines(&path), vec!["x", "1"]);
}

#[test]
fn csv_log_after_close_fails() {
    let dir = tempdir().unwrap();
    let mut sink = CsvSink::<Sample>::open(dir.path().join("r.csv")).unwrap();
    sink.close().unwrap();
    assert!(sink.log(&sample(0.0, 0, "")).is_err());
}
