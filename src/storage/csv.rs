//! Append-only CSV sink for typed result records.

use std::collections::{BTreeSet, HashMap};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Writer, WriterBuilder};
use tracing::debug;

use crate::results::{Record, record_values};
use crate::{BenchError, BenchResult};

use super::ResultSink;

/// CSV sink for records of type `R`.
///
/// Opening a sink on an existing, non-empty file reuses that file's header
/// (column order included) as long as it names exactly the record's fields.
pub struct CsvSink<R: Record> {
    path: PathBuf,
    header: Vec<String>,
    /// Position of each file column within the record's declared fields.
    order: Vec<usize>,
    writer: Option<Writer<File>>,
    rows: usize,
    _record: PhantomData<fn(R)>,
}

impl<R: Record> CsvSink<R> {
    /// Open (or create) the CSV file at `path`.
    ///
    /// # Errors
    /// Returns `BenchError::SchemaMismatch` when the file's header names a
    /// different set of columns than `R::field_names()`.
    pub fn open(path: impl AsRef<Path>) -> BenchResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let fields: Vec<String> = R::field_names().iter().map(|s| s.to_string()).collect();
        let existing = read_header(&path)?;
        let needs_header = existing.is_none();
        let header = match existing {
            Some(found) => {
                let found_set: BTreeSet<String> = found.iter().cloned().collect();
                let expected_set: BTreeSet<String> = fields.iter().cloned().collect();
                if found_set != expected_set || found_set.len() != found.len() {
                    return Err(BenchError::SchemaMismatch {
                        path,
                        expected: expected_set,
                        found: found_set,
                    });
                }
                found
            }
            None => fields.clone(),
        };

        let index: HashMap<&str, usize> = fields
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        let order = header.iter().map(|name| index[name.as_str()]).collect();

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if !needs_header && !ends_with_newline(&path)? {
            file.write_all(b"\n")?;
        }
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        if needs_header {
            writer.write_record(&header)?;
            writer.flush()?;
        }
        debug!(path = %path.display(), new = needs_header, "opened csv sink");

        Ok(CsvSink {
            path,
            header,
            order,
            writer: Some(writer),
            rows: 0,
            _record: PhantomData,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Column order used when writing rows.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Rows written through this sink since it was opened.
    pub fn rows_written(&self) -> usize {
        self.rows
    }
}

/// Read the first line of `path` as a CSV header.
///
/// Returns `None` when the file is missing or empty.
fn read_header(path: &Path) -> BenchResult<Option<Vec<String>>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut first = String::new();
    BufReader::new(File::open(path)?).read_line(&mut first)?;
    if first.trim().is_empty() {
        return Ok(None);
    }
    let mut reader = ReaderBuilder::new().has_headers(false).from_reader(first.as_bytes());
    let header = reader
        .records()
        .next()
        .transpose()?
        .map(|r| r.iter().map(str::to_string).collect())
        .unwrap_or_default();
    Ok(Some(header))
}

/// Whether the last byte of the non-empty file at `path` is a newline.
fn ends_with_newline(path: &Path) -> BenchResult<bool> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

impl<R: Record> ResultSink<R> for CsvSink<R> {
    fn log(&mut self, record: &R) -> BenchResult<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(BenchError::lifecycle(format!(
                "csv sink for {} is closed",
                self.path.display()
            )));
        };
        let values = record_values(record)?;
        let row: StringRecord = self.order.iter().map(|&i| &values[i]).collect();
        writer.write_record(&row)?;
        writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    fn close(&mut self) -> BenchResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

impl<R: Record> Drop for CsvSink<R> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
