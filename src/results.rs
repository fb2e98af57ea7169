//! Result schema layer.
//!
//! Every benchmark declares one record type. A record is a flat struct whose
//! serialized field list is its CSV header; [`Record::field_names`] must list
//! the same names in declaration order.

use std::collections::BTreeMap;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::Serialize;

use crate::{BenchError, BenchResult};

/// A typed result row.
pub trait Record: Serialize + Clone + Send + 'static {
    /// Column names in declaration order.
    fn field_names() -> &'static [&'static str];
}

/// Serialize a record into its row values, in declaration order.
pub fn record_values<R: Record>(record: &R) -> BenchResult<StringRecord> {
    let mut writer = WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    writer.serialize(record)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| BenchError::Message(format!("failed to flush record buffer: {e}")))?;

    let mut reader = ReaderBuilder::new().has_headers(false).from_reader(bytes.as_slice());
    let row = reader
        .records()
        .next()
        .transpose()?
        .ok_or_else(|| BenchError::Message("record serialized to an empty row".into()))?;

    if row.len() != R::field_names().len() {
        return Err(BenchError::Message(format!(
            "record serialized {} values but declares {} fields",
            row.len(),
            R::field_names().len()
        )));
    }
    Ok(row)
}

/// Field name to serialized value mapping for a record.
pub fn record_to_map<R: Record>(record: &R) -> BenchResult<BTreeMap<String, String>> {
    let values = record_values(record)?;
    Ok(R::field_names()
        .iter()
        .zip(values.iter())
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect())
}

/// Header names produced by the csv serializer for `record`.
///
/// Used to check that `field_names` matches the struct.
pub fn serialized_header<R: Record>(record: &R) -> BenchResult<Vec<String>> {
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(Vec::new());
    writer.serialize(record)?;
    let bytes = writer
        .into_inner()
        .map_err(|e| BenchError::Message(format!("failed to flush record buffer: {e}")))?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(bytes.as_slice());
    Ok(reader.headers()?.iter().map(str::to_string).collect())
}
