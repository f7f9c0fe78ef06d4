//! Report export via the Arrow CSV and JSON writers.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::json::writer::JsonArray;
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::SourceError;

/// Output file format for reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Csv,
    /// A JSON array of flat records.
    Json,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ReportFormat {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(SourceError::Parse {
                what: "report format".into(),
                reason: format!("unknown format {other:?} (expected `csv` or `json`)"),
            }),
        }
    }
}

/// Decimal columns rendered as plain floats, so amounts read `200000.0`
/// rather than `200000.000000` (CSV) or a quoted string (JSON).
fn plain_numbers(batch: &RecordBatch) -> Result<RecordBatch, SourceError> {
    let schema = batch.schema();
    if !schema
        .fields()
        .iter()
        .any(|f| matches!(f.data_type(), DataType::Decimal128(..)))
    {
        return Ok(batch.clone());
    }

    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        if matches!(field.data_type(), DataType::Decimal128(..)) {
            fields.push(Field::new(field.name(), DataType::Float64, field.is_nullable()));
            columns.push(cast(column, &DataType::Float64)?);
        } else {
            fields.push(field.as_ref().clone());
            columns.push(Arc::clone(column));
        }
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Write `batch` as comma-separated text with a header row.
pub fn write_csv<W: Write>(writer: W, batch: &RecordBatch) -> Result<(), SourceError> {
    let batch = plain_numbers(batch)?;
    let mut writer = arrow::csv::WriterBuilder::new()
        .with_header(true)
        .build(writer);
    writer.write(&batch)?;
    Ok(())
}

/// Write `batch` as a JSON array of flat objects. Null values are written
/// explicitly so every object carries every key.
pub fn write_json<W: Write>(writer: W, batch: &RecordBatch) -> Result<(), SourceError> {
    let batch = plain_numbers(batch)?;
    let mut writer = arrow::json::WriterBuilder::new()
        .with_explicit_nulls(true)
        .build::<_, JsonArray>(writer);
    writer.write(&batch)?;
    writer.finish()?;
    Ok(())
}

/// Writes named report tables into one output directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
    format: ReportFormat,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>, format: ReportFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `batch` to `<dir>/<name>.<ext>`, creating the directory if needed.
    pub fn write(&self, name: &str, batch: &RecordBatch) -> Result<PathBuf, SourceError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| SourceError::io(&self.dir, e))?;
        let path = self.dir.join(format!("{name}.{}", self.format.extension()));
        let file = File::create(&path).map_err(|e| SourceError::io(&path, e))?;
        let mut out = BufWriter::new(file);
        match self.format {
            ReportFormat::Csv => write_csv(&mut out, batch)?,
            ReportFormat::Json => write_json(&mut out, batch)?,
        }
        out.flush().map_err(|e| SourceError::io(&path, e))?;
        info!(path = %path.display(), rows = batch.num_rows(), "wrote report");
        Ok(path)
    }

    /// Write every `(name, batch)` pair; returns the written paths in order.
    pub fn write_all(&self, tables: &[(&str, RecordBatch)]) -> Result<Vec<PathBuf>, SourceError> {
        tables
            .iter()
            .map(|(name, batch)| self.write(name, batch))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Decimal128Array, StringArray};

    fn report() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("taxpayer_id", DataType::Utf8, false),
            Field::new("status", DataType::Utf8, true),
            Field::new("total_debt", DataType::Decimal128(38, 6), true),
        ]));
        let totals = Decimal128Array::from(vec![Some(200_000_500_000i128), None])
            .with_precision_and_scale(38, 6)
            .unwrap();
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["A/0001-1", "B/0001-2"])),
                Arc::new(StringArray::from(vec![Some("Em dia"), None])),
                Arc::new(totals),
            ],
        )
        .unwrap()
    }

    #[test]
    fn csv_has_header_and_plain_amounts() {
        let mut buf = Vec::new();
        write_csv(&mut buf, &report()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("taxpayer_id,status,total_debt"));
        assert_eq!(lines.next(), Some("A/0001-1,Em dia,200000.5"));
        assert_eq!(lines.next(), Some("B/0001-2,,"));
    }

    #[test]
    fn json_is_array_of_flat_records() {
        let mut buf = Vec::new();
        write_json(&mut buf, &report()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["taxpayer_id"], "A/0001-1");
        assert_eq!(rows[0]["total_debt"], 200000.5);
        assert!(rows[1]["status"].is_null());
        assert!(rows[1].as_object().unwrap().contains_key("total_debt"));
    }

    #[test]
    fn empty_table_is_empty_json_array() {
        let empty = RecordBatch::new_empty(report().schema());
        let mut buf = Vec::new();
        write_json(&mut buf, &empty).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value, serde_json::json!([]));
    }

    #[test]
    fn writer_names_files_by_table_and_format() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(dir.path().join("out"), ReportFormat::Json);
        let paths = writer
            .write_all(&[("matched", report()), ("unmatched", report())])
            .unwrap();
        assert_eq!(paths[0].file_name().unwrap(), "matched.json");
        assert!(paths[1].exists());
    }

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("xlsx".parse::<ReportFormat>().is_err());
    }
}
