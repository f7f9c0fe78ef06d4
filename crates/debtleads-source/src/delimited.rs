//! Delimited text → Arrow `RecordBatch` of `Utf8` columns.
//!
//! Every value is kept as text; typing (amounts, identifiers) is the
//! pipeline's job. Empty fields become null.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, StringArray, new_null_array};
use arrow::compute::concat;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use debtleads_core::{SourceFormat, TextEncoding};
use tracing::{debug, info, warn};

use crate::SourceError;

/// How to read one delimited file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedOptions {
    pub delimiter: u8,
    pub encoding: TextEncoding,
    /// Lines skipped before the header line.
    pub header_row: usize,
}

impl Default for DelimitedOptions {
    fn default() -> Self {
        Self {
            delimiter: b';',
            encoding: TextEncoding::Latin1,
            header_row: 0,
        }
    }
}

impl DelimitedOptions {
    pub fn from_format(format: &SourceFormat) -> Result<Self, SourceError> {
        Ok(Self {
            delimiter: format.delimiter_byte()?,
            encoding: format.encoding,
            header_row: format.header_row,
        })
    }
}

/// Read a whole file into one batch.
pub fn read_delimited(path: &Path, options: &DelimitedOptions) -> Result<RecordBatch, SourceError> {
    let bytes = std::fs::read(path).map_err(|e| SourceError::io(path, e))?;
    let batch = parse_delimited(&bytes, options)?;
    info!(
        path = %path.display(),
        rows = batch.num_rows(),
        columns = batch.num_columns(),
        "read delimited file"
    );
    Ok(batch)
}

/// Read several part files and concatenate them (see [`union_batches`]).
pub fn read_many(paths: &[PathBuf], options: &DelimitedOptions) -> Result<RecordBatch, SourceError> {
    let batches = paths
        .iter()
        .map(|p| read_delimited(p, options))
        .collect::<Result<Vec<_>, _>>()?;
    union_batches(&batches)
}

/// Parse in-memory bytes (an uploaded file, say).
pub fn parse_delimited(bytes: &[u8], options: &DelimitedOptions) -> Result<RecordBatch, SourceError> {
    let text = decode(bytes, options.encoding);
    let body = skip_lines(&text, options.header_row);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(body.as_bytes());

    let headers = unique_headers(reader.headers()?);
    if headers.is_empty() {
        return Err(SourceError::Parse {
            what: "delimited input".into(),
            reason: format!("no header found after skipping {} line(s)", options.header_row),
        });
    }

    let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    let mut skipped = 0usize;
    for (n, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!(row = n, error = %e, "skipping unreadable row");
                skipped += 1;
                continue;
            }
        };
        if record.len() > headers.len() {
            warn!(
                row = n,
                fields = record.len(),
                expected = headers.len(),
                "skipping row with too many fields"
            );
            skipped += 1;
            continue;
        }
        for (k, column) in values.iter_mut().enumerate() {
            let field = record.get(k).filter(|v| !v.is_empty());
            column.push(field.map(str::to_string));
        }
    }
    if skipped > 0 {
        debug!(skipped, "rows skipped while parsing");
    }

    let fields: Vec<Field> = headers
        .iter()
        .map(|h| Field::new(h, DataType::Utf8, true))
        .collect();
    let columns: Vec<ArrayRef> = values
        .into_iter()
        .map(|v| Arc::new(StringArray::from(v)) as ArrayRef)
        .collect();
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Concatenate batches, taking the union of their columns in first-seen
/// order. Columns a batch lacks are filled with nulls.
pub fn union_batches(batches: &[RecordBatch]) -> Result<RecordBatch, SourceError> {
    let mut names: Vec<String> = Vec::new();
    for batch in batches {
        for field in batch.schema().fields() {
            if !names.contains(field.name()) {
                names.push(field.name().clone());
            }
        }
    }

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(names.len());
    for name in &names {
        let parts: Vec<ArrayRef> = batches
            .iter()
            .map(|b| match b.column_by_name(name) {
                Some(c) if c.data_type() == &DataType::Utf8 => Ok(Arc::clone(c)),
                Some(c) => arrow::compute::cast(c, &DataType::Utf8),
                None => Ok(new_null_array(&DataType::Utf8, b.num_rows())),
            })
            .collect::<Result<_, _>>()?;
        let refs: Vec<&dyn arrow::array::Array> = parts.iter().map(|a| a.as_ref()).collect();
        columns.push(if refs.is_empty() {
            new_null_array(&DataType::Utf8, 0)
        } else {
            concat(&refs)?
        });
    }

    let fields: Vec<Field> = names
        .iter()
        .map(|n| Field::new(n, DataType::Utf8, true))
        .collect();
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

fn decode(bytes: &[u8], encoding: TextEncoding) -> Cow<'_, str> {
    match encoding {
        TextEncoding::Latin1 => encoding_rs::mem::decode_latin1(bytes),
        TextEncoding::Utf8 => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            String::from_utf8_lossy(bytes)
        }
    }
}

fn skip_lines(text: &str, n: usize) -> &str {
    let mut rest = text;
    for _ in 0..n {
        match rest.find('\n') {
            Some(i) => rest = &rest[i + 1..],
            None => return "",
        }
    }
    rest
}

/// Header names with duplicates suffixed `.1`, `.2`, ...
fn unique_headers(record: &csv::StringRecord) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    record
        .iter()
        .map(|h| {
            let count = seen.entry(h.to_string()).or_insert(0);
            let name = if *count == 0 {
                h.to_string()
            } else {
                format!("{h}.{count}")
            };
            *count += 1;
            name
        })
        .collect()
}
