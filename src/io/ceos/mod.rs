//! Table-driven reader for CEOS-style fixed-header binary records.
//!
//! A file is a sequence of variable-length records. Each record starts with a
//! 12-byte big-endian header carrying a sequence number, four subtype codes and
//! the record length. The `registry` maps the subtype codes of interesting
//! records to field layouts, the `scanner` walks the record sequence, and the
//! `decoder` turns field byte ranges into typed values.
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

pub mod decoder;
pub mod registry;
pub mod scanner;

pub use decoder::{FieldValue, MetadataFields, decode_field, decode_record};
pub use registry::{Collect, Encoding, FieldSpec, RecordKey, RecordSpec, Repeat, SchemaRegistry};
pub use scanner::{RawRecord, RecordHeader, RecordScanner};

/// Malformed or unrecognised binary content, or a schema bug. Always fatal.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Truncated record header at offset {offset}: only {available} bytes left")]
    TruncatedHeader { offset: u64, available: u64 },
    #[error("Record {key} at offset {offset} declares length {length}, shorter than its header")]
    RecordTooShort {
        key: RecordKey,
        offset: u64,
        length: i64,
    },
    #[error(
        "Record {key} at offset {offset} declares length {length} but only {remaining} bytes remain"
    )]
    RecordOverrun {
        key: RecordKey,
        offset: u64,
        length: u64,
        remaining: u64,
    },
    #[error("Unknown encoding code `{code}` for field `{field}`")]
    UnknownEncoding { field: String, code: String },
    #[error("Invalid record key `{0}`")]
    InvalidKey(String),
    #[error("Field `{field}`: cannot parse {text:?} as {expected}")]
    InvalidNumber {
        field: String,
        text: String,
        expected: &'static str,
    },
    #[error("Field `{field}` repeats by `{count_field}`, which is not an integer field of the same record")]
    BadRepeatCount { field: String, count_field: String },
    #[error("Field `{field}` repeats {count} times, which runs past the {record_length}-byte record")]
    RepeatOverrun {
        field: String,
        count: usize,
        record_length: u64,
    },
    #[error("Binary field `{field}` has unsupported width {width}")]
    BadBinaryWidth { field: String, width: usize },
}

/// Scan every file in order and decode all records the registry knows about
/// into one field map. Later files overwrite merged fields of earlier ones.
pub fn read_fields<P: AsRef<Path>>(
    paths: &[P],
    registry: &SchemaRegistry,
) -> Result<MetadataFields, FormatError> {
    let mut fields = MetadataFields::default();
    for path in paths {
        let path = path.as_ref();
        info!("Scanning {} records in {:?}", registry.dialect(), path);
        let reader = BufReader::new(File::open(path)?);
        read_fields_from(reader, registry, &mut fields)?;
    }
    Ok(fields)
}

/// Decode the records of one stream into `fields`.
pub fn read_fields_from<R: std::io::Read + std::io::Seek>(
    reader: R,
    registry: &SchemaRegistry,
    fields: &mut MetadataFields,
) -> Result<(), FormatError> {
    let mut decoded = 0usize;
    let scanner = RecordScanner::new(reader, |key: &RecordKey| {
        registry.record(key).map(|spec| spec.extent())
    })?;
    for raw in scanner {
        let raw = raw?;
        if let Some(spec) = registry.record(&raw.key) {
            let values = decode_record(&raw, spec)?;
            fields.insert_record(spec, values);
            decoded += 1;
        }
    }
    debug!("Decoded {} records of interest", decoded);
    Ok(())
}
