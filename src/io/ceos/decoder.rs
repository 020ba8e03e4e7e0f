use std::collections::BTreeMap;

use byteorder::{BigEndian, ByteOrder};

use super::FormatError;
use super::registry::{Collect, Encoding, FieldSpec, RecordSpec, Repeat};
use super::scanner::RawRecord;

/// A decoded field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// Slice was blank or lay beyond the record
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, FieldValue::Empty)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Integers widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Numeric list with empty entries dropped.
    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        self.as_list()
            .map(|items| items.iter().filter_map(FieldValue::as_f64).collect())
    }

    /// Text list with empty entries dropped.
    pub fn to_string_vec(&self) -> Option<Vec<String>> {
        self.as_list().map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
    }
}

/// Decode the value at `offset` using `spec`'s encoding and length, ignoring any repeat.
pub fn decode_field(bytes: &[u8], spec: &FieldSpec, offset: usize) -> Result<FieldValue, FormatError> {
    let start = offset.min(bytes.len());
    let end = (offset + spec.length).min(bytes.len());
    let slice = &bytes[start..end];
    if slice.is_empty() {
        return Ok(FieldValue::Empty);
    }

    match spec.encoding {
        Encoding::Text => {
            let text = String::from_utf8_lossy(slice);
            let trimmed = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
            if trimmed.is_empty() {
                Ok(FieldValue::Empty)
            } else {
                Ok(FieldValue::Text(trimmed.to_string()))
            }
        }
        Encoding::AsciiInt => {
            let text = ascii_trimmed(slice);
            if text.is_empty() {
                return Ok(FieldValue::Empty);
            }
            text.parse::<i64>()
                .map(FieldValue::Int)
                .map_err(|_| FormatError::InvalidNumber {
                    field: spec.name.to_string(),
                    text,
                    expected: "integer",
                })
        }
        Encoding::AsciiFloat => {
            let text = ascii_trimmed(slice);
            if text.is_empty() {
                return Ok(FieldValue::Empty);
            }
            text.parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|_| FormatError::InvalidNumber {
                    field: spec.name.to_string(),
                    text,
                    expected: "float",
                })
        }
        Encoding::BinaryInt => {
            if spec.length == 0 || spec.length > 8 {
                return Err(FormatError::BadBinaryWidth {
                    field: spec.name.to_string(),
                    width: spec.length,
                });
            }
            if slice.len() < spec.length {
                return Ok(FieldValue::Empty);
            }
            Ok(FieldValue::Int(BigEndian::read_int(slice, spec.length)))
        }
    }
}

fn ascii_trimmed(slice: &[u8]) -> String {
    String::from_utf8_lossy(slice)
        .trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .to_string()
}

fn repeat_count(
    record: &RawRecord,
    spec: &RecordSpec,
    field: &FieldSpec,
    repeat: Repeat,
) -> Result<usize, FormatError> {
    match repeat {
        Repeat::Fixed(n) => Ok(n),
        Repeat::Field(count_name) => {
            let bad = || FormatError::BadRepeatCount {
                field: field.name.to_string(),
                count_field: count_name.to_string(),
            };
            let count_spec = spec.field(count_name).ok_or_else(bad)?;
            if count_spec.repeat.is_some() {
                return Err(bad());
            }
            let count = match decode_field(&record.bytes, count_spec, count_spec.offset)? {
                FieldValue::Int(n) => n.max(0) as usize,
                FieldValue::Empty => 0,
                _ => return Err(bad()),
            };
            // The last item must end inside the declared record.
            let end = count
                .checked_mul(field.length)
                .and_then(|span| span.checked_add(field.offset));
            match end {
                Some(end) if end as u64 <= record.length => Ok(count),
                _ => Err(FormatError::RepeatOverrun {
                    field: field.name.to_string(),
                    count,
                    record_length: record.length,
                }),
            }
        }
    }
}

/// Decode every field of `spec` from one raw record.
pub fn decode_record(
    record: &RawRecord,
    spec: &RecordSpec,
) -> Result<BTreeMap<String, FieldValue>, FormatError> {
    let mut out = BTreeMap::new();
    for field in &spec.fields {
        let value = match field.repeat {
            None => decode_field(&record.bytes, field, field.offset)?,
            Some(repeat) => {
                let count = repeat_count(record, spec, field, repeat)?;
                let items = (0..count)
                    .map(|i| decode_field(&record.bytes, field, field.offset + i * field.length))
                    .collect::<Result<Vec<_>, _>>()?;
                FieldValue::List(items)
            }
        };
        out.insert(field.name.to_string(), value);
    }
    Ok(out)
}

/// Decoded fields aggregated across every record of interest of one product,
/// possibly spanning several files.
#[derive(Clone, Debug, Default)]
pub struct MetadataFields {
    values: BTreeMap<String, FieldValue>,
    rows: BTreeMap<String, Vec<BTreeMap<String, FieldValue>>>,
}

impl MetadataFields {
    pub fn insert_record(&mut self, spec: &RecordSpec, decoded: BTreeMap<String, FieldValue>) {
        match spec.collect {
            Collect::Merge => self.values.extend(decoded),
            Collect::Rows => self
                .rows
                .entry(spec.name.to_string())
                .or_default()
                .push(decoded),
        }
    }

    pub fn insert(&mut self, name: &str, value: FieldValue) {
        self.values.insert(name.to_string(), value);
    }

    /// Merged field by name; empty values read as absent.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name).filter(|v| !v.is_empty())
    }

    pub fn rows(&self, record_name: &str) -> &[BTreeMap<String, FieldValue>] {
        self.rows
            .get(record_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ceos::registry::RecordKey;

    const KEY: RecordKey = RecordKey::new(1, 2, 3, 4);

    fn spec(name: &'static str, encoding: Encoding, length: usize, offset: usize) -> FieldSpec {
        FieldSpec {
            key: KEY,
            name,
            encoding,
            length,
            offset,
            repeat: None,
        }
    }

    fn raw(bytes: Vec<u8>) -> RawRecord {
        RawRecord {
            offset: 0,
            key: KEY,
            sequence: 1,
            length: bytes.len() as u64,
            bytes,
        }
    }

    #[test]
    fn ascii_integer_strips_padding() {
        let bytes = b"0000000000001234    ".to_vec();
        let value = decode_field(&bytes, &spec("n", Encoding::AsciiInt, 8, 12), 12).unwrap();
        assert_eq!(value, FieldValue::Int(1234));

        let bytes = b"   -42  ".to_vec();
        let value = decode_field(&bytes, &spec("n", Encoding::AsciiInt, 8, 0), 0).unwrap();
        assert_eq!(value, FieldValue::Int(-42));
    }

    #[test]
    fn ascii_numbers_fail_loudly_on_garbage() {
        let bytes = b"12a4".to_vec();
        let err = decode_field(&bytes, &spec("n", Encoding::AsciiInt, 4, 0), 0).unwrap_err();
        assert!(matches!(err, FormatError::InvalidNumber { expected: "integer", .. }));
        let err = decode_field(&bytes, &spec("f", Encoding::AsciiFloat, 4, 0), 0).unwrap_err();
        assert!(matches!(err, FormatError::InvalidNumber { expected: "float", .. }));
    }

    #[test]
    fn ascii_float_accepts_exponent_notation() {
        let bytes = b"  1.2345670E+02 ".to_vec();
        let value = decode_field(&bytes, &spec("f", Encoding::AsciiFloat, 16, 0), 0).unwrap();
        assert_eq!(value, FieldValue::Float(123.45670));
    }

    #[test]
    fn blank_and_out_of_range_slices_are_empty() {
        let bytes = b"        ".to_vec();
        for enc in [Encoding::Text, Encoding::AsciiInt, Encoding::AsciiFloat] {
            assert_eq!(
                decode_field(&bytes, &spec("x", enc, 8, 0), 0).unwrap(),
                FieldValue::Empty
            );
        }
        assert_eq!(
            decode_field(&bytes, &spec("x", Encoding::BinaryInt, 4, 40), 40).unwrap(),
            FieldValue::Empty
        );
    }

    #[test]
    fn binary_integers_are_signed_big_endian() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(-45_123_456i32).to_be_bytes());
        bytes.extend_from_slice(&(75_500_000i32).to_be_bytes());
        let lat = decode_field(&bytes, &spec("lat", Encoding::BinaryInt, 4, 0), 0).unwrap();
        let lon = decode_field(&bytes, &spec("lon", Encoding::BinaryInt, 4, 4), 4).unwrap();
        assert_eq!(lat, FieldValue::Int(-45_123_456));
        assert_eq!(lon, FieldValue::Int(75_500_000));

        let err = decode_field(&bytes, &spec("wide", Encoding::BinaryInt, 9, 0), 0).unwrap_err();
        assert!(matches!(err, FormatError::BadBinaryWidth { width: 9, .. }));
    }

    #[test]
    fn dynamic_repeat_reads_count_from_sibling_field() {
        let mut bytes = vec![b' '; 12];
        bytes.extend_from_slice(b"   3");
        bytes.extend_from_slice(b"SCNW1 F2 ");
        let record_spec = RecordSpec {
            key: KEY,
            name: "params",
            collect: Collect::Merge,
            fields: vec![
                spec("count", Encoding::AsciiInt, 4, 12),
                FieldSpec {
                    repeat: Some(Repeat::Field("count")),
                    ..spec("codes", Encoding::Text, 3, 16)
                },
            ],
        };
        let decoded = decode_record(&raw(bytes), &record_spec).unwrap();
        assert_eq!(
            decoded["codes"].to_string_vec().unwrap(),
            vec!["SCN", "W1", "F2"]
        );
    }

    #[test]
    fn count_running_past_the_record_is_rejected() {
        let mut bytes = vec![b' '; 12];
        bytes.extend_from_slice(b"20000000");
        bytes.extend_from_slice(format!("{:>16}{:>16}", "1.5", "2.5").as_bytes());
        let record_spec = RecordSpec {
            key: KEY,
            name: "radiometric",
            collect: Collect::Merge,
            fields: vec![
                spec("gain_count", Encoding::AsciiInt, 8, 12),
                FieldSpec {
                    repeat: Some(Repeat::Field("gain_count")),
                    ..spec("gains", Encoding::AsciiFloat, 16, 20)
                },
            ],
        };
        let err = decode_record(&raw(bytes.clone()), &record_spec).unwrap_err();
        assert!(matches!(
            err,
            FormatError::RepeatOverrun {
                count: 20_000_000,
                record_length: 52,
                ..
            }
        ));

        // a count that exactly fills the record is fine
        bytes[12..20].copy_from_slice(b"       2");
        let decoded = decode_record(&raw(bytes), &record_spec).unwrap();
        assert_eq!(decoded["gains"].to_f64_vec().unwrap(), vec![1.5, 2.5]);
    }

    #[test]
    fn missing_count_field_is_reported() {
        let record_spec = RecordSpec {
            key: KEY,
            name: "params",
            collect: Collect::Merge,
            fields: vec![FieldSpec {
                repeat: Some(Repeat::Field("nope")),
                ..spec("codes", Encoding::Text, 3, 16)
            }],
        };
        let err = decode_record(&raw(vec![b' '; 40]), &record_spec).unwrap_err();
        assert!(matches!(err, FormatError::BadRepeatCount { .. }));
    }

    #[test]
    fn rows_and_merged_values_are_kept_apart() {
        let merge = RecordSpec {
            key: KEY,
            name: "summary",
            collect: Collect::Merge,
            fields: vec![],
        };
        let rows = RecordSpec {
            collect: Collect::Rows,
            name: "line",
            ..merge.clone()
        };
        let mut fields = MetadataFields::default();
        let mut one = BTreeMap::new();
        one.insert("a".to_string(), FieldValue::Int(1));
        fields.insert_record(&merge, one.clone());
        fields.insert_record(&rows, one.clone());
        fields.insert_record(&rows, one);
        fields.insert("blank", FieldValue::Empty);
        assert_eq!(fields.get("a"), Some(&FieldValue::Int(1)));
        assert!(fields.get("blank").is_none());
        assert_eq!(fields.rows("line").len(), 2);
        assert!(fields.rows("missing").is_empty());
    }
}
