//! Static record layouts for the binary dialects.
//!
//! Offsets are 0-based from the first byte of the record (header included).
//! Each dialect's table is validated when the registry is built, so a typo in
//! an encoding code surfaces as a `FormatError::UnknownEncoding` before any
//! input is read.
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use super::FormatError;
use crate::types::Dialect;

/// Four subtype codes identifying a record layout.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct RecordKey {
    pub subtype1: u8,
    pub record_type: u8,
    pub subtype2: u8,
    pub subtype3: u8,
}

impl RecordKey {
    pub const fn new(subtype1: u8, record_type: u8, subtype2: u8, subtype3: u8) -> Self {
        Self {
            subtype1,
            record_type,
            subtype2,
            subtype3,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}",
            self.subtype1, self.record_type, self.subtype2, self.subtype3
        )
    }
}

impl FromStr for RecordKey {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u8> = s
            .split('-')
            .map(|p| p.trim().parse::<u8>())
            .collect::<Result<_, _>>()
            .map_err(|_| FormatError::InvalidKey(s.to_string()))?;
        match parts.as_slice() {
            [a, b, c, d] => Ok(RecordKey::new(*a, *b, *c, *d)),
            _ => Err(FormatError::InvalidKey(s.to_string())),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Encoding {
    /// `A`: fixed-width ASCII text, trimmed
    Text,
    /// `AI`: ASCII-digit integer
    AsciiInt,
    /// `AF`: ASCII-digit float
    AsciiFloat,
    /// `BI`: big-endian signed binary integer
    BinaryInt,
}

impl Encoding {
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(Encoding::Text),
            "AI" => Some(Encoding::AsciiInt),
            "AF" => Some(Encoding::AsciiFloat),
            "BI" => Some(Encoding::BinaryInt),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Repeat {
    Fixed(usize),
    /// Count held by another integer field of the same record
    Field(&'static str),
}

#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub key: RecordKey,
    pub name: &'static str,
    pub encoding: Encoding,
    pub length: usize,
    pub offset: usize,
    pub repeat: Option<Repeat>,
}

impl FieldSpec {
    /// End of the byte range this field can occupy, if it is statically known.
    fn static_end(&self) -> Option<usize> {
        match self.repeat {
            None => Some(self.offset + self.length),
            Some(Repeat::Fixed(n)) => Some(self.offset + self.length * n),
            Some(Repeat::Field(_)) => None,
        }
    }
}

/// How decoded records of one type are folded into `MetadataFields`.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Collect {
    /// Record occurs once per product; fields are merged into the flat map
    Merge,
    /// Record occurs once per image line; each decode is kept as a row
    Rows,
}

#[derive(Clone, Debug)]
pub struct RecordSpec {
    pub key: RecordKey,
    pub name: &'static str,
    pub collect: Collect,
    pub fields: Vec<FieldSpec>,
}

impl RecordSpec {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Number of leading record bytes the decoder needs; `usize::MAX` when a
    /// dynamically counted field makes the extent unknown until decode time.
    pub fn extent(&self) -> usize {
        self.fields
            .iter()
            .map(|f| f.static_end().unwrap_or(usize::MAX))
            .max()
            .unwrap_or(0)
    }
}

/// Record layouts for one binary dialect.
#[derive(Clone, Debug)]
pub struct SchemaRegistry {
    dialect: Dialect,
    records: HashMap<RecordKey, RecordSpec>,
}

// (record key, record name, collection mode)
type RecordRow = (&'static str, &'static str, Collect);
// (record key, field name, encoding code, byte length, byte offset, repeat)
type FieldRow = (
    &'static str,
    &'static str,
    &'static str,
    usize,
    usize,
    Option<Repeat>,
);

const CEOS_RECORDS: &[RecordRow] = &[
    ("18-10-18-20", "data_set_summary", Collect::Merge),
    ("18-20-18-20", "map_projection", Collect::Merge),
    ("18-50-18-20", "radiometric_data", Collect::Merge),
    ("18-51-18-20", "radiometric_compensation", Collect::Merge),
    ("18-120-18-20", "processing_parameters", Collect::Merge),
    ("63-192-18-18", "image_descriptor", Collect::Merge),
    ("50-11-18-20", "processed_data", Collect::Rows),
];

const CEOS_FIELDS: &[FieldRow] = &[
    // data set summary
    ("18-10-18-20", "scene_id", "A", 16, 20, None),
    ("18-10-18-20", "scene_centre_time", "A", 32, 68, None),
    ("18-10-18-20", "scene_centre_lat", "AF", 16, 100, None),
    ("18-10-18-20", "scene_centre_lon", "AF", 16, 116, None),
    ("18-10-18-20", "ellipsoid_name", "A", 16, 164, None),
    ("18-10-18-20", "semi_major_km", "AF", 16, 180, None),
    ("18-10-18-20", "semi_minor_km", "AF", 16, 196, None),
    ("18-10-18-20", "mission_id", "A", 16, 412, None),
    ("18-10-18-20", "sensor_id", "A", 32, 428, None),
    ("18-10-18-20", "orbit_number", "AI", 8, 460, None),
    ("18-10-18-20", "platform_latitude", "AF", 8, 468, None),
    ("18-10-18-20", "platform_longitude", "AF", 8, 476, None),
    ("18-10-18-20", "wavelength", "AF", 16, 500, None),
    ("18-10-18-20", "tx_polarization", "AI", 4, 516, None),
    ("18-10-18-20", "rx_polarization", "AI", 4, 520, None),
    ("18-10-18-20", "facility", "A", 16, 1046, None),
    ("18-10-18-20", "range_looks", "AF", 16, 1174, None),
    ("18-10-18-20", "azimuth_looks", "AF", 16, 1190, None),
    ("18-10-18-20", "orbit_direction", "A", 8, 1534, None),
    // map projection
    ("18-20-18-20", "pixel_spacing", "AF", 16, 92, None),
    ("18-20-18-20", "line_spacing", "AF", 16, 108, None),
    ("18-20-18-20", "pixel_time_direction", "A", 8, 1016, None),
    ("18-20-18-20", "line_time_direction", "A", 8, 1024, None),
    // radiometric data: gain look-up table
    ("18-50-18-20", "lut_designator", "A", 16, 12, None),
    ("18-50-18-20", "gain_count", "AI", 8, 28, None),
    ("18-50-18-20", "lut_first_pixel", "AI", 4, 36, None),
    ("18-50-18-20", "lut_step", "AF", 16, 40, None),
    ("18-50-18-20", "gain_offset", "AF", 16, 56, None),
    (
        "18-50-18-20",
        "gain_values",
        "AF",
        16,
        72,
        Some(Repeat::Field("gain_count")),
    ),
    // radiometric compensation: noise table in dB
    ("18-51-18-20", "noise_count", "AI", 8, 12, None),
    ("18-51-18-20", "noise_first_pixel", "AI", 4, 20, None),
    ("18-51-18-20", "noise_step", "AF", 16, 24, None),
    (
        "18-51-18-20",
        "noise_values",
        "AF",
        16,
        40,
        Some(Repeat::Field("noise_count")),
    ),
    // detailed processing parameters
    ("18-120-18-20", "beam_count", "AI", 4, 12, None),
    (
        "18-120-18-20",
        "beam_types",
        "A",
        3,
        16,
        Some(Repeat::Field("beam_count")),
    ),
    ("18-120-18-20", "incidence_near", "AF", 16, 64, None),
    ("18-120-18-20", "incidence_far", "AF", 16, 80, None),
    // image file descriptor
    ("63-192-18-18", "line_count", "AI", 8, 180, None),
    ("63-192-18-18", "pixel_count", "AI", 8, 248, None),
    ("63-192-18-18", "sample_format", "A", 4, 400, None),
    // processed data record prefix: positions in micro-degrees
    ("50-11-18-20", "image_line", "BI", 4, 12, None),
    ("50-11-18-20", "line_pixel_count", "BI", 4, 24, None),
    ("50-11-18-20", "first_lat", "BI", 4, 132, None),
    ("50-11-18-20", "mid_lat", "BI", 4, 136, None),
    ("50-11-18-20", "last_lat", "BI", 4, 140, None),
    ("50-11-18-20", "first_lon", "BI", 4, 144, None),
    ("50-11-18-20", "mid_lon", "BI", 4, 148, None),
    ("50-11-18-20", "last_lon", "BI", 4, 152, None),
];

const CDPF_RECORDS: &[RecordRow] = &[
    ("10-10-31-20", "scene_header", Collect::Merge),
    ("10-50-31-20", "calibration", Collect::Merge),
    ("10-60-31-20", "tie_points", Collect::Merge),
];

const CDPF_FIELDS: &[FieldRow] = &[
    // scene header
    ("10-10-31-20", "satellite", "A", 8, 12, None),
    ("10-10-31-20", "acq_year", "AI", 4, 20, None),
    ("10-10-31-20", "acq_day", "AF", 16, 24, None),
    ("10-10-31-20", "beam_codes", "A", 4, 40, Some(Repeat::Fixed(4))),
    ("10-10-31-20", "polarization", "A", 4, 56, None),
    ("10-10-31-20", "data_depth", "AI", 2, 60, None),
    ("10-10-31-20", "orbit_number", "AI", 8, 62, None),
    ("10-10-31-20", "pass_direction", "A", 1, 70, None),
    ("10-10-31-20", "facility", "A", 8, 71, None),
    ("10-10-31-20", "pixel_spacing", "AF", 12, 79, None),
    ("10-10-31-20", "line_spacing", "AF", 12, 91, None),
    ("10-10-31-20", "range_looks", "AI", 4, 103, None),
    ("10-10-31-20", "azimuth_looks", "AI", 4, 107, None),
    ("10-10-31-20", "wavelength", "AF", 16, 111, None),
    ("10-10-31-20", "platform_latitude", "AF", 12, 127, None),
    ("10-10-31-20", "ellipsoid_name", "A", 16, 139, None),
    ("10-10-31-20", "semi_major", "AF", 16, 155, None),
    ("10-10-31-20", "semi_minor", "AF", 16, 171, None),
    ("10-10-31-20", "pixel_order", "A", 1, 187, None),
    ("10-10-31-20", "sample_kind", "A", 1, 188, None),
    ("10-10-31-20", "pixel_count", "AI", 8, 189, None),
    ("10-10-31-20", "line_count", "AI", 8, 197, None),
    // calibration tables, shared sampling grid
    ("10-50-31-20", "gain_offset", "AF", 16, 12, None),
    ("10-50-31-20", "lut_first_pixel", "AI", 6, 28, None),
    ("10-50-31-20", "lut_step", "AF", 12, 34, None),
    ("10-50-31-20", "gain_count", "AI", 6, 46, None),
    ("10-50-31-20", "noise_count", "AI", 6, 52, None),
    ("10-50-31-20", "incidence_count", "AI", 6, 58, None),
    (
        "10-50-31-20",
        "gain_values",
        "AF",
        16,
        64,
        Some(Repeat::Field("gain_count")),
    ),
    (
        "10-50-31-20",
        "noise_values",
        "AF",
        16,
        2112,
        Some(Repeat::Field("noise_count")),
    ),
    (
        "10-50-31-20",
        "incidence_values",
        "AF",
        16,
        4160,
        Some(Repeat::Field("incidence_count")),
    ),
    // tie points
    ("10-60-31-20", "gcp_count", "AI", 6, 12, None),
    (
        "10-60-31-20",
        "gcp_pixels",
        "AF",
        12,
        30,
        Some(Repeat::Field("gcp_count")),
    ),
    (
        "10-60-31-20",
        "gcp_lines",
        "AF",
        12,
        1230,
        Some(Repeat::Field("gcp_count")),
    ),
    (
        "10-60-31-20",
        "gcp_lats",
        "BI",
        4,
        2430,
        Some(Repeat::Field("gcp_count")),
    ),
    (
        "10-60-31-20",
        "gcp_lons",
        "BI",
        4,
        2830,
        Some(Repeat::Field("gcp_count")),
    ),
    (
        "10-60-31-20",
        "gcp_heights",
        "AF",
        10,
        3230,
        Some(Repeat::Field("gcp_count")),
    ),
];

impl SchemaRegistry {
    /// Build the registry for a binary dialect. XML dialects have no record tables.
    pub fn for_dialect(dialect: Dialect) -> Result<Self, FormatError> {
        match dialect {
            Dialect::Ceos => Self::from_tables(dialect, CEOS_RECORDS, CEOS_FIELDS),
            Dialect::Cdpf => Self::from_tables(dialect, CDPF_RECORDS, CDPF_FIELDS),
            Dialect::Rs2 | Dialect::Safe => Ok(Self {
                dialect,
                records: HashMap::new(),
            }),
        }
    }

    fn from_tables(
        dialect: Dialect,
        records: &[RecordRow],
        fields: &[FieldRow],
    ) -> Result<Self, FormatError> {
        let mut map = HashMap::with_capacity(records.len());
        for &(key, name, collect) in records {
            let key: RecordKey = key.parse()?;
            map.insert(
                key,
                RecordSpec {
                    key,
                    name,
                    collect,
                    fields: Vec::new(),
                },
            );
        }
        for &(key, name, code, length, offset, repeat) in fields {
            let key: RecordKey = key.parse()?;
            let encoding = Encoding::from_code(code).ok_or_else(|| FormatError::UnknownEncoding {
                field: name.to_string(),
                code: code.to_string(),
            })?;
            let record = map
                .get_mut(&key)
                .ok_or_else(|| FormatError::InvalidKey(key.to_string()))?;
            record.fields.push(FieldSpec {
                key,
                name,
                encoding,
                length,
                offset,
                repeat,
            });
        }
        Ok(Self {
            dialect,
            records: map,
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn record(&self, key: &RecordKey) -> Option<&RecordSpec> {
        self.records.get(key)
    }

    pub fn records(&self) -> impl Iterator<Item = &RecordSpec> {
        self.records.values()
    }

    /// Look up a field by its dialect-unique name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.records.values().find_map(|r| r.field(name))
    }
}
