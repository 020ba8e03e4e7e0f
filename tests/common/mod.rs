//! Synthetic CEOS volumes shared by the integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// A blank record with a valid 12-byte header.
pub struct Record {
    bytes: Vec<u8>,
}

impl Record {
    pub fn new(sequence: i32, key: [u8; 4], length: usize) -> Self {
        let mut bytes = vec![b' '; length];
        bytes[0..4].copy_from_slice(&sequence.to_be_bytes());
        bytes[4..8].copy_from_slice(&key);
        bytes[8..12].copy_from_slice(&(length as i32).to_be_bytes());
        Self { bytes }
    }

    pub fn ascii(mut self, offset: usize, width: usize, value: &str) -> Self {
        assert!(value.len() <= width);
        let text = format!("{:<width$}", value, width = width);
        self.bytes[offset..offset + width].copy_from_slice(text.as_bytes());
        self
    }

    pub fn int(mut self, offset: usize, value: i32) -> Self {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

pub const COLUMNS: usize = 4;
pub const ROWS: usize = 3;

/// Longitude (micro-degrees) of the first and last pixel of every line.
pub const FIRST_LON: i32 = -75_000_000;
pub const LAST_LON: i32 = -74_000_000;

fn leader() -> Vec<u8> {
    let summary = Record::new(1, [18, 10, 18, 20], 1620)
        .ascii(20, 16, "R1_13760")
        .ascii(68, 32, "19980704010203000")
        .ascii(164, 16, "GEM6")
        .ascii(180, 16, "6378.137")
        .ascii(196, 16, "6356.7523142")
        .ascii(412, 16, "RSAT-1")
        .ascii(428, 32, "SAR")
        .ascii(460, 8, "13760")
        .ascii(468, 8, "45.0")
        .ascii(500, 16, "0.0565646")
        .ascii(516, 4, "0")
        .ascii(520, 4, "0")
        .ascii(1046, 16, "GSS")
        .ascii(1174, 16, "1.0")
        .ascii(1190, 16, "4.0")
        .ascii(1534, 8, "DESCEND");
    let projection = Record::new(2, [18, 20, 18, 20], 1100)
        .ascii(92, 16, "12.5")
        .ascii(108, 16, "12.5")
        .ascii(1016, 8, "INCREASE")
        .ascii(1024, 8, "INCREASE");
    let radiometric = Record::new(3, [18, 50, 18, 20], 200)
        .ascii(12, 16, "SIGMA")
        .ascii(28, 8, "2")
        .ascii(36, 4, "1")
        .ascii(40, 16, "3.0")
        .ascii(56, 16, "0.0")
        .ascii(72, 16, "100.0")
        .ascii(88, 16, "400.0");
    let compensation = Record::new(4, [18, 51, 18, 20], 100)
        .ascii(12, 8, "1")
        .ascii(20, 4, "1")
        .ascii(24, 16, "1.0")
        .ascii(40, 16, "-20.0");
    let processing = Record::new(5, [18, 120, 18, 20], 120)
        .ascii(12, 4, "1")
        .ascii(16, 3, "F2")
        .ascii(64, 16, "30.0")
        .ascii(80, 16, "45.0");
    // Facility-specific record the registry does not describe.
    let unknown = Record::new(6, [18, 70, 18, 20], 40);
    [
        summary.into_bytes(),
        projection.into_bytes(),
        radiometric.into_bytes(),
        unknown.into_bytes(),
        compensation.into_bytes(),
        processing.into_bytes(),
    ]
    .concat()
}

fn image_file() -> Vec<u8> {
    let mut out = Record::new(1, [63, 192, 18, 18], 720)
        .ascii(180, 8, "3")
        .ascii(248, 8, "4")
        .ascii(400, 4, "IU1")
        .into_bytes();
    for line in 1..=ROWS as i32 {
        let lat = 45_500_000 - (line - 1) * 250_000;
        let record = Record::new(line + 1, [50, 11, 18, 20], 156 + COLUMNS)
            .int(12, line)
            .int(24, COLUMNS as i32)
            .int(132, lat)
            .int(136, lat)
            .int(140, lat)
            .int(144, FIRST_LON)
            .int(148, (FIRST_LON + LAST_LON) / 2)
            .int(152, LAST_LON);
        out.extend(record.into_bytes());
    }
    out
}

/// Write a leader file and an image file into `dir`, returning their paths.
pub fn write_volume(dir: &Path) -> Vec<PathBuf> {
    let lea = dir.join("LEA_01.001");
    let dat = dir.join("DAT_01.001");
    fs::write(&lea, leader()).unwrap();
    fs::write(&dat, image_file()).unwrap();
    vec![lea, dat]
}

/// The image file cut off in the middle of its last record.
pub fn write_truncated_image(dir: &Path) -> PathBuf {
    let path = dir.join("DAT_01.001");
    let mut bytes = image_file();
    bytes.truncate(bytes.len() - 10);
    fs::write(&path, bytes).unwrap();
    path
}
