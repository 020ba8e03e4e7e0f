//! Synthetic binary products for tests.
use crate::io::ceos::RecordHeader;

/// One record of blanks with a valid header; fields are written in place.
pub(crate) struct RecordBuilder {
    bytes: Vec<u8>,
}

impl RecordBuilder {
    pub fn new(sequence: i32, key: [u8; 4], length: usize) -> Self {
        assert!(length >= RecordHeader::LEN);
        let mut bytes = vec![b' '; length];
        bytes[0..4].copy_from_slice(&sequence.to_be_bytes());
        bytes[4..8].copy_from_slice(&key);
        bytes[8..12].copy_from_slice(&(length as i32).to_be_bytes());
        Self { bytes }
    }

    /// Right-aligned ASCII value in a `width`-byte slot.
    pub fn ascii(mut self, offset: usize, width: usize, value: &str) -> Self {
        assert!(value.len() <= width, "{value:?} does not fit in {width} bytes");
        let text = format!("{:>width$}", value, width = width);
        self.bytes[offset..offset + width].copy_from_slice(text.as_bytes());
        self
    }

    /// Consecutive ASCII values, one per `width`-byte slot.
    pub fn ascii_list(mut self, offset: usize, width: usize, values: &[String]) -> Self {
        for (i, v) in values.iter().enumerate() {
            self = self.ascii(offset + i * width, width, v);
        }
        self
    }

    /// Consecutive big-endian 32-bit integers.
    pub fn binary_list(mut self, offset: usize, values: &[i32]) -> Self {
        for (i, v) in values.iter().enumerate() {
            let at = offset + i * 4;
            self.bytes[at..at + 4].copy_from_slice(&v.to_be_bytes());
        }
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

fn texts<T: ToString>(values: &[T]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

/// A 4 x 3 RADARSAT-1 standard-beam CDPF product acquired on 1998-07-04
/// at 01:02:03, with four GCPs at the pixel-centre extrema.
#[derive(Clone, Debug)]
pub(crate) struct CdpfFixture {
    pub beam_codes: Vec<&'static str>,
    pub pixel_order: &'static str,
    pub data_depth: u8,
    pub gains: Vec<f64>,
    pub noise_db: Vec<f64>,
    pub incidence: Vec<f64>,
}

impl Default for CdpfFixture {
    fn default() -> Self {
        Self {
            beam_codes: vec!["S3"],
            pixel_order: "I",
            data_depth: 2,
            gains: vec![2.0, 2.0, 4.0, 4.0],
            noise_db: vec![-20.0, -20.0, -30.0, -30.0],
            incidence: vec![20.0, 25.0, 30.0, 35.0],
        }
    }
}

impl CdpfFixture {
    pub const COLUMNS: usize = 4;
    pub const ROWS: usize = 3;

    pub fn bytes(&self) -> Vec<u8> {
        let beams: Vec<String> = self.beam_codes.iter().map(|s| s.to_string()).collect();
        let header = RecordBuilder::new(1, [10, 10, 31, 20], 220)
            .ascii(12, 8, "RSAT-1")
            .ascii(20, 4, "1998")
            .ascii(24, 16, "185.043090277778")
            .ascii_list(40, 4, &beams)
            .ascii(56, 4, "HH")
            .ascii(60, 2, &self.data_depth.to_string())
            .ascii(62, 8, "13760")
            .ascii(70, 1, "A")
            .ascii(71, 8, "GSS")
            .ascii(79, 12, "12.5")
            .ascii(91, 12, "12.5")
            .ascii(103, 4, "1")
            .ascii(107, 4, "4")
            .ascii(111, 16, "0.0565646")
            .ascii(127, 12, "45.0")
            .ascii(139, 16, "WGS84")
            .ascii(155, 16, "6378137.0")
            .ascii(171, 16, "6356752.3142")
            .ascii(187, 1, self.pixel_order)
            .ascii(188, 1, "R")
            .ascii(189, 8, &Self::COLUMNS.to_string())
            .ascii(197, 8, &Self::ROWS.to_string())
            .finish();

        let calibration = RecordBuilder::new(2, [10, 50, 31, 20], 4300)
            .ascii(12, 16, "0.0")
            .ascii(28, 6, "0")
            .ascii(34, 12, "1.0")
            .ascii(46, 6, &self.gains.len().to_string())
            .ascii(52, 6, &self.noise_db.len().to_string())
            .ascii(58, 6, &self.incidence.len().to_string())
            .ascii_list(64, 16, &texts(&self.gains))
            .ascii_list(2112, 16, &texts(&self.noise_db))
            .ascii_list(4160, 16, &texts(&self.incidence))
            .finish();

        let pixels = [0.5, 3.5, 0.5, 3.5];
        let lines = [0.5, 0.5, 2.5, 2.5];
        let tie_points = RecordBuilder::new(3, [10, 60, 31, 20], 3300)
            .ascii(12, 6, "4")
            .ascii_list(30, 12, &texts(&pixels))
            .ascii_list(1230, 12, &texts(&lines))
            .binary_list(2430, &[45_500_000, 45_500_000, 45_000_000, 45_000_000])
            .binary_list(2830, &[-75_000_000, -74_000_000, -75_000_000, -74_000_000])
            .ascii_list(3230, 10, &texts(&[0.0, 0.0, 0.0, 0.0]))
            .finish();

        // A record nobody asked for sits between the ones of interest.
        let filler = RecordBuilder::new(4, [10, 99, 31, 20], 64).finish();

        [header, filler, calibration, tie_points].concat()
    }
}
