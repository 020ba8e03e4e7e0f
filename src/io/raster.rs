//! Raster collaborator interface used by the calibration and stretch engines,
//! plus an in-memory implementation.
//!
//! Band indices are 0-based. Chunks are whole rows: `read_chunk(band, first_row, rows)`
//! returns a `rows x columns` array.
use ndarray::{Array2, s};
use num_complex::Complex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metadata::CornerPolygon;
use crate::types::{DataType, Dialect, SampleType};

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("Band {band} out of range (raster has {count} bands)")]
    BandOutOfRange { band: usize, count: usize },
    #[error("Rows {first_row}..{end} out of range (raster has {total} rows)", end = .first_row + .rows)]
    RowsOutOfRange {
        first_row: usize,
        rows: usize,
        total: usize,
    },
    #[error("Chunk shape {found:?} does not match expected {expected:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },
    #[error("Read of band {band} at row {first_row} returned no data")]
    EmptyRead { band: usize, first_row: usize },
    #[error("Unsupported raster operation: {0}")]
    Unsupported(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RasterSize {
    pub columns: usize,
    pub rows: usize,
    pub bands: usize,
}

/// One chunk of source samples.
#[derive(Clone, Debug, PartialEq)]
pub enum SampleChunk {
    Real(Array2<f64>),
    Complex(Array2<Complex<f64>>),
}

impl SampleChunk {
    pub fn dim(&self) -> (usize, usize) {
        match self {
            SampleChunk::Real(a) => a.dim(),
            SampleChunk::Complex(a) => a.dim(),
        }
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            SampleChunk::Real(_) => SampleType::Real,
            SampleChunk::Complex(_) => SampleType::Complex,
        }
    }

    pub fn is_empty(&self) -> bool {
        let (r, c) = self.dim();
        r == 0 || c == 0
    }
}

/// Summary of one band, computed in a single streaming pass.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct BandStatistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    pub data_type: DataType,
    pub nodata: Option<f64>,
}

impl BandStatistics {
    pub fn dynamic_range(&self) -> f64 {
        self.max - self.min
    }
}

/// Welford accumulator for min/max/mean/std, skipping NaN and `nodata`.
#[derive(Clone, Debug)]
pub struct StatsAccumulator {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
    nodata: Option<f64>,
}

impl StatsAccumulator {
    pub fn new(nodata: Option<f64>) -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            nodata,
        }
    }

    pub fn push(&mut self, v: f64) {
        if v.is_nan() || self.nodata == Some(v) {
            return;
        }
        self.count += 1;
        let delta = v - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (v - self.mean);
        self.min = self.min.min(v);
        self.max = self.max.max(v);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// `None` when no valid sample was seen.
    pub fn finish(&self, data_type: DataType) -> Option<BandStatistics> {
        (self.count > 0).then(|| BandStatistics {
            min: self.min,
            max: self.max,
            mean: self.mean,
            std: (self.m2 / self.count as f64).sqrt(),
            data_type,
            nodata: self.nodata,
        })
    }
}

/// How an output raster is placed on the ground.
#[derive(Clone, PartialEq, Debug)]
pub enum Georeference {
    /// Validated corner GCPs, positioned with the dialect's half-pixel offset.
    Corners {
        corners: CornerPolygon,
        dialect: Dialect,
    },
    Transform {
        geotransform: [f64; 6],
        projection: String,
    },
}

pub trait RasterSource {
    fn size(&self) -> RasterSize;

    fn data_type(&self) -> DataType;

    fn sample_type(&self) -> SampleType;

    fn nodata(&self, _band: usize) -> Option<f64> {
        None
    }

    fn read_chunk(
        &mut self,
        band: usize,
        first_row: usize,
        rows: usize,
    ) -> Result<SampleChunk, RasterError>;

    /// Declared reference system of the raster's own GCPs, if any.
    fn gcp_projection(&self) -> Option<String> {
        None
    }

    /// Streaming statistics over real-valued samples, `chunk_rows` rows at a time.
    fn band_statistics(
        &mut self,
        band: usize,
        chunk_rows: usize,
    ) -> Result<BandStatistics, RasterError> {
        let size = self.size();
        let mut acc = StatsAccumulator::new(self.nodata(band));
        let step = chunk_rows.max(1);
        let mut row = 0;
        while row < size.rows {
            let n = step.min(size.rows - row);
            match self.read_chunk(band, row, n)? {
                SampleChunk::Real(a) => a.iter().for_each(|v| acc.push(*v)),
                SampleChunk::Complex(_) => {
                    return Err(RasterError::Unsupported(
                        "statistics of complex samples".to_string(),
                    ));
                }
            }
            row += n;
        }
        let data_type = self.data_type();
        Ok(acc.finish(data_type).unwrap_or(BandStatistics {
            min: 0.0,
            max: 0.0,
            mean: 0.0,
            std: 0.0,
            data_type,
            nodata: self.nodata(band),
        }))
    }
}

pub trait RasterSink {
    fn write_chunk(
        &mut self,
        band: usize,
        first_row: usize,
        data: &Array2<f64>,
    ) -> Result<(), RasterError>;

    fn set_georeference(&mut self, georef: &Georeference) -> Result<(), RasterError>;

    fn set_metadata(&mut self, _items: &[(&'static str, String)]) -> Result<(), RasterError> {
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RasterError> {
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
enum BandData {
    Real(Array2<f64>),
    Complex(Array2<Complex<f64>>),
}

/// Raster held entirely in memory. Serves as a source, a sink, and the
/// intermediate between calibration and stretching.
#[derive(Clone, Debug)]
pub struct MemoryRaster {
    columns: usize,
    rows: usize,
    bands: Vec<BandData>,
    data_type: DataType,
    nodata: Option<f64>,
    georeference: Option<Georeference>,
    metadata: Vec<(String, String)>,
}

impl MemoryRaster {
    /// `count` zero-filled real bands.
    pub fn zeros(columns: usize, rows: usize, count: usize, data_type: DataType) -> Self {
        Self {
            columns,
            rows,
            bands: (0..count)
                .map(|_| BandData::Real(Array2::zeros((rows, columns))))
                .collect(),
            data_type,
            nodata: None,
            georeference: None,
            metadata: Vec::new(),
        }
    }

    pub fn from_real(bands: Vec<Array2<f64>>, data_type: DataType) -> Result<Self, RasterError> {
        let (rows, columns) = bands.first().map(|b| b.dim()).unwrap_or((0, 0));
        if let Some(bad) = bands.iter().find(|b| b.dim() != (rows, columns)) {
            return Err(RasterError::ShapeMismatch {
                expected: (rows, columns),
                found: bad.dim(),
            });
        }
        Ok(Self {
            columns,
            rows,
            bands: bands.into_iter().map(BandData::Real).collect(),
            data_type,
            nodata: None,
            georeference: None,
            metadata: Vec::new(),
        })
    }

    pub fn from_complex(
        bands: Vec<Array2<Complex<f64>>>,
        data_type: DataType,
    ) -> Result<Self, RasterError> {
        let (rows, columns) = bands.first().map(|b| b.dim()).unwrap_or((0, 0));
        if let Some(bad) = bands.iter().find(|b| b.dim() != (rows, columns)) {
            return Err(RasterError::ShapeMismatch {
                expected: (rows, columns),
                found: bad.dim(),
            });
        }
        Ok(Self {
            columns,
            rows,
            bands: bands.into_iter().map(BandData::Complex).collect(),
            data_type,
            nodata: None,
            georeference: None,
            metadata: Vec::new(),
        })
    }

    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    /// Real band contents, `None` for complex or missing bands.
    pub fn band(&self, band: usize) -> Option<&Array2<f64>> {
        match self.bands.get(band)? {
            BandData::Real(a) => Some(a),
            BandData::Complex(_) => None,
        }
    }

    pub fn georeference(&self) -> Option<&Georeference> {
        self.georeference.as_ref()
    }

    pub fn metadata(&self) -> &[(String, String)] {
        &self.metadata
    }

    fn check(&self, band: usize, first_row: usize, rows: usize) -> Result<(), RasterError> {
        if band >= self.bands.len() {
            return Err(RasterError::BandOutOfRange {
                band,
                count: self.bands.len(),
            });
        }
        if first_row + rows > self.rows {
            return Err(RasterError::RowsOutOfRange {
                first_row,
                rows,
                total: self.rows,
            });
        }
        Ok(())
    }
}

impl RasterSource for MemoryRaster {
    fn size(&self) -> RasterSize {
        RasterSize {
            columns: self.columns,
            rows: self.rows,
            bands: self.bands.len(),
        }
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn sample_type(&self) -> SampleType {
        match self.bands.first() {
            Some(BandData::Complex(_)) => SampleType::Complex,
            _ => SampleType::Real,
        }
    }

    fn nodata(&self, _band: usize) -> Option<f64> {
        self.nodata
    }

    fn read_chunk(
        &mut self,
        band: usize,
        first_row: usize,
        rows: usize,
    ) -> Result<SampleChunk, RasterError> {
        self.check(band, first_row, rows)?;
        let range = s![first_row..first_row + rows, ..];
        Ok(match &self.bands[band] {
            BandData::Real(a) => SampleChunk::Real(a.slice(range).to_owned()),
            BandData::Complex(a) => SampleChunk::Complex(a.slice(range).to_owned()),
        })
    }
}

impl RasterSink for MemoryRaster {
    fn write_chunk(
        &mut self,
        band: usize,
        first_row: usize,
        data: &Array2<f64>,
    ) -> Result<(), RasterError> {
        let (rows, cols) = data.dim();
        self.check(band, first_row, rows)?;
        if cols != self.columns {
            return Err(RasterError::ShapeMismatch {
                expected: (rows, self.columns),
                found: (rows, cols),
            });
        }
        match &mut self.bands[band] {
            BandData::Real(a) => {
                a.slice_mut(s![first_row..first_row + rows, ..]).assign(data);
                Ok(())
            }
            BandData::Complex(_) => Err(RasterError::Unsupported(
                "writing real samples into a complex band".to_string(),
            )),
        }
    }

    fn set_georeference(&mut self, georef: &Georeference) -> Result<(), RasterError> {
        self.georeference = Some(georef.clone());
        Ok(())
    }

    fn set_metadata(&mut self, items: &[(&'static str, String)]) -> Result<(), RasterError> {
        self.metadata
            .extend(items.iter().map(|(k, v)| (k.to_string(), v.clone())));
        Ok(())
    }
}

/// Row count of every chunk of a `rows`-row band split into `chunk_rows`-row
/// chunks; the last one is truncated.
pub fn chunk_ranges(rows: usize, chunk_rows: usize) -> impl Iterator<Item = (usize, usize)> {
    let step = chunk_rows.max(1);
    (0..rows)
        .step_by(step)
        .map(move |first| (first, step.min(rows - first)))
}
