use gdal::raster::{Buffer, ColorInterpretation, GdalType, ResampleAlg};
use gdal::{Dataset, DriverManager, Metadata};
use ndarray::Array2;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::geocoding::{TARGET_SRS, geotransform};
use crate::io::gdal::projection_wkt;
use crate::io::raster::{
    Georeference, RasterError, RasterSink, RasterSize, RasterSource, SampleChunk,
};
use crate::types::{DataType, SampleType};

/// GeoTIFF output written chunk by chunk. Calibrated products are stored as
/// Float32, stretched products as UInt8/UInt16. Written rows can be read
/// back, so a Float32 file also serves as the intermediate between
/// calibration and stretching.
pub struct GeoTiffWriter {
    path: PathBuf,
    dataset: Dataset,
    size: RasterSize,
    data_type: DataType,
}

impl GeoTiffWriter {
    pub fn create(
        output: &Path,
        columns: usize,
        rows: usize,
        bands: usize,
        data_type: DataType,
    ) -> Result<Self, RasterError> {
        let driver = DriverManager::get_driver_by_name("GTiff")?;
        let dataset = match data_type {
            DataType::UInt8 => driver.create_with_band_type::<u8, _>(output, columns, rows, bands)?,
            DataType::UInt16 => {
                driver.create_with_band_type::<u16, _>(output, columns, rows, bands)?
            }
            DataType::Float32 => {
                driver.create_with_band_type::<f32, _>(output, columns, rows, bands)?
            }
            other => {
                return Err(RasterError::Unsupported(format!(
                    "GeoTIFF output of {:?}",
                    other
                )));
            }
        };
        for i in 1..=bands {
            dataset
                .rasterband(i)?
                .set_color_interpretation(ColorInterpretation::GrayIndex)?;
        }
        info!(
            "Created {:?}: {}x{} pixels, {} band(s), {:?}",
            output, columns, rows, bands, data_type
        );
        Ok(Self {
            path: output.to_path_buf(),
            dataset,
            size: RasterSize {
                columns,
                rows,
                bands,
            },
            data_type,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_typed<T: GdalType + Copy>(
        &mut self,
        band: usize,
        first_row: usize,
        data: &Array2<f64>,
        convert: impl Fn(f64) -> T,
    ) -> Result<(), RasterError> {
        let (rows, cols) = data.dim();
        let values: Vec<T> = data.iter().map(|&v| convert(v)).collect();
        let mut buf = Buffer::new((cols, rows), values);
        let mut raster_band = self.dataset.rasterband(band + 1)?;
        raster_band.write((0, first_row as isize), (cols, rows), &mut buf)?;
        Ok(())
    }
}

impl RasterSink for GeoTiffWriter {
    fn write_chunk(
        &mut self,
        band: usize,
        first_row: usize,
        data: &Array2<f64>,
    ) -> Result<(), RasterError> {
        let (rows, cols) = data.dim();
        if cols != self.size.columns {
            return Err(RasterError::ShapeMismatch {
                expected: (rows, self.size.columns),
                found: (rows, cols),
            });
        }
        debug!("Writing band {} rows {}..{}", band, first_row, first_row + rows);
        match self.data_type {
            DataType::UInt8 => self.write_typed(band, first_row, data, |v| v as u8),
            DataType::UInt16 => self.write_typed(band, first_row, data, |v| v as u16),
            _ => self.write_typed(band, first_row, data, |v| v as f32),
        }
    }

    fn set_georeference(&mut self, georef: &Georeference) -> Result<(), RasterError> {
        let (gt, projection) = match georef {
            Georeference::Corners { corners, dialect } => {
                (geotransform(corners, *dialect), projection_wkt(TARGET_SRS)?)
            }
            Georeference::Transform {
                geotransform,
                projection,
            } => (*geotransform, projection.clone()),
        };
        self.dataset.set_geo_transform(&gt)?;
        if !projection.is_empty() {
            self.dataset.set_projection(&projection)?;
        }
        Ok(())
    }

    /// Items are stored in the default domain under upper-case keys.
    fn set_metadata(&mut self, items: &[(&'static str, String)]) -> Result<(), RasterError> {
        for (key, value) in items {
            if !value.is_empty() {
                self.dataset
                    .set_metadata_item(&key.to_ascii_uppercase(), value, "")?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), RasterError> {
        self.dataset.flush_cache()?;
        Ok(())
    }
}

impl RasterSource for GeoTiffWriter {
    fn size(&self) -> RasterSize {
        self.size
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn sample_type(&self) -> SampleType {
        SampleType::Real
    }

    fn read_chunk(
        &mut self,
        band: usize,
        first_row: usize,
        rows: usize,
    ) -> Result<SampleChunk, RasterError> {
        if band >= self.size.bands {
            return Err(RasterError::BandOutOfRange {
                band,
                count: self.size.bands,
            });
        }
        if first_row + rows > self.size.rows {
            return Err(RasterError::RowsOutOfRange {
                first_row,
                rows,
                total: self.size.rows,
            });
        }
        let columns = self.size.columns;
        let buf = self.dataset.rasterband(band + 1)?.read_as::<f64>(
            (0, first_row as isize),
            (columns, rows),
            (columns, rows),
            Some(ResampleAlg::NearestNeighbour),
        )?;
        let data = buf.data().to_vec();
        if data.is_empty() {
            return Err(RasterError::EmptyRead { band, first_row });
        }
        let found = data.len();
        Array2::from_shape_vec((rows, columns), data)
            .map(SampleChunk::Real)
            .map_err(|_| RasterError::ShapeMismatch {
                expected: (rows, columns),
                found: (found / columns.max(1), columns),
            })
    }
}
