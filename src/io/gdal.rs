//! GDAL-backed raster source and geometry service.
use gdal::{Dataset, Metadata};
use gdal::raster::{GdalDataType, ResampleAlg};
use gdal::spatial_ref::{AxisMappingStrategy, CoordTransform, SpatialRef};
use ndarray::{Array2, Zip};
use num_complex::Complex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::geocoding::{GeocodingError, GeometryService};
use crate::io::raster::{RasterError, RasterSize, RasterSource, SampleChunk};
use crate::types::{DataType, SampleType};

fn data_type_of(t: GdalDataType) -> DataType {
    match t {
        GdalDataType::UInt8 => DataType::UInt8,
        GdalDataType::UInt16 => DataType::UInt16,
        GdalDataType::Int16 => DataType::Int16,
        GdalDataType::Int32 => DataType::Int32,
        GdalDataType::Float32 => DataType::Float32,
        _ => DataType::Float64,
    }
}

/// Read-only raster opened through GDAL. Complex bands are read as two real
/// rasters through GDAL's REAL/IMAG derived subdatasets.
pub struct GdalRaster {
    dataset: Dataset,
    imaginary: Option<Dataset>,
    size: RasterSize,
    data_type: DataType,
    sample_type: SampleType,
    nodata: Vec<Option<f64>>,
}

impl GdalRaster {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RasterError> {
        let path = path.as_ref();
        let probe = Dataset::open(path)?;
        let (columns, rows) = probe.raster_size();
        let bands = probe.raster_count() as usize;
        if bands == 0 {
            return Err(RasterError::Unsupported(format!(
                "{} has no raster bands",
                path.display()
            )));
        }
        // GDAL only lists derived subdatasets for complex rasters.
        let sample_type = match probe.metadata_domain("DERIVED_SUBDATASETS") {
            Some(entries) if !entries.is_empty() => SampleType::Complex,
            _ => SampleType::Real,
        };
        let nodata = (1..=bands)
            .map(|i| probe.rasterband(i).map(|b| b.no_data_value()))
            .collect::<Result<Vec<_>, _>>()?;

        let (dataset, imaginary) = match sample_type {
            SampleType::Real => (probe, None),
            SampleType::Complex => {
                let derived = |part: &str| -> PathBuf {
                    PathBuf::from(format!("DERIVED_SUBDATASET:{}:{}", part, path.display()))
                };
                (
                    Dataset::open(derived("REAL"))?,
                    Some(Dataset::open(derived("IMAG"))?),
                )
            }
        };
        let data_type = data_type_of(dataset.rasterband(1)?.band_type());
        info!(
            "Opened {:?}: {}x{} pixels, {} band(s), {:?} {}",
            path, columns, rows, bands, data_type, sample_type
        );
        Ok(Self {
            dataset,
            imaginary,
            size: RasterSize {
                columns,
                rows,
                bands,
            },
            data_type,
            sample_type,
            nodata,
        })
    }

    fn read_rows(
        ds: &Dataset,
        band: usize,
        first_row: usize,
        rows: usize,
        columns: usize,
    ) -> Result<Array2<f64>, RasterError> {
        let raster_band = ds.rasterband(band + 1)?;
        let buf = raster_band.read_as::<f64>(
            (0, first_row as isize),
            (columns, rows),
            (columns, rows),
            Some(ResampleAlg::NearestNeighbour),
        )?;
        let data = buf.data().to_vec();
        if data.is_empty() {
            return Err(RasterError::EmptyRead { band, first_row });
        }
        Array2::from_shape_vec((rows, columns), data).map_err(|_| RasterError::ShapeMismatch {
            expected: (rows, columns),
            found: (0, 0),
        })
    }
}

impl RasterSource for GdalRaster {
    fn size(&self) -> RasterSize {
        self.size
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn sample_type(&self) -> SampleType {
        self.sample_type
    }

    fn nodata(&self, band: usize) -> Option<f64> {
        self.nodata.get(band).copied().flatten()
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
        let re = Self::read_rows(&self.dataset, band, first_row, rows, columns)?;
        match &self.imaginary {
            None => Ok(SampleChunk::Real(re)),
            Some(imag_ds) => {
                let im = Self::read_rows(imag_ds, band, first_row, rows, columns)?;
                let mut z = Array2::<Complex<f64>>::zeros((rows, columns));
                Zip::from(&mut z)
                    .and(&re)
                    .and(&im)
                    .for_each(|z, &r, &i| *z = Complex::new(r, i));
                Ok(SampleChunk::Complex(z))
            }
        }
    }

    fn gcp_projection(&self) -> Option<String> {
        self.dataset.gcp_projection().filter(|p| !p.trim().is_empty())
    }
}

/// Geometry service backed by OGR spatial references.
#[derive(Copy, Clone, Debug, Default)]
pub struct GdalGeometry;

fn spatial_ref(definition: &str) -> Result<SpatialRef, GeocodingError> {
    let mut srs = SpatialRef::from_definition(definition)
        .map_err(|e| GeocodingError::UnresolvableReference(format!("{definition}: {e}")))?;
    // x = lon, y = lat regardless of the authority's axis order
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}

impl GeometryService for GdalGeometry {
    fn is_same(&self, a: &str, b: &str) -> Result<bool, GeocodingError> {
        Ok(spatial_ref(a)? == spatial_ref(b)?)
    }

    fn transform_coordinate(
        &self,
        from: &str,
        to: &str,
        point: (f64, f64),
    ) -> Result<(f64, f64), GeocodingError> {
        let transform = CoordTransform::new(&spatial_ref(from)?, &spatial_ref(to)?)
            .map_err(|e| GeocodingError::Geometry(e.to_string()))?;
        let mut xs = [point.0];
        let mut ys = [point.1];
        let mut zs = [0.0_f64];
        transform
            .transform_coords(&mut xs, &mut ys, &mut zs)
            .map_err(|e| GeocodingError::Geometry(e.to_string()))?;
        debug!("{} -> {}: {:?} -> ({}, {})", from, to, point, xs[0], ys[0]);
        Ok((xs[0], ys[0]))
    }
}

/// Well-known text of a reference-system definition such as `EPSG:4326`.
pub fn projection_wkt(definition: &str) -> Result<String, RasterError> {
    Ok(SpatialRef::from_definition(definition)?.to_wkt()?)
}
