use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::{MetadataError, naming, time};
use crate::types::{Dialect, PassDirection, PixelOrder, SampleType};

pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;
pub const WGS84_SEMI_MAJOR: f64 = 6_378_137.0;
pub const WGS84_SEMI_MINOR: f64 = 6_356_752.314_245;

/// Correspondence between a raster location and a geodetic coordinate.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Gcp {
    pub pixel: f64,
    pub line: f64,
    pub lon: f64,
    pub lat: f64,
    pub elevation: f64,
}

impl Gcp {
    pub fn new(pixel: f64, line: f64, lon: f64, lat: f64, elevation: f64) -> Self {
        Self {
            pixel,
            line,
            lon,
            lat,
            elevation,
        }
    }
}

/// Four validated corners, upper-left, upper-right, lower-right, lower-left.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct CornerPolygon {
    pub corners: [Gcp; 4],
}

impl CornerPolygon {
    pub fn upper_left(&self) -> &Gcp {
        &self.corners[0]
    }
    pub fn upper_right(&self) -> &Gcp {
        &self.corners[1]
    }
    pub fn lower_right(&self) -> &Gcp {
        &self.corners[2]
    }
    pub fn lower_left(&self) -> &Gcp {
        &self.corners[3]
    }

    /// Closed ring of (lon, lat): the four corners and the first one again.
    pub fn ring(&self) -> [(f64, f64); 5] {
        let c = &self.corners;
        [
            (c[0].lon, c[0].lat),
            (c[1].lon, c[1].lat),
            (c[2].lon, c[2].lat),
            (c[3].lon, c[3].lat),
            (c[0].lon, c[0].lat),
        ]
    }

    pub fn wkt(&self) -> String {
        let points: Vec<String> = self
            .ring()
            .iter()
            .map(|(lon, lat)| format!("{} {}", lon, lat))
            .collect();
        format!("POLYGON (({}))", points.join(", "))
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Ellipsoid {
    pub name: String,
    /// Metres
    pub semi_major: f64,
    /// Metres
    pub semi_minor: f64,
}

impl Ellipsoid {
    pub fn wgs84() -> Self {
        Self {
            name: "WGS84".to_string(),
            semi_major: WGS84_SEMI_MAJOR,
            semi_minor: WGS84_SEMI_MINOR,
        }
    }

    /// Geocentric radius at geodetic latitude `lat_deg`.
    pub fn radius_at(&self, lat_deg: f64) -> f64 {
        let (a, b) = (self.semi_major, self.semi_minor);
        let (sin, cos) = lat_deg.to_radians().sin_cos();
        let num = (a * a * cos).powi(2) + (b * b * sin).powi(2);
        let den = (a * cos).powi(2) + (b * sin).powi(2);
        (num / den).sqrt()
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum CalibrationOffset {
    Scalar(f64),
    PerColumn(Vec<f64>),
}

impl CalibrationOffset {
    pub fn at(&self, column: usize) -> f64 {
        match self {
            CalibrationOffset::Scalar(v) => *v,
            CalibrationOffset::PerColumn(values) => values.get(column).copied().unwrap_or(0.0),
        }
    }
}

/// Gain and offset applied by the calibration engine.
///
/// `order` records how the source delivered its samples. When it is
/// `Decreasing` the vectors have already been reversed by the builder, so
/// column `i` of every vector matches column `i` of the raster.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct CalibrationVectors {
    pub gain: Vec<f64>,
    pub offset: CalibrationOffset,
    pub order: PixelOrder,
}

/// Normalized, dialect-independent description of one scene.
#[derive(Clone, Debug)]
pub struct SceneMetadata {
    pub dialect: Dialect,
    pub product_name: String,
    pub acquisition: NaiveDateTime,
    pub day_of_year: u32,
    pub satellite: String,
    pub sensor: Option<String>,
    /// Fixed-width (5 character) beam-mode tag
    pub beam_mode: String,
    pub polarizations: Vec<String>,
    pub bits_per_sample: u32,
    pub sample_type: SampleType,
    pub columns: usize,
    pub rows: usize,
    pub pixel_spacing: Option<f64>,
    pub line_spacing: Option<f64>,
    pub range_looks: Option<f64>,
    pub azimuth_looks: Option<f64>,
    pub facility: Option<String>,
    pub orbit: Option<u64>,
    pub pass_direction: Option<PassDirection>,
    /// Metres
    pub wavelength: Option<f64>,
    /// Hertz
    pub frequency: Option<f64>,
    pub platform_latitude: Option<f64>,
    /// Metres, geocentric radius at `platform_latitude`
    pub earth_radius: Option<f64>,
    pub ellipsoid: Option<Ellipsoid>,
    pub calibration: CalibrationVectors,
    /// Linear sigma-naught noise floor per column
    pub noise: Vec<f64>,
    /// Incidence angle in degrees per column
    pub incidence: Vec<f64>,
    pub gcps: Vec<Gcp>,
    /// Reference system the GCPs are declared in, if the source states one
    pub gcp_srs: Option<String>,
    /// Set once geocoding has validated the GCPs
    pub corners: Option<CornerPolygon>,
    pub spatial_reference: Option<String>,
}

impl SceneMetadata {
    /// Attach validated corners and the reference system they are expressed in.
    pub fn into_geocoded(self, corners: CornerPolygon, spatial_reference: String) -> Self {
        Self {
            corners: Some(corners),
            spatial_reference: Some(spatial_reference),
            ..self
        }
    }
}

/// Partially populated scene, filled in by a dialect normalizer.
#[derive(Clone, Debug)]
pub struct SceneBuilder {
    pub dialect: Dialect,
    pub acquisition: Option<NaiveDateTime>,
    pub satellite: Option<String>,
    pub sensor: Option<String>,
    pub beam_mode: Option<String>,
    pub polarizations: Vec<String>,
    pub bits_per_sample: Option<u32>,
    pub sample_type: Option<SampleType>,
    pub columns: Option<usize>,
    pub rows: Option<usize>,
    pub pixel_spacing: Option<f64>,
    pub line_spacing: Option<f64>,
    pub range_looks: Option<f64>,
    pub azimuth_looks: Option<f64>,
    pub facility: Option<String>,
    pub orbit: Option<u64>,
    pub pass_direction: Option<PassDirection>,
    pub wavelength: Option<f64>,
    pub platform_latitude: Option<f64>,
    pub ellipsoid: Option<Ellipsoid>,
    pub pixel_order: PixelOrder,
    pub gain: Option<Vec<f64>>,
    pub offset: CalibrationOffset,
    pub noise: Vec<f64>,
    pub incidence: Vec<f64>,
    pub gcps: Vec<Gcp>,
    pub gcp_srs: Option<String>,
}

fn require<T>(value: Option<T>, dialect: Dialect, field: &'static str) -> Result<T, MetadataError> {
    value.ok_or(MetadataError::MissingField { dialect, field })
}

impl SceneBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            acquisition: None,
            satellite: None,
            sensor: None,
            beam_mode: None,
            polarizations: Vec::new(),
            bits_per_sample: None,
            sample_type: None,
            columns: None,
            rows: None,
            pixel_spacing: None,
            line_spacing: None,
            range_looks: None,
            azimuth_looks: None,
            facility: None,
            orbit: None,
            pass_direction: None,
            wavelength: None,
            platform_latitude: None,
            ellipsoid: None,
            pixel_order: PixelOrder::Increasing,
            gain: None,
            offset: CalibrationOffset::Scalar(0.0),
            noise: Vec::new(),
            incidence: Vec::new(),
            gcps: Vec::new(),
            gcp_srs: None,
        }
    }

    /// Check required attributes, orient per-column vectors and derive the
    /// computed quantities.
    pub fn build(self) -> Result<SceneMetadata, MetadataError> {
        let dialect = self.dialect;
        let acquisition = require(self.acquisition, dialect, "acquisition_time")?;
        let satellite = require(self.satellite, dialect, "satellite")?;
        let beam_mode = require(self.beam_mode, dialect, "beam_mode")?;
        if self.polarizations.is_empty() {
            return Err(MetadataError::MissingField {
                dialect,
                field: "polarization",
            });
        }
        let bits_per_sample = require(self.bits_per_sample, dialect, "bits_per_sample")?;
        let sample_type = require(self.sample_type, dialect, "sample_type")?;
        let columns = require(self.columns, dialect, "pixel_count")?;
        let rows = require(self.rows, dialect, "line_count")?;
        let mut gain = require(self.gain, dialect, "gain_values")?;

        let check_len = |field: &'static str, len: usize| {
            if len == columns {
                Ok(())
            } else {
                Err(MetadataError::InvalidField {
                    dialect,
                    field,
                    value: format!("{len} values for {columns} columns"),
                })
            }
        };
        check_len("gain_values", gain.len())?;
        if !self.noise.is_empty() {
            check_len("noise_values", self.noise.len())?;
        }
        if !self.incidence.is_empty() {
            check_len("incidence_values", self.incidence.len())?;
        }

        let mut offset = self.offset;
        let mut noise = self.noise;
        let mut incidence = self.incidence;
        if self.pixel_order == PixelOrder::Decreasing {
            gain.reverse();
            noise.reverse();
            incidence.reverse();
            if let CalibrationOffset::PerColumn(values) = &mut offset {
                values.reverse();
            }
        }

        let ellipsoid = self.ellipsoid;
        let earth_radius = self.platform_latitude.map(|lat| {
            ellipsoid
                .clone()
                .unwrap_or_else(Ellipsoid::wgs84)
                .radius_at(lat)
        });
        let frequency = self
            .wavelength
            .filter(|w| *w > 0.0)
            .map(|w| SPEED_OF_LIGHT / w);
        let beam_mode = super::beam::fixed_width_tag(&beam_mode);
        let product_name =
            naming::product_name(&acquisition, &satellite, &beam_mode, &self.polarizations);

        Ok(SceneMetadata {
            dialect,
            product_name,
            acquisition,
            day_of_year: time::day_of_year(&acquisition),
            satellite,
            sensor: self.sensor,
            beam_mode,
            polarizations: self.polarizations,
            bits_per_sample,
            sample_type,
            columns,
            rows,
            pixel_spacing: self.pixel_spacing,
            line_spacing: self.line_spacing,
            range_looks: self.range_looks,
            azimuth_looks: self.azimuth_looks,
            facility: self.facility,
            orbit: self.orbit,
            pass_direction: self.pass_direction,
            wavelength: self.wavelength,
            frequency,
            platform_latitude: self.platform_latitude,
            earth_radius,
            ellipsoid,
            calibration: CalibrationVectors {
                gain,
                offset,
                order: self.pixel_order,
            },
            noise,
            incidence,
            gcps: self.gcps,
            gcp_srs: self.gcp_srs,
            corners: None,
            spatial_reference: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn minimal(dialect: Dialect) -> SceneBuilder {
        let mut b = SceneBuilder::new(dialect);
        b.acquisition = NaiveDate::from_ymd_opt(2001, 2, 1)
            .and_then(|d| d.and_hms_opt(12, 0, 0));
        b.satellite = Some("RADARSAT-1".into());
        b.beam_mode = Some("S3".into());
        b.polarizations = vec!["HH".into()];
        b.bits_per_sample = Some(16);
        b.sample_type = Some(SampleType::Real);
        b.columns = Some(3);
        b.rows = Some(2);
        b.gain = Some(vec![1.0, 2.0, 3.0]);
        b
    }

    #[test]
    fn missing_required_field_names_the_field() {
        let mut b = minimal(Dialect::Cdpf);
        b.satellite = None;
        let err = b.build().unwrap_err();
        assert!(matches!(
            err,
            MetadataError::MissingField {
                dialect: Dialect::Cdpf,
                field: "satellite"
            }
        ));
    }

    #[test]
    fn decreasing_order_reverses_vectors_once() {
        let mut b = minimal(Dialect::Cdpf);
        b.pixel_order = PixelOrder::Decreasing;
        b.noise = vec![0.1, 0.2, 0.3];
        b.incidence = vec![20.0, 30.0, 40.0];
        b.offset = CalibrationOffset::PerColumn(vec![5.0, 6.0, 7.0]);
        let scene = b.build().unwrap();
        assert_eq!(scene.calibration.gain, vec![3.0, 2.0, 1.0]);
        assert_eq!(scene.noise, vec![0.3, 0.2, 0.1]);
        assert_eq!(scene.incidence, vec![40.0, 30.0, 20.0]);
        assert_eq!(scene.calibration.offset.at(0), 7.0);
        assert_eq!(scene.calibration.order, PixelOrder::Decreasing);
    }

    #[test]
    fn vector_length_must_match_columns() {
        let mut b = minimal(Dialect::Ceos);
        b.gain = Some(vec![1.0]);
        assert!(matches!(
            b.build(),
            Err(MetadataError::InvalidField {
                field: "gain_values",
                ..
            })
        ));
    }

    #[test]
    fn derived_quantities() {
        let mut b = minimal(Dialect::Ceos);
        b.wavelength = Some(SPEED_OF_LIGHT / 5.3e9);
        b.platform_latitude = Some(0.0);
        let scene = b.build().unwrap();
        assert_eq!(scene.day_of_year, 32);
        assert_eq!(scene.beam_mode, "   S3");
        assert_eq!(scene.product_name, "20010201_120000_r1_s3_hh");
        assert_relative_eq!(scene.frequency.unwrap(), 5.3e9, max_relative = 1e-6);
        assert_relative_eq!(scene.earth_radius.unwrap(), WGS84_SEMI_MAJOR, epsilon = 1e-6);
        let pole = Ellipsoid::wgs84().radius_at(90.0);
        assert_relative_eq!(pole, WGS84_SEMI_MINOR, epsilon = 1e-6);
    }
}
