//! Produced metadata record.
//!
//! A fixed, versioned field list. Adding a field means adding it to the
//! struct and to `items`; consumers key on `product_name`.
use serde::{Deserialize, Serialize};

use super::SceneMetadata;

pub const RECORD_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub record_version: u32,
    pub product_name: String,
    pub dialect: String,
    pub satellite: String,
    pub sensor: Option<String>,
    pub beam_mode: String,
    pub polarizations: Vec<String>,
    pub acquisition_time: String,
    pub day_of_year: u32,
    pub bits_per_sample: u32,
    pub sample_type: String,
    pub columns: usize,
    pub rows: usize,
    pub pixel_spacing: Option<f64>,
    pub line_spacing: Option<f64>,
    pub range_looks: Option<f64>,
    pub azimuth_looks: Option<f64>,
    pub facility: Option<String>,
    pub orbit: Option<u64>,
    pub pass_direction: Option<String>,
    pub wavelength: Option<f64>,
    pub frequency: Option<f64>,
    pub platform_latitude: Option<f64>,
    pub earth_radius: Option<f64>,
    pub ellipsoid: Option<String>,
    pub gcp_count: usize,
    pub footprint: Option<String>,
    pub spatial_reference: Option<String>,
    pub geotransform: Option<[f64; 6]>,
    pub conversion_tool: String,
    pub conversion_version: String,
}

fn opt<T: ToString>(v: &Option<T>) -> String {
    v.as_ref().map(ToString::to_string).unwrap_or_default()
}

impl MetadataRecord {
    pub fn from_scene(scene: &SceneMetadata, geotransform: Option<[f64; 6]>) -> Self {
        Self {
            record_version: RECORD_VERSION,
            product_name: scene.product_name.clone(),
            dialect: scene.dialect.to_string(),
            satellite: scene.satellite.clone(),
            sensor: scene.sensor.clone(),
            beam_mode: scene.beam_mode.trim().to_string(),
            polarizations: scene.polarizations.clone(),
            acquisition_time: scene
                .acquisition
                .format("%Y-%m-%dT%H:%M:%S%.6f")
                .to_string(),
            day_of_year: scene.day_of_year,
            bits_per_sample: scene.bits_per_sample,
            sample_type: scene.sample_type.to_string(),
            columns: scene.columns,
            rows: scene.rows,
            pixel_spacing: scene.pixel_spacing,
            line_spacing: scene.line_spacing,
            range_looks: scene.range_looks,
            azimuth_looks: scene.azimuth_looks,
            facility: scene.facility.clone(),
            orbit: scene.orbit,
            pass_direction: scene.pass_direction.map(|p| p.to_string()),
            wavelength: scene.wavelength,
            frequency: scene.frequency,
            platform_latitude: scene.platform_latitude,
            earth_radius: scene.earth_radius,
            ellipsoid: scene.ellipsoid.as_ref().map(|e| e.name.clone()),
            gcp_count: scene.gcps.len(),
            footprint: scene.corners.as_ref().map(|c| c.wkt()),
            spatial_reference: scene.spatial_reference.clone(),
            geotransform,
            conversion_tool: env!("CARGO_PKG_NAME").to_string(),
            conversion_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Flat (name, value) pairs in the fixed field order. Lists are comma-joined,
    /// absent values are empty strings.
    pub fn items(&self) -> Vec<(&'static str, String)> {
        vec![
            ("record_version", self.record_version.to_string()),
            ("product_name", self.product_name.clone()),
            ("dialect", self.dialect.clone()),
            ("satellite", self.satellite.clone()),
            ("sensor", opt(&self.sensor)),
            ("beam_mode", self.beam_mode.clone()),
            ("polarizations", self.polarizations.join(",")),
            ("acquisition_time", self.acquisition_time.clone()),
            ("day_of_year", self.day_of_year.to_string()),
            ("bits_per_sample", self.bits_per_sample.to_string()),
            ("sample_type", self.sample_type.clone()),
            ("columns", self.columns.to_string()),
            ("rows", self.rows.to_string()),
            ("pixel_spacing", opt(&self.pixel_spacing)),
            ("line_spacing", opt(&self.line_spacing)),
            ("range_looks", opt(&self.range_looks)),
            ("azimuth_looks", opt(&self.azimuth_looks)),
            ("facility", opt(&self.facility)),
            ("orbit", opt(&self.orbit)),
            ("pass_direction", opt(&self.pass_direction)),
            ("wavelength", opt(&self.wavelength)),
            ("frequency", opt(&self.frequency)),
            ("platform_latitude", opt(&self.platform_latitude)),
            ("earth_radius", opt(&self.earth_radius)),
            ("ellipsoid", opt(&self.ellipsoid)),
            ("gcp_count", self.gcp_count.to_string()),
            ("footprint", opt(&self.footprint)),
            ("spatial_reference", opt(&self.spatial_reference)),
            (
                "geotransform",
                self.geotransform
                    .map(|gt| {
                        gt.iter()
                            .map(|v| v.to_string())
                            .collect::<Vec<_>>()
                            .join(",")
                    })
                    .unwrap_or_default(),
            ),
            ("conversion_tool", self.conversion_tool.clone()),
            ("conversion_version", self.conversion_version.clone()),
        ]
    }

    pub fn delimited_header(&self, separator: char) -> String {
        self.items()
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(&separator.to_string())
    }

    /// One row; values containing the separator or a quote are double-quoted.
    pub fn delimited_row(&self, separator: char) -> String {
        self.items()
            .iter()
            .map(|(_, value)| {
                if value.contains(separator) || value.contains('"') {
                    format!("\"{}\"", value.replace('"', "\"\""))
                } else {
                    value.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(&separator.to_string())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
