//! Dialect A: CEOS leader/trailer/image file set.
use std::collections::BTreeMap;

use super::FieldReader;
use crate::io::ceos::{FieldValue, MetadataFields};
use crate::metadata::beam::derive_beam_tag;
use crate::metadata::lut::{db_to_linear, expand, ramp};
use crate::metadata::{
    CalibrationOffset, Ellipsoid, Gcp, MetadataError, SceneBuilder, SceneMetadata, time,
};
use crate::types::{Dialect, PassDirection, PixelOrder, SampleType};

/// Latitudes and longitudes of binary fields are stored in micro-degrees.
pub const MICRO_DEGREES: f64 = 1_000_000.0;

fn polarization_letter(code: i64) -> Option<char> {
    match code {
        0 => Some('H'),
        1 => Some('V'),
        _ => None,
    }
}

/// `"IU1"`, `"IU2"`, `"CI2"`, ...: leading `C` marks complex samples, the
/// trailing digit is bytes per (component) sample.
pub fn parse_sample_format(code: &str) -> Option<(SampleType, u32)> {
    let code = code.trim().to_ascii_uppercase();
    let bytes: u32 = code.chars().last()?.to_digit(10)?;
    if bytes == 0 {
        return None;
    }
    let kind = if code.starts_with('C') {
        SampleType::Complex
    } else {
        SampleType::Real
    };
    Some((kind, bytes * 8))
}

/// GCPs from per-line processed data records: first, middle and last pixel
/// of each line, referenced at pixel centres.
fn line_gcps(
    rows: &[BTreeMap<String, FieldValue>],
    columns: usize,
) -> Vec<Gcp> {
    let get = |row: &BTreeMap<String, FieldValue>, name: &str| {
        row.get(name).and_then(FieldValue::as_f64)
    };
    let mut gcps = Vec::with_capacity(rows.len() * 3);
    for row in rows {
        let Some(line) = get(row, "image_line") else {
            continue;
        };
        let width = get(row, "line_pixel_count")
            .filter(|w| *w > 0.0)
            .unwrap_or(columns as f64);
        let line = line - 0.5;
        let samples = [
            ("first_lat", "first_lon", 0.5),
            ("mid_lat", "mid_lon", width / 2.0),
            ("last_lat", "last_lon", width - 0.5),
        ];
        for (lat, lon, pixel) in samples {
            if let (Some(lat), Some(lon)) = (get(row, lat), get(row, lon)) {
                gcps.push(Gcp::new(
                    pixel,
                    line,
                    lon / MICRO_DEGREES,
                    lat / MICRO_DEGREES,
                    0.0,
                ));
            }
        }
    }
    gcps
}

pub fn normalize(fields: &MetadataFields) -> Result<SceneMetadata, MetadataError> {
    let f = FieldReader::new(fields, Dialect::Ceos);
    let mut scene = SceneBuilder::new(Dialect::Ceos);

    scene.acquisition = Some(time::parse_compact(f.text("scene_centre_time")?)?);
    scene.satellite = Some(f.text("mission_id")?.to_string());
    scene.sensor = f.opt_text("sensor_id").map(str::to_string);

    let beam_codes = f.texts("beam_types");
    scene.beam_mode = Some(
        derive_beam_tag(&beam_codes).ok_or_else(|| MetadataError::UnknownBeam(beam_codes.join(",")))?,
    );

    let tx = f.int("tx_polarization")?;
    let rx = f.int("rx_polarization")?;
    match (polarization_letter(tx), polarization_letter(rx)) {
        (Some(t), Some(r)) => scene.polarizations = vec![format!("{t}{r}")],
        _ => return Err(f.invalid("tx_polarization", format!("{tx}/{rx}"))),
    }

    let format = f.text("sample_format")?;
    let (sample_type, bits) =
        parse_sample_format(format).ok_or_else(|| f.invalid("sample_format", format))?;
    scene.sample_type = Some(sample_type);
    scene.bits_per_sample = Some(bits);

    let columns = f.count("pixel_count")?;
    scene.columns = Some(columns);
    scene.rows = Some(f.count("line_count")?);

    scene.pixel_spacing = f.opt_float("pixel_spacing");
    scene.line_spacing = f.opt_float("line_spacing");
    scene.range_looks = f.opt_float("range_looks");
    scene.azimuth_looks = f.opt_float("azimuth_looks");
    scene.facility = f.opt_text("facility").map(str::to_string);
    scene.orbit = f.opt_float("orbit_number").map(|o| o as u64);
    scene.pass_direction = f.opt_text("orbit_direction").and_then(PassDirection::parse);
    scene.wavelength = f.opt_float("wavelength");
    scene.platform_latitude = f.opt_float("platform_latitude");
    if let (Some(a), Some(b)) = (f.opt_float("semi_major_km"), f.opt_float("semi_minor_km")) {
        scene.ellipsoid = Some(Ellipsoid {
            name: f.opt_text("ellipsoid_name").unwrap_or("unknown").to_string(),
            semi_major: a * 1000.0,
            semi_minor: b * 1000.0,
        });
    }
    if f
        .opt_text("pixel_time_direction")
        .is_some_and(|d| d.to_ascii_uppercase().starts_with("DEC"))
    {
        scene.pixel_order = PixelOrder::Decreasing;
    }

    // Table positions are 1-based pixel numbers.
    let gains = f.floats("gain_values")?;
    let first = f.opt_float("lut_first_pixel").unwrap_or(1.0) - 1.0;
    let step = f.opt_float("lut_step").unwrap_or(1.0);
    scene.gain = Some(expand(&gains, first, step, columns));
    scene.offset = CalibrationOffset::Scalar(f.opt_float("gain_offset").unwrap_or(0.0));

    if let Ok(noise_db) = f.floats("noise_values") {
        let first = f.opt_float("noise_first_pixel").unwrap_or(1.0) - 1.0;
        let step = f.opt_float("noise_step").unwrap_or(1.0);
        scene.noise = expand(&noise_db, first, step, columns)
            .into_iter()
            .map(db_to_linear)
            .collect();
    }
    if let (Some(near), Some(far)) = (f.opt_float("incidence_near"), f.opt_float("incidence_far")) {
        scene.incidence = ramp(near, far, columns);
    }

    scene.gcps = line_gcps(fields.rows("processed_data"), columns);
    scene.build()
}
