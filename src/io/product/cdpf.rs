//! Dialect B: flat CDPF binary product.
use super::{FieldReader, split_polarizations};
use crate::io::ceos::MetadataFields;
use crate::metadata::beam::derive_beam_tag;
use crate::metadata::lut::{db_to_linear, expand};
use crate::metadata::{
    CalibrationOffset, Ellipsoid, Gcp, MetadataError, SceneBuilder, SceneMetadata, time,
};
use crate::types::{Dialect, PassDirection, PixelOrder, SampleType};

use super::ceos::MICRO_DEGREES;

fn tie_points(f: &FieldReader<'_>) -> Result<Vec<Gcp>, MetadataError> {
    let Ok(pixels) = f.floats("gcp_pixels") else {
        return Ok(Vec::new());
    };
    let lines = f.floats("gcp_lines")?;
    let lats = f.floats("gcp_lats")?;
    let lons = f.floats("gcp_lons")?;
    let heights = f.floats("gcp_heights").unwrap_or_default();
    let n = pixels.len();
    if lines.len() != n || lats.len() != n || lons.len() != n {
        return Err(f.invalid(
            "gcp_count",
            format!(
                "{} pixels, {} lines, {} lats, {} lons",
                n,
                lines.len(),
                lats.len(),
                lons.len()
            ),
        ));
    }
    Ok((0..n)
        .map(|i| {
            Gcp::new(
                pixels[i],
                lines[i],
                lons[i] / MICRO_DEGREES,
                lats[i] / MICRO_DEGREES,
                heights.get(i).copied().unwrap_or(0.0),
            )
        })
        .collect())
}

pub fn normalize(fields: &MetadataFields) -> Result<SceneMetadata, MetadataError> {
    let f = FieldReader::new(fields, Dialect::Cdpf);
    let mut scene = SceneBuilder::new(Dialect::Cdpf);

    let year = f.int("acq_year")?;
    let year = i32::try_from(year).map_err(|_| f.invalid("acq_year", year))?;
    scene.acquisition = Some(time::from_year_day(year, f.float("acq_day")?)?);
    scene.satellite = Some(f.text("satellite")?.to_string());

    let beam_codes = f.texts("beam_codes");
    scene.beam_mode = Some(
        derive_beam_tag(&beam_codes).ok_or_else(|| MetadataError::UnknownBeam(beam_codes.join(",")))?,
    );
    scene.polarizations = split_polarizations(f.text("polarization")?);

    scene.bits_per_sample = Some(match f.int("data_depth")? {
        1 => 8,
        2 => 16,
        other => return Err(f.invalid("data_depth", other)),
    });
    scene.sample_type = Some(match f.opt_text("sample_kind") {
        Some("C") | Some("c") => SampleType::Complex,
        _ => SampleType::Real,
    });

    let columns = f.count("pixel_count")?;
    scene.columns = Some(columns);
    scene.rows = Some(f.count("line_count")?);
    scene.pixel_spacing = f.opt_float("pixel_spacing");
    scene.line_spacing = f.opt_float("line_spacing");
    scene.range_looks = f.opt_float("range_looks");
    scene.azimuth_looks = f.opt_float("azimuth_looks");
    scene.facility = f.opt_text("facility").map(str::to_string);
    scene.orbit = f.opt_float("orbit_number").map(|o| o as u64);
    scene.pass_direction = f.opt_text("pass_direction").and_then(PassDirection::parse);
    scene.wavelength = f.opt_float("wavelength");
    scene.platform_latitude = f.opt_float("platform_latitude");
    if let (Some(a), Some(b)) = (f.opt_float("semi_major"), f.opt_float("semi_minor")) {
        scene.ellipsoid = Some(Ellipsoid {
            name: f.opt_text("ellipsoid_name").unwrap_or("unknown").to_string(),
            semi_major: a,
            semi_minor: b,
        });
    }
    if f.opt_text("pixel_order").is_some_and(|o| o.eq_ignore_ascii_case("D")) {
        scene.pixel_order = PixelOrder::Decreasing;
    }

    // Gain, noise and incidence tables share one 0-based sampling grid.
    let first = f.opt_float("lut_first_pixel").unwrap_or(0.0);
    let step = f.opt_float("lut_step").unwrap_or(1.0);
    scene.gain = Some(expand(&f.floats("gain_values")?, first, step, columns));
    scene.offset = CalibrationOffset::Scalar(f.opt_float("gain_offset").unwrap_or(0.0));
    if let Ok(noise_db) = f.floats("noise_values") {
        scene.noise = expand(&noise_db, first, step, columns)
            .into_iter()
            .map(db_to_linear)
            .collect();
    }
    if let Ok(incidence) = f.floats("incidence_values") {
        scene.incidence = expand(&incidence, first, step, columns);
    }

    scene.gcps = tie_points(&f)?;
    scene.build()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use approx::assert_relative_eq;

    use super::*;
    use crate::io::ceos::{SchemaRegistry, read_fields_from};
    use crate::io::product::fixtures::CdpfFixture;

    fn decode(fixture: &CdpfFixture) -> Result<SceneMetadata, MetadataError> {
        let registry = SchemaRegistry::for_dialect(Dialect::Cdpf)?;
        let mut fields = MetadataFields::default();
        read_fields_from(Cursor::new(fixture.bytes()), &registry, &mut fields)?;
        normalize(&fields)
    }

    #[test]
    fn synthetic_product_normalizes() {
        let scene = decode(&CdpfFixture::default()).unwrap();
        assert_eq!(scene.product_name, "19980704_010203_r1_s3_hh");
        assert_eq!(scene.day_of_year, 185);
        assert_eq!(scene.beam_mode, "   S3");
        assert_eq!(scene.bits_per_sample, 16);
        assert_eq!(scene.sample_type, SampleType::Real);
        assert_eq!((scene.columns, scene.rows), (4, 3));
        assert_eq!(scene.orbit, Some(13760));
        assert_eq!(scene.pass_direction, Some(PassDirection::Ascending));
        assert_eq!(scene.facility.as_deref(), Some("GSS"));
        assert_eq!(scene.calibration.gain, vec![2.0, 2.0, 4.0, 4.0]);
        assert_relative_eq!(scene.noise[0], 0.01, max_relative = 1e-12);
        assert_relative_eq!(scene.noise[3], 0.001, max_relative = 1e-12);
        assert_eq!(scene.incidence, vec![20.0, 25.0, 30.0, 35.0]);

        assert_eq!(scene.gcps.len(), 4);
        assert_eq!(scene.gcps[1], Gcp::new(3.5, 0.5, -74.0, 45.5, 0.0));
        let ellipsoid = scene.ellipsoid.as_ref().unwrap();
        assert_eq!(ellipsoid.name, "WGS84");
        assert_relative_eq!(ellipsoid.semi_major, 6_378_137.0);
    }

    #[test]
    fn decreasing_pixel_order_reverses_tables() {
        let fixture = CdpfFixture {
            pixel_order: "D",
            ..CdpfFixture::default()
        };
        let scene = decode(&fixture).unwrap();
        assert_eq!(scene.calibration.gain, vec![4.0, 4.0, 2.0, 2.0]);
        assert_eq!(scene.incidence, vec![35.0, 30.0, 25.0, 20.0]);
        assert_eq!(scene.calibration.order, PixelOrder::Decreasing);
    }

    #[test]
    fn sparse_tables_are_interpolated_to_columns() {
        let fixture = CdpfFixture {
            gains: vec![1.0, 3.0],
            noise_db: vec![-10.0],
            incidence: vec![20.0, 21.0, 22.0, 23.0],
            ..CdpfFixture::default()
        };
        let scene = decode(&fixture).unwrap();
        assert_eq!(scene.calibration.gain, vec![1.0, 3.0, 3.0, 3.0]);
        assert_eq!(scene.noise.len(), 4);
        assert_relative_eq!(scene.noise[2], 0.1, max_relative = 1e-12);
    }

    #[test]
    fn unknown_beam_and_depth_are_rejected() {
        let fixture = CdpfFixture {
            beam_codes: vec!["Q9"],
            ..CdpfFixture::default()
        };
        assert!(matches!(decode(&fixture), Err(MetadataError::UnknownBeam(_))));

        let fixture = CdpfFixture {
            data_depth: 3,
            ..CdpfFixture::default()
        };
        assert!(matches!(
            decode(&fixture),
            Err(MetadataError::InvalidField {
                field: "data_depth",
                ..
            })
        ));
    }
}
