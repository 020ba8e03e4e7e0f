//! Dialect C: RADARSAT-2 `product.xml` with its `lutSigma.xml`.
use quick_xml::Reader;
use quick_xml::events::Event;

use super::{Rs2Documents, parse_number, parse_number_list, split_polarizations};
use crate::metadata::lut::{db_to_linear, expand, ramp};
use crate::metadata::scene::SPEED_OF_LIGHT;
use crate::metadata::{
    CalibrationOffset, Ellipsoid, Gcp, MetadataError, SceneBuilder, SceneMetadata, time,
};
use crate::types::{Dialect, PassDirection, PixelOrder, SampleType};

const D: Dialect = Dialect::Rs2;

#[derive(Default, Debug)]
struct NoiseTable {
    first_pixel: f64,
    step: f64,
    values_db: Vec<f64>,
}

#[derive(Default, Debug)]
struct ProductXml {
    satellite: Option<String>,
    sensor: Option<String>,
    start_time: Option<String>,
    beam_mnemonic: Option<String>,
    polarizations: Option<String>,
    pass_direction: Option<String>,
    facility: Option<String>,
    range_looks: Option<f64>,
    azimuth_looks: Option<f64>,
    incidence_near: Option<f64>,
    incidence_far: Option<f64>,
    data_type: Option<String>,
    bits_per_sample: Option<u32>,
    samples: Option<usize>,
    lines: Option<usize>,
    pixel_spacing: Option<f64>,
    line_spacing: Option<f64>,
    pixel_order: Option<String>,
    frequency: Option<f64>,
    ellipsoid_name: Option<String>,
    semi_major: Option<f64>,
    semi_minor: Option<f64>,
    noise: Option<NoiseTable>,
    tie_points: Vec<Gcp>,
}

fn parse_product(xml: &str) -> Result<ProductXml, MetadataError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut curr = String::new();
    let mut meta = ProductXml::default();
    let mut in_source_attributes = false;
    let mut in_tie_point = false;
    let mut in_ellipsoid = false;
    let mut in_sigma_noise = false;
    let mut tie_point = Gcp::new(0.0, 0.0, 0.0, 0.0, 0.0);
    let mut noise = NoiseTable::default();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match tag.as_str() {
                    "sourceAttributes" => in_source_attributes = true,
                    "referenceEllipsoidParameters" => in_ellipsoid = true,
                    "imageTiePoint" => {
                        in_tie_point = true;
                        tie_point = Gcp::new(0.0, 0.0, 0.0, 0.0, 0.0);
                    }
                    "referenceNoiseLevel" => {
                        for attr in e.attributes() {
                            let attr = attr.map_err(quick_xml::Error::from)?;
                            if attr.key.local_name().as_ref() == b"incidenceAngleCorrection"
                                && attr.unescape_value()?.trim() == "Sigma Nought"
                            {
                                in_sigma_noise = true;
                                noise = NoiseTable::default();
                            }
                        }
                    }
                    _ => {}
                }
                curr = tag;
            }
            Event::End(ref e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match tag.as_str() {
                    "sourceAttributes" => in_source_attributes = false,
                    "referenceEllipsoidParameters" => in_ellipsoid = false,
                    "imageTiePoint" if in_tie_point => {
                        in_tie_point = false;
                        meta.tie_points.push(tie_point);
                    }
                    "referenceNoiseLevel" if in_sigma_noise => {
                        in_sigma_noise = false;
                        meta.noise = Some(std::mem::take(&mut noise));
                    }
                    _ => {}
                }
                curr.clear();
            }
            Event::Text(e) => {
                let txt = e.unescape()?;
                let txt = txt.trim();
                match curr.as_str() {
                    "satellite" if in_source_attributes => meta.satellite = Some(txt.to_string()),
                    "sensor" if in_source_attributes => meta.sensor = Some(txt.to_string()),
                    "rawDataStartTime" => meta.start_time = Some(txt.to_string()),
                    "beamModeMnemonic" => meta.beam_mnemonic = Some(txt.to_string()),
                    "polarizations" => meta.polarizations = Some(txt.to_string()),
                    "passDirection" => meta.pass_direction = Some(txt.to_string()),
                    "processingFacility" => meta.facility = Some(txt.to_string()),
                    "numberOfRangeLooks" => {
                        meta.range_looks = Some(parse_number(txt, D, "numberOfRangeLooks")?)
                    }
                    "numberOfAzimuthLooks" => {
                        meta.azimuth_looks = Some(parse_number(txt, D, "numberOfAzimuthLooks")?)
                    }
                    "incidenceAngleNearRange" => {
                        meta.incidence_near = Some(parse_number(txt, D, "incidenceAngleNearRange")?)
                    }
                    "incidenceAngleFarRange" => {
                        meta.incidence_far = Some(parse_number(txt, D, "incidenceAngleFarRange")?)
                    }
                    "dataType" => meta.data_type = Some(txt.to_string()),
                    "bitsPerSample" => {
                        meta.bits_per_sample = Some(parse_number(txt, D, "bitsPerSample")?)
                    }
                    "numberOfSamplesPerLine" => {
                        meta.samples = Some(parse_number(txt, D, "numberOfSamplesPerLine")?)
                    }
                    "numberOfLines" => meta.lines = Some(parse_number(txt, D, "numberOfLines")?),
                    "sampledPixelSpacing" => {
                        meta.pixel_spacing = Some(parse_number(txt, D, "sampledPixelSpacing")?)
                    }
                    "sampledLineSpacing" => {
                        meta.line_spacing = Some(parse_number(txt, D, "sampledLineSpacing")?)
                    }
                    "pixelTimeOrdering" => meta.pixel_order = Some(txt.to_string()),
                    "radarCenterFrequency" => {
                        meta.frequency = Some(parse_number(txt, D, "radarCenterFrequency")?)
                    }
                    "ellipsoidName" if in_ellipsoid => meta.ellipsoid_name = Some(txt.to_string()),
                    "semiMajorAxis" if in_ellipsoid => {
                        meta.semi_major = Some(parse_number(txt, D, "semiMajorAxis")?)
                    }
                    "semiMinorAxis" if in_ellipsoid => {
                        meta.semi_minor = Some(parse_number(txt, D, "semiMinorAxis")?)
                    }
                    "line" if in_tie_point => tie_point.line = parse_number(txt, D, "line")?,
                    "pixel" if in_tie_point => tie_point.pixel = parse_number(txt, D, "pixel")?,
                    "latitude" if in_tie_point => tie_point.lat = parse_number(txt, D, "latitude")?,
                    "longitude" if in_tie_point => {
                        tie_point.lon = parse_number(txt, D, "longitude")?
                    }
                    "height" if in_tie_point => {
                        tie_point.elevation = parse_number(txt, D, "height")?
                    }
                    "pixelFirstNoiseValue" if in_sigma_noise => {
                        noise.first_pixel = parse_number(txt, D, "pixelFirstNoiseValue")?
                    }
                    "stepSize" if in_sigma_noise => {
                        noise.step = parse_number(txt, D, "stepSize")?
                    }
                    "noiseLevelValues" if in_sigma_noise => {
                        noise.values_db = parse_number_list(txt, D, "noiseLevelValues")?
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(meta)
}

/// `(offset, gains)` of a `lutSigma.xml`.
fn parse_lut(xml: &str) -> Result<(f64, Vec<f64>), MetadataError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut curr = String::new();
    let mut offset = 0.0;
    let mut gains = None;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                curr = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
            }
            Event::End(_) => curr.clear(),
            Event::Text(e) => {
                let txt = e.unescape()?;
                match curr.as_str() {
                    "offset" => offset = parse_number(&txt, D, "offset")?,
                    "gains" => gains = Some(parse_number_list(&txt, D, "gains")?),
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    let gains = gains.ok_or(MetadataError::MissingField {
        dialect: D,
        field: "gains",
    })?;
    Ok((offset, gains))
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, MetadataError> {
    value.ok_or(MetadataError::MissingField { dialect: D, field })
}

/// The sigma-naught table gives `sigma = (DN^2 + B) / A`. Detected products
/// keep gain `A` and offset `-B`; complex products are calibrated as
/// `|z|^2 / gain^2`, so the gain becomes `sqrt(A)`.
pub fn normalize(docs: &Rs2Documents) -> Result<SceneMetadata, MetadataError> {
    let product = parse_product(&docs.product)?;
    let (lut_offset, lut_gains) = parse_lut(&docs.lut_sigma)?;
    let mut scene = SceneBuilder::new(D);

    scene.acquisition = Some(time::parse_iso(&required(
        product.start_time,
        "rawDataStartTime",
    )?)?);
    scene.satellite = Some(required(product.satellite, "satellite")?);
    scene.sensor = product.sensor;
    scene.beam_mode = Some(required(product.beam_mnemonic, "beamModeMnemonic")?);
    scene.polarizations = split_polarizations(&required(product.polarizations, "polarizations")?);

    let data_type = required(product.data_type, "dataType")?;
    let sample_type = if data_type.to_ascii_lowercase().contains("complex") {
        SampleType::Complex
    } else {
        SampleType::Real
    };
    scene.sample_type = Some(sample_type);
    scene.bits_per_sample = Some(required(product.bits_per_sample, "bitsPerSample")?);

    let columns = required(product.samples, "numberOfSamplesPerLine")?;
    scene.columns = Some(columns);
    scene.rows = Some(required(product.lines, "numberOfLines")?);
    scene.pixel_spacing = product.pixel_spacing;
    scene.line_spacing = product.line_spacing;
    scene.range_looks = product.range_looks;
    scene.azimuth_looks = product.azimuth_looks;
    scene.facility = product.facility;
    scene.pass_direction = product.pass_direction.as_deref().and_then(PassDirection::parse);
    scene.wavelength = product.frequency.filter(|f| *f > 0.0).map(|f| SPEED_OF_LIGHT / f);
    if let (Some(a), Some(b)) = (product.semi_major, product.semi_minor) {
        scene.ellipsoid = Some(Ellipsoid {
            name: product.ellipsoid_name.unwrap_or_else(|| "unknown".to_string()),
            semi_major: a,
            semi_minor: b,
        });
    }
    if product
        .pixel_order
        .as_deref()
        .is_some_and(|o| o.eq_ignore_ascii_case("decreasing"))
    {
        scene.pixel_order = PixelOrder::Decreasing;
    }

    let gains = expand(&lut_gains, 0.0, 1.0, columns);
    scene.gain = Some(match sample_type {
        SampleType::Real => gains,
        SampleType::Complex => gains.into_iter().map(f64::sqrt).collect(),
    });
    scene.offset = CalibrationOffset::Scalar(-lut_offset);

    if let Some(table) = product.noise.filter(|t| !t.values_db.is_empty()) {
        scene.noise = expand(&table.values_db, table.first_pixel, table.step, columns)
            .into_iter()
            .map(db_to_linear)
            .collect();
    }
    if let (Some(near), Some(far)) = (product.incidence_near, product.incidence_far) {
        scene.incidence = ramp(near, far, columns);
    }
    scene.gcps = product.tie_points;
    scene.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn product_xml(data_type: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<product xmlns="http://www.rsi.ca/rs2/prod/xml/schemas">
  <sourceAttributes>
    <satellite>RADARSAT-2</satellite>
    <sensor>SAR</sensor>
    <beamModeMnemonic>SCWA</beamModeMnemonic>
    <rawDataStartTime>2008-03-12T14:15:02.512345Z</rawDataStartTime>
    <radarParameters>
      <polarizations>HH HV</polarizations>
      <radarCenterFrequency units="Hz">5.405e9</radarCenterFrequency>
    </radarParameters>
    <orbitAndAttitude><orbitInformation><passDirection>Descending</passDirection></orbitInformation></orbitAndAttitude>
  </sourceAttributes>
  <imageGenerationParameters>
    <generalProcessingInformation><processingFacility>MDA-GSS</processingFacility></generalProcessingInformation>
    <sarProcessingInformation>
      <numberOfRangeLooks>2</numberOfRangeLooks>
      <numberOfAzimuthLooks>4</numberOfAzimuthLooks>
      <incidenceAngleNearRange units="deg">20.0</incidenceAngleNearRange>
      <incidenceAngleFarRange units="deg">50.0</incidenceAngleFarRange>
    </sarProcessingInformation>
  </imageGenerationParameters>
  <imageAttributes>
    <rasterAttributes>
      <dataType>{data_type}</dataType>
      <bitsPerSample>16</bitsPerSample>
      <numberOfSamplesPerLine>4</numberOfSamplesPerLine>
      <numberOfLines>3</numberOfLines>
      <sampledPixelSpacing units="m">50.0</sampledPixelSpacing>
      <sampledLineSpacing units="m">50.0</sampledLineSpacing>
      <pixelTimeOrdering>Increasing</pixelTimeOrdering>
    </rasterAttributes>
    <geographicInformation>
      <geolocationGrid>
        <imageTiePoint>
          <imageCoordinate><line>0</line><pixel>0</pixel></imageCoordinate>
          <geodeticCoordinate><latitude>45.5</latitude><longitude>-75.5</longitude><height>80</height></geodeticCoordinate>
        </imageTiePoint>
        <imageTiePoint>
          <imageCoordinate><line>2</line><pixel>3</pixel></imageCoordinate>
          <geodeticCoordinate><latitude>45.0</latitude><longitude>-75.0</longitude><height>90</height></geodeticCoordinate>
        </imageTiePoint>
      </geolocationGrid>
      <referenceEllipsoidParameters>
        <ellipsoidName>WGS 1984</ellipsoidName>
        <semiMajorAxis units="m">6378137.0</semiMajorAxis>
        <semiMinorAxis units="m">6356752.314245</semiMinorAxis>
      </referenceEllipsoidParameters>
    </geographicInformation>
  </imageAttributes>
  <referenceNoiseLevel incidenceAngleCorrection="Beta Nought">
    <noiseLevelValues units="dB">-10 -10 -10 -10</noiseLevelValues>
  </referenceNoiseLevel>
  <referenceNoiseLevel incidenceAngleCorrection="Sigma Nought">
    <pixelFirstNoiseValue>0</pixelFirstNoiseValue>
    <stepSize>3</stepSize>
    <numberOfNoiseLevelValues>2</numberOfNoiseLevelValues>
    <noiseLevelValues units="dB">-20 -30</noiseLevelValues>
  </referenceNoiseLevel>
</product>"#
        )
    }

    const LUT: &str = r#"<lut><offset>100.0</offset><gains>4 4 16 16</gains></lut>"#;

    #[test]
    fn detected_product_is_normalized() {
        let scene = normalize(&Rs2Documents {
            product: product_xml("Magnitude Detected"),
            lut_sigma: LUT.to_string(),
        })
        .unwrap();
        assert_eq!(scene.product_name, "20080312_141502_r2_scwa_hx");
        assert_eq!(scene.beam_mode, " SCWA");
        assert_eq!(scene.calibration.gain, vec![4.0, 4.0, 16.0, 16.0]);
        assert_eq!(scene.calibration.offset, CalibrationOffset::Scalar(-100.0));
        assert_eq!(scene.incidence, vec![20.0, 30.0, 40.0, 50.0]);
        assert_relative_eq!(scene.noise[0], 0.01, max_relative = 1e-12);
        assert_relative_eq!(scene.noise[3], 0.001, max_relative = 1e-12);
        assert_eq!(scene.gcps.len(), 2);
        assert_eq!(scene.gcps[1], Gcp::new(3.0, 2.0, -75.0, 45.0, 90.0));
        assert_eq!(scene.pass_direction, Some(PassDirection::Descending));
        assert_relative_eq!(scene.frequency.unwrap(), 5.405e9, max_relative = 1e-12);
        assert_eq!(scene.range_looks, Some(2.0));
    }

    #[test]
    fn complex_gain_is_square_rooted() {
        let scene = normalize(&Rs2Documents {
            product: product_xml("Complex"),
            lut_sigma: LUT.to_string(),
        })
        .unwrap();
        assert_eq!(scene.sample_type, SampleType::Complex);
        assert_eq!(scene.calibration.gain, vec![2.0, 2.0, 4.0, 4.0]);
    }

    #[test]
    fn missing_lut_gains_is_reported() {
        let err = normalize(&Rs2Documents {
            product: product_xml("Magnitude Detected"),
            lut_sigma: "<lut><offset>0</offset></lut>".to_string(),
        })
        .unwrap_err();
        assert!(matches!(err, MetadataError::MissingField { field: "gains", .. }));
    }
}
