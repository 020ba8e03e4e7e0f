//! Dialect D: Sentinel-1 SAFE manifest, annotation, calibration and noise XML.
use quick_xml::Reader;
use quick_xml::events::Event;

use super::{SafeDocuments, parse_number, parse_number_list, split_polarizations};
use crate::metadata::lut::interpolate;
use crate::metadata::scene::SPEED_OF_LIGHT;
use crate::metadata::{
    CalibrationOffset, Ellipsoid, Gcp, MetadataError, SceneBuilder, SceneMetadata, time,
};
use crate::types::{Dialect, PassDirection, SampleType};

const D: Dialect = Dialect::Safe;

#[derive(Default, Debug)]
struct Manifest {
    family: Option<String>,
    number: Option<String>,
    mode: Option<String>,
    pass: Option<String>,
    orbit: Option<u64>,
    facility: Option<String>,
    polarizations: Vec<String>,
}

fn parse_manifest(xml: &str) -> Result<Manifest, MetadataError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut curr = String::new();
    let mut meta = Manifest::default();
    let mut in_platform = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match tag.as_str() {
                    "platform" => in_platform = true,
                    "facility" if meta.facility.is_none() => {
                        for attr in e.attributes() {
                            let attr = attr.map_err(quick_xml::Error::from)?;
                            if attr.key.local_name().as_ref() == b"name" {
                                meta.facility = Some(attr.unescape_value()?.to_string());
                            }
                        }
                    }
                    _ => {}
                }
                curr = tag;
            }
            Event::End(ref e) => {
                if e.local_name().as_ref() == b"platform" {
                    in_platform = false;
                }
                curr.clear();
            }
            Event::Text(e) => {
                let txt = e.unescape()?;
                let txt = txt.trim();
                match curr.as_str() {
                    "familyName" if in_platform && meta.family.is_none() => {
                        meta.family = Some(txt.to_string())
                    }
                    "number" if in_platform => meta.number = Some(txt.to_string()),
                    "mode" if in_platform => meta.mode = Some(txt.to_string()),
                    "pass" => meta.pass = Some(txt.to_string()),
                    "orbitNumber" if meta.orbit.is_none() => {
                        meta.orbit = Some(parse_number(txt, D, "orbitNumber")?)
                    }
                    "transmitterReceiverPolarisation" => {
                        meta.polarizations.extend(split_polarizations(txt))
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

#[derive(Copy, Clone, Debug)]
struct GridPoint {
    gcp: Gcp,
    incidence: f64,
}

#[derive(Default, Debug)]
struct Annotation {
    mission: Option<String>,
    polarisation: Option<String>,
    mode: Option<String>,
    start_time: Option<String>,
    pass: Option<String>,
    radar_frequency: Option<f64>,
    range_pixel_spacing: Option<f64>,
    azimuth_pixel_spacing: Option<f64>,
    samples: Option<usize>,
    lines: Option<usize>,
    pixel_value: Option<String>,
    output_pixels: Option<String>,
    range_looks: Option<f64>,
    azimuth_looks: Option<f64>,
    ellipsoid_name: Option<String>,
    semi_major: Option<f64>,
    semi_minor: Option<f64>,
    grid: Vec<GridPoint>,
}

fn parse_annotation(xml: &str) -> Result<Annotation, MetadataError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut curr = String::new();
    let mut meta = Annotation::default();
    let mut in_ads_header = false;
    let mut in_product_info = false;
    let mut in_image_info = false;
    let mut in_range_processing = false;
    let mut in_azimuth_processing = false;
    let mut in_grid_point = false;
    let mut point = GridPoint {
        gcp: Gcp::new(0.0, 0.0, 0.0, 0.0, 0.0),
        incidence: 0.0,
    };

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match tag.as_str() {
                    "adsHeader" => in_ads_header = true,
                    "productInformation" => in_product_info = true,
                    "imageInformation" => in_image_info = true,
                    "rangeProcessing" => in_range_processing = true,
                    "azimuthProcessing" => in_azimuth_processing = true,
                    "geolocationGridPoint" => {
                        in_grid_point = true;
                        point = GridPoint {
                            gcp: Gcp::new(0.0, 0.0, 0.0, 0.0, 0.0),
                            incidence: 0.0,
                        };
                    }
                    _ => {}
                }
                curr = tag;
            }
            Event::End(ref e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                match tag.as_str() {
                    "adsHeader" => in_ads_header = false,
                    "productInformation" => in_product_info = false,
                    "imageInformation" => in_image_info = false,
                    "rangeProcessing" => in_range_processing = false,
                    "azimuthProcessing" => in_azimuth_processing = false,
                    "geolocationGridPoint" if in_grid_point => {
                        in_grid_point = false;
                        meta.grid.push(point);
                    }
                    _ => {}
                }
                curr.clear();
            }
            Event::Text(e) => {
                let txt = e.unescape()?;
                let txt = txt.trim();
                match curr.as_str() {
                    "missionId" if in_ads_header => meta.mission = Some(txt.to_string()),
                    "polarisation" if in_ads_header => meta.polarisation = Some(txt.to_string()),
                    "mode" if in_ads_header => meta.mode = Some(txt.to_string()),
                    "startTime" if in_ads_header && meta.start_time.is_none() => {
                        meta.start_time = Some(txt.to_string())
                    }
                    "pass" if in_product_info => meta.pass = Some(txt.to_string()),
                    "radarFrequency" if in_product_info => {
                        meta.radar_frequency = Some(parse_number(txt, D, "radarFrequency")?)
                    }
                    "rangePixelSpacing" if in_image_info => {
                        meta.range_pixel_spacing = Some(parse_number(txt, D, "rangePixelSpacing")?)
                    }
                    "azimuthPixelSpacing" if in_image_info => {
                        meta.azimuth_pixel_spacing =
                            Some(parse_number(txt, D, "azimuthPixelSpacing")?)
                    }
                    "numberOfSamples" if in_image_info => {
                        meta.samples = Some(parse_number(txt, D, "numberOfSamples")?)
                    }
                    "numberOfLines" if in_image_info => {
                        meta.lines = Some(parse_number(txt, D, "numberOfLines")?)
                    }
                    "pixelValue" if in_image_info => meta.pixel_value = Some(txt.to_string()),
                    "outputPixels" if in_image_info => meta.output_pixels = Some(txt.to_string()),
                    "numberOfLooks" if in_range_processing && meta.range_looks.is_none() => {
                        meta.range_looks = Some(parse_number(txt, D, "numberOfLooks")?)
                    }
                    "numberOfLooks" if in_azimuth_processing && meta.azimuth_looks.is_none() => {
                        meta.azimuth_looks = Some(parse_number(txt, D, "numberOfLooks")?)
                    }
                    "ellipsoidName" => meta.ellipsoid_name = Some(txt.to_string()),
                    "ellipsoidSemiMajorAxis" => {
                        meta.semi_major = Some(parse_number(txt, D, "ellipsoidSemiMajorAxis")?)
                    }
                    "ellipsoidSemiMinorAxis" => {
                        meta.semi_minor = Some(parse_number(txt, D, "ellipsoidSemiMinorAxis")?)
                    }
                    "line" if in_grid_point => point.gcp.line = parse_number(txt, D, "line")?,
                    "pixel" if in_grid_point => point.gcp.pixel = parse_number(txt, D, "pixel")?,
                    "latitude" if in_grid_point => point.gcp.lat = parse_number(txt, D, "latitude")?,
                    "longitude" if in_grid_point => {
                        point.gcp.lon = parse_number(txt, D, "longitude")?
                    }
                    "height" if in_grid_point => {
                        point.gcp.elevation = parse_number(txt, D, "height")?
                    }
                    "incidenceAngle" if in_grid_point => {
                        point.incidence = parse_number(txt, D, "incidenceAngle")?
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

/// Pixel positions and values of the first vector (lowest line) of a
/// calibration or noise vector list. `vector_tags` name the vector element,
/// `value_tags` the value list inside it; the first listed name found wins.
fn parse_first_vector(
    xml: &str,
    vector_tags: &[&str],
    value_tags: &[&str],
    field: &'static str,
) -> Result<Option<(Vec<f64>, Vec<f64>)>, MetadataError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut curr = String::new();
    let mut in_vector = false;
    let mut line = f64::INFINITY;
    let mut pixels = Vec::new();
    let mut values = Vec::new();
    let mut best: Option<(f64, Vec<f64>, Vec<f64>)> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if vector_tags.contains(&tag.as_str()) {
                    in_vector = true;
                    line = f64::INFINITY;
                    pixels.clear();
                    values.clear();
                }
                curr = tag;
            }
            Event::End(ref e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if in_vector && vector_tags.contains(&tag.as_str()) {
                    in_vector = false;
                    if best.as_ref().is_none_or(|(l, _, _)| line < *l) {
                        best = Some((line, pixels.clone(), values.clone()));
                    }
                }
                curr.clear();
            }
            Event::Text(e) if in_vector => {
                let txt = e.unescape()?;
                match curr.as_str() {
                    "line" => line = parse_number(&txt, D, "line")?,
                    "pixel" => pixels = parse_number_list(&txt, D, "pixel")?,
                    tag if value_tags.contains(&tag) => values = parse_number_list(&txt, D, field)?,
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(best
        .map(|(_, p, v)| (p, v))
        .filter(|(p, v)| !p.is_empty() && p.len() == v.len()))
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, MetadataError> {
    value.ok_or(MetadataError::MissingField { dialect: D, field })
}

/// `"16 bit Unsigned Integer"` -> 16
fn output_bits(raw: &str) -> Option<u32> {
    raw.split_whitespace().next()?.parse().ok()
}

/// Sentinel-1 calibration: `sigma = |DN|^2 / A^2` with `A` the sigmaNought
/// table, and a noise floor of `noiseLut / A^2`. Detected samples are
/// calibrated as `(DN^2 - offset) / gain`, so they get `gain = A^2`; complex
/// samples are divided by `gain^2`, so they get `gain = A`.
pub fn normalize(docs: &SafeDocuments) -> Result<SceneMetadata, MetadataError> {
    let manifest = parse_manifest(&docs.manifest)?;
    let ann = parse_annotation(&docs.annotation)?;
    let mut scene = SceneBuilder::new(D);

    scene.acquisition = Some(time::parse_iso(&required(ann.start_time, "startTime")?)?);
    let satellite = match (&manifest.family, &manifest.number) {
        (Some(family), Some(number)) => format!("{family}{number}"),
        _ => required(ann.mission.clone(), "missionId")?,
    };
    scene.satellite = Some(satellite);
    scene.sensor = ann.mission;
    scene.beam_mode = Some(required(ann.mode.or(manifest.mode), "mode")?);
    scene.polarizations = if manifest.polarizations.is_empty() {
        split_polarizations(&required(ann.polarisation, "polarisation")?)
    } else {
        manifest.polarizations
    };

    let sample_type = match ann.pixel_value.as_deref() {
        Some(v) if v.eq_ignore_ascii_case("complex") => SampleType::Complex,
        _ => SampleType::Real,
    };
    scene.sample_type = Some(sample_type);
    let output_pixels = required(ann.output_pixels, "outputPixels")?;
    scene.bits_per_sample = Some(output_bits(&output_pixels).ok_or(
        MetadataError::InvalidField {
            dialect: D,
            field: "outputPixels",
            value: output_pixels.clone(),
        },
    )?);

    let columns = required(ann.samples, "numberOfSamples")?;
    scene.columns = Some(columns);
    scene.rows = Some(required(ann.lines, "numberOfLines")?);
    scene.pixel_spacing = ann.range_pixel_spacing;
    scene.line_spacing = ann.azimuth_pixel_spacing;
    scene.range_looks = ann.range_looks;
    scene.azimuth_looks = ann.azimuth_looks;
    scene.facility = manifest.facility;
    scene.orbit = manifest.orbit;
    scene.pass_direction = ann
        .pass
        .or(manifest.pass)
        .as_deref()
        .and_then(PassDirection::parse);
    scene.wavelength = ann
        .radar_frequency
        .filter(|f| *f > 0.0)
        .map(|f| SPEED_OF_LIGHT / f);
    if let (Some(a), Some(b)) = (ann.semi_major, ann.semi_minor) {
        scene.ellipsoid = Some(Ellipsoid {
            name: ann.ellipsoid_name.unwrap_or_else(|| "WGS84".to_string()),
            semi_major: a,
            semi_minor: b,
        });
    }

    let (cal_pixels, sigma) = parse_first_vector(
        &docs.calibration,
        &["calibrationVector"],
        &["sigmaNought"],
        "sigmaNought",
    )?
    .ok_or(MetadataError::MissingField {
        dialect: D,
        field: "sigmaNought",
    })?;
    let a = interpolate(&cal_pixels, &sigma, columns);
    scene.gain = Some(match sample_type {
        SampleType::Real => a.iter().map(|v| v * v).collect(),
        SampleType::Complex => a.clone(),
    });
    scene.offset = CalibrationOffset::Scalar(0.0);

    if let Some(noise_xml) = &docs.noise {
        let vector = parse_first_vector(
            noise_xml,
            &["noiseRangeVector", "noiseVector"],
            &["noiseRangeLut", "noiseLut"],
            "noiseRangeLut",
        )?;
        if let Some((pixels, lut)) = vector {
            scene.noise = interpolate(&pixels, &lut, columns)
                .iter()
                .zip(&a)
                .map(|(n, a)| if *a != 0.0 { n / (a * a) } else { 0.0 })
                .collect();
        }
    }

    let first_line = ann
        .grid
        .iter()
        .map(|p| p.gcp.line)
        .fold(f64::INFINITY, f64::min);
    let mut near_line: Vec<&GridPoint> = ann.grid.iter().filter(|p| p.gcp.line == first_line).collect();
    near_line.sort_by(|a, b| a.gcp.pixel.total_cmp(&b.gcp.pixel));
    if !near_line.is_empty() {
        let pixels: Vec<f64> = near_line.iter().map(|p| p.gcp.pixel).collect();
        let angles: Vec<f64> = near_line.iter().map(|p| p.incidence).collect();
        scene.incidence = interpolate(&pixels, &angles, columns);
    }
    scene.gcps = ann.grid.iter().map(|p| p.gcp).collect();
    scene.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xfdu:XFDU xmlns:xfdu="urn:ccsds:schema:xfdu:1" xmlns:safe="http://www.esa.int/safe/sentinel-1.0" xmlns:s1sarl1="http://www.esa.int/safe/sentinel-1.0/sentinel-1/sar/level-1">
  <metadataSection>
    <metadataObject ID="processing">
      <safe:processing name="GRD Post Processing">
        <safe:facility country="Germany" name="Copernicus S1 Core Ground Segment - DPA" organisation="ESA" site="DLR"/>
      </safe:processing>
    </metadataObject>
    <metadataObject ID="platform">
      <safe:platform>
        <safe:familyName>SENTINEL-1</safe:familyName>
        <safe:number>A</safe:number>
        <safe:instrument><safe:extension><s1sarl1:instrumentMode><s1sarl1:mode>IW</s1sarl1:mode></s1sarl1:instrumentMode></safe:extension></safe:instrument>
      </safe:platform>
    </metadataObject>
    <metadataObject ID="measurementOrbitReference">
      <safe:orbitReference>
        <safe:orbitNumber type="start">12345</safe:orbitNumber>
        <safe:orbitNumber type="stop">12345</safe:orbitNumber>
        <safe:extension><s1:orbitProperties xmlns:s1="http://www.esa.int/safe/sentinel-1.0/sentinel-1"><s1:pass>DESCENDING</s1:pass></s1:orbitProperties></safe:extension>
      </safe:orbitReference>
    </metadataObject>
    <metadataObject ID="generalProductInformation">
      <s1sarl1:standAloneProductInformation>
        <s1sarl1:transmitterReceiverPolarisation>VV</s1sarl1:transmitterReceiverPolarisation>
        <s1sarl1:transmitterReceiverPolarisation>VH</s1sarl1:transmitterReceiverPolarisation>
      </s1sarl1:standAloneProductInformation>
    </metadataObject>
  </metadataSection>
</xfdu:XFDU>"#;

    const ANNOTATION: &str = r#"<product>
  <adsHeader>
    <missionId>S1A</missionId><productType>GRD</productType><polarisation>VV</polarisation>
    <mode>IW</mode><startTime>2021-06-01T05:30:12.345678</startTime>
  </adsHeader>
  <generalAnnotation>
    <productInformation><pass>Descending</pass><radarFrequency>5.405000454334350e+09</radarFrequency></productInformation>
  </generalAnnotation>
  <imageAnnotation>
    <imageInformation>
      <rangePixelSpacing>1.0e+01</rangePixelSpacing><azimuthPixelSpacing>1.0e+01</azimuthPixelSpacing>
      <numberOfSamples>5</numberOfSamples><numberOfLines>3</numberOfLines>
      <pixelValue>Detected</pixelValue><outputPixels>16 bit Unsigned Integer</outputPixels>
    </imageInformation>
    <processingInformation>
      <swathProcessingParamsList count="1"><swathProcessingParams>
        <rangeProcessing><numberOfLooks>5</numberOfLooks></rangeProcessing>
        <azimuthProcessing><numberOfLooks>1</numberOfLooks></azimuthProcessing>
      </swathProcessingParams></swathProcessingParamsList>
      <ellipsoidName>WGS84</ellipsoidName>
      <ellipsoidSemiMajorAxis>6.378137e+06</ellipsoidSemiMajorAxis>
      <ellipsoidSemiMinorAxis>6.356752314245179e+06</ellipsoidSemiMinorAxis>
    </processingInformation>
  </imageAnnotation>
  <geolocationGrid><geolocationGridPointList count="4">
    <geolocationGridPoint><line>0</line><pixel>0</pixel><latitude>50.0</latitude><longitude>10.0</longitude><height>0</height><incidenceAngle>30.0</incidenceAngle></geolocationGridPoint>
    <geolocationGridPoint><line>0</line><pixel>4</pixel><latitude>50.0</latitude><longitude>11.0</longitude><height>0</height><incidenceAngle>40.0</incidenceAngle></geolocationGridPoint>
    <geolocationGridPoint><line>2</line><pixel>0</pixel><latitude>49.0</latitude><longitude>10.0</longitude><height>0</height><incidenceAngle>31.0</incidenceAngle></geolocationGridPoint>
    <geolocationGridPoint><line>2</line><pixel>4</pixel><latitude>49.0</latitude><longitude>11.0</longitude><height>0</height><incidenceAngle>41.0</incidenceAngle></geolocationGridPoint>
  </geolocationGridPointList></geolocationGrid>
</product>"#;

    const CALIBRATION: &str = r#"<calibration><calibrationVectorList count="2">
  <calibrationVector><line>2</line><pixel>0 4</pixel><sigmaNought>9 9</sigmaNought></calibrationVector>
  <calibrationVector><line>0</line><pixel>0 4</pixel><sigmaNought>2 4</sigmaNought></calibrationVector>
</calibrationVectorList></calibration>"#;

    const NOISE: &str = r#"<noise><noiseRangeVectorList count="1">
  <noiseRangeVector><line>0</line><pixel>0 4</pixel><noiseRangeLut>8 32</noiseRangeLut></noiseRangeVector>
</noiseRangeVectorList></noise>"#;

    fn docs() -> SafeDocuments {
        SafeDocuments {
            manifest: MANIFEST.to_string(),
            annotation: ANNOTATION.to_string(),
            calibration: CALIBRATION.to_string(),
            noise: Some(NOISE.to_string()),
        }
    }

    #[test]
    fn manifest_fields() {
        let m = parse_manifest(MANIFEST).unwrap();
        assert_eq!(m.family.as_deref(), Some("SENTINEL-1"));
        assert_eq!(m.number.as_deref(), Some("A"));
        assert_eq!(m.orbit, Some(12345));
        assert_eq!(m.polarizations, vec!["VV", "VH"]);
        assert!(m.facility.unwrap().starts_with("Copernicus"));
    }

    #[test]
    fn detected_scene_uses_squared_sigma_table() {
        let scene = normalize(&docs()).unwrap();
        assert_eq!(scene.product_name, "20210601_053012_s1a_iw_vx");
        assert_eq!(scene.columns, 5);
        assert_eq!(scene.bits_per_sample, 16);
        // A = 2, 2.5, 3, 3.5, 4 from the line-0 vector
        assert_eq!(scene.calibration.gain, vec![4.0, 6.25, 9.0, 12.25, 16.0]);
        assert_relative_eq!(scene.noise[0], 2.0);
        assert_relative_eq!(scene.noise[4], 2.0);
        assert_eq!(scene.incidence, vec![30.0, 32.5, 35.0, 37.5, 40.0]);
        assert_eq!(scene.gcps.len(), 4);
        assert_eq!(scene.orbit, Some(12345));
        assert_eq!(scene.range_looks, Some(5.0));
        assert_eq!(scene.pass_direction, Some(PassDirection::Descending));
    }

    #[test]
    fn complex_scene_keeps_sigma_table() {
        let mut docs = docs();
        docs.annotation = docs.annotation.replace("Detected", "Complex");
        let scene = normalize(&docs).unwrap();
        assert_eq!(scene.sample_type, SampleType::Complex);
        assert_eq!(scene.calibration.gain, vec![2.0, 2.5, 3.0, 3.5, 4.0]);
    }

    #[test]
    fn missing_calibration_vector_is_reported() {
        let mut docs = docs();
        docs.calibration = "<calibration/>".to_string();
        assert!(matches!(
            normalize(&docs),
            Err(MetadataError::MissingField {
                field: "sigmaNought",
                ..
            })
        ));
    }
}
