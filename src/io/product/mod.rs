//! Metadata normalization: one pure function per dialect turns a raw field
//! source into `SceneMetadata`.
//!
//! Binary dialects are read through `io::ceos` into `MetadataFields`; XML
//! dialects keep their documents as strings and are parsed with quick-xml
//! event loops.
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::io::ceos::{FieldValue, MetadataFields, SchemaRegistry, read_fields};
use crate::metadata::{MetadataError, SceneMetadata};
use crate::types::Dialect;

pub mod cdpf;
pub mod ceos;
pub mod rs2;
pub mod safe;

#[cfg(test)]
pub(crate) mod fixtures;

/// RADARSAT-2 product documents.
#[derive(Clone, Debug)]
pub struct Rs2Documents {
    pub product: String,
    /// `lutSigma.xml`
    pub lut_sigma: String,
}

/// Sentinel-1 SAFE documents for one polarization.
#[derive(Clone, Debug)]
pub struct SafeDocuments {
    pub manifest: String,
    pub annotation: String,
    pub calibration: String,
    pub noise: Option<String>,
}

/// Raw metadata of one scene, tagged by dialect.
#[derive(Clone, Debug)]
pub enum RawSource {
    Ceos(MetadataFields),
    Cdpf(MetadataFields),
    Rs2(Rs2Documents),
    Safe(SafeDocuments),
}

impl RawSource {
    pub fn dialect(&self) -> Dialect {
        match self {
            RawSource::Ceos(_) => Dialect::Ceos,
            RawSource::Cdpf(_) => Dialect::Cdpf,
            RawSource::Rs2(_) => Dialect::Rs2,
            RawSource::Safe(_) => Dialect::Safe,
        }
    }
}

/// Dispatch to the dialect's normalizer.
pub fn normalize(source: &RawSource) -> Result<SceneMetadata, MetadataError> {
    let scene = match source {
        RawSource::Ceos(fields) => ceos::normalize(fields)?,
        RawSource::Cdpf(fields) => cdpf::normalize(fields)?,
        RawSource::Rs2(docs) => rs2::normalize(docs)?,
        RawSource::Safe(docs) => safe::normalize(docs)?,
    };
    info!(
        "Normalized {} scene {} ({}x{}, {} GCPs)",
        scene.dialect,
        scene.product_name,
        scene.columns,
        scene.rows,
        scene.gcps.len()
    );
    Ok(scene)
}

/// Load the raw metadata of a product.
///
/// - CEOS: every file of the product (leader, trailer, image file), in any order
/// - CDPF: the product file
/// - RS2: the product directory (with `product.xml` and `lutSigma.xml`)
/// - SAFE: the `.SAFE` directory; `polarization` selects the annotation set
///   (first one found when `None`)
pub fn load_source(
    dialect: Dialect,
    paths: &[PathBuf],
    polarization: Option<&str>,
) -> Result<RawSource, MetadataError> {
    let first = paths.first().ok_or(MetadataError::MissingField {
        dialect,
        field: "input path",
    })?;
    match dialect {
        Dialect::Ceos | Dialect::Cdpf => {
            let registry = SchemaRegistry::for_dialect(dialect)?;
            let fields = read_fields(paths, &registry)?;
            Ok(if dialect == Dialect::Ceos {
                RawSource::Ceos(fields)
            } else {
                RawSource::Cdpf(fields)
            })
        }
        Dialect::Rs2 => Ok(RawSource::Rs2(Rs2Documents {
            product: fs::read_to_string(first.join("product.xml"))?,
            lut_sigma: fs::read_to_string(first.join("lutSigma.xml"))?,
        })),
        Dialect::Safe => load_safe(first, polarization),
    }
}

fn load_safe(dir: &Path, polarization: Option<&str>) -> Result<RawSource, MetadataError> {
    let missing = |field| MetadataError::MissingField {
        dialect: Dialect::Safe,
        field,
    };
    let annotation = pick_xml(&dir.join("annotation"), None, polarization)?
        .ok_or_else(|| missing("annotation"))?;
    let calibration_dir = dir.join("annotation").join("calibration");
    let calibration = pick_xml(&calibration_dir, Some("calibration-"), polarization)?
        .ok_or_else(|| missing("calibration"))?;
    let noise = pick_xml(&calibration_dir, Some("noise-"), polarization)?;
    debug!("SAFE annotation {:?}, calibration {:?}", annotation, calibration);
    Ok(RawSource::Safe(SafeDocuments {
        manifest: fs::read_to_string(dir.join("manifest.safe"))?,
        annotation: fs::read_to_string(&annotation)?,
        calibration: fs::read_to_string(&calibration)?,
        noise: noise.map(fs::read_to_string).transpose()?,
    }))
}

/// First (sorted) `.xml` file in `dir` whose name starts with `prefix` and
/// contains `-<pol>-`.
fn pick_xml(
    dir: &Path,
    prefix: Option<&str>,
    polarization: Option<&str>,
) -> Result<Option<PathBuf>, MetadataError> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let pol_tag = polarization.map(|p| format!("-{}-", p.to_ascii_lowercase()));
    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            let Some(name) = p.file_name().and_then(|n| n.to_str()) else {
                return false;
            };
            let name = name.to_ascii_lowercase();
            name.ends_with(".xml")
                && prefix.is_none_or(|pre| name.starts_with(pre))
                && pol_tag.as_deref().is_none_or(|tag| name.contains(tag))
        })
        .collect();
    candidates.sort();
    Ok(candidates.into_iter().next())
}

/// Typed access to decoded binary fields with dialect-tagged errors.
pub(crate) struct FieldReader<'a> {
    pub fields: &'a MetadataFields,
    pub dialect: Dialect,
}

impl<'a> FieldReader<'a> {
    pub fn new(fields: &'a MetadataFields, dialect: Dialect) -> Self {
        Self { fields, dialect }
    }

    fn missing(&self, field: &'static str) -> MetadataError {
        MetadataError::MissingField {
            dialect: self.dialect,
            field,
        }
    }

    pub fn invalid(&self, field: &'static str, value: impl ToString) -> MetadataError {
        MetadataError::InvalidField {
            dialect: self.dialect,
            field,
            value: value.to_string(),
        }
    }

    pub fn text(&self, name: &'static str) -> Result<&'a str, MetadataError> {
        self.opt_text(name).ok_or_else(|| self.missing(name))
    }

    pub fn opt_text(&self, name: &str) -> Option<&'a str> {
        self.fields.get(name).and_then(FieldValue::as_str)
    }

    pub fn int(&self, name: &'static str) -> Result<i64, MetadataError> {
        self.fields
            .get(name)
            .and_then(FieldValue::as_i64)
            .ok_or_else(|| self.missing(name))
    }

    pub fn float(&self, name: &'static str) -> Result<f64, MetadataError> {
        self.opt_float(name).ok_or_else(|| self.missing(name))
    }

    pub fn opt_float(&self, name: &str) -> Option<f64> {
        self.fields.get(name).and_then(FieldValue::as_f64)
    }

    /// Non-negative count or dimension.
    pub fn count(&self, name: &'static str) -> Result<usize, MetadataError> {
        let v = self.int(name)?;
        usize::try_from(v).map_err(|_| self.invalid(name, v))
    }

    pub fn floats(&self, name: &'static str) -> Result<Vec<f64>, MetadataError> {
        self.fields
            .get(name)
            .and_then(FieldValue::to_f64_vec)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| self.missing(name))
    }

    pub fn texts(&self, name: &'static str) -> Vec<String> {
        self.fields
            .get(name)
            .and_then(FieldValue::to_string_vec)
            .unwrap_or_default()
    }
}

/// Split a polarization list such as `"HH HV"`, `"HH+HV"` or `"HH,HV"`.
pub(crate) fn split_polarizations(raw: &str) -> Vec<String> {
    raw.split(|c: char| c.is_whitespace() || c == ',' || c == '+' || c == '/')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_ascii_uppercase())
        .collect()
}

/// Space-separated numeric list as used throughout the XML dialects.
pub(crate) fn parse_number_list(
    raw: &str,
    dialect: Dialect,
    field: &'static str,
) -> Result<Vec<f64>, MetadataError> {
    raw.split_whitespace()
        .map(|tok| {
            tok.parse::<f64>().map_err(|_| MetadataError::InvalidField {
                dialect,
                field,
                value: tok.to_string(),
            })
        })
        .collect()
}

pub(crate) fn parse_number<T: std::str::FromStr>(
    raw: &str,
    dialect: Dialect,
    field: &'static str,
) -> Result<T, MetadataError> {
    raw.trim().parse::<T>().map_err(|_| MetadataError::InvalidField {
        dialect,
        field,
        value: raw.to_string(),
    })
}
