//! GCP validation, corner selection and reference-system checks.
//!
//! The GCP set must span the raster exactly: with `o` the dialect's
//! half-pixel offset, `max(line) + 0.5 == rows - o` and
//! `min(line) + 0.5 == 1 - o`, and likewise for pixels. The GCPs found at
//! the four extrema combinations become the scene's corners.
use thiserror::Error;
use tracing::{debug, info};

use crate::metadata::scene::{WGS84_SEMI_MAJOR, WGS84_SEMI_MINOR};
use crate::metadata::{CornerPolygon, Gcp, SceneMetadata};
use crate::types::{Dialect, GcpFlipPolicy, PassDirection};

/// Reference system validated GCPs are expressed in.
pub const TARGET_SRS: &str = "EPSG:4326";
/// Allowed difference, in metres, between ellipsoid axes and WGS84's.
pub const AXIS_TOLERANCE: f64 = 1.0;
/// Allowed deviation, in degrees, of a transformed origin from the origin.
pub const IDENTITY_TOLERANCE: f64 = 1e-9;
const EXTREMA_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum GeocodingError {
    #[error("Scene has no ground control points")]
    NoGcps,
    #[error(
        "GCP {axis} extrema [{found_min}, {found_max}] do not match raster extent [{expected_min}, {expected_max}]"
    )]
    ExtremaMismatch {
        axis: &'static str,
        found_min: f64,
        found_max: f64,
        expected_min: f64,
        expected_max: f64,
    },
    #[error("No GCP at the {0} corner")]
    MissingCorner(&'static str),
    #[error("Cannot determine the GCP reference system: {0}")]
    UnresolvableReference(String),
    #[error("GCPs in unexpected reference system: {0}")]
    UnexpectedReference(String),
    #[error("Geometry service error: {0}")]
    Geometry(String),
}

/// Geometry collaborator: reference-system comparison, point transforms and
/// polygon text.
pub trait GeometryService {
    /// Nominal equality of two reference-system definitions.
    fn is_same(&self, a: &str, b: &str) -> Result<bool, GeocodingError>;

    /// Transform one `(x, y)` point (lon/lat order for geographic systems).
    fn transform_coordinate(
        &self,
        from: &str,
        to: &str,
        point: (f64, f64),
    ) -> Result<(f64, f64), GeocodingError>;

    fn build_polygon(&self, corners: &CornerPolygon) -> String {
        corners.wkt()
    }
}

/// Compares definitions by name only; knows that the common WGS84 spellings
/// denote the same system. Any other system is reported as unexpected.
#[derive(Copy, Clone, Debug, Default)]
pub struct NamedGeometry;

fn canonical_srs(name: &str) -> String {
    let upper: String = name
        .trim()
        .to_ascii_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ':')
        .collect();
    match upper.as_str() {
        "WGS84" | "WGS1984" | "EPSG:4326" | "EPSG4326" => "EPSG:4326".to_string(),
        _ => upper,
    }
}

impl GeometryService for NamedGeometry {
    fn is_same(&self, a: &str, b: &str) -> Result<bool, GeocodingError> {
        Ok(canonical_srs(a) == canonical_srs(b))
    }

    fn transform_coordinate(
        &self,
        from: &str,
        to: &str,
        point: (f64, f64),
    ) -> Result<(f64, f64), GeocodingError> {
        if self.is_same(from, to)? {
            Ok(point)
        } else {
            Err(GeocodingError::UnexpectedReference(format!(
                "{from}, no transform to {to}"
            )))
        }
    }
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Extent {
    pub min_pixel: f64,
    pub max_pixel: f64,
    pub min_line: f64,
    pub max_line: f64,
}

pub fn extent(gcps: &[Gcp]) -> Result<Extent, GeocodingError> {
    if gcps.is_empty() {
        return Err(GeocodingError::NoGcps);
    }
    let mut e = Extent {
        min_pixel: f64::INFINITY,
        max_pixel: f64::NEG_INFINITY,
        min_line: f64::INFINITY,
        max_line: f64::NEG_INFINITY,
    };
    for g in gcps {
        e.min_pixel = e.min_pixel.min(g.pixel);
        e.max_pixel = e.max_pixel.max(g.pixel);
        e.min_line = e.min_line.min(g.line);
        e.max_line = e.max_line.max(g.line);
    }
    Ok(e)
}

fn check_axis(
    axis: &'static str,
    found_min: f64,
    found_max: f64,
    count: usize,
    offset: f64,
) -> Result<(), GeocodingError> {
    let expected_min = 1.0 - offset - 0.5;
    let expected_max = count as f64 - offset - 0.5;
    let ok = (found_min - expected_min).abs() < EXTREMA_TOLERANCE
        && (found_max - expected_max).abs() < EXTREMA_TOLERANCE;
    if ok {
        Ok(())
    } else {
        Err(GeocodingError::ExtremaMismatch {
            axis,
            found_min,
            found_max,
            expected_min,
            expected_max,
        })
    }
}

/// Verify the GCP extrema against the raster's declared size.
pub fn check_extrema(
    gcps: &[Gcp],
    columns: usize,
    rows: usize,
    dialect: Dialect,
) -> Result<Extent, GeocodingError> {
    let e = extent(gcps)?;
    let offset = dialect.gcp_offset();
    check_axis("line", e.min_line, e.max_line, rows, offset)?;
    check_axis("pixel", e.min_pixel, e.max_pixel, columns, offset)?;
    Ok(e)
}

/// Mirror pixel coordinates across the GCP extent when the policy asks for it.
pub fn apply_flip_policy(
    gcps: &[Gcp],
    policy: GcpFlipPolicy,
    pass: Option<PassDirection>,
) -> Vec<Gcp> {
    let flip = matches!(
        (policy, pass),
        (GcpFlipPolicy::DescendingPass, Some(PassDirection::Descending))
    );
    if !flip || gcps.is_empty() {
        return gcps.to_vec();
    }
    let (lo, hi) = gcps.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), g| {
        (lo.min(g.pixel), hi.max(g.pixel))
    });
    debug!("Flipping {} GCP pixel coordinates", gcps.len());
    gcps.iter()
        .map(|g| Gcp {
            pixel: lo + hi - g.pixel,
            ..*g
        })
        .collect()
}

/// GCPs at (min line, min pixel), (min line, max pixel), (max line, max pixel)
/// and (max line, min pixel), in that order. The first matching GCP in input
/// order wins, so the result is stable for a fixed GCP list.
pub fn select_corners(gcps: &[Gcp], e: &Extent) -> Result<CornerPolygon, GeocodingError> {
    let near = |a: f64, b: f64| (a - b).abs() < EXTREMA_TOLERANCE;
    let find = |line: f64, pixel: f64, name: &'static str| {
        gcps.iter()
            .find(|g| near(g.line, line) && near(g.pixel, pixel))
            .copied()
            .ok_or(GeocodingError::MissingCorner(name))
    };
    Ok(CornerPolygon {
        corners: [
            find(e.min_line, e.min_pixel, "upper-left")?,
            find(e.min_line, e.max_pixel, "upper-right")?,
            find(e.max_line, e.max_pixel, "lower-right")?,
            find(e.max_line, e.min_pixel, "lower-left")?,
        ],
    })
}

/// Confirm the GCPs are expressed in `TARGET_SRS`.
///
/// Without a declared system, the scene's ellipsoid axes must match WGS84's
/// within `AXIS_TOLERANCE`. A declared system must either be nominally the
/// same or transform the origin onto itself.
pub fn check_reference(
    scene: &SceneMetadata,
    geometry: &dyn GeometryService,
) -> Result<String, GeocodingError> {
    match &scene.gcp_srs {
        None => {
            let ellipsoid = scene.ellipsoid.as_ref().ok_or_else(|| {
                GeocodingError::UnresolvableReference(
                    "no reference system or ellipsoid in source".to_string(),
                )
            })?;
            let major_ok = (ellipsoid.semi_major - WGS84_SEMI_MAJOR).abs() <= AXIS_TOLERANCE;
            let minor_ok = (ellipsoid.semi_minor - WGS84_SEMI_MINOR).abs() <= AXIS_TOLERANCE;
            if major_ok && minor_ok {
                Ok(TARGET_SRS.to_string())
            } else {
                Err(GeocodingError::UnexpectedReference(format!(
                    "ellipsoid {} ({} m, {} m)",
                    ellipsoid.name, ellipsoid.semi_major, ellipsoid.semi_minor
                )))
            }
        }
        Some(srs) => {
            if geometry.is_same(srs, TARGET_SRS)? {
                return Ok(TARGET_SRS.to_string());
            }
            let (x, y) = geometry.transform_coordinate(srs, TARGET_SRS, (0.0, 0.0))?;
            if x.abs() <= IDENTITY_TOLERANCE && y.abs() <= IDENTITY_TOLERANCE {
                debug!("Reference {} is equivalent to {}", srs, TARGET_SRS);
                Ok(TARGET_SRS.to_string())
            } else {
                Err(GeocodingError::UnexpectedReference(srs.clone()))
            }
        }
    }
}

/// Validate a scene's GCPs against a raster of `columns` x `rows` and attach
/// the resulting corners.
pub fn geocode(
    scene: SceneMetadata,
    columns: usize,
    rows: usize,
    geometry: &dyn GeometryService,
    policy: GcpFlipPolicy,
) -> Result<SceneMetadata, GeocodingError> {
    let gcps = apply_flip_policy(&scene.gcps, policy, scene.pass_direction);
    let extent = check_extrema(&gcps, columns, rows, scene.dialect)?;
    let corners = select_corners(&gcps, &extent)?;
    let srs = check_reference(&scene, geometry)?;
    info!(
        "Geocoded {}: {}",
        scene.product_name,
        geometry.build_polygon(&corners)
    );
    Ok(scene.into_geocoded(corners, srs))
}

/// Affine geotransform (GDAL order) from the upper-left, upper-right and
/// lower-left corners. GCP positions are shifted by the dialect offset so
/// they refer to the pixel-corner grid.
pub fn geotransform(corners: &CornerPolygon, dialect: Dialect) -> [f64; 6] {
    let o = dialect.gcp_offset();
    let (ul, ur, ll) = (corners.upper_left(), corners.upper_right(), corners.lower_left());
    let (p0, p1) = (ul.pixel + o, ur.pixel + o);
    let (l0, l1) = (ul.line + o, ll.line + o);
    let dp = if p1 != p0 { p1 - p0 } else { 1.0 };
    let dl = if l1 != l0 { l1 - l0 } else { 1.0 };
    let gt1 = (ur.lon - ul.lon) / dp;
    let gt4 = (ur.lat - ul.lat) / dp;
    let gt2 = (ll.lon - ul.lon) / dl;
    let gt5 = (ll.lat - ul.lat) / dl;
    [
        ul.lon - p0 * gt1 - l0 * gt2,
        gt1,
        gt2,
        ul.lat - p0 * gt4 - l0 * gt5,
        gt4,
        gt5,
    ]
}
