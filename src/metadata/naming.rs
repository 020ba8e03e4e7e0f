//! Canonical product naming.
//!
//! `YYYYMMDD_HHMMSS_<satellite>_<beam>_<polarization class>`, e.g.
//! `20080312_141502_r2_scwa_hx`. The timestamp is truncated to the second.
use chrono::NaiveDateTime;

/// Short satellite code used in product names.
pub fn satellite_code(satellite: &str) -> String {
    let norm: String = satellite
        .trim()
        .to_ascii_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    match norm.as_str() {
        "RADARSAT" | "RADARSAT1" | "RSAT1" | "R1" => "r1".to_string(),
        "RADARSAT2" | "RSAT2" | "R2" => "r2".to_string(),
        "SENTINEL1A" | "S1A" => "s1a".to_string(),
        "SENTINEL1B" | "S1B" => "s1b".to_string(),
        "SENTINEL1C" | "S1C" => "s1c".to_string(),
        other => other.to_ascii_lowercase(),
    }
}

/// Fixed-precedence polarization class: quad, then HH+HV, HH, VV+VH, VV,
/// otherwise the raw list joined and lowercased.
pub fn polarization_class(polarizations: &[String]) -> String {
    let has = |p: &str| polarizations.iter().any(|x| x.trim().eq_ignore_ascii_case(p));
    let quad = has("HH") && has("HV") && has("VH") && has("VV");
    if quad {
        "qp".to_string()
    } else if has("HH") && has("HV") {
        "hx".to_string()
    } else if has("HH") {
        "hh".to_string()
    } else if has("VV") && has("VH") {
        "vx".to_string()
    } else if has("VV") {
        "vv".to_string()
    } else {
        polarizations
            .iter()
            .map(|p| p.trim().to_ascii_lowercase())
            .collect::<Vec<_>>()
            .join("")
    }
}

pub fn product_name(
    acquisition: &NaiveDateTime,
    satellite: &str,
    beam_mode: &str,
    polarizations: &[String],
) -> String {
    format!(
        "{}_{}_{}_{}",
        acquisition.format("%Y%m%d_%H%M%S"),
        satellite_code(satellite),
        beam_mode.trim().to_ascii_lowercase(),
        polarization_class(polarizations)
    )
}
