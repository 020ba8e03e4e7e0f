//! Expansion of sparsely sampled calibration tables to one value per column.

/// Linearly interpolate `values`, sampled at columns `first_pixel + k * step`,
/// onto columns `0..columns`. Columns outside the sampled span take the
/// nearest end value. A single sample is broadcast.
pub fn expand(values: &[f64], first_pixel: f64, step: f64, columns: usize) -> Vec<f64> {
    match values {
        [] => vec![0.0; columns],
        [only] => vec![*only; columns],
        _ if step <= 0.0 || !step.is_finite() => {
            // Degenerate grid: treat the table as already per-column.
            (0..columns)
                .map(|c| values[c.min(values.len() - 1)])
                .collect()
        }
        _ => {
            let last = values.len() - 1;
            (0..columns)
                .map(|c| {
                    let pos = (c as f64 - first_pixel) / step;
                    if pos <= 0.0 {
                        values[0]
                    } else if pos >= last as f64 {
                        values[last]
                    } else {
                        let k = pos.floor() as usize;
                        let frac = pos - k as f64;
                        values[k] + (values[k + 1] - values[k]) * frac
                    }
                })
                .collect()
        }
    }
}

/// Piecewise-linear interpolation of `values` sampled at increasing column
/// `positions` onto columns `0..columns`, clamped at both ends.
pub fn interpolate(positions: &[f64], values: &[f64], columns: usize) -> Vec<f64> {
    let n = positions.len().min(values.len());
    match n {
        0 => return vec![0.0; columns],
        1 => return vec![values[0]; columns],
        _ => {}
    }
    let mut k = 0;
    (0..columns)
        .map(|c| {
            let x = c as f64;
            if x <= positions[0] {
                return values[0];
            }
            if x >= positions[n - 1] {
                return values[n - 1];
            }
            while k + 1 < n - 1 && positions[k + 1] <= x {
                k += 1;
            }
            let span = positions[k + 1] - positions[k];
            if span <= 0.0 {
                return values[k + 1];
            }
            values[k] + (values[k + 1] - values[k]) * (x - positions[k]) / span
        })
        .collect()
}

/// Linear interpolation between a near-range and a far-range value across
/// `columns`, inclusive at both ends.
pub fn ramp(near: f64, far: f64, columns: usize) -> Vec<f64> {
    match columns {
        0 => Vec::new(),
        1 => vec![near],
        n => (0..n)
            .map(|c| near + (far - near) * c as f64 / (n - 1) as f64)
            .collect(),
    }
}

pub fn db_to_linear(db: f64) -> f64 {
    10f64.powf(db / 10.0)
}
