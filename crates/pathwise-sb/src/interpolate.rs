//! Displacement interpolation along a coupling.

use serde::Serialize;

use crate::error::SinkhornError;

/// Positions of every source point at time `t`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Frame {
    /// Interpolation time in `[0, 1]`.
    pub t: f64,
    /// One position per source point.
    pub positions: Vec<Vec<f64>>,
}

/// Barycentric image of each source point under a row-major coupling.
///
/// Row `i` maps to `sum_j pi_ij y_j / sum_j pi_ij`. If the row mass has
/// underflowed to zero the row's largest entry (first on ties) picks a
/// single target instead.
pub fn barycentric(
    coupling: &[f64],
    target_points: &[Vec<f64>],
    rows: usize,
    cols: usize,
) -> Result<Vec<Vec<f64>>, SinkhornError> {
    if coupling.len() != rows * cols {
        return Err(SinkhornError::DimensionMismatch {
            what: "coupling entries",
            expected: rows * cols,
            actual: coupling.len(),
        });
    }
    if target_points.len() != cols {
        return Err(SinkhornError::DimensionMismatch {
            what: "target points",
            expected: cols,
            actual: target_points.len(),
        });
    }
    if cols == 0 {
        return Err(SinkhornError::InvalidConfig {
            reason: "coupling has no target columns".into(),
        });
    }
    let dim = target_points.first().map_or(0, Vec::len);

    let mut images = Vec::with_capacity(rows);
    for row in coupling.chunks(cols) {
        let mass: f64 = row.iter().sum();
        if mass > 0.0 && mass.is_finite() {
            let mut image = vec![0.0; dim];
            for (p, y) in row.iter().zip(target_points) {
                for (acc, yk) in image.iter_mut().zip(y) {
                    *acc += p * yk;
                }
            }
            image.iter_mut().for_each(|v| *v /= mass);
            images.push(image);
        } else {
            let best = row
                .iter()
                .enumerate()
                .fold(0, |best, (j, p)| if *p > row[best] { j } else { best });
            images.push(target_points.get(best).cloned().unwrap_or_default());
        }
    }
    Ok(images)
}

/// Frames `(1 - t) x_i + t T(x_i)` for each requested time, where `T`
/// is the barycentric map of `coupling`.
///
/// All times are validated before any frame is built.
pub fn interpolate(
    coupling: &[f64],
    source: &[Vec<f64>],
    target: &[Vec<f64>],
    times: &[f64],
) -> Result<Vec<Frame>, SinkhornError> {
    if let Some(&t) = times.iter().find(|t| !(0.0..=1.0).contains(*t)) {
        return Err(SinkhornError::InvalidTime(t));
    }
    let images = barycentric(coupling, target, source.len(), target.len())?;
    if let Some((x, y)) = source.iter().zip(&images).find(|(x, y)| x.len() != y.len()) {
        return Err(SinkhornError::DimensionMismatch {
            what: "target point dimension",
            expected: x.len(),
            actual: y.len(),
        });
    }

    Ok(times
        .iter()
        .map(|&t| Frame {
            t,
            positions: source
                .iter()
                .zip(&images)
                .map(|(x, y)| x.iter().zip(y).map(|(a, b)| (1.0 - t) * a + t * b).collect())
                .collect(),
        })
        .collect())
}
