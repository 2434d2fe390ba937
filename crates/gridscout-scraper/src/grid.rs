//! Geographic grid generation for systematic area sweeps.
//!
//! Latitude step is constant; longitude step is widened by `1 / cos(center)`
//! so columns stay roughly `spacing_km` apart on the ground.

use gridscout_core::{BoundingBox, GridPoint};
use thiserror::Error;

pub const KM_PER_LAT_DEGREE: f64 = 110.574;
pub const KM_PER_LNG_DEGREE_AT_EQUATOR: f64 = 111.320;

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("bounds must be ordered with latitude in [-90, 90] and longitude in [-180, 180]")]
    InvalidBounds,

    #[error("grid spacing must be a positive number of kilometres, got {0}")]
    InvalidSpacing(f64),

    #[error("search grid of {rows} x {cols} points exceeds the limit of {limit}")]
    TooLarge { rows: usize, cols: usize, limit: usize },
}

/// Row and column counts of a grid, known before any point is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GridShape {
    rows: usize,
    cols: usize,
}

impl GridShape {
    /// `None` when `rows * cols` does not fit in `usize`.
    fn point_count(self) -> Option<usize> {
        self.rows.checked_mul(self.cols)
    }
}

struct Steps {
    shape: GridShape,
    lat_step: f64,
    lng_step: f64,
}

fn plan(bounds: &BoundingBox, spacing_km: f64, center_lat: f64) -> Result<Steps, GridError> {
    if !bounds.is_valid() {
        return Err(GridError::InvalidBounds);
    }
    if !spacing_km.is_finite() || spacing_km <= 0.0 {
        return Err(GridError::InvalidSpacing(spacing_km));
    }

    let lat_step = spacing_km / KM_PER_LAT_DEGREE;
    let lng_step = spacing_km / (KM_PER_LNG_DEGREE_AT_EQUATOR * center_lat.to_radians().cos());

    let rows = steps_within(bounds.min_lat, bounds.max_lat, lat_step);
    // Near the poles cos() collapses to ~0 and the step blows up; one column covers it.
    let cols = if lng_step.is_finite() && lng_step > 0.0 {
        steps_within(bounds.min_lng, bounds.max_lng, lng_step)
    } else {
        1
    };

    Ok(Steps {
        shape: GridShape { rows, cols },
        lat_step,
        lng_step,
    })
}

/// Generate a row-major grid of sample points across `bounds`.
///
/// Starts at `(min_lat, min_lng)` and emits every `(lat, lng)` with
/// `lat <= max_lat` and `lng <= max_lng`. Coordinates are computed as
/// `min + index * step` so the sequence is identical for identical inputs.
///
/// # Errors
///
/// - [`GridError::InvalidBounds`]: inverted, non-finite or out-of-range bounds.
/// - [`GridError::InvalidSpacing`]: non-positive or non-finite spacing.
/// - [`GridError::TooLarge`]: more than `max_points` points. Checked before
///   the point buffer is allocated.
pub fn generate_grid(
    bounds: &BoundingBox,
    spacing_km: f64,
    center_lat: f64,
    max_points: usize,
) -> Result<Vec<GridPoint>, GridError> {
    let Steps {
        shape,
        lat_step,
        lng_step,
    } = plan(bounds, spacing_km, center_lat)?;

    let count = shape
        .point_count()
        .filter(|n| *n <= max_points)
        .ok_or(GridError::TooLarge {
            rows: shape.rows,
            cols: shape.cols,
            limit: max_points,
        })?;

    let mut points = Vec::with_capacity(count);
    for row in 0..shape.rows {
        let lat = offset(bounds.min_lat, row, lat_step);
        for col in 0..shape.cols {
            let lng = offset(bounds.min_lng, col, lng_step);
            points.push(GridPoint { lat, lng });
        }
    }
    Ok(points)
}

/// Number of values `min + i * step` (i = 0, 1, ...) that stay `<= max`.
///
/// Requires `min <= max` and a finite positive `step`. The float quotient
/// saturates at `usize::MAX` and is then nudged by at most a step to absorb
/// rounding.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn steps_within(min: f64, max: f64, step: f64) -> usize {
    let quotient = ((max - min) / step).floor();
    let mut count = (quotient as usize).saturating_add(1);
    while count > 1 && offset(min, count - 1, step) > max {
        count -= 1;
    }
    if count < usize::MAX && offset(min, count, step) <= max {
        count += 1;
    }
    count
}

#[allow(clippy::cast_precision_loss)]
fn offset(origin: f64, index: usize, step: f64) -> f64 {
    origin + index as f64 * step
}
