//! Ramer–Douglas–Peucker route simplification.
//!
//! The divide-and-conquer runs on an explicit stack of index ranges instead of
//! recursion; routes can exceed 10,000 points. Worst case is O(n²), typical GPS
//! tracks (low curvature) behave like O(n log n).
//!
//! Simplification produces display copies only. The stored route stays dense.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};
use crate::geo_utils::perpendicular_distance;
use crate::route::validate_coordinates;
use crate::GeoPoint;

/// Tolerance presets by use case.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum SimplifyTolerance {
    /// List thumbnails (10 m)
    Coarse,
    /// Interactive map display (5 m)
    #[default]
    Standard,
    /// Detailed analysis views (2 m)
    Fine,
    /// Caller-chosen tolerance in meters
    Custom { meters: f64 },
}

impl SimplifyTolerance {
    /// Tolerance in meters.
    pub fn meters(&self) -> f64 {
        match self {
            SimplifyTolerance::Coarse => 10.0,
            SimplifyTolerance::Standard => 5.0,
            SimplifyTolerance::Fine => 2.0,
            SimplifyTolerance::Custom { meters } => *meters,
        }
    }
}

/// Simplify a route, always keeping its first and last point.
///
/// Inputs with two or fewer points are returned unchanged.
///
/// # Errors
/// - [`TrackError::InvalidTolerance`] when `tolerance_m` is not a positive finite number
/// - [`TrackError::InvalidCoordinates`] for a non-finite or out-of-range point
///
/// # Example
/// ```
/// use pacetrack::GeoPoint;
/// use pacetrack::simplify::simplify;
///
/// let line: Vec<GeoPoint> = (0..100)
///     .map(|i| GeoPoint::new(47.0 + i as f64 * 0.0001, 8.0, 400.0, i * 1000))
///     .collect();
/// let simplified = simplify(&line, 5.0).unwrap();
/// assert_eq!(simplified.len(), 2);
/// ```
pub fn simplify(points: &[GeoPoint], tolerance_m: f64) -> Result<Vec<GeoPoint>> {
    let indices = simplify_indices(points, tolerance_m)?;
    Ok(indices.into_iter().map(|i| points[i]).collect())
}

/// Simplify using a preset tolerance.
pub fn simplify_with(points: &[GeoPoint], tolerance: SimplifyTolerance) -> Result<Vec<GeoPoint>> {
    simplify(points, tolerance.meters())
}

/// Indices of the points kept by [`simplify`], ascending.
pub fn simplify_indices(points: &[GeoPoint], tolerance_m: f64) -> Result<Vec<usize>> {
    if !tolerance_m.is_finite() || tolerance_m <= 0.0 {
        return Err(TrackError::InvalidTolerance { tolerance_m });
    }
    validate_coordinates(points)?;

    let n = points.len();
    if n <= 2 {
        return Ok((0..n).collect());
    }

    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;

    let mut stack: Vec<(usize, usize)> = vec![(0, n - 1)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }

        let first = &points[start];
        let last = &points[end];

        let mut max_distance = 0.0;
        let mut max_index = start;
        for (offset, point) in points[start + 1..end].iter().enumerate() {
            let distance = perpendicular_distance(point, first, last);
            if distance > max_distance {
                max_distance = distance;
                max_index = start + 1 + offset;
            }
        }

        if max_distance > tolerance_m {
            keep[max_index] = true;
            stack.push((start, max_index));
            stack.push((max_index, end));
        }
    }

    let kept: Vec<usize> = keep
        .iter()
        .enumerate()
        .filter_map(|(i, &k)| k.then_some(i))
        .collect();

    debug!(
        "[Simplify] {} -> {} points at {:.1}m tolerance",
        n,
        kept.len(),
        tolerance_m
    );

    Ok(kept)
}
