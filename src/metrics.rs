//! Pace, grade-adjusted pace, elevation, cadence and per-kilometer splits.
//!
//! Every function here is a pure transform over a finalized point sequence.
//! Pace values outside the plausible running range are `None` throughout and
//! are never averaged or attributed. Intervals longer than
//! [`MetricsConfig::max_interval_seconds`] are GPS gaps and are excluded from
//! time and distance aggregates.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};
use crate::geo_utils::haversine_distance;
use crate::pace::{clamp_pace, pace_from_delta, valid_opt, valid_pace};
use crate::route::validate_coordinates;
use crate::{GeoPoint, Split};

/// Grades beyond ±30% are treated as altitude noise.
pub const MAX_GRADE: f64 = 0.30;

/// Distance of one split.
pub const SPLIT_DISTANCE_M: f64 = 1000.0;

/// A split closes when the accumulated distance is this close to the boundary.
const SPLIT_BOUNDARY_EPSILON_M: f64 = 0.01;

/// Configuration for the metrics engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct MetricsConfig {
    /// Samples in the centered altitude moving average.
    /// Default: 11
    pub altitude_smoothing_window: u32,
    /// Intervals longer than this are GPS gaps, not running time.
    /// Default: 60.0 seconds
    pub max_interval_seconds: f64,
    /// Routes whose altitude range is below this have no usable elevation
    /// data and get no per-point GAP series.
    /// Default: 10.0 meters
    pub min_elevation_range_m: f64,
    /// Horizontal moves shorter than this yield no grade.
    /// Default: 1.0 meter
    pub min_grade_distance_m: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            altitude_smoothing_window: 11,
            max_interval_seconds: 60.0,
            min_elevation_range_m: 10.0,
            min_grade_distance_m: 1.0,
        }
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<()> {
        if self.altitude_smoothing_window == 0 {
            return Err(TrackError::InvalidConfig {
                message: "altitude_smoothing_window must be >= 1".to_string(),
            });
        }
        if !self.max_interval_seconds.is_finite() || self.max_interval_seconds <= 0.0 {
            return Err(TrackError::InvalidConfig {
                message: format!(
                    "max_interval_seconds must be > 0, got {}",
                    self.max_interval_seconds
                ),
            });
        }
        if !self.min_elevation_range_m.is_finite() || self.min_elevation_range_m < 0.0 {
            return Err(TrackError::InvalidConfig {
                message: format!(
                    "min_elevation_range_m must be >= 0, got {}",
                    self.min_elevation_range_m
                ),
            });
        }
        if !self.min_grade_distance_m.is_finite() || self.min_grade_distance_m <= 0.0 {
            return Err(TrackError::InvalidConfig {
                message: format!(
                    "min_grade_distance_m must be > 0, got {}",
                    self.min_grade_distance_m
                ),
            });
        }
        Ok(())
    }
}

/// Cadence summary over points that carry a cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct CadenceStats {
    pub average_spm: f64,
    pub max_spm: u32,
    pub samples: u32,
}

/// Seconds between two points.
pub(crate) fn interval_seconds(a: &GeoPoint, b: &GeoPoint) -> f64 {
    (b.timestamp_ms - a.timestamp_ms) as f64 / 1000.0
}

/// Whether the interval ending at `points[i]` counts as running time.
pub(crate) fn is_counted_interval(points: &[GeoPoint], i: usize, max_interval_seconds: f64) -> bool {
    let dt = interval_seconds(&points[i - 1], &points[i]);
    (0.0..=max_interval_seconds).contains(&dt)
}

// ============================================================================
// Pace
// ============================================================================

/// Per-point instantaneous pace.
///
/// A point's own pace (device speed at capture) wins when it is plausible.
/// Otherwise pace is derived from the distance/time delta to the previous
/// point; the first point and points after a gap have no derived pace.
/// Intervals touching a point with malformed coordinates have no pace, even a
/// device-reported one.
pub fn instantaneous_paces(points: &[GeoPoint], config: &MetricsConfig) -> Vec<Option<f64>> {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            // Intervals touching a malformed fix carry no pace at all
            if !p.is_valid() || (i > 0 && !points[i - 1].is_valid()) {
                return None;
            }
            if let Some(pace) = valid_opt(p.instantaneous_pace_sec_per_km) {
                return Some(pace);
            }
            if i == 0 {
                return None;
            }
            let prev = &points[i - 1];
            let dt = interval_seconds(prev, p);
            if dt > config.max_interval_seconds {
                return None;
            }
            pace_from_delta(haversine_distance(prev, p), dt)
        })
        .collect()
}

/// Total seconds of counted intervals that end on a valid pace.
pub fn moving_time_s(points: &[GeoPoint], config: &MetricsConfig) -> f64 {
    let paces = instantaneous_paces(points, config);
    (1..points.len())
        .filter(|&i| paces[i].is_some() && is_counted_interval(points, i, config.max_interval_seconds))
        .map(|i| interval_seconds(&points[i - 1], &points[i]))
        .sum()
}

/// Mean pace over moving intervals, `None` when implausible or no movement.
pub fn average_pace(points: &[GeoPoint], config: &MetricsConfig) -> Option<f64> {
    let paces = instantaneous_paces(points, config);
    let (time, distance) = (1..points.len())
        .filter(|&i| paces[i].is_some() && is_counted_interval(points, i, config.max_interval_seconds))
        .fold((0.0, 0.0), |(t, d), i| {
            (
                t + interval_seconds(&points[i - 1], &points[i]),
                d + haversine_distance(&points[i - 1], &points[i]),
            )
        });
    if distance <= 0.0 {
        return None;
    }
    valid_pace(time / distance * 1000.0)
}

// ============================================================================
// Elevation and grade
// ============================================================================

/// Centered moving average of altitude, window truncated at the edges.
pub fn smoothed_altitudes(points: &[GeoPoint], window: u32) -> Vec<f64> {
    let n = points.len();
    if n == 0 {
        return Vec::new();
    }
    let half = (window.max(1) / 2) as usize;

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0);
    for p in points {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + p.altitude);
    }

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half).min(n - 1);
            (prefix[hi + 1] - prefix[lo]) / (hi + 1 - lo) as f64
        })
        .collect()
}

/// Whether the route has usable elevation data (altitude range above threshold).
pub fn has_elevation_data(points: &[GeoPoint], config: &MetricsConfig) -> bool {
    let (min, max) = points
        .iter()
        .map(|p| p.altitude)
        .filter(|a| a.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), a| {
            (lo.min(a), hi.max(a))
        });
    max.is_finite() && max - min >= config.min_elevation_range_m
}

/// Per-point grade (fraction) from the previous point, clamped to ±30%.
///
/// `smoothed` must come from [`smoothed_altitudes`] for the same points.
pub fn grades(points: &[GeoPoint], smoothed: &[f64], config: &MetricsConfig) -> Vec<Option<f64>> {
    (0..points.len())
        .map(|i| {
            if i == 0 {
                return None;
            }
            let distance = haversine_distance(&points[i - 1], &points[i]);
            if distance < config.min_grade_distance_m {
                return None;
            }
            let grade = (smoothed[i] - smoothed[i - 1]) / distance;
            grade.is_finite().then(|| grade.clamp(-MAX_GRADE, MAX_GRADE))
        })
        .collect()
}

/// Metabolic cost multiplier for a grade (fraction).
///
/// `1 + 0.033·G + 0.00012·G²` with `G` in percent, grade clamped to ±30%.
/// Uphill raises it above 1, downhill lowers it. The quadratic term softens the
/// downhill discount as descents steepen, so a -30% grade gives 0.118 rather
/// than the linear 0.01. The factor stays below 1 for every descent in range.
pub fn gap_factor(grade: f64) -> f64 {
    let g = grade.clamp(-MAX_GRADE, MAX_GRADE) * 100.0;
    1.0 + 0.033 * g + 0.00012 * g * g
}

/// Grade-adjusted pace for one valid pace, clamped into the plausible range.
pub fn grade_adjusted_pace(pace_sec_per_km: f64, grade: f64) -> f64 {
    clamp_pace(pace_sec_per_km * gap_factor(grade))
}

/// Apply [`grade_adjusted_pace`] to aligned pace and grade series.
///
/// Missing grades count as flat; missing paces stay missing.
pub fn apply_grade_adjustment(paces: &[Option<f64>], grades: &[Option<f64>]) -> Vec<Option<f64>> {
    paces
        .iter()
        .zip(grades.iter())
        .map(|(pace, grade)| {
            valid_opt(*pace).map(|p| grade_adjusted_pace(p, grade.unwrap_or(0.0)))
        })
        .collect()
}

/// Per-point GAP series, or `None` when the route has no usable elevation data.
pub fn grade_adjusted_paces(points: &[GeoPoint], config: &MetricsConfig) -> Option<Vec<Option<f64>>> {
    if !has_elevation_data(points, config) {
        debug!("[Metrics] No usable elevation data, GAP suppressed");
        return None;
    }
    let smoothed = smoothed_altitudes(points, config.altitude_smoothing_window);
    let grade_series = grades(points, &smoothed, config);
    let paces = instantaneous_paces(points, config);
    Some(apply_grade_adjustment(&paces, &grade_series))
}

/// Total ascent: sum of positive smoothed-altitude deltas.
pub fn elevation_gain(points: &[GeoPoint], config: &MetricsConfig) -> f64 {
    smoothed_altitudes(points, config.altitude_smoothing_window)
        .windows(2)
        .map(|w| (w[1] - w[0]).max(0.0))
        .sum()
}

/// Total descent as a positive number.
pub fn elevation_loss(points: &[GeoPoint], config: &MetricsConfig) -> f64 {
    smoothed_altitudes(points, config.altitude_smoothing_window)
        .windows(2)
        .map(|w| (w[0] - w[1]).max(0.0))
        .sum()
}

// ============================================================================
// Cadence
// ============================================================================

/// Cadence summary, `None` when no point carries a cadence.
pub fn cadence_stats(points: &[GeoPoint]) -> Option<CadenceStats> {
    let cadences: Vec<u32> = points
        .iter()
        .filter_map(|p| p.cadence_spm)
        .filter(|&c| c > 0)
        .collect();
    if cadences.is_empty() {
        return None;
    }
    let sum: u64 = cadences.iter().map(|&c| c as u64).sum();
    Some(CadenceStats {
        average_spm: sum as f64 / cadences.len() as f64,
        max_spm: cadences.iter().copied().max().unwrap_or(0),
        samples: cadences.len() as u32,
    })
}

// ============================================================================
// Splits
// ============================================================================

/// Per-kilometer splits.
///
/// Each split closes exactly at its kilometer boundary; the interval crossing
/// the boundary is divided proportionally by distance. Gap intervals add
/// neither time nor distance. A trailing partial kilometer is not reported.
///
/// With usable elevation data a split carries a GAP (time-weighted GAP factor)
/// and its net grade. Without it the grade is `None` and the GAP equals the
/// split pace, since the route is treated as flat.
///
/// # Errors
/// [`TrackError::InvalidCoordinates`] or [`TrackError::InvalidAltitude`] for a
/// malformed point.
pub fn splits(points: &[GeoPoint], config: &MetricsConfig) -> Result<Vec<Split>> {
    validate_coordinates(points)?;
    if points.len() < 2 {
        return Ok(Vec::new());
    }

    let elevation = has_elevation_data(points, config);
    let smoothed = smoothed_altitudes(points, config.altitude_smoothing_window);
    let grade_series = if elevation {
        grades(points, &smoothed, config)
    } else {
        vec![None; points.len()]
    };

    let mut result = Vec::new();
    let mut distance = 0.0;
    let mut boundary = SPLIT_DISTANCE_M;
    let mut split_seconds = 0.0;
    let mut adjusted_seconds = 0.0;
    let mut split_start_alt = smoothed[0];

    for i in 1..points.len() {
        if !is_counted_interval(points, i, config.max_interval_seconds) {
            continue;
        }
        let dt = interval_seconds(&points[i - 1], &points[i]);
        let d = haversine_distance(&points[i - 1], &points[i]);
        let factor = grade_series[i].map_or(1.0, gap_factor);
        let segment_end = distance + d;

        let mut done = 0.0;
        while d > 0.0 && segment_end >= boundary - SPLIT_BOUNDARY_EPSILON_M {
            let frac = ((boundary - distance) / d).clamp(done, 1.0);
            let part = frac - done;
            split_seconds += part * dt;
            adjusted_seconds += part * dt * factor;

            let alt = smoothed[i - 1] + frac * (smoothed[i] - smoothed[i - 1]);
            let pace = valid_pace(split_seconds * 1000.0 / SPLIT_DISTANCE_M);
            let gap = pace.map(|_| clamp_pace(adjusted_seconds * 1000.0 / SPLIT_DISTANCE_M));
            result.push(Split {
                km: result.len() as i32 + 1,
                pace_sec_per_km: pace,
                grade_adjusted_pace_sec_per_km: gap,
                avg_grade_percent: elevation
                    .then(|| (alt - split_start_alt) / SPLIT_DISTANCE_M * 100.0),
            });

            split_seconds = 0.0;
            adjusted_seconds = 0.0;
            split_start_alt = alt;
            done = frac;
            boundary += SPLIT_DISTANCE_M;
        }

        let rest = 1.0 - done;
        split_seconds += rest * dt;
        adjusted_seconds += rest * dt * factor;
        distance = segment_end;
    }

    debug!(
        "[Metrics] {} splits over {:.0}m (elevation data: {})",
        result.len(),
        distance,
        elevation
    );

    Ok(result)
}
