//! Automatic lap detection for free runs.
//!
//! Splits a route into alternating fast and recovery laps from its per-point
//! effort (grade-adjusted pace when elevation data exists, otherwise plain
//! pace):
//!
//! 1. Smooth the effort series with a centered moving average
//! 2. Split the smoothed values into a fast and a slow cluster (1-D 2-means);
//!    the midpoint between the cluster means is the recovery threshold
//! 3. Give up when the clusters are closer than the noise threshold (uniform effort)
//! 4. Cut the route where points cross the threshold, merge laps that are too
//!    short into their neighbours
//! 5. Classify each lap as recovery when its mean effort exceeds the threshold
//!
//! An empty result means "no clear fast/slow alternation"; callers should fall
//! back to per-kilometer splits. It is not an error.
//!
//! The defaults in [`LapConfig`] are empirical starting points, not a contract.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};
use crate::geo_utils::haversine_distance;
use crate::metrics::{
    grade_adjusted_paces, instantaneous_paces, interval_seconds, is_counted_interval,
    MetricsConfig,
};
use crate::pace::{valid_opt, valid_pace};
use crate::route::validate_coordinates;
use crate::{DetectedLap, GeoPoint};

/// Maximum 2-means refinement rounds.
const MAX_CLUSTER_ITERATIONS: usize = 50;

/// Configuration for lap detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct LapConfig {
    /// Points in the centered effort moving average.
    /// Default: 15 (~15 s at 1 Hz)
    pub smoothing_window: u32,
    /// Minimum gap between fast and slow cluster means, relative to the
    /// overall mean effort, for the run to count as intervals.
    /// Default: 0.10 (10%)
    pub min_effort_delta: f64,
    /// Laps with less moving time are merged into a neighbour.
    /// Default: 30.0 seconds
    pub min_lap_seconds: f64,
    /// Laps with less moving distance are merged into a neighbour.
    /// Default: 100.0 meters
    pub min_lap_meters: f64,
    /// Routes with fewer valid effort samples produce no laps.
    /// Default: 30
    pub min_valid_points: u32,
    /// Use grade-adjusted pace as effort when elevation data exists.
    /// Default: true
    pub use_grade_adjusted: bool,
}

impl Default for LapConfig {
    fn default() -> Self {
        Self {
            smoothing_window: 15,
            min_effort_delta: 0.10,
            min_lap_seconds: 30.0,
            min_lap_meters: 100.0,
            min_valid_points: 30,
            use_grade_adjusted: true,
        }
    }
}

impl LapConfig {
    pub fn validate(&self) -> Result<()> {
        if self.smoothing_window == 0 {
            return Err(TrackError::InvalidConfig {
                message: "smoothing_window must be >= 1".to_string(),
            });
        }
        if !self.min_effort_delta.is_finite() || self.min_effort_delta < 0.0 {
            return Err(TrackError::InvalidConfig {
                message: format!("min_effort_delta must be >= 0, got {}", self.min_effort_delta),
            });
        }
        if !self.min_lap_seconds.is_finite() || self.min_lap_seconds < 0.0 {
            return Err(TrackError::InvalidConfig {
                message: format!("min_lap_seconds must be >= 0, got {}", self.min_lap_seconds),
            });
        }
        if !self.min_lap_meters.is_finite() || self.min_lap_meters <= 0.0 {
            return Err(TrackError::InvalidConfig {
                message: format!("min_lap_meters must be > 0, got {}", self.min_lap_meters),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    start: usize,
    end: usize,
    recovery: bool,
}

/// Moving seconds and meters between `start` and `end` point indices.
fn moving_totals(
    points: &[GeoPoint],
    paces: &[Option<f64>],
    start: usize,
    end: usize,
    max_interval_seconds: f64,
) -> (f64, f64) {
    (start + 1..=end)
        .filter(|&i| paces[i].is_some() && is_counted_interval(points, i, max_interval_seconds))
        .fold((0.0, 0.0), |(t, d), i| {
            (
                t + interval_seconds(&points[i - 1], &points[i]),
                d + haversine_distance(&points[i - 1], &points[i]),
            )
        })
}

/// Mean of the valid paces at points `start + 1..=end`; in range since every
/// value is.
fn mean_pace(paces: &[Option<f64>], start: usize, end: usize) -> Option<f64> {
    let (sum, count) = paces[start + 1..=end]
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Centered moving average over the valid values in each window.
fn smooth_effort(effort: &[Option<f64>], window: u32) -> Vec<Option<f64>> {
    let half = (window.max(1) / 2) as usize;
    let n = effort.len();
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half).min(n.saturating_sub(1));
            let (sum, count) = effort[lo..=hi]
                .iter()
                .flatten()
                .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            (count > 0).then(|| sum / count as f64)
        })
        .collect()
}

/// 1-D 2-means: returns `(fast_mean, slow_mean)`, `None` if a cluster is empty.
fn two_means(values: &[f64]) -> Option<(f64, f64)> {
    let mut fast = values.iter().copied().fold(f64::INFINITY, f64::min);
    let mut slow = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if slow <= fast {
        return None;
    }

    for _ in 0..MAX_CLUSTER_ITERATIONS {
        let threshold = (fast + slow) / 2.0;
        let (mut fs, mut fc, mut ss, mut sc) = (0.0, 0usize, 0.0, 0usize);
        for &v in values {
            if v < threshold {
                fs += v;
                fc += 1;
            } else {
                ss += v;
                sc += 1;
            }
        }
        if fc == 0 || sc == 0 {
            return None;
        }
        let (new_fast, new_slow) = (fs / fc as f64, ss / sc as f64);
        if new_fast == fast && new_slow == slow {
            break;
        }
        fast = new_fast;
        slow = new_slow;
    }

    Some((fast, slow))
}

/// Merge neighbouring segments of the same class.
fn coalesce(segments: Vec<Segment>) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for seg in segments {
        match out.last_mut() {
            Some(last) if last.recovery == seg.recovery => last.end = seg.end,
            _ => out.push(seg),
        }
    }
    out
}

/// Detect laps from the route's own metrics.
///
/// # Errors
/// Invalid configuration or a malformed point. Routes without alternation
/// yield `Ok(vec![])`.
pub fn detect_laps(
    points: &[GeoPoint],
    metrics: &MetricsConfig,
    config: &LapConfig,
) -> Result<Vec<DetectedLap>> {
    metrics.validate()?;
    validate_coordinates(points)?;
    let effort = if config.use_grade_adjusted {
        grade_adjusted_paces(points, metrics)
    } else {
        None
    }
    .unwrap_or_else(|| instantaneous_paces(points, metrics));

    laps_from_effort(points, &effort, metrics, config)
}

/// Detect laps from a precomputed per-point effort series (pace or GAP).
///
/// `effort` must be aligned with `points`; values outside the plausible pace
/// range are ignored.
///
/// # Errors
/// Invalid configuration, a misaligned effort series or a malformed point.
pub fn detect_laps_from_effort(
    points: &[GeoPoint],
    effort: &[Option<f64>],
    metrics: &MetricsConfig,
    config: &LapConfig,
) -> Result<Vec<DetectedLap>> {
    validate_coordinates(points)?;
    laps_from_effort(points, effort, metrics, config)
}

fn laps_from_effort(
    points: &[GeoPoint],
    effort: &[Option<f64>],
    metrics: &MetricsConfig,
    config: &LapConfig,
) -> Result<Vec<DetectedLap>> {
    config.validate()?;
    if points.len() != effort.len() {
        return Err(TrackError::Internal {
            message: format!(
                "effort series has {} values for {} points",
                effort.len(),
                points.len()
            ),
        });
    }
    if points.len() < 2 {
        return Ok(Vec::new());
    }

    let effort: Vec<Option<f64>> = effort.iter().map(|e| valid_opt(*e)).collect();
    let smoothed = smooth_effort(&effort, config.smoothing_window);
    let values: Vec<f64> = smoothed.iter().flatten().copied().collect();
    if values.len() < config.min_valid_points as usize {
        debug!(
            "[Laps] Only {} valid effort samples, need {}",
            values.len(),
            config.min_valid_points
        );
        return Ok(Vec::new());
    }

    let Some((fast, slow)) = two_means(&values) else {
        return Ok(Vec::new());
    };
    let overall = values.iter().sum::<f64>() / values.len() as f64;
    if (slow - fast) / overall < config.min_effort_delta {
        debug!(
            "[Laps] Uniform effort: fast {:.0} vs slow {:.0} s/km",
            fast, slow
        );
        return Ok(Vec::new());
    }
    let recovery_threshold = (fast + slow) / 2.0;

    // Per-point class; points without effort inherit their predecessor's
    let mut classes: Vec<bool> = Vec::with_capacity(points.len());
    let first_class = smoothed
        .iter()
        .flatten()
        .next()
        .is_some_and(|&v| v >= recovery_threshold);
    for s in &smoothed {
        let prev = classes.last().copied().unwrap_or(first_class);
        classes.push(s.map_or(prev, |v| v >= recovery_threshold));
    }

    // Cut where the class changes; neighbours share the boundary point
    let mut segments: Vec<Segment> = Vec::new();
    let mut start = 0;
    for i in 1..points.len() {
        if classes[i] != classes[i - 1] {
            segments.push(Segment {
                start,
                end: i,
                recovery: classes[start],
            });
            start = i;
        }
    }
    segments.push(Segment {
        start,
        end: points.len() - 1,
        recovery: classes[start],
    });

    // Absorb laps that are too short, shortest first
    let paces = instantaneous_paces(points, metrics);
    loop {
        if segments.len() <= 1 {
            break;
        }
        let shortest = segments
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let (secs, meters) =
                    moving_totals(points, &paces, s.start, s.end, metrics.max_interval_seconds);
                (i, secs, meters)
            })
            .filter(|&(_, secs, meters)| secs < config.min_lap_seconds || meters < config.min_lap_meters)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _, _)| i);

        let Some(i) = shortest else {
            break;
        };
        if i == 0 {
            segments[1].start = segments[0].start;
        } else {
            segments[i - 1].end = segments[i].end;
        }
        segments.remove(i);
        segments = coalesce(segments);
    }

    let laps: Vec<DetectedLap> = segments
        .iter()
        .enumerate()
        .filter_map(|(index, seg)| {
            let (secs, meters) =
                moving_totals(points, &paces, seg.start, seg.end, metrics.max_interval_seconds);
            if meters <= 0.0 {
                return None;
            }
            let (sum, count) = effort[seg.start + 1..=seg.end]
                .iter()
                .flatten()
                .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            let mean_effort = if count > 0 { sum / count as f64 } else { slow };
            // Device-reported paces can disagree with the distance covered
            let pace = valid_pace(secs / meters * 1000.0)
                .or_else(|| mean_pace(&paces, seg.start, seg.end))?;
            Some(DetectedLap {
                index: index as i32,
                distance_meters: meters,
                duration_seconds: (points[seg.end].timestamp_ms - points[seg.start].timestamp_ms)
                    / 1000,
                pace_sec_per_km: pace,
                is_recovery: mean_effort > recovery_threshold,
            })
        })
        .collect();

    let has_fast = laps.iter().any(|l| !l.is_recovery);
    let has_recovery = laps.iter().any(|l| l.is_recovery);
    if laps.len() < 2 || !has_fast || !has_recovery {
        debug!("[Laps] No fast/recovery alternation after merging");
        return Ok(Vec::new());
    }

    info!(
        "[Laps] Detected {} laps (threshold {:.0} s/km, fast {:.0}, slow {:.0})",
        laps.len(),
        recovery_threshold,
        fast,
        slow
    );

    Ok(laps)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 1 Hz points due north, each block running `seconds` at `pace`.
    fn blocks(plan: &[(u32, f64)]) -> Vec<GeoPoint> {
        let deg_per_m = 1.0 / crate::geo_utils::EARTH_RADIUS_M.to_radians();
        let mut points = vec![GeoPoint::new(47.0, 8.0, 0.0, 0)];
        let mut lat = 47.0;
        let mut t = 0i64;
        for &(seconds, pace) in plan {
            for _ in 0..seconds {
                lat += 1000.0 / pace * deg_per_m;
                t += 1_000;
                points.push(GeoPoint::new(lat, 8.0, 0.0, t).with_pace(pace));
            }
        }
        points
    }

    #[test]
    fn test_interval_session() {
        let mut plan = Vec::new();
        for _ in 0..4 {
            plan.push((90, 240.0));
            plan.push((90, 420.0));
        }
        let points = blocks(&plan);
        let laps = detect_laps(&points, &MetricsConfig::default(), &LapConfig::default()).unwrap();

        assert_eq!(laps.len(), 8);
        for (i, lap) in laps.iter().enumerate() {
            assert_eq!(lap.index, i as i32);
            assert_eq!(lap.is_recovery, i % 2 == 1);
            assert!((lap.duration_seconds - 90).abs() <= 10, "lap {:?}", lap);
        }
        let fast = &laps[2];
        assert!((fast.pace_sec_per_km - 240.0).abs() < 20.0);
        assert!((fast.distance_meters - 375.0).abs() < 40.0);
    }

    #[test]
    fn test_uniform_effort_has_no_laps() {
        let plan: Vec<(u32, f64)> = (0..60)
            .map(|i| (10, if i % 2 == 0 { 295.0 } else { 305.0 }))
            .collect();
        let points = blocks(&plan);
        let laps = detect_laps(&points, &MetricsConfig::default(), &LapConfig::default()).unwrap();
        assert!(laps.is_empty());
    }

    #[test]
    fn test_brief_slowdown_is_absorbed() {
        let points = blocks(&[(300, 300.0), (20, 500.0), (300, 300.0)]);
        let laps = detect_laps(&points, &MetricsConfig::default(), &LapConfig::default()).unwrap();
        assert!(laps.is_empty());
    }

    #[test]
    fn test_too_few_samples() {
        let points = blocks(&[(10, 240.0), (10, 420.0)]);
        let laps = detect_laps(&points, &MetricsConfig::default(), &LapConfig::default()).unwrap();
        assert!(laps.is_empty());
    }

    #[test]
    fn test_misaligned_effort_is_an_error() {
        let points = blocks(&[(10, 300.0)]);
        let result = detect_laps_from_effort(
            &points,
            &[Some(300.0)],
            &MetricsConfig::default(),
            &LapConfig::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_lap_pace_stays_plausible() {
        // Device says 4:00 and 7:00 /km but the fixes only creep 0.8 m/s
        let deg_per_m = 1.0 / crate::geo_utils::EARTH_RADIUS_M.to_radians();
        let points: Vec<GeoPoint> = (0..=400)
            .map(|i| {
                let p = GeoPoint::new(47.0 + i as f64 * 0.8 * deg_per_m, 8.0, 0.0, i * 1_000);
                match i {
                    0 => p,
                    1..=200 => p.with_pace(240.0),
                    _ => p.with_pace(420.0),
                }
            })
            .collect();
        let laps = detect_laps(&points, &MetricsConfig::default(), &LapConfig::default()).unwrap();
        assert_eq!(laps.len(), 2);
        assert!(!laps[0].is_recovery);
        assert!(laps[1].is_recovery);
        // Distance alone would give 1250 s/km for both laps
        assert!((laps[0].pace_sec_per_km - 240.0).abs() < 2.0, "{:?}", laps[0]);
        assert!((laps[1].pace_sec_per_km - 420.0).abs() < 1e-9, "{:?}", laps[1]);
    }

    #[test]
    fn test_malformed_point_rejected() {
        let mut points = blocks(&[(90, 240.0), (90, 420.0)]);
        points[50].latitude = f64::NAN;
        assert!(matches!(
            detect_laps(&points, &MetricsConfig::default(), &LapConfig::default()),
            Err(TrackError::InvalidCoordinates { index: 50, .. })
        ));
        let effort = vec![Some(300.0); points.len()];
        assert!(detect_laps_from_effort(
            &points,
            &effort,
            &MetricsConfig::default(),
            &LapConfig::default()
        )
        .is_err());
    }

    #[test]
    fn test_two_means() {
        let (fast, slow) = two_means(&[240.0, 242.0, 238.0, 420.0, 418.0, 422.0]).unwrap();
        assert!((fast - 240.0).abs() < 1e-9);
        assert!((slow - 420.0).abs() < 1e-9);
        assert!(two_means(&[300.0, 300.0]).is_none());
    }

    #[test]
    fn test_invalid_config() {
        let config = LapConfig {
            min_lap_meters: 0.0,
            ..LapConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
