//! Time-in-zone distribution against an athlete's pace zones.
//!
//! Every counted interval (≤ 60 s by default, positive duration, valid pace at
//! its end) is attributed to the first zone, in ascending minimum-pace order,
//! whose `[min, max)` bracket holds the pace. Paces no bracket holds go to the
//! last (slowest) zone. Results are shares of attributed time.
//!
//! ## Example
//! ```rust
//! use pacetrack::{GeoPoint, PaceZoneBoundary, MetricsConfig};
//! use pacetrack::zones::calculate_pace_zones;
//!
//! let points: Vec<GeoPoint> = (0..10)
//!     .map(|i| GeoPoint::new(47.0, 8.0, 0.0, i * 1000).with_pace(if i % 2 == 0 { 250.0 } else { 350.0 }))
//!     .collect();
//! let zones = vec![
//!     PaceZoneBoundary::new("Hard", 0.0, Some(300.0)),
//!     PaceZoneBoundary::new("Easy", 300.0, None),
//! ];
//! let dist = calculate_pace_zones(&points, &zones, &MetricsConfig::default()).unwrap();
//! println!("Time in Hard: {:.0}%", dist.get_zone_percent("Hard"));
//! ```

use log::debug;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{Result, TrackError};
use crate::metrics::{instantaneous_paces, interval_seconds, MetricsConfig};
use crate::route::validate_coordinates;
use crate::{GeoPoint, PaceZoneBoundary};

/// A validated zone model, sorted by ascending minimum pace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaceZoneConfig {
    zones: Vec<PaceZoneBoundary>,
}

impl PaceZoneConfig {
    /// Validate and sort zone boundaries.
    ///
    /// # Errors
    /// [`TrackError::InvalidZoneConfig`] when the list is empty, a minimum is
    /// not finite, or a maximum does not exceed its minimum.
    pub fn new(boundaries: &[PaceZoneBoundary]) -> Result<Self> {
        if boundaries.is_empty() {
            return Err(TrackError::InvalidZoneConfig {
                message: "at least one zone is required".to_string(),
            });
        }
        for zone in boundaries {
            if !zone.min_pace_sec_per_km.is_finite() {
                return Err(TrackError::InvalidZoneConfig {
                    message: format!("zone '{}' has a non-finite minimum", zone.name),
                });
            }
            if let Some(max) = zone.max_pace_sec_per_km {
                if max.is_nan() || max <= zone.min_pace_sec_per_km {
                    return Err(TrackError::InvalidZoneConfig {
                        message: format!("zone '{}' max {} is not above min", zone.name, max),
                    });
                }
            }
        }

        let mut zones = boundaries.to_vec();
        zones.sort_by(|a, b| a.min_pace_sec_per_km.total_cmp(&b.min_pace_sec_per_km));
        Ok(Self { zones })
    }

    pub fn zones(&self) -> &[PaceZoneBoundary] {
        &self.zones
    }

    /// Index of the zone a pace falls into (last zone when none matches).
    pub fn get_zone(&self, pace_sec_per_km: f64) -> usize {
        self.zones
            .iter()
            .position(|z| z.contains(pace_sec_per_km))
            .unwrap_or(self.zones.len() - 1)
    }
}

/// Time attributed to one zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ZoneTime {
    pub name: String,
    pub seconds: f64,
    /// Share of all attributed time (0-100)
    pub percentage: f64,
}

/// Result of a pace zone distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ZoneDistribution {
    /// One entry per zone, in ascending minimum-pace order
    pub zones: Vec<ZoneTime>,
    /// Total attributed seconds
    pub total_seconds: f64,
    /// Number of intervals attributed
    pub intervals: u32,
}

impl ZoneDistribution {
    /// Percentage for a zone by name, 0.0 if unknown.
    pub fn get_zone_percent(&self, name: &str) -> f64 {
        self.zones
            .iter()
            .find(|z| z.name == name)
            .map_or(0.0, |z| z.percentage)
    }
}

/// A planned-workout pace target, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct PaceTarget {
    pub min_pace_sec_per_km: f64,
    pub max_pace_sec_per_km: f64,
}

impl PaceTarget {
    pub fn contains(&self, pace_sec_per_km: f64) -> bool {
        (self.min_pace_sec_per_km..=self.max_pace_sec_per_km).contains(&pace_sec_per_km)
    }
}

/// `(duration_seconds, pace)` of every interval eligible for attribution.
pub fn attributable_intervals(points: &[GeoPoint], config: &MetricsConfig) -> Vec<(f64, f64)> {
    let paces = instantaneous_paces(points, config);
    (1..points.len())
        .filter_map(|i| {
            let dt = interval_seconds(&points[i - 1], &points[i]);
            if dt <= 0.0 || dt > config.max_interval_seconds {
                return None;
            }
            paces[i].map(|pace| (dt, pace))
        })
        .collect()
}

fn build_distribution(config: &PaceZoneConfig, zone_seconds: Vec<f64>, intervals: u32) -> ZoneDistribution {
    let total: f64 = zone_seconds.iter().sum();
    let zones = config
        .zones
        .iter()
        .zip(zone_seconds)
        .map(|(zone, seconds)| ZoneTime {
            name: zone.name.clone(),
            seconds,
            percentage: if total > 0.0 {
                seconds / total * 100.0
            } else {
                0.0
            },
        })
        .collect();

    ZoneDistribution {
        zones,
        total_seconds: total,
        intervals,
    }
}

/// Calculate the pace zone distribution of a route.
///
/// # Arguments
/// * `points` - Finalized route points
/// * `boundaries` - The athlete's zone boundaries (any order)
/// * `config` - Metrics configuration (gap threshold)
///
/// # Returns
/// Time and share per zone. With no attributable interval every share is 0.
///
/// # Errors
/// Invalid zone boundaries, or a point with malformed coordinates or altitude.
pub fn calculate_pace_zones(
    points: &[GeoPoint],
    boundaries: &[PaceZoneBoundary],
    config: &MetricsConfig,
) -> Result<ZoneDistribution> {
    let zone_config = PaceZoneConfig::new(boundaries)?;
    validate_coordinates(points)?;
    let intervals = attributable_intervals(points, config);

    let mut zone_seconds = vec![0.0; zone_config.zones.len()];
    for &(dt, pace) in &intervals {
        zone_seconds[zone_config.get_zone(pace)] += dt;
    }

    debug!(
        "[Zones] Attributed {} intervals across {} zones",
        intervals.len(),
        zone_seconds.len()
    );

    Ok(build_distribution(&zone_config, zone_seconds, intervals.len() as u32))
}

/// Calculate the pace zone distribution using parallel processing.
/// More efficient for very long routes (> 10,000 intervals).
#[cfg(feature = "parallel")]
pub fn calculate_pace_zones_parallel(
    points: &[GeoPoint],
    boundaries: &[PaceZoneBoundary],
    config: &MetricsConfig,
) -> Result<ZoneDistribution> {
    if points.len() < 10_000 {
        // Fall back to sequential for small routes
        return calculate_pace_zones(points, boundaries, config);
    }

    let zone_config = PaceZoneConfig::new(boundaries)?;
    validate_coordinates(points)?;
    let intervals = attributable_intervals(points, config);
    let zone_count = zone_config.zones.len();

    let zone_seconds = intervals
        .par_iter()
        .fold(
            || vec![0.0; zone_count],
            |mut acc, &(dt, pace)| {
                acc[zone_config.get_zone(pace)] += dt;
                acc
            },
        )
        .reduce(
            || vec![0.0; zone_count],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
                a
            },
        );

    Ok(build_distribution(&zone_config, zone_seconds, intervals.len() as u32))
}

/// Share of attributed time spent inside a pace target (0-100).
///
/// `Ok(None)` when no interval could be attributed.
pub fn target_compliance(
    points: &[GeoPoint],
    target: &PaceTarget,
    config: &MetricsConfig,
) -> Result<Option<f64>> {
    validate_coordinates(points)?;
    let intervals = attributable_intervals(points, config);
    let total: f64 = intervals.iter().map(|(dt, _)| dt).sum();
    if total <= 0.0 {
        return Ok(None);
    }
    let inside: f64 = intervals
        .iter()
        .filter(|(_, pace)| target.contains(*pace))
        .map(|(dt, _)| dt)
        .sum();
    Ok(Some(inside / total * 100.0))
}
