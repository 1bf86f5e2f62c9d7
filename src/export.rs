//! Records handed to presentation and upload collaborators.
//!
//! The core never writes files. It builds GPX-mappable track points for the
//! upload collaborator and normalized chart series for the UI.

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::error::{OptionExt, Result};
use crate::geo_utils::cumulative_distances;
use crate::metrics::{instantaneous_paces, MetricsConfig};
use crate::GeoPoint;

/// One `<trkpt>` worth of data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GpxTrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub ele: f64,
    /// ISO-8601 UTC, e.g. `2024-03-01T07:15:00.000Z`
    pub time: String,
    pub pace_sec_per_km: Option<f64>,
    pub cadence_spm: Option<u32>,
}

/// Map every point to a GPX track point.
///
/// # Errors
/// [`TrackError::Internal`](crate::TrackError::Internal) for a timestamp chrono
/// cannot represent.
pub fn gpx_track_points(points: &[GeoPoint]) -> Result<Vec<GpxTrackPoint>> {
    points
        .iter()
        .map(|p| {
            let time = DateTime::from_timestamp_millis(p.timestamp_ms)
                .ok_or_internal("timestamp out of range")?
                .to_rfc3339_opts(SecondsFormat::Millis, true);
            Ok(GpxTrackPoint {
                lat: p.latitude,
                lon: p.longitude,
                ele: p.altitude,
                time,
                pace_sec_per_km: p.instantaneous_pace_sec_per_km,
                cadence_spm: p.cadence_spm,
            })
        })
        .collect()
}

/// Chart-ready series along the distance axis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ChartSeries {
    /// Cumulative distance in kilometers, one per point
    pub distance_km: Vec<f64>,
    /// Altitude scaled to 0..1
    pub elevation: Vec<f64>,
    /// Pace scaled to 0..1, `None` where pace is undefined
    pub pace: Vec<Option<f64>>,
}

/// Build normalized chart series for a route.
pub fn chart_series(points: &[GeoPoint], config: &MetricsConfig) -> ChartSeries {
    if points.is_empty() {
        return ChartSeries::default();
    }
    let distance_km = cumulative_distances(points)
        .into_iter()
        .map(|d| d / 1000.0)
        .collect();
    let altitudes: Vec<f64> = points.iter().map(|p| p.altitude).collect();
    let paces = instantaneous_paces(points, config);

    ChartSeries {
        distance_km,
        elevation: normalize(&altitudes),
        pace: normalize_opt(&paces),
    }
}

/// Ranges narrower than this are treated as flat.
const FLAT_RANGE: f64 = 1e-6;

/// Scale values to 0..1. A flat series maps to 0.5.
fn normalize(values: &[f64]) -> Vec<f64> {
    let (min, max) = min_max(values.iter().copied());
    values.iter().map(|&v| scale(v, min, max)).collect()
}

fn normalize_opt(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let (min, max) = min_max(values.iter().flatten().copied());
    values.iter().map(|v| v.map(|v| scale(v, min, max))).collect()
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

fn scale(v: f64, min: f64, max: f64) -> f64 {
    let range = max - min;
    if range > FLAT_RANGE {
        (v - min) / range
    } else {
        0.5
    }
}
