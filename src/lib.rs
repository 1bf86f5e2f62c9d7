//! # Pacetrack
//!
//! GPS track processing for runs: turns a noisy, irregular stream of raw fixes
//! into a clean route with derived metrics.
//!
//! This library provides:
//! - Kalman position filtering of raw fixes ([`filter`])
//! - Ramer–Douglas–Peucker simplification for display copies ([`simplify`])
//! - Pace, grade-adjusted pace, elevation, cadence and per-km splits ([`metrics`])
//! - Time-in-pace-zone distribution ([`zones`])
//! - Automatic fast/recovery lap detection for free runs ([`laps`])
//!
//! The core performs no I/O. Location sources, persistence, rendering and
//! uploads are collaborators that feed it data or consume its outputs.
//!
//! ## Features
//!
//! - **`parallel`** - Analyze many routes concurrently with rayon
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use pacetrack::{analyze_route, AnalysisConfig, PaceZoneBoundary, RawFix, RunRecorder};
//!
//! let mut recorder = RunRecorder::new();
//! for i in 0..600 {
//!     // ~3.33 m/s due north: 5:00 /km
//!     let fix = RawFix::new(47.0 + i as f64 * 0.00003, 8.0, 5.0, i * 1000)
//!         .with_speed(1000.0 / 300.0);
//!     recorder.push(fix).unwrap();
//! }
//! let route = recorder.finish().unwrap();
//!
//! let zones = vec![
//!     PaceZoneBoundary::new("Fast", 0.0, Some(280.0)),
//!     PaceZoneBoundary::new("Easy", 280.0, None),
//! ];
//! let analysis = analyze_route(&route, &zones, &AnalysisConfig::default()).unwrap();
//! assert_eq!(analysis.splits.len(), 1);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{OptionExt, Result, TrackError};

// Geographic utilities (distance, perpendicular distance, bounds)
pub mod geo_utils;

// Pace validity rules
pub mod pace;

// Kalman position filter
pub mod filter;
pub use filter::{FilterConfig, PositionFilter};

// Route simplification
pub mod simplify;
pub use simplify::{simplify, simplify_with, SimplifyTolerance};

// Immutable routes
pub mod route;
pub use route::Route;

// Live recording of a run
pub mod recorder;
pub use recorder::{RecorderState, RunRecorder};

// Pace, GAP, elevation, cadence and splits
pub mod metrics;
pub use metrics::{CadenceStats, MetricsConfig};

// Pace zone distribution
pub mod zones;
pub use zones::{calculate_pace_zones, PaceTarget, ZoneDistribution, ZoneTime};

// Automatic lap detection
pub mod laps;
pub use laps::{detect_laps, LapConfig};

// Combined per-route analysis
pub mod analysis;
pub use analysis::{analyze_route, AnalysisConfig, RouteAnalysis};
#[cfg(feature = "parallel")]
pub use analysis::analyze_routes_parallel;

// Hand-off records for presentation and upload collaborators
pub mod export;
pub use export::{chart_series, gpx_track_points, ChartSeries, GpxTrackPoint};

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("PacetrackRust"),
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
pub(crate) fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// One GPS observation after filtering.
///
/// Immutable once recorded. Pace and cadence are attached after capture and
/// are `None` when unknown.
///
/// # Example
/// ```
/// use pacetrack::GeoPoint;
/// let point = GeoPoint::new(47.3769, 8.5417, 408.0, 1_700_000_000_000)
///     .with_pace(315.0)
///     .with_cadence(172);
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Altitude in meters (0.0 for a run that never reports one)
    pub altitude: f64,
    /// Unix epoch milliseconds
    pub timestamp_ms: i64,
    pub horizontal_accuracy_m: f32,
    pub instantaneous_pace_sec_per_km: Option<f64>,
    pub cadence_spm: Option<u32>,
}

impl GeoPoint {
    /// Create a point without accuracy, pace or cadence.
    pub fn new(latitude: f64, longitude: f64, altitude: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            timestamp_ms,
            horizontal_accuracy_m: 0.0,
            instantaneous_pace_sec_per_km: None,
            cadence_spm: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy_m: f32) -> Self {
        self.horizontal_accuracy_m = accuracy_m;
        self
    }

    pub fn with_pace(mut self, pace_sec_per_km: f64) -> Self {
        self.instantaneous_pace_sec_per_km = Some(pace_sec_per_km);
        self
    }

    pub fn with_cadence(mut self, cadence_spm: u32) -> Self {
        self.cadence_spm = Some(cadence_spm);
        self
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

impl From<&GeoPoint> for geo::Point<f64> {
    fn from(p: &GeoPoint) -> Self {
        geo::Point::new(p.longitude, p.latitude)
    }
}

/// A raw fix as delivered by the location source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RawFix {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: Option<f64>,
    pub accuracy_m: f64,
    /// Device-reported ground speed, if any
    pub speed_mps: Option<f64>,
    /// Unix epoch milliseconds
    pub timestamp_ms: i64,
    /// Step cadence from a pedometer collaborator, if any
    pub cadence_spm: Option<u32>,
}

impl RawFix {
    /// Create a fix with position, accuracy and time only.
    pub fn new(latitude: f64, longitude: f64, accuracy_m: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            altitude_m: None,
            accuracy_m,
            speed_mps: None,
            timestamp_ms,
            cadence_spm: None,
        }
    }

    pub fn with_altitude(mut self, altitude_m: f64) -> Self {
        self.altitude_m = Some(altitude_m);
        self
    }

    pub fn with_speed(mut self, speed_mps: f64) -> Self {
        self.speed_mps = Some(speed_mps);
        self
    }

    pub fn with_cadence(mut self, cadence_spm: u32) -> Self {
        self.cadence_spm = Some(cadence_spm);
        self
    }
}

/// Bounding box for a route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Get the center point of the bounds as `(lat, lng)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

/// One named pace band of an athlete's zone model.
///
/// `max_pace_sec_per_km = None` marks the slowest, unbounded zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct PaceZoneBoundary {
    pub name: String,
    pub min_pace_sec_per_km: f64,
    pub max_pace_sec_per_km: Option<f64>,
}

impl PaceZoneBoundary {
    pub fn new(name: &str, min_pace_sec_per_km: f64, max_pace_sec_per_km: Option<f64>) -> Self {
        Self {
            name: name.to_string(),
            min_pace_sec_per_km,
            max_pace_sec_per_km,
        }
    }

    /// Whether `pace` lies in `[min, max)`.
    pub fn contains(&self, pace_sec_per_km: f64) -> bool {
        pace_sec_per_km >= self.min_pace_sec_per_km
            && self
                .max_pace_sec_per_km
                .map_or(true, |max| pace_sec_per_km < max)
    }
}

/// Aggregated metrics for one completed kilometer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Split {
    /// 1-based kilometer number
    pub km: i32,
    /// Mean pace over the kilometer, `None` if implausible
    pub pace_sec_per_km: Option<f64>,
    /// Only present when the route has elevation data
    pub grade_adjusted_pace_sec_per_km: Option<f64>,
    /// Net grade over the kilometer, only present with elevation data
    pub avg_grade_percent: Option<f64>,
}

/// A lap found by the lap detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct DetectedLap {
    /// 0-based lap number
    pub index: i32,
    pub distance_meters: f64,
    pub duration_seconds: i64,
    pub pace_sec_per_km: f64,
    pub is_recovery: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_validation() {
        assert!(GeoPoint::new(51.5074, -0.1278, 0.0, 0).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0, 0.0, 0).is_valid());
        assert!(!GeoPoint::new(0.0, 181.0, 0.0, 0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0, 0.0, 0).is_valid());
    }

    #[test]
    fn test_zone_contains_half_open() {
        let zone = PaceZoneBoundary::new("Tempo", 240.0, Some(300.0));
        assert!(zone.contains(240.0));
        assert!(zone.contains(299.9));
        assert!(!zone.contains(300.0));
        assert!(!zone.contains(239.0));

        let open = PaceZoneBoundary::new("Easy", 300.0, None);
        assert!(open.contains(1000.0));
    }

    #[test]
    fn test_zone_boundary_from_json() {
        let json = r#"[
            {"name": "Threshold", "min_pace_sec_per_km": 0.0, "max_pace_sec_per_km": 270.0},
            {"name": "Easy", "min_pace_sec_per_km": 270.0, "max_pace_sec_per_km": null}
        ]"#;
        let zones: Vec<PaceZoneBoundary> = serde_json::from_str(json).unwrap();
        assert_eq!(zones.len(), 2);
        assert_eq!(zones[1].max_pace_sec_per_km, None);
    }

    #[test]
    fn test_geo_point_into_geo() {
        let p = GeoPoint::new(47.0, 8.0, 0.0, 0);
        let gp: geo::Point<f64> = (&p).into();
        assert_eq!(gp.x(), 8.0);
        assert_eq!(gp.y(), 47.0);
    }
}
