//! FFI bindings for mobile platforms (iOS/Android).
//!
//! This module provides the UniFFI bindings that expose Rust functionality
//! to Kotlin and Swift. All FFI functions are prefixed with `ffi_` to avoid
//! naming conflicts with the internal API. Analysis results cross the boundary
//! as JSON strings; an empty object (`{}`) signals invalid input.

use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};

use crate::{
    analyze_route, chart_series, gpx_track_points, init_logging, simplify_with, AnalysisConfig,
    ChartSeries, FilterConfig, GeoPoint, MetricsConfig, PaceZoneBoundary, PositionFilter, Route,
    SimplifyTolerance,
};

// ============================================================================
// Position Filter
// ============================================================================

/// Filtered position returned to the platform layer.
#[derive(Debug, Clone, Copy, PartialEq, uniffi::Record)]
pub struct FilteredPosition {
    pub latitude: f64,
    pub longitude: f64,
}

/// Kalman filter for one active run.
///
/// The platform layer creates one per run and drops it when the run ends.
#[derive(Debug, uniffi::Object)]
pub struct RunFilter {
    inner: Mutex<PositionFilter>,
}

impl RunFilter {
    fn filter(&self) -> MutexGuard<'_, PositionFilter> {
        // Poisoned or not, the filter state is consistent between calls
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[uniffi::export]
impl RunFilter {
    /// Create a filter. An invalid configuration falls back to the defaults.
    #[uniffi::constructor]
    pub fn new(config: Option<FilterConfig>) -> Arc<Self> {
        init_logging();
        let filter = match config.map(PositionFilter::with_config) {
            Some(Ok(filter)) => filter,
            Some(Err(e)) => {
                warn!("[Filter] {}; using default configuration", e);
                PositionFilter::new()
            }
            None => PositionFilter::new(),
        };
        Arc::new(Self {
            inner: Mutex::new(filter),
        })
    }

    /// Feed one raw fix. Returns `None` for invalid coordinates or accuracy.
    pub fn process(
        &self,
        latitude: f64,
        longitude: f64,
        accuracy_m: f64,
        timestamp_ms: i64,
    ) -> Option<FilteredPosition> {
        match self
            .filter()
            .process(latitude, longitude, accuracy_m, timestamp_ms)
        {
            Ok((latitude, longitude)) => Some(FilteredPosition {
                latitude,
                longitude,
            }),
            Err(e) => {
                debug!("[Filter] Rejected fix: {}", e);
                None
            }
        }
    }

    /// Discard state, e.g. when the run is resumed after a pause.
    pub fn reset(&self) {
        self.filter().reset();
    }

    /// Current variance in m², `None` before the first fix.
    pub fn variance(&self) -> Option<f64> {
        self.filter().variance()
    }
}

// ============================================================================
// Simplification
// ============================================================================

/// Simplify a route for display.
///
/// Returns an empty list for an invalid tolerance.
#[uniffi::export]
pub fn ffi_simplify(points: Vec<GeoPoint>, tolerance: SimplifyTolerance) -> Vec<GeoPoint> {
    init_logging();
    let start = std::time::Instant::now();
    match simplify_with(&points, tolerance) {
        Ok(simplified) => {
            info!(
                "[Simplify] {} -> {} points in {:?}",
                points.len(),
                simplified.len(),
                start.elapsed()
            );
            simplified
        }
        Err(e) => {
            warn!("[Simplify] {}", e);
            Vec::new()
        }
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// Analyze a finished route.
///
/// # Arguments
/// * `points` - Finalized route points
/// * `zones` - The athlete's pace zones (may be empty)
/// * `config` - Optional analysis configuration
///
/// # Returns
/// JSON string with the route analysis
#[uniffi::export]
pub fn ffi_analyze_route(
    points: Vec<GeoPoint>,
    zones: Vec<PaceZoneBoundary>,
    config: Option<AnalysisConfig>,
) -> String {
    init_logging();
    info!(
        "[Metrics] analyze_route: {} points, {} zones",
        points.len(),
        zones.len()
    );

    let config = config.unwrap_or_default();
    let result = Route::from_points(points).and_then(|route| analyze_route(&route, &zones, &config));

    match result {
        Ok(analysis) => {
            info!(
                "[Metrics] {:.0}m, {} splits, {} laps",
                analysis.distance_m,
                analysis.splits.len(),
                analysis.laps.len()
            );
            serde_json::to_string(&analysis).unwrap_or_else(|_| "{}".to_string())
        }
        Err(e) => {
            warn!("[Metrics] analyze_route failed: {}", e);
            "{}".to_string()
        }
    }
}

/// Calculate the pace zone distribution of a route.
///
/// # Returns
/// JSON string with zone distribution results
#[uniffi::export]
pub fn ffi_calculate_pace_zones(points: Vec<GeoPoint>, zones: Vec<PaceZoneBoundary>) -> String {
    init_logging();
    info!(
        "[Zones] calculate_pace_zones: {} points, {} zones",
        points.len(),
        zones.len()
    );

    let config = MetricsConfig::default();

    #[cfg(feature = "parallel")]
    let result = crate::zones::calculate_pace_zones_parallel(&points, &zones, &config);
    #[cfg(not(feature = "parallel"))]
    let result = crate::zones::calculate_pace_zones(&points, &zones, &config);

    match result {
        Ok(distribution) => {
            serde_json::to_string(&distribution).unwrap_or_else(|_| "{}".to_string())
        }
        Err(e) => {
            warn!("[Zones] {}", e);
            "{}".to_string()
        }
    }
}

// ============================================================================
// Exports
// ============================================================================

/// GPX-mappable track points for the upload collaborator.
///
/// # Returns
/// JSON array of track points, `[]` if a timestamp is out of range
#[uniffi::export]
pub fn ffi_gpx_track_points(points: Vec<GeoPoint>) -> String {
    init_logging();
    match gpx_track_points(&points) {
        Ok(track) => serde_json::to_string(&track).unwrap_or_else(|_| "[]".to_string()),
        Err(e) => {
            warn!("[Export] {}", e);
            "[]".to_string()
        }
    }
}

/// Normalized chart series for the run detail screen.
#[uniffi::export]
pub fn ffi_chart_series(points: Vec<GeoPoint>) -> ChartSeries {
    init_logging();
    chart_series(&points, &MetricsConfig::default())
}
