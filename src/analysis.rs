//! Combined analysis of a finished route.
//!
//! Bundles the metrics engine, zone distribution and lap detector into one
//! record for the presentation collaborator. Nothing here is stored on the
//! route; callers recompute on demand.

use log::debug;
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use log::info;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::Result;
use crate::laps::{detect_laps, LapConfig};
use crate::metrics::{self, CadenceStats, MetricsConfig};
use crate::route::Route;
use crate::zones::{calculate_pace_zones, ZoneDistribution};
use crate::{DetectedLap, PaceZoneBoundary, Split};

/// Configuration for [`analyze_route`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct AnalysisConfig {
    pub metrics: MetricsConfig,
    pub laps: LapConfig,
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<()> {
        self.metrics.validate()?;
        self.laps.validate()
    }
}

/// Everything the run summary screen shows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RouteAnalysis {
    pub distance_m: f64,
    pub duration_s: f64,
    /// Elapsed time minus GPS gaps
    pub moving_time_s: f64,
    pub average_pace_sec_per_km: Option<f64>,
    pub elevation_gain_m: f64,
    pub elevation_loss_m: f64,
    /// Whether the route carries usable elevation data
    pub gap_available: bool,
    pub splits: Vec<Split>,
    pub laps: Vec<DetectedLap>,
    /// `None` when no zone boundaries were supplied
    pub zone_distribution: Option<ZoneDistribution>,
    pub cadence: Option<CadenceStats>,
}

/// Analyze one finished route.
///
/// `zones` may be empty, in which case no distribution is computed.
///
/// # Errors
/// Invalid configuration or invalid zone boundaries.
pub fn analyze_route(
    route: &Route,
    zones: &[PaceZoneBoundary],
    config: &AnalysisConfig,
) -> Result<RouteAnalysis> {
    config.validate()?;
    let points = route.points();
    let m = &config.metrics;

    let zone_distribution = if zones.is_empty() {
        None
    } else {
        Some(calculate_pace_zones(points, zones, m)?)
    };

    let analysis = RouteAnalysis {
        distance_m: route.distance_m(),
        duration_s: route.duration_s(),
        moving_time_s: metrics::moving_time_s(points, m),
        average_pace_sec_per_km: metrics::average_pace(points, m),
        elevation_gain_m: metrics::elevation_gain(points, m),
        elevation_loss_m: metrics::elevation_loss(points, m),
        gap_available: metrics::has_elevation_data(points, m),
        splits: metrics::splits(points, m)?,
        laps: detect_laps(points, m, &config.laps)?,
        zone_distribution,
        cadence: metrics::cadence_stats(points),
    };

    debug!(
        "[Metrics] Analyzed {} points: {:.0}m, {} splits, {} laps",
        points.len(),
        analysis.distance_m,
        analysis.splits.len(),
        analysis.laps.len()
    );
    Ok(analysis)
}

/// Analyze many routes using parallel processing.
///
/// Results keep the input order; one failing route does not affect the others.
#[cfg(feature = "parallel")]
pub fn analyze_routes_parallel(
    routes: &[Route],
    zones: &[PaceZoneBoundary],
    config: &AnalysisConfig,
) -> Vec<Result<RouteAnalysis>> {
    if routes.len() < 4 {
        return routes
            .iter()
            .map(|r| analyze_route(r, zones, config))
            .collect();
    }

    let start = std::time::Instant::now();
    let results: Vec<Result<RouteAnalysis>> = routes
        .par_iter()
        .map(|r| analyze_route(r, zones, config))
        .collect();
    info!(
        "[Metrics] Analyzed {} routes in parallel in {:?}",
        routes.len(),
        start.elapsed()
    );
    results
}
