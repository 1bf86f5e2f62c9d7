//! Immutable, validated route.
//!
//! A `Route` is the finalized point sequence every analysis works from. It is
//! non-empty, has valid coordinates and non-decreasing timestamps. Derived views
//! (splits, laps, simplified polylines) are recomputed from it, never stored in it.

use geo::LineString;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};
use crate::geo_utils::{compute_bounds, polyline_length, to_line_string};
use crate::{Bounds, GeoPoint};

/// Deserialization goes through [`Route::from_points`], so a stored route that
/// breaks the invariants is rejected instead of wrapped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RouteRecord", into = "RouteRecord")]
pub struct Route {
    points: Vec<GeoPoint>,
}

impl Route {
    /// Validate and wrap a point sequence.
    ///
    /// # Errors
    /// - [`TrackError::EmptyRoute`] for an empty sequence
    /// - [`TrackError::InvalidCoordinates`] for non-finite or out-of-range coordinates
    /// - [`TrackError::NonMonotonicTimestamps`] when a timestamp goes backwards
    pub fn from_points(points: Vec<GeoPoint>) -> Result<Self> {
        validate_points(&points)?;
        Ok(Self { points })
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// First point; a route is never empty.
    pub fn first(&self) -> &GeoPoint {
        &self.points[0]
    }

    pub fn last(&self) -> &GeoPoint {
        &self.points[self.points.len() - 1]
    }

    /// Total path length in meters.
    pub fn distance_m(&self) -> f64 {
        polyline_length(&self.points)
    }

    /// Elapsed seconds between first and last point.
    pub fn duration_s(&self) -> f64 {
        (self.last().timestamp_ms - self.first().timestamp_ms) as f64 / 1000.0
    }

    pub fn bounds(&self) -> Bounds {
        // Non-empty by construction
        compute_bounds(&self.points).unwrap_or(Bounds {
            min_lat: self.first().latitude,
            max_lat: self.first().latitude,
            min_lng: self.first().longitude,
            max_lng: self.first().longitude,
        })
    }

    pub fn to_line_string(&self) -> LineString<f64> {
        to_line_string(&self.points)
    }

    pub fn into_points(self) -> Vec<GeoPoint> {
        self.points
    }
}

/// Wire form of a [`Route`].
#[derive(Serialize, Deserialize)]
struct RouteRecord {
    points: Vec<GeoPoint>,
}

impl TryFrom<RouteRecord> for Route {
    type Error = TrackError;

    fn try_from(record: RouteRecord) -> Result<Self> {
        Route::from_points(record.points)
    }
}

impl From<Route> for RouteRecord {
    fn from(route: Route) -> Self {
        RouteRecord {
            points: route.points,
        }
    }
}

/// Check that every point has valid coordinates and a finite altitude.
///
/// An empty slice passes; ordering is not checked.
pub fn validate_coordinates(points: &[GeoPoint]) -> Result<()> {
    for (index, p) in points.iter().enumerate() {
        if !p.is_valid() {
            return Err(TrackError::InvalidCoordinates {
                index,
                latitude: p.latitude,
                longitude: p.longitude,
            });
        }
        if !p.altitude.is_finite() {
            return Err(TrackError::InvalidAltitude {
                index,
                altitude: p.altitude,
            });
        }
    }
    Ok(())
}

/// Check the route invariants without taking ownership.
pub fn validate_points(points: &[GeoPoint]) -> Result<()> {
    if points.is_empty() {
        return Err(TrackError::EmptyRoute);
    }
    validate_coordinates(points)?;
    for (index, p) in points.iter().enumerate() {
        if index > 0 && p.timestamp_ms < points[index - 1].timestamp_ms {
            return Err(TrackError::NonMonotonicTimestamps {
                index,
                previous_ms: points[index - 1].timestamp_ms,
                timestamp_ms: p.timestamp_ms,
            });
        }
    }
    Ok(())
}
