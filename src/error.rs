//! Unified error handling for the track processing core.
//!
//! Every fallible operation returns [`Result`]. Malformed input never panics;
//! it surfaces as one of these variants so the host can decide what to show.

use thiserror::Error;

/// Unified error type for pacetrack operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    /// An operation that needs at least one point got none
    #[error("route is empty")]
    EmptyRoute,

    /// Route has fewer points than the operation requires
    #[error("route has {point_count} points, minimum {minimum_required} required")]
    InsufficientPoints {
        point_count: usize,
        minimum_required: usize,
    },

    /// Latitude/longitude not finite or outside the valid range
    #[error("invalid coordinates at index {index}: ({latitude}, {longitude})")]
    InvalidCoordinates {
        index: usize,
        latitude: f64,
        longitude: f64,
    },

    /// Altitude present but not finite
    #[error("invalid altitude at index {index}: {altitude}")]
    InvalidAltitude { index: usize, altitude: f64 },

    /// Horizontal accuracy not a finite, non-negative number
    #[error("invalid horizontal accuracy: {accuracy_m}")]
    InvalidAccuracy { accuracy_m: f64 },

    /// Simplification tolerance must be finite and positive
    #[error("simplification tolerance must be positive, got {tolerance_m}")]
    InvalidTolerance { tolerance_m: f64 },

    /// Timestamps went backwards
    #[error("timestamp {timestamp_ms} at index {index} precedes previous {previous_ms}")]
    NonMonotonicTimestamps {
        index: usize,
        previous_ms: i64,
        timestamp_ms: i64,
    },

    /// Pace zone boundaries are missing or malformed
    #[error("invalid pace zones: {message}")]
    InvalidZoneConfig { message: String },

    /// A configuration value is out of range
    #[error("configuration error: {message}")]
    InvalidConfig { message: String },

    /// A fix was pushed while the recorder was paused
    #[error("recorder is paused")]
    RecorderPaused,

    /// Generic internal error
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Result type alias for pacetrack operations.
pub type Result<T> = std::result::Result<T, TrackError>;

/// Extension trait for converting Option to TrackError.
pub trait OptionExt<T> {
    /// Convert Option to Result with insufficient points error.
    fn ok_or_insufficient_points(self, point_count: usize, minimum: usize) -> Result<T>;

    /// Convert Option to Result with generic internal error.
    fn ok_or_internal(self, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_insufficient_points(self, point_count: usize, minimum: usize) -> Result<T> {
        self.ok_or(TrackError::InsufficientPoints {
            point_count,
            minimum_required: minimum,
        })
    }

    fn ok_or_internal(self, message: &str) -> Result<T> {
        self.ok_or_else(|| TrackError::Internal {
            message: message.to_string(),
        })
    }
}
