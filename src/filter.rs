//! Kalman position filter for raw GPS fixes.
//!
//! Latitude and longitude are smoothed as two independent 1-D Kalman filters
//! that share one scalar variance (in m²) and one gain. This ignores the
//! correlation between axes and the non-linear geometry, which is acceptable at
//! running speeds where error is dominated by multipath noise.
//!
//! One filter belongs to one active run. Call [`PositionFilter::reset`] when
//! tracking is paused and resumed, since the physical gap breaks the temporal
//! continuity the filter assumes.
//!
//! ## Example
//! ```
//! use pacetrack::filter::PositionFilter;
//!
//! let mut filter = PositionFilter::new();
//! let first = filter.process(47.3769, 8.5417, 10.0, 0).unwrap();
//! assert_eq!(first, (47.3769, 8.5417));
//! let (lat, lng) = filter.process(47.3770, 8.5418, 10.0, 1_000).unwrap();
//! assert!(lat > 47.3769 && lat < 47.3770);
//! assert!(lng > 8.5417 && lng < 8.5418);
//! ```

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};

/// Configuration for the position filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct FilterConfig {
    /// Plausible human displacement rate used as process noise (m/s).
    /// Default: 3.0
    pub process_noise_mps: f64,
    /// Accuracies below this are raised to it, so the gain stays defined.
    /// Default: 1.0 meter
    pub min_accuracy_m: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            process_noise_mps: 3.0,
            min_accuracy_m: 1.0,
        }
    }
}

impl FilterConfig {
    /// Check that all values are usable.
    pub fn validate(&self) -> Result<()> {
        if !self.process_noise_mps.is_finite() || self.process_noise_mps < 0.0 {
            return Err(TrackError::InvalidConfig {
                message: format!("process_noise_mps must be >= 0, got {}", self.process_noise_mps),
            });
        }
        if !self.min_accuracy_m.is_finite() || self.min_accuracy_m <= 0.0 {
            return Err(TrackError::InvalidConfig {
                message: format!("min_accuracy_m must be > 0, got {}", self.min_accuracy_m),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FilterState {
    lat: f64,
    lng: f64,
    variance: f64,
    last_timestamp_ms: i64,
}

/// Stateful Kalman filter for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionFilter {
    config: FilterConfig,
    state: Option<FilterState>,
}

impl Default for PositionFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionFilter {
    /// Create an uninitialized filter with the default process noise.
    pub fn new() -> Self {
        Self {
            config: FilterConfig::default(),
            state: None,
        }
    }

    /// Create an uninitialized filter with a custom configuration.
    pub fn with_config(config: FilterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: None,
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Whether the filter has seen a fix since creation or the last reset.
    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Current variance estimate in m², `None` before the first fix.
    pub fn variance(&self) -> Option<f64> {
        self.state.map(|s| s.variance)
    }

    /// Current position estimate, `None` before the first fix.
    pub fn estimate(&self) -> Option<(f64, f64)> {
        self.state.map(|s| (s.lat, s.lng))
    }

    /// Discard all state.
    pub fn reset(&mut self) {
        if self.state.take().is_some() {
            debug!("[Filter] State reset");
        }
    }

    /// Feed one raw fix and return the filtered `(lat, lng)`.
    ///
    /// The first fix after creation or reset is returned unchanged. Timestamps
    /// that go backwards contribute zero elapsed time rather than failing, and
    /// the next interval is measured from the backwards fix.
    pub fn process(
        &mut self,
        raw_lat: f64,
        raw_lng: f64,
        accuracy_m: f64,
        timestamp_ms: i64,
    ) -> Result<(f64, f64)> {
        if !raw_lat.is_finite() || !raw_lng.is_finite() {
            return Err(TrackError::InvalidCoordinates {
                index: 0,
                latitude: raw_lat,
                longitude: raw_lng,
            });
        }
        if !accuracy_m.is_finite() || accuracy_m < 0.0 {
            return Err(TrackError::InvalidAccuracy { accuracy_m });
        }

        let accuracy = accuracy_m.max(self.config.min_accuracy_m);
        let measurement_variance = accuracy * accuracy;

        let Some(state) = self.state.as_mut() else {
            self.state = Some(FilterState {
                lat: raw_lat,
                lng: raw_lng,
                variance: measurement_variance,
                last_timestamp_ms: timestamp_ms,
            });
            return Ok((raw_lat, raw_lng));
        };

        let dt_seconds = ((timestamp_ms - state.last_timestamp_ms) as f64 / 1000.0).max(0.0);
        let q = self.config.process_noise_mps;
        state.variance += dt_seconds * q * q;
        state.last_timestamp_ms = timestamp_ms;

        let gain = state.variance / (state.variance + measurement_variance);
        state.lat += gain * (raw_lat - state.lat);
        state.lng += gain * (raw_lng - state.lng);
        state.variance *= 1.0 - gain;

        Ok((state.lat, state.lng))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_fix_passes_through() {
        let mut filter = PositionFilter::new();
        assert!(!filter.is_initialized());
        let out = filter.process(51.5074, -0.1278, 8.0, 1_000).unwrap();
        assert_eq!(out, (51.5074, -0.1278));
        assert_eq!(filter.variance(), Some(64.0));
    }

    #[test]
    fn test_reset_uninitializes() {
        let mut filter = PositionFilter::new();
        filter.process(51.0, 0.0, 5.0, 0).unwrap();
        filter.process(51.0001, 0.0, 5.0, 1_000).unwrap();
        filter.reset();
        assert!(!filter.is_initialized());
        assert_eq!(filter.variance(), None);
        // Next fix is adopted unchanged again
        assert_eq!(filter.process(52.0, 1.0, 5.0, 90_000).unwrap(), (52.0, 1.0));
    }

    #[test]
    fn test_update_moves_toward_measurement() {
        let mut filter = PositionFilter::new();
        filter.process(0.0, 0.0, 10.0, 0).unwrap();
        let (lat, lng) = filter.process(0.001, 0.001, 10.0, 1_000).unwrap();
        // variance 100 + 9 = 109, gain = 109 / 209
        let gain = 109.0 / 209.0;
        assert!((lat - 0.001 * gain).abs() < 1e-12);
        assert!((lng - 0.001 * gain).abs() < 1e-12);
        assert!((filter.variance().unwrap() - 109.0 * (1.0 - gain)).abs() < 1e-9);
    }

    #[test]
    fn test_backwards_timestamp_does_not_grow_variance() {
        let mut filter = PositionFilter::new();
        filter.process(0.0, 0.0, 10.0, 5_000).unwrap();
        filter.process(0.0, 0.0, 10.0, 4_000).unwrap();
        // dt clamped to zero: gain = 100 / 200, variance halves
        assert!((filter.variance().unwrap() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_interval_after_backwards_fix_starts_from_it() {
        let mut filter = PositionFilter::new();
        filter.process(0.0, 0.0, 10.0, 5_000).unwrap();
        filter.process(0.0, 0.0, 10.0, 4_000).unwrap();
        filter.process(0.0, 0.0, 10.0, 6_000).unwrap();
        // 50 + 2 s * 9 = 68, gain = 68 / 168
        let expected = 68.0 * (1.0 - 68.0 / 168.0);
        assert!((filter.variance().unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_non_finite_input() {
        let mut filter = PositionFilter::new();
        assert!(matches!(
            filter.process(f64::NAN, 0.0, 5.0, 0),
            Err(TrackError::InvalidCoordinates { .. })
        ));
        assert!(matches!(
            filter.process(0.0, 0.0, f64::INFINITY, 0),
            Err(TrackError::InvalidAccuracy { .. })
        ));
        assert!(!filter.is_initialized());
    }

    #[test]
    fn test_zero_accuracy_is_floored() {
        let mut filter = PositionFilter::new();
        filter.process(0.0, 0.0, 0.0, 0).unwrap();
        assert_eq!(filter.variance(), Some(1.0));
        let (lat, _) = filter.process(0.0001, 0.0, 0.0, 0).unwrap();
        assert!(lat.is_finite());
    }

    #[test]
    fn test_invalid_config() {
        let config = FilterConfig {
            process_noise_mps: -1.0,
            ..FilterConfig::default()
        };
        assert!(PositionFilter::with_config(config).is_err());
    }
}
