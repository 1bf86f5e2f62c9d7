//! Live recording of one run.
//!
//! A [`RunRecorder`] owns the run's [`PositionFilter`] exclusively. Each raw fix
//! is validated, filtered and appended as an immutable [`GeoPoint`]; the
//! filtered point is returned so the caller can hand it to persistence. The
//! sequence only grows while recording and becomes a [`Route`] at
//! [`RunRecorder::finish`].
//!
//! Accuracy-based rejection is caller policy and happens before `push`.
//!
//! Fixes without an altitude reading take the last known altitude. Fixes
//! recorded before the first reading are backfilled with it once it arrives;
//! a run that never reports altitude stays flat at 0 m.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackError};
use crate::filter::{FilterConfig, PositionFilter};
use crate::geo_utils::haversine;
use crate::pace::{pace_from_delta, pace_from_speed};
use crate::route::{validate_points, Route};
use crate::{GeoPoint, RawFix};

/// Recording state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecorderState {
    Recording,
    Paused,
}

#[derive(Debug, Clone)]
pub struct RunRecorder {
    filter: PositionFilter,
    points: Vec<GeoPoint>,
    state: RecorderState,
    /// True until the first fix after a resume has been accepted
    resumed: bool,
    /// Most recent altitude reading
    last_altitude: Option<f64>,
    /// Leading points recorded before any altitude reading
    awaiting_altitude: usize,
}

impl Default for RunRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl RunRecorder {
    /// Start recording with the default filter configuration.
    pub fn new() -> Self {
        Self {
            filter: PositionFilter::new(),
            points: Vec::new(),
            state: RecorderState::Recording,
            resumed: false,
            last_altitude: None,
            awaiting_altitude: 0,
        }
    }

    /// Start recording with a custom filter configuration.
    pub fn with_filter_config(config: FilterConfig) -> Result<Self> {
        Ok(Self {
            filter: PositionFilter::with_config(config)?,
            ..Self::new()
        })
    }

    /// Rebuild a recorder from points replayed by the persistence collaborator.
    ///
    /// The replayed points are kept as-is. The filter starts fresh, since the
    /// restart is a physical gap just like a pause.
    pub fn from_stored(points: Vec<GeoPoint>, config: FilterConfig) -> Result<Self> {
        if !points.is_empty() {
            validate_points(&points)?;
        }
        info!("[Recorder] Restored {} stored points", points.len());
        Ok(Self {
            filter: PositionFilter::with_config(config)?,
            resumed: !points.is_empty(),
            last_altitude: points.last().map(|p| p.altitude),
            awaiting_altitude: 0,
            points,
            state: RecorderState::Recording,
        })
    }

    pub fn state(&self) -> RecorderState {
        self.state
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

    pub fn filter(&self) -> &PositionFilter {
        &self.filter
    }

    /// Validate, filter and append one fix.
    ///
    /// Duplicate timestamps are accepted. Backwards timestamps, non-finite or
    /// out-of-range coordinates and invalid accuracy are rejected and leave the
    /// recorder unchanged.
    pub fn push(&mut self, fix: RawFix) -> Result<GeoPoint> {
        if self.state == RecorderState::Paused {
            return Err(TrackError::RecorderPaused);
        }

        let index = self.points.len();
        let raw = GeoPoint::new(fix.latitude, fix.longitude, 0.0, fix.timestamp_ms);
        if !raw.is_valid() {
            return Err(TrackError::InvalidCoordinates {
                index,
                latitude: fix.latitude,
                longitude: fix.longitude,
            });
        }
        if let Some(prev) = self.points.last() {
            if fix.timestamp_ms < prev.timestamp_ms {
                warn!(
                    "[Recorder] Rejected out-of-order fix {} < {}",
                    fix.timestamp_ms, prev.timestamp_ms
                );
                return Err(TrackError::NonMonotonicTimestamps {
                    index,
                    previous_ms: prev.timestamp_ms,
                    timestamp_ms: fix.timestamp_ms,
                });
            }
        }

        let (lat, lng) =
            self.filter
                .process(fix.latitude, fix.longitude, fix.accuracy_m, fix.timestamp_ms)?;

        // No derived pace across a pause: the previous point is on the other side of the gap
        let pace = match fix.speed_mps {
            Some(speed) => pace_from_speed(speed),
            None if self.resumed => None,
            None => self.points.last().and_then(|prev| {
                let dt = (fix.timestamp_ms - prev.timestamp_ms) as f64 / 1000.0;
                pace_from_delta(haversine(prev.latitude, prev.longitude, lat, lng), dt)
            }),
        };

        let altitude = self.altitude_for(fix.altitude_m);
        let point = GeoPoint {
            latitude: lat,
            longitude: lng,
            altitude,
            timestamp_ms: fix.timestamp_ms,
            horizontal_accuracy_m: fix.accuracy_m as f32,
            instantaneous_pace_sec_per_km: pace,
            cadence_spm: fix.cadence_spm.filter(|&c| c > 0),
        };
        self.points.push(point);
        self.resumed = false;
        Ok(point)
    }

    /// Altitude for the next point, backfilling leading points on the first reading.
    fn altitude_for(&mut self, reading: Option<f64>) -> f64 {
        match reading.filter(|a| a.is_finite()) {
            Some(altitude) => {
                if self.awaiting_altitude > 0 {
                    debug!(
                        "[Recorder] Backfilled altitude {:.1}m on {} points",
                        altitude, self.awaiting_altitude
                    );
                    for p in &mut self.points[..self.awaiting_altitude] {
                        p.altitude = altitude;
                    }
                    self.awaiting_altitude = 0;
                }
                self.last_altitude = Some(altitude);
                altitude
            }
            None => match self.last_altitude {
                Some(altitude) => altitude,
                None => {
                    self.awaiting_altitude += 1;
                    0.0
                }
            },
        }
    }

    /// Stop accepting fixes until [`resume`](Self::resume).
    pub fn pause(&mut self) {
        if self.state == RecorderState::Recording {
            debug!("[Recorder] Paused after {} points", self.points.len());
            self.state = RecorderState::Paused;
        }
    }

    /// Accept fixes again. The filter is reset because the pause broke continuity.
    pub fn resume(&mut self) {
        if self.state == RecorderState::Paused {
            debug!("[Recorder] Resumed");
            self.filter.reset();
            self.state = RecorderState::Recording;
            self.resumed = !self.points.is_empty();
        }
    }

    /// End the run and freeze its points.
    ///
    /// # Errors
    /// [`TrackError::EmptyRoute`] when no fix was accepted.
    pub fn finish(self) -> Result<Route> {
        info!("[Recorder] Finished run with {} points", self.points.len());
        Route::from_points(self.points)
    }
}
