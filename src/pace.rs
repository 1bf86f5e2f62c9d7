//! Pace validity rules shared by the metrics engine and lap detector.
//!
//! A pace is only meaningful inside the plausible running range
//! [`MIN_PACE_SEC_PER_KM`, `MAX_PACE_SEC_PER_KM`]. Anything outside is "no pace
//! data" and comes back as `None`; values are never clamped into range here.

/// Fastest plausible running pace (1:00 /km).
pub const MIN_PACE_SEC_PER_KM: f64 = 60.0;

/// Slowest plausible running pace (20:00 /km).
pub const MAX_PACE_SEC_PER_KM: f64 = 1200.0;

/// Below this speed the runner is considered stopped.
pub const STOPPED_SPEED_MPS: f64 = 0.5;

/// Return the pace if it lies in the plausible running range.
pub fn valid_pace(pace_sec_per_km: f64) -> Option<f64> {
    (pace_sec_per_km.is_finite()
        && (MIN_PACE_SEC_PER_KM..=MAX_PACE_SEC_PER_KM).contains(&pace_sec_per_km))
    .then_some(pace_sec_per_km)
}

/// Validate an optional pace.
pub fn valid_opt(pace_sec_per_km: Option<f64>) -> Option<f64> {
    pace_sec_per_km.and_then(valid_pace)
}

/// Pace from a device-reported speed.
///
/// `None` when stopped (speed ≤ 0.5 m/s) or when the resulting pace is
/// outside the plausible range.
pub fn pace_from_speed(speed_mps: f64) -> Option<f64> {
    if !speed_mps.is_finite() || speed_mps <= STOPPED_SPEED_MPS {
        return None;
    }
    valid_pace(1000.0 / speed_mps)
}

/// Pace from a distance/time delta between two fixes.
pub fn pace_from_delta(distance_m: f64, dt_seconds: f64) -> Option<f64> {
    if dt_seconds.is_nan() || dt_seconds <= 0.0 || !distance_m.is_finite() {
        return None;
    }
    pace_from_speed(distance_m / dt_seconds)
}

/// Clamp a derived pace (e.g. grade-adjusted) back into the plausible range.
///
/// Only for values computed from an already-valid pace.
pub(crate) fn clamp_pace(pace_sec_per_km: f64) -> f64 {
    pace_sec_per_km.clamp(MIN_PACE_SEC_PER_KM, MAX_PACE_SEC_PER_KM)
}
