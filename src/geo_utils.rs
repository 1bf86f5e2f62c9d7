//! Geographic utilities: great-circle distance, point-to-segment distance,
//! polyline length and bounds.
//!
//! All functions are pure and allocation-free except [`cumulative_distances`].

use geo::{BoundingRect, LineString};

use crate::{Bounds, GeoPoint};

/// Mean Earth radius in meters used for haversine distances.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude used by the flat-earth projection.
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Segments shorter than this are treated as a single point.
const DEGENERATE_SEGMENT_M: f64 = 0.001;

/// Haversine great-circle distance between two points in meters.
///
/// Symmetric and non-negative; exactly zero for identical coordinates.
/// Altitude is ignored.
///
/// # Example
/// ```
/// use pacetrack::GeoPoint;
/// use pacetrack::geo_utils::haversine_distance;
///
/// let a = GeoPoint::new(51.5074, -0.1278, 0.0, 0);
/// let b = GeoPoint::new(48.8566, 2.3522, 0.0, 0);
/// let d = haversine_distance(&a, &b);
/// assert!((d - 343_500.0).abs() < 5_000.0);
/// ```
pub fn haversine_distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    haversine(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Haversine distance on raw coordinates.
///
/// Non-finite input yields NaN, never a plausible-looking distance.
pub fn haversine(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lng2 - lng1).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    // clamp() guards asin against rounding just above 1.0 and keeps NaN as NaN
    2.0 * EARTH_RADIUS_M * h.sqrt().clamp(0.0, 1.0).asin()
}

/// Distance in meters from `point` to the segment `[line_start, line_end]`.
///
/// Uses an equirectangular projection referenced at `line_start`
/// (111,320 m per degree of latitude, 111,320·cos(lat) m per degree of
/// longitude). This is an approximation: error is negligible for routes under
/// ~50 km and grows with distance from the reference latitude. It is not a
/// true geodesic cross-track distance.
///
/// The projection parameter is clamped to `[0, 1]`, so the result is the
/// distance to the nearest point on the segment rather than the infinite line.
/// Degenerate segments fall back to the haversine distance to `line_start`.
pub fn perpendicular_distance(point: &GeoPoint, line_start: &GeoPoint, line_end: &GeoPoint) -> f64 {
    let lat_scale = METERS_PER_DEGREE;
    let lng_scale = METERS_PER_DEGREE * line_start.latitude.to_radians().cos();

    // Local planar coordinates with line_start at the origin
    let ex = (line_end.longitude - line_start.longitude) * lng_scale;
    let ey = (line_end.latitude - line_start.latitude) * lat_scale;
    let px = (point.longitude - line_start.longitude) * lng_scale;
    let py = (point.latitude - line_start.latitude) * lat_scale;

    let seg_len_sq = ex * ex + ey * ey;
    if seg_len_sq.sqrt() < DEGENERATE_SEGMENT_M {
        return haversine_distance(point, line_start);
    }

    let t = ((px * ex + py * ey) / seg_len_sq).clamp(0.0, 1.0);
    let dx = px - t * ex;
    let dy = py - t * ey;
    (dx * dx + dy * dy).sqrt()
}

/// Total length of a polyline in meters.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Cumulative distance at every point (first entry is 0.0).
pub fn cumulative_distances(points: &[GeoPoint]) -> Vec<f64> {
    let mut out = Vec::with_capacity(points.len());
    let mut total = 0.0;
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            total += haversine_distance(&points[i - 1], p);
        }
        out.push(total);
    }
    out
}

/// Convert a point sequence into a `geo` line string (x = longitude, y = latitude).
pub fn to_line_string(points: &[GeoPoint]) -> LineString<f64> {
    points
        .iter()
        .map(|p| geo::Coord {
            x: p.longitude,
            y: p.latitude,
        })
        .collect()
}

/// Bounding box of a point sequence, or `None` when empty.
pub fn compute_bounds(points: &[GeoPoint]) -> Option<Bounds> {
    let rect = to_line_string(points).bounding_rect()?;
    Some(Bounds {
        min_lat: rect.min().y,
        max_lat: rect.max().y,
        min_lng: rect.min().x,
        max_lng: rect.max().x,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint::new(lat, lng, 0.0, 0)
    }

    #[test]
    fn test_haversine_identity_and_symmetry() {
        let a = p(47.3769, 8.5417);
        let b = p(47.3800, 8.5500);
        assert_eq!(haversine_distance(&a, &a), 0.0);
        assert_eq!(haversine_distance(&a, &b), haversine_distance(&b, &a));
        assert!(haversine_distance(&a, &b) > 0.0);
    }

    #[test]
    fn test_one_degree_latitude() {
        // One degree along a meridian is R * pi / 180
        let d = haversine_distance(&p(0.0, 0.0), &p(1.0, 0.0));
        let expected = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
        assert!((d - expected).abs() < 1e-6);
    }

    #[test]
    fn test_perpendicular_distance_midpoint() {
        // Segment along the equator, point ~111 m north of its middle
        let start = p(0.0, 0.0);
        let end = p(0.0, 0.01);
        let point = p(0.001, 0.005);
        let d = perpendicular_distance(&point, &start, &end);
        assert!((d - 111.32).abs() < 0.01);
    }

    #[test]
    fn test_perpendicular_distance_clamps_to_segment() {
        let start = p(0.0, 0.0);
        let end = p(0.0, 0.001);
        // Beyond the end of the segment, on its axis
        let beyond = p(0.0, 0.002);
        let d = perpendicular_distance(&beyond, &start, &end);
        assert!((d - 111.32).abs() < 0.01);
    }

    #[test]
    fn test_perpendicular_distance_degenerate_segment() {
        let start = p(10.0, 10.0);
        let point = p(10.001, 10.0);
        let d = perpendicular_distance(&point, &start, &start);
        assert!((d - haversine_distance(&point, &start)).abs() < 1e-9);
    }

    #[test]
    fn test_cumulative_distances() {
        let pts = vec![p(0.0, 0.0), p(0.001, 0.0), p(0.002, 0.0)];
        let cum = cumulative_distances(&pts);
        assert_eq!(cum.len(), 3);
        assert_eq!(cum[0], 0.0);
        assert!((cum[2] - polyline_length(&pts)).abs() < 1e-9);
    }

    #[test]
    fn test_compute_bounds() {
        let pts = vec![p(51.50, -0.13), p(51.51, -0.12), p(51.505, -0.125)];
        let b = compute_bounds(&pts).unwrap();
        assert_eq!(b.min_lat, 51.50);
        assert_eq!(b.max_lat, 51.51);
        assert_eq!(b.min_lng, -0.13);
        assert_eq!(b.max_lng, -0.12);
        assert!(compute_bounds(&[]).is_none());
    }
}
