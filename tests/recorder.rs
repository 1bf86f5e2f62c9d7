//! End-to-end tests: record a run, finish it, analyze and export it

use pacetrack::geo_utils::EARTH_RADIUS_M;
use pacetrack::{
    analyze_route, chart_series, gpx_track_points, simplify_with, AnalysisConfig, FilterConfig,
    MetricsConfig, PaceZoneBoundary, RawFix, RecorderState, Route, RunRecorder,
    SimplifyTolerance, TrackError,
};

fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
    (a - b).abs() < epsilon
}

const START_MS: i64 = 1_709_277_300_000;

/// Show `[Recorder]`/`[Laps]` logs with `RUST_LOG=debug cargo test`.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Feeds 1 Hz fixes due north at the given paces, continuing from `lat`/`t_ms`.
fn run_blocks(rec: &mut RunRecorder, blocks: &[(u32, f64)], lat: &mut f64, t_ms: &mut i64) {
    let deg_per_m = 1.0 / EARTH_RADIUS_M.to_radians();
    for &(seconds, pace) in blocks {
        let speed = 1000.0 / pace;
        for _ in 0..seconds {
            let fix = RawFix::new(*lat, 8.0, 5.0, *t_ms)
                .with_altitude(410.0)
                .with_speed(speed)
                .with_cadence(if pace < 300.0 { 182 } else { 164 });
            rec.push(fix).unwrap();
            *lat += speed * deg_per_m;
            *t_ms += 1_000;
        }
    }
}

fn zones() -> Vec<PaceZoneBoundary> {
    vec![
        PaceZoneBoundary::new("Interval", 0.0, Some(270.0)),
        PaceZoneBoundary::new("Tempo", 270.0, Some(330.0)),
        PaceZoneBoundary::new("Easy", 330.0, None),
    ]
}

#[test]
fn test_interval_session_end_to_end() {
    init_logging();
    let mut blocks = Vec::new();
    for _ in 0..4 {
        blocks.push((90, 240.0));
        blocks.push((90, 420.0));
    }
    let mut rec = RunRecorder::new();
    let (mut lat, mut t) = (47.0, START_MS);
    run_blocks(&mut rec, &blocks, &mut lat, &mut t);

    let route = rec.finish().unwrap();
    assert_eq!(route.len(), 720);

    let analysis = analyze_route(&route, &zones(), &AnalysisConfig::default()).unwrap();

    // ~2357 m of running, minus a few meters of filter lag
    assert!(analysis.distance_m > 2300.0 && analysis.distance_m < 2370.0);
    assert_eq!(analysis.splits.len(), 2);
    assert!(!analysis.gap_available);

    assert_eq!(analysis.laps.len(), 8);
    for (i, lap) in analysis.laps.iter().enumerate() {
        assert_eq!(lap.is_recovery, i % 2 == 1);
    }

    let zones = analysis.zone_distribution.unwrap();
    assert!(approx_eq(zones.get_zone_percent("Interval"), 50.0, 1.0));
    assert!(approx_eq(zones.get_zone_percent("Easy"), 50.0, 1.0));
    assert_eq!(zones.get_zone_percent("Tempo"), 0.0);

    let cadence = analysis.cadence.unwrap();
    assert_eq!(cadence.max_spm, 182);
    assert_eq!(cadence.samples, 720);
}

#[test]
fn test_pause_excludes_stopped_time() {
    init_logging();
    let mut rec = RunRecorder::new();
    let (mut lat, mut t) = (47.0, START_MS);
    run_blocks(&mut rec, &[(300, 300.0)], &mut lat, &mut t);

    rec.pause();
    assert_eq!(rec.state(), RecorderState::Paused);
    assert_eq!(
        rec.push(RawFix::new(lat, 8.0, 5.0, t)),
        Err(TrackError::RecorderPaused)
    );

    // Five minutes standing at a crossing
    t += 300_000;
    rec.resume();
    assert!(!rec.filter().is_initialized());
    run_blocks(&mut rec, &[(300, 300.0)], &mut lat, &mut t);

    let route = rec.finish().unwrap();
    let analysis = analyze_route(&route, &[], &AnalysisConfig::default()).unwrap();

    assert!(approx_eq(analysis.moving_time_s, 598.0, 1e-9));
    assert!(analysis.duration_s > 890.0);
    assert!(approx_eq(analysis.average_pace_sec_per_km.unwrap(), 300.0, 5.0));
    assert_eq!(analysis.splits.len(), 1);
    assert!(approx_eq(analysis.splits[0].pace_sec_per_km.unwrap(), 300.0, 5.0));
}

#[test]
fn test_restart_from_stored_points() {
    init_logging();
    let mut rec = RunRecorder::new();
    let (mut lat, mut t) = (47.0, START_MS);
    run_blocks(&mut rec, &[(120, 300.0)], &mut lat, &mut t);
    let stored = rec.points().to_vec();

    // Process killed and restored from persistence
    let mut restored = RunRecorder::from_stored(stored, FilterConfig::default()).unwrap();
    assert_eq!(restored.len(), 120);
    assert!(restored.push(RawFix::new(lat, 8.0, 5.0, START_MS)).is_err());
    run_blocks(&mut restored, &[(120, 300.0)], &mut lat, &mut t);

    let route = restored.finish().unwrap();
    assert_eq!(route.len(), 240);
    assert!(route
        .points()
        .windows(2)
        .all(|w| w[0].timestamp_ms <= w[1].timestamp_ms));
}

#[test]
fn test_exports_from_recorded_route() {
    init_logging();
    let mut rec = RunRecorder::new();
    let (mut lat, mut t) = (47.0, START_MS);
    run_blocks(&mut rec, &[(60, 300.0), (60, 400.0)], &mut lat, &mut t);
    let route = rec.finish().unwrap();

    let gpx = gpx_track_points(route.points()).unwrap();
    assert_eq!(gpx.len(), route.len());
    assert_eq!(gpx[0].time, "2024-03-01T07:15:00.000Z");
    // Fixed-width ISO-8601 sorts lexicographically
    assert!(gpx.windows(2).all(|w| w[0].time < w[1].time));
    assert_eq!(gpx[0].ele, 410.0);
    assert!(gpx.iter().all(|p| p.pace_sec_per_km.is_some()));

    let chart = chart_series(route.points(), &MetricsConfig::default());
    assert_eq!(chart.distance_km.len(), route.len());
    assert!(chart.pace.iter().flatten().all(|p| (0.0..=1.0).contains(p)));
    assert!(chart.elevation.iter().all(|&e| e == 0.5));

    let map = simplify_with(route.points(), SimplifyTolerance::Standard).unwrap();
    assert_eq!(map.first(), route.points().first());
    assert_eq!(map.last(), route.points().last());
    assert!(map.len() < route.len());
}

#[test]
fn test_patchy_altitude_keeps_flat_run_flat() {
    init_logging();
    let deg_per_m = 1.0 / EARTH_RADIUS_M.to_radians();
    let speed = 1000.0 / 300.0;
    let mut rec = RunRecorder::new();
    let mut lat = 47.0;
    for i in 0..600i64 {
        let mut fix = RawFix::new(lat, 8.0, 5.0, START_MS + i * 1_000).with_speed(speed);
        // No altitude on the first two fixes and on every 30th after that
        if i >= 2 && i % 30 != 0 {
            fix = fix.with_altitude(410.0);
        }
        rec.push(fix).unwrap();
        lat += speed * deg_per_m;
    }
    let route = rec.finish().unwrap();
    assert!(route.points().iter().all(|p| p.altitude == 410.0));

    let analysis = analyze_route(&route, &[], &AnalysisConfig::default()).unwrap();
    assert_eq!(analysis.elevation_gain_m, 0.0);
    assert_eq!(analysis.elevation_loss_m, 0.0);
    assert!(!analysis.gap_available);
    assert_eq!(analysis.splits.len(), 1);
    let split = &analysis.splits[0];
    assert_eq!(split.avg_grade_percent, None);
    assert_eq!(split.grade_adjusted_pace_sec_per_km, split.pace_sec_per_km);
}

#[test]
fn test_stored_route_round_trips_through_json() {
    let mut rec = RunRecorder::new();
    let (mut lat, mut t) = (47.0, START_MS);
    run_blocks(&mut rec, &[(30, 300.0)], &mut lat, &mut t);
    let route = rec.finish().unwrap();

    let json = serde_json::to_string(&route).unwrap();
    let restored: Route = serde_json::from_str(&json).unwrap();
    assert!(analyze_route(&restored, &[], &AnalysisConfig::default()).is_ok());

    // An empty stored route is rejected at the boundary instead of panicking later
    assert!(serde_json::from_str::<Route>(r#"{"points":[]}"#).is_err());
}

#[test]
fn test_empty_run_cannot_finish() {
    assert_eq!(RunRecorder::new().finish(), Err(TrackError::EmptyRoute));
}
