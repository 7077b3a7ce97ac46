use anyhow::{ensure, Context};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use skywatchcore::feed_interface::{
    CameraFeed, DetectedObject, DetectionEvent, Numeric, TargetPoint, Telemetry,
};
use skywatchcore::math::EARTH_RADIUS_M;
use skywatchcore::Coordinate;
use std::f64::consts::TAU;

/// Upper bound on the spacing between frames (one day).
pub const MAX_INTERVAL_S: i64 = 86_400;
pub const MAX_FRAMES: usize = 10_000;
pub const MAX_DRONES: usize = 10_000;

/// Configuration for generating synthetic detection traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub center: Coordinate,
    pub drones: usize,
    pub frames: usize,
    pub spread_m: f64,
    pub interval_s: i64,
    pub max_speed: f64,
    /// Share of objects reporting through the nested telemetry block.
    pub telemetry_ratio: f64,
    pub seed: u64,
    pub start: DateTime<Utc>,
    pub description: Option<String>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            center: Coordinate::new(14.297567, 101.166279),
            drones: 6,
            frames: 10,
            spread_m: 3000.0,
            interval_s: 5,
            max_speed: 15.0,
            telemetry_ratio: 0.5,
            seed: 0,
            start: DateTime::<Utc>::UNIX_EPOCH,
            description: None,
        }
    }
}

struct Track {
    obj_id: String,
    category: &'static str,
    feed: CameraFeed,
    start: Coordinate,
    heading: f64,
    speed: f64,
    via_telemetry: bool,
}

fn offset(center: Coordinate, north_m: f64, east_m: f64) -> Coordinate {
    Coordinate::new(
        center.lat + (north_m / EARTH_RADIUS_M).to_degrees(),
        center.lng + (east_m / (EARTH_RADIUS_M * center.lat.to_radians().cos())).to_degrees(),
    )
}

fn build_tracks(config: &ScenarioConfig, rng: &mut StdRng) -> Vec<Track> {
    (0..config.drones)
        .map(|index| {
            let bearing = rng.gen_range(0.0..TAU);
            let range = rng.gen_range(0.2..1.0) * config.spread_m;
            let start = offset(config.center, range * bearing.cos(), range * bearing.sin());
            Track {
                obj_id: format!("obj_{:03}", index + 1),
                category: if index % 4 == 3 { "bird" } else { "drone" },
                feed: CameraFeed::ALL[index % CameraFeed::ALL.len()],
                start,
                // inbound toward the center
                heading: bearing + TAU / 2.0,
                speed: rng.gen_range(0.0..config.max_speed.max(f64::EPSILON)),
                via_telemetry: rng.gen_bool(config.telemetry_ratio.clamp(0.0, 1.0)),
            }
        })
        .collect()
}

fn observe(track: &Track, position: Coordinate, center: Coordinate) -> DetectedObject {
    let object = DetectedObject::new(track.obj_id.clone(), track.category);
    if track.via_telemetry {
        object.with_telemetry(Telemetry {
            lat: Some(Numeric::Text(format!("{:.6}", position.lat))),
            lng: Some(Numeric::Text(format!("{:.6}", position.lng))),
            alt: Some(Numeric::Number(120.0)),
            speed: Some(Numeric::Number(track.speed)),
            target: Some(TargetPoint {
                lat: Some(Numeric::Number(center.lat)),
                lng: Some(Numeric::Number(center.lng)),
            }),
        })
    } else {
        object
            .with_position(position.lat, position.lng)
            .with_speed(track.speed)
    }
}

/// Synthetic events, oldest frame first, one event per camera per frame.
pub fn build_scenario_events(config: &ScenarioConfig) -> anyhow::Result<Vec<DetectionEvent>> {
    ensure!(
        config.spread_m.is_finite() && config.spread_m > 0.0,
        "scenario spread must be positive"
    );
    ensure!(
        (0..=MAX_INTERVAL_S).contains(&config.interval_s),
        "scenario interval must be between 0 and {} seconds",
        MAX_INTERVAL_S
    );
    ensure!(
        config.max_speed.is_finite() && config.max_speed >= 0.0,
        "scenario max speed must be a finite, non-negative number"
    );
    ensure!(
        config.telemetry_ratio.is_finite(),
        "scenario telemetry ratio must be a finite number"
    );
    ensure!(
        config.frames <= MAX_FRAMES && config.drones <= MAX_DRONES,
        "scenario is limited to {} frames and {} drones",
        MAX_FRAMES,
        MAX_DRONES
    );

    let mut rng = StdRng::seed_from_u64(config.seed);
    let tracks = build_tracks(config, &mut rng);
    let mut events = Vec::with_capacity(config.frames * CameraFeed::ALL.len());

    for frame in 0..config.frames {
        let elapsed = (frame as i64)
            .checked_mul(config.interval_s)
            .context("scenario duration overflows")?;
        let timestamp = Duration::try_seconds(elapsed)
            .and_then(|offset| config.start.checked_add_signed(offset))
            .with_context(|| format!("frame {} falls outside the supported time range", frame))?
            .to_rfc3339();
        for feed in CameraFeed::ALL {
            let objects: Vec<DetectedObject> = tracks
                .iter()
                .filter(|track| track.feed == feed)
                .map(|track| {
                    let travelled = track.speed * elapsed as f64;
                    let position = offset(
                        track.start,
                        travelled * track.heading.cos(),
                        travelled * track.heading.sin(),
                    );
                    observe(track, position, config.center)
                })
                .collect();
            let mut event = DetectionEvent::new(
                format!("{}-{:04}", feed, frame),
                feed.as_str(),
                timestamp.clone(),
                objects,
            );
            event.image_path = Some(format!("/captures/{}/{:04}.jpg", feed, frame));
            events.push(event);
        }
    }

    Ok(events)
}
