use crate::feed_interface::{DetectedObject, DetectionEvent};
use crate::math::GeoHelper;
use crate::prelude::Coordinate;
use serde::Serialize;
use std::collections::HashSet;

/// One object inside the detection radius.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Intrusion {
    pub object: DetectedObject,
    pub distance_m: f64,
    pub eta_s: Option<f64>,
}

impl Intrusion {
    pub fn distance_label(&self) -> String {
        format_distance(self.distance_m)
    }

    pub fn eta_label(&self) -> String {
        format_eta(self.eta_s)
    }
}

/// Scans raw events for objects within `radius_m` of the defended point.
///
/// The first occurrence of an id in event order is the one reported; later
/// occurrences are ignored even when closer. Output is sorted closest first.
pub fn find_intruders(
    events: &[DetectionEvent],
    defended_point: Option<Coordinate>,
    radius_m: f64,
) -> Vec<Intrusion> {
    let Some(center) = defended_point else {
        return Vec::new();
    };
    if !radius_m.is_finite() || radius_m <= 0.0 {
        return Vec::new();
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut intrusions = Vec::new();

    for event in events {
        for object in &event.objects {
            let Some(position) = object.position() else {
                continue;
            };
            let distance_m = GeoHelper::haversine_m(center, position);
            if distance_m.is_nan() || distance_m > radius_m {
                continue;
            }
            if !seen.insert(object.obj_id.as_str()) {
                continue;
            }
            let eta_s = object
                .speed_mps()
                .filter(|speed| *speed > 0.0)
                .map(|speed| distance_m / speed);
            intrusions.push(Intrusion {
                object: object.clone(),
                distance_m,
                eta_s,
            });
        }
    }

    intrusions.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));
    intrusions
}

/// `"850 m"` below one kilometer, `"1.25 km"` at or above.
pub fn format_distance(distance_m: f64) -> String {
    if distance_m < 1000.0 {
        format!("{} m", distance_m.round() as i64)
    } else {
        format!("{:.2} km", distance_m / 1000.0)
    }
}

/// `"45s"`, `"1m 40s"`, `"2m"`, or `"N/A"` without a usable speed.
pub fn format_eta(eta_s: Option<f64>) -> String {
    let Some(seconds) = eta_s.filter(|s| s.is_finite()) else {
        return "N/A".to_string();
    };
    let total = seconds.round().max(0.0) as u64;
    if total < 60 {
        return format!("{}s", total.max(1));
    }
    let minutes = total / 60;
    let remainder = total % 60;
    if remainder == 0 {
        format!("{}m", minutes)
    } else {
        format!("{}m {}s", minutes, remainder)
    }
}
