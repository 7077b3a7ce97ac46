use crate::math::EARTH_RADIUS_M;
use crate::prelude::Coordinate;
use std::f64::consts::TAU;

pub const DEFAULT_RING_STEPS: usize = 64;
const MIN_RING_STEPS: usize = 3;

/// Closed polygon approximating a circle of `radius_m` around `center`.
///
/// Offsets are computed on a flat projection; the longitude offset is widened
/// by `1 / cos(lat)` so the ring stays round on screen away from the equator.
/// Returns `steps + 1` points with the last equal to the first.
pub fn build_ring(center: Coordinate, radius_m: f64, steps: usize) -> Vec<Coordinate> {
    let steps = steps.max(MIN_RING_STEPS);
    let angular = radius_m / EARTH_RADIUS_M;
    let lng_scale = 1.0 / center.lat.to_radians().cos();

    let mut ring: Vec<Coordinate> = (0..steps)
        .map(|i| {
            let angle = (i as f64 / steps as f64) * TAU;
            let dx = angular * angle.cos();
            let dy = angular * angle.sin();
            Coordinate::new(
                center.lat + dy.to_degrees(),
                center.lng + dx.to_degrees() * lng_scale,
            )
        })
        .collect();
    if let Some(first) = ring.first().copied() {
        ring.push(first);
    }
    ring
}
