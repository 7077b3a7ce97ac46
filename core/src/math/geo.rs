use crate::prelude::Coordinate;

/// Mean Earth radius used by every distance and ring computation.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub struct GeoHelper;

impl GeoHelper {
    /// Great-circle distance in meters.
    pub fn haversine_m(a: Coordinate, b: Coordinate) -> f64 {
        let lat1 = a.lat.to_radians();
        let lat2 = b.lat.to_radians();
        let d_lat = (b.lat - a.lat).to_radians();
        let d_lng = (b.lng - a.lng).to_radians();

        // rounding can push h just past 1 for near-antipodal pairs
        let h = ((d_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2))
        .clamp(0.0, 1.0);
        2.0 * EARTH_RADIUS_M * h.sqrt().asin()
    }

    /// Euclidean distance treating lat/lng degrees as Cartesian axes.
    pub fn planar_distance_deg(a: Coordinate, b: Coordinate) -> f64 {
        (a.lat - b.lat).hypot(a.lng - b.lng)
    }

    /// Planar meters between two nearby points on a flat projection at `a`'s latitude.
    pub fn planar_distance_m(a: Coordinate, b: Coordinate) -> f64 {
        let dy = (b.lat - a.lat).to_radians() * EARTH_RADIUS_M;
        let dx = (b.lng - a.lng).to_radians() * EARTH_RADIUS_M * a.lat.to_radians().cos();
        dx.hypot(dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_zero_for_identical_points() {
        let p = Coordinate::new(14.297567, 101.166279);
        assert_eq!(GeoHelper::haversine_m(p, p), 0.0);
    }

    #[test]
    fn haversine_along_meridian_matches_arc_length() {
        let a = Coordinate::new(14.0, 101.0);
        let b = Coordinate::new(15.0, 101.0);
        let expected = 1.0_f64.to_radians() * EARTH_RADIUS_M;
        assert!((GeoHelper::haversine_m(a, b) - expected).abs() < 1e-6);
    }

    #[test]
    fn haversine_stays_finite_for_antipodal_points() {
        let half_circumference = std::f64::consts::PI * EARTH_RADIUS_M;
        for step in 0..2000 {
            let lat = -89.0 + step as f64 * (178.0 / 2000.0);
            let a = Coordinate::new(lat, 10.0);
            let b = Coordinate::new(-lat, -170.0 + 1e-9);
            let distance = GeoHelper::haversine_m(a, b);
            assert!(distance.is_finite(), "NaN distance at lat {}", lat);
            assert!((distance - half_circumference).abs() < 1.0);
        }
    }

    #[test]
    fn planar_distance_is_degree_euclidean() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(0.003, 0.004);
        assert!((GeoHelper::planar_distance_deg(a, b) - 0.005).abs() < 1e-12);
    }
}
