pub mod geo;
pub mod stats;

pub use geo::{GeoHelper, EARTH_RADIUS_M};
pub use stats::RunningCentroid;
