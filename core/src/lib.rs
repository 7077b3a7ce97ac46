//! Detection aggregation, spatial clustering, and geofence alerting core for Skywatch.
//!
//! Events from the offensive and defensive camera feeds are folded into a
//! per-object registry, grouped into zoom-adaptive markers, and scored against
//! a movable defended point. All derivations are pure; `SituationController`
//! re-runs them in dependency order whenever an input changes.

pub mod feed_interface;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod telemetry;

pub use prelude::{Coordinate, CoreError, CoreResult, PipelineConfig};
