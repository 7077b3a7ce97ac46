pub mod camera;
pub mod detection;

pub use camera::{CameraFeed, HistoryResponse};
pub use detection::{DetectedObject, DetectionEvent, Numeric, TargetPoint, Telemetry};
