use crate::processing::aggregator::LastSeenPolicy;
use crate::processing::cluster::ClusterOrdering;
use serde::{Deserialize, Serialize};

/// Geographic point in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    #[serde(alias = "lon")]
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Shared configuration for the aggregation pipeline and its controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub last_seen_policy: LastSeenPolicy,
    pub cluster_ordering: ClusterOrdering,
    pub ring_steps: usize,
    pub zoom: f64,
    pub defended_point: Option<Coordinate>,
    pub radius_m: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            last_seen_policy: LastSeenPolicy::ArrayOrder,
            cluster_ordering: ClusterOrdering::Input,
            ring_steps: 64,
            zoom: 13.0,
            defended_point: None,
            radius_m: 1500.0,
        }
    }
}

/// Common error type for the core.
#[derive(thiserror::Error, Debug)]
pub enum CoreError {
    #[error("invalid radius: {0}")]
    InvalidRadius(String),
    #[error("invalid zoom: {0}")]
    InvalidZoom(f64),
    #[error("unknown camera: {0}")]
    UnknownCamera(String),
    #[error("decode failure: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
