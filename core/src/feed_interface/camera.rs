use crate::feed_interface::detection::DetectionEvent;
use crate::prelude::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two fixed camera feeds reporting detections.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum CameraFeed {
    Offensive,
    Defensive,
}

impl CameraFeed {
    pub const ALL: [CameraFeed; 2] = [CameraFeed::Offensive, CameraFeed::Defensive];

    pub fn as_str(&self) -> &'static str {
        match self {
            CameraFeed::Offensive => "offensive",
            CameraFeed::Defensive => "defensive",
        }
    }
}

impl fmt::Display for CameraFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CameraFeed {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "offensive" => Ok(CameraFeed::Offensive),
            "defensive" => Ok(CameraFeed::Defensive),
            other => Err(CoreError::UnknownCamera(other.to_string())),
        }
    }
}

/// Envelope returned by the upstream history endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Vec<DetectionEvent>,
}

impl HistoryResponse {
    pub fn decode(body: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(body)?)
    }
}
