use crate::generator::profile::ScenarioConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use skywatchcore::feed_interface::CameraFeed;
use skywatchcore::{Coordinate, PipelineConfig};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Wire camera ids for the two feeds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraIds {
    pub offensive: String,
    pub defensive: String,
}

impl Default for CameraIds {
    fn default() -> Self {
        Self {
            offensive: CameraFeed::Offensive.as_str().to_string(),
            defensive: CameraFeed::Defensive.as_str().to_string(),
        }
    }
}

impl CameraIds {
    pub fn id(&self, feed: CameraFeed) -> &str {
        match feed {
            CameraFeed::Offensive => &self.offensive,
            CameraFeed::Defensive => &self.defensive,
        }
    }
}

/// Upstream detection API used for history sync and clear commands.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub token: String,
    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_poll_secs() -> u64 {
    30
}

fn default_backoff_initial_ms() -> u64 {
    500
}

fn default_backoff_max_ms() -> u64 {
    30_000
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub bind: SocketAddr,
    pub cameras: CameraIds,
    pub pipeline: PipelineConfig,
    pub upstream: Option<UpstreamConfig>,
    pub scenario: ScenarioConfig,
    pub report_path: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 9000)),
            cameras: CameraIds::default(),
            pipeline: PipelineConfig::default(),
            upstream: None,
            scenario: ScenarioConfig::default(),
            report_path: PathBuf::from("tools/data/offline_summary.log"),
        }
    }
}

impl MonitorConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading monitor config {}", path_ref.display()))?;
        let config: MonitorConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing monitor config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(
        defended_point: Option<Coordinate>,
        radius_m: f64,
        zoom: f64,
        upstream: Option<UpstreamConfig>,
    ) -> Self {
        let mut config = Self::default();
        config.pipeline.defended_point = defended_point;
        config.pipeline.radius_m = radius_m;
        config.pipeline.zoom = zoom;
        config.upstream = upstream;
        if let Some(point) = defended_point {
            config.scenario.center = point;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skywatchcore::processing::{ClusterOrdering, LastSeenPolicy};
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_fills_pipeline() {
        let cfg = MonitorConfig::from_args(Some(Coordinate::new(14.3, 101.1)), 800.0, 12.0, None);
        assert_eq!(cfg.pipeline.radius_m, 800.0);
        assert_eq!(cfg.pipeline.zoom, 12.0);
        assert_eq!(cfg.scenario.center, Coordinate::new(14.3, 101.1));
        assert_eq!(cfg.cameras.id(CameraFeed::Defensive), "defensive");
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"bind: 0.0.0.0:9100
cameras:
  offensive: cam-a
pipeline:
  last_seen_policy: latest_timestamp
  cluster_ordering: by_id
  defended_point: { lat: 14.297567, lng: 101.166279 }
  radius_m: 1500
upstream:
  base_url: http://detector.local/api
  token: secret
",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = MonitorConfig::load(&path).unwrap();

        assert_eq!(cfg.bind.port(), 9100);
        assert_eq!(cfg.cameras.id(CameraFeed::Offensive), "cam-a");
        assert_eq!(cfg.cameras.id(CameraFeed::Defensive), "defensive");
        assert_eq!(cfg.pipeline.last_seen_policy, LastSeenPolicy::LatestTimestamp);
        assert_eq!(cfg.pipeline.cluster_ordering, ClusterOrdering::ById);
        assert_eq!(cfg.pipeline.ring_steps, 64);
        let upstream = cfg.upstream.unwrap();
        assert_eq!(upstream.poll_secs, 30);
        assert_eq!(upstream.token, "secret");
    }

    #[test]
    fn config_load_reports_missing_file() {
        let err = MonitorConfig::load("/nonexistent/monitor.yaml").unwrap_err();
        assert!(err.to_string().contains("reading monitor config"));
    }
}
