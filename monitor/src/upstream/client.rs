use crate::workflow::config::UpstreamConfig;
use anyhow::{bail, Context};
use skywatchcore::feed_interface::{DetectionEvent, HistoryResponse};
use std::time::Duration;

pub const TOKEN_HEADER: &str = "x-access-token";

/// REST client for the upstream detection API.
pub struct HistoryClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HistoryClient {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("building upstream HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn detections_url(&self) -> String {
        format!("{}/detections", self.base_url)
    }

    pub async fn fetch_history(&self, cam_id: &str) -> anyhow::Result<Vec<DetectionEvent>> {
        let response = self
            .http
            .get(self.detections_url())
            .query(&[("cam_id", cam_id)])
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await
            .with_context(|| format!("requesting history for {}", cam_id))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("reading history body for {}", cam_id))?;
        if !status.is_success() {
            bail!("history fetch for {} failed ({}): {}", cam_id, status, body);
        }

        let envelope = HistoryResponse::decode(&body)
            .with_context(|| format!("decoding history for {}", cam_id))?;
        if !envelope.success {
            bail!("upstream reported failure fetching history for {}", cam_id);
        }
        Ok(envelope.data)
    }

    /// The error carries the upstream response body on failure.
    pub async fn clear_history(&self, cam_id: &str) -> anyhow::Result<()> {
        let response = self
            .http
            .delete(self.detections_url())
            .query(&[("cam_id", cam_id)])
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await
            .with_context(|| format!("requesting history clear for {}", cam_id))?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        if body.is_empty() {
            bail!("clearing history for {} failed ({})", cam_id, status);
        }
        bail!("{}", body)
    }
}
