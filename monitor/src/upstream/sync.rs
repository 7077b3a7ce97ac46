use crate::upstream::client::HistoryClient;
use crate::workflow::config::UpstreamConfig;
use crate::workflow::runner::Runner;
use anyhow::Context;
use log::{info, warn};
use skywatchcore::feed_interface::CameraFeed;
use std::sync::Arc;
use std::time::Duration;

/// Exponential retry delay: doubles on every failure up to `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(Duration::from_millis(1));
        let max = max.max(initial);
        Self {
            initial,
            max,
            current: initial,
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

/// Polls the upstream history for both cameras and keeps the connectivity flag.
///
/// A successful pass after a failure refetches everything, which is also how
/// state is recovered after an outage.
pub struct HistorySync {
    client: Arc<HistoryClient>,
    runner: Runner,
    interval: Duration,
    backoff: Backoff,
}

impl HistorySync {
    pub fn new(client: Arc<HistoryClient>, runner: Runner, config: &UpstreamConfig) -> Self {
        Self {
            client,
            runner,
            interval: Duration::from_secs(config.poll_secs.max(1)),
            backoff: Backoff::new(
                Duration::from_millis(config.backoff_initial_ms),
                Duration::from_millis(config.backoff_max_ms),
            ),
        }
    }

    pub async fn sync_once(&self) -> anyhow::Result<()> {
        for feed in CameraFeed::ALL {
            let cam_id = self.runner.camera_id(feed).to_string();
            let events = self
                .client
                .fetch_history(&cam_id)
                .await
                .with_context(|| format!("syncing {} history", feed))?;
            self.runner.ingest_history(feed, events);
        }
        Ok(())
    }

    /// One poll pass: updates the connectivity flag and returns the delay before the next.
    pub async fn tick(&mut self) -> Duration {
        match self.sync_once().await {
            Ok(()) => {
                if !self.runner.is_connected() {
                    info!("upstream history reachable, state refreshed");
                }
                self.runner.set_connected(true);
                self.backoff.reset();
                self.interval
            }
            Err(err) => {
                self.runner.set_connected(false);
                self.runner.metrics().record_transport_error();
                self.runner
                    .report_status(format!("History unavailable: {:#}", err));
                let delay = self.backoff.next_delay();
                warn!("{:#}; retrying in {:?}", err, delay);
                delay
            }
        }
    }

    pub async fn run(mut self) {
        loop {
            let delay = self.tick().await;
            tokio::time::sleep(delay).await;
        }
    }
}
