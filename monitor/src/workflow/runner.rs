use crate::generator::profile::{build_scenario_events, ScenarioConfig};
use crate::gui_bridge::model::VisualizationModel;
use crate::workflow::config::{CameraIds, MonitorConfig};
use anyhow::Context;
use skywatchcore::feed_interface::{CameraFeed, DetectionEvent};
use skywatchcore::processing::{Intrusion, SituationController};
use skywatchcore::telemetry::MetricsRecorder;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// How long a user-facing status message stays visible.
pub const STATUS_TTL: Duration = Duration::from_millis(4000);

pub struct WorkflowResult {
    pub event_count: usize,
    pub object_count: usize,
    pub marker_count: usize,
    pub cluster_count: usize,
    pub intruders: Vec<Intrusion>,
}

struct StatusMessage {
    text: String,
    expires_at: Instant,
}

/// Shared handle over the controller plus the service-level flags around it.
#[derive(Clone)]
pub struct Runner {
    controller: Arc<Mutex<SituationController>>,
    metrics: Arc<MetricsRecorder>,
    connected: Arc<AtomicBool>,
    status: Arc<Mutex<Option<StatusMessage>>>,
    cameras: CameraIds,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Runner {
    pub fn new(config: &MonitorConfig) -> anyhow::Result<Self> {
        let controller = SituationController::new(config.pipeline.clone())
            .context("building situation controller")?;
        Ok(Self {
            metrics: controller.metrics(),
            controller: Arc::new(Mutex::new(controller)),
            connected: Arc::new(AtomicBool::new(false)),
            status: Arc::new(Mutex::new(None)),
            cameras: config.cameras.clone(),
        })
    }

    pub fn with_controller<R>(&self, f: impl FnOnce(&mut SituationController) -> R) -> R {
        let mut guard = lock(&self.controller);
        f(&mut guard)
    }

    pub fn camera_id(&self, feed: CameraFeed) -> &str {
        self.cameras.id(feed)
    }

    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        self.metrics.clone()
    }

    pub fn ingest_live(&self, event: DetectionEvent) {
        self.with_controller(|ctl| ctl.push_live(event));
    }

    pub fn ingest_history(&self, feed: CameraFeed, events: Vec<DetectionEvent>) {
        let cam_id = self.camera_id(feed).to_string();
        self.with_controller(|ctl| ctl.apply_history(&cam_id, events));
    }

    /// Local cache invalidation after a successful clear command.
    pub fn clear_local(&self, feed: CameraFeed) -> usize {
        let cam_id = self.camera_id(feed).to_string();
        self.with_controller(|ctl| ctl.clear_history(&cam_id))
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn report_status(&self, text: impl Into<String>) {
        self.report_status_at(text, Instant::now());
    }

    fn report_status_at(&self, text: impl Into<String>, now: Instant) {
        *lock(&self.status) = Some(StatusMessage {
            text: text.into(),
            expires_at: now + STATUS_TTL,
        });
    }

    pub fn status(&self) -> Option<String> {
        self.status_at(Instant::now())
    }

    fn status_at(&self, now: Instant) -> Option<String> {
        let mut guard = lock(&self.status);
        if guard.as_ref().is_some_and(|message| message.expires_at <= now) {
            *guard = None;
        }
        guard.as_ref().map(|message| message.text.clone())
    }

    pub fn view(&self) -> VisualizationModel {
        let snapshot = self.with_controller(|ctl| ctl.snapshot());
        VisualizationModel::from_snapshot(
            &snapshot,
            self.is_connected(),
            self.status(),
            self.metrics.snapshot(),
        )
    }

    /// Feeds a synthetic scenario through the controller as history batches.
    pub fn execute(&self, scenario: &ScenarioConfig) -> anyhow::Result<WorkflowResult> {
        let events = build_scenario_events(scenario).context("generating scenario events")?;

        for feed in CameraFeed::ALL {
            let batch: Vec<DetectionEvent> = events
                .iter()
                .filter(|event| event.cam_id == feed.as_str())
                .cloned()
                .map(|mut event| {
                    event.cam_id = self.camera_id(feed).to_string();
                    event
                })
                .collect();
            self.ingest_history(feed, batch);
        }

        let snapshot = self.with_controller(|ctl| ctl.snapshot());
        Ok(WorkflowResult {
            event_count: snapshot.event_count,
            object_count: snapshot.registry.len(),
            marker_count: snapshot.markers.len(),
            cluster_count: snapshot.markers.iter().filter(|m| m.is_cluster()).count(),
            intruders: snapshot.intruders.clone(),
        })
    }
}
