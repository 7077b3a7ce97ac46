use crate::feed_interface::DetectionEvent;
use crate::prelude::{Coordinate, CoreError, CoreResult, PipelineConfig};
use crate::processing::aggregator::{FeedAggregator, LatestObjectEntry};
use crate::processing::cluster::{MarkerDescriptor, SpatialClusterer};
use crate::processing::geofence::build_ring;
use crate::processing::proximity::{find_intruders, Intrusion};
use crate::telemetry::{LogManager, MetricsRecorder};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Immutable view published after every update cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub revision: u64,
    pub event_count: usize,
    pub registry: Vec<LatestObjectEntry>,
    pub markers: Vec<MarkerDescriptor>,
    pub intruders: Vec<Intrusion>,
    pub ring: Vec<Coordinate>,
    pub zoom: f64,
    pub defended_point: Option<Coordinate>,
    pub radius_m: f64,
    pub selected: Option<String>,
}

/// Marker keys that appeared, disappeared, or survived between two cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarkerDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub retained: Vec<String>,
}

impl MarkerDiff {
    pub fn between(previous: &[MarkerDescriptor], next: &[MarkerDescriptor]) -> Self {
        let before: HashSet<String> = previous.iter().map(MarkerDescriptor::key).collect();
        let after: Vec<String> = next.iter().map(MarkerDescriptor::key).collect();
        let after_set: HashSet<&String> = after.iter().collect();

        let mut diff = MarkerDiff::default();
        for key in &after {
            if before.contains(key) {
                diff.retained.push(key.clone());
            } else {
                diff.added.push(key.clone());
            }
        }
        diff.removed = previous
            .iter()
            .map(MarkerDescriptor::key)
            .filter(|key| !after_set.contains(key))
            .collect();
        diff
    }

    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Notifications for the rendering layer and other collaborators.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    SnapshotPublished(Arc<Snapshot>),
    MarkersChanged(MarkerDiff),
    SelectionChanged(Option<String>),
    /// The defended point or radius moved; persistence hooks listen for this.
    DefendedPointChanged {
        point: Option<Coordinate>,
        radius_m: f64,
    },
}

/// Owns the working event list and view inputs, and re-derives the registry,
/// markers, intruders, and geofence ring whenever one of them changes.
pub struct SituationController {
    config: PipelineConfig,
    aggregator: FeedAggregator,
    clusterer: SpatialClusterer,
    /// Live events (newest first) followed by history batches.
    events: Vec<DetectionEvent>,
    live_count: usize,
    zoom: f64,
    defended_point: Option<Coordinate>,
    radius_m: f64,
    selected: Option<String>,
    ring: Vec<Coordinate>,
    current: Arc<Snapshot>,
    event_tx: broadcast::Sender<ControllerEvent>,
    snapshot_tx: watch::Sender<Arc<Snapshot>>,
    logger: LogManager,
    metrics: Arc<MetricsRecorder>,
}

impl SituationController {
    pub fn new(config: PipelineConfig) -> CoreResult<Self> {
        validate_zoom(config.zoom)?;
        validate_radius(config.radius_m)?;

        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let current = Arc::new(Snapshot::default());
        let (snapshot_tx, _) = watch::channel(current.clone());

        let mut controller = Self {
            aggregator: FeedAggregator::new(config.last_seen_policy),
            clusterer: SpatialClusterer::new(config.cluster_ordering),
            events: Vec::new(),
            live_count: 0,
            zoom: config.zoom,
            defended_point: config.defended_point,
            radius_m: config.radius_m,
            selected: None,
            ring: Vec::new(),
            current,
            event_tx,
            snapshot_tx,
            logger: LogManager::new("skywatch::controller"),
            metrics: Arc::new(MetricsRecorder::new()),
            config,
        };
        controller.recompute(true);
        Ok(controller)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.event_tx.subscribe()
    }

    pub fn watch(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot_tx.subscribe()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.clone()
    }

    pub fn events(&self) -> &[DetectionEvent] {
        &self.events
    }

    pub fn metrics(&self) -> Arc<MetricsRecorder> {
        self.metrics.clone()
    }

    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    /// Replaces the history of `cam_id` with the batch, kept in batch order
    /// after the other camera's history. Live events from the same camera that
    /// the batch already contains (same event id) are dropped.
    pub fn apply_history(&mut self, cam_id: &str, batch: Vec<DetectionEvent>) {
        self.metrics.record_events(batch.len());
        self.logger.record(&format!(
            "history for {}: {} events",
            cam_id,
            batch.len()
        ));
        let absorbed: HashSet<String> = batch.iter().map(|event| event.id.clone()).collect();

        let history = self.events.split_off(self.live_count);
        let mut working = std::mem::take(&mut self.events);
        working.retain(|event| !(event.cam_id == cam_id && absorbed.contains(&event.id)));
        self.live_count = working.len();
        working.extend(history.into_iter().filter(|event| event.cam_id != cam_id));
        working.extend(batch);
        self.events = working;
        self.recompute(false);
    }

    /// Live pushes go to the front of the working list.
    pub fn push_live(&mut self, event: DetectionEvent) {
        self.metrics.record_events(1);
        self.logger.trace_cycle(&format!(
            "live event {} from {} ({} objects)",
            event.id,
            event.cam_id,
            event.objects.len()
        ));
        self.events.insert(0, event);
        self.live_count += 1;
        self.recompute(false);
    }

    /// Drops every local event of a camera. Returns how many went.
    pub fn clear_history(&mut self, cam_id: &str) -> usize {
        let before = self.events.len();
        let mut history = self.events.split_off(self.live_count);
        self.events.retain(|event| event.cam_id != cam_id);
        self.live_count = self.events.len();
        history.retain(|event| event.cam_id != cam_id);
        self.events.extend(history);

        let removed = before - self.events.len();
        self.logger
            .record(&format!("cleared {} events for {}", removed, cam_id));
        self.recompute(false);
        removed
    }

    pub fn set_zoom(&mut self, zoom: f64) -> CoreResult<()> {
        validate_zoom(zoom)?;
        self.zoom = zoom;
        self.recompute(false);
        Ok(())
    }

    pub fn set_defended_point(&mut self, point: Option<Coordinate>) {
        self.defended_point = point;
        self.recompute(true);
        self.notify_defended_point();
    }

    /// Rejects non-positive or non-finite radii and keeps the previous value.
    pub fn set_radius(&mut self, radius_m: f64) -> CoreResult<()> {
        if let Err(err) = validate_radius(radius_m) {
            self.logger.warn(&format!(
                "{}; keeping {} m",
                err, self.radius_m
            ));
            return Err(err);
        }
        self.radius_m = radius_m;
        self.recompute(true);
        self.notify_defended_point();
        Ok(())
    }

    /// Radius as typed by a user.
    pub fn set_radius_input(&mut self, input: &str) -> CoreResult<()> {
        let radius_m = input
            .trim()
            .parse::<f64>()
            .map_err(|_| CoreError::InvalidRadius(input.to_string()))?;
        self.set_radius(radius_m)
    }

    pub fn select(&mut self, obj_id: Option<String>) {
        if self.selected == obj_id {
            return;
        }
        self.selected = obj_id.clone();
        let mut snapshot = (*self.current).clone();
        snapshot.revision += 1;
        snapshot.selected = obj_id.clone();
        self.publish(Arc::new(snapshot), None);
        let _ = self.event_tx.send(ControllerEvent::SelectionChanged(obj_id));
    }

    fn notify_defended_point(&self) {
        let _ = self.event_tx.send(ControllerEvent::DefendedPointChanged {
            point: self.defended_point,
            radius_m: self.radius_m,
        });
    }

    fn recompute(&mut self, ring_changed: bool) {
        let registry = self.aggregator.build_registry(&self.events);
        let entries: Vec<LatestObjectEntry> =
            registry.by_recency().into_iter().cloned().collect();
        let objects: Vec<_> = entries.iter().map(|entry| entry.object.clone()).collect();
        let unpositioned = objects.iter().filter(|o| o.position().is_none()).count();
        self.metrics.record_rebuild(unpositioned);

        let markers = self.clusterer.cluster(&objects, self.zoom);
        let intruders = find_intruders(&self.events, self.defended_point, self.radius_m);
        if ring_changed {
            self.ring = self
                .defended_point
                .map(|center| build_ring(center, self.radius_m, self.config.ring_steps))
                .unwrap_or_default();
        }

        self.logger.trace_cycle(&format!(
            "cycle: {} events, {} objects, {} markers, {} intruders",
            self.events.len(),
            entries.len(),
            markers.len(),
            intruders.len()
        ));

        let diff = MarkerDiff::between(&self.current.markers, &markers);
        let snapshot = Snapshot {
            revision: self.current.revision + 1,
            event_count: self.events.len(),
            registry: entries,
            markers,
            intruders,
            ring: self.ring.clone(),
            zoom: self.zoom,
            defended_point: self.defended_point,
            radius_m: self.radius_m,
            selected: self.selected.clone(),
        };
        self.publish(Arc::new(snapshot), Some(diff));
    }

    fn publish(&mut self, snapshot: Arc<Snapshot>, diff: Option<MarkerDiff>) {
        self.current = snapshot.clone();
        self.snapshot_tx.send_replace(snapshot.clone());
        let _ = self
            .event_tx
            .send(ControllerEvent::SnapshotPublished(snapshot));
        if let Some(diff) = diff.filter(|d| !d.is_unchanged()) {
            let _ = self.event_tx.send(ControllerEvent::MarkersChanged(diff));
        }
    }
}

fn validate_radius(radius_m: f64) -> CoreResult<()> {
    if radius_m.is_finite() && radius_m > 0.0 {
        Ok(())
    } else {
        Err(CoreError::InvalidRadius(radius_m.to_string()))
    }
}

fn validate_zoom(zoom: f64) -> CoreResult<()> {
    if zoom.is_finite() && zoom >= 0.0 {
        Ok(())
    } else {
        Err(CoreError::InvalidZoom(zoom))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed_interface::DetectedObject;
    use crate::math::EARTH_RADIUS_M;

    const DEFENDED: Coordinate = Coordinate {
        lat: 14.297567,
        lng: 101.166279,
    };

    fn event_at(id: &str, cam: &str, ts: &str, obj_id: &str, meters_north: f64) -> DetectionEvent {
        let lat = DEFENDED.lat + (meters_north / EARTH_RADIUS_M).to_degrees();
        DetectionEvent::new(
            id,
            cam,
            ts,
            vec![DetectedObject::new(obj_id, "drone").with_position(lat, DEFENDED.lng)],
        )
    }

    fn controller() -> SituationController {
        SituationController::new(PipelineConfig {
            defended_point: Some(DEFENDED),
            radius_m: 1500.0,
            zoom: 16.0,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn history_and_live_events_flow_into_snapshot() {
        let mut ctl = controller();
        ctl.apply_history(
            "offensive",
            vec![
                event_at("h1", "offensive", "2024-05-01T10:00:00Z", "a", 500.0),
                event_at("h2", "offensive", "2024-05-01T10:01:00Z", "b", 3000.0),
            ],
        );
        ctl.push_live(event_at("l1", "defensive", "2024-05-01T10:02:00Z", "c", 200.0));

        let snapshot = ctl.snapshot();
        assert_eq!(snapshot.event_count, 3);
        assert_eq!(ctl.events()[0].id, "l1");
        assert_eq!(snapshot.registry.len(), 3);
        assert_eq!(snapshot.markers.len(), 3);
        let ids: Vec<&str> = snapshot
            .intruders
            .iter()
            .map(|i| i.object.obj_id.as_str())
            .collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert_eq!(snapshot.ring.len(), 65);
    }

    #[test]
    fn history_replaces_only_its_own_camera() {
        let mut ctl = controller();
        ctl.apply_history("offensive", vec![event_at("h1", "offensive", "t1", "a", 10.0)]);
        ctl.apply_history("defensive", vec![event_at("h2", "defensive", "t1", "b", 10.0)]);
        ctl.apply_history("offensive", vec![event_at("h3", "offensive", "t2", "c", 10.0)]);

        let ids: Vec<&str> = ctl.events().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["h2", "h3"]);
        assert_eq!(ctl.clear_history("defensive"), 1);
        assert_eq!(ctl.snapshot().registry.len(), 1);
    }

    #[test]
    fn live_events_survive_history_refresh_until_absorbed() {
        let mut ctl = controller();
        ctl.apply_history("offensive", vec![event_at("h1", "offensive", "t1", "a", 10.0)]);
        ctl.push_live(event_at("l1", "offensive", "t2", "b", 10.0));
        ctl.push_live(event_at("l2", "offensive", "t3", "c", 10.0));

        ctl.apply_history(
            "offensive",
            vec![
                event_at("h1", "offensive", "t1", "a", 10.0),
                event_at("l1", "offensive", "t2", "b", 10.0),
            ],
        );
        let ids: Vec<&str> = ctl.events().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["l2", "h1", "l1"]);

        ctl.push_live(event_at("l3", "defensive", "t4", "d", 10.0));
        assert_eq!(ctl.clear_history("offensive"), 3);
        let ids: Vec<&str> = ctl.events().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["l3"]);
    }

    #[test]
    fn invalid_radius_is_rejected_and_previous_kept() {
        let mut ctl = controller();
        assert!(ctl.set_radius(0.0).is_err());
        assert!(ctl.set_radius(-10.0).is_err());
        assert!(ctl.set_radius_input("wide").is_err());
        assert_eq!(ctl.radius_m(), 1500.0);
        assert_eq!(ctl.snapshot().radius_m, 1500.0);

        ctl.set_radius_input(" 800 ").unwrap();
        assert_eq!(ctl.snapshot().radius_m, 800.0);
    }

    #[test]
    fn removing_defended_point_clears_ring_and_alerts() {
        let mut ctl = controller();
        ctl.push_live(event_at("l1", "offensive", "t1", "a", 100.0));
        assert_eq!(ctl.snapshot().intruders.len(), 1);

        ctl.set_defended_point(None);
        let snapshot = ctl.snapshot();
        assert!(snapshot.intruders.is_empty());
        assert!(snapshot.ring.is_empty());
    }

    #[test]
    fn zoom_change_regroups_markers() {
        let mut ctl = controller();
        ctl.apply_history(
            "offensive",
            vec![
                event_at("h1", "offensive", "t1", "a", 0.0),
                event_at("h2", "offensive", "t1", "b", 50.0),
            ],
        );
        assert_eq!(ctl.snapshot().markers.len(), 2);
        ctl.set_zoom(12.0).unwrap();
        let snapshot = ctl.snapshot();
        assert_eq!(snapshot.markers.len(), 1);
        assert!(snapshot.markers[0].is_cluster());
        assert!(ctl.set_zoom(f64::NAN).is_err());
    }

    #[test]
    fn marker_diff_tracks_keys() {
        let a = DetectedObject::new("a", "drone").with_position(0.0, 0.0);
        let b = DetectedObject::new("b", "drone").with_position(1.0, 1.0);
        let previous = vec![MarkerDescriptor::Single { lat: 0.0, lng: 0.0, object: a.clone() }];
        let next = vec![
            MarkerDescriptor::Single { lat: 0.0, lng: 0.0, object: a },
            MarkerDescriptor::Single { lat: 1.0, lng: 1.0, object: b },
        ];
        let diff = MarkerDiff::between(&previous, &next);
        assert_eq!(diff.added, vec!["b".to_string()]);
        assert_eq!(diff.retained, vec!["a".to_string()]);
        assert!(diff.removed.is_empty());
        assert!(MarkerDiff::between(&next, &next).is_unchanged());
    }

    #[tokio::test]
    async fn subscribers_receive_selection_and_defended_point_changes() {
        let mut ctl = controller();
        let mut rx = ctl.subscribe();
        let mut snapshots = ctl.watch();

        ctl.select(Some("a".into()));
        ctl.set_defended_point(Some(Coordinate::new(14.3, 101.2)));

        let mut saw_selection = false;
        let mut saw_point = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                ControllerEvent::SelectionChanged(Some(id)) => saw_selection = id == "a",
                ControllerEvent::DefendedPointChanged { point, radius_m } => {
                    saw_point = point == Some(Coordinate::new(14.3, 101.2)) && radius_m == 1500.0;
                }
                _ => {}
            }
        }
        assert!(saw_selection);
        assert!(saw_point);

        assert!(snapshots.has_changed().unwrap());
        let latest = snapshots.borrow_and_update().clone();
        assert_eq!(latest.selected.as_deref(), Some("a"));
        assert_eq!(latest.revision, ctl.snapshot().revision);
    }
}
