use serde::Serialize;
use skywatchcore::processing::{MarkerDescriptor, Snapshot};
use skywatchcore::telemetry::MetricsSnapshot;
use skywatchcore::Coordinate;

/// Registry row for the object list.
#[derive(Debug, Clone, Serialize)]
pub struct ObjectRow {
    pub obj_id: String,
    pub category: String,
    pub cam_id: String,
    pub last_seen: String,
    pub position: Option<Coordinate>,
    pub altitude_m: Option<f64>,
    pub target: Option<Coordinate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkerView {
    pub key: String,
    pub kind: &'static str,
    pub lat: f64,
    pub lng: f64,
    pub obj_ids: Vec<String>,
}

impl From<&MarkerDescriptor> for MarkerView {
    fn from(marker: &MarkerDescriptor) -> Self {
        let position = marker.position();
        let (kind, obj_ids) = match marker {
            MarkerDescriptor::Single { object, .. } => ("single", vec![object.obj_id.clone()]),
            MarkerDescriptor::Cluster { objects, .. } => (
                "cluster",
                objects.iter().map(|o| o.obj_id.clone()).collect(),
            ),
        };
        Self {
            key: marker.key(),
            kind,
            lat: position.lat,
            lng: position.lng,
            obj_ids,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntruderRow {
    pub obj_id: String,
    pub category: String,
    pub distance_m: f64,
    pub distance: String,
    pub eta_s: Option<f64>,
    pub eta: String,
}

/// Everything the map client needs for one frame.
#[derive(Debug, Clone, Serialize, Default)]
pub struct VisualizationModel {
    pub revision: u64,
    pub connected: bool,
    pub status: Option<String>,
    pub event_count: usize,
    pub objects: Vec<ObjectRow>,
    pub markers: Vec<MarkerView>,
    pub intruders: Vec<IntruderRow>,
    pub ring: Vec<Coordinate>,
    pub defended_point: Option<Coordinate>,
    pub radius_m: f64,
    pub zoom: f64,
    pub selected: Option<String>,
    pub metrics: MetricsSnapshot,
}

impl VisualizationModel {
    pub fn from_snapshot(
        snapshot: &Snapshot,
        connected: bool,
        status: Option<String>,
        metrics: MetricsSnapshot,
    ) -> Self {
        let objects = snapshot
            .registry
            .iter()
            .map(|entry| ObjectRow {
                obj_id: entry.object.obj_id.clone(),
                category: entry.object.category.clone(),
                cam_id: entry.cam_id.clone(),
                last_seen: entry.last_seen.clone(),
                position: entry.object.position(),
                altitude_m: entry.object.altitude_m(),
                target: entry.object.target(),
            })
            .collect();
        let intruders = snapshot
            .intruders
            .iter()
            .map(|hit| IntruderRow {
                obj_id: hit.object.obj_id.clone(),
                category: hit.object.category.clone(),
                distance_m: hit.distance_m,
                distance: hit.distance_label(),
                eta_s: hit.eta_s,
                eta: hit.eta_label(),
            })
            .collect();

        Self {
            revision: snapshot.revision,
            connected,
            status,
            event_count: snapshot.event_count,
            objects,
            markers: snapshot.markers.iter().map(MarkerView::from).collect(),
            intruders,
            ring: snapshot.ring.clone(),
            defended_point: snapshot.defended_point,
            radius_m: snapshot.radius_m,
            zoom: snapshot.zoom,
            selected: snapshot.selected.clone(),
            metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skywatchcore::feed_interface::{DetectedObject, DetectionEvent};
    use skywatchcore::math::EARTH_RADIUS_M;
    use skywatchcore::processing::SituationController;
    use skywatchcore::telemetry::MetricsSnapshot;
    use skywatchcore::PipelineConfig;

    const DEFENDED: Coordinate = Coordinate {
        lat: 14.297567,
        lng: 101.166279,
    };

    #[test]
    fn snapshot_rows_carry_formatted_labels() {
        let mut ctl = SituationController::new(PipelineConfig {
            defended_point: Some(DEFENDED),
            radius_m: 1500.0,
            zoom: 16.0,
            ..Default::default()
        })
        .unwrap();
        let lat = DEFENDED.lat + (1250.0 / EARTH_RADIUS_M).to_degrees();
        ctl.push_live(DetectionEvent::new(
            "evt-1",
            "offensive",
            "2024-05-01T10:00:00Z",
            vec![
                DetectedObject::new("obj_001", "drone").with_position(lat, DEFENDED.lng),
                DetectedObject::new("obj_002", "bird"),
            ],
        ));

        let model = VisualizationModel::from_snapshot(
            &ctl.snapshot(),
            true,
            Some("ok".into()),
            MetricsSnapshot::default(),
        );

        assert!(model.connected);
        assert_eq!(model.status.as_deref(), Some("ok"));
        assert_eq!(model.objects.len(), 2);
        let ghost = model.objects.iter().find(|row| row.obj_id == "obj_002").unwrap();
        assert_eq!(ghost.position, None);
        assert_eq!(ghost.cam_id, "offensive");

        assert_eq!(model.markers.len(), 1);
        assert_eq!(model.markers[0].key, "obj_001");
        assert_eq!(model.markers[0].kind, "single");

        assert_eq!(model.intruders.len(), 1);
        assert_eq!(model.intruders[0].category, "drone");
        assert_eq!(model.intruders[0].distance, "1.25 km");
        assert_eq!(model.intruders[0].eta, "N/A");
        assert_eq!(model.ring.len(), 65);
    }
}
