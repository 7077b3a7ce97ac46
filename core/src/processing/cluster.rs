use crate::feed_interface::DetectedObject;
use crate::math::{GeoHelper, RunningCentroid};
use crate::prelude::Coordinate;
use serde::{Deserialize, Serialize};

/// Zoom at and above which every object is drawn on its own.
pub const NO_CLUSTER_ZOOM: f64 = 15.0;

/// Order in which objects are fed to the greedy pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterOrdering {
    #[default]
    Input,
    /// Stable sort by `obj_id` first, so membership does not depend on arrival order.
    ById,
}

/// Renderable marker produced by a clustering pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarkerDescriptor {
    Single {
        lat: f64,
        lng: f64,
        object: DetectedObject,
    },
    Cluster {
        lat: f64,
        lng: f64,
        objects: Vec<DetectedObject>,
    },
}

impl MarkerDescriptor {
    pub fn position(&self) -> Coordinate {
        match self {
            MarkerDescriptor::Single { lat, lng, .. } | MarkerDescriptor::Cluster { lat, lng, .. } => {
                Coordinate::new(*lat, *lng)
            }
        }
    }

    pub fn member_count(&self) -> usize {
        match self {
            MarkerDescriptor::Single { .. } => 1,
            MarkerDescriptor::Cluster { objects, .. } => objects.len(),
        }
    }

    pub fn is_cluster(&self) -> bool {
        matches!(self, MarkerDescriptor::Cluster { .. })
    }

    /// Stable key used to diff rendered markers between update cycles.
    pub fn key(&self) -> String {
        match self {
            MarkerDescriptor::Single { object, .. } => object.obj_id.clone(),
            MarkerDescriptor::Cluster { objects, .. } => {
                let mut ids: Vec<&str> = objects.iter().map(|o| o.obj_id.as_str()).collect();
                ids.sort_unstable();
                format!("cluster:{}", ids.join("+"))
            }
        }
    }
}

/// Degree tolerance for a zoom level, `None` when clustering is off.
pub fn tolerance_for_zoom(zoom: f64) -> Option<f64> {
    if zoom >= NO_CLUSTER_ZOOM {
        None
    } else if zoom >= 13.0 {
        Some(0.002)
    } else if zoom >= 11.0 {
        Some(0.004)
    } else {
        Some(0.01)
    }
}

struct OpenCluster {
    centroid: RunningCentroid,
    members: Vec<DetectedObject>,
}

impl OpenCluster {
    fn into_descriptor(self) -> MarkerDescriptor {
        let center = self.centroid.center();
        let mut members = self.members;
        if members.len() == 1 {
            if let Some(object) = members.pop() {
                return MarkerDescriptor::Single {
                    lat: center.lat,
                    lng: center.lng,
                    object,
                };
            }
        }
        MarkerDescriptor::Cluster {
            lat: center.lat,
            lng: center.lng,
            objects: members,
        }
    }
}

/// Greedy zoom-adaptive clusterer with running-mean centroids.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpatialClusterer {
    ordering: ClusterOrdering,
}

impl SpatialClusterer {
    pub fn new(ordering: ClusterOrdering) -> Self {
        Self { ordering }
    }

    pub fn cluster(&self, objects: &[DetectedObject], zoom: f64) -> Vec<MarkerDescriptor> {
        let mut positioned: Vec<(Coordinate, &DetectedObject)> = objects
            .iter()
            .filter_map(|object| object.position().map(|p| (p, object)))
            .collect();
        if self.ordering == ClusterOrdering::ById {
            positioned.sort_by(|a, b| a.1.obj_id.cmp(&b.1.obj_id));
        }

        let Some(tolerance) = tolerance_for_zoom(zoom) else {
            return positioned
                .into_iter()
                .map(|(p, object)| MarkerDescriptor::Single {
                    lat: p.lat,
                    lng: p.lng,
                    object: object.clone(),
                })
                .collect();
        };

        let mut clusters: Vec<OpenCluster> = Vec::new();
        for (point, object) in positioned {
            let joined = clusters
                .iter_mut()
                .find(|c| GeoHelper::planar_distance_deg(c.centroid.center(), point) <= tolerance);
            match joined {
                Some(cluster) => {
                    cluster.centroid.push(point);
                    cluster.members.push(object.clone());
                }
                None => clusters.push(OpenCluster {
                    centroid: RunningCentroid::new(point),
                    members: vec![object.clone()],
                }),
            }
        }

        clusters.into_iter().map(OpenCluster::into_descriptor).collect()
    }
}

/// Clusters in input order.
pub fn cluster(objects: &[DetectedObject], zoom: f64) -> Vec<MarkerDescriptor> {
    SpatialClusterer::new(ClusterOrdering::Input).cluster(objects, zoom)
}
