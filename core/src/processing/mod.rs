pub mod aggregator;
pub mod cluster;
pub mod controller;
pub mod geofence;
pub mod proximity;

pub use aggregator::{build_registry, FeedAggregator, LastSeenPolicy, LatestObjectEntry, Registry};
pub use cluster::{cluster, ClusterOrdering, MarkerDescriptor, SpatialClusterer};
pub use controller::{ControllerEvent, MarkerDiff, SituationController, Snapshot};
pub use geofence::{build_ring, DEFAULT_RING_STEPS};
pub use proximity::{find_intruders, format_distance, format_eta, Intrusion};
