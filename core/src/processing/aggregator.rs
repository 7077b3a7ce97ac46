use crate::feed_interface::{DetectedObject, DetectionEvent};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Which occurrence of an object id the registry keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastSeenPolicy {
    /// The last occurrence in event-list order, regardless of timestamp.
    #[default]
    ArrayOrder,
    /// The occurrence with the greatest timestamp; ties go to the later position.
    LatestTimestamp,
}

/// Last known state of one tracked object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestObjectEntry {
    pub object: DetectedObject,
    pub last_seen: String,
    pub cam_id: String,
}

/// Mapping `obj_id -> LatestObjectEntry`, one entry per distinct id.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: HashMap<String, LatestObjectEntry>,
}

impl Registry {
    pub fn get(&self, obj_id: &str) -> Option<&LatestObjectEntry> {
        self.entries.get(obj_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// List view: `last_seen` descending by string comparison, then `obj_id`.
    pub fn by_recency(&self) -> Vec<&LatestObjectEntry> {
        let mut view: Vec<&LatestObjectEntry> = self.entries.values().collect();
        view.sort_by(|a, b| {
            b.last_seen
                .cmp(&a.last_seen)
                .then_with(|| a.object.obj_id.cmp(&b.object.obj_id))
        });
        view
    }
}

fn compare_timestamps(a: &str, b: &str) -> Ordering {
    match (
        DateTime::<FixedOffset>::parse_from_rfc3339(a),
        DateTime::<FixedOffset>::parse_from_rfc3339(b),
    ) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Folds an ordered event list into the per-object registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedAggregator {
    policy: LastSeenPolicy,
}

impl FeedAggregator {
    pub fn new(policy: LastSeenPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> LastSeenPolicy {
        self.policy
    }

    pub fn build_registry(&self, events: &[DetectionEvent]) -> Registry {
        let mut entries: HashMap<String, LatestObjectEntry> = HashMap::new();

        for event in events {
            for object in &event.objects {
                if self.policy == LastSeenPolicy::LatestTimestamp {
                    if let Some(existing) = entries.get(&object.obj_id) {
                        if compare_timestamps(&event.timestamp, &existing.last_seen)
                            == Ordering::Less
                        {
                            continue;
                        }
                    }
                }
                entries.insert(
                    object.obj_id.clone(),
                    LatestObjectEntry {
                        object: object.clone(),
                        last_seen: event.timestamp.clone(),
                        cam_id: event.cam_id.clone(),
                    },
                );
            }
        }

        Registry { entries }
    }
}

/// Registry with last-in-array-wins semantics.
pub fn build_registry(events: &[DetectionEvent]) -> Registry {
    FeedAggregator::new(LastSeenPolicy::ArrayOrder).build_registry(events)
}
