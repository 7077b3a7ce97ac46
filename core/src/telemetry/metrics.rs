use serde::Serialize;
use std::sync::Mutex;

pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

/// Counter values at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub events_ingested: usize,
    pub registry_rebuilds: usize,
    pub unpositioned_objects: usize,
    pub transport_errors: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    pub fn record_events(&self, count: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.events_ingested += count;
        }
    }

    /// `unpositioned` is the number of registry objects without a position in this rebuild.
    pub fn record_rebuild(&self, unpositioned: usize) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.registry_rebuilds += 1;
            metrics.unpositioned_objects = unpositioned;
        }
    }

    pub fn record_transport_error(&self) {
        if let Ok(mut metrics) = self.inner.lock() {
            metrics.transport_errors += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.inner
            .lock()
            .map(|metrics| *metrics)
            .unwrap_or_default()
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
