use crate::prelude::Coordinate;

/// Centroid maintained as an incremental running mean.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningCentroid {
    center: Coordinate,
    count: usize,
}

impl RunningCentroid {
    pub fn new(first: Coordinate) -> Self {
        Self {
            center: first,
            count: 1,
        }
    }

    /// `centroid += (point - centroid) / n`
    pub fn push(&mut self, point: Coordinate) {
        self.count += 1;
        let n = self.count as f64;
        self.center.lat += (point.lat - self.center.lat) / n;
        self.center.lng += (point.lng - self.center.lng) / n;
    }

    pub fn center(&self) -> Coordinate {
        self.center
    }

    pub fn count(&self) -> usize {
        self.count
    }
}
