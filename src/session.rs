//! Session aggregation
//!
//! Holds the samples of the active monitoring session, newest first, and computes
//! summary statistics on demand.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::types::{Sample, SessionStats};

/// Ordered sample store for one monitoring session.
///
/// Samples are kept newest-first. No deduplication is performed: two samples with
/// the same timestamp are retained as distinct readings.
#[derive(Debug, Clone, Default)]
pub struct SessionAggregator {
    samples: VecDeque<Sample>,
    active: bool,
}

impl SessionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all samples and mark the session active
    pub fn start(&mut self) {
        self.samples.clear();
        self.active = true;
    }

    /// Insert a batch at the head, keeping the batch's own order (`batch[0]` becomes newest)
    pub fn append(&mut self, batch: &[Sample]) {
        for sample in batch.iter().rev() {
            self.samples.push_front(sample.clone());
        }
    }

    /// Mark the session inactive; samples are retained
    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Newest sample
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.front()
    }

    /// Timestamp of the oldest retained sample
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.samples.back().map(|s| s.timestamp)
    }

    /// Read-only view, newest first
    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Owned copy of the samples, newest first
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().cloned().collect()
    }

    /// Compute min/max/average/count/duration over the retained samples
    pub fn stats(&self) -> SessionStats {
        if self.samples.is_empty() {
            return SessionStats::default();
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for sample in &self.samples {
            min = min.min(sample.bpm);
            max = max.max(sample.bpm);
            sum += sample.bpm;
        }

        SessionStats {
            min,
            max,
            average: sum / self.samples.len() as f64,
            count: self.samples.len(),
            duration_secs: self.duration_secs(),
        }
    }

    /// Head timestamp minus tail timestamp, 0 with fewer than two samples
    fn duration_secs(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }
        match (self.samples.front(), self.samples.back()) {
            (Some(newest), Some(oldest)) => {
                let delta = newest.timestamp - oldest.timestamp;
                delta.num_milliseconds() as f64 / 1000.0
            }
            _ => 0.0,
        }
    }
}
