//! Sample pipeline
//!
//! The synchronous batch path shared by the async controller, the FFI layer and the
//! CLI. Each batch flows through:
//! 1. SessionAggregator - append newest-first
//! 2. Zone classifier - classify the batch's latest reading
//! 3. Transition detector - compare against the previous classification
//! 4. Feedback mapping - effects to request for the transition

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::MonitorError;
use crate::feedback::effects_for;
use crate::session::SessionAggregator;
use crate::transition::detect;
use crate::types::{FeedbackEffect, Sample, SessionStats, TransitionEvent, DEFAULT_MAX_HEART_RATE};
use crate::zone::{max_heart_rate_for_age, percentage_of_max, zone_for_percentage, Zone};

/// Result of pushing one reading through the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// The reading that was classified
    pub latest: Sample,
    pub zone: Zone,
    /// Reading as a percentage of max heart rate
    pub percentage: f64,
    pub transition: Option<TransitionEvent>,
    /// Feedback effects requested for the transition
    pub effects: Vec<FeedbackEffect>,
}

/// Stateful processor for one monitoring session.
///
/// Tracks the session samples plus the zone memory needed for transition
/// detection. Max heart rate changes apply to the next classification only.
#[derive(Debug, Clone)]
pub struct SamplePipeline {
    session: SessionAggregator,
    max_heart_rate: f64,
    current_bpm: f64,
    last_updated: Option<DateTime<Utc>>,
    /// Zone of the latest classification in this session
    current_zone: Option<Zone>,
    /// Zone held before the latest classification
    previous_zone: Option<Zone>,
}

impl Default for SamplePipeline {
    fn default() -> Self {
        Self {
            session: SessionAggregator::new(),
            max_heart_rate: DEFAULT_MAX_HEART_RATE,
            current_bpm: 0.0,
            last_updated: None,
            current_zone: None,
            previous_zone: None,
        }
    }
}

impl SamplePipeline {
    /// Create a pipeline with a specific max heart rate
    pub fn new(max_heart_rate: f64) -> Result<Self, MonitorError> {
        let mut pipeline = Self::default();
        pipeline.set_max_heart_rate(max_heart_rate)?;
        Ok(pipeline)
    }

    /// Begin a new session: clears samples and forgets the previous zone
    pub fn start(&mut self) {
        self.session.start();
        self.current_zone = None;
        self.previous_zone = None;
    }

    /// Freeze the session; samples are retained
    pub fn stop(&mut self) {
        self.session.stop();
    }

    /// Append a batch and classify its first element as the latest reading.
    ///
    /// Returns `Ok(None)` for an empty batch. A batch whose latest reading cannot
    /// be classified is rejected before anything is changed; other non-finite
    /// readings are left out of the session.
    pub fn ingest(&mut self, batch: &[Sample]) -> Result<Option<BatchOutcome>, MonitorError> {
        let Some(latest) = batch.first() else {
            return Ok(None);
        };
        let (percentage, zone) = self.classify_reading(latest)?;

        if batch.iter().all(|s| s.bpm.is_finite()) {
            self.session.append(batch);
        } else {
            let finite: Vec<Sample> = batch.iter().filter(|s| s.bpm.is_finite()).cloned().collect();
            warn!(
                dropped = batch.len() - finite.len(),
                "skipping non-finite heart rate readings"
            );
            self.session.append(&finite);
        }
        debug!(
            batch = batch.len(),
            retained = self.session.len(),
            "appended samples"
        );

        Ok(Some(self.record(latest, percentage, zone)))
    }

    /// Classify a reading without adding it to the session
    pub fn observe(&mut self, sample: &Sample) -> Result<BatchOutcome, MonitorError> {
        let (percentage, zone) = self.classify_reading(sample)?;
        Ok(self.record(sample, percentage, zone))
    }

    fn classify_reading(&self, sample: &Sample) -> Result<(f64, Zone), MonitorError> {
        let percentage = percentage_of_max(sample.bpm, self.max_heart_rate)?;
        Ok((percentage, zone_for_percentage(percentage)))
    }

    fn record(&mut self, sample: &Sample, percentage: f64, zone: Zone) -> BatchOutcome {
        if sample.bpm <= 0.0 {
            warn!(bpm = sample.bpm, "non-positive heart rate reading");
        }

        self.current_bpm = sample.bpm;
        self.last_updated = Some(sample.timestamp);

        let transition = detect(self.current_zone, zone);
        let effects = effects_for(transition.as_ref());

        self.previous_zone = self.current_zone;
        self.current_zone = Some(zone);

        BatchOutcome {
            latest: sample.clone(),
            zone,
            percentage,
            transition,
            effects,
        }
    }

    /// Set the max heart rate directly (bpm)
    pub fn set_max_heart_rate(&mut self, max_heart_rate: f64) -> Result<(), MonitorError> {
        if !max_heart_rate.is_finite() || max_heart_rate <= 0.0 {
            return Err(MonitorError::InvalidParameter(format!(
                "max heart rate must be positive, got {max_heart_rate}"
            )));
        }
        self.max_heart_rate = max_heart_rate;
        Ok(())
    }

    /// Set the max heart rate from age (220 - age) and return it
    pub fn set_age(&mut self, age: u32) -> Result<f64, MonitorError> {
        let max_heart_rate = max_heart_rate_for_age(age)?;
        self.max_heart_rate = max_heart_rate;
        Ok(max_heart_rate)
    }

    pub fn session(&self) -> &SessionAggregator {
        &self.session
    }

    pub fn stats(&self) -> SessionStats {
        self.session.stats()
    }

    pub fn max_heart_rate(&self) -> f64 {
        self.max_heart_rate
    }

    pub fn current_bpm(&self) -> f64 {
        self.current_bpm
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn current_zone(&self) -> Option<Zone> {
        self.current_zone
    }

    pub fn previous_zone(&self) -> Option<Zone> {
        self.previous_zone
    }
}
