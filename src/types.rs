//! Core types for the Heartzone pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: samples, session statistics, transition events, feedback effects and
//! the observable monitoring state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::zone::Zone;

/// Default maximum heart rate (220 - 30)
pub const DEFAULT_MAX_HEART_RATE: f64 = 190.0;

/// A single heart rate measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Distinguishes samples that share a timestamp
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Beats per minute
    pub bpm: f64,
    /// When the measurement was taken (UTC)
    pub timestamp: DateTime<Utc>,
}

impl Sample {
    pub fn new(bpm: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            bpm,
            timestamp,
        }
    }
}

/// Aggregate statistics over the samples of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    /// Lowest bpm (0 when empty)
    pub min: f64,
    /// Highest bpm (0 when empty)
    pub max: f64,
    /// Arithmetic mean bpm (0 when empty)
    pub average: f64,
    /// Number of retained samples
    pub count: usize,
    /// Newest minus oldest timestamp, in seconds
    pub duration_secs: f64,
}

/// Direction of a zone change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Moving into a more intense zone
    Up,
    /// Moving into a less intense zone
    Down,
}

/// A change from one zone to another between two consecutive classifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub from: Zone,
    pub to: Zone,
    pub direction: Direction,
    pub entered_peak: bool,
}

/// Named haptic effects the feedback executor understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackEffect {
    Tap,
    BeginSession,
    EndSession,
    Escalate,
    DeEscalate,
    Warning,
}

impl FeedbackEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackEffect::Tap => "tap",
            FeedbackEffect::BeginSession => "begin_session",
            FeedbackEffect::EndSession => "end_session",
            FeedbackEffect::Escalate => "escalate",
            FeedbackEffect::DeEscalate => "de_escalate",
            FeedbackEffect::Warning => "warning",
        }
    }
}

/// Controller lifecycle phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Unauthorized,
    Authorizing,
    /// Authorized, not monitoring
    Idle,
    Monitoring,
}

/// Observable monitoring state, owned by the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringState {
    pub phase: Phase,
    /// Most recent reading (0 before any)
    pub current_bpm: f64,
    /// Zone of the most recent classification (Rest before any)
    pub current_zone: Zone,
    /// Zone held before the most recent classification
    pub previous_zone: Option<Zone>,
    pub is_monitoring: bool,
    pub is_authorized: bool,
    pub is_available: bool,
    pub max_heart_rate: f64,
    pub last_error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    /// Statistics of the current (or last) session
    pub stats: SessionStats,
}

impl Default for MonitoringState {
    fn default() -> Self {
        Self {
            phase: Phase::Unauthorized,
            current_bpm: 0.0,
            current_zone: Zone::Rest,
            previous_zone: None,
            is_monitoring: false,
            is_authorized: false,
            is_available: false,
            max_heart_rate: DEFAULT_MAX_HEART_RATE,
            last_error: None,
            last_updated: None,
            stats: SessionStats::default(),
        }
    }
}
