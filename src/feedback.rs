//! Feedback dispatch
//!
//! Maps transition events to named haptic effects and hands them to an injected
//! executor. Effects are fire-and-forget: execution failures never reach the
//! pipeline.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::types::{Direction, FeedbackEffect, TransitionEvent};

/// Device capability that plays haptic effects
pub trait HapticExecutor: Send + Sync + Debug {
    /// Play an effect. Must not block; errors are swallowed by the implementation.
    fn trigger(&self, effect: FeedbackEffect);
}

/// Effects requested for a transition, in the order they are issued
pub fn effects_for(event: Option<&TransitionEvent>) -> Vec<FeedbackEffect> {
    let Some(event) = event else {
        return Vec::new();
    };

    let mut effects = Vec::with_capacity(2);
    effects.push(match event.direction {
        Direction::Up => FeedbackEffect::Escalate,
        Direction::Down => FeedbackEffect::DeEscalate,
    });
    if event.entered_peak {
        effects.push(FeedbackEffect::Warning);
    }
    effects
}

/// Issues feedback requests against a haptic executor
#[derive(Debug, Clone)]
pub struct FeedbackDispatcher {
    executor: Arc<dyn HapticExecutor>,
}

impl FeedbackDispatcher {
    pub fn new(executor: Arc<dyn HapticExecutor>) -> Self {
        Self { executor }
    }

    /// Dispatch the effects for a transition; no-op for `None`
    pub fn dispatch(&self, event: Option<&TransitionEvent>) -> Vec<FeedbackEffect> {
        let effects = effects_for(event);
        for effect in &effects {
            self.executor.trigger(*effect);
        }
        effects
    }

    /// Issue a single effect outside of a transition (session begin/end)
    pub fn notify(&self, effect: FeedbackEffect) {
        self.executor.trigger(effect);
    }
}

/// Executor that logs effects instead of playing them
#[derive(Debug, Default)]
pub struct TracingHaptics;

impl HapticExecutor for TracingHaptics {
    fn trigger(&self, effect: FeedbackEffect) {
        info!(effect = effect.as_str(), "haptic feedback");
    }
}

/// Executor that records every requested effect, in order
#[derive(Debug, Default)]
pub struct RecordingHaptics {
    effects: Mutex<Vec<FeedbackEffect>>,
}

impl RecordingHaptics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effects recorded so far
    pub fn effects(&self) -> Vec<FeedbackEffect> {
        self.effects.lock().clone()
    }

    /// Remove and return the recorded effects
    pub fn take(&self) -> Vec<FeedbackEffect> {
        std::mem::take(&mut *self.effects.lock())
    }
}

impl HapticExecutor for RecordingHaptics {
    fn trigger(&self, effect: FeedbackEffect) {
        debug!(effect = effect.as_str(), "recording haptic feedback");
        self.effects.lock().push(effect);
    }
}
