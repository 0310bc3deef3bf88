//! Monitoring controller
//!
//! Top-level state machine: `Unauthorized -> Authorizing -> Idle -> Monitoring -> Idle`.
//!
//! The controller is the single writer of [`MonitoringState`]. Live batches arrive
//! from the data source on any thread, are buffered on an unbounded channel, and
//! are applied only when the controller drains them (`process_next`,
//! `drain_pending`, or the [`crate::service`] loop). Batches that arrive after
//! `stop()`, or that belong to an older subscription, are dropped by the phase
//! guard. Consumers observe state through a `watch` channel.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::error::MonitorError;
use crate::feedback::{FeedbackDispatcher, HapticExecutor};
use crate::pipeline::{BatchOutcome, SamplePipeline};
use crate::session::SessionAggregator;
use crate::source::{BatchSink, Delivery, HeartRateSource, SubscriptionHandle, SubscriptionId};
use crate::types::{FeedbackEffect, MonitoringState, Phase, Sample};

pub struct MonitoringController {
    source: Arc<dyn HeartRateSource>,
    feedback: FeedbackDispatcher,
    pipeline: SamplePipeline,
    phase: Phase,
    last_error: Option<String>,
    subscription: Option<SubscriptionHandle>,
    next_subscription: SubscriptionId,
    deliveries_tx: mpsc::UnboundedSender<Delivery>,
    deliveries_rx: mpsc::UnboundedReceiver<Delivery>,
    state_tx: watch::Sender<MonitoringState>,
}

impl MonitoringController {
    /// Create a controller with injected collaborators
    pub fn new(
        source: Arc<dyn HeartRateSource>,
        haptics: Arc<dyn HapticExecutor>,
        config: &MonitorConfig,
    ) -> Result<Self, MonitorError> {
        config.validate()?;
        let pipeline = SamplePipeline::new(config.resolved_max_heart_rate()?)?;
        let (deliveries_tx, deliveries_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(MonitoringState::default());

        let controller = Self {
            source,
            feedback: FeedbackDispatcher::new(haptics),
            pipeline,
            phase: Phase::Unauthorized,
            last_error: None,
            subscription: None,
            next_subscription: 1,
            deliveries_tx,
            deliveries_rx,
            state_tx,
        };
        controller.publish();
        Ok(controller)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Snapshot of the current state
    pub fn state(&self) -> MonitoringState {
        MonitoringState {
            phase: self.phase,
            current_bpm: self.pipeline.current_bpm(),
            current_zone: self.pipeline.current_zone().unwrap_or_default(),
            previous_zone: self.pipeline.previous_zone(),
            is_monitoring: self.phase == Phase::Monitoring,
            is_authorized: matches!(self.phase, Phase::Idle | Phase::Monitoring),
            is_available: self.source.is_available(),
            max_heart_rate: self.pipeline.max_heart_rate(),
            last_error: self.last_error.clone(),
            last_updated: self.pipeline.last_updated(),
            stats: self.pipeline.stats(),
        }
    }

    /// Observe state changes
    pub fn watch(&self) -> watch::Receiver<MonitoringState> {
        self.state_tx.subscribe()
    }

    /// Read-only view of the session samples
    pub fn session(&self) -> &SessionAggregator {
        self.pipeline.session()
    }

    /// Request read access from the data source
    pub async fn request_authorization(&mut self) {
        if matches!(self.phase, Phase::Idle | Phase::Monitoring) {
            debug!("already authorized");
            return;
        }

        if !self.source.is_available() {
            self.phase = Phase::Unauthorized;
            self.record_error(MonitorError::DeviceUnavailable);
            self.publish();
            return;
        }

        self.phase = Phase::Authorizing;
        self.publish();

        match self.source.request_authorization().await {
            Ok(()) => {
                info!("heart rate access authorized");
                self.phase = Phase::Idle;
                self.last_error = None;
            }
            Err(e) => {
                self.phase = Phase::Unauthorized;
                self.record_error(e);
            }
        }
        self.publish();
    }

    /// Begin a monitoring session. Only valid when authorized and idle.
    pub fn start(&mut self) {
        if !self.source.is_available() {
            self.record_error(MonitorError::DeviceUnavailable);
            self.publish();
            return;
        }
        if self.phase != Phase::Idle {
            debug!(phase = ?self.phase, "start ignored");
            return;
        }

        // The previous session stays intact if the subscription cannot be made
        let id = self.next_subscription;
        self.next_subscription += 1;
        let sink = BatchSink::new(id, self.deliveries_tx.clone());
        match self.source.subscribe(sink) {
            Ok(handle) => self.subscription = Some(handle),
            Err(e) => {
                self.record_error(e);
                self.publish();
                return;
            }
        }

        self.pipeline.start();
        self.last_error = None;
        self.phase = Phase::Monitoring;
        self.feedback.notify(FeedbackEffect::BeginSession);
        info!(subscription = id, max_heart_rate = self.pipeline.max_heart_rate(), "monitoring started");
        self.publish();
    }

    /// End the monitoring session. Samples are kept for inspection.
    pub fn stop(&mut self) {
        if self.phase != Phase::Monitoring {
            debug!(phase = ?self.phase, "stop ignored");
            return;
        }

        if let Some(handle) = self.subscription.take() {
            self.source.unsubscribe(handle);
        }
        self.pipeline.stop();
        self.phase = Phase::Idle;
        self.feedback.notify(FeedbackEffect::EndSession);
        info!(samples = self.pipeline.session().len(), "monitoring stopped");
        self.publish();
    }

    pub fn toggle(&mut self) {
        if self.phase == Phase::Monitoring {
            self.stop();
        } else {
            self.start();
        }
    }

    /// Set max heart rate to `220 - age`; applies to the next classification
    pub fn set_max_heart_rate(&mut self, age: u32) {
        match self.pipeline.set_age(age) {
            Ok(max_heart_rate) => info!(age, max_heart_rate, "max heart rate updated"),
            Err(e) => self.record_error(e),
        }
        self.publish();
    }

    /// One-shot fetch of the latest reading while monitoring.
    ///
    /// The reading updates the current value and zone but is not added to the
    /// session. Ignored outside of `Monitoring`.
    pub async fn fetch_latest(&mut self) {
        if self.phase != Phase::Monitoring {
            debug!(phase = ?self.phase, "fetch ignored");
            return;
        }

        match self.source.fetch_latest().await {
            Ok(Some(sample)) => {
                let outcome = self.pipeline.observe(&sample);
                self.apply(outcome.map(Some));
            }
            Ok(None) => debug!("no heart rate sample available"),
            Err(e) => self.record_error(e),
        }
        self.publish();
    }

    /// Apply a batch of samples (newest-relevant first)
    pub fn on_batch(&mut self, batch: &[Sample]) {
        if self.phase != Phase::Monitoring {
            debug!(samples = batch.len(), "not monitoring, dropping batch");
            return;
        }

        let outcome = self.pipeline.ingest(batch);
        self.apply(outcome);
        self.publish();
    }

    /// Apply a delivery if it belongs to the live subscription
    pub fn handle_delivery(&mut self, delivery: Delivery) {
        let live = self.subscription.map(|handle| handle.id);
        if live != Some(delivery.subscription) {
            debug!(
                subscription = delivery.subscription,
                "dropping batch from stale subscription"
            );
            return;
        }
        self.on_batch(&delivery.samples);
    }

    /// Wait for the next buffered delivery
    pub async fn next_delivery(&mut self) -> Option<Delivery> {
        self.deliveries_rx.recv().await
    }

    /// Wait for and apply the next delivery
    pub async fn process_next(&mut self) {
        if let Some(delivery) = self.next_delivery().await {
            self.handle_delivery(delivery);
        }
    }

    /// Apply every delivery already buffered; returns how many were taken
    pub fn drain_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(delivery) = self.deliveries_rx.try_recv() {
            self.handle_delivery(delivery);
            count += 1;
        }
        count
    }

    fn apply(&mut self, outcome: Result<Option<BatchOutcome>, MonitorError>) {
        match outcome {
            Ok(Some(outcome)) => {
                if let Some(transition) = &outcome.transition {
                    info!(
                        from = transition.from.as_str(),
                        to = transition.to.as_str(),
                        bpm = outcome.latest.bpm,
                        "zone changed"
                    );
                }
                self.feedback.dispatch(outcome.transition.as_ref());
            }
            Ok(None) => {}
            Err(e) => self.record_error(e),
        }
    }

    fn record_error(&mut self, error: MonitorError) {
        warn!(error = %error, "recovered monitoring error");
        self.last_error = Some(error.to_string());
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.state());
    }
}

impl std::fmt::Debug for MonitoringController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonitoringController")
            .field("phase", &self.phase)
            .field("subscription", &self.subscription)
            .field("samples", &self.pipeline.session().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::RecordingHaptics;
    use crate::source::{BatchFeeder, ChannelSource};
    use crate::zone::Zone;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn controller_with(
        source: ChannelSource,
    ) -> (MonitoringController, Arc<RecordingHaptics>) {
        let haptics = Arc::new(RecordingHaptics::new());
        let controller = MonitoringController::new(
            Arc::new(source),
            haptics.clone(),
            &MonitorConfig::default(),
        )
        .unwrap();
        (controller, haptics)
    }

    async fn monitoring() -> (MonitoringController, BatchFeeder, Arc<RecordingHaptics>) {
        let (feeder, source) = ChannelSource::create();
        let (mut controller, haptics) = controller_with(source);
        controller.request_authorization().await;
        controller.start();
        haptics.take();
        (controller, feeder, haptics)
    }

    #[tokio::test]
    async fn test_authorization_success() {
        let (mut controller, _) = controller_with(ChannelSource::default());
        assert_eq!(controller.phase(), Phase::Unauthorized);

        controller.request_authorization().await;

        let state = controller.state();
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.is_authorized);
        assert!(!state.is_monitoring);
        assert!(state.last_error.is_none());
    }

    #[tokio::test]
    async fn test_authorization_failure_recorded() {
        let (mut controller, _) =
            controller_with(ChannelSource::default().with_authorization_failure("denied"));

        controller.request_authorization().await;

        let state = controller.state();
        assert_eq!(state.phase, Phase::Unauthorized);
        assert!(!state.is_authorized);
        assert_eq!(state.last_error.as_deref(), Some("Authorization failed: denied"));
    }

    #[tokio::test]
    async fn test_unavailable_device() {
        let (mut controller, haptics) = controller_with(ChannelSource::default().unavailable());

        controller.request_authorization().await;
        assert_eq!(controller.phase(), Phase::Unauthorized);
        assert!(controller.state().last_error.is_some());

        controller.start();
        assert!(!controller.state().is_monitoring);
        assert!(haptics.effects().is_empty());
    }

    #[tokio::test]
    async fn test_start_requires_authorization() {
        let (mut controller, haptics) = controller_with(ChannelSource::default());
        controller.start();
        assert_eq!(controller.phase(), Phase::Unauthorized);
        assert!(haptics.effects().is_empty());
    }

    #[tokio::test]
    async fn test_start_and_stop_feedback() {
        let (feeder, source) = ChannelSource::create();
        let (mut controller, haptics) = controller_with(source);
        controller.request_authorization().await;

        controller.start();
        assert!(controller.state().is_monitoring);
        assert!(feeder.is_subscribed());

        controller.stop();
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(!feeder.is_subscribed());
        assert_eq!(
            haptics.effects(),
            vec![FeedbackEffect::BeginSession, FeedbackEffect::EndSession]
        );
    }

    #[tokio::test]
    async fn test_batches_flow_through_pipeline() {
        let (mut controller, feeder, haptics) = monitoring().await;

        feeder.push(vec![Sample::new(100.0, at(0))]);
        controller.process_next().await;
        let state = controller.state();
        assert_eq!(state.current_zone, Zone::Rest);
        assert_eq!(state.previous_zone, None);
        assert!(haptics.effects().is_empty());

        feeder.push(vec![Sample::new(150.0, at(5))]);
        feeder.push(vec![Sample::new(165.0, at(10))]);
        assert_eq!(controller.drain_pending(), 2);

        let state = controller.state();
        assert_eq!(state.current_bpm, 165.0);
        assert_eq!(state.current_zone, Zone::Peak);
        assert_eq!(state.previous_zone, Some(Zone::Cardio));
        assert_eq!(state.last_updated, Some(at(10)));
        assert_eq!(state.stats.count, 3);
        assert_eq!(state.stats.duration_secs, 10.0);
        assert_eq!(
            haptics.effects(),
            vec![
                FeedbackEffect::Escalate,
                FeedbackEffect::Escalate,
                FeedbackEffect::Warning
            ]
        );
    }

    #[tokio::test]
    async fn test_late_batch_after_stop_is_ignored() {
        let (mut controller, feeder, _) = monitoring().await;
        feeder.push(vec![Sample::new(120.0, at(0))]);
        controller.process_next().await;

        // Delivered on the old subscription but not yet drained when stop ran
        let stale_sink = BatchSink::new(1, controller.deliveries_tx.clone());
        controller.stop();
        let before = controller.state();

        stale_sink.deliver(vec![Sample::new(180.0, at(5))]);
        controller.drain_pending();
        controller.on_batch(&[Sample::new(180.0, at(6))]);

        assert_eq!(controller.state(), before);
    }

    #[tokio::test]
    async fn test_stale_subscription_dropped_after_restart() {
        let (mut controller, _feeder, _) = monitoring().await;
        let old_sink = BatchSink::new(1, controller.deliveries_tx.clone());
        controller.stop();
        controller.start();

        old_sink.deliver(vec![Sample::new(150.0, at(0))]);
        controller.drain_pending();

        assert!(controller.session().is_empty());
        assert!(controller.state().is_monitoring);
    }

    #[tokio::test]
    async fn test_restart_clears_session_and_previous_zone() {
        let (mut controller, feeder, haptics) = monitoring().await;
        feeder.push(vec![Sample::new(100.0, at(0))]);
        feeder.push(vec![Sample::new(170.0, at(1))]);
        controller.drain_pending();
        controller.stop();
        assert_eq!(controller.session().len(), 2);

        controller.start();
        assert!(controller.session().is_empty());
        assert_eq!(controller.state().previous_zone, None);

        haptics.take();
        feeder.push(vec![Sample::new(100.0, at(2))]);
        controller.drain_pending();
        assert!(haptics.effects().is_empty());
    }

    #[tokio::test]
    async fn test_toggle() {
        let (mut controller, _) = controller_with(ChannelSource::default());
        controller.request_authorization().await;

        controller.toggle();
        assert!(controller.state().is_monitoring);
        controller.toggle();
        assert!(!controller.state().is_monitoring);
    }

    #[tokio::test]
    async fn test_set_max_heart_rate_is_not_retroactive() {
        let (mut controller, feeder, _) = monitoring().await;
        controller.set_max_heart_rate(20);
        assert_eq!(controller.state().max_heart_rate, 200.0);

        feeder.push(vec![Sample::new(166.0, at(0))]);
        controller.drain_pending();
        assert_eq!(controller.state().current_zone, Zone::Cardio);

        controller.set_max_heart_rate(30);
        let state = controller.state();
        assert_eq!(state.max_heart_rate, 190.0);
        assert_eq!(state.current_zone, Zone::Cardio);
    }

    #[tokio::test]
    async fn test_invalid_age_recorded() {
        let (mut controller, _) = controller_with(ChannelSource::default());
        controller.set_max_heart_rate(230);
        let state = controller.state();
        assert_eq!(state.max_heart_rate, 190.0);
        assert!(state.last_error.unwrap().starts_with("Invalid parameter"));
    }

    #[tokio::test]
    async fn test_fetch_latest_requires_monitoring() {
        let source = ChannelSource::default().with_latest(Sample::new(150.0, at(0)));
        let (mut controller, _) = controller_with(source);
        controller.request_authorization().await;

        controller.fetch_latest().await;
        assert_eq!(controller.state().current_bpm, 0.0);

        controller.start();
        controller.fetch_latest().await;
        let state = controller.state();
        assert_eq!(state.current_bpm, 150.0);
        assert_eq!(state.current_zone, Zone::Cardio);
        assert!(controller.session().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_monitoring() {
        let source = ChannelSource::default().with_fetch_failure("query failed");
        let (mut controller, _) = controller_with(source);
        controller.request_authorization().await;
        controller.start();

        controller.fetch_latest().await;

        let state = controller.state();
        assert!(state.is_monitoring);
        assert_eq!(
            state.last_error.as_deref(),
            Some("Failed to fetch heart rate: query failed")
        );
    }

    #[tokio::test]
    async fn test_watch_sees_updates() {
        let (mut controller, feeder, _) = monitoring().await;
        let mut rx = controller.watch();
        rx.borrow_and_update();

        feeder.push(vec![Sample::new(130.0, at(0))]);
        controller.process_next().await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().current_bpm, 130.0);
    }

    #[tokio::test]
    async fn test_rejected_reading_only_sets_last_error() {
        let (mut controller, feeder, haptics) = monitoring().await;
        feeder.push(vec![Sample::new(120.0, at(0))]);
        controller.drain_pending();
        let before = controller.state();

        feeder.push(vec![Sample::new(f64::NAN, at(5))]);
        controller.drain_pending();

        let after = controller.state();
        assert!(after
            .last_error
            .as_deref()
            .is_some_and(|e| e.starts_with("Invalid parameter")));
        assert_eq!(
            MonitoringState {
                last_error: None,
                ..after
            },
            before
        );
        assert_eq!(controller.session().len(), 1);
        assert!(haptics.effects().is_empty());
    }

    #[tokio::test]
    async fn test_failed_subscribe_keeps_previous_session() {
        let (mut controller, feeder, haptics) = monitoring().await;
        feeder.push(vec![Sample::new(120.0, at(0))]);
        controller.drain_pending();
        controller.stop();
        haptics.take();

        feeder.set_subscription_failure(Some("busy"));
        controller.start();

        let state = controller.state();
        assert_eq!(state.phase, Phase::Idle);
        assert_eq!(
            state.last_error.as_deref(),
            Some("Failed to subscribe to heart rate updates: busy")
        );
        assert_eq!(state.stats.count, 1);
        assert!(!controller.session().is_active());
        assert!(haptics.effects().is_empty());

        feeder.set_subscription_failure(None);
        controller.start();
        assert!(controller.state().is_monitoring);
        assert!(controller.session().is_empty());
    }

    #[tokio::test]
    async fn test_zero_heart_rate_accepted() {
        let (mut controller, feeder, _) = monitoring().await;
        feeder.push(vec![Sample::new(0.0, at(0))]);
        controller.drain_pending();

        let state = controller.state();
        assert_eq!(state.current_zone, Zone::Rest);
        assert_eq!(state.stats.count, 1);
        assert!(state.last_error.is_none());
    }
}
