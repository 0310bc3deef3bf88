//! Channel-fed data source.
//!
//! The producer side ([`BatchFeeder`]) pushes batches which are forwarded to the
//! currently subscribed sink. Availability, authorization and one-shot fetch
//! outcomes are configurable, so the same source backs the CLI's stdin stream and
//! the controller tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::{BatchSink, HeartRateSource, SubscriptionHandle};
use crate::error::MonitorError;
use crate::types::Sample;

#[derive(Debug)]
struct Inner {
    available: bool,
    authorization_error: Option<String>,
    latest: Option<Sample>,
    fetch_error: Option<String>,
    subscribe_error: Option<String>,
    sink: Option<BatchSink>,
    subscriptions: usize,
}

/// A data source whose samples are pushed through a [`BatchFeeder`].
///
/// # Example
///
/// ```
/// use heartzone::source::ChannelSource;
///
/// let (feeder, source) = ChannelSource::create();
/// assert!(!feeder.is_subscribed());
/// ```
#[derive(Debug, Clone)]
pub struct ChannelSource {
    inner: Arc<Mutex<Inner>>,
}

/// Producer end of a [`ChannelSource`]
#[derive(Debug, Clone)]
pub struct BatchFeeder {
    inner: Arc<Mutex<Inner>>,
}

impl Default for ChannelSource {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                available: true,
                authorization_error: None,
                latest: None,
                fetch_error: None,
                subscribe_error: None,
                sink: None,
                subscriptions: 0,
            })),
        }
    }
}

impl ChannelSource {
    /// Create a feeder/source pair for an available, authorizable device
    pub fn create() -> (BatchFeeder, Self) {
        let source = Self::default();
        let feeder = BatchFeeder {
            inner: Arc::clone(&source.inner),
        };
        (feeder, source)
    }

    /// Report the device as unsupported
    pub fn unavailable(self) -> Self {
        self.inner.lock().available = false;
        self
    }

    /// Make authorization fail with `reason`
    pub fn with_authorization_failure(self, reason: &str) -> Self {
        self.inner.lock().authorization_error = Some(reason.to_string());
        self
    }

    /// Sample returned by `fetch_latest`
    pub fn with_latest(self, sample: Sample) -> Self {
        self.inner.lock().latest = Some(sample);
        self
    }

    /// Make `fetch_latest` fail with `reason`
    pub fn with_fetch_failure(self, reason: &str) -> Self {
        self.inner.lock().fetch_error = Some(reason.to_string());
        self
    }

    /// Make `subscribe` fail with `reason`
    pub fn with_subscription_failure(self, reason: &str) -> Self {
        self.inner.lock().subscribe_error = Some(reason.to_string());
        self
    }

    /// Total number of subscribe calls
    pub fn subscription_count(&self) -> usize {
        self.inner.lock().subscriptions
    }
}

impl BatchFeeder {
    /// Forward a batch to the live subscription.
    ///
    /// Returns false when nothing is subscribed or the subscriber is gone.
    pub fn push(&self, samples: Vec<Sample>) -> bool {
        let sink = self.inner.lock().sink.clone();
        match sink {
            Some(sink) => sink.deliver(samples),
            None => {
                debug!("no live subscription, dropping batch");
                false
            }
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.lock().sink.is_some()
    }

    /// Replace the sample served by `fetch_latest`
    pub fn set_latest(&self, sample: Option<Sample>) {
        self.inner.lock().latest = sample;
    }

    /// Make later `subscribe` calls fail with `reason`, or succeed again with `None`
    pub fn set_subscription_failure(&self, reason: Option<&str>) {
        self.inner.lock().subscribe_error = reason.map(str::to_string);
    }
}

#[async_trait]
impl HeartRateSource for ChannelSource {
    fn is_available(&self) -> bool {
        self.inner.lock().available
    }

    async fn request_authorization(&self) -> Result<(), MonitorError> {
        let inner = self.inner.lock();
        if !inner.available {
            return Err(MonitorError::DeviceUnavailable);
        }
        match &inner.authorization_error {
            Some(reason) => Err(MonitorError::AuthorizationFailed(reason.clone())),
            None => Ok(()),
        }
    }

    async fn fetch_latest(&self) -> Result<Option<Sample>, MonitorError> {
        let inner = self.inner.lock();
        match &inner.fetch_error {
            Some(reason) => Err(MonitorError::FetchFailed(reason.clone())),
            None => Ok(inner.latest.clone()),
        }
    }

    fn subscribe(&self, sink: BatchSink) -> Result<SubscriptionHandle, MonitorError> {
        let mut inner = self.inner.lock();
        if !inner.available {
            return Err(MonitorError::DeviceUnavailable);
        }
        if let Some(reason) = &inner.subscribe_error {
            return Err(MonitorError::SubscriptionFailed(reason.clone()));
        }
        let handle = SubscriptionHandle {
            id: sink.subscription(),
        };
        inner.sink = Some(sink);
        inner.subscriptions += 1;
        info!(subscription = handle.id, "heart rate subscription started");
        Ok(handle)
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut inner = self.inner.lock();
        if inner
            .sink
            .as_ref()
            .is_some_and(|sink| sink.subscription() == handle.id)
        {
            inner.sink = None;
            info!(subscription = handle.id, "heart rate subscription stopped");
        }
    }
}
