//! Heart rate data source abstraction
//!
//! The controller talks to the platform health-data service through the
//! [`HeartRateSource`] trait. Live samples are pushed by the source into a
//! [`BatchSink`], which buffers them on an unbounded channel until the controller
//! drains them on its own task.

mod channel;
mod ndjson;

pub use channel::{BatchFeeder, ChannelSource};
pub use ndjson::{parse_array, parse_ndjson, validate_samples, SampleIssue};

use std::fmt::Debug;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::MonitorError;
use crate::types::Sample;

/// Identifies one live subscription
pub type SubscriptionId = u64;

/// A batch of samples tagged with the subscription that produced it
#[derive(Debug, Clone)]
pub struct Delivery {
    pub subscription: SubscriptionId,
    pub samples: Vec<Sample>,
}

/// Producer end handed to a source on subscribe.
///
/// Cloneable and usable from any thread. Deliveries after the controller has
/// dropped its receiver are discarded.
#[derive(Debug, Clone)]
pub struct BatchSink {
    subscription: SubscriptionId,
    sender: mpsc::UnboundedSender<Delivery>,
}

impl BatchSink {
    pub fn new(subscription: SubscriptionId, sender: mpsc::UnboundedSender<Delivery>) -> Self {
        Self {
            subscription,
            sender,
        }
    }

    pub fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// Push a batch (newest-relevant first). Returns false once the receiver is gone.
    pub fn deliver(&self, samples: Vec<Sample>) -> bool {
        self.sender
            .send(Delivery {
                subscription: self.subscription,
                samples,
            })
            .is_ok()
    }
}

/// Handle returned by [`HeartRateSource::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
}

/// Platform heart rate service
#[async_trait]
pub trait HeartRateSource: Send + Sync + Debug {
    /// Whether the device supports heart rate data at all
    fn is_available(&self) -> bool;

    /// Ask the user for read access
    async fn request_authorization(&self) -> Result<(), MonitorError>;

    /// One-shot fetch of the most recent sample
    async fn fetch_latest(&self) -> Result<Option<Sample>, MonitorError>;

    /// Start continuous delivery into `sink`
    fn subscribe(&self, sink: BatchSink) -> Result<SubscriptionHandle, MonitorError>;

    /// Stop delivery for `handle`
    fn unsubscribe(&self, handle: SubscriptionHandle);
}
