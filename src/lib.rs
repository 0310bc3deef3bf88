//! Heartzone - Live heart rate zone tracking
//!
//! Heartzone turns a stream of heart rate samples into training-zone state:
//! each batch is classified against the user's max heart rate → zone changes
//! become transition events → events become haptic feedback → the session
//! accumulates min / max / average / duration statistics.
//!
//! ## Modules
//!
//! - **Core**: [`zone`], [`session`], [`transition`], [`feedback`] and the
//!   [`pipeline`] that ties them together for one batch at a time
//! - **Controller**: [`controller::MonitoringController`] owns the session lifecycle
//!   against a [`source::HeartRateSource`], and [`service`] runs it as a task
//! - **Embedding**: C-compatible [`ffi`] bindings and display metadata in [`presentation`]

pub mod config;
pub mod controller;
pub mod error;
pub mod feedback;
pub mod pipeline;
pub mod presentation;
pub mod service;
pub mod session;
pub mod source;
pub mod transition;
pub mod types;
pub mod zone;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::MonitorConfig;
pub use controller::MonitoringController;
pub use error::MonitorError;
pub use feedback::{FeedbackDispatcher, HapticExecutor};
pub use pipeline::{BatchOutcome, SamplePipeline};
pub use session::SessionAggregator;
pub use source::{BatchSink, HeartRateSource};
pub use types::{
    Direction, FeedbackEffect, MonitoringState, Phase, Sample, SessionStats, TransitionEvent,
};
pub use zone::{classify, Zone};

/// Heartzone library version
pub const HEARTZONE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by diagnostics
pub const PRODUCER_NAME: &str = "heartzone";
