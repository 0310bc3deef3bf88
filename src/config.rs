//! Monitoring configuration
//!
//! Loaded from a JSON file, with CLI flags layered on top by the binary.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::MonitorError;
use crate::types::DEFAULT_MAX_HEART_RATE;
use crate::zone::max_heart_rate_for_age;

/// Default tracing filter
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Maximum heart rate in bpm
    pub max_heart_rate: f64,
    /// When set, max heart rate is `220 - age` and `max_heart_rate` is ignored
    pub age: Option<u32>,
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_heart_rate: DEFAULT_MAX_HEART_RATE,
            age: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl MonitorConfig {
    pub fn from_json(json: &str) -> Result<Self, MonitorError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON config file
    pub fn load(path: &Path) -> Result<Self, MonitorError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, MonitorError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Max heart rate after applying `age`
    pub fn resolved_max_heart_rate(&self) -> Result<f64, MonitorError> {
        match self.age {
            Some(age) => max_heart_rate_for_age(age),
            None => Ok(self.max_heart_rate),
        }
    }

    pub fn validate(&self) -> Result<(), MonitorError> {
        let max_heart_rate = self.resolved_max_heart_rate()?;
        if !max_heart_rate.is_finite() || max_heart_rate <= 0.0 {
            return Err(MonitorError::InvalidParameter(format!(
                "max heart rate must be positive, got {max_heart_rate}"
            )));
        }
        Ok(())
    }
}
