//! NDJSON sample input
//!
//! One sample per line: `{"bpm": 120.0, "timestamp": "2024-01-15T14:00:00Z"}`.
//! The optional `id` field is generated when absent.

use serde::Serialize;

use crate::error::MonitorError;
use crate::types::Sample;

/// Parse a JSON string containing an array of samples
pub fn parse_array(json: &str) -> Result<Vec<Sample>, MonitorError> {
    let samples: Vec<Sample> = serde_json::from_str(json)?;
    Ok(samples)
}

/// Parse NDJSON (newline-delimited JSON), skipping blank lines
pub fn parse_ndjson(ndjson: &str) -> Result<Vec<Sample>, MonitorError> {
    let mut samples = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<Sample>(trimmed) {
            Ok(sample) => samples.push(sample),
            Err(e) => {
                return Err(MonitorError::ParseError(format!(
                    "Failed to parse line {}: {}",
                    line_num + 1,
                    e
                )));
            }
        }
    }
    Ok(samples)
}

/// A suspicious sample. Such samples are still accepted by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleIssue {
    pub index: usize,
    pub message: String,
}

/// Report non-positive or non-finite readings and timestamps going backwards
pub fn validate_samples(samples: &[Sample]) -> Vec<SampleIssue> {
    let mut issues = Vec::new();
    for (index, sample) in samples.iter().enumerate() {
        if !sample.bpm.is_finite() {
            issues.push(SampleIssue {
                index,
                message: format!("heart rate is not finite: {}", sample.bpm),
            });
        } else if sample.bpm <= 0.0 {
            issues.push(SampleIssue {
                index,
                message: format!("heart rate is not positive: {}", sample.bpm),
            });
        }

        if index > 0 && sample.timestamp < samples[index - 1].timestamp {
            issues.push(SampleIssue {
                index,
                message: "timestamp earlier than previous sample".to_string(),
            });
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ndjson() {
        let input = r#"
{"bpm": 72.0, "timestamp": "2024-01-15T14:00:00Z"}

{"bpm": 75.5, "timestamp": "2024-01-15T14:00:05Z", "id": "67e55044-10b1-426f-9247-bb680e5fe0c8"}
"#;
        let samples = parse_ndjson(input).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].bpm, 72.0);
        assert_eq!(
            samples[1].id.to_string(),
            "67e55044-10b1-426f-9247-bb680e5fe0c8"
        );
    }

    #[test]
    fn test_parse_ndjson_reports_line() {
        let input = "{\"bpm\": 72.0, \"timestamp\": \"2024-01-15T14:00:00Z\"}\nnot json\n";
        let err = parse_ndjson(input).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_parse_array() {
        let input = r#"[{"bpm": 60, "timestamp": "2024-01-15T14:00:00Z"}]"#;
        let samples = parse_array(input).unwrap();
        assert_eq!(samples[0].bpm, 60.0);
        assert!(parse_array("{}").is_err());
    }

    #[test]
    fn test_validate_samples() {
        let input = r#"[
            {"bpm": 60, "timestamp": "2024-01-15T14:00:10Z"},
            {"bpm": 0, "timestamp": "2024-01-15T14:00:00Z"}
        ]"#;
        let samples = parse_array(input).unwrap();
        let issues = validate_samples(&samples);
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.index == 1));
    }
}
