//! Per-frame analysis reports.

use serde::{Deserialize, Serialize};

/// Analysis result for a single frame, as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameReport {
    /// Free-text description of what the frame shows.
    pub description: String,
    /// Short labels for the dominant subjects, if any.
    #[serde(default)]
    pub labels: Vec<String>,
}

impl FrameReport {
    /// Create a report with a description only.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            labels: Vec::new(),
        }
    }

    /// Attach labels.
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serde_roundtrip() {
        let report = FrameReport::new("a person at a desk")
            .with_labels(vec!["person".to_string(), "desk".to_string()]);

        let json = serde_json::to_string(&report).expect("serialize FrameReport");
        let decoded: FrameReport = serde_json::from_str(&json).expect("deserialize FrameReport");
        assert_eq!(decoded, report);
    }

    #[test]
    fn test_labels_default_to_empty() {
        let decoded: FrameReport =
            serde_json::from_str(r#"{"description":"empty street"}"#).expect("deserialize");
        assert!(decoded.labels.is_empty());
    }
}
