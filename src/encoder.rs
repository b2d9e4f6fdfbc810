//! Report encoding
//!
//! This module wraps an analysis report with producer and provenance metadata
//! and serializes it to JSON.

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ComputeError;
use crate::pipeline::AnalysisReport;
use crate::{FLUX_VERSION, PRODUCER_NAME};

/// Current report schema version
pub const REPORT_SCHEMA_VERSION: &str = "1.0.0";

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Where the report came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportProvenance {
    pub computed_at_utc: String,
    pub candidates: usize,
    pub stages_analyzed: usize,
    pub stages_excluded: usize,
    pub failures: usize,
}

/// Encoded report envelope
#[derive(Debug, Clone, Serialize)]
pub struct ReportPayload<'a> {
    pub schema_version: &'static str,
    pub producer: ReportProducer,
    pub provenance: ReportProvenance,
    pub report: &'a AnalysisReport,
}

/// Encoder for analysis reports
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    /// Wrap a report with metadata
    pub fn encode<'a>(&self, report: &'a AnalysisReport) -> ReportPayload<'a> {
        ReportPayload {
            schema_version: REPORT_SCHEMA_VERSION,
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: FLUX_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            provenance: ReportProvenance {
                computed_at_utc: Utc::now().to_rfc3339(),
                candidates: report.candidates.len(),
                stages_analyzed: report.stages_analyzed(),
                stages_excluded: report.stages_excluded(),
                failures: report.failures.len(),
            },
            report,
        }
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(&self, report: &AnalysisReport) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(&self.encode(report))
            .map_err(|e| ComputeError::EncodingError(e.to_string()))
    }

    /// Encode to a single-line JSON string
    pub fn encode_to_json_compact(&self, report: &AnalysisReport) -> Result<String, ComputeError> {
        serde_json::to_string(&self.encode(report))
            .map_err(|e| ComputeError::EncodingError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregator;
    use crate::config::PipelineConfig;
    use crate::types::{CandidateReport, ExcludedStage, Level, StageId, Subject};
    use std::collections::BTreeMap;

    fn make_test_report() -> AnalysisReport {
        let config = PipelineConfig::default();
        AnalysisReport {
            config,
            candidates: vec![CandidateReport {
                index: 0,
                subject: Subject {
                    name: "P07".to_string(),
                    ..Default::default()
                },
                comment: String::new(),
                stages: Vec::new(),
                excluded: vec![ExcludedStage {
                    id: StageId {
                        candidate: 0,
                        stage: 0,
                    },
                    level: Level::Hard,
                    reason: "constant pupil series".to_string(),
                }],
            }],
            grand_average: Aggregator::new(config.aggregation).finish(),
            level_activity: BTreeMap::new(),
            failures: Vec::new(),
        }
    }

    #[test]
    fn test_encode_payload() {
        let report = make_test_report();
        let encoder = ReportEncoder::with_instance_id("test-instance".to_string());
        let payload = encoder.encode(&report);

        assert_eq!(payload.schema_version, REPORT_SCHEMA_VERSION);
        assert_eq!(payload.producer.name, PRODUCER_NAME);
        assert_eq!(payload.producer.version, FLUX_VERSION);
        assert_eq!(payload.producer.instance_id, "test-instance");
        assert_eq!(payload.provenance.candidates, 1);
        assert_eq!(payload.provenance.stages_analyzed, 0);
        assert_eq!(payload.provenance.stages_excluded, 1);
    }

    #[test]
    fn test_encode_to_json() {
        let report = make_test_report();
        let encoder = ReportEncoder::new();
        let json = encoder.encode_to_json(&report).unwrap();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["schema_version"], REPORT_SCHEMA_VERSION);
        assert!(parsed["producer"]["instance_id"].is_string());
        assert!(parsed["provenance"]["computed_at_utc"].is_string());
        assert_eq!(parsed["report"]["candidates"][0]["excluded"][0]["level"], "hard");
        assert_eq!(parsed["report"]["config"]["aggregation"], "pairwise");

        let compact = encoder.encode_to_json_compact(&report).unwrap();
        assert!(!compact.contains('\n'));
    }
}
