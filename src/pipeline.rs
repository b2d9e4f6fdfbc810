//! Pipeline orchestration
//!
//! This module provides the public API for Breath Flux.
//! It orchestrates the full pipeline from raw candidate records to the
//! analysis report: configuration (resampling and outlier treatment), per-stage
//! metrics and activity indices, then cross-candidate aggregation.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::activity::ActivityAnalyzer;
use crate::adapter::{BreathActivityAdapter, RecordAdapter};
use crate::aggregate::{is_corrupted, Aggregation, Aggregator};
use crate::config::PipelineConfig;
use crate::encoder::ReportEncoder;
use crate::error::ComputeError;
use crate::metrics::{accuracy, error_count, reaction_time};
use crate::normalizer::{is_constant, mean, RobustNormalizer};
use crate::resample::{interpolate_linear, resample_fft};
use crate::smoothing::SavitzkyGolay;
use crate::types::{
    ActivityIndexResult, BehaviorMetrics, CandidateReport, CanonicalStage, Candidate, ExcludedStage, ItemFailure,
    Level, Stage, StageId, StageReport,
};

/// Activity indices of one level's grand-average pupil signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelActivity {
    pub ipa: Option<f64>,
    pub windowed_ipa: Option<ActivityIndexResult>,
    pub ipa_trend: Option<Vec<f64>>,
}

/// Result of one batch analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub config: PipelineConfig,
    pub candidates: Vec<CandidateReport>,
    pub grand_average: Aggregation,
    pub level_activity: BTreeMap<Level, LevelActivity>,
    /// Per-item failures of the whole run (records, stages, contributions)
    pub failures: Vec<ItemFailure>,
}

impl AnalysisReport {
    pub fn stages_analyzed(&self) -> usize {
        self.candidates.iter().map(|c| c.stages.len()).sum()
    }

    pub fn stages_excluded(&self) -> usize {
        self.candidates.iter().map(|c| c.excluded.len()).sum()
    }
}

/// Analyze a JSON document (or array of documents) with default settings and
/// return the encoded report.
///
/// # Example
/// ```ignore
/// let report_json = analyze_records_json(std::fs::read_to_string("P01.json")?)?;
/// ```
pub fn analyze_records_json(raw_json: String) -> Result<String, ComputeError> {
    AnalysisProcessor::new().analyze_json(&raw_json)
}

/// Resample, interpolate and outlier-treat one raw stage.
///
/// Fails with `DegenerateSignal` when either series is constant, raw or
/// after configuration.
pub fn configure_stage(
    id: StageId,
    stage: &Stage,
    config: &PipelineConfig,
) -> Result<CanonicalStage, ComputeError> {
    let respiratory = interpolate_linear(&stage.respiratory, config.resample.respiratory_length)?;
    let resampled = resample_fft(&stage.pupil, config.resample.pupil_length)?;
    if is_constant(&stage.pupil) || is_constant(&stage.respiratory) {
        return Err(ComputeError::DegenerateSignal(format!(
            "{} stage has a constant raw series",
            stage.level
        )));
    }
    let normalized = RobustNormalizer::normalize(&resampled, &config.normalizer)?;

    let canonical = CanonicalStage {
        id,
        level: stage.level,
        pupil: normalized.values,
        respiratory,
        pupil_upper: normalized.upper,
        pupil_lower: normalized.lower,
    };

    if is_corrupted(&canonical) {
        return Err(ComputeError::DegenerateSignal(format!(
            "{} stage has a constant canonical series",
            stage.level
        )));
    }
    Ok(canonical)
}

/// Per-stage metrics and activity indices of a configured stage
pub fn analyze_stage(
    stage: &Stage,
    canonical: CanonicalStage,
    analyzer: &ActivityAnalyzer,
    config: &PipelineConfig,
) -> StageReport {
    let id = canonical.id;
    let mut issues = Vec::new();
    let pupil = &canonical.pupil;

    let pupil_trend = available(
        &mut issues,
        id,
        "pupil_trend",
        SavitzkyGolay::new(config.smoothing.window, config.smoothing.polyorder)
            .and_then(|f| f.smooth(pupil)),
    );
    let ipa = available(&mut issues, id, "ipa", analyzer.ipa(pupil));
    let windowed_ipa = available(&mut issues, id, "windowed_ipa", analyzer.windowed_ipa(pupil));
    let ipa_trend = match &windowed_ipa {
        Some(windows) => available(&mut issues, id, "ipa_trend", analyzer.window_trend(windows)),
        None => None,
    };
    let lhipa = available(&mut issues, id, "lhipa", analyzer.lhipa(pupil));
    let ripa = available(&mut issues, id, "ripa", analyzer.ripa(pupil));
    let responses = &stage.responses;
    let behavior = BehaviorMetrics {
        reaction_time_sec: available(&mut issues, id, "reaction_time", reaction_time(responses)),
        error_count: error_count(responses),
        accuracy_pct: available(&mut issues, id, "accuracy", accuracy(responses)),
    };
    let mean_pupil = mean(pupil).unwrap_or(0.0);

    StageReport {
        id,
        level: canonical.level,
        mean_pupil,
        pupil_trend,
        behavior,
        ipa,
        windowed_ipa,
        ipa_trend,
        lhipa,
        ripa,
        survey: stage.survey,
        correct_rate: stage.correct_rate,
        canonical,
        issues,
    }
}

/// Unwrap a metric result, recording why it is unavailable
fn available<T>(
    issues: &mut Vec<String>,
    id: StageId,
    name: &str,
    result: Result<T, ComputeError>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(stage = %id, metric = name, error = %e, "metric unavailable");
            issues.push(format!("{name}: {e}"));
            None
        }
    }
}

/// Configure and analyze every stage of a candidate.
///
/// Returns the report, the canonical stages in insertion order (for
/// aggregation) and the stage failures.
fn analyze_candidate(
    index: usize,
    candidate: &Candidate,
    analyzer: &ActivityAnalyzer,
    config: &PipelineConfig,
) -> (CandidateReport, Vec<CanonicalStage>, Vec<ItemFailure>) {
    let mut stages = Vec::with_capacity(candidate.stages.len());
    let mut canonical_stages = Vec::with_capacity(candidate.stages.len());
    let mut excluded = Vec::new();
    let mut failures = Vec::new();

    for (position, stage) in candidate.stages.iter().enumerate() {
        let id = StageId {
            candidate: index,
            stage: position,
        };
        match configure_stage(id, stage, config) {
            Ok(canonical) => {
                canonical_stages.push(canonical.clone());
                stages.push(analyze_stage(stage, canonical, analyzer, config));
                debug!(stage = %id, level = %stage.level, "stage analyzed");
            }
            Err(ComputeError::DegenerateSignal(reason)) => {
                warn!(stage = %id, level = %stage.level, %reason, "corrupted stage excluded");
                excluded.push(ExcludedStage {
                    id,
                    level: stage.level,
                    reason,
                });
            }
            Err(e) => {
                warn!(stage = %id, error = %e, "stage could not be configured");
                failures.push(ItemFailure::new(id.to_string(), &e));
            }
        }
    }

    // Stable: stages of the same level keep their recorded order
    stages.sort_by_key(|s| s.level);

    let report = CandidateReport {
        index,
        subject: candidate.subject.clone(),
        comment: candidate.comment.clone(),
        stages,
        excluded,
    };
    (report, canonical_stages, failures)
}

/// Run the full analysis over a materialized batch of candidates.
///
/// Candidates are processed in parallel; aggregation then folds the canonical
/// stages sequentially in input order.
pub fn analyze_batch(candidates: &[Candidate], config: &PipelineConfig) -> AnalysisReport {
    info!(candidates = candidates.len(), "analysis started");
    let analyzer = ActivityAnalyzer::new(config.activity);

    let results: Vec<_> = candidates
        .par_iter()
        .enumerate()
        .map(|(index, candidate)| analyze_candidate(index, candidate, &analyzer, config))
        .collect();

    let mut reports = Vec::with_capacity(results.len());
    let mut failures = Vec::new();
    let mut aggregator = Aggregator::new(config.aggregation);
    for (report, canonical_stages, stage_failures) in results {
        for canonical in &canonical_stages {
            aggregator.add(canonical);
        }
        failures.extend(stage_failures);
        reports.push(report);
    }

    let grand_average = finish_aggregation(aggregator, &mut failures);
    let level_activity = level_activity(&grand_average, &analyzer);

    let report = AnalysisReport {
        config: *config,
        candidates: reports,
        grand_average,
        level_activity,
        failures,
    };
    info!(
        stages = report.stages_analyzed(),
        excluded = report.stages_excluded(),
        failures = report.failures.len(),
        "analysis finished"
    );
    report
}

/// Finish aggregation, moving its contribution failures into the run's list
fn finish_aggregation(aggregator: Aggregator, failures: &mut Vec<ItemFailure>) -> Aggregation {
    let mut grand_average = aggregator.finish();
    failures.append(&mut grand_average.failures);
    grand_average
}

fn level_activity(
    grand_average: &Aggregation,
    analyzer: &ActivityAnalyzer,
) -> BTreeMap<Level, LevelActivity> {
    grand_average
        .pupil
        .levels
        .iter()
        .map(|(level, average)| {
            let windowed_ipa = analyzer.windowed_ipa(&average.series).ok();
            let ipa_trend = windowed_ipa
                .as_ref()
                .and_then(|w| analyzer.window_trend(w).ok());
            let activity = LevelActivity {
                ipa: analyzer.ipa(&average.series).ok().map(|r| r.value),
                windowed_ipa,
                ipa_trend,
            };
            (*level, activity)
        })
        .collect()
}

/// Stateful processor holding the configuration and report encoder.
///
/// Use this to run several batches with the same settings.
pub struct AnalysisProcessor {
    config: PipelineConfig,
    encoder: ReportEncoder,
}

impl Default for AnalysisProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisProcessor {
    /// Create a new processor with default settings
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
            encoder: ReportEncoder::new(),
        }
    }

    /// Create a processor with a specific configuration
    pub fn with_config(config: PipelineConfig) -> Self {
        Self {
            config,
            encoder: ReportEncoder::new(),
        }
    }

    /// Load configuration from JSON
    pub fn load_config(&mut self, json: &str) -> Result<(), ComputeError> {
        self.config = PipelineConfig::from_json(json)?;
        Ok(())
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Analyze already-loaded candidates
    pub fn analyze(&self, candidates: &[Candidate]) -> AnalysisReport {
        analyze_batch(candidates, &self.config)
    }

    /// Parse records, analyze them and encode the report as JSON
    pub fn analyze_json(&self, raw_json: &str) -> Result<String, ComputeError> {
        let (candidates, record_failures) = BreathActivityAdapter.parse_batch(raw_json)?;
        let mut report = self.analyze(&candidates);
        let stage_failures = std::mem::replace(&mut report.failures, record_failures);
        report.failures.extend(stage_failures);
        self.encoder.encode_to_json(&report)
    }
}
