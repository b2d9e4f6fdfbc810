//! Core types for the Breath Flux pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: raw candidate records, canonical (configured) stage signals, per-stage
//! reports and the cross-candidate grand averages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Task difficulty of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Easy,
    Normal,
    Hard,
}

impl Level {
    /// All levels in ascending difficulty
    pub const ALL: [Level; 3] = [Level::Easy, Level::Normal, Level::Hard];

    /// Numeric rank used for sorting and grouping (easy = 1, normal = 2, hard = 3)
    pub fn rank(&self) -> u8 {
        match self {
            Level::Easy => 1,
            Level::Normal => 2,
            Level::Hard => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Easy => "easy",
            Level::Normal => "normal",
            Level::Hard => "hard",
        }
    }

    /// Parse a recorded level label. Unknown labels fall back to `Normal`,
    /// the same way the recording tool ranks them.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "easy" => Level::Easy,
            "hard" => Level::Hard,
            _ => Level::Normal,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Physiological channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Pupil,
    Respiratory,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Pupil => "pupil",
            Channel::Respiratory => "respiratory",
        }
    }
}

/// Outcome category of a single response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOutcome {
    Correct,
    Incorrect,
    Other,
}

/// A discrete response event recorded during a stage
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponseEvent {
    pub outcome: ResponseOutcome,
    /// Reaction time in seconds, present only for explicit timed responses
    pub reaction_time: Option<f64>,
}

impl ResponseEvent {
    pub fn timed(outcome: ResponseOutcome, reaction_time: f64) -> Self {
        Self {
            outcome,
            reaction_time: Some(reaction_time),
        }
    }

    pub fn untimed(outcome: ResponseOutcome) -> Self {
        Self {
            outcome,
            reaction_time: None,
        }
    }

    pub fn is_timed(&self) -> bool {
        self.reaction_time.is_some()
    }
}

/// Ordinal post-stage survey answers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyAnswers {
    /// Perceived difficulty
    pub difficulty: Option<i32>,
    /// Perceived stress
    pub stress: Option<i32>,
}

/// One difficulty attempt by one candidate (raw, immutable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub level: Level,
    /// Pupil diameter in millimetres, one sample per second
    pub pupil: Vec<f64>,
    /// Respiratory rate in breaths per minute, irregular cadence
    pub respiratory: Vec<f64>,
    pub responses: Vec<ResponseEvent>,
    /// Correctness rate as recorded by the task engine (percent)
    pub correct_rate: Option<f64>,
    pub survey: SurveyAnswers,
}

/// Demographic metadata of a candidate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub age: String,
    pub gender: String,
    pub level_tried: String,
}

/// One recording session: a subject and the stages they attempted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub subject: Subject,
    pub stages: Vec<Stage>,
    pub comment: String,
}

/// Position of a stage within a batch of candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StageId {
    pub candidate: usize,
    pub stage: usize,
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "candidate {} / stage {}", self.candidate, self.stage)
    }
}

/// Stage signals after resampling and outlier treatment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalStage {
    pub id: StageId,
    pub level: Level,
    /// Resampled, MAD-filtered pupil diameter (canonical length)
    pub pupil: Vec<f64>,
    /// Interpolated respiratory rate (canonical length)
    pub respiratory: Vec<f64>,
    /// Outlier bounds applied to the pupil channel
    pub pupil_upper: f64,
    pub pupil_lower: f64,
}

impl CanonicalStage {
    pub fn series(&self, channel: Channel) -> &[f64] {
        match channel {
            Channel::Pupil => &self.pupil,
            Channel::Respiratory => &self.respiratory,
        }
    }
}

/// Per-window value of a segmented index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexWindow {
    /// Window start, seconds from stage start
    pub start_sec: f64,
    pub value: f64,
}

/// Output of an activity index computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityIndexResult {
    /// Index value (Hz-like rate, or mean of windows for segmented variants)
    pub value: f64,
    /// Per-window values, empty for whole-signal indices
    pub windows: Vec<IndexWindow>,
}

impl ActivityIndexResult {
    pub fn scalar(value: f64) -> Self {
        Self {
            value,
            windows: Vec::new(),
        }
    }
}

/// Behavioral scalars of a stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorMetrics {
    /// Mean reaction time of correct timed responses (seconds)
    pub reaction_time_sec: Option<f64>,
    /// Timed responses with an incorrect outcome
    pub error_count: usize,
    /// Correct responses over all responses (percent)
    pub accuracy_pct: Option<f64>,
}

/// Everything computed for one non-corrupted stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub id: StageId,
    pub level: Level,
    pub canonical: CanonicalStage,
    /// Savitzky-Golay trend of the canonical pupil series
    pub pupil_trend: Option<Vec<f64>>,
    pub mean_pupil: f64,
    pub behavior: BehaviorMetrics,
    pub ipa: Option<ActivityIndexResult>,
    pub windowed_ipa: Option<ActivityIndexResult>,
    /// Smoothed windowed IPA values
    pub ipa_trend: Option<Vec<f64>>,
    pub lhipa: Option<ActivityIndexResult>,
    pub ripa: Option<ActivityIndexResult>,
    pub survey: SurveyAnswers,
    pub correct_rate: Option<f64>,
    /// Metrics that were unavailable and why
    pub issues: Vec<String>,
}

/// A stage removed from all outputs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedStage {
    pub id: StageId,
    pub level: Level,
    pub reason: String,
}

/// Per-candidate slice of the analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateReport {
    pub index: usize,
    pub subject: Subject,
    pub comment: String,
    /// Stage reports ordered by difficulty
    pub stages: Vec<StageReport>,
    pub excluded: Vec<ExcludedStage>,
}

/// A failure isolated to a single item of the batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Human-readable item reference (file name, stage id, ...)
    pub item: String,
    pub code: String,
    pub message: String,
}

impl ItemFailure {
    pub fn new(item: impl Into<String>, error: &crate::ComputeError) -> Self {
        Self {
            item: item.into(),
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}
