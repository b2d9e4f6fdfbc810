//! Pipeline configuration
//!
//! Every tunable of the pipeline lives in [`PipelineConfig`]. Defaults reproduce
//! the parameters of the BreathActivity recordings; any subset of fields
//! can be overridden from JSON.

use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

/// Canonical pupil length (5-minute stage at 1 Hz)
pub const DEFAULT_PUPIL_LENGTH: usize = 300;

/// Canonical respiratory length (one value every 5 seconds)
pub const DEFAULT_RESPIRATORY_LENGTH: usize = 60;

/// Moderately conservative MAD multiplier
pub const DEFAULT_MAD_MULTIPLIER: f64 = 2.5;

/// Deepest IPA decomposition accepted; `2^levels` samples are required
pub const MAX_IPA_LEVELS: usize = 16;

/// What happens to in-bound samples during outlier treatment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMode {
    /// Clip outliers to the bounds, pass in-bound samples through
    #[default]
    Clip,
    /// Clip outliers to the bounds, substitute in-bound samples by the median
    Replace,
}

/// Right-boundary handling of modulus-maxima detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaximaBoundary {
    /// Right neighbour exists only for `i < len - 2`
    #[default]
    Legacy,
    /// Right neighbour exists for `i < len - 1`
    Exact,
}

/// How contributions are combined into a grand average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// `(previous + new) / 2`, weighting later contributions more heavily
    #[default]
    Pairwise,
    /// Arithmetic mean of all contributions, updated incrementally
    IncrementalMean,
}

/// Outlier treatment parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub mad_multiplier: f64,
    pub mode: OutlierMode,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            mad_multiplier: DEFAULT_MAD_MULTIPLIER,
            mode: OutlierMode::Clip,
        }
    }
}

/// Canonical lengths of the two channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleConfig {
    pub pupil_length: usize,
    pub respiratory_length: usize,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            pupil_length: DEFAULT_PUPIL_LENGTH,
            respiratory_length: DEFAULT_RESPIRATORY_LENGTH,
        }
    }
}

/// Savitzky-Golay parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub window: usize,
    pub polyorder: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        // 60-second trend line
        Self {
            window: 60,
            polyorder: 1,
        }
    }
}

/// Activity index parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Sampling rate of the pupil channel
    pub sample_rate_hz: f64,
    /// Decomposition depth of IPA
    pub ipa_levels: usize,
    pub maxima_boundary: MaximaBoundary,
    /// Chunk length of the windowed IPA series
    pub ipa_window_sec: usize,
    /// Smoothing of the windowed IPA series
    pub ipa_trend: SmoothingConfig,
    pub ripa_interval_sec: usize,
    pub ripa_window: usize,
    pub ripa_polyorder: usize,
    pub ripa_threshold: f64,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 1.0,
            ipa_levels: 2,
            maxima_boundary: MaximaBoundary::Legacy,
            ipa_window_sec: 5,
            ipa_trend: SmoothingConfig {
                window: 5,
                polyorder: 1,
            },
            ripa_interval_sec: 5,
            ripa_window: 5,
            ripa_polyorder: 2,
            ripa_threshold: 0.0,
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub normalizer: NormalizerConfig,
    pub resample: ResampleConfig,
    pub smoothing: SmoothingConfig,
    pub activity: ActivityConfig,
    pub aggregation: AggregationPolicy,
}

impl PipelineConfig {
    /// Load a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to JSON
    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(ComputeError::JsonError)
    }

    /// Reject parameter combinations no stage could satisfy
    pub fn validate(&self) -> Result<(), ComputeError> {
        if !(self.normalizer.mad_multiplier.is_finite() && self.normalizer.mad_multiplier >= 0.0) {
            return Err(ComputeError::InvalidParameter(format!(
                "mad_multiplier must be a non-negative number, got {}",
                self.normalizer.mad_multiplier
            )));
        }
        if self.resample.pupil_length == 0 || self.resample.respiratory_length == 0 {
            return Err(ComputeError::InvalidParameter(
                "canonical lengths must be positive".to_string(),
            ));
        }
        if !(self.activity.sample_rate_hz.is_finite() && self.activity.sample_rate_hz > 0.0) {
            return Err(ComputeError::InvalidParameter(format!(
                "sample_rate_hz must be positive, got {}",
                self.activity.sample_rate_hz
            )));
        }
        if self.activity.ipa_levels == 0 || self.activity.ipa_levels > MAX_IPA_LEVELS {
            return Err(ComputeError::InvalidParameter(format!(
                "ipa_levels must be between 1 and {MAX_IPA_LEVELS}, got {}",
                self.activity.ipa_levels
            )));
        }
        if self.activity.ipa_window_sec == 0 || self.activity.ripa_interval_sec == 0 {
            return Err(ComputeError::InvalidParameter(
                "window lengths must be positive".to_string(),
            ));
        }
        if self.activity.ripa_window <= self.activity.ripa_polyorder {
            return Err(ComputeError::InvalidParameter(format!(
                "ripa_window ({}) must exceed ripa_polyorder ({})",
                self.activity.ripa_window, self.activity.ripa_polyorder
            )));
        }
        Ok(())
    }
}
