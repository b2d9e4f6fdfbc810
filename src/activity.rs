//! Pupillary activity indices
//!
//! This module derives cognitive-load indicators from a pupil-diameter series:
//! - IPA: rate of significant modulus maxima in a wavelet detail band
//! - LHIPA: the same count over the low/high frequency band ratio
//! - RIPA: per-interval share of samples whose slope stays below the local level
//! - Windowed IPA: IPA over consecutive fixed-length chunks

use tracing::debug;

use crate::config::ActivityConfig;
use crate::error::ComputeError;
use crate::normalizer::{mean, median};
use crate::smoothing::SavitzkyGolay;
use crate::types::{ActivityIndexResult, IndexWindow};
use crate::wavelet::{modulus_maxima, threshold, universal_threshold, ThresholdMode, Wavelet};

/// Coefficients at or below this fraction of the signal's peak magnitude are
/// rounding noise
const NOISE_FLOOR: f64 = 1e-9;

/// Activity index analyzer
#[derive(Debug, Clone)]
pub struct ActivityAnalyzer {
    wavelet: Wavelet,
    config: ActivityConfig,
}

impl Default for ActivityAnalyzer {
    fn default() -> Self {
        Self::new(ActivityConfig::default())
    }
}

impl ActivityAnalyzer {
    /// Analyzer with the symlet-16 wavelet
    pub fn new(config: ActivityConfig) -> Self {
        Self {
            wavelet: Wavelet::sym16(),
            config,
        }
    }

    pub fn config(&self) -> &ActivityConfig {
        &self.config
    }

    /// Index of Pupillary Activity over the whole signal
    pub fn ipa(&self, signal: &[f64]) -> Result<ActivityIndexResult, ComputeError> {
        let levels = self.config.ipa_levels;
        let required = band_width(levels)?;
        if signal.len() < required {
            return Err(ComputeError::too_short(required, signal.len()));
        }

        let decomposition = self.wavelet.wavedec(signal, levels);
        let coarsest = decomposition
            .detail(levels)
            .ok_or_else(|| ComputeError::too_short(required, signal.len()))?;

        let detail = normalize_band(coarsest, levels, noise_floor(signal))?;
        let maxima = modulus_maxima(&detail, self.config.maxima_boundary);
        let lambda = universal_threshold(&maxima);
        let kept = threshold(&maxima, lambda, ThresholdMode::Hard);

        Ok(ActivityIndexResult::scalar(self.rate(count_nonzero(&kept), signal.len())))
    }

    /// Low/High frequency Index of Pupillary Activity
    ///
    /// Below 496 samples `max_level < 4`, so both bands are level 1 and the
    /// ratio is flat: the canonical 300-sample stage always scores 0.
    pub fn lhipa(&self, signal: &[f64]) -> Result<ActivityIndexResult, ComputeError> {
        let max_level = self.wavelet.max_level(signal.len());
        let high = 1;
        let low = max_level / 2;
        if low < high {
            // Two full levels of filter support are needed for a distinct low band
            let required = 4 * (self.wavelet.filter_len() - 1);
            return Err(ComputeError::too_short(required, signal.len()));
        }

        let floor = noise_floor(signal);
        let high_band = normalize_band(&self.wavelet.detail_at(signal, high), high, floor)?;
        let low_band = normalize_band(&self.wavelet.detail_at(signal, low), low, floor)?;

        let stride = band_width(low - high)?;
        let ratio: Vec<f64> = low_band
            .iter()
            .enumerate()
            .map(|(i, l)| match high_band.get(i * stride) {
                Some(h) if *h != 0.0 => l / h,
                _ => 0.0,
            })
            .collect();

        let maxima = modulus_maxima(&ratio, self.config.maxima_boundary);
        let lambda = universal_threshold(&maxima);
        let kept = threshold(&maxima, lambda, ThresholdMode::Less);

        debug!(max_level, low, high, lambda, "lhipa bands");
        Ok(ActivityIndexResult::scalar(self.rate(count_nonzero(&kept), signal.len())))
    }

    /// Real-time IPA: per-interval `1 - (steep samples / interval length)`
    pub fn ripa(&self, signal: &[f64]) -> Result<ActivityIndexResult, ComputeError> {
        let interval = self.samples_for(self.config.ripa_interval_sec);
        let filter = SavitzkyGolay::new(self.config.ripa_window, self.config.ripa_polyorder)?;

        let mut windows = Vec::new();
        for (k, chunk) in signal.chunks(interval).enumerate() {
            if chunk.len() < filter.window {
                continue;
            }
            let smoothed = filter.smooth(chunk)?;
            let slope = filter.derivative(chunk)?;
            let level = median(&smoothed).unwrap_or(0.0) + self.config.ripa_threshold;
            let steep = slope.iter().filter(|d| d.abs() > level).count();

            windows.push(IndexWindow {
                start_sec: (k * interval) as f64 / self.config.sample_rate_hz,
                value: 1.0 - steep as f64 / chunk.len() as f64,
            });
        }

        self.summarize(windows, || {
            ComputeError::too_short(filter.window, signal.len().min(interval))
        })
    }

    /// IPA of consecutive fixed-length chunks; the trailing partial chunk is dropped
    pub fn windowed_ipa(&self, signal: &[f64]) -> Result<ActivityIndexResult, ComputeError> {
        let chunk_len = self.samples_for(self.config.ipa_window_sec);

        let windows: Vec<IndexWindow> = signal
            .chunks_exact(chunk_len)
            .enumerate()
            .filter_map(|(k, chunk)| match self.ipa(chunk) {
                Ok(result) => Some(IndexWindow {
                    start_sec: (k * chunk_len) as f64 / self.config.sample_rate_hz,
                    value: result.value,
                }),
                Err(e) => {
                    debug!(window = k, error = %e, "windowed ipa chunk skipped");
                    None
                }
            })
            .collect();

        self.summarize(windows, || {
            let required = band_width(self.config.ipa_levels).unwrap_or(usize::MAX);
            ComputeError::too_short(chunk_len.max(required), signal.len())
        })
    }

    /// Savitzky-Golay trend of the per-window values of a segmented index
    pub fn window_trend(&self, result: &ActivityIndexResult) -> Result<Vec<f64>, ComputeError> {
        let trend = self.config.ipa_trend;
        let values: Vec<f64> = result.windows.iter().map(|w| w.value).collect();
        SavitzkyGolay::new(trend.window, trend.polyorder)?.smooth(&values)
    }

    fn summarize(
        &self,
        windows: Vec<IndexWindow>,
        empty: impl FnOnce() -> ComputeError,
    ) -> Result<ActivityIndexResult, ComputeError> {
        let values: Vec<f64> = windows.iter().map(|w| w.value).collect();
        let value = mean(&values).ok_or_else(empty)?;
        Ok(ActivityIndexResult { value, windows })
    }

    fn samples_for(&self, seconds: usize) -> usize {
        ((seconds as f64 * self.config.sample_rate_hz).round() as usize).max(1)
    }

    /// Count per second of signal
    fn rate(&self, count: usize, len: usize) -> f64 {
        let duration = len as f64 / self.config.sample_rate_hz;
        count as f64 / duration
    }
}

fn noise_floor(signal: &[f64]) -> f64 {
    NOISE_FLOOR * signal.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

/// `2^level`, the number of input samples behind one level-`level` coefficient
fn band_width(level: usize) -> Result<usize, ComputeError> {
    u32::try_from(level)
        .ok()
        .and_then(|shift| 1usize.checked_shl(shift))
        .ok_or_else(|| ComputeError::InvalidParameter(format!("wavelet level {level} is too deep")))
}

/// Scale a level-`level` band by `1/sqrt(2^level)`, flushing noise to zero
fn normalize_band(band: &[f64], level: usize, floor: f64) -> Result<Vec<f64>, ComputeError> {
    let scale = 1.0 / (band_width(level)? as f64).sqrt();
    Ok(band
        .iter()
        .map(|c| if c.abs() <= floor { 0.0 } else { c * scale })
        .collect())
}

fn count_nonzero(values: &[f64]) -> usize {
    values.iter().filter(|v| **v != 0.0).count()
}
