//! Robust outlier treatment
//!
//! Median-absolute-deviation bounds (Leys et al., "Detecting outliers: do not use
//! standard deviation around the mean, use absolute deviation around the median")
//! applied to a single channel, following the pupil preprocessing guidelines of
//! Kret & Sjak-Shie.

use crate::config::{NormalizerConfig, OutlierMode};
use crate::error::ComputeError;

/// Result of outlier treatment on one series
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSeries {
    pub values: Vec<f64>,
    pub median: f64,
    pub mad: f64,
    pub upper: f64,
    pub lower: f64,
}

impl NormalizedSeries {
    /// Bounds collapsed onto the median; the output carries no information
    pub fn is_degenerate(&self) -> bool {
        self.mad == 0.0
    }
}

/// MAD-based outlier normalizer
pub struct RobustNormalizer;

impl RobustNormalizer {
    /// Clip (or replace) samples outside `median ± m·MAD`
    pub fn normalize(
        values: &[f64],
        config: &NormalizerConfig,
    ) -> Result<NormalizedSeries, ComputeError> {
        let median = median(values)
            .ok_or_else(|| ComputeError::EmptyInput("cannot normalize an empty series".to_string()))?;
        let deviations: Vec<f64> = values.iter().map(|v| (v - median).abs()).collect();
        let mad = self::median(&deviations).unwrap_or(0.0);

        let upper = median + config.mad_multiplier * mad;
        let lower = median - config.mad_multiplier * mad;
        let replacement = match config.mode {
            OutlierMode::Clip => None,
            OutlierMode::Replace => Some(median),
        };

        let values = values
            .iter()
            .map(|&v| bound(v, upper, lower, replacement))
            .collect();

        Ok(NormalizedSeries {
            values,
            median,
            mad,
            upper,
            lower,
        })
    }
}

fn bound(value: f64, upper: f64, lower: f64, replacement: Option<f64>) -> f64 {
    if value > upper {
        upper
    } else if value < lower {
        lower
    } else {
        replacement.unwrap_or(value)
    }
}

/// Median of a series; even lengths average the two middle values
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Arithmetic mean; `None` for an empty series
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// `true` when every sample equals the first one (or the series is empty)
pub fn is_constant(values: &[f64]) -> bool {
    match values.first() {
        Some(first) => values.iter().all(|v| v == first),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip() -> NormalizerConfig {
        NormalizerConfig::default()
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_clips_outliers_to_bounds() {
        let values = [3.0, 3.1, 2.9, 3.0, 3.2, 2.8, 9.0, 0.5];
        let result = RobustNormalizer::normalize(&values, &clip()).unwrap();

        // median 3.0, deviations [0,.1,.1,0,.2,.2,6,2.5] -> MAD 0.15
        assert!((result.median - 3.0).abs() < 1e-12);
        assert!((result.mad - 0.15).abs() < 1e-12);
        assert!((result.upper - 3.375).abs() < 1e-12);
        assert!((result.lower - 2.625).abs() < 1e-12);

        assert_eq!(result.values.len(), values.len());
        assert_eq!(result.values[6], result.upper);
        assert_eq!(result.values[7], result.lower);
        assert_eq!(result.values[1], 3.1);
    }

    #[test]
    fn test_replace_mode_substitutes_median_for_inliers() {
        let values = [3.0, 3.1, 2.9, 3.0, 3.2, 2.8, 9.0, 0.5];
        let config = NormalizerConfig {
            mode: OutlierMode::Replace,
            ..Default::default()
        };
        let result = RobustNormalizer::normalize(&values, &config).unwrap();

        assert_eq!(result.values[1], result.median);
        assert_eq!(result.values[6], result.upper);
        assert_eq!(result.values[7], result.lower);
    }

    #[test]
    fn test_empty_input_fails() {
        let result = RobustNormalizer::normalize(&[], &clip());
        assert!(matches!(result, Err(ComputeError::EmptyInput(_))));
    }

    #[test]
    fn test_constant_input_is_degenerate() {
        let result = RobustNormalizer::normalize(&[3.0; 10], &clip()).unwrap();
        assert!(result.is_degenerate());
        assert_eq!(result.upper, result.lower);
        assert!(is_constant(&result.values));
    }

    #[test]
    fn test_is_constant() {
        assert!(is_constant(&[]));
        assert!(is_constant(&[1.0, 1.0]));
        assert!(!is_constant(&[1.0, 1.0, 1.5]));
    }
}
