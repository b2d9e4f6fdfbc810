//! Cross-candidate aggregation
//!
//! Grand averages group every non-corrupted stage by difficulty level and
//! combine them per channel. Contributions are folded strictly in insertion
//! order: the pairwise policy is order dependent, so this step never runs in
//! parallel.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::config::AggregationPolicy;
use crate::error::ComputeError;
use crate::normalizer::{is_constant, mean};
use crate::types::{CanonicalStage, Channel, ItemFailure, Level};

/// Elementwise aggregate of one level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelAverage {
    pub series: Vec<f64>,
    /// Number of stages folded into `series`
    pub contributors: usize,
}

/// Per-level aggregate signals of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrandAverage {
    pub channel: Channel,
    pub policy: AggregationPolicy,
    pub levels: BTreeMap<Level, LevelAverage>,
}

impl GrandAverage {
    pub fn new(channel: Channel, policy: AggregationPolicy) -> Self {
        Self {
            channel,
            policy,
            levels: BTreeMap::new(),
        }
    }

    pub fn level(&self, level: Level) -> Option<&LevelAverage> {
        self.levels.get(&level)
    }

    /// Aggregate series of a level, empty when nothing contributed
    pub fn series(&self, level: Level) -> &[f64] {
        self.levels
            .get(&level)
            .map(|l| l.series.as_slice())
            .unwrap_or(&[])
    }

    /// Check that `series` could be folded into its level without changing anything
    pub fn check(&self, level: Level, series: &[f64]) -> Result<(), ComputeError> {
        if series.is_empty() {
            return Err(ComputeError::EmptyInput(format!(
                "empty {} series",
                self.channel.as_str()
            )));
        }
        match self.levels.get(&level) {
            Some(average) if average.series.len() != series.len() => {
                Err(ComputeError::LengthMismatch {
                    expected: average.series.len(),
                    actual: series.len(),
                })
            }
            _ => Ok(()),
        }
    }

    /// Fold one series into its level
    pub fn contribute(&mut self, level: Level, series: &[f64]) -> Result<(), ComputeError> {
        self.check(level, series)?;

        match self.levels.get_mut(&level) {
            None => {
                self.levels.insert(
                    level,
                    LevelAverage {
                        series: series.to_vec(),
                        contributors: 1,
                    },
                );
            }
            Some(average) => {
                average.contributors += 1;
                for (current, value) in average.series.iter_mut().zip(series) {
                    *current = fold(self.policy, *current, *value, average.contributors);
                }
            }
        }
        Ok(())
    }

    /// Easy, normal and hard series concatenated
    pub fn combined(&self) -> Vec<f64> {
        Level::ALL
            .iter()
            .flat_map(|level| self.series(*level).iter().copied())
            .collect()
    }

    /// Smallest value across all levels
    pub fn min(&self) -> Option<f64> {
        self.combined().into_iter().reduce(f64::min)
    }

    /// Largest value across all levels
    pub fn max(&self) -> Option<f64> {
        self.combined().into_iter().reduce(f64::max)
    }

    /// Elementwise mean across the levels that received contributions
    pub fn level_mean(&self) -> Result<Vec<f64>, ComputeError> {
        let mut present = self.levels.values().map(|l| &l.series);
        let first = present.next().ok_or_else(|| {
            ComputeError::EmptyInput(format!("no {} grand average levels", self.channel.as_str()))
        })?;

        let mut sum = first.clone();
        let mut count = 1.0;
        for series in present {
            if series.len() != sum.len() {
                return Err(ComputeError::LengthMismatch {
                    expected: sum.len(),
                    actual: series.len(),
                });
            }
            for (s, v) in sum.iter_mut().zip(series) {
                *s += v;
            }
            count += 1.0;
        }
        Ok(sum.into_iter().map(|s| s / count).collect())
    }
}

/// Aggregate of a per-stage scalar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalarLevel {
    pub value: f64,
    pub contributors: usize,
    /// Length of the most recent contributing series, for plotting the value
    /// as a flat line
    pub length: usize,
}

/// Per-level aggregate of stage means of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarGrandAverage {
    pub channel: Channel,
    pub policy: AggregationPolicy,
    pub levels: BTreeMap<Level, ScalarLevel>,
}

impl ScalarGrandAverage {
    pub fn new(channel: Channel, policy: AggregationPolicy) -> Self {
        Self {
            channel,
            policy,
            levels: BTreeMap::new(),
        }
    }

    pub fn value(&self, level: Level) -> Option<f64> {
        self.levels.get(&level).map(|l| l.value)
    }

    /// The level value repeated over the series length
    pub fn series(&self, level: Level) -> Vec<f64> {
        self.levels
            .get(&level)
            .map(|l| vec![l.value; l.length])
            .unwrap_or_default()
    }

    /// Fold the mean of `series` into its level
    pub fn contribute(&mut self, level: Level, series: &[f64]) -> Result<(), ComputeError> {
        let value = mean(series).ok_or_else(|| {
            ComputeError::EmptyInput(format!("empty {} series", self.channel.as_str()))
        })?;
        let policy = self.policy;

        self.levels
            .entry(level)
            .and_modify(|l| {
                l.contributors += 1;
                l.value = fold(policy, l.value, value, l.contributors);
                l.length = series.len();
            })
            .or_insert(ScalarLevel {
                value,
                contributors: 1,
                length: series.len(),
            });
        Ok(())
    }
}

/// Combine the running aggregate with the `count`-th contribution
fn fold(policy: AggregationPolicy, current: f64, value: f64, count: usize) -> f64 {
    match policy {
        AggregationPolicy::Pairwise => (current + value) / 2.0,
        AggregationPolicy::IncrementalMean => current + (value - current) / count as f64,
    }
}

/// A stage whose canonical pupil or respiratory series is constant end-to-end
pub fn is_corrupted(stage: &CanonicalStage) -> bool {
    is_constant(&stage.pupil) || is_constant(&stage.respiratory)
}

/// Everything the aggregator produces for one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregation {
    pub pupil: GrandAverage,
    pub respiratory: GrandAverage,
    pub pupil_mean: ScalarGrandAverage,
    pub respiratory_mean: ScalarGrandAverage,
    /// Rejected contributions; an analysis run moves these into its own list
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ItemFailure>,
}

/// Sequential reducer over canonical stages
#[derive(Debug, Clone)]
pub struct Aggregator {
    aggregation: Aggregation,
}

impl Aggregator {
    pub fn new(policy: AggregationPolicy) -> Self {
        Self {
            aggregation: Aggregation {
                pupil: GrandAverage::new(Channel::Pupil, policy),
                respiratory: GrandAverage::new(Channel::Respiratory, policy),
                pupil_mean: ScalarGrandAverage::new(Channel::Pupil, policy),
                respiratory_mean: ScalarGrandAverage::new(Channel::Respiratory, policy),
                failures: Vec::new(),
            },
        }
    }

    /// Fold one stage into every aggregate, or into none of them. Corrupted
    /// stages and stages whose series do not fit the existing level lengths
    /// are skipped; returns whether the stage contributed.
    pub fn add(&mut self, stage: &CanonicalStage) -> bool {
        if is_corrupted(stage) {
            warn!(stage = %stage.id, level = %stage.level, "corrupted stage skipped by aggregator");
            return false;
        }

        let agg = &self.aggregation;
        let checked = agg
            .pupil
            .check(stage.level, &stage.pupil)
            .and_then(|_| agg.respiratory.check(stage.level, &stage.respiratory));
        if let Err(error) = checked {
            self.reject(stage, &error);
            return false;
        }

        let agg = &mut self.aggregation;
        let folded = agg
            .pupil
            .contribute(stage.level, &stage.pupil)
            .and_then(|_| agg.respiratory.contribute(stage.level, &stage.respiratory))
            .and_then(|_| agg.pupil_mean.contribute(stage.level, &stage.pupil))
            .and_then(|_| agg.respiratory_mean.contribute(stage.level, &stage.respiratory));
        if let Err(error) = folded {
            self.reject(stage, &error);
            return false;
        }

        debug!(stage = %stage.id, level = %stage.level, "stage aggregated");
        true
    }

    fn reject(&mut self, stage: &CanonicalStage, error: &ComputeError) {
        warn!(stage = %stage.id, error = %error, "grand average contribution rejected");
        self.aggregation
            .failures
            .push(ItemFailure::new(stage.id.to_string(), error));
    }

    pub fn finish(self) -> Aggregation {
        self.aggregation
    }

    /// Aggregate `stages` in order
    pub fn aggregate<'a>(
        policy: AggregationPolicy,
        stages: impl IntoIterator<Item = &'a CanonicalStage>,
    ) -> Aggregation {
        let mut aggregator = Self::new(policy);
        for stage in stages {
            aggregator.add(stage);
        }
        aggregator.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StageId;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    fn stage(candidate: usize, level: Level, pupil: Vec<f64>, respiratory: Vec<f64>) -> CanonicalStage {
        CanonicalStage {
            id: StageId {
                candidate,
                stage: 0,
            },
            level,
            pupil,
            respiratory,
            pupil_upper: 4.0,
            pupil_lower: 2.0,
        }
    }

    fn breathing() -> Vec<f64> {
        (0..60).map(|i| 14.0 + (i % 4) as f64).collect()
    }

    fn varying_pupil() -> Vec<f64> {
        (0..300)
            .map(|i| match i % 3 {
                0 => 3.0,
                1 => 3.2,
                _ => 2.9,
            })
            .collect()
    }

    #[test]
    fn test_constant_stage_excluded_and_single_contributor_kept() {
        let stages = vec![
            stage(0, Level::Easy, vec![3.0; 300], breathing()),
            stage(1, Level::Easy, varying_pupil(), breathing()),
        ];
        let result = Aggregator::aggregate(AggregationPolicy::Pairwise, &stages);

        assert_eq!(result.pupil.series(Level::Easy), varying_pupil().as_slice());
        assert_eq!(result.pupil.level(Level::Easy).unwrap().contributors, 1);
        assert!(result.failures.is_empty());
    }

    #[test]
    fn test_constant_pupil_never_contributes() {
        let stages = vec![stage(0, Level::Hard, vec![3.0; 300], breathing())];
        let result = Aggregator::aggregate(AggregationPolicy::Pairwise, &stages);

        assert!(result.pupil.levels.is_empty());
        assert!(result.respiratory.levels.is_empty());
        assert!(result.pupil_mean.levels.is_empty());
    }

    #[test]
    fn test_single_scalar_contributor_is_its_mean() {
        let stages = vec![stage(0, Level::Normal, varying_pupil(), breathing())];
        let result = Aggregator::aggregate(AggregationPolicy::Pairwise, &stages);

        assert_relative_eq!(
            result.pupil_mean.value(Level::Normal).unwrap(),
            9.1 / 3.0,
            epsilon = 1e-12
        );
        assert_eq!(result.pupil_mean.series(Level::Normal).len(), 300);
        assert_relative_eq!(result.respiratory_mean.value(Level::Normal).unwrap(), 15.5);
    }

    #[test]
    fn test_pairwise_weights_later_contributions() {
        let mut average = ScalarGrandAverage::new(Channel::Pupil, AggregationPolicy::Pairwise);
        for v in [1.0, 2.0, 4.0] {
            average.contribute(Level::Easy, &[v, v]).unwrap();
        }
        // ((1 + 2) / 2 + 4) / 2
        assert_eq!(average.value(Level::Easy), Some(2.75));
    }

    #[test]
    fn test_incremental_mean_is_true_mean() {
        let mut average = GrandAverage::new(Channel::Pupil, AggregationPolicy::IncrementalMean);
        average.contribute(Level::Hard, &[1.0, 10.0]).unwrap();
        average.contribute(Level::Hard, &[2.0, 20.0]).unwrap();
        average.contribute(Level::Hard, &[6.0, 30.0]).unwrap();

        let series = average.series(Level::Hard);
        assert_relative_eq!(series[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(series[1], 20.0, epsilon = 1e-12);
        assert_eq!(average.level(Level::Hard).unwrap().contributors, 3);
    }

    #[test]
    fn test_length_mismatch_is_rejected_per_stage() {
        let mut short = breathing();
        short.truncate(50);
        let stages = vec![
            stage(0, Level::Easy, varying_pupil(), breathing()),
            stage(1, Level::Easy, varying_pupil(), short),
        ];
        let mut aggregator = Aggregator::new(AggregationPolicy::Pairwise);
        assert!(aggregator.add(&stages[0]));
        assert!(!aggregator.add(&stages[1]));
        let result = aggregator.finish();

        assert_eq!(result.respiratory.series(Level::Easy), breathing().as_slice());
        assert_eq!(result.pupil.series(Level::Easy), varying_pupil().as_slice());
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].code, "LENGTH_MISMATCH");
        assert_eq!(result.failures[0].item, "candidate 1 / stage 0");
        assert_eq!(result.pupil.level(Level::Easy).unwrap().contributors, 1);
        assert_eq!(result.respiratory.level(Level::Easy).unwrap().contributors, 1);
        assert_eq!(result.pupil_mean.levels[&Level::Easy].contributors, 1);
        assert_eq!(result.respiratory_mean.levels[&Level::Easy].contributors, 1);
        assert_relative_eq!(result.respiratory_mean.value(Level::Easy).unwrap(), 15.5);
    }

    #[test]
    fn test_helpers() {
        let mut average = GrandAverage::new(Channel::Respiratory, AggregationPolicy::Pairwise);
        average.contribute(Level::Hard, &[5.0, 7.0]).unwrap();
        average.contribute(Level::Easy, &[1.0, 3.0]).unwrap();

        assert_eq!(average.combined(), vec![1.0, 3.0, 5.0, 7.0]);
        assert_eq!(average.min(), Some(1.0));
        assert_eq!(average.max(), Some(7.0));
        assert_eq!(average.level_mean().unwrap(), vec![3.0, 5.0]);

        let empty = GrandAverage::new(Channel::Pupil, AggregationPolicy::Pairwise);
        assert_eq!(empty.min(), None);
        assert!(empty.level_mean().is_err());
    }

    #[test]
    fn test_is_corrupted() {
        assert!(is_corrupted(&stage(0, Level::Easy, varying_pupil(), vec![12.0; 60])));
        assert!(is_corrupted(&stage(0, Level::Easy, Vec::new(), breathing())));
        assert!(!is_corrupted(&stage(0, Level::Easy, varying_pupil(), breathing())));
    }
}
