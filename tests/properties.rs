//! Property tests for the signal-conditioning invariants

use breath_flux::activity::ActivityAnalyzer;
use breath_flux::aggregate::{Aggregator, GrandAverage};
use breath_flux::config::{AggregationPolicy, NormalizerConfig, OutlierMode};
use breath_flux::normalizer::RobustNormalizer;
use breath_flux::resample::{interpolate_linear, resample_fft};
use breath_flux::types::{CanonicalStage, Channel, Level, StageId};
use proptest::prelude::*;

fn canonical(candidate: usize, level: Level, pupil: Vec<f64>, respiratory: Vec<f64>) -> CanonicalStage {
    CanonicalStage {
        id: StageId {
            candidate,
            stage: 0,
        },
        level,
        pupil,
        respiratory,
        pupil_upper: 0.0,
        pupil_lower: 0.0,
    }
}

proptest! {
    #[test]
    fn prop_normalizer_output_within_bounds(
        values in proptest::collection::vec(0.5f64..9.0, 1..400),
        replace in any::<bool>(),
    ) {
        let config = NormalizerConfig {
            mode: if replace { OutlierMode::Replace } else { OutlierMode::Clip },
            ..Default::default()
        };
        let result = RobustNormalizer::normalize(&values, &config).unwrap();

        prop_assert_eq!(result.values.len(), values.len());
        for v in &result.values {
            prop_assert!(*v >= result.lower && *v <= result.upper);
        }
    }

    #[test]
    fn prop_resample_exact_length(
        values in proptest::collection::vec(-5.0f64..5.0, 2..500),
        num in 1usize..400,
    ) {
        let resampled = resample_fft(&values, num).unwrap();
        prop_assert_eq!(resampled.len(), num);
        prop_assert!(resampled.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn prop_interpolation_identity(values in proptest::collection::vec(0.0f64..40.0, 2..120)) {
        let interpolated = interpolate_linear(&values, values.len()).unwrap();
        for (a, b) in interpolated.iter().zip(values.iter()) {
            prop_assert!((a - b).abs() <= 1e-9 * b.abs().max(1.0));
        }
    }

    #[test]
    fn prop_interpolation_keeps_endpoints(
        values in proptest::collection::vec(0.0f64..40.0, 2..30),
        count in 2usize..200,
    ) {
        let interpolated = interpolate_linear(&values, count).unwrap();
        prop_assert_eq!(interpolated.len(), count);
        prop_assert_eq!(interpolated[0], values[0]);
        prop_assert_eq!(interpolated[count - 1], values[values.len() - 1]);
    }

    #[test]
    fn prop_ipa_of_constant_signal_is_zero(level in -10.0f64..10.0, len in 4usize..600) {
        let analyzer = ActivityAnalyzer::default();
        let result = analyzer.ipa(&vec![level; len]).unwrap();
        prop_assert_eq!(result.value, 0.0);
    }

    #[test]
    fn prop_single_contributor_is_exact(
        series in proptest::collection::vec(1.0f64..8.0, 1..300),
        pairwise in any::<bool>(),
    ) {
        let policy = if pairwise { AggregationPolicy::Pairwise } else { AggregationPolicy::IncrementalMean };
        let mut average = GrandAverage::new(Channel::Pupil, policy);
        average.contribute(Level::Normal, &series).unwrap();
        prop_assert_eq!(average.series(Level::Normal), series.as_slice());
    }

    #[test]
    fn prop_constant_pupil_never_aggregated(
        level in 2.0f64..6.0,
        respiratory in proptest::collection::vec(8.0f64..25.0, 60),
    ) {
        let mut varying = respiratory.clone();
        varying[0] += 1.0;
        let stage = canonical(0, Level::Easy, vec![level; 300], varying);
        let aggregation = Aggregator::aggregate(AggregationPolicy::Pairwise, [&stage]);

        prop_assert!(aggregation.pupil.levels.is_empty());
        prop_assert!(aggregation.respiratory.levels.is_empty());
    }
}
