//! Behavioral stage metrics
//!
//! Pure derivations over the response events of a stage.

use crate::error::ComputeError;
use crate::types::{ResponseEvent, ResponseOutcome};

/// Mean reaction time of timed responses with a correct outcome
pub fn reaction_time(events: &[ResponseEvent]) -> Result<f64, ComputeError> {
    let times: Vec<f64> = events
        .iter()
        .filter(|e| e.outcome == ResponseOutcome::Correct)
        .filter_map(|e| e.reaction_time)
        .collect();

    if times.is_empty() {
        return Err(ComputeError::EmptyInput(
            "no correct timed responses".to_string(),
        ));
    }
    Ok(times.iter().sum::<f64>() / times.len() as f64)
}

/// Timed responses with an incorrect outcome
pub fn error_count(events: &[ResponseEvent]) -> usize {
    events
        .iter()
        .filter(|e| e.is_timed() && e.outcome == ResponseOutcome::Incorrect)
        .count()
}

/// Percentage of correct responses
pub fn accuracy(events: &[ResponseEvent]) -> Result<f64, ComputeError> {
    if events.is_empty() {
        return Err(ComputeError::EmptyInput(
            "accuracy over zero response events".to_string(),
        ));
    }
    let correct = events
        .iter()
        .filter(|e| e.outcome == ResponseOutcome::Correct)
        .count();
    Ok(100.0 * correct as f64 / events.len() as f64)
}
