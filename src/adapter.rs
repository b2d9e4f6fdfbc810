//! Record adapters
//!
//! Parses persisted experiment documents (one per candidate, as written by the
//! BreathActivity recording app) into immutable [`Candidate`] records.

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ComputeError;
use crate::types::{
    Candidate, ItemFailure, Level, ResponseEvent, ResponseOutcome, Stage, Subject, SurveyAnswers,
};

/// Trait for record adapters
pub trait RecordAdapter {
    /// Parse one candidate document
    fn parse(&self, raw_json: &str) -> Result<Candidate, ComputeError>;

    /// Parse either a single document or a JSON array of documents. A malformed
    /// element is reported and skipped; only unreadable JSON fails the batch.
    fn parse_batch(&self, raw_json: &str) -> Result<(Vec<Candidate>, Vec<ItemFailure>), ComputeError> {
        let value: Value = serde_json::from_str(raw_json)?;
        let documents = match value {
            Value::Array(items) => items,
            other => vec![other],
        };

        let mut candidates = Vec::with_capacity(documents.len());
        let mut failures = Vec::new();
        for (i, document) in documents.into_iter().enumerate() {
            match self.parse(&document.to_string()) {
                Ok(candidate) => candidates.push(candidate),
                Err(e) => {
                    warn!(record = i, error = %e, "record skipped");
                    failures.push(ItemFailure::new(format!("record[{i}]"), &e));
                }
            }
        }
        Ok((candidates, failures))
    }
}

/// Adapter for the recording app's JSON format
pub struct BreathActivityAdapter;

impl RecordAdapter for BreathActivityAdapter {
    fn parse(&self, raw_json: &str) -> Result<Candidate, ComputeError> {
        let document: RawDocument = serde_json::from_str(raw_json).map_err(|e| {
            if e.is_data() || e.is_eof() {
                ComputeError::MalformedRecord(e.to_string())
            } else {
                ComputeError::JsonError(e)
            }
        })?;

        let stages = document
            .data
            .into_iter()
            .map(convert_stage)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Candidate {
            subject: Subject {
                name: document.user_data.name,
                age: document.user_data.age,
                gender: document.user_data.gender,
                level_tried: document.user_data.level_tried,
            },
            stages,
            comment: document.comment,
        })
    }
}

fn convert_stage(raw: RawStage) -> Result<Stage, ComputeError> {
    let level = Level::from_label(&raw.level);
    if level.as_str() != raw.level.trim().to_ascii_lowercase() {
        warn!(label = %raw.level, "unknown level label, ranked as normal");
    }

    let (pupil, respiratory) = match raw.serial_data {
        Some(serial) => (serial.pupil_sizes, serial.respiratory_rates),
        None => (
            raw.collected_data.iter().map(|c| c.pupil_size).collect(),
            raw.collected_data
                .iter()
                .filter_map(|c| c.respiratory_rate)
                .collect(),
        ),
    };

    let responses = raw
        .response
        .iter()
        .map(convert_response)
        .collect::<Result<Vec<_>, _>>()?;

    let survey = raw
        .survey_data
        .map(|s| SurveyAnswers {
            difficulty: s.q1_answer,
            stress: s.q2_answer,
        })
        .unwrap_or_default();

    Ok(Stage {
        level,
        pupil,
        respiratory,
        responses,
        correct_rate: raw.correct_rate,
        survey,
    })
}

fn convert_response(raw: &RawResponse) -> Result<ResponseEvent, ComputeError> {
    let outcome = if raw.kind.contains_key("correct") {
        ResponseOutcome::Correct
    } else if raw.kind.contains_key("incorrect") {
        ResponseOutcome::Incorrect
    } else {
        ResponseOutcome::Other
    };

    let reaction_time = match &raw.reaction {
        Some(reaction) => match reaction.get("pressedSpace") {
            Some(pressed) => Some(pressed.get("reactionTime").and_then(Value::as_f64).ok_or_else(
                || ComputeError::MalformedRecord("pressedSpace without reactionTime".to_string()),
            )?),
            None => None,
        },
        None => None,
    };

    Ok(ResponseEvent {
        outcome,
        reaction_time,
    })
}

// Recording app JSON structures

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    user_data: RawUserData,
    data: Vec<RawStage>,
    comment: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawUserData {
    name: String,
    age: String,
    gender: String,
    level_tried: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStage {
    level: String,
    response: Vec<RawResponse>,
    collected_data: Vec<RawCollected>,
    serial_data: Option<RawSerial>,
    correct_rate: Option<f64>,
    survey_data: Option<RawSurvey>,
}

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(rename = "type")]
    kind: Map<String, Value>,
    #[serde(default)]
    reaction: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCollected {
    pupil_size: f64,
    #[serde(default)]
    respiratory_rate: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawSerial {
    pupil_sizes: Vec<f64>,
    respiratory_rates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSurvey {
    #[serde(default)]
    q1_answer: Option<i32>,
    #[serde(default)]
    q2_answer: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOCUMENT: &str = r#"{
        "userData": {"name": "P01", "age": "27", "gender": "Female", "levelTried": "easy,hard"},
        "data": [
            {
                "level": "easy",
                "response": [
                    {"type": {"correct": {}}, "reaction": {"pressedSpace": {"reactionTime": 0.42}}},
                    {"type": {"incorrect": {}}, "reaction": {"doNothing": {}}},
                    {"type": {"correct": {}}, "reaction": {"doNothing": {}}}
                ],
                "collectedData": [],
                "serialData": {"pupilSizes": [3.1, 3.2, 3.0], "respiratoryRates": [12, 13]},
                "correctRate": 66.6,
                "surveyData": {"q1Answer": 2, "q2Answer": 4}
            },
            {
                "level": "hard",
                "response": [],
                "collectedData": [
                    {"amplitude": 0.1, "pupilSize": 3.4, "respiratoryRate": 15.0},
                    {"amplitude": 0.2, "pupilSize": 3.5, "respiratoryRate": null},
                    {"amplitude": 0.1, "pupilSize": 3.3}
                ]
            }
        ],
        "comment": "felt tired"
    }"#;

    #[test]
    fn test_parse_document() {
        let candidate = BreathActivityAdapter.parse(DOCUMENT).unwrap();

        assert_eq!(candidate.subject.name, "P01");
        assert_eq!(candidate.subject.level_tried, "easy,hard");
        assert_eq!(candidate.comment, "felt tired");
        assert_eq!(candidate.stages.len(), 2);

        let easy = &candidate.stages[0];
        assert_eq!(easy.level, Level::Easy);
        assert_eq!(easy.pupil, vec![3.1, 3.2, 3.0]);
        assert_eq!(easy.respiratory, vec![12.0, 13.0]);
        assert_eq!(easy.correct_rate, Some(66.6));
        assert_eq!(easy.survey.difficulty, Some(2));
        assert_eq!(easy.survey.stress, Some(4));
        assert_eq!(
            easy.responses,
            vec![
                ResponseEvent::timed(ResponseOutcome::Correct, 0.42),
                ResponseEvent::untimed(ResponseOutcome::Incorrect),
                ResponseEvent::untimed(ResponseOutcome::Correct),
            ]
        );
    }

    #[test]
    fn test_collected_data_fallback() {
        let candidate = BreathActivityAdapter.parse(DOCUMENT).unwrap();
        let hard = &candidate.stages[1];

        assert_eq!(hard.level, Level::Hard);
        assert_eq!(hard.pupil, vec![3.4, 3.5, 3.3]);
        assert_eq!(hard.respiratory, vec![15.0]);
        assert_eq!(hard.survey, SurveyAnswers::default());
        assert_eq!(hard.correct_rate, None);
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let result = BreathActivityAdapter.parse(r#"{"userData": {}, "data": []}"#);
        assert!(matches!(result, Err(ComputeError::MalformedRecord(_))));
    }

    #[test]
    fn test_unknown_level_ranks_as_normal() {
        let json = r#"{"userData": {}, "comment": "", "data": [
            {"level": "medium", "response": [], "collectedData": []}
        ]}"#;
        let candidate = BreathActivityAdapter.parse(json).unwrap();
        assert_eq!(candidate.stages[0].level, Level::Normal);
    }

    #[test]
    fn test_batch_isolates_malformed_documents() {
        let json = format!(r#"[{DOCUMENT}, {{"data": []}}, {DOCUMENT}]"#);
        let (candidates, failures) = BreathActivityAdapter.parse_batch(&json).unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].item, "record[1]");
        assert_eq!(failures[0].code, "MALFORMED_RECORD");
    }

    #[test]
    fn test_batch_rejects_invalid_json() {
        assert!(matches!(
            BreathActivityAdapter.parse_batch("not json"),
            Err(ComputeError::JsonError(_))
        ));
    }
}
