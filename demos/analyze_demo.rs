//! Analyze two synthetic candidates and print the grand averages

use breath_flux::types::Level;
use breath_flux::{AnalysisProcessor, BreathActivityAdapter, RecordAdapter};

fn candidate_json(name: &str, phase: f64) -> String {
    let stage = |level: &str, amplitude: f64| {
        let pupil: Vec<String> = (0..298)
            .map(|i| {
                let t = i as f64;
                format!("{:.4}", 3.0 + amplitude * (t * 0.12 + phase).sin() + 0.03 * (t * 1.3).cos())
            })
            .collect();
        let respiratory: Vec<String> = (0..58)
            .map(|i| format!("{}", 12 + (i + phase as usize) % 5))
            .collect();
        format!(
            r#"{{"level": "{level}",
                "response": [
                    {{"type": {{"correct": {{}}}}, "reaction": {{"pressedSpace": {{"reactionTime": 0.45}}}}}},
                    {{"type": {{"incorrect": {{}}}}, "reaction": {{"pressedSpace": {{"reactionTime": 0.61}}}}}}
                ],
                "collectedData": [],
                "serialData": {{"pupilSizes": [{}], "respiratoryRates": [{}]}},
                "surveyData": {{"q1Answer": 3, "q2Answer": 2}}}}"#,
            pupil.join(","),
            respiratory.join(",")
        )
    };

    format!(
        r#"{{"userData": {{"name": "{name}", "age": "30", "gender": "Other", "levelTried": "easy,normal,hard"}},
            "data": [{}, {}, {}],
            "comment": ""}}"#,
        stage("easy", 0.05),
        stage("normal", 0.12),
        stage("hard", 0.2)
    )
}

fn main() {
    let records = format!("[{}, {}]", candidate_json("P01", 0.0), candidate_json("P02", 1.0));

    let (candidates, failures) = match BreathActivityAdapter.parse_batch(&records) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };
    for failure in &failures {
        eprintln!("skipped {}: {}", failure.item, failure.message);
    }

    let report = AnalysisProcessor::new().analyze(&candidates);

    for candidate in &report.candidates {
        println!("{}", candidate.subject.name);
        for stage in &candidate.stages {
            println!(
                "  {:<6} ipa={:.4} lhipa={:.4} ripa={:.3} rt={:?}",
                stage.level,
                stage.ipa.as_ref().map_or(f64::NAN, |r| r.value),
                stage.lhipa.as_ref().map_or(f64::NAN, |r| r.value),
                stage.ripa.as_ref().map_or(f64::NAN, |r| r.value),
                stage.behavior.reaction_time_sec,
            );
        }
    }

    let pupil = &report.grand_average.pupil;
    for level in Level::ALL {
        if let Some(average) = pupil.level(level) {
            println!(
                "grand average {level}: {} samples from {} stages, ipa={:?}",
                average.series.len(),
                average.contributors,
                report.level_activity.get(&level).and_then(|a| a.ipa),
            );
        }
    }
    println!("pupil range: {:?} .. {:?}", pupil.min(), pupil.max());
}
