use std::fmt;

use ndarray::ArrayViewD;
use serde::Serialize;

use crate::error::{Error, Result};

/// Scores strictly above this are Infected.
pub const DECISION_BOUNDARY: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Label {
    Healthy,
    Infected,
    /// No usable classification for the plant this cycle.
    Unknown,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Healthy => "Healthy",
            Label::Infected => "Infected",
            Label::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Outcome of one classify call.
///
/// `confidence` is the certainty in `label` as a percentage, so it never
/// drops below 50 for a classified image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub label: Label,
    pub confidence: f32,
}

/// Maps the Infected probability to a label and a confidence on the winning side.
pub fn decide(score: f32) -> Result<ClassificationResult> {
    if !score.is_finite() || !(0.0..=1.0).contains(&score) {
        return Err(Error::Inference(format!(
            "model score {score} is not a probability in [0, 1]"
        )));
    }
    let result = if score > DECISION_BOUNDARY {
        ClassificationResult {
            label: Label::Infected,
            confidence: score * 100.0,
        }
    } else {
        ClassificationResult {
            label: Label::Healthy,
            confidence: (1.0 - score) * 100.0,
        }
    };
    Ok(result)
}

/// Pulls the single sigmoid score out of the model output, whatever its rank.
pub fn extract_score(output: ArrayViewD<'_, f32>) -> Result<f32> {
    let mut values = output.iter();
    match (values.next(), values.next()) {
        (Some(&score), None) => Ok(score),
        _ => Err(Error::Inference(format!(
            "expected a single score, model returned shape {:?}",
            output.shape()
        ))),
    }
}
