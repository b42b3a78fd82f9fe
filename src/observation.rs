use image::DynamicImage;
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::ScoreModel;
use crate::policy::{DecisionPolicy, check_percent};
use crate::postprocess::{ClassificationResult, Label};
use crate::service::InferenceService;

/// What the classifier said about a plant this cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Outcome {
    Classified(ClassificationResult),
    /// No image was supplied; the model was not consulted.
    NoImage,
    /// An image was supplied but classifying it failed.
    Failed { kind: FailureKind, reason: String },
}

/// Why a supplied image produced no classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// The image itself was unusable (empty, undecodable dimensions).
    InvalidInput,
    /// The model failed, timed out or produced an invalid score.
    Inference,
}

impl FailureKind {
    pub fn of(error: &Error) -> Self {
        match error {
            Error::InvalidInput(_) => Self::InvalidInput,
            _ => Self::Inference,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlantObservation {
    pub plant: String,
    pub moisture: f32,
    pub outcome: Outcome,
    pub actuation: bool,
}

impl PlantObservation {
    pub fn label(&self) -> Label {
        match &self.outcome {
            Outcome::Classified(result) => result.label,
            Outcome::NoImage | Outcome::Failed { .. } => Label::Unknown,
        }
    }

    /// Percentage certainty in `label()`, 0 when unknown.
    pub fn confidence(&self) -> f32 {
        match &self.outcome {
            Outcome::Classified(result) => result.confidence,
            Outcome::NoImage | Outcome::Failed { .. } => 0.0,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            Outcome::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Failed { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// One plant's inputs for a refresh cycle.
#[derive(Debug, Clone)]
pub struct PlantInput {
    pub plant: String,
    pub image: Option<DynamicImage>,
    pub moisture: f32,
}

/// Classifies (if there is an image) and decides actuation for one plant.
///
/// Inference failures are recorded in the observation, they do not abort it.
/// Out-of-range moisture rejects the whole plant.
pub fn observe_plant<M: ScoreModel + 'static>(
    service: &InferenceService<M>,
    policy: &DecisionPolicy,
    plant: &str,
    image: Option<&DynamicImage>,
    moisture: f32,
) -> Result<PlantObservation> {
    check_percent("moisture", moisture)?;

    let outcome = match image {
        None => Outcome::NoImage,
        Some(image) => match service.classify(image) {
            Ok(result) => Outcome::Classified(result),
            Err(e) => {
                let kind = FailureKind::of(&e);
                tracing::warn!(plant, ?kind, error = %e, "classification failed, treating plant as unknown");
                Outcome::Failed {
                    kind,
                    reason: e.to_string(),
                }
            }
        },
    };

    let label = match &outcome {
        Outcome::Classified(result) => result.label,
        _ => Label::Unknown,
    };
    let actuation = policy.should_actuate(label, moisture)?;

    Ok(PlantObservation {
        plant: plant.to_string(),
        moisture,
        outcome,
        actuation,
    })
}

/// Observes every plant in parallel; results keep input order.
pub fn observe_plants<M: ScoreModel + 'static>(
    service: &InferenceService<M>,
    policy: &DecisionPolicy,
    plants: &[PlantInput],
) -> Vec<Result<PlantObservation>> {
    plants
        .par_iter()
        .map(|p| observe_plant(service, policy, &p.plant, p.image.as_ref(), p.moisture))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub healthy: usize,
    pub infected: usize,
    pub unknown: usize,
    pub sprayers_on: usize,
}

impl Summary {
    pub fn from_observations<'a>(observations: impl IntoIterator<Item = &'a PlantObservation>) -> Self {
        observations.into_iter().fold(Self::default(), |mut s, obs| {
            s.total += 1;
            match obs.label() {
                Label::Healthy => s.healthy += 1,
                Label::Infected => s.infected += 1,
                Label::Unknown => s.unknown += 1,
            }
            if obs.actuation {
                s.sprayers_on += 1;
            }
            s
        })
    }
}
