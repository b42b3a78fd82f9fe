//! CSV plant status report.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::observation::PlantObservation;

pub const DEFAULT_REPORT_FILE: &str = "plant_status_report.csv";

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    #[serde(rename = "Plant")]
    plant: &'a str,
    #[serde(rename = "Prediction")]
    prediction: &'static str,
    #[serde(rename = "Confidence (%)")]
    confidence: f32,
    #[serde(rename = "Moisture (%)")]
    moisture: f32,
    #[serde(rename = "Sprayer ON")]
    sprayer_on: bool,
    #[serde(rename = "Error")]
    error: &'a str,
}

impl<'a> From<&'a PlantObservation> for ReportRow<'a> {
    fn from(obs: &'a PlantObservation) -> Self {
        Self {
            plant: &obs.plant,
            prediction: obs.label().as_str(),
            confidence: (obs.confidence() * 100.0).round() / 100.0,
            moisture: obs.moisture,
            sprayer_on: obs.actuation,
            error: obs.error().unwrap_or_default(),
        }
    }
}

pub fn write_report<'a, W: Write>(
    observations: impl IntoIterator<Item = &'a PlantObservation>,
    writer: W,
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for obs in observations {
        wtr.serialize(ReportRow::from(obs))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn save_report<'a>(
    observations: impl IntoIterator<Item = &'a PlantObservation>,
    path: &Path,
) -> Result<()> {
    let file = File::create(path)?;
    write_report(observations, file)?;
    tracing::info!(path = %path.display(), "report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{FailureKind, Outcome};
    use crate::postprocess::{ClassificationResult, Label};

    #[test]
    fn rows_follow_observations() {
        let observations = vec![
            PlantObservation {
                plant: "Plant 1".to_string(),
                moisture: 30.0,
                outcome: Outcome::Classified(ClassificationResult {
                    label: Label::Healthy,
                    confidence: 80.0,
                }),
                actuation: false,
            },
            PlantObservation {
                plant: "Plant 2".to_string(),
                moisture: 10.0,
                outcome: Outcome::NoImage,
                actuation: true,
            },
            PlantObservation {
                plant: "Plant 3".to_string(),
                moisture: 60.0,
                outcome: Outcome::Failed {
                    kind: FailureKind::Inference,
                    reason: "inference failed: bad shape".to_string(),
                },
                actuation: false,
            },
        ];

        let mut out = Vec::new();
        write_report(&observations, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(
            lines,
            vec![
                "Plant,Prediction,Confidence (%),Moisture (%),Sprayer ON,Error",
                "Plant 1,Healthy,80.0,30.0,false,",
                "Plant 2,Unknown,0.0,10.0,true,",
                "Plant 3,Unknown,0.0,60.0,false,inference failed: bad shape",
            ]
        );
    }

    #[test]
    fn confidence_is_numeric_with_two_decimals() {
        let observations = vec![PlantObservation {
            plant: "Plant 4".to_string(),
            moisture: 42.5,
            outcome: Outcome::Classified(ClassificationResult {
                label: Label::Infected,
                confidence: 87.456,
            }),
            actuation: true,
        }];

        let mut out = Vec::new();
        write_report(&observations, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().nth(1), Some("Plant 4,Infected,87.46,42.5,true,"));
    }

    #[test]
    fn empty_report_has_no_rows() {
        let mut out = Vec::new();
        write_report(&Vec::<PlantObservation>::new(), &mut out).unwrap();
        assert!(out.is_empty());
    }
}
