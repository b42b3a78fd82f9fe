pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod observation;
pub mod policy;
pub mod postprocess;
pub mod preprocess;
pub mod report;
pub mod service;

pub use crate::cli::{Args, PlantArg};
pub use crate::config::Config;
pub use crate::error::{Error, Result};
pub use crate::model::{ModelLoader, OnnxModel, ScoreModel};
pub use crate::observation::{FailureKind, Outcome, PlantInput, PlantObservation, Summary, observe_plant, observe_plants};
pub use crate::policy::{DEFAULT_MOISTURE_THRESHOLD, DecisionPolicy};
pub use crate::postprocess::{ClassificationResult, Label};
pub use crate::preprocess::{InputLayout, InputSpec, Processor};
pub use crate::service::InferenceService;
