use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use agri_sentinel::report::write_report;
use agri_sentinel::{
    Config, DecisionPolicy, Error, FailureKind, InferenceService, InputLayout, InputSpec, Label, ModelLoader, OnnxModel,
    Outcome, PlantInput, ScoreModel, Summary, observe_plant, observe_plants,
};
use image::{DynamicImage, Rgb, RgbImage};
use ndarray::ArrayView4;

/// Scores an image by its mean red intensity, so each test image picks its own score.
struct RedMeter {
    spec: InputSpec,
    calls: AtomicUsize,
}

impl RedMeter {
    fn new(layout: InputLayout) -> Self {
        Self {
            spec: InputSpec {
                width: 32,
                height: 32,
                layout,
            },
            calls: AtomicUsize::new(0),
        }
    }
}

impl ScoreModel for RedMeter {
    fn input_spec(&self) -> InputSpec {
        self.spec
    }

    fn predict(&self, batch: ArrayView4<'_, f32>) -> agri_sentinel::Result<f32> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if batch.shape() != &self.spec.shape()[..] {
            return Err(Error::Inference(format!("bad input shape {:?}", batch.shape())));
        }
        let red = match self.spec.layout {
            InputLayout::Nhwc => batch.slice(ndarray::s![0, .., .., 0]).mean(),
            InputLayout::Nchw => batch.slice(ndarray::s![0, 0, .., ..]).mean(),
        };
        red.ok_or_else(|| Error::Inference("empty batch".to_string()))
    }
}

fn leaf_with_red(red: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 20, Rgb([red, 90, 40])))
}

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < 0.5
}

#[test]
fn healthy_leaf_on_moist_soil_stays_off() {
    // red 51 -> score 0.2
    let service = InferenceService::new(Arc::new(RedMeter::new(InputLayout::Nhwc)));
    let policy = DecisionPolicy::default();
    let obs = observe_plant(&service, &policy, "Plant 1", Some(&leaf_with_red(51)), 30.0).unwrap();

    assert_eq!(obs.label(), Label::Healthy);
    assert!(approx(obs.confidence(), 80.0));
    assert!(!obs.actuation);
}

#[test]
fn infection_dominates_moisture() {
    // red 230 -> score ~0.9
    let service = InferenceService::new(Arc::new(RedMeter::new(InputLayout::Nchw)));
    let policy = DecisionPolicy::default();
    let obs = observe_plant(&service, &policy, "Plant 2", Some(&leaf_with_red(230)), 50.0).unwrap();

    assert_eq!(obs.label(), Label::Infected);
    assert!(approx(obs.confidence(), 90.0));
    assert!(obs.actuation);
}

#[test]
fn missing_image_uses_moisture_only() {
    let model = Arc::new(RedMeter::new(InputLayout::Nhwc));
    let service = InferenceService::new(Arc::clone(&model));
    let policy = DecisionPolicy::default();

    let dry = observe_plant(&service, &policy, "Plant 3", None, 10.0).unwrap();
    assert_eq!(dry.outcome, Outcome::NoImage);
    assert_eq!(dry.label(), Label::Unknown);
    assert_eq!(dry.confidence(), 0.0);
    assert!(dry.actuation);

    let moist = observe_plant(&service, &policy, "Plant 4", None, 60.0).unwrap();
    assert!(!moist.actuation);

    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn failed_inference_is_distinct_from_no_image() {
    struct Faulty;
    impl ScoreModel for Faulty {
        fn input_spec(&self) -> InputSpec {
            InputSpec::default()
        }
        fn predict(&self, _batch: ArrayView4<'_, f32>) -> agri_sentinel::Result<f32> {
            Err(Error::Inference("runtime fault".to_string()))
        }
    }

    let service = InferenceService::new(Arc::new(Faulty));
    let policy = DecisionPolicy::default();
    let obs = observe_plant(&service, &policy, "Plant 5", Some(&leaf_with_red(10)), 20.0).unwrap();

    assert!(matches!(
        obs.outcome,
        Outcome::Failed {
            kind: FailureKind::Inference,
            ..
        }
    ));
    assert_eq!(obs.label(), Label::Unknown);
    assert!(obs.error().unwrap().contains("runtime fault"));
    // dry soil still actuates
    assert!(obs.actuation);
}

#[test]
fn empty_image_is_an_input_failure() {
    let model = Arc::new(RedMeter::new(InputLayout::Nhwc));
    let service = InferenceService::new(Arc::clone(&model));
    let policy = DecisionPolicy::default();
    let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
    let obs = observe_plant(&service, &policy, "Plant 7", Some(&empty), 60.0).unwrap();

    assert_eq!(obs.failure_kind(), Some(FailureKind::InvalidInput));
    assert_eq!(obs.label(), Label::Unknown);
    assert!(!obs.actuation);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn out_of_range_moisture_rejects_plant() {
    let service = InferenceService::new(Arc::new(RedMeter::new(InputLayout::Nhwc)));
    let policy = DecisionPolicy::default();
    let err = observe_plant(&service, &policy, "Plant 6", Some(&leaf_with_red(51)), 140.0).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn batch_refresh_summary_and_report() {
    let service = InferenceService::new(Arc::new(RedMeter::new(InputLayout::Nhwc)));
    let policy = DecisionPolicy::default();
    let plants = vec![
        PlantInput {
            plant: "Plant 1".to_string(),
            image: Some(leaf_with_red(51)),
            moisture: 30.0,
        },
        PlantInput {
            plant: "Plant 2".to_string(),
            image: Some(leaf_with_red(230)),
            moisture: 50.0,
        },
        PlantInput {
            plant: "Plant 3".to_string(),
            image: None,
            moisture: 10.0,
        },
    ];

    let observations: Vec<_> = observe_plants(&service, &policy, &plants)
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();
    let names: Vec<&str> = observations.iter().map(|o| o.plant.as_str()).collect();
    assert_eq!(names, ["Plant 1", "Plant 2", "Plant 3"]);

    let summary = Summary::from_observations(&observations);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.healthy, 1);
    assert_eq!(summary.infected, 1);
    assert_eq!(summary.unknown, 1);
    assert_eq!(summary.sprayers_on, 2);

    let mut csv = Vec::new();
    write_report(&observations, &mut csv).unwrap();
    let csv = String::from_utf8(csv).unwrap();
    assert_eq!(csv.lines().count(), 4);
    assert!(csv.lines().nth(2).unwrap().starts_with("Plant 2,Infected,"));
}

#[test]
fn same_image_classifies_identically() {
    let service = InferenceService::new(Arc::new(RedMeter::new(InputLayout::Nhwc)));
    let image = leaf_with_red(177);
    let first = service.classify(&image).unwrap();
    let second = service.classify(&image).unwrap();
    assert_eq!(first.label, second.label);
    assert_eq!(first.confidence.to_bits(), second.confidence.to_bits());
}

#[test]
fn missing_model_fails_before_any_classification() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::from_toml_str_with(
        "[model]\npath = \"${DIR}/tomato_leaf_model_final.onnx\"",
        |key| (key == "DIR").then(|| dir.path().display().to_string()),
    )
    .unwrap();

    let loader = ModelLoader::<OnnxModel>::new(config.model_path().unwrap());
    let err = loader
        .load_onnx(config.model.cuda, config.model.input_size)
        .unwrap_err();

    assert!(matches!(err, Error::ModelLoad { .. }));
    assert!(err.to_string().contains("tomato_leaf_model_final.onnx"));
    assert!(!loader.is_loaded());
}
