use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use ndarray::ArrayView4;
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch};
use ort::session::Session;
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::value::ValueType;

use crate::error::{Error, Result};
use crate::postprocess::extract_score;
use crate::preprocess::InputSpec;

/// A loaded binary classifier: one batch in, one Infected probability out.
pub trait ScoreModel: Send + Sync {
    /// Geometry the model wants its input in.
    fn input_spec(&self) -> InputSpec;

    fn predict(&self, batch: ArrayView4<'_, f32>) -> Result<f32>;
}

/// ONNX Runtime backed classifier.
///
/// `Session::run` takes `&self` and ONNX Runtime allows concurrent runs on
/// one session, so a shared `Arc<OnnxModel>` needs no lock.
pub struct OnnxModel {
    session: Session,
    spec: InputSpec,
}

impl std::fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxModel")
            .field("session", &"ort::Session")
            .field("spec", &self.spec)
            .finish()
    }
}

impl OnnxModel {
    /// Loads the artifact at `model_path`. `fallback_size` fills dynamic
    /// height/width in the declared input shape.
    pub fn load(model_path: &Path, cuda: bool, fallback_size: u32) -> Result<Self> {
        if !model_path.exists() {
            return Err(Error::model_load(model_path, "no such file"));
        }
        if !model_path.is_file() {
            return Err(Error::model_load(model_path, "not a regular file"));
        }

        let t = Instant::now();
        let provider: ExecutionProviderDispatch = if cuda {
            CUDAExecutionProvider::default().build().error_on_failure()
        } else {
            CPUExecutionProvider::default().build()
        };
        // With `load-dynamic`, a missing or unloadable onnxruntime library
        // panics inside ort on first use instead of returning an error.
        let built = panic::catch_unwind(AssertUnwindSafe(|| {
            SessionBuilder::new()
                .and_then(|b| b.with_execution_providers([provider]))
                .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
                .and_then(|b| b.commit_from_file(model_path))
        }));
        let session = match built {
            Ok(session) => session.map_err(|e| Error::model_load(model_path, e))?,
            Err(payload) => {
                return Err(Error::model_load(
                    model_path,
                    format!("ONNX Runtime unavailable: {}", panic_message(payload.as_ref())),
                ));
            }
        };

        let spec = Self::read_input_spec(&session, fallback_size)
            .map_err(|reason| Error::model_load(model_path, reason))?;
        if session.outputs.is_empty() {
            return Err(Error::model_load(model_path, "model declares no outputs"));
        }

        tracing::info!(
            path = %model_path.display(),
            width = spec.width,
            height = spec.height,
            layout = ?spec.layout,
            cuda,
            elapsed_ms = t.elapsed().as_millis() as u64,
            "model loaded"
        );
        Ok(Self { session, spec })
    }

    fn read_input_spec(session: &Session, fallback_size: u32) -> std::result::Result<InputSpec, String> {
        let [input] = session.inputs.as_slice() else {
            return Err(format!("expected one input, model declares {}", session.inputs.len()));
        };
        match &input.input_type {
            ValueType::Tensor { dimensions, .. } => InputSpec::from_dims(dimensions, fallback_size)
                .ok_or_else(|| format!("unsupported input shape {dimensions:?} for `{}`", input.name)),
            other => Err(format!("input `{}` is not a tensor: {other:?}", input.name)),
        }
    }
}

impl ScoreModel for OnnxModel {
    fn input_spec(&self) -> InputSpec {
        self.spec
    }

    fn predict(&self, batch: ArrayView4<'_, f32>) -> Result<f32> {
        let input_data = ort::inputs![batch.into_dyn()].map_err(|e| Error::Inference(format!("ORT input error: {e}")))?;
        let ys = self
            .session
            .run(input_data)
            .map_err(|e| Error::Inference(format!("model run error: {e}")))?;
        let (_name, value) = ys
            .iter()
            .next()
            .ok_or_else(|| Error::Inference("model produced no outputs".to_string()))?;
        let scores = value
            .try_extract_tensor::<f32>()
            .map_err(|e| Error::Inference(format!("output is not an f32 tensor: {e}")))?;
        extract_score(scores)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Loads a model at most once and hands out the shared handle afterwards.
///
/// Two threads racing on the first call may both load; only one handle is
/// kept and the other is dropped.
pub struct ModelLoader<M> {
    path: PathBuf,
    cell: OnceLock<Arc<M>>,
}

impl<M> ModelLoader<M> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cell: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn get_or_load<F>(&self, load: F) -> Result<Arc<M>>
    where
        F: FnOnce(&Path) -> Result<M>,
    {
        if let Some(model) = self.cell.get() {
            tracing::debug!(path = %self.path.display(), "reusing loaded model");
            return Ok(Arc::clone(model));
        }
        let model = load(&self.path)?;
        Ok(Arc::clone(self.cell.get_or_init(|| Arc::new(model))))
    }
}

impl ModelLoader<OnnxModel> {
    pub fn load_onnx(&self, cuda: bool, fallback_size: u32) -> Result<Arc<OnnxModel>> {
        self.get_or_load(|path| OnnxModel::load(path, cuda, fallback_size))
    }
}
