use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use image::DynamicImage;
use ndarray::Array4;
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::model::ScoreModel;
use crate::postprocess::{ClassificationResult, decide};
use crate::preprocess::Processor;

/// Leaf-health classifier around one shared, read-only model handle.
pub struct InferenceService<M: ScoreModel> {
    model: Arc<M>,
    processor: Processor,
    timeout: Option<Duration>,
}

impl<M: ScoreModel> std::fmt::Debug for InferenceService<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceService")
            .field("processor", &self.processor)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl<M: ScoreModel + 'static> InferenceService<M> {
    /// Creates a service with preprocessing matched to the model's input spec.
    pub fn new(model: Arc<M>) -> Self {
        let processor = Processor::new(model.input_spec());
        Self {
            model,
            processor,
            timeout: None,
        }
    }

    /// Bounds every forward pass. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &Arc<M> {
        &self.model
    }

    pub fn classify(&self, image: &DynamicImage) -> Result<ClassificationResult> {
        let t = Instant::now();
        let batch = self.processor.preprocess(image)?;
        let score = self.run_model(batch)?;
        let result = decide(score)?;
        tracing::debug!(
            score,
            label = %result.label,
            confidence = result.confidence,
            elapsed_ms = t.elapsed().as_millis() as u64,
            "leaf classified"
        );
        Ok(result)
    }

    /// Classifies independent images in parallel, keeping input order.
    pub fn classify_all(&self, images: &[&DynamicImage]) -> Vec<Result<ClassificationResult>> {
        images.par_iter().map(|image| self.classify(image)).collect()
    }

    fn run_model(&self, batch: Array4<f32>) -> Result<f32> {
        let Some(limit) = self.timeout else {
            return self.model.predict(batch.view());
        };

        // The worker owns its tensor and its own handle clone; if we stop
        // waiting it finishes (or fails) on its own without touching shared state.
        let model = Arc::clone(&self.model);
        let (tx, rx) = mpsc::sync_channel(1);
        thread::Builder::new()
            .name("inference".to_string())
            .spawn(move || {
                let _ = tx.send(model.predict(batch.view()));
            })
            .map_err(|e| Error::Inference(format!("failed to spawn inference worker: {e}")))?;

        match rx.recv_timeout(limit) {
            Ok(score) => score,
            Err(RecvTimeoutError::Timeout) => Err(Error::Inference(format!(
                "forward pass exceeded {} ms",
                limit.as_millis()
            ))),
            Err(RecvTimeoutError::Disconnected) => Err(Error::Inference(
                "inference worker exited without a result".to_string(),
            )),
        }
    }
}
