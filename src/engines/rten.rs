//! rten backend
//!
//! Pure Rust inference engine. Loads `.rten` model artifacts from disk and runs
//! them on the CPU.

use crate::config::BackendConfig;
use crate::engine::{FloatTensor, InferenceSession};
use crate::error::OcrError;
use rten::Model;
use rten_tensor::prelude::*;
use rten_tensor::Tensor;
use std::path::{Path, PathBuf};

/// Session wrapping a single rten model
pub struct RtenSession {
    model: Model,
    path: PathBuf,
}

impl RtenSession {
    /// Load a model artifact and apply the backend configuration
    pub fn load(path: &Path, config: &BackendConfig) -> Result<Self, OcrError> {
        if config.accelerator {
            tracing::warn!(
                "Accelerator requested for {:?} but the rten backend is CPU-only, running on CPU",
                path
            );
        }
        tracing::info!(
            "Loading model {:?} (threads={}, power_mode={})",
            path,
            config.thread_count,
            config.power_mode.as_str()
        );

        let model = Model::load_file(path).map_err(|e| {
            OcrError::InitializationError(format!("Failed to load model {:?}: {}", path, e))
        })?;

        Ok(Self {
            model,
            path: path.to_path_buf(),
        })
    }
}

impl InferenceSession for RtenSession {
    fn backend(&self) -> &'static str {
        "rten"
    }

    fn run(&self, input: FloatTensor) -> Result<FloatTensor, OcrError> {
        let (shape, data) = input.into_parts();
        let input = Tensor::from_data(shape.as_slice(), data);

        let output: Tensor<f32> = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|e| {
                OcrError::ProcessingError(format!("Model {:?} failed to run: {}", self.path, e))
            })?
            .try_into()
            .map_err(|e| {
                OcrError::ProcessingError(format!(
                    "Model {:?} produced a non-float output: {}",
                    self.path, e
                ))
            })?;

        let shape = output.shape().to_vec();
        tracing::debug!("Model {:?} output shape {:?}", self.path, shape);
        FloatTensor::new(shape, output.to_vec())
    }
}
