//! Recognition-only predictor
//!
//! Runs a single recognition model on a caller-prepared `[1, 3, H, W]` tensor
//! and returns the raw output flattened in row-major order.

use crate::config::BackendConfig;
use crate::engine::{FloatTensor, InferenceSession, Predictor};
use crate::engines;
use crate::error::OcrError;
use std::path::Path;

const CHANNELS: usize = 3;

/// One recognition-only call
#[derive(Debug, Clone, PartialEq)]
pub struct RecRequest {
    /// Planar CHW data, exactly `3 * height * width` values
    pub tensor: Vec<f32>,
    pub height: i32,
    pub width: i32,
}

pub struct RecognitionPredictor {
    session: Box<dyn InferenceSession>,
}

impl RecognitionPredictor {
    pub fn new(session: Box<dyn InferenceSession>) -> Self {
        Self { session }
    }

    pub fn load(path: &Path, config: &BackendConfig) -> Result<Self, OcrError> {
        let session = engines::load_session(path, config)?;
        tracing::info!(
            "Recognition model loaded from {:?} (backend: {})",
            path,
            session.backend()
        );
        Ok(Self::new(session))
    }
}

impl RecRequest {
    /// Check the declared geometry against the data before anything is bound
    fn into_tensor(self) -> Result<FloatTensor, OcrError> {
        let (height, width) = match (usize::try_from(self.height), usize::try_from(self.width)) {
            (Ok(h), Ok(w)) if h > 0 && w > 0 => (h, w),
            _ => {
                return Err(OcrError::InvalidInput(format!(
                    "invalid input size {}x{}",
                    self.height, self.width
                )))
            }
        };

        let expected = CHANNELS
            .checked_mul(height)
            .and_then(|n| n.checked_mul(width))
            .ok_or_else(|| {
                OcrError::InvalidInput(format!("input size {}x{} overflows", height, width))
            })?;
        if self.tensor.len() != expected {
            return Err(OcrError::TensorSizeMismatch {
                expected,
                actual: self.tensor.len(),
            });
        }

        FloatTensor::new(vec![1, CHANNELS, height, width], self.tensor)
    }
}

impl Predictor for RecognitionPredictor {
    type Request = RecRequest;
    type Response = Vec<f32>;

    fn kind() -> &'static str {
        "recognition"
    }

    fn forward(&mut self, request: RecRequest) -> Result<Vec<f32>, OcrError> {
        let input = request.into_tensor()?;
        tracing::debug!("Recognition input shape {:?}", input.shape());

        let output = self.session.run(input)?;
        tracing::debug!(
            "Recognition output shape {:?} ({} values)",
            output.shape(),
            output.len()
        );
        Ok(output.into_data())
    }
}
