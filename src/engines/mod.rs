//! Inference backend implementations
//!
//! This module contains implementations of the InferenceSession trait for
//! different backends. Backends are conditionally compiled based on feature
//! flags.

#[cfg(feature = "backend-rten")]
pub mod rten;

use crate::config::BackendConfig;
use crate::engine::InferenceSession;
use crate::error::OcrError;
use std::path::Path;

/// Names of the backends compiled into this build
pub fn available() -> Vec<&'static str> {
    let mut backends = Vec::new();

    #[cfg(feature = "backend-rten")]
    backends.push("rten");

    backends
}

/// Load a model artifact with the first available backend
pub fn load_session(
    path: &Path,
    config: &BackendConfig,
) -> Result<Box<dyn InferenceSession>, OcrError> {
    if !path.is_file() {
        return Err(OcrError::InitializationError(format!(
            "Model file {:?} does not exist",
            path
        )));
    }

    load_compiled_backend(path, config)
}

#[cfg(feature = "backend-rten")]
fn load_compiled_backend(
    path: &Path,
    config: &BackendConfig,
) -> Result<Box<dyn InferenceSession>, OcrError> {
    let session = rten::RtenSession::load(path, config)?;
    Ok(Box::new(session))
}

#[cfg(not(feature = "backend-rten"))]
fn load_compiled_backend(
    _path: &Path,
    _config: &BackendConfig,
) -> Result<Box<dyn InferenceSession>, OcrError> {
    Err(OcrError::BackendUnavailable(
        "Build with --features backend-rten".to_string(),
    ))
}
