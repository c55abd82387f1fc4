use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to initialize predictor: {0}")]
    InitializationError(String),

    #[error("Failed to run inference: {0}")]
    ProcessingError(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Input tensor has {actual} values (expected: {expected})")]
    TensorSizeMismatch { expected: usize, actual: usize },

    #[error("Predictor handle is null")]
    NullHandle,

    #[error("Predictor handle {0:#x} is stale or unknown")]
    StaleHandle(u64),

    #[error("Malformed result buffer at offset {offset}: {reason}")]
    MalformedBuffer { offset: usize, reason: String },

    #[error("No inference backend available: {0}")]
    BackendUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OcrError {
    /// Stable machine-readable code, used in boundary diagnostics
    pub fn code(&self) -> &'static str {
        match self {
            OcrError::InitializationError(_) => "INIT_ERROR",
            OcrError::ProcessingError(_) => "PROCESSING_ERROR",
            OcrError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            OcrError::InvalidInput(_) => "INVALID_INPUT",
            OcrError::TensorSizeMismatch { .. } => "TENSOR_SIZE_MISMATCH",
            OcrError::NullHandle => "NULL_HANDLE",
            OcrError::StaleHandle(_) => "STALE_HANDLE",
            OcrError::MalformedBuffer { .. } => "MALFORMED_BUFFER",
            OcrError::BackendUnavailable(_) => "BACKEND_UNAVAILABLE",
            OcrError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller broke the handle contract (null, released or unknown handle)
    pub fn is_handle_error(&self) -> bool {
        matches!(self, OcrError::NullHandle | OcrError::StaleHandle(_))
    }
}
