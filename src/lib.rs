//! Native OCR inference bridge
//!
//! Owns predictors behind generation-checked integer handles, converts
//! platform bitmaps into BGR pixel buffers, runs the detection /
//! classification / recognition pipeline or a standalone recognizer, and
//! flattens results into a self-describing float buffer. The [`ffi`] module
//! exposes all of this through a C ABI.

pub mod bridge;
pub mod codec;
pub mod config;
pub mod dictionary;
pub mod engine;
pub mod engines;
pub mod error;
pub mod ffi;
pub mod ingest;
pub mod marshal;
pub mod pipeline;
pub mod preprocessing;
pub mod recognizer;
pub mod registry;

pub use bridge::Bridge;
pub use codec::OcrRecord;
pub use config::{BackendConfig, PipelineModels, PipelineOptions, PowerMode};
pub use dictionary::Dictionary;
pub use engine::{FloatTensor, InferenceSession, Predictor};
pub use error::OcrError;
pub use ingest::PixelBuffer;
pub use pipeline::{ModelPipeline, PipelinePredictor, PipelineRequest, Stages, TextPipeline};
pub use recognizer::{RecRequest, RecognitionPredictor};
pub use registry::{Handle, HandleRegistry};
