//! Full detection → classification → recognition pipeline
//!
//! [`TextPipeline`] is the contract the pipeline predictor relies on;
//! [`ModelPipeline`] is the built-in implementation over three inference
//! sessions.

pub mod classification;
pub mod detection;
pub mod recognition;

use crate::codec::OcrRecord;
use crate::config::{BackendConfig, PipelineModels, PipelineOptions};
use crate::engine::{InferenceSession, Predictor};
use crate::engines;
use crate::error::OcrError;
use crate::ingest::{BgrView, PixelBuffer};
use crate::preprocessing::steps::crop;
use std::time::Instant;

/// Which stages run for one call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Stages {
    pub detection: bool,
    pub classification: bool,
    pub recognition: bool,
}

impl Stages {
    pub const ALL: Stages = Stages {
        detection: true,
        classification: true,
        recognition: true,
    };

    /// Boundary flags, any non-zero value enables the stage
    pub fn from_flags(run_det: i32, run_cls: i32, run_rec: i32) -> Self {
        Self {
            detection: run_det != 0,
            classification: run_cls != 0,
            recognition: run_rec != 0,
        }
    }

    pub fn any(&self) -> bool {
        self.detection || self.classification || self.recognition
    }
}

/// Multi-stage text inference over one image
///
/// Implementations must be deterministic for identical weights and inputs,
/// return records in a stable order and accept any combination of stages.
pub trait TextPipeline: Send {
    fn infer(
        &self,
        image: &PixelBuffer,
        max_side_len: i32,
        stages: Stages,
    ) -> Result<Vec<OcrRecord>, OcrError>;
}

/// Pipeline built from detection, classification and recognition models
pub struct ModelPipeline {
    detector: Box<dyn InferenceSession>,
    classifier: Box<dyn InferenceSession>,
    recognizer: Box<dyn InferenceSession>,
    options: PipelineOptions,
}

impl ModelPipeline {
    pub fn new(
        detector: Box<dyn InferenceSession>,
        classifier: Box<dyn InferenceSession>,
        recognizer: Box<dyn InferenceSession>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            detector,
            classifier,
            recognizer,
            options,
        }
    }

    /// Load all three models; fails if any of them fails
    pub fn load(
        models: &PipelineModels,
        config: &BackendConfig,
        options: PipelineOptions,
    ) -> Result<Self, OcrError> {
        let detector = engines::load_session(&models.detection, config)?;
        let classifier = engines::load_session(&models.classification, config)?;
        let recognizer = engines::load_session(&models.recognition, config)?;
        tracing::info!(
            "Pipeline models loaded (backend: {}, threads: {}, power mode: {})",
            detector.backend(),
            config.thread_count,
            config.power_mode.as_str()
        );
        Ok(Self::new(detector, classifier, recognizer, options))
    }

    fn max_side(&self, requested: i32) -> u32 {
        match u32::try_from(requested) {
            Ok(side) if side > 0 => side,
            _ => self.options.default_max_side_len,
        }
    }

    fn detect(
        &self,
        view: &BgrView<'_>,
        max_side_len: i32,
    ) -> Result<Vec<detection::DetectedBox>, OcrError> {
        let input = detection::preprocess(view, self.max_side(max_side_len))?;
        let output = self.detector.run(input)?;
        detection::postprocess(&output, view.width(), view.height(), &self.options)
    }

    fn whole_image(view: &BgrView<'_>) -> detection::DetectedBox {
        let (w, h) = (view.width() as i32 - 1, view.height() as i32 - 1);
        detection::DetectedBox {
            points: [[0, 0], [w, 0], [w, h], [0, h]],
            score: 0.0,
        }
    }
}

impl TextPipeline for ModelPipeline {
    fn infer(
        &self,
        image: &PixelBuffer,
        max_side_len: i32,
        stages: Stages,
    ) -> Result<Vec<OcrRecord>, OcrError> {
        if !stages.any() {
            return Ok(Vec::new());
        }
        let view = image
            .view()
            .ok_or_else(|| OcrError::InvalidInput("image is empty".to_string()))?;

        // without detection the whole image is the only region
        let regions = if stages.detection {
            self.detect(&view, max_side_len)?
        } else {
            vec![Self::whole_image(&view)]
        };

        let mut records = Vec::with_capacity(regions.len());
        for region in regions {
            let mut record = OcrRecord {
                points: region.points.to_vec(),
                score: region.score,
                ..OcrRecord::default()
            };

            if stages.classification || stages.recognition {
                let Some(mut crop) = crop::crop_region(&view, &region.points) else {
                    tracing::debug!("Skipping empty crop at {:?}", region.points);
                    records.push(record);
                    continue;
                };

                if stages.classification {
                    let input = classification::preprocess(&crop, &self.options)?;
                    let output = self.classifier.run(input)?;
                    let (label, score) = classification::postprocess(&output)?;
                    record.cls_label = label;
                    record.cls_score = score;
                    if classification::needs_rotation(label, score, &self.options) {
                        crop = crop::rotate_half_turn(&crop);
                    }
                }

                if stages.recognition {
                    let input = recognition::preprocess(
                        &crop,
                        self.options.rec_height,
                        self.options.rec_max_width,
                    )?;
                    let output = self.recognizer.run(input)?;
                    let (word_index, score) = recognition::postprocess(&output)?;
                    record.word_index = word_index;
                    record.score = score;
                }
            }

            records.push(record);
        }

        Ok(records)
    }
}

/// One full-pipeline call
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub image: PixelBuffer,
    pub max_side_len: i32,
    pub stages: Stages,
}

/// Full-pipeline predictor living behind a handle
pub struct PipelinePredictor {
    pipeline: Box<dyn TextPipeline>,
}

impl PipelinePredictor {
    pub fn new(pipeline: Box<dyn TextPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn load(
        models: &PipelineModels,
        config: &BackendConfig,
        options: PipelineOptions,
    ) -> Result<Self, OcrError> {
        let pipeline = ModelPipeline::load(models, config, options)?;
        Ok(Self::new(Box::new(pipeline)))
    }
}

impl Predictor for PipelinePredictor {
    type Request = PipelineRequest;
    type Response = Vec<OcrRecord>;

    fn kind() -> &'static str {
        "pipeline"
    }

    fn forward(&mut self, request: PipelineRequest) -> Result<Vec<OcrRecord>, OcrError> {
        if request.image.is_empty() {
            return Err(OcrError::InvalidInput("image is empty".to_string()));
        }

        let start = Instant::now();
        let records = self
            .pipeline
            .infer(&request.image, request.max_side_len, request.stages)?;
        tracing::debug!(
            "Pipeline produced {} records for {}x{} in {}ms ({:?})",
            records.len(),
            request.image.width(),
            request.image.height(),
            start.elapsed().as_millis(),
            request.stages
        );
        Ok(records)
    }
}
