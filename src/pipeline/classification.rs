//! Text orientation stage
//!
//! A two-class classifier telling upright crops (label 0) from crops that
//! are upside down (label 1).

use crate::config::PipelineOptions;
use crate::engine::FloatTensor;
use crate::error::OcrError;
use crate::preprocessing::steps::{normalize, resize};
use image::RgbImage;

/// Classifier input height
pub const CLS_HEIGHT: u32 = 48;

/// Label of crops that need a half turn
pub const ROTATED_LABEL: i32 = 1;

/// Scale a crop to the classifier height, pad to `cls_max_width` and normalize to `[-1, 1]`
pub fn preprocess(image: &RgbImage, options: &PipelineOptions) -> Result<FloatTensor, OcrError> {
    let (width, height) = image.dimensions();
    let scaled_w = resize::width_for_height(width, height, CLS_HEIGHT, options.cls_max_width);
    let resized = resize::resize_to(image, scaled_w, CLS_HEIGHT);
    let padded_w = options.cls_max_width.max(scaled_w);
    let data = normalize::to_chw_padded(
        &resized,
        padded_w,
        normalize::SYMMETRIC_MEAN,
        normalize::SYMMETRIC_STD,
    );
    FloatTensor::new(vec![1, 3, CLS_HEIGHT as usize, padded_w as usize], data)
}

/// Arg-max label and its probability
pub fn postprocess(output: &FloatTensor) -> Result<(i32, f32), OcrError> {
    output
        .data()
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, v)| match best {
            Some((_, top)) if top >= v => best,
            _ => Some((i, v)),
        })
        .map(|(label, score)| (label as i32, score))
        .ok_or_else(|| OcrError::ProcessingError("classifier returned no scores".to_string()))
}

/// Whether a classification result asks for the crop to be turned around
pub fn needs_rotation(label: i32, score: f32, options: &PipelineOptions) -> bool {
    label == ROTATED_LABEL && score > options.cls_threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_preprocess_shape() {
        let crop = RgbImage::from_pixel(100, 20, Rgb([10, 20, 30]));
        let tensor = preprocess(&crop, &PipelineOptions::default()).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 48, 192]);
    }

    #[test]
    fn test_postprocess_argmax() {
        let out = FloatTensor::new(vec![1, 2], vec![0.05, 0.95]).unwrap();
        assert_eq!(postprocess(&out).unwrap(), (1, 0.95));

        let out = FloatTensor::new(vec![1, 2], vec![0.7, 0.3]).unwrap();
        assert_eq!(postprocess(&out).unwrap(), (0, 0.7));

        let empty = FloatTensor::new(vec![1, 0], vec![]).unwrap();
        assert!(postprocess(&empty).is_err());
    }

    #[test]
    fn test_rotation_needs_confident_label_one() {
        let options = PipelineOptions::default();
        assert!(needs_rotation(1, 0.95, &options));
        assert!(!needs_rotation(1, 0.5, &options));
        assert!(!needs_rotation(0, 0.99, &options));
    }
}
