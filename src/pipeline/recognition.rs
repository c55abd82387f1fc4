//! Text recognition stage
//!
//! Crops are scaled to a fixed height, padded on the right to a fixed width
//! and fed to a CTC recognizer. The output is decoded greedily.

use crate::engine::FloatTensor;
use crate::error::OcrError;
use crate::ingest::PixelBuffer;
use crate::preprocessing::steps::{normalize, resize};
use image::RgbImage;

/// CTC blank class
pub const BLANK_INDEX: usize = 0;

/// Scale `image` to `height`, pad to `max_width` and normalize to `[-1, 1]`
///
/// Returns the planar tensor data together with its height and padded width.
pub fn prepare_crop(image: &RgbImage, height: u32, max_width: u32) -> (Vec<f32>, u32, u32) {
    let (width, src_height) = image.dimensions();
    let scaled_w = resize::width_for_height(width, src_height, height, max_width);
    let resized = resize::resize_to(image, scaled_w, height);
    let data = normalize::to_chw_padded(
        &resized,
        max_width,
        normalize::SYMMETRIC_MEAN,
        normalize::SYMMETRIC_STD,
    );
    (data, height, max_width.max(scaled_w))
}

/// Build recognizer input for a whole ingested image
///
/// This is the producer side of the recognition-only predictor: the returned
/// data, height and width can be handed straight to it.
pub fn prepare_input(
    image: &PixelBuffer,
    height: u32,
    max_width: u32,
) -> Result<(Vec<f32>, u32, u32), OcrError> {
    let view = image
        .view()
        .ok_or_else(|| OcrError::InvalidInput("image is empty".to_string()))?;
    let owned = RgbImage::from_raw(view.width(), view.height(), view.into_raw().to_vec())
        .ok_or_else(|| OcrError::Internal("pixel buffer size changed".to_string()))?;
    Ok(prepare_crop(&owned, height, max_width))
}

/// Wrap a prepared crop into a `[1, 3, H, W]` tensor
pub fn preprocess(image: &RgbImage, height: u32, max_width: u32) -> Result<FloatTensor, OcrError> {
    let (data, h, w) = prepare_crop(image, height, max_width);
    FloatTensor::new(vec![1, 3, h as usize, w as usize], data)
}

/// Decode a `[1, T, C]` or `[T, C]` recognizer output into class ids and a mean score
pub fn postprocess(output: &FloatTensor) -> Result<(Vec<i32>, f32), OcrError> {
    let (seq_len, classes) = match output.shape() {
        [1, t, c] | [t, c] => (*t, *c),
        other => {
            return Err(OcrError::ProcessingError(format!(
                "unexpected recognition output shape {:?}",
                other
            )))
        }
    };
    Ok(ctc_greedy_decode(output.data(), seq_len, classes))
}

/// Greedy CTC decoding over `seq_len` steps of `classes` probabilities
///
/// Takes the arg-max per step, drops blanks and collapses repeats. The score
/// is the mean probability of the emitted classes, or 0.0 when nothing is
/// emitted.
pub fn ctc_greedy_decode(data: &[f32], seq_len: usize, classes: usize) -> (Vec<i32>, f32) {
    if classes == 0 {
        return (Vec::new(), 0.0);
    }

    let mut word_index = Vec::new();
    let mut total = 0.0f32;
    let mut previous: Option<usize> = None;

    for step in data.chunks_exact(classes).take(seq_len) {
        let (best, prob) = step
            .iter()
            .copied()
            .enumerate()
            .fold((0usize, f32::MIN), |acc, (i, v)| if v > acc.1 { (i, v) } else { acc });

        if best != BLANK_INDEX && previous != Some(best) {
            word_index.push(best as i32);
            total += prob;
        }
        previous = Some(best);
    }

    let score = if word_index.is_empty() {
        0.0
    } else {
        total / word_index.len() as f32
    };
    (word_index, score)
}
