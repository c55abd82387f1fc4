//! C ABI
//!
//! Every entry point degrades to a sentinel on failure: the null handle (0)
//! from `init`, `{null, 0}` from `forward`. Errors and panics are logged and
//! never cross the boundary.

use crate::bridge::Bridge;
use crate::codec;
use crate::config::{self, PipelineModels, PipelineOptions};
use crate::error::OcrError;
use crate::ingest;
use crate::marshal::{c_str_to_string, copy_floats, FloatArray, OcrBitmap};
use crate::pipeline::{PipelinePredictor, PipelineRequest, Stages};
use crate::recognizer::{RecRequest, RecognitionPredictor};
use crate::registry::Handle;
use std::ffi::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn pipelines() -> &'static Bridge<PipelinePredictor> {
    static PIPELINES: OnceLock<Bridge<PipelinePredictor>> = OnceLock::new();
    PIPELINES.get_or_init(Bridge::new)
}

fn recognizers() -> &'static Bridge<RecognitionPredictor> {
    static RECOGNIZERS: OnceLock<Bridge<RecognitionPredictor>> = OnceLock::new();
    RECOGNIZERS.get_or_init(Bridge::new)
}

/// Run `f`, turning errors and panics into `fallback`
fn guard<T>(operation: &str, fallback: T, f: impl FnOnce() -> Result<T, OcrError>) -> T {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => value,
        Ok(Err(e)) if e.is_handle_error() => {
            tracing::warn!("{} rejected [{}]: {}", operation, e.code(), e);
            fallback
        }
        Ok(Err(e)) => {
            tracing::error!("{} failed [{}]: {}", operation, e.code(), e);
            fallback
        }
        Err(_) => {
            tracing::error!("{} panicked", operation);
            fallback
        }
    }
}

/// Install the fmt subscriber. Only the first call has an effect.
///
/// # Safety
/// `level` must be null or a NUL-terminated string. `RUST_LOG` wins over it when set.
#[no_mangle]
pub unsafe extern "C" fn ocr_bridge_init_logging(level: *const c_char) {
    let level = c_str_to_string(level);
    let level = if level.is_empty() {
        "info".to_string()
    } else {
        level
    };

    let _ = panic::catch_unwind(|| {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| level.into()),
            )
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    });
}

/// Create a full-pipeline predictor. Returns 0 on failure.
///
/// # Safety
/// String arguments must be null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn ocr_pipeline_init(
    det_model_path: *const c_char,
    rec_model_path: *const c_char,
    cls_model_path: *const c_char,
    use_accelerator: i32,
    thread_num: i32,
    power_mode: *const c_char,
) -> u64 {
    let models = PipelineModels {
        detection: PathBuf::from(c_str_to_string(det_model_path)),
        classification: PathBuf::from(c_str_to_string(cls_model_path)),
        recognition: PathBuf::from(c_str_to_string(rec_model_path)),
    };
    let power_mode = c_str_to_string(power_mode);

    guard("ocr_pipeline_init", Handle::NULL, || {
        let backend = config::resolve(&power_mode, thread_num, use_accelerator != 0);
        let predictor = PipelinePredictor::load(&models, &backend, PipelineOptions::default())?;
        pipelines().register(predictor)
    })
    .into_raw()
}

/// Run the pipeline on a bitmap; the result is encoded in the flat record layout
///
/// # Safety
/// `bitmap` must be null or point to an [`OcrBitmap`] whose pixels stay valid
/// for the call. The returned array must be passed to [`ocr_float_array_free`].
#[no_mangle]
pub unsafe extern "C" fn ocr_pipeline_forward(
    handle: u64,
    bitmap: *const OcrBitmap,
    max_size_len: i32,
    run_det: i32,
    run_cls: i32,
    run_rec: i32,
) -> FloatArray {
    let stages = Stages::from_flags(run_det, run_cls, run_rec);
    pipeline_forward_on(pipelines(), handle, bitmap, max_size_len, stages)
}

/// The handle is resolved before the bitmap is touched
unsafe fn pipeline_forward_on(
    bridge: &Bridge<PipelinePredictor>,
    handle: u64,
    bitmap: *const OcrBitmap,
    max_size_len: i32,
    stages: Stages,
) -> FloatArray {
    guard("ocr_pipeline_forward", FloatArray::empty(), || {
        let records = bridge.forward_with(Handle::from_raw(handle), || {
            let bitmap = bitmap
                .as_ref()
                .ok_or_else(|| OcrError::InvalidInput("bitmap is null".to_string()))?;
            Ok(PipelineRequest {
                image: ingest::try_ingest(bitmap)?,
                max_side_len: max_size_len,
                stages,
            })
        })?;
        Ok(FloatArray::from_vec(codec::encode(&records)))
    })
}

/// Free a full-pipeline predictor. Null is a no-op.
#[no_mangle]
pub extern "C" fn ocr_pipeline_release(handle: u64) {
    let handle = Handle::from_raw(handle);
    if handle.is_null() {
        return;
    }
    guard("ocr_pipeline_release", (), || pipelines().release(handle));
}

/// Create a recognition-only predictor. Returns 0 on failure.
///
/// # Safety
/// String arguments must be null or NUL-terminated.
#[no_mangle]
pub unsafe extern "C" fn ocr_rec_init(
    model_path: *const c_char,
    use_accelerator: i32,
    thread_num: i32,
    power_mode: *const c_char,
) -> u64 {
    let path = PathBuf::from(c_str_to_string(model_path));
    let power_mode = c_str_to_string(power_mode);

    guard("ocr_rec_init", Handle::NULL, || {
        let backend = config::resolve(&power_mode, thread_num, use_accelerator != 0);
        let predictor = RecognitionPredictor::load(&path, &backend)?;
        recognizers().register(predictor)
    })
    .into_raw()
}

/// Run the recognition model on a `[1, 3, height, width]` tensor of `len` floats
///
/// # Safety
/// `data` must be null or valid for reads of `len` floats. The returned array
/// must be passed to [`ocr_float_array_free`].
#[no_mangle]
pub unsafe extern "C" fn ocr_rec_forward(
    handle: u64,
    data: *const f32,
    len: usize,
    height: i32,
    width: i32,
) -> FloatArray {
    rec_forward_on(recognizers(), handle, data, len, height, width)
}

unsafe fn rec_forward_on(
    bridge: &Bridge<RecognitionPredictor>,
    handle: u64,
    data: *const f32,
    len: usize,
    height: i32,
    width: i32,
) -> FloatArray {
    guard("ocr_rec_forward", FloatArray::empty(), || {
        let output = bridge.forward_with(Handle::from_raw(handle), || {
            let tensor = copy_floats(data, len)
                .ok_or_else(|| OcrError::InvalidInput("tensor data is null".to_string()))?;
            Ok(RecRequest {
                tensor,
                height,
                width,
            })
        })?;
        Ok(FloatArray::from_vec(output))
    })
}

/// Free a recognition-only predictor. Null is a no-op.
#[no_mangle]
pub extern "C" fn ocr_rec_release(handle: u64) {
    let handle = Handle::from_raw(handle);
    if handle.is_null() {
        return;
    }
    guard("ocr_rec_release", (), || recognizers().release(handle));
}

/// Free an array returned by a `forward` call
///
/// # Safety
/// `array` must come from this library and be freed at most once.
#[no_mangle]
pub unsafe extern "C" fn ocr_float_array_free(array: FloatArray) {
    drop(array.into_vec());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::OcrRecord;
    use crate::engine::{FloatTensor, InferenceSession};
    use crate::ingest::PixelBuffer;
    use crate::pipeline::TextPipeline;
    use std::ptr;

    /// Returns the same records for every image
    struct FixedPipeline(Vec<OcrRecord>);

    impl TextPipeline for FixedPipeline {
        fn infer(
            &self,
            _image: &PixelBuffer,
            _max_side_len: i32,
            _stages: Stages,
        ) -> Result<Vec<OcrRecord>, OcrError> {
            Ok(self.0.clone())
        }
    }

    /// Reports the bound shape followed by the input sum
    struct ShapeEcho;

    impl InferenceSession for ShapeEcho {
        fn backend(&self) -> &'static str {
            "echo"
        }

        fn run(&self, input: FloatTensor) -> Result<FloatTensor, OcrError> {
            let mut data: Vec<f32> = input.shape().iter().map(|&d| d as f32).collect();
            data.push(input.data().iter().sum());
            FloatTensor::new(vec![data.len()], data)
        }
    }

    fn records() -> Vec<OcrRecord> {
        vec![
            OcrRecord {
                points: vec![[1, 2], [30, 2], [30, 12], [1, 12]],
                word_index: vec![4, 9, 4],
                score: 0.875,
                cls_label: 1,
                cls_score: 0.5,
            },
            OcrRecord {
                points: vec![[0, 20], [8, 20], [8, 28], [0, 28]],
                ..OcrRecord::default()
            },
        ]
    }

    fn rgba_bitmap(pixels: &[u8], width: u32, height: u32) -> OcrBitmap {
        OcrBitmap {
            pixels: pixels.as_ptr(),
            len: pixels.len(),
            width,
            height,
            stride: width * 4,
            format: 1,
        }
    }

    #[test]
    fn test_pipeline_forward_returns_encoded_records() {
        let bridge = Bridge::new();
        let handle = bridge
            .register(PipelinePredictor::new(Box::new(FixedPipeline(records()))))
            .unwrap();
        let pixels = vec![200u8; 16 * 8 * 4];
        let bitmap = rgba_bitmap(&pixels, 16, 8);

        let out = unsafe {
            pipeline_forward_on(&bridge, handle.into_raw(), &bitmap, 960, Stages::ALL)
        };
        assert!(!out.data.is_null());
        assert_eq!(out.len, codec::encode(&records()).len());

        let values = unsafe { std::slice::from_raw_parts(out.data, out.len) }.to_vec();
        assert_eq!(codec::decode(&values).unwrap(), records());
        unsafe { ocr_float_array_free(out) };
    }

    #[test]
    fn test_pipeline_forward_after_release_is_empty() {
        let bridge = Bridge::new();
        let handle = bridge
            .register(PipelinePredictor::new(Box::new(FixedPipeline(records()))))
            .unwrap();
        bridge.release(handle).unwrap();

        let pixels = vec![0u8; 4 * 4 * 4];
        let bitmap = rgba_bitmap(&pixels, 4, 4);
        let out = unsafe {
            pipeline_forward_on(&bridge, handle.into_raw(), &bitmap, 960, Stages::ALL)
        };
        assert!(out.is_empty());

        let out = unsafe {
            pipeline_forward_on(&bridge, handle.into_raw(), ptr::null(), 960, Stages::ALL)
        };
        assert!(out.is_empty());
    }

    #[test]
    fn test_pipeline_forward_rejects_unsupported_bitmap() {
        let bridge = Bridge::new();
        let handle = bridge
            .register(PipelinePredictor::new(Box::new(FixedPipeline(records()))))
            .unwrap();
        let pixels = vec![0u8; 4 * 4 * 2];
        let bitmap = OcrBitmap {
            format: 4,
            ..rgba_bitmap(&pixels, 4, 4)
        };

        let out = unsafe {
            pipeline_forward_on(&bridge, handle.into_raw(), &bitmap, 960, Stages::ALL)
        };
        assert!(out.is_empty());
    }

    #[test]
    fn test_rec_forward_returns_model_output() {
        let bridge = Bridge::new();
        let handle = bridge
            .register(RecognitionPredictor::new(Box::new(ShapeEcho)))
            .unwrap();
        let tensor = vec![0.5f32; 3 * 32 * 100];

        let out = unsafe {
            rec_forward_on(&bridge, handle.into_raw(), tensor.as_ptr(), tensor.len(), 32, 100)
        };
        assert_eq!(out.len, 5);
        let values = unsafe { out.into_vec() };
        assert_eq!(values, vec![1.0, 3.0, 32.0, 100.0, 4800.0]);

        let again = unsafe {
            rec_forward_on(&bridge, handle.into_raw(), tensor.as_ptr(), tensor.len(), 32, 100)
        };
        assert!(!again.is_empty());
        unsafe { ocr_float_array_free(again) };
    }

    #[test]
    fn test_rec_forward_with_wrong_length_is_empty() {
        let bridge = Bridge::new();
        let handle = bridge
            .register(RecognitionPredictor::new(Box::new(ShapeEcho)))
            .unwrap();
        let tensor = vec![0.5f32; 3 * 32 * 99];

        let out = unsafe {
            rec_forward_on(&bridge, handle.into_raw(), tensor.as_ptr(), tensor.len(), 32, 100)
        };
        assert!(out.is_empty());
    }
}
