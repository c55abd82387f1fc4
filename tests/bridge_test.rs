//! End-to-end tests of the predictor bridge with in-memory inference sessions

use image::{Rgba, RgbaImage};
use ocr_bridge::codec;
use ocr_bridge::ingest;
use ocr_bridge::{
    Bridge, FloatTensor, InferenceSession, ModelPipeline, OcrError, PipelineOptions,
    PipelinePredictor, PipelineRequest, PixelBuffer, RecRequest, RecognitionPredictor, Stages,
};

/// Probability map with one text band in the middle of the input
struct FakeDetector;

impl InferenceSession for FakeDetector {
    fn backend(&self) -> &'static str {
        "fake"
    }

    fn run(&self, input: FloatTensor) -> Result<FloatTensor, OcrError> {
        let (h, w) = (input.shape()[2], input.shape()[3]);
        let mut map = vec![0.0f32; h * w];
        for y in h / 4..3 * h / 4 {
            for x in w / 8..7 * w / 8 {
                map[y * w + x] = 0.9;
            }
        }
        FloatTensor::new(vec![1, 1, h, w], map)
    }
}

struct FakeClassifier;

impl InferenceSession for FakeClassifier {
    fn backend(&self) -> &'static str {
        "fake"
    }

    fn run(&self, _input: FloatTensor) -> Result<FloatTensor, OcrError> {
        FloatTensor::new(vec![1, 2], vec![0.95, 0.05])
    }
}

/// Emits blank, 1, 1, blank, 2, blank, 3, 3 over five classes
struct FakeRecognizer;

impl InferenceSession for FakeRecognizer {
    fn backend(&self) -> &'static str {
        "fake"
    }

    fn run(&self, _input: FloatTensor) -> Result<FloatTensor, OcrError> {
        let classes = 5;
        let steps = [0usize, 1, 1, 0, 2, 0, 3, 3];
        let mut data = vec![0.01f32; steps.len() * classes];
        for (t, &c) in steps.iter().enumerate() {
            data[t * classes + c] = 0.9;
        }
        FloatTensor::new(vec![1, steps.len(), classes], data)
    }
}

/// Output of shape `[1, W / 4, 10]` derived from the input values
struct FakeRawRecognizer;

impl InferenceSession for FakeRawRecognizer {
    fn backend(&self) -> &'static str {
        "fake"
    }

    fn run(&self, input: FloatTensor) -> Result<FloatTensor, OcrError> {
        let steps = input.shape()[3] / 4;
        let mean = input.data().iter().sum::<f32>() / input.len() as f32;
        let data = (0..steps * 10).map(|i| mean + i as f32).collect();
        FloatTensor::new(vec![1, steps, 10], data)
    }
}

fn pipeline_predictor() -> PipelinePredictor {
    PipelinePredictor::new(Box::new(ModelPipeline::new(
        Box::new(FakeDetector),
        Box::new(FakeClassifier),
        Box::new(FakeRecognizer),
        PipelineOptions::default(),
    )))
}

fn test_image() -> PixelBuffer {
    let img = RgbaImage::from_fn(200, 100, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    });
    ingest::ingest(&img)
}

fn request(stages: Stages) -> PipelineRequest {
    PipelineRequest {
        image: test_image(),
        max_side_len: 960,
        stages,
    }
}

#[test]
fn test_full_pipeline_produces_records() {
    let bridge = Bridge::new();
    let handle = bridge.register(pipeline_predictor()).unwrap();

    let records = bridge.forward(handle, request(Stages::ALL)).unwrap();
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.points.len(), 4);
    for [x, y] in &record.points {
        assert!((0..200).contains(x) && (0..100).contains(y));
    }
    assert_eq!(record.word_index, vec![1, 2, 3]);
    assert!((record.score - 0.9).abs() < 1e-5);
    assert_eq!(record.cls_label, 0);
    assert!((record.cls_score - 0.95).abs() < 1e-5);

    let encoded = codec::encode(&records);
    assert_eq!(encoded.len(), 5 + 8 + 3);
    assert_eq!(codec::decode(&encoded).unwrap(), records);

    bridge.release(handle).unwrap();
}

#[test]
fn test_detection_only_leaves_recognition_fields_empty() {
    let bridge = Bridge::new();
    let handle = bridge.register(pipeline_predictor()).unwrap();

    let records = bridge
        .forward(handle, request(Stages::from_flags(1, 0, 0)))
        .unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].word_index.is_empty());
    assert_eq!(records[0].cls_label, 0);
    assert_eq!(records[0].cls_score, 0.0);
    assert!(records[0].score > 0.8);
}

#[test]
fn test_all_stages_disabled_is_well_formed() {
    let bridge = Bridge::new();
    let handle = bridge.register(pipeline_predictor()).unwrap();

    let records = bridge
        .forward(handle, request(Stages::from_flags(0, 0, 0)))
        .unwrap();
    assert!(records.is_empty());
    assert!(codec::encode(&records).is_empty());
}

#[test]
fn test_two_handles_agree() {
    let bridge = Bridge::new();
    let a = bridge.register(pipeline_predictor()).unwrap();
    let b = bridge.register(pipeline_predictor()).unwrap();

    let first = codec::encode(&bridge.forward(a, request(Stages::ALL)).unwrap());
    let second = codec::encode(&bridge.forward(b, request(Stages::ALL)).unwrap());
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_concurrent_distinct_handles() {
    let bridge = Bridge::new();
    let handles = [
        bridge.register(pipeline_predictor()).unwrap(),
        bridge.register(pipeline_predictor()).unwrap(),
    ];
    let expected = codec::encode(&bridge.forward(handles[0], request(Stages::ALL)).unwrap());

    std::thread::scope(|s| {
        for handle in handles {
            let (bridge, expected) = (&bridge, &expected);
            s.spawn(move || {
                for _ in 0..5 {
                    let records = bridge.forward(handle, request(Stages::ALL)).unwrap();
                    assert_eq!(&codec::encode(&records), expected);
                }
            });
        }
    });
}

#[test]
fn test_released_handle_is_rejected() {
    let bridge = Bridge::new();
    let handle = bridge.register(pipeline_predictor()).unwrap();
    bridge.release(handle).unwrap();

    assert!(matches!(
        bridge.forward(handle, request(Stages::ALL)),
        Err(OcrError::StaleHandle(_))
    ));
    assert!(matches!(
        bridge.release(handle),
        Err(OcrError::StaleHandle(_))
    ));

    let reused = bridge.register(pipeline_predictor()).unwrap();
    assert_ne!(reused, handle);
    assert!(bridge.forward(handle, request(Stages::ALL)).is_err());
    assert!(bridge.forward(reused, request(Stages::ALL)).is_ok());
}

#[test]
fn test_recognition_output_length_follows_model_shape() {
    let bridge = Bridge::new();
    let handle = bridge
        .register(RecognitionPredictor::new(Box::new(FakeRawRecognizer)))
        .unwrap();

    let rec = || RecRequest {
        tensor: vec![0.25; 3 * 32 * 100],
        height: 32,
        width: 100,
    };
    let first = bridge.forward(handle, rec()).unwrap();
    let second = bridge.forward(handle, rec()).unwrap();
    assert_eq!(first.len(), 25 * 10);
    assert_eq!(first, second);
}

#[test]
fn test_recognition_rejects_short_tensor() {
    let bridge = Bridge::new();
    let handle = bridge
        .register(RecognitionPredictor::new(Box::new(FakeRawRecognizer)))
        .unwrap();

    let result = bridge.forward(
        handle,
        RecRequest {
            tensor: vec![0.0; 3 * 32 * 99],
            height: 32,
            width: 100,
        },
    );
    assert!(matches!(result, Err(OcrError::TensorSizeMismatch { .. })));
}

#[test]
fn test_prepared_input_feeds_recognition() {
    let (tensor, h, w) =
        ocr_bridge::pipeline::recognition::prepare_input(&test_image(), 48, 320).unwrap();

    let bridge = Bridge::new();
    let handle = bridge
        .register(RecognitionPredictor::new(Box::new(FakeRawRecognizer)))
        .unwrap();
    let output = bridge
        .forward(
            handle,
            RecRequest {
                tensor,
                height: h as i32,
                width: w as i32,
            },
        )
        .unwrap();
    assert_eq!(output.len(), 80 * 10);
}
