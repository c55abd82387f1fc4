use anyhow::Context;
use clap::{Parser, Subcommand};
use ocr_bridge::config::{self, BackendConfig, PipelineModels, PipelineOptions};
use ocr_bridge::pipeline::recognition;
use ocr_bridge::{
    codec, ingest, Bridge, Dictionary, OcrRecord, PipelinePredictor, PipelineRequest,
    RecRequest, RecognitionPredictor, Stages,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ocr-bridge")]
#[command(about = "Run the OCR bridge predictors against image files")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Inference threads
    #[arg(long, env = "OCR_THREADS", default_value = "1", global = true)]
    pub threads: i32,

    /// Power profile (LITE_POWER_HIGH, LITE_POWER_LOW, LITE_POWER_FULL, ...)
    #[arg(long, env = "OCR_POWER_MODE", default_value = "LITE_POWER_HIGH", global = true)]
    pub power_mode: String,

    /// Request the accelerator backend
    #[arg(long, env = "OCR_ACCELERATOR", global = true)]
    pub accelerator: bool,

    /// JSON file overriding pipeline tunables
    #[arg(long, global = true)]
    pub options: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Detection, classification and recognition on one image
    Pipeline {
        #[arg(long)]
        det_model: PathBuf,
        #[arg(long)]
        rec_model: PathBuf,
        #[arg(long)]
        cls_model: PathBuf,
        /// Label file used to turn word indices into text
        #[arg(long)]
        dict: Option<PathBuf>,
        /// Longest side of the detection input; 0 uses the configured default
        #[arg(long, default_value = "960")]
        max_side_len: i32,
        #[arg(long)]
        no_det: bool,
        #[arg(long)]
        no_cls: bool,
        #[arg(long)]
        no_rec: bool,
        image: PathBuf,
    },
    /// Recognition model only, on the whole image
    Recognize {
        #[arg(long)]
        model: PathBuf,
        #[arg(long)]
        dict: Option<PathBuf>,
        #[arg(long, default_value = "48")]
        height: u32,
        #[arg(long, default_value = "320")]
        width: u32,
        image: PathBuf,
    },
}

impl From<&Args> for BackendConfig {
    fn from(args: &Args) -> Self {
        config::resolve(&args.power_mode, args.threads, args.accelerator)
    }
}

#[derive(Serialize)]
struct PipelineReport {
    records: Vec<OcrRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<Vec<String>>,
    encoded_len: usize,
    processing_time_ms: u64,
}

#[derive(Serialize)]
struct RecognitionReport {
    output_len: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    word_index: Option<Vec<i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<f32>,
    processing_time_ms: u64,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting ocr-bridge v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Available backends: {:?}", ocr_bridge::engines::available());

    let backend = BackendConfig::from(&args);
    let options = load_options(args.options.as_deref())?;

    let report = match args.command {
        Command::Pipeline {
            det_model,
            rec_model,
            cls_model,
            dict,
            max_side_len,
            no_det,
            no_cls,
            no_rec,
            image,
        } => {
            let models = PipelineModels {
                detection: det_model,
                classification: cls_model,
                recognition: rec_model,
            };
            let stages = Stages {
                detection: !no_det,
                classification: !no_cls,
                recognition: !no_rec,
            };
            let report = run_pipeline(
                &models,
                &backend,
                options,
                dict.as_deref(),
                max_side_len,
                stages,
                &image,
            )?;
            serde_json::to_string_pretty(&report)?
        }
        Command::Recognize {
            model,
            dict,
            height,
            width,
            image,
        } => {
            let report = run_recognition(&model, &backend, dict.as_deref(), height, width, &image)?;
            serde_json::to_string_pretty(&report)?
        }
    };

    println!("{}", report);
    Ok(())
}

fn load_options(path: Option<&Path>) -> anyhow::Result<PipelineOptions> {
    let Some(path) = path else {
        return Ok(PipelineOptions::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read options file {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid options file {:?}", path))
}

fn load_dictionary(path: Option<&Path>) -> anyhow::Result<Option<Dictionary>> {
    path.map(Dictionary::from_file).transpose().map_err(Into::into)
}

fn run_pipeline(
    models: &PipelineModels,
    backend: &BackendConfig,
    options: PipelineOptions,
    dict: Option<&Path>,
    max_side_len: i32,
    stages: Stages,
    image_path: &Path,
) -> anyhow::Result<PipelineReport> {
    let dictionary = load_dictionary(dict)?;
    let bitmap = image::open(image_path)
        .with_context(|| format!("Failed to open image {:?}", image_path))?
        .to_rgba8();
    let pixels = ingest::try_ingest(&bitmap)?;

    let bridge = Bridge::new();
    let handle = bridge.register(PipelinePredictor::load(models, backend, options)?)?;

    let start = Instant::now();
    let result = bridge.forward(
        handle,
        PipelineRequest {
            image: pixels,
            max_side_len,
            stages,
        },
    );
    let processing_time_ms = start.elapsed().as_millis() as u64;
    bridge.release(handle)?;
    let records = result?;

    tracing::info!(
        "Found {} text regions in {}ms",
        records.len(),
        processing_time_ms
    );

    let text = dictionary.map(|dict| {
        records
            .iter()
            .map(|record| dict.text(&record.word_index))
            .collect()
    });

    Ok(PipelineReport {
        encoded_len: codec::encode(&records).len(),
        records,
        text,
        processing_time_ms,
    })
}

fn run_recognition(
    model: &Path,
    backend: &BackendConfig,
    dict: Option<&Path>,
    height: u32,
    width: u32,
    image_path: &Path,
) -> anyhow::Result<RecognitionReport> {
    let dictionary = load_dictionary(dict)?;
    let bitmap = image::open(image_path)
        .with_context(|| format!("Failed to open image {:?}", image_path))?
        .to_rgba8();
    let pixels = ingest::try_ingest(&bitmap)?;
    let (tensor, h, w) = recognition::prepare_input(&pixels, height, width)?;

    let bridge = Bridge::new();
    let handle = bridge.register(RecognitionPredictor::load(model, backend)?)?;

    let start = Instant::now();
    let result = bridge.forward(
        handle,
        RecRequest {
            tensor,
            height: h as i32,
            width: w as i32,
        },
    );
    let processing_time_ms = start.elapsed().as_millis() as u64;
    bridge.release(handle)?;
    let output = result?;

    let decoded = dictionary.and_then(|dict| dict.decode_ctc(&output));
    let (word_index, text, score) = match decoded {
        Some((word_index, text, score)) => (Some(word_index), Some(text), Some(score)),
        None => (None, None, None),
    };

    Ok(RecognitionReport {
        output_len: output.len(),
        word_index,
        text,
        score,
        processing_time_ms,
    })
}
