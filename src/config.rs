//! Backend configuration resolution
//!
//! Maps the power-mode names accepted at the boundary onto a concrete
//! execution policy and bundles it with thread count and accelerator toggle.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// CPU scheduling / performance strategy for the inference backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PowerMode {
    /// Bind to big cores
    #[default]
    High,
    /// Bind to little cores
    Low,
    /// Use every core
    Full,
    /// No core binding, let the scheduler decide
    NoBind,
    /// Random big cores
    RandHigh,
    /// Random little cores
    RandLow,
}

impl PowerMode {
    pub const ALL: [PowerMode; 6] = [
        PowerMode::High,
        PowerMode::Low,
        PowerMode::Full,
        PowerMode::NoBind,
        PowerMode::RandHigh,
        PowerMode::RandLow,
    ];

    /// Parse an exact boundary name (e.g. `LITE_POWER_LOW`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "LITE_POWER_HIGH" => Some(Self::High),
            "LITE_POWER_LOW" => Some(Self::Low),
            "LITE_POWER_FULL" => Some(Self::Full),
            "LITE_POWER_NO_BIND" => Some(Self::NoBind),
            "LITE_POWER_RAND_HIGH" => Some(Self::RandHigh),
            "LITE_POWER_RAND_LOW" => Some(Self::RandLow),
            _ => None,
        }
    }

    /// Total variant of [`PowerMode::from_name`]; unknown names fall back to `High`
    pub fn resolve(name: &str) -> Self {
        Self::from_name(name).unwrap_or_else(|| {
            tracing::warn!(
                "Unrecognized power mode {:?}, falling back to {}",
                name,
                Self::High.as_str()
            );
            Self::High
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "LITE_POWER_HIGH",
            Self::Low => "LITE_POWER_LOW",
            Self::Full => "LITE_POWER_FULL",
            Self::NoBind => "LITE_POWER_NO_BIND",
            Self::RandHigh => "LITE_POWER_RAND_HIGH",
            Self::RandLow => "LITE_POWER_RAND_LOW",
        }
    }
}

/// Engine settings applied when a predictor is created. Immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Passed through as given; the backend validates it
    pub thread_count: i32,
    pub power_mode: PowerMode,
    pub accelerator: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            thread_count: 1,
            power_mode: PowerMode::High,
            accelerator: false,
        }
    }
}

/// Resolve boundary arguments into a backend configuration. Never fails.
pub fn resolve(power_mode_name: &str, thread_count: i32, accelerator: bool) -> BackendConfig {
    BackendConfig {
        thread_count,
        power_mode: PowerMode::resolve(power_mode_name),
        accelerator,
    }
}

/// Model artifacts of the full pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineModels {
    pub detection: PathBuf,
    pub classification: PathBuf,
    pub recognition: PathBuf,
}

/// Tunables of the built-in detection / classification / recognition pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineOptions {
    /// Probability above which a detection map pixel counts as text
    pub det_threshold: f32,
    /// Minimum mean probability of a kept box
    pub box_threshold: f32,
    pub unclip_ratio: f32,
    /// Minimum short side of a kept box, in detection map pixels
    pub min_box_side: f32,
    pub max_candidates: usize,
    /// Used when the caller passes a non-positive max side length
    pub default_max_side_len: u32,
    /// Rotation is applied only above this classifier confidence
    pub cls_threshold: f32,
    pub cls_max_width: u32,
    pub rec_height: u32,
    pub rec_max_width: u32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            det_threshold: 0.3,
            box_threshold: 0.6,
            unclip_ratio: 1.5,
            min_box_side: 3.0,
            max_candidates: 1000,
            default_max_side_len: 960,
            cls_threshold: 0.9,
            cls_max_width: 192,
            rec_height: 48,
            rec_max_width: 320,
        }
    }
}
