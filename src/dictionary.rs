//! Recognizer label dictionary
//!
//! Maps recognizer class ids (the `word_index` values of a record) back to
//! text. Class 0 is the CTC blank; a trailing space class follows the file's
//! labels.

use crate::error::OcrError;
use crate::pipeline::recognition::ctc_greedy_decode;
use std::path::Path;

const BLANK: &str = "";
const SPACE: &str = " ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dictionary {
    labels: Vec<String>,
}

impl Dictionary {
    /// Read a label file, one label per line
    pub fn from_file(path: &Path) -> Result<Self, OcrError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OcrError::InitializationError(format!(
                "Failed to read dictionary from {:?}: {}",
                path, e
            ))
        })?;
        let labels = content
            .lines()
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect();
        Ok(Self::from_labels(labels))
    }

    pub fn from_labels(labels: Vec<String>) -> Self {
        let mut all = Vec::with_capacity(labels.len() + 2);
        all.push(BLANK.to_string());
        all.extend(labels);
        all.push(SPACE.to_string());
        Self { labels: all }
    }

    /// Number of recognizer classes, blank and space included
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        // blank and space are always present
        false
    }

    pub fn label(&self, index: i32) -> Option<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
    }

    /// Concatenate the labels of `word_index`, skipping unknown ids
    pub fn text(&self, word_index: &[i32]) -> String {
        word_index
            .iter()
            .filter_map(|&index| self.label(index))
            .collect()
    }

    /// Decode a raw recognition output laid out as `[T, len()]`
    ///
    /// Returns the class ids, their text and the mean class probability, or
    /// `None` when the output length is not a multiple of the class count.
    pub fn decode_ctc(&self, raw: &[f32]) -> Option<(Vec<i32>, String, f32)> {
        let classes = self.len();
        if raw.is_empty() || raw.len() % classes != 0 {
            tracing::warn!(
                "Cannot split {} output values into {} classes",
                raw.len(),
                classes
            );
            return None;
        }
        let (word_index, score) = ctc_greedy_decode(raw, raw.len() / classes, classes);
        let text = self.text(&word_index);
        Some((word_index, text, score))
    }
}
