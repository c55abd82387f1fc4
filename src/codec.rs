//! Flat result wire format
//!
//! Records are written back to back, each as
//!
//! ```text
//! [point_count, word_count, score,
//!  x0, y0, ..., x(point_count-1), y(point_count-1),
//!  word_index_0, ..., word_index_(word_count-1),
//!  cls_label, cls_score]
//! ```
//!
//! so a reader can re-segment the stream using only the two leading counts.

use crate::error::OcrError;
use serde::Serialize;

/// Values in a record besides its points and word indices
const FIXED_FIELDS: usize = 5;

/// One detected / recognized text region
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OcrRecord {
    /// Polygon corners in source image pixels
    pub points: Vec<[i32; 2]>,
    /// Recognizer class ids, 0 is the CTC blank
    pub word_index: Vec<i32>,
    pub score: f32,
    pub cls_label: i32,
    pub cls_score: f32,
}

impl OcrRecord {
    /// Number of floats this record occupies on the wire
    pub fn encoded_len(&self) -> usize {
        FIXED_FIELDS + self.points.len() * 2 + self.word_index.len()
    }
}

/// Serialize records into the flat float layout. Empty input yields an empty buffer.
pub fn encode(records: &[OcrRecord]) -> Vec<f32> {
    let total = records.iter().map(OcrRecord::encoded_len).sum();
    let mut out = Vec::with_capacity(total);

    for r in records {
        out.push(r.points.len() as f32);
        out.push(r.word_index.len() as f32);
        out.push(r.score);

        for [x, y] in &r.points {
            out.push(*x as f32);
            out.push(*y as f32);
        }

        out.extend(r.word_index.iter().map(|&index| index as f32));

        out.push(r.cls_label as f32);
        out.push(r.cls_score);
    }

    out
}

/// Parse a flat buffer back into records
pub fn decode(buffer: &[f32]) -> Result<Vec<OcrRecord>, OcrError> {
    let mut records = Vec::new();
    let mut offset = 0;

    while offset < buffer.len() {
        let point_count = read_count(buffer, offset, "point count")?;
        let word_count = read_count(buffer, offset + 1, "word count")?;

        let record_len = point_count
            .checked_mul(2)
            .and_then(|n| n.checked_add(word_count))
            .and_then(|n| n.checked_add(FIXED_FIELDS))
            .ok_or_else(|| OcrError::MalformedBuffer {
                offset,
                reason: "record length overflows".to_string(),
            })?;
        let end = offset + record_len;
        if end > buffer.len() {
            return Err(OcrError::MalformedBuffer {
                offset,
                reason: format!(
                    "record needs {} values, only {} remain",
                    record_len,
                    buffer.len() - offset
                ),
            });
        }

        let mut cursor = offset + 2;
        let score = buffer[cursor];
        cursor += 1;

        let points = buffer[cursor..cursor + point_count * 2]
            .chunks_exact(2)
            .map(|xy| [xy[0] as i32, xy[1] as i32])
            .collect();
        cursor += point_count * 2;

        let word_index = buffer[cursor..cursor + word_count]
            .iter()
            .map(|&v| v as i32)
            .collect();
        cursor += word_count;

        records.push(OcrRecord {
            points,
            word_index,
            score,
            cls_label: buffer[cursor] as i32,
            cls_score: buffer[cursor + 1],
        });
        offset = end;
    }

    Ok(records)
}

fn read_count(buffer: &[f32], offset: usize, what: &str) -> Result<usize, OcrError> {
    let value = *buffer.get(offset).ok_or_else(|| OcrError::MalformedBuffer {
        offset,
        reason: format!("missing {}", what),
    })?;
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(OcrError::MalformedBuffer {
            offset,
            reason: format!("{} {} is not a non-negative integer", what, value),
        });
    }
    Ok(value as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(points: Vec<[i32; 2]>, word_index: Vec<i32>, score: f32) -> OcrRecord {
        OcrRecord {
            points,
            word_index,
            score,
            cls_label: 1,
            cls_score: 0.75,
        }
    }

    #[test]
    fn test_empty_input_is_empty_buffer() {
        assert!(encode(&[]).is_empty());
        assert!(decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_layout_is_positional() {
        let r = record(vec![[1, 2], [3, 4]], vec![7, 8, 9], 0.5);
        assert_eq!(
            encode(&[r]),
            vec![2.0, 3.0, 0.5, 1.0, 2.0, 3.0, 4.0, 7.0, 8.0, 9.0, 1.0, 0.75]
        );
    }

    #[test]
    fn test_decode_inverts_encode() {
        let records = vec![
            record(vec![[10, 20], [110, 20], [110, 60], [10, 60]], vec![5, 12], 0.93),
            record(vec![], vec![], 0.0),
            record(vec![[0, 0], [4, 0], [4, 4], [0, 4]], vec![], 0.1),
            OcrRecord::default(),
        ];
        let encoded = encode(&records);
        assert_eq!(
            encoded.len(),
            records.iter().map(OcrRecord::encoded_len).sum::<usize>()
        );
        assert_eq!(decode(&encoded).unwrap(), records);
    }

    #[test]
    fn test_truncated_buffer_is_rejected() {
        let encoded = encode(&[record(vec![[1, 1]], vec![3], 0.2)]);
        let err = decode(&encoded[..encoded.len() - 1]).unwrap_err();
        assert!(matches!(err, OcrError::MalformedBuffer { offset: 0, .. }));
    }

    #[test]
    fn test_bad_counts_are_rejected() {
        assert!(matches!(
            decode(&[-1.0, 0.0, 0.0, 0.0, 0.0]),
            Err(OcrError::MalformedBuffer { offset: 0, .. })
        ));
        assert!(matches!(
            decode(&[1.5, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            Err(OcrError::MalformedBuffer { .. })
        ));
        assert!(matches!(
            decode(&[0.0]),
            Err(OcrError::MalformedBuffer { offset: 1, .. })
        ));
    }
}
