//! Text detection stage
//!
//! Differentiable-binarization style post-processing: the detector emits a
//! per-pixel text probability map, which is thresholded, traced into contours
//! and turned into expanded, ordered quadrilaterals in source coordinates.

use crate::config::PipelineOptions;
use crate::engine::FloatTensor;
use crate::error::OcrError;
use crate::ingest::BgrView;
use crate::preprocessing::steps::{normalize, resize};
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::geometry::min_area_rect;
use imageproc::point::Point;
use std::cmp::Ordering;

/// Boxes whose top edges differ by less than this are treated as one row
const ROW_TOLERANCE: i32 = 10;

/// A detected text region in source image pixels
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedBox {
    /// Corners ordered top-left, top-right, bottom-right, bottom-left
    pub points: [[i32; 2]; 4],
    /// Mean text probability inside the box
    pub score: f32,
}

/// Resize and normalize an image into a `[1, 3, H, W]` detector input
pub fn preprocess(image: &BgrView<'_>, max_side_len: u32) -> Result<FloatTensor, OcrError> {
    let (width, height) = image.dimensions();
    let (det_w, det_h) = resize::detection_size(width, height, max_side_len);
    tracing::debug!(
        "Detection input {}x{} -> {}x{} (max side {})",
        width,
        height,
        det_w,
        det_h,
        max_side_len
    );

    let resized = resize::resize_to(image, det_w, det_h);
    let data = normalize::to_chw(&resized, normalize::DET_MEAN, normalize::DET_STD);
    FloatTensor::new(vec![1, 3, det_h as usize, det_w as usize], data)
}

/// Turn a `[1, 1, H, W]` (or `[H, W]`) probability map into boxes in source coordinates
pub fn postprocess(
    output: &FloatTensor,
    src_width: u32,
    src_height: u32,
    options: &PipelineOptions,
) -> Result<Vec<DetectedBox>, OcrError> {
    let shape = output.shape();
    if shape.len() < 2 || shape[..shape.len() - 2].iter().any(|&d| d != 1) {
        return Err(OcrError::ProcessingError(format!(
            "unexpected detection output shape {:?}",
            shape
        )));
    }
    let map_h = shape[shape.len() - 2];
    let map_w = shape[shape.len() - 1];
    if map_h == 0 || map_w == 0 {
        return Ok(Vec::new());
    }
    let prob = output.data();

    let bitmap = GrayImage::from_fn(map_w as u32, map_h as u32, |x, y| {
        if prob[y as usize * map_w + x as usize] > options.det_threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });

    let scale_x = src_width as f32 / map_w as f32;
    let scale_y = src_height as f32 / map_h as f32;
    let mut boxes = Vec::new();

    let contours = find_contours::<i32>(&bitmap);
    for contour in contours
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .take(options.max_candidates)
    {
        if contour.points.len() < 4 || is_degenerate(&contour.points) {
            continue;
        }

        let rect = to_corners(&min_area_rect(&contour.points));
        if short_side(&rect) < options.min_box_side {
            continue;
        }

        let score = box_score(prob, map_w, map_h, &rect);
        if score < options.box_threshold {
            continue;
        }

        let expanded = order_corners(unclip(&rect, options.unclip_ratio));
        if short_side(&expanded) < options.min_box_side + 2.0 {
            continue;
        }

        let points = expanded.map(|[x, y]| {
            [
                (x * scale_x).round().clamp(0.0, src_width.saturating_sub(1) as f32) as i32,
                (y * scale_y).round().clamp(0.0, src_height.saturating_sub(1) as f32) as i32,
            ]
        });
        boxes.push(DetectedBox { points, score });
    }

    sort_reading_order(&mut boxes);
    tracing::debug!("Detection kept {} boxes", boxes.len());
    Ok(boxes)
}

/// Top-to-bottom, then left-to-right within a row
pub fn sort_reading_order(boxes: &mut [DetectedBox]) {
    boxes.sort_by(|a, b| {
        (a.points[0][1], a.points[0][0]).cmp(&(b.points[0][1], b.points[0][0]))
    });

    for i in 0..boxes.len().saturating_sub(1) {
        for j in (0..=i).rev() {
            let (upper, lower) = (&boxes[j], &boxes[j + 1]);
            if (lower.points[0][1] - upper.points[0][1]).abs() < ROW_TOLERANCE
                && lower.points[0][0] < upper.points[0][0]
            {
                boxes.swap(j, j + 1);
            } else {
                break;
            }
        }
    }
}

/// All points on one line: no area to enclose
fn is_degenerate(points: &[Point<i32>]) -> bool {
    let first = points[0];
    let Some(second) = points.iter().find(|p| **p != first) else {
        return true;
    };
    let (dx, dy) = (
        (second.x - first.x) as i64,
        (second.y - first.y) as i64,
    );
    points.iter().all(|p| {
        let (px, py) = ((p.x - first.x) as i64, (p.y - first.y) as i64);
        dx * py - dy * px == 0
    })
}

fn to_corners(rect: &[Point<i32>; 4]) -> [[f32; 2]; 4] {
    rect.map(|p| [p.x as f32, p.y as f32])
}

fn distance(a: [f32; 2], b: [f32; 2]) -> f32 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

fn short_side(rect: &[[f32; 2]; 4]) -> f32 {
    distance(rect[0], rect[1]).min(distance(rect[1], rect[2]))
}

/// Mean probability of the map pixels inside the (convex) quadrilateral
fn box_score(prob: &[f32], map_w: usize, map_h: usize, rect: &[[f32; 2]; 4]) -> f32 {
    let min_x = rect.iter().map(|p| p[0]).fold(f32::MAX, f32::min).floor().max(0.0) as usize;
    let max_x = rect.iter().map(|p| p[0]).fold(f32::MIN, f32::max).ceil().max(0.0) as usize;
    let min_y = rect.iter().map(|p| p[1]).fold(f32::MAX, f32::min).floor().max(0.0) as usize;
    let max_y = rect.iter().map(|p| p[1]).fold(f32::MIN, f32::max).ceil().max(0.0) as usize;
    let max_x = max_x.min(map_w - 1);
    let max_y = max_y.min(map_h - 1);

    let mut sum = 0.0f32;
    let mut count = 0usize;
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            if inside_convex(rect, [x as f32, y as f32]) {
                sum += prob[y * map_w + x];
                count += 1;
            }
        }
    }

    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

fn inside_convex(quad: &[[f32; 2]; 4], p: [f32; 2]) -> bool {
    let mut sign = 0.0f32;
    for i in 0..4 {
        let a = quad[i];
        let b = quad[(i + 1) % 4];
        let cross = (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0]);
        if cross.abs() <= f32::EPSILON {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

/// Grow a rectangle outward by `area * ratio / perimeter` on every side
fn unclip(rect: &[[f32; 2]; 4], ratio: f32) -> [[f32; 2]; 4] {
    let w = distance(rect[0], rect[1]);
    let h = distance(rect[1], rect[2]);
    let perimeter = 2.0 * (w + h);
    if w <= f32::EPSILON || h <= f32::EPSILON || perimeter <= f32::EPSILON {
        return *rect;
    }
    let offset = w * h * ratio / perimeter;

    let u = [(rect[1][0] - rect[0][0]) / w, (rect[1][1] - rect[0][1]) / w];
    let v = [(rect[3][0] - rect[0][0]) / h, (rect[3][1] - rect[0][1]) / h];
    let shift = |p: [f32; 2], su: f32, sv: f32| {
        [
            p[0] + offset * (su * u[0] + sv * v[0]),
            p[1] + offset * (su * u[1] + sv * v[1]),
        ]
    };

    [
        shift(rect[0], -1.0, -1.0),
        shift(rect[1], 1.0, -1.0),
        shift(rect[2], 1.0, 1.0),
        shift(rect[3], -1.0, 1.0),
    ]
}

/// Sort by x, then pick top-left, top-right, bottom-right, bottom-left
fn order_corners(mut points: [[f32; 2]; 4]) -> [[f32; 2]; 4] {
    points.sort_by(|a, b| a[0].partial_cmp(&b[0]).unwrap_or(Ordering::Equal));

    let (top_left, bottom_left) = if points[1][1] > points[0][1] {
        (points[0], points[1])
    } else {
        (points[1], points[0])
    };
    let (top_right, bottom_right) = if points[3][1] > points[2][1] {
        (points[2], points[3])
    } else {
        (points[3], points[2])
    };

    [top_left, top_right, bottom_right, bottom_left]
}
