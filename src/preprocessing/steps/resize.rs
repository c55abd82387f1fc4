use image::{imageops::FilterType, GenericImageView, Rgb, RgbImage};

/// Detection inputs must be multiples of this on both sides
const DET_STRIDE: u32 = 32;

/// Working size for detection: the longer side is limited to `max_side_len`,
/// then both sides are snapped to the nearest stride multiple (at least one stride)
pub fn detection_size(width: u32, height: u32, max_side_len: u32) -> (u32, u32) {
    let max_side = width.max(height);
    let ratio = if max_side > max_side_len && max_side > 0 {
        max_side_len as f32 / max_side as f32
    } else {
        1.0
    };

    let snap = |side: u32| {
        let scaled = side as f32 * ratio;
        let snapped = (scaled / DET_STRIDE as f32).round() as u32 * DET_STRIDE;
        snapped.max(DET_STRIDE)
    };

    (snap(width), snap(height))
}

/// Width after scaling to `target_height` with the aspect ratio kept, capped at `max_width`
pub fn width_for_height(width: u32, height: u32, target_height: u32, max_width: u32) -> u32 {
    if height == 0 {
        return 1;
    }
    let ratio = width as f32 / height as f32;
    let scaled = (target_height as f32 * ratio).ceil() as u32;
    scaled.clamp(1, max_width.max(1))
}

/// Bilinear resize to an exact size
pub fn resize_to<I>(image: &I, width: u32, height: u32) -> RgbImage
where
    I: GenericImageView<Pixel = Rgb<u8>>,
{
    image::imageops::resize(image, width, height, FilterType::Triangle)
}
