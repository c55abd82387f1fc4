use image::RgbImage;

/// Per-channel mean/std used by the text detector
pub const DET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const DET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Maps 0..255 onto -1..1
pub const SYMMETRIC_MEAN: [f32; 3] = [0.5, 0.5, 0.5];
pub const SYMMETRIC_STD: [f32; 3] = [0.5, 0.5, 0.5];

/// Normalize `(x / 255 - mean) / std` into planar CHW layout
pub fn to_chw(image: &RgbImage, mean: [f32; 3], std: [f32; 3]) -> Vec<f32> {
    to_chw_padded(image, image.width(), mean, std)
}

/// Like [`to_chw`], but each row is `padded_width` wide; columns past the image stay 0.0
pub fn to_chw_padded(
    image: &RgbImage,
    padded_width: u32,
    mean: [f32; 3],
    std: [f32; 3],
) -> Vec<f32> {
    let (width, height) = image.dimensions();
    let padded_width = padded_width.max(width) as usize;
    let plane = padded_width * height as usize;
    let mut out = vec![0.0f32; plane * 3];

    for (x, y, pixel) in image.enumerate_pixels() {
        let offset = y as usize * padded_width + x as usize;
        for c in 0..3 {
            let value = pixel.0[c] as f32 / 255.0;
            out[c * plane + offset] = (value - mean[c]) / std[c];
        }
    }

    out
}
