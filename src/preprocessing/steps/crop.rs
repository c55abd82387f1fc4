use image::{imageops, GenericImageView, Rgb, RgbImage};

/// Crops this much taller than wide hold vertical text
const VERTICAL_ASPECT: f32 = 1.5;

/// Cut the axis-aligned bounding rectangle of `points` out of `image`
///
/// Vertical crops are turned a quarter counter-clockwise so text runs left to
/// right. Returns `None` when the region is empty after clamping.
pub fn crop_region<I>(image: &I, points: &[[i32; 2]]) -> Option<RgbImage>
where
    I: GenericImageView<Pixel = Rgb<u8>>,
{
    let (width, height) = image.dimensions();
    if points.is_empty() || width == 0 || height == 0 {
        return None;
    }

    let clamp_x = |v: i32| v.clamp(0, width as i32 - 1) as u32;
    let clamp_y = |v: i32| v.clamp(0, height as i32 - 1) as u32;

    let x0 = clamp_x(points.iter().map(|p| p[0]).min()?);
    let x1 = clamp_x(points.iter().map(|p| p[0]).max()?);
    let y0 = clamp_y(points.iter().map(|p| p[1]).min()?);
    let y1 = clamp_y(points.iter().map(|p| p[1]).max()?);

    let crop_w = x1 - x0 + 1;
    let crop_h = y1 - y0 + 1;
    if crop_w < 2 || crop_h < 2 {
        return None;
    }

    let crop = RgbImage::from_fn(crop_w, crop_h, |x, y| image.get_pixel(x0 + x, y0 + y));
    if crop_h as f32 >= crop_w as f32 * VERTICAL_ASPECT {
        Some(imageops::rotate270(&crop))
    } else {
        Some(crop)
    }
}

/// Turn an upside-down crop the right way up
pub fn rotate_half_turn(image: &RgbImage) -> RgbImage {
    imageops::rotate180(image)
}
