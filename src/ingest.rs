//! Image ingestion
//!
//! Converts a platform bitmap into an owned, dense 3-channel BGR pixel buffer.

use crate::error::OcrError;
use image::{ImageBuffer, Rgb, RgbaImage};

/// Bytes per pixel of the single supported source format
const SOURCE_CHANNELS: usize = 4;

/// Platform bitmap pixel formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8888,
    Rgb565,
    Rgba4444,
    Alpha8,
    RgbaF16,
    Unknown(i32),
}

impl PixelFormat {
    /// Decode a platform format code
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => Self::Rgba8888,
            4 => Self::Rgb565,
            7 => Self::Rgba4444,
            8 => Self::Alpha8,
            9 => Self::RgbaF16,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Rgba8888 => 1,
            Self::Rgb565 => 4,
            Self::Rgba4444 => 7,
            Self::Alpha8 => 8,
            Self::RgbaF16 => 9,
            Self::Unknown(code) => *code,
        }
    }
}

/// Geometry and format of a source bitmap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapInfo {
    pub width: u32,
    pub height: u32,
    /// Bytes per row, at least `width * 4` for RGBA_8888
    pub stride: u32,
    pub format: PixelFormat,
}

/// A bitmap owned by the caller whose pixels can be borrowed under a lock
pub trait BitmapSource {
    fn info(&self) -> Result<BitmapInfo, OcrError>;

    /// Lock the pixel memory, hand it to `f`, unlock. The slice is valid only inside `f`.
    fn with_locked_pixels<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, OcrError>;
}

impl BitmapSource for RgbaImage {
    fn info(&self) -> Result<BitmapInfo, OcrError> {
        Ok(BitmapInfo {
            width: self.width(),
            height: self.height(),
            stride: self.width() * SOURCE_CHANNELS as u32,
            format: PixelFormat::Rgba8888,
        })
    }

    fn with_locked_pixels<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, OcrError> {
        Ok(f(self.as_raw().as_slice()))
    }
}

/// Borrowed BGR view used by the preprocessing code
pub type BgrView<'a> = ImageBuffer<Rgb<u8>, &'a [u8]>;

/// Owned 3-channel image, BGR order, row-major, no padding
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wrap BGR bytes; `None` if the length does not match the dimensions
    pub fn from_bgr(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * 3 {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Number of bytes held
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn view(&self) -> Option<BgrView<'_>> {
        if self.is_empty() {
            return None;
        }
        ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())
    }
}

/// Ingest a bitmap, degrading to an empty buffer on any failure
pub fn ingest<B: BitmapSource + ?Sized>(source: &B) -> PixelBuffer {
    match try_ingest(source) {
        Ok(buffer) => buffer,
        Err(e) => {
            tracing::error!("Bitmap ingestion failed [{}]: {}", e.code(), e);
            PixelBuffer::empty()
        }
    }
}

/// Ingest a bitmap. Only RGBA_8888 is accepted; the lock is held for the raw copy only.
pub fn try_ingest<B: BitmapSource + ?Sized>(source: &B) -> Result<PixelBuffer, OcrError> {
    let info = source.info()?;
    if info.format != PixelFormat::Rgba8888 {
        return Err(OcrError::UnsupportedFormat(format!(
            "pixel format {:?} (code {}), expected RGBA_8888",
            info.format,
            info.format.code()
        )));
    }

    let width = info.width as usize;
    let height = info.height as usize;
    let row_bytes = width * SOURCE_CHANNELS;
    let stride = info.stride as usize;
    if stride < row_bytes {
        return Err(OcrError::InvalidInput(format!(
            "stride {} is smaller than a row of {} bytes",
            stride, row_bytes
        )));
    }
    if width == 0 || height == 0 {
        return Err(OcrError::InvalidInput(format!(
            "empty bitmap {}x{}",
            width, height
        )));
    }

    let rgba = source.with_locked_pixels(|pixels| copy_rows(pixels, row_bytes, stride, height))??;

    let mut bgr = Vec::with_capacity(width * height * 3);
    for px in rgba.chunks_exact(SOURCE_CHANNELS) {
        bgr.extend_from_slice(&[px[2], px[1], px[0]]);
    }

    Ok(PixelBuffer {
        width: info.width,
        height: info.height,
        data: bgr,
    })
}

fn copy_rows(
    pixels: &[u8],
    row_bytes: usize,
    stride: usize,
    height: usize,
) -> Result<Vec<u8>, OcrError> {
    let needed = stride * (height - 1) + row_bytes;
    if pixels.len() < needed {
        return Err(OcrError::InvalidInput(format!(
            "bitmap holds {} bytes, {} required",
            pixels.len(),
            needed
        )));
    }

    if stride == row_bytes {
        return Ok(pixels[..row_bytes * height].to_vec());
    }

    let mut out = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let start = row * stride;
        out.extend_from_slice(&pixels[start..start + row_bytes]);
    }
    Ok(out)
}
