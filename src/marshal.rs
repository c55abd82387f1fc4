//! Conversions for values crossing the C boundary
//!
//! Caller memory is only ever copied. Nothing returned from here borrows a
//! caller buffer past the call that received it.

use crate::error::OcrError;
use crate::ingest::{BitmapInfo, BitmapSource, PixelFormat};
use std::ffi::{c_char, CStr};
use std::ptr;

/// Copy a NUL-terminated string; null gives an empty string, invalid UTF-8 is replaced
///
/// # Safety
/// `raw` must be null or point to a NUL-terminated string valid for the call.
pub unsafe fn c_str_to_string(raw: *const c_char) -> String {
    if raw.is_null() {
        return String::new();
    }
    CStr::from_ptr(raw).to_string_lossy().into_owned()
}

/// Copy `len` floats. `None` when `data` is null but `len` is not zero.
///
/// # Safety
/// `data` must be null or valid for reads of `len` floats.
pub unsafe fn copy_floats(data: *const f32, len: usize) -> Option<Vec<f32>> {
    if len == 0 {
        return Some(Vec::new());
    }
    if data.is_null() {
        return None;
    }
    Some(std::slice::from_raw_parts(data, len).to_vec())
}

/// Float buffer handed to the caller. Free it with `ocr_float_array_free`.
#[repr(C)]
#[derive(Debug)]
pub struct FloatArray {
    pub data: *mut f32,
    pub len: usize,
}

impl FloatArray {
    /// `{null, 0}`
    pub fn empty() -> Self {
        Self {
            data: ptr::null_mut(),
            len: 0,
        }
    }

    pub fn from_vec(values: Vec<f32>) -> Self {
        if values.is_empty() {
            return Self::empty();
        }
        let boxed = values.into_boxed_slice();
        let len = boxed.len();
        let data = Box::into_raw(boxed) as *mut f32;
        Self { data, len }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_null() || self.len == 0
    }

    /// Take the values back
    ///
    /// # Safety
    /// `self` must come from [`FloatArray::from_vec`] and not have been reclaimed yet.
    pub unsafe fn into_vec(self) -> Vec<f32> {
        if self.is_empty() {
            return Vec::new();
        }
        let slice = ptr::slice_from_raw_parts_mut(self.data, self.len);
        Box::from_raw(slice).into_vec()
    }
}

/// Platform bitmap as seen across the boundary
///
/// `pixels` covers `len` bytes laid out as `height` rows of `stride` bytes.
/// The caller keeps the memory locked for the duration of the call that
/// receives it.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct OcrBitmap {
    pub pixels: *const u8,
    pub len: usize,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: i32,
}

impl BitmapSource for OcrBitmap {
    fn info(&self) -> Result<BitmapInfo, OcrError> {
        Ok(BitmapInfo {
            width: self.width,
            height: self.height,
            stride: self.stride,
            format: PixelFormat::from_code(self.format),
        })
    }

    fn with_locked_pixels<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, OcrError> {
        if self.pixels.is_null() {
            return Err(OcrError::InvalidInput("bitmap pixels are null".to_string()));
        }
        // SAFETY: the caller guarantees `pixels` is valid for `len` bytes while the call runs
        let pixels = unsafe { std::slice::from_raw_parts(self.pixels, self.len) };
        Ok(f(pixels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest;
    use std::ffi::CString;

    #[test]
    fn test_c_str() {
        let s = CString::new("LITE_POWER_LOW").unwrap();
        assert_eq!(unsafe { c_str_to_string(s.as_ptr()) }, "LITE_POWER_LOW");
        assert_eq!(unsafe { c_str_to_string(ptr::null()) }, "");
    }

    #[test]
    fn test_c_str_lossy() {
        let bytes = [0x66u8, 0xff, 0x6f, 0];
        let s = unsafe { c_str_to_string(bytes.as_ptr() as *const c_char) };
        assert_eq!(s, "f\u{fffd}o");
    }

    #[test]
    fn test_copy_floats() {
        let src = [1.0f32, 2.0, 3.0];
        assert_eq!(
            unsafe { copy_floats(src.as_ptr(), 3) },
            Some(vec![1.0, 2.0, 3.0])
        );
        assert_eq!(unsafe { copy_floats(ptr::null(), 0) }, Some(Vec::new()));
        assert_eq!(unsafe { copy_floats(ptr::null(), 4) }, None);
    }

    #[test]
    fn test_float_array_round_trip() {
        let array = FloatArray::from_vec(vec![0.5, 1.5]);
        assert_eq!(array.len, 2);
        assert!(!array.data.is_null());
        assert_eq!(unsafe { array.into_vec() }, vec![0.5, 1.5]);

        let empty = FloatArray::from_vec(Vec::new());
        assert!(empty.is_empty() && empty.data.is_null());
        assert!(unsafe { empty.into_vec() }.is_empty());
    }

    #[test]
    fn test_bitmap_ingest() {
        let pixels: Vec<u8> = vec![1, 2, 3, 255, 4, 5, 6, 255];
        let bitmap = OcrBitmap {
            pixels: pixels.as_ptr(),
            len: pixels.len(),
            width: 2,
            height: 1,
            stride: 8,
            format: 1,
        };
        let buffer = ingest::ingest(&bitmap);
        assert_eq!(buffer.data(), &[3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn test_bitmap_null_or_unsupported() {
        let null = OcrBitmap {
            pixels: ptr::null(),
            len: 0,
            width: 2,
            height: 2,
            stride: 8,
            format: 1,
        };
        assert!(ingest::ingest(&null).is_empty());

        let pixels = vec![0u8; 8];
        let rgb565 = OcrBitmap {
            pixels: pixels.as_ptr(),
            len: pixels.len(),
            width: 2,
            height: 2,
            stride: 4,
            format: 4,
        };
        assert!(ingest::ingest(&rgb565).is_empty());
    }
}
