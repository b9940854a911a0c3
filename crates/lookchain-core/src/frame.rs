//! Non-owning frame buffer views and the raw-copy fallback.
#![allow(unsafe_code)]
// Frames are host memory views; every pixel access goes through raw pointers
// so that in-place rendering (src and dst over the same bytes) stays sound.

use std::fmt;
use std::marker::PhantomData;
use std::ptr;

use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// Packed pixel storage. Every format holds 4 channels in alpha-first order
/// (A, R, G, B), tightly packed within a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit unsigned integer channels.
    U8,
    /// 16-bit unsigned integer channels, full white at 32768.
    U16,
    /// 32-bit floating point channels.
    F32,
}

impl PixelFormat {
    /// All supported formats.
    pub const ALL: [Self; 3] = [Self::U8, Self::U16, Self::F32];

    /// Bytes per pixel (4 channels).
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::U8 => 4,
            Self::U16 => 8,
            Self::F32 => 16,
        }
    }

    /// Infer the format from a host's pixel stride.
    pub const fn from_bytes_per_pixel(bpp: usize) -> Option<Self> {
        match bpp {
            4 => Some(Self::U8),
            8 => Some(Self::U16),
            16 => Some(Self::F32),
            _ => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::U8 => write!(f, "8u"),
            Self::U16 => write!(f, "16u"),
            Self::F32 => write!(f, "32f"),
        }
    }
}

/// Non-owning view of a frame buffer supplied by the host for one render call.
///
/// Rows are `row_bytes` apart, which may exceed `width × bytes_per_pixel`.
/// The view never owns or frees the buffer.
#[derive(Debug)]
pub struct FrameDescriptor<'a> {
    data: *mut u8,
    width: i32,
    height: i32,
    row_bytes: i32,
    format: PixelFormat,
    writable: bool,
    _buffer: PhantomData<&'a mut [u8]>,
}

impl<'a> FrameDescriptor<'a> {
    /// Wrap a read-only buffer, typically the render source.
    ///
    /// A read-only view is never written: used as a destination it is
    /// treated as invalid.
    pub fn from_slice(
        buffer: &'a [u8],
        width: i32,
        height: i32,
        row_bytes: i32,
        format: PixelFormat,
    ) -> Result<Self, FrameError> {
        check_extent(buffer.len(), width, height, row_bytes)?;
        Ok(Self {
            data: buffer.as_ptr().cast_mut(),
            width,
            height,
            row_bytes,
            format,
            writable: false,
            _buffer: PhantomData,
        })
    }

    /// Wrap a writable buffer.
    pub fn from_mut_slice(
        buffer: &'a mut [u8],
        width: i32,
        height: i32,
        row_bytes: i32,
        format: PixelFormat,
    ) -> Result<Self, FrameError> {
        check_extent(buffer.len(), width, height, row_bytes)?;
        Ok(Self {
            data: buffer.as_mut_ptr(),
            width,
            height,
            row_bytes,
            format,
            writable: true,
            _buffer: PhantomData,
        })
    }

    /// Wrap a host pointer without validation. A null pointer or non-positive
    /// geometry yields an invalid frame, which every consumer tolerates.
    ///
    /// # Safety
    ///
    /// When `data` is non-null and the geometry is positive, `data` must be
    /// valid for reads and writes of `height × row_bytes` bytes for `'a`, and
    /// no Rust reference may alias that memory while the view is used.
    /// Two views over the same memory (in-place rendering) are allowed.
    pub unsafe fn from_raw_parts(
        data: *mut u8,
        width: i32,
        height: i32,
        row_bytes: i32,
        format: PixelFormat,
    ) -> Self {
        Self {
            data,
            width,
            height,
            row_bytes,
            format,
            writable: true,
            _buffer: PhantomData,
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn row_bytes(&self) -> i32 {
        self.row_bytes
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Base address of the view. May be null.
    pub fn data_ptr(&self) -> *mut u8 {
        self.data
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Non-null pointer and positive geometry.
    pub fn is_valid(&self) -> bool {
        !self.data.is_null() && self.width > 0 && self.height > 0 && self.row_bytes > 0
    }

    /// Valid, and each row holds at least `width` whole pixels.
    pub fn is_supported(&self) -> bool {
        self.is_valid() && self.row_bytes as usize >= self.tight_row_bytes()
    }

    /// Width, height, and format match.
    pub fn same_geometry(&self, other: &FrameDescriptor<'_>) -> bool {
        self.width == other.width && self.height == other.height && self.format == other.format
    }

    /// Bytes of pixel data in one row, excluding stride padding.
    pub fn tight_row_bytes(&self) -> usize {
        self.width.max(0) as usize * self.format.bytes_per_pixel()
    }

    /// Whether both views start at the same address.
    pub fn aliases(&self, other: &FrameDescriptor<'_>) -> bool {
        ptr::eq(self.data, other.data)
    }

    /// Copy the pixel rows into a tightly packed buffer (no stride padding).
    ///
    /// Returns `None` for an unsupported frame.
    pub fn read_packed_rows(&self) -> Option<Vec<u8>> {
        if !self.is_supported() {
            return None;
        }
        let tight = self.tight_row_bytes();
        let mut packed = vec![0u8; tight * self.height as usize];
        for (y, row) in packed.chunks_exact_mut(tight).enumerate() {
            // SAFETY: the frame is supported, so row `y` holds `tight` bytes.
            unsafe { ptr::copy_nonoverlapping(self.row_ptr(y), row.as_mut_ptr(), tight) };
        }
        Some(packed)
    }

    /// Overwrite the pixel rows from a tightly packed buffer, leaving stride
    /// padding untouched.
    ///
    /// Returns `false` without writing anything when the frame is not a
    /// writable supported frame or `packed` has the wrong length.
    pub fn write_packed_rows(&mut self, packed: &[u8]) -> bool {
        let tight = self.tight_row_bytes();
        if !self.writable || !self.is_supported() || packed.len() != tight * self.height as usize {
            return false;
        }
        for (y, row) in packed.chunks_exact(tight).enumerate() {
            // SAFETY: `packed` is a separate Rust allocation; row `y` is in bounds.
            unsafe { ptr::copy_nonoverlapping(row.as_ptr(), self.row_ptr(y), tight) };
        }
        true
    }

    /// Pointer to the first byte of row `y`.
    ///
    /// # Safety
    ///
    /// The frame must be valid and `y < height`.
    pub(crate) unsafe fn row_ptr(&self, y: usize) -> *mut u8 {
        // SAFETY: guaranteed in bounds by the caller.
        unsafe { self.data.add(y * self.row_bytes as usize) }
    }
}

/// Raw byte copy of the overlapping region: `min(height)` rows of
/// `min(row_bytes)` bytes. No color interpretation.
///
/// This is the universal fallback whenever the color path cannot run.
/// Invalid or read-only destinations are left untouched.
pub fn copy_frame(src: &FrameDescriptor<'_>, dst: &mut FrameDescriptor<'_>) {
    if !src.is_valid() || !dst.is_valid() || !dst.writable {
        return;
    }
    let rows = src.height.min(dst.height) as usize;
    let bytes = src.row_bytes.min(dst.row_bytes) as usize;
    if src.aliases(dst) && src.row_bytes == dst.row_bytes {
        return;
    }
    for y in 0..rows {
        // SAFETY: both frames are valid and `y` is below both heights. `copy`
        // has memmove semantics, so overlapping in-place views are fine.
        unsafe { ptr::copy(src.row_ptr(y), dst.row_ptr(y), bytes) };
    }
}

fn check_extent(len: usize, width: i32, height: i32, row_bytes: i32) -> Result<(), FrameError> {
    if width <= 0 || height <= 0 || row_bytes <= 0 {
        return Err(FrameError::InvalidGeometry {
            width,
            height,
            row_bytes,
        });
    }
    let required = height as usize * row_bytes as usize;
    if len < required {
        return Err(FrameError::BufferTooSmall {
            required,
            actual: len,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_slice_rejects_short_buffer() {
        let buf = vec![0u8; 10];
        let err = FrameDescriptor::from_slice(&buf, 2, 2, 8, PixelFormat::U8).unwrap_err();
        assert_eq!(
            err,
            FrameError::BufferTooSmall {
                required: 16,
                actual: 10
            }
        );
    }

    #[test]
    fn test_raw_null_frame_is_invalid() {
        // SAFETY: a null view is never dereferenced.
        let frame =
            unsafe { FrameDescriptor::from_raw_parts(ptr::null_mut(), 4, 4, 16, PixelFormat::U8) };
        assert!(!frame.is_valid());
        assert!(!frame.is_supported());
    }

    #[test]
    fn test_narrow_stride_is_valid_but_unsupported() {
        let buf = vec![0u8; 64];
        let frame = FrameDescriptor::from_slice(&buf, 4, 4, 8, PixelFormat::U8).unwrap();
        assert!(frame.is_valid());
        assert!(!frame.is_supported());
    }

    #[test]
    fn test_copy_frame_uses_each_stride() {
        let src_buf: Vec<u8> = (0..24).collect();
        let mut dst_buf = vec![0xAAu8; 32];
        {
            let src = FrameDescriptor::from_slice(&src_buf, 2, 2, 12, PixelFormat::U8).unwrap();
            let mut dst =
                FrameDescriptor::from_mut_slice(&mut dst_buf, 2, 2, 16, PixelFormat::U8).unwrap();
            copy_frame(&src, &mut dst);
        }
        assert_eq!(&dst_buf[0..12], &src_buf[0..12]);
        assert_eq!(&dst_buf[12..16], &[0xAA; 4]);
        assert_eq!(&dst_buf[16..28], &src_buf[12..24]);
        assert_eq!(&dst_buf[28..32], &[0xAA; 4]);
    }

    #[test]
    fn test_copy_into_read_only_view_is_ignored() {
        let src_buf = vec![1u8; 16];
        let dst_buf = vec![0u8; 16];
        let src = FrameDescriptor::from_slice(&src_buf, 2, 2, 8, PixelFormat::U8).unwrap();
        let mut dst = FrameDescriptor::from_slice(&dst_buf, 2, 2, 8, PixelFormat::U8).unwrap();
        copy_frame(&src, &mut dst);
        assert!(dst_buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_packed_rows_skip_padding() {
        let mut buf: Vec<u8> = (0..20).collect();
        let frame = FrameDescriptor::from_slice(&buf, 2, 2, 10, PixelFormat::U8).unwrap();
        let packed = frame.read_packed_rows().unwrap();
        assert_eq!(packed.len(), 16);
        assert_eq!(&packed[8..16], &[10, 11, 12, 13, 14, 15, 16, 17]);

        let mut frame =
            FrameDescriptor::from_mut_slice(&mut buf, 2, 2, 10, PixelFormat::U8).unwrap();
        assert!(frame.write_packed_rows(&[9u8; 16]));
        assert!(!frame.write_packed_rows(&[9u8; 15]));
        assert_eq!(&buf[8..10], &[8, 9]);
        assert_eq!(&buf[18..20], &[18, 19]);
    }

    #[test]
    fn test_format_bytes_per_pixel_round_trip() {
        for format in PixelFormat::ALL {
            assert_eq!(PixelFormat::from_bytes_per_pixel(format.bytes_per_pixel()), Some(format));
        }
        assert_eq!(PixelFormat::from_bytes_per_pixel(3), None);
    }
}
