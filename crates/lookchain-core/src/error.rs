//! Construction-time errors. The per-frame render path never returns these.

use thiserror::Error;

/// Errors produced while building or loading a [`Lut3D`](crate::Lut3D).
#[derive(Debug, Error)]
pub enum LutError {
    #[error("LUT dimension {0} is outside the supported range")]
    InvalidDimension(usize),
    #[error("LUT data holds {actual} floats, expected {expected} for the given dimension")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors produced when wrapping a byte slice as a [`FrameDescriptor`](crate::FrameDescriptor).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame geometry {width}x{height} (row bytes {row_bytes}) must be positive")]
    InvalidGeometry {
        width: i32,
        height: i32,
        row_bytes: i32,
    },
    #[error("buffer holds {actual} bytes, frame needs {required}")]
    BufferTooSmall { required: usize, actual: usize },
}
