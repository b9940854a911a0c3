use lookchain_core::PixelFormat;
use thiserror::Error;

/// Errors raised while setting up or running a GPU backend.
///
/// These never escape a render call: the dispatcher turns them into a
/// failed dispatch and a recorded fallback reason.
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no compatible GPU adapter: {0}")]
    NoAdapter(String),
    #[error("failed to create GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("backend does not support {format} with {layers} layer(s)")]
    Unsupported { format: PixelFormat, layers: usize },
    #[error("frame is not usable for GPU dispatch")]
    Frame,
    #[error("{width}x{height} frame exceeds the device limits")]
    FrameTooLarge { width: u32, height: u32 },
    #[error("GPU validation failed: {0}")]
    Validation(String),
    #[error("readback buffer mapping failed: {0}")]
    Readback(String),
    #[error("device poll failed: {0}")]
    Poll(String),
}
