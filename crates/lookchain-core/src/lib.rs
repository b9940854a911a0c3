//! Lookchain Core — CPU reference kernel for chained 3D LUT looks.
//!
//! This crate contains pixel codecs, trilinear LUT sampling, layer
//! resolution, compositing, and the full-frame CPU processor. No GPU
//! dependencies: the dispatch layer in `lookchain-gpu` builds on top of it.

pub mod codec;
pub mod compositor;
pub mod error;
pub mod frame;
pub mod layers;
pub mod lut;
pub mod processor;

// Re-exports for convenience.
pub use codec::Rgb;
pub use error::{FrameError, LutError};
pub use frame::{FrameDescriptor, PixelFormat, copy_frame};
pub use layers::{
    ActiveLayer, ActiveLayers, LayerCategory, LayerParams, MAX_LAYERS, ParamsSnapshot, Tolerance,
};
pub use lut::registry::LutRegistry;
pub use lut::table::Lut3D;
pub use processor::{FrameProcessor, ProcessOutcome};
