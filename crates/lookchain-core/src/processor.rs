//! Full-frame CPU processor.
//!
//! Drives decode → composite → encode over every pixel, monomorphized per
//! pixel format. This is the reference path every accelerated backend must
//! reproduce, and the fallback each of them lands on.
#![allow(unsafe_code)]
// Pixels are moved with unaligned raw reads/writes so src and dst may be
// the same memory (in-place rendering) without creating aliasing references.

use std::ptr;

use crate::codec::{F32Codec, PixelCodec, U8Codec, U16Codec};
use crate::compositor::composite;
use crate::frame::{FrameDescriptor, PixelFormat, copy_frame};
use crate::layers::{ActiveLayers, ParamsSnapshot, Tolerance};
use crate::lut::registry::LutRegistry;

/// What [`FrameProcessor::process`] did to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Frames were invalid, unsupported, or mismatched: raw byte copy.
    RawCopy,
    /// No active layers: raw byte copy.
    PassThrough,
    /// Color path ran with this many layers.
    Graded { layers: usize },
}

/// CPU renderer bound to a LUT registry.
#[derive(Debug, Clone, Copy)]
pub struct FrameProcessor<'r> {
    registry: &'r LutRegistry,
    tolerance: Tolerance,
}

impl<'r> FrameProcessor<'r> {
    pub fn new(registry: &'r LutRegistry) -> Self {
        Self::with_tolerance(registry, Tolerance::default())
    }

    pub fn with_tolerance(registry: &'r LutRegistry, tolerance: Tolerance) -> Self {
        Self {
            registry,
            tolerance,
        }
    }

    pub fn registry(&self) -> &'r LutRegistry {
        self.registry
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    /// Resolve this frame's layers against the bound registry.
    pub fn resolve(&self, params: &ParamsSnapshot) -> ActiveLayers<'r> {
        ActiveLayers::resolve_with(params, self.registry, self.tolerance)
    }

    /// Render `src` into `dst`. Always leaves `dst` fully defined over the
    /// region it shares with `src`.
    pub fn process(
        &self,
        params: &ParamsSnapshot,
        src: &FrameDescriptor<'_>,
        dst: &mut FrameDescriptor<'_>,
    ) -> ProcessOutcome {
        if !color_path_ready(src, dst) {
            tracing::debug!(
                src_w = src.width(),
                src_h = src.height(),
                dst_w = dst.width(),
                dst_h = dst.height(),
                "frames not color-processable, raw copy"
            );
            copy_frame(src, dst);
            return ProcessOutcome::RawCopy;
        }

        let layers = self.resolve(params);
        self.process_layers(&layers, src, dst)
    }

    /// Render with already-resolved layers. Used by the dispatcher so the
    /// CPU fallback sees exactly the layers the GPU attempt saw.
    pub fn process_layers(
        &self,
        layers: &ActiveLayers<'_>,
        src: &FrameDescriptor<'_>,
        dst: &mut FrameDescriptor<'_>,
    ) -> ProcessOutcome {
        if !color_path_ready(src, dst) {
            copy_frame(src, dst);
            return ProcessOutcome::RawCopy;
        }
        if layers.is_empty() {
            copy_frame(src, dst);
            return ProcessOutcome::PassThrough;
        }

        match src.format() {
            PixelFormat::U8 => process_typed::<U8Codec>(layers, src, dst),
            PixelFormat::U16 => process_typed::<U16Codec>(layers, src, dst),
            PixelFormat::F32 => process_typed::<F32Codec>(layers, src, dst),
        }
        ProcessOutcome::Graded {
            layers: layers.len(),
        }
    }

    /// Render a frame onto itself.
    pub fn process_in_place(
        &self,
        params: &ParamsSnapshot,
        frame: &mut FrameDescriptor<'_>,
    ) -> ProcessOutcome {
        // SAFETY: the alias shares the frame's pointer and geometry and lives
        // only for this call; all pixel traffic goes through raw pointers.
        let src = unsafe {
            FrameDescriptor::from_raw_parts(
                frame.data_ptr(),
                frame.width(),
                frame.height(),
                frame.row_bytes(),
                frame.format(),
            )
        };
        self.process(params, &src, frame)
    }
}

/// Both frames supported, geometry-compatible, and `dst` writable.
pub fn color_path_ready(src: &FrameDescriptor<'_>, dst: &FrameDescriptor<'_>) -> bool {
    src.is_supported() && dst.is_supported() && dst.is_writable() && src.same_geometry(dst)
}

fn process_typed<C: PixelCodec>(
    layers: &ActiveLayers<'_>,
    src: &FrameDescriptor<'_>,
    dst: &mut FrameDescriptor<'_>,
) {
    let width = src.width() as usize;
    let height = src.height() as usize;
    let bpp = src.format().bytes_per_pixel();

    for y in 0..height {
        // SAFETY: both frames are supported with equal geometry, so row `y`
        // exists in each and holds `width * bpp` bytes.
        let (src_row, dst_row) = unsafe { (src.row_ptr(y), dst.row_ptr(y)) };
        for x in 0..width {
            // SAFETY: offsets stay within the row. The whole pixel is read
            // before anything is written, so in-place frames are fine.
            unsafe {
                let px = ptr::read_unaligned(src_row.add(x * bpp).cast::<[C::Channel; 4]>());
                let (rgb, alpha) = C::decode(px);
                let out = C::encode(composite(rgb, layers), alpha);
                ptr::write_unaligned(dst_row.add(x * bpp).cast::<[C::Channel; 4]>(), out);
            }
        }
    }
}
