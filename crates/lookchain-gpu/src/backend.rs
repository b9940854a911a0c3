//! Backend contracts.
//!
//! Two kinds of accelerator plug into the dispatcher:
//!
//! - [`GpuBackend`]: the internal path. Capability-queried, fed a
//!   [`GpuDispatchDescriptor`] plus host frames.
//! - [`NativeBackend`]: a host-driven path (Metal, OpenCL, CUDA) that runs on
//!   the host's own command queue and buffers.
//!
//! Both return only success or failure. On failure the destination must be
//! treated as unwritten.

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

use lookchain_core::{FrameDescriptor, ParamsSnapshot, PixelFormat};

use crate::descriptor::GpuDispatchDescriptor;

/// Internal GPU acceleration, selected at runtime by capability.
pub trait GpuBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Whether this backend can render `format` with `layer_count` layers.
    fn supports(&self, format: PixelFormat, layer_count: usize) -> bool;

    /// Render the job into `dst`, honoring each frame's own row stride.
    ///
    /// Returns `false` on any failure. The caller then re-renders `dst` on
    /// the CPU; for in-place frames that re-reads `src`, so a failing
    /// backend must leave `dst` untouched.
    fn try_dispatch(
        &self,
        descriptor: &GpuDispatchDescriptor<'_>,
        src: &FrameDescriptor<'_>,
        dst: &mut FrameDescriptor<'_>,
    ) -> bool;
}

/// Host GPU APIs, in selection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeBackendKind {
    Metal,
    OpenCl,
    Cuda,
}

impl NativeBackendKind {
    /// Highest priority first.
    pub const PRIORITY: [Self; 3] = [Self::Metal, Self::OpenCl, Self::Cuda];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Metal => "metal",
            Self::OpenCl => "opencl",
            Self::Cuda => "cuda",
        }
    }
}

impl fmt::Display for NativeBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Opaque host command queue or stream handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeQueue(NonNull<c_void>);

impl NativeQueue {
    /// `None` for a null handle.
    pub fn new(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// Opaque host GPU buffer handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeBuffer(NonNull<c_void>);

impl NativeBuffer {
    /// `None` for a null handle.
    pub fn new(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr).map(Self)
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0.as_ptr()
    }
}

/// Host GPU rendering on a host-supplied queue.
pub trait NativeBackend: Send + Sync {
    fn kind(&self) -> NativeBackendKind;

    /// Run the full layer chain on the host's buffers.
    ///
    /// Returns `false` on any failure; no byte of `dst` may be assumed
    /// written in that case.
    fn try_dispatch_native(
        &self,
        params: &ParamsSnapshot,
        src: NativeBuffer,
        dst: NativeBuffer,
        queue: NativeQueue,
        width: i32,
        height: i32,
    ) -> bool;
}

/// What the host offers for native rendering on one render call.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRenderContext {
    pub metal_enabled: bool,
    pub opencl_enabled: bool,
    pub cuda_enabled: bool,
    pub queue: Option<NativeQueue>,
    pub src: Option<NativeBuffer>,
    pub dst: Option<NativeBuffer>,
    pub width: i32,
    pub height: i32,
}

impl NativeRenderContext {
    pub fn is_enabled(&self, kind: NativeBackendKind) -> bool {
        match kind {
            NativeBackendKind::Metal => self.metal_enabled,
            NativeBackendKind::OpenCl => self.opencl_enabled,
            NativeBackendKind::Cuda => self.cuda_enabled,
        }
    }

    /// Highest-priority backend that the host enabled for this call.
    pub fn select<'b>(
        &self,
        backends: &'b [Box<dyn NativeBackend>],
    ) -> Option<&'b dyn NativeBackend> {
        NativeBackendKind::PRIORITY
            .into_iter()
            .filter(|&kind| self.is_enabled(kind))
            .find_map(|kind| backends.iter().find(|b| b.kind() == kind))
            .map(|b| &**b)
    }

    pub fn geometry_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}
