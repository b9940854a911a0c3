//! Lookchain GPU — backend selection and fail-safe dispatch.
//!
//! The [`BackendDispatcher`] decides per frame whether a host-native GPU
//! backend, the internal wgpu backend, or the CPU reference path produces
//! the output. Any GPU failure degrades silently to the CPU path; the only
//! trace is in [`Diagnostics`].

pub mod backend;
pub mod descriptor;
pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod policy;
pub mod wgpu_backend;

pub use backend::{
    GpuBackend, NativeBackend, NativeBackendKind, NativeBuffer, NativeQueue, NativeRenderContext,
};
pub use descriptor::{GpuDispatchDescriptor, GpuLayer};
pub use diagnostics::{Diagnostics, DiagnosticsSnapshot, FallbackReason};
pub use dispatcher::{BackendDispatcher, RenderPath, RenderRequest};
pub use error::GpuError;
pub use policy::{DebugOverrides, RenderPolicy};
pub use wgpu_backend::WgpuLutBackend;
