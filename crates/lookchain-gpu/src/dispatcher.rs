//! Per-frame backend selection with guaranteed CPU fallback.
//!
//! Evaluation order, first match wins:
//!
//! 1. Forced CPU (policy, then debug parameter).
//! 2. Native path, when the host offered one: disabled? backend enabled?
//!    queue, buffers, geometry present? dispatch succeeded?
//! 3. Internal path: frames usable? any layers? backend present and
//!    capable? dispatch succeeded?
//! 4. CPU. Always reachable, always leaves `dst` fully defined.
//!
//! Every step that declines a GPU path records a [`FallbackReason`]; none of
//! them surfaces an error to the caller.

use std::sync::Arc;

use lookchain_core::codec::decode_rgb;
use lookchain_core::processor::color_path_ready;
use lookchain_core::{
    ActiveLayers, FrameDescriptor, FrameProcessor, LutRegistry, ParamsSnapshot, Tolerance,
};

use crate::backend::{GpuBackend, NativeBackend, NativeBackendKind, NativeRenderContext};
use crate::descriptor::GpuDispatchDescriptor;
use crate::diagnostics::{Diagnostics, FallbackReason};
use crate::policy::{DebugOverrides, RenderPolicy};

/// Which path produced the destination frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPath {
    Native(NativeBackendKind),
    InternalGpu,
    Cpu,
}

/// Everything the host supplies for one render call besides the frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderRequest {
    pub params: ParamsSnapshot,
    pub debug: DebugOverrides,
    /// Present when the host renders on its own GPU queue.
    pub native: Option<NativeRenderContext>,
}

impl RenderRequest {
    pub fn new(params: ParamsSnapshot) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    pub fn with_debug(mut self, debug: DebugOverrides) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_native(mut self, native: NativeRenderContext) -> Self {
        self.native = Some(native);
        self
    }
}

/// Chooses CPU, internal GPU, or native GPU for each frame.
///
/// Holds only shared, read-only state plus the atomic diagnostics, so one
/// dispatcher can serve concurrent render calls.
pub struct BackendDispatcher {
    registry: Arc<LutRegistry>,
    policy: RenderPolicy,
    tolerance: Tolerance,
    diagnostics: Arc<Diagnostics>,
    internal: Option<Box<dyn GpuBackend>>,
    native: Vec<Box<dyn NativeBackend>>,
}

impl BackendDispatcher {
    /// CPU-only dispatcher; attach backends with the `with_*` builders.
    pub fn new(registry: Arc<LutRegistry>, policy: RenderPolicy) -> Self {
        Self {
            registry,
            policy,
            tolerance: Tolerance::default(),
            diagnostics: Arc::new(Diagnostics::new(policy.diagnostics_enabled)),
            internal: None,
            native: Vec::new(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_tolerance(mut self, tolerance: Tolerance) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_internal_backend(mut self, backend: Box<dyn GpuBackend>) -> Self {
        tracing::info!(backend = backend.name(), "internal GPU backend attached");
        self.internal = Some(backend);
        self
    }

    pub fn with_native_backend(mut self, backend: Box<dyn NativeBackend>) -> Self {
        tracing::info!(backend = %backend.kind(), "native GPU backend attached");
        self.native.push(backend);
        self
    }

    pub fn registry(&self) -> &LutRegistry {
        &self.registry
    }

    pub fn policy(&self) -> &RenderPolicy {
        &self.policy
    }

    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }

    pub fn has_internal_backend(&self) -> bool {
        self.internal.is_some()
    }

    /// CPU processor sharing this dispatcher's registry and tolerance.
    pub fn processor(&self) -> FrameProcessor<'_> {
        FrameProcessor::with_tolerance(&self.registry, self.tolerance)
    }

    /// Render one frame. Exactly one path fully produces `dst`.
    pub fn render(
        &self,
        request: &RenderRequest,
        src: &FrameDescriptor<'_>,
        dst: &mut FrameDescriptor<'_>,
    ) -> RenderPath {
        self.diagnostics.trace_params(&request.params);
        let processor = self.processor();
        let layers = processor.resolve(&request.params);

        if let Some(reason) = self.forced_cpu(request.debug) {
            return self.fall_back(reason, "", &processor, &layers, src, dst);
        }

        if let Some(native) = &request.native {
            return match self.try_native(request, native) {
                Ok(kind) => RenderPath::Native(kind),
                Err((reason, detail)) => {
                    self.fall_back(reason, detail, &processor, &layers, src, dst)
                }
            };
        }

        self.render_internal(&processor, &layers, src, dst)
    }

    fn forced_cpu(&self, debug: DebugOverrides) -> Option<FallbackReason> {
        if self.policy.force_cpu {
            Some(FallbackReason::ForceCpuEnv)
        } else if debug.force_cpu {
            Some(FallbackReason::ForceCpuParam)
        } else {
            None
        }
    }

    fn try_native(
        &self,
        request: &RenderRequest,
        ctx: &NativeRenderContext,
    ) -> Result<NativeBackendKind, (FallbackReason, &'static str)> {
        if self.policy.disable_native {
            return Err((FallbackReason::DisableNativeEnv, ""));
        }
        if request.debug.disable_native {
            return Err((FallbackReason::DisableNativeParam, ""));
        }
        let backend = ctx
            .select(&self.native)
            .ok_or((FallbackReason::NativeBackendUnavailable, "no enabled native backend"))?;
        let kind = backend.kind();
        let queue = ctx
            .queue
            .ok_or((FallbackReason::NativeQueueMissing, kind.label()))?;
        let (Some(src), Some(dst)) = (ctx.src, ctx.dst) else {
            return Err((FallbackReason::NativeBufferMissing, kind.label()));
        };
        if !ctx.geometry_valid() {
            return Err((FallbackReason::NativeGeometryInvalid, kind.label()));
        }
        if backend.try_dispatch_native(&request.params, src, dst, queue, ctx.width, ctx.height) {
            Ok(kind)
        } else {
            Err((FallbackReason::NativeDispatchFailed, kind.label()))
        }
    }

    fn render_internal(
        &self,
        processor: &FrameProcessor<'_>,
        layers: &ActiveLayers<'_>,
        src: &FrameDescriptor<'_>,
        dst: &mut FrameDescriptor<'_>,
    ) -> RenderPath {
        if !color_path_ready(src, dst) {
            let reason = FallbackReason::FrameUnsupported;
            return self.fall_back(reason, "", processor, layers, src, dst);
        }
        if layers.is_empty() {
            processor.process_layers(layers, src, dst);
            return RenderPath::Cpu;
        }
        let Some(backend) = &self.internal else {
            let reason = FallbackReason::InternalBackendUnavailable;
            return self.fall_back(reason, "", processor, layers, src, dst);
        };
        if !backend.supports(src.format(), layers.len()) {
            let detail = if self.diagnostics.is_enabled() {
                format!("{} with {} layer(s) on {}", src.format(), layers.len(), backend.name())
            } else {
                String::new()
            };
            let reason = FallbackReason::UnsupportedCombination;
            return self.fall_back(reason, &detail, processor, layers, src, dst);
        }
        let Some(descriptor) = GpuDispatchDescriptor::new(layers, src) else {
            let reason = FallbackReason::FrameUnsupported;
            return self.fall_back(reason, "", processor, layers, src, dst);
        };

        // In place, the source is gone once the GPU writes, so there is
        // nothing left to compare against.
        let check_parity = self.policy.parity_frames > 0 && !src.aliases(dst);

        if !backend.try_dispatch(&descriptor, src, dst) {
            let reason = FallbackReason::InternalDispatchFailed;
            return self.fall_back(reason, backend.name(), processor, layers, src, dst);
        }

        if check_parity && self.diagnostics.claim_parity_frame(self.policy.parity_frames) {
            self.parity_check(processor, layers, src, dst);
        }
        RenderPath::InternalGpu
    }

    fn fall_back(
        &self,
        reason: FallbackReason,
        detail: &str,
        processor: &FrameProcessor<'_>,
        layers: &ActiveLayers<'_>,
        src: &FrameDescriptor<'_>,
        dst: &mut FrameDescriptor<'_>,
    ) -> RenderPath {
        self.diagnostics.record(reason, detail);
        processor.process_layers(layers, src, dst);
        RenderPath::Cpu
    }

    /// Re-render on the CPU into scratch memory and record the largest
    /// per-channel difference. `dst` is only read.
    fn parity_check(
        &self,
        processor: &FrameProcessor<'_>,
        layers: &ActiveLayers<'_>,
        src: &FrameDescriptor<'_>,
        dst: &FrameDescriptor<'_>,
    ) {
        let Some(gpu) = dst.read_packed_rows() else {
            return;
        };
        let mut scratch = vec![0u8; gpu.len()];
        let row_bytes = src.tight_row_bytes() as i32;
        let Ok(mut cpu_frame) = FrameDescriptor::from_mut_slice(
            &mut scratch,
            src.width(),
            src.height(),
            row_bytes,
            src.format(),
        ) else {
            return;
        };
        processor.process_layers(layers, src, &mut cpu_frame);

        let bpp = src.format().bytes_per_pixel();
        let delta = gpu
            .chunks_exact(bpp)
            .zip(scratch.chunks_exact(bpp))
            .map(|(g, c)| {
                let (g, c) = (decode_rgb(src.format(), g), decode_rgb(src.format(), c));
                (0..3).map(|i| (g[i] - c[i]).abs()).fold(0.0_f32, f32::max)
            })
            .fold(0.0_f32, f32::max);
        self.diagnostics.record_parity(delta);
    }
}
