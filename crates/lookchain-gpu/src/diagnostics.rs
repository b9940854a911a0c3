//! Fallback counters and rate-limited reporting.
//!
//! Counters always advance; the `enabled` flag gates logging only, so turning
//! diagnostics off never changes which path renders a frame. Every counter is
//! a lock-free atomic because render calls arrive on arbitrary host threads.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use lookchain_core::ParamsSnapshot;
use serde::Serialize;

/// Detail lines logged per reason after its first occurrence.
pub const DETAIL_LOG_LIMIT: u64 = 8;

/// First total at which a summary is logged; later summaries at each
/// power of two.
pub const SUMMARY_THRESHOLD: u64 = 64;

/// Frames whose parameters are traced when diagnostics are enabled.
pub const PARAM_TRACE_FRAMES: u64 = 120;

/// Why a frame did not render on a GPU path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    ForceCpuEnv,
    ForceCpuParam,
    DisableNativeEnv,
    DisableNativeParam,
    NativeBackendUnavailable,
    NativeQueueMissing,
    NativeBufferMissing,
    NativeGeometryInvalid,
    NativeDispatchFailed,
    FrameUnsupported,
    InternalBackendUnavailable,
    UnsupportedCombination,
    InternalDispatchFailed,
}

impl FallbackReason {
    pub const COUNT: usize = 13;

    pub const ALL: [Self; Self::COUNT] = [
        Self::ForceCpuEnv,
        Self::ForceCpuParam,
        Self::DisableNativeEnv,
        Self::DisableNativeParam,
        Self::NativeBackendUnavailable,
        Self::NativeQueueMissing,
        Self::NativeBufferMissing,
        Self::NativeGeometryInvalid,
        Self::NativeDispatchFailed,
        Self::FrameUnsupported,
        Self::InternalBackendUnavailable,
        Self::UnsupportedCombination,
        Self::InternalDispatchFailed,
    ];

    fn index(self) -> usize {
        self as usize
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::ForceCpuEnv => "force_cpu_env",
            Self::ForceCpuParam => "force_cpu_param",
            Self::DisableNativeEnv => "disable_native_env",
            Self::DisableNativeParam => "disable_native_param",
            Self::NativeBackendUnavailable => "native_backend_unavailable",
            Self::NativeQueueMissing => "native_queue_missing",
            Self::NativeBufferMissing => "native_buffer_missing",
            Self::NativeGeometryInvalid => "native_geometry_invalid",
            Self::NativeDispatchFailed => "native_dispatch_failed",
            Self::FrameUnsupported => "frame_unsupported",
            Self::InternalBackendUnavailable => "internal_backend_unavailable",
            Self::UnsupportedCombination => "unsupported_combination",
            Self::InternalDispatchFailed => "internal_dispatch_failed",
        }
    }
}

/// Counter set handed to a dispatcher. Tests create a fresh one per case.
#[derive(Debug, Default)]
pub struct Diagnostics {
    enabled: bool,
    counts: [AtomicU64; FallbackReason::COUNT],
    total: AtomicU64,
    traced_frames: AtomicU64,
    parity_frames: AtomicU32,
    /// Bit pattern of a non-negative `f32`; ordered like the float.
    max_parity_delta: AtomicU32,
}

impl Diagnostics {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Count one fallback and maybe log it.
    pub fn record(&self, reason: FallbackReason, detail: &str) {
        let count = self.counts[reason.index()].fetch_add(1, Ordering::Relaxed) + 1;
        let total = self.total.fetch_add(1, Ordering::Relaxed) + 1;
        if !self.enabled {
            return;
        }

        if count == 1 {
            tracing::warn!(reason = reason.label(), detail, "GPU path declined, rendering on CPU");
        } else if count <= 1 + DETAIL_LOG_LIMIT {
            tracing::debug!(reason = reason.label(), count, detail, "CPU fallback");
        }

        if total >= SUMMARY_THRESHOLD && total.is_power_of_two() {
            tracing::info!(total, breakdown = %self.breakdown(), "CPU fallback summary");
        }
    }

    pub fn count(&self, reason: FallbackReason) -> u64 {
        self.counts[reason.index()].load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Trace the parameters of the first [`PARAM_TRACE_FRAMES`] frames.
    pub fn trace_params(&self, params: &ParamsSnapshot) {
        if !self.enabled || self.traced_frames.load(Ordering::Relaxed) >= PARAM_TRACE_FRAMES {
            return;
        }
        let frame = self.traced_frames.fetch_add(1, Ordering::Relaxed);
        if frame >= PARAM_TRACE_FRAMES {
            return;
        }
        let p = params;
        tracing::debug!(
            frame,
            log = ?(p.log.enabled, p.log.lut_index, p.log.intensity),
            creative = ?(p.creative.enabled, p.creative.lut_index, p.creative.intensity),
            secondary = ?(p.secondary.enabled, p.secondary.lut_index, p.secondary.intensity),
            accent = ?(p.accent.enabled, p.accent.lut_index, p.accent.intensity),
            "layer params"
        );
    }

    /// Take one of `limit` parity-check slots. Returns `false` once all are used.
    pub fn claim_parity_frame(&self, limit: u32) -> bool {
        self.parity_frames
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| (n < limit).then_some(n + 1))
            .is_ok()
    }

    /// Fold one frame's maximum channel difference into the running maximum.
    pub fn record_parity(&self, delta: f32) {
        let delta = if delta.is_nan() { f32::INFINITY } else { delta.abs() };
        let previous = self.max_parity_delta.fetch_max(delta.to_bits(), Ordering::Relaxed);
        if self.enabled {
            tracing::info!(
                delta,
                max = f32::from_bits(previous).max(delta),
                "GPU/CPU parity"
            );
        }
    }

    /// Largest parity difference seen so far.
    pub fn max_parity_delta(&self) -> f32 {
        f32::from_bits(self.max_parity_delta.load(Ordering::Relaxed))
    }

    pub fn parity_frames_checked(&self) -> u32 {
        self.parity_frames.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            total: self.total(),
            reasons: FallbackReason::ALL
                .into_iter()
                .map(|reason| (reason, self.count(reason)))
                .filter(|&(_, n)| n > 0)
                .map(|(reason, count)| ReasonCount { reason, count })
                .collect(),
            parity_frames_checked: self.parity_frames_checked(),
            max_parity_delta: self.max_parity_delta(),
        }
    }

    fn breakdown(&self) -> String {
        let mut out = String::new();
        for entry in self.snapshot().reasons {
            if !out.is_empty() {
                out.push_str(", ");
            }
            let _ = write!(out, "{}={}", entry.reason.label(), entry.count);
        }
        out
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticsSnapshot {
    pub total: u64,
    /// Non-zero reasons only.
    pub reasons: Vec<ReasonCount>,
    pub parity_frames_checked: u32,
    pub max_parity_delta: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReasonCount {
    pub reason: FallbackReason,
    pub count: u64,
}
