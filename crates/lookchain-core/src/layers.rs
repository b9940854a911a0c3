//! Per-frame layer parameters and their resolution into active layers.
//!
//! Up to four layers apply in a fixed order: Log → Creative → Secondary →
//! Accent. Resolution happens once per frame and produces a stack-local,
//! allocation-free [`ActiveLayers`] set that borrows the registry tables.

use serde::{Deserialize, Serialize};

use crate::codec::clamp01;
use crate::lut::registry::LutRegistry;
use crate::lut::table::Lut3D;

/// Maximum number of chained layers.
pub const MAX_LAYERS: usize = 4;

/// Fixed layer slots, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerCategory {
    Log,
    Creative,
    Secondary,
    Accent,
}

impl LayerCategory {
    /// Application order.
    pub const ALL: [Self; MAX_LAYERS] = [Self::Log, Self::Creative, Self::Secondary, Self::Accent];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Creative => "creative",
            Self::Secondary => "secondary",
            Self::Accent => "accent",
        }
    }
}

/// Host parameters for one layer, already normalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerParams {
    pub enabled: bool,
    /// Index into the category's table set; `-1` selects nothing.
    pub lut_index: i32,
    /// Blend weight, nominally `[0, 1]` (host sliders are 0–100, scaled by the caller).
    pub intensity: f32,
}

impl LayerParams {
    /// Disabled layer with no table selected.
    pub const NONE: Self = Self {
        enabled: false,
        lut_index: -1,
        intensity: 0.0,
    };

    /// Enabled layer selecting `lut_index` at `intensity`.
    pub const fn new(lut_index: i32, intensity: f32) -> Self {
        Self {
            enabled: true,
            lut_index,
            intensity,
        }
    }
}

impl Default for LayerParams {
    fn default() -> Self {
        Self::NONE
    }
}

/// Parameters for all four layers, supplied fresh each frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamsSnapshot {
    pub log: LayerParams,
    pub creative: LayerParams,
    pub secondary: LayerParams,
    pub accent: LayerParams,
}

impl ParamsSnapshot {
    pub fn layer(&self, category: LayerCategory) -> &LayerParams {
        match category {
            LayerCategory::Log => &self.log,
            LayerCategory::Creative => &self.creative,
            LayerCategory::Secondary => &self.secondary,
            LayerCategory::Accent => &self.accent,
        }
    }

    pub fn layer_mut(&mut self, category: LayerCategory) -> &mut LayerParams {
        match category {
            LayerCategory::Log => &mut self.log,
            LayerCategory::Creative => &mut self.creative,
            LayerCategory::Secondary => &mut self.secondary,
            LayerCategory::Accent => &mut self.accent,
        }
    }

    /// Builder-style setter, handy for hosts and tests.
    pub fn with_layer(mut self, category: LayerCategory, params: LayerParams) -> Self {
        *self.layer_mut(category) = params;
        self
    }
}

/// Thresholds used during resolution and compositing.
///
/// Defaults reproduce host output bit-for-bit; they are tolerances rather
/// than protocol constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Layers at or below this intensity are dropped.
    pub inclusion_epsilon: f32,
    /// Layers at or above this intensity replace the color outright.
    pub full_intensity: f32,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            inclusion_epsilon: 0.0001,
            full_intensity: 0.9999,
        }
    }
}

/// A layer that will be applied this frame.
#[derive(Debug, Clone, Copy)]
pub struct ActiveLayer<'a> {
    pub category: LayerCategory,
    pub lut: &'a Lut3D,
    /// `dimension - 1`, cached for the sampler and GPU descriptors.
    pub scale: f32,
    /// Clamped to `[0, 1]`.
    pub intensity: f32,
}

/// Ordered set of 0–4 active layers.
#[derive(Debug, Clone, Copy)]
pub struct ActiveLayers<'a> {
    slots: [Option<ActiveLayer<'a>>; MAX_LAYERS],
    len: usize,
    tolerance: Tolerance,
}

impl<'a> ActiveLayers<'a> {
    /// Resolve with the default tolerance.
    pub fn resolve(params: &ParamsSnapshot, registry: &'a LutRegistry) -> Self {
        Self::resolve_with(params, registry, Tolerance::default())
    }

    /// A layer is included iff it is enabled, its index selects a table in
    /// its category's set, and its intensity exceeds the inclusion epsilon.
    pub fn resolve_with(
        params: &ParamsSnapshot,
        registry: &'a LutRegistry,
        tolerance: Tolerance,
    ) -> Self {
        let mut out = Self {
            slots: [None; MAX_LAYERS],
            len: 0,
            tolerance,
        };
        for category in LayerCategory::ALL {
            let lp = params.layer(category);
            // Written so a NaN intensity is excluded.
            if !lp.enabled || !(lp.intensity > tolerance.inclusion_epsilon) {
                continue;
            }
            let lut = match category {
                LayerCategory::Log => registry.log_table(lp.lut_index),
                _ => registry.display_table(lp.lut_index),
            };
            let Some(lut) = lut else {
                continue;
            };
            out.slots[out.len] = Some(ActiveLayer {
                category,
                lut,
                scale: lut.scale(),
                intensity: clamp01(lp.intensity),
            });
            out.len += 1;
        }
        out
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    /// Layers in application order.
    pub fn iter(&self) -> impl Iterator<Item = &ActiveLayer<'a>> {
        self.slots[..self.len].iter().flatten()
    }
}
