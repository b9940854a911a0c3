//! Allocation-free job description handed to internal GPU backends.

use lookchain_core::{ActiveLayers, FrameDescriptor, MAX_LAYERS, PixelFormat};

/// One resolved layer as a GPU backend sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuLayer<'a> {
    /// Flat RGB lattice, `dimension³ × 3` floats.
    pub lut_data: &'a [f32],
    pub dimension: u32,
    /// `dimension - 1`.
    pub scale: f32,
    /// Clamped to `[0, 1]`.
    pub intensity: f32,
}

const EMPTY_LAYER: GpuLayer<'static> = GpuLayer {
    lut_data: &[],
    dimension: 0,
    scale: 0.0,
    intensity: 0.0,
};

/// Snapshot of up to four layers plus frame geometry.
///
/// Built on the stack for one dispatch and never retained past it.
#[derive(Debug, Clone, Copy)]
pub struct GpuDispatchDescriptor<'a> {
    layers: [GpuLayer<'a>; MAX_LAYERS],
    layer_count: usize,
    /// Intensities at or above this replace the color outright.
    pub full_intensity: f32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub bytes_per_pixel: u32,
    pub format: PixelFormat,
}

impl<'a> GpuDispatchDescriptor<'a> {
    /// Describe rendering `layers` over a frame shaped like `frame`.
    ///
    /// Returns `None` for a frame that is not supported.
    pub fn new(layers: &ActiveLayers<'a>, frame: &FrameDescriptor<'_>) -> Option<Self> {
        if !frame.is_supported() {
            return None;
        }
        let mut out = Self {
            layers: [EMPTY_LAYER; MAX_LAYERS],
            layer_count: 0,
            full_intensity: layers.tolerance().full_intensity,
            frame_width: frame.width() as u32,
            frame_height: frame.height() as u32,
            bytes_per_pixel: frame.format().bytes_per_pixel() as u32,
            format: frame.format(),
        };
        for layer in layers.iter() {
            out.layers[out.layer_count] = GpuLayer {
                lut_data: layer.lut.data(),
                dimension: layer.lut.dimension() as u32,
                scale: layer.scale,
                intensity: layer.intensity,
            };
            out.layer_count += 1;
        }
        Some(out)
    }

    /// Active layers in application order.
    pub fn layers(&self) -> &[GpuLayer<'a>] {
        &self.layers[..self.layer_count]
    }

    pub fn layer_count(&self) -> usize {
        self.layer_count
    }

    /// Total LUT floats across all layers.
    pub fn lut_float_count(&self) -> usize {
        self.layers().iter().map(|l| l.lut_data.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use lookchain_core::{LayerCategory, LayerParams, LutRegistry, ParamsSnapshot};

    use super::*;

    #[test]
    fn test_descriptor_mirrors_active_layers() {
        let registry = LutRegistry::builtin();
        let params = ParamsSnapshot::default()
            .with_layer(LayerCategory::Log, LayerParams::new(0, 0.5))
            .with_layer(LayerCategory::Accent, LayerParams::new(1, 2.0));
        let layers = ActiveLayers::resolve(&params, &registry);
        let buf = vec![0u8; 3 * 2 * 16];
        let frame = FrameDescriptor::from_slice(&buf, 3, 2, 16, PixelFormat::U8).unwrap();

        let desc = GpuDispatchDescriptor::new(&layers, &frame).unwrap();
        assert_eq!(desc.layer_count(), 2);
        assert_eq!((desc.frame_width, desc.frame_height, desc.bytes_per_pixel), (3, 2, 4));
        assert_eq!(desc.layers()[0].lut_data, registry.log_table(0).unwrap().data());
        assert_eq!(desc.layers()[1].intensity, 1.0);
        assert_eq!(desc.layers()[1].scale, 1.0);
        assert_eq!(desc.lut_float_count(), 48);
    }

    #[test]
    fn test_unsupported_frame_has_no_descriptor() {
        let registry = LutRegistry::builtin();
        let layers = ActiveLayers::resolve(&ParamsSnapshot::default(), &registry);
        let buf = vec![0u8; 16];
        // Row too narrow for 4 pixels.
        let frame = FrameDescriptor::from_slice(&buf, 4, 2, 8, PixelFormat::U8).unwrap();
        assert!(GpuDispatchDescriptor::new(&layers, &frame).is_none());
    }
}
