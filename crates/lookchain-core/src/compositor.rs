//! Applies resolved layers to a single color.

use crate::codec::Rgb;
use crate::layers::{ActiveLayer, ActiveLayers};
use crate::lut::table::lerp_rgb;

/// Apply every active layer in resolution order.
///
/// ```text
/// for layer in layers:
///     sampled = layer.lut.sample(color)
///     color   = intensity ≥ full ? sampled : lerp(color, sampled, intensity)
/// ```
///
/// Pure function of `(color, layers)`.
#[inline]
pub fn composite(color: Rgb, layers: &ActiveLayers<'_>) -> Rgb {
    let full = layers.tolerance().full_intensity;
    layers
        .iter()
        .fold(color, |color, layer| apply_layer(color, layer, full))
}

/// Blend one layer's LUT output with `color` by the layer intensity.
///
/// Intensities at or above `full_intensity` skip the blend; since
/// `lerp(c, s, 1) == s` the shortcut only differs by float rounding.
#[inline]
pub fn apply_layer(color: Rgb, layer: &ActiveLayer<'_>, full_intensity: f32) -> Rgb {
    let sampled = layer.lut.sample(color);
    if layer.intensity >= full_intensity {
        sampled
    } else {
        lerp_rgb(color, sampled, layer.intensity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{LayerCategory, LayerParams, ParamsSnapshot, Tolerance};
    use crate::lut::registry::{LutRegistry, NamedLut};
    use crate::lut::table::Lut3D;

    const EPSILON: f32 = 1e-6;

    /// Display set: [inverting table, half-gain table].
    fn registry() -> LutRegistry {
        let invert = {
            let id = Lut3D::identity(3).unwrap();
            Lut3D::new(id.data().iter().map(|v| 1.0 - v).collect(), 3).unwrap()
        };
        let half = {
            let id = Lut3D::identity(3).unwrap();
            Lut3D::new(id.data().iter().map(|v| v * 0.5).collect(), 3).unwrap()
        };
        LutRegistry::new(
            vec![NamedLut::new("invert", invert.clone())],
            vec![NamedLut::new("invert", invert), NamedLut::new("half", half)],
        )
    }

    fn assert_close(a: Rgb, b: Rgb) {
        for c in 0..3 {
            assert!((a[c] - b[c]).abs() < EPSILON, "channel {c}: {:.7} vs {:.7}", a[c], b[c]);
        }
    }

    #[test]
    fn test_no_layers_is_identity() {
        let registry = registry();
        let layers = ActiveLayers::resolve(&ParamsSnapshot::default(), &registry);
        assert_eq!(composite([0.2, 0.4, 0.6], &layers), [0.2, 0.4, 0.6]);
    }

    #[test]
    fn test_full_intensity_equals_sample() {
        let registry = registry();
        let params = ParamsSnapshot::default()
            .with_layer(LayerCategory::Creative, LayerParams::new(1, 1.0));
        let layers = ActiveLayers::resolve(&params, &registry);
        let color = [0.3, 0.7, 0.9];
        let expected = registry.display_table(1).unwrap().sample(color);
        assert_eq!(composite(color, &layers), expected);
    }

    #[test]
    fn test_full_shortcut_matches_plain_lerp() {
        let registry = registry();
        let params = ParamsSnapshot::default()
            .with_layer(LayerCategory::Creative, LayerParams::new(0, 1.0));
        let never_full = Tolerance {
            full_intensity: f32::INFINITY,
            ..Tolerance::default()
        };
        let shortcut = ActiveLayers::resolve(&params, &registry);
        let plain = ActiveLayers::resolve_with(&params, &registry, never_full);
        let color = [0.125, 0.5, 0.875];
        assert_close(composite(color, &shortcut), composite(color, &plain));
    }

    #[test]
    fn test_partial_intensity_blends() {
        let registry = registry();
        let params = ParamsSnapshot::default()
            .with_layer(LayerCategory::Accent, LayerParams::new(0, 0.25));
        let layers = ActiveLayers::resolve(&params, &registry);
        // Inverting 0.2 gives 0.8; a quarter of the way there is 0.35.
        assert_close(composite([0.2, 0.2, 0.2], &layers), [0.35, 0.35, 0.35]);
    }

    #[test]
    fn test_layers_apply_in_order() {
        let registry = registry();
        let params = ParamsSnapshot::default()
            .with_layer(LayerCategory::Log, LayerParams::new(0, 1.0))
            .with_layer(LayerCategory::Creative, LayerParams::new(1, 1.0));
        let layers = ActiveLayers::resolve(&params, &registry);
        // invert then halve: (1 - 0.2) * 0.5; the reverse order would give 0.9.
        assert_close(composite([0.2, 0.2, 0.2], &layers), [0.4, 0.4, 0.4]);
    }
}
