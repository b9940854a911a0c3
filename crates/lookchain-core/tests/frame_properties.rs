//! End-to-end properties of the CPU frame path.

use lookchain_core::codec::{PixelCodec, U8Codec};
use lookchain_core::lut::table::lerp_rgb;
use lookchain_core::{
    FrameDescriptor, FrameProcessor, LayerCategory, LayerParams, LutRegistry, ParamsSnapshot,
    PixelFormat, ProcessOutcome, Tolerance,
};

/// Deterministic 8u test pattern with varied alpha.
fn pattern_u8(width: usize, height: usize, row_bytes: usize) -> Vec<u8> {
    let mut buf = vec![0u8; row_bytes * height];
    for y in 0..height {
        for x in 0..width {
            let o = y * row_bytes + x * 4;
            buf[o] = (x * 13 + y) as u8;
            buf[o + 1] = (x * 31 + y * 7) as u8;
            buf[o + 2] = (x * 5 + y * 29) as u8;
            buf[o + 3] = (x * y * 3 + 11) as u8;
        }
    }
    buf
}

fn render(
    processor: &FrameProcessor<'_>,
    params: &ParamsSnapshot,
    src: &[u8],
    dst: &mut [u8],
    (w, h, src_rb, dst_rb): (i32, i32, i32, i32),
    format: PixelFormat,
) -> ProcessOutcome {
    let src = FrameDescriptor::from_slice(src, w, h, src_rb, format).unwrap();
    let mut dst = FrameDescriptor::from_mut_slice(dst, w, h, dst_rb, format).unwrap();
    processor.process(params, &src, &mut dst)
}

#[test]
fn test_disabled_layers_pass_through_byte_identical() {
    let registry = LutRegistry::builtin();
    let processor = FrameProcessor::new(&registry);
    let disabled = LayerParams {
        enabled: false,
        ..LayerParams::new(1, 1.0)
    };
    let params = ParamsSnapshot {
        log: disabled,
        creative: disabled,
        secondary: disabled,
        accent: disabled,
    };
    let src = pattern_u8(9, 7, 40);
    let mut dst = vec![0u8; src.len()];
    let outcome = render(&processor, &params, &src, &mut dst, (9, 7, 40, 40), PixelFormat::U8);
    assert_eq!(outcome, ProcessOutcome::PassThrough);
    assert_eq!(dst, src);
}

#[test]
fn test_geometry_mismatch_copies_overlap_only() {
    let registry = LutRegistry::builtin();
    let processor = FrameProcessor::new(&registry);
    let params = ParamsSnapshot::default()
        .with_layer(LayerCategory::Creative, LayerParams::new(1, 1.0));

    let src_buf = pattern_u8(100, 100, 400);
    // 50 wide, 80 high, with 8 bytes of row padding and a sentinel tail.
    let (dst_w, dst_h, dst_rb) = (50usize, 80usize, 208usize);
    let mut dst_buf = vec![0xC3u8; dst_rb * dst_h + 64];
    {
        let src = FrameDescriptor::from_slice(&src_buf, 100, 100, 400, PixelFormat::U8).unwrap();
        let mut dst = FrameDescriptor::from_mut_slice(
            &mut dst_buf,
            dst_w as i32,
            dst_h as i32,
            dst_rb as i32,
            PixelFormat::U8,
        )
        .unwrap();
        assert_eq!(processor.process(&params, &src, &mut dst), ProcessOutcome::RawCopy);
    }
    for y in 0..dst_h {
        assert_eq!(
            &dst_buf[y * dst_rb..(y + 1) * dst_rb],
            &src_buf[y * 400..y * 400 + dst_rb],
            "row {y}"
        );
    }
    assert!(dst_buf[dst_rb * dst_h..].iter().all(|&b| b == 0xC3), "tail untouched");
}

#[test]
fn test_two_layers_match_manual_application() {
    let registry = LutRegistry::builtin();
    let processor = FrameProcessor::new(&registry);
    let params = ParamsSnapshot::default()
        .with_layer(LayerCategory::Log, LayerParams::new(0, 0.5))
        .with_layer(LayerCategory::Creative, LayerParams::new(1, 1.0));
    let lut_a = registry.log_table(0).unwrap();
    let lut_b = registry.display_table(1).unwrap();

    let src = pattern_u8(6, 5, 24);
    let mut dst = vec![0u8; src.len()];
    let outcome = render(&processor, &params, &src, &mut dst, (6, 5, 24, 24), PixelFormat::U8);
    assert_eq!(outcome, ProcessOutcome::Graded { layers: 2 });

    for (i, (px_in, px_out)) in src.chunks_exact(4).zip(dst.chunks_exact(4)).enumerate() {
        let (rgb, alpha) = U8Codec::decode([px_in[0], px_in[1], px_in[2], px_in[3]]);
        let after_a = lerp_rgb(rgb, lut_a.sample(rgb), 0.5);
        let after_b = lut_b.sample(after_a);
        let expected = U8Codec::encode(after_b, alpha);
        assert_eq!(px_out, &expected[..], "pixel {i}");
    }
}

#[test]
fn test_full_intensity_writes_raw_sample() {
    let registry = LutRegistry::builtin();
    let processor = FrameProcessor::new(&registry);
    let params = ParamsSnapshot::default()
        .with_layer(LayerCategory::Secondary, LayerParams::new(1, 1.0));
    let lut = registry.display_table(1).unwrap();

    let src = pattern_u8(4, 4, 16);
    let mut dst = vec![0u8; src.len()];
    render(&processor, &params, &src, &mut dst, (4, 4, 16, 16), PixelFormat::U8);

    for (px_in, px_out) in src.chunks_exact(4).zip(dst.chunks_exact(4)) {
        let (rgb, alpha) = U8Codec::decode([px_in[0], px_in[1], px_in[2], px_in[3]]);
        assert_eq!(px_out, &U8Codec::encode(lut.sample(rgb), alpha)[..]);
    }
}

/// A zero-intensity layer forced through the color path must not move any
/// channel in any format.
#[test]
fn test_zero_intensity_round_trips_every_format() {
    let registry = LutRegistry::builtin();
    let include_everything = Tolerance {
        inclusion_epsilon: -1.0,
        ..Tolerance::default()
    };
    let processor = FrameProcessor::with_tolerance(&registry, include_everything);
    let params = ParamsSnapshot::default()
        .with_layer(LayerCategory::Creative, LayerParams::new(1, 0.0));

    let u8_src: Vec<u8> = (0..=255u8).collect();
    let mut u8_dst = vec![0u8; u8_src.len()];
    let geometry = (64, 1, 256, 256);
    let outcome = render(&processor, &params, &u8_src, &mut u8_dst, geometry, PixelFormat::U8);
    assert_eq!(outcome, ProcessOutcome::Graded { layers: 1 });
    assert_eq!(u8_dst, u8_src);

    let u16_px: Vec<u16> = (0..64u32).map(|i| (i * 520).min(32768) as u16).collect();
    let u16_src = bytemuck::cast_slice::<u16, u8>(&u16_px).to_vec();
    let mut u16_dst = vec![0u8; u16_src.len()];
    render(&processor, &params, &u16_src, &mut u16_dst, (16, 1, 128, 128), PixelFormat::U16);
    assert_eq!(u16_dst, u16_src);

    let f32_px: Vec<f32> = (0..32).map(|i| i as f32 / 31.0).collect();
    let f32_src = bytemuck::cast_slice::<f32, u8>(&f32_px).to_vec();
    let mut f32_dst = vec![0u8; f32_src.len()];
    render(&processor, &params, &f32_src, &mut f32_dst, (8, 1, 128, 128), PixelFormat::F32);
    assert_eq!(f32_dst, f32_src);
}

#[test]
fn test_below_epsilon_is_pass_through() {
    let registry = LutRegistry::builtin();
    let processor = FrameProcessor::new(&registry);
    let params = ParamsSnapshot::default()
        .with_layer(LayerCategory::Accent, LayerParams::new(1, 0.00005));
    let src = pattern_u8(3, 3, 12);
    let mut dst = vec![0u8; src.len()];
    let outcome = render(&processor, &params, &src, &mut dst, (3, 3, 12, 12), PixelFormat::U8);
    assert_eq!(outcome, ProcessOutcome::PassThrough);
    assert_eq!(dst, src);
}

#[test]
fn test_strides_may_differ() {
    let registry = LutRegistry::builtin();
    let processor = FrameProcessor::new(&registry);
    let params = ParamsSnapshot::default()
        .with_layer(LayerCategory::Creative, LayerParams::new(1, 0.7));

    let tight_src = pattern_u8(5, 4, 20);
    let mut tight_dst = vec![0u8; tight_src.len()];
    render(&processor, &params, &tight_src, &mut tight_dst, (5, 4, 20, 20), PixelFormat::U8);

    // Same pixels, padded differently on each side.
    let mut padded_src = vec![0xFFu8; 32 * 4];
    for y in 0..4 {
        padded_src[y * 32..y * 32 + 20].copy_from_slice(&tight_src[y * 20..(y + 1) * 20]);
    }
    let mut padded_dst = vec![0x11u8; 24 * 4];
    render(&processor, &params, &padded_src, &mut padded_dst, (5, 4, 32, 24), PixelFormat::U8);

    for y in 0..4 {
        assert_eq!(&padded_dst[y * 24..y * 24 + 20], &tight_dst[y * 20..(y + 1) * 20], "row {y}");
        assert_eq!(&padded_dst[y * 24 + 20..(y + 1) * 24], &[0x11; 4], "row {y} padding");
    }
}

#[test]
fn test_params_serialize_round_trip() {
    let params = ParamsSnapshot::default()
        .with_layer(LayerCategory::Log, LayerParams::new(0, 0.25))
        .with_layer(LayerCategory::Accent, LayerParams::new(3, 1.0));
    let json = serde_json::to_string(&params).unwrap();
    let back: ParamsSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(back, params);
}
