//! Pixel codecs: packed A,R,G,B storage to and from normalized RGB.
//!
//! Each format is a zero-sized [`PixelCodec`] implementation so the frame
//! loop can be monomorphized per format while sharing one driver.
//!
//! | Format | Decode        | Encode range   |
//! |--------|---------------|----------------|
//! | `8u`   | `v / 255`     | `[0, 255]`     |
//! | `16u`  | `v / 32768`   | `[0, 32768]`   |
//! | `32f`  | `v`           | `[0, 1]`       |
//!
//! The 16-bit divisor is 32768, not 65535: hosts reserve one bit of headroom
//! above full white. Changing it changes every 16-bit output value.

use bytemuck::Pod;

use crate::frame::PixelFormat;

/// Normalized RGB triple.
pub type Rgb = [f32; 3];

/// Full white for 8-bit channels.
pub const U8_WHITE: f32 = 255.0;

/// Full white for 16-bit channels.
pub const U16_WHITE: f32 = 32768.0;

/// Conversion between one packed pixel and normalized float color.
///
/// Alpha is carried through untouched; it never enters the color path.
pub trait PixelCodec {
    /// Storage type of a single channel.
    type Channel: Pod;

    /// Split a packed `[A, R, G, B]` pixel into normalized RGB and raw alpha.
    fn decode(pixel: [Self::Channel; 4]) -> (Rgb, Self::Channel);

    /// Quantize normalized RGB back to storage, re-attaching `alpha`.
    fn encode(rgb: Rgb, alpha: Self::Channel) -> [Self::Channel; 4];
}

/// 8-bit unsigned codec.
pub struct U8Codec;

/// 16-bit unsigned codec (full white = 32768).
pub struct U16Codec;

/// 32-bit float codec.
pub struct F32Codec;

impl PixelCodec for U8Codec {
    type Channel = u8;

    #[inline]
    fn decode(pixel: [u8; 4]) -> (Rgb, u8) {
        let [a, r, g, b] = pixel;
        (
            [r as f32 / U8_WHITE, g as f32 / U8_WHITE, b as f32 / U8_WHITE],
            a,
        )
    }

    #[inline]
    fn encode(rgb: Rgb, alpha: u8) -> [u8; 4] {
        [
            alpha,
            quantize(rgb[0], U8_WHITE) as u8,
            quantize(rgb[1], U8_WHITE) as u8,
            quantize(rgb[2], U8_WHITE) as u8,
        ]
    }
}

impl PixelCodec for U16Codec {
    type Channel = u16;

    #[inline]
    fn decode(pixel: [u16; 4]) -> (Rgb, u16) {
        let [a, r, g, b] = pixel;
        (
            [r as f32 / U16_WHITE, g as f32 / U16_WHITE, b as f32 / U16_WHITE],
            a,
        )
    }

    #[inline]
    fn encode(rgb: Rgb, alpha: u16) -> [u16; 4] {
        [
            alpha,
            quantize(rgb[0], U16_WHITE) as u16,
            quantize(rgb[1], U16_WHITE) as u16,
            quantize(rgb[2], U16_WHITE) as u16,
        ]
    }
}

impl PixelCodec for F32Codec {
    type Channel = f32;

    #[inline]
    fn decode(pixel: [f32; 4]) -> (Rgb, f32) {
        let [a, r, g, b] = pixel;
        ([r, g, b], a)
    }

    #[inline]
    fn encode(rgb: Rgb, alpha: f32) -> [f32; 4] {
        [alpha, clamp01(rgb[0]), clamp01(rgb[1]), clamp01(rgb[2])]
    }
}

/// Decode the color of one packed pixel of any format.
///
/// `bytes` must hold at least one pixel; used by comparison tooling, not by
/// the per-format frame loop.
pub fn decode_rgb(format: PixelFormat, bytes: &[u8]) -> Rgb {
    let bytes = &bytes[..format.bytes_per_pixel()];
    match format {
        PixelFormat::U8 => U8Codec::decode(bytemuck::pod_read_unaligned(bytes)).0,
        PixelFormat::U16 => U16Codec::decode(bytemuck::pod_read_unaligned(bytes)).0,
        PixelFormat::F32 => F32Codec::decode(bytemuck::pod_read_unaligned(bytes)).0,
    }
}

#[inline]
pub(crate) fn clamp01(v: f32) -> f32 {
    // Written out so NaN maps to 0 rather than propagating.
    if v > 0.0 {
        if v > 1.0 { 1.0 } else { v }
    } else {
        0.0
    }
}

/// Round half up and clamp to `[0, white]`; the result is integral.
#[inline]
fn quantize(v: f32, white: f32) -> f32 {
    (clamp01(v) * white + 0.5).min(white).trunc()
}
