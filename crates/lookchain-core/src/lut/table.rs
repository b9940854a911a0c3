//! Immutable 3D LUT table and trilinear sampler.

use std::borrow::Cow;

use crate::codec::{Rgb, clamp01};
use crate::error::LutError;

/// Smallest usable grid side. A single-point lattice cannot be interpolated.
pub const MIN_DIMENSION: usize = 2;

/// Lattice coordinates within this fraction of a grid step snap to the
/// lattice point, so exact lattice inputs return stored values exactly.
const LATTICE_SNAP: f32 = 1e-6;

/// A 3D lookup table.
///
/// Data is a flat array of RGB triples ordered `((z * dim + y) * dim + x) * 3`
/// where `x` indexes red, `y` green and `z` blue. Tables are read-only for
/// their whole lifetime; built-in tables borrow `'static` data.
#[derive(Debug, Clone, PartialEq)]
pub struct Lut3D {
    data: Cow<'static, [f32]>,
    dimension: usize,
}

impl Lut3D {
    /// Build a table that owns its data.
    pub fn new(data: Vec<f32>, dimension: usize) -> Result<Self, LutError> {
        validate(data.len(), dimension)?;
        Ok(Self {
            data: Cow::Owned(data),
            dimension,
        })
    }

    /// Wrap embedded table data without copying.
    pub fn from_static(data: &'static [f32], dimension: usize) -> Result<Self, LutError> {
        validate(data.len(), dimension)?;
        Ok(Self {
            data: Cow::Borrowed(data),
            dimension,
        })
    }

    /// A lattice that maps every input to itself.
    pub fn identity(dimension: usize) -> Result<Self, LutError> {
        let len = checked_len(dimension)?;
        let denom = (dimension - 1) as f32;
        let mut data = Vec::with_capacity(len);
        for z in 0..dimension {
            for y in 0..dimension {
                for x in 0..dimension {
                    data.extend_from_slice(&[x as f32 / denom, y as f32 / denom, z as f32 / denom]);
                }
            }
        }
        Self::new(data, dimension)
    }

    /// Grid side length.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Multiplier mapping `[0, 1]` onto `[0, dimension - 1]`.
    pub fn scale(&self) -> f32 {
        (self.dimension - 1) as f32
    }

    /// Raw table data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Stored value at lattice point `(x, y, z)`.
    #[inline]
    pub fn lattice(&self, x: usize, y: usize, z: usize) -> Rgb {
        let idx = ((z * self.dimension + y) * self.dimension + x) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    /// Trilinear lookup. Inputs are clamped to `[0, 1]`; neighbours at the
    /// upper boundary clamp to the last lattice index instead of wrapping.
    ///
    /// Interpolates along x, then y, then z (7 lerps).
    pub fn sample(&self, rgb: Rgb) -> Rgb {
        let dim_m1 = self.dimension - 1;
        let scale = self.scale();

        let x = lattice_coord(rgb[0], scale);
        let y = lattice_coord(rgb[1], scale);
        let z = lattice_coord(rgb[2], scale);

        // Coordinates are non-negative, so truncation is floor.
        let x0 = (x as usize).min(dim_m1);
        let y0 = (y as usize).min(dim_m1);
        let z0 = (z as usize).min(dim_m1);
        let x1 = (x0 + 1).min(dim_m1);
        let y1 = (y0 + 1).min(dim_m1);
        let z1 = (z0 + 1).min(dim_m1);

        let fx = x - x0 as f32;
        let fy = y - y0 as f32;
        let fz = z - z0 as f32;

        let c00 = lerp_rgb(self.lattice(x0, y0, z0), self.lattice(x1, y0, z0), fx);
        let c10 = lerp_rgb(self.lattice(x0, y1, z0), self.lattice(x1, y1, z0), fx);
        let c01 = lerp_rgb(self.lattice(x0, y0, z1), self.lattice(x1, y0, z1), fx);
        let c11 = lerp_rgb(self.lattice(x0, y1, z1), self.lattice(x1, y1, z1), fx);

        let c0 = lerp_rgb(c00, c10, fy);
        let c1 = lerp_rgb(c01, c11, fy);

        lerp_rgb(c0, c1, fz)
    }
}

/// `a + (b - a) * t` per channel.
#[inline]
pub fn lerp_rgb(a: Rgb, b: Rgb, t: f32) -> Rgb {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

#[inline]
fn lattice_coord(v: f32, scale: f32) -> f32 {
    let c = clamp01(v) * scale;
    let nearest = c.round();
    if (c - nearest).abs() <= LATTICE_SNAP * scale {
        nearest
    } else {
        c
    }
}

/// Float count of a `dimension³` lattice.
fn checked_len(dimension: usize) -> Result<usize, LutError> {
    if dimension < MIN_DIMENSION {
        return Err(LutError::InvalidDimension(dimension));
    }
    dimension
        .checked_pow(3)
        .and_then(|cells| cells.checked_mul(3))
        .ok_or(LutError::InvalidDimension(dimension))
}

fn validate(len: usize, dimension: usize) -> Result<(), LutError> {
    let expected = checked_len(dimension)?;
    if len != expected {
        return Err(LutError::LengthMismatch {
            expected,
            actual: len,
        });
    }
    Ok(())
}
