//! Adobe/Resolve `.cube` 3D LUT parsing.
//!
//! ```text
//! # Comment
//! TITLE "Warm Look"
//! LUT_3D_SIZE 33
//! DOMAIN_MIN 0.0 0.0 0.0
//! DOMAIN_MAX 1.0 1.0 1.0
//! 0.0 0.0 0.0
//! ...
//! ```
//!
//! Data lines are red-fastest, which is exactly the [`Lut3D`] table order,
//! so no reordering is needed. Only the unit domain is accepted because the
//! sampler clamps inputs to `[0, 1]`.

use std::path::Path;

use crate::error::LutError;
use crate::lut::table::{Lut3D, MIN_DIMENSION};

/// Largest accepted `LUT_3D_SIZE`. Grading tools top out at 65.
pub const MAX_CUBE_DIMENSION: usize = 256;

impl Lut3D {
    /// Parse a `.cube` document.
    pub fn from_cube_str(text: &str) -> Result<Self, LutError> {
        let mut size: Option<usize> = None;
        let mut data: Vec<f32> = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split_whitespace();
            let Some(head) = fields.next() else {
                continue;
            };
            match head {
                "TITLE" => {}
                "LUT_3D_SIZE" => {
                    let value = fields
                        .next()
                        .and_then(|s| s.parse::<usize>().ok())
                        .ok_or_else(|| parse_error(line_no, "LUT_3D_SIZE needs an integer"))?;
                    let range = MIN_DIMENSION..=MAX_CUBE_DIMENSION;
                    if !range.contains(&value) {
                        let message = format!("LUT_3D_SIZE {value} outside {range:?}");
                        return Err(parse_error(line_no, message));
                    }
                    size = Some(value);
                    data.reserve(value.pow(3) * 3);
                }
                "LUT_1D_SIZE" => return Err(parse_error(line_no, "expected 3D LUT, found 1D")),
                "DOMAIN_MIN" => check_domain(line_no, fields, 0.0)?,
                "DOMAIN_MAX" => check_domain(line_no, fields, 1.0)?,
                _ => {
                    let rgb = parse_triple(line_no, line)?;
                    data.extend_from_slice(&rgb);
                }
            }
        }

        let size = size.ok_or_else(|| parse_error(0, "missing LUT_3D_SIZE"))?;
        let expected = size.pow(3) * 3;
        if data.len() != expected {
            return Err(parse_error(
                0,
                format!("expected {} entries, found {}", expected / 3, data.len() / 3),
            ));
        }
        Self::new(data, size)
    }

    /// Load a 3D LUT from a `.cube` file.
    pub fn load_cube(path: &Path) -> Result<Self, LutError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_cube_str(&text)
    }
}

fn parse_triple(line_no: usize, line: &str) -> Result<[f32; 3], LutError> {
    let mut out = [0.0_f32; 3];
    let mut fields = line.split_whitespace();
    for slot in &mut out {
        *slot = fields
            .next()
            .and_then(|s| s.parse::<f32>().ok())
            .ok_or_else(|| parse_error(line_no, format!("expected 3 floats, got `{line}`")))?;
    }
    if fields.next().is_some() {
        return Err(parse_error(line_no, format!("trailing data in `{line}`")));
    }
    Ok(out)
}

fn check_domain<'a>(
    line_no: usize,
    fields: impl Iterator<Item = &'a str>,
    expected: f32,
) -> Result<(), LutError> {
    let values: Vec<f32> = fields.filter_map(|s| s.parse().ok()).collect();
    if values.len() != 3 || values.iter().any(|&v| v != expected) {
        return Err(parse_error(line_no, "only the unit [0, 1] domain is supported"));
    }
    Ok(())
}

fn parse_error(line: usize, message: impl Into<String>) -> LutError {
    LutError::Parse {
        line,
        message: message.into(),
    }
}
