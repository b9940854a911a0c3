//! 3D LUT tables, trilinear sampling, `.cube` parsing, and the table registry.

pub mod cube;
pub mod registry;
pub mod table;
