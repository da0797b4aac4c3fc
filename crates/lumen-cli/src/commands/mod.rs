//! CLI command implementations.

pub mod common;
pub mod light;
pub mod presets;
