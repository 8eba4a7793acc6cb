//! Color model shared by the renderer and backends.
//!
//! Colors are straight (non-premultiplied) RGBA in `[0, 1]`. Draw tints are
//! per-channel multipliers applied to the sampled texel before blending.

mod color;

pub use color::Color;
