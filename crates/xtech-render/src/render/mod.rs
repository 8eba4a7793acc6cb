//! The render layer proper.
//!
//! [`Renderer`] is the one context gameplay code draws through. It is split
//! by concern:
//! - `renderer`: construction, screen layout and the texture API
//! - `frame`: frame state, target selection and the viewport
//! - `draw`: rectangle and texture primitives
//! - `compose`: layer composition onto the physical screens
//!
//! Convention: public coordinates are logical pixels (top-left origin, +Y
//! down); backend commands are in backend pixels (logical / downscale).

mod compose;
mod draw;
mod frame;
mod renderer;

pub use compose::{layer_shift, select_presentation, Presentation, LAYER_DEPTH};
pub use draw::{plan_blit, wrap_source_y, BandDraw, TextureDraw};
pub use renderer::Renderer;
