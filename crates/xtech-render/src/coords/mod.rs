//! Coordinate and geometry types shared by the renderer and its backends.
//!
//! Two spaces are in play:
//! - logical game pixels (what gameplay code draws in, e.g. 800x600)
//! - backend pixels (logical divided by the asset downscale, 2 on the handheld)
//!
//! Both use a top-left origin with +X right and +Y down. Physical screen
//! coordinates are backend pixels of one specific output surface.

mod affine;
mod irect;
mod mapper;
mod rect;
mod vec2;
mod viewport;

pub use affine::Affine2;
pub use irect::IRect;
pub use mapper::{letterbox, EditorMode, ScreenLayout};
pub use rect::Rect;
pub use vec2::Vec2;
pub use viewport::Viewport;
