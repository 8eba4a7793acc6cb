//! Desktop window runtime.
//!
//! Owns the `winit` event loop and the game window, builds a
//! [`Renderer`](crate::render::Renderer) over the wgpu backend for it, and
//! paces logic ticks with a [`FrameTimer`](crate::time::FrameTimer).

mod app;
mod runtime;

pub use app::{App, AppControl, FrameCtx};
pub use runtime::{Runtime, RuntimeConfig};
