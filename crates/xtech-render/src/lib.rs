//! XTech render layer.
//!
//! A 2D render abstraction for a tile/sprite platformer engine: lazily
//! loaded, size-banded textures with eviction under memory pressure,
//! off-screen layer surfaces composed onto one or more physical screens
//! (with stereoscopic depth where the hardware has it), and a backend trait
//! with a deterministic software implementation and a wgpu implementation.

pub mod backend;
pub mod config;
pub mod coords;
pub mod error;
pub mod logging;
pub mod paint;
pub mod render;
pub mod target;
pub mod texture;
pub mod time;
pub mod window;
