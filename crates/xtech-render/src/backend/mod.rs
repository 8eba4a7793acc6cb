//! Backend contract.
//!
//! A backend owns the native graphics objects (textures, off-screen surfaces,
//! physical screens) and executes the small set of commands the render layer
//! needs. Platform differences are expressed through [`Capabilities`] and
//! [`Backend::target_is_rotated`] instead of conditional compilation:
//!
//! - the stereoscopic handheld reports `supports_stereo` and rotated screens
//! - the desktop backend reports a single, unrotated primary screen
//!
//! Backends are driven from one thread only; nothing here is `Sync`.

mod decode;
mod soft;
mod viewport;
pub mod desktop;

pub use soft::{ScreenSpec, ScreenTopology, SoftBackend, SoftConfig, TraceEvent};
pub use viewport::HwViewport;

use std::ops::{BitXor, BitXorAssign};
use std::path::Path;

use crate::coords::{Affine2, Rect};
use crate::error::BackendResult;
use crate::paint::Color;

/// Backend texture handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// Off-screen render surface handle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

/// One uploaded image (one band of a texture resource).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BackendImage {
    pub id: TextureId,
    /// Width in backend pixels.
    pub width: u32,
    /// Height in backend pixels.
    pub height: u32,
}

/// Physical output surfaces.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Screen {
    /// Main screen (left eye on a stereoscopic display).
    Primary,
    /// Right-eye image of the main screen.
    PrimaryRight,
    /// Second physical screen (touch screen on the handheld).
    Secondary,
}

/// Where draw commands land.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    Screen(Screen),
    Surface(SurfaceId),
}

/// Source of a textured quad.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ImageSource {
    Texture(TextureId),
    Surface(SurfaceId),
}

/// Flip flags. Bit 0 mirrors horizontally, bit 1 vertically.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Flip(pub u8);

impl Flip {
    pub const NONE: Flip = Flip(0);
    pub const HORIZONTAL: Flip = Flip(1);
    pub const VERTICAL: Flip = Flip(2);
    pub const BOTH: Flip = Flip(3);

    #[inline]
    pub fn horizontal(self) -> bool {
        self.0 & 1 != 0
    }

    #[inline]
    pub fn vertical(self) -> bool {
        self.0 & 2 != 0
    }
}

impl BitXor for Flip {
    type Output = Flip;
    #[inline]
    fn bitxor(self, rhs: Flip) -> Flip {
        Flip((self.0 ^ rhs.0) & 3)
    }
}

impl BitXorAssign for Flip {
    #[inline]
    fn bitxor_assign(&mut self, rhs: Flip) {
        *self = *self ^ rhs;
    }
}

/// A textured quad in the current scene.
///
/// `dst` is in scene coordinates (before the view transform), `src` in pixels
/// of the source image.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DrawImage {
    pub source: ImageSource,
    pub dst: Rect,
    pub src: Rect,
    pub flip: Flip,
    pub tint: Color,
}

/// Static description of what a backend can do.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Capabilities {
    /// A right-eye screen exists and stereo composition is meaningful.
    pub supports_stereo: bool,
    /// A secondary physical screen exists.
    pub has_sub_screen: bool,
    /// Largest surface dimension the backend can allocate.
    pub max_surface_size: u32,
}

/// Native graphics API as seen by the render layer.
pub trait Backend {
    fn capabilities(&self) -> Capabilities;

    /// True for targets whose framebuffer is stored rotated 90° clockwise.
    fn target_is_rotated(&self, target: Target) -> bool;

    /// Framebuffer dimensions in framebuffer orientation.
    fn framebuffer_size(&self, target: Target) -> (u32, u32);

    // ── textures ──────────────────────────────────────────────────────────

    /// Decodes and uploads the image file at `path`.
    fn load_texture(&mut self, path: &Path) -> BackendResult<BackendImage>;

    fn free_texture(&mut self, id: TextureId);

    /// Bytes of texture memory still available.
    fn texture_memory_free(&self) -> usize;

    // ── surfaces ──────────────────────────────────────────────────────────

    /// Allocates an off-screen surface usable both as target and as image source.
    fn create_surface(&mut self, w: u32, h: u32) -> BackendResult<SurfaceId>;

    fn destroy_surface(&mut self, id: SurfaceId);

    // ── frame ─────────────────────────────────────────────────────────────

    fn begin_frame(&mut self);

    /// Submits all recorded work and presents the physical screens.
    fn end_frame(&mut self);

    fn clear(&mut self, target: Target, color: Color);

    /// Selects the target for subsequent draws; the viewport resets to the full target.
    fn begin_scene(&mut self, target: Target);

    fn set_viewport(&mut self, viewport: HwViewport);

    /// Sets the view transform applied to subsequent draws.
    fn set_view(&mut self, view: Affine2);

    fn draw_rect(&mut self, rect: Rect, color: Color);

    fn draw_image(&mut self, draw: &DrawImage);

    /// Forces batched draws out before a state change. Optional.
    fn flush(&mut self) {}

    /// Stereoscopic depth setting in `[0, 1]`; 0 on backends without stereo.
    fn depth_slider(&self) -> f32 {
        0.0
    }
}
