//! Render layer configuration.

/// Number of composition layers when depth layering is available.
pub const MAX_LAYERS: usize = 4;

/// Tunables for the render layer.
///
/// Platform presets are provided by [`RenderConfig::handheld`] and
/// [`RenderConfig::desktop`]; everything else is plain data.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Logical game screen width.
    pub screen_w: i32,
    /// Logical game screen height.
    pub screen_h: i32,
    /// Logical pixels per backend pixel. Handheld assets are stored at half scale.
    pub downscale: i32,
    /// Rows held by one backend texture band.
    pub band_rows: i32,
    /// Free texture memory below which an eviction pass runs after an upload.
    pub low_memory_threshold: usize,
    /// Horizontal offset between the primary and secondary screen images.
    pub editor_offset: i32,
    /// Maximum per-layer source shift at full stereoscopic depth, in backend pixels.
    pub stereo_shift: f32,
    /// Depth values at or below this are treated as "no depth effect".
    pub depth_threshold: f32,
    /// Frames a lazy texture may go undrawn before the default usage policy
    /// considers it unneeded.
    pub eviction_grace_frames: u64,
    /// Largest layer surface width tier (tiers are powers of two from 256).
    pub max_layer_w: i32,
    /// Largest layer surface height tier.
    pub max_layer_h: i32,
}

impl RenderConfig {
    /// Dual-screen stereoscopic handheld: 800x480 logical on a 400x240 top screen.
    pub fn handheld() -> Self {
        Self {
            screen_w: 800,
            screen_h: 480,
            downscale: 2,
            band_rows: 1024,
            low_memory_threshold: 4 * 1024 * 1024,
            editor_offset: 40,
            stereo_shift: 20.0,
            depth_threshold: 0.05,
            eviction_grace_frames: 1,
            max_layer_w: 1024,
            max_layer_h: 512,
        }
    }

    /// Single-window desktop: 800x600 logical, full-scale assets.
    pub fn desktop() -> Self {
        Self {
            screen_w: 800,
            screen_h: 600,
            downscale: 1,
            editor_offset: 0,
            max_layer_w: 4096,
            max_layer_h: 4096,
            ..Self::handheld()
        }
    }
}

/// Smallest power-of-two tier (at least 256) holding `size`, capped at `max`.
pub fn size_tier(size: i32, max: i32) -> i32 {
    let mut tier = 256;
    while tier < size && tier < max {
        tier *= 2;
    }
    tier.min(max.max(256))
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::handheld()
    }
}
