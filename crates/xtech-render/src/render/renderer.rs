use std::path::Path;

use crate::backend::{Backend, Screen, Target};
use crate::config::RenderConfig;
use crate::coords::{Affine2, EditorMode, IRect, ScreenLayout, Viewport};
use crate::target::RenderTargets;
use crate::texture::{ListEntry, TextureCache, TextureHandle, TextureResource, UsagePolicy};

/// The render layer's single context.
///
/// Owns the backend, the texture cache, the layer surfaces and the frame
/// state. Gameplay code talks to the renderer only; it never touches the
/// backend directly. Coordinates on this API are logical pixels.
pub struct Renderer<B: Backend> {
    pub(super) backend: B,
    pub(super) config: RenderConfig,
    pub(super) textures: TextureCache,
    pub(super) targets: RenderTargets,
    pub(super) layout: ScreenLayout,

    /// Gameplay viewport (logical px).
    pub(super) viewport: Viewport,
    pub(super) in_frame: bool,
    pub(super) current: Option<Target>,
    /// View transform last handed to the backend.
    pub(super) view: Affine2,
    pub(super) frame_counter: u64,
}

impl<B: Backend> Renderer<B> {
    /// Creates the renderer and its layer surfaces for the configured screen size.
    pub fn new(mut backend: B, config: RenderConfig) -> Self {
        let (pw, ph) = display_size(&backend, Target::Screen(Screen::Primary));
        let mut layout = ScreenLayout::new(config.screen_w, config.screen_h, IRect::new(0, 0, pw, ph));
        layout.editor_offset = config.editor_offset;
        layout.downscale = config.downscale.max(1);

        let mut targets = RenderTargets::new();
        targets.apply_resolution(&mut backend, &config, config.screen_w, config.screen_h, false);

        let caps = backend.capabilities();
        log::info!(
            "renderer ready: {}x{} logical, downscale {}, stereo {}, sub screen {}",
            config.screen_w,
            config.screen_h,
            config.downscale,
            caps.supports_stereo,
            caps.has_sub_screen
        );

        Self {
            textures: TextureCache::new(&config),
            viewport: Viewport::full(config.screen_w, config.screen_h),
            backend,
            config,
            targets,
            layout,
            in_frame: false,
            current: None,
            view: Affine2::identity(),
            frame_counter: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn targets(&self) -> &RenderTargets {
        &self.targets
    }

    pub fn layout(&self) -> &ScreenLayout {
        &self.layout
    }

    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    pub fn current_target(&self) -> Option<Target> {
        self.current
    }

    /// Number of completed frames.
    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    // ── screen layout ─────────────────────────────────────────────────────

    /// Changes the logical resolution or screen-swap mode; layers are
    /// recreated when either differs from the current request.
    ///
    /// Inside a frame, fresh layers start transparent and a selected layer
    /// target is dropped so the next draw re-selects the texture target.
    pub fn apply_resolution(&mut self, logical_w: i32, logical_h: i32, swapped: bool) {
        self.layout.logical_w = logical_w;
        self.layout.logical_h = logical_h;
        self.layout.swapped = swapped;
        let recreated = self
            .targets
            .apply_resolution(&mut self.backend, &self.config, logical_w, logical_h, swapped);
        if !recreated || !self.in_frame {
            return;
        }

        self.clear_active_layers();
        self.viewport = Viewport::full(logical_w, logical_h);
        if matches!(self.current, Some(Target::Surface(_))) {
            self.current = None;
        }
    }

    /// Where the game image lands on the physical screen.
    pub fn set_screen_phys(&mut self, phys: IRect) {
        self.layout.phys = phys;
    }

    pub fn set_editor_mode(&mut self, editor: EditorMode) {
        self.layout.editor = editor;
    }

    /// Physical (touch/pointer) position to logical game coordinates.
    pub fn map_to_screen(&self, x: i32, y: i32) -> (i32, i32) {
        self.layout.map_to_screen(x, y)
    }

    /// Logical game coordinates to a physical position.
    pub fn map_from_screen(&self, x: i32, y: i32) -> (i32, i32) {
        self.layout.map_from_screen(x, y)
    }

    // ── textures ──────────────────────────────────────────────────────────

    pub fn texture(&self, tex: TextureHandle) -> Option<&TextureResource> {
        self.textures.get(tex)
    }

    pub fn texture_cache(&self) -> &TextureCache {
        &self.textures
    }

    pub fn set_usage_policy(&mut self, policy: Box<dyn UsagePolicy>) {
        self.textures.set_policy(policy);
    }

    pub fn load_picture(&mut self, path: &Path) -> TextureHandle {
        self.textures.load_eager(&mut self.backend, path)
    }

    pub fn load_picture_1x(&mut self, path: &Path) -> TextureHandle {
        self.textures.load_1x(&mut self.backend, path)
    }

    pub fn lazy_load_picture(&mut self, path: &Path) -> TextureHandle {
        self.textures.load_lazy(&mut self.backend, path)
    }

    pub fn lazy_load_picture_from_list(&mut self, entry: &ListEntry, dir: &Path) -> TextureHandle {
        self.textures.load_lazy_from_list(entry, dir)
    }

    /// Uploads a lazy texture now. Returns whether it is resident.
    pub fn lazy_load(&mut self, tex: TextureHandle) -> bool {
        self.textures.ensure_resident(&mut self.backend, tex, self.frame_counter)
    }

    pub fn lazy_preload(&mut self, tex: TextureHandle) -> bool {
        self.textures.lazy_preload(&mut self.backend, tex, self.frame_counter)
    }

    pub fn lazy_unload(&mut self, tex: TextureHandle) {
        self.textures.lazy_unload(&mut self.backend, tex);
    }

    pub fn delete_texture(&mut self, tex: TextureHandle) {
        self.textures.delete(&mut self.backend, tex);
    }

    /// Runs an eviction pass now.
    pub fn free_texture_memory(&mut self) {
        self.textures.free_unneeded(&mut self.backend, self.frame_counter);
    }

    pub fn textures_loaded(&self) -> usize {
        self.textures.textures_loaded()
    }

    /// Releases every texture and layer surface. The renderer stays usable
    /// for texture loading but has no layers until the next resolution change.
    pub fn quit(&mut self) {
        if self.in_frame {
            self.backend.end_frame();
            self.in_frame = false;
        }
        self.current = None;
        self.textures.clear_all(&mut self.backend);
        self.targets.destroy_all(&mut self.backend);
        log::info!("renderer shut down after {} frames", self.frame_counter);
    }

    pub fn into_backend(mut self) -> B {
        self.quit();
        self.backend
    }
}

/// Size of `target` in display orientation.
pub(super) fn display_size<B: Backend>(backend: &B, target: Target) -> (i32, i32) {
    let (w, h) = backend.framebuffer_size(target);
    if backend.target_is_rotated(target) {
        (h as i32, w as i32)
    } else {
        (w as i32, h as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SoftBackend, SoftConfig};
    use crate::paint::Color;

    fn handheld() -> Renderer<SoftBackend> {
        Renderer::new(SoftBackend::new(SoftConfig::handheld()), RenderConfig::handheld())
    }

    #[test]
    fn new_sizes_layers_and_phys_rect() {
        let r = handheld();
        assert_eq!(r.targets().layer_count(), 4);
        assert_eq!(r.layout().phys, IRect::new(0, 0, 400, 240));
        assert_eq!(r.layout().editor_offset, 40);
        assert!(!r.in_frame());
    }

    #[test]
    fn apply_resolution_updates_layout_and_layers() {
        let mut r = handheld();
        r.apply_resolution(1066, 600, false);
        assert_eq!((r.layout().logical_w, r.layout().logical_h), (1066, 600));
        assert!(r.targets().single_layer());
    }

    #[test]
    fn resolution_change_mid_frame_keeps_drawing() {
        let mut r = handheld();
        r.set_target_texture();
        r.apply_resolution(640, 480, false);
        assert_eq!(r.current_target(), None);

        r.render_rect(0, 0, 100, 100, Color::WHITE, true);
        let layer = r.targets().layer(2);
        assert!(layer.is_some());
        assert_eq!(r.current_target(), layer.map(Target::Surface));
        assert!(layer.and_then(|id| r.backend().surface_size(id)).is_some());

        r.repaint();
        let px = r.backend().pixel(Target::Screen(Screen::Primary), 10, 10);
        assert_eq!(px, Some([255, 255, 255, 255]));
    }

    #[test]
    fn quit_releases_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        image::RgbaImage::new(4, 4).save(&path).unwrap();

        let mut r = handheld();
        r.load_picture(&path);
        assert_eq!(r.textures_loaded(), 1);

        let b = r.into_backend();
        assert_eq!(b.texture_count(), 0);
        assert_eq!(b.surface_count(), 0);
    }

    #[test]
    fn coordinate_mapping_uses_layout() {
        let r = handheld();
        assert_eq!(r.map_to_screen(0, 0), (80, 0));
        assert_eq!(r.map_from_screen(80, 0), (0, 0));
    }
}
