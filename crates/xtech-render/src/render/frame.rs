//! Frame state and target selection.
//!
//! The renderer is either idle or inside a frame. The first target selection
//! (or draw) of a tick begins the frame; [`Renderer::repaint`] ends it.

use crate::backend::{Backend, HwViewport, Screen, Target};
use crate::coords::{Affine2, IRect, Viewport};
use crate::paint::Color;

use super::Renderer;

impl<B: Backend> Renderer<B> {
    /// Begins a frame if none is running: active layers and the secondary
    /// screen are cleared to transparent and the viewport is reset.
    pub(super) fn ensure_in_frame(&mut self) {
        if self.in_frame {
            return;
        }

        self.backend.begin_frame();
        self.clear_active_layers();
        if self.backend.capabilities().has_sub_screen {
            self.backend.clear(Target::Screen(Screen::Secondary), Color::TRANSPARENT);
        }

        self.viewport = Viewport::full(self.layout.logical_w, self.layout.logical_h);
        self.current = None;
        self.in_frame = true;
    }

    pub(super) fn clear_active_layers(&mut self) {
        let active = if self.targets.single_layer() { 1 } else { self.targets.layer_count() };
        for &layer in self.targets.layers().iter().take(active) {
            self.backend.clear(Target::Surface(layer), Color::TRANSPARENT);
        }
    }

    /// Makes sure draws have somewhere to go: begins the frame and falls back
    /// to the texture target when nothing was selected.
    pub(super) fn ensure_target(&mut self) -> Option<Target> {
        self.ensure_in_frame();
        if self.current.is_none() {
            self.set_target_texture();
        }
        self.current
    }

    fn begin_scene(&mut self, target: Option<Target>) {
        self.current = target;
        if let Some(t) = target {
            self.backend.begin_scene(t);
        }
        self.view = Affine2::identity();
    }

    /// Selects the layer holding the playfield (layer 2, or layer 0 in
    /// single-layer mode).
    pub fn set_target_texture(&mut self) {
        self.ensure_in_frame();
        let layer = self.targets.layer(2).map(Target::Surface);
        self.begin_scene(layer);
        if layer.is_some() {
            self.backend.set_view(Affine2::identity());
        }
    }

    /// Selects the primary physical screen, cleared to black.
    pub fn set_target_main_screen(&mut self) {
        self.ensure_in_frame();
        let t = Target::Screen(Screen::Primary);
        self.backend.clear(t, Color::BLACK);
        self.begin_scene(Some(t));
        self.backend.set_view(Affine2::identity());
    }

    /// Selects the secondary physical screen (the primary when there is none),
    /// cleared to black.
    pub fn set_target_sub_screen(&mut self) {
        self.ensure_in_frame();
        let screen = if self.backend.capabilities().has_sub_screen {
            Screen::Secondary
        } else {
            Screen::Primary
        };
        let t = Target::Screen(screen);
        self.backend.clear(t, Color::BLACK);
        self.begin_scene(Some(t));
        self.backend.set_view(Affine2::identity());
    }

    /// Selects composition layer `layer` (layer 0 in single-layer mode) and
    /// applies the current viewport to it.
    pub fn set_target_layer(&mut self, layer: usize) {
        self.ensure_in_frame();
        let target = self.targets.layer(layer).map(Target::Surface);
        self.begin_scene(target);
        self.apply_viewport();
    }

    /// Outside a frame, clears every physical screen to opaque black in a
    /// standalone frame. Inside a frame this does nothing.
    pub fn clear_buffer(&mut self) {
        if self.in_frame {
            return;
        }

        let caps = self.backend.capabilities();
        self.backend.begin_frame();
        let mut screens = vec![Screen::Primary];
        if caps.supports_stereo {
            screens.push(Screen::PrimaryRight);
        }
        if caps.has_sub_screen {
            screens.push(Screen::Secondary);
        }
        for screen in screens {
            self.backend.clear(Target::Screen(screen), Color::BLACK);
        }
        self.backend.end_frame();
    }

    // ── viewport ──────────────────────────────────────────────────────────

    /// Pushes the gameplay viewport to the backend: view reset, optional
    /// offset translation, and a hardware viewport clamped to the target.
    pub(super) fn apply_viewport(&mut self) {
        if !self.in_frame {
            return;
        }

        self.backend.flush();

        let ds = self.layout.downscale.max(1);
        let (ox, oy) = self.viewport.translation();
        self.view = Affine2::identity();
        if !self.viewport.ignore_offset {
            self.view = self.view.translate((ox / ds) as f32, (oy / ds) as f32);
        }
        self.backend.set_view(self.view);

        if let Some(target) = self.current {
            let (fw, fh) = self.backend.framebuffer_size(target);
            let rotated = self.backend.target_is_rotated(target);
            let hw = HwViewport::compute(self.viewport.rect.div(ds), fw as i32, fh as i32, rotated);
            self.backend.set_viewport(hw);
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, x: i32, y: i32, w: i32, h: i32) {
        self.viewport.rect = IRect::new(x, y, w, h);
        self.apply_viewport();
    }

    pub fn reset_viewport(&mut self) {
        self.viewport.rect = IRect::new(0, 0, self.layout.logical_w, self.layout.logical_h);
        self.apply_viewport();
    }

    /// Shifts the drawing origin inside the viewport (camera scroll).
    pub fn offset_viewport(&mut self, x: i32, y: i32) {
        if self.viewport.offset_x != x || self.viewport.offset_y != y {
            self.viewport.offset_x = x;
            self.viewport.offset_y = y;
            self.apply_viewport();
        }
    }

    /// Temporarily draws without the viewport offset.
    pub fn offset_viewport_ignore(&mut self, ignore: bool) {
        if self.viewport.ignore_offset != ignore {
            self.viewport.ignore_offset = ignore;
            self.apply_viewport();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SoftBackend, SoftConfig, TraceEvent};
    use crate::config::RenderConfig;

    fn handheld() -> Renderer<SoftBackend> {
        Renderer::new(SoftBackend::new(SoftConfig::handheld()), RenderConfig::handheld())
    }

    fn clears(r: &mut Renderer<SoftBackend>) -> Vec<(Target, Color)> {
        r.backend_mut()
            .take_trace()
            .into_iter()
            .filter_map(|e| match e {
                TraceEvent::Clear { target, color } => Some((target, color)),
                _ => None,
            })
            .collect()
    }

    // ── frame begin ───────────────────────────────────────────────────────

    #[test]
    fn first_selection_begins_frame_and_clears_layers() {
        let mut r = handheld();
        r.backend_mut().take_trace();
        r.set_target_texture();

        assert!(r.in_frame());
        let layers = r.targets().layers().to_vec();
        let c = clears(&mut r);
        assert_eq!(c.len(), 5);
        for l in layers {
            assert!(c.contains(&(Target::Surface(l), Color::TRANSPARENT)));
        }
        assert!(c.contains(&(Target::Screen(Screen::Secondary), Color::TRANSPARENT)));
    }

    #[test]
    fn single_layer_mode_clears_only_layer_zero() {
        let mut r = handheld();
        r.apply_resolution(1066, 600, false);
        r.backend_mut().take_trace();
        r.set_target_layer(3);

        let c = clears(&mut r);
        assert_eq!(c.len(), 2);
        assert_eq!(r.current_target(), r.targets().layer(0).map(Target::Surface));
    }

    #[test]
    fn second_selection_does_not_restart_frame() {
        let mut r = handheld();
        r.set_target_texture();
        r.backend_mut().take_trace();
        r.set_target_layer(1);
        let begins = r
            .backend()
            .trace()
            .iter()
            .filter(|e| matches!(e, TraceEvent::BeginFrame))
            .count();
        assert_eq!(begins, 0);
    }

    // ── targets ───────────────────────────────────────────────────────────

    #[test]
    fn texture_target_is_layer_two() {
        let mut r = handheld();
        r.set_target_texture();
        assert_eq!(r.current_target(), r.targets().layer(2).map(Target::Surface));
    }

    #[test]
    fn screen_targets_clear_to_black() {
        let mut r = handheld();
        r.set_target_main_screen();
        r.set_target_sub_screen();
        let c = clears(&mut r);
        assert!(c.contains(&(Target::Screen(Screen::Primary), Color::BLACK)));
        assert!(c.contains(&(Target::Screen(Screen::Secondary), Color::BLACK)));
        assert_eq!(r.current_target(), Some(Target::Screen(Screen::Secondary)));
    }

    #[test]
    fn sub_screen_falls_back_to_primary_without_one() {
        let mut r = Renderer::new(
            SoftBackend::new(SoftConfig::single_screen(800, 600)),
            RenderConfig::desktop(),
        );
        r.set_target_sub_screen();
        assert_eq!(r.current_target(), Some(Target::Screen(Screen::Primary)));
    }

    #[test]
    fn clear_buffer_runs_a_standalone_frame() {
        let mut r = handheld();
        r.backend_mut().take_trace();
        r.clear_buffer();

        assert!(!r.in_frame());
        assert_eq!(r.backend().frames_presented(), 1);
        let c = clears(&mut r);
        assert_eq!(c.len(), 3);
        assert!(c.iter().all(|(_, col)| *col == Color::BLACK));
    }

    // ── viewport ──────────────────────────────────────────────────────────

    #[test]
    fn layer_selection_applies_downscaled_viewport_and_offset() {
        let mut r = handheld();
        r.set_target_layer(0);
        r.offset_viewport(-100, 20);
        r.set_viewport(0, 0, 400, 200);

        let trace = r.backend().trace();
        let vp = trace.iter().rev().find_map(|e| match e {
            TraceEvent::Viewport(v) => Some(*v),
            _ => None,
        });
        let view = trace.iter().rev().find_map(|e| match e {
            TraceEvent::View(v) => Some(*v),
            _ => None,
        });

        // layers are plain surfaces: unrotated 512x256
        let vp = vp.unwrap();
        assert!(!vp.rotated);
        assert_eq!(vp.display_rect(512, 256), IRect::new(0, 0, 200, 100));
        assert_eq!(view, Some(Affine2::identity().translate(-50.0, 10.0)));
    }

    #[test]
    fn viewport_changes_outside_a_frame_are_deferred() {
        let mut r = handheld();
        r.backend_mut().take_trace();
        r.set_viewport(10, 10, 100, 100);
        assert!(r.backend().trace().is_empty());
        assert_eq!(r.viewport().rect, IRect::new(10, 10, 100, 100));
    }

    #[test]
    fn ignoring_offset_drops_translation() {
        let mut r = handheld();
        r.set_target_layer(2);
        r.offset_viewport(64, 32);
        r.offset_viewport_ignore(true);
        let view = r.backend().trace().iter().rev().find_map(|e| match e {
            TraceEvent::View(v) => Some(*v),
            _ => None,
        });
        assert_eq!(view, Some(Affine2::identity()));
        assert!(r.backend().framebuffer_size(r.current_target().unwrap()).0 > 0);
    }
}
