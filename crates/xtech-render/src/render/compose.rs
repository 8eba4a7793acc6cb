//! Composition of the layers onto the physical screens.

use crate::backend::{Backend, Capabilities, DrawImage, Flip, ImageSource, Screen, Target};
use crate::coords::{Affine2, IRect, Rect, ScreenLayout};
use crate::paint::Color;

use super::Renderer;

/// Per-layer stereo multipliers, back to front. Layer 2 (the playfield) sits
/// on the screen plane.
pub const LAYER_DEPTH: [f32; 4] = [1.0, 0.4, 0.0, -0.4];

/// Where the layers go this frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Presentation {
    /// All layers onto one screen, destination shifted by `dst_offset_x`.
    Mono { screen: Screen, dst_offset_x: i32 },
    /// Left and right eye images with per-layer source shifts.
    Stereo { depth: f32 },
}

/// Picks the presentation for the current layout, in priority order.
pub fn select_presentation(
    layout: &ScreenLayout,
    caps: Capabilities,
    depth: f32,
    depth_threshold: f32,
    single_layer: bool,
) -> Presentation {
    let sub = if caps.has_sub_screen { Screen::Secondary } else { Screen::Primary };

    if layout.swapped && layout.editor.screen_in_use() {
        // the editor owns the secondary screen; the game moves up
        Presentation::Mono { screen: Screen::Primary, dst_offset_x: layout.editor_offset }
    } else if layout.swapped {
        Presentation::Mono { screen: sub, dst_offset_x: 0 }
    } else if layout.editor.level_editor && !layout.editor.editor_screen_active {
        Presentation::Mono { screen: sub, dst_offset_x: -layout.editor_offset }
    } else if depth <= depth_threshold || single_layer || !caps.supports_stereo {
        Presentation::Mono { screen: Screen::Primary, dst_offset_x: 0 }
    } else {
        Presentation::Stereo { depth }
    }
}

/// Left-eye source x shift of `layer`; the right eye uses the negation.
pub fn layer_shift(layer: usize, stereo_shift: f32, depth: f32) -> i32 {
    let m = LAYER_DEPTH.get(layer).copied().unwrap_or(0.0);
    (m * stereo_shift * depth) as i32
}

impl<B: Backend> Renderer<B> {
    /// Composes the layers onto the physical screens and ends the frame.
    /// Does nothing outside a frame.
    pub fn repaint(&mut self) {
        if !self.in_frame {
            return;
        }

        let depth = self.backend.depth_slider();
        let presentation = select_presentation(
            &self.layout,
            self.backend.capabilities(),
            depth,
            self.config.depth_threshold,
            self.targets.single_layer(),
        );

        self.current = None;
        self.view = Affine2::identity();

        match presentation {
            Presentation::Mono { screen, dst_offset_x } => {
                self.compose_onto(screen, dst_offset_x, |_| 0);
            }
            Presentation::Stereo { depth } => {
                let shift = self.config.stereo_shift;
                self.compose_onto(Screen::Primary, 0, |layer| layer_shift(layer, shift, depth));
                self.compose_onto(Screen::PrimaryRight, 0, |layer| -layer_shift(layer, shift, depth));
            }
        }

        self.frame_counter += 1;
        self.in_frame = false;
        self.backend.end_frame();
    }

    fn compose_onto(&mut self, screen: Screen, dst_offset_x: i32, src_shift: impl Fn(usize) -> i32) {
        let target = Target::Screen(screen);
        self.backend.clear(target, Color::BLACK);
        self.backend.begin_scene(target);
        self.backend.set_view(Affine2::identity());

        let sub = self.targets.sub_region();
        let dst = Rect::from(self.layout.phys.offset(dst_offset_x, 0));
        let count = if self.targets.single_layer() { 1 } else { self.targets.layer_count() };

        for (i, &layer) in self.targets.layers().iter().take(count).enumerate() {
            let src = IRect::new(src_shift(i), 0, sub.w, sub.h);
            self.backend.draw_image(&DrawImage {
                source: ImageSource::Surface(layer),
                dst,
                src: Rect::from(src),
                flip: Flip::NONE,
                tint: Color::WHITE,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SoftBackend, SoftConfig, TraceEvent};
    use crate::config::RenderConfig;
    use crate::coords::EditorMode;

    fn caps(stereo: bool, sub: bool) -> Capabilities {
        Capabilities { supports_stereo: stereo, has_sub_screen: sub, max_surface_size: 1024 }
    }

    fn layout() -> ScreenLayout {
        ScreenLayout::new(800, 480, IRect::new(0, 0, 400, 240))
    }

    // ── select_presentation ───────────────────────────────────────────────

    #[test]
    fn priority_order() {
        let mut l = layout();
        let c = caps(true, true);
        assert_eq!(select_presentation(&l, c, 0.3, 0.05, false), Presentation::Stereo { depth: 0.3 });
        assert_eq!(
            select_presentation(&l, c, 0.05, 0.05, false),
            Presentation::Mono { screen: Screen::Primary, dst_offset_x: 0 }
        );

        l.editor = EditorMode { level_editor: true, magic_hand: false, editor_screen_active: false };
        assert_eq!(
            select_presentation(&l, c, 0.3, 0.05, false),
            Presentation::Mono { screen: Screen::Secondary, dst_offset_x: -40 }
        );

        l.swapped = true;
        assert_eq!(
            select_presentation(&l, c, 0.3, 0.05, false),
            Presentation::Mono { screen: Screen::Secondary, dst_offset_x: 0 }
        );

        l.editor.editor_screen_active = true;
        assert_eq!(
            select_presentation(&l, c, 0.3, 0.05, false),
            Presentation::Mono { screen: Screen::Primary, dst_offset_x: 40 }
        );
    }

    #[test]
    fn single_layer_and_missing_stereo_stay_mono() {
        let l = layout();
        let mono = Presentation::Mono { screen: Screen::Primary, dst_offset_x: 0 };
        assert_eq!(select_presentation(&l, caps(true, true), 0.8, 0.05, true), mono);
        assert_eq!(select_presentation(&l, caps(false, false), 0.8, 0.05, false), mono);
    }

    #[test]
    fn missing_sub_screen_uses_primary() {
        let mut l = layout();
        l.swapped = true;
        assert_eq!(
            select_presentation(&l, caps(false, false), 0.0, 0.05, false),
            Presentation::Mono { screen: Screen::Primary, dst_offset_x: 0 }
        );
    }

    #[test]
    fn layer_shifts_truncate() {
        assert_eq!(layer_shift(0, 20.0, 0.3), 6);
        assert_eq!(layer_shift(1, 20.0, 0.3), 2);
        assert_eq!(layer_shift(2, 20.0, 0.3), 0);
        assert_eq!(layer_shift(3, 20.0, 0.3), -2);
    }

    // ── repaint ───────────────────────────────────────────────────────────

    fn handheld(depth: f32) -> Renderer<SoftBackend> {
        let mut backend = SoftBackend::new(SoftConfig::handheld());
        backend.set_depth_slider(depth);
        Renderer::new(backend, RenderConfig::handheld())
    }

    fn composed(r: &Renderer<SoftBackend>) -> Vec<(Target, DrawImage)> {
        r.backend()
            .trace()
            .iter()
            .filter_map(|e| match e {
                TraceEvent::Image { target, draw } => Some((*target, *draw)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn flat_depth_composites_onto_one_screen() {
        let mut r = handheld(0.0);
        r.set_target_texture();
        r.backend_mut().take_trace();
        r.repaint();

        let draws = composed(&r);
        assert_eq!(draws.len(), 4);
        assert!(draws.iter().all(|(t, _)| *t == Target::Screen(Screen::Primary)));
        assert!(draws.iter().all(|(_, d)| d.src.x() == 0.0));
        assert_eq!(draws[0].1.dst, Rect::new(0.0, 0.0, 400.0, 240.0));
        assert_eq!(draws[0].1.src, Rect::new(0.0, 0.0, 400.0, 240.0));
        assert_eq!(r.frame_counter(), 1);
        assert!(!r.in_frame());
    }

    #[test]
    fn stereo_depth_composites_both_eyes() {
        let mut r = handheld(0.3);
        r.set_target_texture();
        r.backend_mut().take_trace();
        r.repaint();

        let draws = composed(&r);
        assert_eq!(draws.len(), 8);
        let left: Vec<_> = draws.iter().filter(|(t, _)| *t == Target::Screen(Screen::Primary)).collect();
        let right: Vec<_> =
            draws.iter().filter(|(t, _)| *t == Target::Screen(Screen::PrimaryRight)).collect();
        assert_eq!(left.len(), 4);
        assert_eq!(right.len(), 4);

        let s = layer_shift(0, 20.0, 0.3) as f32;
        assert!(s > 0.0);
        assert_eq!(left[0].1.src.x(), s);
        assert_eq!(right[0].1.src.x(), -s);
        assert_eq!(left[2].1.src.x(), 0.0);
        assert_eq!(right[2].1.src.x(), 0.0);
        assert!(draws.iter().all(|(_, d)| d.flip == Flip::NONE && d.tint.is_white()));
    }

    #[test]
    fn single_layer_mode_composes_one_layer() {
        let mut r = handheld(0.5);
        r.apply_resolution(1066, 600, false);
        r.set_target_texture();
        r.backend_mut().take_trace();
        r.repaint();
        assert_eq!(composed(&r).len(), 1);
    }

    #[test]
    fn editor_offsets_destination() {
        let mut r = handheld(0.0);
        r.set_editor_mode(EditorMode { level_editor: true, magic_hand: false, editor_screen_active: false });
        r.set_target_texture();
        r.backend_mut().take_trace();
        r.repaint();

        let draws = composed(&r);
        assert!(draws.iter().all(|(t, _)| *t == Target::Screen(Screen::Secondary)));
        assert_eq!(draws[0].1.dst.x(), -40.0);
    }

    #[test]
    fn repaint_outside_frame_is_a_no_op() {
        let mut r = handheld(0.0);
        r.repaint();
        assert_eq!(r.frame_counter(), 0);
        assert_eq!(r.backend().frames_presented(), 0);
    }

    #[test]
    fn composed_pixels_reach_the_screen() {
        let mut r = handheld(0.0);
        r.set_target_texture();
        r.render_rect(0, 0, 100, 100, Color::WHITE, true);
        r.repaint();
        let t = Target::Screen(Screen::Primary);
        assert_eq!(r.backend().pixel(t, 10, 10), Some([255, 255, 255, 255]));
        assert_eq!(r.backend().pixel(t, 60, 60), Some([0, 0, 0, 255]));
    }
}
