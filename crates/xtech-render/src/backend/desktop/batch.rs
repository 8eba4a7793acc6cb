//! Frame recording for the wgpu backend.
//!
//! Draw calls are turned into clip-space vertices as they arrive and grouped
//! into passes (one per run of commands on the same target). Nothing here
//! touches the device; the passes are encoded at the end of the frame.

use std::ops::Range;

use crate::backend::{Flip, HwViewport, ImageSource, Target};
use crate::coords::{Affine2, IRect, Rect, Vec2};
use crate::paint::Color;

use super::pipeline::QuadVertex;

/// What a quad samples from. Solid rects sample a 1x1 white image.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(super) enum Source {
    White,
    Image(ImageSource),
}

/// Scissor rectangle in target pixels (top-left origin).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(super) struct Scissor {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Scissor {
    /// Intersection with a `w`x`h` attachment; the window may have been
    /// resized since the draw was recorded.
    pub(super) fn clamped(self, w: u32, h: u32) -> Option<Scissor> {
        let x1 = (self.x + self.w).min(w);
        let y1 = (self.y + self.h).min(h);
        (x1 > self.x && y1 > self.y).then(|| Scissor { x: self.x, y: self.y, w: x1 - self.x, h: y1 - self.y })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct DrawCall {
    pub source: Source,
    pub scissor: Scissor,
    pub vertices: Range<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Pass {
    pub target: Target,
    /// Load op: clear to this color, or keep the previous contents.
    pub clear: Option<Color>,
    pub draws: Vec<DrawCall>,
}

/// Current target, viewport and view of the scene being recorded.
#[derive(Debug, Copy, Clone, PartialEq)]
pub(super) struct SceneState {
    pub target: Target,
    pub fb_w: u32,
    pub fb_h: u32,
    pub viewport: HwViewport,
    pub view: Affine2,
}

impl SceneState {
    pub(super) fn new(target: Target, fb_w: u32, fb_h: u32) -> Self {
        Self {
            target,
            fb_w,
            fb_h,
            viewport: HwViewport::full(fb_w as i32, fb_h as i32, false),
            view: Affine2::identity(),
        }
    }

    fn clip(&self) -> IRect {
        self.viewport.display_rect(self.fb_w as i32, self.fb_h as i32)
    }

    /// Scissor for the current viewport, `None` when nothing is visible.
    pub(super) fn scissor(&self) -> Option<Scissor> {
        let c = self.clip();
        let x0 = c.x.clamp(0, self.fb_w as i32);
        let y0 = c.y.clamp(0, self.fb_h as i32);
        let x1 = c.right().clamp(0, self.fb_w as i32);
        let y1 = c.bottom().clamp(0, self.fb_h as i32);
        (x1 > x0 && y1 > y0).then(|| Scissor {
            x: x0 as u32,
            y: y0 as u32,
            w: (x1 - x0) as u32,
            h: (y1 - y0) as u32,
        })
    }

    /// Two triangles covering `dst` (scene units) under the view transform,
    /// sampling the normalized source rectangle `uv = [u0, v0, u1, v1]`.
    pub(super) fn quad(&self, dst: Rect, uv: [f32; 4], flip: Flip, tint: Color) -> [QuadVertex; 6] {
        let c = self.clip();
        let origin = Vec2::from_ints(c.x, c.y);
        let (fw, fh) = (self.fb_w.max(1) as f32, self.fb_h.max(1) as f32);

        let [mut u0, mut v0, mut u1, mut v1] = uv;
        if flip.horizontal() {
            std::mem::swap(&mut u0, &mut u1);
        }
        if flip.vertical() {
            std::mem::swap(&mut v0, &mut v1);
        }
        let uvs = [[u0, v0], [u1, v0], [u1, v1], [u0, v1]];

        let color = tint.to_array();
        let corners = dst.corners().map(|p| {
            let t = self.view.apply(p) + origin;
            [t.x / fw * 2.0 - 1.0, 1.0 - t.y / fh * 2.0]
        });
        let v = |i: usize| QuadVertex { pos: corners[i], uv: uvs[i], color };

        [v(0), v(1), v(2), v(0), v(2), v(3)]
    }
}

/// Normalized source rectangle of `src` inside an image of `w`x`h` pixels.
pub(super) fn normalized_uv(src: Rect, w: u32, h: u32) -> [f32; 4] {
    let (w, h) = (w.max(1) as f32, h.max(1) as f32);
    let max = src.max();
    [src.x() / w, src.y() / h, max.x / w, max.y / h]
}

/// Passes and vertices of one frame.
#[derive(Debug, Default)]
pub(super) struct FrameRecorder {
    passes: Vec<Pass>,
    vertices: Vec<QuadVertex>,
}

impl FrameRecorder {
    pub(super) fn clear(&mut self, target: Target, color: Color) {
        match self.passes.last_mut() {
            Some(p) if p.target == target && p.draws.is_empty() => p.clear = Some(color),
            _ => self.passes.push(Pass { target, clear: Some(color), draws: Vec::new() }),
        }
    }

    /// Appends a quad, extending the previous draw call when the target,
    /// source and scissor all match.
    pub(super) fn push_quad(
        &mut self,
        target: Target,
        source: Source,
        scissor: Scissor,
        quad: [QuadVertex; 6],
    ) {
        let start = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&quad);
        let end = self.vertices.len() as u32;

        if self.passes.last().is_none_or(|p| p.target != target) {
            self.passes.push(Pass { target, clear: None, draws: Vec::new() });
        }
        let Some(pass) = self.passes.last_mut() else { return };

        match pass.draws.last_mut() {
            Some(d) if d.source == source && d.scissor == scissor && d.vertices.end == start => {
                d.vertices.end = end;
            }
            _ => pass.draws.push(DrawCall { source, scissor, vertices: start..end }),
        }
    }

    pub(super) fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    pub(super) fn vertices(&self) -> &[QuadVertex] {
        &self.vertices
    }

    pub(super) fn passes(&self) -> &[Pass] {
        &self.passes
    }

    pub(super) fn reset(&mut self) {
        self.passes.clear();
        self.vertices.clear();
    }
}
