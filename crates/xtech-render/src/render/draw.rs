//! Draw primitive dispatcher.
//!
//! Turns logical draw calls into backend commands. All geometry is converted
//! to backend pixels first (integer division by the downscale), then textured
//! draws go through two pure steps that are tested on their own:
//! [`wrap_source_y`] and [`plan_blit`].

use crate::backend::{Backend, DrawImage, Flip, ImageSource};
use crate::coords::{IRect, Rect, Vec2};
use crate::paint::Color;
use crate::texture::{TextureHandle, MAX_BANDS};

use super::Renderer;

/// Legacy sprite sheet convention: a source Y beyond the texture height wraps
/// back into the texture and flips the sprite. Each wrap adds one to the flip
/// mode (at most three), and the mode is XOR-ed into the flip bits.
pub fn wrap_source_y(mut y_src: i32, tex_h: i32, flip: Flip) -> (i32, Flip) {
    let mut mode = 0u8;
    if tex_h > 0 {
        while y_src >= tex_h && mode < 3 {
            y_src -= tex_h;
            mode += 1;
        }
    }
    (y_src, flip ^ Flip(mode))
}

/// One backend draw produced by [`plan_blit`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BandDraw {
    pub band: usize,
    pub dst: IRect,
    /// Source rect relative to the band's first row.
    pub src: IRect,
}

/// Splits a blit over a texture stored as bands of `band_rows` rows.
///
/// A source rect crossing a band boundary becomes two draws with the
/// destination height split in the same ratio; bands missing from `present`
/// are skipped. Band 0 is assumed present.
pub fn plan_blit(dst: IRect, src: IRect, present: [bool; MAX_BANDS], band_rows: i32) -> Vec<BandDraw> {
    let mut out = Vec::with_capacity(2);
    if src.h <= 0 || src.w <= 0 || band_rows <= 0 {
        return out;
    }

    let b = band_rows;
    let (mut y_dst, mut h_dst) = (dst.y, dst.h);
    let (mut y_src, mut h_src) = (src.y, src.h);
    let mut main = None;
    let mut top = None;

    if y_src + h_src > b {
        if y_src + h_src > 2 * b {
            if present[2] {
                main = Some(2);
            }
            if y_src < 2 * b && present[1] {
                top = Some(1);
            }
            y_src -= b;
        } else {
            if present[1] {
                main = Some(1);
            }
            if y_src < b {
                top = Some(0);
            }
        }

        match top {
            Some(band) => {
                let rows = b - y_src;
                let split = rows * h_dst / h_src;
                out.push(BandDraw {
                    band,
                    dst: IRect::new(dst.x, y_dst, dst.w, split),
                    src: IRect::new(src.x, y_src, src.w, rows),
                });
                y_dst += split;
                h_dst -= split;
                h_src -= rows;
                y_src = 0;
            }
            None => y_src -= b,
        }
    } else {
        main = Some(0);
    }

    if let Some(band) = main {
        out.push(BandDraw {
            band,
            dst: IRect::new(dst.x, y_dst, dst.w, h_dst),
            src: IRect::new(src.x, y_src, src.w, h_src),
        });
    }
    out
}

/// Parameters of a general textured draw, in logical pixels.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TextureDraw {
    pub dst: IRect,
    pub src: IRect,
    /// Clockwise rotation in degrees around `center`.
    pub rotation: f32,
    /// Rotation pivot relative to the destination origin; the destination
    /// center when `None`.
    pub center: Option<Vec2>,
    pub flip: Flip,
    pub tint: Color,
}

impl TextureDraw {
    pub fn new(dst: IRect, src: IRect) -> Self {
        Self {
            dst,
            src,
            rotation: 0.0,
            center: None,
            flip: Flip::NONE,
            tint: Color::WHITE,
        }
    }
}

impl<B: Backend> Renderer<B> {
    // ── rectangles ────────────────────────────────────────────────────────

    /// Draws a rectangle, filled or as a one-pixel outline.
    pub fn render_rect(&mut self, x: i32, y: i32, w: i32, h: i32, color: Color, filled: bool) {
        let ds = self.layout.downscale.max(1);
        let r = IRect::from_corners(x / ds, y / ds, (x + w) / ds, (y + h) / ds);
        if self.ensure_target().is_none() || r.is_empty() {
            return;
        }

        if filled {
            self.backend.draw_rect(Rect::from(r), color);
            return;
        }

        let (x1, y1, x2, y2) = (r.x, r.y, r.right(), r.bottom());
        let edges = [
            IRect::from_corners(x1, y1, x2, y1 + 1),
            IRect::from_corners(x1, y2 - 1, x2, y2),
            IRect::from_corners(x1, y1 + 1, x1 + 1, y2 - 1),
            IRect::from_corners(x2 - 1, y1 + 1, x2, y2 - 1),
        ];
        for edge in edges.into_iter().filter(|e| !e.is_empty()) {
            self.backend.draw_rect(Rect::from(edge), color);
        }
    }

    /// Filled rectangle given by its corners (`right`/`bottom` exclusive).
    pub fn render_rect_br(&mut self, left: i32, top: i32, right: i32, bottom: i32, color: Color) {
        self.render_rect(left, top, right - left, bottom - top, color, true);
    }

    // ── textures ──────────────────────────────────────────────────────────

    /// Draws the whole texture at (`x`, `y`).
    pub fn render_texture_at(&mut self, tex: TextureHandle, x: i32, y: i32, tint: Color) {
        let Some(res) = self.textures.get(tex) else { return };
        let (w, h) = (res.w, res.h);
        self.render_texture(tex, IRect::new(x, y, w, h), 0, 0, tint);
    }

    /// Unscaled blit of `dst.w`x`dst.h` pixels starting at (`src_x`, `src_y`).
    pub fn render_texture(&mut self, tex: TextureHandle, dst: IRect, src_x: i32, src_y: i32, tint: Color) {
        let src = IRect::new(src_x, src_y, dst.w, dst.h);
        self.render_texture_scaled(tex, dst, src, tint);
    }

    pub fn render_texture_scaled(&mut self, tex: TextureHandle, dst: IRect, src: IRect, tint: Color) {
        self.render_texture_ex(tex, &TextureDraw { tint, ..TextureDraw::new(dst, src) });
    }

    /// Textured draw with rotation, pivot and flip. Missing or partially
    /// loaded textures draw what they can and never fail.
    pub fn render_texture_ex(&mut self, tex: TextureHandle, draw: &TextureDraw) {
        if self.ensure_target().is_none() {
            return;
        }
        let Some(res) = self.textures.get(tex) else { return };
        if !res.inited {
            return;
        }

        let frame = self.frame_counter;
        if !self.textures.ensure_resident(&mut self.backend, tex, frame) {
            return;
        }
        self.textures.mark_drawn(tex, frame);
        let Some(res) = self.textures.get(tex) else { return };

        let ds = self.layout.downscale.max(1);
        let scale = res.scale.max(1);
        let bands = res.bands;
        let tex_h = res.h / scale;

        let mut dst = draw.dst.div(ds);
        let src = draw.src.div(scale);
        let (y_src, flip) = wrap_source_y(src.y, tex_h, draw.flip);
        let src = IRect::new(src.x, y_src, src.w, src.h);

        let saved = self.view;
        let rotated = draw.rotation != 0.0;
        if rotated {
            let (cx, cy) = match draw.center {
                Some(c) => ((c.x / ds as f32 + 0.5) as i32, (c.y / ds as f32 + 0.5) as i32),
                None => (dst.w / 2, dst.h / 2),
            };
            let view = saved
                .translate((dst.x + cx) as f32, (dst.y + cy) as f32)
                .rotate_degrees(draw.rotation);
            self.backend.set_view(view);
            dst.x = -cx;
            dst.y = -cy;
        }

        let present = bands.map(|b| b.is_some());
        for part in plan_blit(dst, src, present, self.config.band_rows) {
            let Some(image) = bands[part.band] else { continue };
            self.backend.draw_image(&DrawImage {
                source: ImageSource::Texture(image.id),
                dst: Rect::from(part.dst),
                src: Rect::from(part.src),
                flip,
                tint: draw.tint,
            });
        }

        if rotated {
            self.backend.set_view(saved);
        }
    }
}
