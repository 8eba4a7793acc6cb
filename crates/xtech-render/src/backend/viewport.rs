use crate::coords::IRect;

/// Hardware viewport in framebuffer space.
///
/// Framebuffer space follows the GPU convention: origin at the bottom-left
/// corner of the framebuffer as stored. Rotated targets (the handheld's
/// screens, stored 90° clockwise) swap axes, which is why the computation
/// keeps them as an explicit branch instead of a generic transform.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct HwViewport {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    /// Scene size in display orientation; scene units map 1:1 to display pixels.
    pub scene_w: i32,
    pub scene_h: i32,
    pub rotated: bool,
}

impl HwViewport {
    /// Clamps the display-space viewport `vp` to a framebuffer of `fb_w`x`fb_h`
    /// (framebuffer orientation) and converts it to framebuffer space.
    pub fn compute(vp: IRect, fb_w: i32, fb_h: i32, rotated: bool) -> Self {
        let fb_w = fb_w.max(1);
        let fb_h = fb_h.max(1);

        if rotated {
            // display X runs along framebuffer Y
            let hx = vp.y.clamp(0, fb_w - 1);
            let hy = vp.x.clamp(0, fb_h - 1);
            let hw = (fb_w - hx).min(vp.h).max(0);
            let hh = (fb_h - hy).min(vp.w).max(0);

            Self {
                x: fb_w - hx - hw,
                y: hy,
                w: hw,
                h: hh,
                scene_w: vp.w,
                scene_h: vp.h,
                rotated,
            }
        } else {
            let hx = vp.x.clamp(0, fb_w - 1);
            let hy = vp.y.clamp(0, fb_h - 1);
            let hw = (fb_w - hx).min(vp.w).max(0);
            let hh = (fb_h - hy).min(vp.h).max(0);

            Self {
                x: hx,
                y: fb_h - hy - hh,
                w: hw,
                h: hh,
                scene_w: vp.w,
                scene_h: vp.h,
                rotated,
            }
        }
    }

    /// Viewport covering a whole target.
    pub fn full(fb_w: i32, fb_h: i32, rotated: bool) -> Self {
        let (dw, dh) = if rotated { (fb_h, fb_w) } else { (fb_w, fb_h) };
        Self::compute(IRect::new(0, 0, dw, dh), fb_w, fb_h, rotated)
    }

    /// The clipped region in display space (top-left origin, display orientation).
    pub fn display_rect(&self, fb_w: i32, fb_h: i32) -> IRect {
        if self.rotated {
            IRect::new(self.y, fb_w - self.x - self.w, self.h, self.w)
        } else {
            IRect::new(self.x, fb_h - self.y - self.h, self.w, self.h)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── unrotated ─────────────────────────────────────────────────────────

    #[test]
    fn unrotated_flips_y_to_bottom_left_origin() {
        let hw = HwViewport::compute(IRect::new(10, 20, 100, 50), 400, 240, false);
        assert_eq!((hw.x, hw.y, hw.w, hw.h), (10, 170, 100, 50));
        assert_eq!(hw.display_rect(400, 240), IRect::new(10, 20, 100, 50));
    }

    #[test]
    fn unrotated_clamps_to_framebuffer() {
        let hw = HwViewport::compute(IRect::new(-10, 200, 500, 100), 400, 240, false);
        assert_eq!(hw.display_rect(400, 240), IRect::new(0, 200, 400, 40));
        assert_eq!((hw.scene_w, hw.scene_h), (500, 100));
    }

    // ── rotated ───────────────────────────────────────────────────────────

    #[test]
    fn rotated_swaps_axes() {
        // 400x240 display stored as a 240x400 framebuffer
        let hw = HwViewport::compute(IRect::new(10, 20, 100, 50), 240, 400, true);
        assert_eq!((hw.x, hw.y, hw.w, hw.h), (170, 10, 50, 100));
        assert_eq!(hw.display_rect(240, 400), IRect::new(10, 20, 100, 50));
    }

    #[test]
    fn rotated_full_covers_display() {
        let hw = HwViewport::full(240, 400, true);
        assert_eq!(hw.display_rect(240, 400), IRect::new(0, 0, 400, 240));
        assert_eq!((hw.scene_w, hw.scene_h), (400, 240));
    }
}
