use super::IRect;

/// Gameplay viewport in logical pixels.
///
/// Draws land relative to `rect`'s origin, clipped to its extent. `offset`
/// shifts the drawing origin inside the viewport (camera scroll) unless
/// `ignore_offset` is set, which UI overlays use to draw in viewport space.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Viewport {
    pub rect: IRect,
    pub offset_x: i32,
    pub offset_y: i32,
    pub ignore_offset: bool,
}

impl Viewport {
    /// A viewport covering the whole logical screen with no offset.
    #[inline]
    pub const fn full(w: i32, h: i32) -> Self {
        Self {
            rect: IRect::new(0, 0, w, h),
            offset_x: 0,
            offset_y: 0,
            ignore_offset: false,
        }
    }

    /// Effective origin translation, honoring `ignore_offset`.
    #[inline]
    pub fn translation(self) -> (i32, i32) {
        if self.ignore_offset {
            (0, 0)
        } else {
            (self.offset_x, self.offset_y)
        }
    }
}
