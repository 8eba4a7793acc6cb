/// Integer rectangle (`x`, `y`, `w`, `h`).
///
/// Gameplay code and the dispatcher use integer pixel math throughout so that
/// band splitting and physical-screen mapping round exactly the same way on
/// every backend.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct IRect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl IRect {
    #[inline]
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Builds a rectangle from two corners (`x2`/`y2` exclusive).
    #[inline]
    pub const fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    #[inline]
    pub const fn right(self) -> i32 {
        self.x + self.w
    }

    #[inline]
    pub const fn bottom(self) -> i32 {
        self.y + self.h
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    #[inline]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.w, self.h)
    }

    /// Divides every component by `factor` (truncating toward zero).
    #[inline]
    pub fn div(self, factor: i32) -> Self {
        let f = factor.max(1);
        Self::new(self.x / f, self.y / f, self.w / f, self.h / f)
    }
}
