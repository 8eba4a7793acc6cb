use core::ops::{Add, Sub};

/// Point or offset in backend pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Integer pixel corner.
    #[inline]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(x as f32, y as f32)
    }

    /// Sample point of pixel (`px`, `py`); rasterization tests coverage here.
    #[inline]
    pub fn pixel_center(px: i32, py: i32) -> Self {
        Self::new(px as f32 + 0.5, py as f32 + 0.5)
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    #[inline]
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    #[inline]
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_center_is_half_a_pixel_in() {
        assert_eq!(Vec2::pixel_center(3, -1), Vec2::new(3.5, -0.5));
        assert_eq!(Vec2::pixel_center(2, 2) - Vec2::from_ints(2, 2), Vec2::new(0.5, 0.5));
    }
}
