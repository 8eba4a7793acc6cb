use super::Vec2;

/// 2D affine view transform.
///
/// Maps a local point `p` to target space as
/// `(a·x + c·y + tx, b·x + d·y + ty)`. `translate` and `rotate_degrees`
/// post-multiply, i.e. they operate in the current local frame, which is how
/// the dispatcher pivots a sprite around its rotation center.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Affine2 {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Default for Affine2 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Affine2 {
    #[inline]
    pub const fn identity() -> Self {
        Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, tx: 0.0, ty: 0.0 }
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    #[must_use]
    pub fn translate(self, dx: f32, dy: f32) -> Self {
        Self {
            tx: self.a * dx + self.c * dy + self.tx,
            ty: self.b * dx + self.d * dy + self.ty,
            ..self
        }
    }

    /// Rotates the local frame; positive angles turn clockwise on a +Y-down screen.
    #[must_use]
    pub fn rotate_degrees(self, degrees: f32) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self {
            a: self.a * cos + self.c * sin,
            b: self.b * cos + self.d * sin,
            c: self.c * cos - self.a * sin,
            d: self.d * cos - self.b * sin,
            tx: self.tx,
            ty: self.ty,
        }
    }

    #[inline]
    pub fn apply(&self, p: Vec2) -> Vec2 {
        Vec2::new(
            self.a * p.x + self.c * p.y + self.tx,
            self.b * p.x + self.d * p.y + self.ty,
        )
    }

    /// Returns the inverse transform, or `None` for a degenerate matrix.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() <= f32::EPSILON {
            return None;
        }
        let inv = 1.0 / det;
        let a = self.d * inv;
        let b = -self.b * inv;
        let c = -self.c * inv;
        let d = self.a * inv;
        Some(Self {
            a,
            b,
            c,
            d,
            tx: -(a * self.tx + c * self.ty),
            ty: -(b * self.tx + d * self.ty),
        })
    }
}
