use super::IRect;

/// Editor state that influences where the game image is shown.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct EditorMode {
    /// The level editor is running.
    pub level_editor: bool,
    /// In-game editing ("magic hand") is running.
    pub magic_hand: bool,
    /// The editor chrome currently owns the secondary screen.
    pub editor_screen_active: bool,
}

impl EditorMode {
    /// True when editor chrome occupies the screen the game would normally use.
    #[inline]
    pub fn screen_in_use(&self) -> bool {
        (self.level_editor || self.magic_hand) && self.editor_screen_active
    }
}

/// Placement of the logical game screen on the physical output.
///
/// `phys` is the destination rectangle in physical screen pixels; it is
/// maintained by the resolution code outside the render layer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScreenLayout {
    pub logical_w: i32,
    pub logical_h: i32,
    pub phys: IRect,
    pub swapped: bool,
    pub editor: EditorMode,
    /// Horizontal distance between the centers of the two physical screens.
    pub editor_offset: i32,
    /// Logical pixels per physical pixel when the editor takes over the screen.
    pub downscale: i32,
}

impl ScreenLayout {
    pub fn new(logical_w: i32, logical_h: i32, phys: IRect) -> Self {
        Self {
            logical_w,
            logical_h,
            phys,
            swapped: false,
            editor: EditorMode::default(),
            editor_offset: 40,
            downscale: 2,
        }
    }

    /// Converts a physical (touch/pointer) position into logical game coordinates.
    pub fn map_to_screen(&self, x: i32, y: i32) -> (i32, i32) {
        if self.editor.screen_in_use() {
            return (x * self.downscale, y * self.downscale);
        }

        let x = if self.swapped { x } else { x + self.editor_offset };
        let pw = self.phys.w.max(1);
        let ph = self.phys.h.max(1);

        (
            (x - self.phys.x) * self.logical_w / pw,
            (y - self.phys.y) * self.logical_h / ph,
        )
    }

    /// Converts logical game coordinates into a physical position.
    pub fn map_from_screen(&self, scr_x: i32, scr_y: i32) -> (i32, i32) {
        if self.editor.screen_in_use() {
            let f = self.downscale.max(1);
            return (scr_x / f, scr_y / f);
        }

        let lw = self.logical_w.max(1);
        let lh = self.logical_h.max(1);
        let mut wx = scr_x * self.phys.w / lw + self.phys.x;
        let wy = scr_y * self.phys.h / lh + self.phys.y;

        if !self.swapped {
            wx -= self.editor_offset;
        }

        (wx, wy)
    }
}

/// Largest rectangle with the aspect ratio of `logical_w`x`logical_h` that
/// fits a `phys_w`x`phys_h` output, centered.
pub fn letterbox(logical_w: i32, logical_h: i32, phys_w: i32, phys_h: i32) -> IRect {
    let (lw, lh) = (logical_w.max(1) as i64, logical_h.max(1) as i64);
    let (pw, ph) = (phys_w.max(0) as i64, phys_h.max(0) as i64);

    let (w, h) = if pw * lh <= ph * lw { (pw, pw * lh / lw) } else { (ph * lw / lh, ph) };
    IRect::new(((pw - w) / 2) as i32, ((ph - h) / 2) as i32, w as i32, h as i32)
}
