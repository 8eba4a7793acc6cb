//! Scrolling sprite grid.

use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use xtech_render::backend::Backend;
use xtech_render::coords::IRect;
use xtech_render::paint::Color;
use xtech_render::render::Renderer;
use xtech_render::texture::{LoadList, TextureHandle};

const BACKGROUND: Color = Color::new(0.08, 0.09, 0.12, 1.0);
const CELL_FRAME: Color = Color::new(0.25, 0.27, 0.33, 1.0);
const HUD: Color = Color::new(0.0, 0.0, 0.0, 0.6);

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "gif", "bmp", "jpg"];

/// Largest `(w, h)` with the aspect of `w`x`h` that fits a `cell`x`cell` box,
/// never scaling up.
pub fn fit(w: i32, h: i32, cell: i32) -> (i32, i32) {
    if w <= 0 || h <= 0 {
        return (0, 0);
    }
    if w <= cell && h <= cell {
        return (w, h);
    }
    if w >= h {
        (cell, (h as i64 * cell as i64 / w as i64).max(1) as i32)
    } else {
        ((w as i64 * cell as i64 / h as i64).max(1) as i32, cell)
    }
}

/// Grid rows intersecting the window `[scroll, scroll + view_h)`.
pub fn visible_rows(scroll: i32, view_h: i32, pitch: i32, rows: usize) -> Range<usize> {
    if pitch <= 0 || view_h <= 0 {
        return 0..0;
    }
    let first = (scroll.max(0) / pitch) as usize;
    let last = ((scroll + view_h - 1).max(0) / pitch) as usize + 1;
    first.min(rows)..last.min(rows)
}

pub struct Gallery {
    textures: Vec<TextureHandle>,
    cell: i32,
    gap: i32,
    speed: i32,
    scroll: i32,
}

impl Gallery {
    pub fn new(cell: i32, speed: i32) -> Self {
        Self { textures: Vec::new(), cell: cell.max(8), gap: 8, speed, scroll: 0 }
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    fn pitch(&self) -> i32 {
        self.cell + self.gap
    }

    fn columns(&self, view_w: i32) -> usize {
        ((view_w - self.gap) / self.pitch()).max(1) as usize
    }

    fn rows(&self, columns: usize) -> usize {
        self.textures.len().div_ceil(columns)
    }

    /// Registers every image in `source` for lazy loading. `source` is a
    /// directory or a `graphics.list` file.
    pub fn load<B: Backend>(&mut self, renderer: &mut Renderer<B>, source: &Path) -> Result<()> {
        if source.is_dir() {
            for path in image_files(source)? {
                self.textures.push(renderer.lazy_load_picture(&path));
            }
        } else {
            let list = LoadList::load(source).with_context(|| format!("cannot read {}", source.display()))?;
            let dir = source.parent().unwrap_or(Path::new("."));
            for entry in &list.entries {
                self.textures.push(renderer.lazy_load_picture_from_list(entry, dir));
            }
        }
        log::info!("{} texture(s) registered from {}", self.textures.len(), source.display());
        Ok(())
    }

    /// Advances the scroll, wrapping back to the top after the last row.
    pub fn tick(&mut self, view_w: i32, view_h: i32) {
        let content = self.rows(self.columns(view_w)) as i32 * self.pitch();
        let range = (content - view_h).max(0);
        self.scroll = if range == 0 { 0 } else { (self.scroll + self.speed) % (range + 1) };
    }

    pub fn draw<B: Backend>(&self, renderer: &mut Renderer<B>) {
        let layout = *renderer.layout();
        let (view_w, view_h) = (layout.logical_w, layout.logical_h);

        renderer.set_target_texture();
        renderer.render_rect(0, 0, view_w, view_h, BACKGROUND, true);

        let columns = self.columns(view_w);
        renderer.offset_viewport(0, -self.scroll);
        for row in visible_rows(self.scroll, view_h, self.pitch(), self.rows(columns)) {
            for col in 0..columns {
                let Some(&tex) = self.textures.get(row * columns + col) else { break };
                let x = self.gap + col as i32 * self.pitch();
                let y = self.gap + row as i32 * self.pitch();
                renderer.render_rect(x - 1, y - 1, self.cell + 2, self.cell + 2, CELL_FRAME, false);

                let Some((w, h)) = renderer.texture(tex).map(|r| (r.w, r.h)) else { continue };
                let (dw, dh) = fit(w, h, self.cell);
                let dst = IRect::new(x + (self.cell - dw) / 2, y + (self.cell - dh) / 2, dw, dh);
                renderer.render_texture_scaled(tex, dst, IRect::new(0, 0, w, h), Color::WHITE);
            }
        }

        renderer.offset_viewport_ignore(true);
        renderer.render_rect(0, view_h - 24, view_w, 24, HUD, true);
        renderer.offset_viewport_ignore(false);
    }
}

fn image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("cannot read {}", dir.display()))? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if is_image {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use xtech_render::texture::{TextureResource, TextureStore};

    // ── fit ───────────────────────────────────────────────────────────────

    #[test]
    fn small_images_keep_their_size() {
        assert_eq!(fit(32, 16, 64), (32, 16));
    }

    #[test]
    fn large_images_shrink_along_the_long_side() {
        assert_eq!(fit(256, 64, 64), (64, 16));
        assert_eq!(fit(64, 512, 64), (8, 64));
        assert_eq!(fit(0, 10, 64), (0, 0));
    }

    // ── scrolling ─────────────────────────────────────────────────────────

    #[test]
    fn visible_rows_cover_the_window() {
        assert_eq!(visible_rows(0, 100, 50, 10), 0..2);
        assert_eq!(visible_rows(30, 100, 50, 10), 0..3);
        assert_eq!(visible_rows(400, 200, 50, 10), 8..10);
        assert_eq!(visible_rows(0, 100, 0, 10), 0..0);
    }

    #[test]
    fn scroll_wraps_after_the_last_row() {
        let mut g = Gallery::new(56, 40);
        let mut store = TextureStore::new();
        g.textures = (0..30).map(|i| store.insert(TextureResource::uninit(format!("{i}.png")))).collect();
        // 800 wide: 12 columns, 3 rows of 64 => content fits a 600-high view
        g.tick(800, 600);
        assert_eq!(g.scroll, 0);

        // 200 wide: 3 columns, 10 rows => 640 content, 40 scroll range
        g.tick(200, 600);
        assert_eq!(g.scroll, 40);
        g.tick(200, 600);
        assert_eq!(g.scroll, 39);
    }
}
