//! Walks the input tree and converts or copies every file.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{ImageFormat, RgbaImage};
use xtech_render::texture::{sidecar, TextureResource, MAX_BANDS};

use crate::image_ops::{apply_alpha_from, apply_gif_mask, downscale, split_bands};

/// Downscale applied to everything not listed in `keep_scale`.
pub const ASSET_DOWNSCALE: u32 = 2;

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// File names converted at full scale.
    pub keep_scale: HashSet<String>,
    /// Convert files whose output already exists.
    pub redo: bool,
    /// Rows per output band.
    pub band_rows: u32,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub converted: usize,
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Action {
    Convert,
    /// `<name>m.gif` next to `<name>.gif`; merged into it.
    Mask,
    Ignore,
    Copy,
}

fn classify(dir: &Path, name: &str) -> Action {
    let lower = name.to_ascii_lowercase();
    if lower.ends_with(".db") {
        Action::Ignore
    } else if lower.ends_with("m.gif") && dir.join(format!("{}.gif", &name[..name.len() - 5])).is_file() {
        Action::Mask
    } else if lower.ends_with(".png") || lower.ends_with(".gif") {
        Action::Convert
    } else {
        Action::Copy
    }
}

/// Output image name: the input stem with a `.png` extension.
fn output_name(name: &str) -> String {
    match name.rfind('.') {
        Some(dot) => format!("{}.png", &name[..dot]),
        None => format!("{name}.png"),
    }
}

pub struct Converter<'a> {
    input: &'a Path,
    output: &'a Path,
    opts: &'a ConvertOptions,
    summary: Summary,
}

impl<'a> Converter<'a> {
    pub fn new(input: &'a Path, output: &'a Path, opts: &'a ConvertOptions) -> Self {
        Self { input, output, opts, summary: Summary::default() }
    }

    /// Converts the whole input tree into the output tree.
    pub fn run(mut self) -> Result<Summary> {
        self.visit(self.input, PathBuf::new())?;
        Ok(self.summary)
    }

    fn visit(&mut self, dir: &Path, rel: PathBuf) -> Result<()> {
        let out_dir = self.output.join(&rel);
        fs::create_dir_all(&out_dir).with_context(|| format!("cannot create {}", out_dir.display()))?;

        let mut entries: Vec<_> = fs::read_dir(dir)
            .with_context(|| format!("cannot read {}", dir.display()))?
            .collect::<std::io::Result<_>>()?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if path.is_dir() {
                self.visit(&path, rel.join(&name))?;
                continue;
            }

            match classify(dir, &name) {
                Action::Convert => self.convert(&path, &name, &out_dir),
                Action::Copy => self.copy(&path, &out_dir.join(&name))?,
                Action::Mask | Action::Ignore => {}
            }
        }
        Ok(())
    }

    fn copy(&mut self, src: &Path, dst: &Path) -> Result<()> {
        if !self.opts.redo && dst.exists() {
            self.summary.skipped += 1;
            return Ok(());
        }
        fs::copy(src, dst).with_context(|| format!("cannot copy {}", src.display()))?;
        self.summary.copied += 1;
        Ok(())
    }

    fn convert(&mut self, src: &Path, name: &str, out_dir: &Path) {
        let dst = out_dir.join(output_name(name));
        if !self.opts.redo && dst.exists() {
            self.summary.skipped += 1;
            return;
        }

        let factor = if self.opts.keep_scale.contains(name) { 1 } else { ASSET_DOWNSCALE };
        match self.convert_image(src, name, &dst, factor) {
            Ok(bands) => {
                log::info!("{} -> {} ({bands} band(s))", src.display(), dst.display());
                self.summary.converted += 1;
            }
            Err(e) => {
                log::warn!("{}: {e:#}", src.display());
                self.summary.failed += 1;
            }
        }
    }

    fn convert_image(&self, src: &Path, name: &str, dst: &Path, factor: u32) -> Result<usize> {
        let mut img = image::open(src).context("cannot decode")?.to_rgba8();
        if name.to_ascii_lowercase().ends_with(".gif") {
            self.merge_mask(src, name, &mut img);
        }

        let out = downscale(&img, factor);
        let bands = split_bands(&out, self.opts.band_rows, MAX_BANDS);
        if out.height() > self.opts.band_rows * MAX_BANDS as u32 {
            log::warn!("{}: rows past band {MAX_BANDS} dropped", src.display());
        }

        let res = TextureResource::uninit(dst);
        for (k, band) in bands.iter().enumerate() {
            let path = res.band_path(k);
            band.save_with_format(&path, ImageFormat::Png)
                .with_context(|| format!("cannot write {}", path.display()))?;
        }

        if let Err(e) = sidecar::write(dst, out.width() * factor, out.height() * factor) {
            log::warn!("{}: no size sidecar: {e}", dst.display());
        }
        Ok(bands.len())
    }

    /// Applies `<stem>m.gif` from the same directory, or failing that the
    /// default mask (`graphics/<kind>/<stem>m.gif` or `.png`) when the sizes match.
    fn merge_mask(&self, src: &Path, name: &str, img: &mut RgbaImage) {
        let stem = &name[..name.len() - 4];
        let same_dir = src.with_file_name(format!("{stem}m.gif"));

        let applied = if same_dir.is_file() {
            load_gray(&same_dir).is_some_and(|m| apply_gif_mask(img, &m))
        } else {
            let Some(dash) = name.rfind('-') else { return };
            let kind_dir = self.input.join("graphics").join(&name[..dash]);
            let alt_gif = kind_dir.join(format!("{stem}m.gif"));
            let alt_png = kind_dir.join(format!("{stem}.png"));

            if alt_gif.is_file() {
                load_gray(&alt_gif).is_some_and(|m| apply_gif_mask(img, &m))
            } else if alt_png.is_file() {
                image::open(&alt_png).ok().is_some_and(|m| apply_alpha_from(img, &m.to_rgba8()))
            } else {
                return;
            }
        };

        if !applied {
            log::debug!("{}: mask not applied (missing or size mismatch)", src.display());
        }
    }
}

fn load_gray(path: &Path) -> Option<image::GrayImage> {
    image::open(path).ok().map(|m| m.to_luma8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba};

    fn options() -> ConvertOptions {
        ConvertOptions { keep_scale: HashSet::new(), redo: false, band_rows: 1024 }
    }

    fn save_mask(mask: &GrayImage, path: &Path) {
        image::DynamicImage::ImageLuma8(mask.clone())
            .to_rgb8()
            .save_with_format(path, ImageFormat::Gif)
            .unwrap();
    }

    fn solid(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]))
    }

    // ── classify ──────────────────────────────────────────────────────────

    #[test]
    fn masks_are_recognized_only_next_to_their_image() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("npc-1.gif"), b"").unwrap();
        assert_eq!(classify(dir.path(), "npc-1m.gif"), Action::Mask);
        assert_eq!(classify(dir.path(), "npc-2m.gif"), Action::Convert);
        assert_eq!(classify(dir.path(), "Thumbs.db"), Action::Ignore);
        assert_eq!(classify(dir.path(), "level.lvl"), Action::Copy);
        assert_eq!(output_name("npc-1.gif"), "npc-1.png");
    }

    // ── conversion ────────────────────────────────────────────────────────

    #[test]
    fn converts_halves_and_writes_sidecar() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        solid(64, 32).save(input.path().join("block-1.png")).unwrap();
        fs::write(input.path().join("level.lvl"), b"data").unwrap();

        let opts = options();
        let summary = Converter::new(input.path(), output.path(), &opts).run().unwrap();
        assert_eq!(summary, Summary { converted: 1, copied: 1, skipped: 0, failed: 0 });

        let out = output.path().join("block-1.png");
        assert_eq!(image::open(&out).unwrap().to_rgba8().dimensions(), (32, 16));
        assert_eq!(sidecar::read(&out), Some((64, 32)));
        assert_eq!(fs::read(output.path().join("level.lvl")).unwrap(), b"data");
    }

    #[test]
    fn keep_scale_files_stay_full_size() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        solid(20, 10).save(input.path().join("font-1.png")).unwrap();

        let mut opts = options();
        opts.keep_scale.insert("font-1.png".into());
        Converter::new(input.path(), output.path(), &opts).run().unwrap();

        let out = output.path().join("font-1.png");
        assert_eq!(image::open(&out).unwrap().to_rgba8().dimensions(), (20, 10));
        assert_eq!(sidecar::read(&out), Some((20, 10)));
    }

    #[test]
    fn tall_images_get_overflow_bands() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        solid(4, 2400).save(input.path().join("background2-1.png")).unwrap();

        let mut opts = options();
        opts.band_rows = 512;
        Converter::new(input.path(), output.path(), &opts).run().unwrap();

        let out = output.path().join("background2-1.png");
        assert_eq!(image::open(&out).unwrap().to_rgba8().dimensions(), (2, 512));
        let band1 = output.path().join("background2-1.png1");
        let band2 = output.path().join("background2-1.png2");
        let h1 = image::ImageReader::open(&band1).unwrap().with_guessed_format().unwrap().decode().unwrap().height();
        let h2 = image::ImageReader::open(&band2).unwrap().with_guessed_format().unwrap().decode().unwrap().height();
        assert_eq!((h1, h2), (512, 176));
        assert_eq!(sidecar::read(&out), Some((4, 2400)));
    }

    #[test]
    fn gif_masks_are_merged_and_not_copied() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        solid(4, 4).save_with_format(input.path().join("npc-3.gif"), ImageFormat::Gif).unwrap();
        let mut mask = GrayImage::new(4, 4);
        mask.put_pixel(0, 0, Luma([255]));
        mask.put_pixel(1, 0, Luma([255]));
        save_mask(&mask, &input.path().join("npc-3m.gif"));

        let opts = options();
        let summary = Converter::new(input.path(), output.path(), &opts).run().unwrap();
        assert_eq!(summary.converted, 1);
        assert!(!output.path().join("npc-3m.png").exists());

        // 2x2 output samples source pixels (1,1), (3,1), (1,3), (3,3)
        let out = image::open(output.path().join("npc-3.png")).unwrap().to_rgba8();
        assert_eq!(out.get_pixel(0, 0).0[3], 255);
        let mut masked = GrayImage::new(4, 4);
        masked.put_pixel(1, 1, Luma([255]));
        save_mask(&masked, &input.path().join("npc-3m.gif"));
        let mut redo = options();
        redo.redo = true;
        Converter::new(input.path(), output.path(), &redo).run().unwrap();
        let out = image::open(output.path().join("npc-3.png")).unwrap().to_rgba8();
        assert_eq!(out.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn existing_outputs_are_skipped_without_redo() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        solid(8, 8).save(input.path().join("tile-1.png")).unwrap();

        let opts = options();
        Converter::new(input.path(), output.path(), &opts).run().unwrap();
        let again = Converter::new(input.path(), output.path(), &opts).run().unwrap();
        assert_eq!(again, Summary { converted: 0, copied: 0, skipped: 1, failed: 0 });
    }

    #[test]
    fn undecodable_images_are_counted_as_failures() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::write(input.path().join("npc-9.png"), b"garbage").unwrap();

        let opts = options();
        let summary = Converter::new(input.path(), output.path(), &opts).run().unwrap();
        assert_eq!(summary.failed, 1);
    }
}
