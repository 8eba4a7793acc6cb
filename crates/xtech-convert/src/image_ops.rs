//! Pixel operations of the converter.

use image::{GrayImage, RgbaImage};

/// Nearest-neighbour resample to `1 / factor` of the size, rounding the
/// output size to nearest and sampling each output pixel's centre.
pub fn downscale(img: &RgbaImage, factor: u32) -> RgbaImage {
    if factor <= 1 {
        return img.clone();
    }
    let (w, h) = img.dimensions();
    let nw = ((w + factor / 2) / factor).max(1);
    let nh = ((h + factor / 2) / factor).max(1);

    RgbaImage::from_fn(nw, nh, |x, y| {
        let sx = (((2 * x + 1) * w) / (2 * nw)).min(w - 1);
        let sy = (((2 * y + 1) * h) / (2 * nh)).min(h - 1);
        *img.get_pixel(sx, sy)
    })
}

/// Sets alpha from a black/white mask: white is transparent.
///
/// Returns false (leaving `img` untouched) when the sizes differ.
pub fn apply_gif_mask(img: &mut RgbaImage, mask: &GrayImage) -> bool {
    if img.dimensions() != mask.dimensions() {
        return false;
    }
    for (px, m) in img.pixels_mut().zip(mask.pixels()) {
        px.0[3] = 255 - m.0[0];
    }
    true
}

/// Copies the alpha channel of `alpha` into `img`.
pub fn apply_alpha_from(img: &mut RgbaImage, alpha: &RgbaImage) -> bool {
    if img.dimensions() != alpha.dimensions() {
        return false;
    }
    for (px, a) in img.pixels_mut().zip(alpha.pixels()) {
        px.0[3] = a.0[3];
    }
    true
}

/// Splits `img` into horizontal bands of `band_rows` rows when it is taller
/// than one band. At most `max_bands` are returned; rows past them are lost.
pub fn split_bands(img: &RgbaImage, band_rows: u32, max_bands: usize) -> Vec<RgbaImage> {
    let (w, h) = img.dimensions();
    if h <= band_rows || band_rows == 0 {
        return vec![img.clone()];
    }

    (0..max_bands as u32)
        .map(|k| k * band_rows)
        .take_while(|&y0| y0 < h)
        .map(|y0| {
            let rows = band_rows.min(h - y0);
            image::imageops::crop_imm(img, 0, y0, w, rows).to_image()
        })
        .collect()
}
