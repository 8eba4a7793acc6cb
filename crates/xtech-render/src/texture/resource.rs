use std::path::PathBuf;

use crate::backend::BackendImage;

/// Maximum number of backend bands per texture.
pub const MAX_BANDS: usize = 3;

/// A loaded or loadable image.
///
/// Dimensions are logical pixels. The backend image is split into bands of
/// `band_rows` backend rows; band `k` holds backend rows
/// `[k * band_rows, (k + 1) * band_rows)`.
///
/// `inited == false` means the resource is unusable: no band may be bound and
/// draws referencing it are skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureResource {
    pub path: PathBuf,
    pub inited: bool,
    /// Bands are uploaded on first use and may be evicted.
    pub lazy_loaded: bool,
    pub w: i32,
    pub h: i32,
    /// Animation frame size; defaults to the full image.
    pub frame_w: i32,
    pub frame_h: i32,
    /// Logical pixels per texture pixel (the asset downscale, or 1 for full-scale assets).
    pub scale: i32,
    pub bands: [Option<BackendImage>; MAX_BANDS],
    /// Frame counter value of the last draw referencing this texture.
    pub last_draw_frame: u64,
}

impl TextureResource {
    /// An unusable placeholder for `path`.
    pub fn uninit(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            inited: false,
            lazy_loaded: false,
            w: 0,
            h: 0,
            frame_w: 0,
            frame_h: 0,
            scale: 1,
            bands: [None; MAX_BANDS],
            last_draw_frame: 0,
        }
    }

    pub(crate) fn set_size(&mut self, w: i32, h: i32) {
        self.w = w;
        self.h = h;
        self.frame_w = w;
        self.frame_h = h;
    }

    /// True when the primary band is uploaded.
    #[inline]
    pub fn is_resident(&self) -> bool {
        self.bands[0].is_some()
    }

    /// Lazy resource that needs an upload before drawing.
    #[inline]
    pub fn needs_upload(&self) -> bool {
        self.inited && self.lazy_loaded && !self.is_resident()
    }

    pub fn band(&self, k: usize) -> Option<BackendImage> {
        self.bands.get(k).copied().flatten()
    }

    /// Path of band `k`: the base path for band 0, `path + "k"` otherwise.
    pub fn band_path(&self, k: usize) -> PathBuf {
        if k == 0 {
            self.path.clone()
        } else {
            let mut s = self.path.clone().into_os_string();
            s.push(k.to_string());
            PathBuf::from(s)
        }
    }

    /// Detaches every bound band, returning them for release.
    pub(crate) fn take_bands(&mut self) -> Vec<BackendImage> {
        self.bands.iter_mut().filter_map(Option::take).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_paths_append_index() {
        let r = TextureResource::uninit("graphics/background2/background2-1.png");
        assert_eq!(r.band_path(0), PathBuf::from("graphics/background2/background2-1.png"));
        assert_eq!(r.band_path(2), PathBuf::from("graphics/background2/background2-1.png2"));
    }

    #[test]
    fn uninit_never_needs_upload() {
        let mut r = TextureResource::uninit("x.png");
        r.lazy_loaded = true;
        assert!(!r.needs_upload());
        r.inited = true;
        assert!(r.needs_upload());
    }
}
