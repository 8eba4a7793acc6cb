use std::path::Path;

use crate::backend::{Backend, BackendImage};
use crate::config::RenderConfig;
use crate::error::BackendResult;

use super::list::ListEntry;
use super::resource::MAX_BANDS;
use super::{sidecar, TextureHandle, TextureResource, TextureStore};

/// Decides whether a resident lazy texture is still needed.
///
/// The eviction pass asks this for every resident lazy texture; textures
/// judged unneeded lose their backend bands (dimensions are kept).
pub trait UsagePolicy {
    fn is_needed(&self, handle: TextureHandle, res: &TextureResource, frame: u64) -> bool;
}

/// Keeps textures drawn within the last `grace_frames` frames.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RecentlyDrawn {
    pub grace_frames: u64,
}

impl UsagePolicy for RecentlyDrawn {
    fn is_needed(&self, _handle: TextureHandle, res: &TextureResource, frame: u64) -> bool {
        frame.saturating_sub(res.last_draw_frame) <= self.grace_frames
    }
}

/// Texture loader and residency manager.
///
/// Owns the resource arena. The backend is passed in per call since the
/// renderer owns it alongside the cache.
pub struct TextureCache {
    store: TextureStore,
    policy: Box<dyn UsagePolicy>,
    downscale: i32,
    band_rows: i32,
    low_memory_threshold: usize,
    eviction_passes: u64,
}

impl TextureCache {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            store: TextureStore::new(),
            policy: Box::new(RecentlyDrawn { grace_frames: config.eviction_grace_frames }),
            downscale: config.downscale.max(1),
            band_rows: config.band_rows.max(1),
            low_memory_threshold: config.low_memory_threshold,
            eviction_passes: 0,
        }
    }

    pub fn set_policy(&mut self, policy: Box<dyn UsagePolicy>) {
        self.policy = policy;
    }

    pub fn store(&self) -> &TextureStore {
        &self.store
    }

    pub fn get(&self, h: TextureHandle) -> Option<&TextureResource> {
        self.store.get(h)
    }

    pub fn get_mut(&mut self, h: TextureHandle) -> Option<&mut TextureResource> {
        self.store.get_mut(h)
    }

    /// Number of eviction passes run so far.
    pub fn eviction_passes(&self) -> u64 {
        self.eviction_passes
    }

    /// Resources whose primary band is resident.
    pub fn textures_loaded(&self) -> usize {
        self.store.iter().filter(|(_, r)| r.is_resident()).count()
    }

    /// Logical height above which band `k` is expected for a texture of `scale`.
    fn band_threshold(&self, k: usize, scale: i32) -> i32 {
        k as i32 * self.band_rows * scale
    }

    // ── loading ───────────────────────────────────────────────────────────

    /// Uploads `path` (and its overflow bands) now.
    ///
    /// Failure yields an `inited == false` resource and a warning.
    pub fn load_eager<B: Backend>(&mut self, backend: &mut B, path: &Path) -> TextureHandle {
        self.load_eager_scaled(backend, path, self.downscale)
    }

    /// Like [`load_eager`](Self::load_eager) for images stored at full scale.
    pub fn load_1x<B: Backend>(&mut self, backend: &mut B, path: &Path) -> TextureHandle {
        self.load_eager_scaled(backend, path, 1)
    }

    fn load_eager_scaled<B: Backend>(&mut self, backend: &mut B, path: &Path, scale: i32) -> TextureHandle {
        let mut res = TextureResource::uninit(path);
        res.scale = scale;
        let handle = self.store.insert(res);

        let band0 = match self.upload_with_retry(backend, path, Some(handle), 0) {
            Ok(img) => img,
            Err(e) => {
                log::warn!("failed to load texture {}: {e}", path.display());
                return handle;
            }
        };

        let (w, h) = sidecar::read(path)
            .unwrap_or((band0.width as i32 * scale, band0.height as i32 * scale));

        if let Some(res) = self.store.get_mut(handle) {
            res.inited = true;
            res.set_size(w, h);
            res.bands[0] = Some(band0);
        }
        self.load_overflow_bands(backend, handle, 0);
        self.check_low_memory(backend, handle, 0);
        handle
    }

    /// Registers `path` for upload on first use.
    ///
    /// Dimensions come from the `.size` sidecar, or from a load-and-release
    /// upload when the sidecar is missing or malformed. That upload gets the
    /// same eviction and retry as a real one.
    pub fn load_lazy<B: Backend>(&mut self, backend: &mut B, path: &Path) -> TextureHandle {
        let mut res = TextureResource::uninit(path);
        res.scale = self.downscale;
        res.lazy_loaded = true;
        let scale = res.scale;

        if let Some((w, h)) = sidecar::read(path) {
            res.inited = true;
            res.set_size(w, h);
            return self.store.insert(res);
        }

        let handle = self.store.insert(res);
        match self.upload_with_retry(backend, path, Some(handle), 0) {
            Ok(img) => {
                backend.free_texture(img.id);
                if let Some(res) = self.store.get_mut(handle) {
                    res.inited = true;
                    res.set_size(img.width as i32 * scale, img.height as i32 * scale);
                    log::debug!("measured {} ({}x{})", path.display(), res.w, res.h);
                }
            }
            Err(e) => log::warn!("failed to measure texture {}: {e}", path.display()),
        }
        handle
    }

    /// Registers a lazy texture described by a load-list entry.
    /// Nothing is read from disk.
    pub fn load_lazy_from_list(&mut self, entry: &ListEntry, dir: &Path) -> TextureHandle {
        let mut res = TextureResource::uninit(dir.join(&entry.path));
        res.scale = self.downscale;
        res.lazy_loaded = true;

        match entry.validate() {
            Ok(()) => {
                res.inited = true;
                res.set_size(entry.w, entry.h);
            }
            Err(reason) => log::warn!("graphics.list entry '{}' rejected: {reason}", entry.name),
        }

        self.store.insert(res)
    }

    // ── residency ─────────────────────────────────────────────────────────

    /// Makes a lazy texture resident. Returns whether its primary band is
    /// resident afterwards.
    ///
    /// Running out of memory triggers one eviction pass and exactly one retry.
    /// If the retry fails, or the image is missing or undecodable, the
    /// resource is marked unusable for good.
    pub fn ensure_resident<B: Backend>(&mut self, backend: &mut B, handle: TextureHandle, frame: u64) -> bool {
        let Some(res) = self.store.get(handle) else { return false };
        if !res.needs_upload() {
            return res.inited && res.is_resident();
        }
        let path = res.path.clone();

        match self.upload_with_retry(backend, &path, Some(handle), frame) {
            Ok(img) => {
                if let Some(res) = self.store.get_mut(handle) {
                    res.bands[0] = Some(img);
                }
            }
            Err(e) => {
                log::warn!("failed to load texture {}: {e}", path.display());
                if let Some(res) = self.store.get_mut(handle) {
                    res.inited = false;
                }
                return false;
            }
        }

        self.load_overflow_bands(backend, handle, frame);
        self.check_low_memory(backend, handle, frame);
        true
    }

    /// Alias of [`ensure_resident`](Self::ensure_resident) for preloading.
    pub fn lazy_preload<B: Backend>(&mut self, backend: &mut B, handle: TextureHandle, frame: u64) -> bool {
        self.ensure_resident(backend, handle, frame)
    }

    fn load_overflow_bands<B: Backend>(&mut self, backend: &mut B, handle: TextureHandle, frame: u64) {
        let Some(res) = self.store.get(handle) else { return };
        let (h, scale) = (res.h, res.scale);
        let wanted: Vec<_> = (1..MAX_BANDS)
            .filter(|&k| h > self.band_threshold(k, scale))
            .map(|k| (k, res.band_path(k)))
            .collect();

        for (k, path) in wanted {
            match self.upload_with_retry(backend, &path, Some(handle), frame) {
                Ok(img) => {
                    if let Some(res) = self.store.get_mut(handle) {
                        res.bands[k] = Some(img);
                    }
                }
                Err(e) => log::warn!("texture band {} unavailable: {e}", path.display()),
            }
        }
    }

    /// One upload attempt, plus one eviction pass and a single retry on
    /// memory exhaustion.
    fn upload_with_retry<B: Backend>(
        &mut self,
        backend: &mut B,
        path: &Path,
        loading: Option<TextureHandle>,
        frame: u64,
    ) -> BackendResult<BackendImage> {
        match backend.load_texture(path) {
            Err(e) if e.is_out_of_memory() => {
                log::debug!("{e} while loading {}, evicting", path.display());
                self.evict(backend, loading, frame);
                backend.load_texture(path)
            }
            other => other,
        }
    }

    fn check_low_memory<B: Backend>(&mut self, backend: &mut B, loading: TextureHandle, frame: u64) {
        if backend.texture_memory_free() < self.low_memory_threshold {
            self.evict(backend, Some(loading), frame);
        }
    }

    // ── eviction ──────────────────────────────────────────────────────────

    /// Releases the bands of every resident lazy texture the usage policy
    /// judges unneeded, except `keep`.
    pub fn evict<B: Backend>(&mut self, backend: &mut B, keep: Option<TextureHandle>, frame: u64) {
        self.eviction_passes += 1;
        let policy = &*self.policy;
        let mut freed = 0usize;

        for (handle, res) in self.store.iter_mut() {
            if Some(handle) == keep || !res.lazy_loaded || !res.is_resident() {
                continue;
            }
            if policy.is_needed(handle, res, frame) {
                continue;
            }
            for img in res.take_bands() {
                backend.free_texture(img.id);
            }
            freed += 1;
        }

        log::debug!(
            "eviction pass {}: released {freed} textures, {} bytes free",
            self.eviction_passes,
            backend.texture_memory_free()
        );
    }

    /// Runs an eviction pass on demand.
    pub fn free_unneeded<B: Backend>(&mut self, backend: &mut B, frame: u64) {
        self.evict(backend, None, frame);
    }

    /// Releases the bands of a lazy texture, keeping its dimensions.
    pub fn lazy_unload<B: Backend>(&mut self, backend: &mut B, handle: TextureHandle) {
        let Some(res) = self.store.get_mut(handle) else { return };
        if !res.lazy_loaded {
            return;
        }
        for img in res.take_bands() {
            backend.free_texture(img.id);
        }
    }

    /// Releases the texture and removes it from the arena.
    pub fn delete<B: Backend>(&mut self, backend: &mut B, handle: TextureHandle) {
        if let Some(mut res) = self.store.remove(handle) {
            for img in res.take_bands() {
                backend.free_texture(img.id);
            }
        }
    }

    pub fn mark_drawn(&mut self, handle: TextureHandle, frame: u64) {
        if let Some(res) = self.store.get_mut(handle) {
            res.last_draw_frame = frame;
        }
    }

    /// Releases every texture.
    pub fn clear_all<B: Backend>(&mut self, backend: &mut B) {
        for handle in self.store.handles() {
            self.delete(backend, handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::backend::{SoftBackend, SoftConfig, TraceEvent};

    struct NeverNeeded;

    impl UsagePolicy for NeverNeeded {
        fn is_needed(&self, _: TextureHandle, _: &TextureResource, _: u64) -> bool {
            false
        }
    }

    fn png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255])).save_with_format(&path, image::ImageFormat::Png).unwrap();
        path
    }

    fn setup(memory: usize) -> (tempfile::TempDir, SoftBackend, TextureCache) {
        let dir = tempfile::tempdir().unwrap();
        let backend = SoftBackend::new(SoftConfig::handheld().with_texture_memory(memory));
        let mut config = RenderConfig::handheld();
        config.low_memory_threshold = 0;
        (dir, backend, TextureCache::new(&config))
    }

    fn loads(backend: &SoftBackend) -> usize {
        backend
            .trace()
            .iter()
            .filter(|e| matches!(e, TraceEvent::LoadTexture { .. }))
            .count()
    }

    // ── sidecar / lazy ────────────────────────────────────────────────────

    #[test]
    fn lazy_with_sidecar_reads_no_pixels() {
        let (dir, mut b, mut cache) = setup(1 << 20);
        let path = dir.path().join("npc-1.png");
        sidecar::write(&path, 64, 96).unwrap();

        let h = cache.load_lazy(&mut b, &path);
        let res = cache.get(h).unwrap();
        assert!(res.inited && res.lazy_loaded && !res.is_resident());
        assert_eq!((res.w, res.h), (64, 96));
        assert_eq!(loads(&b), 0);
    }

    #[test]
    fn malformed_sidecar_falls_back_to_measuring() {
        let (dir, mut b, mut cache) = setup(1 << 20);
        let path = png(dir.path(), "npc-2.png", 8, 4);
        std::fs::write(sidecar::sidecar_path(&path), b"garbage").unwrap();

        let h = cache.load_lazy(&mut b, &path);
        let res = cache.get(h).unwrap();
        assert_eq!((res.w, res.h), (16, 8));
        assert!(!res.is_resident());
        assert_eq!(b.texture_count(), 0);
        assert_eq!(loads(&b), 1);
    }

    #[test]
    fn missing_file_is_uninit_without_panicking() {
        let (dir, mut b, mut cache) = setup(1 << 20);
        let h = cache.load_lazy(&mut b, &dir.path().join("nope.png"));
        assert!(!cache.get(h).unwrap().inited);
        assert!(!cache.ensure_resident(&mut b, h, 0));
    }

    #[test]
    fn ensure_resident_twice_uploads_once() {
        let (dir, mut b, mut cache) = setup(1 << 20);
        let path = png(dir.path(), "block-1.png", 16, 16);
        sidecar::write(&path, 32, 32).unwrap();
        let h = cache.load_lazy(&mut b, &path);

        assert!(cache.ensure_resident(&mut b, h, 0));
        assert!(cache.ensure_resident(&mut b, h, 0));
        assert_eq!(b.uploads(), 1);
        assert_eq!(cache.eviction_passes(), 0);
        assert_eq!(cache.textures_loaded(), 1);
    }

    // ── bands ─────────────────────────────────────────────────────────────

    #[test]
    fn tall_texture_loads_only_the_bands_it_needs() {
        let (dir, mut b, mut cache) = setup(1 << 24);
        let path = png(dir.path(), "background2-1.png", 8, 1024);
        png(dir.path(), "background2-1.png1", 8, 476);
        png(dir.path(), "background2-1.png2", 8, 16);
        // 1500 backend rows at half scale
        sidecar::write(&path, 16, 3000).unwrap();

        let h = cache.load_lazy(&mut b, &path);
        assert!(cache.ensure_resident(&mut b, h, 0));
        let res = cache.get(h).unwrap();
        assert!(res.band(0).is_some());
        assert_eq!(res.band(1).map(|i| i.height), Some(476));
        assert!(res.band(2).is_none());
        assert_eq!(b.uploads(), 2);
    }

    #[test]
    fn very_tall_texture_loads_all_three_bands() {
        let (dir, mut b, mut cache) = setup(1 << 24);
        let path = png(dir.path(), "background2-3.png", 8, 1024);
        png(dir.path(), "background2-3.png1", 8, 1024);
        png(dir.path(), "background2-3.png2", 8, 452);
        // 2500 backend rows: past both band thresholds (2048 and 4096 logical)
        sidecar::write(&path, 16, 5000).unwrap();

        let h = cache.load_lazy(&mut b, &path);
        assert!(cache.ensure_resident(&mut b, h, 0));
        let res = cache.get(h).unwrap();
        assert_eq!(res.band(1).map(|i| i.height), Some(1024));
        assert_eq!(res.band(2).map(|i| i.height), Some(452));
        assert_eq!(b.uploads(), 3);
    }

    #[test]
    fn missing_band_keeps_loaded_bands() {
        let (dir, mut b, mut cache) = setup(1 << 24);
        let path = png(dir.path(), "background2-2.png", 8, 1024);
        sidecar::write(&path, 16, 3000).unwrap();

        let h = cache.load_lazy(&mut b, &path);
        assert!(cache.ensure_resident(&mut b, h, 0));
        let res = cache.get(h).unwrap();
        assert!(res.inited && res.band(0).is_some() && res.band(1).is_none());
    }

    #[test]
    fn eager_load_without_sidecar_uses_scaled_pixel_size() {
        let (dir, mut b, mut cache) = setup(1 << 20);
        let path = png(dir.path(), "effect-1.png", 10, 6);
        let h = cache.load_eager(&mut b, &path);
        let res = cache.get(h).unwrap();
        assert!(res.inited && !res.lazy_loaded && res.is_resident());
        assert_eq!((res.w, res.h, res.frame_w, res.frame_h), (20, 12, 20, 12));

        let h1 = cache.load_1x(&mut b, &path);
        assert_eq!(cache.get(h1).map(|r| (r.w, r.h)), Some((10, 6)));
    }

    // ── eviction ──────────────────────────────────────────────────────────

    #[test]
    fn out_of_memory_evicts_once_then_retries() {
        // room for exactly one 16x16 texture
        let (dir, mut b, mut cache) = setup(16 * 16 * 4);
        cache.set_policy(Box::new(NeverNeeded));
        let a = png(dir.path(), "a.png", 16, 16);
        let c = png(dir.path(), "c.png", 16, 16);
        sidecar::write(&a, 32, 32).unwrap();
        sidecar::write(&c, 32, 32).unwrap();

        let ha = cache.load_lazy(&mut b, &a);
        let hc = cache.load_lazy(&mut b, &c);
        assert!(cache.ensure_resident(&mut b, ha, 0));
        assert!(cache.ensure_resident(&mut b, hc, 0));

        assert_eq!(cache.eviction_passes(), 1);
        assert!(!cache.get(ha).unwrap().is_resident());
        assert!(cache.get(ha).unwrap().inited);
        assert!(cache.get(hc).unwrap().is_resident());
    }

    #[test]
    fn lazy_size_read_out_of_memory_evicts_then_retries() {
        let (dir, mut b, mut cache) = setup(16 * 16 * 4);
        cache.set_policy(Box::new(NeverNeeded));
        let a = png(dir.path(), "a.png", 16, 16);
        let c = png(dir.path(), "c.png", 16, 16);
        sidecar::write(&a, 32, 32).unwrap();

        let ha = cache.load_lazy(&mut b, &a);
        assert!(cache.ensure_resident(&mut b, ha, 0));

        // no sidecar: the size comes from a full upload, which needs a's memory
        let hc = cache.load_lazy(&mut b, &c);
        let res = cache.get(hc).unwrap();
        assert!(res.inited && !res.is_resident());
        assert_eq!((res.w, res.h), (32, 32));
        assert_eq!(cache.eviction_passes(), 1);
        assert!(!cache.get(ha).unwrap().is_resident());
        assert_eq!(b.texture_count(), 0);
        assert_eq!(loads(&b), 3);
    }

    #[test]
    fn repeated_out_of_memory_gives_up_after_one_retry() {
        let (dir, mut b, mut cache) = setup(100);
        let path = png(dir.path(), "huge.png", 16, 16);
        sidecar::write(&path, 32, 32).unwrap();
        let h = cache.load_lazy(&mut b, &path);

        assert!(!cache.ensure_resident(&mut b, h, 0));
        assert_eq!(cache.eviction_passes(), 1);
        assert_eq!(loads(&b), 2);
        assert!(!cache.get(h).unwrap().inited);

        // unusable for good: no further attempts
        assert!(!cache.ensure_resident(&mut b, h, 1));
        assert_eq!(loads(&b), 2);
    }

    #[test]
    fn decode_failure_does_not_retry() {
        let (dir, mut b, mut cache) = setup(1 << 20);
        let path = dir.path().join("bad.png");
        std::fs::write(&path, b"nope").unwrap();
        sidecar::write(&path, 4, 4).unwrap();
        let h = cache.load_lazy(&mut b, &path);

        assert!(!cache.ensure_resident(&mut b, h, 0));
        assert_eq!(cache.eviction_passes(), 0);
        assert_eq!(loads(&b), 1);
    }

    #[test]
    fn default_policy_keeps_recently_drawn_textures() {
        let (dir, mut b, mut cache) = setup(1 << 20);
        let old = png(dir.path(), "old.png", 4, 4);
        let new = png(dir.path(), "new.png", 4, 4);
        let ho = cache.load_lazy(&mut b, &old);
        let hn = cache.load_lazy(&mut b, &new);
        cache.ensure_resident(&mut b, ho, 0);
        cache.ensure_resident(&mut b, hn, 0);
        cache.mark_drawn(ho, 2);
        cache.mark_drawn(hn, 10);

        cache.free_unneeded(&mut b, 10);
        assert!(!cache.get(ho).unwrap().is_resident());
        assert!(cache.get(hn).unwrap().is_resident());
    }

    #[test]
    fn low_memory_after_upload_runs_eviction() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = SoftBackend::new(SoftConfig::handheld().with_texture_memory(1 << 20));
        let mut cache = TextureCache::new(&RenderConfig::handheld());
        let path = png(dir.path(), "a.png", 4, 4);
        let h = cache.load_lazy(&mut b, &path);

        assert!(cache.ensure_resident(&mut b, h, 0));
        assert_eq!(cache.eviction_passes(), 1);
        // the texture being loaded is never its own victim
        assert!(cache.get(h).unwrap().is_resident());
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[test]
    fn lazy_unload_keeps_dimensions_and_delete_frees() {
        let (dir, mut b, mut cache) = setup(1 << 20);
        let path = png(dir.path(), "a.png", 4, 4);
        let h = cache.load_lazy(&mut b, &path);
        cache.ensure_resident(&mut b, h, 0);

        cache.lazy_unload(&mut b, h);
        assert_eq!(b.texture_count(), 0);
        assert_eq!(cache.get(h).map(|r| (r.inited, r.w)), Some((true, 8)));

        cache.ensure_resident(&mut b, h, 0);
        cache.delete(&mut b, h);
        assert!(cache.get(h).is_none());
        assert_eq!(b.texture_count(), 0);
    }

    #[test]
    fn list_entries_register_without_io() {
        let (_dir, _b, mut cache) = setup(1 << 20);
        let entry = ListEntry { name: "tile-1".into(), path: "tile-1.png".into(), w: 32, h: 32 };
        let h = cache.load_lazy_from_list(&entry, Path::new("graphics/tile"));
        let res = cache.get(h).unwrap();
        assert!(res.inited && res.lazy_loaded);
        assert_eq!(res.path, PathBuf::from("graphics/tile/tile-1.png"));

        let bad = ListEntry { w: 9000, ..entry };
        let hb = cache.load_lazy_from_list(&bad, Path::new("graphics/tile"));
        assert!(!cache.get(hb).unwrap().inited);
    }

    #[test]
    fn clear_all_releases_everything() {
        let (dir, mut b, mut cache) = setup(1 << 20);
        let path = png(dir.path(), "a.png", 4, 4);
        cache.load_eager(&mut b, &path);
        cache.load_eager(&mut b, &path);
        cache.clear_all(&mut b);
        assert!(cache.store().is_empty());
        assert_eq!(b.memory_used(), 0);
    }
}
