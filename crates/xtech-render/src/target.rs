//! Layer surfaces.
//!
//! Gameplay draws into off-screen layers that the composition stage later
//! places on the physical screens. Layer surfaces are allocated in size tiers
//! and only the top-left sub-region is used.

use crate::backend::{Backend, SurfaceId};
use crate::config::{size_tier, RenderConfig, MAX_LAYERS};

/// The used part of a layer surface.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct SubRegion {
    /// Used size in backend pixels.
    pub w: i32,
    pub h: i32,
    /// Allocated size.
    pub mem_w: i32,
    pub mem_h: i32,
    /// Used fraction of the allocation (texture coordinate extents).
    pub u1: f32,
    pub v1: f32,
}

impl SubRegion {
    fn new(w: i32, h: i32, mem_w: i32, mem_h: i32) -> Self {
        Self {
            w,
            h,
            mem_w,
            mem_h,
            u1: w as f32 / mem_w.max(1) as f32,
            v1: h as f32 / mem_h.max(1) as f32,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
struct Requested {
    w: i32,
    h: i32,
    swapped: bool,
}

/// Owns the layer surfaces.
///
/// Either every layer exists with the same size, or none does.
#[derive(Debug, Default)]
pub struct RenderTargets {
    layers: Vec<SurfaceId>,
    requested: Option<Requested>,
    sub: SubRegion,
    single_layer: bool,
}

impl RenderTargets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sizes the layers for a logical screen of `logical_w`x`logical_h`.
    ///
    /// Layers are recreated only when the requested size or swap mode changed
    /// (or a previous allocation failed). Returns true when layers were recreated.
    pub fn apply_resolution<B: Backend>(
        &mut self,
        backend: &mut B,
        config: &RenderConfig,
        logical_w: i32,
        logical_h: i32,
        swapped: bool,
    ) -> bool {
        let req = Requested { w: logical_w, h: logical_h, swapped };
        if self.requested == Some(req) && !self.layers.is_empty() {
            return false;
        }

        let downscale = config.downscale.max(1);
        let tex_w = (logical_w / downscale).max(1);
        let tex_h = (logical_h / downscale).max(1);
        let max_surface = backend.capabilities().max_surface_size.min(i32::MAX as u32) as i32;
        let mem_w = size_tier(tex_w, config.max_layer_w.min(max_surface));
        let mem_h = size_tier(tex_h, config.max_layer_h.min(max_surface));

        let single_layer = (mem_w >= 512 && mem_h == 512) || swapped;
        let count = if single_layer { 1 } else { MAX_LAYERS };

        self.destroy_all(backend);
        self.requested = Some(req);

        for _ in 0..count {
            match backend.create_surface(mem_w as u32, mem_h as u32) {
                Ok(id) => self.layers.push(id),
                Err(e) => {
                    log::warn!("failed to create {mem_w}x{mem_h} layer: {e}");
                    self.destroy_all(backend);
                    return true;
                }
            }
        }

        self.single_layer = single_layer;
        self.sub = SubRegion::new(tex_w.min(mem_w), tex_h.min(mem_h), mem_w, mem_h);
        log::debug!(
            "layers recreated: {count} x {mem_w}x{mem_h}, using {}x{}",
            self.sub.w,
            self.sub.h
        );
        true
    }

    /// Destroys every layer surface.
    pub fn destroy_all<B: Backend>(&mut self, backend: &mut B) {
        for id in self.layers.drain(..) {
            backend.destroy_surface(id);
        }
    }

    /// Layer `n`, folded onto layer 0 in single-layer mode.
    pub fn layer(&self, n: usize) -> Option<SurfaceId> {
        let n = if self.single_layer { 0 } else { n };
        self.layers.get(n).copied()
    }

    pub fn layers(&self) -> &[SurfaceId] {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn is_ready(&self) -> bool {
        !self.layers.is_empty()
    }

    pub fn single_layer(&self) -> bool {
        self.single_layer
    }

    pub fn sub_region(&self) -> SubRegion {
        self.sub
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SoftBackend, SoftConfig, TraceEvent};

    fn creates(b: &SoftBackend) -> usize {
        b.trace().iter().filter(|e| matches!(e, TraceEvent::CreateSurface { .. })).count()
    }

    #[test]
    fn handheld_resolution_uses_four_layers() {
        let mut b = SoftBackend::new(SoftConfig::handheld());
        let mut t = RenderTargets::new();
        assert!(t.apply_resolution(&mut b, &RenderConfig::handheld(), 800, 480, false));

        assert_eq!(t.layer_count(), 4);
        assert!(!t.single_layer());
        let sub = t.sub_region();
        assert_eq!((sub.w, sub.h, sub.mem_w, sub.mem_h), (400, 240, 512, 256));
        assert!((sub.u1 - 400.0 / 512.0).abs() < 1e-6);
        assert!((sub.v1 - 240.0 / 256.0).abs() < 1e-6);
        assert_eq!(b.surface_size(t.layer(3).unwrap()), Some((512, 256)));
    }

    #[test]
    fn large_tier_falls_back_to_single_layer() {
        let mut b = SoftBackend::new(SoftConfig::handheld());
        let mut t = RenderTargets::new();
        t.apply_resolution(&mut b, &RenderConfig::handheld(), 1066, 600, false);

        assert!(t.single_layer());
        assert_eq!(t.layer_count(), 1);
        assert_eq!(t.layer(2), t.layer(0));
        let sub = t.sub_region();
        assert_eq!((sub.w, sub.h, sub.mem_w, sub.mem_h), (533, 300, 1024, 512));
    }

    #[test]
    fn oversized_request_is_clamped_to_tier() {
        let mut b = SoftBackend::new(SoftConfig::handheld());
        let mut t = RenderTargets::new();
        t.apply_resolution(&mut b, &RenderConfig::handheld(), 4000, 2000, false);
        let sub = t.sub_region();
        assert_eq!((sub.w, sub.h), (1024, 512));
        assert_eq!((sub.u1, sub.v1), (1.0, 1.0));
    }

    #[test]
    fn swapped_mode_is_single_layer() {
        let mut b = SoftBackend::new(SoftConfig::handheld());
        let mut t = RenderTargets::new();
        t.apply_resolution(&mut b, &RenderConfig::handheld(), 640, 480, true);
        assert!(t.single_layer());
        assert_eq!(t.layer_count(), 1);
    }

    #[test]
    fn unchanged_request_does_not_recreate() {
        let mut b = SoftBackend::new(SoftConfig::handheld());
        let mut t = RenderTargets::new();
        let c = RenderConfig::handheld();
        t.apply_resolution(&mut b, &c, 4000, 2000, false);
        assert!(!t.apply_resolution(&mut b, &c, 4000, 2000, false));
        assert_eq!(creates(&b), 1);

        assert!(t.apply_resolution(&mut b, &c, 800, 480, false));
        assert_eq!(b.surface_count(), 4);
    }

    #[test]
    fn tier_is_capped_by_backend_surface_limit() {
        let mut config = SoftConfig::handheld();
        config.max_surface_size = 256;
        let mut b = SoftBackend::new(config);
        let mut t = RenderTargets::new();

        assert!(t.apply_resolution(&mut b, &RenderConfig::handheld(), 800, 480, false));
        assert_eq!(t.layer_count(), 4);
        let sub = t.sub_region();
        assert_eq!((sub.w, sub.h, sub.mem_w, sub.mem_h), (256, 240, 256, 256));
        assert_eq!(b.surface_size(t.layer(0).unwrap()), Some((256, 256)));
    }

    #[test]
    fn failed_allocation_leaves_no_layers() {
        // below the smallest tier
        let mut config = SoftConfig::handheld();
        config.max_surface_size = 128;
        let mut b = SoftBackend::new(config);
        let mut t = RenderTargets::new();

        t.apply_resolution(&mut b, &RenderConfig::handheld(), 800, 480, false);
        assert!(!t.is_ready());
        assert_eq!(b.surface_count(), 0);
        assert_eq!(t.layer(0), None);
    }
}
