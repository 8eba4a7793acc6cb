//! CPU reference backend.
//!
//! Rasterizes into `RgbaImage`s with nearest sampling and straight-alpha
//! blending. It models the handheld's screen topology (rotated framebuffers,
//! stereo pair, secondary screen) and a finite texture memory pool, which makes
//! it the deterministic backend the render layer is tested against. Every
//! command is also appended to a trace for inspection.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};

use super::decode::decode_rgba;
use super::{
    Backend, BackendImage, Capabilities, DrawImage, HwViewport, ImageSource, Screen, SurfaceId,
    Target, TextureId,
};
use crate::coords::{Affine2, IRect, Rect, Vec2};
use crate::error::{BackendError, BackendResult};
use crate::paint::Color;

/// One physical screen.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ScreenSpec {
    pub screen: Screen,
    /// Display width (as the viewer sees it).
    pub width: u32,
    /// Display height.
    pub height: u32,
    /// Framebuffer stored rotated 90° clockwise.
    pub rotated: bool,
}

impl ScreenSpec {
    fn framebuffer_size(&self) -> (u32, u32) {
        if self.rotated {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }
}

/// The physical screens a backend presents to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenTopology {
    pub screens: Vec<ScreenSpec>,
    pub supports_stereo: bool,
}

impl ScreenTopology {
    /// Stereoscopic 400x240 top screen pair plus a 320x240 bottom screen,
    /// all stored rotated.
    pub fn dual_screen() -> Self {
        let top = |screen| ScreenSpec { screen, width: 400, height: 240, rotated: true };
        Self {
            screens: vec![
                top(Screen::Primary),
                top(Screen::PrimaryRight),
                ScreenSpec { screen: Screen::Secondary, width: 320, height: 240, rotated: true },
            ],
            supports_stereo: true,
        }
    }

    /// A single conventional screen.
    pub fn single(width: u32, height: u32) -> Self {
        Self {
            screens: vec![ScreenSpec { screen: Screen::Primary, width, height, rotated: false }],
            supports_stereo: false,
        }
    }

    pub fn spec(&self, screen: Screen) -> Option<&ScreenSpec> {
        self.screens.iter().find(|s| s.screen == screen)
    }
}

/// Software backend configuration.
#[derive(Debug, Clone)]
pub struct SoftConfig {
    pub topology: ScreenTopology,
    /// Bytes available for uploaded textures (4 bytes per pixel).
    pub texture_memory: usize,
    /// Largest texture or surface dimension.
    pub max_surface_size: u32,
    /// Record every command in the trace.
    pub trace: bool,
}

impl SoftConfig {
    pub fn handheld() -> Self {
        Self {
            topology: ScreenTopology::dual_screen(),
            texture_memory: 24 * 1024 * 1024,
            max_surface_size: 1024,
            trace: true,
        }
    }

    pub fn single_screen(width: u32, height: u32) -> Self {
        Self {
            topology: ScreenTopology::single(width, height),
            texture_memory: 256 * 1024 * 1024,
            max_surface_size: 8192,
            trace: true,
        }
    }

    pub fn with_texture_memory(mut self, bytes: usize) -> Self {
        self.texture_memory = bytes;
        self
    }
}

impl Default for SoftConfig {
    fn default() -> Self {
        Self::handheld()
    }
}

/// A recorded backend command.
#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    LoadTexture { path: PathBuf, result: Result<TextureId, BackendError> },
    FreeTexture(TextureId),
    CreateSurface { id: SurfaceId, w: u32, h: u32 },
    DestroySurface(SurfaceId),
    BeginFrame,
    EndFrame,
    Clear { target: Target, color: Color },
    BeginScene(Target),
    Viewport(HwViewport),
    View(Affine2),
    Rect { target: Target, rect: Rect, color: Color },
    Image { target: Target, draw: DrawImage },
}

struct SoftTexture {
    image: RgbaImage,
    bytes: usize,
}

pub struct SoftBackend {
    config: SoftConfig,

    textures: HashMap<TextureId, SoftTexture>,
    surfaces: HashMap<SurfaceId, RgbaImage>,
    /// Screen contents in display orientation.
    screens: HashMap<Screen, RgbaImage>,
    next_id: u64,
    memory_used: usize,

    target: Target,
    viewport: HwViewport,
    view: Affine2,
    in_frame: bool,
    depth: f32,

    uploads: usize,
    frames: u64,
    trace: Vec<TraceEvent>,
}

impl SoftBackend {
    pub fn new(config: SoftConfig) -> Self {
        let screens = config
            .topology
            .screens
            .iter()
            .map(|s| (s.screen, RgbaImage::new(s.width, s.height)))
            .collect();

        let mut backend = Self {
            config,
            textures: HashMap::new(),
            surfaces: HashMap::new(),
            screens,
            next_id: 1,
            memory_used: 0,
            target: Target::Screen(Screen::Primary),
            viewport: HwViewport::full(1, 1, false),
            view: Affine2::identity(),
            in_frame: false,
            depth: 0.0,
            uploads: 0,
            frames: 0,
            trace: Vec::new(),
        };
        backend.viewport = backend.full_viewport(backend.target);
        backend
    }

    // ── inspection ────────────────────────────────────────────────────────

    pub fn set_depth_slider(&mut self, depth: f32) {
        self.depth = depth.clamp(0.0, 1.0);
    }

    /// Number of successful texture uploads since creation.
    pub fn uploads(&self) -> usize {
        self.uploads
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    pub fn surface_size(&self, id: SurfaceId) -> Option<(u32, u32)> {
        self.surfaces.get(&id).map(|img| img.dimensions())
    }

    pub fn memory_used(&self) -> usize {
        self.memory_used
    }

    pub fn in_frame(&self) -> bool {
        self.in_frame
    }

    /// Pixel of `target` at display coordinates, if inside it.
    pub fn pixel(&self, target: Target, x: u32, y: u32) -> Option<[u8; 4]> {
        let img = match target {
            Target::Screen(s) => self.screens.get(&s)?,
            Target::Surface(id) => self.surfaces.get(&id)?,
        };
        (x < img.width() && y < img.height()).then(|| img.get_pixel(x, y).0)
    }

    pub fn trace(&self) -> &[TraceEvent] {
        &self.trace
    }

    pub fn take_trace(&mut self) -> Vec<TraceEvent> {
        std::mem::take(&mut self.trace)
    }

    fn record(&mut self, ev: TraceEvent) {
        if self.config.trace {
            self.trace.push(ev);
        }
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn full_viewport(&self, target: Target) -> HwViewport {
        let (w, h) = self.framebuffer_size(target);
        HwViewport::full(w as i32, h as i32, self.target_is_rotated(target))
    }

    fn try_load(&mut self, path: &Path) -> BackendResult<BackendImage> {
        let image = decode_rgba(path, self.config.max_surface_size)?;
        let bytes = image.width() as usize * image.height() as usize * 4;
        let free = self.texture_memory_free();
        if bytes > free {
            return Err(BackendError::OutOfMemory { requested: bytes, free });
        }

        let id = TextureId(self.alloc_id());
        let out = BackendImage { id, width: image.width(), height: image.height() };
        self.memory_used += bytes;
        self.uploads += 1;
        self.textures.insert(id, SoftTexture { image, bytes });
        Ok(out)
    }

    // ── rasterizer ────────────────────────────────────────────────────────

    /// Clip rectangle of the current viewport in display space, plus the scene origin.
    fn clip(&self) -> (IRect, Vec2) {
        let (fw, fh) = self.framebuffer_size(self.target);
        let r = self.viewport.display_rect(fw as i32, fh as i32);
        (r, Vec2::from_ints(r.x, r.y))
    }

    fn target_image_mut(&mut self, target: Target) -> Option<RgbaImage> {
        match target {
            Target::Screen(s) => self.screens.remove(&s),
            Target::Surface(id) => self.surfaces.remove(&id),
        }
    }

    fn put_target_image(&mut self, target: Target, img: RgbaImage) {
        match target {
            Target::Screen(s) => {
                self.screens.insert(s, img);
            }
            Target::Surface(id) => {
                self.surfaces.insert(id, img);
            }
        }
    }

    fn source_image(&self, source: ImageSource) -> Option<&RgbaImage> {
        match source {
            ImageSource::Texture(id) => self.textures.get(&id).map(|t| &t.image),
            ImageSource::Surface(id) => self.surfaces.get(&id),
        }
    }

    /// Pixel bounds covered by `rect` under the current view, clipped.
    fn covered(&self, rect: Rect, clip: IRect, origin: Vec2, img: &RgbaImage) -> Option<IRect> {
        let pts = rect.corners().map(|c| self.view.apply(c) + origin);
        let min_x = pts.iter().map(|p| p.x).fold(f32::INFINITY, f32::min).floor() as i32;
        let min_y = pts.iter().map(|p| p.y).fold(f32::INFINITY, f32::min).floor() as i32;
        let max_x = pts.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max).ceil() as i32;
        let max_y = pts.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max).ceil() as i32;

        let x0 = min_x.max(clip.x).max(0);
        let y0 = min_y.max(clip.y).max(0);
        let x1 = max_x.min(clip.right()).min(img.width() as i32);
        let y1 = max_y.min(clip.bottom()).min(img.height() as i32);

        (x1 > x0 && y1 > y0).then(|| IRect::from_corners(x0, y0, x1, y1))
    }

    fn fill(&mut self, rect: Rect, color: Color) {
        let Some(inv) = self.view.inverse() else { return };
        let (clip, origin) = self.clip();
        let target = self.target;
        let Some(mut img) = self.target_image_mut(target) else { return };

        if let Some(area) = self.covered(rect, clip, origin, &img) {
            for py in area.y..area.bottom() {
                for px in area.x..area.right() {
                    let p = Vec2::pixel_center(px, py) - origin;
                    if rect.contains(inv.apply(p)) {
                        blend(img.get_pixel_mut(px as u32, py as u32), color);
                    }
                }
            }
        }

        self.put_target_image(target, img);
    }

    fn blit(&mut self, draw: &DrawImage) {
        let Some(inv) = self.view.inverse() else { return };
        if draw.dst.is_empty() || draw.src.is_empty() {
            return;
        }
        let (clip, origin) = self.clip();
        let target = self.target;
        let Some(mut img) = self.target_image_mut(target) else { return };

        if let (Some(src), Some(area)) =
            (self.source_image(draw.source), self.covered(draw.dst, clip, origin, &img))
        {
            let (sw, sh) = (src.width() as i32, src.height() as i32);
            for py in area.y..area.bottom() {
                for px in area.x..area.right() {
                    let p = inv.apply(Vec2::pixel_center(px, py) - origin);
                    if !draw.dst.contains(p) {
                        continue;
                    }

                    let mut u = (p.x - draw.dst.x()) / draw.dst.w();
                    let mut v = (p.y - draw.dst.y()) / draw.dst.h();
                    if draw.flip.horizontal() {
                        u = 1.0 - u;
                    }
                    if draw.flip.vertical() {
                        v = 1.0 - v;
                    }

                    let sx = (draw.src.x() + u * draw.src.w()).floor() as i32;
                    let sy = (draw.src.y() + v * draw.src.h()).floor() as i32;
                    if sx < 0 || sy < 0 || sx >= sw || sy >= sh {
                        continue;
                    }

                    let s = src.get_pixel(sx as u32, sy as u32).0;
                    let c = Color::from_u8(s[0], s[1], s[2], s[3]);
                    let tinted = Color::new(
                        c.r * draw.tint.r,
                        c.g * draw.tint.g,
                        c.b * draw.tint.b,
                        c.a * draw.tint.a,
                    );
                    blend(img.get_pixel_mut(px as u32, py as u32), tinted);
                }
            }
        }

        self.put_target_image(target, img);
    }
}

/// Straight-alpha source-over.
fn blend(dst: &mut Rgba<u8>, src: Color) {
    let sa = src.a.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    let d = Color::from_u8(dst.0[0], dst.0[1], dst.0[2], dst.0[3]);
    let out_a = sa + d.a * (1.0 - sa);
    let mix = |s: f32, dc: f32| (s * sa + dc * d.a * (1.0 - sa)) / out_a;
    dst.0 = Color::new(mix(src.r, d.r), mix(src.g, d.g), mix(src.b, d.b), out_a).to_u8();
}

impl Backend for SoftBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_stereo: self.config.topology.supports_stereo,
            has_sub_screen: self.config.topology.spec(Screen::Secondary).is_some(),
            max_surface_size: self.config.max_surface_size,
        }
    }

    fn target_is_rotated(&self, target: Target) -> bool {
        match target {
            Target::Screen(s) => self.config.topology.spec(s).is_some_and(|s| s.rotated),
            Target::Surface(_) => false,
        }
    }

    fn framebuffer_size(&self, target: Target) -> (u32, u32) {
        match target {
            Target::Screen(s) => self
                .config
                .topology
                .spec(s)
                .map(ScreenSpec::framebuffer_size)
                .unwrap_or((0, 0)),
            Target::Surface(id) => self.surfaces.get(&id).map(|i| i.dimensions()).unwrap_or((0, 0)),
        }
    }

    fn load_texture(&mut self, path: &Path) -> BackendResult<BackendImage> {
        let result = self.try_load(path);
        self.record(TraceEvent::LoadTexture {
            path: path.to_path_buf(),
            result: result.as_ref().map(|i| i.id).map_err(|e| e.clone()),
        });
        result
    }

    fn free_texture(&mut self, id: TextureId) {
        if let Some(tex) = self.textures.remove(&id) {
            self.memory_used -= tex.bytes;
            self.record(TraceEvent::FreeTexture(id));
        }
    }

    fn texture_memory_free(&self) -> usize {
        self.config.texture_memory.saturating_sub(self.memory_used)
    }

    fn create_surface(&mut self, w: u32, h: u32) -> BackendResult<SurfaceId> {
        let max = self.config.max_surface_size;
        if w == 0 || h == 0 || w > max || h > max {
            return Err(BackendError::SurfaceTooLarge { w, h, max });
        }
        let id = SurfaceId(self.alloc_id());
        self.surfaces.insert(id, RgbaImage::new(w, h));
        self.record(TraceEvent::CreateSurface { id, w, h });
        Ok(id)
    }

    fn destroy_surface(&mut self, id: SurfaceId) {
        if self.surfaces.remove(&id).is_some() {
            self.record(TraceEvent::DestroySurface(id));
        }
    }

    fn begin_frame(&mut self) {
        self.in_frame = true;
        self.record(TraceEvent::BeginFrame);
    }

    fn end_frame(&mut self) {
        self.in_frame = false;
        self.frames += 1;
        self.record(TraceEvent::EndFrame);
    }

    fn clear(&mut self, target: Target, color: Color) {
        if let Some(mut img) = self.target_image_mut(target) {
            let px = Rgba(color.to_u8());
            img.pixels_mut().for_each(|p| *p = px);
            self.put_target_image(target, img);
        }
        self.record(TraceEvent::Clear { target, color });
    }

    fn begin_scene(&mut self, target: Target) {
        self.target = target;
        self.viewport = self.full_viewport(target);
        self.view = Affine2::identity();
        self.record(TraceEvent::BeginScene(target));
    }

    fn set_viewport(&mut self, viewport: HwViewport) {
        self.viewport = viewport;
        self.record(TraceEvent::Viewport(viewport));
    }

    fn set_view(&mut self, view: Affine2) {
        self.view = view;
        self.record(TraceEvent::View(view));
    }

    fn draw_rect(&mut self, rect: Rect, color: Color) {
        self.fill(rect, color);
        self.record(TraceEvent::Rect { target: self.target, rect, color });
    }

    fn draw_image(&mut self, draw: &DrawImage) {
        self.blit(draw);
        self.record(TraceEvent::Image { target: self.target, draw: *draw });
    }

    fn depth_slider(&self) -> f32 {
        if self.config.topology.supports_stereo {
            self.depth
        } else {
            0.0
        }
    }
}
