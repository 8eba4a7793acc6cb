//! wgpu backend for desktop builds.
//!
//! One window, one unrotated primary screen, no stereo and no secondary
//! screen. Layer surfaces are render-attachment textures that can also be
//! sampled. Commands are recorded during the frame and encoded into a
//! single command buffer at [`Backend::end_frame`].

mod batch;
mod gpu;
mod pipeline;

use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use self::batch::{normalized_uv, FrameRecorder, SceneState, Source};
use self::gpu::{GpuContext, SurfaceErrorAction};
use self::pipeline::{QuadPipeline, QuadVertex, IMAGE_FORMAT};
use super::decode::decode_rgba;
use super::{
    Backend, BackendImage, Capabilities, DrawImage, Flip, HwViewport, ImageSource, Screen,
    SurfaceId, Target, TextureId,
};
use crate::coords::{Affine2, Rect};
use crate::error::{BackendError, BackendResult};
use crate::paint::Color;

/// Initialization parameters for the wgpu backend.
#[derive(Debug, Clone)]
pub struct WgpuInit {
    /// Prefer an sRGB swapchain. Off by default: assets are blended as
    /// stored, like on the handheld.
    pub prefer_srgb: bool,
    pub present_mode: wgpu::PresentMode,
    /// Used when supported by the surface.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,
    pub power_preference: wgpu::PowerPreference,
    pub required_limits: wgpu::Limits,
    pub desired_maximum_frame_latency: u32,
    /// Bytes of uploaded textures kept before the cache starts evicting.
    pub texture_memory_budget: usize,
}

impl Default for WgpuInit {
    fn default() -> Self {
        Self {
            prefer_srgb: false,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            power_preference: wgpu::PowerPreference::HighPerformance,
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
            texture_memory_budget: 512 * 1024 * 1024,
        }
    }
}

/// A texture plus the bind group that samples it.
struct GpuImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
    bytes: usize,
}

impl GpuImage {
    fn create(
        device: &wgpu::Device,
        quads: &QuadPipeline,
        width: u32,
        height: u32,
        usage: wgpu::TextureUsages,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: IMAGE_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = quads.bind(device, &view);
        Self {
            texture,
            view,
            bind_group,
            width,
            height,
            bytes: width as usize * height as usize * 4,
        }
    }

    fn write(&self, queue: &wgpu::Queue, rgba: &[u8]) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.width * 4),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d { width: self.width, height: self.height, depth_or_array_layers: 1 },
        );
    }
}

pub struct WgpuBackend<'w> {
    gpu: GpuContext<'w>,
    quads: QuadPipeline,
    /// 1x1 opaque white, sampled by solid rects.
    white: GpuImage,

    textures: HashMap<TextureId, GpuImage>,
    surfaces: HashMap<SurfaceId, GpuImage>,
    /// Released during the frame; recorded draws may still sample them.
    retired_textures: HashMap<TextureId, GpuImage>,
    retired_surfaces: HashMap<SurfaceId, GpuImage>,
    next_id: u64,

    memory_budget: usize,
    memory_used: usize,
    max_dimension: u32,

    recorder: FrameRecorder,
    scene: SceneState,
    in_frame: bool,
    vertex_buffer: Option<wgpu::Buffer>,
    vertex_capacity: usize,
    frames: u64,
    lost: bool,
}

impl<'w> WgpuBackend<'w> {
    /// Creates the device and the swapchain for `window`.
    pub async fn new(window: &'w Window, init: WgpuInit) -> Result<Self> {
        let gpu = GpuContext::new(window, &init).await?;
        let quads = QuadPipeline::new(gpu.device());

        let white = GpuImage::create(
            gpu.device(),
            &quads,
            1,
            1,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            "xtech white",
        );
        white.write(gpu.queue(), &[255; 4]);

        let max_dimension = gpu.device().limits().max_texture_dimension_2d;
        let size = gpu.size();
        log::info!(
            "wgpu backend on {} ({}x{}, {:?}, max texture {max_dimension})",
            gpu.adapter_name(),
            size.width,
            size.height,
            gpu.surface_format()
        );

        Ok(Self {
            scene: SceneState::new(Target::Screen(Screen::Primary), size.width, size.height),
            gpu,
            quads,
            white,
            textures: HashMap::new(),
            surfaces: HashMap::new(),
            retired_textures: HashMap::new(),
            retired_surfaces: HashMap::new(),
            next_id: 1,
            memory_budget: init.texture_memory_budget,
            memory_used: 0,
            max_dimension,
            recorder: FrameRecorder::default(),
            in_frame: false,
            vertex_buffer: None,
            vertex_capacity: 0,
            frames: 0,
            lost: false,
        })
    }

    /// Reconfigures the swapchain after a window resize.
    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.gpu.resize(size);
    }

    pub fn surface_size(&self) -> PhysicalSize<u32> {
        self.gpu.size()
    }

    /// True after an unrecoverable surface error; the window should close.
    pub fn is_lost(&self) -> bool {
        self.lost
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn image(&self, source: Source) -> Option<&GpuImage> {
        match source {
            Source::White => Some(&self.white),
            Source::Image(ImageSource::Texture(id)) => {
                self.textures.get(&id).or_else(|| self.retired_textures.get(&id))
            }
            Source::Image(ImageSource::Surface(id)) => {
                self.surfaces.get(&id).or_else(|| self.retired_surfaces.get(&id))
            }
        }
    }

    /// Only the primary screen and live surfaces receive draws.
    fn drawable(&self, target: Target) -> bool {
        match target {
            Target::Screen(s) => s == Screen::Primary,
            Target::Surface(id) => self.surfaces.contains_key(&id),
        }
    }

    fn record_quad(&mut self, source: Source, dst: Rect, uv: [f32; 4], flip: Flip, tint: Color) {
        let target = self.scene.target;
        if !self.drawable(target) {
            return;
        }
        let Some(scissor) = self.scene.scissor() else { return };
        let quad = self.scene.quad(dst, uv, flip, tint);
        self.recorder.push_quad(target, source, scissor, quad);
    }

    fn upload_vertices(&mut self) {
        let vertices = self.recorder.vertices();
        if vertices.is_empty() {
            return;
        }

        if vertices.len() > self.vertex_capacity || self.vertex_buffer.is_none() {
            let cap = vertices.len().next_power_of_two().max(1024);
            self.vertex_buffer = Some(self.gpu.device().create_buffer(&wgpu::BufferDescriptor {
                label: Some("xtech quad vbo"),
                size: (cap * std::mem::size_of::<QuadVertex>()) as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.vertex_capacity = cap;
        }

        if let Some(vbo) = self.vertex_buffer.as_ref() {
            self.gpu.queue().write_buffer(vbo, 0, bytemuck::cast_slice(vertices));
        }
    }

    fn acquire_screen(&mut self) -> Option<wgpu::SurfaceTexture> {
        match self.gpu.acquire() {
            Ok(t) => Some(t),
            Err(e) => {
                match self.gpu.handle_surface_error(e) {
                    SurfaceErrorAction::Fatal => {
                        log::error!("surface lost for good; no further frames will be shown");
                        self.lost = true;
                    }
                    action => log::debug!("frame skipped: {action:?}"),
                }
                None
            }
        }
    }

    /// Encodes the recorded passes and presents the swapchain image.
    fn submit_frame(&mut self) {
        if self.recorder.is_empty() {
            return;
        }

        let screen = Target::Screen(Screen::Primary);
        let frame = if self.recorder.passes().iter().any(|p| p.target == screen) {
            self.acquire_screen()
        } else {
            None
        };
        let screen_view = frame
            .as_ref()
            .map(|f| f.texture.create_view(&wgpu::TextureViewDescriptor::default()));

        self.upload_vertices();
        let surface_format = self.gpu.surface_format();
        self.quads.ensure(self.gpu.device(), surface_format);
        self.quads.ensure(self.gpu.device(), IMAGE_FORMAT);

        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("xtech frame encoder") });

        let size = self.gpu.size();
        for pass in self.recorder.passes() {
            let (view, format, tw, th) = match pass.target {
                Target::Screen(_) => match screen_view.as_ref() {
                    Some(v) => (v, surface_format, size.width, size.height),
                    None => continue,
                },
                Target::Surface(id) => {
                    match self.surfaces.get(&id).or_else(|| self.retired_surfaces.get(&id)) {
                        Some(img) => (&img.view, IMAGE_FORMAT, img.width, img.height),
                        None => continue,
                    }
                }
            };

            let load = match pass.clear {
                Some(c) => wgpu::LoadOp::Clear(wgpu::Color {
                    r: c.r as f64,
                    g: c.g as f64,
                    b: c.b as f64,
                    a: c.a as f64,
                }),
                None => wgpu::LoadOp::Load,
            };

            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("xtech pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations { load, store: wgpu::StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if pass.draws.is_empty() {
                continue;
            }
            let (Some(pipeline), Some(vbo)) = (self.quads.get(format), self.vertex_buffer.as_ref()) else {
                continue;
            };
            rpass.set_pipeline(pipeline);
            rpass.set_vertex_buffer(0, vbo.slice(..));

            for draw in &pass.draws {
                let Some(img) = self.image(draw.source) else { continue };
                let Some(s) = draw.scissor.clamped(tw, th) else { continue };
                rpass.set_bind_group(0, &img.bind_group, &[]);
                rpass.set_scissor_rect(s.x, s.y, s.w, s.h);
                rpass.draw(draw.vertices.clone(), 0..1);
            }
        }

        self.gpu.queue().submit(std::iter::once(encoder.finish()));
        if let Some(frame) = frame {
            frame.present();
        }
    }
}

impl Backend for WgpuBackend<'_> {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_stereo: false,
            has_sub_screen: false,
            max_surface_size: self.max_dimension,
        }
    }

    fn target_is_rotated(&self, _target: Target) -> bool {
        false
    }

    fn framebuffer_size(&self, target: Target) -> (u32, u32) {
        match target {
            Target::Screen(_) => {
                let s = self.gpu.size();
                (s.width.max(1), s.height.max(1))
            }
            Target::Surface(id) => self.surfaces.get(&id).map_or((0, 0), |s| (s.width, s.height)),
        }
    }

    fn load_texture(&mut self, path: &Path) -> BackendResult<BackendImage> {
        let rgba = decode_rgba(path, self.max_dimension)?;
        let (width, height) = rgba.dimensions();
        let bytes = width as usize * height as usize * 4;
        let free = self.texture_memory_free();
        if bytes > free {
            return Err(BackendError::OutOfMemory { requested: bytes, free });
        }

        let image = GpuImage::create(
            self.gpu.device(),
            &self.quads,
            width,
            height,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            "xtech texture",
        );
        image.write(self.gpu.queue(), rgba.as_raw());

        let id = TextureId(self.alloc_id());
        self.memory_used += image.bytes;
        self.textures.insert(id, image);
        Ok(BackendImage { id, width, height })
    }

    fn free_texture(&mut self, id: TextureId) {
        let Some(image) = self.textures.remove(&id) else { return };
        self.memory_used = self.memory_used.saturating_sub(image.bytes);
        if self.in_frame {
            self.retired_textures.insert(id, image);
        }
    }

    fn texture_memory_free(&self) -> usize {
        self.memory_budget.saturating_sub(self.memory_used)
    }

    fn create_surface(&mut self, w: u32, h: u32) -> BackendResult<SurfaceId> {
        let max = self.max_dimension;
        if w == 0 || h == 0 || w > max || h > max {
            return Err(BackendError::SurfaceTooLarge { w, h, max });
        }

        let image = GpuImage::create(
            self.gpu.device(),
            &self.quads,
            w,
            h,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            "xtech layer",
        );
        let id = SurfaceId(self.alloc_id());
        self.surfaces.insert(id, image);
        Ok(id)
    }

    fn destroy_surface(&mut self, id: SurfaceId) {
        let Some(image) = self.surfaces.remove(&id) else { return };
        if self.in_frame {
            self.retired_surfaces.insert(id, image);
        }
    }

    fn begin_frame(&mut self) {
        self.in_frame = true;
        let (w, h) = self.framebuffer_size(Target::Screen(Screen::Primary));
        self.scene = SceneState::new(Target::Screen(Screen::Primary), w, h);
    }

    fn end_frame(&mut self) {
        self.submit_frame();
        self.recorder.reset();
        self.retired_textures.clear();
        self.retired_surfaces.clear();
        self.in_frame = false;
        self.frames += 1;
    }

    fn clear(&mut self, target: Target, color: Color) {
        if self.drawable(target) {
            self.recorder.clear(target, color);
        }
    }

    fn begin_scene(&mut self, target: Target) {
        let (w, h) = self.framebuffer_size(target);
        self.scene = SceneState::new(target, w, h);
    }

    fn set_viewport(&mut self, viewport: HwViewport) {
        self.scene.viewport = viewport;
    }

    fn set_view(&mut self, view: Affine2) {
        self.scene.view = view;
    }

    fn draw_rect(&mut self, rect: Rect, color: Color) {
        if rect.is_empty() {
            return;
        }
        self.record_quad(Source::White, rect, [0.0, 0.0, 1.0, 1.0], Flip::NONE, color);
    }

    fn draw_image(&mut self, draw: &DrawImage) {
        if draw.dst.is_empty() || draw.src.is_empty() {
            return;
        }
        if let (Target::Surface(t), ImageSource::Surface(s)) = (self.scene.target, draw.source) {
            if t == s {
                log::debug!("surface {s:?} cannot sample itself; draw dropped");
                return;
            }
        }

        let source = Source::Image(draw.source);
        let Some((w, h)) = self.image(source).map(|i| (i.width, i.height)) else { return };
        let uv = normalized_uv(draw.src, w, h);
        self.record_quad(source, draw.dst, uv, draw.flip, draw.tint);
    }
}
