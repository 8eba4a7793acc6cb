//! Desktop texture browser.
//!
//! Opens a window, registers every image of a directory (or of a
//! `graphics.list`) for lazy loading and scrolls through them, so texture
//! streaming and eviction can be watched with `RUST_LOG=xtech_render=debug`.

mod gallery;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::keyboard::{Key, NamedKey};
use xtech_render::backend::desktop::{WgpuBackend, WgpuInit};
use xtech_render::config::RenderConfig;
use xtech_render::logging::{init_logging, LoggingConfig};
use xtech_render::render::Renderer;
use xtech_render::window::{App, AppControl, FrameCtx, Runtime, RuntimeConfig};

use crate::gallery::Gallery;

#[derive(Parser, Debug)]
#[command(name = "xtech-player", about = "Browse game textures through the xtech renderer")]
struct Cli {
    /// Image directory or graphics.list file.
    source: PathBuf,

    /// Logical screen size, WIDTHxHEIGHT.
    #[arg(long, default_value = "800x600", value_parser = parse_size)]
    screen: (i32, i32),

    /// Initial window scale relative to the logical size.
    #[arg(long, default_value_t = 1.0)]
    zoom: f64,

    /// Grid cell size in logical pixels.
    #[arg(long, default_value_t = 64)]
    cell: i32,

    /// Scroll speed in logical pixels per tick.
    #[arg(long, default_value_t = 2)]
    speed: i32,

    /// Prefer an sRGB swapchain.
    #[arg(long)]
    srgb: bool,

    /// Log filter (env_logger syntax), overrides RUST_LOG.
    #[arg(long, value_name = "FILTER")]
    log: Option<String>,
}

fn parse_size(s: &str) -> Result<(i32, i32), String> {
    let (w, h) = s.split_once('x').ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w: i32 = w.trim().parse().map_err(|e| format!("width: {e}"))?;
    let h: i32 = h.trim().parse().map_err(|e| format!("height: {e}"))?;
    if w <= 0 || h <= 0 {
        return Err(format!("{w}x{h} is not a valid size"));
    }
    Ok((w, h))
}

struct Player {
    source: PathBuf,
    gallery: Gallery,
}

impl App for Player {
    fn on_start(&mut self, renderer: &mut Renderer<WgpuBackend<'_>>) -> Result<()> {
        self.gallery.load(renderer, &self.source)?;
        if self.gallery.len() == 0 {
            log::warn!("nothing to show in {}", self.source.display());
        }
        Ok(())
    }

    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        if let WindowEvent::KeyboardInput { event, .. } = event {
            if event.state == ElementState::Pressed && event.logical_key == Key::Named(NamedKey::Escape) {
                return AppControl::Exit;
            }
        }
        AppControl::Continue
    }

    fn on_tick(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        let layout = *ctx.renderer.layout();
        self.gallery.tick(layout.logical_w, layout.logical_h);
        if ctx.tick > 0 && ctx.tick % 600 == 0 {
            log::debug!(
                "tick {}: {} texture(s) resident",
                ctx.tick,
                ctx.renderer.textures_loaded()
            );
        }
        AppControl::Continue
    }

    fn on_draw(&mut self, ctx: &mut FrameCtx<'_, '_>) {
        self.gallery.draw(ctx.renderer);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LoggingConfig {
        env_filter: cli.log.clone(),
        ..Default::default()
    });

    let (w, h) = cli.screen;
    let render = RenderConfig { screen_w: w, screen_h: h, ..RenderConfig::desktop() };
    let runtime = RuntimeConfig {
        title: format!("xtech - {}", cli.source.display()),
        initial_size: LogicalSize::new(w as f64 * cli.zoom, h as f64 * cli.zoom),
        ..Default::default()
    };
    let init = WgpuInit { prefer_srgb: cli.srgb, ..Default::default() };

    let app = Player { source: cli.source, gallery: Gallery::new(cli.cell, cli.speed) };
    Runtime::run(runtime, render, init, app)
}
