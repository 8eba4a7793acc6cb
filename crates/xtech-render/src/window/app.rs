use anyhow::Result;
use winit::event::WindowEvent;
use winit::window::Window;

use crate::backend::desktop::WgpuBackend;
use crate::render::Renderer;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Per-tick context handed to the app.
///
/// - `'a` is the duration of the callback
/// - `'w` is the window borrow carried by the backend's surface
pub struct FrameCtx<'a, 'w> {
    pub window: &'a Window,
    pub renderer: &'a mut Renderer<WgpuBackend<'w>>,
    /// Logic ticks completed so far.
    pub tick: u64,
}

/// Game contract driven by [`Runtime`](super::Runtime).
pub trait App {
    /// Called once after the renderer exists; load textures here.
    fn on_start(&mut self, renderer: &mut Renderer<WgpuBackend<'_>>) -> Result<()> {
        let _ = renderer;
        Ok(())
    }

    fn on_window_event(&mut self, event: &WindowEvent) -> AppControl {
        let _ = event;
        AppControl::Continue
    }

    /// One fixed-rate logic tick.
    fn on_tick(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;

    /// Draws the current state into the layers. Skipped while logic is
    /// behind; the runtime composes the frame afterwards.
    fn on_draw(&mut self, ctx: &mut FrameCtx<'_, '_>);
}
