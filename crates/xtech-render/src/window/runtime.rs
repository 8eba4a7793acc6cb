use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use ouroboros::self_referencing;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use super::app::{App, AppControl, FrameCtx};
use crate::backend::desktop::{WgpuBackend, WgpuInit};
use crate::config::RenderConfig;
use crate::coords::letterbox;
use crate::render::Renderer;
use crate::time::{FrameTimer, DEFAULT_FRAME_DELAY};

/// Window configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    /// Logic tick length.
    pub frame_delay: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "xtech".to_string(),
            initial_size: LogicalSize::new(800.0, 600.0),
            frame_delay: DEFAULT_FRAME_DELAY,
        }
    }
}

/// Entry point for the desktop runtime.
pub struct Runtime;

impl Runtime {
    /// Opens the window and runs `app` until it exits or the window closes.
    pub fn run<A>(config: RuntimeConfig, render: RenderConfig, init: WgpuInit, app: A) -> Result<()>
    where
        A: App + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = RuntimeState {
            config,
            render,
            init,
            app,
            entry: None,
            failure: None,
            exit_requested: false,
        };

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        match state.failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[self_referencing]
struct WindowEntry {
    timer: FrameTimer,
    window: Window,

    #[borrows(window)]
    #[covariant]
    renderer: Renderer<WgpuBackend<'this>>,
}

impl WindowEntry {
    fn id(&self) -> WindowId {
        self.with_window(|w| w.id())
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        self.with_renderer_mut(|r| {
            r.backend_mut().resize(size);
            let layout = *r.layout();
            let phys = letterbox(layout.logical_w, layout.logical_h, size.width as i32, size.height as i32);
            r.set_screen_phys(phys);
        });
        self.with_window(|w| w.request_redraw());
    }
}

struct RuntimeState<A: App + 'static> {
    config: RuntimeConfig,
    render: RenderConfig,
    init: WgpuInit,
    app: A,

    entry: Option<WindowEntry>,
    /// First fatal error; returned from [`Runtime::run`].
    failure: Option<anyhow::Error>,
    exit_requested: bool,
}

impl<A: App + 'static> RuntimeState<A> {
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.failure.get_or_insert(err);
        self.shutdown(event_loop);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut entry) = self.entry.take() {
            entry.with_renderer_mut(|r| r.quit());
        }
        self.exit_requested = true;
        event_loop.exit();
    }

    fn create_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<WindowEntry> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size);

        let window = event_loop.create_window(attrs).context("failed to create window")?;
        let init = self.init.clone();
        let render = self.render.clone();

        let mut entry = WindowEntryTryBuilder {
            timer: FrameTimer::new(self.config.frame_delay, Instant::now()),
            window,
            renderer_builder: |w| {
                pollster::block_on(WgpuBackend::new(w, init)).map(|backend| Renderer::new(backend, render))
            },
        }
        .try_build()
        .context("GPU initialization failed")?;

        let size = entry.with_window(|w| w.inner_size());
        entry.resize(size);
        Ok(entry)
    }

    /// Runs every logic tick that is due and draws unless logic is behind.
    fn run_ticks(&mut self) -> AppControl {
        let Some(entry) = self.entry.as_mut() else { return AppControl::Continue };
        let app = &mut self.app;

        entry.with_mut(|fields| {
            let now = Instant::now();
            while fields.timer.can_proceed_frame(now) {
                let mut ctx = FrameCtx {
                    window: fields.window,
                    renderer: &mut *fields.renderer,
                    tick: fields.timer.frame_index(),
                };
                if app.on_tick(&mut ctx) == AppControl::Exit {
                    return AppControl::Exit;
                }
                if !fields.timer.frame_skip_needed(now) {
                    app.on_draw(&mut ctx);
                    fields.window.pre_present_notify();
                    ctx.renderer.repaint();
                }
                fields.timer.frame_next_inc();
            }

            if fields.renderer.backend().is_lost() {
                AppControl::Exit
            } else {
                AppControl::Continue
            }
        })
    }
}

impl<A: App + 'static> ApplicationHandler for RuntimeState<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() || self.exit_requested {
            return;
        }

        let mut entry = match self.create_entry(event_loop) {
            Ok(e) => e,
            Err(e) => return self.fail(event_loop, e),
        };

        let app = &mut self.app;
        let started = entry.with_renderer_mut(|r| app.on_start(r));
        entry.with_mut(|fields| fields.timer.reset(Instant::now()));
        self.entry = Some(entry);

        if let Err(e) = started {
            self.fail(event_loop, e.context("game start failed"));
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }
        let Some(entry) = self.entry.as_ref() else { return };

        let deadline = entry.with_timer(|t| t.next_deadline());
        if deadline <= Instant::now() {
            entry.with_window(|w| w.request_redraw());
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(deadline));
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }
        if self.entry.as_ref().is_none_or(|e| e.id() != window_id) {
            return;
        }

        if self.app.on_window_event(&event) == AppControl::Exit {
            return self.shutdown(event_loop);
        }

        match event {
            WindowEvent::CloseRequested => self.shutdown(event_loop),

            WindowEvent::Resized(size) => {
                if let Some(entry) = self.entry.as_mut() {
                    entry.resize(size);
                }
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(entry) = self.entry.as_mut() {
                    let size = entry.with_window(|w| w.inner_size());
                    entry.resize(size);
                }
            }

            WindowEvent::RedrawRequested => {
                if self.run_ticks() == AppControl::Exit {
                    self.shutdown(event_loop);
                }
            }

            _ => {}
        }
    }
}
