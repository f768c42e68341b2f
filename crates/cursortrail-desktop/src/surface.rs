use std::num::NonZeroU32;
use std::sync::Arc;

use cursortrail_core::Canvas;
use cursortrail_platform::{CursorSampler, Result, ScreenRect};
use glam::Vec2;
use softbuffer::{Context, Surface};
use tracing::{debug, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{DeviceEvent, DeviceId, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowId, WindowLevel};

const WINDOW_TITLE: &str = "CursorTrail";

/// Screen-space cursor estimate.
///
/// A click-through window sees no pointer events of its own, so the position
/// is anchored wherever it is last known exactly and moved by raw device
/// motion in between.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PointerTracker {
    bounds: ScreenRect,
    position: Option<Vec2>,
}

impl PointerTracker {
    pub(crate) fn new(bounds: ScreenRect) -> Self {
        Self {
            bounds,
            position: None,
        }
    }

    pub(crate) fn anchor(&mut self, position: Vec2) {
        self.position = Some(self.clamp(position));
    }

    pub(crate) fn nudge(&mut self, delta: Vec2) {
        if let Some(position) = self.position {
            self.position = Some(self.clamp(position + delta));
        }
    }

    fn clamp(&self, position: Vec2) -> Vec2 {
        let min = self.bounds.origin();
        let max = min + Vec2::new(self.bounds.width as f32, self.bounds.height as f32) - Vec2::ONE;
        position.clamp(min, max.max(min))
    }
}

impl CursorSampler for PointerTracker {
    fn sample(&mut self) -> Option<Vec2> {
        self.position
    }
}

/// Event-loop side of the desktop front end: owns the window and its
/// software surface, and collects what the frame driver needs from events.
pub(crate) struct OverlaySurface {
    rect: ScreenRect,
    window: Option<Arc<Window>>,
    context: Option<Context<Arc<Window>>>,
    surface: Option<Surface<Arc<Window>, Arc<Window>>>,
    pub(crate) pointer: PointerTracker,
    pub(crate) close_requested: bool,
    pub(crate) failure: Option<String>,
}

impl OverlaySurface {
    pub(crate) fn new(rect: ScreenRect) -> Self {
        Self {
            rect,
            window: None,
            context: None,
            surface: None,
            pointer: PointerTracker::new(rect),
            close_requested: false,
            failure: None,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.window.is_some() && self.surface.is_some()
    }

    pub(crate) fn present(&mut self, canvas: &Canvas) -> Result<()> {
        let surface = self
            .surface
            .as_mut()
            .ok_or("desktop window rendered before initialize")?;
        let mut buffer = surface.buffer_mut().map_err(|e| e.to_string())?;
        if buffer.len() != canvas.pixels().len() {
            return Err(format!(
                "canvas has {} pixels, window surface has {}",
                canvas.pixels().len(),
                buffer.len()
            )
            .into());
        }
        // softbuffer ignores the top byte; the canvas is premultiplied, so
        // the colour channels are already right over black.
        buffer.copy_from_slice(canvas.pixels());
        buffer.present().map_err(|e| e.to_string())?;
        Ok(())
    }

    pub(crate) fn close(&mut self) {
        self.surface = None;
        self.context = None;
        if self.window.take().is_some() {
            debug!("desktop window released");
        }
    }

    fn open(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = Window::default_attributes()
            .with_title(WINDOW_TITLE)
            .with_decorations(false)
            .with_resizable(false)
            .with_transparent(true)
            .with_window_level(WindowLevel::AlwaysOnTop)
            .with_inner_size(PhysicalSize::new(self.rect.width, self.rect.height))
            .with_position(PhysicalPosition::new(self.rect.x, self.rect.y));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|e| e.to_string())?,
        );

        if let Err(err) = window.set_cursor_hittest(false) {
            warn!("window cannot be made click-through: {err}");
        }

        // Put the cursor somewhere known so motion deltas have a start point.
        let center = PhysicalPosition::new(
            f64::from(self.rect.width / 2),
            f64::from(self.rect.height / 2),
        );
        match window.set_cursor_position(center) {
            Ok(()) => self.pointer.anchor(
                self.rect.origin() + Vec2::new(center.x as f32, center.y as f32),
            ),
            Err(err) => debug!("cursor position unknown until the pointer is seen: {err}"),
        }

        let context = Context::new(window.clone()).map_err(|e| e.to_string())?;
        let mut surface = Surface::new(&context, window.clone()).map_err(|e| e.to_string())?;
        let (Some(width), Some(height)) = (
            NonZeroU32::new(self.rect.width),
            NonZeroU32::new(self.rect.height),
        ) else {
            return Err("desktop window needs a non-empty rect".into());
        };
        surface.resize(width, height).map_err(|e| e.to_string())?;

        info!(
            "desktop window {}x{} at ({}, {})",
            self.rect.width, self.rect.height, self.rect.x, self.rect.y
        );
        self.window = Some(window);
        self.context = Some(context);
        self.surface = Some(surface);
        Ok(())
    }
}

impl ApplicationHandler for OverlaySurface {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.open(event_loop) {
            self.failure = Some(err.to_string());
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => self.close_requested = true,
            WindowEvent::CursorMoved { position, .. } => self.pointer.anchor(
                self.rect.origin() + Vec2::new(position.x as f32, position.y as f32),
            ),
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.pointer.nudge(Vec2::new(dx as f32, dy as f32));
        }
    }
}
