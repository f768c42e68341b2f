//! Portable front end: a borderless, topmost, transparent and click-through
//! window covering the screen, presenting the software-composited trail.

use std::thread;
use std::time::Duration;

use crossbeam_channel::Receiver;
use cursortrail_core::{Canvas, Sprite, TrailConfig, TrailEngine};
use cursortrail_platform::{CursorSampler, FrameDriver, Result, ScreenRect};
use tracing::{debug, info, warn};
use winit::event_loop::{DeviceEvents, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};

mod surface;
use crate::surface::OverlaySurface;

pub struct DesktopWindow {
    engine: TrailEngine,
    canvas: Canvas,
    sprite: Option<Sprite>,
    event_loop: Option<EventLoop<()>>,
    surface: OverlaySurface,
    interrupts: Option<Receiver<()>>,
}

impl DesktopWindow {
    pub fn new(config: TrailConfig, rect: ScreenRect) -> Result<Self> {
        let engine = TrailEngine::new(config)?;
        let canvas =
            Canvas::new(rect.width as usize, rect.height as usize).with_origin(rect.origin());
        Ok(Self {
            engine,
            canvas,
            sprite: None,
            event_loop: None,
            surface: OverlaySurface::new(rect),
            interrupts: None,
        })
    }

    /// Deliver pending window and device events. Returns `false` once the
    /// event loop has exited.
    fn pump_events(&mut self) -> Result<bool> {
        let event_loop = self
            .event_loop
            .as_mut()
            .ok_or("desktop window used before initialize")?;
        let status = event_loop.pump_app_events(Some(Duration::ZERO), &mut self.surface);
        if let Some(failure) = self.surface.failure.take() {
            return Err(failure.into());
        }
        Ok(matches!(status, PumpStatus::Continue))
    }

    fn interrupted(&self) -> bool {
        self.interrupts
            .as_ref()
            .is_some_and(|interrupts| interrupts.try_recv().is_ok())
    }
}

impl FrameDriver for DesktopWindow {
    fn initialize(&mut self) -> Result<()> {
        let event_loop = EventLoop::new().map_err(|e| e.to_string())?;
        event_loop.listen_device_events(DeviceEvents::Always);
        self.event_loop = Some(event_loop);

        // The window is created from the first `resumed` event.
        self.pump_events()?;
        if !self.surface.is_open() {
            return Err("event loop did not open the desktop window".into());
        }

        let config = self.engine.config();
        self.sprite = Some(Sprite::resolve(&config.texture_path, config.sprite_size));
        self.interrupts = Some(listen_for_interrupt());
        info!("desktop window ready; press Ctrl+C to exit");
        Ok(())
    }

    fn update(&mut self) -> Result<bool> {
        if !self.pump_events()? || self.surface.close_requested {
            info!("desktop window closed");
            return Ok(false);
        }
        if self.interrupted() {
            info!("interrupt received");
            return Ok(false);
        }

        match self.surface.pointer.sample() {
            Some(position) => self.engine.step(position),
            None => self.engine.fade(),
        }
        Ok(true)
    }

    fn render(&mut self) -> Result<()> {
        let Some(sprite) = self.sprite.as_ref() else {
            return Err("desktop window rendered before initialize".into());
        };
        self.engine.paint(&mut self.canvas, sprite);
        self.surface.present(&self.canvas)
    }

    fn cleanup(&mut self) -> Result<()> {
        if self.surface.is_open() {
            debug!(
                live = self.engine.buffer().live_count(),
                "closing desktop window"
            );
        }
        self.surface.close();
        self.interrupts = None;
        self.sprite = None;
        Ok(())
    }
}

/// Ctrl+C arrives on a dedicated thread running a single-threaded tokio
/// runtime and is forwarded to the frame loop over a channel.
fn listen_for_interrupt() -> Receiver<()> {
    let (sender, receiver) = crossbeam_channel::bounded(1);
    let spawned = thread::Builder::new()
        .name("ctrl-c".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    warn!("cannot listen for Ctrl+C: {err}");
                    return;
                }
            };
            runtime.block_on(async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        let _ = sender.send(());
                    }
                    Err(err) => warn!("cannot listen for Ctrl+C: {err}"),
                }
            });
        });
    if let Err(err) = spawned {
        warn!("cannot start Ctrl+C listener: {err}");
    }
    receiver
}
