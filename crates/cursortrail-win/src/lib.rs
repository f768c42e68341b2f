//! Windows overlay front end for CursorTrail.
#![cfg(windows)]

use cursortrail_core::{Canvas, Sprite, TrailConfig, TrailEngine};
use cursortrail_platform::{CursorSampler, FrameDriver, Result, ScreenRect};
use glam::Vec2;
use tracing::{debug, info, warn};

mod overlay;
pub use crate::overlay::primary_screen_rect;
use crate::overlay::LayeredSurface;
use windows::Win32::Foundation::{HINSTANCE, HWND, POINT};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::*;

use crossbeam_channel::{Receiver, Sender};
use tray_icon::menu::{Menu, MenuEvent, MenuId, MenuItem};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};

enum TrayCommand {
    Exit,
}

/// Global cursor position from `GetCursorPos`.
pub struct WinCursor;

impl CursorSampler for WinCursor {
    fn sample(&mut self) -> Option<Vec2> {
        let mut point = POINT::default();
        match unsafe { GetCursorPos(&mut point) } {
            Ok(()) => Some(Vec2::new(point.x as f32, point.y as f32)),
            Err(err) => {
                debug!("GetCursorPos failed: {err}");
                None
            }
        }
    }
}

/// Layered-window overlay spanning the primary screen.
pub struct WinOverlay {
    rect: ScreenRect,
    engine: TrailEngine,
    canvas: Canvas,
    cursor: WinCursor,
    sprite: Option<Sprite>,
    surface: Option<LayeredSurface>,
    tray: Option<TrayIcon>,
    tray_commands: Option<Receiver<TrayCommand>>,
}

impl WinOverlay {
    pub fn new(config: TrailConfig) -> Result<Self> {
        Self::with_rect(config, primary_screen_rect())
    }

    pub fn with_rect(config: TrailConfig, rect: ScreenRect) -> Result<Self> {
        let engine = TrailEngine::new(config)?;
        let canvas =
            Canvas::new(rect.width as usize, rect.height as usize).with_origin(rect.origin());
        Ok(Self {
            rect,
            engine,
            canvas,
            cursor: WinCursor,
            sprite: None,
            surface: None,
            tray: None,
            tray_commands: None,
        })
    }

    /// Drain the thread's message queue. Returns `false` on `WM_QUIT`.
    fn pump_messages(&self) -> bool {
        let mut message = MSG::default();
        unsafe {
            while PeekMessageW(&mut message, HWND(std::ptr::null_mut()), 0, 0, PM_REMOVE).into() {
                if message.message == WM_QUIT {
                    return false;
                }
                let _ = TranslateMessage(&message);
                DispatchMessageW(&message);
            }
        }
        true
    }

    fn exit_requested(&self) -> bool {
        self.tray_commands
            .as_ref()
            .is_some_and(|commands| matches!(commands.try_recv(), Ok(TrayCommand::Exit)))
    }
}

impl FrameDriver for WinOverlay {
    fn initialize(&mut self) -> Result<()> {
        let hinstance = unsafe { HINSTANCE(GetModuleHandleW(None)?.0) };
        self.surface = Some(LayeredSurface::create(hinstance, self.rect)?);

        let config = self.engine.config();
        self.sprite = Some(Sprite::resolve(&config.texture_path, config.sprite_size));

        // The trail still works without a tray icon; it just has to be
        // stopped another way.
        match create_tray_icon() {
            Ok((tray, exit_id)) => {
                let (sender, receiver) = crossbeam_channel::unbounded();
                handle_tray_menu_events(sender, exit_id);
                self.tray = Some(tray);
                self.tray_commands = Some(receiver);
                info!("tray icon created");
            }
            Err(err) => warn!("tray icon unavailable: {err}"),
        }
        Ok(())
    }

    fn update(&mut self) -> Result<bool> {
        if !self.pump_messages() {
            info!("WM_QUIT received");
            return Ok(false);
        }
        if self.exit_requested() {
            info!("Exit selected from tray menu");
            return Ok(false);
        }

        match self.cursor.sample() {
            Some(position) => self.engine.step(position),
            None => self.engine.fade(),
        }
        Ok(true)
    }

    fn render(&mut self) -> Result<()> {
        let (Some(sprite), Some(surface)) = (self.sprite.as_ref(), self.surface.as_mut()) else {
            return Err("overlay rendered before initialize".into());
        };
        self.engine.paint(&mut self.canvas, sprite);
        surface.present(&self.canvas)
    }

    fn cleanup(&mut self) -> Result<()> {
        MenuEvent::set_event_handler(None::<fn(MenuEvent)>);
        self.tray_commands = None;
        drop(self.tray.take());
        if let Some(surface) = self.surface.take() {
            debug!(rect = ?surface.rect(), "destroying overlay surface");
        }
        self.sprite = None;
        Ok(())
    }
}

fn handle_tray_menu_events(sender: Sender<TrayCommand>, exit_menu_id: MenuId) {
    MenuEvent::set_event_handler(Some(move |event: MenuEvent| {
        if event.id() == &exit_menu_id && sender.send(TrayCommand::Exit).is_err() {
            warn!("tray command channel closed; cannot request exit");
        }
    }));
}

// --------------- tray-icon integration ---------------

fn create_tray_icon() -> Result<(TrayIcon, MenuId)> {
    // 16x16 white dot, like the trail itself
    let icon_sprite = Sprite::radial_fallback(16.0);
    let (w, h) = (icon_sprite.width(), icon_sprite.height());
    let mut rgba = Vec::with_capacity((w * h * 4) as usize);
    for y in 0..h {
        for x in 0..w {
            let alpha = icon_sprite.texel(x, y)[3];
            rgba.extend_from_slice(&[255, 255, 255, alpha]);
        }
    }
    let icon = Icon::from_rgba(rgba, w, h).map_err(box_err)?;

    let menu = Menu::new();
    let exit_item = MenuItem::new("Exit", true, None);
    let exit_id = exit_item.id().clone();
    menu.append(&exit_item).map_err(box_err)?;

    let tray = TrayIconBuilder::new()
        .with_icon(icon)
        .with_tooltip("Cursor Trail")
        .with_menu(Box::new(menu))
        .build()
        .map_err(box_err)?;

    Ok((tray, exit_id))
}

#[inline]
fn box_err<E: std::error::Error + Send + Sync + 'static>(
    e: E,
) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(e)
}
