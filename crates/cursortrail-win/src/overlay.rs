use cursortrail_core::Canvas;
use cursortrail_platform::{Result, ScreenRect};
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use std::ffi::c_void;
use std::mem::size_of;

use windows::core::PCWSTR;
use windows::Win32::Foundation::{COLORREF, HINSTANCE, HWND, LPARAM, LRESULT, POINT, SIZE, WPARAM};
use windows::Win32::Graphics::Gdi::{
    CreateCompatibleDC, CreateDIBSection, DeleteDC, DeleteObject, GetDC, ReleaseDC, SelectObject,
    AC_SRC_ALPHA, AC_SRC_OVER, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, BLENDFUNCTION, DIB_RGB_COLORS,
    HBITMAP, HBRUSH, HDC, HGDIOBJ,
};
use windows::Win32::UI::WindowsAndMessaging::*;

pub const OVERLAY_WINDOW_CLASS_NAME: PCWSTR = windows::core::w!("CursorTrailOverlayClass");

static OVERLAY_CLASS_ATOM: OnceCell<u16> = OnceCell::new();

unsafe fn register_overlay_window_class(hinstance: HINSTANCE) -> PCWSTR {
    OVERLAY_CLASS_ATOM.get_or_init(|| {
        let window_class = WNDCLASSW {
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(handle_overlay_window_message),
            hInstance: hinstance,
            hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
            hbrBackground: HBRUSH(std::ptr::null_mut()),
            lpszClassName: OVERLAY_WINDOW_CLASS_NAME,
            ..Default::default()
        };
        let atom = RegisterClassW(&window_class);
        if atom == 0 {
            warn!("RegisterClassW failed for overlay class");
        }
        atom
    });
    OVERLAY_WINDOW_CLASS_NAME
}

/// The primary display, in screen coordinates.
pub fn primary_screen_rect() -> ScreenRect {
    let (width, height) = unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) };
    ScreenRect::new(0, 0, width.max(1) as u32, height.max(1) as u32)
}

/// A click-through layered window plus the memory DC and 32-bit DIB section
/// it is presented from.
pub struct LayeredSurface {
    hwnd: HWND,
    screen_dc: HDC,
    memory_dc: HDC,
    bitmap: HBITMAP,
    previous_object: HGDIOBJ,
    bits: *mut c_void,
    rect: ScreenRect,
}

impl LayeredSurface {
    pub fn create(hinstance: HINSTANCE, rect: ScreenRect) -> Result<Self> {
        unsafe {
            let class_name = register_overlay_window_class(hinstance);
            let hwnd = CreateWindowExW(
                WINDOW_EX_STYLE(
                    WS_EX_LAYERED.0
                        | WS_EX_TRANSPARENT.0
                        | WS_EX_TOPMOST.0
                        | WS_EX_TOOLWINDOW.0
                        | WS_EX_NOACTIVATE.0,
                ),
                class_name,
                windows::core::w!("Cursor Trail"),
                WS_POPUP,
                rect.x,
                rect.y,
                rect.width as i32,
                rect.height as i32,
                None,
                None,
                hinstance,
                None,
            )?;

            let screen_dc = GetDC(hwnd);
            let memory_dc = CreateCompatibleDC(screen_dc);
            let bitmap_info = BITMAPINFO {
                bmiHeader: BITMAPINFOHEADER {
                    biSize: size_of::<BITMAPINFOHEADER>() as u32,
                    biWidth: rect.width as i32,
                    // Negative height: top-down rows, matching the canvas.
                    biHeight: -(rect.height as i32),
                    biPlanes: 1,
                    biBitCount: 32,
                    biCompression: BI_RGB.0,
                    ..Default::default()
                },
                ..Default::default()
            };
            let mut bits: *mut c_void = std::ptr::null_mut();
            let created = CreateDIBSection(
                memory_dc,
                &bitmap_info,
                DIB_RGB_COLORS,
                &mut bits,
                None,
                0,
            );
            let bitmap = match created {
                Ok(bitmap) if !bits.is_null() => bitmap,
                failed => {
                    if let Ok(bitmap) = &failed {
                        let _ = DeleteObject(*bitmap);
                    }
                    let _ = DeleteDC(memory_dc);
                    ReleaseDC(hwnd, screen_dc);
                    let _ = DestroyWindow(hwnd);
                    return Err(match failed {
                        Err(err) => err.into(),
                        Ok(_) => "CreateDIBSection returned no pixel storage".into(),
                    });
                }
            };
            let previous_object = SelectObject(memory_dc, bitmap);

            let _ = ShowWindow(hwnd, SW_SHOWNOACTIVATE);
            info!(
                "Overlay window {}x{} at ({}, {})",
                rect.width, rect.height, rect.x, rect.y
            );

            Ok(Self {
                hwnd,
                screen_dc,
                memory_dc,
                bitmap,
                previous_object,
                bits,
                rect,
            })
        }
    }

    /// Copy the canvas into the DIB section and push it to the window with
    /// per-pixel alpha.
    pub fn present(&mut self, canvas: &Canvas) -> Result<()> {
        let bytes = canvas.as_bytes();
        let expected = self.rect.width as usize * self.rect.height as usize * 4;
        if bytes.len() != expected {
            return Err(format!(
                "canvas is {} bytes, overlay surface expects {expected}",
                bytes.len()
            )
            .into());
        }

        unsafe {
            let target = std::slice::from_raw_parts_mut(self.bits as *mut u8, expected);
            target.copy_from_slice(bytes);

            let destination = POINT {
                x: self.rect.x,
                y: self.rect.y,
            };
            let size = SIZE {
                cx: self.rect.width as i32,
                cy: self.rect.height as i32,
            };
            let source = POINT { x: 0, y: 0 };
            let blend = BLENDFUNCTION {
                BlendOp: AC_SRC_OVER as u8,
                BlendFlags: 0,
                SourceConstantAlpha: 255,
                AlphaFormat: AC_SRC_ALPHA as u8,
            };
            UpdateLayeredWindow(
                self.hwnd,
                self.screen_dc,
                Some(&destination),
                Some(&size),
                self.memory_dc,
                Some(&source),
                COLORREF(0),
                Some(&blend),
                ULW_ALPHA,
            )?;
        }
        Ok(())
    }

    pub fn rect(&self) -> ScreenRect {
        self.rect
    }
}

impl Drop for LayeredSurface {
    fn drop(&mut self) {
        unsafe {
            SelectObject(self.memory_dc, self.previous_object);
            let _ = DeleteObject(self.bitmap);
            let _ = DeleteDC(self.memory_dc);
            ReleaseDC(self.hwnd, self.screen_dc);
            if let Err(err) = DestroyWindow(self.hwnd) {
                warn!("DestroyWindow failed for overlay: {err}");
            }
        }
        debug!("overlay surface released");
    }
}

pub unsafe extern "system" fn handle_overlay_window_message(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_NCHITTEST => LRESULT(HTTRANSPARENT as isize),
        WM_MOUSEACTIVATE => LRESULT(MA_NOACTIVATE as isize),
        WM_DESTROY => {
            PostQuitMessage(0);
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}
