//! Screen Capture
//!
//! Resolves window rectangles and grabs their screen pixels. A rectangle with
//! no area captures as a degenerate 1x1 frame so downstream code has one
//! failure-free path for "nothing to capture"; a vanished window surfaces as
//! `resolve_rect` returning `None`.

use crate::registry::WindowHandle;
use image::RgbaImage;
use thiserror::Error;

/// Captured window pixels, 8-bit RGBA
pub type Frame = RgbaImage;

/// Screen-space rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// True if the rectangle covers at least one pixel
    pub fn has_area(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Intersection with another rectangle; `None` when they do not overlap
    pub fn intersect(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        let rect = Rect::new(x, y, right - x, bottom - y);
        rect.has_area().then_some(rect)
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("screen capture failed: {0}")]
    Os(String),
}

/// Seam between the poll loops and the OS. The GDI implementation lives
/// behind `cfg(windows)`; tests substitute their own frames.
pub trait FrameSource: Send + Sync {
    /// Screen rectangle of a window, or `None` once the handle is gone
    fn resolve_rect(&self, handle: WindowHandle) -> Option<Rect>;

    /// Grabs the given screen rectangle. Non-positive area yields a 1x1 frame.
    fn capture(&self, rect: Rect) -> Result<Frame, CaptureError>;
}

/// Crops a frame to a region, clamped to the frame bounds.
/// An empty intersection yields a 1x1 frame.
pub fn crop(frame: &Frame, region: Rect) -> Frame {
    let bounds = Rect::new(0, 0, frame.width() as i32, frame.height() as i32);
    match region.intersect(&bounds) {
        Some(r) => image::imageops::crop_imm(
            frame,
            r.x as u32,
            r.y as u32,
            r.width as u32,
            r.height as u32,
        )
        .to_image(),
        None => Frame::new(1, 1),
    }
}

/// Frame source for platforms without capture support; every handle
/// resolves as gone.
pub struct NullFrameSource;

impl FrameSource for NullFrameSource {
    fn resolve_rect(&self, _handle: WindowHandle) -> Option<Rect> {
        None
    }

    fn capture(&self, _rect: Rect) -> Result<Frame, CaptureError> {
        Ok(Frame::new(1, 1))
    }
}

#[cfg(windows)]
pub use self::windows_impl::{enumerate_windows, GdiFrameSource};

#[cfg(windows)]
mod windows_impl {
    use super::{CaptureError, Frame, FrameSource, Rect};
    use crate::registry::WindowHandle;
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;
    use windows::Win32::Foundation::{BOOL, HWND, LPARAM, RECT};
    use windows::Win32::Graphics::Gdi::{
        BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC,
        GetDIBits, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS,
        SRCCOPY,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        EnumWindows, GetWindowRect, GetWindowTextLengthW, GetWindowTextW, IsWindowVisible,
    };

    fn hwnd(handle: WindowHandle) -> HWND {
        HWND(handle.0 as *mut _)
    }

    /// Captures via the screen device context, matching what the window
    /// actually shows on screen (overlays included).
    pub struct GdiFrameSource;

    impl GdiFrameSource {
        pub fn new() -> Self {
            Self
        }
    }

    impl Default for GdiFrameSource {
        fn default() -> Self {
            Self::new()
        }
    }

    impl FrameSource for GdiFrameSource {
        fn resolve_rect(&self, handle: WindowHandle) -> Option<Rect> {
            unsafe {
                let mut rect = RECT::default();
                GetWindowRect(hwnd(handle), &mut rect).ok()?;
                Some(Rect::new(
                    rect.left,
                    rect.top,
                    rect.right - rect.left,
                    rect.bottom - rect.top,
                ))
            }
        }

        fn capture(&self, rect: Rect) -> Result<Frame, CaptureError> {
            if !rect.has_area() {
                return Ok(Frame::new(1, 1));
            }
            capture_screen_rect(rect)
        }
    }

    fn capture_screen_rect(rect: Rect) -> Result<Frame, CaptureError> {
        let (width, height) = (rect.width, rect.height);

        unsafe {
            // Screen device context
            let hdc_screen = GetDC(HWND::default());
            if hdc_screen.is_invalid() {
                return Err(CaptureError::Os("GetDC failed".to_string()));
            }

            // Create compatible DC
            let hdc_mem = CreateCompatibleDC(hdc_screen);
            if hdc_mem.is_invalid() {
                ReleaseDC(HWND::default(), hdc_screen);
                return Err(CaptureError::Os("CreateCompatibleDC failed".to_string()));
            }

            // Create bitmap
            let hbitmap = CreateCompatibleBitmap(hdc_screen, width, height);
            if hbitmap.is_invalid() {
                let _ = DeleteDC(hdc_mem);
                ReleaseDC(HWND::default(), hdc_screen);
                return Err(CaptureError::Os("CreateCompatibleBitmap failed".to_string()));
            }

            // Select bitmap
            let old_bitmap = SelectObject(hdc_mem, hbitmap);

            // Copy the screen region into our bitmap
            let blt = BitBlt(
                hdc_mem, 0, 0, width, height, hdc_screen, rect.x, rect.y, SRCCOPY,
            );

            let result = if blt.is_err() {
                Err(CaptureError::Os("BitBlt failed".to_string()))
            } else {
                extract_pixels(hdc_mem, hbitmap, width, height)
            };

            // Cleanup
            SelectObject(hdc_mem, old_bitmap);
            let _ = DeleteObject(hbitmap);
            let _ = DeleteDC(hdc_mem);
            ReleaseDC(HWND::default(), hdc_screen);

            result
        }
    }

    unsafe fn extract_pixels(
        hdc_mem: windows::Win32::Graphics::Gdi::HDC,
        hbitmap: windows::Win32::Graphics::Gdi::HBITMAP,
        width: i32,
        height: i32,
    ) -> Result<Frame, CaptureError> {
        let mut bmi = BITMAPINFO {
            bmiHeader: BITMAPINFOHEADER {
                biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                biWidth: width,
                biHeight: -height, // Negative = Top-Down
                biPlanes: 1,
                biBitCount: 32, // BGRA
                biCompression: BI_RGB.0 as u32,
                ..Default::default()
            },
            ..Default::default()
        };

        let mut pixels: Vec<u8> = vec![0; (width * height * 4) as usize];

        let lines = GetDIBits(
            hdc_mem,
            hbitmap,
            0,
            height as u32,
            Some(pixels.as_mut_ptr() as *mut _),
            &mut bmi,
            DIB_RGB_COLORS,
        );

        if lines == 0 {
            return Err(CaptureError::Os("GetDIBits failed".to_string()));
        }

        // BGRA -> RGBA in place
        for px in pixels.chunks_exact_mut(4) {
            px.swap(0, 2);
            px[3] = 255;
        }

        Frame::from_raw(width as u32, height as u32, pixels)
            .ok_or_else(|| CaptureError::Os("pixel buffer size mismatch".to_string()))
    }

    /// Lists visible top-level windows whose title equals `title`
    /// (case-insensitive). Used by the presentation layer to offer
    /// candidate windows for tracking.
    pub fn enumerate_windows(title: &str) -> Vec<WindowHandle> {
        struct EnumState {
            title: String,
            matches: Vec<WindowHandle>,
        }

        unsafe extern "system" fn enum_proc(hwnd: HWND, lparam: LPARAM) -> BOOL {
            let state = &mut *(lparam.0 as *mut EnumState);
            if IsWindowVisible(hwnd).as_bool() {
                let text = window_title(hwnd);
                if text.eq_ignore_ascii_case(&state.title) {
                    state.matches.push(WindowHandle(hwnd.0 as isize));
                }
            }
            true.into()
        }

        let mut state = EnumState {
            title: title.to_string(),
            matches: Vec::new(),
        };

        unsafe {
            let _ = EnumWindows(Some(enum_proc), LPARAM(&mut state as *mut _ as isize));
        }

        state.matches.sort_by_key(|h| h.0);
        state.matches
    }

    /// Reads the window title
    fn window_title(hwnd: HWND) -> String {
        unsafe {
            let len = GetWindowTextLengthW(hwnd);
            if len == 0 {
                return String::new();
            }

            let mut buffer: Vec<u16> = vec![0; (len + 1) as usize];
            let copied = GetWindowTextW(hwnd, &mut buffer);

            if copied > 0 {
                OsString::from_wide(&buffer[..copied as usize])
                    .to_string_lossy()
                    .to_string()
            } else {
                String::new()
            }
        }
    }
}
