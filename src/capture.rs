//! Screen capture module
//! Uses `xcap` to locate the browser window by title and grab its screen region.
//! Window lookup and pixel capture fail differently: a missing window is `WindowNotFound`,
//! anything that goes wrong while grabbing pixels is `CaptureFailed`.
//! Permissions note: On macOS, grant "Screen & System Audio Recording" permission to the
//! terminal in System Settings > Privacy & Security.

use crate::error::{BoardError, Result};
use image::{DynamicImage, RgbImage, imageops};
use log::debug;
use std::time::Instant;
use xcap::{Monitor, Window};

/// Screen-space window bounds, right/bottom exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl WindowRect {
    pub fn width(&self) -> u32 {
        (self.right - self.left).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top).max(0) as u32
    }
}

/// Where window frames come from.
pub trait FrameSource {
    /// Bounds of the first visible window whose title contains `title` (case-insensitive).
    fn window_rect(&mut self, title: &str) -> Result<WindowRect>;

    /// Pixels of a screen region.
    fn grab(&mut self, rect: WindowRect) -> Result<RgbImage>;

    fn capture_window(&mut self, title: &str) -> Result<RgbImage> {
        let rect = self.window_rect(title)?;
        self.grab(rect)
    }
}

/// Live screen capture through `xcap`.
#[derive(Debug, Default)]
pub struct ScreenCapture;

fn capture_err(what: &str, e: impl std::fmt::Display) -> BoardError {
    BoardError::CaptureFailed(format!("{}: {}", what, e))
}

impl FrameSource for ScreenCapture {
    fn window_rect(&mut self, title: &str) -> Result<WindowRect> {
        let needle = title.to_lowercase();
        let windows = Window::all().map_err(|e| capture_err("Failed to enumerate windows", e))?;

        for window in windows {
            let Ok(window_title) = window.title() else {
                continue;
            };
            if !window_title.to_lowercase().contains(&needle) {
                continue;
            }
            if window.is_minimized().unwrap_or(false) {
                continue;
            }
            let x = window.x().map_err(|e| capture_err("Failed to read window x", e))?;
            let y = window.y().map_err(|e| capture_err("Failed to read window y", e))?;
            let w = window.width().map_err(|e| capture_err("Failed to read window width", e))?;
            let h = window.height().map_err(|e| capture_err("Failed to read window height", e))?;
            if w == 0 || h == 0 {
                continue;
            }
            debug!("Matched window '{}' at ({}, {}) {}x{}", window_title, x, y, w, h);
            return Ok(WindowRect {
                left: x,
                top: y,
                right: x + w as i32,
                bottom: y + h as i32,
            });
        }
        Err(BoardError::WindowNotFound(title.to_string()))
    }

    fn grab(&mut self, rect: WindowRect) -> Result<RgbImage> {
        let start = Instant::now();
        let monitor = Monitor::from_point(rect.left, rect.top)
            .map_err(|e| capture_err("No monitor under the window", e))?;
        let mon_x = monitor.x().map_err(|e| capture_err("Failed to read monitor x", e))?;
        let mon_y = monitor.y().map_err(|e| capture_err("Failed to read monitor y", e))?;
        let scale = monitor.scale_factor().unwrap_or(1.0);

        let screenshot = monitor.capture_image().map_err(|e| {
            capture_err(
                "Failed to capture image. On macOS, ensure the terminal has Screen Recording permission",
                e,
            )
        })?;
        let screen = DynamicImage::ImageRgba8(screenshot).to_rgb8();
        let (screen_w, screen_h) = screen.dimensions();
        if (screen_w, screen_h) == (0, 0) {
            return Err(BoardError::CaptureFailed(
                "Captured empty screenshot - possible permission issue or no display".into(),
            ));
        }

        // Window coordinates are logical; the screenshot is in physical pixels.
        let to_px = |v: i32| ((v as f32) * scale).round().max(0.0) as u32;
        let x = to_px(rect.left - mon_x).min(screen_w);
        let y = to_px(rect.top - mon_y).min(screen_h);
        let w = to_px(rect.width() as i32).min(screen_w - x);
        let h = to_px(rect.height() as i32).min(screen_h - y);
        if w == 0 || h == 0 {
            return Err(BoardError::CaptureFailed(format!(
                "Window region {:?} is outside the {}x{} monitor",
                rect, screen_w, screen_h
            )));
        }

        let frame = imageops::crop_imm(&screen, x, y, w, h).to_image();
        debug!("Capture + crop latency: {:?}", start.elapsed());
        Ok(frame)
    }
}
