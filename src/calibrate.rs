//! Calibration module.
//! One-time manual setup: the operator marks two opposite corners of the board on a captured
//! window frame. Point entry goes through `PointSource` so the wizard does not care whether
//! points come from a terminal prompt, a mouse hook or a test script.
//! Run via CLI flag --calibrate.

use crate::config::Calibration;
use crate::error::{BoardError, Result};
use dialoguer::Input;
use image::RgbImage;
use log::{info, warn};
use std::path::PathBuf;

/// A point in window-frame pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// Blocking source of operator clicks.
pub trait PointSource {
    /// Next point, or `None` if the operator cancelled.
    fn next_point(&mut self, frame: &RgbImage, collected: &[Point]) -> Option<Point>;
}

/// Collects two corners and turns them into a board rectangle.
///
/// Corner order does not matter. A second corner sharing the first one's row or column is
/// rejected and asked for again. Nothing is returned unless both corners were collected.
pub fn acquire(frame: &RgbImage, points: &mut dyn PointSource) -> Result<Calibration> {
    let mut collected: Vec<Point> = Vec::with_capacity(2);
    while collected.len() < 2 {
        let point = points
            .next_point(frame, &collected)
            .ok_or(BoardError::CalibrationCancelled)?;
        let degenerate = collected
            .first()
            .is_some_and(|first| first.x == point.x || first.y == point.y);
        if degenerate {
            let first = collected[0];
            warn!(
                "Corner ({}, {}) spans no area with ({}, {}); pick the opposite corner",
                point.x, point.y, first.x, first.y
            );
            continue;
        }
        collected.push(point);
    }

    let (a, b) = (collected[0], collected[1]);
    let calibration = Calibration {
        left: a.x.min(b.x),
        top: a.y.min(b.y),
        right: a.x.max(b.x),
        bottom: a.y.max(b.y),
    };
    calibration.validate().map_err(BoardError::NotCalibrated)?;
    Ok(calibration)
}

/// Terminal prompt: saves the frame for inspection, then asks for `x,y` coordinates.
/// An empty answer or `q` cancels.
pub struct TerminalPoints {
    preview_path: PathBuf,
    preview_saved: bool,
}

impl TerminalPoints {
    pub fn new(preview_path: impl Into<PathBuf>) -> Self {
        Self {
            preview_path: preview_path.into(),
            preview_saved: false,
        }
    }
}

/// Parses `x,y` (whitespace tolerated) and checks it lies inside the frame.
fn parse_point(input: &str, width: u32, height: u32) -> std::result::Result<Point, String> {
    let (x, y) = input
        .split_once(',')
        .ok_or_else(|| "expected x,y".to_string())?;
    let x: i32 = x.trim().parse().map_err(|_| format!("'{}' is not an integer", x.trim()))?;
    let y: i32 = y.trim().parse().map_err(|_| format!("'{}' is not an integer", y.trim()))?;
    if x < 0 || y < 0 || x as u32 > width || y as u32 > height {
        return Err(format!("({}, {}) is outside the {}x{} frame", x, y, width, height));
    }
    Ok(Point { x, y })
}

impl PointSource for TerminalPoints {
    fn next_point(&mut self, frame: &RgbImage, collected: &[Point]) -> Option<Point> {
        let (width, height) = frame.dimensions();
        if !self.preview_saved {
            match frame.save(&self.preview_path) {
                Ok(()) => info!(
                    "Saved window capture to {} ({}x{}); read the board corners from it",
                    self.preview_path.display(),
                    width,
                    height
                ),
                Err(e) => warn!("Failed to save {}: {}", self.preview_path.display(), e),
            }
            self.preview_saved = true;
        }

        let prompt = match collected.len() {
            0 => "First board corner as x,y (empty or q to cancel)",
            _ => "Opposite board corner as x,y (empty or q to cancel)",
        };
        let answer: String = Input::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .validate_with(|input: &String| -> std::result::Result<(), String> {
                let input = input.trim();
                if input.is_empty() || input.eq_ignore_ascii_case("q") {
                    return Ok(());
                }
                parse_point(input, width, height).map(|_| ())
            })
            .interact_text()
            .ok()?;

        let answer = answer.trim();
        if answer.is_empty() || answer.eq_ignore_ascii_case("q") {
            return None;
        }
        parse_point(answer, width, height).ok()
    }
}
