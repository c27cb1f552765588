//! Board recognition facade.
//! Crops the calibrated board out of a window frame, reloads templates for the current square
//! size, classifies the grid, resolves orientation and encodes the FEN.

use crate::config::{Calibration, RecognitionParams};
use crate::error::{BoardError, Result};
use crate::fen;
use crate::grid::{BoardGridBuilder, Grid, square_size};
use crate::templates::TemplateLibrary;
use image::{RgbImage, imageops};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// How the captured grid is oriented before encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Orientation {
    /// Guess from where the white pieces are.
    #[default]
    Auto,
    /// Always rotate 180 degrees (black at the bottom of the screen).
    Flipped,
    /// Never rotate.
    AsCaptured,
}

impl Orientation {
    pub fn should_flip(self, grid: &Grid) -> bool {
        match self {
            Orientation::Auto => grid.should_flip(),
            Orientation::Flipped => true,
            Orientation::AsCaptured => false,
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Orientation::Auto => write!(f, "auto"),
            Orientation::Flipped => write!(f, "flipped"),
            Orientation::AsCaptured => write!(f, "as captured"),
        }
    }
}

/// Inputs that stay fixed for a whole session.
#[derive(Clone, Debug)]
pub struct Recognizer {
    pub calibration: Calibration,
    pub templates_dir: PathBuf,
    pub params: RecognitionParams,
    pub orientation: Orientation,
    pub debug_dir: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recognition {
    pub flipped: bool,
    pub fen: String,
}

/// Cuts the calibrated rectangle out of `frame`, clamped to the frame bounds.
pub fn crop_board(frame: &RgbImage, calibration: &Calibration) -> Result<RgbImage> {
    let (fw, fh) = frame.dimensions();
    let left = calibration.left.clamp(0, fw as i32) as u32;
    let top = calibration.top.clamp(0, fh as i32) as u32;
    let right = calibration.right.clamp(0, fw as i32) as u32;
    let bottom = calibration.bottom.clamp(0, fh as i32) as u32;

    let (width, height) = (right.saturating_sub(left), bottom.saturating_sub(top));
    if width < 8 || height < 8 {
        return Err(BoardError::CaptureFailed(format!(
            "board rectangle ({}, {}) - ({}, {}) lies outside the {}x{} frame",
            calibration.left, calibration.top, calibration.right, calibration.bottom, fw, fh
        )));
    }
    if width as i32 != calibration.width() || height as i32 != calibration.height() {
        warn!(
            "Board rectangle clipped to {}x{} by the {}x{} frame; recalibrate if the window shrank",
            width, height, fw, fh
        );
    }
    Ok(imageops::crop_imm(frame, left, top, width, height).to_image())
}

impl Recognizer {
    /// Runs the whole pipeline on one window frame.
    pub fn recognize(&self, frame: &RgbImage) -> Result<Recognition> {
        let start = Instant::now();
        if let Some(dir) = &self.debug_dir {
            save_debug(frame, &dir.join("window.png"));
        }
        let board = crop_board(frame, &self.calibration)?;
        if let Some(dir) = &self.debug_dir {
            save_debug(&board, &dir.join("board.png"));
        }

        let size = square_size(&board);
        let templates = TemplateLibrary::load(&self.templates_dir, size, &self.params)?;
        let captured = BoardGridBuilder::new(&templates, &self.params)
            .with_debug_dir(self.debug_dir.as_deref())
            .build(&board);

        let flipped = self.orientation.should_flip(&captured);
        let grid = captured.oriented(flipped);
        let fen = fen::encode(&grid);
        debug!(
            "Recognized board ({}px squares, orientation {}, flipped {}) in {:?}",
            size,
            self.orientation,
            flipped,
            start.elapsed()
        );
        Ok(Recognition { flipped, fen })
    }
}

fn save_debug(image: &RgbImage, path: &Path) {
    if let Err(e) = image.save(path) {
        warn!("Failed to save debug image {}: {}", path.display(), e);
    }
}
