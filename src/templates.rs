//! Piece template library.
//! Each image in the template directory is named after its piece code (`wP.png`, `bK.png`),
//! decoded to grayscale, resized to the current square size and reduced to a Canny edge map.
//! Templates are kept sorted by code so classification is reproducible.

use crate::config::RecognitionParams;
use crate::error::{BoardError, Result};
use crate::piece::Piece;
use image::imageops::{self, FilterType};
use image::{GrayImage, ImageFormat};
use imageproc::edges::canny;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Edge map of one piece image at a fixed square size.
#[derive(Clone, Debug)]
pub struct Template {
    pub piece: Piece,
    pub edges: GrayImage,
}

#[derive(Clone, Debug)]
pub struct TemplateLibrary {
    square_size: u32,
    templates: Vec<Template>,
}

/// Canny edge map with the configured thresholds.
pub(crate) fn edge_map(gray: &GrayImage, params: &RecognitionParams) -> GrayImage {
    canny(gray, params.canny_low, params.canny_high)
}

impl TemplateLibrary {
    /// Loads every usable template in `dir`, scaled to `square_size` pixels.
    pub fn load(dir: &Path, square_size: u32, params: &RecognitionParams) -> Result<Self> {
        let start = Instant::now();
        if square_size == 0 {
            return Err(BoardError::InvalidConfig("square size must be at least 1".into()));
        }

        let entries = fs::read_dir(dir).map_err(|e| {
            warn!("Cannot read template directory {}: {}", dir.display(), e);
            BoardError::NoTemplatesFound(dir.to_path_buf())
        })?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_image_file(path))
            .collect();
        paths.sort();

        let mut templates: Vec<Template> = Vec::with_capacity(paths.len());
        for path in &paths {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let piece: Piece = match stem.parse() {
                Ok(piece) => piece,
                Err(e) => {
                    warn!("Skipping template {}: {}", path.display(), e);
                    continue;
                }
            };
            if templates.iter().any(|t| t.piece == piece) {
                warn!("Skipping duplicate template {} for {}", path.display(), piece);
                continue;
            }
            let gray = match image::open(path) {
                Ok(img) => img.to_luma8(),
                Err(e) => {
                    warn!("Skipping unreadable template {}: {}", path.display(), e);
                    continue;
                }
            };
            let resized = imageops::resize(&gray, square_size, square_size, FilterType::Triangle);
            templates.push(Template {
                piece,
                edges: edge_map(&resized, params),
            });
        }

        if templates.is_empty() {
            return Err(BoardError::NoTemplatesFound(dir.to_path_buf()));
        }
        templates.sort_by_key(|t| t.piece.code());
        for piece in Piece::all() {
            if !templates.iter().any(|t| t.piece == piece) {
                debug!("No template for {}; it will never be recognized", piece.code());
            }
        }

        debug!(
            "Loaded {} templates at {}px in {:?}",
            templates.len(),
            square_size,
            start.elapsed()
        );
        Ok(Self {
            square_size,
            templates,
        })
    }

    pub fn square_size(&self) -> u32 {
        self.square_size
    }

    /// Templates in ascending code order.
    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(ImageFormat::from_extension)
        .is_some()
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Synthetic piece artwork shared by the recognition tests.

    use crate::config::Calibration;
    use crate::piece::{Color, Kind, Piece};
    use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage, imageops};
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
    use imageproc::rect::Rect;
    use std::path::Path;

    pub const BACKGROUND: u8 = 200;
    pub const SIZE: u32 = 32;

    pub const WHITE_KING: Piece = Piece {
        color: Color::White,
        kind: Kind::King,
    };
    pub const WHITE_ROOK: Piece = Piece {
        color: Color::White,
        kind: Kind::Rook,
    };
    pub const BLACK_PAWN: Piece = Piece {
        color: Color::Black,
        kind: Kind::Pawn,
    };

    /// A distinct, clearly edged shape per piece on a flat background.
    pub fn artwork(piece: Piece) -> GrayImage {
        let mut img = GrayImage::from_pixel(SIZE, SIZE, Luma([BACKGROUND]));
        let ink = Luma([20u8]);
        match piece {
            WHITE_KING => {
                draw_filled_rect_mut(&mut img, Rect::at(14, 5).of_size(4, 22), ink);
                draw_filled_rect_mut(&mut img, Rect::at(7, 11).of_size(18, 4), ink);
            }
            WHITE_ROOK => {
                draw_filled_rect_mut(&mut img, Rect::at(5, 5).of_size(22, 22), ink);
            }
            BLACK_PAWN => {
                draw_filled_circle_mut(&mut img, (16, 16), 6, ink);
            }
            _ => {
                draw_filled_rect_mut(&mut img, Rect::at(6, 20).of_size(20, 5), ink);
            }
        }
        img
    }

    /// Window frame with an 8x8 board of `SIZE` squares inset by `margin`, `pieces` at
    /// (row, col), and the calibration that matches the board.
    pub fn board_frame(pieces: &[(u32, u32, Piece)], margin: u32) -> (RgbImage, Calibration) {
        let board_px = SIZE * 8;
        let side = board_px + 2 * margin;
        let mut frame = RgbImage::from_pixel(side, side, Rgb([BACKGROUND; 3]));
        for &(row, col, piece) in pieces {
            let tile = DynamicImage::ImageLuma8(artwork(piece)).to_rgb8();
            imageops::replace(
                &mut frame,
                &tile,
                (margin + col * SIZE) as i64,
                (margin + row * SIZE) as i64,
            );
        }
        let calibration = Calibration {
            left: margin as i32,
            top: margin as i32,
            right: (margin + board_px) as i32,
            bottom: (margin + board_px) as i32,
        };
        (frame, calibration)
    }

    /// Writes `<code>.png` for each piece into `dir`.
    pub fn write_templates(dir: &Path, pieces: &[Piece]) {
        for piece in pieces {
            artwork(*piece)
                .save(dir.join(format!("{}.png", piece.code())))
                .unwrap();
        }
    }
}
