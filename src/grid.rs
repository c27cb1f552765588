//! Board grid assembly and orientation.
//! The cropped board is cut into 64 equal tiles, row-major from the top-left, and each tile
//! is classified. Row 0 is the top of the captured image, whichever side that turns out to be.

use crate::classify::classify;
use crate::config::RecognitionParams;
use crate::piece::Piece;
use crate::templates::TemplateLibrary;
use image::RgbImage;
use image::imageops;
use log::warn;
use std::path::Path;

/// 8x8 square labels in captured orientation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Grid {
    cells: [[Option<Piece>; 8]; 8],
}

impl Grid {
    pub fn empty() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn get(&self, row: usize, col: usize) -> Option<Piece> {
        self.cells[row][col]
    }

    pub fn set(&mut self, row: usize, col: usize, piece: Option<Piece>) {
        self.cells[row][col] = piece;
    }

    pub fn rows(&self) -> &[[Option<Piece>; 8]; 8] {
        &self.cells
    }

    fn white_count(&self, rows: std::ops::Range<usize>) -> usize {
        self.cells[rows]
            .iter()
            .flatten()
            .filter(|cell| cell.is_some_and(Piece::is_white))
            .count()
    }

    /// White material nearer the top than the bottom means black is at the bottom of the screen.
    ///
    /// Heuristic: sparse or symmetric positions can resolve the wrong way.
    pub fn should_flip(&self) -> bool {
        let top_white = self.white_count(0..2);
        let bottom_white = self.white_count(6..8);
        top_white > bottom_white
    }

    /// 180 degree rotation: rows reversed, then every row reversed.
    pub fn rotated(&self) -> Grid {
        let mut cells = self.cells;
        cells.reverse();
        for row in cells.iter_mut() {
            row.reverse();
        }
        Grid { cells }
    }

    /// Applies the flip decision.
    pub fn oriented(self, flip: bool) -> Grid {
        if flip { self.rotated() } else { self }
    }
}

/// Side of one tile for a cropped board, `floor(min(w, h) / 8)`.
pub fn square_size(board: &RgbImage) -> u32 {
    board.width().min(board.height()) / 8
}

/// Classifies all 64 tiles of a cropped board.
#[derive(Debug, Clone, Copy)]
pub struct BoardGridBuilder<'a> {
    templates: &'a TemplateLibrary,
    params: &'a RecognitionParams,
    debug_dir: Option<&'a Path>,
}

impl<'a> BoardGridBuilder<'a> {
    pub fn new(templates: &'a TemplateLibrary, params: &'a RecognitionParams) -> Self {
        Self {
            templates,
            params,
            debug_dir: None,
        }
    }

    /// Saves every tile as `square_{row}_{col}.png` under `dir`.
    pub fn with_debug_dir(mut self, dir: Option<&'a Path>) -> Self {
        self.debug_dir = dir;
        self
    }

    pub fn build(&self, board: &RgbImage) -> Grid {
        let size = square_size(board);
        let mut grid = Grid::empty();
        if size == 0 {
            warn!(
                "Board crop {}x{} is smaller than 8x8 pixels",
                board.width(),
                board.height()
            );
            return grid;
        }
        if size != self.templates.square_size() {
            warn!(
                "Square size {}px differs from template size {}px",
                size,
                self.templates.square_size()
            );
        }

        for row in 0..8u32 {
            for col in 0..8u32 {
                let tile = imageops::crop_imm(board, col * size, row * size, size, size).to_image();
                grid.set(
                    row as usize,
                    col as usize,
                    classify(&tile, self.templates, self.params),
                );
                if let Some(dir) = self.debug_dir {
                    let path = dir.join(format!("square_{}_{}.png", row, col));
                    if let Err(e) = tile.save(&path) {
                        warn!("Failed to save debug tile {}: {}", path.display(), e);
                    }
                }
            }
        }
        grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::{Color, Kind};
    use crate::templates::test_support::*;
    use image::{DynamicImage, Rgb};
    use tempfile::tempdir;

    fn white(kind: Kind) -> Option<Piece> {
        Some(Piece::new(Color::White, kind))
    }

    fn black(kind: Kind) -> Option<Piece> {
        Some(Piece::new(Color::Black, kind))
    }

    #[test]
    fn test_flip_when_white_is_on_top() {
        let mut grid = Grid::empty();
        grid.set(0, 0, white(Kind::Rook));
        grid.set(0, 4, white(Kind::King));
        grid.set(1, 3, white(Kind::Pawn));
        grid.set(7, 2, white(Kind::Bishop));
        grid.set(7, 4, black(Kind::King));
        assert!(grid.should_flip());
    }

    #[test]
    fn test_no_flip_when_balanced_or_white_below() {
        let mut grid = Grid::empty();
        assert!(!grid.should_flip());

        grid.set(0, 0, white(Kind::Rook));
        grid.set(6, 0, white(Kind::Pawn));
        assert!(!grid.should_flip());

        // Black pieces on top and white pieces in the middle ranks do not count.
        grid.set(1, 1, black(Kind::Queen));
        grid.set(3, 3, white(Kind::Queen));
        grid.set(4, 3, white(Kind::Knight));
        assert!(!grid.should_flip());
    }

    #[test]
    fn test_rotation_is_180_degrees() {
        let mut grid = Grid::empty();
        grid.set(0, 0, black(Kind::Rook));
        grid.set(2, 5, white(Kind::Knight));
        let rotated = grid.rotated();
        assert_eq!(rotated.get(7, 7), black(Kind::Rook));
        assert_eq!(rotated.get(5, 2), white(Kind::Knight));
        assert_eq!(rotated.get(0, 0), None);
        assert_eq!(rotated.rotated(), grid);
        assert_eq!(grid.clone().oriented(false), grid);
    }

    #[test]
    fn test_square_size_uses_shorter_side() {
        assert_eq!(square_size(&RgbImage::new(260, 250)), 31);
        assert_eq!(square_size(&RgbImage::new(7, 100)), 0);
    }

    #[test]
    fn test_build_places_tiles_row_major() {
        let dir = tempdir().unwrap();
        write_templates(dir.path(), &[WHITE_KING, WHITE_ROOK, BLACK_PAWN]);
        let params = RecognitionParams::default();
        let lib = TemplateLibrary::load(dir.path(), SIZE, &params).unwrap();

        let mut board = RgbImage::from_pixel(SIZE * 8, SIZE * 8, Rgb([BACKGROUND; 3]));
        let placed = [(0, 7, BLACK_PAWN), (3, 2, WHITE_ROOK), (7, 4, WHITE_KING)];
        for (row, col, piece) in placed {
            let tile = DynamicImage::ImageLuma8(artwork(piece)).to_rgb8();
            imageops::replace(&mut board, &tile, (col * SIZE) as i64, (row * SIZE) as i64);
        }

        let debug = tempdir().unwrap();
        let grid = BoardGridBuilder::new(&lib, &params)
            .with_debug_dir(Some(debug.path()))
            .build(&board);

        let mut expected = Grid::empty();
        for (row, col, piece) in placed {
            expected.set(row as usize, col as usize, Some(piece));
        }
        assert_eq!(grid, expected);
        assert!(debug.path().join("square_0_0.png").exists());
        assert!(debug.path().join("square_7_7.png").exists());
    }

    #[test]
    fn test_debug_dir_does_not_change_result() {
        let dir = tempdir().unwrap();
        write_templates(dir.path(), &[WHITE_KING]);
        let params = RecognitionParams::default();
        let lib = TemplateLibrary::load(dir.path(), SIZE, &params).unwrap();
        let mut board = RgbImage::from_pixel(SIZE * 8, SIZE * 8, Rgb([BACKGROUND; 3]));
        let tile = DynamicImage::ImageLuma8(artwork(WHITE_KING)).to_rgb8();
        imageops::replace(&mut board, &tile, 0, 0);

        let missing = dir.path().join("does/not/exist");
        let with_debug = BoardGridBuilder::new(&lib, &params)
            .with_debug_dir(Some(&missing))
            .build(&board);
        let without = BoardGridBuilder::new(&lib, &params).build(&board);
        assert_eq!(with_debug, without);
        assert_eq!(without.get(0, 0), Some(WHITE_KING));
    }
}
