//! FEN output.
//! Only the placement field is observed; side to move, castling, en passant and the clocks
//! cannot be read from a single frame and are emitted as fixed defaults.

use crate::grid::Grid;
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess};

/// Fields after the placement: white to move, no castling, no en passant, clocks 0 and 1.
pub const DEFAULT_SUFFIX: &str = " w - - 0 1";

pub const EMPTY_PLACEMENT: &str = "8/8/8/8/8/8/8/8";

/// Placement field, rank records from the top row down.
pub fn placement(grid: &Grid) -> String {
    let records: Vec<String> = grid
        .rows()
        .iter()
        .map(|row| {
            let mut record = String::new();
            let mut empty = 0u32;
            for cell in row {
                match cell {
                    None => empty += 1,
                    Some(piece) => {
                        if empty > 0 {
                            record.push_str(&empty.to_string());
                            empty = 0;
                        }
                        record.push(piece.fen_char());
                    }
                }
            }
            if empty > 0 {
                record.push_str(&empty.to_string());
            }
            record
        })
        .collect();
    records.join("/")
}

/// Full FEN string with the default suffix.
pub fn encode(grid: &Grid) -> String {
    format!("{}{}", placement(grid), DEFAULT_SUFFIX)
}

pub fn is_empty_board(fen: &str) -> bool {
    fen.split_whitespace().next() == Some(EMPTY_PLACEMENT)
}

/// Explains why `fen` is not a legal chess position (missing kings, pawns on the back rank...).
///
/// Misrecognized squares usually show up here first; callers only log the result.
pub fn check_position(fen: &str) -> Result<(), String> {
    let parsed = Fen::from_ascii(fen.as_bytes()).map_err(|e| e.to_string())?;
    parsed
        .into_position::<Chess>(CastlingMode::Standard)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::{Color, Kind, Piece};

    fn w(kind: Kind) -> Option<Piece> {
        Some(Piece::new(Color::White, kind))
    }

    fn b(kind: Kind) -> Option<Piece> {
        Some(Piece::new(Color::Black, kind))
    }

    #[test]
    fn test_empty_board() {
        let fen = encode(&Grid::empty());
        assert_eq!(fen, "8/8/8/8/8/8/8/8 w - - 0 1");
        assert!(is_empty_board(&fen));
    }

    #[test]
    fn test_run_length_row() {
        let mut grid = Grid::empty();
        grid.set(0, 0, w(Kind::Pawn));
        grid.set(0, 3, w(Kind::King));
        assert_eq!(placement(&grid).split('/').next(), Some("P2K4"));
    }

    #[test]
    fn test_starting_position() {
        use Kind::*;
        let back = [Rook, Knight, Bishop, Queen, King, Bishop, Knight, Rook];
        let mut grid = Grid::empty();
        for (col, kind) in back.into_iter().enumerate() {
            grid.set(0, col, b(kind));
            grid.set(1, col, b(Pawn));
            grid.set(6, col, w(Pawn));
            grid.set(7, col, w(kind));
        }
        let fen = encode(&grid);
        assert_eq!(fen, "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w - - 0 1");
        assert!(!is_empty_board(&fen));
        assert_eq!(check_position(&fen), Ok(()));
        assert_eq!(encode(&grid), fen);
    }

    #[test]
    fn test_trailing_and_full_rows() {
        let mut grid = Grid::empty();
        for col in 0..8 {
            grid.set(3, col, b(Kind::Pawn));
        }
        grid.set(5, 7, w(Kind::Queen));
        assert_eq!(placement(&grid), "8/8/8/pppppppp/8/7Q/8/8");
    }

    #[test]
    fn test_check_position_flags_missing_kings() {
        assert!(check_position("8/8/8/8/8/8/8/8 w - - 0 1").is_err());
        assert!(check_position("not a fen").is_err());
        assert_eq!(check_position("4k3/8/8/8/8/8/8/4K3 w - - 0 1"), Ok(()));
    }
}
