//! Piece identity.
//! Templates are keyed by two-character codes (`wP`, `bK`, ...) taken from their file names;
//! grid squares hold `Option<Piece>` where `None` means an empty square.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    White,
    Black,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl Kind {
    pub const ALL: [Kind; 6] = [
        Kind::Pawn,
        Kind::Knight,
        Kind::Bishop,
        Kind::Rook,
        Kind::Queen,
        Kind::King,
    ];

    /// Uppercase FEN letter.
    pub fn letter(self) -> char {
        match self {
            Kind::Pawn => 'P',
            Kind::Knight => 'N',
            Kind::Bishop => 'B',
            Kind::Rook => 'R',
            Kind::Queen => 'Q',
            Kind::King => 'K',
        }
    }

    pub fn from_letter(letter: char) -> Option<Kind> {
        Kind::ALL.into_iter().find(|k| k.letter() == letter)
    }
}

/// A colored chess piece.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Piece {
    pub color: Color,
    pub kind: Kind,
}

impl Piece {
    pub fn new(color: Color, kind: Kind) -> Self {
        Self { color, kind }
    }

    /// Every supported piece, white first.
    pub fn all() -> impl Iterator<Item = Piece> {
        [Color::White, Color::Black]
            .into_iter()
            .flat_map(|color| Kind::ALL.into_iter().map(move |kind| Piece::new(color, kind)))
    }

    /// FEN character: uppercase for white, lowercase for black.
    pub fn fen_char(self) -> char {
        match self.color {
            Color::White => self.kind.letter(),
            Color::Black => self.kind.letter().to_ascii_lowercase(),
        }
    }

    #[cfg(test)]
    pub fn from_fen_char(c: char) -> Option<Piece> {
        let kind = Kind::from_letter(c.to_ascii_uppercase())?;
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        Some(Piece::new(color, kind))
    }

    /// Template code, e.g. `wN` or `bQ`.
    pub fn code(self) -> String {
        let prefix = match self.color {
            Color::White => 'w',
            Color::Black => 'b',
        };
        format!("{}{}", prefix, self.kind.letter())
    }

    pub fn is_white(self) -> bool {
        self.color == Color::White
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognized piece code '{0}' (expected w|b followed by P, N, B, R, Q or K)")]
pub struct ParsePieceError(pub String);

impl FromStr for Piece {
    type Err = ParsePieceError;

    /// Codes are case-sensitive: `wK` is valid, `WK` and `wk` are not.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let (Some(c), Some(k), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(ParsePieceError(s.to_string()));
        };
        let color = match c {
            'w' => Color::White,
            'b' => Color::Black,
            _ => return Err(ParsePieceError(s.to_string())),
        };
        let kind = Kind::from_letter(k).ok_or_else(|| ParsePieceError(s.to_string()))?;
        Ok(Piece::new(color, kind))
    }
}
