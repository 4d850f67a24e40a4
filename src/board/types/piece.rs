//! Piece encoding.
//!
//! A piece packs into 4 bits: the low 3 bits are the kind (pawn=0 .. king=5)
//! and bit 3 is the side. The reserved value 15 means "empty square", so a
//! plain `[Piece; 64]` board array doubles as an index into the per-piece
//! tables (16 rows).

use std::fmt;

use crate::board::error::PieceParseError;

/// Side to move / piece colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Side {
    White = 0,
    Black = 1,
}

impl Side {
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    #[must_use]
    pub const fn flip(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    #[inline]
    #[must_use]
    pub const fn from_index(idx: usize) -> Side {
        if idx == 0 {
            Side::White
        } else {
            Side::Black
        }
    }

    pub const BOTH: [Side; 2] = [Side::White, Side::Black];
}

/// Piece kind, side-agnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PieceKind {
    Pawn = 0,
    Knight = 1,
    Bishop = 2,
    Rook = 3,
    Queen = 4,
    King = 5,
}

impl PieceKind {
    pub const ALL: [PieceKind; 6] = [
        PieceKind::Pawn,
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
        PieceKind::King,
    ];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[inline]
    #[must_use]
    pub const fn from_index(idx: usize) -> PieceKind {
        match idx {
            0 => PieceKind::Pawn,
            1 => PieceKind::Knight,
            2 => PieceKind::Bishop,
            3 => PieceKind::Rook,
            4 => PieceKind::Queen,
            _ => PieceKind::King,
        }
    }

    #[must_use]
    pub const fn to_char(self) -> char {
        match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        }
    }

    #[must_use]
    pub const fn from_char(c: char) -> Option<PieceKind> {
        match c {
            'p' => Some(PieceKind::Pawn),
            'n' => Some(PieceKind::Knight),
            'b' => Some(PieceKind::Bishop),
            'r' => Some(PieceKind::Rook),
            'q' => Some(PieceKind::Queen),
            'k' => Some(PieceKind::King),
            _ => None,
        }
    }
}

/// Number of rows in piece-indexed tables (the packed encoding spans 0-15).
pub const PIECE_LIMIT: usize = 16;

/// A side-encoded piece, or the empty marker.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece(u8);

impl Piece {
    pub const EMPTY: Piece = Piece(15);

    const SIDE_BIT: u8 = 8;

    #[inline]
    #[must_use]
    pub const fn new(kind: PieceKind, side: Side) -> Piece {
        Piece(kind as u8 | ((side as u8) << 3))
    }

    #[inline]
    #[must_use]
    pub const fn from_index(idx: usize) -> Piece {
        Piece(idx as u8)
    }

    /// Table index, 0-15. Empty maps to 15.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 15
    }

    /// Kind of a non-empty piece.
    #[inline]
    #[must_use]
    pub const fn kind(self) -> PieceKind {
        PieceKind::from_index((self.0 & 7) as usize)
    }

    #[inline]
    #[must_use]
    pub const fn side(self) -> Side {
        if self.0 & Self::SIDE_BIT == 0 {
            Side::White
        } else {
            Side::Black
        }
    }

    #[inline]
    #[must_use]
    pub const fn flip_side(self) -> Piece {
        Piece(self.0 ^ Self::SIDE_BIT)
    }

    #[inline]
    #[must_use]
    pub const fn is_kind(self, kind: PieceKind) -> bool {
        !self.is_empty() && (self.0 & 7) == kind as u8
    }

    #[must_use]
    pub fn from_fen_char(c: char) -> Result<Piece, PieceParseError> {
        let side = if c.is_ascii_uppercase() {
            Side::White
        } else {
            Side::Black
        };
        PieceKind::from_char(c.to_ascii_lowercase())
            .map(|kind| Piece::new(kind, side))
            .ok_or(PieceParseError(c))
    }

    #[must_use]
    pub fn to_fen_char(self) -> char {
        let c = self.kind().to_char();
        match self.side() {
            Side::White => c.to_ascii_uppercase(),
            Side::Black => c,
        }
    }
}

impl fmt::Debug for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            write!(f, "Piece(empty)")
        } else {
            write!(f, "Piece({:?} {:?})", self.side(), self.kind())
        }
    }
}
