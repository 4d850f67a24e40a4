//! Parse errors for the board-facing text formats.
//!
//! The search core never produces errors; everything here guards the UCI/FEN
//! boundary, where malformed input is reported and otherwise ignored.

use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SquareParseError {
    notation: String,
}

impl SquareParseError {
    pub(crate) fn new(notation: &str) -> Self {
        SquareParseError {
            notation: notation.to_string(),
        }
    }
}

impl fmt::Display for SquareParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid square notation: {:?}", self.notation)
    }
}

impl Error for SquareParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveParseError {
    notation: String,
}

impl MoveParseError {
    pub(crate) fn new(notation: &str) -> Self {
        MoveParseError {
            notation: notation.to_string(),
        }
    }
}

impl fmt::Display for MoveParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid move notation: {:?}", self.notation)
    }
}

impl Error for MoveParseError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceParseError(pub(crate) char);

impl fmt::Display for PieceParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid piece character: {:?}", self.0)
    }
}

impl Error for PieceParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FenError {
    /// The piece-placement field is malformed.
    BadBoard(String),
    /// Missing or malformed side-to-move field.
    BadSide(String),
    /// Malformed castling-rights field.
    BadCastling(String),
    /// Malformed en-passant field.
    BadEnPassant(String),
    /// Placement does not put exactly one king per side on the board.
    BadKings,
}

impl fmt::Display for FenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FenError::BadBoard(s) => write!(f, "invalid FEN board field: {s:?}"),
            FenError::BadSide(s) => write!(f, "invalid FEN side field: {s:?}"),
            FenError::BadCastling(s) => write!(f, "invalid FEN castling field: {s:?}"),
            FenError::BadEnPassant(s) => write!(f, "invalid FEN en-passant field: {s:?}"),
            FenError::BadKings => write!(f, "FEN must place exactly one king per side"),
        }
    }
}

impl Error for FenError {}
