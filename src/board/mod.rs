//! Board domain: packed types, precomputed tables, position state, move
//! generation, legality and SEE.

pub mod attacks;
pub mod error;
pub mod fen;
pub mod legality;
pub mod make;
pub mod masks;
pub mod movegen;
pub mod perft;
pub mod position;
pub mod see;
pub mod types;

pub use make::BoardStack;
pub use position::{Position, MAX_PLY, PLY_LIMIT};
pub use types::bitboard::Bitboard;
pub use types::moves::{Move, MoveList, MAX_CAPTURES, MAX_MOVES};
pub use types::piece::{Piece, PieceKind, Side};
pub use types::square::Square;
