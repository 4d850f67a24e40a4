//! Zobrist hashing for positions and pawn structure.
//!
//! One 64-bit key per (square, piece-index) pair, with an extra piece-index
//! slot per square for the en-passant target, a key per castling-rights
//! bitmap value, and a side-to-move key. Keys come from a fixed-seed
//! `StdRng` so they are stable within a process and across runs.

use once_cell::sync::Lazy;
use rand::prelude::*;

use crate::board::types::piece::PIECE_LIMIT;

/// Piece-index slot used for the en-passant target square.
pub const EP_SLOT: usize = PIECE_LIMIT;

const Z_SLOTS: usize = PIECE_LIMIT + 1;

pub struct ZobristKeys {
    /// `positions[square][piece-index]`; index 16 is the en-passant slot.
    pub positions: [[u64; Z_SLOTS]; 64],
    /// One key per castling-rights bitmap value (0 is never XORed in).
    pub castling: [u64; 16],
    pub side: u64,
}

pub static ZOBRIST: Lazy<ZobristKeys> = Lazy::new(|| {
    let mut rng = StdRng::seed_from_u64(0x5ab1_e0c0_ffee_1234);
    let mut positions = [[0u64; Z_SLOTS]; 64];
    for row in &mut positions {
        for key in row.iter_mut() {
            *key = rng.gen();
        }
    }
    let mut castling = [0u64; 16];
    for key in &mut castling {
        *key = rng.gen();
    }
    ZobristKeys {
        positions,
        castling,
        side: rng.gen(),
    }
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_stable_and_distinct() {
        assert_eq!(ZOBRIST.positions[0][0], ZOBRIST.positions[0][0]);
        assert_ne!(ZOBRIST.positions[0][0], ZOBRIST.positions[0][1]);
        assert_ne!(ZOBRIST.positions[0][0], ZOBRIST.positions[1][0]);
        assert_ne!(ZOBRIST.side, 0);
    }
}
