//! Sliding-attack lookup tables.
//!
//! Bishop and rook attacks are table lookups indexed by the relevant
//! occupancy bits, extracted with a bit-extract over the per-square
//! occupancy mask. On x86-64 with BMI2 the extraction is a single `pext`
//! instruction; elsewhere a software scan packs the bits the same way.
//! The tables are flattened into one allocation per piece with per-square
//! offsets: 5248 entries for bishops, 102400 for rooks.

use once_cell::sync::Lazy;

use super::masks::{deposit_bits, ray_attacks, slider_occupancy_mask, PIECE_AREA};
use super::types::bitboard::{pop_lsb, Bitboard};
use super::types::piece::{Piece, PieceKind, Side};
use super::types::square::Square;

pub(crate) const BISHOP_TABLE_SIZE: usize = 5248;
pub(crate) const ROOK_TABLE_SIZE: usize = 102_400;

struct SliderLookup {
    mask: Bitboard,
    offset: usize,
}

struct SliderTable {
    attacks: Vec<Bitboard>,
    lookup: [SliderLookup; 64],
}

fn build_slider_table(kind: PieceKind, expected_size: usize) -> SliderTable {
    let piece = Piece::new(kind, Side::White);
    let mut attacks = Vec::with_capacity(expected_size);
    let mut lookup = Vec::with_capacity(64);

    for sq in 0..64 {
        let square = Square::from_index(sq);
        let mask = slider_occupancy_mask(kind, square);
        let bits = mask.count_ones();
        lookup.push(SliderLookup {
            mask,
            offset: attacks.len(),
        });
        for index in 0..(1u64 << bits) {
            let occ = deposit_bits(index, mask);
            attacks.push(ray_attacks(occ, piece, square));
        }
    }

    debug_assert_eq!(attacks.len(), expected_size);
    SliderTable {
        attacks,
        lookup: lookup.try_into().unwrap_or_else(|_| unreachable!()),
    }
}

static BISHOP_TABLE: Lazy<SliderTable> =
    Lazy::new(|| build_slider_table(PieceKind::Bishop, BISHOP_TABLE_SIZE));
static ROOK_TABLE: Lazy<SliderTable> =
    Lazy::new(|| build_slider_table(PieceKind::Rook, ROOK_TABLE_SIZE));

/// Extract the bits of `occ` selected by `mask`, packed to the low end.
#[inline]
fn extract_bits(occ: Bitboard, mask: Bitboard) -> usize {
    #[cfg(all(target_arch = "x86_64", target_feature = "bmi2"))]
    {
        unsafe { core::arch::x86_64::_pext_u64(occ, mask) as usize }
    }
    #[cfg(not(all(target_arch = "x86_64", target_feature = "bmi2")))]
    {
        let mut index = 0usize;
        let mut bit = 0u32;
        let mut m = mask;
        while m != 0 {
            let sq = pop_lsb(&mut m);
            if occ & (1u64 << sq) != 0 {
                index |= 1 << bit;
            }
            bit += 1;
        }
        index
    }
}

#[inline]
#[must_use]
pub fn bishop_attacks(occ: Bitboard, sq: Square) -> Bitboard {
    let entry = &BISHOP_TABLE.lookup[sq.index()];
    BISHOP_TABLE.attacks[entry.offset + extract_bits(occ, entry.mask)]
}

#[inline]
#[must_use]
pub fn rook_attacks(occ: Bitboard, sq: Square) -> Bitboard {
    let entry = &ROOK_TABLE.lookup[sq.index()];
    ROOK_TABLE.attacks[entry.offset + extract_bits(occ, entry.mask)]
}

#[inline]
#[must_use]
pub fn queen_attacks(occ: Bitboard, sq: Square) -> Bitboard {
    bishop_attacks(occ, sq) | rook_attacks(occ, sq)
}

#[inline]
#[must_use]
pub fn knight_attacks(sq: Square) -> Bitboard {
    PIECE_AREA[Piece::new(PieceKind::Knight, Side::White).index()][sq.index()]
}

#[inline]
#[must_use]
pub fn king_attacks(sq: Square) -> Bitboard {
    PIECE_AREA[Piece::new(PieceKind::King, Side::White).index()][sq.index()]
}

/// Attack set of `kind` on `sq` over occupancy `occ`. The per-piece scoring
/// and generation loops dispatch through this instead of being specialised
/// per piece.
#[inline]
#[must_use]
pub fn attacks_for(kind: PieceKind, occ: Bitboard, sq: Square) -> Bitboard {
    match kind {
        PieceKind::Knight => knight_attacks(sq),
        PieceKind::Bishop => bishop_attacks(occ, sq),
        PieceKind::Rook => rook_attacks(occ, sq),
        PieceKind::Queen => queen_attacks(occ, sq),
        PieceKind::King => king_attacks(sq),
        PieceKind::Pawn => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sq(s: &str) -> Square {
        s.parse().unwrap()
    }

    #[test]
    fn test_table_sizes() {
        assert_eq!(BISHOP_TABLE.attacks.len(), BISHOP_TABLE_SIZE);
        assert_eq!(ROOK_TABLE.attacks.len(), ROOK_TABLE_SIZE);
    }

    #[test]
    fn test_rook_attacks_empty_board() {
        let attacks = rook_attacks(0, sq("d4"));
        assert_eq!(attacks.count_ones(), 14);
        assert_ne!(attacks & sq("d8").bb(), 0);
        assert_ne!(attacks & sq("a4").bb(), 0);
        assert_eq!(attacks & sq("e5").bb(), 0);
    }

    #[test]
    fn test_rook_attacks_first_blocker_included() {
        let blocker = sq("d6").bb();
        let attacks = rook_attacks(blocker, sq("d4"));
        assert_ne!(attacks & sq("d5").bb(), 0);
        assert_ne!(attacks & sq("d6").bb(), 0);
        assert_eq!(attacks & sq("d7").bb(), 0);
        assert_eq!(attacks & sq("d8").bb(), 0);
    }

    #[test]
    fn test_bishop_attacks_blocked() {
        let blocker = sq("f6").bb();
        let attacks = bishop_attacks(blocker, sq("d4"));
        assert_ne!(attacks & sq("e5").bb(), 0);
        assert_ne!(attacks & sq("f6").bb(), 0);
        assert_eq!(attacks & sq("g7").bb(), 0);
        assert_ne!(attacks & sq("a1").bb(), 0);
        assert_ne!(attacks & sq("a7").bb(), 0);
    }

    #[test]
    fn test_queen_is_union() {
        let occ = sq("d6").bb() | sq("f6").bb();
        assert_eq!(
            queen_attacks(occ, sq("d4")),
            rook_attacks(occ, sq("d4")) | bishop_attacks(occ, sq("d4"))
        );
    }

    #[test]
    fn test_attacks_ignore_irrelevant_occupancy() {
        // Occupancy outside the mask (behind the edge) must not change the
        // lookup result.
        let attacks_a = rook_attacks(sq("d8").bb(), sq("d4"));
        let attacks_b = rook_attacks(sq("d8").bb() | sq("a8").bb(), sq("d4"));
        assert_eq!(attacks_a, attacks_b);
    }
}
