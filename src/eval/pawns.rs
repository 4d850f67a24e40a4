//! Pawn-structure evaluation, cached by the pawn hash.
//!
//! The entry is colour-symmetric (white minus black), so it only depends on
//! pawns and king squares and survives any amount of piece shuffling. The
//! pushed-passer bitboard rides along for the passer-support term in the
//! main evaluation.

use crate::board::masks::{DISTANCE, FILE_BB, ISOLATED_AREA, PAWN_AREAS, PIECE_AREA};
use crate::board::position::Position;
use crate::board::types::bitboard::{pop_lsb, Bitboard};
use crate::board::types::piece::{Piece, PieceKind, Side};
use crate::board::types::square::Square;
use crate::pawn_hash::{PawnEntry, PawnHashTable};

use super::tables::{
    BACKWARD_PENALTY, CONNECTED_BONUS, DISTANCE_BONUS, DOUBLED_PENALTY, ISOLATED_PENALTY,
    PASSER_BONUS_END, PASSER_BONUS_MID, PAWN_SHIELD, PAWN_STORM,
};

const DISTANCE_BONUS_SHIFT: i32 = 2;

/// Pawn shield and storm on the three files around the king (clamped to
/// b..g so an edge king still scores three files).
fn pawn_shield(side: Side, k_sq: Square, p_occ_f: Bitboard, p_occ_o: Bitboard) -> i32 {
    let f = k_sq.file().clamp(1, 6);
    let m = if side == Side::White { 7 } else { 0 };

    let mut score = 0;
    for fi in (f - 1)..=(f + 1) {
        let mut r_min = 7usize;
        let mut b = FILE_BB[fi] & p_occ_f;
        while b != 0 {
            let r = m ^ (pop_lsb(&mut b) >> 3);
            r_min = r_min.min(r);
        }
        score += PAWN_SHIELD[r_min];

        let mut b = FILE_BB[fi] & p_occ_o;
        while b != 0 {
            let sq = pop_lsb(&mut b);
            let r = m ^ (sq >> 3);
            let unopposed =
                PAWN_AREAS.doubled[side.flip().index()][sq] & p_occ_f == 0;
            score += PAWN_STORM[usize::from(unopposed)][r];
        }
    }
    score
}

/// Evaluate pawn structure for both sides, white minus black, consulting
/// the cache first.
pub fn pawn_eval(pos: &Position, table: &PawnHashTable) -> PawnEntry {
    if let Some(entry) = table.probe(pos.pawn_key) {
        return entry;
    }

    let p_occ = pos.kind_occ(PieceKind::Pawn);
    let mut pushed_passers = 0u64;
    let mut score_mid = 0i32;
    let mut score_end = 0i32;

    for side in Side::BOTH {
        let k_sq_f = pos.king_sq(side);
        let k_sq_o = pos.king_sq(side.flip());
        let p_occ_f = p_occ & pos.occ[side.index()];
        let p_occ_o = p_occ & pos.occ[side.flip().index()];

        let m = if side == Side::White { 7 } else { 0 };
        let mut b = p_occ_f;
        let mut d_max = 0i32;

        while b != 0 {
            let sq = pop_lsb(&mut b);
            let f = sq & 7;
            let r = m ^ (sq >> 3);
            // The square in front of the pawn.
            let ssq = if side == Side::White { sq - 8 } else { sq + 8 };

            // King-distance tension, kept for the endgame: reward pushing
            // pawns the enemy king cannot reach.
            let d = i32::from(DISTANCE[ssq][k_sq_o.index()]) * r as i32
                - i32::from(DISTANCE[ssq][k_sq_f.index()]) * (r as i32 - 1);
            d_max = d_max.max(d);

            if PAWN_AREAS.passer[side.index()][sq] & p_occ_o == 0 {
                pushed_passers |= 1u64 << ssq;
                score_mid += PASSER_BONUS_MID[r];
                score_end += PASSER_BONUS_END[r]
                    + i32::from(DISTANCE[ssq][k_sq_o.index()]) * DISTANCE_BONUS[0][r]
                    - i32::from(DISTANCE[ssq][k_sq_f.index()]) * DISTANCE_BONUS[1][r];
            }

            if PAWN_AREAS.connected[side.index()][sq] & p_occ_f != 0 {
                let opposed = PAWN_AREAS.doubled[side.index()][sq] & p_occ_o != 0;
                let div = if opposed { 2 } else { 1 };
                score_mid += CONNECTED_BONUS[0][r] / div;
                score_end += CONNECTED_BONUS[1][r] / div;
            } else {
                let p_occ_x = p_occ_f ^ (1u64 << sq);

                if PAWN_AREAS.doubled[side.index()][sq] & p_occ_x != 0 {
                    score_mid -= DOUBLED_PENALTY[0];
                    score_end -= DOUBLED_PENALTY[1];
                }

                // Backward: no friendly pawn can ever defend the stop
                // square, and an enemy pawn controls or occupies it.
                let own_pawn = Piece::new(PieceKind::Pawn, side);
                if PAWN_AREAS.passer[side.flip().index()][ssq] & !FILE_BB[f] & p_occ_x == 0
                    && (PIECE_AREA[own_pawn.index()][ssq] | (1u64 << ssq)) & p_occ_o != 0
                {
                    score_mid -= BACKWARD_PENALTY[0];
                    score_end -= BACKWARD_PENALTY[1];
                }

                if ISOLATED_AREA[f] & p_occ_x == 0 {
                    score_mid -= ISOLATED_PENALTY[0];
                    score_end -= ISOLATED_PENALTY[1];
                }
            }
        }

        score_mid += pawn_shield(side, k_sq_f, p_occ_f, p_occ_o);
        score_end += d_max << DISTANCE_BONUS_SHIFT;

        // Sign trick: after the second pass the totals are white minus
        // black.
        score_mid = -score_mid;
        score_end = -score_end;
    }

    let entry = PawnEntry {
        mid: score_mid,
        end: score_end,
        pushed_passers,
    };
    table.store(pos.pawn_key, entry);
    entry
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(fen: &str) -> PawnEntry {
        let table = PawnHashTable::new(1);
        pawn_eval(&Position::from_fen(fen).unwrap(), &table)
    }

    #[test]
    fn test_symmetric_structure_is_balanced() {
        let e = entry("4k3/pppppppp/8/8/8/8/PPPPPPPP/4K3 w - -");
        assert_eq!(e.mid, 0);
        assert_eq!(e.end, 0);
    }

    #[test]
    fn test_passer_detection() {
        // White a-pawn is passed, black pawns are not.
        let e = entry("4k3/5ppp/8/P7/8/8/5PPP/4K3 w - -");
        let a6: Square = "a6".parse().unwrap();
        assert_ne!(e.pushed_passers & a6.bb(), 0);
        assert!(e.end > 0);
    }

    #[test]
    fn test_isolated_pawn_penalised() {
        let isolated = entry("4k3/8/8/8/8/8/P2P4/4K3 w - -");
        let connected = entry("4k3/8/8/8/8/8/PP6/4K3 w - -");
        assert!(connected.mid > isolated.mid);
    }

    #[test]
    fn test_doubled_pawns_penalised() {
        let doubled = entry("4k3/8/8/8/4P3/8/4P3/4K3 w - -");
        let spread = entry("4k3/8/8/8/3P4/8/4P3/4K3 w - -");
        assert!(spread.end > doubled.end);
    }

    #[test]
    fn test_cache_roundtrip() {
        let table = PawnHashTable::new(1);
        let pos = Position::startpos();
        let fresh = pawn_eval(&pos, &table);
        let cached = pawn_eval(&pos, &table);
        assert_eq!(fresh, cached);
        assert_eq!(table.probe(pos.pawn_key), Some(fresh));
    }

    #[test]
    fn test_shield_prefers_intact_cover() {
        // Kingside castled with intact shield vs. shattered shield.
        let intact = entry("4k3/8/8/8/8/8/5PPP/6K1 w - -");
        let broken = entry("4k3/8/8/8/5P1P/8/8/6K1 w - -");
        assert!(intact.mid > broken.mid);
    }
}
