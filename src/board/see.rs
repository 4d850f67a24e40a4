//! Static Exchange Evaluation.
//!
//! Plays out the capture sequence on one square, always answering with the
//! cheapest attacker, revealing x-ray attackers as pieces come off, and
//! folds the gains backward. Pinned pieces may not join the exchange while
//! all of their pinners are still on the board.

use super::attacks::{bishop_attacks, king_attacks, knight_attacks, rook_attacks};
use super::masks::PIECE_AREA;
use super::position::Position;
use super::types::bitboard::Bitboard;
use super::types::moves::Move;
use super::types::piece::{Piece, PieceKind, Side};
use crate::eval::tables::PIECE_VALUE;

const MAX_EXCHANGES: usize = 32;

impl Position {
    /// Material outcome of the exchange started by `mv`, in centipawns from
    /// the mover's point of view. With `prune_positive`, returns 0 as soon
    /// as the captured piece is worth at least the capturing piece (the
    /// "cannot lose material" shortcut used by the pruning heuristics).
    #[must_use]
    pub fn see(&self, mv: Move, prune_positive: bool) -> i32 {
        let to = mv.to();
        let from = mv.from();
        let piece = self.piece_at(from);
        let captured = self.piece_at(to);
        if piece.is_empty() {
            return 0;
        }

        let mut side = piece.side();
        let mut pv = PIECE_VALUE[piece.kind().index()];
        let mut captured_value = 0;
        if !captured.is_empty() {
            captured_value = PIECE_VALUE[captured.kind().index()];
            if prune_positive && pv <= captured_value {
                return 0;
            }
        }

        let is_promotion = mv.promotion().is_some();
        let promo_gain =
            PIECE_VALUE[PieceKind::Queen.index()] - PIECE_VALUE[PieceKind::Pawn.index()];
        let mut occ = self.occupied() ^ from.bb();

        let mut gain = [0i32; MAX_EXCHANGES];
        gain[0] = captured_value;
        if is_promotion && piece.is_kind(PieceKind::Pawn) {
            pv += promo_gain;
            gain[0] += promo_gain;
        } else if self.ep_sq == Some(to) && piece.is_kind(PieceKind::Pawn) {
            occ ^= to.ep_pair().bb();
            gain[0] = PIECE_VALUE[PieceKind::Pawn.index()];
        }

        let bq = self.kind_occ(PieceKind::Bishop) | self.kind_occ(PieceKind::Queen);
        let rq = self.kind_occ(PieceKind::Rook) | self.kind_occ(PieceKind::Queen);

        let t = to.index();
        let w_pawn = Piece::new(PieceKind::Pawn, Side::White).index();
        let b_pawn = Piece::new(PieceKind::Pawn, Side::Black).index();
        let mut att = PIECE_AREA[b_pawn][t]
            & self.kind_occ(PieceKind::Pawn)
            & self.occ[Side::White.index()];
        att |= PIECE_AREA[w_pawn][t]
            & self.kind_occ(PieceKind::Pawn)
            & self.occ[Side::Black.index()];
        att |= king_attacks(to) & (self.king_sq(Side::White).bb() | self.king_sq(Side::Black).bb());
        att |= knight_attacks(to) & self.kind_occ(PieceKind::Knight);
        att |= bishop_attacks(occ, to) & bq;
        att |= rook_attacks(occ, to) & rq;
        att &= occ;

        // Pin state for both sides: a pinned piece stays out of the
        // exchange while every one of its pinners is still in `occ`.
        let mut pinned = [0u64; 2];
        let mut pinners = [0u64; 2];
        if att != 0 {
            pinned[self.side.index()] = self.pinned[self.side.index()];
            pinners[self.side.flip().index()] = self.pinners[self.side.flip().index()];
            let opp = self.side.flip();
            let (p, pr, _, _) = self.pins_and_attacks_to(self.king_sq(opp), self.side, opp);
            pinned[opp.index()] = p;
            pinners[self.side.index()] = pr;
        }

        let mut cnt = 1usize;
        while att != 0 && cnt < MAX_EXCHANGES {
            side = side.flip();
            let mut side_att = att & self.occ[side.index()];

            if pinners[side.flip().index()] & !occ == 0 {
                side_att &= !pinned[side.index()];
            }
            if side_att == 0 {
                break;
            }

            // Cheapest attacker; fall back to the king.
            let mut kind = PieceKind::King;
            let mut pb: Bitboard = side_att;
            for k in [
                PieceKind::Pawn,
                PieceKind::Knight,
                PieceKind::Bishop,
                PieceKind::Rook,
                PieceKind::Queen,
            ] {
                let candidates = side_att & self.kind_occ(k);
                if candidates != 0 {
                    kind = k;
                    pb = candidates;
                    break;
                }
            }

            // A king may not recapture while the other side still attacks.
            if kind == PieceKind::King && att & self.occ[side.flip().index()] & occ != 0 {
                break;
            }

            let pb = pb & pb.wrapping_neg();
            occ ^= pb;
            if matches!(kind, PieceKind::Pawn | PieceKind::Bishop | PieceKind::Queen) {
                att |= bishop_attacks(occ, to) & bq;
            }
            if matches!(kind, PieceKind::Rook | PieceKind::Queen) {
                att |= rook_attacks(occ, to) & rq;
            }
            att &= occ;

            gain[cnt] = pv - gain[cnt - 1];
            pv = PIECE_VALUE[kind.index()];
            if is_promotion && kind == PieceKind::Pawn {
                pv += promo_gain;
                gain[cnt] += promo_gain;
            }
            cnt += 1;
        }

        while cnt > 1 {
            cnt -= 1;
            if gain[cnt - 1] > -gain[cnt] {
                gain[cnt - 1] = -gain[cnt];
            }
        }
        gain[0]
    }
}
