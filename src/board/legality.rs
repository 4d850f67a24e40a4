//! Pseudo-legality and legality checks.
//!
//! Generators emit pseudo-legal moves; `legal_move` filters lazily at make
//! time. The fast path (no pin, no check, not a king move) never applies to
//! en-passant captures, which always re-examine the king square after the
//! move because the capture removes a second piece from the board.

use super::attacks::{bishop_attacks, rook_attacks};
use super::masks::{LINE, PIECE_AREA};
use super::position::{castle, Position};
use super::types::bitboard::{pawn_attacks, pushed_pawns};
use super::types::moves::Move;
use super::types::piece::{PieceKind, Side};
use super::types::square::Square;

impl Position {
    /// Is `sq` attacked by the opponent of the side to move?
    #[must_use]
    pub fn attacked(&self, sq: Square) -> bool {
        let occ_o = self.occ[self.side.flip().index()];
        let s = sq.index();

        if PIECE_AREA[self.own(PieceKind::Pawn).index()][s]
            & self.kind_occ(PieceKind::Pawn)
            & occ_o
            != 0
        {
            return true;
        }
        if PIECE_AREA[self.own(PieceKind::Knight).index()][s]
            & self.kind_occ(PieceKind::Knight)
            & occ_o
            != 0
        {
            return true;
        }
        if PIECE_AREA[self.own(PieceKind::King).index()][s] & self.king_sq(self.side.flip()).bb()
            != 0
        {
            return true;
        }

        let occ = self.occupied();
        let bq = (self.kind_occ(PieceKind::Bishop) | self.kind_occ(PieceKind::Queen)) & occ_o;
        if bishop_attacks(occ, sq) & bq != 0 {
            return true;
        }
        let rq = (self.kind_occ(PieceKind::Rook) | self.kind_occ(PieceKind::Queen)) & occ_o;
        rook_attacks(occ, sq) & rq != 0
    }

    /// Would `sq` be attacked by the opponent once `mv` is played? Used for
    /// king moves (with `sq` = destination) and en-passant captures (with
    /// `sq` = the king square), where occupancy changes matter.
    #[must_use]
    pub fn attacked_after_move(&self, sq: Square, mv: Move) -> bool {
        let from = mv.from();
        let to = mv.to();
        let piece = self.piece_at(from);
        let s = sq.index();

        let mut occ_o = self.occ[self.side.flip().index()];
        if !self.piece_at(to).is_empty() {
            occ_o ^= to.bb();
        } else if piece.is_kind(PieceKind::Pawn) && self.ep_sq == Some(to) {
            occ_o ^= to.ep_pair().bb();
        }

        if PIECE_AREA[self.own(PieceKind::Pawn).index()][s]
            & self.kind_occ(PieceKind::Pawn)
            & occ_o
            != 0
        {
            return true;
        }
        if PIECE_AREA[self.own(PieceKind::Knight).index()][s]
            & self.kind_occ(PieceKind::Knight)
            & occ_o
            != 0
        {
            return true;
        }
        if PIECE_AREA[self.own(PieceKind::King).index()][s] & self.king_sq(self.side.flip()).bb()
            != 0
        {
            return true;
        }

        let occ_f = (self.occ[self.side.index()] ^ from.bb()) | to.bb();
        let occ = occ_f | occ_o;

        let bq = (self.kind_occ(PieceKind::Bishop) | self.kind_occ(PieceKind::Queen)) & occ_o;
        if bishop_attacks(occ, sq) & bq != 0 {
            return true;
        }
        let rq = (self.kind_occ(PieceKind::Rook) | self.kind_occ(PieceKind::Queen)) & occ_o;
        rook_attacks(occ, sq) & rq != 0
    }

    /// Can `mv` be played in this position at all: a friendly piece on the
    /// from-square that reaches the to-square given the occupancy, with the
    /// pawn/castling special cases. Used to vet moves fished out of the
    /// hash tables and the killer/counter slots.
    #[must_use]
    pub fn is_pseudo_legal(&self, mv: Move) -> bool {
        let from = mv.from();
        let to = mv.to();
        let piece = self.piece_at(from);
        if piece.is_empty() || piece.side() != self.side {
            return false;
        }
        let target = self.piece_at(to);
        if !target.is_empty() && target.side() == self.side {
            return false;
        }

        let kind = piece.kind();
        if kind == PieceKind::Pawn {
            if mv.promotion().is_none() && (to.rank() == 0 || to.rank() == 7) {
                return false;
            }
            let occ = self.occupied();
            if pushed_pawns(from.bb(), !occ, self.side) & to.bb() != 0 {
                return true;
            }
            if pawn_attacks(from.bb(), self.side) & to.bb() != 0 {
                return !target.is_empty() || self.ep_sq == Some(to);
            }
            return false;
        }

        if kind != PieceKind::King {
            if PIECE_AREA[piece.index()][from.index()] & to.bb() == 0 {
                return false;
            }
            if kind == PieceKind::Knight {
                return true;
            }
            return LINE[from.index()][to.index()] & self.occupied() == 0;
        }

        let diff = to.index() as i32 - from.index() as i32;
        if diff == 2 || diff == -2 {
            if self.c_flag == 0
                || !target.is_empty()
                || !self
                    .piece_at(Square::from_index((from.index() + to.index()) / 2))
                    .is_empty()
            {
                return false;
            }
            return if diff > 0 {
                self.c_flag
                    & if self.side == Side::White {
                        castle::WHITE_KING_SIDE
                    } else {
                        castle::BLACK_KING_SIDE
                    }
                    != 0
            } else {
                self.piece_at(to.offset(-1)).is_empty()
                    && self.c_flag
                        & if self.side == Side::White {
                            castle::WHITE_QUEEN_SIDE
                        } else {
                            castle::BLACK_QUEEN_SIDE
                        }
                        != 0
            };
        }
        PIECE_AREA[piece.index()][from.index()] & to.bb() != 0
    }

    /// Given a pseudo-legal move, would it leave the mover's king safe?
    #[must_use]
    pub fn legal_move(&self, mv: Move) -> bool {
        let k_sq = self.king_sq(self.side);
        if k_sq.is_none() {
            return false;
        }

        let from = mv.from();
        let to = mv.to();
        let piece = self.piece_at(from);
        let kind = piece.kind();
        let pinned = self.pinned[self.side.index()];
        let is_ep = self.ep_sq == Some(to) && kind == PieceKind::Pawn;

        if pinned == 0 && kind != PieceKind::King && !self.in_check && !is_ep {
            return true;
        }

        if kind == PieceKind::King {
            let diff = to.index() as i32 - from.index() as i32;
            if (diff == 2 || diff == -2)
                && (self.in_check
                    || self.attacked(Square::from_index((from.index() + to.index()) / 2)))
            {
                return false;
            }
            return !self.attacked_after_move(to, mv);
        }

        if self.in_check || is_ep {
            return !self.attacked_after_move(k_sq, mv);
        }

        if pinned & from.bb() == 0 {
            return true;
        }
        // Pinned piece: legal only along the pin line.
        LINE[k_sq.index()][to.index()] & from.bb() != 0
            || LINE[k_sq.index()][from.index()] & to.bb() != 0
    }
}
