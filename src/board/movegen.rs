//! Staged pseudo-legal move generation.
//!
//! Each generator fills a `MoveList`; legality is the consumer's problem.
//! Capture generation keeps a least-valuable-attacker emission order (king,
//! pawns, knights, bishops, rooks, queens) so ties under selection sort
//! resolve toward cheap attackers.

use super::attacks::{attacks_for, bishop_attacks, knight_attacks, rook_attacks};
use super::masks::{LINE, PIECE_AREA};
use super::position::{castle, Position};
use super::types::bitboard::{
    pawn_attacks, pop_lsb, Bitboard, B_RANK_1, B_RANK_2, B_RANK_4, B_RANK_5, B_RANK_7, B_RANK_8,
};
use super::types::moves::{Move, MoveList};
use super::types::piece::{PieceKind, Side};
use super::types::square::{named, Square};

/// Ordering score preset on generated promotions: queens first among them,
/// all after the positively scored captures.
const PROMO_SCORE_BASE: i16 = -16;

const SLIDER_AND_KNIGHT: [PieceKind; 4] = [
    PieceKind::Knight,
    PieceKind::Bishop,
    PieceKind::Rook,
    PieceKind::Queen,
];

fn push_promotions(out: &mut MoveList, from: Square, to: Square, minor_promotions: bool) {
    let queen = Move::new(from, to)
        .with_promo(PieceKind::Queen)
        .with_score(PROMO_SCORE_BASE + PieceKind::Queen as i16);
    out.push(queen);
    if minor_promotions {
        for kind in [PieceKind::Rook, PieceKind::Bishop, PieceKind::Knight] {
            out.push(
                Move::new(from, to)
                    .with_promo(kind)
                    .with_score(PROMO_SCORE_BASE + kind as i16),
            );
        }
    }
}

impl Position {
    fn push_piece_moves(&self, out: &mut MoveList, kind: PieceKind, targets: Bitboard) {
        let occ = self.occupied();
        let mut b0 = self.kind_occ(kind) & self.occ[self.side.index()];
        while b0 != 0 {
            let from = Square::from_index(pop_lsb(&mut b0));
            let mut b1 = attacks_for(kind, occ, from) & targets;
            while b1 != 0 {
                out.push(Move::new(from, Square::from_index(pop_lsb(&mut b1))));
            }
        }
    }

    fn push_king_moves(&self, out: &mut MoveList, targets: Bitboard) {
        let from = self.king_sq(self.side);
        let mut b = PIECE_AREA[self.own(PieceKind::King).index()][from.index()] & targets;
        while b != 0 {
            out.push(Move::new(from, Square::from_index(pop_lsb(&mut b))));
        }
    }

    /// Quiet pawn pushes from the pawns in `pawns`, restricted to
    /// destinations in `allowed`.
    fn push_quiet_pawn_moves(&self, out: &mut MoveList, pawns: Bitboard, allowed: Bitboard) {
        let n_occ = !self.occupied();
        if self.side == Side::White {
            let single = ((pawns & !B_RANK_7) >> 8) & n_occ;
            let mut b = single & allowed;
            while b != 0 {
                let to = pop_lsb(&mut b);
                out.push(Move::new(Square::from_index(to + 8), Square::from_index(to)));
            }
            let mut b = (single >> 8) & n_occ & B_RANK_4 & allowed;
            while b != 0 {
                let to = pop_lsb(&mut b);
                out.push(Move::new(Square::from_index(to + 16), Square::from_index(to)));
            }
        } else {
            let single = ((pawns & !B_RANK_2) << 8) & n_occ;
            let mut b = single & allowed;
            while b != 0 {
                let to = pop_lsb(&mut b);
                out.push(Move::new(Square::from_index(to - 8), Square::from_index(to)));
            }
            let mut b = (single << 8) & n_occ & B_RANK_5 & allowed;
            while b != 0 {
                let to = pop_lsb(&mut b);
                out.push(Move::new(Square::from_index(to - 16), Square::from_index(to)));
            }
        }
    }

    /// Pawn captures (including en passant and capture-promotions) by the
    /// pawns in `pawns` onto `targets`.
    fn push_pawn_captures(
        &self,
        out: &mut MoveList,
        pawns: Bitboard,
        targets: Bitboard,
        minor_promotions: bool,
    ) {
        let mut capturable = targets;
        if let Some(ep) = self.ep_sq {
            capturable |= ep.bb();
        }
        let mut b0 = pawn_attacks(pawns, self.side) & capturable;

        let promo_rank = if self.side == Side::White {
            B_RANK_8
        } else {
            B_RANK_1
        };
        let mut promos = b0 & promo_rank;
        b0 ^= promos;

        // Reverse lookup: attackers of the target square are the enemy
        // pawn's attack set from there.
        let opp_pawn = self.opp(PieceKind::Pawn).index();
        while b0 != 0 {
            let to = pop_lsb(&mut b0);
            let mut b1 = PIECE_AREA[opp_pawn][to] & pawns;
            while b1 != 0 {
                out.push(Move::new(
                    Square::from_index(pop_lsb(&mut b1)),
                    Square::from_index(to),
                ));
            }
        }
        while promos != 0 {
            let to = pop_lsb(&mut promos);
            let mut b1 = PIECE_AREA[opp_pawn][to] & pawns;
            while b1 != 0 {
                push_promotions(
                    out,
                    Square::from_index(pop_lsb(&mut b1)),
                    Square::from_index(to),
                    minor_promotions,
                );
            }
        }
    }

    fn push_non_capture_promotions(
        &self,
        out: &mut MoveList,
        pawns: Bitboard,
        allowed: Bitboard,
        minor_promotions: bool,
    ) {
        let n_occ = !self.occupied();
        let b = if self.side == Side::White {
            ((pawns & B_RANK_7) >> 8) & n_occ & allowed
        } else {
            ((pawns & B_RANK_2) << 8) & n_occ & allowed
        };
        let mut b = b;
        while b != 0 {
            let to = Square::from_index(pop_lsb(&mut b));
            push_promotions(out, to.ep_pair(), to, minor_promotions);
        }
    }

    fn push_castling_moves(&self, out: &mut MoveList) {
        let empty = |sq: Square| self.piece_at(sq).is_empty();
        match self.side {
            Side::White => {
                if self.c_flag & castle::WHITE_KING_SIDE != 0
                    && empty(named::F1)
                    && empty(named::G1)
                {
                    out.push(Move::new(named::E1, named::G1));
                }
                if self.c_flag & castle::WHITE_QUEEN_SIDE != 0
                    && empty(named::B1)
                    && empty(named::C1)
                    && empty(named::D1)
                {
                    out.push(Move::new(named::E1, named::C1));
                }
            }
            Side::Black => {
                if self.c_flag & castle::BLACK_KING_SIDE != 0
                    && empty(named::F8)
                    && empty(named::G8)
                {
                    out.push(Move::new(named::E8, named::G8));
                }
                if self.c_flag & castle::BLACK_QUEEN_SIDE != 0
                    && empty(named::B8)
                    && empty(named::C8)
                    && empty(named::D8)
                {
                    out.push(Move::new(named::E8, named::C8));
                }
            }
        }
    }

    /// All captures (including en passant) and promotions.
    pub fn material_moves(&self, out: &mut MoveList, minor_promotions: bool) {
        let occ_f = self.occ[self.side.index()];
        let occ_o = self.occ[self.side.flip().index()];
        let n_occ = !(occ_f | occ_o);
        let pawns = self.kind_occ(PieceKind::Pawn) & occ_f;

        self.push_king_moves(out, occ_o);
        self.push_pawn_captures(out, pawns, occ_o, minor_promotions);
        for kind in SLIDER_AND_KNIGHT {
            self.push_piece_moves(out, kind, occ_o);
        }
        self.push_non_capture_promotions(out, pawns, n_occ, minor_promotions);
    }

    /// Non-captures: castling, pawn pushes, piece moves to empty squares.
    pub fn quiet_moves(&self, out: &mut MoveList) {
        let occ_f = self.occ[self.side.index()];
        let n_occ = !self.occupied();
        let pawns = self.kind_occ(PieceKind::Pawn) & occ_f;

        if self.c_flag != 0 {
            self.push_castling_moves(out);
        }
        self.push_king_moves(out, n_occ);
        self.push_quiet_pawn_moves(out, pawns, n_occ);
        for kind in SLIDER_AND_KNIGHT {
            self.push_piece_moves(out, kind, n_occ);
        }
    }

    /// All pseudo-legal moves (material then quiets, minor promotions
    /// included).
    pub fn all_moves(&self, out: &mut MoveList) {
        self.material_moves(out, true);
        self.quiet_moves(out);
    }

    /// When in check: king moves, plus (against a single checker) captures
    /// of the checker and interpositions.
    pub fn check_evasion_moves(&self, out: &mut MoveList) {
        let occ_f = self.occ[self.side.index()];
        let occ_o = self.occ[self.side.flip().index()];
        let occ = occ_f | occ_o;
        let n_occ = !occ;
        let pawns = self.kind_occ(PieceKind::Pawn) & occ_f;
        let k_sq = self.king_sq(self.side);

        self.push_king_moves(out, !occ_f);

        let mut att = PIECE_AREA[self.own(PieceKind::Pawn).index()][k_sq.index()]
            & self.kind_occ(PieceKind::Pawn);
        att |= knight_attacks(k_sq) & self.kind_occ(PieceKind::Knight);
        att |= bishop_attacks(occ, k_sq)
            & (self.kind_occ(PieceKind::Bishop) | self.kind_occ(PieceKind::Queen));
        att |= rook_attacks(occ, k_sq)
            & (self.kind_occ(PieceKind::Rook) | self.kind_occ(PieceKind::Queen));
        att &= occ_o;

        if att.count_ones() == 1 {
            let att_sq = att.trailing_zeros() as usize;
            let att_line = LINE[att_sq][k_sq.index()];
            let block_or_capture = att_line | att;

            self.push_pawn_captures(out, pawns, att, true);
            self.push_non_capture_promotions(out, pawns, att_line, true);
            self.push_quiet_pawn_moves(out, pawns, block_or_capture);
            for kind in SLIDER_AND_KNIGHT {
                self.push_piece_moves(out, kind, block_or_capture);
            }
        }
    }

    /// King moves and castling only; the perft fast path pairs this with
    /// `count_non_king_moves`.
    pub fn king_only_moves(&self, out: &mut MoveList) {
        if self.c_flag != 0 {
            self.push_castling_moves(out);
        }
        self.push_king_moves(out, !self.occ[self.side.index()]);
    }

    /// Captures plus quiet moves that give check, including discovered
    /// checks from pieces pinned against the *enemy* king. Quiescence uses
    /// this at depth 0. Meaningless while in check.
    pub fn checks_and_material_moves(&self, out: &mut MoveList) {
        if self.in_check {
            return;
        }

        let occ_f_all = self.occ[self.side.index()];
        let occ_o = self.occ[self.side.flip().index()];
        let occ = occ_f_all | occ_o;
        let n_occ_f = !occ_f_all;
        let n_occ = !occ;

        let k_sq = self.king_sq(self.side.flip());
        let n_att = knight_attacks(k_sq);
        let (pinned, _pinners, b_att, r_att) =
            self.pins_and_attacks_to(k_sq, self.side, self.side);

        // Queens cannot give discovered check; their checking squares are
        // the slider rays from the enemy king.
        self.push_piece_moves_from(
            PieceKind::Queen,
            occ_f_all,
            out,
            occ_o | (n_occ & (r_att | b_att)),
        );

        // Discovered checks: anything of ours on a pin line to the enemy
        // king may move off the line.
        let occ_f = occ_f_all & pinned;
        if occ_f != 0 {
            self.push_piece_moves_from(PieceKind::Knight, occ_f, out, n_occ_f);

            let mut p_occ = self.kind_occ(PieceKind::Pawn) & occ_f;
            while p_occ != 0 {
                let from = Square::from_index(pop_lsb(&mut p_occ));
                let off_line = n_occ & !LINE[k_sq.index()][from.index()];
                if off_line != 0 {
                    self.push_pawn_captures(out, from.bb(), occ_o, true);
                    self.push_quiet_pawn_moves(out, from.bb(), off_line);
                    self.push_non_capture_promotions(out, from.bb(), off_line, true);
                }
            }

            for kind in [PieceKind::King, PieceKind::Bishop, PieceKind::Rook, PieceKind::Queen] {
                let b0 = if kind == PieceKind::King {
                    self.king_sq(self.side).bb() & occ_f
                } else {
                    self.kind_occ(kind) & occ_f
                };
                let mut b0 = b0;
                while b0 != 0 {
                    let from = Square::from_index(pop_lsb(&mut b0));
                    let mut b1 = attacks_for(kind, occ, from)
                        & n_occ_f
                        & !LINE[k_sq.index()][from.index()];
                    while b1 != 0 {
                        out.push(Move::new(from, Square::from_index(pop_lsb(&mut b1))));
                    }
                }
            }
        }

        // Ordinary captures, plus direct checks by unpinned pieces.
        let occ_f = occ_f_all & !pinned;
        let pawns = self.kind_occ(PieceKind::Pawn) & occ_f;

        self.push_king_moves(out, occ_o);
        self.push_pawn_captures(out, pawns, occ_o, true);
        self.push_quiet_pawn_moves(
            out,
            pawns,
            PIECE_AREA[self.opp(PieceKind::Pawn).index()][k_sq.index()],
        );
        self.push_non_capture_promotions(out, pawns, n_occ, true);

        self.push_piece_moves_from(PieceKind::Knight, occ_f, out, occ_o | (n_occ & n_att));
        self.push_piece_moves_from(PieceKind::Bishop, occ_f, out, occ_o | (n_occ & b_att));
        self.push_piece_moves_from(PieceKind::Rook, occ_f, out, occ_o | (n_occ & r_att));
    }

    fn push_piece_moves_from(
        &self,
        kind: PieceKind,
        from_set: Bitboard,
        out: &mut MoveList,
        targets: Bitboard,
    ) {
        let occ = self.occupied();
        let mut b0 = self.kind_occ(kind) & from_set;
        while b0 != 0 {
            let from = Square::from_index(pop_lsb(&mut b0));
            let mut b1 = attacks_for(kind, occ, from) & targets;
            while b1 != 0 {
                out.push(Move::new(from, Square::from_index(pop_lsb(&mut b1))));
            }
        }
    }

    /// Arithmetic count of non-king pseudo-legal moves, promotions
    /// counting 4 each. Used by the perft leaf fast path.
    #[must_use]
    pub fn count_non_king_moves(&self) -> u64 {
        let occ_f = self.occ[self.side.index()];
        let occ_o = self.occ[self.side.flip().index()];
        let occ = occ_f | occ_o;
        let n_occ_f = !occ_f;
        let n_occ = !occ;

        let mut count = 0u64;
        for kind in SLIDER_AND_KNIGHT {
            let mut b0 = self.kind_occ(kind) & occ_f;
            while b0 != 0 {
                let from = Square::from_index(pop_lsb(&mut b0));
                count += u64::from((attacks_for(kind, occ, from) & n_occ_f).count_ones());
            }
        }

        let pawns = self.kind_occ(PieceKind::Pawn) & occ_f;

        // Captures, with promotion captures counting 4.
        let mut capturable = occ_o;
        if let Some(ep) = self.ep_sq {
            capturable |= ep.bb();
        }
        let mut b0 = pawn_attacks(pawns, self.side) & capturable;
        let promo_rank = if self.side == Side::White {
            B_RANK_8
        } else {
            B_RANK_1
        };
        let b1 = b0 & promo_rank;
        b0 ^= b1;
        let opp_pawn = self.opp(PieceKind::Pawn).index();
        let mut b = b0;
        while b != 0 {
            let to = pop_lsb(&mut b);
            count += u64::from((PIECE_AREA[opp_pawn][to] & pawns).count_ones());
        }
        let mut b = b1;
        while b != 0 {
            let to = pop_lsb(&mut b);
            count += u64::from((PIECE_AREA[opp_pawn][to] & pawns).count_ones()) << 2;
        }

        // Quiet pushes, promotions counting 4.
        if self.side == Side::White {
            let single = (pawns >> 8) & n_occ;
            count += u64::from((single & !B_RANK_8).count_ones());
            count += u64::from((single & B_RANK_8).count_ones()) << 2;
            count += u64::from(((single >> 8) & n_occ & B_RANK_4).count_ones());
        } else {
            let single = (pawns << 8) & n_occ;
            count += u64::from((single & !B_RANK_1).count_ones());
            count += u64::from((single & B_RANK_1).count_ones()) << 2;
            count += u64::from(((single << 8) & n_occ & B_RANK_5).count_ones());
        }

        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(fen: &str) -> Position {
        Position::from_fen(fen).unwrap()
    }

    fn legal_count(p: &Position) -> usize {
        let mut list = MoveList::new();
        if p.in_check {
            p.check_evasion_moves(&mut list);
        } else {
            p.all_moves(&mut list);
        }
        list.iter().filter(|m| p.legal_move(**m)).count()
    }

    #[test]
    fn test_startpos_move_counts() {
        let p = Position::startpos();
        let mut material = MoveList::new();
        p.material_moves(&mut material, true);
        assert_eq!(material.len(), 0);

        let mut quiets = MoveList::new();
        p.quiet_moves(&mut quiets);
        assert_eq!(quiets.len(), 20);
        assert_eq!(legal_count(&p), 20);
    }

    #[test]
    fn test_kiwipete_move_count() {
        let p = pos("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -");
        assert_eq!(legal_count(&p), 48);
    }

    #[test]
    fn test_evasions_single_check() {
        let p = pos("4k3/8/8/8/4r3/8/8/4KB2 w - -");
        assert!(p.in_check);
        let mut list = MoveList::new();
        p.check_evasion_moves(&mut list);
        // Interposition squares e2/e3 are reachable by the bishop? No;
        // the king must move or nothing blocks. Verify only legality.
        for m in &list {
            if p.legal_move(*m) {
                assert!(p.is_pseudo_legal(*m), "evasion {m} not pseudo-legal");
            }
        }
        assert!(legal_count(&p) > 0);
    }

    #[test]
    fn test_evasions_double_check_king_only() {
        // Knight f3 and rook e8 both give check.
        let p = pos("4r3/8/8/8/8/5n2/8/4K3 w - -");
        assert!(p.in_check);
        let mut list = MoveList::new();
        p.check_evasion_moves(&mut list);
        for m in &list {
            assert_eq!(m.from(), p.king_sq(Side::White));
        }
    }

    #[test]
    fn test_count_non_king_moves_matches_generation() {
        for fen in [
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -",
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -",
            "n1n5/PPPk4/8/8/8/8/4Kppp/5N1N b - -",
            "rnbqkbnr/ppp1p1pp/8/3pPp2/8/8/PPPP1PPP/RNBQKBNR w KQkq f6",
        ] {
            let p = pos(fen);
            let mut list = MoveList::new();
            p.all_moves(&mut list);
            let mut expected = 0u64;
            for m in &list {
                if m.from() == p.king_sq(p.side) && m.promotion().is_none() {
                    continue;
                }
                expected += 1;
            }
            assert_eq!(p.count_non_king_moves(), expected, "fen: {fen}");
        }
    }

    #[test]
    fn test_checks_and_material_contains_checks() {
        use crate::board::make::BoardStack;

        let p = pos("4k3/8/8/8/8/8/8/R3K3 w - -");
        let mut list = MoveList::new();
        p.checks_and_material_moves(&mut list);

        // Every quiet move in the list must give check when played.
        let mut bs = BoardStack::from_position(p);
        let mut saw_check = false;
        for m in &list {
            if !p.legal_move(*m) || !p.piece_at(m.to()).is_empty() {
                continue;
            }
            bs.make_move(*m);
            assert!(bs.pos().in_check, "{m} does not give check");
            saw_check = true;
            bs.undo_move();
        }
        assert!(saw_check);
    }

    #[test]
    fn test_checks_and_material_finds_discovered_check() {
        // The d4 knight shields the d1 rook from the d8 king; any knight
        // move discovers check.
        let p = pos("3k4/8/8/8/3N4/8/8/3RK3 w - -");
        let mut list = MoveList::new();
        p.checks_and_material_moves(&mut list);
        assert!(list.iter().any(|m| m.to_string() == "d4b5"));
        assert!(list.iter().any(|m| m.to_string() == "d4f5"));
    }
}
