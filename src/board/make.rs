//! Move making on the copy-make ply stack.
//!
//! `BoardStack` owns the fixed-capacity stack of positions plus the Zobrist
//! trail used for repetition detection. Making a move copies the top slot
//! down and mutates the copy; undo just steps back. The trail outlives the
//! stack collapse done for game moves, so repetitions across the whole game
//! are visible to the search.

use super::position::{castle, Position, PLY_LIMIT};
use super::types::moves::Move;
use super::types::piece::{Piece, PieceKind, Side};
use super::types::square::{named, Square};
use crate::eval::tables::{PIECE_PHASE, PST_END, PST_MID};
use crate::zobrist::{EP_SLOT, ZOBRIST};

#[derive(Clone)]
pub struct BoardStack {
    stack: Box<[Position; PLY_LIMIT]>,
    idx: usize,
    keys: Vec<u64>,
}

impl BoardStack {
    #[must_use]
    pub fn from_position(pos: Position) -> Self {
        let mut stack = Box::new([Position::empty(); PLY_LIMIT]);
        stack[0] = pos;
        BoardStack {
            stack,
            idx: 0,
            keys: vec![pos.key],
        }
    }

    #[inline]
    #[must_use]
    pub fn pos(&self) -> &Position {
        &self.stack[self.idx]
    }

    #[inline]
    pub fn pos_mut(&mut self) -> &mut Position {
        &mut self.stack[self.idx]
    }

    /// Position `plies_back` plies up the stack (0 = current).
    #[inline]
    #[must_use]
    pub fn pos_at(&self, plies_back: usize) -> &Position {
        &self.stack[self.idx - plies_back]
    }

    #[inline]
    #[must_use]
    pub fn ply(&self) -> usize {
        self.idx
    }

    /// Fifty-move rule, insufficient material, or a twofold repetition
    /// inside the reversible-move window (stride 2 over the trail).
    #[must_use]
    pub fn is_draw(&self) -> bool {
        let pos = self.pos();
        if pos.fifty_cnt >= 100 || pos.insufficient_material() {
            return true;
        }
        if pos.fifty_cnt < 4 {
            return false;
        }
        let cur = self.keys.len() as i64 - 1;
        let floor = cur - i64::from(pos.fifty_cnt);
        let mut i = cur - 2;
        while i >= floor && i >= 0 {
            if self.keys[i as usize] == pos.key {
                return true;
            }
            i -= 2;
        }
        false
    }

    /// Make a pseudo-legal move that has passed `legal_move`.
    pub fn make_move(&mut self, mv: Move) {
        debug_assert!(self.idx + 1 < PLY_LIMIT);
        self.stack[self.idx + 1] = self.stack[self.idx];
        self.idx += 1;
        let z = &*ZOBRIST;
        let pos = &mut self.stack[self.idx];

        let from = mv.from();
        let to = mv.to();
        let piece = pos.board[from.index()];
        let target = pos.board[to.index()];
        let side = pos.side;
        let opp = side.flip();

        pos.last_move = mv;
        pos.fifty_cnt = pos.fifty_cnt.saturating_add(1);

        // Delta scores from the mover's perspective; applied with the
        // side's sign at the end.
        let mut mid = PST_MID[piece.index()][to.index()] - PST_MID[piece.index()][from.index()];
        let mut end = PST_END[piece.index()][to.index()] - PST_END[piece.index()][from.index()];

        pos.key ^= z.side;
        pos.key ^= z.castling[pos.c_flag as usize];
        let pawn_or_king =
            piece.is_kind(PieceKind::Pawn) || piece.is_kind(PieceKind::King);
        pos.key ^= z.positions[from.index()][piece.index()];
        pos.key ^= z.positions[to.index()][piece.index()];
        if pawn_or_king {
            pos.pawn_key ^= z.positions[from.index()][piece.index()];
            pos.pawn_key ^= z.positions[to.index()][piece.index()];
        }
        if let Some(ep) = pos.ep_sq.take() {
            pos.key ^= z.positions[ep.index()][EP_SLOT];
        }

        pos.board[from.index()] = Piece::EMPTY;
        pos.board[to.index()] = piece;
        pos.c_flag &= castle::ROOK_MASK[from.index()];
        pos.occ[side.index()] ^= from.bb() | to.bb();

        if !target.is_empty() {
            pos.fifty_cnt = 0;
            pos.occ[opp.index()] ^= to.bb();
            if target.is_kind(PieceKind::King) {
                // Only reachable through pseudo-legal exploration of an
                // already-illegal line; the node above will refute it.
                pos.k_sq[opp.index()] = Square::NONE;
            } else {
                pos.piece_occ[target.kind().index()] ^= to.bb();
            }
            mid += PST_MID[target.index()][to.index()];
            end += PST_END[target.index()][to.index()];
            pos.phase += PIECE_PHASE[target.kind().index()];
            pos.key ^= z.positions[to.index()][target.index()];
            if target.is_kind(PieceKind::Pawn) {
                pos.pawn_key ^= z.positions[to.index()][target.index()];
            }
            pos.c_flag &= castle::ROOK_MASK[to.index()];
        }

        if piece.is_kind(PieceKind::King) {
            pos.k_sq[side.index()] = to;
            pos.c_flag &= castle::KING_MASK[side.index()];

            let diff = to.index() as i32 - from.index() as i32;
            if diff == 2 || diff == -2 {
                let rook_sq = Square::from_index((from.index() + to.index()) / 2);
                let corner = match (side, diff < 0) {
                    (Side::White, true) => named::A1,
                    (Side::White, false) => named::H1,
                    (Side::Black, true) => named::A8,
                    (Side::Black, false) => named::H8,
                };
                let rook = Piece::new(PieceKind::Rook, side);
                pos.board[corner.index()] = Piece::EMPTY;
                pos.board[rook_sq.index()] = rook;
                pos.occ[side.index()] ^= corner.bb() | rook_sq.bb();
                pos.piece_occ[PieceKind::Rook.index()] ^= corner.bb() | rook_sq.bb();
                pos.key ^= z.positions[corner.index()][rook.index()];
                pos.key ^= z.positions[rook_sq.index()][rook.index()];
                mid += PST_MID[rook.index()][rook_sq.index()]
                    - PST_MID[rook.index()][corner.index()];
                end += PST_END[rook.index()][rook_sq.index()]
                    - PST_END[rook.index()][corner.index()];
            }
        } else {
            pos.piece_occ[piece.kind().index()] ^= from.bb() | to.bb();
        }

        if piece.is_kind(PieceKind::Pawn) {
            pos.fifty_cnt = 0;
            let diff = to.index() as i32 - from.index() as i32;

            if let Some(promo) = mv.promotion() {
                let promoted = Piece::new(promo, side);
                pos.board[to.index()] = promoted;
                pos.piece_occ[PieceKind::Pawn.index()] ^= to.bb();
                pos.piece_occ[promo.index()] ^= to.bb();
                pos.key ^= z.positions[to.index()][piece.index()];
                pos.key ^= z.positions[to.index()][promoted.index()];
                pos.pawn_key ^= z.positions[to.index()][piece.index()];
                mid += PST_MID[promoted.index()][to.index()] - PST_MID[piece.index()][to.index()];
                end += PST_END[promoted.index()][to.index()] - PST_END[piece.index()][to.index()];
            } else {
                let pair = to.ep_pair();
                if diff == 16 || diff == -16 {
                    pos.ep_sq = Some(pair);
                    pos.key ^= z.positions[pair.index()][EP_SLOT];
                } else if target.is_empty() && diff != 8 && diff != -8 {
                    // En passant: the captured pawn sits behind the target.
                    let captured = Piece::new(PieceKind::Pawn, opp);
                    pos.board[pair.index()] = Piece::EMPTY;
                    pos.occ[opp.index()] ^= pair.bb();
                    pos.piece_occ[PieceKind::Pawn.index()] ^= pair.bb();
                    pos.key ^= z.positions[pair.index()][captured.index()];
                    pos.pawn_key ^= z.positions[pair.index()][captured.index()];
                    pos.phase += PIECE_PHASE[PieceKind::Pawn.index()];
                    mid += PST_MID[captured.index()][pair.index()];
                    end += PST_END[captured.index()][pair.index()];
                }
            }
        }

        if side == Side::White {
            pos.score_mid += mid;
            pos.score_end += end;
        } else {
            pos.score_mid -= mid;
            pos.score_end -= end;
        }

        pos.key ^= z.castling[pos.c_flag as usize];
        pos.side = opp;
        let key = pos.key;
        pos.set_pins_and_checks();
        self.keys.push(key);
    }

    pub fn undo_move(&mut self) {
        debug_assert!(self.idx > 0);
        self.idx -= 1;
        self.keys.pop();
    }

    /// Pass the move: flip the side, clear en passant.
    pub fn make_null_move(&mut self) {
        debug_assert!(self.idx + 1 < PLY_LIMIT);
        self.stack[self.idx + 1] = self.stack[self.idx];
        self.idx += 1;
        let z = &*ZOBRIST;
        let pos = &mut self.stack[self.idx];

        if let Some(ep) = pos.ep_sq.take() {
            pos.key ^= z.positions[ep.index()][EP_SLOT];
        }
        pos.last_move = Move::NONE;
        pos.side = pos.side.flip();
        pos.key ^= z.side;
        let key = pos.key;
        pos.set_pins_and_checks();
        self.keys.push(key);
    }

    /// Make a game move (from the UCI `position` command): the stack
    /// collapses back to a single slot but the trail keeps growing.
    pub fn make_move_root(&mut self, mv: Move) {
        self.make_move(mv);
        self.stack[0] = self.stack[self.idx];
        self.idx = 0;
    }
}
