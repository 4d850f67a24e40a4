//! Move-ordering history: butterfly history, killers, counter moves and
//! the two-ply counter-move-history.
//!
//! All tables are thread-private. Between searches they decay but stay
//! warm; `ucinewgame` zeroes them.

use crate::board::position::PLY_LIMIT;
use crate::board::types::moves::Move;
use crate::board::types::piece::{Side, PIECE_LIMIT};
use crate::board::{BoardStack, Position};

/// Saturation bound for all history values.
pub const MAX_HISTORY: i32 = 1 << 13;

/// How many prior plies feed counter-move history.
pub const CMH_PLIES: usize = 2;

/// A counter-move-history key: the piece standing on the to-square of an
/// earlier move, and that square.
pub type CmhKey = (usize, usize);

type CmhTable = [[[i16; PIECE_LIMIT * 64]; 64]; PIECE_LIMIT];

pub struct HistoryTables {
    pub killers: [[Move; 2]; PLY_LIMIT],
    counters: [[Move; 64]; PIECE_LIMIT],
    history: [[[i16; 64]; 64]; 2],
    cmh: Box<CmhTable>,
}

impl HistoryTables {
    #[must_use]
    pub fn new() -> Self {
        let mut tables = HistoryTables {
            killers: [[Move::NONE; 2]; PLY_LIMIT],
            counters: [[Move::NONE; 64]; PIECE_LIMIT],
            history: [[[0; 64]; 64]; 2],
            cmh: vec![[[0i16; PIECE_LIMIT * 64]; 64]; PIECE_LIMIT]
                .into_boxed_slice()
                .try_into()
                .unwrap_or_else(|_| unreachable!()),
        };
        tables.reset();
        tables
    }

    /// Full reset: history zeroed, counter-move history mildly
    /// pessimistic so untried followups sort below proven ones.
    pub fn reset(&mut self) {
        self.killers = [[Move::NONE; 2]; PLY_LIMIT];
        self.counters = [[Move::NONE; 64]; PIECE_LIMIT];
        self.history = [[[0; 64]; 64]; 2];
        for plane in self.cmh.iter_mut() {
            for row in plane.iter_mut() {
                row.fill(-1);
            }
        }
    }

    /// Between searches: killers go, quiet history decays but stays warm.
    pub fn new_search(&mut self) {
        self.killers = [[Move::NONE; 2]; PLY_LIMIT];
        for side in &mut self.history {
            for from in side.iter_mut() {
                for h in from.iter_mut() {
                    *h >>= 2;
                }
            }
        }
    }

    #[inline]
    #[must_use]
    pub fn killer(&self, ply: usize, slot: usize) -> Move {
        self.killers[ply][slot]
    }

    pub fn clear_child_killers(&mut self, ply: usize) {
        if ply + 1 < PLY_LIMIT {
            self.killers[ply + 1] = [Move::NONE; 2];
        }
    }

    pub fn set_killer(&mut self, mv: Move, ply: usize) {
        if !self.killers[ply][0].same_move(mv) {
            self.killers[ply][1] = self.killers[ply][0];
            self.killers[ply][0] = mv;
        }
    }

    /// Counter slot for the move that produced `pos`, if any.
    #[inline]
    #[must_use]
    fn counter_slot(pos: &Position) -> Option<CmhKey> {
        let last = pos.last_move;
        if !last.is_some() {
            return None;
        }
        let to = last.to().index();
        Some((pos.board[to].index(), to))
    }

    #[must_use]
    pub fn counter_move(&self, pos: &Position) -> Move {
        match Self::counter_slot(pos) {
            Some((piece, to)) => self.counters[piece][to],
            None => Move::NONE,
        }
    }

    pub fn set_counter_move(&mut self, pos: &Position, mv: Move) {
        if let Some((piece, to)) = Self::counter_slot(pos) {
            self.counters[piece][to] = mv;
        }
    }

    /// Resolve the counter-move-history keys for the current node: one per
    /// prior ply, present when that ply exists and carries a real move.
    #[must_use]
    pub fn cmh_keys(board: &BoardStack, ply: usize) -> [Option<CmhKey>; CMH_PLIES] {
        let mut keys = [None; CMH_PLIES];
        for (i, key) in keys.iter_mut().enumerate() {
            if ply > i {
                let pos = board.pos_at(i);
                if pos.last_move.is_some() {
                    let to = pos.last_move.to().index();
                    *key = Some((pos.board[to].index(), to));
                }
            }
        }
        keys
    }

    /// Index of a move in a counter-move-history row: moving piece times
    /// board size plus destination.
    #[inline]
    #[must_use]
    pub fn cmh_index(pos: &Position, mv: Move) -> usize {
        pos.board[mv.from().index()].index() * 64 + mv.to().index()
    }

    #[inline]
    #[must_use]
    pub fn cmh_value(&self, key: CmhKey, index: usize) -> i16 {
        self.cmh[key.0][key.1][index]
    }

    /// Combined ordering score: butterfly history plus both prior plies'
    /// counter-move history.
    #[must_use]
    pub fn score(
        &self,
        side: Side,
        pos: &Position,
        keys: &[Option<CmhKey>; CMH_PLIES],
        mv: Move,
    ) -> i32 {
        let from = mv.from().index();
        let to = mv.to().index();
        let mut score = i32::from(self.history[side.index()][from][to]);
        let index = Self::cmh_index(pos, mv);
        for key in keys.iter().flatten() {
            score += i32::from(self.cmh[key.0][key.1][index]);
        }
        score
    }

    /// Saturating history update: fail-highs push toward `+MAX_HISTORY`,
    /// refuted siblings toward the negative bound, with the step shrinking
    /// as the value approaches saturation.
    pub fn update(
        &mut self,
        side: Side,
        pos: &Position,
        keys: &[Option<CmhKey>; CMH_PLIES],
        mv: Move,
        bonus: i32,
    ) {
        let from = mv.from().index();
        let to = mv.to().index();
        let index = Self::cmh_index(pos, mv);

        let slot = &mut self.history[side.index()][from][to];
        *slot = saturate(*slot, bonus);
        for key in keys.iter().flatten() {
            let slot = &mut self.cmh[key.0][key.1][index];
            *slot = saturate(*slot, bonus);
        }
    }
}

#[inline]
fn saturate(value: i16, bonus: i32) -> i16 {
    let v = i32::from(value);
    (v + bonus - v * bonus.abs() / MAX_HISTORY) as i16
}

impl Default for HistoryTables {
    fn default() -> Self {
        HistoryTables::new()
    }
}

/// History bonus by depth, quadratic and capped.
#[inline]
#[must_use]
pub fn history_bonus(depth: i32) -> i32 {
    let d = depth.min(16);
    d * d * 32
}
