//! Staged move list.
//!
//! A small state machine that hands the search one move at a time in the
//! order hash move, winning captures, killers, counter move, history-sorted
//! quiets, losing captures. Each phase generates lazily; within a phase an
//! incremental selection sort pulls the best-scored remaining move, so
//! moves past an early beta cutoff are never sorted at all. Captures that
//! lose material by SEE are parked in a side buffer and only replayed in
//! the final phase.

use crate::board::types::moves::{Move, MoveList, MAX_CAPTURES};
use crate::board::types::piece::PieceKind;
use crate::board::Position;

use super::history::HistoryTables;
use super::SearchData;

/// Quiet-move boost that keeps material moves ahead of history scores in
/// the mixed (evasion / depth-0) orderings.
const MATERIAL_BOOST: i32 = 3 * super::history::MAX_HISTORY;

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum PickMode {
    /// Full staged ordering.
    Search,
    /// Material (or evasions) only; ends after the first phase.
    QSearch,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Stage {
    Evasions,
    Material,
    Killer0,
    Killer1,
    Counter,
    Quiets,
    BadCaptures,
    End,
}

impl Stage {
    fn next(self) -> Stage {
        match self {
            Stage::Evasions | Stage::BadCaptures => Stage::End,
            Stage::Material => Stage::Killer0,
            Stage::Killer0 => Stage::Killer1,
            Stage::Killer1 => Stage::Counter,
            Stage::Counter => Stage::Quiets,
            Stage::Quiets => Stage::BadCaptures,
            Stage::End => Stage::End,
        }
    }
}

pub struct MovePicker {
    mode: PickMode,
    stage: Stage,
    moves: MoveList,
    cnt: usize,
    bad_captures: [Move; MAX_CAPTURES],
    bad_cnt: usize,
    generated: bool,
    tried_hash: bool,
}

impl MovePicker {
    #[must_use]
    pub fn new(mode: PickMode, in_check: bool) -> Self {
        MovePicker {
            mode,
            stage: if in_check {
                Stage::Evasions
            } else {
                Stage::Material
            },
            moves: MoveList::new(),
            cnt: 0,
            bad_captures: [Move::NONE; MAX_CAPTURES],
            bad_cnt: 0,
            generated: false,
            tried_hash: false,
        }
    }

    /// Late-move pruning hook: drop the rest of the current quiet phase.
    pub fn skip_quiets(&mut self) {
        self.cnt = self.moves.len();
    }

    /// True while the picker replays the SEE-losing capture buffer; those
    /// moves carry their SEE value as score.
    #[must_use]
    pub fn in_bad_captures(&self) -> bool {
        self.stage == Stage::BadCaptures
    }

    fn generate(&mut self, sd: &SearchData, depth: i32, ply: usize) {
        let pos = sd.board.pos();
        self.moves.clear();
        match self.stage {
            Stage::Evasions => {
                pos.check_evasion_moves(&mut self.moves);
                score_mixed_moves(&mut self.moves, sd, ply);
            }
            Stage::Material => {
                if depth == 0 {
                    pos.checks_and_material_moves(&mut self.moves);
                    score_mixed_moves(&mut self.moves, sd, ply);
                } else {
                    pos.material_moves(&mut self.moves, depth > 0);
                    score_material_moves(&mut self.moves, pos);
                }
            }
            Stage::Killer0 => self.set_single(pos, sd.tables.killer(ply, 0)),
            Stage::Killer1 => self.set_single(pos, sd.tables.killer(ply, 1)),
            Stage::Counter => self.set_single(pos, sd.tables.counter_move(pos)),
            Stage::Quiets => {
                pos.quiet_moves(&mut self.moves);
                score_quiet_moves(&mut self.moves, sd, ply);
            }
            Stage::BadCaptures => {
                for i in 0..self.bad_cnt {
                    self.moves.push(self.bad_captures[i]);
                }
            }
            Stage::End => {}
        }
    }

    fn set_single(&mut self, pos: &Position, mv: Move) {
        if mv.is_some() && move_is_quiet(pos, mv) && pos.is_pseudo_legal(mv) {
            self.moves.push(mv.set_quiet());
        }
    }

    /// Pull the next move to try, or `Move::NONE` when exhausted. The hash
    /// move goes out first and is skipped if regenerated later.
    pub fn next(&mut self, sd: &SearchData, hash_move: Move, depth: i32, ply: usize) -> Move {
        if hash_move.is_some() && !self.tried_hash {
            self.tried_hash = true;
            return hash_move;
        }

        while self.stage != Stage::End {
            if !self.generated {
                self.generate(sd, depth, ply);
                self.generated = true;
            }

            if self.cnt >= self.moves.len() {
                self.cnt = 0;
                self.generated = false;
                self.stage = if self.mode == PickMode::QSearch {
                    Stage::End
                } else {
                    self.stage.next()
                };
                continue;
            }

            if self.moves.len() > 1 && self.stage != Stage::BadCaptures {
                self.pick_best();
            }
            let mv = self.moves.get(self.cnt);
            self.cnt += 1;

            if mv.same_move(hash_move) {
                continue;
            }

            // Losing captures wait for the final phase, remembering their
            // SEE score for the bad-capture pruning margin.
            if self.mode == PickMode::Search && self.stage == Stage::Material {
                let see = sd.board.pos().see(mv, true);
                if see < 0 {
                    if self.bad_cnt < MAX_CAPTURES {
                        self.bad_captures[self.bad_cnt] = mv.with_score(see as i16);
                        self.bad_cnt += 1;
                    }
                    continue;
                }
            }

            return mv;
        }
        Move::NONE
    }

    /// Selection-sort step: swap the best remaining move into position
    /// `cnt`.
    fn pick_best(&mut self) {
        let mut best = self.cnt;
        for i in (self.cnt + 1)..self.moves.len() {
            if self.moves.get(i).ordering_key() > self.moves.get(best).ordering_key() {
                best = i;
            }
        }
        if best != self.cnt {
            self.moves.swap(self.cnt, best);
        }
    }
}

fn move_is_quiet(pos: &Position, mv: Move) -> bool {
    if !pos.piece_at(mv.to()).is_empty() {
        return false;
    }
    let piece = pos.piece_at(mv.from());
    !(piece.is_kind(PieceKind::Pawn)
        && (mv.promotion().is_some() || pos.ep_sq == Some(mv.to())))
}

/// MVV-LVA for plain captures; generated promotions keep their preset
/// (negative) score so they sort behind even captures.
fn score_material_moves(moves: &mut MoveList, pos: &Position) {
    for i in 0..moves.len() {
        let mv = moves.get(i);
        if mv.promotion().is_some() {
            continue;
        }
        moves.set(i, mv.with_score(mvv_lva(pos, mv)));
    }
}

fn mvv_lva(pos: &Position, mv: Move) -> i16 {
    let victim = pos.piece_at(mv.to());
    let victim_kind = if victim.is_empty() {
        // Only en passant captures land on an empty square here.
        PieceKind::Pawn
    } else {
        victim.kind()
    };
    let attacker = pos.piece_at(mv.from());
    ((victim_kind.index() as i16 + 1) << 5) - attacker.kind().index() as i16
}

/// Quiet phase: drop killer/counter duplicates (they had their own
/// phases), score by combined history, tag quiet.
fn score_quiet_moves(moves: &mut MoveList, sd: &SearchData, ply: usize) {
    let pos = sd.board.pos();
    let killer_0 = sd.tables.killer(ply, 0);
    let killer_1 = sd.tables.killer(ply, 1);
    let counter = sd.tables.counter_move(pos);
    let keys = HistoryTables::cmh_keys(&sd.board, ply);

    let mut kept = 0;
    for i in 0..moves.len() {
        let mv = moves.get(i);
        if mv.same_move(killer_0) || mv.same_move(killer_1) || mv.same_move(counter) {
            continue;
        }
        let score = sd.tables.score(pos.side, pos, &keys, mv);
        moves.set(kept, mv.with_score(score as i16).set_quiet());
        kept += 1;
    }
    moves.truncate(kept);
}

/// Mixed ordering for evasions and the depth-0 checks+material list:
/// material moves jump above every history score, quiets sort by history.
fn score_mixed_moves(moves: &mut MoveList, sd: &SearchData, ply: usize) {
    let pos = sd.board.pos();
    let keys = HistoryTables::cmh_keys(&sd.board, ply);

    for i in 0..moves.len() {
        let mv = moves.get(i);
        if move_is_quiet(pos, mv) {
            let score = sd.tables.score(pos.side, pos, &keys, mv);
            moves.set(i, mv.with_score(score as i16).set_quiet());
        } else {
            let score = if mv.promotion().is_some() {
                1
            } else {
                i32::from(mvv_lva(pos, mv))
            };
            moves.set(i, mv.with_score((score + MATERIAL_BOOST) as i16));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BoardStack, Position};

    fn data(fen: &str) -> SearchData {
        let mut sd = SearchData::new(0);
        sd.board = BoardStack::from_position(Position::from_fen(fen).unwrap());
        sd
    }

    fn mv(s: &str) -> Move {
        s.parse().unwrap()
    }

    fn drain(picker: &mut MovePicker, sd: &SearchData, hash: Move, depth: i32) -> Vec<Move> {
        let mut out = Vec::new();
        loop {
            let m = picker.next(sd, hash, depth, 0);
            if !m.is_some() {
                break;
            }
            out.push(m);
        }
        out
    }

    #[test]
    fn test_hash_move_first_and_not_repeated() {
        let sd = data("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -");
        let hash = mv("g1f3");
        let mut picker = MovePicker::new(PickMode::Search, false);
        let moves = drain(&mut picker, &sd, hash, 3);
        assert!(moves[0].same_move(hash));
        assert_eq!(
            moves.iter().filter(|m| m.same_move(hash)).count(),
            1,
            "hash move must not be yielded twice"
        );
        assert_eq!(moves.len(), 20);
    }

    #[test]
    fn test_losing_captures_come_last() {
        // Qxd5 wins a pawn (good), Rxd5 loses the exchange to c6xd5...
        // set up one winning and one losing capture.
        let sd = data("4k3/8/2p5/3p4/4P3/8/3R4/4K3 w - -");
        let mut picker = MovePicker::new(PickMode::Search, false);
        let moves = drain(&mut picker, &sd, Move::NONE, 3);

        let winning = moves.iter().position(|m| m.same_move(mv("e4d5"))).unwrap();
        let losing = moves.iter().position(|m| m.same_move(mv("d2d5"))).unwrap();
        assert!(winning < losing);
        // The losing capture is dead last, behind the quiets.
        assert_eq!(losing, moves.len() - 1);
    }

    #[test]
    fn test_killers_precede_other_quiets() {
        let mut sd = data("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -");
        sd.tables.set_killer(mv("b1c3"), 0);
        let mut picker = MovePicker::new(PickMode::Search, false);
        let moves = drain(&mut picker, &sd, Move::NONE, 3);
        assert!(moves[0].same_move(mv("b1c3")));
    }

    #[test]
    fn test_counter_move_phase() {
        let mut sd = data("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -");
        sd.board.make_move(mv("e2e4"));
        sd.board.make_move(mv("e7e5"));
        sd.tables.set_counter_move(sd.board.pos(), mv("g1f3"));

        let mut picker = MovePicker::new(PickMode::Search, false);
        let moves = drain(&mut picker, &sd, Move::NONE, 3);
        assert!(moves[0].same_move(mv("g1f3")));
    }

    #[test]
    fn test_qsearch_mode_stops_after_material() {
        let sd = data("4k3/8/2p5/3p4/4P3/8/3R4/4K3 w - -");
        let mut picker = MovePicker::new(PickMode::QSearch, false);
        let moves = drain(&mut picker, &sd, Move::NONE, 1);
        // Only the two captures; no quiet moves, and in qsearch mode the
        // losing rook capture is not diverted.
        assert_eq!(moves.len(), 2);
        assert!(moves.iter().all(|m| !m.is_quiet()));
    }

    #[test]
    fn test_evasions_when_in_check() {
        let sd = data("4k3/8/8/8/8/8/4r3/4K3 w - -");
        assert!(sd.board.pos().in_check);
        let mut picker = MovePicker::new(PickMode::Search, true);
        let moves = drain(&mut picker, &sd, Move::NONE, 3);
        assert!(!moves.is_empty());
        // Only the king can act against an adjacent rook check; evasions
        // end the staged walk, so no other quiets appear.
        let k_sq = sd.board.pos().king_sq(crate::board::Side::White);
        assert!(moves.iter().all(|m| m.from() == k_sq));
    }

    #[test]
    fn test_skip_quiets_jumps_to_bad_captures() {
        let sd = data("4k3/8/2p5/3p4/4P3/8/3R4/4K3 w - -");
        let mut picker = MovePicker::new(PickMode::Search, false);
        // Pull the winning capture first.
        let first = picker.next(&sd, Move::NONE, 3, 0);
        assert!(first.same_move(mv("e4d5")));
        // Enter the quiet phase, then abandon it.
        let second = picker.next(&sd, Move::NONE, 3, 0);
        assert!(second.is_quiet());
        picker.skip_quiets();
        let mut rest = Vec::new();
        loop {
            let m = picker.next(&sd, Move::NONE, 3, 0);
            if !m.is_some() {
                break;
            }
            rest.push(m);
        }
        assert_eq!(rest.len(), 1);
        assert!(rest[0].same_move(mv("d2d5")));
    }
}
