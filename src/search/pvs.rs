//! Principal-variation search and quiescence.
//!
//! Recursive negamax over the copy-make stack, one `Searcher` per worker
//! thread. Cancellation is a relaxed atomic checked once per node; a
//! cancelled node returns 0 and the strictly paired make/undo calls unwind
//! the stack on the way out.

use once_cell::sync::Lazy;

use crate::board::position::MAX_PLY;
use crate::board::types::moves::{Move, MAX_MOVES};
use crate::tablebases::Wdl;
use crate::tt::{score_from_tt, Bound, TtData, TT_EVAL_DEPTH};

use super::history::{history_bonus, CmhKey, HistoryTables, CMH_PLIES, MAX_HISTORY};
use super::picker::{MovePicker, PickMode};
use super::{is_mate_score, SearchData, SharedSearch, MATE_SCORE, MAX_DEPTH};

const RAZOR_DEPTH: i32 = 3;
const RAZOR_MARGIN: i32 = 200;
const FUTILITY_DEPTH: i32 = 6;
const PROBCUT_DEPTH: i32 = 5;
const PROBCUT_MARGIN: i32 = 80;
const IID_DEPTH: i32 = 5;
const LMP_DEPTH: i32 = 10;
const CMHP_DEPTH: i32 = 3;
const LMR_DEPTH: i32 = 3;
const SE_DEPTH: i32 = 8;

const FUTILITY_MARGIN_PER_DEPTH: i32 = 80;

#[rustfmt::skip]
const LMP: [[i32; LMP_DEPTH as usize + 1]; 2] = [
    [0, 2, 3, 5, 9, 13, 18, 25, 34, 45, 55],
    [0, 5, 6, 9, 14, 21, 30, 41, 55, 69, 84],
];

#[inline]
fn futility_margin(depth: i32) -> i32 {
    FUTILITY_MARGIN_PER_DEPTH * depth
}

#[inline]
fn see_quiets_margin(depth: i32) -> i32 {
    -15 * (depth - 1) * (depth - 1)
}

#[inline]
fn see_captures_margin(depth: i32) -> i32 {
    -100 * depth
}

/// Base late-move reduction by depth and move number.
static LMR: Lazy<Box<[[i8; MAX_MOVES]; MAX_DEPTH as usize]>> = Lazy::new(|| {
    let mut table = vec![[0i8; MAX_MOVES]; MAX_DEPTH as usize];
    for (d, row) in table.iter_mut().enumerate().skip(1) {
        for (m, cell) in row.iter_mut().enumerate().skip(1) {
            *cell = (1.0 + (d as f64).ln() * (m as f64).ln() * 0.5) as i8;
        }
    }
    table.into_boxed_slice().try_into().unwrap_or_else(|_| unreachable!())
});

pub struct Searcher<'a> {
    pub sd: &'a mut SearchData,
    pub shared: &'a SharedSearch,
}

impl Searcher<'_> {
    #[inline]
    fn pos(&self) -> &crate::board::Position {
        self.sd.board.pos()
    }

    #[inline]
    fn evaluate(&self) -> i32 {
        crate::eval::eval(self.pos(), &self.shared.pawn_hash)
    }

    #[inline]
    fn make(&mut self, mv: Move) {
        self.sd.board.make_move(mv);
        self.sd.nodes += 1;
        if self.sd.nodes & 0xfff == 0 {
            self.flush_counters();
        }
    }

    pub fn flush_counters(&mut self) {
        let delta = self.sd.nodes - self.sd.flushed_nodes;
        if delta > 0 {
            self.shared
                .control
                .nodes
                .fetch_add(delta, std::sync::atomic::Ordering::Relaxed);
            self.sd.flushed_nodes = self.sd.nodes;
        }
    }

    #[inline]
    fn done(&self) -> bool {
        self.shared.control.is_done()
    }

    /// TT probe with the stored move vetted for pseudo-legality; a corrupt
    /// move poisons the whole entry.
    fn probe_tt(&self) -> Option<TtData> {
        let data = self.shared.tt.probe(self.pos().key)?;
        if data.mv.is_some() && !self.pos().is_pseudo_legal(data.mv) {
            return None;
        }
        Some(data)
    }

    fn store_tt(&self, mv: Move, score: i32, static_score: i32, depth: i32, ply: usize, bound: Bound) {
        self.shared.tt.store(
            self.pos().key,
            mv,
            score,
            static_score,
            depth,
            ply,
            bound,
        );
    }

    /// Quiescence: captures everywhere, checking quiets at depth 0,
    /// evasions while in check.
    pub fn qsearch(
        &mut self,
        pv_node: bool,
        mut alpha: i32,
        beta: i32,
        depth: i32,
        ply: usize,
    ) -> i32 {
        alpha = alpha.max(-MATE_SCORE + ply as i32);
        let beta = beta.min(MATE_SCORE - ply as i32 + 1);
        if alpha >= beta {
            return alpha;
        }

        if ply >= MAX_PLY {
            return self.evaluate();
        }
        if self.sd.board.is_draw() {
            return 0;
        }

        let in_check = self.pos().in_check;
        let hash_depth = if in_check || depth == 0 { 0 } else { -1 };

        let mut hash_move = Move::NONE;
        let mut hash_score = -MATE_SCORE;
        let mut hash_bound = Bound::None;
        let mut hash_static = None;

        if let Some(data) = self.probe_tt() {
            hash_move = data.mv;
            hash_bound = data.bound;
            hash_score = score_from_tt(data.score, ply);
            hash_static = Some(data.static_score);

            if !pv_node && data.depth >= hash_depth {
                match hash_bound {
                    Bound::Lower if hash_score >= beta => return hash_score,
                    Bound::Upper if hash_score <= alpha => return hash_score,
                    Bound::Exact => return hash_score,
                    _ => {}
                }
            }
        }

        let static_score;
        let mut best_score;
        if in_check {
            static_score = -MATE_SCORE + ply as i32;
            best_score = static_score;
        } else {
            static_score = hash_static.unwrap_or_else(|| self.evaluate());
            best_score = static_score;
            match hash_bound {
                Bound::Lower if hash_score > static_score => best_score = hash_score,
                Bound::Upper if hash_score < static_score => best_score = hash_score,
                Bound::Exact => best_score = hash_score,
                _ => {}
            }

            if best_score >= beta {
                return best_score;
            }
            if alpha < best_score {
                alpha = best_score;
            }
        }

        let mut best_move = hash_move;
        let mut bound = Bound::Upper;
        let mut picker = MovePicker::new(PickMode::QSearch, in_check);

        loop {
            let mv = picker.next(self.sd, hash_move, depth, ply);
            if !mv.is_some() {
                break;
            }

            if !in_check && self.pos().see(mv, true) < 0 {
                continue;
            }
            if !self.pos().legal_move(mv) {
                continue;
            }

            self.make(mv);
            let score = -self.qsearch(false, -beta, -alpha, depth - 1, ply + 1);
            self.sd.board.undo_move();

            if score > best_score {
                best_score = score;
                if score > alpha {
                    best_move = mv;
                    alpha = score;
                    bound = Bound::Exact;
                    if alpha >= beta {
                        bound = Bound::Lower;
                        break;
                    }
                }
            }
        }

        self.store_tt(best_move, best_score, static_score, hash_depth, ply, bound);
        best_score
    }

    /// Razoring, reverse futility, null move and ProbCut; `Some(score)`
    /// short-circuits the node.
    #[allow(clippy::too_many_arguments)]
    fn prune_before_moves(
        &mut self,
        alpha: i32,
        beta: i32,
        depth: i32,
        ply: usize,
        best_score: i32,
        static_score: i32,
        hash_move: Move,
    ) -> Option<i32> {
        // Razoring: hopeless nodes drop straight into quiescence.
        if depth <= RAZOR_DEPTH && best_score + RAZOR_MARGIN < beta {
            let score = self.qsearch(false, alpha, beta, 0, ply);
            if score < beta {
                return Some(score);
            }
        }

        if self.pos().non_pawn_material() > 0 {
            // Futility: far enough above beta that the node will not come
            // back down.
            if depth <= FUTILITY_DEPTH && best_score >= beta + futility_margin(depth) {
                return Some(best_score);
            }

            // Null move.
            if depth >= 2 && best_score >= beta {
                let reduction = depth / 4 + 3 + ((best_score - beta) / 80).min(3);

                self.sd.board.make_null_move();
                let score = -self.pvs(
                    false,
                    false,
                    -beta,
                    -beta + 1,
                    depth - reduction,
                    ply + 1,
                    false,
                    Move::NONE,
                );
                self.sd.board.undo_move();

                if self.done() {
                    return Some(0);
                }
                if score >= beta {
                    return Some(if is_mate_score(score) { beta } else { score });
                }
            }
        }

        // ProbCut: a tactically winning capture searched shallow that
        // clears beta by a margin is trusted to clear it at full depth.
        if depth >= PROBCUT_DEPTH {
            let beta_cut = beta + PROBCUT_MARGIN;
            let mut picker = MovePicker::new(PickMode::QSearch, false);

            loop {
                let mv = picker.next(self.sd, hash_move, depth, ply);
                if !mv.is_some() {
                    break;
                }
                if mv.is_quiet() || self.pos().see(mv, false) < beta_cut - static_score {
                    continue;
                }
                if !self.pos().legal_move(mv) {
                    continue;
                }

                self.make(mv);
                let mut score = -self.qsearch(false, -beta_cut, -beta_cut + 1, 0, ply + 1);
                if score >= beta_cut {
                    score = -self.pvs(
                        false,
                        false,
                        -beta_cut,
                        -beta_cut + 1,
                        depth - PROBCUT_DEPTH + 1,
                        ply + 1,
                        true,
                        Move::NONE,
                    );
                }
                self.sd.board.undo_move();

                if score >= beta_cut {
                    return Some(score);
                }
            }
        }

        None
    }

    /// The move that refuted this node was quiet: reward it, punish the
    /// quiets tried before it.
    #[allow(clippy::too_many_arguments)]
    fn reward_quiet_cutoff(
        &mut self,
        best_move: Move,
        quiets_tried: &[Move],
        keys: &[Option<CmhKey>; CMH_PLIES],
        depth: i32,
        ply: usize,
        score: i32,
        beta: i32,
    ) {
        let bonus = history_bonus(depth + i32::from(score > beta + 80));
        let pos = *self.pos();
        self.sd.tables.set_killer(best_move, ply);
        self.sd.tables.set_counter_move(&pos, best_move);
        self.sd
            .tables
            .update(pos.side, &pos, keys, best_move, bonus);
        for &quiet in quiets_tried {
            self.sd.tables.update(pos.side, &pos, keys, quiet, -bonus);
        }
    }

    /// Principal-variation search. At the root (`ply` 0) with a full
    /// window this returns the minimax value of the position to `depth`
    /// and, on the main worker, publishes the PV and score as it improves.
    #[allow(clippy::too_many_arguments, clippy::too_many_lines)]
    pub fn pvs(
        &mut self,
        root: bool,
        pv_node: bool,
        mut alpha: i32,
        mut beta: i32,
        depth: i32,
        ply: usize,
        use_pruning: bool,
        skip_move: Move,
    ) -> i32 {
        if depth <= 0 {
            return self.qsearch(pv_node, alpha, beta, 0, ply);
        }

        alpha = alpha.max(-MATE_SCORE + ply as i32);
        beta = beta.min(MATE_SCORE - ply as i32 + 1);
        if alpha >= beta {
            return alpha;
        }

        if ply >= MAX_PLY {
            return self.evaluate();
        }
        if self.done() {
            return 0;
        }
        if !root && self.sd.board.is_draw() {
            return 0;
        }

        let cmh_keys = HistoryTables::cmh_keys(&self.sd.board, ply);
        let use_hash = !skip_move.is_some();

        // Hash load.
        let mut hash_move = Move::NONE;
        let mut hash_score = -MATE_SCORE;
        let mut hash_bound = Bound::None;
        let mut hash_depth = 0;
        let mut hash_static = None;

        if use_hash {
            if let Some(data) = self.probe_tt() {
                hash_move = data.mv;
                hash_bound = data.bound;
                hash_depth = data.depth;
                hash_score = score_from_tt(data.score, ply);
                hash_static = Some(data.static_score);

                if !pv_node && data.depth >= depth {
                    let cutoff = match hash_bound {
                        Bound::Lower => hash_score >= beta,
                        Bound::Upper => hash_score <= alpha,
                        Bound::Exact => true,
                        Bound::None => false,
                    };
                    if cutoff {
                        if hash_move.is_quiet() {
                            let pos = *self.pos();
                            match hash_bound {
                                Bound::Lower => {
                                    self.sd.tables.set_killer(hash_move, ply);
                                    self.sd.tables.set_counter_move(&pos, hash_move);
                                    self.sd.tables.update(
                                        pos.side,
                                        &pos,
                                        &cmh_keys,
                                        hash_move,
                                        history_bonus(depth),
                                    );
                                }
                                Bound::Upper => {
                                    self.sd.tables.update(
                                        pos.side,
                                        &pos,
                                        &cmh_keys,
                                        hash_move,
                                        -history_bonus(depth),
                                    );
                                }
                                _ => {}
                            }
                        }
                        return hash_score;
                    }
                }
            }
        }

        // Syzygy WDL probe.
        if self.shared.tb.largest() > 0
            && !root
            && self.pos().fifty_cnt == 0
            && self.pos().c_flag == 0
        {
            let piece_cnt = self.pos().occupied().count_ones() as usize;
            if piece_cnt < self.shared.tb.largest()
                || (piece_cnt == self.shared.tb.largest() && depth >= self.shared.tb_probe_depth)
            {
                if let Some(wdl) = self.shared.tb.probe_wdl(self.pos()) {
                    self.sd.tbhits += 1;
                    self.shared
                        .control
                        .tbhits
                        .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

                    let (score, bound) = match wdl {
                        Wdl::Win => (MATE_SCORE - MAX_PLY as i32 - ply as i32 - 1, Bound::Lower),
                        Wdl::Loss => (-MATE_SCORE + MAX_PLY as i32 + ply as i32 + 1, Bound::Upper),
                        Wdl::Draw => (0, Bound::Exact),
                    };
                    let cutoff = match bound {
                        Bound::Lower => score >= beta,
                        Bound::Upper => score <= alpha,
                        _ => true,
                    };
                    if cutoff {
                        self.store_tt(Move::NONE, score, score, MAX_PLY as i32 - 1, 0, bound);
                        return score;
                    }
                }
            }
        }

        // Static evaluation.
        let in_check = self.pos().in_check;
        let static_score = if in_check {
            -MATE_SCORE + ply as i32
        } else if let Some(s) = hash_static {
            s
        } else {
            let s = self.evaluate();
            if use_hash {
                self.store_tt(Move::NONE, 0, s, TT_EVAL_DEPTH, ply, Bound::None);
            }
            s
        };
        self.sd.board.pos_mut().static_score = static_score;

        let improving =
            !in_check && ply >= 2 && static_score >= self.sd.board.pos_at(2).static_score;

        let mut best_score = static_score;
        if !in_check {
            match hash_bound {
                Bound::Lower if hash_score > static_score => best_score = hash_score,
                Bound::Upper if hash_score < static_score => best_score = hash_score,
                Bound::Exact => best_score = hash_score,
                _ => {}
            }
        }

        if use_pruning && !in_check && !is_mate_score(beta) {
            if !pv_node {
                if let Some(score) = self.prune_before_moves(
                    alpha,
                    beta,
                    depth,
                    ply,
                    best_score,
                    static_score,
                    hash_move,
                ) {
                    return score;
                }
            }

            // Internal iterative deepening: a PV node without a hash move
            // runs a reduced search just to get one.
            if depth >= IID_DEPTH && pv_node && !hash_move.is_some() {
                self.pvs(false, true, alpha, beta, depth - 2, ply, false, Move::NONE);
                if let Some(data) = self.probe_tt() {
                    hash_move = data.mv;
                }
            }
        }

        // Move loop.
        let mut picker = MovePicker::new(PickMode::Search, in_check);
        let mut bound = Bound::Upper;
        best_score = -MATE_SCORE + ply as i32;
        let mut best_move = hash_move;
        let mut searched_cnt = 0u32;
        let mut lmp_cnt = 0i32;
        let mut quiets_tried = [Move::NONE; MAX_MOVES];
        let mut quiets_cnt = 0usize;

        self.sd.tables.clear_child_killers(ply);

        loop {
            let mv = picker.next(self.sd, hash_move, depth, ply);
            if !mv.is_some() {
                break;
            }
            if mv.same_move(skip_move) {
                continue;
            }

            lmp_cnt += 1;
            if !root && searched_cnt >= 1 {
                if mv.is_quiet() {
                    // Late move pruning.
                    if depth <= LMP_DEPTH && lmp_cnt > LMP[usize::from(improving)][depth as usize]
                    {
                        picker.skip_quiets();
                        continue;
                    }

                    // Counter-move-history pruning: both followup slots
                    // cold means the move goes nowhere.
                    if depth <= CMHP_DEPTH {
                        let index = HistoryTables::cmh_index(self.pos(), mv);
                        let cold = |key: &Option<CmhKey>| match key {
                            Some(k) => self.sd.tables.cmh_value(*k, index) < 0,
                            None => true,
                        };
                        if cold(&cmh_keys[0]) && cold(&cmh_keys[1]) {
                            continue;
                        }
                    }

                    // Quiet SEE pruning.
                    if self.pos().see(mv, true) < see_quiets_margin(depth) {
                        continue;
                    }
                }

                // Bad captures carry their SEE value as score.
                if picker.in_bad_captures() && i32::from(mv.score()) < see_captures_margin(depth)
                {
                    continue;
                }
            }

            if !self.pos().legal_move(mv) {
                lmp_cnt -= 1;
                continue;
            }

            let mut new_depth = depth - 1;

            // Singular extension: if every alternative falls well short of
            // the hash score, the hash move is forced enough to deserve
            // one more ply.
            if depth >= SE_DEPTH
                && !skip_move.is_some()
                && mv.same_move(hash_move)
                && !root
                && !is_mate_score(hash_score)
                && hash_bound == Bound::Lower
                && hash_depth >= depth - 3
            {
                let beta_cut = hash_score - depth;
                let score = self.pvs(
                    false,
                    false,
                    beta_cut - 1,
                    beta_cut,
                    depth >> 1,
                    ply,
                    false,
                    mv,
                );
                if score < beta_cut {
                    new_depth += 1;
                }
            } else if mv.is_quiet() {
                // Counter-move-history extension: both followups glowing.
                let index = HistoryTables::cmh_index(self.pos(), mv);
                if let (Some(k0), Some(k1)) = (cmh_keys[0], cmh_keys[1]) {
                    if i32::from(self.sd.tables.cmh_value(k0, index)) >= MAX_HISTORY / 2
                        && i32::from(self.sd.tables.cmh_value(k1, index)) >= MAX_HISTORY / 2
                    {
                        new_depth += 1;
                    }
                }
            }

            // History feeds the reduction; read it before the move is on
            // the board.
            let move_history = if mv.is_quiet() && depth >= LMR_DEPTH {
                let pos = self.pos();
                self.sd.tables.score(pos.side, pos, &cmh_keys, mv)
            } else {
                0
            };

            self.make(mv);
            searched_cnt += 1;

            if self.sd.tid == 0 && pv_node {
                self.sd.pv.clear_child(ply);
            }

            let mut score;
            if searched_cnt == 1 {
                score = -self.pvs(
                    false,
                    pv_node,
                    -beta,
                    -alpha,
                    new_depth,
                    ply + 1,
                    true,
                    Move::NONE,
                );
            } else {
                // Late move reduction.
                let mut reduction = 0;
                if depth >= LMR_DEPTH && mv.is_quiet() {
                    reduction = i32::from(
                        LMR[depth as usize][(searched_cnt as usize).min(MAX_MOVES - 1)],
                    );
                    if !improving {
                        reduction += 1;
                    }
                    if reduction > 0 && pv_node {
                        reduction -= 1;
                    }
                    reduction -= 2 * move_history / MAX_HISTORY;
                    reduction = reduction.clamp(0, (new_depth - 1).max(0));
                }

                score = -self.pvs(
                    false,
                    false,
                    -alpha - 1,
                    -alpha,
                    new_depth - reduction,
                    ply + 1,
                    true,
                    Move::NONE,
                );
                if reduction > 0 && score > alpha {
                    score = -self.pvs(
                        false,
                        false,
                        -alpha - 1,
                        -alpha,
                        new_depth,
                        ply + 1,
                        true,
                        Move::NONE,
                    );
                }
                if score > alpha && score < beta {
                    score = -self.pvs(
                        false,
                        true,
                        -beta,
                        -alpha,
                        new_depth,
                        ply + 1,
                        true,
                        Move::NONE,
                    );
                }
            }

            self.sd.board.undo_move();

            if self.done() {
                return 0;
            }

            if score > best_score {
                best_score = score;
                if score > alpha {
                    best_move = mv;

                    if self.sd.tid == 0 && pv_node {
                        if root {
                            self.publish_root(mv, score, depth);
                        }
                        self.sd.pv.update(mv, ply);
                    }

                    alpha = score;
                    bound = Bound::Exact;

                    if alpha >= beta {
                        bound = Bound::Lower;
                        if best_move.is_quiet() {
                            self.reward_quiet_cutoff(
                                best_move,
                                &quiets_tried[..quiets_cnt],
                                &cmh_keys,
                                depth,
                                ply,
                                score,
                                beta,
                            );
                        }
                        break;
                    }
                }
            }

            if mv.is_quiet() && quiets_cnt < MAX_MOVES {
                quiets_tried[quiets_cnt] = mv;
                quiets_cnt += 1;
            }
        }

        // Mate or stalemate; with a skipped move the node is a fabricated
        // position, score it as lost rather than stalemate.
        if searched_cnt == 0 {
            return if in_check || skip_move.is_some() {
                -MATE_SCORE + ply as i32
            } else {
                0
            };
        }

        if use_hash {
            self.store_tt(best_move, best_score, static_score, depth, ply, bound);
        }
        best_score
    }

    /// Root bookkeeping on the main worker: time-management step walking
    /// with root-move stability, and the published score/depth.
    fn publish_root(&mut self, mv: Move, score: i32, depth: i32) {
        let previous_best = self.sd.pv.line().first().copied().unwrap_or(Move::NONE);
        self.shared.control.update_status(|status| {
            if mv.same_move(previous_best) {
                status.tm_steps = status.tm_steps.saturating_sub(1);
            } else {
                status.tm_steps = super::time::TM_STEPS - 1;
            }
            status.score = score;
            status.depth = depth;
        });
    }
}
