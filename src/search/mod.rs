//! Search: per-thread state, shared control, and the Lazy-SMP glue.
//!
//! Every worker owns its position stack and move-ordering tables outright;
//! the only cross-thread state is the transposition table, the pawn hash,
//! and the small control block guarded here.

pub mod deepening;
pub mod history;
pub mod picker;
pub mod pvs;
pub mod smp;
pub mod time;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::board::position::{MAX_PLY, PLY_LIMIT};
use crate::board::types::moves::Move;
use crate::board::BoardStack;
use crate::pawn_hash::PawnHashTable;
use crate::tablebases::Tablebases;
use crate::tt::TranspositionTable;

use history::HistoryTables;
use time::TimePlan;

pub const MATE_SCORE: i32 = 30_000;
pub const MAX_DEPTH: i32 = 100;
pub const MAX_THREADS: usize = 128;

/// Scores at or beyond this magnitude encode a forced mate.
#[inline]
#[must_use]
pub fn is_mate_score(score: i32) -> bool {
    score <= -MATE_SCORE + MAX_PLY as i32 || score >= MATE_SCORE - MAX_PLY as i32
}

/// Triangular principal-variation table; only the main worker writes it.
pub struct PvTable {
    moves: Box<[Move]>,
}

impl PvTable {
    #[must_use]
    pub fn new() -> Self {
        PvTable {
            moves: vec![Move::NONE; PLY_LIMIT * PLY_LIMIT].into_boxed_slice(),
        }
    }

    pub fn clear(&mut self) {
        self.moves.fill(Move::NONE);
    }

    /// Terminate the child row so a new line at `ply` starts empty.
    #[inline]
    pub fn clear_child(&mut self, ply: usize) {
        self.moves[(ply + 1) * PLY_LIMIT] = Move::NONE;
    }

    /// Prepend `mv` to the line found one ply deeper.
    pub fn update(&mut self, mv: Move, ply: usize) {
        let dest = ply * PLY_LIMIT;
        let src = dest + PLY_LIMIT;
        self.moves[dest] = mv;
        for i in 0..PLY_LIMIT - 1 {
            let m = self.moves[src + i];
            self.moves[dest + 1 + i] = m;
            if !m.is_some() {
                break;
            }
        }
    }

    /// The root line, terminated at the first empty move.
    #[must_use]
    pub fn line(&self) -> &[Move] {
        let end = self.moves[..PLY_LIMIT]
            .iter()
            .position(|m| !m.is_some())
            .unwrap_or(PLY_LIMIT);
        &self.moves[..end]
    }
}

impl Default for PvTable {
    fn default() -> Self {
        PvTable::new()
    }
}

/// Everything one worker thread owns.
pub struct SearchData {
    pub tid: usize,
    pub board: BoardStack,
    pub tables: HistoryTables,
    pub pv: PvTable,
    pub nodes: u64,
    pub tbhits: u64,
    /// Portion of `nodes` already pushed to the shared counter.
    pub flushed_nodes: u64,
}

impl SearchData {
    #[must_use]
    pub fn new(tid: usize) -> Self {
        SearchData {
            tid,
            board: BoardStack::from_position(crate::board::Position::startpos()),
            tables: HistoryTables::new(),
            pv: PvTable::new(),
            nodes: 0,
            tbhits: 0,
            flushed_nodes: 0,
        }
    }

    /// Prepare for a new search from `game`'s current position: adopt the
    /// stack and trail, keep the history tables warm but decayed.
    pub fn prepare(&mut self, game: &BoardStack) {
        self.board = game.clone();
        self.pv.clear();
        self.nodes = 0;
        self.tbhits = 0;
        self.flushed_nodes = 0;
        self.tables.new_search();
    }
}

/// Scalars published by the main worker, read by the UCI side.
#[derive(Clone, Copy, Default)]
pub struct PublishedStatus {
    pub score: i32,
    pub depth: i32,
    /// Index into the time-management target ramp; walks down while the
    /// root move stays stable.
    pub tm_steps: usize,
    pub search_finished: bool,
}

/// The shared control block: the stop flag, the Lazy-SMP per-depth vote
/// counters, and the published status. The mutex protects only these small
/// scalars.
pub struct SearchControl {
    pub done: AtomicBool,
    pub ponder: AtomicBool,
    pub infinite: AtomicBool,
    pub nodes: AtomicU64,
    pub tbhits: AtomicU64,
    depth_counts: Mutex<[u32; MAX_DEPTH as usize + 1]>,
    status: Mutex<PublishedStatus>,
}

impl SearchControl {
    #[must_use]
    pub fn new() -> Self {
        SearchControl {
            done: AtomicBool::new(false),
            ponder: AtomicBool::new(false),
            infinite: AtomicBool::new(false),
            nodes: AtomicU64::new(0),
            tbhits: AtomicU64::new(0),
            depth_counts: Mutex::new([0; MAX_DEPTH as usize + 1]),
            status: Mutex::new(PublishedStatus::default()),
        }
    }

    /// Reset for a new search.
    pub fn reset(&self, ponder: bool, infinite: bool) {
        self.done.store(false, Ordering::Relaxed);
        self.ponder.store(ponder, Ordering::Relaxed);
        self.infinite.store(infinite, Ordering::Relaxed);
        self.nodes.store(0, Ordering::Relaxed);
        self.tbhits.store(0, Ordering::Relaxed);
        *self.depth_counts.lock() = [0; MAX_DEPTH as usize + 1];
        *self.status.lock() = PublishedStatus::default();
    }

    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Relaxed)
    }

    pub fn set_done(&self) {
        self.done.store(true, Ordering::Relaxed);
    }

    /// Claim a depth for the Lazy-SMP vote; returns how many workers have
    /// picked it up including this one.
    pub fn claim_depth(&self, depth: i32) -> u32 {
        let mut counts = self.depth_counts.lock();
        counts[depth as usize] += 1;
        counts[depth as usize]
    }

    #[must_use]
    pub fn status(&self) -> PublishedStatus {
        *self.status.lock()
    }

    pub fn update_status(&self, f: impl FnOnce(&mut PublishedStatus)) {
        f(&mut self.status.lock());
    }
}

impl Default for SearchControl {
    fn default() -> Self {
        SearchControl::new()
    }
}

/// Handles shared by all workers of one search. No ambient globals: the
/// driver owns these and passes the bundle in.
pub struct SharedSearch {
    pub tt: Arc<TranspositionTable>,
    pub pawn_hash: Arc<PawnHashTable>,
    pub tb: Arc<Tablebases>,
    pub control: Arc<SearchControl>,
    pub plan: TimePlan,
    pub threads: usize,
    pub tb_probe_depth: i32,
    pub start: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(s: &str) -> Move {
        s.parse().unwrap()
    }

    #[test]
    fn test_pv_table_update() {
        let mut pv = PvTable::new();
        // Build a line bottom-up the way the search does.
        pv.clear_child(1);
        pv.update(mv("e7e5"), 1);
        pv.update(mv("e2e4"), 0);
        let line: Vec<String> = pv.line().iter().map(ToString::to_string).collect();
        assert_eq!(line, vec!["e2e4", "e7e5"]);
    }

    #[test]
    fn test_pv_clear_child_truncates() {
        let mut pv = PvTable::new();
        pv.clear_child(1);
        pv.update(mv("e7e5"), 1);
        pv.update(mv("e2e4"), 0);
        // A new search at ply 1 that finds nothing leaves the root line
        // one move long after the next root update.
        pv.clear_child(0);
        pv.update(mv("d2d4"), 0);
        let line: Vec<String> = pv.line().iter().map(ToString::to_string).collect();
        assert_eq!(line, vec!["d2d4"]);
    }

    #[test]
    fn test_mate_score_classification() {
        assert!(is_mate_score(MATE_SCORE - 1));
        assert!(is_mate_score(-MATE_SCORE + 5));
        assert!(!is_mate_score(0));
        assert!(!is_mate_score(2000));
    }

    #[test]
    fn test_claim_depth_counts() {
        let control = SearchControl::new();
        assert_eq!(control.claim_depth(5), 1);
        assert_eq!(control.claim_depth(5), 2);
        assert_eq!(control.claim_depth(6), 1);
        control.reset(false, false);
        assert_eq!(control.claim_depth(5), 1);
    }
}
