//! Lazy-SMP search driver.
//!
//! One OS thread per worker, each running the full iterative-deepening
//! loop over private state; they cooperate only through the shared
//! transposition and pawn tables. The calling (master) thread doubles as
//! the wall-clock supervisor, polling every 2ms, and publishes `bestmove`
//! after the workers join.

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use crate::board::types::moves::{Move, MoveList};

use super::deepening::{best_and_ponder, run_worker};
use super::{SearchData, SharedSearch};

/// Stack headroom for the recursive search.
const WORKER_STACK_SIZE: usize = 16 * 1024 * 1024;

const SUPERVISOR_POLL: Duration = Duration::from_millis(2);
const MIN_DEPTH_TO_REACH: i32 = 4;

/// Run a full search over `workers` (worker 0 is authoritative), blocking
/// until it completes or is stopped, and print the `bestmove` line.
pub fn search(workers: &mut [SearchData], shared: &SharedSearch) {
    // Root tablebase probe: a tablebase move ends the search before it
    // starts.
    if shared.tb.largest() > 0
        && workers[0].board.pos().c_flag == 0
        && workers[0].board.pos().occupied().count_ones() as usize <= shared.tb.largest()
    {
        if let Some((mv, wdl_score)) = shared.tb.probe_root(workers[0].board.pos()) {
            shared.control.tbhits.fetch_add(1, Ordering::Relaxed);
            shared.control.update_status(|status| {
                status.depth = 1;
                status.score = wdl_score;
            });
            println!("bestmove {mv}");
            return;
        }
    }

    shared.tt.new_generation();

    thread::scope(|scope| {
        for sd in workers.iter_mut() {
            let tid = sd.tid;
            thread::Builder::new()
                .name(format!("search-{tid}"))
                .stack_size(WORKER_STACK_SIZE)
                .spawn_scoped(scope, move || run_worker(sd, shared))
                .expect("failed to spawn search worker");
        }

        // Supervisor: the hard time limit, checked against the published
        // depth so a bestmove always rests on a completed iteration.
        while !shared.control.is_done() {
            if !shared.control.infinite.load(Ordering::Relaxed)
                && !shared.control.ponder.load(Ordering::Relaxed)
                && !shared.plan.untimed
                && shared.start.elapsed().as_millis() as u64 >= shared.plan.max_time
                && shared.control.status().depth >= MIN_DEPTH_TO_REACH
            {
                shared.control.set_done();
            }
            thread::sleep(SUPERVISOR_POLL);
        }
    });

    print_best_move(&mut workers[0], shared);
}

fn print_best_move(sd: &mut SearchData, shared: &SharedSearch) {
    let (mut best, ponder) = best_and_ponder(sd, shared);

    // A search stopped before any depth completed still owes a move.
    if !best.is_some() {
        best = any_legal_move(sd);
    }

    if !best.is_some() {
        // Mate or stalemate at the root.
        println!("bestmove 0000");
    } else if ponder.is_some() {
        println!("bestmove {best} ponder {ponder}");
    } else {
        println!("bestmove {best}");
    }
}

fn any_legal_move(sd: &SearchData) -> Move {
    let pos = sd.board.pos();
    let mut moves = MoveList::new();
    if pos.in_check {
        pos.check_evasion_moves(&mut moves);
    } else {
        pos.all_moves(&mut moves);
    }
    moves
        .iter()
        .copied()
        .find(|m| pos.legal_move(*m))
        .unwrap_or(Move::NONE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BoardStack, Position};
    use crate::pawn_hash::PawnHashTable;
    use crate::search::time::TimePlan;
    use crate::search::{SearchControl, MATE_SCORE};
    use crate::tablebases::Tablebases;
    use crate::tt::TranspositionTable;
    use std::sync::Arc;
    use std::time::Instant;

    fn shared(threads: usize, depth: i32) -> SharedSearch {
        let mut plan = TimePlan::unlimited();
        plan.max_depth = depth;
        SharedSearch {
            tt: Arc::new(TranspositionTable::new(8)),
            pawn_hash: Arc::new(PawnHashTable::new(threads)),
            tb: Arc::new(Tablebases::disabled()),
            control: Arc::new(SearchControl::new()),
            plan,
            threads,
            tb_probe_depth: 1,
            start: Instant::now(),
        }
    }

    fn workers(n: usize, fen: &str) -> Vec<SearchData> {
        let game = BoardStack::from_position(Position::from_fen(fen).unwrap());
        (0..n)
            .map(|tid| {
                let mut sd = SearchData::new(tid);
                sd.prepare(&game);
                sd
            })
            .collect()
    }

    #[test]
    fn test_single_thread_search_completes() {
        let shared = shared(1, 4);
        let mut sds = workers(1, "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -");
        search(&mut sds, &shared);
        assert!(shared.control.is_done());
        assert!(shared.control.status().search_finished);
        assert!(sds[0].pv.line().first().is_some());
    }

    #[test]
    fn test_four_threads_agree_on_mate() {
        let shared = shared(4, 4);
        let mut sds = workers(4, "rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq g3");
        search(&mut sds, &shared);
        let (best, _) = best_and_ponder(&mut sds[0], &shared);
        assert!(best.same_move("d8h4".parse().unwrap()));
        assert_eq!(shared.control.status().score, MATE_SCORE - 1);
    }

    #[test]
    fn test_stop_before_start_still_moves() {
        let shared = shared(1, 64);
        shared.control.set_done();
        let mut sds = workers(1, "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -");
        search(&mut sds, &shared);
        // Whatever happened, a legal fallback move exists.
        let fallback = any_legal_move(&sds[0]);
        assert!(fallback.is_some());
    }

    #[test]
    fn test_nodes_accumulate_in_control() {
        let shared = shared(2, 4);
        let mut sds = workers(2, "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -");
        search(&mut sds, &shared);
        assert!(shared.control.nodes.load(Ordering::Relaxed) > 0);
    }
}
