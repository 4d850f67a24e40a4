//! Per-worker iterative deepening with aspiration windows and the
//! Lazy-SMP depth vote.

use std::sync::atomic::Ordering;

use crate::board::types::moves::Move;

use super::pvs::Searcher;
use super::time::TM_STEPS;
use super::{is_mate_score, SearchData, SharedSearch, MATE_SCORE};

const START_ASPIRATION_DEPTH: i32 = 4;
const INIT_ASPIRATION_WINDOW: i32 = 10;
const MIN_DEPTH_TO_REACH: i32 = 4;

/// Iterative-deepening loop for one worker. Helpers skip depths that
/// enough of the pool has already claimed, which staggers them across
/// depths; only the main worker reports and watches the clock.
pub fn run_worker(sd: &mut SearchData, shared: &SharedSearch) {
    let mut searcher = Searcher { sd, shared };
    let mut score = 0i32;
    let mut prev_score = 0i32;
    let max_depth = shared.plan.max_depth;

    for depth in 1..=max_depth {
        let claimed = shared.control.claim_depth(depth);
        let vote_limit = ((shared.threads as u32 + 1) / 2).max(2);
        if searcher.sd.tid != 0 && depth > 1 && depth < max_depth && claimed > vote_limit {
            continue;
        }

        let mut delta = if depth >= START_ASPIRATION_DEPTH {
            INIT_ASPIRATION_WINDOW
        } else {
            MATE_SCORE
        };
        let mut alpha = (score - delta).max(-MATE_SCORE);
        let mut beta = (score + delta).min(MATE_SCORE);

        while delta <= MATE_SCORE {
            score = searcher.pvs(true, true, alpha, beta, depth, 0, false, Move::NONE);
            if shared.control.is_done() {
                break;
            }

            delta += 2 + delta / 2;
            if score <= alpha {
                beta = (alpha + beta) / 2;
                alpha = (score - delta).max(-MATE_SCORE);
            } else if score >= beta {
                beta = (score + delta).min(MATE_SCORE);
            } else {
                break;
            }
        }
        searcher.flush_counters();
        if shared.control.is_done() {
            break;
        }

        if searcher.sd.tid == 0 {
            print_info(&searcher);

            // Soft stop: consult the stability ramp, stretched when the
            // score just dropped.
            let status = shared.control.status();
            let mut target = shared.plan.target_time[status.tm_steps.min(TM_STEPS - 1)];
            if prev_score > score {
                let stretch = (1.0 + f64::from(prev_score - score) / 80.0).min(2.0);
                target = (target as f64 * stretch) as u64;
            }
            prev_score = score;

            if !shared.plan.untimed
                && !shared.control.ponder.load(Ordering::Relaxed)
                && target > 0
                && depth >= MIN_DEPTH_TO_REACH
                && shared.start.elapsed().as_millis() as u64 >= target
            {
                break;
            }
        }
    }

    searcher.flush_counters();
    if searcher.sd.tid == 0 {
        print_info(&searcher);
        shared.control.update_status(|status| {
            status.search_finished = true;
        });
        if !shared.control.ponder.load(Ordering::Relaxed) {
            shared.control.set_done();
        }
    }
}

/// `info depth .. score .. nodes .. tbhits .. time .. nps .. pv ..`
pub fn print_info(searcher: &Searcher<'_>) {
    let shared = searcher.shared;
    let status = shared.control.status();
    let nodes = shared.control.nodes.load(Ordering::Relaxed);
    let tbhits = shared.control.tbhits.load(Ordering::Relaxed);
    let elapsed = shared.start.elapsed().as_millis() as u64;

    let score = status.score;
    let score_str = if is_mate_score(score) {
        let mate_in = if score > 0 {
            (MATE_SCORE - score + 1) / 2
        } else {
            (-MATE_SCORE - score) / 2
        };
        format!("mate {mate_in}")
    } else {
        format!("cp {score}")
    };

    let pv: Vec<String> = searcher
        .sd
        .pv
        .line()
        .iter()
        .map(ToString::to_string)
        .collect();

    println!(
        "info depth {} score {} nodes {} tbhits {} time {} nps {} pv {}",
        status.depth,
        score_str,
        nodes,
        tbhits,
        elapsed,
        nodes * 1000 / (elapsed + 1),
        pv.join(" ")
    );
}

/// Best and ponder move after the workers have stopped: the PV when it is
/// long enough, with the transposition table filling in a missing ponder
/// move.
pub fn best_and_ponder(sd: &mut SearchData, shared: &SharedSearch) -> (Move, Move) {
    let line = sd.pv.line();
    let best = line.first().copied().unwrap_or(Move::NONE);
    let mut ponder = line.get(1).copied().unwrap_or(Move::NONE);

    if best.is_some() && !ponder.is_some() {
        sd.board.make_move(best);
        if let Some(data) = shared.tt.probe(sd.board.pos().key) {
            let mv = data.mv;
            if mv.is_some() && sd.board.pos().is_pseudo_legal(mv) && sd.board.pos().legal_move(mv)
            {
                ponder = mv;
            }
        }
        sd.board.undo_move();
    }

    (best, ponder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{BoardStack, Position};
    use crate::pawn_hash::PawnHashTable;
    use crate::search::time::TimePlan;
    use crate::search::SearchControl;
    use crate::tablebases::Tablebases;
    use crate::tt::TranspositionTable;
    use std::sync::Arc;
    use std::time::Instant;

    fn shared_with_depth(depth: i32) -> SharedSearch {
        let mut plan = TimePlan::unlimited();
        plan.max_depth = depth;
        SharedSearch {
            tt: Arc::new(TranspositionTable::new(8)),
            pawn_hash: Arc::new(PawnHashTable::new(1)),
            tb: Arc::new(Tablebases::disabled()),
            control: Arc::new(SearchControl::new()),
            plan,
            threads: 1,
            tb_probe_depth: 1,
            start: Instant::now(),
        }
    }

    fn run(fen: &str, depth: i32) -> (SearchData, SharedSearch) {
        let shared = shared_with_depth(depth);
        let mut sd = SearchData::new(0);
        sd.board = BoardStack::from_position(Position::from_fen(fen).unwrap());
        run_worker(&mut sd, &shared);
        (sd, shared)
    }

    #[test]
    fn test_depth_one_picks_a_move() {
        let (mut sd, shared) = run(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -",
            1,
        );
        let (best, _) = best_and_ponder(&mut sd, &shared);
        assert!(best.is_some());
        assert!(sd.board.pos().legal_move(best));
        assert!(shared.control.status().search_finished);
        assert_eq!(shared.control.status().depth, 1);
    }

    #[test]
    fn test_mate_in_one_scenario() {
        // After 1. f3 e5 2. g4 the mate d8h4 must be found at any depth.
        let (mut sd, shared) = run(
            "rnbqkbnr/pppp1ppp/8/4p3/6P1/5P2/PPPPP2P/RNBQKBNR b KQkq g3",
            3,
        );
        let (best, _) = best_and_ponder(&mut sd, &shared);
        assert!(best.same_move("d8h4".parse().unwrap()));
        assert_eq!(shared.control.status().score, MATE_SCORE - 1);
    }

    #[test]
    fn test_deeper_search_fills_pv() {
        let (sd, _) = run(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -",
            5,
        );
        assert!(sd.pv.line().len() >= 2);
        assert!(sd.nodes > 0);
    }

    #[test]
    fn test_threefold_shuffle_scores_zero() {
        use crate::search::pvs::Searcher;

        let mut game = BoardStack::from_position(Position::startpos());
        for mv in ["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8"] {
            game.make_move_root(mv.parse().unwrap());
        }
        assert!(game.is_draw());

        // A non-root node at the third occurrence is an immediate draw.
        let shared = shared_with_depth(6);
        let mut sd = SearchData::new(0);
        sd.prepare(&game);
        let mut searcher = Searcher {
            sd: &mut sd,
            shared: &shared,
        };
        let score = searcher.pvs(
            false,
            true,
            -MATE_SCORE,
            MATE_SCORE,
            6,
            0,
            false,
            Move::NONE,
        );
        assert_eq!(score, 0);
    }

    #[test]
    fn test_bare_minor_endgame_is_drawn() {
        // King and knight versus king: every line hits the insufficient
        // material rule, so the search settles on 0.
        let (_, shared) = run("4k3/8/8/8/8/8/8/4KN2 w - -", 5);
        assert_eq!(shared.control.status().score, 0);
    }
}
