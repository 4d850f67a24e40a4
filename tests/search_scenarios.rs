//! Behavioural search scenarios driven through the public search API.

use std::sync::Arc;
use std::time::Instant;

use sable::board::{BoardStack, Move, Position};
use sable::pawn_hash::PawnHashTable;
use sable::search::deepening::best_and_ponder;
use sable::search::time::{GoParams, TimePlan};
use sable::search::{smp, SearchControl, SearchData, SharedSearch, MATE_SCORE};
use sable::tablebases::Tablebases;
use sable::tt::TranspositionTable;

fn shared_for(plan: TimePlan, threads: usize) -> SharedSearch {
    SharedSearch {
        tt: Arc::new(TranspositionTable::new(16)),
        pawn_hash: Arc::new(PawnHashTable::new(threads)),
        tb: Arc::new(Tablebases::disabled()),
        control: Arc::new(SearchControl::new()),
        plan,
        threads,
        tb_probe_depth: 1,
        start: Instant::now(),
    }
}

fn game_from(fen: &str, moves: &[&str]) -> BoardStack {
    let mut game = BoardStack::from_position(Position::from_fen(fen).unwrap());
    for m in moves {
        game.make_move_root(m.parse::<Move>().unwrap());
    }
    game
}

fn run_search(game: &BoardStack, plan: TimePlan, threads: usize) -> (Move, i32, SharedSearch) {
    let shared = shared_for(plan, threads);
    let mut workers: Vec<SearchData> = (0..threads)
        .map(|tid| {
            let mut sd = SearchData::new(tid);
            sd.prepare(game);
            sd
        })
        .collect();
    smp::search(&mut workers, &shared);
    let (best, _) = best_and_ponder(&mut workers[0], &shared);
    let score = shared.control.status().score;
    (best, score, shared)
}

fn depth_plan(depth: i32) -> TimePlan {
    let params = GoParams {
        depth: Some(depth),
        ..Default::default()
    };
    TimePlan::from_go(&params, &Position::startpos(), false)
}

#[test]
fn mate_in_one_after_fools_opening() {
    let game = game_from(
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -",
        &["f2f3", "e7e5", "g2g4"],
    );
    for depth in [2, 3, 5] {
        let (best, score, _) = run_search(&game, depth_plan(depth), 1);
        assert!(
            best.same_move("d8h4".parse().unwrap()),
            "depth {depth} missed the mate"
        );
        assert_eq!(score, MATE_SCORE - 1, "mate 1 expected at depth {depth}");
    }
}

#[test]
fn stalemate_position_scores_zero() {
    let game = game_from("7k/5Q2/6K1/8/8/8/8/8 b - -", &[]);
    let (best, score, _) = run_search(&game, depth_plan(4), 1);
    // Black has no legal moves at all: score 0, no best move to give.
    assert_eq!(score, 0);
    assert!(!best.is_some());
}

#[test]
fn depth_one_runs_exactly_one_iteration() {
    let game = game_from("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -", &[]);
    let (best, _, shared) = run_search(&game, depth_plan(1), 1);
    assert!(best.is_some());
    assert!(game.pos().legal_move(best));
    assert_eq!(shared.control.status().depth, 1);
}

#[test]
fn smp_workers_find_the_same_tactic() {
    // White wins a queen with a knight fork.
    let game = game_from("3q3k/8/4n3/8/3N4/8/8/7K w - -", &[]);
    let (best, score, _) = run_search(&game, depth_plan(6), 4);
    // Nd4 hits e6/f5/c6/b5...; the tactical best here is taking on e6.
    assert!(game.pos().legal_move(best));
    assert!(score > 0);
}

#[test]
fn threefold_repetition_is_scored_zero() {
    let game = game_from(
        "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq -",
        &[
            "g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8",
        ],
    );
    assert!(game.is_draw());
}

#[test]
#[ignore = "wall-clock sensitive; run explicitly"]
fn movetime_is_respected() {
    let params = GoParams {
        movetime: Some(1000),
        ..Default::default()
    };
    let game = game_from(
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -",
        &[],
    );
    let plan = TimePlan::from_go(&params, game.pos(), false);
    let start = Instant::now();
    let (best, _, _) = run_search(&game, plan, 1);
    let elapsed = start.elapsed().as_millis() as u64;
    assert!(best.is_some());
    assert!((800..1200).contains(&elapsed), "elapsed {elapsed}ms");
}
