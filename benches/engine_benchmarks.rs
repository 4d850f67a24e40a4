use std::sync::Arc;
use std::time::Instant;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use sable::board::perft::perft;
use sable::board::{BoardStack, Move, Position};
use sable::eval::eval;
use sable::pawn_hash::PawnHashTable;
use sable::search::pvs::Searcher;
use sable::search::time::TimePlan;
use sable::search::{SearchControl, SearchData, SharedSearch, MATE_SCORE};
use sable::tablebases::Tablebases;
use sable::tt::TranspositionTable;

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq -";
const MIDDLEGAME: &str = "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - -";

fn bench_perft(c: &mut Criterion) {
    c.bench_function("perft_startpos_4", |b| {
        let mut bs = BoardStack::from_position(Position::startpos());
        b.iter(|| black_box(perft(&mut bs, 4)));
    });
    c.bench_function("perft_kiwipete_3", |b| {
        let mut bs = BoardStack::from_position(Position::from_fen(KIWIPETE).unwrap());
        b.iter(|| black_box(perft(&mut bs, 3)));
    });
}

fn bench_eval(c: &mut Criterion) {
    let pawn_hash = PawnHashTable::new(1);
    let pos = Position::from_fen(MIDDLEGAME).unwrap();
    c.bench_function("eval_middlegame", |b| {
        b.iter(|| black_box(eval(&pos, &pawn_hash)));
    });
}

fn bench_search(c: &mut Criterion) {
    c.bench_function("search_middlegame_depth_6", |b| {
        b.iter(|| {
            let mut plan = TimePlan::unlimited();
            plan.max_depth = 6;
            let shared = SharedSearch {
                tt: Arc::new(TranspositionTable::new(16)),
                pawn_hash: Arc::new(PawnHashTable::new(1)),
                tb: Arc::new(Tablebases::disabled()),
                control: Arc::new(SearchControl::new()),
                plan,
                threads: 1,
                tb_probe_depth: 1,
                start: Instant::now(),
            };
            let mut sd = SearchData::new(0);
            sd.board = BoardStack::from_position(Position::from_fen(MIDDLEGAME).unwrap());
            let mut searcher = Searcher {
                sd: &mut sd,
                shared: &shared,
            };
            black_box(searcher.pvs(
                true,
                true,
                -MATE_SCORE,
                MATE_SCORE,
                6,
                0,
                false,
                Move::NONE,
            ))
        });
    });
}

criterion_group!(benches, bench_perft, bench_eval, bench_search);
criterion_main!(benches);
