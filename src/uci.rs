//! UCI protocol driver.
//!
//! Owns the game state, the shared tables and the worker pool, and maps
//! the text protocol onto the search. Malformed input is ignored and
//! out-of-range option values are clamped; the engine core below this
//! layer never aborts.

use std::io::BufRead;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

#[cfg(feature = "logging")]
use log::debug;

use crate::board::perft::{perft, run_perft_suite};
use crate::board::types::moves::Move;
use crate::board::{BoardStack, Position};
use crate::pawn_hash::PawnHashTable;
use crate::search::time::{GoParams, TimePlan};
use crate::search::{smp, SearchControl, SearchData, SharedSearch, MAX_DEPTH, MAX_THREADS};
use crate::tablebases::Tablebases;
use crate::tt::TranspositionTable;

const NAME: &str = "Sable 0.6";
const AUTHOR: &str = "the Sable authors";

pub struct Engine {
    game: BoardStack,
    tt: Arc<TranspositionTable>,
    pawn_hash: Arc<PawnHashTable>,
    tb: Arc<Tablebases>,
    control: Arc<SearchControl>,
    threads: usize,
    tb_probe_depth: i32,
    ponder_mode: bool,
    /// Worker state lives here between searches (history stays warm) and
    /// travels into the master thread during one.
    workers: Option<Vec<SearchData>>,
    master: Option<JoinHandle<Vec<SearchData>>>,
}

impl Engine {
    #[must_use]
    pub fn new() -> Self {
        let threads = 1;
        Engine {
            game: BoardStack::from_position(Position::startpos()),
            tt: Arc::new(TranspositionTable::new(TranspositionTable::DEFAULT_MB)),
            pawn_hash: Arc::new(PawnHashTable::new(threads)),
            tb: Arc::new(Tablebases::disabled()),
            control: Arc::new(SearchControl::new()),
            threads,
            tb_probe_depth: 1,
            ponder_mode: false,
            workers: Some(vec![SearchData::new(0)]),
            master: None,
        }
    }

    fn join_search(&mut self) {
        if let Some(handle) = self.master.take() {
            if let Ok(workers) = handle.join() {
                self.workers = Some(workers);
            }
        }
    }

    fn stop_search(&mut self) {
        self.control.set_done();
        self.control
            .infinite
            .store(false, std::sync::atomic::Ordering::Relaxed);
        self.control
            .ponder
            .store(false, std::sync::atomic::Ordering::Relaxed);
        self.join_search();
    }

    fn ponderhit(&mut self) {
        self.control
            .ponder
            .store(false, std::sync::atomic::Ordering::Relaxed);
        if self.control.status().search_finished {
            self.control.set_done();
            self.join_search();
        }
    }

    fn new_game(&mut self) {
        self.stop_search();
        self.tt.clear();
        self.pawn_hash.clear();
        if let Some(workers) = &mut self.workers {
            for sd in workers.iter_mut() {
                sd.tables.reset();
            }
        }
        self.game = BoardStack::from_position(Position::startpos());
    }

    fn set_position(&mut self, tokens: &[&str]) {
        let mut rest = tokens;
        let pos = if rest.first() == Some(&"startpos") {
            rest = &rest[1..];
            Position::startpos()
        } else if rest.first() == Some(&"fen") {
            rest = &rest[1..];
            let end = rest
                .iter()
                .position(|t| *t == "moves")
                .unwrap_or(rest.len());
            let fen = rest[..end].join(" ");
            rest = &rest[end..];
            match Position::from_fen(&fen) {
                Ok(pos) => pos,
                Err(_) => return, // protocol error: keep the current state
            }
        } else {
            return;
        };

        let mut game = BoardStack::from_position(pos);
        if rest.first() == Some(&"moves") {
            for token in &rest[1..] {
                let Ok(mv) = token.parse::<Move>() else { break };
                // The move arrives as bare coordinates; resolve it against
                // the position so flags (quiet, promotion) are trusted.
                if !game.pos().is_pseudo_legal(mv) || !game.pos().legal_move(mv) {
                    break;
                }
                game.make_move_root(mv);
            }
        }
        self.game = game;
    }

    fn go(&mut self, tokens: &[&str]) {
        self.join_search();

        let mut params = GoParams::default();
        let side_white = self.game.pos().side == crate::board::Side::White;
        let value = |iter: &mut std::slice::Iter<'_, &str>| {
            iter.next().and_then(|v| v.parse::<u64>().ok())
        };
        let mut iter = tokens.iter();
        while let Some(token) = iter.next() {
            match *token {
                "wtime" => {
                    let v = value(&mut iter);
                    if side_white {
                        params.time = v;
                    }
                }
                "btime" => {
                    let v = value(&mut iter);
                    if !side_white {
                        params.time = v;
                    }
                }
                "winc" => {
                    let v = value(&mut iter).unwrap_or(0);
                    if side_white {
                        params.inc = v;
                    }
                }
                "binc" => {
                    let v = value(&mut iter).unwrap_or(0);
                    if !side_white {
                        params.inc = v;
                    }
                }
                "movestogo" => params.movestogo = value(&mut iter),
                "movetime" => params.movetime = value(&mut iter),
                "depth" => params.depth = value(&mut iter).map(|d| d as i32),
                "infinite" => params.infinite = true,
                "ponder" => params.ponder = true,
                _ => {}
            }
        }

        let plan = TimePlan::from_go(&params, self.game.pos(), self.ponder_mode);
        self.control.reset(params.ponder, params.infinite);

        let mut workers = self.workers.take().unwrap_or_default();
        while workers.len() < self.threads {
            workers.push(SearchData::new(workers.len()));
        }
        workers.truncate(self.threads);
        for sd in &mut workers {
            sd.prepare(&self.game);
        }

        let shared = SharedSearch {
            tt: Arc::clone(&self.tt),
            pawn_hash: Arc::clone(&self.pawn_hash),
            tb: Arc::clone(&self.tb),
            control: Arc::clone(&self.control),
            plan,
            threads: self.threads,
            tb_probe_depth: self.tb_probe_depth,
            start: Instant::now(),
        };

        self.master = Some(
            std::thread::Builder::new()
                .name("search-master".to_string())
                .spawn(move || {
                    smp::search(&mut workers, &shared);
                    workers
                })
                .expect("failed to spawn search master"),
        );
    }

    fn set_option(&mut self, tokens: &[&str]) {
        let Some(name_at) = tokens.iter().position(|t| *t == "name") else {
            return;
        };
        let value_at = tokens.iter().position(|t| *t == "value");
        let name_end = value_at
            .filter(|&i| i >= name_at + 1)
            .unwrap_or(tokens.len());
        let name = tokens
            .get(name_at + 1..name_end)
            .unwrap_or(&[])
            .join(" ");
        let value = value_at
            .and_then(|i| tokens.get(i + 1..))
            .map(|v| v.join(" "))
            .unwrap_or_default();

        match name.as_str() {
            "Hash" => {
                let mb = value
                    .parse::<usize>()
                    .unwrap_or(TranspositionTable::DEFAULT_MB)
                    .clamp(1, TranspositionTable::MAX_MB);
                self.tt = Arc::new(TranspositionTable::new(mb));
                println!("info string hash set to {}MB", self.tt.size_mb().max(1));
            }
            "Threads" => {
                let threads = value.parse::<usize>().unwrap_or(1).clamp(1, MAX_THREADS);
                self.threads = threads;
                self.pawn_hash = Arc::new(PawnHashTable::new(threads));
                if let Some(workers) = &mut self.workers {
                    while workers.len() < threads {
                        workers.push(SearchData::new(workers.len()));
                    }
                    workers.truncate(threads);
                }
                println!("info string threads set to {threads}");
            }
            "Ponder" => {
                self.ponder_mode = value == "true";
            }
            "SyzygyPath" => {
                if !value.is_empty() && value != "<empty>" {
                    self.tb = Arc::new(Tablebases::init(&value));
                    if self.tb.largest() > 0 {
                        println!("info string syzygy path {value}");
                    }
                }
            }
            "SyzygyProbeDepth" => {
                self.tb_probe_depth = value
                    .parse::<i32>()
                    .unwrap_or(1)
                    .clamp(1, MAX_DEPTH);
            }
            _ => {}
        }
    }

    fn run_perft(&mut self, tokens: &[&str]) {
        let depth = tokens
            .first()
            .and_then(|t| t.parse::<u32>().ok())
            .unwrap_or(0);
        if depth == 0 {
            println!("specify depth");
            return;
        }
        let start = Instant::now();
        let mut bs = self.game.clone();
        let nodes = perft(&mut bs, depth);
        let ms = start.elapsed().as_millis() as u64;
        println!(
            "perft({depth})={nodes}, time: {ms}ms, nps: {} (bulk counting)",
            nodes * 1000 / (ms + 1)
        );
    }

    /// One command line; returns `false` on `quit`.
    pub fn handle_command(&mut self, line: &str) -> bool {
        #[cfg(feature = "logging")]
        debug!("uci> {line}");

        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            return true;
        };
        let rest = &tokens[1..];

        match command {
            "uci" => {
                println!("id name {NAME}");
                println!("id author {AUTHOR}");
                println!(
                    "option name Hash type spin default {} min 1 max {}",
                    TranspositionTable::DEFAULT_MB,
                    TranspositionTable::MAX_MB
                );
                println!("option name Threads type spin default 1 min 1 max {MAX_THREADS}");
                println!("option name Ponder type check default false");
                println!("option name SyzygyPath type string default <empty>");
                println!(
                    "option name SyzygyProbeDepth type spin default 1 min 1 max {MAX_DEPTH}"
                );
                println!("uciok");
            }
            "isready" => println!("readyok"),
            "ucinewgame" => self.new_game(),
            "position" => self.set_position(rest),
            "go" => self.go(rest),
            "stop" => self.stop_search(),
            "ponderhit" => self.ponderhit(),
            "setoption" => self.set_option(rest),
            "perft" => self.run_perft(rest),
            "test" => run_perft_suite(),
            "print" => print!("{}", self.game.pos()),
            "quit" => return false,
            _ => {} // unknown command: ignored
        }
        true
    }
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop_search();
    }
}

/// Blocking UCI loop over stdin.
pub fn run() {
    let mut engine = Engine::new();
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if !engine.handle_command(&line) {
            break;
        }
    }
}
