//! Search orchestration.
//!
//! [`SearchManager`] is the engine's front door: it owns the board state,
//! the shared tables, and the worker pool configuration, and exposes the
//! blocking [`SearchManager::search`] call that UCI-layer code drives.
//! Cancellation, pondering, and the wall clock live in the shared
//! [`SearchState`] so any thread can flip them mid-search.

mod limits;
mod params;
mod picker;
mod smp;
mod worker;

pub use limits::{LimitKind, SearchLimiter};
pub use params::{ParamError, ParamInfo, SearchParams, PARAM_REGISTRY};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::board::{Board, Move};
use crate::history::History;
use crate::nnue::Network;
use crate::score::{is_mate, mate_fullmoves};
use crate::tt::TranspositionTable;

/// Flags and counters shared by every thread touching a search.
pub struct SearchState {
    /// Cooperative cancellation; polled by workers every 1024 nodes.
    pub(crate) stop: AtomicBool,
    pondering: AtomicBool,
    chess960: AtomicBool,
    /// Nodes across all workers, synced in batches.
    pub(crate) total_nodes: AtomicU64,
    start: Mutex<Instant>,
}

impl SearchState {
    #[must_use]
    pub fn new() -> SearchState {
        SearchState {
            stop: AtomicBool::new(false),
            pondering: AtomicBool::new(false),
            chess960: AtomicBool::new(false),
            total_nodes: AtomicU64::new(0),
            start: Mutex::new(Instant::now()),
        }
    }

    /// Milliseconds since the search clock was (re)started.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start.lock().elapsed().as_millis() as u64
    }

    pub fn set_start_now(&self) {
        *self.start.lock() = Instant::now();
    }

    #[must_use]
    pub fn is_pondering(&self) -> bool {
        self.pondering.load(Ordering::Relaxed)
    }

    pub fn set_pondering(&self, pondering: bool) {
        self.pondering.store(pondering, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_chess960(&self) -> bool {
        self.chess960.load(Ordering::Relaxed)
    }

    pub fn set_chess960(&self, chess960: bool) {
        self.chess960.store(chess960, Ordering::Relaxed);
    }

    /// Ask every worker to wind down at the next poll.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

impl Default for SearchState {
    fn default() -> Self {
        SearchState::new()
    }
}

/// One finished principal variation.
#[derive(Clone, Debug)]
pub struct PvLine {
    pub moves: Vec<Move>,
    pub score: i32,
    pub depth: usize,
    pub seldepth: usize,
    pub nodes: u64,
    pub time_ms: u64,
    pub hashfull: u32,
}

impl PvLine {
    #[must_use]
    pub fn best_move(&self) -> Option<Move> {
        self.moves.first().copied()
    }

    #[must_use]
    pub fn ponder_move(&self) -> Option<Move> {
        self.moves.get(1).copied()
    }

    /// UCI-style score field: `cp N` or `mate N`.
    #[must_use]
    pub fn score_string(&self) -> String {
        if is_mate(self.score) {
            format!("mate {}", mate_fullmoves(self.score))
        } else {
            format!("cp {}", self.score)
        }
    }
}

/// Progress data for one completed iteration of one PV line.
#[derive(Clone, Debug)]
pub struct SearchIterationInfo {
    pub depth: usize,
    pub seldepth: usize,
    pub multipv: usize,
    pub score: i32,
    pub nodes: u64,
    pub nps: u64,
    pub time_ms: u64,
    pub hashfull: u32,
    pub pv: Vec<Move>,
}

/// Callback fired by the reporting worker after each iteration.
pub type SearchInfoCallback = Arc<dyn Fn(&SearchIterationInfo) + Send + Sync>;

/// Where iteration reports and the final best move go.
pub trait SearchLogger: Send + Sync {
    fn info(&self, info: &SearchIterationInfo, chess960: bool);
    fn best_move(&self, best: Option<Move>, ponder: Option<Move>, chess960: bool);
}

/// The standard UCI-text logger.
pub struct StdoutLogger;

impl SearchLogger for StdoutLogger {
    fn info(&self, info: &SearchIterationInfo, chess960: bool) {
        let score = if is_mate(info.score) {
            format!("mate {}", mate_fullmoves(info.score))
        } else {
            format!("cp {}", info.score)
        };
        let pv: Vec<String> = info.pv.iter().map(|mv| mv.to_uci(chess960)).collect();
        println!(
            "info depth {} seldepth {} multipv {} score {} nodes {} nps {} hashfull {} time {} pv {}",
            info.depth,
            info.seldepth,
            info.multipv,
            score,
            info.nodes,
            info.nps,
            info.hashfull,
            info.time_ms,
            pv.join(" ")
        );
    }

    fn best_move(&self, best: Option<Move>, ponder: Option<Move>, chess960: bool) {
        match best {
            Some(best) => match ponder {
                Some(ponder) => println!(
                    "bestmove {} ponder {}",
                    best.to_uci(chess960),
                    ponder.to_uci(chess960)
                ),
                None => println!("bestmove {}", best.to_uci(chess960)),
            },
            None => println!("bestmove 0000"),
        }
    }
}

/// The engine core's public entry point: owns the position, the shared
/// tables, and the search configuration; runs blocking searches.
pub struct SearchManager {
    board: Board,
    network: Arc<Network>,
    tt: Arc<TranspositionTable>,
    history: Arc<History>,
    state: Arc<SearchState>,
    params: SearchParams,
    limits: Vec<LimitKind>,
    threads: usize,
    multipv: usize,
    logger: Arc<dyn SearchLogger>,
}

impl SearchManager {
    /// Build a manager over a board, a network, and a table budget.
    #[must_use]
    pub fn new(mut board: Board, network: Arc<Network>, tt_mb: usize) -> SearchManager {
        board.set_network(Arc::clone(&network));
        SearchManager {
            board,
            network,
            tt: Arc::new(TranspositionTable::new(tt_mb)),
            history: Arc::new(History::new()),
            state: Arc::new(SearchState::new()),
            params: SearchParams::default(),
            limits: Vec::new(),
            threads: 1,
            multipv: 1,
            logger: Arc::new(StdoutLogger),
        }
    }

    /// Replace the game state (position plus its move history).
    pub fn set_board_state(&mut self, mut board: Board) {
        board.set_network(Arc::clone(&self.network));
        self.board = board;
    }

    #[must_use]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Handle for cross-thread control (stop, ponderhit).
    #[must_use]
    pub fn state(&self) -> Arc<SearchState> {
        Arc::clone(&self.state)
    }

    pub fn add_limit(&mut self, limit: LimitKind) {
        self.limits.push(limit);
    }

    pub fn clear_limits(&mut self) {
        self.limits.clear();
    }

    pub fn set_threads(&mut self, threads: usize) {
        self.threads = threads.max(1);
    }

    pub fn set_multipv(&mut self, multipv: usize) {
        self.multipv = multipv.max(1);
    }

    pub fn set_chess960(&mut self, chess960: bool) {
        self.state.set_chess960(chess960);
    }

    pub fn set_logger(&mut self, logger: Arc<dyn SearchLogger>) {
        self.logger = logger;
    }

    /// Set a tunable by registry name.
    pub fn set_option(&mut self, name: &str, value: i32) -> Result<(), ParamError> {
        self.params.set(name, value)
    }

    #[must_use]
    pub fn params(&self) -> &SearchParams {
        &self.params
    }

    /// Swap the transposition table for a differently sized one.
    pub fn resize_tt(&mut self, size_mb: usize) {
        self.tt = Arc::new(TranspositionTable::new(size_mb));
    }

    /// Forget everything learned: table entries and histories.
    pub fn new_game(&mut self) {
        self.tt.clear();
        self.history.clear();
    }

    /// Run a blocking search under the configured limits.
    ///
    /// With `silent` no info lines or best move are printed; with `ponder`
    /// the clock limits stay dormant until [`SearchManager::ponder_hit`].
    /// Returns the MultiPV lines of the last completed iteration, best
    /// line first; empty when the root has no legal moves.
    pub fn search(&mut self, silent: bool, ponder: bool) -> Vec<PvLine> {
        self.state.stop.store(false, Ordering::Relaxed);
        self.state.total_nodes.store(0, Ordering::Relaxed);
        self.state.set_pondering(ponder);
        self.state.set_start_now();
        self.tt.new_search();

        #[cfg(feature = "logging")]
        log::debug!(
            "search start: {:?}, {} thread(s), limits {:?}, ponder {}",
            self.board.position(),
            self.threads,
            self.limits,
            ponder
        );

        let limiter = SearchLimiter::new(&self.limits, Arc::clone(&self.state));

        let callback: Option<SearchInfoCallback> = if silent {
            None
        } else {
            let logger = Arc::clone(&self.logger);
            let state = Arc::clone(&self.state);
            Some(Arc::new(move |info: &SearchIterationInfo| {
                logger.info(info, state.is_chess960());
            }))
        };

        let lines = smp::run_search(
            &self.board,
            &self.tt,
            &self.history,
            &self.state,
            &limiter,
            &self.params,
            self.threads,
            self.multipv,
            callback,
        );

        #[cfg(feature = "logging")]
        log::debug!(
            "search done: {} node(s) in {} ms",
            self.state.total_nodes.load(Ordering::Relaxed),
            self.state.elapsed_ms()
        );

        if !silent {
            let best = lines.first().and_then(PvLine::best_move);
            let ponder_move = lines.first().and_then(PvLine::ponder_move);
            self.logger
                .best_move(best, ponder_move, self.state.is_chess960());
        }
        lines
    }

    /// Stop a running search; the blocked `search` call still returns the
    /// best line found so far. Interruption is not an error.
    pub fn stop(&self) {
        self.state.request_stop();
    }

    /// The pondered move was played: start the clock for real.
    pub fn ponder_hit(&self) {
        self.state.set_pondering(false);
        self.state.set_start_now();
    }
}
