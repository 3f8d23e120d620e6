//! Lazy SMP coordination.
//!
//! All workers search the same root independently, sharing only the
//! transposition table, the history tables, and the stop flag. There is no
//! work division: threads diverge naturally through table races, which is
//! the whole trick. Worker 0 is the reporting worker; its PV is the
//! search's answer. The first worker to finish (limit hit or depth
//! exhausted) raises the stop flag and everyone else drains out.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use crate::board::Board;
use crate::history::History;
use crate::tt::TranspositionTable;

use super::limits::SearchLimiter;
use super::worker::Worker;
use super::{PvLine, SearchInfoCallback, SearchParams, SearchState};

/// Deep PVS recursion plus per-frame move lists need room to breathe.
const SEARCH_STACK_SIZE: usize = 32 * 1024 * 1024;

#[allow(clippy::too_many_arguments)]
pub(crate) fn run_search(
    board: &Board,
    tt: &Arc<TranspositionTable>,
    history: &Arc<History>,
    state: &Arc<SearchState>,
    limiter: &SearchLimiter,
    params: &SearchParams,
    threads: usize,
    multipv: usize,
    callback: Option<SearchInfoCallback>,
) -> Vec<PvLine> {
    let threads = threads.max(1);
    let mut helpers = Vec::with_capacity(threads - 1);

    for thread_id in 1..threads {
        let board = board.clone();
        let tt = Arc::clone(tt);
        let history = Arc::clone(history);
        let state = Arc::clone(state);
        let limiter = limiter.clone();
        let params = params.clone();

        let handle = thread::Builder::new()
            .name(format!("search-{thread_id}"))
            .stack_size(SEARCH_STACK_SIZE)
            .spawn(move || {
                let mut worker = Worker::new(
                    board, tt, history, state.clone(), limiter, params, thread_id, 1, None,
                );
                worker.run();
                // Whoever exits first stops the rest
                state.stop.store(true, Ordering::Relaxed);
            })
            .unwrap_or_else(|err| unreachable!("failed to spawn search worker: {err}"));
        helpers.push(handle);
    }

    // The reporting worker. Its own thread buys a predictable stack for
    // the recursion regardless of who called `search`.
    let lines = {
        let board = board.clone();
        let tt = Arc::clone(tt);
        let history = Arc::clone(history);
        let state_main = Arc::clone(state);
        let limiter = limiter.clone();
        let params = params.clone();

        let handle = thread::Builder::new()
            .name("search-0".to_string())
            .stack_size(SEARCH_STACK_SIZE)
            .spawn(move || {
                let mut worker = Worker::new(
                    board, tt, history, state_main, limiter, params, 0, multipv, callback,
                );
                worker.run()
            })
            .unwrap_or_else(|err| unreachable!("failed to spawn search worker: {err}"));
        handle
            .join()
            .unwrap_or_else(|_| unreachable!("main search worker panicked"))
    };

    // Main worker done: release the helpers and collect them
    state.stop.store(true, Ordering::Relaxed);
    for handle in helpers {
        let _ = handle.join();
    }

    lines
}
