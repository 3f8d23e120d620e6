//! The search worker.
//!
//! One worker owns a board clone and runs the full iterative-deepening
//! loop: aspiration windows around a PVS negamax with the usual pruning
//! stack (reverse futility, null move, internal iterative reductions,
//! late-move and futility pruning, SEE pruning, singular extensions,
//! late-move reductions) and a capture-only quiescence tail.
//!
//! Everything on the hot path (PV table, killers, per-ply move context,
//! static-eval stack) is worker-local; only the transposition table, the
//! history tables, and the stop flag are shared.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::board::{Board, Color, Move, Piece, MAX_PLY};
use crate::history::{History, PieceTo};
use crate::score::{
    draw_score, is_mate, mate_in, mated_in, INFINITY, LONGEST_MATE, MATE, MAX_EVAL,
};
use crate::tt::{Bound, TranspositionTable, TtEntry};

use super::limits::SearchLimiter;
use super::picker::{ContContext, MovePicker};
use super::{PvLine, SearchInfoCallback, SearchIterationInfo, SearchParams, SearchState};

/// Log-log reduction table, indexed by depth and move number (both capped).
static LMR_TABLE: Lazy<Box<[[i32; 64]; 64]>> = Lazy::new(|| {
    let params = SearchParams::default();
    let base = f64::from(params.lmr_base) / 100.0;
    let divisor = f64::from(params.lmr_divisor) / 100.0;
    let mut table = vec![[0i32; 64]; 64];
    for depth in 1..64 {
        for moves in 1..64 {
            let reduction = base + (depth as f64).ln() * (moves as f64).ln() / divisor;
            table[depth][moves] = reduction as i32;
        }
    }
    table.into_boxed_slice().try_into().unwrap_or_else(|_| unreachable!())
});

/// Per-ply search context.
#[derive(Clone)]
struct PlyData {
    killers: [Move; 2],
    excluded: Move,
    static_eval: i32,
    /// The (piece, target) of the move made *from* this ply, if any.
    moved: Option<PieceTo>,
    pv: [Move; MAX_PLY],
    pv_len: usize,
}

impl Default for PlyData {
    fn default() -> PlyData {
        PlyData {
            killers: [Move::null(); 2],
            excluded: Move::null(),
            static_eval: 0,
            moved: None,
            pv: [Move::null(); MAX_PLY],
            pv_len: 0,
        }
    }
}

/// One MultiPV line under construction.
#[derive(Clone, Default)]
struct RootLine {
    score: i32,
    prev_score: i32,
    pv: Vec<Move>,
}

pub(crate) struct Worker {
    board: Board,
    tt: Arc<TranspositionTable>,
    history: Arc<History>,
    state: Arc<SearchState>,
    limiter: SearchLimiter,
    params: SearchParams,
    thread_id: usize,
    multipv: usize,
    callback: Option<SearchInfoCallback>,

    stack: Vec<PlyData>,
    lines: Vec<RootLine>,
    excluded_root: Vec<Move>,
    root_nodes: Vec<(Move, u64)>,

    nodes: u64,
    unsynced_nodes: u64,
    seldepth: usize,
    completed_depth: usize,
    stopped: bool,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        board: Board,
        tt: Arc<TranspositionTable>,
        history: Arc<History>,
        state: Arc<SearchState>,
        limiter: SearchLimiter,
        params: SearchParams,
        thread_id: usize,
        multipv: usize,
        callback: Option<SearchInfoCallback>,
    ) -> Worker {
        Worker {
            board,
            tt,
            history,
            state,
            limiter,
            params,
            thread_id,
            multipv: multipv.max(1),
            callback,
            stack: vec![PlyData::default(); MAX_PLY + 4],
            lines: Vec::new(),
            excluded_root: Vec::new(),
            root_nodes: Vec::new(),
            nodes: 0,
            unsynced_nodes: 0,
            seldepth: 0,
            completed_depth: 0,
            stopped: false,
        }
    }

    fn is_main(&self) -> bool {
        self.thread_id == 0
    }

    /// Poll the shared stop flag and (amortized) the hard limits. A worker
    /// that hits a hard bound stops everyone.
    fn should_stop(&mut self) -> bool {
        if self.stopped {
            return true;
        }
        if self.state.stop.load(Ordering::Relaxed) {
            self.stopped = true;
            return true;
        }
        if self.nodes % 1024 == 0 {
            self.state
                .total_nodes
                .fetch_add(self.unsynced_nodes, Ordering::Relaxed);
            self.unsynced_nodes = 0;
            let global = self.state.total_nodes.load(Ordering::Relaxed);
            if self.limiter.expired(global, true) {
                self.state.stop.store(true, Ordering::Relaxed);
                self.stopped = true;
                return true;
            }
        }
        false
    }

    fn count_node(&mut self) {
        self.nodes += 1;
        self.unsynced_nodes += 1;
    }

    fn global_nodes(&self) -> u64 {
        self.state.total_nodes.load(Ordering::Relaxed) + self.unsynced_nodes
    }

    // ------------------------------------------------------------------
    // Iterative deepening
    // ------------------------------------------------------------------

    /// Run the search to completion; returns the finished PV lines of the
    /// last fully completed iteration.
    pub(crate) fn run(&mut self) -> Vec<PvLine> {
        let root_moves = self.board.legal_moves();
        if root_moves.is_empty() {
            return Vec::new();
        }
        let line_count = self.multipv.min(root_moves.len());
        self.lines = vec![RootLine::default(); line_count];
        self.root_nodes = root_moves.iter().map(|&mv| (mv, 0)).collect();

        let max_depth = self.limiter.max_depth();
        let mut finished: Vec<PvLine> = Vec::new();

        for depth in 1..=max_depth {
            self.excluded_root.clear();

            for line_index in 0..line_count {
                self.seldepth = 0;
                self.aspiration(depth, line_index);
                if self.stopped {
                    break;
                }
                let line = &self.lines[line_index];
                if let Some(&best) = line.pv.first() {
                    self.excluded_root.push(best);
                }
                if self.is_main() {
                    self.report(depth, line_index);
                }
            }

            if self.stopped {
                break;
            }
            self.completed_depth = depth;
            finished = self.snapshot_lines(self.completed_depth);
            for line in &mut self.lines {
                line.prev_score = line.score;
            }

            // Node-fraction time scaling, then the soft bounds
            if self.is_main() {
                let total: u64 = self.root_nodes.iter().map(|(_, n)| n).sum();
                if total > 0 {
                    if let Some(&(_, best_nodes)) = self
                        .root_nodes
                        .iter()
                        .find(|(mv, _)| Some(mv) == finished[0].moves.first())
                    {
                        let frac = best_nodes as f64 / total as f64;
                        self.limiter.scale_soft_bound(&self.params, depth, frac);
                    }
                }
            }
            if self.limiter.expired(self.global_nodes(), false) {
                break;
            }
        }

        // Flush the node counter remainder for accurate reporting
        self.state
            .total_nodes
            .fetch_add(self.unsynced_nodes, Ordering::Relaxed);
        self.unsynced_nodes = 0;

        if finished.is_empty() {
            // Not even depth 1 completed: fall back to any legal move
            finished.push(PvLine {
                moves: vec![root_moves[0]],
                score: 0,
                depth: 0,
                seldepth: 0,
                nodes: self.nodes,
                time_ms: self.limiter.elapsed_ms(),
                hashfull: self.tt.hashfull(),
            });
        }
        finished
    }

    fn snapshot_lines(&self, depth: usize) -> Vec<PvLine> {
        self.lines
            .iter()
            .map(|line| PvLine {
                moves: line.pv.clone(),
                score: line.score,
                depth,
                seldepth: self.seldepth,
                nodes: self.global_nodes(),
                time_ms: self.limiter.elapsed_ms(),
                hashfull: self.tt.hashfull(),
            })
            .collect()
    }

    fn report(&self, depth: usize, line_index: usize) {
        let Some(callback) = &self.callback else {
            return;
        };
        let line = &self.lines[line_index];
        let time_ms = self.limiter.elapsed_ms();
        let nodes = self.global_nodes();
        callback(&SearchIterationInfo {
            depth,
            seldepth: self.seldepth,
            multipv: line_index + 1,
            score: line.score,
            nodes,
            nps: if time_ms > 0 { nodes * 1000 / time_ms } else { 0 },
            time_ms,
            hashfull: self.tt.hashfull(),
            pv: line.pv.clone(),
        });
    }

    /// One aspiration loop around the root search for one PV line.
    fn aspiration(&mut self, depth: usize, line_index: usize) {
        let prev = self.lines[line_index].prev_score;
        let mut delta = self.params.aspiration_initial_delta;
        let (mut alpha, mut beta) = if depth >= self.params.aspiration_min_depth as usize {
            (
                (prev - delta).max(-INFINITY),
                (prev + delta).min(INFINITY),
            )
        } else {
            (-INFINITY, INFINITY)
        };
        let mut search_depth = depth as i32;

        loop {
            self.stack[0].pv_len = 0;
            let score = self.negamax(0, search_depth, alpha, beta, false);
            if self.stopped {
                return;
            }

            if score <= alpha {
                // Fail low: drop the window floor and restore full depth
                beta = (alpha + beta) / 2;
                alpha = (score - delta).max(-INFINITY);
                search_depth = depth as i32;
            } else if score >= beta {
                // Fail high: raise the ceiling and probe a bit shallower
                beta = (score + delta).min(INFINITY);
                search_depth = (search_depth - 1).max((depth as i32 - 3).max(1));
            } else {
                let line = &mut self.lines[line_index];
                line.score = score;
                line.pv = self.stack[0].pv[..self.stack[0].pv_len].to_vec();
                return;
            }

            delta = delta.saturating_mul(2);
            if delta >= self.params.aspiration_max_delta {
                alpha = -INFINITY;
                beta = INFINITY;
            }
        }
    }

    // ------------------------------------------------------------------
    // Evaluation plumbing
    // ------------------------------------------------------------------

    /// Raw network evaluation with material scaling.
    fn raw_eval(&self) -> i32 {
        let pos = self.board.position();
        let params = &self.params;
        let mut phase = 0;
        for (piece, weight) in [
            (Piece::Knight, params.material_knight),
            (Piece::Bishop, params.material_bishop),
            (Piece::Rook, params.material_rook),
            (Piece::Queen, params.material_queen),
        ] {
            let count = (pos.pieces(Color::White, piece) | pos.pieces(Color::Black, piece)).count();
            phase += count as i32 * weight;
        }
        let eval = self.board.evaluate();
        (eval * (params.material_scale_base + phase) / 1024).clamp(-MAX_EVAL, MAX_EVAL)
    }

    /// Blend of every correction history applicable at `ply`.
    fn correction(&self, ply: usize) -> i32 {
        let pos = self.board.position();
        let history = &self.history;
        let params = &self.params;

        let mut total = i64::from(history.pawn_corr.value(pos.pawn_key()))
            * i64::from(params.corr_weight_pawn);
        for color in [Color::White, Color::Black] {
            total += i64::from(
                history.nonpawn_corr[color.index()].value(pos.nonpawn_key(color)),
            ) * i64::from(params.corr_weight_nonpawn);
        }
        total +=
            i64::from(history.major_corr.value(pos.major_key())) * i64::from(params.corr_weight_major);
        total +=
            i64::from(history.minor_corr.value(pos.minor_key())) * i64::from(params.corr_weight_minor);

        for (slot, back, weight) in [
            (0, 1, params.corr_weight_cont1),
            (1, 2, params.corr_weight_cont2),
        ] {
            if ply >= back {
                if let Some(prev) = self.stack[ply - back].moved {
                    total +=
                        i64::from(history.cont_corr[slot].value(prev.key())) * i64::from(weight);
                }
            }
        }

        (total / (1024 * 16)) as i32
    }

    /// Static eval for the node: reuse the table's (already corrected)
    /// eval on a hit, otherwise evaluate and correct.
    fn static_eval(&self, ply: usize, entry: Option<&TtEntry>) -> i32 {
        match entry {
            Some(entry) => entry.eval,
            None => {
                (self.raw_eval() + self.correction(ply)).clamp(-MAX_EVAL, MAX_EVAL)
            }
        }
    }

    fn cont_context(&self, ply: usize) -> ContContext {
        let mut conts: ContContext = [None; 3];
        for (slot, back) in [(0usize, 1usize), (1, 2), (2, 4)] {
            if ply >= back {
                conts[slot] = self.stack[ply - back].moved;
            }
        }
        conts
    }

    fn update_pv(&mut self, ply: usize, mv: Move) {
        let (head, tail) = self.stack.split_at_mut(ply + 1);
        let parent = &mut head[ply];
        let child = &tail[0];
        parent.pv[0] = mv;
        parent.pv[1..=child.pv_len].copy_from_slice(&child.pv[..child.pv_len]);
        parent.pv_len = child.pv_len + 1;
    }

    // ------------------------------------------------------------------
    // Negamax
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_lines)]
    fn negamax(&mut self, ply: usize, depth: i32, mut alpha: i32, mut beta: i32, cutnode: bool) -> i32 {
        if self.should_stop() {
            return 0;
        }

        let is_pv = beta - alpha > 1;
        let root = ply == 0;
        self.seldepth = self.seldepth.max(ply);
        self.stack[ply].pv_len = 0;

        if !root {
            if self.board.is_draw(ply) {
                return draw_score(self.nodes);
            }
            if ply >= MAX_PLY - 1 {
                return self.static_eval(ply, None);
            }
            // Mate distance pruning
            alpha = alpha.max(mated_in(ply));
            beta = beta.min(mate_in(ply + 1));
            if alpha >= beta {
                return alpha;
            }
        }

        if depth <= 0 {
            return self.quiescence(ply, alpha, beta);
        }

        let excluded = self.stack[ply].excluded;
        let pos_key = self.board.hash();
        let in_check = self.board.in_check();

        // Transposition table: cutoffs outside the PV, move ordering
        // everywhere. Nothing is probed inside a singular verification.
        let entry = if excluded.is_null() {
            self.tt.probe(pos_key, ply)
        } else {
            None
        };
        let tt_move = match &entry {
            Some(entry) if self.board.position().is_legal(entry.mv) => entry.mv,
            _ => Move::null(),
        };
        if let Some(entry) = &entry {
            if !is_pv && !root && entry.depth >= depth {
                let usable = match entry.bound {
                    Bound::Exact => true,
                    Bound::Lower => entry.score >= beta,
                    Bound::Upper => entry.score <= alpha,
                };
                if usable {
                    return entry.score;
                }
            }
        }

        let static_eval = if in_check {
            -INFINITY
        } else {
            self.static_eval(ply, entry.as_ref())
        };
        self.stack[ply].static_eval = static_eval;
        let improving =
            !in_check && ply >= 2 && static_eval > self.stack[ply - 2].static_eval;

        let mut depth = depth;
        // Internal iterative reductions: a node this deep with no hash
        // move is cheap to shrink now and re-deepen later
        if tt_move.is_null() && depth >= self.params.iir_min_depth {
            depth -= 1;
        }

        if !is_pv && !in_check && excluded.is_null() {
            // Reverse futility pruning
            if depth <= self.params.rfp_depth_limit {
                let margin = self.params.rfp_margin * depth
                    - i32::from(improving) * self.params.rfp_improving_margin;
                if static_eval - margin >= beta && static_eval.abs() < LONGEST_MATE {
                    return (static_eval + beta) / 2;
                }
            }

            // Null move pruning
            if static_eval >= beta
                && depth >= self.params.nmp_min_depth
                && !self.board.position().from_null()
                && self.board.position().has_non_pawn_material(self.board.side_to_move())
            {
                let reduction = self.params.nmp_base_reduction
                    + depth / self.params.nmp_depth_divisor
                    + ((static_eval - beta) / self.params.nmp_eval_divisor)
                        .min(self.params.nmp_eval_max_reduction);
                self.stack[ply].moved = None;
                self.board.make_null();
                let score =
                    -self.negamax(ply + 1, depth - reduction, -beta, -beta + 1, !cutnode);
                self.board.unmake_null();
                if self.stopped {
                    return 0;
                }
                if score >= beta {
                    return if is_mate(score) { beta } else { score };
                }
            }
        }

        let counter = self.counter_move(ply);
        let conts = self.cont_context(ply);
        let killers = self.stack[ply].killers;
        let mut picker = MovePicker::new(tt_move, killers, counter);

        let original_alpha = alpha;
        let mut best_score = -INFINITY;
        let mut best_move = Move::null();
        let mut move_count = 0usize;
        let mut quiets_tried: Vec<Move> = Vec::with_capacity(32);
        let mut captures_tried: Vec<(Move, Piece, Piece)> = Vec::with_capacity(16);

        loop {
            let Some(mv) = ({
                let pos = self.board.position();
                picker.next(pos, &self.history, &conts)
            }) else {
                break;
            };
            if mv == excluded {
                continue;
            }
            if root && self.excluded_root.contains(&mv) {
                continue;
            }
            let is_quiet = mv.is_quiet();
            move_count += 1;

            // Shallow-move pruning, once a real score is banked
            if !root && !in_check && best_score > -LONGEST_MATE {
                if is_quiet {
                    let lmp_limit = self.params.lmp_offset
                        + self.params.lmp_multiplier * depth * depth;
                    if quiets_tried.len() as i32 >= lmp_limit {
                        picker.skip_quiets();
                        continue;
                    }
                    if depth <= self.params.fp_depth_limit
                        && static_eval
                            + self.params.fp_offset
                            + self.params.fp_margin * (depth + i32::from(improving))
                            <= alpha
                    {
                        picker.skip_quiets();
                        continue;
                    }
                    if !self.board.position().see_ge(mv, self.params.see_quiet_margin * depth) {
                        continue;
                    }
                } else if !self
                    .board
                    .position()
                    .see_ge(mv, self.params.see_capture_margin * depth)
                {
                    continue;
                }
            }

            // Singular extension of a trusted hash move
            let mut extension = 0;
            if let Some(entry) = &entry {
                if !root
                    && mv == tt_move
                    && excluded.is_null()
                    && depth >= self.params.singular_min_depth
                    && entry.depth >= depth - self.params.singular_depth_margin
                    && entry.bound != Bound::Upper
                    && !is_mate(entry.score)
                {
                    let entry = *entry;
                    let singular_beta =
                        (entry.score - depth * self.params.singular_margin_mult).max(-MATE);
                    self.stack[ply].excluded = mv;
                    let verification = self.negamax(
                        ply,
                        (depth - 1) / 2,
                        singular_beta - 1,
                        singular_beta,
                        cutnode,
                    );
                    self.stack[ply].excluded = Move::null();
                    if self.stopped {
                        return 0;
                    }

                    if verification < singular_beta {
                        extension = 1;
                        if !is_pv
                            && verification < singular_beta - self.params.singular_double_margin
                        {
                            extension = 2;
                            if verification
                                < singular_beta - self.params.singular_triple_margin
                            {
                                extension = 3;
                            }
                        }
                    } else if singular_beta >= beta {
                        // Multicut: a second move also beats beta
                        return singular_beta;
                    } else if entry.score >= beta {
                        extension = -1;
                    }
                }
            }

            let (moved_color, moved_piece) = self
                .board
                .position()
                .piece_at(mv.from())
                .unwrap_or((self.board.side_to_move(), Piece::Pawn));
            let victim = if mv.is_capture() && !mv.is_en_passant() {
                self.board
                    .position()
                    .piece_at(mv.to())
                    .map_or(Piece::Pawn, |(_, piece)| piece)
            } else {
                Piece::Pawn
            };
            self.stack[ply].moved = Some(PieceTo {
                color: moved_color,
                piece: moved_piece,
                to: mv.to(),
            });

            // History of the move about to be tried, from this node's own
            // threat picture (feeds the LMR adjustment)
            let quiet_hist = if is_quiet {
                let pos = self.board.position();
                self.history.quiet.score(pos.side_to_move(), pos.threats, mv)
            } else {
                0
            };

            let nodes_before = self.nodes;
            self.board.make_move(mv);
            self.count_node();
            let gives_check = self.board.in_check();
            let new_depth = depth - 1 + extension;

            let mut score;
            if move_count == 1 {
                score = -self.negamax(ply + 1, new_depth, -beta, -alpha, false);
            } else {
                // Late-move reductions with a null-window scout
                let mut reduction = 0;
                let lmr_threshold = if is_pv {
                    self.params.lmr_min_moves_pv
                } else {
                    self.params.lmr_min_moves_nonpv
                };
                if depth >= self.params.lmr_min_depth && move_count as i32 >= lmr_threshold {
                    reduction = LMR_TABLE[(depth as usize).min(63)][move_count.min(63)];
                    if !is_pv {
                        reduction += 1;
                    }
                    if gives_check {
                        reduction -= 1;
                    }
                    if entry.as_ref().is_some_and(|e| e.pv) {
                        reduction -= 1;
                    }
                    if is_quiet {
                        reduction -= quiet_hist / self.params.lmr_history_divisor;
                    }
                    reduction = reduction.clamp(0, (new_depth - 1).max(0));
                }

                score = -self.negamax(ply + 1, new_depth - reduction, -alpha - 1, -alpha, true);
                if score > alpha && reduction > 0 {
                    score = -self.negamax(ply + 1, new_depth, -alpha - 1, -alpha, !cutnode);
                }
                if score > alpha && is_pv {
                    score = -self.negamax(ply + 1, new_depth, -beta, -alpha, false);
                }
            }

            self.board.unmake_move();
            if self.stopped {
                return 0;
            }
            if root {
                if let Some(slot) = self.root_nodes.iter_mut().find(|(m, _)| *m == mv) {
                    slot.1 += self.nodes - nodes_before;
                }
            }

            if is_quiet {
                quiets_tried.push(mv);
            } else {
                captures_tried.push((mv, moved_piece, victim));
            }

            if score > best_score {
                best_score = score;
                if score > alpha {
                    best_move = mv;
                    alpha = score;
                    if is_pv {
                        self.update_pv(ply, mv);
                    }
                }
                if score >= beta {
                    self.update_histories(ply, depth, mv, &quiets_tried, &captures_tried);
                    break;
                }
            }
        }

        if move_count == 0 {
            // Singular verification can exclude the only legal move
            if !excluded.is_null() {
                return alpha;
            }
            return if in_check {
                mated_in(ply)
            } else {
                draw_score(self.nodes)
            };
        }

        let bound = if best_score >= beta {
            Bound::Lower
        } else if best_score > original_alpha {
            Bound::Exact
        } else {
            Bound::Upper
        };

        if excluded.is_null() {
            self.tt.store(
                pos_key,
                ply,
                depth,
                bound,
                best_score,
                static_eval,
                best_move,
                is_pv,
            );

            // Correction history learns from quiet, in-bound outcomes
            if !in_check
                && (best_move.is_null() || best_move.is_quiet())
                && !(bound == Bound::Lower && best_score <= static_eval)
                && !(bound == Bound::Upper && best_score >= static_eval)
            {
                self.update_corrections(ply, depth, best_score - static_eval);
            }
        }

        best_score
    }

    // ------------------------------------------------------------------
    // Quiescence
    // ------------------------------------------------------------------

    fn quiescence(&mut self, ply: usize, mut alpha: i32, beta: i32) -> i32 {
        if self.should_stop() {
            return 0;
        }

        let is_pv = beta - alpha > 1;
        self.seldepth = self.seldepth.max(ply);
        self.stack[ply].pv_len = 0;

        if self.board.is_draw(ply) {
            return draw_score(self.nodes);
        }
        if ply >= MAX_PLY - 1 {
            return self.static_eval(ply, None);
        }

        let pos_key = self.board.hash();
        let entry = self.tt.probe(pos_key, ply);
        if let Some(entry) = &entry {
            if !is_pv {
                let usable = match entry.bound {
                    Bound::Exact => true,
                    Bound::Lower => entry.score >= beta,
                    Bound::Upper => entry.score <= alpha,
                };
                if usable {
                    return entry.score;
                }
            }
        }

        let in_check = self.board.in_check();
        let mut best_score = -INFINITY;
        let mut stored_eval = -INFINITY;

        if !in_check {
            // Stand pat: the side to move may decline all captures
            let static_eval = self.static_eval(ply, entry.as_ref());
            self.stack[ply].static_eval = static_eval;
            stored_eval = static_eval;
            if static_eval >= beta {
                return static_eval;
            }
            alpha = alpha.max(static_eval);
            best_score = static_eval;
        }

        let tt_move = match &entry {
            Some(entry) if self.board.position().is_legal(entry.mv) => entry.mv,
            _ => Move::null(),
        };
        // Evasions need the full picker; quiet positions only captures
        let mut picker = if in_check {
            MovePicker::new(tt_move, [Move::null(); 2], Move::null())
        } else {
            MovePicker::new_quiescence(tt_move)
        };
        let conts = self.cont_context(ply);

        let mut best_move = Move::null();
        let mut move_count = 0;

        loop {
            let Some(mv) = ({
                let pos = self.board.position();
                picker.next(pos, &self.history, &conts)
            }) else {
                break;
            };
            move_count += 1;

            let (moved_color, moved_piece) = self
                .board
                .position()
                .piece_at(mv.from())
                .unwrap_or((self.board.side_to_move(), Piece::Pawn));
            self.stack[ply].moved = Some(PieceTo {
                color: moved_color,
                piece: moved_piece,
                to: mv.to(),
            });

            self.board.make_move(mv);
            self.count_node();
            let score = -self.quiescence(ply + 1, -beta, -alpha);
            self.board.unmake_move();
            if self.stopped {
                return 0;
            }

            if score > best_score {
                best_score = score;
                if score > alpha {
                    alpha = score;
                    best_move = mv;
                }
                if score >= beta {
                    break;
                }
            }
        }

        if in_check && move_count == 0 {
            return mated_in(ply);
        }

        let bound = if best_score >= beta {
            Bound::Lower
        } else {
            Bound::Upper
        };
        self.tt.store(pos_key, ply, 0, bound, best_score, stored_eval, best_move, is_pv);

        best_score
    }

    // ------------------------------------------------------------------
    // History bookkeeping
    // ------------------------------------------------------------------

    fn counter_move(&self, ply: usize) -> Move {
        if ply == 0 {
            return Move::null();
        }
        match self.stack[ply - 1].moved {
            Some(prev) => self.history.counter.get(prev),
            None => Move::null(),
        }
    }

    /// Reward the cutoff move, punish the tried-and-failed ones, refresh
    /// killers and the counter move.
    fn update_histories(
        &mut self,
        ply: usize,
        depth: i32,
        cut_move: Move,
        quiets_tried: &[Move],
        captures_tried: &[(Move, Piece, Piece)],
    ) {
        let params = &self.params;
        let bonus = (params.history_bonus_mult * depth).min(params.history_bonus_max);
        let malus = -(params.history_malus_mult * depth).min(params.history_malus_max);
        let pos = self.board.position();
        let stm = pos.side_to_move();
        let threats = pos.threats;
        let conts = self.cont_context(ply);

        if cut_move.is_quiet() {
            self.history.quiet.update(stm, threats, cut_move, bonus);
            if let Some((color, piece)) = pos.piece_at(cut_move.from()) {
                let cur = PieceTo {
                    color,
                    piece,
                    to: cut_move.to(),
                };
                for (i, prev) in conts.iter().enumerate() {
                    if let Some(prev) = prev {
                        self.history.continuation[i].update(*prev, cur, bonus);
                    }
                }
            }

            // Killer slots and the counter move
            let killers = &mut self.stack[ply].killers;
            if killers[0] != cut_move {
                killers[1] = killers[0];
                killers[0] = cut_move;
            }
            if ply >= 1 {
                if let Some(prev) = self.stack[ply - 1].moved {
                    self.history.counter.set(prev, cut_move);
                }
            }

            for &quiet in quiets_tried {
                if quiet == cut_move {
                    continue;
                }
                self.history.quiet.update(stm, threats, quiet, malus);
                if let Some((color, piece)) = pos.piece_at(quiet.from()) {
                    let cur = PieceTo {
                        color,
                        piece,
                        to: quiet.to(),
                    };
                    for (i, prev) in conts.iter().enumerate() {
                        if let Some(prev) = prev {
                            self.history.continuation[i].update(*prev, cur, malus);
                        }
                    }
                }
            }
        } else if let Some(&(_, moving, victim)) = captures_tried
            .iter()
            .find(|(mv, _, _)| *mv == cut_move)
        {
            self.history
                .capture
                .update(moving, cut_move.to(), victim, bonus);
        }

        for &(mv, moving, victim) in captures_tried {
            if mv == cut_move {
                continue;
            }
            self.history.capture.update(moving, mv.to(), victim, malus);
        }
    }

    fn update_corrections(&self, ply: usize, depth: i32, diff: i32) {
        let pos = self.board.position();
        let history = &self.history;
        history.pawn_corr.update(pos.pawn_key(), depth, diff);
        for color in [Color::White, Color::Black] {
            history.nonpawn_corr[color.index()].update(pos.nonpawn_key(color), depth, diff);
        }
        history.major_corr.update(pos.major_key(), depth, diff);
        history.minor_corr.update(pos.minor_key(), depth, diff);
        for (slot, back) in [(0usize, 1usize), (1, 2)] {
            if ply >= back {
                if let Some(prev) = self.stack[ply - back].moved {
                    history.cont_corr[slot].update(prev.key(), depth, diff);
                }
            }
        }
    }
}
