//! Shared history tables.
//!
//! Everything here is advisory move-ordering or evaluation-correction
//! state, shared between workers through relaxed atomics: lost updates are
//! acceptable, torn values impossible (each cell is a single atomic).
//!
//! All score tables use the gravity update `h += bonus - h*|bonus|/MAX`,
//! which saturates smoothly inside the configured bounds, rewards
//! surprising bonuses, and lets stale entries decay on their own.

use std::sync::atomic::{AtomicI16, AtomicI32, AtomicU16, Ordering};

use crate::board::{Bitboard, Color, Move, Piece, Square};

/// Bound for quiet/capture/continuation history cells.
pub(crate) const HISTORY_MAX: i32 = 16_384;

/// Bound for correction-history cells.
pub(crate) const CORRECTION_MAX: i32 = 16_384;

/// Entries per correction table (Zobrist truncation).
const CORRECTION_SIZE: usize = 16_384;

/// Gravity update on a 16-bit cell.
fn gravity_i16(cell: &AtomicI16, bonus: i32) {
    let bonus = bonus.clamp(-HISTORY_MAX, HISTORY_MAX);
    let current = i32::from(cell.load(Ordering::Relaxed));
    let updated = current + bonus - current * bonus.abs() / HISTORY_MAX;
    cell.store(updated.clamp(-HISTORY_MAX, HISTORY_MAX) as i16, Ordering::Relaxed);
}

/// Gravity update on a 32-bit correction cell.
fn gravity_i32(cell: &AtomicI32, bonus: i32) {
    let bonus = bonus.clamp(-CORRECTION_MAX, CORRECTION_MAX);
    let current = cell.load(Ordering::Relaxed);
    let updated = current + bonus - current * bonus.abs() / CORRECTION_MAX;
    cell.store(updated.clamp(-CORRECTION_MAX, CORRECTION_MAX), Ordering::Relaxed);
}

fn atomic_i16_box(len: usize) -> Box<[AtomicI16]> {
    let mut v = Vec::with_capacity(len);
    v.resize_with(len, || AtomicI16::new(0));
    v.into_boxed_slice()
}

/// Quiet history indexed by side to move, threat status of the from and to
/// squares, and the from/to butterfly index.
pub struct QuietHistory {
    table: Box<[AtomicI16]>,
}

impl QuietHistory {
    const BUTTERFLY: usize = 64 * 64;

    fn new() -> QuietHistory {
        QuietHistory {
            table: atomic_i16_box(2 * 2 * 2 * Self::BUTTERFLY),
        }
    }

    fn index(stm: Color, threats: Bitboard, mv: Move) -> usize {
        let threat_from = usize::from(threats.contains(mv.from()));
        let threat_to = usize::from(threats.contains(mv.to()));
        (((stm.index() * 2 + threat_from) * 2 + threat_to) * Self::BUTTERFLY)
            + mv.from().as_index() * 64
            + mv.to().as_index()
    }

    #[must_use]
    pub fn score(&self, stm: Color, threats: Bitboard, mv: Move) -> i32 {
        i32::from(self.table[Self::index(stm, threats, mv)].load(Ordering::Relaxed))
    }

    pub fn update(&self, stm: Color, threats: Bitboard, mv: Move, bonus: i32) {
        gravity_i16(&self.table[Self::index(stm, threats, mv)], bonus);
    }
}

/// Capture history indexed by (moving kind, target square, captured kind).
pub struct CaptureHistory {
    table: Box<[AtomicI16]>,
}

impl CaptureHistory {
    fn new() -> CaptureHistory {
        CaptureHistory {
            table: atomic_i16_box(6 * 64 * 6),
        }
    }

    fn index(moving: Piece, to: Square, victim: Piece) -> usize {
        (moving.index() * 64 + to.as_index()) * 6 + victim.index()
    }

    #[must_use]
    pub fn score(&self, moving: Piece, to: Square, victim: Piece) -> i32 {
        i32::from(self.table[Self::index(moving, to, victim)].load(Ordering::Relaxed))
    }

    pub fn update(&self, moving: Piece, to: Square, victim: Piece, bonus: i32) {
        gravity_i16(&self.table[Self::index(moving, to, victim)], bonus);
    }
}

/// Continuation history: (previous colored piece, previous target) x
/// (current colored piece, current target). One instance exists per
/// history ply (1, 2, and 4 plies back).
pub struct ContinuationHistory {
    table: Box<[AtomicI16]>,
}

/// A (colored piece, target square) pair identifying one played move.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PieceTo {
    pub color: Color,
    pub piece: Piece,
    pub to: Square,
}

impl PieceTo {
    #[inline]
    fn index(self) -> usize {
        self.piece.colored_index(self.color) * 64 + self.to.as_index()
    }

    /// Zobrist truncation key for continuation correction history.
    #[inline]
    #[must_use]
    pub(crate) fn key(self) -> u64 {
        crate::board::zobrist_piece_key(self.color, self.piece, self.to)
    }
}

impl ContinuationHistory {
    const PIECE_TO: usize = 12 * 64;

    fn new() -> ContinuationHistory {
        ContinuationHistory {
            table: atomic_i16_box(Self::PIECE_TO * Self::PIECE_TO),
        }
    }

    fn index(prev: PieceTo, cur: PieceTo) -> usize {
        prev.index() * Self::PIECE_TO + cur.index()
    }

    #[must_use]
    pub fn score(&self, prev: PieceTo, cur: PieceTo) -> i32 {
        i32::from(self.table[Self::index(prev, cur)].load(Ordering::Relaxed))
    }

    pub fn update(&self, prev: PieceTo, cur: PieceTo, bonus: i32) {
        gravity_i16(&self.table[Self::index(prev, cur)], bonus);
    }
}

/// Counter moves: the quiet refutation of the opponent's last move.
pub struct CounterMoves {
    table: Box<[AtomicU16]>,
}

impl CounterMoves {
    fn new() -> CounterMoves {
        let mut v = Vec::with_capacity(12 * 64);
        v.resize_with(12 * 64, || AtomicU16::new(0));
        CounterMoves {
            table: v.into_boxed_slice(),
        }
    }

    #[must_use]
    pub fn get(&self, prev: PieceTo) -> Move {
        Move::from_u16(self.table[prev.index()].load(Ordering::Relaxed))
    }

    pub fn set(&self, prev: PieceTo, mv: Move) {
        self.table[prev.index()].store(mv.as_u16(), Ordering::Relaxed);
    }
}

/// One correction history: static-eval error keyed on a Zobrist subset.
pub struct CorrectionHistory {
    table: Box<[AtomicI32]>,
}

impl CorrectionHistory {
    fn new() -> CorrectionHistory {
        let mut v = Vec::with_capacity(CORRECTION_SIZE);
        v.resize_with(CORRECTION_SIZE, || AtomicI32::new(0));
        CorrectionHistory {
            table: v.into_boxed_slice(),
        }
    }

    #[inline]
    fn cell(&self, key: u64) -> &AtomicI32 {
        &self.table[(key as usize) & (CORRECTION_SIZE - 1)]
    }

    #[must_use]
    pub fn value(&self, key: u64) -> i32 {
        self.cell(key).load(Ordering::Relaxed)
    }

    /// Pull the entry towards the observed (score - static eval) gap,
    /// weighted by depth and clamped well inside the table bound.
    pub fn update(&self, key: u64, depth: i32, diff: i32) {
        let bonus = (diff * depth / 8).clamp(-CORRECTION_MAX / 4, CORRECTION_MAX / 4);
        gravity_i32(self.cell(key), bonus);
    }
}

/// Every shared heuristic table, bundled for `Arc` sharing by the workers.
/// Killers are deliberately absent: they are per-worker, ply-local state.
pub struct History {
    pub quiet: QuietHistory,
    pub capture: CaptureHistory,
    pub counter: CounterMoves,
    /// Indexed by history distance: `[0]` = 1 ply, `[1]` = 2 plies,
    /// `[2]` = 4 plies.
    pub continuation: [ContinuationHistory; 3],
    pub pawn_corr: CorrectionHistory,
    pub nonpawn_corr: [CorrectionHistory; 2],
    pub major_corr: CorrectionHistory,
    pub minor_corr: CorrectionHistory,
    pub cont_corr: [CorrectionHistory; 2],
}

impl History {
    #[must_use]
    pub fn new() -> History {
        History {
            quiet: QuietHistory::new(),
            capture: CaptureHistory::new(),
            counter: CounterMoves::new(),
            continuation: [
                ContinuationHistory::new(),
                ContinuationHistory::new(),
                ContinuationHistory::new(),
            ],
            pawn_corr: CorrectionHistory::new(),
            nonpawn_corr: [CorrectionHistory::new(), CorrectionHistory::new()],
            major_corr: CorrectionHistory::new(),
            minor_corr: CorrectionHistory::new(),
            cont_corr: [CorrectionHistory::new(), CorrectionHistory::new()],
        }
    }

    /// Forget everything (new game).
    pub fn clear(&self) {
        for cell in self.quiet.table.iter() {
            cell.store(0, Ordering::Relaxed);
        }
        for cell in self.capture.table.iter() {
            cell.store(0, Ordering::Relaxed);
        }
        for cell in self.counter.table.iter() {
            cell.store(0, Ordering::Relaxed);
        }
        for table in &self.continuation {
            for cell in table.table.iter() {
                cell.store(0, Ordering::Relaxed);
            }
        }
        for table in self.correction_tables() {
            for cell in table.table.iter() {
                cell.store(0, Ordering::Relaxed);
            }
        }
    }

    fn correction_tables(&self) -> impl Iterator<Item = &CorrectionHistory> {
        [
            &self.pawn_corr,
            &self.nonpawn_corr[0],
            &self.nonpawn_corr[1],
            &self.major_corr,
            &self.minor_corr,
            &self.cont_corr[0],
            &self.cont_corr[1],
        ]
        .into_iter()
    }
}

impl Default for History {
    fn default() -> Self {
        History::new()
    }
}
