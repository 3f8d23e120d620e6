//! Incremental accumulator stack.
//!
//! One accumulator pair (both perspectives) is kept per position on the
//! board's stack. Making a move updates the child's accumulator from its
//! parent with the minimal set of feature diffs: add-sub for quiet moves,
//! add-sub-sub for captures, add-add-sub-sub for castling.
//!
//! When the moving side's king crosses an input-bucket boundary or the
//! mirroring axis, that side's half is instead refreshed from a cached
//! accumulator kept per (bucket, mirror) pair. The cache entries are
//! themselves updated incrementally from the piece bitboards they last saw,
//! so a refresh costs only the diff, not a full rebuild.

use std::sync::Arc;

use crate::board::{Bitboard, Color, Move, Piece, Position, Square, Wing};

use super::{feature_index, king_bucket, simd, Align64, Network, HIDDEN_SIZE, INPUT_BUCKETS};

type Row = Align64<[i16; HIDDEN_SIZE]>;

/// One position's worth of accumulated hidden-layer sums.
#[derive(Clone)]
pub(crate) struct Accumulator {
    /// Indexed by perspective color.
    pub(crate) halves: [Row; 2],
}

/// A cached accumulator for one (perspective, bucket, mirror) slot,
/// together with the piece placement it currently reflects.
#[derive(Clone)]
struct CacheEntry {
    acc: Row,
    pieces: [[Bitboard; 6]; 2],
}

/// The evaluator state carried alongside a board: network handle,
/// accumulator stack, and refresh cache.
#[derive(Clone)]
pub struct EvalState {
    network: Arc<Network>,
    stack: Vec<Accumulator>,
    cache: Box<[[CacheEntry; INPUT_BUCKETS * 2]; 2]>,
}

/// Bucket and mirror flag of `king` as seen from `perspective`.
fn bucket_mirror(perspective: Color, king: Square) -> (usize, bool) {
    let ksq = match perspective {
        Color::White => king,
        Color::Black => king.flip_vertical(),
    };
    let mirror = ksq.file() >= 4;
    let folded = if mirror { ksq.flip_horizontal() } else { ksq };
    (king_bucket(folded.rank(), folded.file()), mirror)
}

impl EvalState {
    /// Build a fresh state whose single stack entry matches `pos`.
    #[must_use]
    pub fn new(network: Arc<Network>, pos: &Position) -> EvalState {
        let entry = CacheEntry {
            acc: network.feature_bias.clone(),
            pieces: [[Bitboard::empty(); 6]; 2],
        };
        let cache = Box::new([
            std::array::from_fn(|_| entry.clone()),
            std::array::from_fn(|_| entry.clone()),
        ]);
        let mut state = EvalState {
            network,
            stack: Vec::with_capacity(crate::board::MAX_PLY + 8),
            cache,
        };
        state.rebuild(pos);
        state
    }

    /// Reset the stack to a single from-scratch accumulator for `pos`.
    pub fn rebuild(&mut self, pos: &Position) {
        let acc = Accumulator {
            halves: [
                self.from_scratch(pos, Color::White),
                self.from_scratch(pos, Color::Black),
            ],
        };
        self.stack.clear();
        self.stack.push(acc);
    }

    /// Push the accumulator for `child`, which `mv` reached from `parent`.
    pub fn push(&mut self, parent: &Position, child: &Position, mv: Move) {
        let mover = parent.side_to_move();
        let mut acc = self
            .stack
            .last()
            .unwrap_or_else(|| unreachable!("empty accumulator stack"))
            .clone();

        for perspective in [Color::White, Color::Black] {
            let old_king = parent.king_square(perspective);
            let new_king = child.king_square(perspective);
            if perspective == mover
                && old_king != new_king
                && bucket_mirror(perspective, old_king) != bucket_mirror(perspective, new_king)
            {
                self.refresh_half(child, perspective, &mut acc);
            } else {
                self.apply_diffs(parent, child, mv, perspective, &mut acc);
            }
        }

        self.stack.push(acc);
    }

    /// Null moves change no features; the accumulator is duplicated so the
    /// stacks stay in lock-step with the position stack.
    pub fn push_null(&mut self) {
        let top = self
            .stack
            .last()
            .unwrap_or_else(|| unreachable!("empty accumulator stack"))
            .clone();
        self.stack.push(top);
    }

    pub fn pop(&mut self) {
        debug_assert!(self.stack.len() > 1, "popping the root accumulator");
        self.stack.pop();
    }

    /// Evaluate the top-of-stack accumulator for `pos` (which must be the
    /// position the stack top was built for).
    #[must_use]
    pub fn evaluate(&self, pos: &Position) -> i32 {
        let acc = self
            .stack
            .last()
            .unwrap_or_else(|| unreachable!("empty accumulator stack"));
        let us = pos.side_to_move().index();
        self.network
            .forward(&acc.halves[us], &acc.halves[1 - us], pos.piece_count())
    }

    fn apply_diffs(
        &self,
        parent: &Position,
        child: &Position,
        mv: Move,
        perspective: Color,
        acc: &mut Accumulator,
    ) {
        let net = &self.network;
        let us = parent.side_to_move();
        let king = child.king_square(perspective);
        let from = mv.from();
        let to = mv.to();
        let half = &mut acc.halves[perspective.index()];

        let index =
            |color: Color, piece: Piece, sq: Square| feature_index(perspective, king, color, piece, sq);

        if mv.is_castling() {
            let wing = if mv.is_castle_kingside() {
                Wing::King
            } else {
                Wing::Queen
            };
            let king_dest = Square::new(us.back_rank(), wing.king_file());
            let rook_dest = Square::new(us.back_rank(), wing.rook_file());
            simd::add_add_sub_sub(
                half,
                net.feature_row(index(us, Piece::King, king_dest)),
                net.feature_row(index(us, Piece::Rook, rook_dest)),
                net.feature_row(index(us, Piece::King, from)),
                net.feature_row(index(us, Piece::Rook, to)),
            );
            return;
        }

        let Some((_, moving)) = parent.piece_at(from) else {
            unreachable!("no piece on {from}");
        };
        let placed = mv.promotion_piece().unwrap_or(moving);

        if mv.is_capture() {
            let victim_sq = if mv.is_en_passant() {
                Square::new(from.rank(), to.file())
            } else {
                to
            };
            let victim = child.captured.unwrap_or(Piece::Pawn);
            simd::add_sub_sub(
                half,
                net.feature_row(index(us, placed, to)),
                net.feature_row(index(us, moving, from)),
                net.feature_row(index(us.opponent(), victim, victim_sq)),
            );
        } else {
            simd::add_sub(
                half,
                net.feature_row(index(us, placed, to)),
                net.feature_row(index(us, moving, from)),
            );
        }
    }

    /// Refresh one half from its (bucket, mirror) cache slot, updating the
    /// slot by the diff between the placement it saw last and `pos`.
    fn refresh_half(&mut self, pos: &Position, perspective: Color, acc: &mut Accumulator) {
        let network = Arc::clone(&self.network);
        let king = pos.king_square(perspective);
        let (bucket, mirror) = bucket_mirror(perspective, king);
        let entry =
            &mut self.cache[perspective.index()][bucket * 2 + usize::from(mirror)];

        for color in [Color::White, Color::Black] {
            for piece in crate::board::ALL_PIECES {
                let now = pos.pieces(color, piece);
                let before = entry.pieces[color.index()][piece.index()];
                for sq in now & !before {
                    simd::add(
                        &mut entry.acc,
                        network.feature_row(feature_index(perspective, king, color, piece, sq)),
                    );
                }
                for sq in before & !now {
                    simd::sub(
                        &mut entry.acc,
                        network.feature_row(feature_index(perspective, king, color, piece, sq)),
                    );
                }
                entry.pieces[color.index()][piece.index()] = now;
            }
        }

        acc.halves[perspective.index()] = entry.acc.clone();
    }

    /// Build one half directly from the position, bypassing the cache.
    fn from_scratch(&self, pos: &Position, perspective: Color) -> Row {
        let king = pos.king_square(perspective);
        let mut half = self.network.feature_bias.clone();
        for color in [Color::White, Color::Black] {
            for piece in crate::board::ALL_PIECES {
                for sq in pos.pieces(color, piece) {
                    simd::add(
                        &mut half,
                        self.network
                            .feature_row(feature_index(perspective, king, color, piece, sq)),
                    );
                }
            }
        }
        half
    }
}
