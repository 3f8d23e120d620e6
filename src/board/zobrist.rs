//! Zobrist hashing for positions.
//!
//! Provides the incrementally-updatable 64-bit keys used by the
//! transposition table and the correction histories. Besides the main key,
//! positions maintain pawn-only, per-color non-pawn, major-piece, and
//! minor-piece sub-keys built from the same table.

use rand::prelude::*;
use std::sync::LazyLock;

pub(crate) struct ZobristKeys {
    // piece_keys[color][piece][square]
    pub(crate) piece_keys: [[[u64; 64]; 6]; 2],
    pub(crate) side_to_move_key: u64,
    // One key per 4-bit castling availability mask (WK, WQ, BK, BQ).
    pub(crate) castling_keys: [u64; 16],
    // Only the file of the en passant target matters.
    pub(crate) en_passant_keys: [u64; 8],
}

impl ZobristKeys {
    fn new() -> Self {
        // Fixed seed so hashes are reproducible across runs
        let mut rng = StdRng::seed_from_u64(0x6D69_6D69_7230_3031);
        let mut piece_keys = [[[0u64; 64]; 6]; 2];
        let mut castling_keys = [0u64; 16];
        let mut en_passant_keys = [0u64; 8];

        for color in &mut piece_keys {
            for piece in color.iter_mut() {
                for key in piece.iter_mut() {
                    *key = rng.gen();
                }
            }
        }

        let side_to_move_key = rng.gen();

        // Mask 0 (no rights) hashes to zero so an empty-rights position
        // needs no castling term at all.
        for key in castling_keys.iter_mut().skip(1) {
            *key = rng.gen();
        }

        for key in &mut en_passant_keys {
            *key = rng.gen();
        }

        ZobristKeys {
            piece_keys,
            side_to_move_key,
            castling_keys,
            en_passant_keys,
        }
    }
}

pub(crate) static ZOBRIST: LazyLock<ZobristKeys> = LazyLock::new(ZobristKeys::new);

/// The raw piece-square key, exposed for correction-history truncations.
#[inline]
pub(crate) fn piece_key(
    color: crate::board::Color,
    piece: crate::board::Piece,
    sq: crate::board::Square,
) -> u64 {
    ZOBRIST.piece_keys[color.index()][piece.index()][sq.as_index()]
}
