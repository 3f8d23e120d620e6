//! Score constants and mate-score helpers.
//!
//! Scores are centipawns from the side to move's point of view. Mate
//! scores encode the distance from the root: a mate delivered at ply `p`
//! is worth `MATE - p`, so shorter mates always compare higher.

use crate::board::MAX_PLY;

/// Upper bound for the alpha-beta window.
pub const INFINITY: i32 = 32_000;

/// Score for delivering mate at the root.
pub const MATE: i32 = 31_000;

/// Lowest score that still encodes a mate (deepest representable mate).
pub const LONGEST_MATE: i32 = MATE - MAX_PLY as i32;

/// Static evaluations are clamped inside the non-mate range.
pub const MAX_EVAL: i32 = LONGEST_MATE - 1;

/// Being mated in `ply` plies.
#[inline]
#[must_use]
pub const fn mated_in(ply: usize) -> i32 {
    -MATE + ply as i32
}

/// Giving mate in `ply` plies.
#[inline]
#[must_use]
pub const fn mate_in(ply: usize) -> i32 {
    MATE - ply as i32
}

/// True when the score encodes a mate for either side.
#[inline]
#[must_use]
pub const fn is_mate(score: i32) -> bool {
    score.abs() >= LONGEST_MATE
}

/// Signed full-move mate distance for reporting (`mate N` / `mate -N`).
#[inline]
#[must_use]
pub const fn mate_fullmoves(score: i32) -> i32 {
    if score > 0 {
        (MATE - score + 1) / 2
    } else {
        -(MATE + score + 1) / 2
    }
}

/// Draw score with a tiny node-keyed jitter to steer the search away from
/// blind repetition shuffles.
#[inline]
#[must_use]
pub const fn draw_score(nodes: u64) -> i32 {
    2 - (nodes as i32 & 3)
}
