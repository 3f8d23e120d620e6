//! Mimir - a chess engine core.
//!
//! Board representation with strictly legal move generation (Chess960
//! included), a lazy-SMP PVS searcher with the customary heuristic stack,
//! an incrementally updated NNUE evaluator, and a composite search
//! limiter. Protocol handling is left to the caller: drive
//! [`search::SearchManager`] and render the returned lines.

pub mod board;
pub mod history;
pub mod nnue;
pub mod score;
pub mod search;
pub mod tt;
