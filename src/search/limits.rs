//! Search limiter.
//!
//! A search runs under a composite of typed limits: depth, node counts
//! (soft and hard), and wall-clock time (soft and hard, derived from the
//! clock or an explicit movetime). Hard bounds are polled inside the tree
//! (amortized by the caller to every 1024 nodes); soft bounds apply only
//! between iterative-deepening iterations.
//!
//! The time soft bound is rescaled once per completed iteration by how
//! dominant the best root move was in the node count: a forced move gets
//! its time cut, an unstable root keeps thinking.

use std::sync::Arc;

use crate::board::MAX_PLY;

use super::{SearchParams, SearchState};

/// User-facing limit kinds accepted by the search manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LimitKind {
    /// Stop after completing this many plies of iterative deepening.
    Depth(usize),
    /// Node budget: soft is consulted between iterations, hard in-tree.
    Nodes { soft: u64, hard: u64 },
    /// Clock time: remaining and increment, minus a communication overhead.
    Time {
        remaining_ms: u64,
        increment_ms: u64,
        overhead_ms: u64,
    },
    /// Exact time for this move.
    MoveTime { ms: u64, overhead_ms: u64 },
    /// Search until told to stop.
    Infinite,
}

/// An activated limit.
#[derive(Clone, Copy, Debug)]
enum Limit {
    Depth(usize),
    Nodes { soft: u64, hard: u64 },
    Time { base_soft_ms: u64, soft_ms: u64, hard_ms: u64 },
    Infinite,
}

/// The composite limiter handed to each worker.
#[derive(Clone)]
pub struct SearchLimiter {
    limits: Vec<Limit>,
    state: Arc<SearchState>,
}

impl SearchLimiter {
    /// Activate a set of limit kinds. Time kinds are converted to concrete
    /// soft/hard deadlines here; an empty set means infinite.
    #[must_use]
    pub fn new(kinds: &[LimitKind], state: Arc<SearchState>) -> SearchLimiter {
        let mut limits: Vec<Limit> = kinds.iter().map(|&kind| activate(kind)).collect();
        if limits.is_empty() {
            limits.push(Limit::Infinite);
        }
        SearchLimiter { limits, state }
    }

    /// Highest depth this search may iterate to.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.limits
            .iter()
            .filter_map(|limit| match limit {
                Limit::Depth(d) => Some(*d),
                _ => None,
            })
            .min()
            .unwrap_or(MAX_PLY - 1)
            .clamp(1, MAX_PLY - 1)
    }

    /// True once any applicable bound is hit. `in_tree` restricts the test
    /// to hard bounds; between iterations the soft bounds count too.
    /// While pondering, clock limits are suspended entirely.
    #[must_use]
    pub fn expired(&self, nodes: u64, in_tree: bool) -> bool {
        let pondering = self.state.is_pondering();
        let mut elapsed = None;

        for limit in &self.limits {
            match *limit {
                Limit::Depth(_) | Limit::Infinite => {}
                Limit::Nodes { soft, hard } => {
                    if nodes >= hard || (!in_tree && nodes >= soft) {
                        return true;
                    }
                }
                Limit::Time {
                    soft_ms, hard_ms, ..
                } => {
                    if pondering {
                        continue;
                    }
                    let now = *elapsed.get_or_insert_with(|| self.state.elapsed_ms());
                    if now >= hard_ms || (!in_tree && now >= soft_ms) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Rescale the time soft bound from the share of root nodes spent on
    /// the best move: `soft' = base * (tm_base - frac * tm_scale) / 100`,
    /// clamped to the hard bound. Only active from `node_tm_depth` on.
    pub fn scale_soft_bound(
        &mut self,
        params: &SearchParams,
        depth: usize,
        best_move_frac: f64,
    ) {
        if depth < params.node_tm_depth as usize {
            return;
        }
        let factor = f64::from(params.node_tm_base) / 100.0
            - best_move_frac * f64::from(params.node_tm_scale) / 100.0;

        for limit in &mut self.limits {
            if let Limit::Time {
                base_soft_ms,
                soft_ms,
                hard_ms,
            } = limit
            {
                let scaled = (*base_soft_ms as f64 * factor).max(0.0) as u64;
                *soft_ms = scaled.min(*hard_ms);
            }
        }
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.state.elapsed_ms()
    }
}

fn activate(kind: LimitKind) -> Limit {
    match kind {
        LimitKind::Depth(d) => Limit::Depth(d),
        LimitKind::Nodes { soft, hard } => Limit::Nodes {
            soft: soft.min(hard),
            hard,
        },
        LimitKind::Infinite => Limit::Infinite,
        LimitKind::MoveTime { ms, overhead_ms } => {
            let budget = ms.saturating_sub(overhead_ms).max(1);
            Limit::Time {
                base_soft_ms: budget,
                soft_ms: budget,
                hard_ms: budget,
            }
        }
        LimitKind::Time {
            remaining_ms,
            increment_ms,
            overhead_ms,
        } => {
            let safe = remaining_ms.saturating_sub(overhead_ms).max(1);
            // A twentieth of the clock plus most of the increment, with
            // the hard bound far enough out to finish a critical iteration
            let soft = (safe / 20 + increment_ms * 3 / 4).clamp(1, (safe * 7 / 10).max(1));
            let hard = (safe / 4 + increment_ms).clamp(soft, safe);
            Limit::Time {
                base_soft_ms: soft,
                soft_ms: soft,
                hard_ms: hard,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> Arc<SearchState> {
        Arc::new(SearchState::new())
    }

    #[test]
    fn empty_set_is_infinite() {
        let limiter = SearchLimiter::new(&[], state());
        assert!(!limiter.expired(u64::MAX, true));
        assert!(!limiter.expired(u64::MAX, false));
        assert_eq!(limiter.max_depth(), MAX_PLY - 1);
    }

    #[test]
    fn depth_limit_caps_iterations() {
        let limiter = SearchLimiter::new(&[LimitKind::Depth(9)], state());
        assert_eq!(limiter.max_depth(), 9);
        assert!(!limiter.expired(1 << 40, true));
    }

    #[test]
    fn node_limits_split_soft_and_hard() {
        let limiter = SearchLimiter::new(
            &[LimitKind::Nodes {
                soft: 1000,
                hard: 5000,
            }],
            state(),
        );
        assert!(!limiter.expired(999, true));
        assert!(!limiter.expired(2000, true));
        assert!(limiter.expired(2000, false));
        assert!(limiter.expired(5000, true));
    }

    #[test]
    fn movetime_subtracts_overhead() {
        let st = state();
        st.set_start_now();
        let limiter = SearchLimiter::new(
            &[LimitKind::MoveTime {
                ms: 10_000,
                overhead_ms: 50,
            }],
            st,
        );
        // Fresh clock: nowhere near 9950ms yet
        assert!(!limiter.expired(0, false));
    }

    #[test]
    fn pondering_suspends_the_clock() {
        let st = state();
        st.set_start_now();
        st.set_pondering(true);
        let limiter = SearchLimiter::new(
            &[LimitKind::MoveTime {
                ms: 0,
                overhead_ms: 0,
            }],
            Arc::clone(&st),
        );
        // A 1ms budget would expire instantly, but the clock is suspended
        std::thread::sleep(std::time::Duration::from_millis(3));
        assert!(!limiter.expired(0, false));
        st.set_pondering(false);
        assert!(limiter.expired(0, false));
    }

    #[test]
    fn soft_bound_scaling_matches_formula() {
        let st = state();
        let mut limiter = SearchLimiter::new(
            &[LimitKind::MoveTime {
                ms: 1000,
                overhead_ms: 0,
            }],
            st,
        );
        let params = SearchParams::default();

        // A completely dominant best move shrinks the soft bound
        limiter.scale_soft_bound(&params, 20, 0.95);
        let Limit::Time {
            base_soft_ms,
            soft_ms,
            hard_ms,
        } = limiter.limits[0]
        else {
            panic!("expected a time limit");
        };
        let factor = f64::from(params.node_tm_base) / 100.0
            - 0.95 * f64::from(params.node_tm_scale) / 100.0;
        let expected = ((base_soft_ms as f64 * factor).max(0.0) as u64).min(hard_ms);
        assert_eq!(soft_ms, expected);
        assert!(soft_ms < base_soft_ms);

        // Below the depth threshold nothing moves
        let mut limiter2 = SearchLimiter::new(
            &[LimitKind::MoveTime {
                ms: 1000,
                overhead_ms: 0,
            }],
            state(),
        );
        limiter2.scale_soft_bound(&params, 1, 0.95);
        let Limit::Time { soft_ms, .. } = limiter2.limits[0] else {
            panic!("expected a time limit");
        };
        assert_eq!(soft_ms, 1000);
    }

    #[test]
    fn clock_limits_expire() {
        let st = state();
        st.set_start_now();
        let limiter = SearchLimiter::new(
            &[LimitKind::MoveTime {
                ms: 1,
                overhead_ms: 0,
            }],
            st,
        );
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(limiter.expired(0, true));
    }
}
