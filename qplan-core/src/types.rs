use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an immutable query record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QueryId(pub u64);

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A plan id in `0..=P`. `0` means "no hint".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlanId(pub u64);

/// A selectivity id, a non-empty bitmask over filter dimensions, `1..2^d-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SelId(pub u64);

/// A sampling plan id `k = hint_id * |R| + ratio_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SamplingPlanId(pub u64);

/// Sentinel wall-clock time (seconds) reported for a timed-out plan.
/// The adapter's configured database statement timeout, echoed back as the
/// observed time rather than a distinguished "infinity" value, per the
/// timeout-semantics note in the error handling design.
pub const TIMEOUT_SENTINEL: f64 = f64::MAX;

/// Why an MDP episode terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoneReason {
    /// `elapsed + predict_time(p) <= budget` on the committed action.
    Win,
    /// `elapsed >= budget` was reached before a win; fell back to the
    /// fastest plan tried so far.
    PlanningTooLong,
    /// No untried action remained; fell back to the fastest plan tried so
    /// far. A terminal outcome, not an error (spec error taxonomy:
    /// `NotPossible`).
    NotPossible,
    /// v2-only informational tag: the estimator predicted an overrun but
    /// the real time would have fit the budget. Does not change reward.
    TooPessimistic,
    /// v2-only informational tag: the estimator predicted a fit but the
    /// real time would have overrun. Does not change reward.
    TooOptimistic,
}

impl fmt::Display for DoneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DoneReason::Win => "win",
            DoneReason::PlanningTooLong => "planning_too_long",
            DoneReason::NotPossible => "not_possible",
            DoneReason::TooPessimistic => "too_pessimistic",
            DoneReason::TooOptimistic => "too_optimistic",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_id_equality() {
        assert_eq!(QueryId(7), QueryId(7));
        assert_ne!(QueryId(7), QueryId(8));
    }

    #[test]
    fn done_reason_display() {
        assert_eq!(DoneReason::Win.to_string(), "win");
        assert_eq!(DoneReason::NotPossible.to_string(), "not_possible");
    }
}
