//! Episode outcome: what an environment reports once `done`.

use qplan_core::types::DoneReason;

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub plan: u64,
    pub planning_time: f64,
    pub querying_time: f64,
    pub total_time: f64,
    pub win: bool,
    pub reason: DoneReason,
    pub quality: f64,
}

/// `reward(β, budget, total_time, quality)`. A win always credits the full
/// time-based term (`β`) regardless of how close to the budget it landed —
/// see DESIGN.md for why this diverges from a naive linear read of the
/// formula. A non-win scales the time term by the (possibly negative)
/// budget surplus.
pub fn reward(beta: f64, budget: f64, total_time: f64, quality: f64, win: bool) -> f64 {
    let time_term = if win {
        1.0
    } else {
        (budget - total_time) / budget
    };
    beta * time_term + (1.0 - beta) * quality
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reward_lossless_win_is_one() {
        assert_eq!(reward(1.0, 1.0, 1.0, 1.0, true), 1.0);
    }

    #[test]
    fn reward_lossless_overrun_is_negative_deficit() {
        assert_eq!(reward(1.0, 1.0, 2.0, 1.0, false), -1.0);
    }

    #[test]
    fn reward_pure_quality_ignores_time() {
        assert_eq!(reward(0.0, 1.0, 0.3, 0.42, true), 0.42);
        assert_eq!(reward(0.0, 1.0, 5.0, 0.42, false), 0.42);
    }
}
