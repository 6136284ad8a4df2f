//! Persisted-artefact row shapes. These are the CSV
//! (de)serialization contracts shared by the dataset adapter, the
//! estimator, the trainer and the evaluator.

use crate::types::QueryId;
use serde::{Deserialize, Serialize};

/// Immutable after load. `predicates` is the dataset-specific predicate
/// tuple, left opaque here (the `DatasetAdapter` interprets it); only the
/// identity is a crate-level concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: QueryId,
    /// Dataset-specific predicate tuple, column order fixed per dataset.
    pub predicates: Vec<f64>,
}

/// A query record with observed time for every lossless plan
/// `p in 0..=P-1`; `time_0` is the unhinted baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledQuery {
    pub id: QueryId,
    pub times: Vec<f64>,
}

impl LabeledQuery {
    pub fn time_of(&self, plan: u64) -> crate::Result<f64> {
        self.times
            .get(plan as usize)
            .copied()
            .ok_or(crate::Error::InvalidPlan {
                plan,
                max: self.times.len().saturating_sub(1) as u64,
            })
    }
}

/// Extra `time_Xk` for every sampling plan `k in 0..d*|R|`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSampleQuery {
    pub id: QueryId,
    pub sample_times: Vec<f64>,
}

/// Set-similarity quality in `[0,1]` per sampling plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleQueryQuality {
    pub id: QueryId,
    pub qualities: Vec<f64>,
}

/// Selectivity vector `sel_f` for `f in 1..2^d-1`, indexed `sel[0] == sel_1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectivityVector {
    pub id: QueryId,
    pub sel: Vec<f64>,
}

/// Observed probe time per selectivity id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSelQuery {
    pub id: QueryId,
    pub sel_times: Vec<f64>,
}

/// One row of the evaluator's output file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedRecord {
    pub id: QueryId,
    pub planning_time: f64,
    pub querying_time: f64,
    pub total_time: f64,
    /// `1` win, `0` loss, `-1` reserved for adapter-level failure.
    pub win: i8,
    /// `_`-joined plan ids tried, in order; composed records additionally
    /// contain a literal `_X_` separator between the lossless and lossy legs.
    pub plans_tried: String,
    pub reason: String,
    pub quality: Option<f64>,
}

impl EvaluatedRecord {
    pub fn plans_tried_list(&self) -> Vec<&str> {
        self.plans_tried.split('_').collect()
    }
}

/// One row of the training trace (`iteration,win_rate`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainTraceRow {
    pub iteration: usize,
    pub win_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_of_in_range() {
        let lq = LabeledQuery {
            id: QueryId(1),
            times: vec![2.0, 0.8, 1.5],
        };
        assert_eq!(lq.time_of(1).unwrap(), 0.8);
    }

    #[test]
    fn time_of_out_of_range_is_invalid_plan() {
        let lq = LabeledQuery {
            id: QueryId(1),
            times: vec![2.0, 0.8],
        };
        assert!(matches!(
            lq.time_of(5),
            Err(crate::Error::InvalidPlan { plan: 5, .. })
        ));
    }

    #[test]
    fn plans_tried_list_splits_on_underscore() {
        let rec = EvaluatedRecord {
            id: QueryId(1),
            planning_time: 0.1,
            querying_time: 0.2,
            total_time: 0.3,
            win: 1,
            plans_tried: "4_1_5".to_string(),
            reason: "win".to_string(),
            quality: Some(1.0),
        };
        assert_eq!(rec.plans_tried_list(), vec!["4", "1", "5"]);
    }
}
