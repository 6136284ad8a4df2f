//! One sample size's ground truth for v1/v2: the selectivity vector the
//! estimator reads its features from, and the real probe times paid while
//! gathering it, both measured against that sample rather than the base
//! table.
//!
//! A `sample_pointer` selects among several configured sample sizes;
//! `SampleLevel` is the per-size selectivity/probe-time table that pointer
//! indexes into (one instance per configured sample size).

use qplan_core::types::QueryId;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct SampleLevel {
    pub size: u64,
    /// `sel_vectors[query][sel_id - 1]`, the selectivity estimate at this
    /// sample size, indexed the same way as `qplan_core::records::SelectivityVector`.
    sel_vectors: HashMap<QueryId, Vec<f64>>,
    /// `sel_times[query][sel_id - 1]`, wall-clock cost of having probed
    /// that selectivity at this sample size.
    sel_times: HashMap<QueryId, Vec<f64>>,
}

impl SampleLevel {
    pub fn new(
        size: u64,
        sel_vectors: HashMap<QueryId, Vec<f64>>,
        sel_times: HashMap<QueryId, Vec<f64>>,
    ) -> Self {
        Self {
            size,
            sel_vectors,
            sel_times,
        }
    }

    pub fn sel_vector(&self, query: QueryId) -> Option<&Vec<f64>> {
        self.sel_vectors.get(&query)
    }

    pub fn sel_cost(&self, query: QueryId, sel_id: u64) -> f64 {
        self.sel_times
            .get(&query)
            .and_then(|row| row.get((sel_id - 1) as usize))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn has_query(&self, query: QueryId) -> bool {
        self.sel_vectors.contains_key(&query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_by_query_and_sel_id() {
        let mut vecs = HashMap::new();
        vecs.insert(QueryId(1), vec![0.1, 0.2, 0.3]);
        let mut times = HashMap::new();
        times.insert(QueryId(1), vec![0.01, 0.02, 0.03]);
        let level = SampleLevel::new(100, vecs, times);
        assert_eq!(level.sel_vector(QueryId(1)).unwrap(), &vec![0.1, 0.2, 0.3]);
        assert_eq!(level.sel_cost(QueryId(1), 2), 0.02);
        assert!(level.has_query(QueryId(1)));
        assert!(!level.has_query(QueryId(2)));
    }
}
