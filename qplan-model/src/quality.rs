//! Sample query quality: Jaccard set-similarity between a sampling plan's
//! materialized result and the canonical (lossless) result of the same
//! query.

use crate::adapter::{QueryResult, ResultRow};
use std::collections::HashSet;

/// Jaccard similarity `|A ∩ B| / |A ∪ B|` between two result sets, in
/// `[0, 1]`. A timed-out sampling query has quality `0.0`; two empty
/// canonical results are trivially similar (`1.0`), matching the
/// convention that "nothing to find, nothing missed".
pub fn jaccard_quality(sample: &QueryResult, canonical: &[ResultRow]) -> f64 {
    let sample_rows = match sample {
        QueryResult::Timeout => return 0.0,
        QueryResult::Rows(rows) => rows,
    };
    let a: HashSet<&ResultRow> = sample_rows.iter().collect();
    let b: HashSet<&ResultRow> = canonical.iter().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(v: &[&str]) -> ResultRow {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn identical_sets_have_quality_one() {
        let canonical = vec![row(&["1", "2"]), row(&["3", "4"])];
        let sample = QueryResult::Rows(canonical.clone());
        assert_eq!(jaccard_quality(&sample, &canonical), 1.0);
    }

    #[test]
    fn disjoint_sets_have_quality_zero() {
        let canonical = vec![row(&["1", "2"])];
        let sample = QueryResult::Rows(vec![row(&["9", "9"])]);
        assert_eq!(jaccard_quality(&sample, &canonical), 0.0);
    }

    #[test]
    fn partial_overlap_is_between_zero_and_one() {
        let canonical = vec![row(&["1"]), row(&["2"]), row(&["3"])];
        let sample = QueryResult::Rows(vec![row(&["1"]), row(&["2"]), row(&["4"])]);
        // intersection {1,2} = 2, union {1,2,3,4} = 4 -> 0.5
        assert_eq!(jaccard_quality(&sample, &canonical), 0.5);
    }

    #[test]
    fn timeout_has_quality_zero() {
        let canonical = vec![row(&["1"])];
        assert_eq!(jaccard_quality(&QueryResult::Timeout, &canonical), 0.0);
    }

    #[test]
    fn two_empty_sets_are_trivially_similar() {
        assert_eq!(jaccard_quality(&QueryResult::Rows(Vec::new()), &[]), 1.0);
    }
}
