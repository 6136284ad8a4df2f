//! Two-stage lossless→lossy composition: combine an evaluated
//! lossless run and an evaluated lossy (sampling) run, keyed by query id,
//! into one final evaluated set.

use qplan_core::records::EvaluatedRecord;
use qplan_core::types::QueryId;
use std::collections::HashMap;

/// If the lossless record already won, keep it (quality forced to `1.0`).
/// Else, if the lossless record's reason is `not_possible`, try spending
/// the lossy leg's planning *and* querying time on top of the lossless
/// leg's (wasted) planning time; adopt the lossy outcome when that fits
/// the budget, joining `plans_tried` with a literal `_X_` separator and
/// carrying the lossy reason and quality. Otherwise the lossless record
/// stands as-is.
pub fn compose_two_stage(
    lossless: &[EvaluatedRecord],
    lossy: &[EvaluatedRecord],
    budget: f64,
) -> Vec<EvaluatedRecord> {
    let lossy_by_id: HashMap<QueryId, &EvaluatedRecord> =
        lossy.iter().map(|r| (r.id, r)).collect();

    lossless
        .iter()
        .map(|ll| {
            if ll.win == 1 {
                let mut rec = ll.clone();
                rec.quality = Some(1.0);
                return rec;
            }
            if ll.reason == "not_possible" {
                if let Some(lossy_rec) = lossy_by_id.get(&ll.id) {
                    let planning_time = ll.planning_time + lossy_rec.planning_time;
                    let total_time = planning_time + lossy_rec.querying_time;
                    if total_time <= budget {
                        return EvaluatedRecord {
                            id: ll.id,
                            planning_time,
                            querying_time: lossy_rec.querying_time,
                            total_time,
                            win: 1,
                            plans_tried: format!("{}_X_{}", ll.plans_tried, lossy_rec.plans_tried),
                            reason: lossy_rec.reason.clone(),
                            quality: lossy_rec.quality,
                        };
                    }
                }
            }
            ll.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_lossless_win_as_is() {
        let lossless = vec![EvaluatedRecord {
            id: QueryId(1),
            planning_time: 0.1,
            querying_time: 0.2,
            total_time: 0.3,
            win: 1,
            plans_tried: "5".to_string(),
            reason: "win".to_string(),
            quality: None,
        }];
        let composed = compose_two_stage(&lossless, &[], 1.0);
        assert_eq!(composed[0].win, 1);
        assert_eq!(composed[0].quality, Some(1.0));
    }

    #[test]
    fn scenario_two_stage_composition() {
        let lossless = vec![EvaluatedRecord {
            id: QueryId(1),
            planning_time: 0.3,
            querying_time: 0.0,
            total_time: 0.3,
            win: 0,
            plans_tried: "1_2_3".to_string(),
            reason: "not_possible".to_string(),
            quality: None,
        }];
        let lossy = vec![EvaluatedRecord {
            id: QueryId(1),
            planning_time: 0.2,
            querying_time: 0.4,
            total_time: 0.6,
            win: 1,
            plans_tried: "X2".to_string(),
            reason: "win".to_string(),
            quality: Some(0.8),
        }];
        let composed = compose_two_stage(&lossless, &lossy, 1.0);
        let rec = &composed[0];
        assert_eq!(rec.win, 1);
        assert!((rec.planning_time - 0.5).abs() < 1e-9);
        assert!((rec.querying_time - 0.4).abs() < 1e-9);
        assert!((rec.total_time - 0.9).abs() < 1e-9);
        assert!(rec.plans_tried.contains("_X_"));
        assert_eq!(rec.quality, Some(0.8));
    }

    #[test]
    fn leaves_not_possible_as_is_when_composition_still_overruns() {
        let lossless = vec![EvaluatedRecord {
            id: QueryId(1),
            planning_time: 0.9,
            querying_time: 0.0,
            total_time: 0.9,
            win: 0,
            plans_tried: "1".to_string(),
            reason: "not_possible".to_string(),
            quality: None,
        }];
        let lossy = vec![EvaluatedRecord {
            id: QueryId(1),
            planning_time: 0.2,
            querying_time: 0.4,
            total_time: 0.6,
            win: 1,
            plans_tried: "X2".to_string(),
            reason: "win".to_string(),
            quality: Some(0.8),
        }];
        let composed = compose_two_stage(&lossless, &lossy, 1.0);
        assert_eq!(composed[0].win, 0);
    }
}
