//! v-plus — lossless ∪ sampling. Action space has `P + d*|R|` members:
//! actions `1..=P` commit a lossless plan (ground truth from
//! `LabeledQuery`, quality always `1.0`); actions `P+1..=P+d*|R|` commit a
//! sampling plan `k = action - P - 1` (ground truth from
//! `LabeledSampleQuery`, quality from `SampleQueryQuality`). Probing
//! still costs `unit_cost` per newly-needed selectivity id, shared across
//! both kinds of action through one `known_sels` set.

use crate::environment::Environment;
use crate::outcome::{reward, Outcome};
use crate::state::EnvState;
use qplan_core::records::{LabeledQuery, LabeledSampleQuery, SampleQueryQuality};
use qplan_core::types::{DoneReason, QueryId};
use qplan_core::{Error, Result};
use qplan_model::plan_algebra::{
    num_lossless_plans, num_sampling_plans, sel_ids_of_plan, sel_ids_of_sampling_plan,
};
use std::collections::{HashMap, HashSet};

struct QueryGroundTruth {
    lossless: LabeledQuery,
    sampling: LabeledSampleQuery,
    quality: SampleQueryQuality,
}

pub struct CombinedEnv {
    d: u32,
    j: u64,
    num_ratios: usize,
    budget: f64,
    unit_cost: f64,
    beta: f64,
    num_lossless: u64,
    num_sampling: u64,
    total: u64,
    queries: HashMap<QueryId, QueryGroundTruth>,

    current: Option<QueryId>,
    known_sels: HashSet<u64>,
    tried_plans: Vec<u64>,
    tried_times: Vec<f64>,
    tried_qualities: Vec<f64>,
    elapsed_time: f64,
    done: Option<Outcome>,
}

impl CombinedEnv {
    pub fn new(
        d: u32,
        j: u64,
        num_ratios: usize,
        budget: f64,
        unit_cost: f64,
        beta: f64,
        lossless: Vec<LabeledQuery>,
        sampling: Vec<LabeledSampleQuery>,
        quality: Vec<SampleQueryQuality>,
    ) -> Result<Self> {
        let num_lossless = num_lossless_plans(d, j);
        let num_sampling = num_sampling_plans(d, num_ratios);
        let mut sampling_map: HashMap<QueryId, LabeledSampleQuery> =
            sampling.into_iter().map(|s| (s.id, s)).collect();
        let mut quality_map: HashMap<QueryId, SampleQueryQuality> =
            quality.into_iter().map(|q| (q.id, q)).collect();

        let mut queries = HashMap::new();
        for lq in lossless {
            let id = lq.id;
            let sampling = sampling_map.remove(&id).ok_or_else(|| {
                Error::SchemaMismatch(format!("no sampling labels for query {id}"))
            })?;
            let quality = quality_map.remove(&id).ok_or_else(|| {
                Error::SchemaMismatch(format!("no sample quality for query {id}"))
            })?;
            queries.insert(
                id,
                QueryGroundTruth {
                    lossless: lq,
                    sampling,
                    quality,
                },
            );
        }

        Ok(Self {
            d,
            j,
            num_ratios,
            budget,
            unit_cost,
            beta,
            num_lossless,
            num_sampling,
            total: num_lossless + num_sampling,
            queries,
            current: None,
            known_sels: HashSet::new(),
            tried_plans: Vec::new(),
            tried_times: Vec::new(),
            tried_qualities: Vec::new(),
            elapsed_time: 0.0,
            done: None,
        })
    }

    fn current_truth(&self) -> Result<&QueryGroundTruth> {
        let id = self
            .current
            .ok_or_else(|| Error::Configuration("no active episode; call reset first".into()))?;
        self.queries
            .get(&id)
            .ok_or_else(|| Error::IoMissing(format!("no label for query {id}")))
    }

    fn is_sampling_action(&self, action: u64) -> bool {
        action > self.num_lossless
    }

    fn sampling_plan_id(&self, action: u64) -> u64 {
        action - self.num_lossless - 1
    }

    fn sel_ids_for(&self, action: u64) -> Result<Vec<u64>> {
        if self.is_sampling_action(action) {
            let k = self.sampling_plan_id(action);
            sel_ids_of_sampling_plan(k, self.d, self.num_ratios).map(|id| vec![id.0])
        } else {
            Ok(sel_ids_of_plan(action, self.d, self.j)?
                .into_iter()
                .map(|id| id.0)
                .collect())
        }
    }

    /// `(time, quality)` for committing `action` against ground truth.
    fn outcome_for(&self, action: u64) -> Result<(f64, f64)> {
        let truth = self.current_truth()?;
        if self.is_sampling_action(action) {
            let k = self.sampling_plan_id(action) as usize;
            let time = *truth
                .sampling
                .sample_times
                .get(k)
                .ok_or_else(|| Error::InvalidPlan { plan: action, max: self.total.saturating_sub(1) })?;
            let quality = *truth
                .quality
                .qualities
                .get(k)
                .ok_or_else(|| Error::InvalidPlan { plan: action, max: self.total.saturating_sub(1) })?;
            Ok((time, quality))
        } else {
            Ok((truth.lossless.time_of(action)?, 1.0))
        }
    }

    fn fallback(&mut self, reason: DoneReason) -> f64 {
        let fastest_idx = self
            .tried_times
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .expect("fallback requires at least one tried plan");
        let plan = self.tried_plans[fastest_idx];
        let querying_time = self.tried_times[fastest_idx];
        let quality = self.tried_qualities[fastest_idx];
        let total_time = self.elapsed_time + querying_time;
        let win = total_time <= self.budget;
        let r = reward(self.beta, self.budget, total_time, quality, win);
        self.done = Some(Outcome {
            plan,
            planning_time: self.elapsed_time,
            querying_time,
            total_time,
            win,
            reason,
            quality,
        });
        r
    }
}

impl Environment for CombinedEnv {
    fn reset(&mut self, query: QueryId) -> Result<()> {
        if !self.queries.contains_key(&query) {
            return Err(Error::IoMissing(format!("no label for query {query}")));
        }
        self.current = Some(query);
        self.known_sels.clear();
        self.tried_plans.clear();
        self.tried_times.clear();
        self.tried_qualities.clear();
        self.elapsed_time = 0.0;
        self.done = None;
        Ok(())
    }

    fn num_plans(&self) -> usize {
        self.total as usize
    }

    fn num_actions_available(&self) -> usize {
        self.total as usize - self.tried_plans.len()
    }

    fn state(&self) -> EnvState {
        let mut s = EnvState::new(self.total as usize);
        if let Ok(truth) = self.current_truth() {
            for action in 1..=self.total {
                let idx = (action - 1) as usize;
                let unknown = self
                    .sel_ids_for(action)
                    .map(|ids| ids.iter().filter(|id| !self.known_sels.contains(id)).count())
                    .unwrap_or(0);
                s.first[idx] = unknown as f64;
                s.second[idx] = if self.is_sampling_action(action) {
                    let k = self.sampling_plan_id(action) as usize;
                    truth.sampling.sample_times.get(k).copied().unwrap_or(0.0)
                } else {
                    truth.lossless.time_of(action).unwrap_or(0.0)
                };
            }
        }
        s.elapsed_time = self.elapsed_time;
        s
    }

    fn take_action(&mut self, action: u64) -> Result<f64> {
        if self.done.is_some() {
            return Ok(0.0);
        }
        // `action` is the abstract 0-indexed id the agent/Q-network use
        // (`0..total`); the internal 1-indexed domain (lossless plans
        // `1..=num_lossless`, sampling plans `num_lossless+1..=total`)
        // is `plan = action + 1`.
        if action >= self.total {
            return Err(Error::InvalidPlan { plan: action, max: self.total.saturating_sub(1) });
        }
        let plan = action + 1;
        let sel_ids = self.sel_ids_for(plan)?;
        let needed = sel_ids.iter().filter(|id| !self.known_sels.contains(id)).count();
        self.elapsed_time += self.unit_cost * needed as f64;
        for id in sel_ids {
            self.known_sels.insert(id);
        }

        let (time, quality) = self.outcome_for(plan)?;
        self.tried_plans.push(plan);
        self.tried_times.push(time);
        self.tried_qualities.push(quality);

        let total_time = self.elapsed_time + time;
        if total_time <= self.budget {
            let r = reward(self.beta, self.budget, total_time, quality, true);
            self.done = Some(Outcome {
                plan,
                planning_time: self.elapsed_time,
                querying_time: time,
                total_time,
                win: true,
                reason: DoneReason::Win,
                quality,
            });
            return Ok(r);
        }
        if self.elapsed_time >= self.budget {
            return Ok(self.fallback(DoneReason::PlanningTooLong));
        }
        if self.num_actions_available() == 0 {
            return Ok(self.fallback(DoneReason::NotPossible));
        }
        Ok(0.0)
    }

    fn done(&self) -> Option<&Outcome> {
        self.done.as_ref()
    }

    fn tried_plans(&self) -> &[u64] {
        &self.tried_plans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> CombinedEnv {
        // d=2, j=1 -> 3 lossless plans; |R|=2 -> 4 sampling plans. total=7.
        let lossless = vec![LabeledQuery {
            id: QueryId(1),
            times: vec![2.0, 1.5, 1.2, 0.9],
        }];
        let sampling = vec![LabeledSampleQuery {
            id: QueryId(1),
            sample_times: vec![0.1, 0.2, 0.15, 0.3],
        }];
        let quality = vec![SampleQueryQuality {
            id: QueryId(1),
            qualities: vec![0.4, 0.9, 0.6, 0.95],
        }];
        CombinedEnv::new(2, 1, 2, 1.0, 0.0, 0.5, lossless, sampling, quality).unwrap()
    }

    #[test]
    fn sampling_action_mapped_past_lossless_range() {
        let e = env();
        assert_eq!(e.num_plans(), 3 + 4);
        assert!(e.is_sampling_action(4));
        assert!(!e.is_sampling_action(3));
        assert_eq!(e.sampling_plan_id(4), 0);
        assert_eq!(e.sampling_plan_id(7), 3);
    }

    #[test]
    fn committing_sampling_action_uses_sample_quality() {
        let mut e = env();
        e.reset(QueryId(1)).unwrap();
        // abstract action 4 -> plan 5 -> sampling k=1, time 0.2, quality
        // 0.9; unit_cost 0 so elapsed stays 0, total_time 0.2 <= budget
        // 1.0 -> win.
        e.take_action(4).unwrap();
        let outcome = e.done().unwrap();
        assert!(outcome.win);
        assert_eq!(outcome.quality, 0.9);
    }
}
