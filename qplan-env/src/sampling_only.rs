//! v-Q — sampling only. Action space is `d*|R|`; no probe cost is
//! modeled, so `elapsed_time` stays `0` until a commit. The first viable
//! sampling plan wins; otherwise the fastest tried sampling plan is
//! returned with `not_possible` (no `planning_too_long`, since elapsed
//! time never independently grows toward the budget).

use crate::environment::Environment;
use crate::outcome::{reward, Outcome};
use crate::state::EnvState;
use qplan_core::records::{LabeledSampleQuery, SampleQueryQuality};
use qplan_core::types::{DoneReason, QueryId};
use qplan_core::{Error, Result};
use qplan_model::plan_algebra::num_sampling_plans;
use std::collections::HashMap;

struct QueryGroundTruth {
    sampling: LabeledSampleQuery,
    quality: SampleQueryQuality,
}

pub struct SamplingOnlyEnv {
    d: u32,
    num_ratios: usize,
    budget: f64,
    beta: f64,
    total: u64,
    queries: HashMap<QueryId, QueryGroundTruth>,

    current: Option<QueryId>,
    tried_plans: Vec<u64>,
    tried_times: Vec<f64>,
    tried_qualities: Vec<f64>,
    done: Option<Outcome>,
}

impl SamplingOnlyEnv {
    pub fn new(
        d: u32,
        num_ratios: usize,
        budget: f64,
        beta: f64,
        sampling: Vec<LabeledSampleQuery>,
        quality: Vec<SampleQueryQuality>,
    ) -> Result<Self> {
        let total = num_sampling_plans(d, num_ratios);
        let mut quality_map: HashMap<QueryId, SampleQueryQuality> =
            quality.into_iter().map(|q| (q.id, q)).collect();
        let mut queries = HashMap::new();
        for s in sampling {
            let id = s.id;
            let quality = quality_map
                .remove(&id)
                .ok_or_else(|| Error::SchemaMismatch(format!("no sample quality for query {id}")))?;
            queries.insert(id, QueryGroundTruth { sampling: s, quality });
        }
        Ok(Self {
            d,
            num_ratios,
            budget,
            beta,
            total,
            queries,
            current: None,
            tried_plans: Vec::new(),
            tried_times: Vec::new(),
            tried_qualities: Vec::new(),
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

    fn fallback(&mut self) -> f64 {
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
        let r = reward(self.beta, self.budget, querying_time, quality, false);
        self.done = Some(Outcome {
            plan,
            planning_time: 0.0,
            querying_time,
            total_time: querying_time,
            win: false,
            reason: DoneReason::NotPossible,
            quality,
        });
        r
    }
}

impl Environment for SamplingOnlyEnv {
    fn reset(&mut self, query: QueryId) -> Result<()> {
        if !self.queries.contains_key(&query) {
            return Err(Error::IoMissing(format!("no label for query {query}")));
        }
        self.current = Some(query);
        self.tried_plans.clear();
        self.tried_times.clear();
        self.tried_qualities.clear();
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
            for k in 0..self.total as usize {
                s.first[k] = 0.0;
                s.second[k] = truth.sampling.sample_times.get(k).copied().unwrap_or(0.0);
            }
        }
        s.elapsed_time = 0.0;
        s
    }

    fn take_action(&mut self, action: u64) -> Result<f64> {
        if self.done.is_some() {
            return Ok(0.0);
        }
        if action >= self.total {
            return Err(Error::InvalidPlan { plan: action, max: self.total.saturating_sub(1) });
        }
        let truth = self.current_truth()?;
        let k = action as usize;
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

        self.tried_plans.push(action);
        self.tried_times.push(time);
        self.tried_qualities.push(quality);

        if time <= self.budget {
            let r = reward(self.beta, self.budget, time, quality, true);
            self.done = Some(Outcome {
                plan: action,
                planning_time: 0.0,
                querying_time: time,
                total_time: time,
                win: true,
                reason: DoneReason::Win,
                quality,
            });
            return Ok(r);
        }
        if self.num_actions_available() == 0 {
            return Ok(self.fallback());
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

    #[test]
    fn scenario_quality_pickup_commits_action_two() {
        let sampling = vec![LabeledSampleQuery {
            id: QueryId(1),
            sample_times: vec![0.1, 0.2, 0.15, 0.3],
        }];
        let quality = vec![SampleQueryQuality {
            id: QueryId(1),
            qualities: vec![0.4, 0.9, 0.6, 0.95],
        }];
        let mut env = SamplingOnlyEnv::new(2, 2, 0.25, 0.0, sampling, quality).unwrap();
        env.reset(QueryId(1)).unwrap();
        let r = env.take_action(2).unwrap();
        let outcome = env.done().unwrap();
        assert!(outcome.win);
        assert_eq!(outcome.quality, 0.6);
        assert_eq!(r, 0.6);
    }

    #[test]
    fn not_possible_falls_back_to_fastest_tried() {
        let sampling = vec![LabeledSampleQuery {
            id: QueryId(1),
            sample_times: vec![0.5, 0.6],
        }];
        let quality = vec![SampleQueryQuality {
            id: QueryId(1),
            qualities: vec![0.2, 0.3],
        }];
        let mut env = SamplingOnlyEnv::new(1, 2, 0.1, 1.0, sampling, quality).unwrap();
        env.reset(QueryId(1)).unwrap();
        env.take_action(0).unwrap();
        let r = env.take_action(1).unwrap();
        let outcome = env.done().unwrap();
        assert_eq!(outcome.reason, DoneReason::NotPossible);
        assert_eq!(outcome.querying_time, 0.5);
        assert!(r < 0.0);
    }
}
