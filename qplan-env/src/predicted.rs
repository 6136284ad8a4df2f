//! v1 — predicted time on a sample, lossless. Same action mechanics as
//! v0, but `predict_time(p)` comes from the linear estimator reading a
//! selectivity vector measured on a sample, and the probe cost paid is
//! the real per-sample-size probe time rather than a flat `unit_cost`.

use crate::environment::Environment;
use crate::outcome::{reward, Outcome};
use crate::sample_level::SampleLevel;
use crate::state::EnvState;
use qplan_core::types::{DoneReason, QueryId};
use qplan_core::{Error, Result};
use qplan_model::estimator::{Estimator, PredictMode};
use qplan_model::plan_algebra::{num_lossless_plans, sel_ids_of_plan};
use std::collections::HashSet;

pub struct PredictedEnv {
    d: u32,
    j: u64,
    budget: f64,
    p: u64,
    estimator: Estimator,
    levels: Vec<SampleLevel>,
    sample_pointer: usize,

    current: Option<QueryId>,
    known_sels: HashSet<u64>,
    tried_plans: Vec<u64>,
    tried_times: Vec<f64>,
    elapsed_time: f64,
    done: Option<Outcome>,
}

impl PredictedEnv {
    pub fn new(
        d: u32,
        j: u64,
        budget: f64,
        estimator: Estimator,
        levels: Vec<SampleLevel>,
        sample_pointer: usize,
    ) -> Result<Self> {
        if sample_pointer >= levels.len() {
            return Err(Error::Configuration(format!(
                "sample_pointer {sample_pointer} out of range (have {} levels)",
                levels.len()
            )));
        }
        let p = num_lossless_plans(d, j);
        Ok(Self {
            d,
            j,
            budget,
            p,
            estimator,
            levels,
            sample_pointer,
            current: None,
            known_sels: HashSet::new(),
            tried_plans: Vec::new(),
            tried_times: Vec::new(),
            elapsed_time: 0.0,
            done: None,
        })
    }

    /// Switch the active sample size between episodes (or, for an agent
    /// that models sample choice as part of its policy, before the first
    /// action of an episode).
    pub fn set_sample_pointer(&mut self, pointer: usize) -> Result<()> {
        if pointer >= self.levels.len() {
            return Err(Error::Configuration(format!(
                "sample_pointer {pointer} out of range (have {} levels)",
                self.levels.len()
            )));
        }
        self.sample_pointer = pointer;
        Ok(())
    }

    fn current_level(&self) -> &SampleLevel {
        &self.levels[self.sample_pointer]
    }

    fn current_query(&self) -> Result<QueryId> {
        self.current
            .ok_or_else(|| Error::Configuration("no active episode; call reset first".into()))
    }

    fn sel_vector(&self, query: QueryId) -> Result<&Vec<f64>> {
        self.current_level()
            .sel_vector(query)
            .ok_or_else(|| Error::IoMissing(format!("no sample selectivity for query {query}")))
    }

    fn predict(&self, query: QueryId, plan: u64) -> Result<f64> {
        let sel = self.sel_vector(query)?;
        self.estimator
            .predict(qplan_core::types::PlanId(plan), sel, self.budget, PredictMode::Application)
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
        let total_time = self.elapsed_time + querying_time;
        let win = total_time <= self.budget;
        let r = reward(1.0, self.budget, total_time, 1.0, win);
        self.done = Some(Outcome {
            plan,
            planning_time: self.elapsed_time,
            querying_time,
            total_time,
            win,
            reason,
            quality: 1.0,
        });
        r
    }
}

impl Environment for PredictedEnv {
    fn reset(&mut self, query: QueryId) -> Result<()> {
        if !self.current_level().has_query(query) {
            return Err(Error::IoMissing(format!(
                "no sample selectivity for query {query}"
            )));
        }
        self.current = Some(query);
        self.known_sels.clear();
        self.tried_plans.clear();
        self.tried_times.clear();
        self.elapsed_time = 0.0;
        self.done = None;
        Ok(())
    }

    fn num_plans(&self) -> usize {
        self.p as usize
    }

    fn num_actions_available(&self) -> usize {
        self.p as usize - self.tried_plans.len()
    }

    fn state(&self) -> EnvState {
        let mut s = EnvState::new(self.p as usize);
        if let Ok(query) = self.current_query() {
            for plan in 1..=self.p {
                let idx = (plan - 1) as usize;
                let unknown = sel_ids_of_plan(plan, self.d, self.j)
                    .map(|ids| ids.iter().filter(|id| !self.known_sels.contains(&id.0)).count())
                    .unwrap_or(0);
                s.first[idx] = unknown as f64;
                s.second[idx] = self.predict(query, plan).unwrap_or(0.0);
            }
        }
        s.elapsed_time = self.elapsed_time;
        s
    }

    fn take_action(&mut self, action: u64) -> Result<f64> {
        if self.done.is_some() {
            return Ok(0.0);
        }
        // `action` is the abstract 0-indexed id the agent/Q-network use;
        // translate to the literal 1-indexed plan id used everywhere else.
        if action >= self.p {
            return Err(Error::InvalidPlan { plan: action, max: self.p.saturating_sub(1) });
        }
        let plan = action + 1;
        let query = self.current_query()?;
        let sel_ids = sel_ids_of_plan(plan, self.d, self.j)?;
        let level = self.current_level();
        let cost: f64 = sel_ids
            .iter()
            .filter(|id| !self.known_sels.contains(&id.0))
            .map(|id| level.sel_cost(query, id.0))
            .sum();
        self.elapsed_time += cost;
        for id in &sel_ids {
            self.known_sels.insert(id.0);
        }

        let predict_time = self.predict(query, plan)?;
        self.tried_plans.push(plan);
        self.tried_times.push(predict_time);

        let total_time = self.elapsed_time + predict_time;
        if total_time <= self.budget {
            let r = reward(1.0, self.budget, total_time, 1.0, true);
            self.done = Some(Outcome {
                plan,
                planning_time: self.elapsed_time,
                querying_time: predict_time,
                total_time,
                win: true,
                reason: DoneReason::Win,
                quality: 1.0,
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
    use qplan_core::types::PlanId;
    use std::collections::HashMap;

    fn one_level_env() -> PredictedEnv {
        // d=2, j=1 -> plans 1..3, sel ids 1,2,3.
        let mut vecs = HashMap::new();
        vecs.insert(QueryId(1), vec![0.1, 0.1, 0.1]);
        let mut times = HashMap::new();
        times.insert(QueryId(1), vec![0.05, 0.05, 0.05]);
        let level = SampleLevel::new(100, vecs, times);

        let mut est = Estimator::new(2, 1);
        // Flat model: predicted time is always 0.4, regardless of features.
        for plan in 1..=3u64 {
            est.fit(PlanId(plan), &[vec![0.1; plan.count_ones() as usize + if plan.is_power_of_two() {0} else {1}]], &[0.4], 100.0).unwrap();
        }
        PredictedEnv::new(2, 1, 1.0, est, vec![level], 0).unwrap()
    }

    #[test]
    fn wins_when_estimate_plus_elapsed_fits_budget() {
        let mut env = one_level_env();
        env.reset(QueryId(1)).unwrap();
        let r = env.take_action(1).unwrap();
        let outcome = env.done().unwrap();
        assert!(outcome.win);
        assert_eq!(r, 1.0);
    }

    #[test]
    fn set_sample_pointer_rejects_out_of_range() {
        let mut env = one_level_env();
        assert!(env.set_sample_pointer(5).is_err());
    }
}
