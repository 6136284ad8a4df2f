//! v0 — perfect-oracle lossless environment. Predicted time is always the
//! real labeled time; the only cost paid is probing the selectivities a
//! plan needs before it may be committed.

use crate::environment::Environment;
use crate::outcome::{reward, Outcome};
use crate::state::EnvState;
use qplan_core::records::LabeledQuery;
use qplan_core::types::{DoneReason, QueryId};
use qplan_core::{Error, Result};
use qplan_model::plan_algebra::{num_lossless_plans, sel_ids_of_plan};
use std::collections::{HashMap, HashSet};

pub struct OracleEnv {
    d: u32,
    j: u64,
    budget: f64,
    unit_cost: f64,
    p: u64,
    queries: HashMap<QueryId, LabeledQuery>,

    current: Option<QueryId>,
    known_sels: HashSet<u64>,
    tried_plans: Vec<u64>,
    tried_times: Vec<f64>,
    elapsed_time: f64,
    done: Option<Outcome>,
}

impl OracleEnv {
    pub fn new(d: u32, j: u64, budget: f64, unit_cost: f64, queries: Vec<LabeledQuery>) -> Self {
        let p = num_lossless_plans(d, j);
        Self {
            d,
            j,
            budget,
            unit_cost,
            p,
            queries: queries.into_iter().map(|q| (q.id, q)).collect(),
            current: None,
            known_sels: HashSet::new(),
            tried_plans: Vec::new(),
            tried_times: Vec::new(),
            elapsed_time: 0.0,
            done: None,
        }
    }

    fn current_labeled(&self) -> Result<&LabeledQuery> {
        let id = self
            .current
            .ok_or_else(|| Error::Configuration("no active episode; call reset first".into()))?;
        self.queries
            .get(&id)
            .ok_or_else(|| Error::IoMissing(format!("no label for query {id}")))
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

impl Environment for OracleEnv {
    fn reset(&mut self, query: QueryId) -> Result<()> {
        if !self.queries.contains_key(&query) {
            return Err(Error::IoMissing(format!("no label for query {query}")));
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
        if let Ok(labeled) = self.current_labeled() {
            for plan in 1..=self.p {
                let idx = (plan - 1) as usize;
                let unknown = sel_ids_of_plan(plan, self.d, self.j)
                    .map(|ids| ids.iter().filter(|id| !self.known_sels.contains(&id.0)).count())
                    .unwrap_or(0);
                s.first[idx] = unknown as f64;
                s.second[idx] = labeled.time_of(plan).unwrap_or(0.0);
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
        // (`0..num_plans()`); translate to the literal 1-indexed plan id
        // for every lookup and for reporting.
        if action >= self.p {
            return Err(Error::InvalidPlan { plan: action, max: self.p.saturating_sub(1) });
        }
        let plan = action + 1;
        let labeled = self.current_labeled()?.clone();
        let sel_ids = sel_ids_of_plan(plan, self.d, self.j)?;
        let needed = sel_ids.iter().filter(|id| !self.known_sels.contains(&id.0)).count();
        let cost = self.unit_cost * needed as f64;
        self.elapsed_time += cost;
        for id in &sel_ids {
            self.known_sels.insert(id.0);
        }

        let predict_time = labeled.time_of(plan)?;
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
    use qplan_core::types::QueryId;

    fn happy_labels() -> LabeledQuery {
        LabeledQuery {
            id: QueryId(1),
            times: vec![2.0, 0.8, 1.5, 0.9, 1.2, 0.7, 1.1, 0.6],
        }
    }

    #[test]
    fn scenario_happy_lossless_wins_on_plan_five() {
        let mut env = OracleEnv::new(3, 1, 1.0, 0.05, vec![happy_labels()]);
        env.reset(QueryId(1)).unwrap();
        // plan 5 is abstract action 4 (take_action is 0-indexed; plan = action + 1).
        let r = env.take_action(4).unwrap();
        let outcome = env.done().unwrap();
        assert!(outcome.win);
        assert_eq!(outcome.reason, DoneReason::Win);
        assert!((outcome.planning_time - 0.15).abs() < 1e-9);
        assert!((outcome.querying_time - 0.7).abs() < 1e-9);
        assert!((outcome.total_time - 0.85).abs() < 1e-9);
        assert_eq!(r, 1.0);
    }

    #[test]
    fn scenario_not_possible_uses_fastest_tried() {
        let labels = LabeledQuery {
            id: QueryId(2),
            times: vec![0.0, 1.5, 1.2, 1.4, 1.3, 1.1, 1.2, 1.3],
        };
        let mut env = OracleEnv::new(3, 1, 1.0, 0.01, vec![labels]);
        env.reset(QueryId(2)).unwrap();
        for action in 0..7u64 {
            if let Some(_) = env.done() {
                break;
            }
            env.take_action(action).unwrap();
        }
        let outcome = env.done().unwrap();
        assert_eq!(outcome.reason, DoneReason::NotPossible);
        assert!(!outcome.win);
        assert!((outcome.querying_time - 1.1).abs() < 1e-9);
        assert!((outcome.total_time - 1.17).abs() < 1e-6, "{}", outcome.total_time);
    }

    #[test]
    fn scenario_planning_too_long_falls_back() {
        let labels = happy_labels();
        let mut env = OracleEnv::new(3, 1, 1.0, 0.2, vec![labels]);
        env.reset(QueryId(1)).unwrap();
        env.take_action(6).unwrap(); // plan 7: sel_ids {4,2,1,7}, cost 0.8
        assert!(env.done().is_none());
        env.take_action(2).unwrap(); // plan 3: already knows 1,4; needs 3 -> cost 0.2, elapsed=1.0
        let outcome = env.done().unwrap();
        assert_eq!(outcome.reason, DoneReason::PlanningTooLong);
    }

    #[test]
    fn num_actions_available_shrinks_with_each_try() {
        let mut env = OracleEnv::new(3, 1, 1.0, 0.05, vec![happy_labels()]);
        env.reset(QueryId(1)).unwrap();
        assert_eq!(env.num_actions_available(), 7);
        env.take_action(1).unwrap();
        assert_eq!(env.num_actions_available(), 6);
    }
}
