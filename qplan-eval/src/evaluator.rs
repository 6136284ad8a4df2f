//! Single-policy evaluator: deterministic (exploit-only) rollouts
//! of a trained policy over a labeled query set, emitting one
//! `EvaluatedRecord` per query.

use burn::tensor::backend::Backend;
use parking_lot::RwLock;
use qplan_core::config::TrainingConfig;
use qplan_core::records::EvaluatedRecord;
use qplan_core::types::QueryId;
use qplan_core::Result;
use qplan_env::{Environment, Outcome};
use qplan_rl::{Agent, QNetwork};
use rayon::prelude::*;

fn to_record(qid: QueryId, outcome: &Outcome, tried_plans: &[u64]) -> EvaluatedRecord {
    let plans_tried = tried_plans
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("_");
    EvaluatedRecord {
        id: qid,
        planning_time: outcome.planning_time,
        querying_time: outcome.querying_time,
        total_time: outcome.total_time,
        win: if outcome.win { 1 } else { 0 },
        plans_tried,
        reason: outcome.reason.to_string(),
        quality: Some(outcome.quality),
    }
}

/// Evaluates `policy` against every query in `query_ids`, sequentially,
/// reusing a single (stateful) `Environment`.
pub fn evaluate_policy<B: Backend>(
    env: &mut dyn Environment,
    policy: &QNetwork<B>,
    device: &B::Device,
    query_ids: &[QueryId],
) -> Result<Vec<EvaluatedRecord>> {
    let num_actions = env.num_plans() as u64;
    let mut agent = Agent::new(&TrainingConfig::default());
    let mut out = Vec::with_capacity(query_ids.len());

    for &qid in query_ids {
        env.reset(qid)?;
        agent.reset();
        loop {
            let state = env.state().to_vec();
            let action = agent.decide_action(&state, policy, device, num_actions);
            env.take_action(action)?;
            if let Some(outcome) = env.done() {
                out.push(to_record(qid, outcome, env.tried_plans()));
                break;
            }
        }
    }
    Ok(out)
}

/// Same rollout as [`evaluate_policy`], swept in parallel across
/// `query_ids` via `rayon`, an embarrassingly parallel evaluation sweep.
/// Each rayon task builds its own `Environment` from `make_env` (so
/// mutable per-episode state never crosses threads) while sharing the
/// read-only `policy` handle. `policy_guard` documents that handle as
/// read-only across the sweep, using a `parking_lot::RwLock`-guarded
/// shared-handle even though a plain shared reference already suffices
/// for a read-only network.
pub fn evaluate_policy_parallel<B, F>(
    make_env: F,
    policy: &QNetwork<B>,
    device: &B::Device,
    query_ids: &[QueryId],
) -> Result<Vec<EvaluatedRecord>>
where
    B: Backend,
    QNetwork<B>: Sync,
    F: Fn() -> Box<dyn Environment> + Sync,
{
    let policy_guard = RwLock::new(());
    query_ids
        .par_iter()
        .map(|&qid| {
            let _read = policy_guard.read();
            let mut env = make_env();
            let num_actions = env.num_plans() as u64;
            let mut agent = Agent::new(&TrainingConfig::default());
            env.reset(qid)?;
            agent.reset();
            loop {
                let state = env.state().to_vec();
                let action = agent.decide_action(&state, policy, device, num_actions);
                env.take_action(action)?;
                if let Some(outcome) = env.done() {
                    return Ok(to_record(qid, outcome, env.tried_plans()));
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use qplan_core::records::LabeledQuery;
    use qplan_env::OracleEnv;

    type TestBackend = NdArray<f32>;

    #[test]
    fn evaluates_a_single_query_to_completion() {
        let labels = vec![LabeledQuery {
            id: QueryId(1),
            times: vec![2.0, 0.8, 1.5, 0.9, 1.2, 0.7, 1.1, 0.6],
        }];
        let mut env = OracleEnv::new(3, 1, 1.0, 0.05, labels);
        let device = Default::default();
        let policy = QNetwork::<TestBackend>::new(&device, env.num_plans());

        let records = evaluate_policy(&mut env, &policy, &device, &[QueryId(1)]).unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].plans_tried.is_empty());
        assert!(records[0].win == 0 || records[0].win == 1);
    }
}
