//! Trainer-with-selection: run several independently seeded training
//! trials, evaluate each trial's converged policy against a held-out
//! validation set, and keep the trial with the best validation figure of
//! merit. Registered snapshots live in a small `ModelRegistry`, a
//! register/get-best model registry rather than a bare tuple.

use crate::evaluator::evaluate_policy;
use burn::module::AutodiffModule;
use burn::tensor::backend::AutodiffBackend;
use qplan_core::config::TrainingConfig;
use qplan_core::types::QueryId;
use qplan_core::Result;
use qplan_env::Environment;
use qplan_rl::QNetwork;
use qplan_train::{FigureOfMeritKind, Trainer};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

/// A small append-only registry of named, scored model snapshots.
pub struct ModelRegistry<S> {
    entries: Vec<(String, S, f64)>,
}

impl<S: Clone> ModelRegistry<S> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn register(&mut self, name: impl Into<String>, snapshot: S, figure_of_merit: f64) {
        self.entries.push((name.into(), snapshot, figure_of_merit));
    }

    pub fn get(&self, name: &str) -> Option<&(String, S, f64)> {
        self.entries.iter().find(|(n, _, _)| n == name)
    }

    /// Highest figure-of-merit entry, ties broken by registration order.
    pub fn best(&self) -> Option<&(String, S, f64)> {
        self.entries
            .iter()
            .max_by(|a, b| a.2.partial_cmp(&b.2).unwrap_or(std::cmp::Ordering::Equal))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Clone> Default for ModelRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `num_trials` independent training trials — each over a fraction
/// `subset_fraction` of `training_ids` sampled without replacement (`1.0`
/// trains on the full set every trial) — and returns the policy with the
/// highest validation win-rate over `validation_ids`, alongside the full
/// registry of trial snapshots for inspection.
///
/// `make_env` is called once per trial (and once more per trial for
/// validation) so that each rollout gets a fresh, independently-stateful
/// `Environment`.
#[allow(clippy::too_many_arguments)]
pub fn train_with_selection<B>(
    cfg: TrainingConfig,
    device: B::Device,
    num_plans: usize,
    figure_kind: FigureOfMeritKind,
    num_trials: usize,
    subset_fraction: f64,
    mut make_env: impl FnMut() -> Box<dyn Environment>,
    training_ids: &[QueryId],
    validation_ids: &[QueryId],
    seed: u64,
) -> Result<(QNetwork<B::InnerBackend>, ModelRegistry<QNetwork<B::InnerBackend>>)>
where
    B: AutodiffBackend,
    B::Device: Clone,
{
    assert!(num_trials > 0, "at least one trial is required");
    let mut registry = ModelRegistry::new();
    let mut rng = StdRng::seed_from_u64(seed);
    let fraction = subset_fraction.clamp(0.0, 1.0);

    for trial in 0..num_trials {
        let mut subset = training_ids.to_vec();
        subset.shuffle(&mut rng);
        let take = ((subset.len() as f64) * fraction).ceil() as usize;
        subset.truncate(take.max(1).min(subset.len().max(1)));

        let mut trainer = Trainer::<B>::new(
            cfg.clone(),
            device.clone(),
            num_plans,
            figure_kind,
            seed.wrapping_add(trial as u64),
        );
        let mut env = make_env();
        trainer.train(env.as_mut(), &subset)?;

        let snapshot = trainer.policy().valid();
        let mut eval_env = make_env();
        let records = evaluate_policy(eval_env.as_mut(), &snapshot, &device, validation_ids)?;
        let wins = records.iter().filter(|r| r.win == 1).count();
        let validation_score = wins as f64 / records.len().max(1) as f64;

        info!(trial, validation_score, "trial evaluated against validation set");
        registry.register(format!("trial-{trial}"), snapshot, validation_score);
    }

    let (name, snapshot, score) = registry.best().expect("at least one trial was registered");
    info!(best_trial = %name, best_score = score, "trial selection complete");
    let best = snapshot.clone();
    Ok((best, registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{ndarray::NdArray, Autodiff};
    use qplan_core::records::LabeledQuery;
    use qplan_env::OracleEnv;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn labels() -> Vec<LabeledQuery> {
        vec![LabeledQuery {
            id: QueryId(1),
            times: vec![2.0, 0.8, 1.5, 0.9, 1.2, 0.7, 1.1, 0.6],
        }]
    }

    #[test]
    fn runs_all_trials_and_returns_best() {
        let mut cfg = TrainingConfig::default();
        cfg.max_episodes = 1;
        cfg.batch_size = 2;
        cfg.memory_size = 16;
        cfg.model_memory_capacity = 2;
        cfg.early_stop = false;

        let device = Default::default();
        let num_plans = OracleEnv::new(3, 1, 1.0, 0.05, labels()).num_plans();
        let (_best, registry) = train_with_selection::<TestBackend>(
            cfg,
            device,
            num_plans,
            FigureOfMeritKind::WinRate,
            2,
            1.0,
            || Box::new(OracleEnv::new(3, 1, 1.0, 0.05, labels())),
            &[QueryId(1)],
            &[QueryId(1)],
            7,
        )
        .unwrap();
        assert_eq!(registry.len(), 2);
    }
}
