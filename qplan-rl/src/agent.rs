//! Agent: ε-greedy action selection with non-repetition. Holds only
//! the exploration schedule and the set of actions already tried this
//! episode — the Q-network itself is supplied by the caller so the same
//! agent can drive training (policy network) or evaluation (frozen
//! snapshot).

use crate::network::QNetwork;
use burn::tensor::backend::Backend;
use qplan_core::config::TrainingConfig;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

pub struct Agent {
    eps_start: f64,
    eps_end: f64,
    eps_decay: f64,
    t: u64,
    tried_actions: HashSet<u64>,
}

impl Agent {
    pub fn new(cfg: &TrainingConfig) -> Self {
        Self {
            eps_start: cfg.eps_start,
            eps_end: cfg.eps_end,
            eps_decay: cfg.eps_decay,
            t: 0,
            tried_actions: HashSet::new(),
        }
    }

    /// `ε(t) = ε_end + (ε_start - ε_end) * exp(-t * decay)`.
    pub fn epsilon(&self) -> f64 {
        self.eps_end + (self.eps_start - self.eps_end) * (-(self.t as f64) * self.eps_decay).exp()
    }

    /// Epsilon-greedy selection among actions not yet tried this episode.
    /// Always records the chosen action and advances the decay counter.
    pub fn select_action<B: Backend>(
        &mut self,
        state: &[f64],
        policy: &QNetwork<B>,
        device: &B::Device,
        num_actions: u64,
    ) -> u64 {
        let eps = self.epsilon();
        self.t += 1;
        let mut rng = rand::thread_rng();

        let action = if rng.gen::<f64>() < eps {
            let candidates: Vec<u64> = (0..num_actions)
                .filter(|a| !self.tried_actions.contains(a))
                .collect();
            *candidates
                .choose(&mut rng)
                .expect("select_action called with no untried actions remaining")
        } else {
            self.best_untried(state, policy, device, num_actions)
        };

        self.tried_actions.insert(action);
        action
    }

    /// Exploit-only action choice: no ε branch, no decay-counter update.
    /// Used by the evaluator, which always wants the policy's best guess.
    pub fn decide_action<B: Backend>(
        &mut self,
        state: &[f64],
        policy: &QNetwork<B>,
        device: &B::Device,
        num_actions: u64,
    ) -> u64 {
        let action = self.best_untried(state, policy, device, num_actions);
        self.tried_actions.insert(action);
        action
    }

    fn best_untried<B: Backend>(
        &self,
        state: &[f64],
        policy: &QNetwork<B>,
        device: &B::Device,
        num_actions: u64,
    ) -> u64 {
        let q = policy.forward_one(device, state);
        let mut ranked: Vec<usize> = (0..num_actions as usize).collect();
        ranked.sort_by(|&a, &b| q[b].partial_cmp(&q[a]).unwrap_or(std::cmp::Ordering::Equal));
        ranked
            .into_iter()
            .map(|i| i as u64)
            .find(|a| !self.tried_actions.contains(a))
            .expect("best_untried called with no untried actions remaining")
    }

    /// Clears this episode's non-repetition set; called at the start of
    /// every episode.
    pub fn reset(&mut self) {
        self.tried_actions.clear();
    }

    /// Resets the decay counter `t`, restarting the exploration schedule
    /// from `eps_start`.
    pub fn clear_memory(&mut self) {
        self.t = 0;
    }

    pub fn tried_actions(&self) -> &HashSet<u64> {
        &self.tried_actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn cfg() -> TrainingConfig {
        TrainingConfig::default()
    }

    #[test]
    fn epsilon_decays_toward_eps_end() {
        let mut agent = Agent::new(&cfg());
        let e0 = agent.epsilon();
        agent.t = 10_000;
        let e1 = agent.epsilon();
        assert!(e1 < e0);
        assert!(e1 >= agent.eps_end - 1e-9);
    }

    #[test]
    fn never_repeats_an_action_within_an_episode() {
        let device = Default::default();
        let policy = QNetwork::<TestBackend>::new(&device, 4);
        let mut agent = Agent::new(&cfg());
        let state = vec![0.0; 9];
        let mut chosen = HashSet::new();
        for _ in 0..4 {
            let a = agent.select_action(&state, &policy, &device, 4);
            assert!(chosen.insert(a), "action {a} repeated");
        }
    }

    #[test]
    fn reset_clears_tried_actions_but_not_decay_counter() {
        let device = Default::default();
        let policy = QNetwork::<TestBackend>::new(&device, 2);
        let mut agent = Agent::new(&cfg());
        agent.select_action(&[0.0; 5], &policy, &device, 2);
        let t_before = agent.t;
        agent.reset();
        assert!(agent.tried_actions().is_empty());
        assert_eq!(agent.t, t_before);
    }

    #[test]
    fn clear_memory_resets_decay_counter() {
        let mut agent = Agent::new(&cfg());
        agent.t = 42;
        agent.clear_memory();
        assert_eq!(agent.t, 0);
    }
}
