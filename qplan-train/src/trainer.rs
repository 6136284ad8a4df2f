//! Trainer: outer-loop episode generator (one pass over a reshuffled
//! permutation of the training set per "episode"), Bellman target,
//! optimizer step, target-network refresh every `target_update_episodes`
//! episodes, and early stopping by model-memory convergence.

use burn::module::AutodiffModule;
use burn::nn::loss::{MseLoss, Reduction};
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer, OptimizerAdaptor};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{Int, Tensor};
use qplan_core::config::TrainingConfig;
use qplan_core::records::TrainTraceRow;
use qplan_core::types::QueryId;
use qplan_core::Result;
use qplan_env::Environment;
use qplan_rl::{Agent, ModelMemory, QNetwork, ReplayMemory, Transition};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

/// Which quantity model-memory convergence is tracked against: win-rate
/// for lossless training (v0/v1/v2), total reward for sampling training
/// (v-plus/v-Q), since a sampling episode's reward already blends time
/// and quality and a binary win/lose is a lossy summary of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FigureOfMeritKind {
    WinRate,
    TotalReward,
}

type AdamOptimizer<B> = OptimizerAdaptor<Adam, QNetwork<B>, B>;

pub struct Trainer<B: AutodiffBackend> {
    cfg: TrainingConfig,
    device: B::Device,
    policy: QNetwork<B>,
    target: QNetwork<B>,
    optimizer: AdamOptimizer<B>,
    replay: ReplayMemory,
    model_memory: ModelMemory<QNetwork<B::InnerBackend>>,
    agent: Agent,
    figure_kind: FigureOfMeritKind,
    rng: StdRng,
    trace: Vec<TrainTraceRow>,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(
        cfg: TrainingConfig,
        device: B::Device,
        num_plans: usize,
        figure_kind: FigureOfMeritKind,
        seed: u64,
    ) -> Self {
        let policy = QNetwork::new(&device, num_plans);
        let target = policy.clone();
        let optimizer = AdamConfig::new().init();
        let replay = ReplayMemory::new(cfg.memory_size);
        let model_memory = ModelMemory::new(cfg.model_memory_capacity);
        let agent = Agent::new(&cfg);
        Self {
            cfg,
            device,
            policy,
            target,
            optimizer,
            replay,
            model_memory,
            agent,
            figure_kind,
            rng: StdRng::seed_from_u64(seed),
            trace: Vec::new(),
        }
    }

    /// Pre-populates replay memory from a prior run's saved transitions
    /// before the first episode ("experience seeding").
    pub fn seed_replay(&mut self, transitions: Vec<Transition>) {
        for t in transitions {
            self.replay.push(t);
        }
    }

    pub fn policy(&self) -> &QNetwork<B> {
        &self.policy
    }

    pub fn trace(&self) -> &[TrainTraceRow] {
        &self.trace
    }

    pub fn model_memory(&self) -> &ModelMemory<QNetwork<B::InnerBackend>> {
        &self.model_memory
    }

    /// Runs outer-loop episodes — each a reshuffled full pass over
    /// `query_ids` — until `max_episodes` is reached or, when
    /// `early_stop` is set, the model memory converges.
    pub fn train(&mut self, env: &mut dyn Environment, query_ids: &[QueryId]) -> Result<()> {
        let num_actions = env.num_plans() as u64;

        for iteration in 0..self.cfg.max_episodes {
            let mut permutation = query_ids.to_vec();
            permutation.shuffle(&mut self.rng);

            let mut wins = 0usize;
            let mut total_reward = 0.0f64;

            for &qid in &permutation {
                env.reset(qid)?;
                self.agent.reset();
                loop {
                    let state = env.state().to_vec();
                    let action =
                        self.agent
                            .select_action(&state, &self.policy, &self.device, num_actions);
                    let reward = env.take_action(action)?;
                    let next_state = env.state().to_vec();
                    self.replay.push(Transition {
                        state,
                        action,
                        next_state,
                        reward,
                    });
                    total_reward += reward;

                    if self.replay.can_provide_sample(self.cfg.batch_size) {
                        self.learn_step();
                    }

                    if let Some(outcome) = env.done() {
                        if outcome.win {
                            wins += 1;
                        }
                        break;
                    }
                }
            }

            if iteration % self.cfg.target_update_episodes == 0 {
                self.target = self.policy.clone();
            }

            let win_rate = wins as f64 / permutation.len().max(1) as f64;
            let figure_of_merit = match self.figure_kind {
                FigureOfMeritKind::WinRate => win_rate,
                FigureOfMeritKind::TotalReward => total_reward,
            };
            self.model_memory.push(self.policy.valid(), figure_of_merit);
            self.trace.push(TrainTraceRow { iteration, win_rate });

            info!(iteration, win_rate, figure_of_merit, "training episode complete");

            if self.cfg.early_stop && self.model_memory.converged(self.cfg.convergence_threshold) {
                info!(iteration, "training converged, stopping early");
                break;
            }
        }
        Ok(())
    }

    /// One Bellman-target batch update: MSE between the policy's
    /// committed-action Q-value and `γ · max_a target(s', a) + r`, with
    /// `next` treated as terminal (target `0`) when every component of
    /// `next_state` is zero.
    fn learn_step(&mut self) {
        let batch = self.replay.sample(self.cfg.batch_size, &mut self.rng);
        let batch_size = batch.len();
        let state_width = batch[0].state.len();

        let state_flat: Vec<f32> = batch
            .iter()
            .flat_map(|t| t.state.iter().map(|&x| x as f32))
            .collect();
        let next_flat: Vec<f32> = batch
            .iter()
            .flat_map(|t| t.next_state.iter().map(|&x| x as f32))
            .collect();
        let actions: Vec<i32> = batch.iter().map(|t| t.action as i32).collect();
        let rewards: Vec<f32> = batch.iter().map(|t| t.reward as f32).collect();
        let non_terminal: Vec<f32> = batch
            .iter()
            .map(|t| if t.next_state.iter().all(|&x| x == 0.0) { 0.0 } else { 1.0 })
            .collect();

        let states = Tensor::<B, 1>::from_floats(state_flat.as_slice(), &self.device)
            .reshape([batch_size, state_width]);
        let next_states = Tensor::<B, 1>::from_floats(next_flat.as_slice(), &self.device)
            .reshape([batch_size, state_width]);
        let action_idx = Tensor::<B, 1, Int>::from_ints(actions.as_slice(), &self.device)
            .reshape([batch_size, 1]);
        let reward_tensor = Tensor::<B, 1>::from_floats(rewards.as_slice(), &self.device);
        let mask_tensor = Tensor::<B, 1>::from_floats(non_terminal.as_slice(), &self.device);

        let q_all = self.policy.forward(states);
        let current_q = q_all.gather(1, action_idx).reshape([batch_size]);

        let next_q_all = self.target.forward(next_states).detach();
        let next_max = next_q_all.max_dim(1).reshape([batch_size]);

        let target = (next_max.mul_scalar(self.cfg.gamma) * mask_tensor + reward_tensor).detach();

        let loss = MseLoss::new().forward(current_q, target, Reduction::Mean);
        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.policy);
        self.policy = self.optimizer.step(self.cfg.learning_rate, self.policy.clone(), grads);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{ndarray::NdArray, Autodiff};
    use qplan_core::records::LabeledQuery;
    use qplan_env::OracleEnv;

    type TestBackend = Autodiff<NdArray<f32>>;

    #[test]
    fn trainer_runs_one_episode_without_panicking() {
        let mut cfg = TrainingConfig::default();
        cfg.max_episodes = 1;
        cfg.batch_size = 2;
        cfg.memory_size = 16;
        cfg.model_memory_capacity = 2;
        cfg.early_stop = false;

        let labels = vec![LabeledQuery {
            id: QueryId(1),
            times: vec![2.0, 0.8, 1.5, 0.9, 1.2, 0.7, 1.1, 0.6],
        }];
        let mut env = OracleEnv::new(3, 1, 1.0, 0.05, labels);

        let device = Default::default();
        let mut trainer = Trainer::<TestBackend>::new(
            cfg,
            device,
            env.num_plans(),
            FigureOfMeritKind::WinRate,
            42,
        );
        trainer.train(&mut env, &[QueryId(1)]).unwrap();
        assert_eq!(trainer.trace().len(), 1);
        assert!(trainer.model_memory().len() <= 2);
    }
}
