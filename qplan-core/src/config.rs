//! Process-wide configuration, explicit and passed into entry points rather
//! than held as global singletons.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Filter dimension / join-method / sample-ratio shape shared by the plan
/// algebra, the environment and the network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShapeConfig {
    /// Number of filter dimensions `d`.
    pub dimensions: usize,
    /// Number of join methods `J`.
    pub join_methods: usize,
    /// Sample ratios available to sampling plans, e.g. `[0.01, 0.1, 1.0]`.
    pub sample_ratios: Vec<f64>,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            dimensions: 3,
            join_methods: 1,
            sample_ratios: vec![0.01, 0.1],
        }
    }
}

impl ShapeConfig {
    pub fn num_sample_ratios(&self) -> usize {
        self.sample_ratios.len()
    }
}

/// Hyperparameters for the trainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub batch_size: usize,
    pub gamma: f64,
    pub eps_start: f64,
    pub eps_end: f64,
    pub eps_decay: f64,
    pub target_update_episodes: usize,
    pub memory_size: usize,
    pub learning_rate: f64,
    pub model_memory_capacity: usize,
    pub convergence_threshold: f64,
    pub max_episodes: usize,
    pub early_stop: bool,
    /// Seed replay memory from a prior run's saved transitions before the
    /// first episode instead of starting empty.
    pub seed_replay_from: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: 1024,
            gamma: 0.999,
            eps_start: 1.0,
            eps_end: 1e-3,
            eps_decay: 1e-3,
            target_update_episodes: 10,
            memory_size: 1_000_000,
            learning_rate: 1e-3,
            model_memory_capacity: 20,
            convergence_threshold: 0.1,
            max_episodes: 10_000,
            early_stop: true,
            seed_replay_from: None,
        }
    }
}

/// Environment-level knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Wall-clock budget for a single query, in seconds.
    pub budget: f64,
    /// Simulated per-selectivity probe cost for v0, in seconds.
    pub unit_cost: f64,
    /// Reward weight toward budget-adherence over sample quality.
    /// `1.0` for lossless variants, `0 <= beta <= 1` for sampling variants.
    pub beta: f64,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            budget: 1.0,
            unit_cost: 0.05,
            beta: 1.0,
        }
    }
}

/// Filesystem locations for persisted artefacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub queries_file: PathBuf,
    pub labeled_queries_file: PathBuf,
    pub sel_file: PathBuf,
    pub labeled_sel_file: PathBuf,
    pub labeled_sample_file: PathBuf,
    pub sample_quality_file: PathBuf,
    pub sel_costs_file: PathBuf,
    pub estimator_dir: PathBuf,
    pub policy_snapshot_dir: PathBuf,
    pub train_trace_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            queries_file: PathBuf::from("data/queries.csv"),
            labeled_queries_file: PathBuf::from("data/labeled_queries.csv"),
            sel_file: PathBuf::from("data/sel.csv"),
            labeled_sel_file: PathBuf::from("data/labeled_sel.csv"),
            labeled_sample_file: PathBuf::from("data/labeled_sample.csv"),
            sample_quality_file: PathBuf::from("data/sample_quality.csv"),
            sel_costs_file: PathBuf::from("data/sel_costs.csv"),
            estimator_dir: PathBuf::from("models/estimator"),
            policy_snapshot_dir: PathBuf::from("models/policy"),
            train_trace_file: PathBuf::from("data/train_trace.csv"),
        }
    }
}

/// Top-level configuration object passed explicitly into every entry point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub shape: ShapeConfig,
    pub training: TrainingConfig,
    pub environment: EnvironmentConfig,
    pub paths: PathsConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::IoMissing(format!("{}: {}", path.display(), e)))?;
        Self::from_str(&content)
    }

    pub fn from_str(content: &str) -> crate::Result<Self> {
        if let Ok(cfg) = toml::from_str::<Config>(content) {
            return Ok(cfg);
        }
        if let Ok(cfg) = serde_json::from_str::<Config>(content) {
            return Ok(cfg);
        }
        if let Ok(cfg) = serde_yaml::from_str::<Config>(content) {
            return Ok(cfg);
        }
        Err(crate::Error::Configuration(
            "could not parse configuration as TOML, JSON or YAML".to_string(),
        ))
    }

    /// Apply `QPLAN_*` environment variable overrides on top of defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Ok(budget) = std::env::var("QPLAN_BUDGET") {
            if let Ok(b) = budget.parse::<f64>() {
                cfg.environment.budget = b;
            }
        }
        if let Ok(dims) = std::env::var("QPLAN_DIMENSIONS") {
            if let Ok(d) = dims.parse::<usize>() {
                cfg.shape.dimensions = d;
            }
        }
        if let Ok(lr) = std::env::var("QPLAN_LEARNING_RATE") {
            if let Ok(v) = lr.parse::<f64>() {
                cfg.training.learning_rate = v;
            }
        }
        cfg
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.shape.dimensions == 0 {
            return Err(crate::Error::Configuration(
                "shape.dimensions must be > 0".to_string(),
            ));
        }
        if self.shape.join_methods == 0 {
            return Err(crate::Error::Configuration(
                "shape.join_methods must be > 0".to_string(),
            ));
        }
        if self.environment.budget <= 0.0 {
            return Err(crate::Error::Configuration(
                "environment.budget must be > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.environment.beta) {
            return Err(crate::Error::Configuration(
                "environment.beta must be in [0, 1]".to_string(),
            ));
        }
        if self.training.batch_size == 0 {
            return Err(crate::Error::Configuration(
                "training.batch_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
