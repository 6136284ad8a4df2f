//! Command line interface: `qplan train`/`evaluate`/`compose`/`estimate`,
//! a single `clap`-derive binary with a global `--verbose` flag and
//! `tracing-subscriber` initialized once at the entry point. Library
//! crates never print directly; this binary is the only place
//! user-facing output happens.

use anyhow::Context;
use burn::backend::{ndarray::NdArray, Autodiff};
use clap::{Parser, Subcommand, ValueEnum};
use qplan_core::config::Config;
use qplan_core::csv_io::{read_records, write_records, write_records_with_header};
use qplan_core::records::{
    EvaluatedRecord, LabeledQuery, LabeledSampleQuery, LabeledSelQuery, SampleQueryQuality,
    SelectivityVector,
};
use qplan_core::types::QueryId;
use qplan_env::sample_level::SampleLevel;
use qplan_env::{CombinedEnv, DivergenceEnv, Environment, OracleEnv, PredictedEnv, SamplingOnlyEnv};
use qplan_eval::{compose_two_stage, evaluate_policy};
use qplan_model::estimator::{Estimator, PredictMode};
use qplan_model::plan_algebra::num_lossless_plans;
use qplan_rl::QNetwork;
use qplan_train::{FigureOfMeritKind, Trainer};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::info;

type InferBackend = NdArray<f32>;
type TrainBackend = Autodiff<NdArray<f32>>;

#[derive(Parser)]
#[command(name = "qplan")]
#[command(about = "Adaptive query-plan selector: train, evaluate and compose RL-driven plan policies", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML/JSON/YAML configuration file. Defaults are overridden
    /// by `QPLAN_*` environment variables, then by this file when given.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, short, global = true)]
    verbose: bool,
}

/// Which MDP variant a `train`/`evaluate` run targets.
#[derive(ValueEnum, Clone, Copy, Debug)]
enum Variant {
    /// Lossless, perfect oracle.
    V0,
    /// Lossless, sample-predicted.
    V1,
    /// Lossless, sample-predicted, divergence-aware.
    V2,
    /// Lossless ∪ sampling, combined action space.
    VPlus,
    /// Sampling only.
    VQ,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the training loop for a chosen MDP variant.
    Train {
        #[arg(long, value_enum)]
        variant: Variant,

        /// Where to save the trained policy snapshot.
        #[arg(long)]
        out: PathBuf,

        /// Which figure of merit model-memory convergence is tracked
        /// against; defaults to win-rate for lossless variants and total
        /// reward for sampling variants when omitted.
        #[arg(long, value_enum)]
        figure_of_merit: Option<FigureOfMeritArg>,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Evaluate a trained policy over a labeled query set.
    Evaluate {
        #[arg(long, value_enum)]
        variant: Variant,

        /// Path to a saved policy snapshot (see `train --out`).
        #[arg(long)]
        policy: PathBuf,

        /// Where to write the evaluated CSV file.
        #[arg(long)]
        out: PathBuf,
    },

    /// Two-stage lossless→lossy composition over two evaluated files.
    Compose {
        #[arg(long)]
        lossless: PathBuf,

        #[arg(long)]
        lossy: PathBuf,

        #[arg(long)]
        out: PathBuf,

        #[arg(long)]
        budget: f64,
    },

    /// Fit (or inspect) the linear time estimator for one dataset.
    Estimate {
        /// Print the fitted prediction for one query/plan pair instead of
        /// only fitting and saving.
        #[arg(long)]
        predict_query: Option<u64>,

        #[arg(long)]
        predict_plan: Option<u64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FigureOfMeritArg {
    WinRate,
    TotalReward,
}

impl From<FigureOfMeritArg> for FigureOfMeritKind {
    fn from(v: FigureOfMeritArg) -> Self {
        match v {
            FigureOfMeritArg::WinRate => FigureOfMeritKind::WinRate,
            FigureOfMeritArg::TotalReward => FigureOfMeritKind::TotalReward,
        }
    }
}

fn load_config(path: &Option<PathBuf>) -> anyhow::Result<Config> {
    let cfg = match path {
        Some(p) => Config::from_file(p).with_context(|| format!("loading config {}", p.display()))?,
        None => Config::from_env(),
    };
    cfg.validate().context("validating configuration")?;
    Ok(cfg)
}

fn load_sample_level(cfg: &Config) -> anyhow::Result<SampleLevel> {
    let sel: Vec<SelectivityVector> = read_records(&cfg.paths.sel_file)
        .with_context(|| format!("reading {}", cfg.paths.sel_file.display()))?;
    let sel_times: Vec<LabeledSelQuery> = read_records(&cfg.paths.labeled_sel_file)
        .with_context(|| format!("reading {}", cfg.paths.labeled_sel_file.display()))?;
    let vecs: HashMap<QueryId, Vec<f64>> = sel.into_iter().map(|s| (s.id, s.sel)).collect();
    let times: HashMap<QueryId, Vec<f64>> =
        sel_times.into_iter().map(|s| (s.id, s.sel_times)).collect();
    Ok(SampleLevel::new(0, vecs, times))
}

fn build_env(variant: Variant, cfg: &Config) -> anyhow::Result<Box<dyn Environment>> {
    let shape = &cfg.shape;
    let env_cfg = &cfg.environment;

    let env: Box<dyn Environment> = match variant {
        Variant::V0 => {
            let queries: Vec<LabeledQuery> = read_records(&cfg.paths.labeled_queries_file)?;
            Box::new(OracleEnv::new(
                shape.dimensions as u32,
                shape.join_methods as u64,
                env_cfg.budget,
                env_cfg.unit_cost,
                queries,
            ))
        }
        Variant::V1 => {
            let estimator = Estimator::load(
                &cfg.paths.estimator_dir,
                shape.dimensions as u32,
                shape.join_methods as u64,
            )?;
            let level = load_sample_level(cfg)?;
            Box::new(PredictedEnv::new(
                shape.dimensions as u32,
                shape.join_methods as u64,
                env_cfg.budget,
                estimator,
                vec![level],
                0,
            )?)
        }
        Variant::V2 => {
            let estimator = Estimator::load(
                &cfg.paths.estimator_dir,
                shape.dimensions as u32,
                shape.join_methods as u64,
            )?;
            let level = load_sample_level(cfg)?;
            let labels: Vec<LabeledQuery> = read_records(&cfg.paths.labeled_queries_file)?;
            Box::new(DivergenceEnv::new(
                shape.dimensions as u32,
                shape.join_methods as u64,
                env_cfg.budget,
                estimator,
                vec![level],
                0,
                labels,
            )?)
        }
        Variant::VPlus => {
            let lossless: Vec<LabeledQuery> = read_records(&cfg.paths.labeled_queries_file)?;
            let sampling: Vec<LabeledSampleQuery> = read_records(&cfg.paths.labeled_sample_file)?;
            let quality: Vec<SampleQueryQuality> = read_records(&cfg.paths.sample_quality_file)?;
            Box::new(CombinedEnv::new(
                shape.dimensions as u32,
                shape.join_methods as u64,
                shape.num_sample_ratios(),
                env_cfg.budget,
                env_cfg.unit_cost,
                env_cfg.beta,
                lossless,
                sampling,
                quality,
            )?)
        }
        Variant::VQ => {
            let sampling: Vec<LabeledSampleQuery> = read_records(&cfg.paths.labeled_sample_file)?;
            let quality: Vec<SampleQueryQuality> = read_records(&cfg.paths.sample_quality_file)?;
            Box::new(SamplingOnlyEnv::new(
                shape.dimensions as u32,
                shape.num_sample_ratios(),
                env_cfg.budget,
                env_cfg.beta,
                sampling,
                quality,
            )?)
        }
    };
    Ok(env)
}

fn default_figure_of_merit(variant: Variant) -> FigureOfMeritKind {
    match variant {
        Variant::V0 | Variant::V1 | Variant::V2 => FigureOfMeritKind::WinRate,
        Variant::VPlus | Variant::VQ => FigureOfMeritKind::TotalReward,
    }
}

fn query_ids_of(variant: Variant, cfg: &Config) -> anyhow::Result<Vec<QueryId>> {
    match variant {
        Variant::VQ => {
            let rows: Vec<LabeledSampleQuery> = read_records(&cfg.paths.labeled_sample_file)?;
            Ok(rows.into_iter().map(|r| r.id).collect())
        }
        _ => {
            let rows: Vec<LabeledQuery> = read_records(&cfg.paths.labeled_queries_file)?;
            Ok(rows.into_iter().map(|r| r.id).collect())
        }
    }
}

fn run_train(
    cfg: Config,
    variant: Variant,
    out: PathBuf,
    figure_of_merit: Option<FigureOfMeritArg>,
    seed: u64,
) -> anyhow::Result<()> {
    let mut env = build_env(variant, &cfg)?;
    let query_ids = query_ids_of(variant, &cfg)?;
    let num_plans = env.num_plans();
    let figure_kind = figure_of_merit
        .map(FigureOfMeritKind::from)
        .unwrap_or_else(|| default_figure_of_merit(variant));

    let device = Default::default();
    let mut trainer = Trainer::<TrainBackend>::new(cfg.training.clone(), device, num_plans, figure_kind, seed);
    if let Some(path) = &cfg.training.seed_replay_from {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let transitions = bincode::deserialize(&bytes).context("deserializing seeded replay transitions")?;
        trainer.seed_replay(transitions);
    }

    trainer.train(env.as_mut(), &query_ids)?;

    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)?;
    }
    trainer.policy().valid().save(&out)?;
    write_records_with_header(&cfg.paths.train_trace_file, trainer.trace())?;
    info!(episodes = trainer.trace().len(), out = %out.display(), "training complete");
    Ok(())
}

fn run_evaluate(cfg: Config, variant: Variant, policy_path: PathBuf, out: PathBuf) -> anyhow::Result<()> {
    let mut env = build_env(variant, &cfg)?;
    let query_ids = query_ids_of(variant, &cfg)?;
    let device: <InferBackend as burn::tensor::backend::Backend>::Device = Default::default();
    let policy = QNetwork::<InferBackend>::new(&device, env.num_plans()).load(&policy_path, &device)?;

    let records = evaluate_policy(env.as_mut(), &policy, &device, &query_ids)?;
    write_records(&out, &records)?;
    info!(count = records.len(), out = %out.display(), "evaluation complete");
    Ok(())
}

fn run_compose(lossless: PathBuf, lossy: PathBuf, out: PathBuf, budget: f64) -> anyhow::Result<()> {
    let lossless_records: Vec<EvaluatedRecord> = read_records(&lossless)?;
    let lossy_records: Vec<EvaluatedRecord> = read_records(&lossy)?;
    let composed = compose_two_stage(&lossless_records, &lossy_records, budget);
    write_records(&out, &composed)?;
    info!(count = composed.len(), out = %out.display(), "composition complete");
    Ok(())
}

fn run_estimate(cfg: Config, predict_query: Option<u64>, predict_plan: Option<u64>) -> anyhow::Result<()> {
    let sel: Vec<SelectivityVector> = read_records(&cfg.paths.sel_file)?;
    let queries: Vec<LabeledQuery> = read_records(&cfg.paths.labeled_queries_file)?;
    let sel_by_id: HashMap<QueryId, Vec<f64>> = sel.into_iter().map(|s| (s.id, s.sel)).collect();

    let mut rows = Vec::new();
    for q in &queries {
        if let Some(sel_vec) = sel_by_id.get(&q.id) {
            rows.push((q.id, sel_vec.clone(), q.times.clone()));
        }
    }

    let num_plans = num_lossless_plans(cfg.shape.dimensions as u32, cfg.shape.join_methods as u64);
    let mut estimator = Estimator::new(cfg.shape.dimensions as u32, cfg.shape.join_methods as u64);
    for plan in 1..=num_plans {
        let sel_vectors: Vec<Vec<f64>> = rows.iter().map(|(_, s, _)| s.clone()).collect();
        let times: anyhow::Result<Vec<f64>> = rows
            .iter()
            .map(|(_, _, t)| t.get(plan as usize).copied().context("missing time for plan"))
            .collect();
        estimator.fit(qplan_core::types::PlanId(plan), &sel_vectors, &times?, cfg.environment.budget)?;
    }
    estimator.save(&cfg.paths.estimator_dir)?;
    info!(plans = num_plans, dir = %cfg.paths.estimator_dir.display(), "estimator fit complete");

    if let (Some(qid), Some(plan)) = (predict_query, predict_plan) {
        let sel_vec = sel_by_id
            .get(&QueryId(qid))
            .context("no selectivity row for requested query")?;
        let pred = estimator.predict(
            qplan_core::types::PlanId(plan),
            sel_vec,
            cfg.environment.budget,
            PredictMode::Analyze,
        )?;
        println!("predicted time for query {qid} plan {plan}: {pred:.6}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();
    } else {
        tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();
    }

    let cfg = load_config(&cli.config)?;

    match cli.command {
        Commands::Train { variant, out, figure_of_merit, seed } => {
            run_train(cfg, variant, out, figure_of_merit, seed)?;
        }
        Commands::Evaluate { variant, policy, out } => {
            run_evaluate(cfg, variant, policy, out)?;
        }
        Commands::Compose { lossless, lossy, out, budget } => {
            run_compose(lossless, lossy, out, budget)?;
        }
        Commands::Estimate { predict_query, predict_plan } => {
            run_estimate(cfg, predict_query, predict_plan)?;
        }
    }

    Ok(())
}
