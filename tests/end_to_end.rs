//! Cross-crate wiring: train a policy against a real environment, evaluate
//! it, then compose the evaluated outcome with a separately-evaluated
//! lossy leg. Each module already has unit coverage for its own scenario;
//! this exercises the seams between qplan-train, qplan-eval and qplan-env
//! together.

use burn::backend::{ndarray::NdArray, Autodiff};
use qplan_core::config::TrainingConfig;
use qplan_core::records::{EvaluatedRecord, LabeledQuery};
use qplan_core::types::QueryId;
use qplan_env::{Environment, OracleEnv};
use qplan_eval::{compose_two_stage, evaluate_policy};
use qplan_train::{FigureOfMeritKind, Trainer};

type TestBackend = Autodiff<NdArray<f32>>;

fn labels() -> Vec<LabeledQuery> {
    vec![LabeledQuery {
        id: QueryId(1),
        times: vec![2.0, 0.8, 1.5, 0.9, 1.2, 0.7, 1.1, 0.6],
    }]
}

#[test]
fn trained_policy_evaluates_to_a_record_per_query() {
    let mut cfg = TrainingConfig::default();
    cfg.max_episodes = 3;
    cfg.batch_size = 2;
    cfg.memory_size = 32;
    cfg.model_memory_capacity = 3;
    cfg.early_stop = false;

    let mut env = OracleEnv::new(3, 1, 1.0, 0.05, labels());
    let device = Default::default();
    let mut trainer = Trainer::<TestBackend>::new(
        cfg,
        device,
        env.num_plans(),
        FigureOfMeritKind::WinRate,
        11,
    );
    let device = Default::default();
    trainer.train(&mut env, &[QueryId(1)]).unwrap();

    let policy = trainer.policy().valid();
    let mut eval_env = OracleEnv::new(3, 1, 1.0, 0.05, labels());
    let records = evaluate_policy(&mut eval_env, &policy, &device, &[QueryId(1)]).unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, QueryId(1));
    assert!(records[0].total_time > 0.0);
}

#[test]
fn evaluated_not_possible_leg_composes_with_a_lossy_leg() {
    let lossless = vec![EvaluatedRecord {
        id: QueryId(7),
        planning_time: 0.3,
        querying_time: 0.0,
        total_time: 0.3,
        win: 0,
        plans_tried: "1_2_3".to_string(),
        reason: "not_possible".to_string(),
        quality: None,
    }];
    let lossy = vec![EvaluatedRecord {
        id: QueryId(7),
        planning_time: 0.2,
        querying_time: 0.4,
        total_time: 0.6,
        win: 1,
        plans_tried: "X2".to_string(),
        reason: "win".to_string(),
        quality: Some(0.8),
    }];

    let composed = compose_two_stage(&lossless, &lossy, 1.0);
    assert_eq!(composed.len(), 1);
    assert_eq!(composed[0].win, 1);
    assert!(composed[0].plans_tried.contains("_X_"));
}
