//! Linear time estimator: one linear regression per lossless plan,
//! mapping `plan_id -> model` rather than a universal wide table.

use crate::plan_algebra::sel_ids_of_plan;
use qplan_core::types::PlanId;
use qplan_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// How a prediction is used: `Analyze` clips to `[0, timeout]` for
/// human-facing reporting, `Application` leaves the raw (possibly
/// negative) value for the MDP environment to consume directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictMode {
    Analyze,
    Application,
}

/// Ordinary least squares with an intercept, solved via the normal
/// equations. Feature count per plan is small (bounded by `d`), so a
/// closed-form solve is simpler and more deterministic than an iterative
/// optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    /// `coefficients[0]` is the intercept; `coefficients[1..]` align with
    /// the plan's `sel_ids_of_plan` order.
    coefficients: Vec<f64>,
}

impl LinearModel {
    pub fn fit(features: &[Vec<f64>], targets: &[f64]) -> Self {
        let n = features.len();
        let k = features.first().map(|f| f.len()).unwrap_or(0);
        let width = k + 1;

        // Design matrix X^T X and X^T y, with an implicit leading 1 column
        // for the intercept.
        let mut xtx = vec![vec![0.0f64; width]; width];
        let mut xty = vec![0.0f64; width];

        for row in 0..n {
            let mut x = vec![1.0f64; width];
            x[1..].copy_from_slice(&features[row]);
            let y = targets[row];
            for i in 0..width {
                xty[i] += x[i] * y;
                for j in 0..width {
                    xtx[i][j] += x[i] * x[j];
                }
            }
        }

        // Ridge-stabilized solve: a tiny diagonal term keeps the normal
        // equations invertible when a feature column is constant (e.g. a
        // single training row, or a selectivity that never varied).
        for i in 0..width {
            xtx[i][i] += 1e-8;
        }

        let coefficients = solve_linear_system(&xtx, &xty).unwrap_or_else(|| vec![0.0; width]);
        Self { coefficients }
    }

    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut acc = self.coefficients.first().copied().unwrap_or(0.0);
        for (coef, feat) in self.coefficients.iter().skip(1).zip(features) {
            acc += coef * feat;
        }
        acc
    }
}

/// Gaussian elimination with partial pivoting. Returns `None` if the
/// system is singular even after ridge stabilization.
fn solve_linear_system(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = a.len();
    let mut m: Vec<Vec<f64>> = a
        .iter()
        .zip(b)
        .map(|(row, &rhs)| {
            let mut r = row.clone();
            r.push(rhs);
            r
        })
        .collect();

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&r1, &r2| {
            m[r1][col].abs().partial_cmp(&m[r2][col].abs()).unwrap()
        })?;
        if m[pivot_row][col].abs() < 1e-12 {
            return None;
        }
        m.swap(col, pivot_row);
        let pivot = m[col][col];
        for v in m[col].iter_mut() {
            *v /= pivot;
        }
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = m[row][col];
            if factor == 0.0 {
                continue;
            }
            for c in 0..=n {
                m[row][c] -= factor * m[col][c];
            }
        }
    }

    Some((0..n).map(|row| m[row][n]).collect())
}

/// A family of per-plan linear regressions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Estimator {
    dimensions: u32,
    join_methods: u64,
    models: HashMap<u64, LinearModel>,
}

impl Estimator {
    pub fn new(dimensions: u32, join_methods: u64) -> Self {
        Self {
            dimensions,
            join_methods,
            models: HashMap::new(),
        }
    }

    fn features_for(&self, plan: PlanId, sel_vector: &[f64]) -> Result<Vec<f64>> {
        let ids = sel_ids_of_plan(plan.0, self.dimensions, self.join_methods)?;
        Ok(ids
            .into_iter()
            .map(|id| sel_vector[(id.0 - 1) as usize])
            .collect())
    }

    /// Fit plan `p`'s model. Rows with `Y >= timeout` are discarded unless
    /// doing so would leave no rows, in which case the full (degraded)
    /// set is used rather than leaving the plan unrepresented.
    pub fn fit(
        &mut self,
        plan: PlanId,
        sel_vectors: &[Vec<f64>],
        times: &[f64],
        timeout: f64,
    ) -> Result<()> {
        if sel_vectors.len() != times.len() {
            return Err(Error::SchemaMismatch(format!(
                "estimator fit: {} selectivity rows vs {} time rows",
                sel_vectors.len(),
                times.len()
            )));
        }

        let features: Result<Vec<Vec<f64>>> = sel_vectors
            .iter()
            .map(|row| self.features_for(plan, row))
            .collect();
        let features = features?;

        let under_timeout: Vec<usize> = (0..times.len()).filter(|&i| times[i] < timeout).collect();
        let (feat_used, y_used): (Vec<Vec<f64>>, Vec<f64>) = if under_timeout.is_empty() {
            (features, times.to_vec())
        } else {
            (
                under_timeout.iter().map(|&i| features[i].clone()).collect(),
                under_timeout.iter().map(|&i| times[i]).collect(),
            )
        };

        self.models.insert(plan.0, LinearModel::fit(&feat_used, &y_used));
        Ok(())
    }

    pub fn predict(
        &self,
        plan: PlanId,
        sel_vector: &[f64],
        timeout: f64,
        mode: PredictMode,
    ) -> Result<f64> {
        let model = self
            .models
            .get(&plan.0)
            .ok_or_else(|| Error::SchemaMismatch(format!("no fitted model for plan {}", plan.0)))?;
        let features = self.features_for(plan, sel_vector)?;
        let raw = model.predict(&features);
        Ok(match mode {
            PredictMode::Analyze => raw.clamp(0.0, timeout),
            PredictMode::Application => raw,
        })
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        for (plan, model) in &self.models {
            let path = dir.join(format!("plan_{plan}.bin"));
            let bytes = bincode::serialize(model)
                .map_err(|e| Error::Serialization(e.to_string()))?;
            std::fs::write(path, bytes)?;
        }
        Ok(())
    }

    pub fn load(dir: &Path, dimensions: u32, join_methods: u64) -> Result<Self> {
        if !dir.exists() {
            return Err(Error::IoMissing(dir.display().to_string()));
        }
        let mut models = HashMap::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let name = file_name.to_string_lossy();
            if let Some(rest) = name.strip_prefix("plan_").and_then(|s| s.strip_suffix(".bin")) {
                if let Ok(plan) = rest.parse::<u64>() {
                    let bytes = std::fs::read(entry.path())?;
                    let model: LinearModel = bincode::deserialize(&bytes)
                        .map_err(|e| Error::Serialization(e.to_string()))?;
                    models.insert(plan, model);
                }
            }
        }
        Ok(Self {
            dimensions,
            join_methods,
            models,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_predict_roundtrip_on_perfectly_linear_data() {
        // plan 4 has a single feature (sel_4); y = 2 + 10*x.
        let sel_vectors = vec![
            vec![0.0, 0.0, 0.1, 0.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.2, 0.0, 0.0, 0.0, 0.0],
            vec![0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 0.0],
        ];
        let times: Vec<f64> = sel_vectors.iter().map(|v| 2.0 + 10.0 * v[2]).collect();
        let mut est = Estimator::new(3, 1);
        est.fit(PlanId(4), &sel_vectors, &times, 100.0).unwrap();
        let pred = est
            .predict(PlanId(4), &sel_vectors[1], 100.0, PredictMode::Application)
            .unwrap();
        assert!((pred - times[1]).abs() < 1e-6, "pred={pred} expected={}", times[1]);
    }

    #[test]
    fn fit_discards_timed_out_rows_unless_all_are() {
        let sel_vectors = vec![vec![0.1], vec![0.2]];
        let times = vec![5.0, 3.0]; // timeout = 4.0, first row discarded
        let mut est = Estimator::new(1, 1); // d=1 -> plan 1 has single feature sel_1
        est.fit(PlanId(1), &sel_vectors, &times, 4.0).unwrap();
        let pred = est
            .predict(PlanId(1), &sel_vectors[0], 4.0, PredictMode::Analyze)
            .unwrap();
        assert!(pred >= 0.0 && pred <= 4.0);
    }

    #[test]
    fn predict_analyze_mode_clips_to_timeout_range() {
        let sel_vectors = vec![vec![0.0], vec![1.0]];
        let times = vec![0.0, 1000.0];
        let mut est = Estimator::new(1, 1);
        est.fit(PlanId(1), &sel_vectors, &times, 4.0).unwrap();
        let pred = est
            .predict(PlanId(1), &[2.0], 4.0, PredictMode::Analyze)
            .unwrap();
        assert!(pred <= 4.0 && pred >= 0.0);
    }

    #[test]
    fn save_and_load_round_trip_is_bitwise_equal() {
        let dir = tempfile::tempdir().unwrap();
        let sel_vectors = vec![vec![0.1, 0.2, 0.15], vec![0.3, 0.1, 0.25]];
        let times = vec![0.5, 0.7];
        let mut est = Estimator::new(2, 1);
        est.fit(PlanId(3), &sel_vectors, &times, 10.0).unwrap();
        est.save(dir.path()).unwrap();

        let loaded = Estimator::load(dir.path(), 2, 1).unwrap();
        for row in &sel_vectors {
            let a = est
                .predict(PlanId(3), row, 10.0, PredictMode::Application)
                .unwrap();
            let b = loaded
                .predict(PlanId(3), row, 10.0, PredictMode::Application)
                .unwrap();
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn missing_model_is_schema_mismatch() {
        let est = Estimator::new(3, 1);
        assert!(est
            .predict(PlanId(5), &[0.0; 7], 10.0, PredictMode::Analyze)
            .is_err());
    }
}
