//! Per-sample-size selectivity probe costs (the *sel costs file*): one row
//! per sample size, one column per selectivity id. The file has a header
//! row and a variable number of selectivity columns depending on the
//! filter dimension `d`, so it is read with a raw `csv::Reader` rather
//! than a fixed-width `serde` record like the rest of `qplan-core::csv_io`.

use qplan_core::{Error, Result};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct SampleCosts {
    sample_sizes: Vec<u64>,
    /// `costs[sample_idx][sel_id - 1]`.
    costs: Vec<Vec<f64>>,
}

impl SampleCosts {
    pub fn new(sample_sizes: Vec<u64>, costs: Vec<Vec<f64>>) -> Result<Self> {
        if sample_sizes.len() != costs.len() {
            return Err(Error::SchemaMismatch(format!(
                "{} sample sizes vs {} cost rows",
                sample_sizes.len(),
                costs.len()
            )));
        }
        Ok(Self { sample_sizes, costs })
    }

    /// Loads a *sel costs file*: header row `sample_size,cost(sel_1),...`
    /// then one row per sample size.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::IoMissing(path.display().to_string()));
        }
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(path)?;
        let mut sample_sizes = Vec::new();
        let mut costs = Vec::new();
        for result in reader.records() {
            let record = result?;
            let mut fields = record.iter();
            let size: u64 = fields
                .next()
                .ok_or_else(|| Error::SchemaMismatch("empty sel costs row".into()))?
                .parse()
                .map_err(|_| Error::SchemaMismatch("non-numeric sample_size".into()))?;
            let row: Result<Vec<f64>> = fields
                .map(|f| {
                    f.parse::<f64>()
                        .map_err(|_| Error::SchemaMismatch("non-numeric cost value".into()))
                })
                .collect();
            sample_sizes.push(size);
            costs.push(row?);
        }
        Self::new(sample_sizes, costs)
    }

    pub fn num_sample_sizes(&self) -> usize {
        self.sample_sizes.len()
    }

    pub fn sample_size(&self, sample_idx: usize) -> Option<u64> {
        self.sample_sizes.get(sample_idx).copied()
    }

    pub fn cost(&self, sample_idx: usize, sel_id: u64) -> f64 {
        self.costs
            .get(sample_idx)
            .and_then(|row| row.get((sel_id - 1) as usize))
            .copied()
            .unwrap_or(0.0)
    }
}
