//! Dataset adapter: a polymorphic interface over the capability set
//! that talks to the relational engine. This crate owns the contract, not
//! the engine; concrete adapters (SQL dialect, database driver, CSV
//! loading) are external collaborators.

use async_trait::async_trait;
use qplan_core::records::QueryRecord;
use qplan_core::types::{PlanId, SamplingPlanId, SelId};
use qplan_core::Result;
use std::path::Path;

/// One row of a materialized query result, used only for quality
/// comparison (set similarity), never interpreted by the planner.
pub type ResultRow = Vec<String>;

/// A materialized query result set, or `Timeout` when the adapter's
/// configured statement timeout fired.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Rows(Vec<ResultRow>),
    Timeout,
}

#[async_trait]
pub trait DatasetAdapter: Send + Sync {
    /// Load query records from a dataset-specific queries file.
    fn load_queries(&self, path: &Path) -> Result<Vec<QueryRecord>>;

    /// Persist query records, e.g. after filtering or sampling a dataset.
    fn dump_queries(&self, path: &Path, queries: &[QueryRecord]) -> Result<()>;

    /// Measure wall-clock time for executing `query` under `plan`'s hint.
    /// On adapter timeout, the returned time equals the configured
    /// statement timeout (the sentinel), never an error.
    async fn time_query(&self, dimensions: u32, query: &QueryRecord, plan: PlanId) -> Result<f64>;

    /// Measure wall-clock time for a selectivity probe over `filter` on
    /// `table` (possibly a sampled copy of the base table).
    async fn time_sel_query(
        &self,
        dimensions: u32,
        query: &QueryRecord,
        filter: SelId,
        table: &str,
    ) -> Result<f64>;

    /// `count(filter) / table_size`, a value in `[0, 1]`.
    async fn sel_query(
        &self,
        dimensions: u32,
        query: &QueryRecord,
        filter: SelId,
        table: &str,
        table_size: u64,
    ) -> Result<f64>;

    /// Execute a sampling plan and return both its wall-clock time and its
    /// materialized result, for quality comparison against the canonical
    /// result.
    async fn time_sampling_query(
        &self,
        dimensions: u32,
        query: &QueryRecord,
        cardinality: u32,
        plan: SamplingPlanId,
    ) -> Result<(f64, QueryResult)>;

    /// Build the SQL text for `query`, optionally against a named table
    /// (used when probing a sampled copy rather than the base table).
    fn construct_sql(&self, query: &QueryRecord, dimensions: u32, table: Option<&str>) -> String;

    /// Build a bitmap-scan hint listing exactly the indexes whose bit is
    /// set in `plan`, plus an optional join-method hint derived from
    /// `reduce_join_method`. Never emits an empty bitmap-scan hint.
    fn construct_hint(&self, dimensions: u32, plan: PlanId) -> String;
}
