use thiserror::Error;

/// Error taxonomy for the plan-selection pipeline.
///
/// `QueryTimeout` and `NotPossible` are not programming errors: the former is
/// recorded by a `DatasetAdapter` as the timeout sentinel, the latter is a
/// legitimate terminal MDP outcome. Both are kept here so call sites that
/// need to distinguish "fatal, abort the process" from "recoverable, record
/// in the evaluated row" can match on a single type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing input file: {0}")]
    IoMissing(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("invalid plan id {plan} (valid range 0..={max})")]
    InvalidPlan { plan: u64, max: u64 },

    #[error("unknown environment/network variant: {0}")]
    VersionMismatch(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("query {query} timed out on plan {plan}")]
    QueryTimeout { query: u64, plan: u64 },

    #[error("no viable plan found within budget for query {query}")]
    NotPossible { query: u64 },
}

pub type Result<T> = std::result::Result<T, Error>;
