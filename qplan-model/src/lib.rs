//! Plan representation, dataset access, and time estimation: the static
//! model layer the MDP environment is built on top of.

pub mod adapter;
pub mod estimator;
pub mod plan_algebra;
pub mod quality;

pub use adapter::{DatasetAdapter, QueryResult, ResultRow};
pub use estimator::{Estimator, LinearModel, PredictMode};
pub use quality::jaccard_quality;
