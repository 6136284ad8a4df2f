//! MDP environment and state tensor: four variants sharing a
//! common state machine, reward law and termination ladder over the plan
//! algebra and estimator in `qplan-model`.

pub mod combined;
pub mod costs;
pub mod divergence;
pub mod environment;
pub mod oracle;
pub mod outcome;
pub mod predicted;
pub mod sample_level;
pub mod sampling_only;
pub mod state;

pub use combined::CombinedEnv;
pub use divergence::DivergenceEnv;
pub use environment::Environment;
pub use oracle::OracleEnv;
pub use outcome::{reward, Outcome};
pub use predicted::PredictedEnv;
pub use sample_level::SampleLevel;
pub use sampling_only::SamplingOnlyEnv;
pub use state::EnvState;
