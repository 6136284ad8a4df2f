//! Common MDP environment contract shared by the four variants.

use crate::outcome::Outcome;
use crate::state::EnvState;
use qplan_core::types::QueryId;
use qplan_core::Result;

pub trait Environment {
    /// Start a fresh episode over `query`. Fails if the query has no
    /// ground-truth label loaded.
    fn reset(&mut self, query: QueryId) -> Result<()>;

    /// Action cardinality `P` (plan ids the agent may choose from).
    fn num_plans(&self) -> usize;

    /// Remaining untried actions this episode.
    fn num_actions_available(&self) -> usize;

    /// The current flattened state, rebuilt fresh from live fields.
    fn state(&self) -> EnvState;

    /// Fire `action` unconditionally — there is no illegal action, the
    /// agent is expected to filter repeats. Returns the step reward.
    fn take_action(&mut self, action: u64) -> Result<f64>;

    /// `Some` once the episode has terminated.
    fn done(&self) -> Option<&Outcome>;

    /// Actions committed so far this episode, in order.
    fn tried_plans(&self) -> &[u64];
}
