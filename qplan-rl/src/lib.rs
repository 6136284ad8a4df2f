//! Q-network, agent and bounded memories: the reinforcement learning
//! machinery that sits on top of `qplan-env`'s MDP variants.

pub mod agent;
pub mod model_memory;
pub mod network;
pub mod replay;

pub use agent::Agent;
pub use model_memory::ModelMemory;
pub use network::QNetwork;
pub use replay::{ReplayMemory, Transition};
