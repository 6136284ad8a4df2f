//! Trainer: the outer training loop driving an `Environment` with an
//! `Agent` and a `burn`-backed `QNetwork`.

pub mod trainer;

pub use trainer::{FigureOfMeritKind, Trainer};
