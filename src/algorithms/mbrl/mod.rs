//! Model-based RL configuration.
//!
//! Only the BMPO hyperparameters live here; the trainer that consumes them
//! is an external collaborator.

pub mod bmpo;
pub mod schedule;

pub use bmpo::{BmpoConfig, BmpoKwargs};
pub use schedule::Schedule;
