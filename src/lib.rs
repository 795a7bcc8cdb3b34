//! rl-lab - reinforcement-learning research algorithms on tch-rs.
//!
//! Provides the QMIX multi-agent value-decomposition learner and the
//! BMPO model-based RL hyperparameter configuration.

pub mod algorithms;
pub mod error;

pub use algorithms::mbrl::{BmpoConfig, Schedule};
pub use algorithms::qmix::{ExperienceBatch, QmixConfig, QmixTrainer, TargetUpdate};
pub use error::{Result, RlError};
