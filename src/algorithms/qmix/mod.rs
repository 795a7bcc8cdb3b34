//! QMIX: monotonic value decomposition for cooperative multi-agent RL.
//!
//! Per-agent Q-networks act on local observations; a state-conditioned
//! mixing hypernetwork with non-negative weights combines their chosen
//! Q-values into a joint value that is trained against a TD target from a
//! lagged target network.

pub mod batch;
pub mod buffer;
pub mod config;
pub mod network;
pub mod policy;
pub mod trainer;

pub use batch::{AgentSpecific, ExperienceBatch, Shared};
pub use buffer::{ReplayBuffer, Transition};
pub use config::{QmixConfig, TargetUpdate};
pub use network::{AgentQNetwork, MixingNetwork, QmixNetwork};
pub use policy::EpsilonGreedy;
pub use trainer::{checkpoint_path, Phase, QmixTrainer};
