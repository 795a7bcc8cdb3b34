//! Configuration for QMIX networks and training.

use serde::{Deserialize, Serialize};
use tch::Device;

use crate::error::{Result, RlError};

/// How the target network follows the main network.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetUpdate {
    /// Copy the main parameters verbatim every `interval` training steps.
    Hard { interval: u64 },
    /// Blend `target ← (1 - τ)·target + τ·main` after every training step.
    Soft { tau: f64 },
}

impl Default for TargetUpdate {
    fn default() -> Self {
        TargetUpdate::Hard { interval: 200 }
    }
}

/// QMIX hyperparameters.
///
/// Agents are identified by their index into `observation_dims` /
/// `action_dims`; both lists must have one entry per agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QmixConfig {
    // --- Shapes ---
    /// Observation length per agent.
    pub observation_dims: Vec<usize>,
    /// Number of discrete actions per agent.
    pub action_dims: Vec<usize>,
    /// Length of the global state vector fed to the mixer.
    pub state_dim: usize,
    /// Width of the per-agent hidden layers and of the mixing embedding.
    pub hidden_dim: usize,
    /// Number of `hidden → hidden` layers after the input projection.
    pub hidden_layer_count: usize,

    // --- Optimization ---
    /// Adam learning rate.
    pub lr: f64,
    /// Discount factor γ.
    pub gamma: f64,
    /// Maximum global gradient norm.
    pub clip_grad_norm: f64,
    pub target_update: TargetUpdate,

    // --- Runtime ---
    /// Run on CUDA when available.
    pub use_cuda: bool,
    /// Seed for parameter initialization.
    pub seed: i64,
}

impl QmixConfig {
    /// Creates a config with default hyperparameters for the given shapes.
    pub fn new(observation_dims: Vec<usize>, action_dims: Vec<usize>, state_dim: usize) -> Self {
        Self {
            observation_dims,
            action_dims,
            state_dim,
            hidden_dim: 64,
            hidden_layer_count: 1,
            lr: 5e-4,
            gamma: 0.99,
            clip_grad_norm: 10.0,
            target_update: TargetUpdate::default(),
            use_cuda: false,
            seed: 0,
        }
    }

    /// Number of agents.
    pub fn agent_count(&self) -> usize {
        self.observation_dims.len()
    }

    /// Device selected by `use_cuda`, falling back to CPU.
    pub fn device(&self) -> Device {
        if self.use_cuda {
            Device::cuda_if_available()
        } else {
            Device::Cpu
        }
    }

    /// Checks shapes and hyperparameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.observation_dims.is_empty() {
            return Err(RlError::InvalidConfig("at least one agent is required".into()));
        }
        if self.action_dims.len() != self.observation_dims.len() {
            return Err(RlError::InvalidConfig(format!(
                "{} observation dims but {} action dims",
                self.observation_dims.len(),
                self.action_dims.len()
            )));
        }
        if let Some(agent) = self.observation_dims.iter().position(|&d| d == 0) {
            return Err(RlError::InvalidConfig(format!(
                "agent {agent} has an empty observation"
            )));
        }
        if let Some(agent) = self.action_dims.iter().position(|&d| d == 0) {
            return Err(RlError::InvalidConfig(format!(
                "agent {agent} has no actions"
            )));
        }
        if self.state_dim == 0 || self.hidden_dim == 0 {
            return Err(RlError::InvalidConfig(
                "state_dim and hidden_dim must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(RlError::InvalidConfig(format!(
                "gamma must lie in [0, 1], got {}",
                self.gamma
            )));
        }
        if self.lr <= 0.0 || self.clip_grad_norm <= 0.0 {
            return Err(RlError::InvalidConfig(
                "lr and clip_grad_norm must be positive".into(),
            ));
        }
        match self.target_update {
            TargetUpdate::Hard { interval: 0 } => Err(RlError::InvalidConfig(
                "hard target update interval must be positive".into(),
            )),
            TargetUpdate::Soft { tau } if !(0.0..=1.0).contains(&tau) => Err(
                RlError::InvalidConfig(format!("tau must lie in [0, 1], got {tau}")),
            ),
            _ => Ok(()),
        }
    }
}
