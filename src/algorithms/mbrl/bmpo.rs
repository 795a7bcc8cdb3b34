//! BMPO (Bidirectional Model-based Policy Optimization) hyperparameters.
//!
//! The defaults reproduce the Walker2d-v2 experiment configuration.

use std::path::Path;

use serde::{de, Deserialize, Deserializer, Serialize};

use super::schedule::Schedule;
use crate::error::{Result, RlError};

/// Top-level experiment description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BmpoConfig {
    /// Algorithm name (`"BMPO"`).
    #[serde(rename = "type")]
    pub algorithm: String,
    /// Environment suite, e.g. `"gym"`.
    pub universe: String,
    /// Environment domain, e.g. `"Walker2d"`.
    pub domain: String,
    /// Environment task/version, e.g. `"v2"`.
    pub task: String,
    pub log_dir: String,
    pub exp_name: String,
    /// Algorithm hyperparameters.
    pub kwargs: BmpoKwargs,
}

/// Flat set of BMPO hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BmpoKwargs {
    // --- Loop structure ---
    pub epoch_length: usize,
    pub train_every_n_steps: usize,
    pub n_train_repeat: usize,

    // --- Evaluation ---
    pub eval_render_mode: Option<String>,
    pub eval_n_episodes: usize,
    pub eval_deterministic: bool,

    // --- Policy learning ---
    /// Discount factor γ.
    pub discount: f64,
    /// Soft target update rate τ.
    pub tau: f64,
    pub reward_scale: f64,
    pub target_entropy: f64,

    // --- Model ensemble ---
    /// Environment steps between model refits.
    pub model_train_freq: usize,
    /// Accepts integral floats such as `100000.0`.
    #[serde(deserialize_with = "whole_number")]
    pub rollout_batch_size: usize,
    pub model_retain_epochs: usize,
    pub deterministic: bool,
    /// Ensemble size.
    pub num_networks: usize,
    /// Number of ensemble members used for rollouts.
    pub num_elites: usize,
    /// Fraction of real (vs. model-generated) data per policy batch.
    pub real_ratio: f64,
    pub max_model_t: Option<f64>,

    // --- Bidirectional rollouts ---
    pub forward_rollout_schedule: Schedule,
    pub backward_rollout_schedule: Schedule,
    pub beta_schedule: Schedule,
    pub last_n_epoch: usize,
    pub planning_horizon: usize,
    pub backward_policy_var: f64,
    pub n_initial_exploration_steps: usize,
}

impl BmpoConfig {
    /// Walker2d-v2 configuration.
    pub fn walker2d() -> Self {
        Self {
            algorithm: "BMPO".to_string(),
            universe: "gym".to_string(),
            domain: "Walker2d".to_string(),
            task: "v2".to_string(),
            log_dir: "~/ray_mbpo/".to_string(),
            exp_name: "defaults".to_string(),
            kwargs: BmpoKwargs::default(),
        }
    }

    /// Parses a configuration from a JSON string and validates it.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Serializes the configuration as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        let k = &self.kwargs;
        if k.num_elites > k.num_networks {
            return Err(RlError::InvalidConfig(format!(
                "num_elites ({}) exceeds num_networks ({})",
                k.num_elites, k.num_networks
            )));
        }
        for (name, value) in [
            ("real_ratio", k.real_ratio),
            ("discount", k.discount),
            ("tau", k.tau),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RlError::InvalidConfig(format!(
                    "{name} must lie in [0, 1], got {value}"
                )));
            }
        }
        for (name, schedule) in [
            ("forward_rollout_schedule", &k.forward_rollout_schedule),
            ("backward_rollout_schedule", &k.backward_rollout_schedule),
            ("beta_schedule", &k.beta_schedule),
        ] {
            if !schedule.is_valid() {
                return Err(RlError::InvalidConfig(format!(
                    "{name} has end_epoch before start_epoch: {schedule:?}"
                )));
            }
        }
        Ok(())
    }

    /// Environment identifier in `Domain-task` form, e.g. `Walker2d-v2`.
    pub fn env_id(&self) -> String {
        format!("{}-{}", self.domain, self.task)
    }
}

impl Default for BmpoConfig {
    fn default() -> Self {
        Self::walker2d()
    }
}

impl BmpoKwargs {
    /// Forward and backward rollout lengths at `epoch`.
    pub fn rollout_lengths(&self, epoch: usize) -> (usize, usize) {
        (
            self.forward_rollout_schedule.rollout_length(epoch),
            self.backward_rollout_schedule.rollout_length(epoch),
        )
    }

    /// Backward-model loss weight β at `epoch`.
    pub fn beta(&self, epoch: usize) -> f64 {
        self.beta_schedule.value_at(epoch as f64)
    }
}

impl Default for BmpoKwargs {
    fn default() -> Self {
        Self {
            epoch_length: 1000,
            train_every_n_steps: 1,
            n_train_repeat: 20,
            eval_render_mode: None,
            eval_n_episodes: 1,
            eval_deterministic: true,
            discount: 0.99,
            tau: 5e-3,
            reward_scale: 1.0,
            target_entropy: -3.0,
            model_train_freq: 250,
            rollout_batch_size: 100_000,
            model_retain_epochs: 1,
            deterministic: false,
            num_networks: 7,
            num_elites: 5,
            real_ratio: 0.05,
            max_model_t: None,
            forward_rollout_schedule: Schedule::new(20.0, 150.0, 1.0, 1.0),
            backward_rollout_schedule: Schedule::new(20.0, 150.0, 1.0, 1.0),
            beta_schedule: Schedule::new(0.0, 100.0, 0.01, 0.0),
            last_n_epoch: 10,
            planning_horizon: 1,
            backward_policy_var: 0.01,
            n_initial_exploration_steps: 5000,
        }
    }
}

/// Reads a count written either as an integer or as a float with no
/// fractional part.
fn whole_number<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.fract() != 0.0 || value < 0.0 || value > usize::MAX as f64 {
        return Err(de::Error::invalid_value(
            de::Unexpected::Float(value),
            &"a non-negative whole number",
        ));
    }
    Ok(value as usize)
}
