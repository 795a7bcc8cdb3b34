//! QMIX trainer.
//!
//! Implements Centralized Training, Decentralized Execution (CTDE):
//! - Each agent greedily acts on its own Q-network from local observations.
//! - The mixer combines per-agent Q-values into a joint value using the
//!   global state, and only the joint value is regressed on the TD target.

use std::path::{Path, PathBuf};

use tch::{nn, nn::OptimizerConfig, Kind, Reduction, Tensor};
use tracing::{debug, info};

use super::batch::{rows_to_tensor, ExperienceBatch};
use super::config::{QmixConfig, TargetUpdate};
use super::network::QmixNetwork;
use crate::error::{Result, RlError};

/// Which kind of computation the trainer last performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No gradient tracking, single-step Q-value generation.
    Inference,
    /// Full batch forward/backward pass.
    Training,
}

/// Returns the checkpoint path derived from `base`: `{base}-net.pkl`.
pub fn checkpoint_path(base: impl AsRef<Path>) -> PathBuf {
    let mut name = base.as_ref().as_os_str().to_owned();
    name.push("-net.pkl");
    PathBuf::from(name)
}

/// QMIX trainer owning a main network, its lagged target copy and the
/// optimizer over the main network's parameters.
pub struct QmixTrainer {
    /// Network trained by gradient descent.
    main: QmixNetwork,
    /// Lagged copy, updated only by hard/soft synchronization.
    target: QmixNetwork,
    config: QmixConfig,
    optimizer: nn::Optimizer,
    phase: Phase,
    train_steps: u64,
}

impl QmixTrainer {
    /// Creates a trainer.
    ///
    /// Seeds torch, initializes the main network (Xavier-normal weights,
    /// zero biases), hard-copies it into the target and freezes the target.
    pub fn new(config: QmixConfig) -> Result<Self> {
        config.validate()?;
        let device = config.device();
        tch::manual_seed(config.seed);
        if device.is_cuda() {
            tch::Cuda::manual_seed_all(config.seed as u64);
        }

        let main = QmixNetwork::new(&config, device);
        let mut target = QmixNetwork::new(&config, device);
        target.var_store_mut().copy(main.var_store())?;
        target.var_store_mut().freeze();

        let optimizer = nn::Adam::default().build(main.var_store(), config.lr)?;

        info!(
            agents = config.agent_count(),
            state_dim = config.state_dim,
            ?device,
            target_update = ?config.target_update,
            "created QMIX trainer"
        );

        Ok(Self {
            main,
            target,
            config,
            optimizer,
            phase: Phase::Inference,
            train_steps: 0,
        })
    }

    /// Computes per-agent Q-values for action selection.
    ///
    /// Takes one observation vector per agent and returns one Q-value vector
    /// per agent, sized to that agent's action count. No gradients are
    /// recorded.
    pub fn generate_q_list(&mut self, observations: &[Vec<f32>]) -> Result<Vec<Vec<f32>>> {
        self.phase = Phase::Inference;
        let agents = self.config.agent_count();
        if observations.len() != agents {
            return Err(RlError::AgentCountMismatch {
                expected: agents,
                actual: observations.len(),
            });
        }
        for (agent, (obs, &dim)) in observations
            .iter()
            .zip(self.config.observation_dims.iter())
            .enumerate()
        {
            if obs.len() != dim {
                return Err(RlError::DimensionMismatch {
                    agent,
                    expected: dim,
                    actual: obs.len(),
                });
            }
        }

        let device = self.main.device();
        let q_list = tch::no_grad(|| {
            let obs: Vec<Tensor> = observations
                .iter()
                .map(|o| rows_to_tensor(std::slice::from_ref(o), device))
                .collect();
            self.main.agent_q_values(&obs, false)
        });

        q_list
            .into_iter()
            .map(|q| {
                let q = q.squeeze_dim(0).to_device(tch::Device::Cpu);
                Ok(Vec::<f32>::try_from(&q)?)
            })
            .collect()
    }

    /// Runs one gradient step on `batch` and returns the loss.
    ///
    /// The TD target `r + γ·(1 - done)·Q_tot'(s', argmax)` is computed with
    /// the target network and detached from the graph.
    pub fn train(&mut self, batch: &ExperienceBatch) -> Result<f64> {
        self.phase = Phase::Training;
        let device = self.main.device();
        let t = batch.to_tensors(&self.config, device)?;

        let main_q = self.main.agent_q_values(&t.observations, true);
        let chosen: Vec<Tensor> = main_q
            .iter()
            .zip(t.actions.iter())
            .zip(self.config.action_dims.iter())
            .map(|((q, actions), &action_dim)| {
                let one_hot = actions.one_hot(action_dim as i64).to_kind(Kind::Float);
                (q * one_hot).sum_dim_intlist([1i64].as_slice(), true, Kind::Float)
            })
            .collect();
        let chosen_total = self.main.mix(&chosen, &t.state);

        let td_target = tch::no_grad(|| {
            let target_q = self.target.agent_q_values(&t.next_observations, false);
            let best: Vec<Tensor> = target_q.iter().map(|q| q.max_dim(1, true).0).collect();
            let target_total = self.target.mix(&best, &t.next_state);
            &t.team_reward + t.not_done * self.config.gamma * target_total
        });

        let loss = chosen_total.mse_loss(&td_target.detach(), Reduction::Mean);

        self.optimizer.zero_grad();
        loss.backward();
        self.optimizer.clip_grad_norm(self.config.clip_grad_norm);
        self.optimizer.step();

        self.train_steps += 1;
        let loss = f64::try_from(&loss)?;
        debug!(step = self.train_steps, loss, "QMIX train step");

        self.update_target()?;
        Ok(loss)
    }

    /// Applies the configured target-update strategy after a training step.
    fn update_target(&mut self) -> Result<()> {
        match self.config.target_update {
            TargetUpdate::Hard { interval } => {
                if self.train_steps % interval == 0 {
                    self.sync_target_hard()?;
                }
            }
            TargetUpdate::Soft { tau } => self.sync_target_soft(tau),
        }
        Ok(())
    }

    /// Copies every main-network parameter into the target network.
    pub fn sync_target_hard(&mut self) -> Result<()> {
        self.target.var_store_mut().copy(self.main.var_store())?;
        debug!(step = self.train_steps, "hard target sync");
        Ok(())
    }

    /// Blends the target towards the main network: `(1 - τ)·target + τ·main`.
    pub fn sync_target_soft(&mut self, tau: f64) {
        let main_vars = self.main.var_store().variables();
        tch::no_grad(|| {
            for (name, mut var) in self.target.var_store().variables() {
                let src = &main_vars[&name];
                let blended = &var * (1.0 - tau) + src * tau;
                var.copy_(&blended);
            }
        });
    }

    /// Writes the main network's parameters to `{base}-net.pkl`.
    pub fn save_model(&self, base: impl AsRef<Path>) -> Result<()> {
        let path = checkpoint_path(base);
        self.main.var_store().save(&path)?;
        info!(path = %path.display(), "saved QMIX weights");
        Ok(())
    }

    /// Loads the main network from `{base}-net.pkl` and hard-syncs the
    /// target.
    ///
    /// The checkpoint must come from a network with identical agent count
    /// and dimensions.
    pub fn load_weights(&mut self, base: impl AsRef<Path>) -> Result<()> {
        let path = checkpoint_path(base);
        self.main.var_store_mut().load(&path)?;
        self.sync_target_hard()?;
        info!(path = %path.display(), "loaded QMIX weights");
        Ok(())
    }

    pub fn config(&self) -> &QmixConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of completed gradient steps.
    pub fn train_steps(&self) -> u64 {
        self.train_steps
    }

    pub fn main_network(&self) -> &QmixNetwork {
        &self.main
    }

    pub fn target_network(&self) -> &QmixNetwork {
        &self.target
    }
}
