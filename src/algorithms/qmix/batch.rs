//! Experience batch contract between a replay buffer and the trainer.
//!
//! Per-agent data is indexed `[agent][row]`, shared data `[row]`.

use tch::{Device, Kind, Tensor};

use super::config::QmixConfig;
use crate::error::{Result, RlError};

/// Per-agent sequences of a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentSpecific {
    /// `observation_list[agent][row]` is that agent's observation.
    pub observation_list: Vec<Vec<Vec<f32>>>,
    /// `action_id_list[agent][row]` is the action the agent took.
    pub action_id_list: Vec<Vec<usize>>,
    pub next_observation_list: Vec<Vec<Vec<f32>>>,
}

/// Team-level data of a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shared {
    pub state: Vec<Vec<f32>>,
    pub next_state: Vec<Vec<f32>>,
    pub team_reward: Vec<f32>,
    pub done: Vec<bool>,
}

/// A batch of joint transitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExperienceBatch {
    pub agent_specific: AgentSpecific,
    pub shared: Shared,
}

/// Device tensors built from a validated [`ExperienceBatch`].
pub(crate) struct BatchTensors {
    pub observations: Vec<Tensor>,
    /// One `[batch]` Int64 tensor per agent.
    pub actions: Vec<Tensor>,
    pub next_observations: Vec<Tensor>,
    pub state: Tensor,
    pub next_state: Tensor,
    /// `[batch, 1]`
    pub team_reward: Tensor,
    /// `[batch, 1]`, `1.0` where the episode continues.
    pub not_done: Tensor,
}

impl ExperienceBatch {
    /// Number of rows, taken from the team reward column.
    pub fn len(&self) -> usize {
        self.shared.team_reward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks every field against `config` and returns the batch size.
    pub fn validate(&self, config: &QmixConfig) -> Result<usize> {
        let n = self.len();
        if n == 0 {
            return Err(RlError::EmptyBatch);
        }
        let agents = config.agent_count();
        let a = &self.agent_specific;
        for list_len in [
            a.observation_list.len(),
            a.action_id_list.len(),
            a.next_observation_list.len(),
        ] {
            if list_len != agents {
                return Err(RlError::AgentCountMismatch {
                    expected: agents,
                    actual: list_len,
                });
            }
        }

        for agent in 0..agents {
            let obs_dim = config.observation_dims[agent];
            let action_dim = config.action_dims[agent];
            check_rows("observation_list", &a.observation_list[agent], n)?;
            check_rows("next_observation_list", &a.next_observation_list[agent], n)?;
            check_rows("action_id_list", &a.action_id_list[agent], n)?;
            for obs in a.observation_list[agent]
                .iter()
                .chain(a.next_observation_list[agent].iter())
            {
                if obs.len() != obs_dim {
                    return Err(RlError::DimensionMismatch {
                        agent,
                        expected: obs_dim,
                        actual: obs.len(),
                    });
                }
            }
            if let Some(&action) = a.action_id_list[agent].iter().find(|&&x| x >= action_dim) {
                return Err(RlError::ActionOutOfRange {
                    agent,
                    action,
                    action_dim,
                });
            }
        }

        let s = &self.shared;
        check_rows("state", &s.state, n)?;
        check_rows("next_state", &s.next_state, n)?;
        check_rows("done", &s.done, n)?;
        if let Some(row) = s
            .state
            .iter()
            .chain(s.next_state.iter())
            .find(|row| row.len() != config.state_dim)
        {
            return Err(RlError::StateDimensionMismatch {
                expected: config.state_dim,
                actual: row.len(),
            });
        }

        Ok(n)
    }

    /// Validates the batch and copies it to `device`.
    pub(crate) fn to_tensors(&self, config: &QmixConfig, device: Device) -> Result<BatchTensors> {
        let n = self.validate(config)?;
        let a = &self.agent_specific;
        let s = &self.shared;

        let observations = a
            .observation_list
            .iter()
            .map(|rows| rows_to_tensor(rows, device))
            .collect();
        let next_observations = a
            .next_observation_list
            .iter()
            .map(|rows| rows_to_tensor(rows, device))
            .collect();
        let actions = a
            .action_id_list
            .iter()
            .map(|ids| {
                let ids: Vec<i64> = ids.iter().map(|&x| x as i64).collect();
                Tensor::from_slice(&ids).to_device(device)
            })
            .collect();

        let not_done: Vec<f32> = s.done.iter().map(|&d| if d { 0.0 } else { 1.0 }).collect();

        Ok(BatchTensors {
            observations,
            actions,
            next_observations,
            state: rows_to_tensor(&s.state, device),
            next_state: rows_to_tensor(&s.next_state, device),
            team_reward: Tensor::from_slice(&s.team_reward)
                .view([n as i64, 1])
                .to_device(device),
            not_done: Tensor::from_slice(&not_done)
                .view([n as i64, 1])
                .to_device(device),
        })
    }
}

fn check_rows<T>(field: &'static str, rows: &[T], expected: usize) -> Result<()> {
    if rows.len() != expected {
        return Err(RlError::BatchSizeMismatch {
            field,
            expected,
            actual: rows.len(),
        });
    }
    Ok(())
}

/// Stacks equally sized rows into a `[rows, cols]` Float tensor.
pub(crate) fn rows_to_tensor(rows: &[Vec<f32>], device: Device) -> Tensor {
    let cols = rows.first().map_or(0, |r| r.len());
    let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    Tensor::from_slice(&flat)
        .view([rows.len() as i64, cols as i64])
        .to_kind(Kind::Float)
        .to_device(device)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a batch of `n` rows filled with deterministic values.
    pub(crate) fn synthetic_batch(config: &QmixConfig, n: usize) -> ExperienceBatch {
        let agents = config.agent_count();
        let obs = |agent: usize, row: usize, shift: f32| -> Vec<f32> {
            (0..config.observation_dims[agent])
                .map(|k| ((agent + row + k) as f32 * 0.37 + shift).sin())
                .collect()
        };
        let state = |row: usize, shift: f32| -> Vec<f32> {
            (0..config.state_dim)
                .map(|k| ((row * 3 + k) as f32 * 0.21 + shift).cos())
                .collect()
        };

        ExperienceBatch {
            agent_specific: AgentSpecific {
                observation_list: (0..agents)
                    .map(|i| (0..n).map(|r| obs(i, r, 0.0)).collect())
                    .collect(),
                action_id_list: (0..agents)
                    .map(|i| (0..n).map(|r| (r + i) % config.action_dims[i]).collect())
                    .collect(),
                next_observation_list: (0..agents)
                    .map(|i| (0..n).map(|r| obs(i, r, 1.0)).collect())
                    .collect(),
            },
            shared: Shared {
                state: (0..n).map(|r| state(r, 0.0)).collect(),
                next_state: (0..n).map(|r| state(r, 1.0)).collect(),
                team_reward: (0..n).map(|r| (r % 3) as f32 - 1.0).collect(),
                done: (0..n).map(|r| r % 4 == 3).collect(),
            },
        }
    }

    fn config() -> QmixConfig {
        QmixConfig::new(vec![3, 5], vec![2, 4], 6)
    }

    #[test]
    fn valid_batch_reports_size() {
        let cfg = config();
        let batch = synthetic_batch(&cfg, 10);
        assert_eq!(batch.validate(&cfg).unwrap(), 10);
    }

    #[test]
    fn empty_batch_is_rejected() {
        let cfg = config();
        let batch = ExperienceBatch::default();
        assert!(matches!(batch.validate(&cfg), Err(RlError::EmptyBatch)));
    }

    #[test]
    fn wrong_agent_count_is_rejected() {
        let cfg = config();
        let mut batch = synthetic_batch(&cfg, 4);
        batch.agent_specific.observation_list.pop();
        assert!(matches!(
            batch.validate(&cfg),
            Err(RlError::AgentCountMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn wrong_observation_length_is_rejected() {
        let cfg = config();
        let mut batch = synthetic_batch(&cfg, 4);
        batch.agent_specific.next_observation_list[1][2].push(0.0);
        assert!(matches!(
            batch.validate(&cfg),
            Err(RlError::DimensionMismatch {
                agent: 1,
                expected: 5,
                actual: 6
            })
        ));
    }

    #[test]
    fn out_of_range_action_is_rejected() {
        let cfg = config();
        let mut batch = synthetic_batch(&cfg, 4);
        batch.agent_specific.action_id_list[0][1] = 2;
        assert!(matches!(
            batch.validate(&cfg),
            Err(RlError::ActionOutOfRange { agent: 0, .. })
        ));
    }

    #[test]
    fn short_state_column_is_rejected() {
        let cfg = config();
        let mut batch = synthetic_batch(&cfg, 4);
        batch.shared.next_state.pop();
        assert!(matches!(
            batch.validate(&cfg),
            Err(RlError::BatchSizeMismatch {
                field: "next_state",
                ..
            })
        ));
    }

    #[test]
    fn tensors_have_expected_shapes() {
        let cfg = config();
        let batch = synthetic_batch(&cfg, 4);
        let t = batch.to_tensors(&cfg, Device::Cpu).unwrap();
        assert_eq!(t.observations[1].size(), &[4, 5]);
        assert_eq!(t.actions[0].size(), &[4]);
        assert_eq!(t.actions[0].kind(), Kind::Int64);
        assert_eq!(t.state.size(), &[4, 6]);
        assert_eq!(t.team_reward.size(), &[4, 1]);
        // row 3 is terminal
        assert_eq!(t.not_done.double_value(&[3, 0]), 0.0);
        assert_eq!(t.not_done.double_value(&[0, 0]), 1.0);
    }
}
