//! Replay buffer storing joint transitions for off-policy QMIX updates.

use std::collections::VecDeque;

use rand::Rng;

use super::batch::{AgentSpecific, ExperienceBatch, Shared};
use crate::error::{Result, RlError};

/// A single joint transition stored in the buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Per-agent observations.
    pub observations: Vec<Vec<f32>>,
    /// Per-agent actions.
    pub actions: Vec<usize>,
    /// Per-agent observations after the step.
    pub next_observations: Vec<Vec<f32>>,
    /// Global state (for the mixer).
    pub state: Vec<f32>,
    pub next_state: Vec<f32>,
    /// Cooperative reward.
    pub team_reward: f32,
    /// Whether this was the last step of the episode.
    pub done: bool,
}

/// Bounded FIFO replay buffer.
///
/// Once `capacity` transitions are stored, each push evicts the oldest.
#[derive(Debug)]
pub struct ReplayBuffer {
    capacity: usize,
    transitions: VecDeque<Transition>,
}

impl ReplayBuffer {
    /// Creates an empty buffer holding at most `capacity` transitions.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RlError::InvalidConfig(
                "replay buffer capacity must be positive".into(),
            ));
        }
        Ok(Self {
            capacity,
            transitions: VecDeque::with_capacity(capacity),
        })
    }

    /// Adds a transition, evicting the oldest one when full.
    ///
    /// Every stored transition must describe the same number of agents, and
    /// its per-agent fields must agree on that count.
    pub fn push(&mut self, transition: Transition) -> Result<()> {
        let agents = transition.observations.len();
        if let Some(first) = self.transitions.front() {
            if agents != first.observations.len() {
                return Err(RlError::AgentCountMismatch {
                    expected: first.observations.len(),
                    actual: agents,
                });
            }
        }
        if transition.actions.len() != agents {
            return Err(RlError::BatchSizeMismatch {
                field: "actions",
                expected: agents,
                actual: transition.actions.len(),
            });
        }
        if transition.next_observations.len() != agents {
            return Err(RlError::BatchSizeMismatch {
                field: "next_observations",
                expected: agents,
                actual: transition.next_observations.len(),
            });
        }

        if self.transitions.len() == self.capacity {
            self.transitions.pop_front();
        }
        self.transitions.push_back(transition);
        Ok(())
    }

    /// Clears all stored data.
    pub fn clear(&mut self) {
        self.transitions.clear();
    }

    /// Returns the number of stored transitions.
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Draws `batch_size` transitions uniformly with replacement.
    pub fn sample<R: Rng + ?Sized>(&self, batch_size: usize, rng: &mut R) -> Result<ExperienceBatch> {
        if batch_size == 0 {
            return Err(RlError::EmptyBatch);
        }
        if self.transitions.is_empty() {
            return Err(RlError::InsufficientSamples {
                requested: batch_size,
                available: self.transitions.len(),
            });
        }
        let picked: Vec<&Transition> = (0..batch_size)
            .map(|_| &self.transitions[rng.gen_range(0..self.transitions.len())])
            .collect();
        Ok(collate(&picked))
    }
}

/// Transposes row-major transitions into the `[agent][row]` batch layout.
pub fn collate(transitions: &[&Transition]) -> ExperienceBatch {
    let agents = transitions.first().map_or(0, |t| t.observations.len());

    ExperienceBatch {
        agent_specific: AgentSpecific {
            observation_list: per_agent(transitions, agents, |t, i| t.observations[i].clone()),
            action_id_list: per_agent(transitions, agents, |t, i| t.actions[i]),
            next_observation_list: per_agent(transitions, agents, |t, i| {
                t.next_observations[i].clone()
            }),
        },
        shared: Shared {
            state: transitions.iter().map(|t| t.state.clone()).collect(),
            next_state: transitions.iter().map(|t| t.next_state.clone()).collect(),
            team_reward: transitions.iter().map(|t| t.team_reward).collect(),
            done: transitions.iter().map(|t| t.done).collect(),
        },
    }
}

fn per_agent<T>(
    transitions: &[&Transition],
    agents: usize,
    field: impl Fn(&Transition, usize) -> T,
) -> Vec<Vec<T>> {
    (0..agents)
        .map(|i| transitions.iter().map(|t| field(t, i)).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn transition(tag: f32) -> Transition {
        Transition {
            observations: vec![vec![tag; 2], vec![tag; 3]],
            actions: vec![0, 1],
            next_observations: vec![vec![tag + 1.0; 2], vec![tag + 1.0; 3]],
            state: vec![tag; 4],
            next_state: vec![tag + 1.0; 4],
            team_reward: tag,
            done: false,
        }
    }

    #[test]
    fn buffer_push_and_clear() {
        let mut buf = ReplayBuffer::new(10).unwrap();
        assert!(buf.is_empty());
        buf.push(transition(0.0)).unwrap();
        assert_eq!(buf.len(), 1);
        buf.clear();
        assert!(buf.is_empty());
    }

    #[test]
    fn oldest_transition_is_evicted() {
        let mut buf = ReplayBuffer::new(3).unwrap();
        for i in 0..5 {
            buf.push(transition(i as f32)).unwrap();
        }
        assert_eq!(buf.len(), 3);
        let rewards: Vec<f32> = buf.transitions.iter().map(|t| t.team_reward).collect();
        assert_eq!(rewards, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn sampling_empty_buffer_fails() {
        let buf = ReplayBuffer::new(3).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            buf.sample(4, &mut rng),
            Err(RlError::InsufficientSamples {
                requested: 4,
                available: 0
            })
        ));
    }

    #[test]
    fn sample_has_agent_major_layout() {
        let mut buf = ReplayBuffer::new(16).unwrap();
        for i in 0..8 {
            buf.push(transition(i as f32)).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(42);
        let batch = buf.sample(5, &mut rng).unwrap();

        assert_eq!(batch.len(), 5);
        let a = &batch.agent_specific;
        assert_eq!(a.observation_list.len(), 2);
        assert_eq!(a.observation_list[0].len(), 5);
        assert_eq!(a.observation_list[1][0].len(), 3);
        assert_eq!(a.action_id_list[1], vec![1; 5]);
        for (row, reward) in batch.shared.team_reward.iter().enumerate() {
            assert_eq!(a.observation_list[0][row][0], *reward);
            assert_eq!(batch.shared.next_state[row][0], reward + 1.0);
        }
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(matches!(
            ReplayBuffer::new(0),
            Err(RlError::InvalidConfig(_))
        ));
    }

    #[test]
    fn empty_sample_request_fails() {
        let mut buf = ReplayBuffer::new(4).unwrap();
        buf.push(transition(0.0)).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(buf.sample(0, &mut rng), Err(RlError::EmptyBatch)));
    }

    #[test]
    fn ragged_transition_is_rejected() {
        let mut buf = ReplayBuffer::new(4).unwrap();
        let mut short_actions = transition(0.0);
        short_actions.actions.pop();
        assert!(matches!(
            buf.push(short_actions),
            Err(RlError::BatchSizeMismatch {
                field: "actions",
                expected: 2,
                actual: 1
            })
        ));

        let mut short_next = transition(0.0);
        short_next.next_observations.pop();
        assert!(matches!(
            buf.push(short_next),
            Err(RlError::BatchSizeMismatch {
                field: "next_observations",
                ..
            })
        ));
        assert!(buf.is_empty());

        // Sampling after the rejected pushes returns a well-formed batch.
        buf.push(transition(1.0)).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let batch = buf.sample(2, &mut rng).unwrap();
        assert_eq!(batch.agent_specific.action_id_list.len(), 2);
    }

    #[test]
    fn agent_count_must_match_stored_transitions() {
        let mut buf = ReplayBuffer::new(4).unwrap();
        buf.push(transition(0.0)).unwrap();
        let mut extra_agent = transition(1.0);
        extra_agent.observations.push(vec![1.0]);
        extra_agent.actions.push(0);
        extra_agent.next_observations.push(vec![2.0]);
        assert!(matches!(
            buf.push(extra_agent),
            Err(RlError::AgentCountMismatch {
                expected: 2,
                actual: 3
            })
        ));
        assert_eq!(buf.len(), 1);
    }
}
