//! Decentralized action selection over per-agent Q-values.

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::algorithms::mbrl::Schedule;

/// Index of the largest Q-value; ties resolve to the lowest index.
pub fn argmax(q_values: &[f32]) -> usize {
    q_values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, best_q), (i, &q)| {
            if q > best_q {
                (i, q)
            } else {
                (best, best_q)
            }
        })
        .0
}

/// Epsilon-greedy exploration.
///
/// Each agent independently takes a uniformly random action with
/// probability ε and its greedy action otherwise. ε follows a linear
/// schedule over the number of selection calls.
pub struct EpsilonGreedy {
    schedule: Schedule,
    steps: usize,
    rng: StdRng,
}

impl EpsilonGreedy {
    /// Creates a policy with a fixed ε.
    pub fn new(epsilon: f64, seed: u64) -> Self {
        Self::with_schedule(Schedule::constant(epsilon), seed)
    }

    /// Creates a policy whose ε is annealed by `schedule` over steps.
    pub fn with_schedule(schedule: Schedule, seed: u64) -> Self {
        Self {
            schedule,
            steps: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Current exploration rate.
    pub fn epsilon(&self) -> f64 {
        self.schedule.value_at(self.steps as f64).clamp(0.0, 1.0)
    }

    /// Selects one action per agent from `q_list` and advances the schedule.
    pub fn select_actions(&mut self, q_list: &[Vec<f32>]) -> Vec<usize> {
        let epsilon = self.epsilon();
        self.steps += 1;
        q_list
            .iter()
            .map(|q| {
                if !q.is_empty() && self.rng.gen_bool(epsilon) {
                    self.rng.gen_range(0..q.len())
                } else {
                    argmax(q)
                }
            })
            .collect()
    }

    /// Greedy actions, without exploration or schedule progress.
    pub fn greedy_actions(q_list: &[Vec<f32>]) -> Vec<usize> {
        q_list.iter().map(|q| argmax(q)).collect()
    }

    pub fn name(&self) -> &str {
        "epsilon-greedy"
    }
}
