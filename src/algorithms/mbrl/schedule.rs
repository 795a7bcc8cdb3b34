//! Linear epoch schedules.
//!
//! A schedule is written as `[start_epoch, end_epoch, start_value, end_value]`
//! and evaluated by linear interpolation between the two epochs.

use serde::{Deserialize, Serialize};

/// Piecewise-linear schedule over training epochs.
///
/// Holds `start_value` up to `start_epoch`, ramps linearly to `end_value`
/// at `end_epoch`, then stays at `end_value`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct Schedule {
    pub start_epoch: f64,
    pub end_epoch: f64,
    pub start_value: f64,
    pub end_value: f64,
}

impl Schedule {
    pub const fn new(start_epoch: f64, end_epoch: f64, start_value: f64, end_value: f64) -> Self {
        Self {
            start_epoch,
            end_epoch,
            start_value,
            end_value,
        }
    }

    /// A schedule that always evaluates to `value`.
    pub const fn constant(value: f64) -> Self {
        Self::new(0.0, 0.0, value, value)
    }

    /// Evaluates the schedule at `epoch`.
    pub fn value_at(&self, epoch: f64) -> f64 {
        if epoch <= self.start_epoch {
            return self.start_value;
        }
        let span = self.end_epoch - self.start_epoch;
        if span <= 0.0 {
            return self.end_value;
        }
        let frac = ((epoch - self.start_epoch) / span).min(1.0);
        self.start_value + frac * (self.end_value - self.start_value)
    }

    /// Evaluates the schedule and truncates it to a rollout length.
    pub fn rollout_length(&self, epoch: usize) -> usize {
        self.value_at(epoch as f64).max(0.0) as usize
    }

    /// Returns true if the epoch range is well ordered.
    pub fn is_valid(&self) -> bool {
        self.end_epoch >= self.start_epoch
            && [
                self.start_epoch,
                self.end_epoch,
                self.start_value,
                self.end_value,
            ]
            .iter()
            .all(|v| v.is_finite())
    }
}

impl From<[f64; 4]> for Schedule {
    fn from(v: [f64; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<Schedule> for [f64; 4] {
    fn from(s: Schedule) -> Self {
        [s.start_epoch, s.end_epoch, s.start_value, s.end_value]
    }
}
