//! UCB1 (upper confidence bound) bandit.
//!
//! Deterministic: no RNG is involved, ties go to the lowest arm index.

use crate::policy::reject_arm;
use crate::{argmax_first, clamp_reward, ucb_bonus, ArmStats, Learner};

/// UCB1 learner over `K` Bernoulli arms.
#[derive(Debug, Clone)]
pub struct Ucb1 {
    stats: Vec<ArmStats>,
    t: u64,
}

impl Ucb1 {
    pub fn new(n_arms: usize) -> Self {
        Self {
            stats: vec![ArmStats::default(); n_arms],
            t: 0,
        }
    }

    /// Per-arm running statistics.
    pub fn stats(&self) -> &[ArmStats] {
        &self.stats
    }

    /// Total number of updates so far.
    pub fn rounds(&self) -> u64 {
        self.t
    }

    /// Bonus-augmented score per arm (`+inf` for untried arms).
    pub fn scores(&self) -> Vec<f64> {
        self.stats
            .iter()
            .map(|s| s.mean() + ucb_bonus(self.t, s.pulls))
            .collect()
    }

    /// Forget all observations.
    pub fn reset(&mut self) {
        self.stats.iter_mut().for_each(ArmStats::reset);
        self.t = 0;
    }
}

impl Learner for Ucb1 {
    fn n_arms(&self) -> usize {
        self.stats.len()
    }

    fn select(&mut self) -> usize {
        argmax_first(self.scores()).unwrap_or(0)
    }

    fn update(&mut self, arm: usize, reward: f64) {
        if reject_arm("ucb1", arm, self.stats.len()) {
            return;
        }
        self.stats[arm].record(clamp_reward(reward));
        self.t = self.t.saturating_add(1);
    }

    fn expectations(&self) -> Vec<f64> {
        self.stats.iter().map(ArmStats::mean).collect()
    }
}
