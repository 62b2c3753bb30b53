//! Sliding-window UCB for piecewise-stationary arms.
//!
//! Each arm keeps only its most recent `window_size` rewards, so a reward stops
//! influencing the estimate once `window_size` newer rewards for the same arm
//! have arrived. Memory per arm is `O(window_size)`.

use std::collections::VecDeque;

use crate::policy::{check_arms, reject_arm};
use crate::{argmax_first, clamp_reward, ucb_bonus, ArmStats, Error, Learner, Result};

/// Fixed-capacity FIFO of `(round, reward)` with a running sum.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RewardWindow {
    cap: usize,
    buf: VecDeque<(u64, f64)>,
    sum: f64,
}

impl RewardWindow {
    /// Create an empty window with capacity `cap` (minimum 1).
    pub fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            cap,
            buf: VecDeque::with_capacity(cap),
            sum: 0.0,
        }
    }

    /// Maximum number of rewards retained.
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Number of rewards currently retained.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Push a reward observed at `round`, evicting the oldest entry at capacity.
    ///
    /// Returns the evicted entry, if any.
    pub fn push(&mut self, round: u64, reward: f64) -> Option<(u64, f64)> {
        let evicted = if self.buf.len() == self.cap {
            self.buf.pop_front()
        } else {
            None
        };
        if let Some((_, old)) = evicted {
            self.sum -= old;
        }
        self.buf.push_back((round, reward));
        self.sum += reward;
        evicted
    }

    /// Iterate over `(round, reward)` entries, oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &(u64, f64)> + '_ {
        self.buf.iter()
    }

    /// Round of the most recent entry.
    pub fn last_round(&self) -> Option<u64> {
        self.buf.back().map(|e| e.0)
    }

    /// Count and reward sum of the retained entries.
    pub fn stats(&self) -> ArmStats {
        ArmStats {
            pulls: self.buf.len() as u64,
            reward_sum: self.sum.max(0.0),
        }
    }

    pub fn mean(&self) -> f64 {
        self.stats().mean()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.sum = 0.0;
    }
}

/// UCB1 whose per-arm count and mean cover only the arm's recent window.
#[derive(Debug, Clone)]
pub struct SlidingWindowUcb {
    windows: Vec<RewardWindow>,
    t: u64,
}

impl SlidingWindowUcb {
    /// `window_size` must be at least 1.
    pub fn new(n_arms: usize, window_size: usize) -> Result<Self> {
        check_arms(n_arms)?;
        if window_size == 0 {
            return Err(Error::invalid("window_size", "must be >= 1"));
        }
        Ok(Self {
            windows: vec![RewardWindow::new(window_size); n_arms],
            t: 0,
        })
    }

    pub fn window_size(&self) -> usize {
        self.windows.first().map(RewardWindow::cap).unwrap_or(0)
    }

    /// The reward window of `arm`.
    pub fn window(&self, arm: usize) -> Option<&RewardWindow> {
        self.windows.get(arm)
    }

    /// Total number of updates so far.
    pub fn rounds(&self) -> u64 {
        self.t
    }

    /// Windowed bonus-augmented score per arm (`+inf` for empty windows).
    pub fn scores(&self) -> Vec<f64> {
        self.windows
            .iter()
            .map(|w| {
                let s = w.stats();
                s.mean() + ucb_bonus(self.t, s.pulls)
            })
            .collect()
    }
}

impl Learner for SlidingWindowUcb {
    fn n_arms(&self) -> usize {
        self.windows.len()
    }

    fn select(&mut self) -> usize {
        argmax_first(self.scores()).unwrap_or(0)
    }

    fn update(&mut self, arm: usize, reward: f64) {
        if reject_arm("sliding_window", arm, self.windows.len()) {
            return;
        }
        self.windows[arm].push(self.t, clamp_reward(reward));
        self.t = self.t.saturating_add(1);
    }

    fn expectations(&self) -> Vec<f64> {
        // The running sum can drift a few ulps past the true window total.
        self.windows
            .iter()
            .map(|w| w.mean().clamp(0.0, 1.0))
            .collect()
    }
}
