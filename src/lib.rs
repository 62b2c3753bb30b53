//! `banditlab`: online bandit learners and a combinatorial reward oracle.
//!
//! Designed for Bernoulli arm-selection experiments: an agent repeatedly picks
//! one of `K` arms, observes a `{0, 1}` reward, and must trade exploration for
//! exploitation while the arms' success probabilities may drift.  The learners'
//! per-arm estimates can then be assembled into edge-activation tables and scored
//! against ground truth by a Monte-Carlo **clairvoyant** evaluator built from
//! influence propagation and exact bipartite matching.
//!
//! **Goals:**
//! - **Seedable by default**: every randomized learner, environment, and evaluator
//!   owns its own `StdRng`; same seed + same inputs → same run.
//! - **Uniform contract**: every learner implements [`Learner`]
//!   (`select` / `update` / `expectations`), and [`AnyLearner`] is the closed set
//!   of variants built from a [`LearnerConfig`].
//! - **Non-stationarity friendly**: sliding windows ([`SlidingWindowUcb`]) and
//!   explicit change detection with per-arm restarts ([`CusumUcb`]).
//!
//! **Learners:**
//! - [`Ucb1`]: `mean + sqrt(2 ln t / n)`, untried arms first, lowest-index ties.
//! - [`ThompsonSampling`]: Beta posteriors, seedable sampling.
//! - [`SlidingWindowUcb`]: UCB1 over each arm's most recent `window_size` rewards.
//! - [`CusumUcb`]: UCB1 with forced exploration and two-sided CUSUM restarts.
//! - [`Exp3`]: exponential weights for adversarial rewards.
//! - [`Contextual`]: any learner plus the latest arm → context assignment.
//!
//! **Oracle:**
//! - [`simulate_episode`] / [`greedy_seeds`]: independent-cascade propagation.
//! - [`solve`] / [`solve_with_capacity`]: Hungarian minimum-cost assignment.
//! - [`clairvoyant`]: seeds from an estimated table, activation under the true
//!   table, customers matched to products, realized reward mean and std-dev.
//!
//! **Non-goals:**
//! - No plotting, persistence format, or distributed execution.
//! - Clustering is pluggable ([`Clusterer`]); [`KMeans`] is a small default.
//!
//! # Example
//!
//! ```rust
//! use banditlab::{BernoulliEnv, Learner, RewardSource, Ucb1};
//!
//! let mut env = BernoulliEnv::new(vec![0.2, 0.8], 7).unwrap();
//! let mut ucb = Ucb1::new(2);
//! for _ in 0..500 {
//!     let arm = ucb.select();
//!     let r = env.observe(arm);
//!     ucb.update(arm, r);
//! }
//! let means = ucb.expectations();
//! assert!(means[1] > means[0]);
//! ```
//!
//! ## Related work
//!
//! Auer, Cesa-Bianchi & Fischer (2002) for UCB1; Garivier & Moulines (2008,
//! arXiv:0805.3415) for SW-UCB; Liu, Lee & Shroff (2018, arXiv:1711.03539) for
//! CUSUM-UCB; Auer, Cesa-Bianchi, Freund & Schapire (2002) for EXP3; Kempe,
//! Kleinberg & Tardos (2003) for greedy influence maximisation under the
//! independent-cascade model.

#![forbid(unsafe_code)]

mod error;
pub use error::{Error, Result};

mod matrix;
pub use matrix::*;

mod env;
pub use env::*;

mod policy;
pub use policy::*;

mod ucb;
pub use ucb::*;

mod thompson;
pub use thompson::*;

mod window;
pub use window::*;

mod cusum;
pub use cusum::*;

mod exp3;
pub use exp3::*;

mod contextual;
pub use contextual::*;

mod matching;
pub use matching::*;

mod influence;
pub use influence::*;

mod clairvoyant;
pub use clairvoyant::*;

mod harness;
pub use harness::*;

mod utils;
pub use utils::*;

/// Running aggregates for one arm.
///
/// The mean is derived from the accumulators on every read, so it can never
/// fall out of sync with the counts used for selection.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArmStats {
    /// Number of rewards recorded.
    pub pulls: u64,
    /// Sum of recorded rewards.
    pub reward_sum: f64,
}

impl ArmStats {
    /// Empirical mean reward (0.0 for an untried arm).
    pub fn mean(&self) -> f64 {
        if self.pulls == 0 {
            0.0
        } else {
            self.reward_sum / self.pulls as f64
        }
    }

    /// Record one reward.
    pub fn record(&mut self, reward: f64) {
        self.pulls = self.pulls.saturating_add(1);
        self.reward_sum += reward;
    }

    /// Forget everything.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Clamp a reward into `[0, 1]`, mapping NaN to 0.
pub(crate) fn clamp_reward(r: f64) -> f64 {
    if r.is_nan() {
        0.0
    } else {
        r.clamp(0.0, 1.0)
    }
}

/// UCB1 exploration bonus `sqrt(2 ln t / n)`; infinite for `n == 0`.
pub fn ucb_bonus(t: u64, n: u64) -> f64 {
    if n == 0 {
        return f64::INFINITY;
    }
    let t = t.max(1) as f64;
    (2.0 * t.ln() / n as f64).sqrt()
}

/// Index of the largest score, lowest index on ties. `None` for empty input.
pub(crate) fn argmax_first(scores: impl IntoIterator<Item = f64>) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, s) in scores.into_iter().enumerate() {
        match best {
            Some((_, b)) if s <= b => {}
            _ => best = Some((i, s)),
        }
    }
    best.map(|(i, _)| i)
}

/// Index of `u` in the cumulative distribution `probs` (last index on round-off).
pub(crate) fn sample_index(probs: &[f64], u: f64) -> usize {
    let mut cdf = 0.0;
    for (i, p) in probs.iter().enumerate() {
        cdf += *p;
        if u < cdf {
            return i;
        }
    }
    probs.len().saturating_sub(1)
}
