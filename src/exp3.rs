//! EXP3 (exponential weights for exploration and exploitation).
//!
//! This policy is useful when rewards can be adversarial or highly
//! non-stationary. It is **seedable** so it can be reproducible in tests; like
//! the other learners in this crate, default construction is deterministic.
//!
//! Only the pulled arm's weight moves on an update. Unobserved arms keep their
//! weights unchanged (plain EXP3, not a bias-corrected variant).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::policy::{check_arms, reject_arm};
use crate::{clamp_reward, sample_index, ArmStats, Error, Learner, Result};

/// Weights are rescaled once the largest exceeds this.
const RESCALE_ABOVE: f64 = 1e100;

/// Configuration for EXP3.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Exp3Config {
    /// Exploration mixing parameter in `(0, 1]`.
    pub gamma: f64,
    /// Seed for the internal RNG (used only after initial exploration).
    pub seed: u64,
}

impl Default for Exp3Config {
    fn default() -> Self {
        Self {
            gamma: 0.1,
            seed: 0,
        }
    }
}

impl Exp3Config {
    /// Horizon-tuned `gamma = min(1, sqrt(K ln K / ((e - 1) T)))` (Auer et al. 2002).
    pub fn for_horizon(n_arms: usize, horizon: u64) -> Self {
        let k = n_arms.max(2) as f64;
        let t = horizon.max(1) as f64;
        let gamma = (k * k.ln() / ((std::f64::consts::E - 1.0) * t)).sqrt().min(1.0);
        Self {
            gamma,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.gamma.is_finite() && self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(Error::invalid("gamma", "must be in (0, 1]"));
        }
        Ok(())
    }
}

/// Seedable EXP3 bandit.
#[derive(Debug, Clone)]
pub struct Exp3 {
    cfg: Exp3Config,
    weights: Vec<f64>,
    stats: Vec<ArmStats>,
    rng: StdRng,
}

impl Exp3 {
    pub fn new(n_arms: usize, cfg: Exp3Config) -> Result<Self> {
        check_arms(n_arms)?;
        cfg.validate()?;
        Ok(Self {
            cfg,
            weights: vec![1.0; n_arms],
            stats: vec![ArmStats::default(); n_arms],
            rng: StdRng::seed_from_u64(cfg.seed),
        })
    }

    pub fn gamma(&self) -> f64 {
        self.cfg.gamma
    }

    /// Raw (possibly rescaled) weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn stats(&self) -> &[ArmStats] {
        &self.stats
    }

    /// Selection distribution `p_i = (1 - gamma) w_i / sum(w) + gamma / K`.
    pub fn probabilities(&self) -> Vec<f64> {
        let k = self.weights.len();
        if k == 0 {
            return Vec::new();
        }
        let total: f64 = self.weights.iter().sum();
        let g = self.cfg.gamma;
        let uniform = 1.0 / k as f64;
        if !(total.is_finite() && total > 0.0) {
            return vec![uniform; k];
        }
        self.weights
            .iter()
            .map(|w| (1.0 - g) * w / total + g * uniform)
            .collect()
    }

    fn rescale(&mut self) {
        let max = self.weights.iter().copied().fold(0.0, f64::max);
        if max > RESCALE_ABOVE {
            for w in &mut self.weights {
                *w /= max;
            }
        }
    }
}

impl Learner for Exp3 {
    fn n_arms(&self) -> usize {
        self.weights.len()
    }

    /// Policy:
    /// - Explore each arm once in stable order.
    /// - Otherwise sample from [`Exp3::probabilities`] (seeded RNG).
    fn select(&mut self) -> usize {
        if let Some(untried) = self.stats.iter().position(|s| s.pulls == 0) {
            return untried;
        }
        let probs = self.probabilities();
        let u: f64 = self.rng.random();
        sample_index(&probs, u)
    }

    /// `w_arm *= exp(gamma * (reward / p_arm) / K)`.
    fn update(&mut self, arm: usize, reward: f64) {
        let k = self.weights.len();
        if reject_arm("exp3", arm, k) {
            return;
        }
        let r = clamp_reward(reward);
        let p = self.probabilities()[arm];
        if p > 0.0 {
            let x_hat = r / p;
            self.weights[arm] *= (self.cfg.gamma * x_hat / k as f64).exp();
            self.rescale();
        }
        self.stats[arm].record(r);
    }

    /// Normalized weights `w_i / sum(w)`.
    fn expectations(&self) -> Vec<f64> {
        let total: f64 = self.weights.iter().sum();
        let k = self.weights.len();
        if !(total.is_finite() && total > 0.0) {
            return vec![1.0 / k.max(1) as f64; k];
        }
        self.weights.iter().map(|w| w / total).collect()
    }
}
