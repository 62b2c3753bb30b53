//! Thompson sampling bandit for Bernoulli arms.
//!
//! Notes:
//! - This policy is **seedable** so selection can be reproducible in tests.
//! - [`ThompsonSampling::new`] uses a fixed seed (deterministic by default).

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Beta, Distribution};

use crate::policy::{check_arms, reject_arm};
use crate::{argmax_first, clamp_reward, ArmStats, Error, Learner, Result};

/// Configuration for Thompson sampling.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThompsonConfig {
    /// Prior alpha (must be > 0).
    pub alpha0: f64,
    /// Prior beta (must be > 0).
    pub beta0: f64,
}

impl Default for ThompsonConfig {
    fn default() -> Self {
        Self {
            alpha0: 1.0,
            beta0: 1.0,
        }
    }
}

impl ThompsonConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha0.is_finite() && self.alpha0 > 0.0) {
            return Err(Error::invalid("alpha0", "must be finite and > 0"));
        }
        if !(self.beta0.is_finite() && self.beta0 > 0.0) {
            return Err(Error::invalid("beta0", "must be finite and > 0"));
        }
        Ok(())
    }
}

/// Beta posterior state for one arm.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BetaPosterior {
    pub alpha: f64,
    pub beta: f64,
}

impl BetaPosterior {
    pub fn expected_value(&self) -> f64 {
        let denom = self.alpha + self.beta;
        if denom <= 0.0 {
            0.5
        } else {
            self.alpha / denom
        }
    }
}

/// Seedable Thompson-sampling bandit.
#[derive(Debug, Clone)]
pub struct ThompsonSampling {
    posteriors: Vec<BetaPosterior>,
    stats: Vec<ArmStats>,
    rng: StdRng,
}

impl ThompsonSampling {
    /// Uniform `Beta(1, 1)` priors and seed 0.
    pub fn new(n_arms: usize) -> Self {
        Self::with_seed(n_arms, 0)
    }

    /// Uniform `Beta(1, 1)` priors with an explicit seed.
    pub fn with_seed(n_arms: usize, seed: u64) -> Self {
        let prior = BetaPosterior {
            alpha: 1.0,
            beta: 1.0,
        };
        Self {
            posteriors: vec![prior; n_arms],
            stats: vec![ArmStats::default(); n_arms],
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Custom prior (validated) with an explicit seed.
    pub fn with_config(n_arms: usize, cfg: ThompsonConfig, seed: u64) -> Result<Self> {
        check_arms(n_arms)?;
        cfg.validate()?;
        let mut ts = Self::with_seed(n_arms, seed);
        for p in &mut ts.posteriors {
            p.alpha = cfg.alpha0;
            p.beta = cfg.beta0;
        }
        Ok(ts)
    }

    /// Access the per-arm Beta posteriors.
    pub fn posteriors(&self) -> &[BetaPosterior] {
        &self.posteriors
    }

    /// Access the per-arm pull statistics.
    pub fn stats(&self) -> &[ArmStats] {
        &self.stats
    }

    fn sample_beta(&mut self, p: BetaPosterior) -> f64 {
        match Beta::new(p.alpha, p.beta) {
            Ok(dist) => dist.sample(&mut self.rng),
            Err(_) => p.expected_value(),
        }
    }
}

impl Learner for ThompsonSampling {
    fn n_arms(&self) -> usize {
        self.posteriors.len()
    }

    /// Policy:
    /// - Explore: return the first arm (stable order) that has no pulls.
    /// - Otherwise: sample from each arm's Beta posterior and choose the max.
    /// - Tie-break: lowest index.
    fn select(&mut self) -> usize {
        if let Some(untried) = self.stats.iter().position(|s| s.pulls == 0) {
            return untried;
        }
        let draws: Vec<f64> = (0..self.posteriors.len())
            .map(|i| self.sample_beta(self.posteriors[i]))
            .collect();
        argmax_first(draws).unwrap_or(0)
    }

    /// Interprets reward as a fractional "success":
    /// - `alpha += reward`
    /// - `beta += 1 - reward`
    fn update(&mut self, arm: usize, reward: f64) {
        if reject_arm("thompson", arm, self.posteriors.len()) {
            return;
        }
        let r = clamp_reward(reward);
        let p = &mut self.posteriors[arm];
        p.alpha += r;
        p.beta += 1.0 - r;
        self.stats[arm].record(r);
    }

    fn expectations(&self) -> Vec<f64> {
        self.posteriors
            .iter()
            .map(BetaPosterior::expected_value)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explores_each_arm_once_in_order() {
        let mut ts = ThompsonSampling::with_seed(3, 123);
        assert_eq!(ts.select(), 0);
        ts.update(0, 1.0);
        assert_eq!(ts.select(), 1);
        ts.update(1, 1.0);
        assert_eq!(ts.select(), 2);
    }

    #[test]
    fn deterministic_choice_given_same_seed_and_state() {
        let mut t1 = ThompsonSampling::with_seed(2, 42);
        let mut t2 = ThompsonSampling::with_seed(2, 42);

        // Put both into the same state.
        for ts in [&mut t1, &mut t2] {
            ts.update(0, 1.0);
            ts.update(1, 0.0);
        }

        for _ in 0..20 {
            assert_eq!(t1.select(), t2.select());
        }
    }

    #[test]
    fn update_moves_posterior_mean() {
        let mut ts = ThompsonSampling::new(1);
        assert_eq!(ts.expectations(), vec![0.5]);
        for _ in 0..10 {
            ts.update(0, 1.0);
        }
        // Beta(11, 1).
        assert!((ts.expectations()[0] - 11.0 / 12.0).abs() < 1e-12);
        assert_eq!(ts.stats()[0].pulls, 10);
    }

    #[test]
    fn config_rejects_non_positive_prior() {
        let cfg = ThompsonConfig {
            alpha0: 0.0,
            beta0: 1.0,
        };
        assert!(ThompsonSampling::with_config(2, cfg, 0).is_err());

        let cfg = ThompsonConfig {
            alpha0: 2.0,
            beta0: 6.0,
        };
        let ts = ThompsonSampling::with_config(2, cfg, 0).unwrap();
        assert_eq!(ts.expectations(), vec![0.25, 0.25]);
    }

    #[test]
    fn concentrates_on_the_better_arm() {
        let mut ts = ThompsonSampling::with_seed(2, 5);
        for _ in 0..200 {
            ts.update(0, 0.0);
            ts.update(1, 1.0);
        }
        let picks_1 = (0..100).filter(|_| ts.select() == 1).count();
        assert!(picks_1 > 95, "picked arm 1 only {picks_1} times");
    }
}
