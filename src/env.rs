//! Bernoulli reward sources: stationary and phase-based non-stationary.
//!
//! Both sources are **seedable** so a run can be replayed exactly. They never
//! fail once constructed: all validation happens in the constructors.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::check_probability;
use crate::{Error, Result};

/// Something a learner can pull arms against.
pub trait RewardSource {
    /// Number of arms.
    fn n_arms(&self) -> usize;

    /// Draw a reward (`0.0` or `1.0`) for `arm`.
    ///
    /// # Panics
    ///
    /// Panics if `arm >= n_arms()`.
    fn observe(&mut self, arm: usize) -> f64;

    /// True success probability of `arm` for the next observation.
    fn expected_reward(&self, arm: usize) -> f64;

    /// Best true success probability for the next observation.
    fn best_expected_reward(&self) -> f64 {
        (0..self.n_arms())
            .map(|a| self.expected_reward(a))
            .fold(0.0, f64::max)
    }
}

fn validate_probs(probs: &[f64]) -> Result<()> {
    if probs.is_empty() {
        return Err(Error::Empty("arm probabilities"));
    }
    for (i, &p) in probs.iter().enumerate() {
        check_probability(i, p)?;
    }
    Ok(())
}

/// Stationary Bernoulli arms.
#[derive(Debug, Clone)]
pub struct BernoulliEnv {
    probs: Vec<f64>,
    rng: StdRng,
}

impl BernoulliEnv {
    pub fn new(probs: Vec<f64>, seed: u64) -> Result<Self> {
        validate_probs(&probs)?;
        Ok(Self {
            probs,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.probs
    }
}

impl RewardSource for BernoulliEnv {
    fn n_arms(&self) -> usize {
        self.probs.len()
    }

    fn observe(&mut self, arm: usize) -> f64 {
        let p = self.probs[arm];
        if self.rng.random_bool(p) {
            1.0
        } else {
            0.0
        }
    }

    fn expected_reward(&self, arm: usize) -> f64 {
        self.probs[arm]
    }
}

/// Phase of round `t` when `horizon` rounds are split evenly into `n_phases`.
///
/// `floor(t / (horizon / n_phases))` with real division, clamped to the last
/// phase. Returns 0 when `n_phases` or `horizon` is 0.
pub fn phase_index(t: u64, horizon: u64, n_phases: usize) -> usize {
    if n_phases == 0 || horizon == 0 {
        return 0;
    }
    phase_at(t, horizon as f64 / n_phases as f64, n_phases)
}

fn phase_at(t: u64, phase_size: f64, n_phases: usize) -> usize {
    let idx = (t as f64 / phase_size).floor() as usize;
    idx.min(n_phases.saturating_sub(1))
}

/// Piecewise-stationary Bernoulli arms.
///
/// The horizon is split into `phases.len()` equal-length phases
/// (`phase_size = horizon / n_phases`, real division). Round `t` belongs to
/// phase `floor(t / phase_size)`, clamped to the last phase so rounds at or past
/// the horizon never index out of range.
#[derive(Debug, Clone)]
pub struct PhasedEnv {
    phases: Vec<Vec<f64>>,
    phase_size: f64,
    t: u64,
    rng: StdRng,
}

impl PhasedEnv {
    pub fn new(phases: Vec<Vec<f64>>, horizon: u64, seed: u64) -> Result<Self> {
        let Some(first) = phases.first() else {
            return Err(Error::Empty("phase table"));
        };
        let k = first.len();
        for phase in &phases {
            if phase.len() != k {
                return Err(Error::DimensionMismatch {
                    expected: k,
                    got: phase.len(),
                });
            }
            validate_probs(phase)?;
        }
        if horizon == 0 {
            return Err(Error::invalid("horizon", "must be > 0"));
        }
        let phase_size = horizon as f64 / phases.len() as f64;
        Ok(Self {
            phases,
            phase_size,
            t: 0,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Arms are the out-edges of node `row`; phase `j` uses row `row` of `tables[j]`.
    pub fn from_table_row(
        tables: &[crate::ProbTable],
        row: usize,
        horizon: u64,
        seed: u64,
    ) -> Result<Self> {
        let mut phases = Vec::with_capacity(tables.len());
        for table in tables {
            if row >= table.n_nodes() {
                return Err(Error::IndexOutOfRange {
                    index: row,
                    len: table.n_nodes(),
                });
            }
            phases.push(table.row(row).to_vec());
        }
        Self::new(phases, horizon, seed)
    }

    /// Rounds observed so far.
    pub fn round(&self) -> u64 {
        self.t
    }

    pub fn n_phases(&self) -> usize {
        self.phases.len()
    }

    pub fn phase_size(&self) -> f64 {
        self.phase_size
    }

    /// Phase that round `t` falls into.
    pub fn phase_of(&self, t: u64) -> usize {
        phase_at(t, self.phase_size, self.phases.len())
    }

    /// Phase of the next observation.
    pub fn current_phase(&self) -> usize {
        self.phase_of(self.t)
    }

    /// Probability vector in force at round `t`.
    pub fn probabilities_at(&self, t: u64) -> &[f64] {
        &self.phases[self.phase_of(t)]
    }
}

impl RewardSource for PhasedEnv {
    fn n_arms(&self) -> usize {
        self.phases[0].len()
    }

    fn observe(&mut self, arm: usize) -> f64 {
        let p = self.phases[self.current_phase()][arm];
        self.t = self.t.saturating_add(1);
        if self.rng.random_bool(p) {
            1.0
        } else {
            0.0
        }
    }

    fn expected_reward(&self, arm: usize) -> f64 {
        self.phases[self.current_phase()][arm]
    }
}
