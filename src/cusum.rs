//! CUSUM change detection and the change-detection UCB learner (CUSUM-UCB).
//!
//! Each arm runs a small state machine:
//!
//! ```text
//!   Exploring { collected < m }  --m-th sample-->  Monitoring(detector)
//!          ^                                              |
//!          +-------------------- alarm -------------------+
//! ```
//!
//! While `Exploring`, the arm is force-selected and its rewards build the
//! reference mean. While `Monitoring`, every reward advances a two-sided CUSUM
//! statistic against that reference. An alarm wipes the arm's statistics and
//! sends it back to `Exploring`; other arms are untouched. Alarms cannot fire
//! during exploration, so a change that happens mid-exploration simply ends up
//! in the next reference mean.
//!
//! Selection outside forced exploration is UCB1 over the statistics since each
//! arm's last reset, except that with probability `alpha` an arm is drawn
//! uniformly so that every arm keeps being observed (otherwise changes on
//! neglected arms would go unnoticed).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::policy::{check_arms, reject_arm};
use crate::{argmax_first, clamp_reward, ucb_bonus, ArmStats, Error, Learner, Result};

/// CUSUM-UCB parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CusumConfig {
    /// Forced pulls per arm used to estimate the reference mean (>= 1).
    pub m: usize,
    /// Drift allowance subtracted from every deviation (> 0).
    pub eps: f64,
    /// Alarm threshold on either accumulator (> 0).
    pub h: f64,
    /// Probability of a uniformly random pull outside forced exploration, in `(0, 1]`.
    pub alpha: f64,
}

impl Default for CusumConfig {
    fn default() -> Self {
        Self {
            m: 20,
            eps: 0.05,
            h: 5.0,
            alpha: 0.05,
        }
    }
}

impl CusumConfig {
    pub fn validate(&self) -> Result<()> {
        if self.m == 0 {
            return Err(Error::invalid("m", "must be >= 1"));
        }
        if !(self.eps.is_finite() && self.eps > 0.0) {
            return Err(Error::invalid("eps", "must be finite and > 0"));
        }
        if !(self.h.is_finite() && self.h > 0.0) {
            return Err(Error::invalid("h", "must be finite and > 0"));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(Error::invalid("alpha", "must be in (0, 1]"));
        }
        Ok(())
    }
}

/// Alarm raised by [`CusumDetector::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CusumAlarm {
    /// Samples processed by the detector, including the alarming one.
    pub samples: u64,
    pub g_plus: f64,
    pub g_minus: f64,
}

/// Two-sided CUSUM statistic against a fixed reference mean.
///
/// - `g+ = max(0, g+ + (x - ref - eps))` detects upward shifts.
/// - `g- = max(0, g- + (ref - x - eps))` detects downward shifts.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CusumDetector {
    reference: f64,
    g_plus: f64,
    g_minus: f64,
    samples: u64,
}

impl CusumDetector {
    pub fn new(reference: f64) -> Self {
        Self {
            reference,
            g_plus: 0.0,
            g_minus: 0.0,
            samples: 0,
        }
    }

    pub fn reference(&self) -> f64 {
        self.reference
    }

    pub fn g_plus(&self) -> f64 {
        self.g_plus
    }

    pub fn g_minus(&self) -> f64 {
        self.g_minus
    }

    /// Samples processed since construction.
    pub fn samples(&self) -> u64 {
        self.samples
    }

    /// Advance both accumulators with `x`; alarm when either exceeds `h`.
    pub fn update(&mut self, x: f64, eps: f64, h: f64) -> Option<CusumAlarm> {
        let dev = x - self.reference;
        self.g_plus = (self.g_plus + dev - eps).max(0.0);
        self.g_minus = (self.g_minus - dev - eps).max(0.0);
        self.samples = self.samples.saturating_add(1);
        if self.g_plus > h || self.g_minus > h {
            Some(CusumAlarm {
                samples: self.samples,
                g_plus: self.g_plus,
                g_minus: self.g_minus,
            })
        } else {
            None
        }
    }
}

/// Per-arm detection phase.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ArmPhase {
    /// Forced exploration: `collected` of the `m` reference samples seen so far.
    Exploring { collected: usize, sum: f64 },
    /// Reference fixed; CUSUM running.
    Monitoring(CusumDetector),
}

impl ArmPhase {
    /// Initial phase of every arm.
    pub const fn start() -> Self {
        ArmPhase::Exploring {
            collected: 0,
            sum: 0.0,
        }
    }

    pub fn is_exploring(&self) -> bool {
        matches!(self, ArmPhase::Exploring { .. })
    }

    /// Transition on one reward. Returns the next phase and the alarm, if any.
    ///
    /// On alarm the next phase is a fresh exploration that already contains `x`.
    pub fn step(self, x: f64, cfg: &CusumConfig) -> (ArmPhase, Option<CusumAlarm>) {
        match self {
            ArmPhase::Exploring { collected, sum } => {
                (Self::explore(collected + 1, sum + x, cfg.m), None)
            }
            ArmPhase::Monitoring(mut det) => match det.update(x, cfg.eps, cfg.h) {
                Some(alarm) => (Self::explore(1, x, cfg.m), Some(alarm)),
                None => (ArmPhase::Monitoring(det), None),
            },
        }
    }

    fn explore(collected: usize, sum: f64, m: usize) -> Self {
        if collected >= m {
            ArmPhase::Monitoring(CusumDetector::new(sum / collected as f64))
        } else {
            ArmPhase::Exploring { collected, sum }
        }
    }
}

#[derive(Debug, Clone)]
struct CusumArm {
    phase: ArmPhase,
    stats: ArmStats,
    detections: Vec<u64>,
}

/// UCB1 with forced exploration and per-arm CUSUM restarts.
#[derive(Debug, Clone)]
pub struct CusumUcb {
    cfg: CusumConfig,
    arms: Vec<CusumArm>,
    t: u64,
    rng: StdRng,
}

impl CusumUcb {
    /// Validated construction with seed 0.
    pub fn new(n_arms: usize, cfg: CusumConfig) -> Result<Self> {
        Self::with_seed(n_arms, cfg, 0)
    }

    /// Validated construction with an explicit seed.
    pub fn with_seed(n_arms: usize, cfg: CusumConfig, seed: u64) -> Result<Self> {
        check_arms(n_arms)?;
        cfg.validate()?;
        let arm = CusumArm {
            phase: ArmPhase::start(),
            stats: ArmStats::default(),
            detections: Vec::new(),
        };
        Ok(Self {
            cfg,
            arms: vec![arm; n_arms],
            t: 0,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn config(&self) -> &CusumConfig {
        &self.cfg
    }

    /// Total number of updates so far.
    pub fn rounds(&self) -> u64 {
        self.t
    }

    /// Detection phase of `arm`.
    pub fn phase(&self, arm: usize) -> Option<&ArmPhase> {
        self.arms.get(arm).map(|a| &a.phase)
    }

    /// Statistics of `arm` since its last reset.
    pub fn stats(&self, arm: usize) -> Option<ArmStats> {
        self.arms.get(arm).map(|a| a.stats)
    }

    /// Rounds (0-based update index) at which `arm` raised an alarm.
    pub fn detections(&self, arm: usize) -> &[u64] {
        self.arms
            .get(arm)
            .map(|a| a.detections.as_slice())
            .unwrap_or(&[])
    }

    /// Alarms across all arms.
    pub fn total_detections(&self) -> usize {
        self.arms.iter().map(|a| a.detections.len()).sum()
    }

    fn forced_arm(&self) -> Option<usize> {
        self.arms
            .iter()
            .enumerate()
            .filter_map(|(i, a)| match a.phase {
                ArmPhase::Exploring { collected, .. } => Some((collected, i)),
                ArmPhase::Monitoring(_) => None,
            })
            .min()
            .map(|(_, i)| i)
    }
}

impl Learner for CusumUcb {
    fn n_arms(&self) -> usize {
        self.arms.len()
    }

    /// Policy:
    /// - Forced exploration: the exploring arm with the fewest reference samples
    ///   (lowest index on ties).
    /// - With probability `alpha`: a uniformly random arm.
    /// - Otherwise: UCB1 over statistics since each arm's last reset.
    fn select(&mut self) -> usize {
        let k = self.arms.len();
        if k == 0 {
            return 0;
        }
        if let Some(arm) = self.forced_arm() {
            return arm;
        }
        if self.rng.random::<f64>() < self.cfg.alpha {
            return self.rng.random_range(0..k);
        }
        let valid: u64 = self.arms.iter().map(|a| a.stats.pulls).sum();
        let scores = self
            .arms
            .iter()
            .map(|a| a.stats.mean() + ucb_bonus(valid, a.stats.pulls));
        argmax_first(scores).unwrap_or(0)
    }

    fn update(&mut self, arm: usize, reward: f64) {
        if reject_arm("cusum", arm, self.arms.len()) {
            return;
        }
        let r = clamp_reward(reward);
        let round = self.t;
        self.t = self.t.saturating_add(1);

        let a = &mut self.arms[arm];
        let (next, alarm) = a.phase.step(r, &self.cfg);
        a.phase = next;
        if let Some(alarm) = alarm {
            tracing::debug!(
                arm,
                round,
                g_plus = alarm.g_plus,
                g_minus = alarm.g_minus,
                samples = alarm.samples,
                "cusum change detected; restarting arm"
            );
            a.detections.push(round);
            a.stats.reset();
        }
        a.stats.record(r);
    }

    fn expectations(&self) -> Vec<f64> {
        self.arms.iter().map(|a| a.stats.mean()).collect()
    }
}
