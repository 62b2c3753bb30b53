//! Unified `Learner` trait and the closed set of learner variants.
//!
//! [`Ucb1`], [`ThompsonSampling`], [`SlidingWindowUcb`], [`CusumUcb`] and [`Exp3`]
//! share the same three-method interface: `select() -> arm`,
//! `update(arm, reward)`, and `expectations() -> per-arm estimate`.
//! This trait makes that explicit and enables generic experiment drivers.
//!
//! [`AnyLearner`] is the tagged union of all variants, built from a
//! [`LearnerConfig`]. Prefer it when the variant is chosen at runtime (e.g. from
//! a config file); prefer the concrete types when it is fixed at compile time.

use crate::{
    CusumConfig, CusumUcb, Error, Exp3, Exp3Config, Result, SlidingWindowUcb, ThompsonConfig,
    ThompsonSampling, Ucb1,
};

/// Common interface for online Bernoulli-reward learners.
///
/// # Example
///
/// ```rust
/// use banditlab::{BernoulliEnv, Learner, RewardSource, ThompsonSampling, Ucb1};
///
/// fn run<L: Learner>(learner: &mut L, env: &mut BernoulliEnv, rounds: usize) {
///     for _ in 0..rounds {
///         let arm = learner.select();
///         let r = env.observe(arm);
///         learner.update(arm, r);
///     }
/// }
///
/// let mut env = BernoulliEnv::new(vec![0.3, 0.6], 1).unwrap();
/// let mut ucb = Ucb1::new(2);
/// let mut ts = ThompsonSampling::with_seed(2, 0);
/// run(&mut ucb, &mut env, 50);
/// run(&mut ts, &mut env, 50);
/// ```
pub trait Learner {
    /// Number of arms.
    fn n_arms(&self) -> usize;

    /// Choose the next arm. Untried arms are always preferred.
    fn select(&mut self) -> usize;

    /// Record `reward` (clamped to `[0, 1]`) for `arm`.
    ///
    /// Out-of-range arms are ignored and logged at `warn` level.
    fn update(&mut self, arm: usize, reward: f64);

    /// Current per-arm value estimates, each in `[0, 1]`.
    fn expectations(&self) -> Vec<f64>;
}

/// Learners need at least one arm to select from.
pub(crate) fn check_arms(n_arms: usize) -> Result<()> {
    if n_arms == 0 {
        return Err(Error::Empty("arms"));
    }
    Ok(())
}

/// Log and report whether `arm` is out of range for a learner with `k` arms.
pub(crate) fn reject_arm(kind: &'static str, arm: usize, k: usize) -> bool {
    if arm >= k {
        tracing::warn!(learner = kind, arm, n_arms = k, "ignoring update for unknown arm");
        true
    } else {
        false
    }
}

/// Which learner to build, with its variant-specific parameters.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(tag = "kind", rename_all = "snake_case")
)]
pub enum LearnerConfig {
    #[default]
    Ucb1,
    Thompson(ThompsonConfig),
    SlidingWindow { window_size: usize },
    Cusum(CusumConfig),
    Exp3(Exp3Config),
}

impl LearnerConfig {
    /// Short stable name of the variant; matches [`AnyLearner::kind`].
    pub fn kind(&self) -> &'static str {
        match self {
            LearnerConfig::Ucb1 => "ucb1",
            LearnerConfig::Thompson(_) => "thompson",
            LearnerConfig::SlidingWindow { .. } => "sliding_window",
            LearnerConfig::Cusum(_) => "cusum",
            LearnerConfig::Exp3(_) => "exp3",
        }
    }
}

/// Any learner variant behind one value.
#[derive(Debug, Clone)]
pub enum AnyLearner {
    Ucb1(Ucb1),
    Thompson(ThompsonSampling),
    SlidingWindow(SlidingWindowUcb),
    Cusum(CusumUcb),
    Exp3(Exp3),
}

impl AnyLearner {
    /// Build a fresh learner for `n_arms` arms.
    ///
    /// `seed` drives every random choice of the randomized variants (and
    /// overrides [`Exp3Config::seed`]); UCB1 and SW-UCB ignore it.
    pub fn from_config(n_arms: usize, cfg: &LearnerConfig, seed: u64) -> Result<Self> {
        check_arms(n_arms)?;
        Ok(match cfg {
            LearnerConfig::Ucb1 => AnyLearner::Ucb1(Ucb1::new(n_arms)),
            LearnerConfig::Thompson(c) => {
                AnyLearner::Thompson(ThompsonSampling::with_config(n_arms, c.clone(), seed)?)
            }
            LearnerConfig::SlidingWindow { window_size } => {
                AnyLearner::SlidingWindow(SlidingWindowUcb::new(n_arms, *window_size)?)
            }
            LearnerConfig::Cusum(c) => AnyLearner::Cusum(CusumUcb::with_seed(n_arms, *c, seed)?),
            LearnerConfig::Exp3(c) => AnyLearner::Exp3(Exp3::new(
                n_arms,
                Exp3Config {
                    seed,
                    ..*c
                },
            )?),
        })
    }

    /// Short stable name of the variant (useful as a log field).
    pub fn kind(&self) -> &'static str {
        match self {
            AnyLearner::Ucb1(_) => "ucb1",
            AnyLearner::Thompson(_) => "thompson",
            AnyLearner::SlidingWindow(_) => "sliding_window",
            AnyLearner::Cusum(_) => "cusum",
            AnyLearner::Exp3(_) => "exp3",
        }
    }
}

impl Learner for AnyLearner {
    fn n_arms(&self) -> usize {
        match self {
            AnyLearner::Ucb1(l) => l.n_arms(),
            AnyLearner::Thompson(l) => l.n_arms(),
            AnyLearner::SlidingWindow(l) => l.n_arms(),
            AnyLearner::Cusum(l) => l.n_arms(),
            AnyLearner::Exp3(l) => l.n_arms(),
        }
    }

    fn select(&mut self) -> usize {
        match self {
            AnyLearner::Ucb1(l) => l.select(),
            AnyLearner::Thompson(l) => l.select(),
            AnyLearner::SlidingWindow(l) => l.select(),
            AnyLearner::Cusum(l) => l.select(),
            AnyLearner::Exp3(l) => l.select(),
        }
    }

    fn update(&mut self, arm: usize, reward: f64) {
        match self {
            AnyLearner::Ucb1(l) => l.update(arm, reward),
            AnyLearner::Thompson(l) => l.update(arm, reward),
            AnyLearner::SlidingWindow(l) => l.update(arm, reward),
            AnyLearner::Cusum(l) => l.update(arm, reward),
            AnyLearner::Exp3(l) => l.update(arm, reward),
        }
    }

    fn expectations(&self) -> Vec<f64> {
        match self {
            AnyLearner::Ucb1(l) => l.expectations(),
            AnyLearner::Thompson(l) => l.expectations(),
            AnyLearner::SlidingWindow(l) => l.expectations(),
            AnyLearner::Cusum(l) => l.expectations(),
            AnyLearner::Exp3(l) => l.expectations(),
        }
    }
}
