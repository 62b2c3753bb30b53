//! Monte-Carlo evaluation of an edge-probability estimate.
//!
//! Seeds are chosen greedily under the **estimated** table, but each trial
//! realises the cascade under the **true** table. Activated customers are then
//! matched to product slots (each product class offers `products_per_class`
//! slots). Every (customer, slot) pair draws a value from the estimated reward
//! model, the matching minimises `max_draw - draw`, and the trial's reward is
//! the sum of one draw from the real reward distribution per matched pair.
//!
//! Every trial runs on its own RNG derived from the config seed, so a trial is
//! a pure function of `(config, trial index)`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::{
    greedy_seeds, simulate_episode, solve, Error, Matrix, ProbTable, Result,
};

/// Per (customer class, product class) reward distribution parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RewardParams {
    means: Matrix,
    std_devs: Matrix,
}

impl RewardParams {
    /// `means` and `std_devs` must share a shape; means finite, std-devs finite
    /// and non-negative.
    pub fn new(means: Matrix, std_devs: Matrix) -> Result<Self> {
        if means.rows() != std_devs.rows() {
            return Err(Error::DimensionMismatch {
                expected: means.rows(),
                got: std_devs.rows(),
            });
        }
        if means.cols() != std_devs.cols() {
            return Err(Error::DimensionMismatch {
                expected: means.cols(),
                got: std_devs.cols(),
            });
        }
        if means.as_slice().iter().any(|m| !m.is_finite()) {
            return Err(Error::invalid("means", "must be finite"));
        }
        if std_devs
            .as_slice()
            .iter()
            .any(|s| !(s.is_finite() && *s >= 0.0))
        {
            return Err(Error::invalid("std_devs", "must be finite and >= 0"));
        }
        Ok(Self { means, std_devs })
    }

    pub fn n_classes(&self) -> usize {
        self.means.rows()
    }

    pub fn n_products(&self) -> usize {
        self.means.cols()
    }

    pub fn means(&self) -> &Matrix {
        &self.means
    }

    pub fn std_devs(&self) -> &Matrix {
        &self.std_devs
    }

    /// One draw from `Normal(mean, std)` for `(class, product)`.
    pub fn sample<R: Rng + ?Sized>(&self, class: usize, product: usize, rng: &mut R) -> f64 {
        let mean = self.means.get(class, product);
        let std = self.std_devs.get(class, product);
        if std == 0.0 {
            return mean;
        }
        match Normal::new(mean, std) {
            Ok(d) => d.sample(rng),
            Err(_) => mean,
        }
    }
}

/// Knobs for [`clairvoyant`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClairvoyantConfig {
    /// Monte-Carlo trials (>= 1).
    pub n_experiments: usize,
    /// Number of seed nodes chosen greedily.
    pub seed_budget: usize,
    /// Cascades per candidate during greedy seed selection (>= 1).
    pub greedy_sims: usize,
    /// Propagation step cap per cascade (`None` = unbounded).
    pub max_steps: Option<usize>,
    /// Identical slots offered per product class.
    pub products_per_class: usize,
    pub seed: u64,
}

impl Default for ClairvoyantConfig {
    fn default() -> Self {
        Self {
            n_experiments: 100,
            seed_budget: 3,
            greedy_sims: 100,
            max_steps: None,
            products_per_class: 3,
            seed: 0,
        }
    }
}

impl ClairvoyantConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_experiments == 0 {
            return Err(Error::invalid("n_experiments", "must be >= 1"));
        }
        if self.greedy_sims == 0 {
            return Err(Error::invalid("greedy_sims", "must be >= 1"));
        }
        Ok(())
    }
}

/// Summary of the successful trials of a Monte-Carlo run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Evaluation {
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub successful: usize,
    pub failed: usize,
}

/// Run `n_trials` trials and summarise the ones that succeed.
///
/// Failed trials (errors or non-finite rewards) are excluded from the mean and
/// standard deviation, counted in [`Evaluation::failed`], and logged. If every
/// trial fails the last error is returned inside [`Error::AllTrialsFailed`].
pub fn aggregate_trials<F>(n_trials: usize, mut trial: F) -> Result<Evaluation>
where
    F: FnMut(usize) -> Result<f64>,
{
    if n_trials == 0 {
        return Err(Error::invalid("n_trials", "must be >= 1"));
    }
    let mut rewards = Vec::with_capacity(n_trials);
    let mut last_err = None;
    for i in 0..n_trials {
        let outcome = trial(i).and_then(|r| {
            if r.is_finite() {
                Ok(r)
            } else {
                Err(Error::invalid("trial reward", format!("non-finite ({r})")))
            }
        });
        match outcome {
            Ok(r) => rewards.push(r),
            Err(e) => {
                tracing::warn!(trial = i, error = %e, "trial failed; excluded");
                last_err = Some(e);
            }
        }
    }

    let failed = n_trials - rewards.len();
    if rewards.is_empty() {
        return Err(Error::AllTrialsFailed {
            trials: n_trials,
            last: Box::new(last_err.unwrap_or(Error::Empty("trial outcomes"))),
        });
    }
    let n = rewards.len() as f64;
    let mean = rewards.iter().sum::<f64>() / n;
    let var = rewards.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>() / n;
    Ok(Evaluation {
        mean,
        std_dev: var.sqrt(),
        successful: rewards.len(),
        failed,
    })
}

/// Reward of one trial: cascade from `seeds` under `truth`, then match and draw.
fn run_trial<R: Rng + ?Sized>(
    truth: &ProbTable,
    seeds: &[usize],
    customer_assignments: &[usize],
    estimated_rewards: &RewardParams,
    real_rewards: &RewardParams,
    cfg: &ClairvoyantConfig,
    rng: &mut R,
) -> Result<f64> {
    let episode = simulate_episode(truth, seeds, cfg.max_steps, rng)?;
    let customers = episode.activated();
    if customers.is_empty() {
        return Ok(0.0);
    }

    let n_products = estimated_rewards.n_products();
    let per_class = cfg.products_per_class;
    let slots = n_products * per_class;
    if slots == 0 {
        return Ok(0.0);
    }
    // Slot `s` offers product `s / per_class`; every (customer, slot) pair gets
    // its own draw from the estimated reward model.
    let mut draws = Matrix::zeros(customers.len(), slots);
    for (r, &node) in customers.iter().enumerate() {
        let class = customer_assignments[node];
        for s in 0..slots {
            draws.set(r, s, estimated_rewards.sample(class, s / per_class, rng));
        }
    }
    let max_draw = draws.max().unwrap_or(0.0);
    let assignment = solve(&draws.map(|x| max_draw - x))?;

    Ok(assignment
        .pairs
        .iter()
        .map(|&(r, s)| real_rewards.sample(customer_assignments[customers[r]], s / per_class, rng))
        .sum())
}

/// Monte-Carlo reward of acting on `estimated` when the world follows `truth`.
///
/// `customer_assignments[v]` is the customer class of node `v`. Both reward
/// parameter sets must have the same shape and cover every class in use.
pub fn clairvoyant(
    estimated: &ProbTable,
    truth: &ProbTable,
    customer_assignments: &[usize],
    estimated_rewards: &RewardParams,
    real_rewards: &RewardParams,
    cfg: &ClairvoyantConfig,
) -> Result<Evaluation> {
    cfg.validate()?;
    let n = truth.n_nodes();
    if estimated.n_nodes() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            got: estimated.n_nodes(),
        });
    }
    if customer_assignments.len() != n {
        return Err(Error::DimensionMismatch {
            expected: n,
            got: customer_assignments.len(),
        });
    }
    if estimated_rewards.means().rows() != real_rewards.means().rows()
        || estimated_rewards.n_products() != real_rewards.n_products()
    {
        return Err(Error::DimensionMismatch {
            expected: estimated_rewards.n_products(),
            got: real_rewards.n_products(),
        });
    }
    let n_classes = estimated_rewards.n_classes();
    if let Some(&class) = customer_assignments.iter().find(|&&c| c >= n_classes) {
        return Err(Error::IndexOutOfRange {
            index: class,
            len: n_classes,
        });
    }

    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let seeds = greedy_seeds(estimated, cfg.seed_budget, cfg.greedy_sims, &mut rng)?;
    tracing::debug!(?seeds, "clairvoyant seeds chosen on estimated table");

    let eval = aggregate_trials(cfg.n_experiments, |i| {
        let mut trial_rng = StdRng::seed_from_u64(cfg.seed.wrapping_add(1 + i as u64));
        run_trial(
            truth,
            &seeds,
            customer_assignments,
            estimated_rewards,
            real_rewards,
            cfg,
            &mut trial_rng,
        )
    })?;
    tracing::info!(
        mean = eval.mean,
        std_dev = eval.std_dev,
        successful = eval.successful,
        failed = eval.failed,
        "clairvoyant evaluation"
    );
    Ok(eval)
}
