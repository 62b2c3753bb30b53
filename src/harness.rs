//! Experiment drivers: the select → observe → update loop and the per-round
//! estimation of a whole edge-probability table.
//!
//! ## Estimating a graph
//!
//! [`estimate_edge_tables`] learns each node's out-edges as a separate bandit
//! problem: the arms of node `u` are the entries of row `u`, their probabilities
//! switching between the given phase tables over the horizon. After every round
//! the learner's [`Learner::expectations`] become row `u` of that round's
//! estimate, averaged over `n_experiments` independent runs. The result is one
//! [`ProbTable`] per round, ready for [`crate::clairvoyant`] or [`table_regret`].

use crate::{
    phase_index, AnyLearner, Error, Learner, LearnerConfig, Matrix, PhasedEnv, ProbTable, Result,
    RewardSource,
};

/// What happened in each round of a [`run`].
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunTrace {
    /// Arm pulled per round.
    pub picks: Vec<usize>,
    /// Observed reward per round.
    pub rewards: Vec<f64>,
    /// Expected reward of the pulled arm per round.
    pub expected: Vec<f64>,
    /// Best expected reward available per round.
    pub optimal: Vec<f64>,
}

impl RunTrace {
    pub fn len(&self) -> usize {
        self.picks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.picks.is_empty()
    }

    pub fn total_reward(&self) -> f64 {
        self.rewards.iter().sum()
    }

    /// Pseudo-regret per round: `optimal - expected`.
    pub fn instantaneous_regret(&self) -> Vec<f64> {
        self.optimal
            .iter()
            .zip(&self.expected)
            .map(|(o, e)| o - e)
            .collect()
    }

    /// Running sum of [`RunTrace::instantaneous_regret`].
    pub fn cumulative_regret(&self) -> Vec<f64> {
        self.instantaneous_regret()
            .into_iter()
            .scan(0.0, |acc, r| {
                *acc += r;
                Some(*acc)
            })
            .collect()
    }

    /// Number of pulls per arm.
    pub fn pick_counts(&self, n_arms: usize) -> Vec<u64> {
        let mut counts = vec![0u64; n_arms];
        for &a in &self.picks {
            if let Some(c) = counts.get_mut(a) {
                *c += 1;
            }
        }
        counts
    }
}

/// Drive `learner` against `env` for `horizon` rounds.
///
/// # Panics
///
/// Panics if the learner selects an arm `env` does not have.
pub fn run<E, L>(env: &mut E, learner: &mut L, horizon: u64) -> RunTrace
where
    E: RewardSource + ?Sized,
    L: Learner + ?Sized,
{
    let cap = usize::try_from(horizon).unwrap_or(0);
    let mut trace = RunTrace {
        picks: Vec::with_capacity(cap),
        rewards: Vec::with_capacity(cap),
        expected: Vec::with_capacity(cap),
        optimal: Vec::with_capacity(cap),
    };
    for _ in 0..horizon {
        let arm = learner.select();
        // Read expectations before observing: phased sources advance on observe.
        trace.expected.push(env.expected_reward(arm));
        trace.optimal.push(env.best_expected_reward());
        let r = env.observe(arm);
        learner.update(arm, r);
        trace.picks.push(arm);
        trace.rewards.push(r);
    }
    trace
}

/// Per-round estimate of a phased graph, one [`ProbTable`] per round.
///
/// `tables` are the true phase tables (all the same size). Each node row is
/// learned by a fresh learner built from `cfg` in each of `n_experiments` runs;
/// run seeds are derived from `seed`.
pub fn estimate_edge_tables(
    tables: &[ProbTable],
    horizon: u64,
    n_experiments: usize,
    cfg: &LearnerConfig,
    seed: u64,
) -> Result<Vec<ProbTable>> {
    let n = check_phase_tables(tables)?;
    if horizon == 0 {
        return Err(Error::invalid("horizon", "must be > 0"));
    }
    if n_experiments == 0 {
        return Err(Error::invalid("n_experiments", "must be >= 1"));
    }
    let rounds = usize::try_from(horizon).map_err(|_| Error::invalid("horizon", "too large"))?;

    let mut sums = vec![Matrix::zeros(n, n); rounds];
    for row in 0..n {
        for e in 0..n_experiments {
            let run_seed = seed.wrapping_add((row * n_experiments + e) as u64);
            let mut env = PhasedEnv::from_table_row(tables, row, horizon, run_seed.wrapping_mul(2))?;
            let mut learner = AnyLearner::from_config(n, cfg, run_seed.wrapping_mul(2).wrapping_add(1))?;
            for sum in sums.iter_mut() {
                let arm = learner.select();
                let r = env.observe(arm);
                learner.update(arm, r);
                for (acc, x) in sum.row_mut(row).iter_mut().zip(learner.expectations()) {
                    *acc += x;
                }
            }
        }
        tracing::debug!(row, kind = cfg.kind(), "edge row estimated");
    }

    let scale = n_experiments as f64;
    sums.into_iter()
        .map(|m| ProbTable::new(m.map(|x| (x / scale).clamp(0.0, 1.0))))
        .collect()
}

/// Node count shared by all `tables`.
fn check_phase_tables(tables: &[ProbTable]) -> Result<usize> {
    let n = tables
        .first()
        .map(ProbTable::n_nodes)
        .ok_or(Error::Empty("phase tables"))?;
    if let Some(t) = tables.iter().find(|t| t.n_nodes() != n) {
        return Err(Error::DimensionMismatch {
            expected: n,
            got: t.n_nodes(),
        });
    }
    Ok(n)
}

/// The true table in force at each round of `horizon`.
pub fn phase_tables(tables: &[ProbTable], horizon: u64) -> Result<Vec<ProbTable>> {
    check_phase_tables(tables)?;
    Ok((0..horizon)
        .map(|t| tables[phase_index(t, horizon, tables.len())].clone())
        .collect())
}

/// Per-round `sum(truth - estimate)` over all edges.
pub fn table_regret(truth: &[ProbTable], estimates: &[ProbTable]) -> Result<Vec<f64>> {
    if truth.len() != estimates.len() {
        return Err(Error::DimensionMismatch {
            expected: truth.len(),
            got: estimates.len(),
        });
    }
    truth
        .iter()
        .zip(estimates)
        .map(|(t, e)| {
            if t.n_nodes() != e.n_nodes() {
                return Err(Error::DimensionMismatch {
                    expected: t.n_nodes(),
                    got: e.n_nodes(),
                });
            }
            Ok(t.total() - e.total())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BernoulliEnv, Ucb1};

    #[test]
    fn run_records_every_round() {
        let mut env = BernoulliEnv::new(vec![0.0, 1.0], 3).unwrap();
        let mut ucb = Ucb1::new(2);
        let trace = run(&mut env, &mut ucb, 50);
        assert_eq!(trace.len(), 50);
        assert_eq!(trace.picks[..2], [0, 1]);
        assert!(trace.optimal.iter().all(|&o| o == 1.0));
        let regret = trace.cumulative_regret();
        // Deterministic arms: each pull of arm 0 costs exactly 1.
        let pulls_0 = trace.pick_counts(2)[0] as f64;
        assert_eq!(*regret.last().unwrap(), pulls_0);
        assert_eq!(trace.total_reward(), 50.0 - pulls_0);
    }

    #[test]
    fn run_reads_phase_before_observing() {
        let mut env = PhasedEnv::new(vec![vec![0.0], vec![1.0]], 2, 0).unwrap();
        let mut ucb = Ucb1::new(1);
        let trace = run(&mut env, &mut ucb, 2);
        assert_eq!(trace.expected, vec![0.0, 1.0]);
        assert_eq!(trace.rewards, vec![0.0, 1.0]);
    }

    #[test]
    fn phase_tables_switch_at_boundaries() {
        let a = ProbTable::empty(2);
        let b = ProbTable::from_rows(vec![vec![0.0, 1.0], vec![0.0, 0.0]]).unwrap();
        let per_round = phase_tables(&[a.clone(), b.clone()], 10).unwrap();
        assert_eq!(per_round.len(), 10);
        assert_eq!(per_round[4], a);
        assert_eq!(per_round[5], b);
        assert!(phase_tables(&[], 10).is_err());
    }

    #[test]
    fn deterministic_edges_are_learned_exactly() {
        // Edges with probability 0 or 1 produce exact empirical means once every
        // arm has been pulled.
        let t = ProbTable::from_rows(vec![vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
        let est = estimate_edge_tables(&[t.clone()], 20, 2, &LearnerConfig::Ucb1, 5).unwrap();
        assert_eq!(est.len(), 20);
        assert_eq!(est[19], t);
        let regret = table_regret(&phase_tables(&[t], 20).unwrap(), &est).unwrap();
        assert_eq!(regret[19], 0.0);
        // After the first round only arm 0 of each row has been observed.
        assert_eq!(regret[0], 1.0);
    }

    #[test]
    fn table_regret_checks_lengths() {
        let t = ProbTable::empty(2);
        assert!(table_regret(&[t.clone()], &[]).is_err());
        assert!(table_regret(&[t], &[ProbTable::empty(3)]).is_err());
    }
}
