//! Independent-cascade influence propagation over an edge-probability table.
//!
//! Every node activated in step `s` gets exactly one chance, in step `s + 1`, to
//! activate each of its not-yet-active out-neighbours with the edge's
//! probability. Zero-probability edges are structurally absent and never
//! attempted. The cascade stops once a step activates nothing.

use rand::Rng;

use crate::{argmax_first, Error, Matrix, Result};

/// Square table of edge activation probabilities, `p(u, v)` for edge `u -> v`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProbTable {
    m: Matrix,
}

impl ProbTable {
    /// Validate `m` as a probability table: square, every entry in `[0, 1]`.
    pub fn new(m: Matrix) -> Result<Self> {
        if !m.is_square() {
            return Err(Error::NotSquare {
                rows: m.rows(),
                cols: m.cols(),
            });
        }
        for (index, &value) in m.as_slice().iter().enumerate() {
            crate::error::check_probability(index, value)?;
        }
        Ok(Self { m })
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        Self::new(Matrix::from_rows(rows)?)
    }

    /// A table with no edges.
    pub fn empty(n_nodes: usize) -> Self {
        Self {
            m: Matrix::zeros(n_nodes, n_nodes),
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.m.rows()
    }

    pub fn p(&self, from: usize, to: usize) -> f64 {
        self.m.get(from, to)
    }

    /// Out-edge probabilities of `node`.
    pub fn row(&self, node: usize) -> &[f64] {
        self.m.row(node)
    }

    pub fn has_edge(&self, from: usize, to: usize) -> bool {
        self.p(from, to) > 0.0
    }

    pub fn as_matrix(&self) -> &Matrix {
        &self.m
    }

    pub fn into_matrix(self) -> Matrix {
        self.m
    }

    /// Sum of all edge probabilities.
    pub fn total(&self) -> f64 {
        self.m.sum()
    }
}

/// Outcome of one cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Episode {
    /// `active[v]` is true once `v` has been activated.
    pub active: Vec<bool>,
    /// Nodes activated at each step; `history[0]` holds the seeds.
    pub history: Vec<Vec<usize>>,
    /// Propagation steps that activated at least one node.
    pub steps: usize,
}

impl Episode {
    /// Active nodes in index order.
    pub fn activated(&self) -> Vec<usize> {
        self.active
            .iter()
            .enumerate()
            .filter_map(|(v, &a)| a.then_some(v))
            .collect()
    }

    pub fn n_active(&self) -> usize {
        self.active.iter().filter(|&&a| a).count()
    }
}

/// Run one independent cascade from `seeds`.
///
/// `max_steps` caps the number of propagation steps (`None` = run to
/// quiescence, which takes at most `n_nodes - 1` steps). Duplicate seeds are
/// ignored.
pub fn simulate_episode<R: Rng + ?Sized>(
    table: &ProbTable,
    seeds: &[usize],
    max_steps: Option<usize>,
    rng: &mut R,
) -> Result<Episode> {
    let n = table.n_nodes();
    let mut active = vec![false; n];
    let mut frontier = Vec::with_capacity(seeds.len());
    for &s in seeds {
        if s >= n {
            return Err(Error::IndexOutOfRange { index: s, len: n });
        }
        if !active[s] {
            active[s] = true;
            frontier.push(s);
        }
    }

    let mut history = vec![frontier.clone()];
    let mut steps = 0;
    while !frontier.is_empty() && max_steps.map_or(true, |cap| steps < cap) {
        let mut next = Vec::new();
        for &u in &frontier {
            for (v, &p) in table.row(u).iter().enumerate() {
                if p > 0.0 && !active[v] && rng.random::<f64>() < p {
                    active[v] = true;
                    next.push(v);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        steps += 1;
        history.push(next.clone());
        frontier = next;
    }

    Ok(Episode {
        active,
        history,
        steps,
    })
}

/// Monte-Carlo estimate of the expected number of active nodes.
pub fn expected_spread<R: Rng + ?Sized>(
    table: &ProbTable,
    seeds: &[usize],
    n_sims: usize,
    rng: &mut R,
) -> Result<f64> {
    if n_sims == 0 {
        return Err(Error::invalid("n_sims", "must be >= 1"));
    }
    let mut total = 0usize;
    for _ in 0..n_sims {
        total += simulate_episode(table, seeds, None, rng)?.n_active();
    }
    Ok(total as f64 / n_sims as f64)
}

/// Greedy influence maximisation: add, `budget` times, the node whose addition
/// gives the largest estimated spread (lowest index on ties).
///
/// `budget` is clamped to the number of nodes.
pub fn greedy_seeds<R: Rng + ?Sized>(
    table: &ProbTable,
    budget: usize,
    n_sims: usize,
    rng: &mut R,
) -> Result<Vec<usize>> {
    let n = table.n_nodes();
    let budget = budget.min(n);
    let mut seeds: Vec<usize> = Vec::with_capacity(budget);
    let mut candidate = Vec::with_capacity(budget);
    for _ in 0..budget {
        let mut scores = vec![f64::NEG_INFINITY; n];
        for v in 0..n {
            if seeds.contains(&v) {
                continue;
            }
            candidate.clear();
            candidate.extend_from_slice(&seeds);
            candidate.push(v);
            scores[v] = expected_spread(table, &candidate, n_sims, rng)?;
        }
        let Some(best) = argmax_first(scores.iter().copied()) else {
            break;
        };
        tracing::debug!(node = best, spread = scores[best], "greedy seed chosen");
        seeds.push(best);
    }
    Ok(seeds)
}

/// Random graph: each ordered pair `u != v` carries an edge with probability
/// `edge_rate`, whose activation probability is uniform in `[0.1, 0.9)`.
pub fn random_graph<R: Rng + ?Sized>(n: usize, edge_rate: f64, rng: &mut R) -> Result<ProbTable> {
    if !(0.0..=1.0).contains(&edge_rate) {
        return Err(Error::invalid("edge_rate", "must be in [0, 1]"));
    }
    let mut m = Matrix::zeros(n, n);
    for u in 0..n {
        for v in 0..n {
            if u != v && rng.random_bool(edge_rate) {
                m.set(u, v, rng.random_range(0.1..0.9));
            }
        }
    }
    ProbTable::new(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn chain(n: usize, p: f64) -> ProbTable {
        let mut m = Matrix::zeros(n, n);
        for u in 0..n.saturating_sub(1) {
            m.set(u, u + 1, p);
        }
        ProbTable::new(m).unwrap()
    }

    #[test]
    fn table_validation() {
        assert!(matches!(
            ProbTable::new(Matrix::zeros(2, 3)),
            Err(Error::NotSquare { rows: 2, cols: 3 })
        ));
        assert!(matches!(
            ProbTable::from_rows(vec![vec![0.0, 1.5], vec![0.0, 0.0]]),
            Err(Error::InvalidProbability { index: 1, .. })
        ));
        assert!(ProbTable::from_rows(vec![vec![0.0, f64::NAN], vec![0.0, 0.0]]).is_err());
    }

    #[test]
    fn all_zero_graph_activates_only_the_seed() {
        let mut rng = StdRng::seed_from_u64(1);
        let ep = simulate_episode(&ProbTable::empty(5), &[2], None, &mut rng).unwrap();
        assert_eq!(ep.activated(), vec![2]);
        assert_eq!(ep.steps, 0);
        assert_eq!(ep.history, vec![vec![2]]);
    }

    #[test]
    fn certain_chain_reaches_everything_one_hop_per_step() {
        let mut rng = StdRng::seed_from_u64(1);
        let ep = simulate_episode(&chain(5, 1.0), &[0], None, &mut rng).unwrap();
        assert_eq!(ep.n_active(), 5);
        assert_eq!(ep.steps, 4);
        assert_eq!(ep.history[3], vec![3]);
    }

    #[test]
    fn max_steps_truncates_the_cascade() {
        let mut rng = StdRng::seed_from_u64(1);
        let ep = simulate_episode(&chain(5, 1.0), &[0], Some(2), &mut rng).unwrap();
        assert_eq!(ep.activated(), vec![0, 1, 2]);
        assert_eq!(ep.steps, 2);
    }

    #[test]
    fn out_of_range_seed_is_an_error() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            simulate_episode(&ProbTable::empty(3), &[3], None, &mut rng),
            Err(Error::IndexOutOfRange { index: 3, len: 3 })
        );
    }

    #[test]
    fn spread_of_half_edge_is_one_and_a_half() {
        let mut rng = StdRng::seed_from_u64(3);
        let s = expected_spread(&chain(2, 0.5), &[0], 20_000, &mut rng).unwrap();
        assert!((s - 1.5).abs() < 0.02, "spread={s}");
    }

    #[test]
    fn greedy_prefers_the_hub() {
        // Node 2 reaches everyone with certainty; node 0 reaches only node 1.
        let mut m = Matrix::zeros(4, 4);
        m.set(0, 1, 1.0);
        for v in [0, 1, 3] {
            m.set(2, v, 1.0);
        }
        let table = ProbTable::new(m).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let seeds = greedy_seeds(&table, 2, 10, &mut rng).unwrap();
        // After the hub every remaining node adds nothing: lowest index wins.
        assert_eq!(seeds, vec![2, 0]);
        assert_eq!(greedy_seeds(&table, 10, 1, &mut rng).unwrap().len(), 4);
    }

    #[test]
    fn random_graph_has_no_self_loops_and_bounded_weights() {
        let mut rng = StdRng::seed_from_u64(11);
        let g = random_graph(20, 0.3, &mut rng).unwrap();
        for u in 0..20 {
            assert_eq!(g.p(u, u), 0.0);
            for &p in g.row(u) {
                assert!(p == 0.0 || (0.1..0.9).contains(&p));
            }
        }
        assert!(random_graph(3, 1.5, &mut rng).is_err());
    }
}
