//! Contexts: clustering arms into groups and carrying the assignment alongside a learner.
//!
//! The flow is caller-driven:
//!
//! ```text
//! every `interval` rounds:
//!     features  = (external feature generator)
//!     contexts  = generator.refresh(&features)?      // fit + predict
//!     learner.refresh_contexts(contexts)?            // wholesale replacement
//! ```
//!
//! [`Contextual`] never clusters on its own; it only stores the latest
//! [`ContextMap`] for downstream consumers while selection and update behave
//! exactly like the wrapped learner. Clustering is pluggable through
//! [`Clusterer`]; [`KMeans`] is the default implementation.
//!
//! Asking for more clusters than there are distinct feature vectors is an error
//! reported immediately ([`Error::InsufficientPoints`]); it is never coerced into
//! fewer clusters.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{sample_index, Error, Learner, Result};

/// Arm index → context id, replaced wholesale on every refresh.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContextMap {
    ids: Vec<usize>,
}

impl ContextMap {
    pub fn new(ids: Vec<usize>) -> Self {
        Self { ids }
    }

    /// Context id per arm.
    pub fn ids(&self) -> &[usize] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn context_of(&self, arm: usize) -> Option<usize> {
        self.ids.get(arm).copied()
    }

    /// Arms assigned to `context`, in index order.
    pub fn arms_in(&self, context: usize) -> Vec<usize> {
        self.ids
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == context)
            .map(|(a, _)| a)
            .collect()
    }

    /// Number of distinct context ids in use.
    pub fn n_contexts(&self) -> usize {
        let mut ids = self.ids.clone();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}

/// A learner plus the latest context assignment of its arms.
#[derive(Debug, Clone)]
pub struct Contextual<L> {
    inner: L,
    contexts: Option<ContextMap>,
    refreshes: u64,
}

impl<L: Learner> Contextual<L> {
    pub fn new(inner: L) -> Self {
        Self {
            inner,
            contexts: None,
            refreshes: 0,
        }
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }

    pub fn into_inner(self) -> L {
        self.inner
    }

    /// Replace the context assignment. Its length must equal the arm count.
    pub fn refresh_contexts(&mut self, contexts: ContextMap) -> Result<()> {
        if contexts.len() != self.inner.n_arms() {
            return Err(Error::DimensionMismatch {
                expected: self.inner.n_arms(),
                got: contexts.len(),
            });
        }
        self.contexts = Some(contexts);
        self.refreshes = self.refreshes.saturating_add(1);
        Ok(())
    }

    /// Latest assignment, if any refresh has happened.
    pub fn contexts(&self) -> Option<&ContextMap> {
        self.contexts.as_ref()
    }

    pub fn context_of(&self, arm: usize) -> Option<usize> {
        self.contexts.as_ref().and_then(|c| c.context_of(arm))
    }

    pub fn arms_in_context(&self, context: usize) -> Vec<usize> {
        self.contexts
            .as_ref()
            .map(|c| c.arms_in(context))
            .unwrap_or_default()
    }

    /// Number of successful refreshes.
    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }
}

impl<L: Learner> Learner for Contextual<L> {
    fn n_arms(&self) -> usize {
        self.inner.n_arms()
    }

    fn select(&mut self) -> usize {
        self.inner.select()
    }

    fn update(&mut self, arm: usize, reward: f64) {
        self.inner.update(arm, reward);
    }

    fn expectations(&self) -> Vec<f64> {
        self.inner.expectations()
    }
}

/// Partition feature vectors into groups.
pub trait Clusterer {
    /// Learn cluster structure from `points`.
    fn fit(&mut self, points: &[Vec<f64>]) -> Result<()>;

    /// Assign each of `points` to a learned cluster.
    fn predict(&self, points: &[Vec<f64>]) -> Result<Vec<usize>>;
}

/// k-means parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KMeansConfig {
    /// Number of clusters (>= 1).
    pub k: usize,
    /// Upper bound on Lloyd iterations.
    pub max_iter: usize,
    /// Stop once no centroid moves farther than this.
    pub tol: f64,
    /// Seed for k-means++ initialisation.
    pub seed: u64,
}

impl Default for KMeansConfig {
    fn default() -> Self {
        Self {
            k: 5,
            max_iter: 100,
            tol: 1e-9,
            seed: 0,
        }
    }
}

/// Lloyd's k-means with k-means++ seeding.
///
/// Refitting the same points with the same config gives the same centroids.
#[derive(Debug, Clone)]
pub struct KMeans {
    cfg: KMeansConfig,
    centroids: Option<Vec<Vec<f64>>>,
}

fn sq_dist(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(centroids: &[Vec<f64>], p: &[f64]) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = sq_dist(c, p);
        if d < best_d {
            best = i;
            best_d = d;
        }
    }
    best
}

/// Common dimension of `points`, rejecting ragged or non-finite input.
fn dimension(points: &[Vec<f64>]) -> Result<usize> {
    let dim = points.first().map(Vec::len).ok_or(Error::Empty("feature vectors"))?;
    for p in points {
        if p.len() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                got: p.len(),
            });
        }
        if p.iter().any(|x| !x.is_finite()) {
            return Err(Error::invalid("features", "must be finite"));
        }
    }
    Ok(dim)
}

fn distinct_points(points: &[Vec<f64>]) -> Vec<Vec<f64>> {
    // -0.0 and 0.0 are the same point.
    let key = |p: &Vec<f64>| -> Vec<u64> { p.iter().map(|x| (x + 0.0).to_bits()).collect() };
    let mut keyed: Vec<(Vec<u64>, &Vec<f64>)> = points.iter().map(|p| (key(p), p)).collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.dedup_by(|a, b| a.0 == b.0);
    keyed.into_iter().map(|(_, p)| p.clone()).collect()
}

impl KMeans {
    pub fn new(cfg: KMeansConfig) -> Result<Self> {
        if cfg.k == 0 {
            return Err(Error::invalid("k", "must be >= 1"));
        }
        if cfg.max_iter == 0 {
            return Err(Error::invalid("max_iter", "must be >= 1"));
        }
        if !(cfg.tol.is_finite() && cfg.tol >= 0.0) {
            return Err(Error::invalid("tol", "must be finite and >= 0"));
        }
        Ok(Self {
            cfg,
            centroids: None,
        })
    }

    pub fn k(&self) -> usize {
        self.cfg.k
    }

    /// Centroids learned by the last successful `fit`.
    pub fn centroids(&self) -> Option<&[Vec<f64>]> {
        self.centroids.as_deref()
    }

    fn seed_centroids(&self, distinct: &[Vec<f64>], rng: &mut StdRng) -> Vec<Vec<f64>> {
        let k = self.cfg.k;
        let mut centroids = Vec::with_capacity(k);
        centroids.push(distinct[rng.random_range(0..distinct.len())].clone());
        while centroids.len() < k {
            let d2: Vec<f64> = distinct
                .iter()
                .map(|p| {
                    centroids
                        .iter()
                        .map(|c| sq_dist(c, p))
                        .fold(f64::INFINITY, f64::min)
                })
                .collect();
            let total: f64 = d2.iter().sum();
            let next = if total > 0.0 && total.is_finite() {
                let probs: Vec<f64> = d2.iter().map(|d| d / total).collect();
                sample_index(&probs, rng.random())
            } else {
                // Unreachable with >= k distinct points; keep the first unused one.
                distinct
                    .iter()
                    .position(|p| !centroids.contains(p))
                    .unwrap_or(0)
            };
            centroids.push(distinct[next].clone());
        }
        centroids
    }
}

impl Clusterer for KMeans {
    fn fit(&mut self, points: &[Vec<f64>]) -> Result<()> {
        let dim = dimension(points)?;
        let distinct = distinct_points(points);
        if distinct.len() < self.cfg.k {
            return Err(Error::InsufficientPoints {
                distinct: distinct.len(),
                clusters: self.cfg.k,
            });
        }

        let mut rng = StdRng::seed_from_u64(self.cfg.seed);
        let mut centroids = self.seed_centroids(&distinct, &mut rng);

        for _ in 0..self.cfg.max_iter {
            let mut sums = vec![vec![0.0; dim]; self.cfg.k];
            let mut counts = vec![0usize; self.cfg.k];
            for p in points {
                let c = nearest(&centroids, p);
                counts[c] += 1;
                for (s, x) in sums[c].iter_mut().zip(p) {
                    *s += x;
                }
            }
            let mut shift = 0.0f64;
            for (c, (sum, &n)) in sums.into_iter().zip(&counts).enumerate() {
                // An empty cluster keeps its previous centroid.
                if n == 0 {
                    continue;
                }
                let next: Vec<f64> = sum.into_iter().map(|s| s / n as f64).collect();
                shift = shift.max(sq_dist(&centroids[c], &next).sqrt());
                centroids[c] = next;
            }
            if shift <= self.cfg.tol {
                break;
            }
        }

        self.centroids = Some(centroids);
        Ok(())
    }

    fn predict(&self, points: &[Vec<f64>]) -> Result<Vec<usize>> {
        let centroids = self.centroids.as_ref().ok_or(Error::NotFitted)?;
        if points.is_empty() {
            return Ok(Vec::new());
        }
        let dim = dimension(points)?;
        let expected = centroids.first().map(Vec::len).unwrap_or(0);
        if dim != expected {
            return Err(Error::DimensionMismatch { expected, got: dim });
        }
        Ok(points.iter().map(|p| nearest(centroids, p)).collect())
    }
}

/// Fits a clusterer on fresh features and produces the next [`ContextMap`].
#[derive(Debug, Clone)]
pub struct ContextGenerator<C = KMeans> {
    clusterer: C,
}

impl ContextGenerator<KMeans> {
    /// k-means with `n_clusters` clusters and the given seed.
    pub fn new(n_clusters: usize, seed: u64) -> Result<Self> {
        let km = KMeans::new(KMeansConfig {
            k: n_clusters,
            seed,
            ..KMeansConfig::default()
        })?;
        Ok(Self { clusterer: km })
    }

    pub fn n_clusters(&self) -> usize {
        self.clusterer.k()
    }
}

impl<C: Clusterer> ContextGenerator<C> {
    pub fn with_clusterer(clusterer: C) -> Self {
        Self { clusterer }
    }

    pub fn clusterer(&self) -> &C {
        &self.clusterer
    }

    pub fn fit(&mut self, features: &[Vec<f64>]) -> Result<()> {
        self.clusterer.fit(features)
    }

    pub fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<usize>> {
        self.clusterer.predict(features)
    }

    /// Fit on `features` (one vector per arm) and assign every arm a context.
    pub fn refresh(&mut self, features: &[Vec<f64>]) -> Result<ContextMap> {
        self.fit(features)?;
        let ids = self.predict(features)?;
        tracing::debug!(arms = ids.len(), "contexts refreshed");
        Ok(ContextMap::new(ids))
    }
}

/// Fixed refresh cadence: due on every positive multiple of `interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContextSchedule {
    interval: u64,
}

impl ContextSchedule {
    pub fn new(interval: u64) -> Result<Self> {
        if interval == 0 {
            return Err(Error::invalid("interval", "must be >= 1"));
        }
        Ok(Self { interval })
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn is_due(&self, round: u64) -> bool {
        round > 0 && round % self.interval == 0
    }
}
