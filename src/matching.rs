//! Minimum-cost bipartite assignment (Hungarian algorithm).
//!
//! [`solve`] is the shortest-augmenting-path formulation with row/column
//! potentials, `O(n^3)` in the padded size. Rectangular inputs are padded to
//! square with zero-cost dummy rows or columns; pairs touching a dummy are
//! dropped, so with more rows than columns some rows stay unmatched (and vice
//! versa).
//!
//! Ties resolve deterministically: columns are scanned in ascending order and
//! only a strictly smaller reduced cost replaces the current best.

use crate::{Error, Matrix, Result};

/// Result of an assignment: `(row, col)` pairs in row order plus their cost.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Assignment {
    pub pairs: Vec<(usize, usize)>,
    pub total_cost: f64,
}

impl Assignment {
    /// Column assigned to `row`, if it was matched.
    pub fn col_of(&self, row: usize) -> Option<usize> {
        self.pairs.iter().find(|(r, _)| *r == row).map(|(_, c)| *c)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

fn check_finite(cost: &Matrix) -> Result<()> {
    for (row, r) in cost.iter_rows().enumerate() {
        if let Some(col) = r.iter().position(|x| !x.is_finite()) {
            return Err(Error::NonFiniteCost {
                row,
                col,
                value: r[col],
            });
        }
    }
    Ok(())
}

/// Potentials and path sums stay within `2 * size * max|cost|`; reject inputs
/// where that bound is not representable.
fn check_magnitude(cost: &Matrix, size: usize) -> Result<()> {
    let max_abs = cost.as_slice().iter().fold(0.0f64, |m, x| m.max(x.abs()));
    if (max_abs * 2.0 * size as f64).is_finite() {
        Ok(())
    } else {
        Err(Error::invalid(
            "cost",
            format!("magnitude {max_abs:e} overflows f64 for a {size}x{size} assignment"),
        ))
    }
}

/// Column assigned to each row of a square, finite matrix.
fn hungarian_square(a: &Matrix) -> Vec<usize> {
    let n = a.rows();
    // 1-based potentials and matching; index 0 is the virtual source column.
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; n + 1];
    let mut p = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for i in 1..=n {
        p[0] = i;
        let mut j0 = 0usize;
        let mut minv = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];
        loop {
            used[j0] = true;
            let i0 = p[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0usize;
            for j in 1..=n {
                if used[j] {
                    continue;
                }
                let cur = a.get(i0 - 1, j - 1) - u[i0] - v[j];
                if cur < minv[j] {
                    minv[j] = cur;
                    way[j] = j0;
                }
                if minv[j] < delta {
                    delta = minv[j];
                    j1 = j;
                }
            }
            for j in 0..=n {
                if used[j] {
                    u[p[j]] += delta;
                    v[j] -= delta;
                } else {
                    minv[j] -= delta;
                }
            }
            j0 = j1;
            if p[j0] == 0 {
                break;
            }
        }
        loop {
            let j1 = way[j0];
            p[j0] = p[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut col_of_row = vec![0usize; n];
    for j in 1..=n {
        if p[j] > 0 {
            col_of_row[p[j] - 1] = j - 1;
        }
    }
    col_of_row
}

/// Minimum-cost assignment of rows to columns.
///
/// Entries must be finite, and `2 * max(rows, cols) * max|cost|` must fit in an
/// `f64` so that `total_cost` and the internal potentials never overflow.
pub fn solve(cost: &Matrix) -> Result<Assignment> {
    check_finite(cost)?;
    let (rows, cols) = (cost.rows(), cost.cols());
    if rows == 0 || cols == 0 {
        return Ok(Assignment {
            pairs: Vec::new(),
            total_cost: 0.0,
        });
    }
    let size = rows.max(cols);
    check_magnitude(cost, size)?;
    let square = cost.padded(size, size, 0.0);
    let pairs: Vec<(usize, usize)> = hungarian_square(&square)
        .into_iter()
        .enumerate()
        .filter(|&(r, c)| r < rows && c < cols)
        .collect();
    let total_cost = pairs.iter().map(|&(r, c)| cost.get(r, c)).sum();
    Ok(Assignment { pairs, total_cost })
}

/// Maximum-profit assignment. `total_cost` holds the total profit.
pub fn solve_max(profit: &Matrix) -> Result<Assignment> {
    check_finite(profit)?;
    let mut a = solve(&profit.map(|x| -x))?;
    a.total_cost = a.pairs.iter().map(|&(r, c)| profit.get(r, c)).sum();
    Ok(a)
}

/// One-to-many assignment where column `j` accepts up to `capacities[j]` rows.
///
/// Columns are replicated `capacities[j]` times and the replicas mapped back to
/// their original column index in the result.
pub fn solve_with_capacity(cost: &Matrix, capacities: &[usize]) -> Result<Assignment> {
    if capacities.len() != cost.cols() {
        return Err(Error::DimensionMismatch {
            expected: cost.cols(),
            got: capacities.len(),
        });
    }
    check_finite(cost)?;
    let slots: Vec<usize> = capacities
        .iter()
        .enumerate()
        .flat_map(|(j, &cap)| std::iter::repeat(j).take(cap))
        .collect();
    let mut expanded = Matrix::zeros(cost.rows(), slots.len());
    for r in 0..cost.rows() {
        let row = cost.row(r);
        for (dst, &j) in expanded.row_mut(r).iter_mut().zip(&slots) {
            *dst = row[j];
        }
    }
    let a = solve(&expanded)?;
    Ok(Assignment {
        pairs: a.pairs.into_iter().map(|(r, s)| (r, slots[s])).collect(),
        total_cost: a.total_cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn m(rows: Vec<Vec<f64>>) -> Matrix {
        Matrix::from_rows(rows).unwrap()
    }

    fn brute_force(cost: &Matrix) -> f64 {
        fn go(cost: &Matrix, row: usize, used: &mut Vec<bool>) -> f64 {
            if row == cost.rows() {
                return 0.0;
            }
            let mut best = f64::INFINITY;
            for c in 0..cost.cols() {
                if !used[c] {
                    used[c] = true;
                    best = best.min(cost.get(row, c) + go(cost, row + 1, used));
                    used[c] = false;
                }
            }
            best
        }
        go(cost, 0, &mut vec![false; cost.cols()])
    }

    #[test]
    fn diagonal_minimum_is_found() {
        let a = solve(&m(vec![
            vec![1.0, 10.0, 10.0],
            vec![10.0, 2.0, 10.0],
            vec![10.0, 10.0, 3.0],
        ]))
        .unwrap();
        assert_eq!(a.pairs, vec![(0, 0), (1, 1), (2, 2)]);
        assert_eq!(a.total_cost, 6.0);
    }

    #[test]
    fn classic_example() {
        let a = solve(&m(vec![
            vec![4.0, 1.0, 3.0],
            vec![2.0, 0.0, 5.0],
            vec![3.0, 2.0, 2.0],
        ]))
        .unwrap();
        assert_eq!(a.total_cost, 5.0);
        assert_eq!(a.col_of(0), Some(1));
        assert_eq!(a.col_of(1), Some(0));
        assert_eq!(a.col_of(2), Some(2));
    }

    #[test]
    fn more_columns_than_rows() {
        let a = solve(&m(vec![vec![5.0, 1.0, 7.0], vec![2.0, 8.0, 9.0]])).unwrap();
        assert_eq!(a.pairs, vec![(0, 1), (1, 0)]);
        assert_eq!(a.total_cost, 3.0);
    }

    #[test]
    fn more_rows_than_columns_leaves_rows_unmatched() {
        let a = solve(&m(vec![vec![5.0], vec![1.0], vec![3.0]])).unwrap();
        assert_eq!(a.pairs, vec![(1, 0)]);
        assert_eq!(a.col_of(0), None);
        assert_eq!(a.total_cost, 1.0);
    }

    #[test]
    fn ties_resolve_to_lowest_index() {
        let a = solve(&Matrix::filled(3, 3, 1.0)).unwrap();
        assert_eq!(a.total_cost, 3.0);
        let b = solve(&Matrix::filled(3, 3, 1.0)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn non_finite_costs_are_rejected() {
        let err = solve(&m(vec![vec![1.0, f64::NAN]])).unwrap_err();
        assert!(matches!(err, Error::NonFiniteCost { row: 0, col: 1, .. }));
        assert!(solve(&m(vec![vec![f64::INFINITY]])).is_err());
    }

    #[test]
    fn empty_matrix_gives_empty_assignment() {
        let a = solve(&Matrix::zeros(0, 0)).unwrap();
        assert!(a.is_empty());
        assert_eq!(a.total_cost, 0.0);
    }

    #[test]
    fn maximisation_negates() {
        let a = solve_max(&m(vec![vec![1.0, 9.0], vec![8.0, 2.0]])).unwrap();
        assert_eq!(a.pairs, vec![(0, 1), (1, 0)]);
        assert_eq!(a.total_cost, 17.0);
    }

    #[test]
    fn capacities_replicate_columns() {
        // Three rows all prefer column 0, which takes two of them.
        let cost = m(vec![vec![0.0, 5.0], vec![0.0, 5.0], vec![0.0, 1.0]]);
        let a = solve_with_capacity(&cost, &[2, 1]).unwrap();
        assert_eq!(a.col_of(2), Some(1));
        assert_eq!(a.col_of(0), Some(0));
        assert_eq!(a.col_of(1), Some(0));
        assert_eq!(a.total_cost, 1.0);

        assert!(matches!(
            solve_with_capacity(&cost, &[1]),
            Err(Error::DimensionMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn costs_too_large_to_sum_are_rejected() {
        let huge = m(vec![vec![f64::MAX, -f64::MAX], vec![-f64::MAX, f64::MAX]]);
        assert!(matches!(
            solve(&huge),
            Err(Error::InvalidParameter { name: "cost", .. })
        ));
        assert!(solve_max(&huge).is_err());

        let large = m(vec![vec![1e300, 0.0], vec![0.0, 1e300]]);
        let a = solve(&large).unwrap();
        assert_eq!(a.total_cost, 0.0);
        assert!(solve_max(&large).unwrap().total_cost.is_finite());
    }

    proptest! {
        #[test]
        fn agrees_with_brute_force(
            n in 1usize..6,
            extra_cols in 0usize..2,
            seed_vals in proptest::collection::vec(-50i32..50, 48),
        ) {
            let cols = n + extra_cols;
            let rows: Vec<Vec<f64>> = (0..n)
                .map(|r| (0..cols).map(|c| seed_vals[r * cols + c] as f64).collect())
                .collect();
            let cost = Matrix::from_rows(rows).unwrap();
            let a = solve(&cost).unwrap();
            prop_assert_eq!(a.pairs.len(), n);
            let mut seen = vec![false; cols];
            for &(_, c) in &a.pairs {
                prop_assert!(!seen[c]);
                seen[c] = true;
            }
            prop_assert!((a.total_cost - brute_force(&cost)).abs() < 1e-9);
        }
    }
}
