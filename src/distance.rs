//! Pointwise distances and dynamic time warping.
//!
//! [`dtw`] computes the optimal monotonic alignment between a reference
//! sequence and a target sequence, returning both the cumulative cost and the
//! warping path. The aligner uses the path; the cost is useful on its own for
//! scoring how similar two demonstrations are.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillError};

/// L1 (Manhattan) distance between two samples.
#[must_use]
#[inline]
pub fn l1_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// A monotonic warping path between two sequences.
///
/// `reference[k]` and `target[k]` are the indices matched at step `k`. Both
/// start at 0, end at the last index of their sequence and never decrease.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WarpingPath {
    /// Indices into the reference sequence.
    pub reference: Vec<usize>,
    /// Indices into the target sequence.
    pub target: Vec<usize>,
}

impl WarpingPath {
    /// Number of matched pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reference.len()
    }

    /// Whether the path is empty (never true for a path returned by [`dtw`]).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reference.is_empty()
    }
}

/// Result of a DTW alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct DtwAlignment {
    /// Cumulative pointwise distance along the optimal path.
    pub cost: f64,
    /// The optimal warping path.
    pub path: WarpingPath,
}

/// Dynamic time warping between `reference` and `target`.
///
/// The cumulative cost matrix uses the classic three-way recursion
/// `acc[i][j] = d(i, j) + min(acc[i-1][j-1], acc[i-1][j], acc[i][j-1])`.
/// On traceback, ties prefer the diagonal step, then a step back along the
/// reference, then a step back along the target.
///
/// # Errors
///
/// Returns an error if either sequence is empty.
pub fn dtw<F>(reference: &[Vec<f64>], target: &[Vec<f64>], dist: F) -> Result<DtwAlignment>
where
    F: Fn(&[f64], &[f64]) -> f64,
{
    let n = reference.len();
    let m = target.len();
    if n == 0 || m == 0 {
        return Err(SkillError::invalid_input(format!(
            "cannot warp sequences of length {} and {}",
            n, m
        )));
    }

    let mut acc = vec![f64::INFINITY; n * m];
    let idx = |i: usize, j: usize| i * m + j;

    for i in 0..n {
        for j in 0..m {
            let cost = dist(&reference[i], &target[j]);
            let best = if i == 0 && j == 0 {
                0.0
            } else {
                let diag = if i > 0 && j > 0 {
                    acc[idx(i - 1, j - 1)]
                } else {
                    f64::INFINITY
                };
                let up = if i > 0 { acc[idx(i - 1, j)] } else { f64::INFINITY };
                let left = if j > 0 { acc[idx(i, j - 1)] } else { f64::INFINITY };
                diag.min(up).min(left)
            };
            acc[idx(i, j)] = cost + best;
        }
    }

    // Traceback from the last cell
    let (mut i, mut j) = (n - 1, m - 1);
    let mut ref_path = vec![i];
    let mut tgt_path = vec![j];
    while i > 0 || j > 0 {
        if i == 0 {
            j -= 1;
        } else if j == 0 {
            i -= 1;
        } else {
            let diag = acc[idx(i - 1, j - 1)];
            let up = acc[idx(i - 1, j)];
            let left = acc[idx(i, j - 1)];
            if diag <= up && diag <= left {
                i -= 1;
                j -= 1;
            } else if up <= left {
                i -= 1;
            } else {
                j -= 1;
            }
        }
        ref_path.push(i);
        tgt_path.push(j);
    }
    ref_path.reverse();
    tgt_path.reverse();

    Ok(DtwAlignment {
        cost: acc[idx(n - 1, m - 1)],
        path: WarpingPath {
            reference: ref_path,
            target: tgt_path,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn seq(values: &[f64]) -> Vec<Vec<f64>> {
        values.iter().map(|&v| vec![v]).collect()
    }

    #[test]
    fn test_l1_distance() {
        assert_relative_eq!(l1_distance(&[1.0, -2.0, 3.0], &[0.0, 0.0, 0.0]), 6.0);
        assert_relative_eq!(l1_distance(&[0.5], &[0.5]), 0.0);
    }

    #[test]
    fn test_identical_sequences_warp_diagonally() {
        let a = seq(&[0.0, 1.0, 2.0, 3.0]);
        let alignment = dtw(&a, &a, l1_distance).unwrap();

        assert_relative_eq!(alignment.cost, 0.0);
        assert_eq!(alignment.path.reference, vec![0, 1, 2, 3]);
        assert_eq!(alignment.path.target, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_shorter_target_repeats_samples() {
        let reference = seq(&[0.0, 1.0, 1.0, 2.0]);
        let target = seq(&[0.0, 1.0, 2.0]);
        let alignment = dtw(&reference, &target, l1_distance).unwrap();

        assert_relative_eq!(alignment.cost, 0.0);
        assert_eq!(alignment.path.target, vec![0, 1, 1, 2]);
        assert_eq!(alignment.path.reference, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_path_is_monotonic_and_spans_both() {
        let reference = seq(&[0.0, 0.3, 0.9, 1.4, 2.0, 2.2]);
        let target = seq(&[0.1, 1.0, 2.1]);
        let alignment = dtw(&reference, &target, l1_distance).unwrap();
        let path = &alignment.path;

        assert_eq!(path.reference.first(), Some(&0));
        assert_eq!(path.target.first(), Some(&0));
        assert_eq!(path.reference.last(), Some(&5));
        assert_eq!(path.target.last(), Some(&2));
        assert!(path.len() >= reference.len());
        for k in 1..path.len() {
            assert!(path.reference[k] >= path.reference[k - 1]);
            assert!(path.target[k] >= path.target[k - 1]);
            assert!(path.reference[k] - path.reference[k - 1] <= 1);
            assert!(path.target[k] - path.target[k - 1] <= 1);
        }
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let a = seq(&[1.0]);
        assert!(dtw(&a, &[], l1_distance).is_err());
        assert!(dtw(&[], &a, l1_distance).is_err());
    }
}
