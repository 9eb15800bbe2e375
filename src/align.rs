//! Trajectory alignment onto a common time base.
//!
//! Every demonstration is warped against the longest one with dynamic time
//! warping, so that "step t" means roughly the same phase of the task in every
//! demonstration before statistics are taken across them.
//!
//! # Resampling policy
//!
//! The warping path against a reference of length T has at least T entries.
//! The demonstration is resampled at the path's target indices, in path
//! order, and the first T of them are kept. Shorter demonstrations are
//! upsampled by the repeated indices the path introduces.

use tracing::debug;

use crate::distance::{dtw, l1_distance};
use crate::error::{Result, SkillError};
use crate::trajectory::{AlignedTrajectories, Demonstration};

/// Warp a set of demonstrations onto the length of the longest one.
///
/// The reference is the demonstration with the most samples (the first one
/// on ties). The output has shape `(N, T, D)` with `T` the reference length.
///
/// # Errors
///
/// Returns [`SkillError::Alignment`] if:
/// - no demonstrations are given
/// - any demonstration has zero samples or zero dimensions
/// - the demonstrations do not share the same dimensionality
///
/// # Example
///
/// ```
/// use motion_skill::{align_trajectories, Demonstration};
///
/// let slow = Demonstration::from_points3(&[
///     [0.0, 0.0, 0.0],
///     [0.5, 0.0, 0.0],
///     [1.0, 0.0, 0.0],
///     [1.5, 0.0, 0.0],
/// ]);
/// let fast = Demonstration::from_points3(&[[0.0, 0.0, 0.0], [1.5, 0.0, 0.0]]);
///
/// let aligned = align_trajectories(&[slow, fast])?;
/// assert_eq!(aligned.shape(), (2, 4, 3));
/// # Ok::<(), motion_skill::SkillError>(())
/// ```
pub fn align_trajectories(demos: &[Demonstration]) -> Result<AlignedTrajectories> {
    validate_demonstrations(demos)?;

    // First demonstration of maximal length
    let reference_idx = demos
        .iter()
        .enumerate()
        .fold(0, |best, (i, d)| if d.len() > demos[best].len() { i } else { best });
    let reference = &demos[reference_idx];
    let n_steps = reference.len();

    debug!(
        n_demos = demos.len(),
        reference = reference_idx,
        n_steps,
        "aligning demonstrations"
    );

    let warped = demos
        .iter()
        .map(|demo| warp_onto(reference, demo, n_steps))
        .collect::<Result<Vec<_>>>()?;

    AlignedTrajectories::from_demonstrations(&warped)
}

/// Resample `demo` along its DTW path against `reference`.
fn warp_onto(reference: &Demonstration, demo: &Demonstration, n_steps: usize) -> Result<Demonstration> {
    let alignment = dtw(reference.points(), demo.points(), l1_distance)?;
    let points: Vec<Vec<f64>> = alignment
        .path
        .target
        .iter()
        .take(n_steps)
        .map(|&j| demo.point(j).to_vec())
        .collect();
    Demonstration::new(demo.dims(), points)
}

/// Validate that demonstrations can be stacked.
fn validate_demonstrations(demos: &[Demonstration]) -> Result<()> {
    let first = demos
        .first()
        .ok_or_else(|| SkillError::alignment("at least one demonstration is required"))?;
    let dims = first.dims();

    for (i, demo) in demos.iter().enumerate() {
        if demo.is_empty() {
            return Err(SkillError::alignment(format!(
                "demonstration {} has zero samples",
                i
            )));
        }
        if demo.dims() == 0 {
            return Err(SkillError::alignment(format!(
                "demonstration {} has zero dimensions",
                i
            )));
        }
        if demo.dims() != dims {
            return Err(SkillError::alignment(format!(
                "demonstration {} has {} dimensions, expected {}",
                i,
                demo.dims(),
                dims
            )));
        }
        for (t, p) in demo.points().iter().enumerate() {
            if p.iter().any(|v| !v.is_finite()) {
                return Err(SkillError::numerical_instability(format!(
                    "non-finite sample {} in demonstration {}",
                    t, i
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize, scale: f64) -> Demonstration {
        let pts: Vec<[f64; 3]> = (0..n)
            .map(|i| {
                let s = scale * i as f64 / (n - 1).max(1) as f64;
                [s, 2.0 * s, -s]
            })
            .collect();
        Demonstration::from_points3(&pts)
    }

    #[test]
    fn test_output_shape() {
        let demos = vec![ramp(7, 1.0), ramp(12, 1.0), ramp(9, 1.1)];
        let aligned = align_trajectories(&demos).unwrap();
        assert_eq!(aligned.shape(), (3, 12, 3));
    }

    #[test]
    fn test_single_demo_identity() {
        let demo = ramp(10, 2.0);
        let aligned = align_trajectories(std::slice::from_ref(&demo)).unwrap();
        assert_eq!(aligned.shape(), (1, 10, 3));
        for (t, sample) in aligned.demo(0).enumerate() {
            assert_eq!(sample, demo.point(t));
        }
    }

    #[test]
    fn test_reference_unchanged() {
        let demos = vec![ramp(5, 1.0), ramp(8, 1.0)];
        let aligned = align_trajectories(&demos).unwrap();
        for (t, sample) in aligned.demo(1).enumerate() {
            assert_eq!(sample, demos[1].point(t));
        }
    }

    #[test]
    fn test_first_longest_is_reference() {
        // Equal lengths; warping either onto the other gives a different stack
        let early = Demonstration::from_scalars(&[0.0, 0.0, 1.0]);
        let late = Demonstration::from_scalars(&[0.0, 1.0, 1.0]);
        let column = |a: &AlignedTrajectories, n: usize| -> Vec<f64> {
            a.demo(n).map(|s| s[0]).collect()
        };

        let aligned = align_trajectories(&[early.clone(), late.clone()]).unwrap();
        assert_eq!(column(&aligned, 0), vec![0.0, 0.0, 1.0]);
        assert_eq!(column(&aligned, 1), vec![0.0, 0.0, 1.0]);

        let aligned = align_trajectories(&[late, early]).unwrap();
        assert_eq!(column(&aligned, 0), vec![0.0, 1.0, 1.0]);
        assert_eq!(column(&aligned, 1), vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_short_demo_keeps_order_and_endpoints() {
        let long = Demonstration::from_scalars(&[0.0, 0.2, 0.4, 0.6, 0.8, 1.0]);
        let short = Demonstration::from_scalars(&[0.0, 0.5, 1.0]);
        let aligned = align_trajectories(&[long, short]).unwrap();

        let warped: Vec<f64> = aligned.demo(1).map(|s| s[0]).collect();
        assert_eq!(warped.len(), 6);
        assert_eq!(warped[0], 0.0);
        assert_eq!(warped[5], 1.0);
        assert!(warped.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_zero_length_rejected() {
        let empty = Demonstration::new(3, vec![]).unwrap();
        let result = align_trajectories(&[ramp(4, 1.0), empty]);
        assert!(matches!(result, Err(SkillError::Alignment(_))));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let grip = Demonstration::from_scalars(&[0.0, 1.0]);
        let result = align_trajectories(&[ramp(4, 1.0), grip]);
        assert!(matches!(result, Err(SkillError::Alignment(_))));
    }

    #[test]
    fn test_no_demonstrations_rejected() {
        assert!(matches!(
            align_trajectories(&[]),
            Err(SkillError::Alignment(_))
        ));
    }
}
