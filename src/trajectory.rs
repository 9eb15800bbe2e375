//! Trajectory data structures.
//!
//! This module defines the three arrays that flow through the pipeline:
//!
//! | Type | Shape | Produced by |
//! |------|-------|-------------|
//! | [`Demonstration`] | (T_i, D) | capture / storage layer |
//! | [`AlignedTrajectories`] | (N, T, D) | [`crate::align_trajectories`] |
//! | [`GeneratedTrajectory`] | (M, D) + M times | [`crate::FittedModel::generate`] |

use nalgebra::DMatrix;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillError};

/// One recorded attempt at a task: an ordered sequence of D-dimensional
/// samples, optionally with the capture timestamps.
///
/// Timestamps are carried for the storage layer; the pipeline itself only uses
/// the sample order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Demonstration {
    dims: usize,
    points: Vec<Vec<f64>>,
    timestamps: Option<Vec<f64>>,
}

impl Demonstration {
    /// Create a demonstration of `dims`-dimensional samples.
    ///
    /// # Errors
    ///
    /// Returns an error if any sample does not have exactly `dims` values.
    pub fn new(dims: usize, points: Vec<Vec<f64>>) -> Result<Self> {
        if let Some((i, p)) = points.iter().enumerate().find(|(_, p)| p.len() != dims) {
            return Err(SkillError::invalid_input(format!(
                "sample {} has {} values, expected {}",
                i,
                p.len(),
                dims
            )));
        }
        Ok(Self {
            dims,
            points,
            timestamps: None,
        })
    }

    /// Create a demonstration from 3D end-effector positions.
    #[must_use]
    pub fn from_points3(points: &[[f64; 3]]) -> Self {
        Self {
            dims: 3,
            points: points.iter().map(|p| p.to_vec()).collect(),
            timestamps: None,
        }
    }

    /// Create a single-channel demonstration (e.g. gripper strength).
    #[must_use]
    pub fn from_scalars(values: &[f64]) -> Self {
        Self {
            dims: 1,
            points: values.iter().map(|&v| vec![v]).collect(),
            timestamps: None,
        }
    }

    /// Attach capture timestamps.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of timestamps differs from the number
    /// of samples.
    pub fn with_timestamps(mut self, timestamps: Vec<f64>) -> Result<Self> {
        if timestamps.len() != self.points.len() {
            return Err(SkillError::invalid_input(format!(
                "{} timestamps for {} samples",
                timestamps.len(),
                self.points.len()
            )));
        }
        self.timestamps = Some(timestamps);
        Ok(self)
    }

    /// Number of samples (T_i).
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the demonstration has no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sample dimensionality (D).
    #[must_use]
    pub const fn dims(&self) -> usize {
        self.dims
    }

    /// The samples in temporal order.
    #[must_use]
    pub fn points(&self) -> &[Vec<f64>] {
        &self.points
    }

    /// Sample at index `i`.
    #[must_use]
    pub fn point(&self, i: usize) -> &[f64] {
        &self.points[i]
    }

    /// Capture timestamps, if attached.
    #[must_use]
    pub fn timestamps(&self) -> Option<&[f64]> {
        self.timestamps.as_deref()
    }

    /// Append zero-valued columns until the samples have `dims` values.
    ///
    /// Demonstrations already that wide are returned unchanged.
    #[must_use]
    pub fn pad_to_dims(mut self, dims: usize) -> Self {
        if dims > self.dims {
            for p in &mut self.points {
                p.resize(dims, 0.0);
            }
            self.dims = dims;
        }
        self
    }
}

/// N demonstrations warped onto a common length T.
///
/// Stored flat in demo-major order, so sample `(n, t)` is followed by
/// `(n, t + 1)` and the pooled `(N·T, D)` view needs no reshuffling.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AlignedTrajectories {
    n_demos: usize,
    n_steps: usize,
    dims: usize,
    data: Vec<f64>,
}

impl AlignedTrajectories {
    /// Stack equal-length warped demonstrations.
    ///
    /// # Errors
    ///
    /// Returns an alignment error if the demonstrations are empty or differ in
    /// length or dimensionality.
    pub fn from_demonstrations(demos: &[Demonstration]) -> Result<Self> {
        let first = demos
            .first()
            .ok_or_else(|| SkillError::alignment("no demonstrations to stack"))?;
        let n_steps = first.len();
        let dims = first.dims();
        if n_steps == 0 || dims == 0 {
            return Err(SkillError::alignment(
                "stacked demonstrations must have at least one sample and one dimension",
            ));
        }

        let mut data = Vec::with_capacity(demos.len() * n_steps * dims);
        for (i, demo) in demos.iter().enumerate() {
            if demo.len() != n_steps || demo.dims() != dims {
                return Err(SkillError::alignment(format!(
                    "demonstration {} has shape ({}, {}), expected ({}, {})",
                    i,
                    demo.len(),
                    demo.dims(),
                    n_steps,
                    dims
                )));
            }
            for p in demo.points() {
                data.extend_from_slice(p);
            }
        }

        Ok(Self {
            n_demos: demos.len(),
            n_steps,
            dims,
            data,
        })
    }

    /// Shape as `(N, T, D)`.
    #[must_use]
    pub const fn shape(&self) -> (usize, usize, usize) {
        (self.n_demos, self.n_steps, self.dims)
    }

    /// Number of demonstrations (N).
    #[must_use]
    pub const fn n_demos(&self) -> usize {
        self.n_demos
    }

    /// Common length (T).
    #[must_use]
    pub const fn n_steps(&self) -> usize {
        self.n_steps
    }

    /// Sample dimensionality (D).
    #[must_use]
    pub const fn dims(&self) -> usize {
        self.dims
    }

    /// Sample `t` of demonstration `n`.
    #[must_use]
    pub fn sample(&self, n: usize, t: usize) -> &[f64] {
        let start = (n * self.n_steps + t) * self.dims;
        &self.data[start..start + self.dims]
    }

    /// Iterate the samples of demonstration `n` in time order.
    pub fn demo(&self, n: usize) -> impl Iterator<Item = &[f64]> + '_ {
        let start = n * self.n_steps * self.dims;
        self.data[start..start + self.n_steps * self.dims].chunks_exact(self.dims)
    }

    /// All samples as an `(N·T, D)` matrix in demo-major order.
    #[must_use]
    pub fn pooled(&self) -> DMatrix<f64> {
        DMatrix::from_row_slice(self.n_demos * self.n_steps, self.dims, &self.data)
    }
}

/// Output of regression: ordered `(time, point)` pairs in original units.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeneratedTrajectory {
    /// Strictly increasing sample times in seconds.
    pub times: Vec<f64>,

    /// One D-dimensional point per time.
    pub points: Vec<Vec<f64>>,

    /// Components whose time variance was floored while regressing.
    /// Empty for a well-conditioned model.
    pub degenerate_components: Vec<usize>,
}

impl GeneratedTrajectory {
    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether no samples were generated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Point dimensionality (0 when empty).
    #[must_use]
    pub fn dims(&self) -> usize {
        self.points.first().map_or(0, Vec::len)
    }

    /// Values of dimension `d` across all samples.
    #[must_use]
    pub fn column(&self, d: usize) -> Vec<f64> {
        self.points.iter().map(|p| p[d]).collect()
    }

    /// Whether regression had to floor any component time variance.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        !self.degenerate_components.is_empty()
    }
}
