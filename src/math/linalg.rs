//! Linear algebra utilities for skill modeling.
//!
//! This module provides the principal component projection that maps pooled
//! demonstration samples into a latent space and back, using nalgebra for the
//! symmetric eigendecomposition.

use nalgebra::{DMatrix, DVector, SymmetricEigen};

use crate::error::{Result, SkillError};

/// Variance below which the pooled data is treated as a single point.
const TOTAL_VARIANCE_EPS: f64 = 1e-12;

/// Linear projection onto the leading principal directions of a dataset.
///
/// Fit once; the inverse transform maps latent coordinates back into the
/// original space (exactly, when no variance was discarded).
#[derive(Debug, Clone, PartialEq)]
pub struct Pca {
    /// Per-dimension mean of the fitted data (length D).
    mean: DVector<f64>,

    /// Principal axes as columns (D × K), sorted by decreasing variance.
    components: DMatrix<f64>,

    /// Variance captured by each kept axis (length K).
    explained_variance: Vec<f64>,

    /// Total variance of the fitted data.
    total_variance: f64,
}

impl Pca {
    /// Fit a projection onto `n_components` principal directions.
    ///
    /// `data` holds one sample per row.
    ///
    /// # Errors
    ///
    /// Returns an error if `data` has no rows, contains non-finite values, or
    /// `n_components` is zero or exceeds the data dimensionality.
    pub fn fit(data: &DMatrix<f64>, n_components: usize) -> Result<Self> {
        let (n, d) = data.shape();
        if n == 0 {
            return Err(SkillError::invalid_input("cannot fit PCA on zero samples"));
        }
        if n_components == 0 || n_components > d {
            return Err(SkillError::invalid_config(format!(
                "n_latent_dims must be in 1..={}, got {}",
                d, n_components
            )));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(SkillError::numerical_instability(
                "non-finite value in PCA input",
            ));
        }

        let mean = data.row_mean().transpose();
        let mut centered = data.clone();
        for mut row in centered.row_iter_mut() {
            row -= mean.transpose();
        }

        let denom = (n.saturating_sub(1)).max(1) as f64;
        let cov = centered.transpose() * &centered / denom;

        let eigen = SymmetricEigen::new(cov);

        // Collect eigenvalue-eigenvector pairs and sort descending
        let mut pairs: Vec<(f64, DVector<f64>)> = eigen
            .eigenvalues
            .iter()
            .enumerate()
            .map(|(i, &v)| (v.max(0.0), eigen.eigenvectors.column(i).into_owned()))
            .collect();
        pairs.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let total_variance: f64 = pairs.iter().map(|(v, _)| v).sum();

        let mut components = DMatrix::zeros(d, n_components);
        let mut explained_variance = Vec::with_capacity(n_components);
        for (k, (value, mut axis)) in pairs.into_iter().take(n_components).enumerate() {
            orient_axis(&mut axis);
            components.set_column(k, &axis);
            explained_variance.push(value);
        }

        Ok(Self {
            mean,
            components,
            explained_variance,
            total_variance,
        })
    }

    /// Number of latent dimensions (K).
    #[must_use]
    pub fn n_components(&self) -> usize {
        self.components.ncols()
    }

    /// Original dimensionality (D).
    #[must_use]
    pub fn input_dims(&self) -> usize {
        self.components.nrows()
    }

    /// Principal axes as columns (D × K).
    #[must_use]
    pub const fn components(&self) -> &DMatrix<f64> {
        &self.components
    }

    /// Mean of the fitted data.
    #[must_use]
    pub const fn mean(&self) -> &DVector<f64> {
        &self.mean
    }

    /// Variance captured by each kept axis.
    #[must_use]
    pub fn explained_variance(&self) -> &[f64] {
        &self.explained_variance
    }

    /// Fraction of total variance captured by each kept axis.
    #[must_use]
    pub fn explained_variance_ratio(&self) -> Vec<f64> {
        if self.total_variance <= TOTAL_VARIANCE_EPS {
            let mut ratios = vec![0.0; self.explained_variance.len()];
            ratios[0] = 1.0;
            return ratios;
        }
        self.explained_variance
            .iter()
            .map(|v| v / self.total_variance)
            .collect()
    }

    /// Fraction of total variance retained by the projection, in `[0, 1]`.
    ///
    /// Data with no variance at all is reported as fully retained.
    #[must_use]
    pub fn retained_variance(&self) -> f64 {
        self.explained_variance_ratio().iter().sum::<f64>().min(1.0)
    }

    /// Project samples (one per row, D columns) into latent space (K columns).
    #[must_use]
    pub fn transform(&self, data: &DMatrix<f64>) -> DMatrix<f64> {
        let mut centered = data.clone();
        for mut row in centered.row_iter_mut() {
            row -= self.mean.transpose();
        }
        centered * &self.components
    }

    /// Map latent samples (one per row, K columns) back to original space.
    #[must_use]
    pub fn inverse_transform(&self, latent: &DMatrix<f64>) -> DMatrix<f64> {
        let mut out = latent * self.components.transpose();
        for mut row in out.row_iter_mut() {
            row += self.mean.transpose();
        }
        out
    }

    /// Map a single latent point back to original space.
    #[must_use]
    pub fn inverse_transform_point(&self, latent: &[f64]) -> Vec<f64> {
        debug_assert_eq!(latent.len(), self.n_components());
        let z = DVector::from_column_slice(latent);
        let x = &self.components * z + &self.mean;
        x.iter().copied().collect()
    }
}

/// Flip an axis so that its largest-magnitude component is positive.
///
/// Eigenvectors are only defined up to sign; this gives repeated fits on the
/// same data the same orientation. When several entries share the largest
/// magnitude, the first of them decides.
pub fn orient_axis(axis: &mut DVector<f64>) {
    let mut max_idx = 0;
    for (i, v) in axis.iter().enumerate() {
        if v.abs() > axis[max_idx].abs() {
            max_idx = i;
        }
    }

    if !axis.is_empty() && axis[max_idx] < 0.0 {
        axis.neg_mut();
    }
}

/// Root mean square distance between two equally shaped sample matrices.
#[must_use]
pub fn rms_distance(a: &DMatrix<f64>, b: &DMatrix<f64>) -> f64 {
    debug_assert_eq!(a.shape(), b.shape());
    if a.nrows() == 0 {
        return 0.0;
    }
    ((a - b).norm_squared() / a.nrows() as f64).sqrt()
}
