//! Gaussian densities.
//!
//! Univariate densities are used by regression to weight components by
//! their time marginals; the Cholesky-factored multivariate density is the
//! E-step workhorse of mixture fitting.

use nalgebra::{Cholesky, DMatrix, DVector};

use crate::error::{Result, SkillError};

/// `ln(2π)`.
const LN_2PI: f64 = 1.837_877_066_409_345_3;

/// Log density of `N(mean, var)` at `x`.
///
/// `var` must be positive; callers floor it first.
#[must_use]
#[inline]
pub fn univariate_log_pdf(x: f64, mean: f64, var: f64) -> f64 {
    let diff = x - mean;
    -0.5 * (LN_2PI + var.ln() + diff * diff / var)
}

/// `ln(Σ exp(v))` without overflow. Returns `-∞` for an empty slice or when
/// every value is `-∞`.
#[must_use]
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Multivariate normal with a pre-factored covariance.
#[derive(Debug, Clone)]
pub struct CholeskyGaussian {
    mean: DVector<f64>,
    /// Lower-triangular Cholesky factor of the covariance.
    l: DMatrix<f64>,
    log_det: f64,
}

impl CholeskyGaussian {
    /// Factor `cov` for repeated density evaluation.
    ///
    /// # Errors
    ///
    /// Returns an error if `cov` is not positive definite.
    pub fn new(mean: DVector<f64>, cov: DMatrix<f64>) -> Result<Self> {
        let l = Cholesky::new(cov)
            .ok_or_else(|| SkillError::linalg("covariance matrix is not positive definite"))?
            .unpack();
        if l.diagonal().iter().any(|&v| !(v.is_finite() && v > 0.0)) {
            return Err(SkillError::linalg(
                "covariance matrix is numerically singular",
            ));
        }
        let log_det = 2.0 * l.diagonal().iter().map(|v| v.ln()).sum::<f64>();
        Ok(Self { mean, l, log_det })
    }

    /// Log density at `x`.
    #[must_use]
    pub fn log_pdf(&self, x: &DVector<f64>) -> f64 {
        let d = self.mean.len() as f64;
        let diff = x - &self.mean;
        let maha = self
            .l
            .solve_lower_triangular(&diff)
            .map_or(f64::INFINITY, |y| y.norm_squared());
        -0.5 * (d * LN_2PI + self.log_det + maha)
    }
}
