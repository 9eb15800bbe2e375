//! Numerical building blocks.
//!
//! This module provides:
//! - [`linalg`]: PCA latent projection
//! - [`gaussian`]: univariate and Cholesky-factored multivariate densities

pub mod gaussian;
pub mod linalg;

pub use gaussian::{log_sum_exp, univariate_log_pdf, CholeskyGaussian};
pub use linalg::{orient_axis, rms_distance, Pca};
