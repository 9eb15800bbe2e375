//! Fit diagnostics.
//!
//! Summaries a caller can log or assert on after fitting: how much spatial
//! variance the projection keeps, how the BIC sweep went, and whether any
//! component will be floored during regression.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, SkillError};
use crate::math::linalg::rms_distance;
use crate::model::FittedModel;
use crate::trajectory::AlignedTrajectories;

/// Health summary of a fitted model.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitReport {
    /// Fraction of spatial variance kept by the projection.
    pub retained_variance: f64,

    /// Per-direction share of total variance, largest first.
    pub explained_variance_ratio: Vec<f64>,

    /// Selected component count.
    pub n_components: usize,

    /// `(component count, BIC)` for every candidate that could be fit.
    pub bic_spectrum: Vec<(usize, f64)>,

    /// Whether EM converged for the selected mixture.
    pub converged: bool,

    /// Components whose time variance is below the regression floor.
    pub degenerate_components: Vec<usize>,

    /// Number of non-fatal warnings attached to the model.
    pub n_warnings: usize,

    /// Whether the model passes health checks.
    pub is_healthy: bool,
}

/// Summarize a fitted model.
///
/// # Health Targets
///
/// - EM converged for the selected count
/// - No fit warnings
/// - No component time variance below the floor
#[must_use]
pub fn validate_fit(model: &FittedModel) -> FitReport {
    let floor = model.variance_floor();
    let degenerate_components: Vec<usize> = model
        .mixture()
        .covariances()
        .iter()
        .enumerate()
        .filter(|(_, cov)| !(cov[(0, 0)].is_finite() && cov[(0, 0)] >= floor))
        .map(|(k, _)| k)
        .collect();

    let bic_spectrum: Vec<(usize, f64)> = model
        .selection()
        .candidates
        .iter()
        .filter_map(|c| c.bic.map(|b| (c.n_components, b)))
        .collect();

    let converged = model.converged();
    let n_warnings = model.warnings().len();
    let is_healthy = converged && n_warnings == 0 && degenerate_components.is_empty();

    FitReport {
        retained_variance: model.retained_variance(),
        explained_variance_ratio: model.projection().explained_variance_ratio(),
        n_components: model.n_components(),
        bic_spectrum,
        converged,
        degenerate_components,
        n_warnings,
        is_healthy,
    }
}

/// RMS distance between the aligned samples and their projection round-trip.
///
/// # Errors
///
/// Returns an error if the stack's dimensionality differs from the model's.
pub fn projection_error(model: &FittedModel, aligned: &AlignedTrajectories) -> Result<f64> {
    if aligned.dims() != model.dims() {
        return Err(SkillError::invalid_input(format!(
            "aligned samples have {} dimensions, model expects {}",
            aligned.dims(),
            model.dims()
        )));
    }
    let pooled = aligned.pooled();
    let projection = model.projection();
    let restored = projection.inverse_transform(&projection.transform(&pooled));
    Ok(rms_distance(&pooled, &restored))
}

/// Root mean square point distance between two equal-length sequences.
///
/// Returns `f64::INFINITY` when lengths or point dimensions differ, and `0.0`
/// for two empty sequences.
#[must_use]
pub fn compute_reconstruction_error(original: &[Vec<f64>], reconstructed: &[Vec<f64>]) -> f64 {
    if original.len() != reconstructed.len() {
        return f64::INFINITY;
    }

    if original.is_empty() {
        return 0.0;
    }

    let mut sum_sq = 0.0;
    for (o, r) in original.iter().zip(reconstructed) {
        if o.len() != r.len() {
            return f64::INFINITY;
        }
        sum_sq += o.iter().zip(r).map(|(a, b)| (a - b) * (a - b)).sum::<f64>();
    }

    (sum_sq / original.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::align_trajectories;
    use crate::config::ModelConfig;
    use crate::model::fit_model;
    use crate::trajectory::Demonstration;
    use approx::assert_relative_eq;

    fn arc_demos() -> Vec<Demonstration> {
        (0..3)
            .map(|k| {
                let n = 30 + 2 * k;
                let pts: Vec<[f64; 3]> = (0..n)
                    .map(|i| {
                        let a = i as f64 / (n - 1) as f64 * std::f64::consts::FRAC_PI_2;
                        [a.cos(), a.sin(), 0.01 * k as f64]
                    })
                    .collect();
                Demonstration::from_points3(&pts)
            })
            .collect()
    }

    #[test]
    fn test_reconstruction_error_basic() {
        let a = vec![vec![0.0, 0.0], vec![1.0, 1.0]];
        let b = vec![vec![3.0, 4.0], vec![1.0, 1.0]];
        // sqrt((25 + 0) / 2)
        assert_relative_eq!(compute_reconstruction_error(&a, &b), 12.5f64.sqrt());
        assert_eq!(compute_reconstruction_error(&a, &a), 0.0);
    }

    #[test]
    fn test_reconstruction_error_edge_cases() {
        assert_eq!(compute_reconstruction_error(&[], &[]), 0.0);
        assert_eq!(
            compute_reconstruction_error(&[vec![0.0]], &[]),
            f64::INFINITY
        );
        assert_eq!(
            compute_reconstruction_error(&[vec![0.0]], &[vec![0.0, 1.0]]),
            f64::INFINITY
        );
    }

    #[test]
    fn test_validate_fit_report() {
        let aligned = align_trajectories(&arc_demos()).unwrap();
        let model = fit_model(&aligned, &ModelConfig::positions().with_seed(21)).unwrap();
        let report = validate_fit(&model);

        assert_eq!(report.n_components, model.n_components());
        assert!(report
            .bic_spectrum
            .iter()
            .any(|&(c, _)| c == report.n_components));
        assert_relative_eq!(report.retained_variance, 1.0, epsilon = 1e-9);
        assert_eq!(report.explained_variance_ratio.len(), 3);
        assert_eq!(report.converged, model.converged());
    }

    #[test]
    fn test_projection_error() {
        let aligned = align_trajectories(&arc_demos()).unwrap();

        let full = fit_model(&aligned, &ModelConfig::positions().with_seed(2)).unwrap();
        assert!(projection_error(&full, &aligned).unwrap() < 1e-9);

        let config = ModelConfig {
            retained_variance_warning: 0.0,
            ..ModelConfig::positions().with_latent_dims(1).with_seed(2)
        };
        let lossy = fit_model(&aligned, &config).unwrap();
        let err = projection_error(&lossy, &aligned).unwrap();
        assert!(err > 0.0 && err.is_finite());
    }

    #[test]
    fn test_unhealthy_when_floor_exceeds_variance() {
        let aligned = align_trajectories(&arc_demos()).unwrap();
        let config = ModelConfig::positions().with_seed(4).with_variance_floor(1.0e6);
        let model = fit_model(&aligned, &config).unwrap();
        let report = validate_fit(&model);
        assert_eq!(report.degenerate_components.len(), report.n_components);
        assert!(!report.is_healthy);
    }
}
