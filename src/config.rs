//! Configuration for skill model fitting and regression.
//!
//! This module provides the [`ModelConfig`] struct which centralizes all
//! tunable parameters for the fit/regress pipeline, along with presets for the
//! two channels a manipulation skill is usually learned on.
//!
//! # Example
//!
//! ```
//! use motion_skill::ModelConfig;
//!
//! // End-effector positions, 3 latent dimensions, 5 s demonstrations
//! let config = ModelConfig::positions();
//!
//! // Reproducible fit with a custom candidate sweep
//! let config = ModelConfig::default()
//!     .with_seed(7)
//!     .with_candidate_components(vec![2, 3, 4, 5, 6]);
//! assert!(config.validate().is_ok());
//! ```

use crate::error::{Result, SkillError};

/// Component counts evaluated by the BIC sweep unless overridden.
pub const DEFAULT_CANDIDATE_COMPONENTS: [usize; 4] = [2, 3, 4, 5];

/// Expectation-maximization parameters for Gaussian mixture fitting.
#[derive(Debug, Clone, PartialEq)]
pub struct MixtureConfig {
    /// Maximum number of EM iterations per fit.
    pub max_iter: usize,

    /// Convergence threshold on the change of the per-sample log-likelihood
    /// lower bound between two iterations.
    pub tol: f64,

    /// Non-negative regularization added to every covariance diagonal.
    pub reg_covar: f64,

    /// Maximum number of Lloyd iterations for the k-means initialisation.
    pub kmeans_iter: usize,
}

impl Default for MixtureConfig {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tol: 1e-3,
            reg_covar: 1e-6,
            kmeans_iter: 100,
        }
    }
}

impl MixtureConfig {
    /// Validate the EM parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(SkillError::invalid_config("max_iter must be at least 1"));
        }
        if !(self.tol.is_finite() && self.tol > 0.0) {
            return Err(SkillError::invalid_config("tol must be positive"));
        }
        if !(self.reg_covar.is_finite() && self.reg_covar >= 0.0) {
            return Err(SkillError::invalid_config(
                "reg_covar must be non-negative",
            ));
        }
        Ok(())
    }
}

/// Configuration for fitting a spatiotemporal mixture model.
///
/// # Core Parameters
///
/// - `n_latent_dims`: Number of principal directions kept by the projection.
/// - `demo_duration`: Wall-clock length (seconds) assigned to the aligned
///   demonstrations; gives the model's time axis physical units.
/// - `candidate_components`: Ascending component counts swept by BIC.
///
/// # Numerical Parameters
///
/// - `variance_floor`: Lower bound applied to component time variances during
///   regression.
/// - `retained_variance_warning`: Retained-variance fraction below which the
///   fitted model carries a warning.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelConfig {
    /// Number of latent (PCA) dimensions.
    pub n_latent_dims: usize,

    /// Duration of a demonstration in seconds.
    pub demo_duration: f64,

    /// Component counts evaluated by the BIC sweep, strictly ascending.
    pub candidate_components: Vec<usize>,

    /// EM parameters shared by every candidate fit.
    pub mixture: MixtureConfig,

    /// Seed for EM initialisation. `None` draws a fresh seed per fit.
    pub seed: Option<u64>,

    /// Floor for a component's time variance during regression.
    pub variance_floor: f64,

    /// Retained-variance fraction below which a warning is attached.
    pub retained_variance_warning: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            n_latent_dims: 3,
            demo_duration: 5.0,
            candidate_components: DEFAULT_CANDIDATE_COMPONENTS.to_vec(),
            mixture: MixtureConfig::default(),
            seed: None,
            variance_floor: 1e-9,
            retained_variance_warning: 0.9,
        }
    }
}

impl ModelConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.n_latent_dims == 0 {
            return Err(SkillError::invalid_config(
                "n_latent_dims must be at least 1",
            ));
        }
        if !(self.demo_duration.is_finite() && self.demo_duration > 0.0) {
            return Err(SkillError::invalid_config(
                "demo_duration must be positive",
            ));
        }
        if self.candidate_components.is_empty() {
            return Err(SkillError::invalid_config(
                "candidate_components must not be empty",
            ));
        }
        if self.candidate_components.contains(&0) {
            return Err(SkillError::invalid_config(
                "candidate component counts must be at least 1",
            ));
        }
        if self.candidate_components.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SkillError::invalid_config(
                "candidate_components must be strictly ascending",
            ));
        }
        if !(self.variance_floor.is_finite() && self.variance_floor > 0.0) {
            return Err(SkillError::invalid_config(
                "variance_floor must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.retained_variance_warning) {
            return Err(SkillError::invalid_config(
                "retained_variance_warning must be in [0, 1]",
            ));
        }
        self.mixture.validate()
    }

    /// Preset for end-effector position demonstrations (D = 3).
    #[must_use]
    pub fn positions() -> Self {
        Self {
            n_latent_dims: 3,
            demo_duration: 5.0,
            ..Self::default()
        }
    }

    /// Preset for a scalar gripper-strength channel.
    ///
    /// The channel is padded to two columns before modeling, so a single
    /// latent dimension carries all of its variance.
    #[must_use]
    pub fn gripper() -> Self {
        Self {
            n_latent_dims: 1,
            demo_duration: 5.0,
            retained_variance_warning: 0.0,
            ..Self::default()
        }
    }

    /// Set the number of latent dimensions.
    #[must_use]
    pub const fn with_latent_dims(mut self, k: usize) -> Self {
        self.n_latent_dims = k;
        self
    }

    /// Set the demonstration duration in seconds.
    #[must_use]
    pub const fn with_demo_duration(mut self, seconds: f64) -> Self {
        self.demo_duration = seconds;
        self
    }

    /// Fix the EM initialisation seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the maximum number of EM iterations.
    #[must_use]
    pub const fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.mixture.max_iter = max_iter;
        self
    }

    /// Set the regression variance floor.
    #[must_use]
    pub const fn with_variance_floor(mut self, floor: f64) -> Self {
        self.variance_floor = floor;
        self
    }

    /// Replace the BIC candidate list.
    #[must_use]
    pub fn with_candidate_components(mut self, candidates: Vec<usize>) -> Self {
        self.candidate_components = candidates;
        self
    }
}
