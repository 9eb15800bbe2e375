//! Fitting the spatiotemporal mixture model.
//!
//! # Pipeline Overview
//!
//! 1. Pool the N·T aligned samples and fit a K-dimensional PCA projection
//! 2. Assign every time step a scaled time `t · duration / T`
//! 3. Build the joint `(N·T, 1 + K)` dataset `[time, latent...]`
//! 4. Sweep candidate component counts, keep the lowest-BIC mixture
//!
//! The result is an immutable [`FittedModel`]; regression lives in
//! [`crate::regression`].

use nalgebra::DMatrix;
use tracing::{info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::align::align_trajectories;
use crate::config::ModelConfig;
use crate::error::{Result, SkillError};
use crate::math::linalg::Pca;
use crate::mixture::GaussianMixture;
use crate::regression;
use crate::selection::{select_mixture, ModelSelection};
use crate::trajectory::{AlignedTrajectories, Demonstration, GeneratedTrajectory};

/// Non-fatal conditions detected while fitting.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FitWarning {
    /// EM hit the iteration cap for every candidate in the sweep.
    NotConverged {
        /// Selected component count.
        n_components: usize,
        /// Iteration cap each candidate ran into.
        max_iter: usize,
    },
    /// The projection discards more variance than the configured threshold.
    LowRetainedVariance {
        /// Retained fraction in `[0, 1]`.
        retained: f64,
        /// Configured warning threshold.
        threshold: f64,
    },
}

/// A fitted projection + mixture pair, ready for regression.
#[derive(Debug, Clone)]
pub struct FittedModel {
    projection: Pca,
    mixture: GaussianMixture,
    selection: ModelSelection,
    demo_duration: f64,
    n_demos: usize,
    n_steps: usize,
    variance_floor: f64,
    warnings: Vec<FitWarning>,
}

impl FittedModel {
    /// Latent projection learned from the pooled samples.
    #[must_use]
    pub const fn projection(&self) -> &Pca {
        &self.projection
    }

    /// Mixture over `[time, latent...]`.
    #[must_use]
    pub const fn mixture(&self) -> &GaussianMixture {
        &self.mixture
    }

    /// BIC sweep report.
    #[must_use]
    pub const fn selection(&self) -> &ModelSelection {
        &self.selection
    }

    /// Non-fatal conditions detected while fitting.
    #[must_use]
    pub fn warnings(&self) -> &[FitWarning] {
        &self.warnings
    }

    /// Fraction of spatial variance kept by the projection.
    #[must_use]
    pub fn retained_variance(&self) -> f64 {
        self.projection.retained_variance()
    }

    /// Whether EM converged for the selected mixture.
    #[must_use]
    pub const fn converged(&self) -> bool {
        self.mixture.converged()
    }

    /// Number of mixture components.
    #[must_use]
    pub fn n_components(&self) -> usize {
        self.mixture.n_components()
    }

    /// Original sample dimensionality (D).
    #[must_use]
    pub fn dims(&self) -> usize {
        self.projection.input_dims()
    }

    /// Latent dimensionality (K).
    #[must_use]
    pub fn n_latent_dims(&self) -> usize {
        self.projection.n_components()
    }

    /// Declared demonstration duration in seconds.
    #[must_use]
    pub const fn demo_duration(&self) -> f64 {
        self.demo_duration
    }

    /// Shape `(N, T)` of the aligned stack the model was fit on.
    #[must_use]
    pub const fn training_shape(&self) -> (usize, usize) {
        (self.n_demos, self.n_steps)
    }

    /// Floor applied to component time variances during regression.
    #[must_use]
    pub const fn variance_floor(&self) -> f64 {
        self.variance_floor
    }

    /// Time coordinate of every component mean, in seconds.
    #[must_use]
    pub fn component_time_means(&self) -> Vec<f64> {
        self.mixture.means().iter().map(|m| m[0]).collect()
    }

    /// `(min, max)` of the component time means.
    #[must_use]
    pub fn time_span(&self) -> (f64, f64) {
        self.component_time_means()
            .into_iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), t| {
                (lo.min(t), hi.max(t))
            })
    }

    /// Spatial part of every component mean, mapped back to original
    /// coordinates.
    #[must_use]
    pub fn component_centers(&self) -> Vec<Vec<f64>> {
        self.mixture
            .means()
            .iter()
            .map(|m| {
                let latent: Vec<f64> = m.iter().skip(1).copied().collect();
                self.projection.inverse_transform_point(&latent)
            })
            .collect()
    }

    /// Regress a trajectory over the model's time span.
    ///
    /// See [`regression::generate`].
    ///
    /// # Errors
    ///
    /// Returns an error if `interval` or `num_samples` is invalid.
    pub fn generate(&self, interval: f64, num_samples: Option<usize>) -> Result<GeneratedTrajectory> {
        regression::generate(self, interval, num_samples)
    }

    /// Regress the trajectory at caller-chosen times.
    ///
    /// See [`regression::predict`].
    ///
    /// # Errors
    ///
    /// Returns an error if a time is non-finite.
    pub fn predict(&self, times: &[f64]) -> Result<GeneratedTrajectory> {
        regression::predict(self, times)
    }
}

/// Fit a model on an aligned stack.
///
/// # Errors
///
/// Returns an error if:
/// - the configuration is invalid (including `n_latent_dims > D`)
/// - the stack contains non-finite values
/// - no candidate mixture can be fit
///
/// # Example
///
/// ```
/// use motion_skill::{align_trajectories, fit_model, Demonstration, ModelConfig};
///
/// let demos: Vec<Demonstration> = (0..2)
///     .map(|k| {
///         let pts: Vec<[f64; 3]> = (0..20)
///             .map(|i| {
///                 let s = i as f64 / 19.0;
///                 [s, s * s, 0.1 * k as f64]
///             })
///             .collect();
///         Demonstration::from_points3(&pts)
///     })
///     .collect();
///
/// let aligned = align_trajectories(&demos)?;
/// let config = ModelConfig::positions().with_latent_dims(2).with_seed(0);
/// let model = fit_model(&aligned, &config)?;
///
/// let trajectory = model.generate(0.1, None)?;
/// assert_eq!(trajectory.dims(), 3);
/// # Ok::<(), motion_skill::SkillError>(())
/// ```
pub fn fit_model(aligned: &AlignedTrajectories, config: &ModelConfig) -> Result<FittedModel> {
    config.validate()?;

    let (n_demos, n_steps, dims) = aligned.shape();
    if config.n_latent_dims > dims {
        return Err(SkillError::invalid_config(format!(
            "n_latent_dims ({}) exceeds sample dimensionality ({})",
            config.n_latent_dims, dims
        )));
    }

    // =========================================================================
    // 1. LATENT PROJECTION
    // =========================================================================
    let pooled = aligned.pooled();
    let projection = Pca::fit(&pooled, config.n_latent_dims)?;
    let latent = projection.transform(&pooled);
    let retained = projection.retained_variance();
    info!(
        retained_variance = retained,
        n_latent_dims = config.n_latent_dims,
        "latent projection fitted"
    );

    // =========================================================================
    // 2-3. SCALED TIME + JOINT DATASET
    // =========================================================================
    let joint = joint_dataset(&latent, n_steps, config.demo_duration);

    // =========================================================================
    // 4. MODEL-ORDER SELECTION
    // =========================================================================
    let (mixture, selection) = select_mixture(
        &joint,
        &config.candidate_components,
        &config.mixture,
        config.seed,
    )?;
    info!(
        n_components = selection.selected,
        converged = mixture.converged(),
        "mixture selected"
    );

    let mut warnings = Vec::new();
    if retained < config.retained_variance_warning {
        warn!(
            retained_variance = retained,
            threshold = config.retained_variance_warning,
            "projection discards a large share of variance"
        );
        warnings.push(FitWarning::LowRetainedVariance {
            retained,
            threshold: config.retained_variance_warning,
        });
    }
    if !selection.any_converged() {
        warn!(
            n_components = selection.selected,
            "no candidate converged within {} iterations", config.mixture.max_iter
        );
        warnings.push(FitWarning::NotConverged {
            n_components: selection.selected,
            max_iter: config.mixture.max_iter,
        });
    }

    Ok(FittedModel {
        projection,
        mixture,
        selection,
        demo_duration: config.demo_duration,
        n_demos,
        n_steps,
        variance_floor: config.variance_floor,
        warnings,
    })
}

/// Align raw demonstrations and fit a model on them.
///
/// # Errors
///
/// Returns alignment errors from [`align_trajectories`] and fit errors from
/// [`fit_model`].
pub fn fit_demonstrations(demos: &[Demonstration], config: &ModelConfig) -> Result<FittedModel> {
    let aligned = align_trajectories(demos)?;
    fit_model(&aligned, config)
}

/// `[scaled time, latent...]` rows in the same demo-major order as `latent`.
fn joint_dataset(latent: &DMatrix<f64>, n_steps: usize, demo_duration: f64) -> DMatrix<f64> {
    let (rows, k) = latent.shape();
    let time_scale = demo_duration / n_steps as f64;
    DMatrix::from_fn(rows, k + 1, |r, c| {
        if c == 0 {
            (r % n_steps) as f64 * time_scale
        } else {
            latent[(r, c - 1)]
        }
    })
}

/// Learner lifecycle.
#[derive(Debug, Clone)]
enum LearnerState {
    Unfit,
    Fit(Box<FittedModel>),
}

/// Stateful wrapper around [`fit_model`] for callers that fit and generate in
/// separate steps.
///
/// `Unfit → Fit`; a learner is fit at most once.
///
/// # Example
///
/// ```
/// use motion_skill::{ModelConfig, SkillError, TrajectoryLearner};
///
/// let learner = TrajectoryLearner::new(ModelConfig::positions());
/// assert!(matches!(learner.generate(0.1, None), Err(SkillError::NotFitted)));
/// ```
#[derive(Debug, Clone)]
pub struct TrajectoryLearner {
    config: ModelConfig,
    state: LearnerState,
}

impl TrajectoryLearner {
    /// Create an unfit learner.
    #[must_use]
    pub const fn new(config: ModelConfig) -> Self {
        Self {
            config,
            state: LearnerState::Unfit,
        }
    }

    /// Configuration used for fitting.
    #[must_use]
    pub const fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Whether `fit` has completed.
    #[must_use]
    pub const fn is_fit(&self) -> bool {
        matches!(self.state, LearnerState::Fit(_))
    }

    /// Align and fit raw demonstrations.
    ///
    /// # Errors
    ///
    /// Returns an error if the learner is already fit, or if alignment or
    /// fitting fails (the learner then stays unfit).
    pub fn fit(&mut self, demos: &[Demonstration]) -> Result<&FittedModel> {
        let aligned = align_trajectories(demos)?;
        self.fit_aligned(&aligned)
    }

    /// Fit an already aligned stack.
    ///
    /// # Errors
    ///
    /// Returns an error if the learner is already fit or fitting fails.
    pub fn fit_aligned(&mut self, aligned: &AlignedTrajectories) -> Result<&FittedModel> {
        if self.is_fit() {
            return Err(SkillError::invalid_input("learner is already fit"));
        }
        let model = fit_model(aligned, &self.config)?;
        self.state = LearnerState::Fit(Box::new(model));
        self.model()
    }

    /// The fitted model.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::NotFitted`] before `fit`.
    pub fn model(&self) -> Result<&FittedModel> {
        match &self.state {
            LearnerState::Fit(model) => Ok(model.as_ref()),
            LearnerState::Unfit => Err(SkillError::NotFitted),
        }
    }

    /// Regress a trajectory from the fitted model.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::NotFitted`] before `fit`, or an input error for
    /// invalid sampling parameters.
    pub fn generate(&self, interval: f64, num_samples: Option<usize>) -> Result<GeneratedTrajectory> {
        self.model()?.generate(interval, num_samples)
    }

    /// Consume the learner and return the fitted model.
    ///
    /// # Errors
    ///
    /// Returns [`SkillError::NotFitted`] before `fit`.
    pub fn into_model(self) -> Result<FittedModel> {
        match self.state {
            LearnerState::Fit(model) => Ok(*model),
            LearnerState::Unfit => Err(SkillError::NotFitted),
        }
    }
}
