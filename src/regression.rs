//! Gaussian mixture regression over time.
//!
//! Every component is split into a time part `(μ_t, σ²_t)` and a latent part
//! `(μ_s, Σ_st)`. At a query time `t` each component contributes its
//! conditional mean
//!
//! ```text
//! μ_s + Σ_st / σ²_t · (t − μ_t)
//! ```
//!
//! weighted by its normalized time-marginal density. The latent sum is then
//! mapped back to the original coordinates.
//!
//! ## Weighting
//!
//! The weights are the time-marginal densities alone, without mixing
//! proportions. They are normalized in log space, so a query far from every
//! component mean still yields finite weights.
//!
//! ## Degenerate components
//!
//! A component whose time variance falls below the model's variance floor is
//! regressed with the floor in its place and reported in
//! [`GeneratedTrajectory::degenerate_components`].

use nalgebra::DVector;
use tracing::{debug, warn};

use crate::error::{Result, SkillError};
use crate::math::gaussian::{log_sum_exp, univariate_log_pdf};
use crate::model::FittedModel;
use crate::trajectory::GeneratedTrajectory;

/// Upper bound on the number of samples a single generate call may produce.
const MAX_SAMPLES: usize = 10_000_000;

/// Relative slack when deciding whether a step-grid time has reached the end.
const GRID_EPS: f64 = 1e-9;

/// Per-component quantities conditioned on time.
#[derive(Debug, Clone)]
struct TimeConditional {
    time_mean: f64,
    time_var: f64,
    latent_mean: DVector<f64>,
    /// `Σ_st / σ²_t`.
    gain: DVector<f64>,
}

/// Regress a trajectory over the span of the component time means.
///
/// With `num_samples = Some(n)` the output has exactly `n` evenly spaced
/// times from the earliest to the latest component time mean (a single
/// sample sits at the earliest). Otherwise times step by `interval` from the
/// earliest mean until the latest is reached or passed.
///
/// # Errors
///
/// Returns [`SkillError::InvalidInput`] if:
/// - `num_samples` is `Some(0)`
/// - `num_samples > 1` but all component time means coincide
/// - `num_samples` is `None` and `interval` is not finite and positive
/// - the step grid would exceed the sample limit
///
/// # Example
///
/// ```
/// use motion_skill::{fit_demonstrations, regression, Demonstration, ModelConfig};
///
/// let demos: Vec<Demonstration> = (0..3)
///     .map(|k| {
///         let pts: Vec<[f64; 3]> = (0..30)
///             .map(|i| {
///                 let s = i as f64 / 29.0;
///                 [s, 0.5 * s, 0.01 * k as f64]
///             })
///             .collect();
///         Demonstration::from_points3(&pts)
///     })
///     .collect();
/// let model = fit_demonstrations(&demos, &ModelConfig::positions().with_seed(0))?;
///
/// let fixed = regression::generate(&model, 0.1, Some(25))?;
/// assert_eq!(fixed.len(), 25);
/// # Ok::<(), motion_skill::SkillError>(())
/// ```
pub fn generate(
    model: &FittedModel,
    interval: f64,
    num_samples: Option<usize>,
) -> Result<GeneratedTrajectory> {
    let (start, end) = model.time_span();
    let times = sample_times(start, end, interval, num_samples)?;
    debug!(
        start,
        end,
        n_samples = times.len(),
        "generating trajectory"
    );
    predict(model, &times)
}

/// Regress the trajectory at the given times.
///
/// Times need not lie within the model's span.
///
/// # Errors
///
/// Returns [`SkillError::InvalidInput`] if any time is non-finite.
pub fn predict(model: &FittedModel, times: &[f64]) -> Result<GeneratedTrajectory> {
    if let Some(i) = times.iter().position(|t| !t.is_finite()) {
        return Err(SkillError::invalid_input(format!(
            "query time {} is not finite",
            i
        )));
    }

    let (conditionals, degenerate) = time_conditionals(model);
    if !degenerate.is_empty() {
        warn!(
            components = ?degenerate,
            floor = model.variance_floor(),
            "time variance below floor, regressing with floored variance"
        );
    }

    let projection = model.projection();
    let mut log_density = vec![0.0; conditionals.len()];
    let mut latent = DVector::zeros(model.n_latent_dims());
    let mut points = Vec::with_capacity(times.len());

    for &t in times {
        for (slot, c) in log_density.iter_mut().zip(&conditionals) {
            *slot = univariate_log_pdf(t, c.time_mean, c.time_var);
        }
        let norm = log_sum_exp(&log_density);

        latent.fill(0.0);
        for (&ld, c) in log_density.iter().zip(&conditionals) {
            let beta = (ld - norm).exp();
            if beta == 0.0 {
                continue;
            }
            let offset = t - c.time_mean;
            latent.axpy(beta, &c.latent_mean, 1.0);
            latent.axpy(beta * offset, &c.gain, 1.0);
        }

        points.push(projection.inverse_transform_point(latent.as_slice()));
    }

    Ok(GeneratedTrajectory {
        times: times.to_vec(),
        points,
        degenerate_components: degenerate,
    })
}

/// Split every component into its time-conditioned parts.
///
/// Returns the conditionals and the indices of floored components.
fn time_conditionals(model: &FittedModel) -> (Vec<TimeConditional>, Vec<usize>) {
    let floor = model.variance_floor();
    let mut degenerate = Vec::new();

    let conditionals = model
        .mixture()
        .means()
        .iter()
        .zip(model.mixture().covariances())
        .enumerate()
        .map(|(k, (mean, cov))| {
            let raw_var = cov[(0, 0)];
            let time_var = if raw_var.is_finite() && raw_var >= floor {
                raw_var
            } else {
                degenerate.push(k);
                floor
            };
            let dims = mean.len();
            let latent_mean = mean.rows(1, dims - 1).into_owned();
            let gain = cov.view((1, 0), (dims - 1, 1)).column(0) / time_var;
            TimeConditional {
                time_mean: mean[0],
                time_var,
                latent_mean,
                gain,
            }
        })
        .collect();

    (conditionals, degenerate)
}

/// Build the time grid for [`generate`].
///
/// # Errors
///
/// See [`generate`].
pub fn sample_times(
    start: f64,
    end: f64,
    interval: f64,
    num_samples: Option<usize>,
) -> Result<Vec<f64>> {
    if !(start.is_finite() && end.is_finite()) || end < start {
        return Err(SkillError::invalid_input(format!(
            "invalid time span [{}, {}]",
            start, end
        )));
    }

    match num_samples {
        Some(0) => Err(SkillError::invalid_input("num_samples must be at least 1")),
        Some(1) => Ok(vec![start]),
        Some(n) => {
            if n > MAX_SAMPLES {
                return Err(SkillError::invalid_input(format!(
                    "num_samples {} exceeds the limit of {}",
                    n, MAX_SAMPLES
                )));
            }
            if end <= start {
                return Err(SkillError::invalid_input(format!(
                    "cannot place {} distinct samples in an empty time span",
                    n
                )));
            }
            let step = (end - start) / (n - 1) as f64;
            let mut times: Vec<f64> = (0..n).map(|i| start + i as f64 * step).collect();
            times[n - 1] = end;
            Ok(times)
        }
        None => {
            if !(interval.is_finite() && interval > 0.0) {
                return Err(SkillError::invalid_input(format!(
                    "interval must be finite and positive, got {}",
                    interval
                )));
            }
            let span_steps = (end - start) / interval;
            if span_steps >= MAX_SAMPLES as f64 {
                return Err(SkillError::invalid_input(format!(
                    "interval {} yields more than {} samples",
                    interval, MAX_SAMPLES
                )));
            }

            let mut times = Vec::with_capacity(span_steps as usize + 2);
            let mut i = 0usize;
            loop {
                let t = start + i as f64 * interval;
                times.push(t);
                if t >= end - GRID_EPS * interval {
                    break;
                }
                i += 1;
            }
            Ok(times)
        }
    }
}
