//! Full-covariance Gaussian mixture fitted by expectation-maximization.
//!
//! # Algorithm
//!
//! 1. Seed `C` centers with k-means++ and refine them with Lloyd iterations
//! 2. Turn the hard k-means labels into initial weights, means, covariances
//! 3. Alternate E-step (log-space responsibilities) and M-step until the
//!    per-sample log-likelihood changes by less than `tol`, or `max_iter`
//!    iterations have run
//!
//! Every covariance gets `reg_covar` added to its diagonal so components that
//! collapse onto a line or a point stay positive definite.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

use crate::config::MixtureConfig;
use crate::error::{Result, SkillError};
use crate::math::gaussian::{log_sum_exp, CholeskyGaussian};

/// Keeps empty components from dividing by zero in the M-step.
const COMPONENT_MASS_EPS: f64 = 10.0 * f64::EPSILON;

/// A fitted Gaussian mixture model.
#[derive(Debug, Clone)]
pub struct GaussianMixture {
    weights: Vec<f64>,
    means: Vec<DVector<f64>>,
    covariances: Vec<DMatrix<f64>>,
    converged: bool,
    n_iter: usize,
    lower_bound: f64,
}

impl GaussianMixture {
    /// Fit a mixture of `n_components` Gaussians to `data` (one sample per
    /// row).
    ///
    /// The fit is fully determined by `seed`.
    ///
    /// # Errors
    ///
    /// Returns an error if `n_components` is zero or exceeds the number of
    /// samples, if `data` contains non-finite values, or if a covariance
    /// becomes non positive definite.
    pub fn fit(
        data: &DMatrix<f64>,
        n_components: usize,
        config: &MixtureConfig,
        seed: u64,
    ) -> Result<Self> {
        let n = data.nrows();
        if n_components == 0 {
            return Err(SkillError::invalid_input("n_components must be at least 1"));
        }
        if n < n_components {
            return Err(SkillError::invalid_input(format!(
                "{} samples cannot support {} components",
                n, n_components
            )));
        }
        if data.iter().any(|v| !v.is_finite()) {
            return Err(SkillError::numerical_instability(
                "non-finite value in mixture input",
            ));
        }

        let samples = rows(data);
        let mut rng = StdRng::seed_from_u64(seed);

        let labels = kmeans_labels(&samples, n_components, config.kmeans_iter, &mut rng);
        let mut resp = DMatrix::zeros(n, n_components);
        for (i, &k) in labels.iter().enumerate() {
            resp[(i, k)] = 1.0;
        }

        let mut model = Self {
            weights: Vec::new(),
            means: Vec::new(),
            covariances: Vec::new(),
            converged: false,
            n_iter: 0,
            lower_bound: f64::NEG_INFINITY,
        };
        model.m_step(&samples, &resp, config.reg_covar);

        for iter in 1..=config.max_iter {
            let prev = model.lower_bound;
            let (log_prob_norm, log_resp) = model.e_step(&samples)?;
            resp = log_resp.map(f64::exp);
            model.m_step(&samples, &resp, config.reg_covar);

            model.lower_bound = log_prob_norm;
            model.n_iter = iter;
            let change = model.lower_bound - prev;
            trace!(n_components, iter, lower_bound = model.lower_bound, "em iteration");
            if change.abs() < config.tol {
                model.converged = true;
                break;
            }
        }

        Ok(model)
    }

    /// Number of components (C).
    #[must_use]
    pub fn n_components(&self) -> usize {
        self.weights.len()
    }

    /// Dimensionality of the modeled space.
    #[must_use]
    pub fn dims(&self) -> usize {
        self.means.first().map_or(0, DVector::len)
    }

    /// Mixing weights, summing to one.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Component means.
    #[must_use]
    pub fn means(&self) -> &[DVector<f64>] {
        &self.means
    }

    /// Component covariance matrices.
    #[must_use]
    pub fn covariances(&self) -> &[DMatrix<f64>] {
        &self.covariances
    }

    /// Whether EM stopped on the tolerance rather than the iteration cap.
    #[must_use]
    pub const fn converged(&self) -> bool {
        self.converged
    }

    /// Number of EM iterations run.
    #[must_use]
    pub const fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Final per-sample log-likelihood lower bound.
    #[must_use]
    pub const fn lower_bound(&self) -> f64 {
        self.lower_bound
    }

    /// Number of free parameters of a full-covariance mixture.
    #[must_use]
    pub fn n_parameters(&self) -> usize {
        let c = self.n_components();
        let d = self.dims();
        (c - 1) + c * d + c * d * (d + 1) / 2
    }

    /// Total log-likelihood of `data` under the mixture.
    ///
    /// # Errors
    ///
    /// Returns an error if a component covariance cannot be factored.
    pub fn log_likelihood(&self, data: &DMatrix<f64>) -> Result<f64> {
        let components = self.factored()?;
        let mut weighted = vec![0.0; self.n_components()];
        let total: f64 = rows(data)
            .iter()
            .map(|x| {
                for (k, g) in components.iter().enumerate() {
                    weighted[k] = self.weights[k].ln() + g.log_pdf(x);
                }
                log_sum_exp(&weighted)
            })
            .sum();
        Ok(total)
    }

    /// Bayesian Information Criterion on `data`; lower is better.
    ///
    /// # Errors
    ///
    /// Returns an error if a component covariance cannot be factored.
    pub fn bic(&self, data: &DMatrix<f64>) -> Result<f64> {
        let log_likelihood = self.log_likelihood(data)?;
        Ok(-2.0 * log_likelihood + self.n_parameters() as f64 * (data.nrows() as f64).ln())
    }

    /// Cholesky-factored components.
    fn factored(&self) -> Result<Vec<CholeskyGaussian>> {
        self.means
            .iter()
            .zip(self.covariances.iter())
            .map(|(m, c)| CholeskyGaussian::new(m.clone(), c.clone()))
            .collect()
    }

    /// Mean log-likelihood and log responsibilities (n × C).
    fn e_step(&self, samples: &[DVector<f64>]) -> Result<(f64, DMatrix<f64>)> {
        let components = self.factored()?;
        let c = components.len();
        let mut log_resp = DMatrix::zeros(samples.len(), c);
        let mut weighted = vec![0.0; c];
        let mut total = 0.0;

        for (i, x) in samples.iter().enumerate() {
            for (k, g) in components.iter().enumerate() {
                weighted[k] = self.weights[k].ln() + g.log_pdf(x);
            }
            let norm = log_sum_exp(&weighted);
            if !norm.is_finite() {
                return Err(SkillError::numerical_instability(format!(
                    "sample {} has zero likelihood under every component",
                    i
                )));
            }
            for k in 0..c {
                log_resp[(i, k)] = weighted[k] - norm;
            }
            total += norm;
        }

        Ok((total / samples.len() as f64, log_resp))
    }

    /// Re-estimate weights, means and covariances from responsibilities.
    fn m_step(&mut self, samples: &[DVector<f64>], resp: &DMatrix<f64>, reg_covar: f64) {
        let n = samples.len();
        let d = samples[0].len();
        let c = resp.ncols();

        self.weights.clear();
        self.means.clear();
        self.covariances.clear();

        for k in 0..c {
            let column = resp.column(k);
            let nk = column.sum() + COMPONENT_MASS_EPS;

            let mut mean = DVector::zeros(d);
            for (x, &r) in samples.iter().zip(column.iter()) {
                mean.axpy(r, x, 1.0);
            }
            mean /= nk;

            let mut cov = DMatrix::zeros(d, d);
            for (x, &r) in samples.iter().zip(column.iter()) {
                let diff = x - &mean;
                cov.ger(r, &diff, &diff, 1.0);
            }
            cov /= nk;
            for j in 0..d {
                cov[(j, j)] += reg_covar;
            }

            self.weights.push(nk / n as f64);
            self.means.push(mean);
            self.covariances.push(cov);
        }

        let total: f64 = self.weights.iter().sum();
        for w in &mut self.weights {
            *w /= total;
        }
    }
}

/// Samples of `data` as owned column vectors.
fn rows(data: &DMatrix<f64>) -> Vec<DVector<f64>> {
    data.row_iter().map(|r| r.transpose()).collect()
}

/// Hard k-means labels: k-means++ seeding followed by Lloyd iterations.
fn kmeans_labels(
    samples: &[DVector<f64>],
    k: usize,
    max_iter: usize,
    rng: &mut StdRng,
) -> Vec<usize> {
    let mut centers = kmeans_plus_plus(samples, k, rng);
    let mut labels = assign(samples, &centers);

    for _ in 0..max_iter {
        // Empty clusters keep their previous center
        let mut sums = vec![DVector::zeros(samples[0].len()); k];
        let mut counts = vec![0usize; k];
        for (x, &l) in samples.iter().zip(labels.iter()) {
            sums[l] += x;
            counts[l] += 1;
        }
        for j in 0..k {
            if counts[j] > 0 {
                centers[j] = &sums[j] / counts[j] as f64;
            }
        }

        let next = assign(samples, &centers);
        if next == labels {
            break;
        }
        labels = next;
    }

    labels
}

/// k-means++ center seeding.
fn kmeans_plus_plus(samples: &[DVector<f64>], k: usize, rng: &mut StdRng) -> Vec<DVector<f64>> {
    let n = samples.len();
    let mut centers = Vec::with_capacity(k);
    centers.push(samples[rng.gen_range(0..n)].clone());

    let mut nearest: Vec<f64> = samples
        .iter()
        .map(|x| (x - &centers[0]).norm_squared())
        .collect();

    while centers.len() < k {
        let total: f64 = nearest.iter().sum();
        let next = if total > 0.0 {
            let mut target = rng.gen::<f64>() * total;
            let mut chosen = n - 1;
            for (i, &d) in nearest.iter().enumerate() {
                if target < d {
                    chosen = i;
                    break;
                }
                target -= d;
            }
            chosen
        } else {
            rng.gen_range(0..n)
        };

        let center = samples[next].clone();
        for (x, d) in samples.iter().zip(nearest.iter_mut()) {
            *d = d.min((x - &center).norm_squared());
        }
        centers.push(center);
    }

    centers
}

/// Index of the nearest center for every sample.
fn assign(samples: &[DVector<f64>], centers: &[DVector<f64>]) -> Vec<usize> {
    samples
        .iter()
        .map(|x| {
            centers
                .iter()
                .enumerate()
                .map(|(j, c)| (j, (x - c).norm_squared()))
                .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
                .0
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Two well-separated 2D blobs on a deterministic lattice.
    fn two_blobs() -> DMatrix<f64> {
        let mut values = Vec::new();
        for (cx, cy) in [(0.0, 0.0), (10.0, 5.0)] {
            for i in 0..5 {
                for j in 0..5 {
                    values.push(cx + (i as f64 - 2.0) * 0.2);
                    values.push(cy + (j as f64 - 2.0) * 0.2);
                }
            }
        }
        DMatrix::from_row_slice(50, 2, &values)
    }

    #[test]
    fn test_recovers_separated_blobs() {
        let data = two_blobs();
        let gmm = GaussianMixture::fit(&data, 2, &MixtureConfig::default(), 3).unwrap();

        assert!(gmm.converged());
        assert_relative_eq!(gmm.weights().iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        for w in gmm.weights() {
            assert_relative_eq!(*w, 0.5, epsilon = 1e-6);
        }

        let mut xs: Vec<f64> = gmm.means().iter().map(|m| m[0]).collect();
        xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_relative_eq!(xs[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(xs[1], 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_bic_prefers_true_component_count() {
        let data = two_blobs();
        let config = MixtureConfig::default();
        let one = GaussianMixture::fit(&data, 1, &config, 0).unwrap();
        let two = GaussianMixture::fit(&data, 2, &config, 0).unwrap();
        assert!(two.bic(&data).unwrap() < one.bic(&data).unwrap());
    }

    #[test]
    fn test_same_seed_same_fit() {
        let data = two_blobs();
        let config = MixtureConfig::default();
        let a = GaussianMixture::fit(&data, 3, &config, 11).unwrap();
        let b = GaussianMixture::fit(&data, 3, &config, 11).unwrap();
        assert_eq!(a.means(), b.means());
        assert_eq!(a.weights(), b.weights());
        assert_eq!(a.n_iter(), b.n_iter());
    }

    #[test]
    fn test_parameter_count() {
        let data = two_blobs();
        let gmm = GaussianMixture::fit(&data, 2, &MixtureConfig::default(), 1).unwrap();
        // 1 weight + 2*2 means + 2*3 covariance entries
        assert_eq!(gmm.n_parameters(), 11);
    }

    #[test]
    fn test_duplicate_points_stay_finite() {
        let data = DMatrix::from_row_slice(6, 2, &[1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0]);
        let gmm = GaussianMixture::fit(&data, 3, &MixtureConfig::default(), 5).unwrap();
        assert!(gmm.bic(&data).unwrap().is_finite());
        assert!(gmm.means().iter().all(|m| m.iter().all(|v| v.is_finite())));
    }

    #[test]
    fn test_iteration_cap_reports_unconverged() {
        let data = two_blobs();
        let config = MixtureConfig {
            max_iter: 1,
            ..MixtureConfig::default()
        };
        let gmm = GaussianMixture::fit(&data, 2, &config, 2).unwrap();
        assert_eq!(gmm.n_iter(), 1);
        assert!(!gmm.converged());
    }

    #[test]
    fn test_too_many_components_rejected() {
        let data = DMatrix::from_row_slice(2, 1, &[0.0, 1.0]);
        assert!(GaussianMixture::fit(&data, 3, &MixtureConfig::default(), 0).is_err());
    }
}
