//! Model-order selection by Bayesian Information Criterion.
//!
//! Each candidate component count is fitted independently on the same data,
//! in parallel when the `parallel` feature is enabled, and the candidate with
//! the lowest BIC wins. Ties go to the smaller component count.

use nalgebra::DMatrix;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::MixtureConfig;
use crate::error::{Result, SkillError};
use crate::mixture::GaussianMixture;

/// Outcome of fitting one candidate component count.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CandidateScore {
    /// Number of mixture components.
    pub n_components: usize,

    /// BIC on the joint dataset; `None` when the candidate could not be fit.
    pub bic: Option<f64>,

    /// Whether EM converged within the iteration cap.
    pub converged: bool,

    /// EM iterations used.
    pub n_iter: usize,
}

/// Report of a BIC sweep.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModelSelection {
    /// One entry per candidate, in candidate order.
    pub candidates: Vec<CandidateScore>,

    /// Selected component count.
    pub selected: usize,

    /// Seed used for every candidate fit in the sweep.
    pub seed: u64,
}

impl ModelSelection {
    /// Whether at least one candidate converged.
    #[must_use]
    pub fn any_converged(&self) -> bool {
        self.candidates.iter().any(|c| c.converged)
    }

    /// BIC of the selected candidate.
    #[must_use]
    pub fn selected_bic(&self) -> Option<f64> {
        self.candidates
            .iter()
            .find(|c| c.n_components == self.selected)
            .and_then(|c| c.bic)
    }
}

/// Fit every candidate component count and keep the lowest-BIC mixture.
///
/// With `seed = Some(_)` the sweep is deterministic and the winning fit is
/// returned as is. With `seed = None` the sweep draws one random seed and the
/// winner is refit from a fresh seed.
///
/// Candidates with more components than samples are skipped.
///
/// # Errors
///
/// Returns an error if no candidate can be fit.
pub fn select_mixture(
    data: &DMatrix<f64>,
    candidates: &[usize],
    config: &MixtureConfig,
    seed: Option<u64>,
) -> Result<(GaussianMixture, ModelSelection)> {
    let n_samples = data.nrows();
    let usable: Vec<usize> = candidates
        .iter()
        .copied()
        .filter(|&c| c >= 1 && c <= n_samples)
        .collect();
    if usable.is_empty() {
        return Err(SkillError::invalid_input(format!(
            "no candidate component count fits {} samples",
            n_samples
        )));
    }

    let sweep_seed = seed.unwrap_or_else(rand::random);
    let fits = fit_candidates(data, &usable, config, sweep_seed);

    let scores: Vec<CandidateScore> = candidates
        .iter()
        .map(|&c| {
            let fit = fits.iter().find(|(n, _)| *n == c).map(|(_, r)| r);
            match fit {
                Some(Ok((gmm, bic))) => CandidateScore {
                    n_components: c,
                    bic: Some(*bic),
                    converged: gmm.converged(),
                    n_iter: gmm.n_iter(),
                },
                _ => CandidateScore {
                    n_components: c,
                    bic: None,
                    converged: false,
                    n_iter: 0,
                },
            }
        })
        .collect();

    let mut last_error = None;
    let mut best: Option<(GaussianMixture, f64)> = None;
    for (c, result) in fits {
        match result {
            Ok((gmm, bic)) => {
                debug!(n_components = c, bic, converged = gmm.converged(), "candidate fitted");
                if best.as_ref().map_or(true, |(_, b)| bic < *b) {
                    best = Some((gmm, bic));
                }
            }
            Err(err) => {
                warn!(n_components = c, error = %err, "candidate fit failed");
                last_error = Some(err);
            }
        }
    }

    let (winner, _) = match best {
        Some(b) => b,
        None => {
            return Err(last_error
                .unwrap_or_else(|| SkillError::linalg("no candidate mixture could be fit")))
        }
    };
    let selected = winner.n_components();

    let mixture = if seed.is_some() {
        winner
    } else {
        match GaussianMixture::fit(data, selected, config, rand::random()) {
            Ok(refit) => refit,
            Err(err) => {
                warn!(n_components = selected, error = %err, "refit failed, keeping sweep fit");
                winner
            }
        }
    };

    Ok((
        mixture,
        ModelSelection {
            candidates: scores,
            selected,
            seed: sweep_seed,
        },
    ))
}

type CandidateFit = (usize, Result<(GaussianMixture, f64)>);

fn fit_candidate(data: &DMatrix<f64>, c: usize, config: &MixtureConfig, seed: u64) -> CandidateFit {
    let result = GaussianMixture::fit(data, c, config, seed)
        .and_then(|gmm| gmm.bic(data).map(|bic| (gmm, bic)));
    (c, result)
}

#[cfg(feature = "parallel")]
fn fit_candidates(
    data: &DMatrix<f64>,
    candidates: &[usize],
    config: &MixtureConfig,
    seed: u64,
) -> Vec<CandidateFit> {
    candidates
        .par_iter()
        .map(|&c| fit_candidate(data, c, config, seed))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn fit_candidates(
    data: &DMatrix<f64>,
    candidates: &[usize],
    config: &MixtureConfig,
    seed: u64,
) -> Vec<CandidateFit> {
    candidates
        .iter()
        .map(|&c| fit_candidate(data, c, config, seed))
        .collect()
}
