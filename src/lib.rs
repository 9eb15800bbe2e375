//! Motion Skill Library
//!
//! Learning generalized robot skills from a handful of demonstrations.
//!
//! Demonstrations of the same task are aligned onto a common time base,
//! projected onto a low-dimensional latent space, and modeled jointly with
//! time by a Gaussian mixture. Regression over time then produces one smooth
//! trajectory that captures the shared structure of the demonstrations.
//!
//! # Pipeline
//!
//! - **Alignment**: dynamic time warping against the longest demonstration
//! - **Projection**: PCA over the pooled aligned samples
//! - **Mixture**: full-covariance EM, component count chosen by BIC
//! - **Regression**: Gaussian mixture regression at evenly spaced times
//!
//! # Quick Start
//!
//! ```
//! use motion_skill::{TrajectoryLearner, Demonstration, ModelConfig};
//!
//! let demos: Vec<Demonstration> = [40usize, 48, 44]
//!     .iter()
//!     .map(|&n| {
//!         let pts: Vec<[f64; 3]> = (0..n)
//!             .map(|i| {
//!                 let a = i as f64 / (n - 1) as f64 * std::f64::consts::FRAC_PI_2;
//!                 [a.cos(), a.sin(), 0.5]
//!             })
//!             .collect();
//!         Demonstration::from_points3(&pts)
//!     })
//!     .collect();
//!
//! let mut learner = TrajectoryLearner::new(ModelConfig::positions().with_seed(0));
//! learner.fit(&demos)?;
//!
//! let trajectory = learner.generate(0.1, None)?;
//! assert!(trajectory.times.windows(2).all(|w| w[1] > w[0]));
//! # Ok::<(), motion_skill::SkillError>(())
//! ```
//!
//! # Presets
//!
//! ```
//! use motion_skill::ModelConfig;
//!
//! let positions = ModelConfig::positions();
//! let gripper = ModelConfig::gripper();
//! assert_eq!(positions.n_latent_dims, 3);
//! assert_eq!(gripper.n_latent_dims, 1);
//! ```
//!
//! # Features
//!
//! | Feature | Default | Effect |
//! |---------|---------|--------|
//! | `parallel` | yes | Fit BIC candidates on the rayon thread pool |
//! | `serde` | no | `Serialize`/`Deserialize` on public data types |

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod align;
pub mod config;
pub mod distance;
pub mod error;
pub mod math;
pub mod mixture;
pub mod model;
pub mod regression;
pub mod selection;
pub mod skill;
pub mod trajectory;
pub mod validation;

// Re-exports for convenient access
pub use align::align_trajectories;
pub use config::{MixtureConfig, ModelConfig, DEFAULT_CANDIDATE_COMPONENTS};
pub use distance::{dtw, l1_distance, DtwAlignment, WarpingPath};
pub use error::{Result, SkillError};
pub use math::linalg::Pca;
pub use mixture::GaussianMixture;
pub use model::{fit_demonstrations, fit_model, FitWarning, FittedModel, TrajectoryLearner};
pub use regression::{generate, predict};
pub use selection::{select_mixture, CandidateScore, ModelSelection};
pub use skill::{learn_skill, Skill, SkillMetadata};
pub use trajectory::{AlignedTrajectories, Demonstration, GeneratedTrajectory};
pub use validation::{compute_reconstruction_error, projection_error, validate_fit, FitReport};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn generate_arc(n: usize, z: f64) -> Demonstration {
        let pts: Vec<[f64; 3]> = (0..n)
            .map(|i| {
                let a = i as f64 / (n - 1) as f64 * PI;
                [a.cos(), a.sin(), z]
            })
            .collect();
        Demonstration::from_points3(&pts)
    }

    #[test]
    fn test_full_pipeline() {
        let demos = vec![generate_arc(40, 0.0), generate_arc(50, 0.02), generate_arc(45, 0.01)];
        let config = ModelConfig::positions().with_seed(42);

        // Align
        let aligned = align_trajectories(&demos).unwrap();
        assert_eq!(aligned.shape(), (3, 50, 3));

        // Fit
        let model = fit_model(&aligned, &config).unwrap();
        let report = validate_fit(&model);
        assert_eq!(report.n_components, model.n_components());

        // Generate
        let traj = model.generate(0.1, None).unwrap();
        assert!(traj.points.iter().flatten().all(|v| v.is_finite()));
        assert_eq!(traj.dims(), 3);

        // Generated start lies near the shared start of the arcs
        let start = &traj.points[0];
        assert!((start[0] - 1.0).abs() < 0.5, "start {:?}", start);
    }

    #[test]
    fn test_dtw_self_distance() {
        let demo = generate_arc(20, 0.0);
        let alignment = dtw(demo.points(), demo.points(), l1_distance).unwrap();
        assert!(alignment.cost < 1e-12);
        assert_eq!(alignment.path.len(), 20);
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
