//! Learned skills: a generalized trajectory plus the metadata a task planner
//! needs to bind and replay it.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ModelConfig;
use crate::error::{Result, SkillError};
use crate::model::fit_demonstrations;
use crate::trajectory::{Demonstration, GeneratedTrajectory};

/// Gripper demonstrations are padded to this many columns before modeling.
const GRIPPER_MODEL_DIMS: usize = 2;

/// Planner-facing description of a skill.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SkillMetadata {
    /// Action name the skill implements.
    pub name: String,

    /// Whether the gripper is closed when the skill starts.
    pub grip_initial: bool,

    /// Whether the gripper is closed when the skill ends.
    pub grip_final: bool,

    /// Index of the action parameter naming the skill's target object.
    pub target_index: Option<usize>,
}

impl SkillMetadata {
    /// Metadata with open gripper and no target.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grip_initial: false,
            grip_final: false,
            target_index: None,
        }
    }

    /// Set the gripper state at start and end.
    #[must_use]
    pub const fn with_grip(mut self, initial: bool, final_state: bool) -> Self {
        self.grip_initial = initial;
        self.grip_final = final_state;
        self
    }

    /// Set the target parameter index.
    #[must_use]
    pub const fn with_target_index(mut self, index: usize) -> Self {
        self.target_index = Some(index);
        self
    }
}

/// A generalized trajectory with optional gripper channel.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Skill {
    /// Regressed positions.
    pub trajectory: GeneratedTrajectory,

    /// Gripper strength at each trajectory time, if demonstrated.
    pub grip_strength: Option<Vec<f64>>,

    /// Planner metadata.
    pub metadata: SkillMetadata,
}

impl Skill {
    /// Action name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Whether this skill implements `action`.
    #[must_use]
    pub fn matches(&self, action: &str) -> bool {
        self.metadata.name == action
    }

    /// The action parameter naming this skill's target.
    ///
    /// `None` when the skill has no target, or the index is out of range.
    #[must_use]
    pub fn target<'a, T>(&self, params: &'a [T]) -> Option<&'a T> {
        self.metadata.target_index.and_then(|i| params.get(i))
    }

    /// Sample times.
    #[must_use]
    pub fn times(&self) -> &[f64] {
        &self.trajectory.times
    }

    /// Trajectory waypoints.
    #[must_use]
    pub fn points(&self) -> &[Vec<f64>] {
        &self.trajectory.points
    }

    /// Whether the gripper is closed at the start.
    #[must_use]
    pub const fn grip_initial(&self) -> bool {
        self.metadata.grip_initial
    }

    /// Whether the gripper is closed at the end.
    #[must_use]
    pub const fn grip_final(&self) -> bool {
        self.metadata.grip_final
    }

    /// Shift the trajectory rigidly so its final waypoint lands on `point`.
    ///
    /// # Errors
    ///
    /// Returns an error if the trajectory is empty or `point` has the wrong
    /// dimensionality.
    pub fn translated_to(&self, point: &[f64]) -> Result<Self> {
        let last = self
            .trajectory
            .points
            .last()
            .ok_or_else(|| SkillError::invalid_input("cannot translate an empty trajectory"))?;
        if point.len() != last.len() {
            return Err(SkillError::invalid_input(format!(
                "target point has {} dimensions, trajectory has {}",
                point.len(),
                last.len()
            )));
        }

        let offset: Vec<f64> = point.iter().zip(last).map(|(p, l)| p - l).collect();
        let mut shifted = self.clone();
        for waypoint in &mut shifted.trajectory.points {
            for (v, o) in waypoint.iter_mut().zip(&offset) {
                *v += o;
            }
        }
        Ok(shifted)
    }
}

/// Learn a skill from position and optional gripper demonstrations.
///
/// Positions are aligned, fitted with `position_config` and regressed every
/// `interval` seconds. Gripper demonstrations are padded to two columns,
/// fitted with `gripper_config` and regressed at the position times.
///
/// # Errors
///
/// Propagates alignment, fitting and regression errors from either channel.
///
/// # Example
///
/// ```
/// use motion_skill::{learn_skill, Demonstration, ModelConfig, SkillMetadata};
///
/// let demos: Vec<Demonstration> = (0..3)
///     .map(|k| {
///         let pts: Vec<[f64; 3]> = (0..25)
///             .map(|i| {
///                 let s = i as f64 / 24.0;
///                 [s, 1.0 - s, 0.02 * k as f64]
///             })
///             .collect();
///         Demonstration::from_points3(&pts)
///     })
///     .collect();
///
/// let skill = learn_skill(
///     &demos,
///     None,
///     SkillMetadata::new("pick").with_target_index(0),
///     &ModelConfig::positions().with_seed(0),
///     &ModelConfig::gripper().with_seed(0),
///     0.1,
/// )?;
///
/// assert!(skill.matches("pick"));
/// assert_eq!(skill.target(&["red-box", "table"]), Some(&"red-box"));
/// # Ok::<(), motion_skill::SkillError>(())
/// ```
pub fn learn_skill(
    positions: &[Demonstration],
    gripper: Option<&[Demonstration]>,
    metadata: SkillMetadata,
    position_config: &ModelConfig,
    gripper_config: &ModelConfig,
    interval: f64,
) -> Result<Skill> {
    let position_model = fit_demonstrations(positions, position_config)?;
    let trajectory = position_model.generate(interval, None)?;

    let grip_strength = match gripper {
        Some(demos) => {
            let padded: Vec<Demonstration> = demos
                .iter()
                .cloned()
                .map(|d| d.pad_to_dims(GRIPPER_MODEL_DIMS))
                .collect();
            let gripper_model = fit_demonstrations(&padded, gripper_config)?;
            let regressed = gripper_model.predict(&trajectory.times)?;
            Some(regressed.column(0))
        }
        None => None,
    };

    info!(
        skill = %metadata.name,
        n_samples = trajectory.len(),
        n_components = position_model.n_components(),
        with_gripper = grip_strength.is_some(),
        "skill learned"
    );

    Ok(Skill {
        trajectory,
        grip_strength,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_skill() -> Skill {
        Skill {
            trajectory: GeneratedTrajectory {
                times: vec![0.0, 0.5, 1.0],
                points: vec![
                    vec![0.0, 0.0, 1.0],
                    vec![0.5, 0.0, 1.0],
                    vec![1.0, 0.5, 0.5],
                ],
                degenerate_components: Vec::new(),
            },
            grip_strength: Some(vec![-1.0, 0.0, 1.0]),
            metadata: SkillMetadata::new("stack")
                .with_grip(false, true)
                .with_target_index(1),
        }
    }

    #[test]
    fn test_matches_and_metadata() {
        let skill = sample_skill();
        assert!(skill.matches("stack"));
        assert!(!skill.matches("unstack"));
        assert_eq!(skill.name(), "stack");
        assert!(!skill.grip_initial());
        assert!(skill.grip_final());
    }

    #[test]
    fn test_target_lookup() {
        let skill = sample_skill();
        assert_eq!(skill.target(&["a", "b", "c"]), Some(&"b"));
        assert_eq!(skill.target(&["a"]), None);

        let untargeted = Skill {
            metadata: SkillMetadata::new("home"),
            ..sample_skill()
        };
        assert_eq!(untargeted.target(&["a", "b"]), None);
    }

    #[test]
    fn test_translated_to_moves_endpoint() {
        let skill = sample_skill();
        let moved = skill.translated_to(&[2.0, 2.0, 2.0]).unwrap();

        assert_eq!(moved.points().last().unwrap(), &vec![2.0, 2.0, 2.0]);
        // Rigid shift by (1.0, 1.5, 1.5)
        assert_relative_eq!(moved.points()[0][0], 1.0);
        assert_relative_eq!(moved.points()[0][1], 1.5);
        assert_relative_eq!(moved.points()[0][2], 2.5);
        assert_eq!(moved.times(), skill.times());
        assert_eq!(moved.grip_strength, skill.grip_strength);
    }

    #[test]
    fn test_translated_to_rejects_bad_input() {
        let skill = sample_skill();
        assert!(skill.translated_to(&[1.0, 2.0]).is_err());

        let empty = Skill {
            trajectory: GeneratedTrajectory {
                times: Vec::new(),
                points: Vec::new(),
                degenerate_components: Vec::new(),
            },
            ..sample_skill()
        };
        assert!(empty.translated_to(&[0.0, 0.0, 0.0]).is_err());
    }

    #[test]
    fn test_learn_skill_with_gripper() {
        let positions: Vec<Demonstration> = (0..3)
            .map(|k| {
                let n = 20 + 3 * k;
                let pts: Vec<[f64; 3]> = (0..n)
                    .map(|i| {
                        let s = i as f64 / (n - 1) as f64;
                        [s, 0.2 * s, 0.9 + 0.01 * k as f64]
                    })
                    .collect();
                Demonstration::from_points3(&pts)
            })
            .collect();
        let gripper: Vec<Demonstration> = (0..3)
            .map(|k| {
                let n = 20 + 3 * k;
                let values: Vec<f64> = (0..n)
                    .map(|i| if i < n / 2 { -1.0 } else { 1.0 })
                    .collect();
                Demonstration::from_scalars(&values)
            })
            .collect();

        let skill = learn_skill(
            &positions,
            Some(gripper.as_slice()),
            SkillMetadata::new("pick").with_grip(false, true),
            &ModelConfig::positions().with_seed(11),
            &ModelConfig::gripper().with_seed(11),
            0.1,
        )
        .unwrap();

        let grip = skill.grip_strength.as_ref().unwrap();
        assert_eq!(grip.len(), skill.trajectory.len());
        assert!(grip.iter().all(|g| g.is_finite()));
        // Opens early, closes late
        assert!(grip[0] < grip[grip.len() - 1]);
    }
}
