//! Run configuration, passed explicitly into the pipeline.

use crate::LocateError;
use serde::{Deserialize, Serialize};

/// How far apart two same-named observations may be and still merge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeRadius {
    /// A fraction of the mesh bounding-box diagonal.
    SceneFraction(f64),
    /// A distance in world units.
    Absolute(f64),
}

impl MergeRadius {
    /// Resolve to a world-space distance for a scene with the given diagonal.
    pub fn resolve(self, scene_diagonal: f64) -> f64 {
        match self {
            MergeRadius::SceneFraction(fraction) => fraction * scene_diagonal,
            MergeRadius::Absolute(distance) => distance,
        }
    }
}

impl Default for MergeRadius {
    fn default() -> Self {
        MergeRadius::SceneFraction(0.05)
    }
}

/// What to do with box corners outside `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxPolicy {
    /// Clamp each coordinate into range.
    #[default]
    Clamp,
    /// Drop the whole detection.
    Reject,
}

/// Configuration for one processing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocateConfig {
    pub merge_radius: MergeRadius,
    pub box_policy: BoxPolicy,
    /// Hits farther than this from the camera count as misses.
    pub max_ray_distance: Option<f64>,
    /// Localize frames and detections on the rayon pool.
    pub parallel: bool,
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self {
            merge_radius: MergeRadius::default(),
            box_policy: BoxPolicy::default(),
            max_ray_distance: None,
            parallel: true,
        }
    }
}

impl LocateConfig {
    /// Parse a JSON configuration; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, LocateError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| LocateError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject thresholds that would make matching meaningless.
    pub fn validate(&self) -> Result<(), LocateError> {
        let radius = match self.merge_radius {
            MergeRadius::SceneFraction(f) | MergeRadius::Absolute(f) => f,
        };
        if !radius.is_finite() || radius <= 0.0 {
            return Err(LocateError::InvalidConfig(format!(
                "merge radius must be finite and positive, got {}",
                radius
            )));
        }
        if let Some(distance) = self.max_ray_distance {
            if !distance.is_finite() || distance <= 0.0 {
                return Err(LocateError::InvalidConfig(format!(
                    "max ray distance must be finite and positive, got {}",
                    distance
                )));
            }
        }
        Ok(())
    }
}
