//! Aggregate records produced by the cross-frame aggregator.

use crate::intersect::Aabb;
use glam::DVec3;
use std::collections::BTreeSet;

/// One physical object, consolidated over every frame that saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    /// Canonical name.
    pub name: String,
    /// Mean of all contributing representative points.
    pub anchor: DVec3,
    /// Bounds of every corner hit that contributed.
    pub footprint: Option<Aabb>,
    pub materials: BTreeSet<String>,
    /// Distinct frames that contributed.
    pub frames: BTreeSet<String>,
    /// Number of representative points averaged into `anchor`.
    pub observations: usize,
    anchor_sum: DVec3,
}

impl SceneObject {
    pub(crate) fn new(
        name: String,
        point: DVec3,
        footprint: Option<Aabb>,
        materials: BTreeSet<String>,
        frame: &str,
    ) -> Self {
        Self {
            name,
            anchor: point,
            footprint,
            materials,
            frames: BTreeSet::from([frame.to_string()]),
            observations: 1,
            anchor_sum: point,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Add one more representative point with equal weight.
    pub(crate) fn add_observation(
        &mut self,
        point: DVec3,
        footprint: Option<Aabb>,
        materials: &BTreeSet<String>,
        frame: &str,
    ) {
        self.anchor_sum += point;
        self.observations += 1;
        self.anchor = self.anchor_sum / self.observations as f64;
        self.footprint = union_footprints(self.footprint, footprint);
        self.materials.extend(materials.iter().cloned());
        self.frames.insert(frame.to_string());
    }

    /// Merge another object of the same name into this one. The anchor
    /// becomes the mean over both objects' observations.
    pub(crate) fn absorb(&mut self, other: SceneObject) {
        self.anchor_sum += other.anchor_sum;
        self.observations += other.observations;
        self.anchor = self.anchor_sum / self.observations as f64;
        self.footprint = union_footprints(self.footprint, other.footprint);
        self.materials.extend(other.materials);
        self.frames.extend(other.frames);
    }
}

fn union_footprints(a: Option<Aabb>, b: Option<Aabb>) -> Option<Aabb> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.union(&b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Detections of one canonical name whose corners all missed the mesh.
///
/// They carry no position but still count for material consolidation.
#[derive(Debug, Clone, PartialEq)]
pub struct UnlocalizedObservation {
    pub name: String,
    pub materials: BTreeSet<String>,
    pub frames: BTreeSet<String>,
    pub observations: usize,
}

impl UnlocalizedObservation {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            materials: BTreeSet::new(),
            frames: BTreeSet::new(),
            observations: 0,
        }
    }

    pub(crate) fn record(&mut self, materials: &BTreeSet<String>, frame: &str) {
        self.materials.extend(materials.iter().cloned());
        self.frames.insert(frame.to_string());
        self.observations += 1;
    }
}
