//! Cross-frame aggregation of localized detections into scene objects.
//!
//! Identity is the canonical name; the merge radius only guards against
//! distant referents that share a name. Observations must be fed from a
//! single thread, in a deterministic order, for reproducible output.

mod scene_object;

pub use scene_object::{SceneObject, UnlocalizedObservation};

use crate::LocateError;
use crate::localize::LocalizedDetection;
use std::collections::BTreeMap;
use tracing::debug;

/// What [`Aggregator::observe`] did with one detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Started a new scene object.
    Created,
    /// Joined existing objects; more than one means they were merged.
    Merged { matched: usize },
    /// No corner hit; kept as an unlocalized observation.
    Unlocalized,
}

/// Final aggregation result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    /// Sorted by name, then anchor, for stable output. Callers should not
    /// attach meaning to the order.
    pub objects: Vec<SceneObject>,
    /// Unlocalized names that could not be attributed to a single object.
    pub unlocalized: Vec<UnlocalizedObservation>,
}

impl Scene {
    pub fn objects_named<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a SceneObject> + 'a {
        self.objects.iter().filter(move |o| o.name == name)
    }
}

/// Owns the scene-object collection for one run.
#[derive(Debug)]
pub struct Aggregator {
    radius: f64,
    objects: Vec<SceneObject>,
    unlocalized: BTreeMap<String, UnlocalizedObservation>,
}

impl Aggregator {
    /// Create an aggregator that merges same-named observations whose
    /// anchors lie within `radius` world units.
    pub fn new(radius: f64) -> Result<Self, LocateError> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(LocateError::InvalidConfig(format!(
                "merge radius must be finite and non-negative, got {}",
                radius
            )));
        }
        Ok(Self {
            radius,
            objects: Vec::new(),
            unlocalized: BTreeMap::new(),
        })
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Scene objects accumulated so far.
    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    /// Fold one localized detection seen in `frame`.
    pub fn observe(&mut self, frame: &str, localized: &LocalizedDetection) -> Placement {
        let detection = &localized.detection;
        let Some(point) = localized.representative_point() else {
            self.unlocalized
                .entry(detection.name.clone())
                .or_insert_with(|| UnlocalizedObservation::new(detection.name.clone()))
                .record(&detection.materials, frame);
            return Placement::Unlocalized;
        };
        let footprint = localized.footprint();

        let matches: Vec<usize> = self
            .objects
            .iter()
            .enumerate()
            .filter(|(_, o)| o.name == detection.name && o.anchor.distance(point) <= self.radius)
            .map(|(i, _)| i)
            .collect();

        let Some((&target, rest)) = matches.split_first() else {
            self.objects.push(SceneObject::new(
                detection.name.clone(),
                point,
                footprint,
                detection.materials.clone(),
                frame,
            ));
            return Placement::Created;
        };

        if !rest.is_empty() {
            debug!(
                "Merging {} nearby '{}' objects observed in {}",
                matches.len(),
                detection.name,
                frame
            );
        }
        // Ascending indices, all above `target`: removing from the back
        // leaves `target` in place.
        for &index in rest.iter().rev() {
            let other = self.objects.remove(index);
            self.objects[target].absorb(other);
        }
        self.objects[target].add_observation(point, footprint, &detection.materials, frame);

        Placement::Merged {
            matched: matches.len(),
        }
    }

    /// Fold every detection of one frame, in order.
    pub fn observe_frame(&mut self, frame: &str, localized: &[LocalizedDetection]) {
        for detection in localized {
            self.observe(frame, detection);
        }
    }

    /// Close the run.
    ///
    /// Unlocalized observations whose name belongs to exactly one scene
    /// object contribute their materials and frames to it; the rest are
    /// reported separately.
    pub fn finish(mut self) -> Scene {
        let mut unlocalized = Vec::new();
        for (name, observation) in std::mem::take(&mut self.unlocalized) {
            let mut same_name = self.objects.iter_mut().filter(|o| o.name == name);
            match (same_name.next(), same_name.next()) {
                (Some(object), None) => {
                    object.materials.extend(observation.materials);
                    object.frames.extend(observation.frames);
                }
                _ => unlocalized.push(observation),
            }
        }

        let mut objects = self.objects;
        objects.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then(a.anchor.x.total_cmp(&b.anchor.x))
                .then(a.anchor.y.total_cmp(&b.anchor.y))
                .then(a.anchor.z.total_cmp(&b.anchor.z))
        });

        Scene { objects, unlocalized }
    }
}
