//! Per-frame localization: detections + camera pose → surface hits.

use crate::LocateError;
use crate::camera::CameraPose;
use crate::detection::Detection;
use crate::intersect::{Aabb, MeshIntersector, RayHit};
use glam::DVec3;
use rayon::prelude::*;
use tracing::debug;

/// A detection together with the surface hits of its four box corners.
///
/// Detections whose corners all missed are kept, with four `Miss` hits.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalizedDetection {
    pub detection: Detection,
    /// One result per box corner, in corner order.
    pub hits: [RayHit; 4],
}

impl LocalizedDetection {
    /// Surface points of the corners that hit.
    pub fn hit_points(&self) -> impl Iterator<Item = DVec3> + '_ {
        self.hits.iter().filter_map(RayHit::point)
    }

    pub fn hit_count(&self) -> usize {
        self.hits.iter().filter(|h| h.is_hit()).count()
    }

    /// At least one corner hit the mesh.
    pub fn is_localized(&self) -> bool {
        self.hit_count() > 0
    }

    /// Centroid of the successful corner hits.
    pub fn representative_point(&self) -> Option<DVec3> {
        let count = self.hit_count();
        (count > 0).then(|| self.hit_points().sum::<DVec3>() / count as f64)
    }

    /// Bounds of the successful corner hits.
    pub fn footprint(&self) -> Option<Aabb> {
        self.is_localized()
            .then(|| Aabb::from_points(self.hit_points()))
    }
}

/// Casts detection corners against a mesh.
///
/// Holds only shared references and settings; a frame call has no side
/// effects, so identical inputs always give identical output.
#[derive(Debug, Clone, Copy)]
pub struct FrameLocalizer<'a> {
    intersector: &'a MeshIntersector,
    max_distance: f64,
    parallel: bool,
}

impl<'a> FrameLocalizer<'a> {
    pub fn new(intersector: &'a MeshIntersector) -> Self {
        Self {
            intersector,
            max_distance: f64::INFINITY,
            parallel: true,
        }
    }

    /// Hits farther than `distance` from the camera count as misses.
    pub fn with_max_distance(mut self, distance: Option<f64>) -> Self {
        self.max_distance = distance.unwrap_or(f64::INFINITY);
        self
    }

    /// Spread detections over the rayon pool.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn localize_one(
        &self,
        pose: &CameraPose,
        width: u32,
        height: u32,
        detection: &Detection,
    ) -> Result<LocalizedDetection, LocateError> {
        let rays = pose.corner_rays(&detection.bbox, width, height)?;
        Ok(LocalizedDetection {
            detection: detection.clone(),
            hits: rays.map(|ray| self.intersector.cast_within(&ray, self.max_distance)),
        })
    }

    /// Localize every detection of one frame.
    ///
    /// Fails with `DegenerateCamera` if the image size is zero or rays
    /// cannot be formed; output order matches `detections`.
    pub fn localize(
        &self,
        pose: &CameraPose,
        width: u32,
        height: u32,
        detections: &[Detection],
    ) -> Result<Vec<LocalizedDetection>, LocateError> {
        if width == 0 || height == 0 {
            return Err(LocateError::DegenerateCamera(format!(
                "image size {}x{}",
                width, height
            )));
        }

        let localized: Vec<LocalizedDetection> = if self.parallel {
            detections
                .par_iter()
                .map(|d| self.localize_one(pose, width, height, d))
                .collect::<Result<_, _>>()?
        } else {
            detections
                .iter()
                .map(|d| self.localize_one(pose, width, height, d))
                .collect::<Result<_, _>>()?
        };

        debug!(
            "Localized {}/{} detections ({} corner hits)",
            localized.iter().filter(|l| l.is_localized()).count(),
            localized.len(),
            localized.iter().map(LocalizedDetection::hit_count).sum::<usize>()
        );
        Ok(localized)
    }
}

/// Localize one frame's detections with default settings.
pub fn localize_frame(
    pose: &CameraPose,
    width: u32,
    height: u32,
    detections: &[Detection],
    intersector: &MeshIntersector,
) -> Result<Vec<LocalizedDetection>, LocateError> {
    FrameLocalizer::new(intersector).localize(pose, width, height, detections)
}
