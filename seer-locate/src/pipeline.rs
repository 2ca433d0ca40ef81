//! Batch processing of a whole capture.
//!
//! Frames are localized independently (in parallel when configured) and
//! folded into one [`Aggregator`] in frame-name order. Frames without a
//! usable pose are skipped and listed in the [`RunReport`].

use crate::LocateError;
use crate::aggregate::{Aggregator, Scene};
use crate::camera::CameraPose;
use crate::config::{BoxPolicy, LocateConfig};
use crate::detection::Detection;
use crate::intersect::MeshIntersector;
use crate::localize::{FrameLocalizer, LocalizedDetection};
use rayon::prelude::*;
use seer_data::{FrameDetections, PoseRecord};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use tracing::{info, warn};

/// A validated pose together with the image size it was calibrated for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePose {
    pub pose: CameraPose,
    pub width: u32,
    pub height: u32,
}

/// Camera poses of one reconstruction, keyed by image name.
///
/// Records that fail validation are kept with their failure reason so
/// the frames that need them are reported as degenerate, not missing.
#[derive(Debug, Default)]
pub struct PoseTable {
    entries: BTreeMap<String, Result<FramePose, String>>,
    /// File stem → image name, `None` when two images share a stem.
    stems: HashMap<String, Option<String>>,
}

fn file_stem(name: &str) -> Option<&str> {
    Path::new(name).file_stem().and_then(|s| s.to_str())
}

impl PoseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate raw pose records.
    pub fn from_records<I: IntoIterator<Item = PoseRecord>>(records: I) -> Self {
        let mut table = Self::new();
        for record in records {
            let entry = if record.width == 0 || record.height == 0 {
                Err(format!("image size {}x{}", record.width, record.height))
            } else {
                CameraPose::from_record(&record)
                    .map(|pose| FramePose {
                        pose,
                        width: record.width,
                        height: record.height,
                    })
                    .map_err(|e| e.to_string())
            };
            if let Err(reason) = &entry {
                warn!("Pose for {} is unusable: {}", record.image_name, reason);
            }
            table.insert_entry(record.image_name, entry);
        }
        table
    }

    pub fn insert(&mut self, image_name: impl Into<String>, pose: FramePose) {
        self.insert_entry(image_name.into(), Ok(pose));
    }

    fn insert_entry(&mut self, image_name: String, entry: Result<FramePose, String>) {
        if let Some(stem) = file_stem(&image_name) {
            self.stems
                .entry(stem.to_string())
                .and_modify(|existing| {
                    if existing.as_deref() != Some(image_name.as_str()) {
                        *existing = None;
                    }
                })
                .or_insert_with(|| Some(image_name.clone()));
        }
        self.entries.insert(image_name, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn image_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The image name a frame resolves to: exact match first, then by
    /// file stem (`frame_0001` finds `images/frame_0001.jpg`).
    pub fn resolve(&self, frame: &str) -> Option<&str> {
        if let Some((name, _)) = self.entries.get_key_value(frame) {
            return Some(name);
        }
        let stem = file_stem(frame)?;
        self.stems.get(stem)?.as_deref()
    }

    /// Pose for `frame`, or `MissingPose` / `DegenerateCamera`.
    pub fn lookup(&self, frame: &str) -> Result<&FramePose, LocateError> {
        let name = self
            .resolve(frame)
            .ok_or_else(|| LocateError::MissingPose(frame.to_string()))?;
        match self.entries.get(name) {
            Some(Ok(pose)) => Ok(pose),
            Some(Err(reason)) => Err(LocateError::DegenerateCamera(reason.clone())),
            None => Err(LocateError::MissingPose(frame.to_string())),
        }
    }
}

/// Normalized detections of one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameInput {
    pub frame: String,
    pub detections: Vec<Detection>,
    /// Records dropped before localization.
    pub rejected: usize,
    /// Detections whose box had to be clamped.
    pub clamped: usize,
}

impl FrameInput {
    pub fn new(frame: impl Into<String>, detections: Vec<Detection>) -> Self {
        Self {
            frame: frame.into(),
            detections,
            ..Default::default()
        }
    }

    /// Normalize raw detector records under `policy`.
    pub fn from_records(frame: &FrameDetections, policy: BoxPolicy) -> Self {
        let mut input = Self {
            frame: frame.frame.clone(),
            rejected: frame.rejected,
            ..Default::default()
        };
        for record in &frame.records {
            match Detection::from_record(record, policy) {
                Some((detection, clamped)) => {
                    input.clamped += usize::from(clamped);
                    input.detections.push(detection);
                }
                None => input.rejected += 1,
            }
        }
        input
    }
}

/// Why a frame was not localized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MissingPose,
    DegenerateCamera,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFrame {
    pub frame: String,
    pub reason: SkipReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Diagnostic summary of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub frames_total: usize,
    pub frames_localized: usize,
    pub skipped_frames: Vec<SkippedFrame>,
    /// Valid detections over all frames, including skipped ones.
    pub detections_total: usize,
    pub detections_localized: usize,
    pub detections_unlocalized: usize,
    /// Detections belonging to skipped frames.
    pub detections_skipped: usize,
    pub corner_hits: usize,
    pub corner_misses: usize,
    pub rejected_records: usize,
    pub clamped_boxes: usize,
    /// Registered images that no detection frame referred to.
    pub poses_without_detections: usize,
    /// Merge radius in world units after resolving the configuration.
    pub merge_radius: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    pub scene: Scene,
    pub report: RunReport,
}

type FrameResult<'a> = Result<(&'a str, Vec<LocalizedDetection>), LocateError>;

fn localize_input<'a>(
    localizer: &FrameLocalizer<'_>,
    poses: &'a PoseTable,
    input: &FrameInput,
) -> FrameResult<'a> {
    let image = poses
        .resolve(&input.frame)
        .ok_or_else(|| LocateError::MissingPose(input.frame.clone()))?;
    let frame_pose = poses.lookup(image)?;
    let localized = localizer.localize(
        &frame_pose.pose,
        frame_pose.width,
        frame_pose.height,
        &input.detections,
    )?;
    Ok((image, localized))
}

/// Localize and aggregate every frame of a capture.
///
/// Only an invalid configuration is fatal; per-frame failures end up in
/// `RunReport::skipped_frames`.
#[tracing::instrument(skip_all, fields(frames = frames.len(), poses = poses.len()))]
pub fn run_batch(
    intersector: &MeshIntersector,
    poses: &PoseTable,
    frames: &[FrameInput],
    config: &LocateConfig,
) -> Result<RunOutput, LocateError> {
    config.validate()?;
    let merge_radius = config.merge_radius.resolve(intersector.diagonal());
    let mut aggregator = Aggregator::new(merge_radius)?;

    let localizer = FrameLocalizer::new(intersector)
        .with_max_distance(config.max_ray_distance)
        .with_parallel(config.parallel);

    let mut ordered: Vec<&FrameInput> = frames.iter().collect();
    ordered.sort_by(|a, b| a.frame.cmp(&b.frame));

    let results: Vec<FrameResult<'_>> = if config.parallel {
        ordered
            .par_iter()
            .map(|input| localize_input(&localizer, poses, input))
            .collect()
    } else {
        ordered
            .iter()
            .map(|input| localize_input(&localizer, poses, input))
            .collect()
    };

    let mut report = RunReport {
        frames_total: frames.len(),
        merge_radius,
        ..Default::default()
    };
    let mut used_images: BTreeSet<&str> = BTreeSet::new();

    for (input, result) in ordered.iter().zip(results) {
        report.detections_total += input.detections.len();
        report.rejected_records += input.rejected;
        report.clamped_boxes += input.clamped;

        let (reason, detail) = match result {
            Ok((image, localized)) => {
                used_images.insert(image);
                report.frames_localized += 1;
                for detection in &localized {
                    let hits = detection.hit_count();
                    report.corner_hits += hits;
                    report.corner_misses += 4 - hits;
                    if hits > 0 {
                        report.detections_localized += 1;
                    } else {
                        report.detections_unlocalized += 1;
                    }
                }
                aggregator.observe_frame(&input.frame, &localized);
                continue;
            }
            Err(LocateError::MissingPose(_)) => (SkipReason::MissingPose, None),
            Err(LocateError::DegenerateCamera(reason)) => {
                if let Some(image) = poses.resolve(&input.frame) {
                    used_images.insert(image);
                }
                (SkipReason::DegenerateCamera, Some(reason))
            }
            Err(other) => return Err(other),
        };

        warn!(
            "Skipping frame {}: {:?}{}",
            input.frame,
            reason,
            detail.as_deref().map(|d| format!(" ({})", d)).unwrap_or_default()
        );
        report.detections_skipped += input.detections.len();
        report.skipped_frames.push(SkippedFrame {
            frame: input.frame.clone(),
            reason,
            detail,
        });
    }

    report.poses_without_detections = poses
        .image_names()
        .filter(|name| !used_images.contains(name))
        .count();

    let scene = aggregator.finish();
    info!(
        "Run complete: {}/{} frames, {} objects, {} unlocalized names, {}/{} detections",
        report.frames_localized,
        report.frames_total,
        scene.objects.len(),
        scene.unlocalized.len(),
        report.detections_localized,
        report.detections_total
    );

    Ok(RunOutput { scene, report })
}
