//! Seer Locate Crate
//!
//! Geometric localization engine: places 2D detections on a reconstructed
//! surface mesh and consolidates them into scene objects across frames.
//!
//! ## Modules
//!
//! - [`camera`]: Pinhole unprojection of normalized box corners into world rays
//! - [`intersect`]: BVH-accelerated nearest-hit queries against the mesh
//! - [`localize`]: Per-frame corner casting
//! - [`aggregate`]: Cross-frame identity matching and material consolidation
//! - [`pipeline`]: Batch runs over a capture, with a diagnostic report

pub mod aggregate;
pub mod camera;
pub mod config;
pub mod detection;
mod error;
pub mod intersect;
pub mod localize;
pub mod pipeline;

pub use aggregate::{Aggregator, Scene, SceneObject, UnlocalizedObservation};
pub use camera::{CameraPose, Intrinsics, Ray, pixel_ray};
pub use config::{BoxPolicy, LocateConfig, MergeRadius};
pub use detection::{Detection, NormalizedBox, canonical_name};
pub use error::LocateError;
pub use intersect::{Aabb, MeshIntersector, RayHit};
pub use localize::{FrameLocalizer, LocalizedDetection, localize_frame};
pub use pipeline::{FrameInput, FramePose, PoseTable, RunOutput, RunReport, run_batch};
