//! Seer Data Crate
//!
//! Loading utilities for the inputs of the localization engine: triangle
//! meshes (PLY, OBJ), camera poses exported by the reconstruction step
//! (COLMAP text model, JSON table) and raw detector output (JSON).
//! This crate only parses; validation of geometry and camera parameters
//! happens in `seer-locate`.

pub mod colmap;
pub mod detections;
mod error;
pub mod mesh;
pub mod obj;
pub mod ply;
pub mod poses;

pub use detections::{DetectionRecord, FrameDetections, load_detections, parse_frame_detections};
pub use error::DataError;
pub use mesh::{TriangleMesh, load_mesh};
pub use poses::{PoseRecord, load_poses};
