use seer_data::DataError;
use thiserror::Error;

/// Errors produced by the localization engine.
///
/// Only `InvalidMesh`, `InvalidConfig` and `Data` are fatal to a run; the
/// per-frame variants are isolated and recorded in the run report.
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("Degenerate camera: {0}")]
    DegenerateCamera(String),

    #[error("Invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("No camera pose for frame {0}")]
    MissingPose(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Data(#[from] DataError),
}
