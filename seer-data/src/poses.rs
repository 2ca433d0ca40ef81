//! Camera pose records produced by the reconstruction step.

use crate::DataError;
use glam::{DMat3, DVec3};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// One registered image: pinhole intrinsics plus world→camera extrinsics.
///
/// Values are taken verbatim from the pose source and are not validated here.
#[derive(Debug, Clone, PartialEq)]
pub struct PoseRecord {
    pub image_name: String,
    pub width: u32,
    pub height: u32,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
    /// World→camera rotation.
    pub rotation: DMat3,
    /// World→camera translation.
    pub translation: DVec3,
}

#[derive(Deserialize, Debug)]
struct JsonPose {
    width: u32,
    height: u32,
    fx: f64,
    fy: f64,
    cx: f64,
    cy: f64,
    /// Row-major 3x3.
    rotation: [[f64; 3]; 3],
    translation: [f64; 3],
}

impl JsonPose {
    fn into_record(self, image_name: String) -> PoseRecord {
        PoseRecord {
            image_name,
            width: self.width,
            height: self.height,
            fx: self.fx,
            fy: self.fy,
            cx: self.cx,
            cy: self.cy,
            // glam is column-major, the JSON rows become columns of the transpose.
            rotation: DMat3::from_cols_array_2d(&self.rotation).transpose(),
            translation: DVec3::from_array(self.translation),
        }
    }
}

/// Parse a JSON pose table keyed by image name.
pub fn parse_pose_table(text: &str) -> Result<Vec<PoseRecord>, DataError> {
    let table: BTreeMap<String, JsonPose> = serde_json::from_str(text)?;
    Ok(table
        .into_iter()
        .map(|(name, pose)| pose.into_record(name))
        .collect())
}

/// Load camera poses from a COLMAP text model directory or a JSON table.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_poses<P: AsRef<Path>>(path: P) -> Result<Vec<PoseRecord>, DataError> {
    let path = path.as_ref();
    let poses = if path.is_dir() {
        crate::colmap::load_colmap_text(path)?
    } else if path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
    {
        parse_pose_table(&std::fs::read_to_string(path)?)?
    } else {
        return Err(DataError::UnsupportedFormat(format!(
            "pose source '{}' (expected a COLMAP text model directory or a .json file)",
            path.display()
        )));
    };

    info!("Loaded {} camera poses", poses.len());
    Ok(poses)
}
