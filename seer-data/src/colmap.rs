//! Reader for the COLMAP text model export (`cameras.txt` + `images.txt`).
//!
//! Only the pinhole part of each camera model is used. Distortion
//! coefficients are parsed past but ignored.

use crate::DataError;
use crate::poses::PoseRecord;
use glam::{DMat3, DQuat, DVec3};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Pinhole part of a COLMAP camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColmapCamera {
    pub width: u32,
    pub height: u32,
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

/// Parse `cameras.txt` into a map from camera id to intrinsics.
pub fn parse_cameras(text: &str) -> Result<HashMap<u32, ColmapCamera>, DataError> {
    let mut cameras = HashMap::new();

    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let err = |message: String| DataError::Colmap {
            file: "cameras.txt",
            line: number + 1,
            message,
        };

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            return Err(err("expected CAMERA_ID MODEL WIDTH HEIGHT PARAMS[]".into()));
        }
        let id: u32 = fields[0].parse().map_err(|_| err("invalid camera id".into()))?;
        let model = fields[1];
        let width: u32 = fields[2].parse().map_err(|_| err("invalid width".into()))?;
        let height: u32 = fields[3].parse().map_err(|_| err("invalid height".into()))?;
        let params: Vec<f64> = fields[4..]
            .iter()
            .map(|p| p.parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| err(format!("invalid parameter: {}", e)))?;

        let (fx, fy, cx, cy) = match model {
            "SIMPLE_PINHOLE" | "SIMPLE_RADIAL" | "RADIAL" | "SIMPLE_RADIAL_FISHEYE"
            | "RADIAL_FISHEYE" => {
                let [f, cx, cy] = take_params::<3>(&params)
                    .ok_or_else(|| err(format!("{} needs f, cx, cy", model)))?;
                (f, f, cx, cy)
            }
            "PINHOLE" | "OPENCV" | "FULL_OPENCV" | "OPENCV_FISHEYE" | "FOV"
            | "THIN_PRISM_FISHEYE" => {
                let [fx, fy, cx, cy] = take_params::<4>(&params)
                    .ok_or_else(|| err(format!("{} needs fx, fy, cx, cy", model)))?;
                (fx, fy, cx, cy)
            }
            other => return Err(err(format!("unsupported camera model '{}'", other))),
        };

        cameras.insert(
            id,
            ColmapCamera {
                width,
                height,
                fx,
                fy,
                cx,
                cy,
            },
        );
    }

    Ok(cameras)
}

fn take_params<const N: usize>(params: &[f64]) -> Option<[f64; N]> {
    params.get(..N)?.try_into().ok()
}

/// Parse `images.txt`, resolving each image's camera from `cameras`.
///
/// Images referencing an unknown camera are skipped with a warning.
pub fn parse_images(
    text: &str,
    cameras: &HashMap<u32, ColmapCamera>,
) -> Result<Vec<PoseRecord>, DataError> {
    let mut poses = Vec::new();
    let mut lines = text.lines().enumerate();

    while let Some((number, line)) = lines.next() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let err = |message: String| DataError::Colmap {
            file: "images.txt",
            line: number + 1,
            message,
        };

        // IMAGE_ID QW QX QY QZ TX TY TZ CAMERA_ID NAME
        let fields: Vec<&str> = line.splitn(10, char::is_whitespace).collect();
        if fields.len() < 10 {
            return Err(err("expected IMAGE_ID QW QX QY QZ TX TY TZ CAMERA_ID NAME".into()));
        }
        let numbers: Vec<f64> = fields[1..8]
            .iter()
            .map(|f| f.parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|e| err(format!("invalid pose value: {}", e)))?;
        let camera_id: u32 = fields[8].parse().map_err(|_| err("invalid camera id".into()))?;
        let name = fields[9].trim().to_string();

        // The POINTS2D line always follows, even when empty.
        lines.next();

        let Some(camera) = cameras.get(&camera_id) else {
            warn!("Image {} references unknown camera {}, skipping", name, camera_id);
            continue;
        };

        let (qw, qx, qy, qz) = (numbers[0], numbers[1], numbers[2], numbers[3]);
        let rotation = DMat3::from_quat(DQuat::from_xyzw(qx, qy, qz, qw).normalize());
        let translation = DVec3::new(numbers[4], numbers[5], numbers[6]);

        poses.push(PoseRecord {
            image_name: name,
            width: camera.width,
            height: camera.height,
            fx: camera.fx,
            fy: camera.fy,
            cx: camera.cx,
            cy: camera.cy,
            rotation,
            translation,
        });
    }

    Ok(poses)
}

/// Load poses from a directory containing `cameras.txt` and `images.txt`.
pub fn load_colmap_text<P: AsRef<Path>>(dir: P) -> Result<Vec<PoseRecord>, DataError> {
    let dir = dir.as_ref();
    let cameras = parse_cameras(&std::fs::read_to_string(dir.join("cameras.txt"))?)?;
    let poses = parse_images(&std::fs::read_to_string(dir.join("images.txt"))?, &cameras)?;
    debug!(
        "COLMAP model: {} cameras, {} registered images",
        cameras.len(),
        poses.len()
    );
    Ok(poses)
}
