//! Pinhole camera model: turns normalized box corners into world-space rays.

use crate::LocateError;
use crate::detection::NormalizedBox;
use glam::{DMat3, DVec2, DVec3};
use seer_data::PoseRecord;

/// Tolerance on `RᵀR = I` and `det R = 1`.
const ORTHONORMAL_TOLERANCE: f64 = 1e-4;

/// Directions shorter than this before normalization are degenerate.
const MIN_DIRECTION_NORM: f64 = 1e-12;

/// Pinhole intrinsics (the entries of K).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Intrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Self {
        Self { fx, fy, cx, cy }
    }

    /// The intrinsic matrix K.
    pub fn matrix(&self) -> DMat3 {
        DMat3::from_cols(
            DVec3::new(self.fx, 0.0, 0.0),
            DVec3::new(0.0, self.fy, 0.0),
            DVec3::new(self.cx, self.cy, 1.0),
        )
    }

    /// K⁻¹, or `DegenerateCamera` if K is singular or not finite.
    pub fn inverse(&self) -> Result<DMat3, LocateError> {
        let k = self.matrix();
        if !k.is_finite() {
            return Err(LocateError::DegenerateCamera(format!(
                "non-finite intrinsics {:?}",
                self
            )));
        }
        if self.fx.abs() < f64::EPSILON || self.fy.abs() < f64::EPSILON {
            return Err(LocateError::DegenerateCamera(format!(
                "focal length is zero (fx = {}, fy = {})",
                self.fx, self.fy
            )));
        }
        Ok(k.inverse())
    }
}

/// A half-line in world space. `direction` is unit length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Ray {
    /// Create a ray, normalizing `direction`. Returns `None` for a
    /// zero-length or non-finite direction.
    pub fn new(origin: DVec3, direction: DVec3) -> Option<Self> {
        let direction = direction.try_normalize()?;
        Some(Self { origin, direction })
    }

    /// Point at distance `t` along the ray.
    pub fn at(&self, t: f64) -> DVec3 {
        self.origin + self.direction * t
    }
}

/// Intrinsics plus world→camera extrinsics of one registered frame.
///
/// Construction validates the rotation and intrinsics, so every
/// `CameraPose` can produce rays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    intrinsics: Intrinsics,
    rotation: DMat3,
    translation: DVec3,
    k_inv: DMat3,
}

impl CameraPose {
    /// Validate and build a pose.
    ///
    /// Fails with `DegenerateCamera` if K is not invertible, any entry is
    /// non-finite, or R is not a proper rotation.
    pub fn new(
        intrinsics: Intrinsics,
        rotation: DMat3,
        translation: DVec3,
    ) -> Result<Self, LocateError> {
        let k_inv = intrinsics.inverse()?;

        if !rotation.is_finite() || !translation.is_finite() {
            return Err(LocateError::DegenerateCamera(
                "non-finite rotation or translation".into(),
            ));
        }
        let gram = rotation.transpose() * rotation;
        if !gram.abs_diff_eq(DMat3::IDENTITY, ORTHONORMAL_TOLERANCE) {
            return Err(LocateError::DegenerateCamera(
                "rotation is not orthonormal".into(),
            ));
        }
        let det = rotation.determinant();
        if (det - 1.0).abs() > ORTHONORMAL_TOLERANCE {
            return Err(LocateError::DegenerateCamera(format!(
                "rotation determinant is {} (expected +1)",
                det
            )));
        }

        Ok(Self {
            intrinsics,
            rotation,
            translation,
            k_inv,
        })
    }

    /// Build a pose from a raw pose-source record.
    pub fn from_record(record: &PoseRecord) -> Result<Self, LocateError> {
        Self::new(
            Intrinsics::new(record.fx, record.fy, record.cx, record.cy),
            record.rotation,
            record.translation,
        )
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    /// World→camera rotation.
    pub fn rotation(&self) -> DMat3 {
        self.rotation
    }

    /// World→camera translation.
    pub fn translation(&self) -> DVec3 {
        self.translation
    }

    /// Camera center in world space, `-Rᵗ·t`.
    pub fn center(&self) -> DVec3 {
        -(self.rotation.transpose() * self.translation)
    }

    fn world_direction(
        &self,
        corner: DVec2,
        width: u32,
        height: u32,
    ) -> Result<DVec3, LocateError> {
        let pixel = DVec3::new(corner.x * width as f64, corner.y * height as f64, 1.0);

        let camera_dir = self.k_inv * pixel;
        let camera_dir = normalize_checked(camera_dir, "camera-space")?;
        let world_dir = self.rotation.transpose() * camera_dir;
        normalize_checked(world_dir, "world-space")
    }

    /// Ray through a normalized image point for an image of `width`×`height` pixels.
    pub fn pixel_ray(&self, corner: DVec2, width: u32, height: u32) -> Result<Ray, LocateError> {
        Ok(Ray {
            origin: self.center(),
            direction: self.world_direction(corner, width, height)?,
        })
    }

    /// Rays through the four corners of a box, sharing one origin.
    pub fn corner_rays(
        &self,
        bbox: &NormalizedBox,
        width: u32,
        height: u32,
    ) -> Result<[Ray; 4], LocateError> {
        let origin = self.center();
        let mut rays = [Ray {
            origin,
            direction: DVec3::Z,
        }; 4];
        for (ray, corner) in rays.iter_mut().zip(bbox.corners()) {
            ray.direction = self.world_direction(*corner, width, height)?;
        }
        Ok(rays)
    }
}

fn normalize_checked(v: DVec3, frame: &str) -> Result<DVec3, LocateError> {
    let norm = v.length();
    if !norm.is_finite() || norm < MIN_DIRECTION_NORM {
        return Err(LocateError::DegenerateCamera(format!(
            "{} ray direction has norm {}",
            frame, norm
        )));
    }
    Ok(v / norm)
}

/// Unproject one normalized corner given raw K, R and t.
///
/// Equivalent to building a [`CameraPose`] and calling
/// [`CameraPose::pixel_ray`], including its validation.
pub fn pixel_ray(
    corner: DVec2,
    intrinsics: &Intrinsics,
    rotation: DMat3,
    translation: DVec3,
    width: u32,
    height: u32,
) -> Result<Ray, LocateError> {
    CameraPose::new(*intrinsics, rotation, translation)?.pixel_ray(corner, width, height)
}
