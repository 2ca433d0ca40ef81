//! Ray/triangle intersection (Möller–Trumbore).

use crate::camera::Ray;
use glam::DVec3;

/// Rays within this of parallel to the triangle plane never hit.
const PARALLEL_EPSILON: f64 = 1e-12;

/// Slack on barycentric bounds so rays through shared edges are not lost.
const EDGE_EPSILON: f64 = 1e-12;

/// Hits closer than this to the origin are ignored (origin on the surface).
pub(crate) const MIN_HIT_DISTANCE: f64 = 1e-9;

/// A mesh triangle in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Triangle {
    pub v0: DVec3,
    pub v1: DVec3,
    pub v2: DVec3,
}

impl Triangle {
    pub fn centroid(&self) -> DVec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }

    /// Distance along `ray` to the triangle, if it lies in
    /// `(MIN_HIT_DISTANCE, t_max)`. Both faces count.
    pub fn intersect(&self, ray: &Ray, t_max: f64) -> Option<f64> {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        let h = ray.direction.cross(edge2);
        let a = edge1.dot(h);

        if a.abs() < PARALLEL_EPSILON {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin - self.v0;
        let u = f * s.dot(h);
        if !(-EDGE_EPSILON..=1.0 + EDGE_EPSILON).contains(&u) {
            return None;
        }

        let q = s.cross(edge1);
        let v = f * ray.direction.dot(q);
        if v < -EDGE_EPSILON || u + v > 1.0 + EDGE_EPSILON {
            return None;
        }

        let t = f * edge2.dot(q);
        (t > MIN_HIT_DISTANCE && t < t_max).then_some(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle_at(z: f64) -> Triangle {
        Triangle {
            v0: DVec3::new(0.0, 0.0, z),
            v1: DVec3::new(1.0, 0.0, z),
            v2: DVec3::new(0.0, 1.0, z),
        }
    }

    fn ray(origin: DVec3, direction: DVec3) -> Ray {
        Ray::new(origin, direction).unwrap()
    }

    #[test]
    fn test_front_hit() {
        let tri = unit_triangle_at(2.0);
        let t = tri
            .intersect(&ray(DVec3::new(0.25, 0.25, 0.0), DVec3::Z), f64::INFINITY)
            .unwrap();
        assert!((t - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_back_face_hit() {
        let tri = unit_triangle_at(2.0);
        let t = tri
            .intersect(&ray(DVec3::new(0.25, 0.25, 5.0), -DVec3::Z), f64::INFINITY)
            .unwrap();
        assert!((t - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_behind_origin_is_miss() {
        let tri = unit_triangle_at(-2.0);
        assert!(tri
            .intersect(&ray(DVec3::new(0.25, 0.25, 0.0), DVec3::Z), f64::INFINITY)
            .is_none());
    }

    #[test]
    fn test_outside_triangle_is_miss() {
        let tri = unit_triangle_at(2.0);
        assert!(tri
            .intersect(&ray(DVec3::new(0.8, 0.8, 0.0), DVec3::Z), f64::INFINITY)
            .is_none());
    }

    #[test]
    fn test_parallel_is_miss() {
        let tri = unit_triangle_at(2.0);
        assert!(tri
            .intersect(&ray(DVec3::new(0.0, 0.0, 1.0), DVec3::X), f64::INFINITY)
            .is_none());
    }

    #[test]
    fn test_beyond_t_max_is_miss() {
        let tri = unit_triangle_at(2.0);
        assert!(tri
            .intersect(&ray(DVec3::new(0.25, 0.25, 0.0), DVec3::Z), 1.5)
            .is_none());
    }

    #[test]
    fn test_origin_on_surface_is_miss() {
        let tri = unit_triangle_at(0.0);
        assert!(tri
            .intersect(&ray(DVec3::new(0.25, 0.25, 0.0), DVec3::Z), f64::INFINITY)
            .is_none());
    }
}
