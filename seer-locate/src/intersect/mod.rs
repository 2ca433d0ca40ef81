//! Nearest-hit ray queries against the reconstructed surface mesh.
//!
//! [`MeshIntersector`] validates a [`TriangleMesh`] once and builds a BVH
//! over it. After `build` it is immutable, so it is `Send + Sync` and can
//! be shared by reference across rayon workers.

mod bvh;
mod triangle;

pub use bvh::Aabb;

use crate::LocateError;
use crate::camera::Ray;
use bvh::Bvh;
use glam::DVec3;
use seer_data::TriangleMesh;
use tracing::info;
use triangle::Triangle;

/// Result of casting one ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RayHit {
    /// Closest positive-distance surface point.
    Hit {
        point: DVec3,
        distance: f64,
        /// Index of the triangle in the source mesh.
        triangle: usize,
    },
    /// No surface crossed within range.
    Miss,
}

impl RayHit {
    pub fn point(&self) -> Option<DVec3> {
        match self {
            RayHit::Hit { point, .. } => Some(*point),
            RayHit::Miss => None,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, RayHit::Hit { .. })
    }
}

/// Acceleration structure over a fixed triangle mesh.
#[derive(Debug)]
pub struct MeshIntersector {
    bvh: Bvh,
}

impl MeshIntersector {
    /// Validate `mesh` and build the BVH.
    ///
    /// Fails with `InvalidMesh` when the mesh has no triangles, a vertex
    /// coordinate is not finite, or a triangle indexes a missing vertex.
    #[tracing::instrument(skip_all, fields(triangles = mesh.triangle_count()))]
    pub fn build(mesh: &TriangleMesh) -> Result<Self, LocateError> {
        if mesh.triangles.is_empty() {
            return Err(LocateError::InvalidMesh("mesh has no triangles".into()));
        }
        if let Some(i) = mesh.vertices.iter().position(|v| !v.is_finite()) {
            return Err(LocateError::InvalidMesh(format!(
                "vertex {} has non-finite coordinates {:?}",
                i, mesh.vertices[i]
            )));
        }

        let vertex = |tri: usize, index: u32| {
            mesh.vertices.get(index as usize).copied().ok_or_else(|| {
                LocateError::InvalidMesh(format!(
                    "triangle {} references vertex {} but the mesh has {}",
                    tri,
                    index,
                    mesh.vertices.len()
                ))
            })
        };
        let triangles = mesh
            .triangles
            .iter()
            .enumerate()
            .map(|(i, [a, b, c])| -> Result<Triangle, LocateError> {
                Ok(Triangle {
                    v0: vertex(i, *a)?,
                    v1: vertex(i, *b)?,
                    v2: vertex(i, *c)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let bvh = Bvh::build(triangles);
        info!(
            "BVH built: {} nodes, depth {}",
            bvh.node_count(),
            bvh.depth()
        );
        Ok(Self { bvh })
    }

    /// Bounds of the whole mesh.
    pub fn bounds(&self) -> Aabb {
        self.bvh.bounds()
    }

    /// Length of the mesh bounding-box diagonal.
    pub fn diagonal(&self) -> f64 {
        self.bounds().diagonal()
    }

    /// First surface point hit by `ray`, or `Miss`.
    pub fn cast(&self, ray: &Ray) -> RayHit {
        self.cast_within(ray, f64::INFINITY)
    }

    /// Like [`cast`](Self::cast), treating hits at or beyond `max_distance` as misses.
    pub fn cast_within(&self, ray: &Ray, max_distance: f64) -> RayHit {
        match self.bvh.closest_hit(ray, max_distance) {
            Some(hit) => RayHit::Hit {
                point: ray.at(hit.distance),
                distance: hit.distance,
                triangle: hit.triangle,
            },
            None => RayHit::Miss,
        }
    }

    /// Cast a batch of rays.
    pub fn cast_many(&self, rays: &[Ray]) -> Vec<RayHit> {
        rays.iter().map(|ray| self.cast(ray)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Axis-aligned quad spanning [-1, 1]² at depth `z`.
    fn quad_at(z: f64) -> TriangleMesh {
        TriangleMesh::new(
            vec![
                DVec3::new(-1.0, -1.0, z),
                DVec3::new(1.0, -1.0, z),
                DVec3::new(1.0, 1.0, z),
                DVec3::new(-1.0, 1.0, z),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    #[test]
    fn test_hit_known_point() {
        let intersector = MeshIntersector::build(&quad_at(2.0)).unwrap();
        let target = DVec3::new(0.3, -0.4, 2.0);
        let ray = Ray::new(DVec3::ZERO, target).unwrap();
        let point = intersector.cast(&ray).point().unwrap();
        assert!((point - target).length() < 1e-12);
    }

    #[test]
    fn test_ray_away_from_geometry_misses() {
        let intersector = MeshIntersector::build(&quad_at(2.0)).unwrap();
        let ray = Ray::new(DVec3::ZERO, -DVec3::Z).unwrap();
        assert_eq!(intersector.cast(&ray), RayHit::Miss);
        let sideways = Ray::new(DVec3::ZERO, DVec3::new(5.0, 0.0, 1.0)).unwrap();
        assert_eq!(intersector.cast(&sideways), RayHit::Miss);
    }

    #[test]
    fn test_nearest_of_two_layers() {
        let mut mesh = quad_at(5.0);
        let near = quad_at(2.0);
        let base = mesh.vertices.len() as u32;
        mesh.vertices.extend(near.vertices);
        mesh.triangles.extend(
            near.triangles
                .iter()
                .map(|&[a, b, c]| [a + base, b + base, c + base]),
        );

        let intersector = MeshIntersector::build(&mesh).unwrap();
        match intersector.cast(&Ray::new(DVec3::ZERO, DVec3::Z).unwrap()) {
            RayHit::Hit { distance, triangle, .. } => {
                assert!((distance - 2.0).abs() < 1e-12);
                assert!(triangle >= 2);
            }
            RayHit::Miss => panic!("expected a hit"),
        }
    }

    #[test]
    fn test_cast_within_limit() {
        let intersector = MeshIntersector::build(&quad_at(2.0)).unwrap();
        let ray = Ray::new(DVec3::ZERO, DVec3::Z).unwrap();
        assert_eq!(intersector.cast_within(&ray, 1.0), RayHit::Miss);
        assert!(intersector.cast_within(&ray, 3.0).is_hit());
    }

    #[test]
    fn test_cast_many_preserves_order() {
        let intersector = MeshIntersector::build(&quad_at(2.0)).unwrap();
        let rays = [
            Ray::new(DVec3::ZERO, DVec3::Z).unwrap(),
            Ray::new(DVec3::ZERO, -DVec3::Z).unwrap(),
        ];
        let hits = intersector.cast_many(&rays);
        assert!(hits[0].is_hit());
        assert!(!hits[1].is_hit());
    }

    #[test]
    fn test_invalid_meshes_rejected() {
        let empty = TriangleMesh::new(vec![DVec3::ZERO], vec![]);
        assert!(matches!(
            MeshIntersector::build(&empty),
            Err(LocateError::InvalidMesh(_))
        ));

        let mut non_finite = quad_at(2.0);
        non_finite.vertices[1].y = f64::NAN;
        assert!(MeshIntersector::build(&non_finite).is_err());

        let mut dangling = quad_at(2.0);
        dangling.triangles.push([0, 1, 9]);
        assert!(MeshIntersector::build(&dangling).is_err());
    }

    #[test]
    fn test_bounds_and_diagonal() {
        let intersector = MeshIntersector::build(&quad_at(2.0)).unwrap();
        let bounds = intersector.bounds();
        assert_eq!(bounds.min, DVec3::new(-1.0, -1.0, 2.0));
        assert_eq!(bounds.max, DVec3::new(1.0, 1.0, 2.0));
        assert!((intersector.diagonal() - 8.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_intersector_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MeshIntersector>();
    }
}
