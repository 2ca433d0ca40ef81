//! Triangle soup representation shared by the mesh loaders.

use crate::DataError;
use glam::DVec3;
use std::path::Path;
use tracing::info;

/// A triangle soup: vertex positions plus index triples into them.
///
/// Loaders do not validate indices or coordinates; the intersector does.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    /// Vertex positions in world space.
    pub vertices: Vec<DVec3>,
    /// Triangles as indices into `vertices`.
    pub triangles: Vec<[u32; 3]>,
}

impl TriangleMesh {
    /// Create a mesh from vertices and triangle indices.
    pub fn new(vertices: Vec<DVec3>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            triangles,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Axis-aligned bounds `(min, max)` over all vertices, `None` if empty.
    pub fn bounds(&self) -> Option<(DVec3, DVec3)> {
        let first = *self.vertices.first()?;
        Some(
            self.vertices
                .iter()
                .fold((first, first), |(min, max), v| (min.min(*v), max.max(*v))),
        )
    }
}

/// Split a polygon into triangles around its first vertex.
///
/// Returns nothing for polygons with fewer than three corners.
pub(crate) fn fan_triangulate(polygon: &[u32]) -> impl Iterator<Item = [u32; 3]> + '_ {
    let rest = polygon.get(1..).unwrap_or(&[]);
    rest.windows(2)
        .map(move |pair| [polygon[0], pair[0], pair[1]])
}

/// Load a triangle mesh, choosing the parser from the file extension.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_mesh<P: AsRef<Path>>(path: P) -> Result<TriangleMesh, DataError> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let mesh = match extension.as_str() {
        "ply" => crate::ply::load_mesh_from_ply(path)?,
        "obj" => crate::obj::load_mesh_from_obj(path)?,
        other => {
            return Err(DataError::UnsupportedFormat(format!(
                "mesh extension '{}' (expected .ply or .obj)",
                other
            )));
        }
    };

    info!(
        "Mesh loaded: {} vertices, {} triangles",
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_empty_mesh() {
        let mesh = TriangleMesh::default();
        assert!(mesh.bounds().is_none());
    }

    #[test]
    fn test_bounds() {
        let mesh = TriangleMesh::new(
            vec![
                DVec3::new(-1.0, 0.0, 2.0),
                DVec3::new(3.0, -2.0, 0.5),
                DVec3::new(0.0, 4.0, 1.0),
            ],
            vec![[0, 1, 2]],
        );
        let (min, max) = mesh.bounds().unwrap();
        assert_eq!(min, DVec3::new(-1.0, -2.0, 0.5));
        assert_eq!(max, DVec3::new(3.0, 4.0, 2.0));
    }

    #[test]
    fn test_fan_triangulate_quad() {
        let tris: Vec<_> = fan_triangulate(&[4, 5, 6, 7]).collect();
        assert_eq!(tris, vec![[4, 5, 6], [4, 6, 7]]);
    }

    #[test]
    fn test_fan_triangulate_degenerate() {
        assert_eq!(fan_triangulate(&[1, 2]).count(), 0);
        assert_eq!(fan_triangulate(&[]).count(), 0);
    }

    #[test]
    fn test_load_mesh_unsupported_extension() {
        let err = load_mesh("room.usdz").unwrap_err();
        assert!(matches!(err, DataError::UnsupportedFormat(_)));
    }
}
