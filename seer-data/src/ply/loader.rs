//! PLY file loading functions

use crate::DataError;
use crate::mesh::{TriangleMesh, fan_triangulate};
use glam::DVec3;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info, warn};

// Face structure for PLY files
#[derive(Deserialize, Debug)]
struct PlyFace {
    #[serde(alias = "vertex_index")]
    vertex_indices: Vec<i64>,
}

// PLY file structure
#[derive(Deserialize, Debug)]
struct PlyFile {
    #[serde(rename = "vertex")]
    vertex: Vec<HashMap<String, JsonValue>>,
    #[serde(default, rename = "face")]
    face: Vec<PlyFace>,
}

fn get_f64(prop: Option<&JsonValue>) -> Option<f64> {
    prop.and_then(|v| match v {
        JsonValue::Number(n) => n.as_f64(),
        _ => None,
    })
}

/// Convert PLY face index lists into triangles.
///
/// Polygons are fan-triangulated. Faces with fewer than three corners or
/// with negative indices are dropped; the number dropped is returned.
fn faces_to_triangles<'a, I>(faces: I) -> (Vec<[u32; 3]>, usize)
where
    I: IntoIterator<Item = &'a [i64]>,
{
    let mut triangles = Vec::new();
    let mut skipped = 0;

    for indices in faces {
        let polygon: Option<Vec<u32>> = indices.iter().map(|&i| u32::try_from(i).ok()).collect();
        match polygon {
            Some(polygon) if polygon.len() >= 3 => triangles.extend(fan_triangulate(&polygon)),
            _ => skipped += 1,
        }
    }

    (triangles, skipped)
}

/// Load a triangle mesh (vertex positions and faces) from a PLY file.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_mesh_from_ply<P: AsRef<Path>>(path: P) -> Result<TriangleMesh, DataError> {
    debug!("Loading PLY mesh from: {}", path.as_ref().display());
    let file = File::open(path.as_ref())?;
    let reader = BufReader::new(file);

    let ply_data: PlyFile = serde_ply::from_reader(reader).map_err(|e| {
        warn!("Failed to parse PLY file: {}", e);
        DataError::Ply(e.to_string())
    })?;

    info!(
        "PLY file parsed: {} vertices, {} faces",
        ply_data.vertex.len(),
        ply_data.face.len()
    );

    let mut vertices = Vec::with_capacity(ply_data.vertex.len());
    for (i, vertex) in ply_data.vertex.iter().enumerate() {
        let coord = |name: &str| {
            get_f64(vertex.get(name))
                .ok_or_else(|| DataError::Ply(format!("Missing '{}' at vertex {}", name, i)))
        };
        vertices.push(DVec3::new(coord("x")?, coord("y")?, coord("z")?));
    }

    if ply_data.face.is_empty() {
        warn!("PLY file has no faces; a point cloud cannot be used as a surface");
    }
    let (triangles, skipped) =
        faces_to_triangles(ply_data.face.iter().map(|f| f.vertex_indices.as_slice()));
    if skipped > 0 {
        warn!("Skipped {} degenerate PLY faces", skipped);
    }

    Ok(TriangleMesh::new(vertices, triangles))
}
