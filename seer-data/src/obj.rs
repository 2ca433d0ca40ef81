//! Wavefront OBJ mesh loading.
//!
//! Only geometry is read: `v` positions and `f` faces. Texture
//! coordinates, normals, groups and material libraries are ignored, since
//! the intersector only needs the surface.

use crate::DataError;
use crate::mesh::{TriangleMesh, fan_triangulate};
use glam::DVec3;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Load a triangle mesh from an OBJ file.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_mesh_from_obj<P: AsRef<Path>>(path: P) -> Result<TriangleMesh, DataError> {
    let file = File::open(path.as_ref())?;
    parse_obj(BufReader::new(file))
}

/// Parse OBJ text from any buffered reader.
pub fn parse_obj<R: BufRead>(reader: R) -> Result<TriangleMesh, DataError> {
    let mut vertices: Vec<DVec3> = Vec::new();
    let mut triangles: Vec<[u32; 3]> = Vec::new();
    let mut polygon: Vec<u32> = Vec::new();

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = number + 1;
        let mut tokens = line.split_whitespace();

        match tokens.next() {
            Some("v") => {
                let coords: Vec<f64> = tokens
                    .take(3)
                    .map(|t| t.parse::<f64>())
                    .collect::<Result<_, _>>()
                    .map_err(|e| obj_error(line_no, format!("invalid vertex coordinate: {}", e)))?;
                if coords.len() != 3 {
                    return Err(obj_error(line_no, "vertex needs three coordinates"));
                }
                vertices.push(DVec3::new(coords[0], coords[1], coords[2]));
            }
            Some("f") => {
                polygon.clear();
                for token in tokens {
                    polygon.push(resolve_index(token, vertices.len(), line_no)?);
                }
                if polygon.len() < 3 {
                    return Err(obj_error(line_no, "face needs at least three vertices"));
                }
                triangles.extend(fan_triangulate(&polygon));
            }
            _ => {}
        }
    }

    debug!(
        "Parsed OBJ: {} vertices, {} triangles",
        vertices.len(),
        triangles.len()
    );
    Ok(TriangleMesh::new(vertices, triangles))
}

/// Resolve a face reference (`i`, `i/t`, `i//n`, `i/t/n`) to a 0-based index.
///
/// Negative references count back from the most recent vertex.
fn resolve_index(token: &str, vertex_count: usize, line_no: usize) -> Result<u32, DataError> {
    let position = token.split('/').next().unwrap_or(token);
    let raw: i64 = position
        .parse()
        .map_err(|_| obj_error(line_no, format!("invalid face index '{}'", token)))?;

    let resolved = match raw {
        0 => None,
        i if i > 0 => Some(i - 1),
        i => Some(vertex_count as i64 + i),
    };

    resolved
        .filter(|&i| i >= 0)
        .and_then(|i| u32::try_from(i).ok())
        .ok_or_else(|| obj_error(line_no, format!("face index '{}' out of range", token)))
}

fn obj_error(line: usize, message: impl Into<String>) -> DataError {
    DataError::Obj {
        line,
        message: message.into(),
    }
}
