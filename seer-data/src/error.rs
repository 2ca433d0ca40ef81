use thiserror::Error;

/// Errors raised while reading meshes, poses or detector output.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PLY parsing error: {0}")]
    Ply(String),

    #[error("OBJ parsing error at line {line}: {message}")]
    Obj { line: usize, message: String },

    #[error("COLMAP {file} parsing error at line {line}: {message}")]
    Colmap {
        file: &'static str,
        line: usize,
        message: String,
    },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}
