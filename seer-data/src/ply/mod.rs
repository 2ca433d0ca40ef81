//! PLY mesh loading

mod loader;

pub use loader::load_mesh_from_ply;
