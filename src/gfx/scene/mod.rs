//! # Scene Module
//!
//! Scene geometry as the passes see it: an ordered list of meshes, each split into
//! sub-meshes that reference materials.

pub mod mesh;
pub mod scene;
pub mod vertex;

// Re-export main types
pub use mesh::{Mesh, MeshData, SubMesh};
pub use scene::Scene;
pub use vertex::Vertex3D;
