//! The indexed-mesh representation and its derived views (§3).

pub mod bvh;
pub mod indexed;
pub mod vef;

pub use bvh::VertexBvh;
pub use indexed::{IndexedMesh, MeshList, PrimitiveKind};
pub use vef::HalfEdgeMesh;
