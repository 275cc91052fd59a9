//! `polyhedra` is a computational-geometry library for reading, transforming,
//! analyzing, and writing triangular polyhedral meshes.
//!
//! It provides:
//!
//! - vertex-deduplicating mesh assembly ([`mesh::indexed::IndexedMesh`])
//! - three-dimensional convex hull construction ([`hull`])
//! - planar slicing of a closed mesh into two closed halves ([`plane_cut`])
//! - approximate convex decomposition of non-convex meshes ([`convex_decomp`])
//! - quadric-error-metric mesh simplification ([`simplify`])
//! - 2D polygon triangulation of planar regions with holes ([`triangulate2d`])
//! - integral mass properties of closed meshes ([`mass_properties`])
//!
//! ## Usage
//!
//! ```
//! use polyhedra::primitives;
//! use polyhedra::hull;
//!
//! let cube = primitives::cube(1.0, 1.0, 1.0).unwrap();
//! let hull = hull::convex_hull_3d(&cube).unwrap();
//! assert_eq!(hull.num_vertices(), 8);
//! ```
//!
//! All four geometric kernels (hull, plane cut, triangulation, simplify)
//! share a small set of containers: [`containers::scalar_map::ScalarMap`],
//! [`containers::key_map::KeyMap`], [`containers::unique_queue::UniqueQueue`],
//! and [`mesh::bvh::VertexBvh`].

pub mod containers;
pub mod convex_decomp;
pub mod error;
pub mod hull;
pub mod io;
pub mod mass_properties;
pub mod mesh;
pub mod plane_cut;
pub mod primitives;
pub mod random;
pub mod simplify;
pub mod transform;
pub mod triangulate2d;

pub use error::{Error, Result};
pub use mesh::{HalfEdgeMesh, IndexedMesh, MeshList, PrimitiveKind, VertexBvh};
