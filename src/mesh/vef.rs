//! Derived vertex/edge/face (half-edge-like) view over a closed triangle
//! mesh (§3, §4.11). Built once from an [`IndexedMesh`](crate::mesh::IndexedMesh)
//! and owned independently of its source; consumed by [`crate::convex_decomp`]
//! for ray-distance queries against a convex hull.

use glam::{Vec2, Vec3};
use slotmap::{SlotMap, new_key_type};
use tracing::instrument;

use crate::error::{Error, Result};
use crate::mesh::indexed::{IndexedMesh, PrimitiveKind};

new_key_type! {
    pub struct VertexId;
    pub struct EdgeId;
    pub struct FaceId;
}

/// Cached dihedral-angle basis for an interior edge (§3).
#[derive(Clone, Copy, Debug)]
pub struct DihedralInfo {
    /// Unit vector along the edge, from `v0` to `v1`.
    pub x_vec: Vec3,
    /// Reference in-plane direction at angle zero, taken from the edge's
    /// first adjacent face (perpendicular to `x_vec`, pointing toward that
    /// face's opposite vertex).
    pub z_vec: Vec3,
    /// Dihedral angle, measured from `z_vec` around `x_vec` to the second
    /// face's corresponding direction, in `[0, 2*PI)`.
    pub ang: f32,
}

pub struct Vertex {
    pub position: Vec3,
    pub edges: Vec<EdgeId>,
}

pub struct Edge {
    pub v0: VertexId,
    pub v1: VertexId,
    pub faces: [Option<FaceId>; 2],
    pub dihedral: Option<DihedralInfo>,
}

impl Edge {
    pub fn other_vertex(&self, v: VertexId) -> VertexId {
        if self.v0 == v { self.v1 } else { self.v0 }
    }
}

/// Per-face 2D basis: `x_axis`/`y_axis` span the face plane, and `p1`/`p2`
/// are `v1`/`v2`'s coordinates relative to `v0` in that basis (§3).
#[derive(Clone, Copy, Debug)]
pub struct Face2DBasis {
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub p1: Vec2,
    pub p2: Vec2,
}

pub struct Face {
    pub v: [VertexId; 3],
    pub e: [EdgeId; 3],
    pub normal: Vec3,
    pub d: f32,
    pub basis2d: Face2DBasis,
}

impl Face {
    pub fn positions(&self, mesh: &HalfEdgeMesh) -> [Vec3; 3] {
        [
            mesh.vertices[self.v[0]].position,
            mesh.vertices[self.v[1]].position,
            mesh.vertices[self.v[2]].position,
        ]
    }

    pub fn area(&self, mesh: &HalfEdgeMesh) -> f32 {
        let [p0, p1, p2] = self.positions(mesh);
        0.5 * (p1 - p0).cross(p2 - p0).length()
    }
}

/// A derived vertex/edge/face view over a closed, 2-manifold triangle mesh.
pub struct HalfEdgeMesh {
    pub vertices: SlotMap<VertexId, Vertex>,
    pub edges: SlotMap<EdgeId, Edge>,
    pub faces: SlotMap<FaceId, Face>,
}

impl HalfEdgeMesh {
    /// Builds a `HalfEdgeMesh` from a triangle-kind [`IndexedMesh`]. Fails
    /// if any edge would be shared by more than two triangles (the mesh is
    /// assumed 2-manifold; §3 invariant).
    #[instrument(skip(mesh))]
    pub fn from_indexed_mesh(mesh: &IndexedMesh) -> Result<Self> {
        if mesh.primitive_kind() != PrimitiveKind::Triangle {
            return Err(Error::InvalidInput(
                "HalfEdgeMesh requires a triangle-kind mesh".into(),
            ));
        }
        if mesh.floats_per_vertex() < 3 {
            return Err(Error::InvalidInput(
                "HalfEdgeMesh requires floats_per_vertex >= 3".into(),
            ));
        }

        let mut vertices: SlotMap<VertexId, Vertex> = SlotMap::with_key();
        let mut edges: SlotMap<EdgeId, Edge> = SlotMap::with_key();
        let mut faces: SlotMap<FaceId, Face> = SlotMap::with_key();

        let mut vid_of: Vec<VertexId> = Vec::with_capacity(mesh.num_vertices());
        for i in 0..mesh.num_vertices() {
            let pos = mesh.position3(i as u32);
            vid_of.push(vertices.insert(Vertex {
                position: pos,
                edges: Vec::new(),
            }));
        }

        let mut edge_of: hashbrown::HashMap<(VertexId, VertexId), EdgeId> = hashbrown::HashMap::new();

        let mut get_or_insert_edge = |a: VertexId,
                                      b: VertexId,
                                      edges: &mut SlotMap<EdgeId, Edge>,
                                      vertices: &mut SlotMap<VertexId, Vertex>,
                                      edge_of: &mut hashbrown::HashMap<(VertexId, VertexId), EdgeId>| {
            let key = if a < b { (a, b) } else { (b, a) };
            *edge_of.entry(key).or_insert_with(|| {
                let id = edges.insert(Edge {
                    v0: a,
                    v1: b,
                    faces: [None, None],
                    dihedral: None,
                });
                vertices[a].edges.push(id);
                vertices[b].edges.push(id);
                id
            })
        };

        for tri in mesh.triangles()? {
            let va = vid_of[tri[0] as usize];
            let vb = vid_of[tri[1] as usize];
            let vc = vid_of[tri[2] as usize];

            let p0 = vertices[va].position;
            let p1 = vertices[vb].position;
            let p2 = vertices[vc].position;

            let raw_normal = (p1 - p0).cross(p2 - p0);
            let normal = raw_normal.normalize_or_zero();
            let d = normal.dot(p0);

            let x_axis = (p1 - p0).normalize_or_zero();
            let y_axis = normal.cross(x_axis).normalize_or_zero();
            let p1_2d = Vec2::new((p1 - p0).dot(x_axis), (p1 - p0).dot(y_axis));
            let p2_2d = Vec2::new((p2 - p0).dot(x_axis), (p2 - p0).dot(y_axis));

            let e_ab = get_or_insert_edge(va, vb, &mut edges, &mut vertices, &mut edge_of);
            let e_bc = get_or_insert_edge(vb, vc, &mut edges, &mut vertices, &mut edge_of);
            let e_ca = get_or_insert_edge(vc, va, &mut edges, &mut vertices, &mut edge_of);

            let face_id = faces.insert(Face {
                v: [va, vb, vc],
                e: [e_ab, e_bc, e_ca],
                normal,
                d,
                basis2d: Face2DBasis {
                    x_axis,
                    y_axis,
                    p1: p1_2d,
                    p2: p2_2d,
                },
            });

            for e in [e_ab, e_bc, e_ca] {
                let edge = &mut edges[e];
                if edge.faces[0].is_none() {
                    edge.faces[0] = Some(face_id);
                } else if edge.faces[1].is_none() {
                    edge.faces[1] = Some(face_id);
                } else {
                    return Err(Error::GeometryInconsistent(
                        "edge shared by more than two faces".into(),
                    ));
                }
            }
        }

        let mut out = Self {
            vertices,
            edges,
            faces,
        };
        out.compute_dihedrals();
        Ok(out)
    }

    /// Fills in [`DihedralInfo`] for every interior (two-face) edge.
    fn compute_dihedrals(&mut self) {
        let edge_ids: Vec<EdgeId> = self.edges.keys().collect();
        for eid in edge_ids {
            let (v0, v1, f0, f1) = {
                let e = &self.edges[eid];
                let (Some(f0), Some(f1)) = (e.faces[0], e.faces[1]) else {
                    continue;
                };
                (e.v0, e.v1, f0, f1)
            };

            let x_vec = (self.vertices[v1].position - self.vertices[v0].position).normalize_or_zero();
            let dir_of = |face_id: FaceId, mesh: &Self| -> Vec3 {
                let face = &mesh.faces[face_id];
                let opposite = face.v.iter().copied().find(|&v| v != v0 && v != v1).unwrap();
                let p_opp = mesh.vertices[opposite].position;
                let p0 = mesh.vertices[v0].position;
                let along = p_opp - p0;
                let perp = along - x_vec * along.dot(x_vec);
                perp.normalize_or_zero()
            };

            let z_vec = dir_of(f0, self);
            let dir_b = dir_of(f1, self);

            let cos_a = z_vec.dot(dir_b).clamp(-1.0, 1.0);
            let sin_a = x_vec.dot(z_vec.cross(dir_b));
            let mut ang = sin_a.atan2(cos_a);
            if ang < 0.0 {
                ang += std::f32::consts::TAU;
            }

            self.edges[eid].dihedral = Some(DihedralInfo { x_vec, z_vec, ang });
        }
    }

    /// Axis-aligned bounding-box diagonal, used to scale the tolerances in
    /// [`ConvexInteriorDist`](Self::convex_interior_dist)/
    /// [`ConvexRayDist`](Self::convex_ray_dist) (§4.11).
    pub fn aabb_diag(&self) -> f32 {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for v in self.vertices.values() {
            min = min.min(v.position);
            max = max.max(v.position);
        }
        (max - min).length()
    }

    /// `ConvexInteriorDist`: for a convex hull, the signed distance from
    /// `pt` to the nearest bounding plane — the minimum of `d_f - n_f*pt`
    /// over every face (§4.11). Returns `-INFINITY` if the mesh has no
    /// faces.
    #[instrument(skip(self))]
    pub fn convex_interior_dist(&self, pt: Vec3) -> f32 {
        if self.faces.is_empty() {
            return f32::NEG_INFINITY;
        }
        self.faces
            .values()
            .map(|f| f.d - f.normal.dot(pt))
            .fold(f32::INFINITY, f32::min)
    }

    /// `ConvexRayDist`: the ray-parameter `t` of the nearest intersection
    /// of the ray `pt + t*dir` (`t > 0`) with the convex polyhedron's
    /// boundary (§4.11, §GLOSSARY "ray distance"). Scans every face's
    /// plane and accepts the hit closest to the ray origin that falls
    /// inside the face's triangle (barycentric test in the face's 2D
    /// basis, within `tol`).
    #[instrument(skip(self))]
    pub fn convex_ray_dist(&self, pt: Vec3, dir: Vec3) -> Result<f32> {
        let tol = 2e-6 * self.aabb_diag().max(1e-12);
        let mut best: Option<f32> = None;

        for face in self.faces.values() {
            let denom = face.normal.dot(dir);
            if denom.abs() < 1e-12 {
                continue;
            }
            let t = (face.d - face.normal.dot(pt)) / denom;
            if t <= 1e-9 {
                continue;
            }
            if let Some(b) = best {
                if t >= b {
                    continue;
                }
            }

            let hit = pt + dir * t;
            let p0 = face.positions(self)[0];
            let local = Vec2::new(
                (hit - p0).dot(face.basis2d.x_axis),
                (hit - p0).dot(face.basis2d.y_axis),
            );
            if point_in_triangle(local, Vec2::ZERO, face.basis2d.p1, face.basis2d.p2, tol) {
                best = Some(t);
            }
        }

        best.ok_or_else(|| {
            Error::GeometryInconsistent("convex_ray_dist: ray did not hit the hull".into())
        })
    }
}

/// Barycentric-sign point-in-triangle test with a tolerance band on the
/// edges, so hits that land exactly on a shared edge are accepted by both
/// adjacent faces rather than neither.
fn point_in_triangle(p: Vec2, a: Vec2, b: Vec2, c: Vec2, tol: f32) -> bool {
    let d1 = edge_sign(p, a, b);
    let d2 = edge_sign(p, b, c);
    let d3 = edge_sign(p, c, a);

    let has_neg = d1 < -tol || d2 < -tol || d3 < -tol;
    let has_pos = d1 > tol || d2 > tol || d3 > tol;

    !(has_neg && has_pos)
}

fn edge_sign(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    (p.x - b.x) * (a.y - b.y) - (a.x - b.x) * (p.y - b.y)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::indexed::IndexedMesh;

    fn cube_mesh() -> IndexedMesh {
        // Unit cube via its 12-triangle convex hull, built directly for the test.
        let corners = [
            Vec3::new(-0.5, -0.5, -0.5),
            Vec3::new(0.5, -0.5, -0.5),
            Vec3::new(0.5, 0.5, -0.5),
            Vec3::new(-0.5, 0.5, -0.5),
            Vec3::new(-0.5, -0.5, 0.5),
            Vec3::new(0.5, -0.5, 0.5),
            Vec3::new(0.5, 0.5, 0.5),
            Vec3::new(-0.5, 0.5, 0.5),
        ];
        let mesh = crate::hull::convex_hull_3d_from_points(&corners).unwrap();
        mesh
    }

    #[test]
    fn builds_closed_manifold_from_hull() {
        let mesh = cube_mesh();
        let vef = HalfEdgeMesh::from_indexed_mesh(&mesh).unwrap();
        for edge in vef.edges.values() {
            assert!(edge.faces[0].is_some());
            assert!(edge.faces[1].is_some());
            assert!(edge.dihedral.is_some());
        }
    }

    #[test]
    fn interior_dist_is_positive_at_center() {
        let mesh = cube_mesh();
        let vef = HalfEdgeMesh::from_indexed_mesh(&mesh).unwrap();
        let dist = vef.convex_interior_dist(Vec3::ZERO);
        assert!(dist > 0.0);
        assert!((dist - 0.5).abs() < 1e-4);
    }

    #[test]
    fn ray_dist_from_center_along_axis() {
        let mesh = cube_mesh();
        let vef = HalfEdgeMesh::from_indexed_mesh(&mesh).unwrap();
        let t = vef.convex_ray_dist(Vec3::ZERO, Vec3::X).unwrap();
        assert!((t - 0.5).abs() < 1e-3);
    }
}
