//! Quadric-error-metric mesh simplification (§4.8), after Garland and
//! Heckbert's "Surface Simplification Using Quadric Error Metrics", as
//! implemented by `lib/simplify.c`.
//!
//! Vertices and faces live in [`slotmap`] arenas (`VId`/`FId`) rather than
//! the original's hash-keyed heap allocations; the candidate-pair ranking
//! that C expresses with an `ftree` keyed by cost is a [`ScalarMap`] here,
//! exactly as `triangulate2d`'s sweep status uses it for a drifting key.

use glam::Vec3;
use hashbrown::HashMap;
use slotmap::{SlotMap, new_key_type};
use tracing::{instrument, warn};

use crate::containers::scalar_map::{NodeId, ScalarMap};
use crate::error::{Error, Result};
use crate::mesh::bvh::VertexBvh;
use crate::mesh::indexed::{IndexedMesh, PrimitiveKind};

new_key_type! {
    struct VId;
    struct FId;
}

/// Upper-triangular quadric `[aa, ab, ac, ad, bb, bc, bd, cc, cd, dd]`,
/// accumulated in `f64` for conditioning across many face contributions.
#[derive(Clone, Copy)]
struct Quadric([f64; 10]);

impl Quadric {
    const ZERO: Quadric = Quadric([0.0; 10]);

    fn from_face(p0: Vec3, p1: Vec3, p2: Vec3) -> Quadric {
        let normal = (p1 - p0).cross(p2 - p1).normalize_or_zero();
        let (a, b, c) = (normal.x as f64, normal.y as f64, normal.z as f64);
        let d = -(normal.dot(p0) as f64);
        Quadric([
            a * a,
            a * b,
            a * c,
            a * d,
            b * b,
            b * c,
            b * d,
            c * c,
            c * d,
            d * d,
        ])
    }

    fn add(&self, other: &Quadric) -> Quadric {
        let mut out = [0.0; 10];
        for i in 0..10 {
            out[i] = self.0[i] + other.0[i];
        }
        Quadric(out)
    }

    /// `v̄ᵀ Q v̄` for the homogeneous `[v̄, 1]` vector (§4.8).
    fn cost(&self, v: Vec3) -> f64 {
        let (x, y, z) = (v.x as f64, v.y as f64, v.z as f64);
        let q = &self.0;
        let prod = [
            q[0] * x + q[1] * y + q[2] * z + q[3],
            q[1] * x + q[4] * y + q[5] * z + q[6],
            q[2] * x + q[5] * y + q[7] * z + q[8],
            q[3] * x + q[6] * y + q[8] * z + q[9],
        ];
        x * prod[0] + y * prod[1] + z * prod[2] + prod[3]
    }

    /// Minimizer of `cost` subject to the quadric's upper-left 3x3 block
    /// being solvable; falls back to the cheaper of the two endpoints and
    /// their midpoint otherwise (§4.8 "if the system is singular").
    fn optimal(&self, p0: Vec3, p1: Vec3) -> (Vec3, f64) {
        let q = &self.0;
        let mat = [[q[0], q[1], q[2]], [q[1], q[4], q[5]], [q[2], q[5], q[7]]];
        let bb = [-q[3], -q[6], -q[8]];

        if let Some(v) = solve_3x3(mat, bb) {
            let v = Vec3::new(v[0] as f32, v[1] as f32, v[2] as f32);
            return (v, self.cost(v));
        }

        let mid = (p0 + p1) * 0.5;
        let (ca, cb, cm) = (self.cost(p0), self.cost(p1), self.cost(mid));
        if ca <= cb {
            if cm <= ca { (mid, cm) } else { (p0, ca) }
        } else if cm <= cb {
            (mid, cm)
        } else {
            (p1, cb)
        }
    }
}

fn solve_3x3(mat: [[f64; 3]; 3], bb: [f64; 3]) -> Option<[f64; 3]> {
    let det = mat[0][0] * (mat[1][1] * mat[2][2] - mat[1][2] * mat[2][1])
        - mat[0][1] * (mat[1][0] * mat[2][2] - mat[1][2] * mat[2][0])
        + mat[0][2] * (mat[1][0] * mat[2][1] - mat[1][1] * mat[2][0]);
    if det.abs() < 1e-12 {
        return None;
    }

    let mut solve_col = |col: usize| -> f64 {
        let mut m = mat;
        for row in 0..3 {
            m[row][col] = bb[row];
        }
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    };
    Some([solve_col(0) / det, solve_col(1) / det, solve_col(2) / det])
}

struct SVert {
    position: Vec3,
    quadric: Quadric,
    faces: Vec<FId>,
    pairs: HashMap<VId, NodeId>,
}

struct SFace {
    verts: [VId; 3],
}

struct PairData {
    a: VId,
    b: VId,
    vbar: Vec3,
}

struct State {
    verts: SlotMap<VId, SVert>,
    faces: SlotMap<FId, SFace>,
    pairs: ScalarMap<PairData>,
}

impl State {
    fn position_of(&self, id: VId) -> Vec3 {
        self.verts[id].position
    }

    /// Inserts a fresh pair node for `(a, b)` if one doesn't already exist
    /// for that unordered endpoint set, ranked by its lowest-cost merge
    /// (§4.8 "duplicates suppressed by per-vertex pair hash").
    fn add_pair(&mut self, a: VId, b: VId) {
        if self.verts[a].pairs.contains_key(&b) {
            return;
        }
        let merged = self.verts[a].quadric.add(&self.verts[b].quadric);
        let (vbar, cost) = merged.optimal(self.position_of(a), self.position_of(b));
        let node = self.pairs.insert(cost as f32, PairData { a, b, vbar });
        self.verts[a].pairs.insert(b, node);
        self.verts[b].pairs.insert(a, node);
    }

    fn recompute_cost(&mut self, node: NodeId) {
        let (a, b) = {
            let p = self.pairs.get(node).expect("node still present");
            (p.a, p.b)
        };
        let merged = self.verts[a].quadric.add(&self.verts[b].quadric);
        let (vbar, cost) = merged.optimal(self.position_of(a), self.position_of(b));
        if let Some(p) = self.pairs.get_mut(node) {
            p.vbar = vbar;
        }
        self.pairs.rekey(node, cost as f32);
    }

    /// `AllowedContraction` (§4.8 step 2): neither endpoint's surviving
    /// faces (those not containing the other endpoint) may have their
    /// normal flipped by moving to `vbar`.
    fn contraction_is_admissible(&self, a: VId, b: VId, vbar: Vec3) -> bool {
        for &(this, other) in &[(a, b), (b, a)] {
            for &fid in &self.verts[this].faces {
                let face = &self.faces[fid];
                if face.verts.contains(&other) {
                    continue;
                }
                let p: Vec<Vec3> = face
                    .verts
                    .iter()
                    .map(|&v| if v == this { vbar } else { self.position_of(v) })
                    .collect();
                let orig: Vec3 = {
                    let o: Vec<Vec3> = face.verts.iter().map(|&v| self.position_of(v)).collect();
                    (o[1] - o[0]).cross(o[2] - o[1])
                };
                let new_normal = (p[1] - p[0]).cross(p[2] - p[1]);
                if new_normal.dot(orig) < 0.0 {
                    return false;
                }
            }
        }
        true
    }

    /// `Contract_Pair`: merges `b` into `a` at `vbar`, retargeting pairs
    /// and faces, then drops `b` (§4.8 step 3-4).
    fn contract(&mut self, node: NodeId) {
        let PairData { a, b, vbar } = self.pairs.remove(node).expect("node still present");

        let qb = self.verts[b].quadric;
        self.verts[a].quadric = self.verts[a].quadric.add(&qb);
        self.verts[a].position = vbar;

        self.verts[a].pairs.remove(&b);
        self.verts[b].pairs.remove(&a);

        let a_pair_nodes: Vec<NodeId> = self.verts[a].pairs.values().copied().collect();
        for node in a_pair_nodes {
            self.recompute_cost(node);
        }

        let b_pairs: Vec<(VId, NodeId)> = self.verts[b].pairs.iter().map(|(&v, &n)| (v, n)).collect();
        for (other, node) in b_pairs {
            self.verts[other].pairs.remove(&b);
            if self.verts[a].pairs.contains_key(&other) {
                self.pairs.remove(node);
                continue;
            }
            if let Some(p) = self.pairs.get_mut(node) {
                if p.a == b {
                    p.a = a;
                } else {
                    p.b = a;
                }
            }
            self.verts[a].pairs.insert(other, node);
            self.verts[other].pairs.insert(a, node);
            self.recompute_cost(node);
        }

        let a_faces = std::mem::take(&mut self.verts[a].faces);
        let a_faces: Vec<FId> = a_faces
            .into_iter()
            .filter(|&fid| !self.faces[fid].verts.contains(&b))
            .collect();
        self.verts[a].faces = a_faces;

        let b_faces = std::mem::take(&mut self.verts[b].faces);
        for fid in b_faces {
            let contains_a = self.faces[fid].verts.contains(&a);
            if contains_a {
                self.faces.remove(fid);
                continue;
            }
            let face = self.faces.get_mut(fid).expect("face still present");
            for v in face.verts.iter_mut() {
                if *v == b {
                    *v = a;
                }
            }
            canonicalize_face(&mut face.verts);
            self.verts[a].faces.push(fid);
        }

        self.verts.remove(b);
    }
}

/// Rotates `verts` so the smallest vertex handle comes first (§4.8 step 3
/// "re-canonicalize the face's vertex ordering").
fn canonicalize_face(verts: &mut [VId; 3]) {
    let min_idx = (0..3).min_by_key(|&i| verts[i]).unwrap();
    verts.rotate_left(min_idx);
}

/// Simplifies `mesh` to at most `target_faces` triangles using quadric
/// error metrics (§4.8). `aggregation_threshold` (`A`), when `> 0`, also
/// pairs up vertices within that Euclidean distance via [`VertexBvh`],
/// allowing topologically disconnected regions to be merged.
#[instrument(skip(mesh))]
pub fn simplify(mesh: &IndexedMesh, target_faces: usize, aggregation_threshold: f32) -> Result<IndexedMesh> {
    if mesh.floats_per_vertex() < 3 {
        return Err(Error::InvalidInput(
            "simplify requires floats_per_vertex >= 3".into(),
        ));
    }
    if mesh.primitive_kind() != PrimitiveKind::Triangle {
        return Err(Error::InvalidInput(
            "simplify requires a triangle-kind mesh".into(),
        ));
    }

    let mut state = State {
        verts: SlotMap::with_key(),
        faces: SlotMap::with_key(),
        pairs: ScalarMap::new(),
    };

    let mut vid_of: Vec<Option<VId>> = vec![None; mesh.num_vertices()];
    for tri in mesh.triangles()? {
        let mut vids = [VId::default(); 3];
        for (slot, &index) in vids.iter_mut().zip(tri.iter()) {
            *slot = *vid_of[index as usize].get_or_insert_with(|| {
                state.verts.insert(SVert {
                    position: mesh.position3(index),
                    quadric: Quadric::ZERO,
                    faces: Vec::new(),
                    pairs: HashMap::new(),
                })
            });
        }

        let mut canon = vids;
        canonicalize_face(&mut canon);

        let p = canon.map(|v| state.position_of(v));
        let kp = Quadric::from_face(p[0], p[1], p[2]);
        for &v in &canon {
            state.verts[v].quadric = state.verts[v].quadric.add(&kp);
        }

        let fid = state.faces.insert(SFace { verts: canon });
        for &v in &canon {
            state.verts[v].faces.push(fid);
        }
    }

    let face_ids: Vec<FId> = state.faces.keys().collect();
    for fid in face_ids {
        let verts = state.faces[fid].verts;
        for i in 0..3 {
            state.add_pair(verts[i], verts[(i + 1) % 3]);
        }
    }

    if aggregation_threshold > 0.0 {
        let vert_ids: Vec<VId> = state.verts.keys().collect();
        let points: Vec<Vec3> = vert_ids.iter().map(|&v| state.position_of(v)).collect();
        let bvh = VertexBvh::build(&points, aggregation_threshold);
        let mut extra: Vec<(VId, VId)> = Vec::new();
        bvh.pairs(&points, aggregation_threshold, |ia, ib| {
            extra.push((vert_ids[ia as usize], vert_ids[ib as usize]));
        });
        for (a, b) in extra {
            state.add_pair(a, b);
        }
    }

    while state.faces.len() > target_faces {
        let Some(node) = state.pairs.lowest() else {
            break;
        };
        if state.pairs.key(node).is_infinite() {
            warn!("simplify: all remaining pairs are disallowed, stopping early");
            break;
        }

        let (a, b, vbar) = {
            let p = state.pairs.get(node).expect("node still present");
            (p.a, p.b, p.vbar)
        };
        if !state.contraction_is_admissible(a, b, vbar) {
            state.pairs.rekey(node, f32::INFINITY);
            continue;
        }

        state.contract(node);
    }

    let mut out = IndexedMesh::new(3, PrimitiveKind::Triangle);
    for face in state.faces.values() {
        for &v in &face.verts {
            let p = state.position_of(v);
            out.add(&[p.x, p.y, p.z])?;
        }
    }
    out.finalize();
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hull::convex_hull_3d_from_points;
    use crate::primitives::icosphere;

    #[test]
    fn simplify_reduces_face_count() {
        let mesh = icosphere(1.0, 2).unwrap();
        let before = mesh.num_indices() / 3;
        let simplified = simplify(&mesh, 40, 0.0).unwrap();
        let after = simplified.num_indices() / 3;
        assert!(after <= before);
        assert!(after > 0);
    }

    #[test]
    fn simplify_preserves_rough_volume() {
        let mesh = icosphere(1.0, 2).unwrap();
        let before_vol = crate::mass_properties::mass_properties(&mesh).unwrap().volume;
        let simplified = simplify(&mesh, 60, 0.0).unwrap();
        let after_vol = crate::mass_properties::mass_properties(&simplified).unwrap().volume;
        assert!((after_vol - before_vol).abs() / before_vol < 0.2);
    }

    #[test]
    fn target_at_or_above_input_is_a_no_op() {
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
        let mesh = convex_hull_3d_from_points(&corners).unwrap();
        let before = mesh.num_indices() / 3;
        let simplified = simplify(&mesh, before, 0.0).unwrap();
        assert_eq!(simplified.num_indices() / 3, before);
    }

    #[test]
    fn wrong_primitive_kind_errors() {
        let mut mesh = IndexedMesh::new(3, PrimitiveKind::Line);
        mesh.add(&[0.0, 0.0, 0.0]).unwrap();
        mesh.add(&[1.0, 0.0, 0.0]).unwrap();
        mesh.finalize();
        assert!(simplify(&mesh, 1, 0.0).is_err());
    }
}
