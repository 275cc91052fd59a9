//! Slicing a closed triangle mesh by a plane into two closed manifolds
//! (§4.7), capping each side with [`crate::triangulate2d::triangulate_2d`].

use glam::{Vec2, Vec3};
use tracing::instrument;

use crate::containers::unique_queue::UniqueQueue;
use crate::error::{Error, Result};
use crate::mesh::indexed::{IndexedMesh, MeshList, PrimitiveKind};
use crate::mesh::vef::{FaceId, HalfEdgeMesh};
use crate::triangulate2d::triangulate_2d;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Sign {
    Pos,
    Neg,
    Zero,
}

fn classify(s: f32) -> Sign {
    if s > 0.0 {
        Sign::Pos
    } else if s < 0.0 {
        Sign::Neg
    } else {
        Sign::Zero
    }
}

/// One side's accumulated output: the volume triangles kept as-is or split
/// from the source mesh, plus a planar line-soup of the cap boundary
/// (projected into the cut plane's 2D basis) fed to [`triangulate_2d`].
struct Side {
    volume: IndexedMesh,
    cap_lines: IndexedMesh,
    cap_positions: Vec<Vec3>,
}

impl Side {
    fn new() -> Self {
        Self {
            volume: IndexedMesh::new(3, PrimitiveKind::Triangle),
            cap_lines: IndexedMesh::new(2, PrimitiveKind::Line),
            cap_positions: Vec::new(),
        }
    }

    fn push_volume_tri(&mut self, a: Vec3, b: Vec3, c: Vec3) -> Result<()> {
        self.volume.add(&[a.x, a.y, a.z])?;
        self.volume.add(&[b.x, b.y, b.z])?;
        self.volume.add(&[c.x, c.y, c.z])?;
        Ok(())
    }

    fn cap_vertex(&mut self, pos3: Vec3, basis: &PlaneBasis) -> Result<u32> {
        let before = self.cap_lines.num_vertices();
        let p2 = basis.project(pos3);
        let idx = self.cap_lines.add(&[p2.x, p2.y])?;
        if self.cap_lines.num_vertices() > before {
            self.cap_positions.push(pos3);
        }
        Ok(idx)
    }

    fn cap_segment(&mut self, a3: Vec3, b3: Vec3, basis: &PlaneBasis) -> Result<()> {
        let ia = self.cap_vertex(a3, basis)?;
        let ib = self.cap_vertex(b3, basis)?;
        if ia == ib {
            return Ok(());
        }
        self.cap_lines.add_index(ia)?;
        self.cap_lines.add_index(ib)?;
        Ok(())
    }
}

struct PlaneBasis {
    normal: Vec3,
    d: f32,
    x_axis: Vec3,
    y_axis: Vec3,
}

impl PlaneBasis {
    fn new(normal: Vec3, d: f32) -> Result<Self> {
        let normal = normal.try_normalize().ok_or_else(|| {
            Error::InvalidInput("plane_cut: normal must be nonzero".into())
        })?;
        let up = if normal.x.abs() < 0.9 { Vec3::X } else { Vec3::Y };
        let x_axis = normal.cross(up).normalize_or_zero();
        let y_axis = x_axis.cross(normal).normalize_or_zero();
        Ok(Self { normal, d, x_axis, y_axis })
    }

    fn signed_dist(&self, p: Vec3) -> f32 {
        self.normal.dot(p) - self.d
    }

    fn project(&self, p: Vec3) -> Vec2 {
        Vec2::new(p.dot(self.x_axis), p.dot(self.y_axis))
    }
}

/// Slices `mesh` by the plane `(normal, d)` into a [`MeshList`] of closed
/// polyhedra, possibly on both sides (§4.7).
#[instrument(skip(mesh))]
pub fn plane_cut(mesh: &IndexedMesh, normal: Vec3, d: f32) -> Result<MeshList> {
    if mesh.floats_per_vertex() < 3 {
        return Err(Error::InvalidInput(
            "plane_cut requires floats_per_vertex >= 3".into(),
        ));
    }
    if mesh.primitive_kind() != PrimitiveKind::Triangle {
        return Err(Error::InvalidInput(
            "plane_cut requires PrimitiveKind::Triangle".into(),
        ));
    }

    let basis = PlaneBasis::new(normal, d)?;

    let positions: Vec<Vec3> = (0..mesh.num_vertices())
        .map(|i| mesh.position3(i as u32))
        .collect();

    let snapped: Vec<f32> = positions
        .iter()
        .map(|&p| {
            let s = basis.signed_dist(p);
            let tol = 1e-5 * p.length().max(d.abs()).max(1e-12);
            if s.abs() < tol { 0.0 } else { s }
        })
        .collect();

    let mut pos_side = Side::new();
    let mut neg_side = Side::new();

    for tri in mesh.triangles()? {
        let idx = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let p = [positions[idx[0]], positions[idx[1]], positions[idx[2]]];
        let s = [snapped[idx[0]], snapped[idx[1]], snapped[idx[2]]];
        let sign = [classify(s[0]), classify(s[1]), classify(s[2])];

        let straddles = |i: usize, j: usize| -> bool {
            (sign[i] == Sign::Pos && sign[j] == Sign::Neg)
                || (sign[i] == Sign::Neg && sign[j] == Sign::Pos)
        };
        let n_intersections =
            [straddles(0, 1), straddles(1, 2), straddles(2, 0)]
                .iter()
                .filter(|&&x| x)
                .count();

        match n_intersections {
            0 => handle_zero_intersections(&mut pos_side, &mut neg_side, &basis, p, s, sign)?,
            1 => handle_one_intersection(&mut pos_side, &mut neg_side, &basis, p, s, sign)?,
            2 => handle_two_intersections(&mut pos_side, &mut neg_side, &basis, p, s, sign)?,
            _ => {
                return Err(Error::GeometryInconsistent(
                    "plane_cut: triangle has 3 plane intersections".into(),
                ));
            }
        }
    }

    let mut out = MeshList::new();
    for (side, flip_cap) in [(pos_side, false), (neg_side, true)] {
        out = out.join(finish_side(side, flip_cap)?);
    }
    Ok(out)
}

fn lerp_point(a: Vec3, b: Vec3, sa: f32, sb: f32) -> Vec3 {
    let t = sa / (sa - sb);
    a + (b - a) * t
}

fn handle_zero_intersections(
    pos_side: &mut Side,
    neg_side: &mut Side,
    basis: &PlaneBasis,
    p: [Vec3; 3],
    _s: [f32; 3],
    sign: [Sign; 3],
) -> Result<()> {
    let zero_count = sign.iter().filter(|&&s| s == Sign::Zero).count();
    let nonzero_sign = sign.iter().find(|&&s| s != Sign::Zero);

    match nonzero_sign {
        None => Ok(()), // fully on-plane triangle: zero volume, contributes nothing.
        Some(&Sign::Pos) => {
            pos_side.push_volume_tri(p[0], p[1], p[2])?;
            if zero_count == 2 {
                record_onplane_edge(pos_side, basis, p, sign)?;
            }
            Ok(())
        }
        Some(&Sign::Neg) => {
            neg_side.push_volume_tri(p[0], p[1], p[2])?;
            if zero_count == 2 {
                record_onplane_edge(neg_side, basis, p, sign)?;
            }
            Ok(())
        }
        Some(&Sign::Zero) => unreachable!("nonzero_sign filters out Sign::Zero"),
    }
}

fn record_onplane_edge(
    side: &mut Side,
    basis: &PlaneBasis,
    p: [Vec3; 3],
    sign: [Sign; 3],
) -> Result<()> {
    let zero_idxs: Vec<usize> = (0..3).filter(|&i| sign[i] == Sign::Zero).collect();
    if zero_idxs.len() == 2 {
        side.cap_segment(p[zero_idxs[0]], p[zero_idxs[1]], basis)?;
    }
    Ok(())
}

fn handle_one_intersection(
    pos_side: &mut Side,
    neg_side: &mut Side,
    basis: &PlaneBasis,
    p: [Vec3; 3],
    s: [f32; 3],
    sign: [Sign; 3],
) -> Result<()> {
    let zero_i = (0..3).find(|&i| sign[i] == Sign::Zero).ok_or_else(|| {
        Error::GeometryInconsistent("plane_cut: expected one on-plane vertex".into())
    })?;
    let j = (zero_i + 1) % 3;
    let k = (zero_i + 2) % 3;
    // j,k straddle the plane.
    let hit = lerp_point(p[j], p[k], s[j], s[k]);

    // Preserve original winding: zero_i -> j -> k -> zero_i becomes
    // (zero_i, j, hit) and (zero_i, hit, k), each keeping that cyclic order.
    let tri_a = [p[zero_i], p[j], hit];
    let tri_b = [p[zero_i], hit, p[k]];

    if sign[j] == Sign::Pos {
        pos_side.push_volume_tri(tri_a[0], tri_a[1], tri_a[2])?;
        neg_side.push_volume_tri(tri_b[0], tri_b[1], tri_b[2])?;
    } else {
        neg_side.push_volume_tri(tri_a[0], tri_a[1], tri_a[2])?;
        pos_side.push_volume_tri(tri_b[0], tri_b[1], tri_b[2])?;
    }

    pos_side.cap_segment(p[zero_i], hit, basis)?;
    neg_side.cap_segment(p[zero_i], hit, basis)?;
    Ok(())
}

fn handle_two_intersections(
    pos_side: &mut Side,
    neg_side: &mut Side,
    basis: &PlaneBasis,
    p: [Vec3; 3],
    s: [f32; 3],
    sign: [Sign; 3],
) -> Result<()> {
    // The singleton vertex is the one whose sign differs from both others.
    let singleton = (0..3)
        .find(|&i| {
            let j = (i + 1) % 3;
            let k = (i + 2) % 3;
            sign[i] != sign[j] && sign[i] != sign[k] && sign[j] == sign[k]
        })
        .ok_or_else(|| {
            Error::GeometryInconsistent("plane_cut: could not find singleton vertex".into())
        })?;

    let a = (singleton + 1) % 3;
    let b = (singleton + 2) % 3;

    let i_a = lerp_point(p[singleton], p[a], s[singleton], s[a]);
    let i_b = lerp_point(p[b], p[singleton], s[b], s[singleton]);

    let (singleton_side, other_side): (&mut Side, &mut Side) = if sign[singleton] == Sign::Pos {
        (pos_side, neg_side)
    } else {
        (neg_side, pos_side)
    };

    singleton_side.push_volume_tri(p[singleton], i_a, i_b)?;

    // Quad (a, b, i_b, i_a) on the other side, split along the shorter diagonal.
    let diag_a_ib = (p[a] - i_b).length();
    let diag_b_ia = (p[b] - i_a).length();
    if diag_a_ib <= diag_b_ia {
        other_side.push_volume_tri(p[a], p[b], i_b)?;
        other_side.push_volume_tri(p[a], i_b, i_a)?;
    } else {
        other_side.push_volume_tri(p[a], p[b], i_a)?;
        other_side.push_volume_tri(p[b], i_b, i_a)?;
    }

    pos_side
        .cap_segment(i_a, i_b, basis)
        .and_then(|_| neg_side.cap_segment(i_a, i_b, basis))?;
    Ok(())
}

fn finish_side(mut side: Side, flip_cap: bool) -> Result<MeshList> {
    if side.cap_lines.num_indices() > 0 {
        let cap = triangulate_2d(&side.cap_lines)?;
        for tri in cap.triangles()? {
            let mut verts = [
                side.cap_positions[tri[0] as usize],
                side.cap_positions[tri[1] as usize],
                side.cap_positions[tri[2] as usize],
            ];
            if flip_cap {
                verts.swap(1, 2);
            }
            side.volume.add(&[verts[0].x, verts[0].y, verts[0].z])?;
            side.volume.add(&[verts[1].x, verts[1].y, verts[1].z])?;
            side.volume.add(&[verts[2].x, verts[2].y, verts[2].z])?;
        }
    }
    side.volume.finalize();

    if side.volume.num_indices() == 0 {
        return Ok(MeshList::new());
    }

    connected_components(&side.volume)
}

/// Splits `mesh` into connected components (by face-edge-face adjacency),
/// emitting one closed [`IndexedMesh`] per component (§4.7).
fn connected_components(mesh: &IndexedMesh) -> Result<MeshList> {
    let vef = HalfEdgeMesh::from_indexed_mesh(mesh)?;

    let mut visited: hashbrown::HashSet<FaceId> = hashbrown::HashSet::new();
    let mut out = MeshList::new();

    for start in vef.faces.keys() {
        if visited.contains(&start) {
            continue;
        }

        let mut queue: UniqueQueue<FaceId> = UniqueQueue::new();
        queue.push(start);
        let mut component = IndexedMesh::new(3, PrimitiveKind::Triangle);

        while let Some(fid) = queue.pop() {
            visited.insert(fid);
            let face = &vef.faces[fid];
            for &v in &face.v {
                let p = vef.vertices[v].position;
                component.add(&[p.x, p.y, p.z])?;
            }
            for &e in &face.e {
                let edge = &vef.edges[e];
                for n in edge.faces.into_iter().flatten() {
                    if n != fid {
                        queue.push(n);
                    }
                }
            }
        }

        component.finalize();
        out.append(component);
    }

    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    fn cube_mesh(half: f32) -> IndexedMesh {
        let mut pts = Vec::new();
        for &x in &[-half, half] {
            for &y in &[-half, half] {
                for &z in &[-half, half] {
                    pts.push(Vec3::new(x, y, z));
                }
            }
        }
        crate::hull::convex_hull_3d_from_points(&pts).unwrap()
    }

    fn mesh_volume(mesh: &IndexedMesh) -> f32 {
        crate::mass_properties::mass_properties(mesh).unwrap().volume
    }

    #[test]
    fn cube_cut_through_center_yields_two_equal_halves() {
        let mesh = cube_mesh(1.0);
        let parts = plane_cut(&mesh, Vec3::X, 0.0).unwrap();
        assert_eq!(parts.len(), 2);
        let total: f32 = parts.iter().map(mesh_volume).sum();
        assert!((total - 8.0).abs() < 1e-3);
        for part in parts.iter() {
            assert!((mesh_volume(part) - 4.0).abs() < 1e-2);
        }
    }

    #[test]
    fn plane_missing_mesh_entirely_leaves_single_side() {
        let mesh = cube_mesh(1.0);
        let parts = plane_cut(&mesh, Vec3::X, 10.0).unwrap();
        assert_eq!(parts.len(), 1);
        assert!((mesh_volume(&parts[0]) - 8.0).abs() < 1e-3);
    }
}
