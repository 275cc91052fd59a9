//! Approximate convex decomposition (§4.10): repeatedly finds the part
//! whose hull-volume deficit is largest and splits it with
//! [`crate::plane_cut`] along a candidate plane through its most promising
//! reflex edge, until the total deficit falls under a threshold fraction of
//! the input's volume.

use glam::Vec3;
use tracing::instrument;

use crate::containers::scalar_map::ScalarMap;
use crate::containers::unique_queue::UniqueQueue;
use crate::error::{Error, Result};
use crate::hull;
use crate::mass_properties::mass_properties;
use crate::mesh::indexed::IndexedMesh;
use crate::mesh::vef::{EdgeId, HalfEdgeMesh};
use crate::mesh::MeshList;
use crate::plane_cut::plane_cut;

/// How many of the farthest-ranked candidate edges to try splitting along
/// per iteration (§4.10 step 3, Open Questions: heuristic but fixed at
/// `NUM_EDGES = 16` in the original).
const NUM_EDGES: usize = 16;

/// How many angular offsets across a candidate edge's dihedral angle to
/// try per edge (§4.10 step 3, Open Questions: `NUM_ANGLES = 9`).
const NUM_ANGLES: usize = 9;

/// Rotates `v` (assumed perpendicular to unit `axis`) by `theta` around
/// `axis`, matching the convention [`crate::mesh::vef::HalfEdgeMesh`]'s
/// dihedral angle is measured in (`z_vec` at angle zero, increasing toward
/// the second face's direction).
fn rotate_perp(v: Vec3, axis: Vec3, theta: f32) -> Vec3 {
    v * theta.cos() + axis.cross(v) * theta.sin()
}

fn part_error(part: &IndexedMesh) -> Result<f32> {
    let part_volume = mass_properties(part)?.volume;
    let hull_mesh = hull::convex_hull_3d(part)?;
    let hull_volume = mass_properties(&hull_mesh)?.volume;
    Ok((hull_volume - part_volume).max(0.0))
}

/// Ranks every edge of `vef` by the distance its dihedral-bisector ray
/// travels before hitting `hull_vef`'s surface (§4.10 step 2-3), via a BFS
/// over the part's edge graph so every edge is visited exactly once.
fn rank_edges_by_ray_dist(vef: &HalfEdgeMesh, hull_vef: &HalfEdgeMesh) -> ScalarMap<EdgeId> {
    let mut ranked = ScalarMap::new();
    let mut visited: UniqueQueue<EdgeId> = UniqueQueue::new();

    let Some(start) = vef.edges.keys().next() else {
        return ranked;
    };
    visited.push(start);

    while let Some(eid) = visited.pop() {
        let edge = &vef.edges[eid];
        for &fid in edge.faces.iter().flatten() {
            for &e2 in &vef.faces[fid].e {
                visited.push(e2);
            }
        }

        let Some(dihedral) = edge.dihedral else {
            continue;
        };
        let p0 = vef.vertices[edge.v0].position;
        let p1 = vef.vertices[edge.v1].position;
        let mid = (p0 + p1) * 0.5;
        let dir = rotate_perp(dihedral.z_vec, dihedral.x_vec, dihedral.ang * 0.5);

        if let Ok(t) = hull_vef.convex_ray_dist(mid, dir) {
            ranked.insert(t, eid);
        }
    }

    ranked
}

/// One candidate split: a plane through `edge`'s midpoint, angled `theta`
/// around its dihedral basis, ranked `rank` among this iteration's
/// candidate edges (farthest first).
fn try_split(part: &IndexedMesh, vef: &HalfEdgeMesh, eid: EdgeId, rank: usize) -> Option<(f32, MeshList)> {
    let edge = &vef.edges[eid];
    let dihedral = edge.dihedral?;
    let p0 = vef.vertices[edge.v0].position;
    let p1 = vef.vertices[edge.v1].position;
    let mid = (p0 + p1) * 0.5;

    let weight = 1.0 + 1e-3 * ((rank as f32) - (NUM_EDGES as f32 - 1.0) / 2.0).abs();

    let mut best: Option<(f32, MeshList)> = None;
    for a in 0..NUM_ANGLES {
        let theta = if NUM_ANGLES > 1 {
            dihedral.ang * (a as f32) / (NUM_ANGLES as f32 - 1.0)
        } else {
            dihedral.ang * 0.5
        };
        let normal = rotate_perp(dihedral.z_vec, dihedral.x_vec, theta);
        let d = normal.dot(mid);

        let Ok(cut) = plane_cut(part, normal, d) else {
            continue;
        };
        if cut.len() < 2 {
            continue; // plane missed the part entirely; not an admissible split.
        }

        let mut sse = 0.0f32;
        let mut ok = true;
        for piece in cut.iter() {
            match part_error(piece) {
                Ok(e) => sse += e * e,
                Err(_) => {
                    ok = false;
                    break;
                }
            }
        }
        if !ok {
            continue;
        }

        let weighted = sse * weight;
        if best.as_ref().map(|(b, _)| weighted < *b).unwrap_or(true) {
            best = Some((weighted, cut));
        }
    }
    best
}

/// Decomposes `mesh` into approximately convex pieces (§4.10). `tau` is the
/// stopping threshold fraction in `(0, 1]`: decomposition halts once the
/// total hull-volume deficit across all parts falls to `tau` times the
/// input's total volume.
#[instrument(skip(mesh))]
pub fn convex_decomp(mesh: &IndexedMesh, tau: f32) -> Result<MeshList> {
    if !(tau > 0.0 && tau <= 1.0) {
        return Err(Error::InvalidInput(
            "convex_decomp requires tau in (0, 1]".into(),
        ));
    }

    let total_volume = mass_properties(mesh)?.volume;
    let mut parts: Vec<IndexedMesh> = vec![mesh.clone()];

    loop {
        let errors: Vec<f32> = parts
            .iter()
            .map(part_error)
            .collect::<Result<Vec<_>>>()?;
        let total_error: f32 = errors.iter().sum();
        if total_error <= tau * total_volume.max(1e-12) {
            break;
        }

        let (worst_idx, _) = errors
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .expect("parts is non-empty: loop only runs while total_error > 0");

        let worst = parts[worst_idx].clone();
        let vef = HalfEdgeMesh::from_indexed_mesh(&worst)?;
        let hull_mesh = hull::convex_hull_3d(&worst)?;
        let hull_vef = HalfEdgeMesh::from_indexed_mesh(&hull_mesh)?;

        let mut ranked = rank_edges_by_ray_dist(&vef, &hull_vef);
        let mut candidates: Vec<EdgeId> = Vec::with_capacity(NUM_EDGES);
        while candidates.len() < NUM_EDGES {
            let Some(node) = ranked.highest() else {
                break;
            };
            candidates.push(*ranked.get(node).unwrap());
            ranked.remove(node);
        }

        let mut best: Option<(f32, MeshList)> = None;
        for (rank, &eid) in candidates.iter().enumerate() {
            if let Some((weighted, cut)) = try_split(&worst, &vef, eid, rank) {
                if best.as_ref().map(|(b, _)| weighted < *b).unwrap_or(true) {
                    best = Some((weighted, cut));
                }
            }
        }

        match best {
            Some((_, cut)) => {
                parts.remove(worst_idx);
                for (offset, piece) in cut.into_iter().enumerate() {
                    parts.insert(worst_idx + offset, piece);
                }
            }
            None => break, // no admissible cut found for the worst part.
        }
    }

    Ok(parts.into_iter().collect())
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
        hull::convex_hull_3d_from_points(&pts).unwrap()
    }

    #[test]
    fn convex_input_needs_no_split() {
        let mesh = cube_mesh(1.0);
        let parts = convex_decomp(&mesh, 0.5).unwrap();
        assert_eq!(parts.len(), 1);
    }

    #[test]
    fn invalid_tau_errors() {
        let mesh = cube_mesh(1.0);
        assert!(convex_decomp(&mesh, 0.0).is_err());
        assert!(convex_decomp(&mesh, 1.5).is_err());
    }
}
