//! Three-dimensional convex hull construction via QuickHull (§4.6).
//!
//! Faces live in a [`slotmap::SlotMap`] arena addressed by [`FaceId`], each
//! holding its three vertex positions (as indices into the working point
//! set) and the three neighbor `FaceId`s across its edges — the "arena of
//! vertex entries...neighbor links are indices into the same arena" shape
//! from §9's design notes, specialized to triangles only (see
//! `DESIGN.md` for why the EXTEND/coplanar-merge path from the original
//! algorithm is folded into DELETE here: every hull face stays a
//! triangle, so there is no vertex-splicing arena to maintain).

use glam::Vec3;
use hashbrown::{HashMap, HashSet};
use slotmap::{SlotMap, new_key_type};
use tracing::{instrument, warn};

use crate::containers::scalar_map::{NodeId, ScalarMap};
use crate::error::{Error, Result};
use crate::mesh::indexed::{IndexedMesh, PrimitiveKind};

new_key_type! {
    pub struct FaceId;
}

struct HullFace {
    /// The three hull-point indices, CCW as seen from outside.
    verts: [u32; 3],
    /// Neighbor across edge `(verts[i], verts[(i+1)%3])`.
    neighbors: [Option<FaceId>; 3],
    normal: Vec3,
    d: f32,
    area: f32,
    outside: Vec<u32>,
    max_dist: f32,
    max_point: u32,
    rank: Option<NodeId>,
}

impl HullFace {
    fn new(points: &[Vec3], verts: [u32; 3]) -> Self {
        let p0 = points[verts[0] as usize];
        let p1 = points[verts[1] as usize];
        let p2 = points[verts[2] as usize];
        let raw = (p1 - p0).cross(p2 - p0);
        let area = 0.5 * raw.length();
        let normal = raw.normalize_or_zero();
        let d = normal.dot(p0);
        Self {
            verts,
            neighbors: [None, None, None],
            normal,
            d,
            area,
            outside: Vec::new(),
            max_dist: f32::NEG_INFINITY,
            max_point: u32::MAX,
            rank: None,
        }
    }

    fn dist(&self, p: Vec3) -> f32 {
        self.normal.dot(p) - self.d
    }

    fn tol(&self) -> f32 {
        1e-5 * self.area.abs().sqrt()
    }

    fn edge_index_of(&self, from: u32, to: u32) -> Option<usize> {
        (0..3).find(|&i| self.verts[i] == from && self.verts[(i + 1) % 3] == to)
    }
}

struct Hull<'p> {
    points: &'p [Vec3],
    faces: SlotMap<FaceId, HullFace>,
    ranked: ScalarMap<FaceId>,
}

impl<'p> Hull<'p> {
    fn set_rank(&mut self, id: FaceId) {
        let (has_outside, max_dist) = {
            let f = &self.faces[id];
            (!f.outside.is_empty(), f.max_dist)
        };
        let old_rank = self.faces[id].rank;
        match (has_outside, old_rank) {
            (true, Some(node)) => self.ranked.rekey(node, max_dist),
            (true, None) => {
                let node = self.ranked.insert(max_dist, id);
                self.faces[id].rank = Some(node);
            }
            (false, Some(node)) => {
                self.ranked.remove(node);
                self.faces[id].rank = None;
            }
            (false, None) => {}
        }
    }

    fn assign_point(&mut self, face_id: FaceId, point: u32) {
        let f = &mut self.faces[face_id];
        let dist = f.dist(self.points[point as usize]);
        if dist > f.tol() {
            f.outside.push(point);
            if dist > f.max_dist {
                f.max_dist = dist;
                f.max_point = point;
            }
        }
    }

    /// Redistributes `pool` across `candidates`, each point going to
    /// whichever candidate face it is furthest above (if any), matching
    /// the spec's DELETE/PRESENT reassignment after a hull update.
    fn redistribute(&mut self, pool: Vec<u32>, candidates: &[FaceId]) {
        for p in pool {
            let mut best: Option<(FaceId, f32)> = None;
            for &c in candidates {
                let f = &self.faces[c];
                let dist = f.dist(self.points[p as usize]);
                if dist > f.tol() && best.map(|(_, d)| dist > d).unwrap_or(true) {
                    best = Some((c, dist));
                }
            }
            if let Some((face_id, _)) = best {
                self.assign_point(face_id, p);
            }
        }
        for &c in candidates {
            self.set_rank(c);
        }
    }
}

/// Builds the 3D convex hull of every unique vertex position (first 3
/// floats) in `mesh`, deduplicating through a fresh [`IndexedMesh`] the
/// way §4.6 describes ("deduplicate input points via the IndexedMesh
/// itself"). Accepts any primitive kind with `floats_per_vertex >= 3` —
/// the index/triangle structure of the input is irrelevant to a hull, and
/// the primitive generators (§6.3) build hulls directly from raw corner
/// points that are not yet triangulated.
#[instrument(skip(mesh))]
pub fn convex_hull_3d(mesh: &IndexedMesh) -> Result<IndexedMesh> {
    if mesh.floats_per_vertex() < 3 {
        return Err(Error::InvalidInput(
            "convex_hull_3d requires floats_per_vertex >= 3".into(),
        ));
    }

    let mut dedup = IndexedMesh::new(3, PrimitiveKind::Point);
    for i in 0..mesh.num_vertices() {
        let v = mesh.vertex(i as u32);
        dedup.add(&v[0..3])?;
    }

    let points: Vec<Vec3> = (0..dedup.num_vertices())
        .map(|i| dedup.position3(i as u32))
        .collect();

    convex_hull_3d_from_points(&points)
}

/// Builds the 3D convex hull of a raw point set (already deduplicated by
/// the caller, or small enough that duplicates are harmless interior
/// points).
#[instrument(skip(points))]
pub fn convex_hull_3d_from_points(points: &[Vec3]) -> Result<IndexedMesh> {
    if points.len() < 4 {
        return Err(Error::InvalidInput(
            "convex hull requires at least 4 unique points".into(),
        ));
    }

    let (a, b, c, e) = initial_simplex_indices(points)?;

    let mut hull = Hull {
        points,
        faces: SlotMap::with_key(),
        ranked: ScalarMap::new(),
    };

    let mut simplex_verts = Vec::with_capacity(4);
    for skip in [a, b, c, e] {
        let tri: Vec<u32> = [a, b, c, e].into_iter().filter(|&v| v != skip).collect();
        simplex_verts.push((skip, tri));
    }

    let mut face_ids = Vec::with_capacity(4);
    for (excluded, tri) in &simplex_verts {
        let (mut v0, mut v1, v2) = (tri[0], tri[1], tri[2]);
        let p0 = points[v0 as usize];
        let p1 = points[v1 as usize];
        let p2 = points[v2 as usize];
        let excluded_pt = points[*excluded as usize];

        let mut normal = (p1 - p0).cross(p2 - p0);
        if normal.dot(excluded_pt - p0) > 0.0 {
            std::mem::swap(&mut v0, &mut v1);
            normal = -normal;
        }
        let _ = normal;
        face_ids.push(hull.faces.insert(HullFace::new(points, [v0, v1, v2])));
    }

    link_neighbors_bruteforce(&mut hull, &face_ids);

    let simplex_set: HashSet<u32> = [a, b, c, e].into_iter().collect();
    for (i, p) in points.iter().enumerate() {
        let idx = i as u32;
        if simplex_set.contains(&idx) {
            continue;
        }
        let mut best: Option<(FaceId, f32)> = None;
        for &fid in &face_ids {
            let f = &hull.faces[fid];
            let dist = f.dist(*p);
            if dist > f.tol() && best.map(|(_, d)| dist > d).unwrap_or(true) {
                best = Some((fid, dist));
            }
        }
        if let Some((fid, _)) = best {
            hull.assign_point(fid, idx);
        }
    }
    for &fid in &face_ids {
        hull.set_rank(fid);
    }

    main_loop(&mut hull)?;

    build_output_mesh(&hull)
}

/// Picks the 4 simplex-defining point indices: the two x-extremes, the
/// point farthest from the line between them, and the point farthest
/// (by absolute distance) from the plane through those three (§4.6
/// steps 2-4, generalized to pick a 4th apex on whichever side is
/// farther rather than assuming one).
fn initial_simplex_indices(points: &[Vec3]) -> Result<(u32, u32, u32, u32)> {
    let mut min_i = 0usize;
    let mut max_i = 0usize;
    for (i, p) in points.iter().enumerate() {
        if p.x < points[min_i].x {
            min_i = i;
        }
        if p.x > points[max_i].x {
            max_i = i;
        }
    }

    let p_min = points[min_i];
    let p_max = points[max_i];
    let line_dir = p_max - p_min;

    let mut d_i = min_i;
    let mut best_line_dist = -1.0f32;
    for (i, p) in points.iter().enumerate() {
        if i == min_i || i == max_i {
            continue;
        }
        let dist = (*p - p_min).cross(line_dir).length();
        if dist > best_line_dist {
            best_line_dist = dist;
            d_i = i;
        }
    }

    let scale = line_dir.length().max(1e-12);
    if best_line_dist < 1e-6 * scale {
        return Err(Error::InvalidInput("all points colinear".into()));
    }

    let p_d = points[d_i];
    let normal0 = (p_max - p_min).cross(p_d - p_min);
    let area_scale = normal0.length().max(1e-12);

    let mut e_i = min_i;
    let mut best_plane_dist = -1.0f32;
    for (i, p) in points.iter().enumerate() {
        if i == min_i || i == max_i || i == d_i {
            continue;
        }
        let dist = normal0.dot(*p - p_min).abs();
        if dist > best_plane_dist {
            best_plane_dist = dist;
            e_i = i;
        }
    }

    if best_plane_dist < 1e-6 * area_scale {
        return Err(Error::InvalidInput("all points coplanar".into()));
    }

    Ok((min_i as u32, max_i as u32, d_i as u32, e_i as u32))
}

/// Links each of `face_ids`'s edges to its neighbor by brute-force
/// matching directed edges — cheap for the 4-face initial simplex.
fn link_neighbors_bruteforce(hull: &mut Hull, face_ids: &[FaceId]) {
    for &fid in face_ids {
        for edge in 0..3 {
            let (from, to) = {
                let f = &hull.faces[fid];
                (f.verts[edge], f.verts[(edge + 1) % 3])
            };
            for &other in face_ids {
                if other == fid {
                    continue;
                }
                if hull.faces[other].edge_index_of(to, from).is_some() {
                    hull.faces[fid].neighbors[edge] = Some(other);
                    break;
                }
            }
        }
    }
}

/// The QuickHull main loop (§4.6): repeatedly pick the globally farthest
/// outside point, delete every face it sees, re-triangulate the horizon
/// as a fan from that point, and redistribute the pooled outside points.
fn main_loop(hull: &mut Hull) -> Result<()> {
    while let Some(top) = hull.ranked.highest() {
        let face_star = *hull.ranked.get(top).unwrap();
        let p_star = hull.faces[face_star].max_point;
        let p_star_pos = hull.points[p_star as usize];

        let mut delete_set: HashSet<FaceId> = HashSet::new();
        let mut queue = vec![face_star];
        delete_set.insert(face_star);
        while let Some(fid) = queue.pop() {
            let neighbors = hull.faces[fid].neighbors;
            for n in neighbors.into_iter().flatten() {
                if delete_set.contains(&n) {
                    continue;
                }
                let f = &hull.faces[n];
                if f.dist(p_star_pos) > f.tol() {
                    delete_set.insert(n);
                    queue.push(n);
                }
            }
        }

        if delete_set.is_empty() {
            // Boundary case: p_star could not see anything beyond the
            // tolerance band. Re-pool it onto its own face's neighbors
            // and move on rather than looping forever.
            warn!("hull: point saw no faces beyond tolerance, re-pooling");
            let face = &hull.faces[face_star];
            let neighbors: Vec<FaceId> = face.neighbors.iter().filter_map(|n| *n).collect();
            let mut candidates = neighbors;
            candidates.push(face_star);
            let pool = std::mem::take(&mut hull.faces[face_star].outside);
            hull.faces[face_star].max_dist = f32::NEG_INFINITY;
            hull.redistribute(pool, &candidates);
            continue;
        }

        // Pool outside points of every deleted face (minus p_star itself).
        let mut pool = Vec::new();
        for &fid in &delete_set {
            pool.extend(hull.faces[fid].outside.drain(..).filter(|&p| p != p_star));
            if let Some(node) = hull.faces[fid].rank.take() {
                hull.ranked.remove(node);
            }
        }

        // Collect ridge edges: edges of DELETE faces whose neighbor is PRESENT.
        let mut ridge_start: HashMap<u32, (u32, FaceId)> = HashMap::new();
        for &fid in &delete_set {
            let (verts, neighbors) = {
                let f = &hull.faces[fid];
                (f.verts, f.neighbors)
            };
            for edge in 0..3 {
                if let Some(n) = neighbors[edge] {
                    if !delete_set.contains(&n) {
                        let from = verts[edge];
                        let to = verts[(edge + 1) % 3];
                        ridge_start.insert(from, (to, n));
                    }
                }
            }
        }

        if ridge_start.is_empty() {
            return Err(Error::GeometryInconsistent(
                "hull horizon walk found no ridge edges".into(),
            ));
        }

        // Walk the ridge edges into a single ordered cycle.
        let (&first_from, _) = ridge_start.iter().next().unwrap();
        let mut ridge: Vec<(u32, u32, FaceId)> = Vec::with_capacity(ridge_start.len());
        let mut cur = first_from;
        for _ in 0..ridge_start.len() {
            let &(to, neighbor) = ridge_start.get(&cur).ok_or_else(|| {
                Error::GeometryInconsistent("hull horizon walk could not close the ridge cycle".into())
            })?;
            ridge.push((cur, to, neighbor));
            cur = to;
        }
        if cur != first_from {
            return Err(Error::GeometryInconsistent(
                "hull horizon walk did not return to its start".into(),
            ));
        }

        // Fan new faces from p_star across the ridge.
        let mut new_faces = Vec::with_capacity(ridge.len());
        for &(a, b, neighbor) in &ridge {
            let new_id = hull
                .faces
                .insert(HullFace::new(hull.points, [p_star, a, b]));
            let edge1 = hull.faces[new_id].edge_index_of(a, b).unwrap();
            hull.faces[new_id].neighbors[edge1] = Some(neighbor);

            let back_edge = hull.faces[neighbor].edge_index_of(b, a).ok_or_else(|| {
                Error::GeometryInconsistent("hull horizon neighbor lookup failed".into())
            })?;
            hull.faces[neighbor].neighbors[back_edge] = Some(new_id);

            new_faces.push(new_id);
        }

        let n = new_faces.len();
        for i in 0..n {
            let next = (i + 1) % n;
            let edge2 = hull.faces[new_faces[i]].edge_index_of(ridge[i].1, p_star).unwrap();
            hull.faces[new_faces[i]].neighbors[edge2] = Some(new_faces[next]);
            let edge0 = hull.faces[new_faces[next]]
                .edge_index_of(p_star, ridge[next].0)
                .unwrap();
            hull.faces[new_faces[next]].neighbors[edge0] = Some(new_faces[i]);
        }

        for &fid in &delete_set {
            hull.faces.remove(fid);
        }

        hull.redistribute(pool, &new_faces);
    }

    Ok(())
}

fn build_output_mesh(hull: &Hull) -> Result<IndexedMesh> {
    let mut out = IndexedMesh::new(3, PrimitiveKind::Triangle);
    for face in hull.faces.values() {
        for &v in &face.verts {
            let p = hull.points[v as usize];
            out.add(&[p.x, p.y, p.z])?;
        }
    }
    out.finalize();
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    fn cube_corners() -> Vec<Vec3> {
        let mut pts = Vec::new();
        for &x in &[-0.5f32, 0.5] {
            for &y in &[-0.5f32, 0.5] {
                for &z in &[-0.5f32, 0.5] {
                    pts.push(Vec3::new(x, y, z));
                }
            }
        }
        pts
    }

    #[test]
    fn cube_hull_has_8_vertices_and_12_faces() {
        let mesh = convex_hull_3d_from_points(&cube_corners()).unwrap();
        assert_eq!(mesh.num_vertices(), 8);
        assert_eq!(mesh.num_indices() / 3, 12);
    }

    #[test]
    fn every_edge_shared_by_exactly_two_faces() {
        let mesh = convex_hull_3d_from_points(&cube_corners()).unwrap();
        let mut edge_count: HashMap<(u32, u32), u32> = HashMap::new();
        for tri in mesh.triangles().unwrap() {
            for i in 0..3 {
                let a = tri[i];
                let b = tri[(i + 1) % 3];
                let key = (a.min(b), a.max(b));
                *edge_count.entry(key).or_insert(0) += 1;
            }
        }
        assert!(edge_count.values().all(|&c| c == 2));
    }

    #[test]
    fn every_point_within_tolerance_of_hull() {
        let corners = cube_corners();
        // add an interior point, must not appear in the hull.
        let mut points = corners.clone();
        points.push(Vec3::ZERO);
        let mesh = convex_hull_3d_from_points(&points).unwrap();
        assert_eq!(mesh.num_vertices(), 8);
    }

    #[test]
    fn colinear_points_error() {
        let pts = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(3.0, 0.0, 0.0),
        ];
        assert!(convex_hull_3d_from_points(&pts).is_err());
    }

    #[test]
    fn coplanar_points_error() {
        let pts = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
        ];
        assert!(convex_hull_3d_from_points(&pts).is_err());
    }

    #[test]
    fn hull_is_idempotent_up_to_ordering() {
        let mesh = convex_hull_3d_from_points(&cube_corners()).unwrap();
        let points: Vec<Vec3> = (0..mesh.num_vertices())
            .map(|i| mesh.position3(i as u32))
            .collect();
        let second = convex_hull_3d_from_points(&points).unwrap();
        assert_eq!(second.num_vertices(), mesh.num_vertices());
        assert_eq!(second.num_indices(), mesh.num_indices());
    }
}
