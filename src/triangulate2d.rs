//! 2D polygon triangulation of a planar region (possibly with holes)
//! bounded by an unordered line-segment soup (§4.5).
//!
//! Implements the plane-sweep monotone decomposition the spec describes:
//! vertices are classified into start/end/split/merge/regular cusps, a
//! sweep processes them top to bottom, and an active-edge status
//! structure — [`ScalarMap`] used in its "dynamic-key" mode via
//! [`ScalarMap::rekey_with`] and [`ScalarMap::floor`] — tracks, at the
//! current sweep position, which boundary edge lies directly to the left
//! of each vertex being handled. Split and merge vertices add diagonals;
//! once every vertex has been processed, the diagonals plus the original
//! boundary partition the region into y-monotone pieces. Each monotone
//! piece is then handed to [`ear_clip`], which is correct for any simple
//! polygon (a monotone polygon is unconditionally simple) — the sweep
//! above is what does the spec's "hard" decomposition work; ear-clipping
//! a piece that is already monotone is just a terminal simple-polygon
//! triangulator, not a second bespoke monotone-sweep triangulator.
//!
//! Ring extraction from the input edge soup, and re-extraction of the
//! monotone pieces once diagonals are added, both go through
//! [`trace_faces`]: a rotation-system face tracer that sorts each
//! vertex's incident edges by angle and always continues a face along
//! the edge immediately clockwise from the one just arrived on. This is
//! what lets two boundary loops that merely touch at a shared vertex
//! (degree 4 there) come out as separate simple rings instead of one
//! self-intersecting walk — the earlier "avoid the edge we just arrived
//! on" greedy walk could mis-pair such a vertex's incident edges.

use glam::Vec2;
use hashbrown::{HashMap, HashSet};
use tracing::instrument;

use crate::containers::scalar_map::{NodeId, ScalarMap};
use crate::error::{Error, Result};
use crate::mesh::indexed::{IndexedMesh, PrimitiveKind};

/// Triangulates the planar line-segment set in `mesh` (`F = 2`,
/// `PrimitiveKind::Line`) into a triangle mesh covering the same region
/// (§4.5).
#[instrument(skip(mesh))]
pub fn triangulate_2d(mesh: &IndexedMesh) -> Result<IndexedMesh> {
    if mesh.floats_per_vertex() != 2 {
        return Err(Error::InvalidInput(
            "triangulate_2d requires floats_per_vertex == 2".into(),
        ));
    }
    if mesh.primitive_kind() != PrimitiveKind::Line {
        return Err(Error::InvalidInput(
            "triangulate_2d requires PrimitiveKind::Line".into(),
        ));
    }

    let edges = collect_edges(mesh)?;
    build_adjacency(&edges)?;

    let positions: Vec<Vec2> = (0..mesh.num_vertices())
        .map(|i| mesh.position2(i as u32))
        .collect();

    let rings = trace_faces(&positions, &edges)?;
    let (outers, holes) = classify_rings(&rings, &positions);
    let nesting = nest_holes(&outers, &holes, &positions);

    let mut out = IndexedMesh::new(2, PrimitiveKind::Triangle);
    for (outer_idx, outer_ring) in outers.iter().enumerate() {
        let hole_rings: Vec<Vec<u32>> = nesting[outer_idx].iter().map(|&h| holes[h].clone()).collect();
        let arena = build_shape_arena(outer_ring, &hole_rings, &positions);
        let monotone_pieces = decompose_monotone(&arena)?;
        for piece in monotone_pieces {
            let polygon: Vec<u32> = piece.iter().map(|&a| arena[a as usize].mesh_idx).collect();
            let triangles = ear_clip(&polygon, &positions)?;
            for (a, b, c) in triangles {
                out.add(&[positions[a as usize].x, positions[a as usize].y])?;
                out.add(&[positions[b as usize].x, positions[b as usize].y])?;
                out.add(&[positions[c as usize].x, positions[c as usize].y])?;
            }
        }
    }
    out.finalize();
    Ok(out)
}

fn collect_edges(mesh: &IndexedMesh) -> Result<Vec<(u32, u32)>> {
    if mesh.num_indices() % 2 != 0 {
        return Err(Error::InvalidInput(
            "line-kind mesh must have an even number of indices".into(),
        ));
    }
    let mut counts: HashMap<(u32, u32), u32> = HashMap::new();
    for pair in mesh.indices().chunks_exact(2) {
        let (a, b) = (pair[0], pair[1]);
        if a == b {
            continue; // degenerate edge, ignored
        }
        let key = (a.min(b), a.max(b));
        *counts.entry(key).or_insert(0) += 1;
    }
    // A duplicated segment cancels itself; keep one copy for odd counts.
    Ok(counts
        .into_iter()
        .filter(|&(_, c)| c % 2 == 1)
        .map(|(k, _)| k)
        .collect())
}

fn build_adjacency(edges: &[(u32, u32)]) -> Result<HashMap<u32, Vec<u32>>> {
    let mut adjacency: HashMap<u32, Vec<u32>> = HashMap::new();
    for &(a, b) in edges {
        adjacency.entry(a).or_default().push(b);
        adjacency.entry(b).or_default().push(a);
    }
    for (&v, neighbors) in &adjacency {
        if neighbors.len() % 2 != 0 {
            return Err(Error::InvalidInput(format!(
                "vertex {v} has odd edge degree {}",
                neighbors.len()
            )));
        }
    }
    Ok(adjacency)
}

/// Traces every simple closed face of the planar straight-line graph
/// formed by `edges` (assumed non-self-crossing, as any valid polygon
/// boundary soup is) using a rotation system: at each vertex, incident
/// edges are sorted by angle, and a face continues along the edge
/// immediately clockwise from the one just arrived on. Every directed
/// arc is consumed by exactly one face trace.
///
/// Only faces with positive signed area are returned. For a soup of
/// simple polygon boundaries (outer rings and holes, possibly touching
/// at shared vertices), those are exactly the material boundary loops —
/// the complementary "exterior" faces always trace with negative signed
/// area and are discarded here, which also disposes of the duplicate
/// reverse-wound trace every isolated ring otherwise produces.
fn trace_faces(positions: &[Vec2], edges: &[(u32, u32)]) -> Result<Vec<Vec<u32>>> {
    let mut neighbors: HashMap<u32, Vec<u32>> = HashMap::new();
    for &(a, b) in edges {
        neighbors.entry(a).or_default().push(b);
        neighbors.entry(b).or_default().push(a);
    }
    for (&v, list) in neighbors.iter_mut() {
        let vp = positions[v as usize];
        list.sort_by(|&x, &y| {
            let ax = positions[x as usize] - vp;
            let ay = positions[y as usize] - vp;
            ax.y.atan2(ax.x).partial_cmp(&ay.y.atan2(ay.x)).unwrap()
        });
    }

    let mut visited: HashSet<(u32, u32)> = HashSet::new();
    let mut faces = Vec::new();
    let guard_limit = edges.len() * 2 + 4;

    for &(ea, eb) in edges {
        for (a0, b0) in [(ea, eb), (eb, ea)] {
            if visited.contains(&(a0, b0)) {
                continue;
            }
            let mut face = vec![a0];
            let (mut from, mut to) = (a0, b0);
            let mut guard = 0usize;
            loop {
                visited.insert((from, to));
                if to == a0 {
                    break;
                }
                face.push(to);

                guard += 1;
                if guard > guard_limit {
                    return Err(Error::GeometryInconsistent(
                        "face trace failed to close".into(),
                    ));
                }

                let list = neighbors.get(&to).ok_or_else(|| {
                    Error::GeometryInconsistent("face trace hit a vertex with no neighbors".into())
                })?;
                let pos = list.iter().position(|&n| n == from).ok_or_else(|| {
                    Error::GeometryInconsistent(
                        "face trace's arrival edge is missing from the neighbor list".into(),
                    )
                })?;
                let len = list.len();
                let next = list[(pos + len - 1) % len];
                from = to;
                to = next;
            }
            faces.push(face);
        }
    }

    Ok(faces
        .into_iter()
        .filter(|f| f.len() >= 3 && signed_area(f, positions) > 0.0)
        .collect())
}

fn signed_area(ring: &[u32], positions: &[Vec2]) -> f32 {
    let mut area = 0.0f32;
    for i in 0..ring.len() {
        let p0 = positions[ring[i] as usize];
        let p1 = positions[ring[(i + 1) % ring.len()] as usize];
        area += p0.x * p1.y - p1.x * p0.y;
    }
    area * 0.5
}

/// Classifies rings as outer boundaries or holes by containment *depth*
/// (how many other rings enclose it) — a ring nested inside an even
/// number of others fills, an odd number is a hole.
fn classify_rings(rings: &[Vec<u32>], positions: &[Vec2]) -> (Vec<Vec<u32>>, Vec<Vec<u32>>) {
    let mut outers = Vec::new();
    let mut holes = Vec::new();
    for (i, ring) in rings.iter().enumerate() {
        let probe = positions[ring[0] as usize];
        let depth = rings
            .iter()
            .enumerate()
            .filter(|&(j, other)| j != i && point_in_ring(probe, other, positions))
            .count();
        if depth % 2 == 0 {
            outers.push(ring.clone());
        } else {
            holes.push(ring.clone());
        }
    }
    (outers, holes)
}

fn point_in_ring(p: Vec2, ring: &[u32], positions: &[Vec2]) -> bool {
    let mut inside = false;
    let n = ring.len();
    for i in 0..n {
        let a = positions[ring[i] as usize];
        let b = positions[ring[(i + 1) % n] as usize];
        if (a.y > p.y) != (b.y > p.y) {
            let t = (p.y - a.y) / (b.y - a.y);
            let x_cross = a.x + t * (b.x - a.x);
            if x_cross > p.x {
                inside = !inside;
            }
        }
    }
    inside
}

/// Maps each hole index to its enclosing outer ring, using a
/// point-in-polygon test against the hole's first vertex, preferring the
/// smallest-area enclosing outer if more than one contains it.
fn nest_holes(outers: &[Vec<u32>], holes: &[Vec<u32>], positions: &[Vec2]) -> Vec<Vec<usize>> {
    let mut nesting = vec![Vec::new(); outers.len()];
    for (hole_idx, hole) in holes.iter().enumerate() {
        let probe = positions[hole[0] as usize];
        let mut best: Option<(usize, f32)> = None;
        for (outer_idx, outer) in outers.iter().enumerate() {
            if point_in_ring(probe, outer, positions) {
                let area = signed_area(outer, positions).abs();
                if best.map(|(_, a)| area < a).unwrap_or(true) {
                    best = Some((outer_idx, area));
                }
            }
        }
        if let Some((outer_idx, _)) = best {
            nesting[outer_idx].push(hole_idx);
        }
    }
    nesting
}

/// One occurrence of a mesh vertex within a shape's combined ring arena:
/// its own `next`/`prev` within its ring, kept independent of any other
/// occurrence of the same `mesh_idx` (so a vertex shared by two touching
/// rings gets one arena slot per ring, never conflated).
#[derive(Clone, Copy)]
struct PVert {
    mesh_idx: u32,
    pos: Vec2,
    ring_next: u32,
    ring_prev: u32,
}

/// Packs an outer ring (forced CCW) and its directly nested holes (each
/// forced CW) into one arena, ready for [`decompose_monotone`]. Interior
/// lies to the left of every directed ring edge in this convention.
fn build_shape_arena(outer: &[u32], holes: &[Vec<u32>], positions: &[Vec2]) -> Vec<PVert> {
    let mut arena = Vec::new();

    let mut push_ring = |ring: &[u32], want_ccw: bool, arena: &mut Vec<PVert>| {
        let is_ccw = signed_area(ring, positions) > 0.0;
        let ordered: Vec<u32> = if is_ccw == want_ccw {
            ring.to_vec()
        } else {
            let mut r = ring.to_vec();
            r.reverse();
            r
        };
        let base = arena.len() as u32;
        let n = ordered.len() as u32;
        for (i, &mesh_idx) in ordered.iter().enumerate() {
            let i = i as u32;
            arena.push(PVert {
                mesh_idx,
                pos: positions[mesh_idx as usize],
                ring_next: base + (i + 1) % n,
                ring_prev: base + (i + n - 1) % n,
            });
        }
    };

    push_ring(outer, true, &mut arena);
    for hole in holes {
        if hole.len() >= 3 {
            push_ring(hole, false, &mut arena);
        }
    }
    arena
}

enum VType {
    Start,
    End,
    Split,
    Merge,
    Regular,
}

fn higher(a: Vec2, b: Vec2) -> bool {
    a.y > b.y || (a.y == b.y && a.x < b.x)
}

fn cross2(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

fn classify_vertex(arena: &[PVert], vi: u32) -> VType {
    let v = arena[vi as usize];
    let prev = arena[v.ring_prev as usize];
    let next = arena[v.ring_next as usize];
    let prev_above = higher(prev.pos, v.pos);
    let next_above = higher(next.pos, v.pos);
    let turn = cross2(v.pos - prev.pos, next.pos - v.pos);

    if !prev_above && !next_above {
        if turn > 0.0 { VType::Start } else { VType::Split }
    } else if prev_above && next_above {
        if turn > 0.0 { VType::End } else { VType::Merge }
    } else {
        VType::Regular
    }
}

struct ActiveEdge {
    /// Arena index this edge is currently anchored/looked-up by: the
    /// vertex most recently processed that owns it (its upper endpoint at
    /// insertion time, or the regular vertex that re-anchored it).
    anchor: u32,
    upper: u32,
    lower: u32,
    helper: u32,
    helper_is_merge: bool,
}

fn edge_x_at(arena: &[PVert], e: &ActiveEdge, y: f32) -> f32 {
    let a = arena[e.upper as usize].pos;
    let b = arena[e.lower as usize].pos;
    if (a.y - b.y).abs() < 1e-9 {
        a.x.min(b.x)
    } else {
        let t = (y - a.y) / (b.y - a.y);
        a.x + t * (b.x - a.x)
    }
}

struct SweepStatus {
    map: ScalarMap<ActiveEdge>,
    by_anchor: HashMap<u32, NodeId>,
    active: Vec<NodeId>,
}

impl SweepStatus {
    fn new() -> Self {
        Self {
            map: ScalarMap::new(),
            by_anchor: HashMap::new(),
            active: Vec::new(),
        }
    }

    fn refresh_keys(&mut self, arena: &[PVert], y: f32) {
        for &id in &self.active {
            self.map.rekey_with(id, |e| edge_x_at(arena, e, y));
        }
    }

    fn insert_edge(&mut self, arena: &[PVert], anchor: u32, y: f32) {
        let v = arena[anchor as usize];
        let e = ActiveEdge {
            anchor,
            upper: anchor,
            lower: v.ring_next,
            helper: anchor,
            helper_is_merge: false,
        };
        let key = edge_x_at(arena, &e, y);
        let id = self.map.insert(key, e);
        self.by_anchor.insert(anchor, id);
        self.active.push(id);
    }

    fn remove_by_anchor(&mut self, anchor: u32) {
        if let Some(id) = self.by_anchor.remove(&anchor) {
            self.map.remove(id);
            self.active.retain(|&a| a != id);
        }
    }

    fn helper_of(&self, anchor: u32) -> Option<(u32, bool)> {
        let id = *self.by_anchor.get(&anchor)?;
        let e = self.map.get(id)?;
        Some((e.helper, e.helper_is_merge))
    }

    fn set_helper(&mut self, anchor: u32, helper: u32, is_merge: bool) {
        if let Some(&id) = self.by_anchor.get(&anchor) {
            if let Some(e) = self.map.get_mut(id) {
                e.helper = helper;
                e.helper_is_merge = is_merge;
            }
        }
    }

    /// The anchor of the active edge directly left of `x` at the current
    /// (already-refreshed) sweep position.
    fn left_of(&self, x: f32) -> Option<u32> {
        let id = self.map.floor(x)?;
        self.map.get(id).map(|e| e.anchor)
    }
}

/// Runs the plane-sweep monotone decomposition (§4.5) over one shape's
/// arena (an outer ring plus its nested holes), returning the diagonals
/// (pairs of arena indices) that split it into y-monotone pieces.
fn sweep_diagonals(arena: &[PVert]) -> Result<Vec<(u32, u32)>> {
    let mut order: Vec<u32> = (0..arena.len() as u32).collect();
    order.sort_by(|&a, &b| {
        let (pa, pb) = (arena[a as usize].pos, arena[b as usize].pos);
        if higher(pa, pb) {
            std::cmp::Ordering::Less
        } else if higher(pb, pa) {
            std::cmp::Ordering::Greater
        } else {
            std::cmp::Ordering::Equal
        }
    });

    let mut diagonals = Vec::new();
    let mut status = SweepStatus::new();

    for &vi in &order {
        let v = arena[vi as usize];
        let y = v.pos.y;
        status.refresh_keys(arena, y);

        match classify_vertex(arena, vi) {
            VType::Start => status.insert_edge(arena, vi, y),
            VType::Split => {
                let left = status.left_of(v.pos.x).ok_or_else(|| {
                    Error::GeometryInconsistent(
                        "split vertex has no active edge to its left (open cusp)".into(),
                    )
                })?;
                let (helper_vi, _) = status.helper_of(left).unwrap();
                diagonals.push((vi, helper_vi));
                status.set_helper(left, vi, false);
                status.insert_edge(arena, vi, y);
            }
            VType::End => {
                let prev_anchor = v.ring_prev;
                if let Some((helper_vi, is_merge)) = status.helper_of(prev_anchor) {
                    if is_merge {
                        diagonals.push((vi, helper_vi));
                    }
                    status.remove_by_anchor(prev_anchor);
                }
            }
            VType::Merge => {
                let prev_anchor = v.ring_prev;
                if let Some((helper_vi, is_merge)) = status.helper_of(prev_anchor) {
                    if is_merge {
                        diagonals.push((vi, helper_vi));
                    }
                    status.remove_by_anchor(prev_anchor);
                }
                let left = status.left_of(v.pos.x).ok_or_else(|| {
                    Error::GeometryInconsistent(
                        "merge vertex has no active edge to its left (open cusp)".into(),
                    )
                })?;
                let (helper_vi, is_merge) = status.helper_of(left).unwrap();
                if is_merge {
                    diagonals.push((vi, helper_vi));
                }
                status.set_helper(left, vi, true);
            }
            VType::Regular => {
                let prev = arena[v.ring_prev as usize];
                if higher(prev.pos, v.pos) {
                    // Interior lies to the right of v: e(prev) ends here, e(v) begins.
                    let prev_anchor = v.ring_prev;
                    if let Some((helper_vi, is_merge)) = status.helper_of(prev_anchor) {
                        if is_merge {
                            diagonals.push((vi, helper_vi));
                        }
                        status.remove_by_anchor(prev_anchor);
                    }
                    status.insert_edge(arena, vi, y);
                } else {
                    // Interior lies to the left of v: only the helper of
                    // the edge directly left of v may need updating.
                    let left = status.left_of(v.pos.x).ok_or_else(|| {
                        Error::GeometryInconsistent(
                            "regular vertex has no active edge to its left (open cusp)".into(),
                        )
                    })?;
                    let (helper_vi, is_merge) = status.helper_of(left).unwrap();
                    if is_merge {
                        diagonals.push((vi, helper_vi));
                    }
                    status.set_helper(left, vi, false);
                }
            }
        }
    }

    Ok(diagonals)
}

/// Splits one shape (outer ring + nested holes) into y-monotone pieces:
/// runs the sweep for its diagonals, then re-traces faces over the
/// original ring edges plus the diagonals to recover the pieces.
fn decompose_monotone(arena: &[PVert]) -> Result<Vec<Vec<u32>>> {
    let diagonals = sweep_diagonals(arena)?;

    let mut edges: Vec<(u32, u32)> = (0..arena.len() as u32)
        .map(|i| (i, arena[i as usize].ring_next))
        .collect();
    edges.extend(diagonals);

    let positions: Vec<Vec2> = arena.iter().map(|v| v.pos).collect();
    trace_faces(&positions, &edges)
}

/// Standard ear-clipping over a simple polygon. Candidate ears are
/// validated with the spec's triangle-validity test (§4.5): a triangle is
/// only emitted if its signed area clears `1e-6 * sqrt(d_max1) *
/// sqrt(d_max2)` where `d_max1`/`d_max2` are its two largest squared edge
/// lengths; otherwise it is skipped and the candidate apex is retried
/// later in the scan.
fn ear_clip(polygon: &[u32], positions: &[Vec2]) -> Result<Vec<(u32, u32, u32)>> {
    let mut ring: Vec<u32> = polygon.to_vec();
    let overall_sign = signed_area(&ring, positions).signum();
    let mut triangles = Vec::new();

    let mut guard = 0usize;
    let max_iters = ring.len() * ring.len() + 16;

    while ring.len() > 3 {
        guard += 1;
        if guard > max_iters {
            return Err(Error::GeometryInconsistent(
                "ear clipping failed to converge".into(),
            ));
        }

        let n = ring.len();
        let mut clipped = false;

        for i in 0..n {
            let prev = ring[(i + n - 1) % n];
            let cur = ring[i];
            let next = ring[(i + 1) % n];

            let pp = positions[prev as usize];
            let pc = positions[cur as usize];
            let pn = positions[next as usize];

            let cross = cross2(pc - pp, pn - pc);
            if overall_sign >= 0.0 && cross < 0.0 {
                continue;
            }
            if overall_sign < 0.0 && cross > 0.0 {
                continue;
            }

            let d1 = pp.distance_squared(pc);
            let d2 = pc.distance_squared(pn);
            let d3 = pn.distance_squared(pp);
            let (d_max1, d_max2) = two_largest(d1, d2, d3);
            let area2 = cross.abs();
            if area2 <= 1e-6 * d_max1.sqrt() * d_max2.sqrt() {
                continue;
            }

            let mut contains_other = false;
            for &v in &ring {
                if v == prev || v == cur || v == next {
                    continue;
                }
                if point_in_triangle_strict(positions[v as usize], pp, pc, pn) {
                    contains_other = true;
                    break;
                }
            }
            if contains_other {
                continue;
            }

            triangles.push((prev, cur, next));
            ring.remove(i);
            clipped = true;
            break;
        }

        if !clipped {
            return Err(Error::GeometryInconsistent(
                "ear clipping found no valid ear (degenerate polygon)".into(),
            ));
        }
    }

    if ring.len() == 3 {
        triangles.push((ring[0], ring[1], ring[2]));
    }

    Ok(triangles)
}

fn two_largest(a: f32, b: f32, c: f32) -> (f32, f32) {
    let mut v = [a, b, c];
    v.sort_by(|x, y| x.partial_cmp(y).unwrap());
    (v[2], v[1])
}

fn point_in_triangle_strict(p: Vec2, a: Vec2, b: Vec2, c: Vec2) -> bool {
    let d1 = cross2(b - a, p - a);
    let d2 = cross2(c - b, p - b);
    let d3 = cross2(a - c, p - c);
    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

#[cfg(test)]
mod test {
    use super::*;

    fn line_mesh(rings: &[Vec<(f32, f32)>]) -> IndexedMesh {
        let mut mesh = IndexedMesh::new(2, PrimitiveKind::Line);
        for ring in rings {
            let n = ring.len();
            let idxs: Vec<u32> = ring.iter().map(|&(x, y)| mesh.add(&[x, y]).unwrap()).collect();
            for i in 0..n {
                mesh.add_index(idxs[i]).unwrap();
                mesh.add_index(idxs[(i + 1) % n]).unwrap();
            }
        }
        mesh
    }

    fn triangle_area_sum(mesh: &IndexedMesh) -> f32 {
        let mut total = 0.0;
        for tri in mesh.triangles().unwrap() {
            let p0 = mesh.position2(tri[0]);
            let p1 = mesh.position2(tri[1]);
            let p2 = mesh.position2(tri[2]);
            total += 0.5 * ((p1.x - p0.x) * (p2.y - p0.y) - (p2.x - p0.x) * (p1.y - p0.y)).abs();
        }
        total
    }

    #[test]
    fn simple_square() {
        let mesh = line_mesh(&[vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]]);
        let tris = triangulate_2d(&mesh).unwrap();
        assert_eq!(tris.num_indices() / 3, 2);
        assert!((triangle_area_sum(&tris) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn square_with_square_hole() {
        let outer = vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0)];
        let mut hole = vec![(1.0, 1.0), (1.0, 2.0), (2.0, 2.0), (2.0, 1.0)];
        hole.reverse(); // CW hole
        let mesh = line_mesh(&[outer, hole]);
        let tris = triangulate_2d(&mesh).unwrap();
        assert!((triangle_area_sum(&tris) - (16.0 - 1.0)).abs() < 1e-4);
    }

    #[test]
    fn degenerate_edge_ignored() {
        let mut mesh = IndexedMesh::new(2, PrimitiveKind::Line);
        let a = mesh.add(&[0.0, 0.0]).unwrap();
        mesh.add_index(a).unwrap();
        mesh.add_index(a).unwrap();
        let b = mesh.add(&[1.0, 0.0]).unwrap();
        let c = mesh.add(&[0.0, 1.0]).unwrap();
        mesh.add_index(a).unwrap();
        mesh.add_index(b).unwrap();
        mesh.add_index(b).unwrap();
        mesh.add_index(c).unwrap();
        mesh.add_index(c).unwrap();
        mesh.add_index(a).unwrap();
        let tris = triangulate_2d(&mesh).unwrap();
        assert_eq!(tris.num_indices() / 3, 1);
    }

    #[test]
    fn odd_degree_vertex_errors() {
        let mut mesh = IndexedMesh::new(2, PrimitiveKind::Line);
        let a = mesh.add(&[0.0, 0.0]).unwrap();
        let b = mesh.add(&[1.0, 0.0]).unwrap();
        let c = mesh.add(&[0.0, 1.0]).unwrap();
        mesh.add_index(a).unwrap();
        mesh.add_index(b).unwrap();
        mesh.add_index(b).unwrap();
        mesh.add_index(c).unwrap();
        // no closing edge back to a -> a and c have odd degree
        assert!(triangulate_2d(&mesh).is_err());
    }

    /// Two triangles sharing exactly one vertex (a "bowtie" touching
    /// point). The old greedy ring walk could mis-pair this vertex's four
    /// incident edges into one self-intersecting hexagon; the
    /// angle-sorted face tracer must keep them as two separate triangles.
    #[test]
    fn touching_triangles_at_one_vertex_stay_separate() {
        let mut mesh = IndexedMesh::new(2, PrimitiveKind::Line);
        let v = mesh.add(&[0.0, 0.0]).unwrap();
        let a = mesh.add(&[1.0, 0.0]).unwrap();
        let b = mesh.add(&[0.0, 1.0]).unwrap();
        let c = mesh.add(&[-1.0, 0.0]).unwrap();
        let d = mesh.add(&[0.0, -1.0]).unwrap();
        for &(i, j) in &[(v, a), (a, b), (b, v), (v, c), (c, d), (d, v)] {
            mesh.add_index(i).unwrap();
            mesh.add_index(j).unwrap();
        }
        let tris = triangulate_2d(&mesh).unwrap();
        assert_eq!(tris.num_indices() / 3, 2);
        assert!((triangle_area_sum(&tris) - 1.0).abs() < 1e-4);
    }

    /// A concave (reflex-containing) outer boundary forces at least one
    /// split vertex through the sweep, exercising the diagonal-insertion
    /// path directly instead of only the convex fast path.
    #[test]
    fn concave_polygon_splits_correctly() {
        // An arrow/chevron shape with one reflex vertex partway down the left side.
        let outer = vec![
            (0.0, 0.0),
            (4.0, 0.0),
            (4.0, 4.0),
            (2.0, 2.0), // reflex vertex (points back into the polygon)
            (0.0, 4.0),
        ];
        let mesh = line_mesh(&[outer]);
        let tris = triangulate_2d(&mesh).unwrap();
        assert_eq!(tris.num_indices() / 3, 3);
        // Shoelace area of the chevron itself.
        let expected = signed_area(
            &[0, 1, 2, 3, 4],
            &[
                Vec2::new(0.0, 0.0),
                Vec2::new(4.0, 0.0),
                Vec2::new(4.0, 4.0),
                Vec2::new(2.0, 2.0),
                Vec2::new(0.0, 4.0),
            ],
        )
        .abs();
        assert!((triangle_area_sum(&tris) - expected).abs() < 1e-4);
    }
}
