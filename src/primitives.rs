//! Primitive shape generators (§6.3, supplemented per `SPEC_FULL.md` §C.2
//! from `lib/cube.c`, `cylinder.c`, `uvsphere.c`, `icosphere.c`). Cube,
//! cylinder, and UV sphere each build a raw point cloud and take its
//! [`crate::hull::convex_hull_3d_from_points`]; the icosphere instead
//! subdivides a fixed 20-face icosahedron directly, exactly as the
//! original does, since hull-ing a sphere approximation that is already a
//! valid closed manifold would only add redundant work.

use glam::Vec3;
use itertools::iproduct;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::hull::convex_hull_3d_from_points;
use crate::mesh::indexed::{IndexedMesh, PrimitiveKind};

/// Convex hull of the eight signed corners `(±x, ±y, ±z)` — `x`/`y`/`z` are
/// half-extents, matching `LP_Cube`'s parameters directly (the CLI layer
/// halves its X/Y/Z-size flags before calling this, per §6.3).
#[instrument]
pub fn cube(x: f32, y: f32, z: f32) -> Result<IndexedMesh> {
    let pts: Vec<Vec3> = iproduct!([x, -x], [y, -y], [z, -z])
        .map(|(sx, sy, sz)| Vec3::new(sx, sy, sz))
        .collect();
    convex_hull_3d_from_points(&pts)
}

/// Convex hull of `pts_per_rev` (clamped to `>= 3`) points around each of
/// the top and bottom rims of a cylinder of radius `r` and height `h`
/// (`LP_Cylinder`).
#[instrument]
pub fn cylinder(r: f32, h: f32, pts_per_rev: u32) -> Result<IndexedMesh> {
    let pts_per_rev = pts_per_rev.max(3);
    let mut pts = Vec::with_capacity(2 * pts_per_rev as usize);
    let half_h = h / 2.0;
    let incr = std::f32::consts::TAU / pts_per_rev as f32;
    for i in 0..pts_per_rev {
        let ang = incr * i as f32;
        let (sin, cos) = ang.sin_cos();
        let (xx, yy) = (r * cos, r * sin);
        pts.push(Vec3::new(xx, yy, half_h));
        pts.push(Vec3::new(xx, yy, -half_h));
    }
    convex_hull_3d_from_points(&pts)
}

/// Convex hull of two poles plus `rings - 1` (clamped `>= 2` total rings)
/// latitude rings of `segs` (clamped `>= 3`) points each, over a sphere of
/// the given `radius` (`LP_UVSphere`).
#[instrument]
pub fn uvsphere(radius: f32, segs: u32, rings: u32) -> Result<IndexedMesh> {
    let segs = segs.max(3);
    let rings = rings.max(2);

    let mut pts = Vec::with_capacity(2 + (segs * (rings - 1)) as usize);
    pts.push(Vec3::new(0.0, 0.0, radius));
    pts.push(Vec3::new(0.0, 0.0, -radius));

    let ang_incr = std::f32::consts::TAU / segs as f32;
    let azi_incr = std::f32::consts::PI / rings as f32;
    for azi_count in 1..rings {
        let azi = azi_incr * azi_count as f32 - std::f32::consts::FRAC_PI_2;
        let (sin_azi, cos_azi) = azi.sin_cos();
        let rr = radius * cos_azi;
        let zz = radius * sin_azi;
        for ang_count in 0..segs {
            let ang = ang_incr * ang_count as f32;
            let (sin_a, cos_a) = ang.sin_cos();
            pts.push(Vec3::new(rr * cos_a, rr * sin_a, zz));
        }
    }

    convex_hull_3d_from_points(&pts)
}

fn icosahedron_verts(radius: f32) -> [Vec3; 12] {
    let t = (1.0 + 5.0f32.sqrt()) / 2.0;
    let scale = radius / (1.0 + t * t).sqrt();
    let t = t * scale;
    let s = scale;

    [
        Vec3::new(-s, t, 0.0),
        Vec3::new(s, t, 0.0),
        Vec3::new(-s, -t, 0.0),
        Vec3::new(s, -t, 0.0),
        Vec3::new(0.0, -s, t),
        Vec3::new(0.0, s, t),
        Vec3::new(0.0, -s, -t),
        Vec3::new(0.0, s, -t),
        Vec3::new(t, 0.0, -s),
        Vec3::new(t, 0.0, s),
        Vec3::new(-t, 0.0, -s),
        Vec3::new(-t, 0.0, s),
    ]
}

const ICOSAHEDRON_FACES: [[usize; 3]; 20] = [
    [0, 11, 5],
    [0, 5, 1],
    [0, 1, 7],
    [0, 7, 10],
    [0, 10, 11],
    [1, 5, 9],
    [5, 11, 4],
    [11, 10, 2],
    [10, 7, 6],
    [7, 1, 8],
    [3, 9, 4],
    [3, 4, 2],
    [3, 2, 6],
    [3, 6, 8],
    [3, 8, 9],
    [4, 9, 5],
    [2, 4, 11],
    [6, 2, 10],
    [8, 6, 7],
    [9, 8, 1],
];

fn make_icosahedron(radius: f32) -> Result<IndexedMesh> {
    let verts = icosahedron_verts(radius);
    let mut out = IndexedMesh::new(3, PrimitiveKind::Triangle);
    for face in ICOSAHEDRON_FACES {
        for &v in &face {
            let p = verts[v];
            out.add(&[p.x, p.y, p.z])?;
        }
    }
    out.finalize();
    Ok(out)
}

/// Subdivides each triangle of `mesh` into 4 by the classic midpoint
/// scheme, re-projecting every new vertex onto the sphere of `radius`
/// (`SubDivide`).
fn subdivide(mesh: &IndexedMesh, radius: f32) -> Result<IndexedMesh> {
    let mut out = IndexedMesh::new(3, PrimitiveKind::Triangle);
    for tri in mesh.triangles()? {
        let v1 = mesh.position3(tri[0]);
        let v2 = mesh.position3(tri[1]);
        let v3 = mesh.position3(tri[2]);

        let mid = |a: Vec3, b: Vec3| -> Vec3 { (a + b).normalize() * radius };
        let aa = mid(v1, v2);
        let bb = mid(v1, v3);
        let cc = mid(v2, v3);

        let mut add_tri = |p0: Vec3, p1: Vec3, p2: Vec3| -> Result<()> {
            out.add(&[p0.x, p0.y, p0.z])?;
            out.add(&[p1.x, p1.y, p1.z])?;
            out.add(&[p2.x, p2.y, p2.z])?;
            Ok(())
        };
        add_tri(v1, aa, bb)?;
        add_tri(v2, cc, aa)?;
        add_tri(v3, bb, cc)?;
        add_tri(aa, cc, bb)?;
    }
    out.finalize();
    Ok(out)
}

/// Icosahedron subdivided `num_subdiv` times, each pass quadrupling the
/// face count (`20 * 4^num_subdiv` faces total), every vertex re-projected
/// onto the sphere of `radius` (`LP_IcoSphere`).
#[instrument]
pub fn icosphere(radius: f32, num_subdiv: u32) -> Result<IndexedMesh> {
    if radius <= 0.0 {
        return Err(Error::InvalidInput("icosphere radius must be positive".into()));
    }
    let mut cur = make_icosahedron(radius)?;
    for _ in 0..num_subdiv {
        cur = subdivide(&cur, radius)?;
    }
    Ok(cur)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cube_has_8_vertices_12_faces() {
        let mesh = cube(1.0, 2.0, 3.0).unwrap();
        assert_eq!(mesh.num_vertices(), 8);
        assert_eq!(mesh.num_indices() / 3, 12);
    }

    #[test]
    fn cylinder_hull_has_correct_rim_point_count() {
        let mesh = cylinder(1.0, 2.0, 6).unwrap();
        assert_eq!(mesh.num_vertices(), 12);
    }

    #[test]
    fn uvsphere_hull_is_nonempty_and_closed() {
        let mesh = uvsphere(1.0, 8, 6).unwrap();
        assert!(mesh.num_indices() > 0);
        assert_eq!(mesh.num_indices() % 3, 0);
    }

    #[test]
    fn icosphere_face_count_matches_formula() {
        for n in 0..3u32 {
            let mesh = icosphere(1.0, n).unwrap();
            assert_eq!(mesh.num_indices() / 3, 20 * 4usize.pow(n));
        }
    }

    #[test]
    fn icosphere_vertices_lie_on_sphere() {
        let mesh = icosphere(2.0, 2).unwrap();
        for i in 0..mesh.num_vertices() {
            let p = mesh.position3(i as u32);
            assert!((p.length() - 2.0).abs() < 1e-3);
        }
    }
}
