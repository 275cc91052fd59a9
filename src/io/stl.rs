//! Binary STL reader/writer (§6.1, `lib/file_stl.c`). ASCII STL (files
//! starting with `"solid "`) is not supported for reading. Writing
//! requires exactly one triangle-kind mesh, matching the original's
//! "STL supports exactly one mesh per file".

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use glam::Vec3;
use tracing::instrument;

use crate::error::{Error, Result};
use crate::mesh::indexed::{IndexedMesh, MeshList, PrimitiveKind};

const HEADER_LEN: usize = 80;

fn read_f32(r: &mut impl Read) -> Result<f32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn read_u32(r: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u16(r: &mut impl Read) -> Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn plane_norm(p0: Vec3, p1: Vec3, p2: Vec3) -> Vec3 {
    (p1 - p0).cross(p2 - p1).normalize_or_zero()
}

/// Reads a single binary-STL mesh from `path`. Every face emits three
/// `F = 6` vertices (position + the triangle's shared declared normal),
/// winding corrected to agree with that normal (§6.1).
#[instrument]
pub fn read(path: &Path) -> Result<MeshList> {
    let mut reader = BufReader::new(File::open(path)?);

    let mut probe = [0u8; 6];
    reader.read_exact(&mut probe)?;
    if &probe == b"solid " {
        return Err(Error::FileError("ASCII .stl is not supported for reading".into()));
    }

    let mut rest_header = [0u8; HEADER_LEN - 6];
    reader.read_exact(&mut rest_header)?;

    let num_faces = read_u32(&mut reader)?;

    let mut mesh = IndexedMesh::new(6, PrimitiveKind::Triangle);
    for _ in 0..num_faces {
        let normal = Vec3::new(read_f32(&mut reader)?, read_f32(&mut reader)?, read_f32(&mut reader)?);
        let mut verts = [Vec3::ZERO; 3];
        for v in verts.iter_mut() {
            *v = Vec3::new(read_f32(&mut reader)?, read_f32(&mut reader)?, read_f32(&mut reader)?);
        }
        let attr_bytes = read_u16(&mut reader)?;
        if attr_bytes > 0 {
            let mut skip = vec![0u8; attr_bytes as usize];
            reader.read_exact(&mut skip)?;
        }

        let ccw = plane_norm(verts[0], verts[1], verts[2]);
        if ccw.dot(normal) < 0.0 {
            verts.swap(1, 2);
        }

        for v in verts {
            mesh.add(&[v.x, v.y, v.z, normal.x, normal.y, normal.z])?;
        }
    }
    mesh.finalize();

    let mut list = MeshList::new();
    list.append(mesh);
    Ok(list)
}

/// Writes `meshes` (exactly one triangle-kind mesh) as binary STL,
/// recomputing each face's normal from its vertex positions rather than
/// trusting any stored normal attribute (§6.1).
#[instrument(skip(meshes))]
pub fn write(path: &Path, meshes: &MeshList) -> Result<()> {
    if meshes.len() != 1 {
        return Err(Error::InvalidInput(
            "STL supports exactly one mesh per file".into(),
        ));
    }
    let mesh = &meshes[0];
    if mesh.primitive_kind() != PrimitiveKind::Triangle || mesh.floats_per_vertex() < 3 {
        return Err(Error::InvalidInput(
            "STL writer requires a triangle-kind mesh with floats_per_vertex >= 3".into(),
        ));
    }

    let mut out = BufWriter::new(File::create(path)?);

    let mut header = [0u8; HEADER_LEN];
    let banner = b"binary stl polyhedra\n";
    header[..banner.len()].copy_from_slice(banner);
    out.write_all(&header)?;

    let triangles: Vec<[u32; 3]> = mesh.triangles()?.collect();
    out.write_all(&(triangles.len() as u32).to_le_bytes())?;

    for tri in triangles {
        let p: Vec<Vec3> = tri.iter().map(|&i| mesh.position3(i)).collect();
        let normal = plane_norm(p[0], p[1], p[2]);

        for comp in [normal.x, normal.y, normal.z] {
            out.write_all(&comp.to_le_bytes())?;
        }
        for v in &p {
            for comp in [v.x, v.y, v.z] {
                out.write_all(&comp.to_le_bytes())?;
            }
        }
        out.write_all(&0u16.to_le_bytes())?;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("polyhedra-stl-test-{name}-{}.stl", std::process::id()))
    }

    fn triangle_mesh() -> IndexedMesh {
        let mut m = IndexedMesh::new(3, PrimitiveKind::Triangle);
        m.add(&[0.0, 0.0, 0.0]).unwrap();
        m.add(&[1.0, 0.0, 0.0]).unwrap();
        m.add(&[0.0, 1.0, 0.0]).unwrap();
        m.finalize();
        m
    }

    #[test]
    fn write_then_read_round_trips_triangle_count() {
        let path = temp_path("roundtrip");
        let mut list = MeshList::new();
        list.append(triangle_mesh());
        write(&path, &list).unwrap();

        let read_back = read(&path).unwrap();
        assert_eq!(read_back.len(), 1);
        assert_eq!(read_back[0].num_indices() / 3, 1);
        assert_eq!(read_back[0].floats_per_vertex(), 6);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn write_rejects_multiple_meshes() {
        let path = temp_path("multi");
        let mut list = MeshList::new();
        list.append(triangle_mesh());
        list.append(triangle_mesh());
        assert!(write(&path, &list).is_err());
    }

    #[test]
    fn ascii_header_is_rejected_on_read() {
        let path = temp_path("ascii");
        {
            let mut f = File::create(&path).unwrap();
            f.write_all(b"solid test\nendsolid test\n").unwrap();
        }
        assert!(read(&path).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn reader_corrects_winding_against_declared_normal() {
        let path = temp_path("winding");
        {
            let mut f = File::create(&path).unwrap();
            f.write_all(&[0u8; HEADER_LEN]).unwrap();
            f.write_all(&1u32.to_le_bytes()).unwrap();
            // Declared normal points -Z, but the vertex winding below is CCW
            // for +Z; the reader must swap v1/v2 to match.
            for comp in [0.0f32, 0.0, -1.0] {
                f.write_all(&comp.to_le_bytes()).unwrap();
            }
            let verts = [[0.0f32, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
            for v in verts {
                for comp in v {
                    f.write_all(&comp.to_le_bytes()).unwrap();
                }
            }
            f.write_all(&0u16.to_le_bytes()).unwrap();
        }
        let meshes = read(&path).unwrap();
        let mesh = &meshes[0];
        let tri: Vec<[u32; 3]> = mesh.triangles().unwrap().collect();
        let p0 = mesh.position3(tri[0][0]);
        let p1 = mesh.position3(tri[0][1]);
        let p2 = mesh.position3(tri[0][2]);
        let normal = plane_norm(p0, p1, p2);
        assert!(normal.z < 0.0);
        std::fs::remove_file(&path).ok();
    }
}
