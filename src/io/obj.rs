//! Wavefront `.obj` reader/writer (§6.1, `lib/file_obj.c`).
//!
//! A file is a sequence of meshes, one per `o` directive (or the whole
//! file if none appear). Floats-per-vertex is inferred per mesh from
//! which of `vt`/`vn` were present: 3 with neither, 5 with `vn` only, 6
//! with `vt` only, 8 with both — the original's literal `fpv == 5`/`fpv
//! == 6` checks on write, preserved here rather than "fixed" to the more
//! obvious `vt`-is-2-floats/`vn`-is-3-floats arithmetic (see `DESIGN.md`).

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::instrument;

use crate::error::{Error, Result};
use crate::mesh::indexed::{IndexedMesh, MeshList, PrimitiveKind};

struct RawMesh {
    has_vt: bool,
    has_vn: bool,
    /// Each entry is `(position, uv, normal)` indices into the file-global
    /// `v`/`vt`/`vn` tables, gathered for this mesh only.
    faces: Vec<[(usize, Option<usize>, Option<usize>); 3]>,
}

fn floats_per_vertex(has_vt: bool, has_vn: bool) -> usize {
    match (has_vt, has_vn) {
        (false, false) => 3,
        (false, true) => 5,
        (true, false) => 6,
        (true, true) => 8,
    }
}

fn parse_vertex_ref(tok: &str) -> Result<(usize, Option<usize>, Option<usize>)> {
    let parts: Vec<&str> = tok.split('/').collect();
    let bad = || Error::InvalidInput(format!("malformed face vertex reference: '{tok}'"));

    let v: usize = parts.first().ok_or_else(bad)?.parse().map_err(|_| bad())?;
    let vt = match parts.get(1) {
        Some(&s) if !s.is_empty() => Some(s.parse::<usize>().map_err(|_| bad())?),
        _ => None,
    };
    let vn = match parts.get(2) {
        Some(&s) if !s.is_empty() => Some(s.parse::<usize>().map_err(|_| bad())?),
        _ => None,
    };
    Ok((v, vt, vn))
}

/// Reads every mesh in `path`, one per `o` directive (§6.1).
#[instrument]
pub fn read(path: &Path) -> Result<MeshList> {
    let reader = BufReader::new(File::open(path)?);

    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut uvs: Vec<[f32; 2]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();

    let mut raw_meshes: Vec<RawMesh> = vec![RawMesh {
        has_vt: false,
        has_vn: false,
        faces: Vec::new(),
    }];

    for line in reader.lines() {
        let line = line?;
        let mut tokens = line.split_whitespace();
        let Some(directive) = tokens.next() else {
            continue;
        };

        match directive {
            "#" => continue,
            "o" => {
                raw_meshes.push(RawMesh {
                    has_vt: false,
                    has_vn: false,
                    faces: Vec::new(),
                });
            }
            "v" => {
                let vals: Vec<f32> = tokens
                    .map(|t| t.parse::<f32>())
                    .collect::<std::result::Result<_, _>>()?;
                if vals.len() < 3 {
                    return Err(Error::InvalidInput("'v' directive needs 3 floats".into()));
                }
                positions.push([vals[0], vals[1], vals[2]]);
            }
            "vt" => {
                let vals: Vec<f32> = tokens
                    .map(|t| t.parse::<f32>())
                    .collect::<std::result::Result<_, _>>()?;
                if vals.len() < 2 {
                    return Err(Error::InvalidInput("'vt' directive needs 2 floats".into()));
                }
                uvs.push([vals[0], 1.0 - vals[1]]);
            }
            "vn" => {
                let vals: Vec<f32> = tokens
                    .map(|t| t.parse::<f32>())
                    .collect::<std::result::Result<_, _>>()?;
                if vals.len() < 3 {
                    return Err(Error::InvalidInput("'vn' directive needs 3 floats".into()));
                }
                normals.push([vals[0], vals[1], vals[2]]);
            }
            "f" => {
                let refs: Vec<&str> = tokens.collect();
                if refs.len() != 3 {
                    return Err(Error::InvalidInput(
                        "only triangular faces are supported".into(),
                    ));
                }
                let mut parsed = [(0usize, None, None); 3];
                for (slot, tok) in parsed.iter_mut().zip(refs.iter()) {
                    *slot = parse_vertex_ref(tok)?;
                }

                let mesh = raw_meshes.last_mut().expect("always at least one mesh");
                for &(v, vt, vn) in &parsed {
                    if v == 0 || v > positions.len() {
                        return Err(Error::InvalidInput(format!("face references undeclared v {v}")));
                    }
                    if let Some(vt) = vt {
                        if vt == 0 || vt > uvs.len() {
                            return Err(Error::InvalidInput(format!("face references undeclared vt {vt}")));
                        }
                        mesh.has_vt = true;
                    }
                    if let Some(vn) = vn {
                        if vn == 0 || vn > normals.len() {
                            return Err(Error::InvalidInput(format!("face references undeclared vn {vn}")));
                        }
                        mesh.has_vn = true;
                    }
                }
                mesh.faces.push(parsed);
            }
            _ => continue,
        }
    }

    let mut out = MeshList::new();
    for raw in raw_meshes {
        if raw.faces.is_empty() {
            continue;
        }
        let fpv = floats_per_vertex(raw.has_vt, raw.has_vn);
        let mut mesh = IndexedMesh::new(fpv, PrimitiveKind::Triangle);
        for tri in &raw.faces {
            for &(v, vt, vn) in tri {
                let mut rec = Vec::with_capacity(fpv);
                rec.extend_from_slice(&positions[v - 1]);
                if raw.has_vn {
                    let n = vn.map(|i| normals[i - 1]).unwrap_or([0.0, 0.0, 0.0]);
                    rec.extend_from_slice(&n);
                }
                if raw.has_vt {
                    let t = vt.map(|i| uvs[i - 1]).unwrap_or([0.0, 0.0]);
                    rec.extend_from_slice(&t);
                }
                mesh.add(&rec)?;
            }
        }
        mesh.finalize();
        out.append(mesh);
    }
    Ok(out)
}

/// Writes `meshes` to `path`: a header comment, then per-mesh `o`/`v`/`vt`/
/// `vn`/`f` blocks with globally-accumulating 1-based index offsets
/// (§6.1). `vt`/`vn` presence is inferred from each mesh's
/// `floats_per_vertex()` using the same `fpv == 5`/`fpv == 6` mapping the
/// reader produces.
#[instrument(skip(meshes))]
pub fn write(path: &Path, meshes: &MeshList) -> Result<()> {
    if meshes.iter().any(|m| m.primitive_kind() != PrimitiveKind::Triangle) {
        return Err(Error::InvalidInput(
            ".obj writer requires triangle-kind meshes".into(),
        ));
    }

    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "# polyhedra")?;
    writeln!(out)?;

    let mut v_off = 1usize;
    let mut vt_off = 1usize;
    let mut vn_off = 1usize;

    for (mesh_idx, mesh) in meshes.iter().enumerate() {
        let fpv = mesh.floats_per_vertex();
        let has_vn = fpv == 5 || fpv == 8;
        let has_vt = fpv == 6 || fpv == 8;
        if fpv < 3 {
            return Err(Error::InvalidInput(".obj writer requires floats_per_vertex >= 3".into()));
        }

        writeln!(out, "o polyhedra.{mesh_idx:03}")?;

        let mut dedup_v = IndexedMesh::new(3, PrimitiveKind::Unspecified);
        let mut dedup_vt = if has_vt { Some(IndexedMesh::new(2, PrimitiveKind::Unspecified)) } else { None };
        let mut dedup_vn = if has_vn { Some(IndexedMesh::new(3, PrimitiveKind::Unspecified)) } else { None };

        let mut face_refs: Vec<[(u32, Option<u32>, Option<u32>); 3]> = Vec::new();
        for tri in mesh.triangles()? {
            let mut refs = [(0u32, None, None); 3];
            for (slot, &index) in refs.iter_mut().zip(tri.iter()) {
                let rec = mesh.vertex(index);
                let pi = dedup_v.add(&rec[0..3])?;
                let ti = if has_vt {
                    let uv_off = if has_vn { 6 } else { 3 };
                    Some(dedup_vt.as_mut().unwrap().add(&rec[uv_off..uv_off + 2])?)
                } else {
                    None
                };
                let ni = if has_vn {
                    Some(dedup_vn.as_mut().unwrap().add(&rec[3..6])?)
                } else {
                    None
                };
                *slot = (pi, ti, ni);
            }
            face_refs.push(refs);
        }

        for i in 0..dedup_v.num_vertices() {
            let p = dedup_v.vertex(i as u32);
            writeln!(out, "v {} {} {}", p[0], p[1], p[2])?;
        }
        if let Some(vt) = &dedup_vt {
            for i in 0..vt.num_vertices() {
                let t = vt.vertex(i as u32);
                writeln!(out, "vt {} {}", t[0], 1.0 - t[1])?;
            }
        }
        if let Some(vn) = &dedup_vn {
            for i in 0..vn.num_vertices() {
                let n = vn.vertex(i as u32);
                writeln!(out, "vn {} {} {}", n[0], n[1], n[2])?;
            }
        }

        for refs in &face_refs {
            write!(out, "f")?;
            for &(pi, ti, ni) in refs {
                let p = pi as usize + v_off;
                match (ti, ni) {
                    (Some(t), Some(n)) => write!(out, " {}/{}/{}", p, t as usize + vt_off, n as usize + vn_off)?,
                    (Some(t), None) => write!(out, " {}/{}", p, t as usize + vt_off)?,
                    (None, Some(n)) => write!(out, " {}//{}", p, n as usize + vn_off)?,
                    (None, None) => write!(out, " {p}")?,
                }
            }
            writeln!(out)?;
        }
        writeln!(out)?;

        v_off += dedup_v.num_vertices();
        if let Some(vt) = &dedup_vt {
            vt_off += vt.num_vertices();
        }
        if let Some(vn) = &dedup_vn {
            vn_off += vn.num_vertices();
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("polyhedra-obj-test-{name}-{}.obj", std::process::id()))
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
    fn write_then_read_round_trips_positions() {
        let path = temp_path("roundtrip");
        let mut list = MeshList::new();
        list.append(triangle_mesh());
        write(&path, &list).unwrap();

        let read_back = read(&path).unwrap();
        assert_eq!(read_back.len(), 1);
        assert_eq!(read_back[0].num_vertices(), 3);
        assert_eq!(read_back[0].num_indices(), 3);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn multiple_o_directives_produce_multiple_meshes() {
        let path = temp_path("multi-o");
        {
            let mut f = File::create(&path).unwrap();
            writeln!(f, "o first").unwrap();
            writeln!(f, "v 0 0 0").unwrap();
            writeln!(f, "v 1 0 0").unwrap();
            writeln!(f, "v 0 1 0").unwrap();
            writeln!(f, "f 1 2 3").unwrap();
            writeln!(f, "o second").unwrap();
            writeln!(f, "v 5 5 5").unwrap();
            writeln!(f, "v 6 5 5").unwrap();
            writeln!(f, "v 5 6 5").unwrap();
            writeln!(f, "f 4 5 6").unwrap();
        }
        let meshes = read(&path).unwrap();
        assert_eq!(meshes.len(), 2);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn face_with_four_vertices_errors() {
        let path = temp_path("bad-face");
        {
            let mut f = File::create(&path).unwrap();
            writeln!(f, "v 0 0 0").unwrap();
            writeln!(f, "v 1 0 0").unwrap();
            writeln!(f, "v 0 1 0").unwrap();
            writeln!(f, "v 1 1 0").unwrap();
            writeln!(f, "f 1 2 3 4").unwrap();
        }
        assert!(read(&path).is_err());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn vn_only_mesh_gets_five_floats_per_vertex() {
        let path = temp_path("vn-only");
        {
            let mut f = File::create(&path).unwrap();
            writeln!(f, "v 0 0 0").unwrap();
            writeln!(f, "v 1 0 0").unwrap();
            writeln!(f, "v 0 1 0").unwrap();
            writeln!(f, "vn 0 0 1").unwrap();
            writeln!(f, "f 1//1 2//1 3//1").unwrap();
        }
        let meshes = read(&path).unwrap();
        assert_eq!(meshes[0].floats_per_vertex(), 5);
        std::fs::remove_file(&path).ok();
    }
}
