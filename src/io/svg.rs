//! SVG writer (§6.1, `lib/file_svg.c`). Write-only: reading SVG is not
//! supported and always errors.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::instrument;

use crate::error::{Error, Result};
use crate::mesh::indexed::{MeshList, PrimitiveKind};

/// Always errors; SVG reading is not supported (§6.1, `FileSvg_Read`).
pub fn read(_path: &Path) -> Result<MeshList> {
    Err(Error::InvalidInput("reading .svg files is not supported".into()))
}

/// Writes `meshes` as an SVG document: a `viewBox` spanning the bounding
/// box of every input 2D point, then one `<g>` per mesh containing either
/// `<line>` (line-kind, black stroke) or `<polygon>` (triangle-kind, blue
/// fill) elements, in input order with no Y-flip (§6.1).
#[instrument(skip(meshes))]
pub fn write(path: &Path, meshes: &MeshList) -> Result<()> {
    for mesh in meshes.iter() {
        if mesh.floats_per_vertex() < 2 {
            return Err(Error::InvalidInput(
                "svg writer requires floats_per_vertex >= 2".into(),
            ));
        }
    }

    let mut min = [f32::INFINITY; 2];
    let mut max = [f32::NEG_INFINITY; 2];
    for mesh in meshes.iter() {
        for i in 0..mesh.num_vertices() {
            let v = mesh.vertex(i as u32);
            for axis in 0..2 {
                min[axis] = min[axis].min(v[axis]);
                max[axis] = max[axis].max(v[axis]);
            }
        }
    }
    if meshes.is_empty() {
        min = [0.0; 2];
        max = [0.0; 2];
    }

    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>")?;
    writeln!(
        out,
        "<svg viewBox=\"{} {} {} {}\" xmlns=\"http://www.w3.org/2000/svg\">\n",
        min[0],
        min[1],
        max[0] - min[0],
        max[1] - min[1]
    )?;

    for (count, mesh) in meshes.iter().enumerate() {
        match mesh.primitive_kind() {
            PrimitiveKind::Line => {
                writeln!(
                    out,
                    "  <g id=\"polyline_{count:03}\" stroke=\"black\" stroke-width=\"1\" fill=\"none\">"
                )?;
                let num_lines = mesh.num_indices() / 2;
                for i in 0..num_lines {
                    let a = mesh.lookup_vert(2 * i)?;
                    let b = mesh.lookup_vert(2 * i + 1)?;
                    writeln!(out, "    <line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\"/>", a[0], a[1], b[0], b[1])?;
                }
            }
            PrimitiveKind::Triangle => {
                writeln!(out, "  <g id=\"polyline_{count:03}\" fill=\"blue\" stroke=\"none\">")?;
                for tri in mesh.triangles()? {
                    let pts: Vec<&[f32]> = tri.iter().map(|&i| mesh.vertex(i)).collect();
                    write!(out, "    <polygon points=\"")?;
                    for (i, p) in pts.iter().enumerate() {
                        if i > 0 {
                            write!(out, " ")?;
                        }
                        write!(out, "{},{}", p[0], p[1])?;
                    }
                    writeln!(out, "\"/>")?;
                }
            }
            other => {
                return Err(Error::InvalidInput(format!(
                    "svg writer only supports line/triangle primitive kinds, got {other:?}"
                )));
            }
        }
        writeln!(out, "  </g>\n")?;
    }

    writeln!(out, "</svg>")?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mesh::indexed::IndexedMesh;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("polyhedra-svg-test-{name}-{}.svg", std::process::id()))
    }

    #[test]
    fn read_always_errors() {
        assert!(read(Path::new("anything.svg")).is_err());
    }

    #[test]
    fn write_triangle_mesh_contains_polygon() {
        let mut mesh = IndexedMesh::new(2, PrimitiveKind::Triangle);
        mesh.add(&[0.0, 0.0]).unwrap();
        mesh.add(&[1.0, 0.0]).unwrap();
        mesh.add(&[0.0, 1.0]).unwrap();
        mesh.finalize();

        let mut list = MeshList::new();
        list.append(mesh);

        let path = temp_path("triangle");
        write(&path, &list).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("<polygon"));
        assert!(contents.contains("viewBox"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn write_line_mesh_contains_line_elements() {
        let mut mesh = IndexedMesh::new(2, PrimitiveKind::Line);
        mesh.add(&[0.0, 0.0]).unwrap();
        mesh.add(&[1.0, 1.0]).unwrap();
        mesh.finalize();

        let mut list = MeshList::new();
        list.append(mesh);

        let path = temp_path("line");
        write(&path, &list).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("<line"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn too_few_floats_per_vertex_errors() {
        let mesh = IndexedMesh::new(1, PrimitiveKind::Point);
        let mut list = MeshList::new();
        list.append(mesh);
        let path = temp_path("short");
        assert!(write(&path, &list).is_err());
    }
}
