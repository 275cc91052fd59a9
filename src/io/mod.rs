//! Mesh file I/O (§6.1): Wavefront `.obj` (read/write), binary STL
//! (read/write), SVG (write only). [`read_file`]/[`write_file`] dispatch on
//! the lowercased suffix after the last `.`, matching the original's
//! filename-based format selection.

pub mod obj;
pub mod stl;
pub mod svg;

use std::path::Path;

use crate::error::{Error, Result};
use crate::mesh::indexed::MeshList;

fn suffix(path: &Path) -> Result<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(|| Error::FileError(format!("no recognized file extension: {}", path.display())))
}

/// Reads `path`, dispatching on its suffix (`.obj`/`.stl`; `.svg` is
/// write-only and errors here).
pub fn read_file(path: &Path) -> Result<MeshList> {
    match suffix(path)?.as_str() {
        "obj" => obj::read(path),
        "stl" => stl::read(path),
        other => Err(Error::FileError(format!("no reader for .{other} files"))),
    }
}

/// Writes `meshes` to `path`, dispatching on its suffix.
pub fn write_file(path: &Path, meshes: &MeshList) -> Result<()> {
    match suffix(path)?.as_str() {
        "obj" => obj::write(path, meshes),
        "stl" => stl::write(path, meshes),
        "svg" => svg::write(path, meshes),
        other => Err(Error::FileError(format!("no writer for .{other} files"))),
    }
}
