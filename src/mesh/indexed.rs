//! Deduplicated vertex store plus an index sequence, tagged with a
//! primitive kind (§3, §4.1). The shared currency every kernel in this
//! crate reads or writes.

use tracing::instrument;

use crate::containers::key_map::{BytesKey, KeyMap};
use crate::error::{Error, Result};

/// What consecutive runs of indices mean when rendered/interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveKind {
    Point,
    Line,
    Triangle,
    Unspecified,
}

/// A deduplicated vertex store plus an index sequence (§3, §4.1).
///
/// Vertices are flat `F`-float records. Two indices are guaranteed to
/// point at byte-distinct records unless the records themselves are
/// byte-equal across all `F` floats (the "IndexedMesh de-duplication"
/// invariant in §8).
#[derive(Clone)]
pub struct IndexedMesh {
    floats_per_vertex: usize,
    kind: PrimitiveKind,
    vertices: Vec<f32>,
    indices: Vec<u32>,
    /// `None` after [`finalize`](Self::finalize); no further `add` is legal.
    intern: Option<KeyMap<BytesKey, u32>>,
}

impl IndexedMesh {
    /// Creates an empty mesh with `floats_per_vertex` floats per vertex
    /// record and the given primitive kind.
    pub fn new(floats_per_vertex: usize, kind: PrimitiveKind) -> Self {
        assert!(floats_per_vertex >= 1, "floats_per_vertex must be >= 1");
        Self {
            floats_per_vertex,
            kind,
            vertices: Vec::new(),
            indices: Vec::new(),
            intern: Some(KeyMap::new()),
        }
    }

    pub fn floats_per_vertex(&self) -> usize {
        self.floats_per_vertex
    }

    pub fn primitive_kind(&self) -> PrimitiveKind {
        self.kind
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len() / self.floats_per_vertex
    }

    pub fn num_indices(&self) -> usize {
        self.indices.len()
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_floats(&self) -> &[f32] {
        &self.vertices
    }

    /// Every vertex record as a flat-float slice, in storage order.
    pub fn vertex(&self, index: u32) -> &[f32] {
        let start = index as usize * self.floats_per_vertex;
        &self.vertices[start..start + self.floats_per_vertex]
    }

    /// The vertex record referenced by the `k`-th entry of the index
    /// sequence (§4.1 `lookup_vert`).
    pub fn lookup_vert(&self, k: usize) -> Result<&[f32]> {
        let index = *self
            .indices
            .get(k)
            .ok_or_else(|| Error::InvalidInput(format!("index position {k} out of range")))?;
        Ok(self.vertex(index))
    }

    /// De-duplicates `vert` byte-exactly against prior records and
    /// appends the resulting vertex index to the index sequence. `vert`
    /// must have exactly `floats_per_vertex` floats.
    #[instrument(skip(self, vert))]
    pub fn add(&mut self, vert: &[f32]) -> Result<u32> {
        if vert.len() != self.floats_per_vertex {
            return Err(Error::InvalidInput(format!(
                "expected {} floats per vertex, got {}",
                self.floats_per_vertex,
                vert.len()
            )));
        }

        let intern = self
            .intern
            .as_mut()
            .ok_or_else(|| Error::InvalidInput("mesh finalized; no further adds allowed".into()))?;

        let key = BytesKey::from_floats(vert);

        let index = if let Some(existing) = intern.get(&key) {
            *existing
        } else {
            let next = self.vertices.len() / self.floats_per_vertex;
            if next >= u32::MAX as usize {
                return Err(Error::AllocationFailed);
            }
            let index = next as u32;
            self.vertices.extend_from_slice(vert);
            intern.insert(key, index);
            index
        };

        self.indices.push(index);
        Ok(index)
    }

    /// Appends `index` directly to the index sequence. `index` must refer
    /// to an existing vertex.
    pub fn add_index(&mut self, index: u32) -> Result<()> {
        if index as usize >= self.num_vertices() {
            return Err(Error::InvalidInput(format!(
                "index {index} out of range ({} vertices)",
                self.num_vertices()
            )));
        }
        self.indices.push(index);
        Ok(())
    }

    /// Drops the interning side table; no further `add` is legal after this.
    pub fn finalize(&mut self) {
        self.intern = None;
    }

    /// Re-emits every triple of `src`'s indices through [`add`](Self::add)
    /// into a fresh mesh with `new_floats_per_vertex <= floats_per_vertex(src)`,
    /// truncating per-vertex attributes.
    pub fn copy(src: &IndexedMesh, new_floats_per_vertex: usize) -> Result<IndexedMesh> {
        if new_floats_per_vertex > src.floats_per_vertex {
            return Err(Error::InvalidInput(
                "copy cannot increase floats_per_vertex".into(),
            ));
        }

        let mut out = IndexedMesh::new(new_floats_per_vertex, src.kind);
        for &index in &src.indices {
            let full = src.vertex(index);
            out.add(&full[..new_floats_per_vertex])?;
        }
        Ok(out)
    }

    /// Triangle index triples. Only meaningful for `PrimitiveKind::Triangle`.
    pub fn triangles(&self) -> Result<impl Iterator<Item = [u32; 3]> + '_> {
        if self.kind != PrimitiveKind::Triangle {
            return Err(Error::InvalidInput(
                "triangles() requires PrimitiveKind::Triangle".into(),
            ));
        }
        if self.indices.len() % 3 != 0 {
            return Err(Error::InvalidInput(
                "triangle mesh index count is not a multiple of 3".into(),
            ));
        }
        Ok(self
            .indices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]]))
    }

    /// Position (first three floats) of vertex `index`. Panics if
    /// `floats_per_vertex < 3`; callers within this crate always construct
    /// meshes with `F >= 3` before calling this.
    pub fn position3(&self, index: u32) -> glam::Vec3 {
        let v = self.vertex(index);
        glam::Vec3::new(v[0], v[1], v[2])
    }

    pub fn position2(&self, index: u32) -> glam::Vec2 {
        let v = self.vertex(index);
        glam::Vec2::new(v[0], v[1])
    }
}

/// An ordered, appendable sequence of owned [`IndexedMesh`] values, used
/// for operations that return multiple polyhedra (§3). The original C
/// implementation's `lp_vl_list` is a linked list because C lacks a
/// growable vector; `Vec` is the idiomatic Rust equivalent for the same
/// observable behavior.
#[derive(Clone, Default, derive_more::Deref, derive_more::DerefMut)]
pub struct MeshList(pub Vec<IndexedMesh>);

impl MeshList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn append(&mut self, mesh: IndexedMesh) {
        self.0.push(mesh);
    }

    pub fn join(mut self, mut other: MeshList) -> MeshList {
        self.0.append(&mut other.0);
        self
    }
}

impl FromIterator<IndexedMesh> for MeshList {
    fn from_iter<T: IntoIterator<Item = IndexedMesh>>(iter: T) -> Self {
        MeshList(iter.into_iter().collect())
    }
}

impl IntoIterator for MeshList {
    type Item = IndexedMesh;
    type IntoIter = std::vec::IntoIter<IndexedMesh>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dedup_is_byte_exact() {
        let mut mesh = IndexedMesh::new(3, PrimitiveKind::Triangle);
        let i0 = mesh.add(&[0.0, 0.0, 0.0]).unwrap();
        let i1 = mesh.add(&[1.0, 0.0, 0.0]).unwrap();
        let i2 = mesh.add(&[0.0, 0.0, 0.0]).unwrap();
        assert_eq!(i0, i2);
        assert_ne!(i0, i1);
        assert_eq!(mesh.num_vertices(), 2);
        assert_eq!(mesh.num_indices(), 3);
    }

    #[test]
    fn finalize_blocks_further_add() {
        let mut mesh = IndexedMesh::new(3, PrimitiveKind::Triangle);
        mesh.add(&[0.0, 0.0, 0.0]).unwrap();
        mesh.finalize();
        assert!(mesh.add(&[1.0, 1.0, 1.0]).is_err());
    }

    #[test]
    fn copy_truncates_attributes() {
        let mut mesh = IndexedMesh::new(6, PrimitiveKind::Triangle);
        mesh.add(&[0.0, 0.0, 0.0, 0.0, 0.0, 1.0]).unwrap();
        mesh.add(&[1.0, 0.0, 0.0, 0.0, 0.0, 1.0]).unwrap();
        mesh.add(&[0.0, 1.0, 0.0, 0.0, 0.0, 1.0]).unwrap();

        let copy = IndexedMesh::copy(&mesh, 3).unwrap();
        assert_eq!(copy.floats_per_vertex(), 3);
        assert_eq!(copy.num_vertices(), 3);

        assert!(IndexedMesh::copy(&mesh, 7).is_err());
    }

    #[test]
    fn add_index_out_of_range_errors() {
        let mut mesh = IndexedMesh::new(3, PrimitiveKind::Triangle);
        mesh.add(&[0.0, 0.0, 0.0]).unwrap();
        assert!(mesh.add_index(0).is_ok());
        assert!(mesh.add_index(5).is_err());
    }
}
